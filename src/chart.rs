use chrono::NaiveDate;
use plotters::prelude::*;

use crate::models::SampleTable;
use crate::utils::{hour_from_label, parse_irradiance_value};

pub const CHART_SIZE: (u32, u32) = (960, 540);

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Failed to draw chart: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for ChartError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        ChartError::Draw(e.to_string())
    }
}

/// One line per date, (hour, value) points in table order
pub fn series_by_date(table: &SampleTable) -> Vec<(NaiveDate, Vec<(f64, f64)>)> {
    let mut series: Vec<(NaiveDate, Vec<(f64, f64)>)> = Vec::new();
    for sample in table.iter() {
        let Some(hour) = hour_from_label(&sample.hour) else {
            continue;
        };
        let Some(value) = sample.irradiance.as_deref().and_then(parse_irradiance_value) else {
            continue;
        };
        let point = (hour as f64, value);
        match series.iter_mut().find(|(date, _)| *date == sample.date) {
            Some((_, points)) => points.push(point),
            None => series.push((sample.date, vec![point])),
        }
    }
    series
}

pub fn has_plottable_data(table: &SampleTable) -> bool {
    !series_by_date(table).is_empty()
}

/// Render the "Hourly Irradiance" line chart as an SVG document
pub fn render_svg(table: &SampleTable) -> Result<String, ChartError> {
    let series = series_by_date(table);

    let (x_min, x_max) = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(x, _)| *x))
        .fold(None, |range: Option<(f64, f64)>, x| match range {
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            None => Some((x, x)),
        })
        .map(|(lo, hi)| if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) })
        .unwrap_or((0.0, 23.0));
    let mut y_max = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(_, y)| *y))
        .fold(0.0, f64::max);
    if !y_max.is_finite() || y_max <= 0.0 {
        y_max = 1.0;
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Hourly Irradiance", ("sans-serif", 24))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0.0..(y_max * 1.1))?;

        chart
            .configure_mesh()
            .x_desc("hour")
            .y_desc("irradiance")
            .x_label_formatter(&|v| format!("{:02.0}:00", v))
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()?;

        for (index, (date, points)) in series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
                .label(date.format("%Y-%m-%d").to_string())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        if !series.is_empty() {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IrradianceSample;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn table() -> SampleTable {
        let mut table = SampleTable::new();
        table.push(IrradianceSample::fetched(date(1), 6, "0".to_string()));
        table.push(IrradianceSample::fetched(date(1), 7, "120.5 W/m²".to_string()));
        table.push(IrradianceSample::fetched(date(1), 8, "--".to_string()));
        table.push(IrradianceSample::failed(date(2), 6, "fetch failed"));
        table.push(IrradianceSample::fetched(date(2), 7, "98".to_string()));
        table
    }

    #[test]
    fn test_series_by_date_skips_non_numeric() {
        let series = series_by_date(&table());
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, date(1));
        assert_eq!(series[0].1, vec![(6.0, 0.0), (7.0, 120.5)]);
        assert_eq!(series[1].1, vec![(7.0, 98.0)]);
    }

    #[test]
    fn test_render_svg_contains_title_and_legend() {
        let svg = render_svg(&table()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Hourly Irradiance"));
        assert!(svg.contains("2023-01-02"));
    }

    #[test]
    fn test_render_svg_empty_table() {
        let empty = SampleTable::new();
        assert!(!has_plottable_data(&empty));
        let svg = render_svg(&empty).unwrap();
        assert!(svg.contains("Hourly Irradiance"));
    }
}
