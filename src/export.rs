use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use tracing::{debug, info};

use crate::models::SampleTable;

pub const CSV_FILENAME: &str = "irradiance.csv";
pub const XLSX_FILENAME: &str = "irradiance.xlsx";
pub const WORKSHEET_NAME: &str = "Irradiance";

const COLUMNS: [&str; 4] = ["date", "hour", "irradiance", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet export failed: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported export extension: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(ExportError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    hour: &'a str,
    irradiance: &'a str,
    error: &'a str,
}

pub fn to_csv(table: &SampleTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if table.is_empty() {
        // serialize() only emits the header alongside the first row
        writer.write_record(COLUMNS)?;
    }
    for sample in table.iter() {
        writer.serialize(CsvRow {
            date: sample.date.format("%Y-%m-%d").to_string(),
            hour: &sample.hour,
            irradiance: sample.irradiance.as_deref().unwrap_or_default(),
            error: sample.error.as_deref().unwrap_or_default(),
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    debug!("Exported {} rows to CSV ({} bytes)", table.len(), bytes.len());
    Ok(bytes)
}

pub fn to_xlsx(table: &SampleTable) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(WORKSHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (index, sample) in table.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_string(row, 0, sample.date.format("%Y-%m-%d").to_string())?;
        worksheet.write_string(row, 1, &sample.hour)?;
        if let Some(irradiance) = &sample.irradiance {
            worksheet.write_string(row, 2, irradiance)?;
        }
        if let Some(error) = &sample.error {
            worksheet.write_string(row, 3, error)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Exported {} rows to XLSX ({} bytes)", table.len(), bytes.len());
    Ok(bytes)
}

pub fn export(table: &SampleTable, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(table),
        ExportFormat::Xlsx => to_xlsx(table),
    }
}

/// Write the table to `path`, picking CSV or XLSX from the extension
pub fn write_to_path(table: &SampleTable, path: &Path) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    let bytes = export(table, format)?;
    std::fs::write(path, bytes)?;
    info!("Wrote {} samples to {}", table.len(), path.display());
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IrradianceSample;
    use chrono::NaiveDate;

    fn sample_table() -> SampleTable {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut table = SampleTable::new();
        table.push(IrradianceSample::fetched(date, 6, "0".to_string()));
        table.push(IrradianceSample::fetched(date, 12, "312.4".to_string()));
        table.push(IrradianceSample::failed(date, 13, "fetch failed: timeout"));
        table
    }

    #[test]
    fn test_to_csv_layout() {
        let csv = String::from_utf8(to_csv(&sample_table()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "date,hour,irradiance,error",
                "2023-01-01,06:00,0,",
                "2023-01-01,12:00,312.4,",
                "2023-01-01,13:00,,fetch failed: timeout",
            ]
        );
    }

    #[test]
    fn test_to_csv_empty_table_has_header() {
        let csv = String::from_utf8(to_csv(&SampleTable::new()).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), "date,hour,irradiance,error");
    }

    #[test]
    fn test_to_xlsx_produces_zip() {
        let bytes = to_xlsx(&sample_table()).unwrap();
        // XLSX is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/irradiance.CSV")).unwrap(),
            ExportFormat::Csv
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("irradiance.xlsx")).unwrap(),
            ExportFormat::Xlsx
        );
        assert!(matches!(
            ExportFormat::from_path(Path::new("irradiance.json")),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }
}
