use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::hour_label;

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("End date {end} is before start date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("Hour {0} is outside 0-23")]
    HourOutOfRange(u32),
    #[error("End hour {end} is before start hour {start}")]
    HourRange { start: u32, end: u32 },
    #[error("Latitude {0} is outside -90..90")]
    Latitude(f64),
    #[error("Longitude {0} is outside -180..180")]
    Longitude(f64),
}

/// Inputs for one extraction run: a location plus inclusive date and hour ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtractionRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ExtractionRequest {
    /// Eiffel Tower, first week of 2023, 06:00 to 18:00
    fn default() -> Self {
        Self {
            latitude: 48.85826,
            longitude: 2.29451,
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 7).unwrap_or_default(),
            start_hour: 6,
            end_hour: 18,
        }
    }
}

impl ExtractionRequest {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RequestError::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RequestError::Longitude(self.longitude));
        }
        if self.end_date < self.start_date {
            return Err(RequestError::DateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        for hour in [self.start_hour, self.end_hour] {
            if hour > 23 {
                return Err(RequestError::HourOutOfRange(hour));
            }
        }
        if self.end_hour < self.start_hour {
            return Err(RequestError::HourRange {
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        Ok(())
    }

    /// Every date in the inclusive range, ascending
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut current = self.start_date;
        while current <= self.end_date {
            dates.push(current);
            match current.checked_add_days(Days::new(1)) {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }

    pub fn hours(&self) -> std::ops::RangeInclusive<u32> {
        self.start_hour..=self.end_hour
    }

    pub fn total_days(&self) -> usize {
        if self.end_date < self.start_date {
            return 0;
        }
        (self.end_date - self.start_date).num_days() as usize + 1
    }

    pub fn hours_per_day(&self) -> usize {
        if self.end_hour < self.start_hour {
            return 0;
        }
        (self.end_hour - self.start_hour + 1) as usize
    }

    pub fn total_points(&self) -> usize {
        self.total_days() * self.hours_per_day()
    }
}

/// Day/hour/point counts for a request, computed without fetching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtractionPlan {
    pub total_days: usize,
    pub hours_per_day: usize,
    pub total_points: usize,
}

impl From<&ExtractionRequest> for ExtractionPlan {
    fn from(request: &ExtractionRequest) -> Self {
        Self {
            total_days: request.total_days(),
            hours_per_day: request.hours_per_day(),
            total_points: request.total_points(),
        }
    }
}

/// One scraped value
///
/// `irradiance` is the element text exactly as the page showed it (trimmed).
/// A failed fetch leaves it empty and records why in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IrradianceSample {
    pub date: NaiveDate,
    pub hour: String,
    pub irradiance: Option<String>,
    pub error: Option<String>,
}

impl IrradianceSample {
    pub fn fetched(date: NaiveDate, hour: u32, irradiance: String) -> Self {
        Self {
            date,
            hour: hour_label(hour),
            irradiance: Some(irradiance),
            error: None,
        }
    }

    pub fn failed(date: NaiveDate, hour: u32, error: impl ToString) -> Self {
        Self {
            date,
            hour: hour_label(hour),
            irradiance: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Samples in collection order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SampleTable {
    pub samples: Vec<IrradianceSample>,
}

impl SampleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: IrradianceSample) {
        self.samples.push(sample);
    }

    pub fn extend(&mut self, other: SampleTable) {
        self.samples.extend(other.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IrradianceSample> {
        self.samples.iter()
    }

    pub fn failed_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_failed()).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.len() - self.failed_count()
    }

    /// Distinct dates in first-seen order
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        for sample in &self.samples {
            if !dates.contains(&sample.date) {
                dates.push(sample.date);
            }
        }
        dates
    }
}

impl FromIterator<IrradianceSample> for SampleTable {
    fn from_iter<I: IntoIterator<Item = IrradianceSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}
