use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::fetch_error::FetchError;
use crate::models::{Coordinate, ExtractionRequest, IrradianceSample, RequestError, SampleTable};
use crate::page_source::{PageSession, PageSource};
use crate::progress::Progress;
use crate::url_template::{TemplateError, UrlTemplate};

/// Element holding the irradiance value on suncalc.org
pub const DEFAULT_SELECTOR: &str = "#sE_e";

#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("Invalid CSS selector: {0}")]
    Selector(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// How long to wait for a page to stop changing after navigation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub url_template: UrlTemplate,
    pub selector: String,
    pub settle: SettleOptions,
    pub concurrency: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            url_template: UrlTemplate::default(),
            selector: DEFAULT_SELECTOR.to_string(),
            settle: SettleOptions::default(),
            concurrency: 4,
        }
    }
}

/// Timing of a one-day trial run, scaled to the full request
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Estimate {
    pub sample_date: NaiveDate,
    pub samples_measured: usize,
    pub day_seconds: f64,
    pub seconds_per_sample: f64,
    pub total_points: usize,
    pub concurrency: usize,
    pub expected_seconds: f64,
}

impl Estimate {
    /// Days run `concurrency` at a time, so the run takes one day per wave
    pub fn from_measurement(request: &ExtractionRequest, day_seconds: f64, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let samples_measured = request.hours_per_day();
        let waves = request.total_days().div_ceil(concurrency);
        let seconds_per_sample = if samples_measured == 0 {
            0.0
        } else {
            day_seconds / samples_measured as f64
        };
        Self {
            sample_date: request.start_date,
            samples_measured,
            day_seconds,
            seconds_per_sample,
            total_points: request.total_points(),
            concurrency,
            expected_seconds: day_seconds * waves as f64,
        }
    }
}

/// Walks the date × hour grid, one page load per point
pub struct Extractor<S> {
    source: S,
    template: UrlTemplate,
    selector_text: String,
    selector: Selector,
    settle: SettleOptions,
    concurrency: usize,
}

impl<S: PageSource> Extractor<S> {
    pub fn new(source: S, settings: ExtractorSettings) -> Result<Self, ExtractorError> {
        let selector = Selector::parse(&settings.selector)
            .map_err(|_| ExtractorError::Selector(settings.selector.clone()))?;
        Ok(Self {
            source,
            template: settings.url_template,
            selector_text: settings.selector,
            selector,
            settle: settings.settle,
            concurrency: settings.concurrency.max(1),
        })
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every point sequentially through a single session
    #[instrument(skip(self, progress), fields(points = request.total_points()))]
    pub async fn fetch_irradiance(
        &self,
        request: &ExtractionRequest,
        progress: &Progress,
    ) -> Result<SampleTable, RequestError> {
        request.validate()?;
        progress.set_total(request.total_points());
        let coordinate = request.coordinate();
        let dates = request.dates();

        info!("Starting sequential extraction of {} points", request.total_points());
        let mut session = match self.source.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open page session: {}", e);
                return Ok(dates
                    .into_iter()
                    .flat_map(|date| failed_day(date, request.hours(), &e, progress).samples)
                    .collect());
            }
        };

        let mut table = SampleTable::new();
        for date in dates {
            for hour in request.hours() {
                let sample = self.fetch_sample(&mut session, coordinate, date, hour).await;
                progress.record(sample.is_failed());
                table.push(sample);
            }
        }
        session.close().await;

        log_summary(&table);
        Ok(table)
    }

    /// Fetch days concurrently, at most `concurrency` sessions at a time
    ///
    /// Each day gets its own session and walks its hours in order. Rows come
    /// back grouped by day in date order.
    #[instrument(skip(self, progress), fields(points = request.total_points(), concurrency = self.concurrency))]
    pub async fn fetch_parallel(
        &self,
        request: &ExtractionRequest,
        progress: &Progress,
    ) -> Result<SampleTable, RequestError> {
        request.validate()?;
        progress.set_total(request.total_points());
        let coordinate = request.coordinate();

        info!(
            "Starting extraction of {} points over {} days",
            request.total_points(),
            request.total_days()
        );

        let days: Vec<SampleTable> = stream::iter(request.dates())
            .map(|date| self.fetch_day(coordinate, date, request.hours(), progress))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut table = SampleTable::new();
        for day in days {
            table.extend(day);
        }

        log_summary(&table);
        Ok(table)
    }

    /// Time a full fetch of the first requested day
    #[instrument(skip(self))]
    pub async fn estimate(&self, request: &ExtractionRequest) -> Result<Estimate, RequestError> {
        request.validate()?;
        let progress = Progress::new(request.hours_per_day());

        let started = Instant::now();
        let day = self
            .fetch_day(request.coordinate(), request.start_date, request.hours(), &progress)
            .await;
        let day_seconds = started.elapsed().as_secs_f64();

        if day.failed_count() > 0 {
            warn!("{} of {} trial samples failed", day.failed_count(), day.len());
        }

        let estimate = Estimate::from_measurement(request, day_seconds, self.concurrency);
        info!(
            "Measured {:.2}s for one day, expecting {:.2}s in total",
            estimate.day_seconds, estimate.expected_seconds
        );
        Ok(estimate)
    }

    async fn fetch_day(
        &self,
        coordinate: Coordinate,
        date: NaiveDate,
        hours: RangeInclusive<u32>,
        progress: &Progress,
    ) -> SampleTable {
        let mut session = match self.source.open().await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open page session for {}: {}", date, e);
                return failed_day(date, hours, &e, progress);
            }
        };

        let mut table = SampleTable::new();
        for hour in hours {
            let sample = self.fetch_sample(&mut session, coordinate, date, hour).await;
            progress.record(sample.is_failed());
            table.push(sample);
        }
        session.close().await;

        debug!("Finished {} with {} samples", date, table.len());
        table
    }

    /// Load one grid point. Failures become a failed sample, never an error.
    #[instrument(skip_all, fields(date = %date, hour = hour))]
    pub async fn fetch_sample(
        &self,
        session: &mut S::Session,
        coordinate: Coordinate,
        date: NaiveDate,
        hour: u32,
    ) -> IrradianceSample {
        let url = self.template.render(coordinate, date, hour);
        debug!("Navigating to {}", url);

        match self.read_settled(session, &url).await {
            Ok(text) => {
                debug!("Read irradiance '{}'", text);
                IrradianceSample::fetched(date, hour, text)
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                IrradianceSample::failed(date, hour, format!("fetch failed: {e}"))
            }
        }
    }

    async fn read_settled(&self, session: &mut S::Session, url: &str) -> Result<String, FetchError> {
        let secs = self.settle.timeout.as_secs();
        let load = async {
            // Drop the previous point's DOM so its value cannot pass as settled
            if session.is_dynamic() {
                session.clear().await?;
            }
            session.navigate(url).await
        };
        tokio::time::timeout(self.settle.timeout, load)
            .await
            .map_err(|_| FetchError::NavigationTimeout {
                url: url.to_string(),
                secs,
            })??;

        if !session.is_dynamic() {
            let html = session.content().await?;
            return extract_text(&html, &self.selector)
                .ok_or_else(|| FetchError::SelectorNotFound(self.selector_text.clone()));
        }

        // Settled means the same non-empty text on two consecutive polls
        let deadline = Instant::now() + self.settle.timeout;
        let mut last: Option<String> = None;
        loop {
            let html = session.content().await?;
            if let Some(current) = extract_text(&html, &self.selector) {
                if !current.is_empty() && last.as_deref() == Some(current.as_str()) {
                    return Ok(current);
                }
                last = Some(current);
            }

            if Instant::now() >= deadline {
                return last.ok_or_else(|| FetchError::SettleTimeout {
                    selector: self.selector_text.clone(),
                    secs,
                });
            }
            tokio::time::sleep(self.settle.poll_interval).await;
        }
    }
}

/// Trimmed text of the first element matching `selector`
pub fn extract_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}

fn failed_day(
    date: NaiveDate,
    hours: RangeInclusive<u32>,
    error: &FetchError,
    progress: &Progress,
) -> SampleTable {
    hours
        .map(|hour| {
            progress.record(true);
            IrradianceSample::failed(date, hour, format!("fetch failed: {error}"))
        })
        .collect()
}

fn log_summary(table: &SampleTable) {
    if table.failed_count() > 0 {
        warn!(
            "Extraction finished with {} failed samples out of {}",
            table.failed_count(),
            table.len()
        );
    } else {
        info!("Extraction finished with {} samples", table.len());
    }
}
