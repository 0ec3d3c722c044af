//! Server-rendered HTML dashboard
//!
//! Three views: the input form (with point count and time estimate), the job
//! page (progress, table, chart, downloads) and redirects between them.

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::api::AppState;
use crate::chart;
use crate::extractor::Estimate;
use crate::jobs::{Job, JobStatus};
use crate::models::{ExtractionRequest, SampleTable};

const REFRESH_SECS: u32 = 2;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/estimate", post(estimate))
        .route("/extract", post(extract))
        .route("/jobs/{id}", get(job_page))
        .with_state(state)
}

/// Form values carried in the query string; missing fields fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct FormQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_hour: Option<u32>,
    pub end_hour: Option<u32>,
}

impl FormQuery {
    pub fn into_request(self) -> ExtractionRequest {
        let defaults = ExtractionRequest::default();
        ExtractionRequest {
            latitude: self.latitude.unwrap_or(defaults.latitude),
            longitude: self.longitude.unwrap_or(defaults.longitude),
            start_date: self.start_date.unwrap_or(defaults.start_date),
            end_date: self.end_date.unwrap_or(defaults.end_date),
            start_hour: self.start_hour.unwrap_or(defaults.start_hour),
            end_hour: self.end_hour.unwrap_or(defaults.end_hour),
        }
    }
}

#[instrument(skip(state))]
async fn index(State(state): State<AppState>, Query(query): Query<FormQuery>) -> Html<String> {
    let request = query.into_request();
    let estimate = state.extraction_service.last_estimate().await;
    let latest = state.extraction_service.latest_job().await;
    Html(render_form_page(&request, estimate.as_ref(), latest.as_ref(), None))
}

#[instrument(skip(state))]
async fn estimate(State(state): State<AppState>, Form(request): Form<ExtractionRequest>) -> Response {
    let latest = state.extraction_service.latest_job().await;
    match state.extraction_service.estimate(&request).await {
        Ok(estimate) => {
            info!("Estimate ready: {:.2}s", estimate.expected_seconds);
            Html(render_form_page(&request, Some(&estimate), latest.as_ref(), None)).into_response()
        }
        Err(e) => {
            warn!("Estimate rejected: {}", e);
            let page = render_form_page(&request, None, latest.as_ref(), Some(&e.to_string()));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
        }
    }
}

#[instrument(skip(state))]
async fn extract(State(state): State<AppState>, Form(request): Form<ExtractionRequest>) -> Response {
    match state.extraction_service.start_extraction(request.clone()).await {
        Ok(id) => Redirect::to(&format!("/jobs/{id}")).into_response(),
        Err(e) => {
            warn!("Extraction rejected: {}", e);
            let estimate = state.extraction_service.last_estimate().await;
            let latest = state.extraction_service.latest_job().await;
            let page = render_form_page(&request, estimate.as_ref(), latest.as_ref(), Some(&e.to_string()));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
        }
    }
}

#[instrument(skip(state))]
async fn job_page(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.extraction_service.job(id).await {
        Ok(job) => Html(render_job_page(&job)).into_response(),
        Err(e) => {
            warn!("Job page requested for unknown job {}", id);
            let body = layout("Not found", &format!("<p class=\"error\">{}</p>", escape(&e.to_string())), None);
            (StatusCode::NOT_FOUND, Html(body)).into_response()
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str, refresh_secs: Option<u32>) -> String {
    let refresh = refresh_secs
        .map(|secs| format!("<meta http-equiv=\"refresh\" content=\"{secs}\">"))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
{refresh}
<title>{title} · Irradiance Data Extractor</title>
<style>
body {{ font-family: sans-serif; margin: 2rem auto; max-width: 1100px; }}
fieldset {{ margin-bottom: 1rem; }}
label {{ display: inline-block; min-width: 9rem; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.2rem 0.6rem; }}
.info {{ background: #eef5ff; padding: 0.5rem; }}
.success {{ background: #eaffea; padding: 0.5rem; }}
.error {{ background: #ffecec; padding: 0.5rem; }}
</style>
</head>
<body>
<h1>☀️ Irradiance Data Extractor</h1>
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

pub fn render_form_page(
    request: &ExtractionRequest,
    estimate: Option<&Estimate>,
    latest: Option<&Job>,
    error: Option<&str>,
) -> String {
    let mut body = String::new();
    body.push_str("<p>Extract hourly irradiance data for a given location and time range.</p>");

    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>", escape(error)));
    }

    body.push_str(&format!(
        r#"<h2>📍 Location &amp; Inputs</h2>
<form method="post" action="/extract">
<fieldset>
<legend>Location coordinates</legend>
<label for="latitude">Latitude</label>
<input type="number" id="latitude" name="latitude" step="0.00001" value="{lat:.5}"><br>
<label for="longitude">Longitude</label>
<input type="number" id="longitude" name="longitude" step="0.00001" value="{lon:.5}">
<p>Selected Location: Latitude {lat:.5}, Longitude {lon:.5}</p>
</fieldset>
<fieldset>
<legend>Date and time range</legend>
<label for="start_date">Start Date</label>
<input type="date" id="start_date" name="start_date" value="{start_date}"><br>
<label for="end_date">End Date</label>
<input type="date" id="end_date" name="end_date" value="{end_date}"><br>
<label for="start_hour">Start Hour</label>
<input type="number" id="start_hour" name="start_hour" min="0" max="23" value="{start_hour}"><br>
<label for="end_hour">End Hour</label>
<input type="number" id="end_hour" name="end_hour" min="0" max="23" value="{end_hour}">
</fieldset>
<p class="info">Total data points to be extracted: {points}</p>
"#,
        lat = request.latitude,
        lon = request.longitude,
        start_date = request.start_date.format("%Y-%m-%d"),
        end_date = request.end_date.format("%Y-%m-%d"),
        start_hour = request.start_hour,
        end_hour = request.end_hour,
        points = request.total_points(),
    ));

    if let Some(estimate) = estimate {
        body.push_str(&format!(
            "<p class=\"success\">Average call time measured: {:.2} seconds per day ({:.2} seconds per sample)</p>\
             <p class=\"info\">Expected total time: {:.2} seconds (parallelized, {} workers).</p>",
            estimate.day_seconds,
            estimate.seconds_per_sample,
            estimate.expected_seconds,
            estimate.concurrency,
        ));
    }

    body.push_str(
        r#"<button type="submit" formaction="/estimate">Estimate Extraction Time</button>
<button type="submit">Start Extraction</button>
</form>"#,
    );

    if let Some(job) = latest {
        body.push_str(&format!(
            "<p>Last extraction: <a href=\"/jobs/{id}\">job {id}</a> ({status})</p>",
            id = job.id,
            status = status_label(job.status),
        ));
    }

    layout("Inputs", &body, None)
}

pub fn render_job_page(job: &Job) -> String {
    let snapshot = job.progress.snapshot();
    let mut body = String::new();

    body.push_str(&format!(
        "<p><a href=\"/\">← Back to inputs</a></p><h2>📊 Extracted Data (job {})</h2>",
        job.id
    ));
    body.push_str(&format!(
        "<progress max=\"{total}\" value=\"{completed}\"></progress> {completed}/{total} samples ({failed} failed)",
        total = snapshot.total,
        completed = snapshot.completed,
        failed = snapshot.failed,
    ));

    let refresh = match job.status {
        JobStatus::Running => {
            body.push_str("<p class=\"info\">Extraction in progress…</p>");
            Some(REFRESH_SECS)
        }
        JobStatus::Failed => {
            let message = job.error.as_deref().unwrap_or("unknown error");
            body.push_str(&format!("<p class=\"error\">Extraction failed: {}</p>", escape(message)));
            None
        }
        JobStatus::Completed => {
            body.push_str("<p class=\"success\">✅ Data extraction complete!</p>");
            if let Some(table) = &job.table {
                body.push_str(&format!(
                    "<p><a href=\"/api/v1/extractions/{id}/export.csv\">📥 Download CSV</a> · \
                     <a href=\"/api/v1/extractions/{id}/export.xlsx\">📥 Download Excel</a></p>",
                    id = job.id
                ));
                body.push_str(&render_table(table));
                body.push_str("<h2>📈 Visualization</h2>");
                if chart::has_plottable_data(table) {
                    body.push_str(&format!(
                        "<img src=\"/api/v1/extractions/{}/chart.svg\" alt=\"Hourly Irradiance\">",
                        job.id
                    ));
                } else {
                    body.push_str("<p class=\"info\">No data to visualize. Perform extraction first.</p>");
                }
            }
            None
        }
    };

    layout(&format!("Job {}", job.id), &body, refresh)
}

fn render_table(table: &SampleTable) -> String {
    let mut html = String::from(
        "<table><thead><tr><th>date</th><th>hour</th><th>irradiance</th><th>error</th></tr></thead><tbody>",
    );
    for sample in table.iter() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            sample.date.format("%Y-%m-%d"),
            escape(&sample.hour),
            escape(sample.irradiance.as_deref().unwrap_or_default()),
            escape(sample.error.as_deref().unwrap_or_default()),
        ));
    }
    html.push_str("</tbody></table>");
    html
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IrradianceSample;
    use crate::progress::Progress;
    use chrono::Utc;
    use std::sync::Arc;

    fn job(status: JobStatus, table: Option<SampleTable>) -> Job {
        let request = ExtractionRequest::default();
        Job {
            id: 3,
            progress: Arc::new(Progress::new(request.total_points())),
            request,
            status,
            started_at: Utc::now(),
            finished_at: None,
            table: table.map(Arc::new),
            error: None,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"5\" & 'x'</b>"), "&lt;b&gt;&quot;5&quot; &amp; &#39;x&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_form_query_defaults() {
        let request = FormQuery {
            start_hour: Some(8),
            ..Default::default()
        }
        .into_request();
        assert_eq!(request.start_hour, 8);
        assert_eq!(request.end_hour, 18);
        assert_eq!(request.latitude, 48.85826);
    }

    #[test]
    fn test_form_page_shows_point_count() {
        let page = render_form_page(&ExtractionRequest::default(), None, None, None);
        assert!(page.contains("Total data points to be extracted: 91"));
        assert!(page.contains("value=\"2023-01-01\""));
        assert!(page.contains("Latitude 48.85826, Longitude 2.29451"));
        assert!(!page.contains("Expected total time"));
    }

    #[test]
    fn test_running_job_page_refreshes() {
        let page = render_job_page(&job(JobStatus::Running, None));
        assert!(page.contains("http-equiv=\"refresh\""));
        assert!(page.contains("0/91 samples"));
        assert!(!page.contains("Download CSV"));
    }

    #[test]
    fn test_completed_job_page_escapes_values() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut table = SampleTable::new();
        table.push(IrradianceSample::fetched(date, 6, "<script>".to_string()));
        let page = render_job_page(&job(JobStatus::Completed, Some(table)));

        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("/api/v1/extractions/3/export.xlsx"));
        assert!(page.contains("No data to visualize"));
        assert!(!page.contains("http-equiv=\"refresh\""));
    }

    #[test]
    fn test_completed_job_page_embeds_chart() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut table = SampleTable::new();
        table.push(IrradianceSample::fetched(date, 12, "300.5".to_string()));
        let page = render_job_page(&job(JobStatus::Completed, Some(table)));
        assert!(page.contains("/api/v1/extractions/3/chart.svg"));
    }
}
