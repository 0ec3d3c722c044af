// API integration tests that verify HTTP endpoints
// Drives the Axum router with real requests; pages are served by mockito

use std::net::TcpListener;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt; // For `.collect()`
use irradiance_extractor::api::{create_router, AppState};
use irradiance_extractor::extractor::{Extractor, ExtractorSettings};
use irradiance_extractor::page_source::{AnySource, HttpSource};
use irradiance_extractor::services::ExtractionService;
use irradiance_extractor::url_template::UrlTemplate;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use tower::ServiceExt; // For `oneshot`

/// Test fixture module for API tests
mod api_test_fixtures {
    use super::*;

    /// Page server answering every grid point with the hour as the value
    pub async fn setup_page_server() -> ServerGuard {
        let mut server = Server::new_async().await;
        for hour in 0..24 {
            server
                .mock("GET", "/sun")
                .match_query(Matcher::UrlEncoded("time".into(), format!("{hour:02}:00")))
                .with_status(200)
                .with_body(format!(
                    r#"<html><body><span id="sE_e">{} W/m²</span></body></html>"#,
                    hour * 10
                ))
                .create_async()
                .await;
        }
        server
    }

    pub fn create_app(server_url: &str) -> Router {
        let settings = ExtractorSettings {
            url_template: UrlTemplate::parse(format!(
                "{server_url}/sun?lat={{lat}}&lon={{lon}}&date={{date}}&time={{time}}"
            ))
            .unwrap(),
            concurrency: 2,
            ..Default::default()
        };
        let extractor = Extractor::new(AnySource::Http(HttpSource::new().unwrap()), settings).unwrap();
        create_router(AppState {
            extraction_service: ExtractionService::new(extractor),
        })
    }

    pub fn request_body() -> Value {
        json!({
            "latitude": 48.85826,
            "longitude": 2.29451,
            "start_date": "2023-01-01",
            "end_date": "2023-01-02",
            "start_hour": 10,
            "end_hour": 12
        })
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn wait_for_completion(app: &Router, job_id: u64) -> Value {
    for _ in 0..100 {
        let (status, _, body) = send(app, get(&format!("/api/v1/extractions/{job_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let summary: Value = serde_json::from_slice(&body).unwrap();
        if summary["status"] != "running" {
            return summary;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} did not finish");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");

    let (status, _, body) = send(&app, get("/api/v1/health")).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_plan_counts_points() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");

    let (status, _, body) = send(&app, post_json("/api/v1/plan", &api_test_fixtures::request_body())).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_days"], 2);
    assert_eq!(json["hours_per_day"], 3);
    assert_eq!(json["total_points"], 6);
}

#[tokio::test]
async fn test_invalid_request_rejected() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");
    let mut body = api_test_fixtures::request_body();
    body["start_hour"] = json!(20);

    let (status, _, response) = send(&app, post_json("/api/v1/extractions", &body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = serde_json::from_slice(&response).unwrap();
    assert!(json["error"].as_str().unwrap().contains("before start hour"));
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");

    let (status, _, _) = send(&app, get("/api/v1/extractions/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, get("/api/v1/extractions/99/export.csv")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_extraction_end_to_end() {
    let server = api_test_fixtures::setup_page_server().await;
    let app = api_test_fixtures::create_app(&server.url());

    let (status, _, body) = send(&app, post_json("/api/v1/extractions", &api_test_fixtures::request_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = serde_json::from_slice::<Value>(&body).unwrap()["job_id"].as_u64().unwrap();

    let summary = wait_for_completion(&app, job_id).await;
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["samples"], 6);
    assert_eq!(summary["failed_samples"], 0);
    assert_eq!(summary["progress"]["completed"], 6);
    assert_eq!(summary["progress"]["fraction"], 1.0);

    // Samples as JSON, in date then hour order
    let (status, _, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}/samples"))).await;
    assert_eq!(status, StatusCode::OK);
    let table: Value = serde_json::from_slice(&body).unwrap();
    let samples = table["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 6);
    assert_eq!(samples[0]["date"], "2023-01-01");
    assert_eq!(samples[0]["hour"], "10:00");
    assert_eq!(samples[0]["irradiance"], "100 W/m²");
    assert_eq!(samples[5]["date"], "2023-01-02");
    assert_eq!(samples[5]["irradiance"], "120 W/m²");

    // CSV download
    let (status, headers, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}/export.csv"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("irradiance.csv"));
    let csv = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "date,hour,irradiance,error");
    assert_eq!(lines[1], "2023-01-01,10:00,100 W/m²,");

    // Spreadsheet download
    let (status, headers, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}/export.xlsx"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("spreadsheetml"));
    assert_eq!(&body[..2], b"PK");

    // Chart
    let (status, headers, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}/chart.svg"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/svg+xml");
    let svg = String::from_utf8(body).unwrap();
    assert!(svg.contains("Hourly Irradiance"));
}

#[tokio::test]
async fn test_dashboard_form_page() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");

    let (status, _, body) = send(&app, get("/?start_hour=8&end_hour=9")).await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Irradiance Data Extractor"));
    // 7 default days × 2 hours
    assert!(html.contains("Total data points to be extracted: 14"));
    assert!(html.contains("Estimate Extraction Time"));
}

#[tokio::test]
async fn test_dashboard_extract_redirects_to_job() {
    let server = api_test_fixtures::setup_page_server().await;
    let app = api_test_fixtures::create_app(&server.url());

    let form = "latitude=48.85826&longitude=2.29451&start_date=2023-01-01&end_date=2023-01-01&start_hour=6&end_hour=7";
    let request = Request::builder()
        .method("POST")
        .uri("/extract")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();

    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/jobs/1");

    wait_for_completion(&app, 1).await;
    let (status, _, body) = send(&app, get("/jobs/1")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Data extraction complete"));
    assert!(html.contains("60 W/m²"));
    assert!(html.contains("/api/v1/extractions/1/chart.svg"));
}

#[tokio::test]
async fn test_dashboard_rejects_bad_form() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");

    let form = "latitude=48.85826&longitude=2.29451&start_date=2023-01-05&end_date=2023-01-01&start_hour=6&end_hour=7";
    let request = Request::builder()
        .method("POST")
        .uri("/extract")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();

    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("is before start date"));
}

#[tokio::test]
async fn test_api_estimate_times_one_day() {
    let server = api_test_fixtures::setup_page_server().await;
    let app = api_test_fixtures::create_app(&server.url());

    let (status, _, body) = send(&app, post_json("/api/v1/estimate", &api_test_fixtures::request_body())).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["sample_date"], "2023-01-01");
    assert_eq!(json["samples_measured"], 3);
    assert_eq!(json["total_points"], 6);
    assert_eq!(json["concurrency"], 2);
    // Two days over two workers is a single wave
    assert_eq!(json["expected_seconds"], json["day_seconds"]);

    // The form page shows the stored estimate afterwards
    let (status, _, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Average call time measured"));
    assert!(html.contains("Expected total time"));
    assert!(html.contains("2 workers"));
}

#[tokio::test]
async fn test_api_estimate_rejects_invalid_request() {
    let app = api_test_fixtures::create_app("http://127.0.0.1:9");
    let mut body = api_test_fixtures::request_body();
    body["end_date"] = json!("2022-12-31");

    let (status, _, _) = send(&app, post_json("/api/v1/estimate", &body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_dashboard_estimate_renders_expected_time() {
    let server = api_test_fixtures::setup_page_server().await;
    let app = api_test_fixtures::create_app(&server.url());

    let form = "latitude=48.85826&longitude=2.29451&start_date=2023-01-01&end_date=2023-01-03&start_hour=6&end_hour=8";
    let request = Request::builder()
        .method("POST")
        .uri("/estimate")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();

    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Total data points to be extracted: 9"));
    assert!(html.contains("Expected total time"));
    assert!(html.contains("(parallelized, 2 workers)"));
}

#[tokio::test]
async fn test_results_conflict_while_job_running() {
    // Accepts connections but never answers, so the job stays running
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api_test_fixtures::create_app(&format!("http://{addr}"));

    let (status, _, body) = send(&app, post_json("/api/v1/extractions", &api_test_fixtures::request_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = serde_json::from_slice::<Value>(&body).unwrap()["job_id"].as_u64().unwrap();

    let (status, _, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["status"], "running");

    let (status, _, body) = send(&app, get(&format!("/api/v1/extractions/{job_id}/samples"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("has not finished"));

    let (status, _, _) = send(&app, get(&format!("/api/v1/extractions/{job_id}/export.csv"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    drop(listener);
}
