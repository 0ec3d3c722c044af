use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{OpenApi, ToSchema};

use crate::dashboard;
use crate::export::{ExportFormat, CSV_FILENAME, XLSX_FILENAME};
use crate::extractor::Estimate;
use crate::jobs::{JobStatus, JobSummary};
use crate::models::{Coordinate, ExtractionPlan, ExtractionRequest, IrradianceSample, SampleTable};
use crate::progress::ProgressSnapshot;
use crate::services::{ExtractionService, ServiceError};

#[derive(Clone)]
pub struct AppState {
    pub extraction_service: ExtractionService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartedResponse {
    pub job_id: u64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::Request(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::NotReady(_) => StatusCode::CONFLICT,
        ServiceError::Export(_) | ServiceError::Chart(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() }))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        plan,
        estimate,
        start_extraction,
        get_extraction,
        get_samples,
        export_csv,
        export_xlsx,
        chart_svg
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        StartedResponse,
        Coordinate,
        ExtractionRequest,
        ExtractionPlan,
        Estimate,
        IrradianceSample,
        SampleTable,
        JobStatus,
        JobSummary,
        ProgressSnapshot
    )),
    tags((name = "irradiance", description = "Hourly solar irradiance extraction"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/plan", post(plan))
        .route("/estimate", post(estimate))
        .route("/extractions", post(start_extraction))
        .route("/extractions/{id}", get(get_extraction))
        .route("/extractions/{id}/samples", get(get_samples))
        .route("/extractions/{id}/export.csv", get(export_csv))
        .route("/extractions/{id}/export.xlsx", get(export_xlsx))
        .route("/extractions/{id}/chart.svg", get(chart_svg))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(dashboard::routes(state))
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "irradiance",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/plan",
    tag = "irradiance",
    request_body = ExtractionRequest,
    responses(
        (status = 200, description = "Number of points the request covers", body = ExtractionPlan),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(_state))]
async fn plan(
    State(_state): State<AppState>,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<ExtractionPlan>, ApiError> {
    request.validate().map_err(|e| api_error(e.into()))?;
    Ok(Json(ExtractionPlan::from(&request)))
}

#[utoipa::path(
    post,
    path = "/api/v1/estimate",
    tag = "irradiance",
    request_body = ExtractionRequest,
    responses(
        (status = 200, description = "Timing of a one-day trial run", body = Estimate),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn estimate(
    State(state): State<AppState>,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<Estimate>, ApiError> {
    let estimate = state
        .extraction_service
        .estimate(&request)
        .await
        .map_err(api_error)?;

    info!(
        "Estimated {:.2}s for {} points",
        estimate.expected_seconds, estimate.total_points
    );
    Ok(Json(estimate))
}

#[utoipa::path(
    post,
    path = "/api/v1/extractions",
    tag = "irradiance",
    request_body = ExtractionRequest,
    responses(
        (status = 202, description = "Extraction started", body = StartedResponse),
        (status = 422, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn start_extraction(
    State(state): State<AppState>,
    Json(request): Json<ExtractionRequest>,
) -> Result<(StatusCode, Json<StartedResponse>), ApiError> {
    let job_id = state
        .extraction_service
        .start_extraction(request)
        .await
        .map_err(api_error)?;

    Ok((StatusCode::ACCEPTED, Json(StartedResponse { job_id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/extractions/{id}",
    tag = "irradiance",
    params(("id" = u64, Path, description = "Extraction job id")),
    responses(
        (status = 200, description = "Job status and progress", body = JobSummary),
        (status = 404, description = "Unknown job", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_extraction(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<JobSummary>, ApiError> {
    let job = state.extraction_service.job(id).await.map_err(api_error)?;
    Ok(Json(job.summary()))
}

#[utoipa::path(
    get,
    path = "/api/v1/extractions/{id}/samples",
    tag = "irradiance",
    params(("id" = u64, Path, description = "Extraction job id")),
    responses(
        (status = 200, description = "Collected samples", body = SampleTable),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job still running", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_samples(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<SampleTable>, ApiError> {
    let table = state.extraction_service.table(id).await.map_err(api_error)?;
    info!("Returning {} samples for job {}", table.len(), id);
    Ok(Json(table.as_ref().clone()))
}

#[utoipa::path(
    get,
    path = "/api/v1/extractions/{id}/export.csv",
    tag = "irradiance",
    params(("id" = u64, Path, description = "Extraction job id")),
    responses(
        (status = 200, description = "CSV download", content_type = "text/csv", body = String),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job still running", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn export_csv(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    download(&state, id, ExportFormat::Csv).await
}

#[utoipa::path(
    get,
    path = "/api/v1/extractions/{id}/export.xlsx",
    tag = "irradiance",
    params(("id" = u64, Path, description = "Extraction job id")),
    responses(
        (status = 200, description = "Spreadsheet download",
            content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            body = Vec<u8>),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job still running", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn export_xlsx(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    download(&state, id, ExportFormat::Xlsx).await
}

async fn download(state: &AppState, id: u64, format: ExportFormat) -> Result<Response, ApiError> {
    let bytes = state
        .extraction_service
        .export(id, format)
        .await
        .map_err(api_error)?;

    let (content_type, filename) = match format {
        ExportFormat::Csv => ("text/csv", CSV_FILENAME),
        ExportFormat::Xlsx => (
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            XLSX_FILENAME,
        ),
    };
    debug!("Serving {} ({} bytes) for job {}", filename, bytes.len(), id);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/extractions/{id}/chart.svg",
    tag = "irradiance",
    params(("id" = u64, Path, description = "Extraction job id")),
    responses(
        (status = 200, description = "Hourly irradiance line chart", content_type = "image/svg+xml", body = String),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 409, description = "Job still running", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn chart_svg(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Response, ApiError> {
    let svg = state
        .extraction_service
        .chart_svg(id)
        .await
        .map_err(api_error)?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}
