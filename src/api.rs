//! Job-lifecycle HTTP surface (spec.md §6's `/optimize/jobs*` and
//! `/validate` routes only — schedule/driver/vehicle/trip CRUD are external
//! collaborators this crate does not implement). A thin router-plus-handlers
//! split: one state extractor, one handler per route, errors mapped once.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adr;
use crate::cpsat::types::ProgressReport;
use crate::cpsat::SolverLimits;
use crate::error::{CoreError, Warning};
use crate::job::{InMemoryPlanSink, JobController, JobId, JobStatus, Pipeline, StartRequest};
use crate::materialize::MaterializedPlan;
use crate::model::{Driver, DriverWorkLog, FleetSnapshot, Schedule};
use crate::resolver::AvailabilityOverride;

/// Shared application state: one job controller per process, backed by the
/// in-memory [`InMemoryPlanSink`] (a real store adapter is out of scope).
pub struct AppState {
    pub controller: JobController<InMemoryPlanSink>,
    pub default_limits: SolverLimits,
}

impl AppState {
    pub fn new(controller: JobController<InMemoryPlanSink>, default_limits: SolverLimits) -> Self {
        Self {
            controller,
            default_limits,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/optimize/jobs", post(start_job))
        .route("/optimize/jobs/{id}", get(get_job))
        .route("/optimize/jobs/{id}/stop", post(stop_job))
        .route("/validate", post(validate_plan))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, addr: std::net::SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub snapshot: FleetSnapshot,
    pub schedule: Schedule,
    #[serde(default)]
    pub availability_override: Option<AvailabilityOverride>,
    #[serde(default)]
    pub pipeline: Pipeline,
    pub time_limit_seconds: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: JobId,
}

/// `POST /schedules/{id}/optimize/jobs` (spec.md §6), generalised to take a
/// snapshot directly since schedule storage is an external collaborator.
async fn start_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartJobRequest>,
) -> Result<Json<StartJobResponse>, ApiError> {
    let mut limits = state.default_limits;
    if let Some(seconds) = request.time_limit_seconds {
        limits.time_limit_seconds = seconds;
    }
    let job_id = state.controller.start(StartRequest {
        snapshot: request.snapshot,
        schedule: request.schedule,
        availability_override: request.availability_override,
        pipeline: request.pipeline,
        limits,
    })?;
    Ok(Json(StartJobResponse { job_id }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MaterializedPlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /schedules/{id}/optimize/jobs/{jobId}` (spec.md §6).
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let view = state
        .controller
        .get(id)
        .ok_or_else(|| ApiError(CoreError::JobNotFound(id.to_string())))?;
    Ok(Json(JobStatusResponse {
        status: view.status,
        progress: view.progress,
        result: view.result,
        warnings: view.warnings,
        error: view.error,
    }))
}

#[derive(Debug, Serialize)]
pub struct StopJobResponse {
    pub acknowledged: bool,
}

/// `POST /schedules/{id}/optimize/jobs/{jobId}/stop` (spec.md §6).
async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StopJobResponse>, ApiError> {
    state.controller.stop(id)?;
    Ok(Json(StopJobResponse { acknowledged: true }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub plan: MaterializedPlan,
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub work_logs: Vec<DriverWorkLog>,
}

/// `POST /schedules/{id}/validate` (spec.md §6, §4.7): ADR validation only,
/// no persistence or state transition.
async fn validate_plan(
    State(_state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Json<adr::AdrReport> {
    let limits = crate::config::DrivingLimitsConfig::default();
    Json(adr::validate(
        &request.plan,
        &request.drivers,
        &request.work_logs,
        &limits,
    ))
}

/// Wraps [`CoreError`] so handlers can return it directly via `?`.
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::InputInvalid(_) => StatusCode::BAD_REQUEST,
            CoreError::JobNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::JobAlreadyRunning => StatusCode::CONFLICT,
            CoreError::SolverInfeasible
            | CoreError::SolverTimeoutNoPlan
            | CoreError::MaterialisationMismatch(_)
            | CoreError::AdrViolation => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::TransientIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
