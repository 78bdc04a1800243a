//! Request handlers for the HTTP surface in spec.md §6. Grounded on
//! `backend/app.py` in the original source for response shapes (`state` is
//! the run lifecycle status, `status` is the solver status — kept distinct
//! on purpose, matching the original's Flask response).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use fjsm_model::{FjsmError, Lock, TaskMode};
use fjsm_ports::Backend;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Task names the document/relational order stores accept, carried over
/// unchanged from the original input form (`postgresql_order_writer_adapter.py`'s
/// docstring): cut, engrave, bend, side-mill.
const JOB_TYPES: &[&str] = &["kesme", "oyma", "bükme", "yanak_açma"];

#[derive(Debug, Deserialize)]
pub struct BackendQuery {
    db: Option<String>,
}

fn resolve_backend(query: &BackendQuery, headers: &HeaderMap) -> Result<Backend, ApiError> {
    if let Some(db) = &query.db {
        return Backend::from_str(db).map_err(ApiError::from);
    }
    if let Some(header) = headers.get("x-db") {
        let s = header.to_str().map_err(|_| ApiError(FjsmError::InputError("X-DB header is not valid UTF-8".into())))?;
        return Backend::from_str(s).map_err(ApiError::from);
    }
    Ok(Backend::Relational)
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    run_id: Uuid,
    db: &'static str,
}

pub async fn start(State(state): State<AppState>, Query(query): Query<BackendQuery>, headers: HeaderMap) -> Result<Json<StartResponse>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let run_id = state.coordinator.submit(backend, vec![], state.queue.as_ref()).await?;
    Ok(Json(StartResponse { run_id, db: backend.as_str() }))
}

#[derive(Debug, Deserialize)]
pub struct StartWithLocksBody {
    locks: Vec<Lock>,
}

pub async fn start_with_locks(
    State(state): State<AppState>,
    Query(query): Query<BackendQuery>,
    headers: HeaderMap,
    Json(body): Json<StartWithLocksBody>,
) -> Result<Json<StartResponse>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let run_id = state.coordinator.submit(backend, body.locks, state.queue.as_ref()).await?;
    Ok(Json(StartResponse { run_id, db: backend.as_str() }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    state: Option<&'static str>,
    makespan: Option<i64>,
    status: Option<String>,
    created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

pub async fn status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(query): Query<BackendQuery>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let metadata = state.coordinator.status(backend, run_id).await?;
    match metadata {
        Some(m) => Ok(Json(StatusResponse {
            state: Some(run_status_str(m.status)),
            makespan: m.makespan,
            status: m.solver_status,
            created_at: Some(m.created_at),
            completed_at: m.completed_at,
            error: m.error_message,
        })),
        None => Err(ApiError(FjsmError::RunNotFound { run_id })),
    }
}

fn run_status_str(status: fjsm_model::RunStatus) -> &'static str {
    status.as_db_str()
}

#[derive(Debug, Serialize)]
pub struct RecentEntry {
    id: Uuid,
    label: String,
}

pub async fn recent(State(state): State<AppState>, Query(query): Query<BackendQuery>, headers: HeaderMap) -> Result<Json<Vec<RecentEntry>>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let runs = state.coordinator.recent(backend, 10).await?;
    Ok(Json(
        runs.into_iter()
            .map(|m| RecentEntry {
                id: m.run_id,
                label: format!("{} — {}", m.run_id, run_status_str(m.status)),
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct GanttRow {
    task: String,
    start: i64,
    finish: i64,
    resource: String,
    job_id: u32,
    task_instance_id: u32,
}

pub async fn gantt(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(query): Query<BackendQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<GanttRow>>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let rows = state.coordinator.gantt(backend, run_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| GanttRow {
                task: r.task_name,
                start: r.start_time,
                finish: r.end_time,
                resource: r.assigned_machine,
                job_id: r.job_id,
                task_instance_id: r.task_instance_id,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    package_id: i64,
    job_id: u32,
    job_type: String,
    mode: String,
    phase: u32,
    count: Option<u32>,
    eligible_machines: Vec<String>,
    deadline: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    ok: bool,
    task_id: i64,
    db: &'static str,
}

fn validate_order(body: &OrderBody) -> Result<TaskMode, FjsmError> {
    if !JOB_TYPES.contains(&body.job_type.as_str()) {
        return Err(FjsmError::InputError(format!("unknown job_type '{}'", body.job_type)));
    }
    let mode = match body.mode.as_str() {
        "single" => TaskMode::Single,
        "split" => TaskMode::Split,
        other => return Err(FjsmError::InputError(format!("mode must be 'single' or 'split', got '{other}'"))),
    };
    if body.phase < 1 {
        return Err(FjsmError::InputError("phase must be >= 1".into()));
    }
    if mode == TaskMode::Split && body.count.unwrap_or(0) < 1 {
        return Err(FjsmError::InputError("split mode requires count >= 1".into()));
    }
    Ok(mode)
}

pub async fn create_order(
    State(state): State<AppState>,
    Query(query): Query<BackendQuery>,
    headers: HeaderMap,
    Json(body): Json<OrderBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let backend = resolve_backend(&query, &headers)?;
    let mode = validate_order(&body).map_err(ApiError::from)?;

    let task_id = state
        .coordinator
        .order_sink(backend)
        .append_task(body.package_id, body.job_id, body.job_type, mode, body.phase, body.count, body.eligible_machines, body.deadline)
        .await?;

    Ok(Json(OrderResponse { ok: true, task_id, db: backend.as_str() }))
}
