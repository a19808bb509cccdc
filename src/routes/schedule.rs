use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::WorkspaceSchedule;
use crate::schedule::{run_sync_schedule, schedule_sync};
use crate::state::AppState;

use super::expense_groups::TaskLogResponse;

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub enabled: bool,
    pub interval_hours: i32,
    pub next_run: String,
    #[serde(default = "default_user")]
    pub user: String,
}

#[derive(Deserialize)]
pub struct TriggerRequest {
    #[serde(default = "default_user")]
    pub user: String,
}

impl Default for TriggerRequest {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

fn default_user() -> String {
    "system".to_string()
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub enabled: bool,
    pub interval_hours: i32,
    pub start_datetime: NaiveDateTime,
    pub remote_job_id: Option<String>,
}

impl From<WorkspaceSchedule> for ScheduleResponse {
    fn from(schedule: WorkspaceSchedule) -> Self {
        Self {
            id: schedule.id,
            enabled: schedule.enabled,
            interval_hours: schedule.interval_hours,
            start_datetime: schedule.start_datetime,
            remote_job_id: schedule.remote_job_id,
        }
    }
}

pub async fn upsert_schedule(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<ScheduleRequest>,
) -> AppResult<Json<ScheduleResponse>> {
    let mut conn = state.db()?;
    let schedule = schedule_sync(
        &mut conn,
        state.scheduler.as_ref(),
        &state.config.api_url,
        workspace_id,
        payload.enabled,
        payload.interval_hours,
        &payload.next_run,
        &payload.user,
    )
    .await?;
    Ok(Json(schedule.into()))
}

pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    payload: Option<Json<TriggerRequest>>,
) -> AppResult<Json<TaskLogResponse>> {
    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let mut conn = state.db()?;
    let task_log = run_sync_schedule(
        state.spend.as_ref(),
        &mut conn,
        workspace_id,
        &payload.user,
    )
    .await?;
    Ok(Json(task_log.into()))
}
