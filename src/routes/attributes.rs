use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::attributes::{sync_categories, sync_cost_centers, sync_employees, sync_projects};
use crate::error::{AppError, AppResult};
use crate::models::SourceCredential;
use crate::schema::source_credentials;
use crate::spend::{SourceCategory, SourceCostCenter, SourceEmployee, SourceProject, SpendPlatform};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ActiveOnlyQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Serialize)]
pub struct AttributeSyncSummary {
    pub employees: usize,
    pub categories: usize,
    pub cost_centers: usize,
    pub projects: usize,
}

/// Builds a credential-scoped source platform client for the workspace, or a
/// 400 when no credential has been stored yet.
fn connect(
    state: &AppState,
    conn: &mut PgConnection,
    workspace_id: Uuid,
) -> AppResult<Arc<dyn SpendPlatform>> {
    let credential: Option<SourceCredential> = source_credentials::table
        .filter(source_credentials::workspace_id.eq(workspace_id))
        .first(conn)
        .optional()?;

    match credential {
        Some(credential) => Ok(state.spend.connect(&credential.refresh_token)),
        None => Err(AppError::bad_request(
            "Source credentials not found in workspace",
        )),
    }
}

pub async fn employee_profile(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;
    Ok(Json(client.get_employee_profile().await?))
}

pub async fn list_employees(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<SourceEmployee>>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;
    Ok(Json(client.list_employees().await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ActiveOnlyQuery>,
) -> AppResult<Json<Vec<SourceCategory>>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;
    Ok(Json(client.list_categories(query.active_only).await?))
}

pub async fn list_cost_centers(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ActiveOnlyQuery>,
) -> AppResult<Json<Vec<SourceCostCenter>>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;
    Ok(Json(client.list_cost_centers(query.active_only).await?))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ActiveOnlyQuery>,
) -> AppResult<Json<Vec<SourceProject>>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;
    Ok(Json(client.list_projects(query.active_only).await?))
}

/// Imports all four reference lists into the workspace attribute store.
pub async fn sync_attributes(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ActiveOnlyQuery>,
) -> AppResult<Json<AttributeSyncSummary>> {
    let mut conn = state.db()?;
    let client = connect(&state, &mut conn, workspace_id)?;

    let employees = sync_employees(client.as_ref(), &mut conn, workspace_id).await?;
    let categories =
        sync_categories(client.as_ref(), &mut conn, workspace_id, query.active_only).await?;
    let cost_centers =
        sync_cost_centers(client.as_ref(), &mut conn, workspace_id, query.active_only).await?;
    let projects =
        sync_projects(client.as_ref(), &mut conn, workspace_id, query.active_only).await?;

    Ok(Json(AttributeSyncSummary {
        employees,
        categories,
        cost_centers,
        projects,
    }))
}
