use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::expenses::STATE_PAYMENT_PROCESSING;
use crate::models::{Expense, ExpenseGroup, SourceCredential, TaskLog, WorkspaceGeneralSettings};
use crate::routing;
use crate::schema::{
    expense_group_expenses, expense_groups, expenses, source_credentials,
    workspace_general_settings,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateGroupsRequest {
    pub task_log_id: Uuid,
    #[serde(default)]
    pub state: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ExpenseGroupResponse {
    pub id: Uuid,
    pub fund_source: String,
    pub description: Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize)]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub source_expense_id: String,
    pub employee_email: String,
    pub category: Option<String>,
    pub report_id: String,
    pub fund_source: String,
    pub reimbursable: bool,
    pub state: String,
    pub amount: f64,
    pub currency: String,
    pub expense_updated_at: NaiveDateTime,
}

#[derive(Serialize)]
pub struct TaskLogResponse {
    pub id: Uuid,
    pub task_type: String,
    pub status: String,
    pub detail: Value,
    pub expense_group_id: Option<Uuid>,
}

impl From<ExpenseGroup> for ExpenseGroupResponse {
    fn from(group: ExpenseGroup) -> Self {
        Self {
            id: group.id,
            fund_source: group.fund_source,
            description: group.description,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

impl From<Expense> for ExpenseResponse {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id,
            source_expense_id: expense.source_expense_id,
            employee_email: expense.employee_email,
            category: expense.category,
            report_id: expense.report_id,
            fund_source: expense.fund_source,
            reimbursable: expense.reimbursable,
            state: expense.state,
            amount: expense.amount,
            currency: expense.currency,
            expense_updated_at: expense.expense_updated_at,
        }
    }
}

impl From<TaskLog> for TaskLogResponse {
    fn from(log: TaskLog) -> Self {
        Self {
            id: log.id,
            task_type: log.task_type,
            status: log.status,
            detail: log.detail,
            expense_group_id: log.expense_group_id,
        }
    }
}

pub async fn list_expense_groups(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ExpenseGroupResponse>>> {
    let mut conn = state.db()?;

    let groups: Vec<ExpenseGroup> = match query.state.as_deref().unwrap_or("ALL") {
        "ALL" => expense_groups::table
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .order(expense_groups::updated_at.desc())
            .load(&mut conn)?,
        "READY" => {
            let ids = routing::ready_group_ids(&mut conn, workspace_id)?;
            expense_groups::table
                .filter(expense_groups::id.eq_any(ids))
                .order(expense_groups::updated_at.desc())
                .load(&mut conn)?
        }
        "COMPLETE" => {
            let settings = load_settings(&mut conn, workspace_id)?;
            let ids = routing::complete_group_ids(&mut conn, &settings)?;
            expense_groups::table
                .filter(expense_groups::id.eq_any(ids))
                .order(expense_groups::updated_at.desc())
                .load(&mut conn)?
        }
        other => {
            return Err(AppError::bad_request(format!(
                "unknown expense group state filter '{other}'"
            )))
        }
    };

    Ok(Json(groups.into_iter().map(Into::into).collect()))
}

pub async fn create_expense_groups(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateGroupsRequest>,
) -> AppResult<Json<TaskLogResponse>> {
    let mut conn = state.db()?;

    let settings = load_settings(&mut conn, workspace_id)?;
    let fund_sources = routing::fund_sources_for(&settings);

    let credential: Option<SourceCredential> = source_credentials::table
        .filter(source_credentials::workspace_id.eq(workspace_id))
        .first(&mut conn)
        .optional()?;
    let Some(credential) = credential else {
        return Err(AppError::bad_request(
            "Source credentials not found in workspace",
        ));
    };
    let client = state.spend.connect(&credential.refresh_token);

    let states = payload
        .state
        .unwrap_or_else(|| vec![STATE_PAYMENT_PROCESSING.to_string()]);

    let task_log = crate::expenses::create_expense_groups(
        client.as_ref(),
        &mut conn,
        workspace_id,
        &states,
        &fund_sources,
        payload.task_log_id,
    )
    .await?;

    Ok(Json(task_log.into()))
}

pub async fn get_expense_group(
    State(state): State<AppState>,
    Path((workspace_id, expense_group_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ExpenseGroupResponse>> {
    let mut conn = state.db()?;
    let group = find_group(&mut conn, workspace_id, expense_group_id)?;
    Ok(Json(group.into()))
}

pub async fn list_group_expenses(
    State(state): State<AppState>,
    Path((workspace_id, expense_group_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<ExpenseResponse>>> {
    let mut conn = state.db()?;
    let group = find_group(&mut conn, workspace_id, expense_group_id)?;

    let members: Vec<Expense> = expense_group_expenses::table
        .inner_join(expenses::table)
        .filter(expense_group_expenses::expense_group_id.eq(group.id))
        .select(expenses::all_columns)
        .order(expenses::updated_at.desc())
        .load(&mut conn)?;

    Ok(Json(members.into_iter().map(Into::into).collect()))
}

fn find_group(
    conn: &mut diesel::pg::PgConnection,
    workspace_id: Uuid,
    expense_group_id: Uuid,
) -> AppResult<ExpenseGroup> {
    expense_groups::table
        .filter(expense_groups::workspace_id.eq(workspace_id))
        .filter(expense_groups::id.eq(expense_group_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("Expense group not found"))
}

pub(super) fn load_settings(
    conn: &mut diesel::pg::PgConnection,
    workspace_id: Uuid,
) -> AppResult<WorkspaceGeneralSettings> {
    workspace_general_settings::table
        .filter(workspace_general_settings::workspace_id.eq(workspace_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("General settings not found in workspace"))
}
