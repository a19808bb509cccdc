use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{NewTaskLog, TaskLog};
use crate::schema::task_logs;

pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_FAILED: &str = "FAILED";

pub const TASK_FETCHING_EXPENSES: &str = "FETCHING_EXPENSES";
pub const TASK_CREATING_BILLS: &str = "CREATING_BILLS";
pub const TASK_CREATING_CHECKS: &str = "CREATING_CHECKS";
pub const TASK_CREATING_JOURNAL_ENTRIES: &str = "CREATING_JOURNAL_ENTRIES";
pub const TASK_CREATING_CREDIT_CARD_PURCHASES: &str = "CREATING_CREDIT_CARD_PURCHASES";

/// Appends an IN_PROGRESS task log row. Every coordinated run writes one of
/// these before touching anything else, so a crash mid-run leaves evidence.
pub fn create_task_log(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    task_type: &str,
    expense_group_id: Option<Uuid>,
) -> QueryResult<TaskLog> {
    let new_log = NewTaskLog {
        id: Uuid::new_v4(),
        workspace_id,
        task_type: task_type.to_string(),
        status: STATUS_IN_PROGRESS.to_string(),
        detail: json!({}),
        expense_group_id,
    };

    diesel::insert_into(task_logs::table)
        .values(&new_log)
        .execute(conn)?;

    task_logs::table.find(new_log.id).first(conn)
}

pub fn mark_task_complete(
    conn: &mut PgConnection,
    task_log_id: Uuid,
    detail: Value,
) -> QueryResult<TaskLog> {
    set_status(conn, task_log_id, STATUS_COMPLETE, detail)
}

pub fn mark_task_failed(
    conn: &mut PgConnection,
    task_log_id: Uuid,
    error_message: &str,
) -> QueryResult<TaskLog> {
    set_status(
        conn,
        task_log_id,
        STATUS_FAILED,
        json!({ "error": error_message }),
    )
}

fn set_status(
    conn: &mut PgConnection,
    task_log_id: Uuid,
    status: &str,
    detail: Value,
) -> QueryResult<TaskLog> {
    diesel::update(task_logs::table.find(task_log_id))
        .set((
            task_logs::status.eq(status),
            task_logs::detail.eq(detail),
            task_logs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    task_logs::table.find(task_log_id).first(conn)
}
