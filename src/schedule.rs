use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::documents::{
    schedule_bills_creation, schedule_checks_creation, schedule_credit_card_purchases_creation,
    schedule_journal_entries_creation,
};
use crate::error::{SyncError, SyncResult};
use crate::expenses::{create_expense_groups, STATE_PAYMENT_PROCESSING};
use crate::models::{
    NewWorkspaceSchedule, SourceCredential, TaskLog, WorkspaceGeneralSettings, WorkspaceSchedule,
};
use crate::routing::{self, DocumentType};
use crate::scheduler::{IntervalJobRequest, RemoteScheduler};
use crate::schema::{
    expense_groups, source_credentials, workspace_general_settings, workspace_schedules,
};
use crate::spend::SpendConnector;
use crate::tasks;

pub const NEXT_RUN_FORMAT: &str = "%Y-%m-%dT%H:%M:00.000Z";
const REMOTE_START_FORMAT: &str = "%Y-%m-%d %H:%M:00.00";

/// Parses the schedule start timestamp. Only on-the-minute values are
/// accepted, so the stored row and the remote payload (which renders seconds
/// as zero) can never disagree. Validation happens before any row is touched
/// or any remote call is made; a malformed value aborts the whole schedule
/// update.
pub fn parse_next_run(raw: &str) -> SyncResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, NEXT_RUN_FORMAT)
        .map_err(|err| SyncError::Format(format!("malformed schedule timestamp '{raw}': {err}")))
}

pub fn callback_url(api_url: &str, workspace_id: Uuid) -> String {
    format!(
        "{}/workspaces/{}/schedule/trigger/",
        api_url.trim_end_matches('/'),
        workspace_id
    )
}

/// The description shows up in the remote scheduler's UI; it names the
/// workspace and the requesting user so operators can trace a job back.
pub fn job_description(workspace_id: Uuid, user: &str) -> String {
    format!("Fetch expenses: workspace id - {workspace_id}, user - {user}")
}

fn interval_job_request(
    api_url: &str,
    workspace_id: Uuid,
    schedule_id: Uuid,
    user: &str,
    start_datetime: NaiveDateTime,
    hours: i32,
) -> IntervalJobRequest {
    IntervalJobRequest {
        callback_url: callback_url(api_url, workspace_id),
        callback_method: "POST".to_string(),
        object_id: schedule_id.to_string(),
        description: job_description(workspace_id, user),
        start_datetime: start_datetime.format(REMOTE_START_FORMAT).to_string(),
        hours,
    }
}

/// Creates or updates the workspace's recurring sync schedule.
///
/// State machine over (has schedule, enabled):
/// - no schedule + enable: insert the row, register a remote job, store its id
/// - existing schedule + enable: delete the prior remote job if one is stored,
///   register a fresh one, store the new id
/// - existing schedule + disable: delete the prior remote job if stored,
///   clear the stored id
///
/// Every path that sets `remote_job_id` persists the row before returning.
/// The remote create and the local persist are not one transaction; a crash
/// between the two orphans the remote job. That gap is accepted, not papered
/// over with reconciliation.
///
/// Concurrent updates for the same workspace are serialized with a session
/// advisory lock held across the remote calls, so the job id read at the top
/// is still the stored one when the row is rewritten.
pub async fn schedule_sync(
    conn: &mut PgConnection,
    scheduler: &dyn RemoteScheduler,
    api_url: &str,
    workspace_id: Uuid,
    enabled: bool,
    interval_hours: i32,
    next_run: &str,
    user: &str,
) -> SyncResult<WorkspaceSchedule> {
    let start_datetime = parse_next_run(next_run)?;

    acquire_workspace_lock(conn, workspace_id)?;
    let result = apply_schedule(
        conn,
        scheduler,
        api_url,
        workspace_id,
        enabled,
        interval_hours,
        start_datetime,
        user,
    )
    .await;
    release_workspace_lock(conn, workspace_id)?;
    result
}

#[allow(clippy::too_many_arguments)]
async fn apply_schedule(
    conn: &mut PgConnection,
    scheduler: &dyn RemoteScheduler,
    api_url: &str,
    workspace_id: Uuid,
    enabled: bool,
    interval_hours: i32,
    start_datetime: NaiveDateTime,
    user: &str,
) -> SyncResult<WorkspaceSchedule> {
    let existing: Option<WorkspaceSchedule> = workspace_schedules::table
        .filter(workspace_schedules::workspace_id.eq(workspace_id))
        .first(conn)
        .optional()?;

    match existing {
        None => {
            let new_schedule = NewWorkspaceSchedule {
                id: Uuid::new_v4(),
                workspace_id,
                enabled,
                interval_hours,
                start_datetime,
                remote_job_id: None,
            };
            diesel::insert_into(workspace_schedules::table)
                .values(&new_schedule)
                .execute(conn)?;

            if enabled {
                let job = scheduler
                    .trigger_interval(&interval_job_request(
                        api_url,
                        workspace_id,
                        new_schedule.id,
                        user,
                        start_datetime,
                        interval_hours,
                    ))
                    .await?;
                info!(%workspace_id, job_id = %job.id, "registered remote sync job");
                store_remote_job_id(conn, new_schedule.id, Some(&job.id))?;
            }

            Ok(workspace_schedules::table.find(new_schedule.id).first(conn)?)
        }
        Some(schedule) => {
            if let Some(job_id) = schedule.remote_job_id.as_deref() {
                scheduler.delete_job(job_id).await?;
            }

            let new_job_id = if enabled {
                let job = scheduler
                    .trigger_interval(&interval_job_request(
                        api_url,
                        workspace_id,
                        schedule.id,
                        user,
                        start_datetime,
                        interval_hours,
                    ))
                    .await?;
                info!(%workspace_id, job_id = %job.id, "replaced remote sync job");
                Some(job.id)
            } else {
                info!(%workspace_id, "disabled workspace sync schedule");
                None
            };

            diesel::update(workspace_schedules::table.find(schedule.id))
                .set((
                    workspace_schedules::enabled.eq(enabled),
                    workspace_schedules::interval_hours.eq(interval_hours),
                    workspace_schedules::start_datetime.eq(start_datetime),
                    workspace_schedules::remote_job_id.eq(new_job_id),
                    workspace_schedules::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            Ok(workspace_schedules::table.find(schedule.id).first(conn)?)
        }
    }
}

fn acquire_workspace_lock(conn: &mut PgConnection, workspace_id: Uuid) -> QueryResult<()> {
    diesel::sql_query("SELECT pg_advisory_lock(hashtextextended($1, 0))")
        .bind::<diesel::sql_types::Text, _>(workspace_id.to_string())
        .execute(conn)?;
    Ok(())
}

fn release_workspace_lock(conn: &mut PgConnection, workspace_id: Uuid) -> QueryResult<()> {
    diesel::sql_query("SELECT pg_advisory_unlock(hashtextextended($1, 0))")
        .bind::<diesel::sql_types::Text, _>(workspace_id.to_string())
        .execute(conn)?;
    Ok(())
}

fn store_remote_job_id(
    conn: &mut PgConnection,
    schedule_id: Uuid,
    job_id: Option<&str>,
) -> QueryResult<()> {
    diesel::update(workspace_schedules::table.find(schedule_id))
        .set((
            workspace_schedules::remote_job_id.eq(job_id),
            workspace_schedules::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

/// One end-to-end sync cycle for a workspace: fetch, group, route, dispatch.
/// The task log created up front always reaches a terminal status; any error
/// after creation is captured into it instead of propagating.
pub async fn run_sync_schedule(
    spend: &dyn SpendConnector,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    user: &str,
) -> SyncResult<TaskLog> {
    let task_log = tasks::create_task_log(conn, workspace_id, tasks::TASK_FETCHING_EXPENSES, None)?;
    info!(%workspace_id, %user, task_log_id = %task_log.id, "starting scheduled sync run");

    match sync_run(spend, conn, workspace_id, task_log.id).await {
        Ok(log) => Ok(log),
        Err(err) => Ok(tasks::mark_task_failed(conn, task_log.id, &err.to_string())?),
    }
}

async fn sync_run(
    spend: &dyn SpendConnector,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    task_log_id: Uuid,
) -> SyncResult<TaskLog> {
    let settings: WorkspaceGeneralSettings = workspace_general_settings::table
        .filter(workspace_general_settings::workspace_id.eq(workspace_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            SyncError::NotFound(format!("general settings for workspace {workspace_id}"))
        })?;

    if settings.reimbursable_expenses_object.is_none()
        && settings.corporate_credit_card_expenses_object.is_none()
    {
        return Err(SyncError::Configuration(
            "workspace has no accounting document types configured".to_string(),
        ));
    }

    let credentials: SourceCredential = source_credentials::table
        .filter(source_credentials::workspace_id.eq(workspace_id))
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            SyncError::NotFound(format!("source credentials for workspace {workspace_id}"))
        })?;

    let fund_sources = routing::fund_sources_for(&settings);
    let client = spend.connect(&credentials.refresh_token);
    let task_log = create_expense_groups(
        client.as_ref(),
        conn,
        workspace_id,
        &[STATE_PAYMENT_PROCESSING.to_string()],
        &fund_sources,
        task_log_id,
    )
    .await?;

    if task_log.status != tasks::STATUS_COMPLETE {
        return Ok(task_log);
    }

    // Only unposted groups are dispatched; posted groups already hold their
    // one document.
    let ready_ids = routing::ready_group_ids(conn, workspace_id)?;
    let ready: Vec<(Uuid, String)> = expense_groups::table
        .filter(expense_groups::id.eq_any(&ready_ids))
        .select((expense_groups::id, expense_groups::fund_source))
        .load(conn)?;

    for fund_source in fund_sources {
        let Some(document_type) = routing::route(&settings, fund_source)? else {
            // A workspace may sync metadata without posting this fund source.
            continue;
        };

        let group_ids: Vec<Uuid> = ready
            .iter()
            .filter(|(_, source)| source == fund_source.as_str())
            .map(|(id, _)| *id)
            .collect();
        if group_ids.is_empty() {
            continue;
        }

        info!(
            %workspace_id,
            fund_source = fund_source.as_str(),
            document_type = document_type.as_str(),
            groups = group_ids.len(),
            "dispatching document creation"
        );
        match document_type {
            DocumentType::Bill => schedule_bills_creation(conn, workspace_id, &group_ids)?,
            DocumentType::Check => schedule_checks_creation(conn, workspace_id, &group_ids)?,
            DocumentType::JournalEntry => {
                schedule_journal_entries_creation(conn, workspace_id, &group_ids)?
            }
            DocumentType::CreditCardPurchase => {
                schedule_credit_card_purchases_creation(conn, workspace_id, &group_ids)?
            }
        };
    }

    Ok(task_log)
}
