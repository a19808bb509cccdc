use std::collections::BTreeMap;

use chrono::Utc;
use diesel::dsl::{exists, not};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::{Expense, NewExpense, NewExpenseGroup, NewExpenseGroupExpense, TaskLog};
use crate::routing::FundSource;
use crate::schema::{expense_group_expenses, expense_groups, expenses};
use crate::spend::{ExpenseQuery, SourceExpense, SpendPlatform};
use crate::tasks;

pub const STATE_PAYMENT_PROCESSING: &str = "PAYMENT_PROCESSING";

/// A batch of expenses sharing grouping criteria, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDraft {
    pub employee_email: String,
    pub report_id: String,
    pub fund_source: String,
    pub expense_ids: Vec<Uuid>,
}

/// Fetches expenses from the source platform, stores them, and batches the
/// ungrouped ones into expense groups. The given task log always ends in a
/// terminal state: COMPLETE with counts, or FAILED with the error captured
/// into its detail. Errors are recorded rather than propagated because the
/// log is the audit trail retry logic reads.
pub async fn create_expense_groups(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    states: &[String],
    fund_sources: &[FundSource],
    task_log_id: Uuid,
) -> SyncResult<TaskLog> {
    match fetch_and_group(spend, conn, workspace_id, states, fund_sources).await {
        Ok((fetched, grouped)) => {
            info!(%workspace_id, fetched, grouped, "expense group creation complete");
            Ok(tasks::mark_task_complete(
                conn,
                task_log_id,
                json!({ "expenses_fetched": fetched, "groups_created": grouped }),
            )?)
        }
        Err(err) => {
            warn!(%workspace_id, error = %err, "expense group creation failed");
            Ok(tasks::mark_task_failed(conn, task_log_id, &err.to_string())?)
        }
    }
}

async fn fetch_and_group(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    states: &[String],
    fund_sources: &[FundSource],
) -> SyncResult<(usize, usize)> {
    let query = ExpenseQuery {
        states: states.to_vec(),
        updated_at: latest_update_window(conn, workspace_id)?,
        fund_sources: fund_sources.to_vec(),
    };
    let fetched = spend.get_expenses(&query).await?;
    let fetched_count = fetched.len();

    upsert_expenses(conn, workspace_id, &fetched)?;
    let grouped = group_ungrouped_expenses(conn, workspace_id)?;

    Ok((fetched_count, grouped))
}

/// Incremental fetch window: everything updated at or after the newest
/// expense already stored. Empty on first sync.
fn latest_update_window(conn: &mut PgConnection, workspace_id: Uuid) -> QueryResult<Vec<String>> {
    let latest: Option<chrono::NaiveDateTime> = expenses::table
        .filter(expenses::workspace_id.eq(workspace_id))
        .select(diesel::dsl::max(expenses::expense_updated_at))
        .first(conn)?;

    Ok(latest
        .map(|ts| vec![format!("gte:{}", ts.format("%Y-%m-%dT%H:%M:%S"))])
        .unwrap_or_default())
}

fn upsert_expenses(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    fetched: &[SourceExpense],
) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    for source in fetched {
        let new_expense = NewExpense {
            id: Uuid::new_v4(),
            workspace_id,
            source_expense_id: source.id.clone(),
            employee_email: source.employee_email.clone(),
            category: source.category.clone(),
            project: source.project.clone(),
            cost_center: source.cost_center.clone(),
            report_id: source.report_id.clone(),
            fund_source: source.fund_source.clone(),
            reimbursable: source.reimbursable,
            state: source.state.clone(),
            amount: source.amount,
            currency: source.currency.clone(),
            spent_at: source.spent_at,
            expense_updated_at: source.updated_at,
        };
        diesel::insert_into(expenses::table)
            .values(&new_expense)
            .on_conflict((expenses::workspace_id, expenses::source_expense_id))
            .do_update()
            .set((
                expenses::state.eq(&new_expense.state),
                expenses::amount.eq(new_expense.amount),
                expenses::reimbursable.eq(new_expense.reimbursable),
                expenses::expense_updated_at.eq(new_expense.expense_updated_at),
                expenses::updated_at.eq(now),
            ))
            .execute(conn)?;
    }
    Ok(())
}

fn group_ungrouped_expenses(conn: &mut PgConnection, workspace_id: Uuid) -> QueryResult<usize> {
    let ungrouped: Vec<Expense> = expenses::table
        .filter(expenses::workspace_id.eq(workspace_id))
        .filter(not(exists(
            expense_group_expenses::table.filter(expense_group_expenses::expense_id.eq(expenses::id)),
        )))
        .load(conn)?;

    let drafts = group_expenses(&ungrouped);
    let created = drafts.len();

    for draft in drafts {
        let group = NewExpenseGroup {
            id: Uuid::new_v4(),
            workspace_id,
            fund_source: draft.fund_source.clone(),
            description: json!({
                "employee_email": draft.employee_email,
                "report_id": draft.report_id,
            }),
        };
        diesel::insert_into(expense_groups::table)
            .values(&group)
            .execute(conn)?;

        let memberships: Vec<NewExpenseGroupExpense> = draft
            .expense_ids
            .iter()
            .map(|expense_id| NewExpenseGroupExpense {
                expense_group_id: group.id,
                expense_id: *expense_id,
            })
            .collect();
        diesel::insert_into(expense_group_expenses::table)
            .values(&memberships)
            .execute(conn)?;
    }

    Ok(created)
}

/// Batches expenses by `(employee, report, fund source)`. Deterministic
/// output order.
pub fn group_expenses(ungrouped: &[Expense]) -> Vec<GroupDraft> {
    let mut buckets: BTreeMap<(String, String, String), Vec<Uuid>> = BTreeMap::new();
    for expense in ungrouped {
        buckets
            .entry((
                expense.employee_email.clone(),
                expense.report_id.clone(),
                expense.fund_source.clone(),
            ))
            .or_default()
            .push(expense.id);
    }

    buckets
        .into_iter()
        .map(
            |((employee_email, report_id, fund_source), expense_ids)| GroupDraft {
                employee_email,
                report_id,
                fund_source,
                expense_ids,
            },
        )
        .collect()
}
