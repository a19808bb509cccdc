use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::{
    Expense, NewBill, NewCheck, NewCreditCardPurchase, NewJournalEntry, TaskLog,
};
use crate::routing::{self, DocumentType};
use crate::schema::{
    bills, checks, credit_card_purchases, expense_group_expenses, expenses, journal_entries,
};
use crate::tasks;

pub fn schedule_bills_creation(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expense_group_ids: &[Uuid],
) -> SyncResult<Vec<TaskLog>> {
    create_documents(conn, workspace_id, expense_group_ids, DocumentType::Bill)
}

pub fn schedule_checks_creation(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expense_group_ids: &[Uuid],
) -> SyncResult<Vec<TaskLog>> {
    create_documents(conn, workspace_id, expense_group_ids, DocumentType::Check)
}

pub fn schedule_journal_entries_creation(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expense_group_ids: &[Uuid],
) -> SyncResult<Vec<TaskLog>> {
    create_documents(
        conn,
        workspace_id,
        expense_group_ids,
        DocumentType::JournalEntry,
    )
}

pub fn schedule_credit_card_purchases_creation(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expense_group_ids: &[Uuid],
) -> SyncResult<Vec<TaskLog>> {
    create_documents(
        conn,
        workspace_id,
        expense_group_ids,
        DocumentType::CreditCardPurchase,
    )
}

pub fn task_type_for(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Bill => tasks::TASK_CREATING_BILLS,
        DocumentType::Check => tasks::TASK_CREATING_CHECKS,
        DocumentType::JournalEntry => tasks::TASK_CREATING_JOURNAL_ENTRIES,
        DocumentType::CreditCardPurchase => tasks::TASK_CREATING_CREDIT_CARD_PURCHASES,
    }
}

/// Creates one document of the given type per expense group, with a task log
/// per group. Groups that already hold a posted document of any type are
/// skipped: a group links to at most one document, ever.
fn create_documents(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    expense_group_ids: &[Uuid],
    document_type: DocumentType,
) -> SyncResult<Vec<TaskLog>> {
    let ready: std::collections::BTreeSet<Uuid> =
        routing::ready_group_ids(conn, workspace_id)?.into_iter().collect();

    let mut logs = Vec::new();
    for group_id in expense_group_ids {
        if !ready.contains(group_id) {
            info!(%group_id, "expense group already posted, skipping");
            continue;
        }

        let task_log = tasks::create_task_log(
            conn,
            workspace_id,
            task_type_for(document_type),
            Some(*group_id),
        )?;

        let log = match insert_document(conn, *group_id, document_type) {
            Ok(document_id) => tasks::mark_task_complete(
                conn,
                task_log.id,
                json!({ "document_type": document_type.as_str(), "document_id": document_id }),
            )?,
            Err(err) => {
                warn!(%group_id, document_type = document_type.as_str(), error = %err, "document creation failed");
                tasks::mark_task_failed(conn, task_log.id, &err.to_string())?
            }
        };
        logs.push(log);
    }

    Ok(logs)
}

fn insert_document(
    conn: &mut PgConnection,
    expense_group_id: Uuid,
    document_type: DocumentType,
) -> SyncResult<Uuid> {
    let members: Vec<Expense> = expense_group_expenses::table
        .inner_join(expenses::table)
        .filter(expense_group_expenses::expense_group_id.eq(expense_group_id))
        .select(expenses::all_columns)
        .load(conn)?;

    let total_amount: f64 = members.iter().map(|expense| expense.amount).sum();
    let currency = members
        .first()
        .map(|expense| expense.currency.clone())
        .unwrap_or_else(|| "USD".to_string());
    let transaction_date = members
        .iter()
        .filter_map(|expense| expense.spent_at)
        .max()
        .map(|ts| ts.date())
        .unwrap_or_else(|| Utc::now().date_naive());

    let document_id = Uuid::new_v4();
    match document_type {
        DocumentType::Bill => {
            diesel::insert_into(bills::table)
                .values(&NewBill {
                    id: document_id,
                    expense_group_id,
                    transaction_date,
                    currency,
                    total_amount,
                })
                .execute(conn)?;
        }
        DocumentType::Check => {
            diesel::insert_into(checks::table)
                .values(&NewCheck {
                    id: document_id,
                    expense_group_id,
                    transaction_date,
                    currency,
                    total_amount,
                })
                .execute(conn)?;
        }
        DocumentType::JournalEntry => {
            diesel::insert_into(journal_entries::table)
                .values(&NewJournalEntry {
                    id: document_id,
                    expense_group_id,
                    transaction_date,
                    currency,
                    total_amount,
                })
                .execute(conn)?;
        }
        DocumentType::CreditCardPurchase => {
            diesel::insert_into(credit_card_purchases::table)
                .values(&NewCreditCardPurchase {
                    id: document_id,
                    expense_group_id,
                    transaction_date,
                    currency,
                    total_amount,
                })
                .execute(conn)?;
        }
    }

    Ok(document_id)
}
