use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{
    schedule_bills_creation, schedule_checks_creation, schedule_credit_card_purchases_creation,
    schedule_journal_entries_creation,
};
use crate::error::AppResult;
use crate::routing::{self, DocumentType, FundSource};
use crate::schema::{bills, checks, credit_card_purchases, expense_groups, journal_entries};
use crate::state::AppState;

use super::expense_groups::{load_settings, TaskLogResponse};

#[derive(Deserialize)]
pub struct CreateDocumentsRequest {
    pub expense_group_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Queryable)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
}

pub async fn list_bills(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows = list_documents(&mut conn, workspace_id, DocumentType::Bill)?;
    Ok(Json(rows))
}

pub async fn list_checks(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows = list_documents(&mut conn, workspace_id, DocumentType::Check)?;
    Ok(Json(rows))
}

pub async fn list_journal_entries(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows = list_documents(&mut conn, workspace_id, DocumentType::JournalEntry)?;
    Ok(Json(rows))
}

pub async fn list_credit_card_purchases(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows = list_documents(&mut conn, workspace_id, DocumentType::CreditCardPurchase)?;
    Ok(Json(rows))
}

pub async fn create_bills(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateDocumentsRequest>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    let mut conn = state.db()?;
    let logs = schedule_bills_creation(&mut conn, workspace_id, &payload.expense_group_ids)?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn create_checks(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateDocumentsRequest>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    let mut conn = state.db()?;
    let logs = schedule_checks_creation(&mut conn, workspace_id, &payload.expense_group_ids)?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn create_journal_entries(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateDocumentsRequest>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    let mut conn = state.db()?;
    let logs =
        schedule_journal_entries_creation(&mut conn, workspace_id, &payload.expense_group_ids)?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn create_credit_card_purchases(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateDocumentsRequest>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    let mut conn = state.db()?;
    let logs = schedule_credit_card_purchases_creation(
        &mut conn,
        workspace_id,
        &payload.expense_group_ids,
    )?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

pub async fn trigger_bills(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    trigger_documents(state, workspace_id, DocumentType::Bill).await
}

pub async fn trigger_checks(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    trigger_documents(state, workspace_id, DocumentType::Check).await
}

pub async fn trigger_journal_entries(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    trigger_documents(state, workspace_id, DocumentType::JournalEntry).await
}

pub async fn trigger_credit_card_purchases(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    trigger_documents(state, workspace_id, DocumentType::CreditCardPurchase).await
}

/// Creates documents of the given type for every unposted group whose fund
/// source routes to that type under the workspace configuration.
async fn trigger_documents(
    state: AppState,
    workspace_id: Uuid,
    document_type: DocumentType,
) -> AppResult<Json<Vec<TaskLogResponse>>> {
    let mut conn = state.db()?;
    let settings = load_settings(&mut conn, workspace_id)?;

    let ready_ids = routing::ready_group_ids(&mut conn, workspace_id)?;
    let ready: Vec<(Uuid, String)> = expense_groups::table
        .filter(expense_groups::id.eq_any(&ready_ids))
        .select((expense_groups::id, expense_groups::fund_source))
        .load(&mut conn)?;

    let mut group_ids = Vec::new();
    for fund_source in [FundSource::Personal, FundSource::Ccc] {
        if routing::route(&settings, fund_source)? == Some(document_type) {
            group_ids.extend(
                ready
                    .iter()
                    .filter(|(_, source)| source == fund_source.as_str())
                    .map(|(id, _)| *id),
            );
        }
    }

    let logs = match document_type {
        DocumentType::Bill => schedule_bills_creation(&mut conn, workspace_id, &group_ids)?,
        DocumentType::Check => schedule_checks_creation(&mut conn, workspace_id, &group_ids)?,
        DocumentType::JournalEntry => {
            schedule_journal_entries_creation(&mut conn, workspace_id, &group_ids)?
        }
        DocumentType::CreditCardPurchase => {
            schedule_credit_card_purchases_creation(&mut conn, workspace_id, &group_ids)?
        }
    };

    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

fn list_documents(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    document_type: DocumentType,
) -> AppResult<Vec<DocumentResponse>> {
    let rows = match document_type {
        DocumentType::Bill => bills::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select((
                bills::id,
                bills::expense_group_id,
                bills::transaction_date,
                bills::currency,
                bills::total_amount,
            ))
            .order(bills::created_at.desc())
            .load(conn)?,
        DocumentType::Check => checks::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select((
                checks::id,
                checks::expense_group_id,
                checks::transaction_date,
                checks::currency,
                checks::total_amount,
            ))
            .order(checks::created_at.desc())
            .load(conn)?,
        DocumentType::JournalEntry => journal_entries::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select((
                journal_entries::id,
                journal_entries::expense_group_id,
                journal_entries::transaction_date,
                journal_entries::currency,
                journal_entries::total_amount,
            ))
            .order(journal_entries::created_at.desc())
            .load(conn)?,
        DocumentType::CreditCardPurchase => credit_card_purchases::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select((
                credit_card_purchases::id,
                credit_card_purchases::expense_group_id,
                credit_card_purchases::transaction_date,
                credit_card_purchases::currency,
                credit_card_purchases::total_amount,
            ))
            .order(credit_card_purchases::created_at.desc())
            .load(conn)?,
    };
    Ok(rows)
}
