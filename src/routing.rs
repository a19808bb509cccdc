use std::collections::BTreeSet;

use diesel::dsl::{exists, not};
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::WorkspaceGeneralSettings;
use crate::schema::{bills, checks, credit_card_purchases, expense_groups, journal_entries};

/// Who paid for an expense: the employee (reimbursable path) or a corporate
/// credit card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FundSource {
    Personal,
    Ccc,
}

impl FundSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundSource::Personal => "PERSONAL",
            FundSource::Ccc => "CCC",
        }
    }

    pub fn parse(raw: &str) -> SyncResult<Self> {
        match raw {
            "PERSONAL" => Ok(FundSource::Personal),
            "CCC" => Ok(FundSource::Ccc),
            other => Err(SyncError::Configuration(format!(
                "unrecognized fund source '{other}'"
            ))),
        }
    }
}

/// The four accounting document types an expense group can post as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentType {
    Bill,
    Check,
    JournalEntry,
    CreditCardPurchase,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Bill => "BILL",
            DocumentType::Check => "CHECK",
            DocumentType::JournalEntry => "JOURNAL ENTRY",
            DocumentType::CreditCardPurchase => "CREDIT CARD PURCHASE",
        }
    }

    pub fn parse(raw: &str) -> SyncResult<Self> {
        match raw {
            "BILL" => Ok(DocumentType::Bill),
            "CHECK" => Ok(DocumentType::Check),
            "JOURNAL ENTRY" => Ok(DocumentType::JournalEntry),
            "CREDIT CARD PURCHASE" => Ok(DocumentType::CreditCardPurchase),
            other => Err(SyncError::Configuration(format!(
                "unrecognized document type '{other}'"
            ))),
        }
    }
}

/// Resolves the document type an expense group posts as, from the workspace
/// configuration. `Ok(None)` means the workspace chose not to post this fund
/// source at all; stored text outside the valid set for the fund source is a
/// configuration error rather than a silent drop.
pub fn route(
    settings: &WorkspaceGeneralSettings,
    fund_source: FundSource,
) -> SyncResult<Option<DocumentType>> {
    match fund_source {
        FundSource::Personal => match settings.reimbursable_expenses_object.as_deref() {
            None => Ok(None),
            Some(raw) => match DocumentType::parse(raw)? {
                doc @ (DocumentType::Bill | DocumentType::Check | DocumentType::JournalEntry) => {
                    Ok(Some(doc))
                }
                DocumentType::CreditCardPurchase => Err(SyncError::Configuration(
                    "CREDIT CARD PURCHASE is not a valid reimbursable expenses object".to_string(),
                )),
            },
        },
        FundSource::Ccc => match settings.corporate_credit_card_expenses_object.as_deref() {
            None => Ok(None),
            Some(raw) => match DocumentType::parse(raw)? {
                doc @ (DocumentType::JournalEntry | DocumentType::CreditCardPurchase) => {
                    Ok(Some(doc))
                }
                DocumentType::Bill | DocumentType::Check => Err(SyncError::Configuration(format!(
                    "{raw} is not a valid corporate credit card expenses object"
                ))),
            },
        },
    }
}

/// The fund sources a sync run fetches: PERSONAL always, CCC only when a
/// corporate-card target is configured.
pub fn fund_sources_for(settings: &WorkspaceGeneralSettings) -> Vec<FundSource> {
    let mut sources = vec![FundSource::Personal];
    if settings.corporate_credit_card_expenses_object.is_some() {
        sources.push(FundSource::Ccc);
    }
    sources
}

/// Deduplicated union of group id sets, ordered for stable output.
pub fn union_group_ids<I>(parts: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = Vec<Uuid>>,
{
    let set: BTreeSet<Uuid> = parts.into_iter().flatten().collect();
    set.into_iter().collect()
}

/// Groups with no posted document in any of the four document tables.
pub fn ready_group_ids(conn: &mut PgConnection, workspace_id: Uuid) -> QueryResult<Vec<Uuid>> {
    expense_groups::table
        .filter(expense_groups::workspace_id.eq(workspace_id))
        .filter(not(exists(
            bills::table.filter(bills::expense_group_id.eq(expense_groups::id)),
        )))
        .filter(not(exists(
            checks::table.filter(checks::expense_group_id.eq(expense_groups::id)),
        )))
        .filter(not(exists(
            journal_entries::table.filter(journal_entries::expense_group_id.eq(expense_groups::id)),
        )))
        .filter(not(exists(
            credit_card_purchases::table
                .filter(credit_card_purchases::expense_group_id.eq(expense_groups::id)),
        )))
        .select(expense_groups::id)
        .load(conn)
}

/// Groups already posted under the workspace's configured document types.
/// The reimbursable-target set and the corporate-card-target set are unioned
/// with deduplication; a group can never appear twice even if both targets
/// resolve to the same document type.
pub fn complete_group_ids(
    conn: &mut PgConnection,
    settings: &WorkspaceGeneralSettings,
) -> SyncResult<Vec<Uuid>> {
    let mut parts = Vec::new();
    if let Some(doc) = route(settings, FundSource::Personal)? {
        parts.push(linked_group_ids(conn, settings.workspace_id, doc)?);
    }
    if let Some(doc) = route(settings, FundSource::Ccc)? {
        parts.push(linked_group_ids(conn, settings.workspace_id, doc)?);
    }
    Ok(union_group_ids(parts))
}

fn linked_group_ids(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    document_type: DocumentType,
) -> QueryResult<Vec<Uuid>> {
    match document_type {
        DocumentType::Bill => bills::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select(bills::expense_group_id)
            .load(conn),
        DocumentType::Check => checks::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select(checks::expense_group_id)
            .load(conn),
        DocumentType::JournalEntry => journal_entries::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select(journal_entries::expense_group_id)
            .load(conn),
        DocumentType::CreditCardPurchase => credit_card_purchases::table
            .inner_join(expense_groups::table)
            .filter(expense_groups::workspace_id.eq(workspace_id))
            .select(credit_card_purchases::expense_group_id)
            .load(conn),
    }
}
