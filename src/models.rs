use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = workspaces)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workspaces)]
pub struct NewWorkspace {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = source_credentials)]
#[diesel(belongs_to(Workspace))]
pub struct SourceCredential {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub refresh_token: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = source_credentials)]
pub struct NewSourceCredential {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = expense_attributes)]
pub struct ExpenseAttribute {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub attribute_type: String,
    pub display_name: String,
    pub value: String,
    pub source_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expense_attributes)]
pub struct NewExpenseAttribute {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub attribute_type: String,
    pub display_name: String,
    pub value: String,
    pub source_id: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = expenses)]
pub struct Expense {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub source_expense_id: String,
    pub employee_email: String,
    pub category: Option<String>,
    pub project: Option<String>,
    pub cost_center: Option<String>,
    pub report_id: String,
    pub fund_source: String,
    pub reimbursable: bool,
    pub state: String,
    pub amount: f64,
    pub currency: String,
    pub spent_at: Option<NaiveDateTime>,
    pub expense_updated_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expenses)]
pub struct NewExpense {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub source_expense_id: String,
    pub employee_email: String,
    pub category: Option<String>,
    pub project: Option<String>,
    pub cost_center: Option<String>,
    pub report_id: String,
    pub fund_source: String,
    pub reimbursable: bool,
    pub state: String,
    pub amount: f64,
    pub currency: String,
    pub spent_at: Option<NaiveDateTime>,
    pub expense_updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = expense_groups)]
pub struct ExpenseGroup {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub fund_source: String,
    pub description: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expense_groups)]
pub struct NewExpenseGroup {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub fund_source: String,
    pub description: serde_json::Value,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = expense_group_expenses)]
pub struct NewExpenseGroupExpense {
    pub expense_group_id: Uuid,
    pub expense_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = task_logs)]
#[diesel(belongs_to(Workspace))]
pub struct TaskLog {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub task_type: String,
    pub status: String,
    pub detail: serde_json::Value,
    pub expense_group_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = task_logs)]
pub struct NewTaskLog {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub task_type: String,
    pub status: String,
    pub detail: serde_json::Value,
    pub expense_group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = workspace_general_settings)]
pub struct WorkspaceGeneralSettings {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub reimbursable_expenses_object: Option<String>,
    pub corporate_credit_card_expenses_object: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workspace_general_settings)]
pub struct NewWorkspaceGeneralSettings {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub reimbursable_expenses_object: Option<String>,
    pub corporate_credit_card_expenses_object: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = workspace_schedules)]
pub struct WorkspaceSchedule {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub enabled: bool,
    pub interval_hours: i32,
    pub start_datetime: NaiveDateTime,
    pub remote_job_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workspace_schedules)]
pub struct NewWorkspaceSchedule {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub enabled: bool,
    pub interval_hours: i32,
    pub start_datetime: NaiveDateTime,
    pub remote_job_id: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = bills)]
#[diesel(belongs_to(ExpenseGroup))]
pub struct Bill {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = bills)]
pub struct NewBill {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = checks)]
#[diesel(belongs_to(ExpenseGroup))]
pub struct Check {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = checks)]
pub struct NewCheck {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = journal_entries)]
#[diesel(belongs_to(ExpenseGroup))]
pub struct JournalEntry {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = journal_entries)]
pub struct NewJournalEntry {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = credit_card_purchases)]
#[diesel(belongs_to(ExpenseGroup))]
pub struct CreditCardPurchase {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credit_card_purchases)]
pub struct NewCreditCardPurchase {
    pub id: Uuid,
    pub expense_group_id: Uuid,
    pub transaction_date: NaiveDate,
    pub currency: String,
    pub total_amount: f64,
}
