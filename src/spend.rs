use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::routing::FundSource;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceExpense {
    pub id: String,
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
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEmployee {
    pub id: String,
    pub employee_email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceCategory {
    pub id: String,
    pub name: String,
    pub sub_category: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceCostCenter {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceAttachment {
    pub expense_id: String,
    pub filename: String,
    pub content: String,
}

/// Filter criteria for an expense fetch against the source platform.
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    pub states: Vec<String>,
    pub updated_at: Vec<String>,
    pub fund_sources: Vec<FundSource>,
}

/// The spend-management platform, scoped to one workspace's credential.
#[async_trait]
pub trait SpendPlatform: Send + Sync + 'static {
    async fn get_employee_profile(&self) -> SyncResult<Value>;
    async fn cluster_domain(&self) -> SyncResult<String>;
    async fn get_expenses(&self, query: &ExpenseQuery) -> SyncResult<Vec<SourceExpense>>;
    async fn get_attachments(&self, expense_ids: &[String]) -> SyncResult<Vec<SourceAttachment>>;
    async fn list_employees(&self) -> SyncResult<Vec<SourceEmployee>>;
    async fn list_categories(&self, active_only: bool) -> SyncResult<Vec<SourceCategory>>;
    async fn list_cost_centers(&self, active_only: bool) -> SyncResult<Vec<SourceCostCenter>>;
    async fn list_projects(&self, active_only: bool) -> SyncResult<Vec<SourceProject>>;
}

/// Builds a credential-scoped [`SpendPlatform`] handle per request context.
/// There is deliberately no shared session state between handles.
pub trait SpendConnector: Send + Sync + 'static {
    fn connect(&self, refresh_token: &str) -> Arc<dyn SpendPlatform>;
}

pub struct HttpSpendConnector {
    base_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl HttpSpendConnector {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl SpendConnector for HttpSpendConnector {
    fn connect(&self, refresh_token: &str) -> Arc<dyn SpendPlatform> {
        Arc::new(HttpSpendClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token: refresh_token.to_string(),
            http: self.http.clone(),
        })
    }
}

pub struct HttpSpendClient {
    base_url: String,
    #[allow(dead_code)]
    client_id: String,
    #[allow(dead_code)]
    client_secret: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ClusterResponse {
    cluster_domain: String,
}

impl HttpSpendClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "source platform request");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(map_status(status, path))
        }
    }
}

fn map_status(status: StatusCode, context: &str) -> SyncError {
    match status {
        StatusCode::UNAUTHORIZED => {
            SyncError::Unauthorized("wrong client secret or refresh token".to_string())
        }
        StatusCode::NOT_FOUND => SyncError::NotFound(format!("{context} does not exist")),
        StatusCode::BAD_REQUEST => {
            SyncError::WrongParams(format!("some of the parameters for {context} were wrong"))
        }
        status => SyncError::RemoteService(format!("{context} returned {status}")),
    }
}

#[async_trait]
impl SpendPlatform for HttpSpendClient {
    async fn get_employee_profile(&self) -> SyncResult<Value> {
        self.get_json("/api/employees/my_profile", &[]).await
    }

    async fn cluster_domain(&self) -> SyncResult<String> {
        let url = format!("{}/oauth/cluster/", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let body: ClusterResponse = response.json().await?;
            Ok(body.cluster_domain)
        } else {
            Err(map_status(status, "cluster discovery"))
        }
    }

    async fn get_expenses(&self, query: &ExpenseQuery) -> SyncResult<Vec<SourceExpense>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        for state in &query.states {
            params.push(("state", state.clone()));
        }
        for window in &query.updated_at {
            params.push(("updated_at", window.clone()));
        }
        for fund_source in &query.fund_sources {
            params.push(("fund_source", fund_source.as_str().to_string()));
        }
        let expenses = self.get_json("/api/expenses", &params).await?;
        Ok(filter_postable(expenses))
    }

    async fn get_attachments(&self, expense_ids: &[String]) -> SyncResult<Vec<SourceAttachment>> {
        let mut attachments = Vec::new();
        for expense_id in expense_ids {
            let found: Vec<SourceAttachment> = self
                .get_json(&format!("/api/expenses/{expense_id}/attachments"), &[])
                .await?;
            // Only the first attachment per expense is carried over.
            if let Some(mut attachment) = found.into_iter().next() {
                attachment.expense_id = expense_id.clone();
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }

    async fn list_employees(&self) -> SyncResult<Vec<SourceEmployee>> {
        self.get_json("/api/employees", &[]).await
    }

    async fn list_categories(&self, active_only: bool) -> SyncResult<Vec<SourceCategory>> {
        self.get_json("/api/categories", &[("active_only", active_only.to_string())])
            .await
    }

    async fn list_cost_centers(&self, active_only: bool) -> SyncResult<Vec<SourceCostCenter>> {
        self.get_json(
            "/api/cost_centers",
            &[("active_only", active_only.to_string())],
        )
        .await
    }

    async fn list_projects(&self, active_only: bool) -> SyncResult<Vec<SourceProject>> {
        self.get_json("/api/projects", &[("active_only", active_only.to_string())])
            .await
    }
}

/// Drops expenses that can never be posted: personal-funded records marked
/// non-reimbursable. This is a data-quality filter applied on every fetch.
pub fn filter_postable(expenses: Vec<SourceExpense>) -> Vec<SourceExpense> {
    expenses
        .into_iter()
        .filter(|expense| {
            expense.reimbursable || expense.fund_source != FundSource::Personal.as_str()
        })
        .collect()
}
