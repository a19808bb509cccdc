use std::env;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use spendsync::config::AppConfig;
use spendsync::db::{self, PgPool};
use spendsync::error::{SyncError, SyncResult};
use spendsync::models::{
    NewExpenseGroup, NewExpenseGroupExpense, NewSourceCredential, NewWorkspace,
    NewWorkspaceGeneralSettings,
};
use spendsync::routes;
use spendsync::scheduler::{IntervalJobRequest, RemoteJob, RemoteScheduler};
use spendsync::spend::{
    filter_postable, ExpenseQuery, SourceAttachment, SourceCategory, SourceCostCenter,
    SourceEmployee, SourceExpense, SourceProject, SpendConnector, SpendPlatform,
};
use spendsync::state::AppState;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

#[derive(Default)]
pub struct FakeSpendState {
    pub expenses: Vec<SourceExpense>,
    pub employees: Vec<SourceEmployee>,
    pub categories: Vec<SourceCategory>,
    pub cost_centers: Vec<SourceCostCenter>,
    pub projects: Vec<SourceProject>,
    pub expense_queries: Vec<ExpenseQuery>,
}

/// In-memory stand-in for the source platform; one instance is shared by
/// every handle the connector hands out.
#[derive(Default)]
pub struct FakeSpendPlatform {
    pub state: Mutex<FakeSpendState>,
}

impl FakeSpendPlatform {
    pub fn set_expenses(&self, expenses: Vec<SourceExpense>) {
        self.state.lock().unwrap().expenses = expenses;
    }

    pub fn set_employees(&self, employees: Vec<SourceEmployee>) {
        self.state.lock().unwrap().employees = employees;
    }

    pub fn expense_query_count(&self) -> usize {
        self.state.lock().unwrap().expense_queries.len()
    }

    pub fn last_expense_query(&self) -> Option<ExpenseQuery> {
        self.state.lock().unwrap().expense_queries.last().cloned()
    }
}

#[async_trait]
impl SpendPlatform for FakeSpendPlatform {
    async fn get_employee_profile(&self) -> SyncResult<Value> {
        Ok(json!({ "employee_email": "owner@example.com" }))
    }

    async fn cluster_domain(&self) -> SyncResult<String> {
        Ok("https://cluster.fake".to_string())
    }

    async fn get_expenses(&self, query: &ExpenseQuery) -> SyncResult<Vec<SourceExpense>> {
        let mut state = self.state.lock().unwrap();
        state.expense_queries.push(query.clone());
        let wanted: Vec<&str> = query
            .fund_sources
            .iter()
            .map(|source| source.as_str())
            .collect();
        let matching = state
            .expenses
            .iter()
            .filter(|expense| wanted.contains(&expense.fund_source.as_str()))
            .cloned()
            .collect();
        Ok(filter_postable(matching))
    }

    async fn get_attachments(&self, _expense_ids: &[String]) -> SyncResult<Vec<SourceAttachment>> {
        Ok(Vec::new())
    }

    async fn list_employees(&self) -> SyncResult<Vec<SourceEmployee>> {
        Ok(self.state.lock().unwrap().employees.clone())
    }

    async fn list_categories(&self, _active_only: bool) -> SyncResult<Vec<SourceCategory>> {
        Ok(self.state.lock().unwrap().categories.clone())
    }

    async fn list_cost_centers(&self, _active_only: bool) -> SyncResult<Vec<SourceCostCenter>> {
        Ok(self.state.lock().unwrap().cost_centers.clone())
    }

    async fn list_projects(&self, _active_only: bool) -> SyncResult<Vec<SourceProject>> {
        Ok(self.state.lock().unwrap().projects.clone())
    }
}

pub struct FakeSpendConnector {
    pub platform: Arc<FakeSpendPlatform>,
}

impl SpendConnector for FakeSpendConnector {
    fn connect(&self, _refresh_token: &str) -> Arc<dyn SpendPlatform> {
        self.platform.clone()
    }
}

#[derive(Default)]
pub struct FakeSchedulerState {
    pub created: Vec<IntervalJobRequest>,
    pub created_ids: Vec<String>,
    pub deleted: Vec<String>,
    pub fail_trigger: bool,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeScheduler {
    pub state: Mutex<FakeSchedulerState>,
}

impl FakeScheduler {
    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    pub fn created_job_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().created_ids.clone()
    }

    pub fn deleted_jobs(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn last_created(&self) -> Option<IntervalJobRequest> {
        self.state.lock().unwrap().created.last().cloned()
    }
}

#[async_trait]
impl RemoteScheduler for FakeScheduler {
    async fn trigger_interval(&self, request: &IntervalJobRequest) -> SyncResult<RemoteJob> {
        // Simulated network latency, long enough for overlapping callers to
        // actually interleave.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let mut state = self.state.lock().unwrap();
        if state.fail_trigger {
            return Err(SyncError::RemoteService("scheduler unavailable".to_string()));
        }
        state.next_id += 1;
        let id = format!("job-{}", state.next_id);
        state.created.push(request.clone());
        state.created_ids.push(id.clone());
        Ok(RemoteJob { id })
    }

    async fn delete_job(&self, job_id: &str) -> SyncResult<()> {
        self.state.lock().unwrap().deleted.push(job_id.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    pub spend: Arc<FakeSpendPlatform>,
    pub scheduler: Arc<FakeScheduler>,
}

impl TestApp {
    /// Returns `None` when `TEST_DATABASE_URL` is unset so DB-backed flows
    /// skip instead of failing on machines without postgres.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping integration test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            api_url: "http://sync.test/api".to_string(),
            source_base_url: "http://source.test".to_string(),
            source_client_id: "test-client".to_string(),
            source_client_secret: "test-secret".to_string(),
            jobs_service_url: "http://jobs.test".to_string(),
            cors_allowed_origin: None,
        };

        let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let spend = Arc::new(FakeSpendPlatform::default());
        let scheduler = Arc::new(FakeScheduler::default());
        let connector: Arc<dyn SpendConnector> = Arc::new(FakeSpendConnector {
            platform: spend.clone(),
        });
        let scheduler_for_state: Arc<dyn RemoteScheduler> = scheduler.clone();

        let state = AppState::new(pool, config, connector, scheduler_for_state);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            spend,
            scheduler,
        }))
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    pub async fn seed_workspace(
        &self,
        reimbursable: Option<&str>,
        corporate_card: Option<&str>,
    ) -> Result<Uuid> {
        let reimbursable = reimbursable.map(str::to_string);
        let corporate_card = corporate_card.map(str::to_string);
        self.with_conn(move |conn| {
            let workspace = NewWorkspace {
                id: Uuid::new_v4(),
                name: "Test Workspace".to_string(),
            };
            diesel::insert_into(spendsync::schema::workspaces::table)
                .values(&workspace)
                .execute(conn)
                .context("failed to insert workspace")?;

            let credential = NewSourceCredential {
                id: Uuid::new_v4(),
                workspace_id: workspace.id,
                refresh_token: "test-refresh-token".to_string(),
            };
            diesel::insert_into(spendsync::schema::source_credentials::table)
                .values(&credential)
                .execute(conn)
                .context("failed to insert credentials")?;

            let settings = NewWorkspaceGeneralSettings {
                id: Uuid::new_v4(),
                workspace_id: workspace.id,
                reimbursable_expenses_object: reimbursable,
                corporate_credit_card_expenses_object: corporate_card,
            };
            diesel::insert_into(spendsync::schema::workspace_general_settings::table)
                .values(&settings)
                .execute(conn)
                .context("failed to insert settings")?;

            Ok(workspace.id)
        })
        .await
    }

    pub async fn insert_expense_group(&self, workspace_id: Uuid, fund_source: &str) -> Result<Uuid> {
        let fund_source = fund_source.to_string();
        self.with_conn(move |conn| {
            let group = NewExpenseGroup {
                id: Uuid::new_v4(),
                workspace_id,
                fund_source,
                description: json!({}),
            };
            diesel::insert_into(spendsync::schema::expense_groups::table)
                .values(&group)
                .execute(conn)
                .context("failed to insert expense group")?;
            Ok(group.id)
        })
        .await
    }

    pub async fn attach_expense(&self, workspace_id: Uuid, group_id: Uuid) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let now = chrono::Utc::now().naive_utc();
            let expense = spendsync::models::NewExpense {
                id: Uuid::new_v4(),
                workspace_id,
                source_expense_id: Uuid::new_v4().to_string(),
                employee_email: "a@example.com".to_string(),
                category: None,
                project: None,
                cost_center: None,
                report_id: "rp1".to_string(),
                fund_source: "PERSONAL".to_string(),
                reimbursable: true,
                state: "PAYMENT_PROCESSING".to_string(),
                amount: 42.5,
                currency: "USD".to_string(),
                spent_at: Some(now),
                expense_updated_at: now,
            };
            diesel::insert_into(spendsync::schema::expenses::table)
                .values(&expense)
                .execute(conn)
                .context("failed to insert expense")?;
            diesel::insert_into(spendsync::schema::expense_group_expenses::table)
                .values(&NewExpenseGroupExpense {
                    expense_group_id: group_id,
                    expense_id: expense.id,
                })
                .execute(conn)
                .context("failed to link expense")?;
            Ok(expense.id)
        })
        .await
    }

    pub async fn insert_bill(&self, group_id: Uuid) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let bill = spendsync::models::NewBill {
                id: Uuid::new_v4(),
                expense_group_id: group_id,
                transaction_date: chrono::Utc::now().date_naive(),
                currency: "USD".to_string(),
                total_amount: 42.5,
            };
            diesel::insert_into(spendsync::schema::bills::table)
                .values(&bill)
                .execute(conn)
                .context("failed to insert bill")?;
            Ok(bill.id)
        })
        .await
    }

    pub async fn insert_journal_entry(&self, group_id: Uuid) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let entry = spendsync::models::NewJournalEntry {
                id: Uuid::new_v4(),
                expense_group_id: group_id,
                transaction_date: chrono::Utc::now().date_naive(),
                currency: "USD".to_string(),
                total_amount: 42.5,
            };
            diesel::insert_into(spendsync::schema::journal_entries::table)
                .values(&entry)
                .execute(conn)
                .context("failed to insert journal entry")?;
            Ok(entry.id)
        })
        .await
    }

    pub async fn create_task_log(&self, workspace_id: Uuid) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let log = spendsync::tasks::create_task_log(
                conn,
                workspace_id,
                spendsync::tasks::TASK_FETCHING_EXPENSES,
                None,
            )
            .context("failed to create task log")?;
            Ok(log.id)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<Response> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn body_json(body: Body) -> Result<Value> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(serde_json::from_slice(&collected.to_bytes())?)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE bills, checks, journal_entries, credit_card_purchases, \
         expense_group_expenses, expense_groups, expenses, expense_attributes, task_logs, \
         workspace_schedules, workspace_general_settings, source_credentials, workspaces \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
