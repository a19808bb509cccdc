use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    scheduler::RemoteScheduler,
    spend::SpendConnector,
};

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub spend: Arc<dyn SpendConnector>,
    pub scheduler: Arc<dyn RemoteScheduler>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        spend: Arc<dyn SpendConnector>,
        scheduler: Arc<dyn RemoteScheduler>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            spend,
            scheduler,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
