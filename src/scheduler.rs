use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

const MAX_ATTEMPTS: u32 = 3;

/// A recurring job registered with the remote scheduler service. The service
/// owns the job; we only hold its id.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteJob {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalJobRequest {
    pub callback_url: String,
    pub callback_method: String,
    pub object_id: String,
    pub description: String,
    pub start_datetime: String,
    pub hours: i32,
}

#[async_trait]
pub trait RemoteScheduler: Send + Sync + 'static {
    async fn trigger_interval(&self, request: &IntervalJobRequest) -> SyncResult<RemoteJob>;

    /// Deleting a job the remote side no longer knows about must succeed:
    /// re-stating an absent job as absent keeps retries idempotent.
    async fn delete_job(&self, job_id: &str) -> SyncResult<()>;
}

pub struct HttpSchedulerClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSchedulerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RemoteScheduler for HttpSchedulerClient {
    async fn trigger_interval(&self, request: &IntervalJobRequest) -> SyncResult<RemoteJob> {
        let url = format!("{}/jobs/interval", self.base_url);
        with_retry("trigger_interval", || async {
            let response = self.http.post(&url).json(request).send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(response.json::<RemoteJob>().await?)
            } else if status == StatusCode::BAD_REQUEST {
                Err(SyncError::WrongParams(format!(
                    "scheduler rejected interval job: {status}"
                )))
            } else {
                Err(SyncError::RemoteService(format!(
                    "scheduler returned {status} for trigger_interval"
                )))
            }
        })
        .await
    }

    async fn delete_job(&self, job_id: &str) -> SyncResult<()> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        with_retry("delete_job", || async {
            let response = self.http.delete(&url).send().await?;
            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_FOUND {
                if status == StatusCode::NOT_FOUND {
                    debug!(%job_id, "remote job already absent, treating delete as no-op");
                }
                Ok(())
            } else {
                Err(SyncError::RemoteService(format!(
                    "scheduler returned {status} for delete_job"
                )))
            }
        })
        .await
    }
}

/// Bounded retry for transient scheduler failures. Non-transient errors are
/// returned immediately.
async fn with_retry<T, F, Fut>(operation: &str, mut call: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = SyncResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(%operation, %err, attempt, delay_ms = delay.as_millis() as u64, "retrying scheduler call");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt))
}
