use async_trait::async_trait;

use crate::models::{JobRecord, WorkflowRun};

/// Failure of a single remote request, classified for the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The API rate limit was hit. Carries the full user-facing message.
    #[error("{0}")]
    RateLimited(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read access to workflow runs of a single repository.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn fetch_run(&self, run_id: u64) -> Result<WorkflowRun, FetchError>;

    async fn fetch_jobs(&self, run_id: u64) -> Result<Vec<JobRecord>, FetchError>;

    /// The most recent run of `workflow` on `branch`, if there is one.
    async fn latest_run(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Option<WorkflowRun>, FetchError>;
}
