use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use actions_watch_core::{
    FetchError, RunSource,
    models::{JobRecord, WorkflowRun},
};
use anyhow::anyhow;
use async_trait::async_trait;

type RunResult = Result<WorkflowRun, FetchError>;
type JobsResult = Result<Vec<JobRecord>, FetchError>;

/// A [`RunSource`] that replays queued responses.
///
/// Once the run queue is empty every run fetch fails with a generic error;
/// an empty jobs queue yields no jobs.
#[derive(Default)]
pub struct ScriptedSource {
    runs: Mutex<VecDeque<RunResult>>,
    jobs: Mutex<VecDeque<JobsResult>>,
    latest: Mutex<Option<Result<Option<WorkflowRun>, FetchError>>>,
    run_calls: AtomicUsize,
    latest_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self { Self::default() }

    pub fn run(self, result: RunResult) -> Self {
        self.runs.lock().unwrap().push_back(result);
        self
    }

    pub fn jobs(self, result: JobsResult) -> Self {
        self.jobs.lock().unwrap().push_back(result);
        self
    }

    pub fn latest(self, result: Result<Option<WorkflowRun>, FetchError>) -> Self {
        *self.latest.lock().unwrap() = Some(result);
        self
    }

    pub fn run_calls(&self) -> usize { self.run_calls.load(Ordering::SeqCst) }

    pub fn latest_calls(&self) -> usize { self.latest_calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl RunSource for ScriptedSource {
    async fn fetch_run(&self, _run_id: u64) -> Result<WorkflowRun, FetchError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.runs.lock().unwrap().pop_front().unwrap_or_else(|| Err(other_error()))
    }

    async fn fetch_jobs(&self, _run_id: u64) -> Result<Vec<JobRecord>, FetchError> {
        self.jobs.lock().unwrap().pop_front().unwrap_or_else(|| Ok(vec![]))
    }

    async fn latest_run(
        &self,
        _workflow: &str,
        _branch: &str,
    ) -> Result<Option<WorkflowRun>, FetchError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest.lock().unwrap().take().unwrap_or(Ok(None))
    }
}

pub fn run(status: &str, conclusion: Option<&str>) -> WorkflowRun {
    WorkflowRun {
        id: 42,
        status: Some(status.to_string()),
        conclusion: conclusion.map(str::to_string),
        head_branch: Some("main".to_string()),
        head_sha: Some("0123456789abcdef".to_string()),
        display_title: Some("Release 1.2.3".to_string()),
        html_url: Some("https://github.com/Org/Repo/actions/runs/42".to_string()),
    }
}

pub fn job(id: u64, name: &str, conclusion: Option<&str>) -> JobRecord {
    JobRecord {
        id,
        name: name.to_string(),
        status: Some(if conclusion.is_some() { "completed" } else { "in_progress" }.to_string()),
        conclusion: conclusion.map(str::to_string),
        html_url: Some(format!("https://github.com/Org/Repo/actions/runs/42/job/{id}")),
    }
}

pub fn other_error() -> FetchError { FetchError::Other(anyhow!("connection reset")) }

pub fn not_found() -> FetchError { FetchError::NotFound("Not Found".to_string()) }

pub fn rate_limited() -> FetchError {
    FetchError::RateLimited("GitHub API rate limit exceeded: API rate limit exceeded.".to_string())
}
