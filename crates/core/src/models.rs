use serde::{Deserialize, Serialize};

/// Status reported by the API once a run has finished.
pub const STATUS_COMPLETED: &str = "completed";
/// Synthetic status for a run that was not polled because it is the current run.
pub const STATUS_SKIPPED: &str = "skipped";
pub const STATUS_RATE_LIMITED: &str = "rate_limited";
pub const STATUS_NOT_FOUND: &str = "not_found";
pub const STATUS_ERROR: &str = "error";

pub const CONCLUSION_SUCCESS: &str = "success";
/// Conclusion recorded when the watcher gave up rather than the run finishing.
pub const CONCLUSION_WATCHER_ERROR: &str = "watcher-error";

/// Schema tag written into every summary document.
pub const SUMMARY_SCHEMA: &str = "actions-watch/summary@1";

/// A GitHub Actions workflow run, as returned by `GET /repos/{repo}/actions/runs/{id}`.
///
/// Only the fields the watcher reports on are kept. `status` and `conclusion`
/// are free-form strings; the API adds new values from time to time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub head_sha: Option<String>,
    pub display_title: Option<String>,
    pub html_url: Option<String>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool { self.status.as_deref() == Some(STATUS_COMPLETED) }
}

/// A job within a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub name: String,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

/// `GET /repos/{repo}/actions/runs/{id}/jobs`
#[derive(Debug, Clone, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

/// `GET /repos/{repo}/actions/workflows/{workflow}/runs`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// The watcher's output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherSummary {
    pub schema: String,
    pub repo: String,
    pub run_id: u64,
    pub branch: Option<String>,
    pub head_sha: Option<String>,
    pub status: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    pub display_title: Option<String>,
    /// RFC 3339 timestamp of when the summary was assembled.
    pub polled_at: String,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: u64,
    pub name: String,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
}

impl From<&JobRecord> for JobSummary {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id,
            name: job.name.clone(),
            status: job.status.clone(),
            conclusion: job.conclusion.clone(),
            html_url: job.html_url.clone(),
        }
    }
}

impl WatcherSummary {
    /// Build a summary from the latest known run data.
    ///
    /// `status` falls back to the run's own status when not overridden.
    pub fn from_run(
        repo: &str,
        run_id: u64,
        run: Option<&WorkflowRun>,
        jobs: &[JobRecord],
        polled_at: String,
    ) -> Self {
        Self {
            schema: SUMMARY_SCHEMA.to_string(),
            repo: repo.to_string(),
            run_id,
            branch: run.and_then(|r| r.head_branch.clone()),
            head_sha: run.and_then(|r| r.head_sha.clone()),
            status: run.and_then(|r| r.status.clone()).unwrap_or_else(|| STATUS_ERROR.to_string()),
            conclusion: run.and_then(|r| r.conclusion.clone()),
            html_url: run.and_then(|r| r.html_url.clone()),
            display_title: run.and_then(|r| r.display_title.clone()),
            polled_at,
            jobs: jobs.iter().map(JobSummary::from).collect(),
        }
    }

    /// Whether the recorded conclusion counts as a failure.
    ///
    /// A missing conclusion is not a failure; only a present, non-`success`
    /// value is (compared case-insensitively).
    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref().is_some_and(|c| !c.eq_ignore_ascii_case(CONCLUSION_SUCCESS))
    }
}
