use std::io::Write;

use actions_watch_core::{
    FetchError, RepoSlug, RunSource,
    config::WatchConfig,
    models::{
        CONCLUSION_WATCHER_ERROR, JobRecord, STATUS_NOT_FOUND, STATUS_RATE_LIMITED,
        WatcherSummary, WorkflowRun,
    },
};
use tokio::time::{Instant, sleep};

use crate::timestamp;

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The run reached the `completed` status.
    Completed(WatcherSummary),
    /// The target is the run executing the watcher; nothing was polled.
    Skipped(WatcherSummary),
    /// The watcher gave up. The summary holds whatever was known at that point.
    Aborted { reason: String, summary: WatcherSummary },
}

impl WatchOutcome {
    pub fn summary(&self) -> &WatcherSummary {
        match self {
            Self::Completed(summary) | Self::Skipped(summary) => summary,
            Self::Aborted { summary, .. } => summary,
        }
    }

    /// Whether the process should exit successfully.
    pub fn is_success(&self) -> bool {
        match self {
            Self::Completed(summary) => !summary.is_failure(),
            Self::Skipped(_) => true,
            Self::Aborted { .. } => false,
        }
    }
}

/// Data carried between iterations.
#[derive(Default)]
struct PollState {
    /// Latest run data, including from iterations whose jobs fetch failed.
    run: Option<WorkflowRun>,
    /// Jobs from the latest fully successful iteration.
    jobs: Vec<JobRecord>,
    run_data_loaded: bool,
    not_found_since: Option<Instant>,
    error_since: Option<Instant>,
}

/// Polls a single run until it completes or a failure outlasts its grace window.
pub struct Watcher<'a, S: ?Sized, W> {
    source: &'a S,
    repo: String,
    run_id: u64,
    config: WatchConfig,
    out: W,
}

impl<'a, S, W> Watcher<'a, S, W>
where
    S: RunSource + ?Sized,
    W: Write,
{
    pub fn new(source: &'a S, repo: &RepoSlug, run_id: u64, config: WatchConfig, out: W) -> Self {
        Self { source, repo: repo.to_string(), run_id, config, out }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W { self.out }

    pub async fn run(&mut self) -> WatchOutcome {
        let mut state = PollState::default();
        loop {
            match self.poll_once(&mut state).await {
                Ok(()) => {
                    state.run_data_loaded = true;
                    state.not_found_since = None;
                    state.error_since = None;
                    if state.run.as_ref().is_some_and(WorkflowRun::is_completed) {
                        return WatchOutcome::Completed(self.summary(&state));
                    }
                }
                Err(err) => {
                    if let Some(outcome) = self.handle_error(&mut state, err) {
                        return outcome;
                    }
                }
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Fetch the run, then its jobs. Either failing fails the iteration.
    async fn poll_once(&mut self, state: &mut PollState) -> Result<(), FetchError> {
        let run = self.source.fetch_run(self.run_id).await?;
        self.print(|out| print_run(out, &run));
        state.run = Some(run);
        let jobs = self.source.fetch_jobs(self.run_id).await?;
        self.print(|out| print_jobs(out, &jobs));
        state.jobs = jobs;
        Ok(())
    }

    fn handle_error(&self, state: &mut PollState, err: FetchError) -> Option<WatchOutcome> {
        let now = Instant::now();
        match err {
            FetchError::RateLimited(reason) => {
                Some(self.abort(state, reason, Some(STATUS_RATE_LIMITED)))
            }
            FetchError::NotFound(message) if !state.run_data_loaded => {
                let elapsed = now - *state.not_found_since.get_or_insert(now);
                if elapsed > self.config.not_found_grace {
                    let reason = format!(
                        "Run {} in {} not found after {}ms: {}",
                        self.run_id,
                        self.repo,
                        elapsed.as_millis(),
                        message
                    );
                    return Some(self.abort(state, reason, Some(STATUS_NOT_FOUND)));
                }
                tracing::warn!(
                    "Run {} not found yet ({}); retrying ({}ms of {}ms grace)",
                    self.run_id,
                    message,
                    elapsed.as_millis(),
                    self.config.not_found_grace.as_millis()
                );
                None
            }
            err => {
                let elapsed = now - *state.error_since.get_or_insert(now);
                if elapsed > self.config.error_grace {
                    let reason = format!(
                        "Giving up on run {} after {}ms of consecutive errors: {:#}",
                        self.run_id,
                        elapsed.as_millis(),
                        anyhow::Error::from(err)
                    );
                    return Some(self.abort(state, reason, None));
                }
                tracing::warn!(
                    "Failed to poll run {}: {:#} ({}ms of {}ms grace)",
                    self.run_id,
                    anyhow::Error::from(err),
                    elapsed.as_millis(),
                    self.config.error_grace.as_millis()
                );
                None
            }
        }
    }

    /// Build an abort outcome. Without a status override the run's last known
    /// status is kept (or `error` if none was ever fetched).
    fn abort(&self, state: &PollState, reason: String, status: Option<&str>) -> WatchOutcome {
        let mut summary = self.summary(state);
        if let Some(status) = status {
            summary.status = status.to_string();
        }
        summary.conclusion = Some(CONCLUSION_WATCHER_ERROR.to_string());
        WatchOutcome::Aborted { reason, summary }
    }

    fn summary(&self, state: &PollState) -> WatcherSummary {
        WatcherSummary::from_run(
            &self.repo,
            self.run_id,
            state.run.as_ref(),
            &state.jobs,
            timestamp(),
        )
    }

    fn print(&mut self, f: impl FnOnce(&mut W) -> std::io::Result<()>) {
        if let Err(e) = f(&mut self.out).and_then(|()| self.out.flush()) {
            tracing::debug!("Failed to write progress: {}", e);
        }
    }
}

fn or_dash(value: Option<&str>) -> &str { value.unwrap_or("-") }

fn print_run(out: &mut impl Write, run: &WorkflowRun) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", or_dash(run.display_title.as_deref()))?;
    writeln!(
        out,
        "  status: {}  conclusion: {}",
        or_dash(run.status.as_deref()),
        or_dash(run.conclusion.as_deref())
    )?;
    let sha = run.head_sha.as_deref().map(|s| s.get(..7).unwrap_or(s));
    writeln!(out, "  ref: {}@{}", or_dash(run.head_branch.as_deref()), or_dash(sha))?;
    writeln!(out, "  url: {}", or_dash(run.html_url.as_deref()))
}

fn print_jobs(out: &mut impl Write, jobs: &[JobRecord]) -> std::io::Result<()> {
    if jobs.is_empty() {
        return writeln!(out, "  (no jobs yet)");
    }
    for job in jobs {
        writeln!(
            out,
            "  - {}: {} ({})",
            job.name,
            or_dash(job.status.as_deref()),
            or_dash(job.conclusion.as_deref())
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actions_watch_core::models::{CONCLUSION_SUCCESS, STATUS_ERROR};

    use super::*;
    use crate::testing::{ScriptedSource, job, not_found, other_error, rate_limited, run};

    /// Upper bound on virtual time, so a broken loop fails instead of spinning.
    const TEST_DEADLINE: Duration = Duration::from_secs(3600);

    fn config(poll_ms: u64, error_grace_ms: u64, not_found_grace_ms: u64) -> WatchConfig {
        WatchConfig {
            poll_interval: Duration::from_millis(poll_ms),
            error_grace: Duration::from_millis(error_grace_ms),
            not_found_grace: Duration::from_millis(not_found_grace_ms),
        }
    }

    async fn watch(source: &ScriptedSource, config: WatchConfig) -> (WatchOutcome, String) {
        let repo: RepoSlug = "Org/Repo".parse().unwrap();
        let mut watcher = Watcher::new(source, &repo, 42, config, Vec::new());
        let outcome = tokio::time::timeout(TEST_DEADLINE, watcher.run())
            .await
            .expect("watcher did not terminate");
        (outcome, String::from_utf8(watcher.into_output()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_on_first_poll() {
        let source = ScriptedSource::new()
            .run(Ok(run("completed", Some("success"))))
            .jobs(Ok(vec![job(1, "build", Some("success"))]));
        let (outcome, output) = watch(&source, config(10, 30, 30)).await;
        let WatchOutcome::Completed(summary) = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(outcome.is_success());
        assert_eq!(summary.run_id, 42);
        assert_eq!(summary.repo, "Org/Repo");
        assert_eq!(summary.conclusion.as_deref(), Some(CONCLUSION_SUCCESS));
        assert_eq!(summary.jobs.len(), 1);
        assert!(output.contains("status: completed  conclusion: success"), "{output}");
        assert!(output.contains("- build: completed (success)"), "{output}");
        assert_eq!(source.run_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_completed() {
        let source = ScriptedSource::new()
            .run(Ok(run("queued", None)))
            .run(Ok(run("in_progress", None)))
            .run(Ok(run("completed", Some("failure"))));
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(15_000, 120_000, 90_000)).await;
        assert!(matches!(outcome, WatchOutcome::Completed(_)));
        assert!(!outcome.is_success());
        assert_eq!(source.run_calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_within_grace_recover() {
        // Failures at t=0,10,20 stay within the 30ms window.
        let source = ScriptedSource::new()
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Ok(run("completed", Some("success"))));
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        assert!(outcome.is_success(), "{outcome:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_error_window() {
        // Two bursts of 30ms each would exceed the window if they were cumulative.
        let source = ScriptedSource::new()
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Ok(run("in_progress", None)))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Err(other_error()))
            .run(Ok(run("completed", Some("success"))));
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        assert!(outcome.is_success(), "{outcome:?}");
        assert_eq!(source.run_calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_past_grace_abort() {
        // After the first success every fetch fails.
        let source = ScriptedSource::new()
            .run(Ok(run("in_progress", None)))
            .jobs(Ok(vec![job(1, "build", None)]));
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        let WatchOutcome::Aborted { reason, summary } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(reason.contains("consecutive errors"), "{reason}");
        assert_eq!(summary.status, "in_progress");
        assert_eq!(summary.conclusion.as_deref(), Some(CONCLUSION_WATCHER_ERROR));
        assert_eq!(summary.jobs.len(), 1);
        // First failure at t=10, abort once more than 30ms have passed since.
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_without_data_abort_with_error_status() {
        let source = ScriptedSource::new();
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        let WatchOutcome::Aborted { summary, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(summary.status, STATUS_ERROR);
        assert!(summary.branch.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_past_grace_aborts() {
        let mut source = ScriptedSource::new();
        for _ in 0..20 {
            source = source.run(Err(not_found()));
        }
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(10, 1_000, 30)).await;
        let WatchOutcome::Aborted { reason, summary } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(reason.contains("not found"), "{reason}");
        assert_eq!(summary.status, STATUS_NOT_FOUND);
        assert_eq!(summary.conclusion.as_deref(), Some(CONCLUSION_WATCHER_ERROR));
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_then_appears() {
        let source = ScriptedSource::new()
            .run(Err(not_found()))
            .run(Err(not_found()))
            .run(Ok(run("completed", Some("success"))));
        let (outcome, _) = watch(&source, config(10, 1_000, 30)).await;
        assert!(outcome.is_success(), "{outcome:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_after_data_uses_error_window() {
        let mut source = ScriptedSource::new().run(Ok(run("in_progress", None)));
        for _ in 0..20 {
            source = source.run(Err(not_found()));
        }
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(10, 50, 10)).await;
        let WatchOutcome::Aborted { summary, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(summary.status, "in_progress");
        // Not-found window is 10ms, but the 50ms error window applies.
        assert_eq!(start.elapsed(), Duration::from_millis(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_aborts_immediately() {
        let source = ScriptedSource::new()
            .run(Ok(run("in_progress", None)))
            .run(Err(rate_limited()))
            .run(Ok(run("completed", Some("success"))));
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(10, 60_000, 60_000)).await;
        let WatchOutcome::Aborted { reason, summary } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(reason.contains("rate limit"), "{reason}");
        assert_eq!(summary.status, STATUS_RATE_LIMITED);
        assert_eq!(summary.conclusion.as_deref(), Some(CONCLUSION_WATCHER_ERROR));
        assert_eq!(source.run_calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_failure_fails_iteration() {
        let source = ScriptedSource::new()
            .run(Ok(run("in_progress", None)))
            .jobs(Ok(vec![job(1, "build", None)]))
            .run(Ok(run("completed", Some("success"))))
            .jobs(Err(rate_limited()));
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        let WatchOutcome::Aborted { summary, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        // Run fields come from the partial iteration, jobs from the last full one.
        assert_eq!(summary.status, STATUS_RATE_LIMITED);
        assert_eq!(summary.jobs.len(), 1);
        assert_eq!(summary.jobs[0].conclusion, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_failure_does_not_reset_error_window() {
        let mut source = ScriptedSource::new().run(Err(other_error()));
        for _ in 0..10 {
            source = source.run(Ok(run("in_progress", None))).jobs(Err(other_error()));
        }
        let start = Instant::now();
        let (outcome, _) = watch(&source, config(10, 30, 30)).await;
        let WatchOutcome::Aborted { summary, .. } = &outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(summary.status, "in_progress");
        assert!(summary.jobs.is_empty());
        assert_eq!(start.elapsed(), Duration::from_millis(40));
    }
}
