use actions_watch_core::{
    RepoSlug, RunContext, RunSource,
    models::{CONCLUSION_SUCCESS, STATUS_SKIPPED, SUMMARY_SCHEMA, WatcherSummary},
};
use anyhow::{Context, Result, anyhow};

use crate::timestamp;

/// What to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// A specific run, used as-is.
    Run(u64),
    /// The latest run of `workflow` on `branch`.
    Branch { branch: String, workflow: String },
}

/// Turn a target into a run ID. Branch lookups fail when no run exists.
pub async fn resolve_run_id<S>(source: &S, target: &WatchTarget) -> Result<u64>
where S: RunSource + ?Sized {
    match target {
        WatchTarget::Run(run_id) => Ok(*run_id),
        WatchTarget::Branch { branch, workflow } => {
            let run = source.latest_run(workflow, branch).await.with_context(|| {
                format!("Failed to list runs of workflow {workflow} on branch {branch}")
            })?;
            let run = run.ok_or_else(|| {
                anyhow!("No runs found for workflow {workflow} on branch {branch}")
            })?;
            tracing::info!(
                "Resolved latest run of {} on {}: {} ({})",
                workflow,
                branch,
                run.id,
                run.status.as_deref().unwrap_or("unknown")
            );
            Ok(run.id)
        }
    }
}

/// The summary for watching the run this process is part of, which would
/// otherwise wait on itself forever.
pub fn self_watch_summary(
    ctx: &RunContext,
    repo: &RepoSlug,
    run_id: u64,
) -> Option<WatcherSummary> {
    if !ctx.is_current_run(run_id) {
        return None;
    }
    Some(WatcherSummary {
        schema: SUMMARY_SCHEMA.to_string(),
        repo: repo.to_string(),
        run_id,
        branch: ctx.ref_name.clone(),
        head_sha: ctx.sha.clone(),
        status: STATUS_SKIPPED.to_string(),
        conclusion: Some(CONCLUSION_SUCCESS.to_string()),
        html_url: Some(format!("{}/{}/actions/runs/{}", ctx.server_url(), repo, run_id)),
        display_title: ctx.workflow.clone(),
        polled_at: timestamp(),
        jobs: vec![],
    })
}
