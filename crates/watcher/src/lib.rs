mod output;
mod poll;
mod resolve;
#[cfg(test)]
mod testing;

use std::io::Write;

use actions_watch_core::{RepoSlug, RunContext, RunSource, config::WatchConfig};
use anyhow::Result;
pub use output::write_summary;
pub use poll::{WatchOutcome, Watcher};
pub use resolve::{WatchTarget, resolve_run_id, self_watch_summary};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Everything needed to watch one run.
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub repo: RepoSlug,
    pub target: WatchTarget,
    pub config: WatchConfig,
}

/// Resolve the target run and watch it to a terminal state.
///
/// Errors are resolution failures only; every failure after polling starts is
/// reported as [`WatchOutcome::Aborted`].
pub async fn watch<S, W>(
    source: &S,
    request: &WatchRequest,
    ctx: &RunContext,
    out: W,
) -> Result<WatchOutcome>
where
    S: RunSource + ?Sized,
    W: Write,
{
    let run_id = resolve_run_id(source, &request.target).await?;
    if let Some(summary) = self_watch_summary(ctx, &request.repo, run_id) {
        tracing::info!("Run {} is the current workflow run; not watching itself", run_id);
        return Ok(WatchOutcome::Skipped(summary));
    }
    tracing::info!("Watching run {} in {}", run_id, request.repo);
    let mut watcher = Watcher::new(source, &request.repo, run_id, request.config, out);
    Ok(watcher.run().await)
}

pub(crate) fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
