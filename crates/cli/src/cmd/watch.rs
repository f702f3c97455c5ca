use std::process::ExitCode;

use actions_watch_core::{
    RunContext,
    config::{Config, DEFAULT_WORKFLOW, GitHubConfig, WatchConfig},
    repo::resolve_repo_slug,
};
use actions_watch_github::GitHub;
use actions_watch_watcher::{WatchOutcome, WatchRequest, WatchTarget, watch, write_summary};
use anyhow::{Result, bail};
use argp::FromArgs;
use typed_path::Utf8NativePathBuf;

use crate::util::{git_remote_url, native_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Watch a GitHub Actions workflow run until it completes.
#[argp(subcommand, name = "watch")]
pub struct Args {
    #[argp(option)]
    /// ID of the run to watch
    run_id: Option<u64>,
    #[argp(option)]
    /// watch the latest run on this branch
    branch: Option<String>,
    #[argp(option)]
    /// workflow file used with --branch (default: ci.yml)
    workflow: Option<String>,
    #[argp(option)]
    /// milliseconds between polls (default: 15000)
    poll_ms: Option<u64>,
    #[argp(option, short = 'o', from_str_fn(native_path))]
    /// write a JSON summary to this file
    out: Option<Utf8NativePathBuf>,
    #[argp(option)]
    /// how long consecutive errors are tolerated, in milliseconds (default: 120000)
    error_grace_ms: Option<u64>,
    #[argp(option)]
    /// how long a missing run is tolerated, in milliseconds (default: 90000)
    notfound_grace_ms: Option<u64>,
    #[argp(option)]
    /// repository as owner/name (default: GITHUB_REPOSITORY or the origin remote)
    repo: Option<String>,
}

impl Args {
    fn target(&self, config: &Config) -> Result<WatchTarget> {
        match (self.run_id, &self.branch) {
            (Some(_), Some(_)) => bail!("Specify only one of --run-id and --branch"),
            (Some(run_id), None) => {
                if self.workflow.is_some() {
                    tracing::warn!("Ignoring --workflow, which only applies with --branch");
                }
                Ok(WatchTarget::Run(run_id))
            }
            (None, Some(branch)) => {
                let workflow = self
                    .workflow
                    .clone()
                    .or_else(|| config.watch.workflow.clone())
                    .unwrap_or_else(|| DEFAULT_WORKFLOW.to_string());
                Ok(WatchTarget::Branch { branch: branch.clone(), workflow })
            }
            (None, None) => bail!("One of --run-id or --branch is required"),
        }
    }
}

pub async fn run(args: Args, config: &Config) -> Result<ExitCode> {
    let target = args.target(config)?;
    let ctx = RunContext::from_env();
    let explicit_repo = args.repo.clone().or_else(|| ctx.repository.clone());
    let remote_url = if explicit_repo.is_none() { git_remote_url() } else { None };
    let repo = resolve_repo_slug(explicit_repo.as_deref(), remote_url.as_deref())?;

    let github = GitHub::new(&GitHubConfig::from_env(&config.github), repo.clone())?;
    let request = WatchRequest {
        repo,
        target,
        config: WatchConfig::resolve(
            &config.watch,
            args.poll_ms,
            args.error_grace_ms,
            args.notfound_grace_ms,
        ),
    };
    let outcome = watch(&github, &request, &ctx, std::io::stdout()).await?;
    finish(&outcome, args.out.as_ref())
}

/// Log how the watch ended, write the summary if requested and pick the exit code.
fn finish(outcome: &WatchOutcome, out: Option<&Utf8NativePathBuf>) -> Result<ExitCode> {
    let summary = outcome.summary();
    match outcome {
        WatchOutcome::Completed(_) => tracing::info!(
            "Run {} completed with conclusion {}",
            summary.run_id,
            summary.conclusion.as_deref().unwrap_or("none")
        ),
        WatchOutcome::Skipped(_) => {
            tracing::info!("Skipped watching run {} (current run)", summary.run_id)
        }
        WatchOutcome::Aborted { reason, .. } => tracing::error!("{}", reason),
    }
    if let Some(out) = out {
        write_summary(out.with_platform_encoding(), summary)?;
    }
    Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
