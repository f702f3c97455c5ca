pub mod rate_limit;

use actions_watch_core::{
    FetchError, RepoSlug, RunSource,
    config::GitHubConfig,
    models::{JobList, JobRecord, WorkflowRun, WorkflowRunList},
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode, header};
use octocrab::{Octocrab, service::middleware::retry::RetryConfig};
use serde::{Deserialize, de::DeserializeOwned};
use time::OffsetDateTime;
use url::form_urlencoded;

use crate::rate_limit::{RATE_LIMIT_RESET_HEADER, RateLimit, is_rate_limit_message};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
/// Enough for any realistic number of jobs in one run.
const JOBS_PER_PAGE: u32 = 100;
/// Only the newest run is used; a few extra guard against nothing.
const RUNS_PER_PAGE: u32 = 5;

/// Client for the Actions endpoints of a single repository.
#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
    pub repo: RepoSlug,
    authenticated: bool,
}

impl GitHub {
    pub fn new(config: &GitHubConfig, repo: RepoSlug) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .base_uri(config.api_url.as_str())
            .with_context(|| format!("Invalid GitHub API URL '{}'", config.api_url))?
            .add_header(header::ACCEPT, GITHUB_ACCEPT.to_string())
            // Retries are paced by the poll loop; rate limits must not be retried at all.
            .add_retry_config(RetryConfig::None);
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        } else {
            tracing::warn!("No GITHUB_TOKEN set; using unauthenticated requests");
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Self { client, repo, authenticated: config.token.is_some() })
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, FetchError> {
        tracing::debug!("GET {}", route);
        let response = self
            .client
            ._get(route)
            .await
            .with_context(|| format!("Request to {route} failed"))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = self
            .client
            .body_to_string(response)
            .await
            .with_context(|| format!("Failed to read response from {route}"))?;
        check_response(status, &headers, &body, self.authenticated, OffsetDateTime::now_utc())?;
        let value = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse response from {route}"))?;
        Ok(value)
    }
}

#[async_trait]
impl RunSource for GitHub {
    async fn fetch_run(&self, run_id: u64) -> Result<WorkflowRun, FetchError> {
        self.get_json(&run_path(&self.repo, run_id)).await
    }

    async fn fetch_jobs(&self, run_id: u64) -> Result<Vec<JobRecord>, FetchError> {
        let list: JobList = self.get_json(&jobs_path(&self.repo, run_id)).await?;
        Ok(list.jobs)
    }

    async fn latest_run(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Option<WorkflowRun>, FetchError> {
        let list: WorkflowRunList =
            self.get_json(&workflow_runs_path(&self.repo, workflow, branch)).await?;
        Ok(list.workflow_runs.into_iter().next())
    }
}

pub fn run_path(repo: &RepoSlug, run_id: u64) -> String {
    format!("/repos/{}/{}/actions/runs/{}", repo.owner, repo.name, run_id)
}

pub fn jobs_path(repo: &RepoSlug, run_id: u64) -> String {
    format!("{}/jobs?per_page={}", run_path(repo, run_id), JOBS_PER_PAGE)
}

pub fn workflow_runs_path(repo: &RepoSlug, workflow: &str, branch: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("branch", branch)
        .append_pair("per_page", &RUNS_PER_PAGE.to_string())
        .finish();
    format!(
        "/repos/{}/{}/actions/workflows/{}/runs?{}",
        repo.owner,
        repo.name,
        normalize_workflow(workflow),
        query
    )
}

/// Accept `ci.yml`, `.github/workflows/ci.yml` or a numeric workflow ID.
pub fn normalize_workflow(workflow: &str) -> &str {
    let workflow = workflow.trim();
    let workflow = workflow.strip_prefix("./").unwrap_or(workflow);
    workflow.strip_prefix(".github/workflows/").unwrap_or(workflow)
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    documentation_url: Option<String>,
}

/// Map a non-success response to the matching [`FetchError`].
fn check_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    authenticated: bool,
    now: OffsetDateTime,
) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    let error: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = error.message.unwrap_or_else(|| body.trim().to_string());
    if matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
        && is_rate_limit_message(&message)
    {
        let reset = headers.get(RATE_LIMIT_RESET_HEADER).and_then(|v| v.to_str().ok());
        let rate_limit = RateLimit {
            message: &message,
            reset,
            documentation_url: error.documentation_url.as_deref(),
            authenticated,
        };
        return Err(FetchError::RateLimited(rate_limit.describe(now)));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(message));
    }
    Err(FetchError::Other(anyhow!("GitHub API returned {}: {}", status, message)))
}
