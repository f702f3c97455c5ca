/// Ambient CI context of the process running the watcher.
///
/// Populated from `GITHUB_*` environment variables by the binary; everything
/// else receives it explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// ID of the workflow run executing this process, if any.
    pub run_id: Option<u64>,
    pub ref_name: Option<String>,
    pub sha: Option<String>,
    pub workflow: Option<String>,
    pub server_url: Option<String>,
    /// `owner/name` of the repository the current run belongs to.
    pub repository: Option<String>,
}

pub const DEFAULT_SERVER_URL: &str = "https://github.com";

impl RunContext {
    /// Build a context from a variable lookup function.
    ///
    /// Empty values are treated as unset. `GITHUB_REF_NAME` is preferred over
    /// `GITHUB_REF`, which has its `refs/heads/` or `refs/tags/` prefix removed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let ref_name = get("GITHUB_REF_NAME").or_else(|| {
            get("GITHUB_REF").map(|r| {
                r.strip_prefix("refs/heads/")
                    .or_else(|| r.strip_prefix("refs/tags/"))
                    .unwrap_or(&r)
                    .to_string()
            })
        });
        let run_id = get("GITHUB_RUN_ID").and_then(|v| match v.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Ignoring non-numeric GITHUB_RUN_ID '{}'", v);
                None
            }
        });
        Self {
            run_id,
            ref_name,
            sha: get("GITHUB_SHA"),
            workflow: get("GITHUB_WORKFLOW"),
            server_url: get("GITHUB_SERVER_URL"),
            repository: get("GITHUB_REPOSITORY"),
        }
    }

    pub fn from_env() -> Self { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL).trim_end_matches('/')
    }

    /// Whether `run_id` refers to the run executing this process.
    pub fn is_current_run(&self, run_id: u64) -> bool { self.run_id == Some(run_id) }
}
