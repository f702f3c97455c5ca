use std::{fmt, str::FromStr, sync::OnceLock};

use anyhow::{Result, anyhow, bail};
use regex::Regex;

/// An `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (owner, name) =
            s.split_once('/').ok_or_else(|| anyhow!("Invalid repository slug '{s}'"))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("Invalid repository slug '{s}'");
        }
        Ok(Self { owner: owner.to_string(), name: name.to_string() })
    }
}

/// Extract the repository slug from a git remote URL.
///
/// Handles scp-like (`git@host:owner/repo`), `https://`, `ssh://` and `git://`
/// remotes, with an optional `git+` scheme prefix, userinfo, port and trailing
/// `.git` or `/`.
pub fn parse_remote_url(url: &str) -> Option<RepoSlug> {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    static SCP_REGEX: OnceLock<Regex> = OnceLock::new();
    let url = url.trim();
    let regex = if url.contains("://") {
        URL_REGEX.get_or_init(|| {
            Regex::new(
                r"^(?:git\+)?(?:https?|ssh|git)://(?:[^@/]+@)?[^/]+/(?:.*/)?(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
            )
            .unwrap()
        })
    } else {
        SCP_REGEX.get_or_init(|| {
            Regex::new(
                r"^(?:[^@/:]+@)?[^:/]+:(?:.*/)?(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
            )
            .unwrap()
        })
    };
    let caps = regex.captures(url)?;
    let owner = caps.name("owner")?.as_str();
    let name = caps.name("repo")?.as_str();
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(RepoSlug { owner: owner.to_string(), name: name.to_string() })
}

/// Determine which repository to talk to.
///
/// An explicit slug always wins; otherwise the remote URL is parsed.
pub fn resolve_repo_slug(explicit: Option<&str>, remote_url: Option<&str>) -> Result<RepoSlug> {
    if let Some(explicit) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return explicit.parse();
    }
    if let Some(remote_url) = remote_url {
        if let Some(slug) = parse_remote_url(remote_url) {
            tracing::debug!("Resolved repository {} from remote {}", slug, remote_url);
            return Ok(slug);
        }
        bail!("Unable to parse repository from remote URL '{remote_url}'");
    }
    bail!("Unable to determine repository; set GITHUB_REPOSITORY or pass --repo")
}
