use std::fmt::Write;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Header carrying the Unix time (in seconds) at which the rate limit window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Details of a rate-limited response.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit<'a> {
    /// The `message` field of the API error body.
    pub message: &'a str,
    /// Raw value of the reset header, if present.
    pub reset: Option<&'a str>,
    pub documentation_url: Option<&'a str>,
    /// Whether the request carried a token.
    pub authenticated: bool,
}

/// Whether an API error message refers to rate limiting.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

impl RateLimit<'_> {
    /// Compose the message shown when the watcher gives up due to rate limiting.
    pub fn describe(&self, now: OffsetDateTime) -> String {
        let mut out = String::from("GitHub API rate limit exceeded");
        let message = self.message.trim().trim_end_matches('.');
        if !message.is_empty() {
            write!(out, ": {message}").unwrap();
        }
        out.push('.');
        if let Some(raw) = self.reset.map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse::<i64>() {
                Ok(epoch) if epoch > now.unix_timestamp() => {
                    let minutes = (epoch - now.unix_timestamp() + 59) / 60;
                    let unit = if minutes == 1 { "minute" } else { "minutes" };
                    write!(out, " Resets in ~{minutes} {unit}").unwrap();
                    if let Some(at) = OffsetDateTime::from_unix_timestamp(epoch)
                        .ok()
                        .and_then(|t| t.format(&Rfc3339).ok())
                    {
                        write!(out, " ({at})").unwrap();
                    }
                    out.push('.');
                }
                _ => write!(out, " Rate limit resets at {raw}.").unwrap(),
            }
        }
        if self.authenticated {
            out.push_str(" Wait for the limit to reset before retrying.");
        } else {
            out.push_str(" Set GITHUB_TOKEN (or GH_TOKEN) to authenticate and raise the limit.");
        }
        if let Some(url) = self.documentation_url.filter(|s| !s.is_empty()) {
            write!(out, " See {url}").unwrap();
        }
        out
    }
}
