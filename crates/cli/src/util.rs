use std::{fs::File, io::BufReader, process::Command};

use actions_watch_core::config::Config;
use anyhow::{Context, Result};
use typed_path::Utf8NativePathBuf;

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

pub fn load_config(path: &Utf8NativePathBuf) -> Result<Config> {
    let file = File::open(path.with_platform_encoding())
        .with_context(|| format!("Failed to open config file {}", path))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config file {}", path))
}

/// URL of the `origin` remote of the repository in the working directory.
pub fn git_remote_url() -> Option<String> {
    match Command::new("git").args(["config", "--get", "remote.origin.url"]).output() {
        Ok(output) if output.status.success() => {
            let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!url.is_empty()).then_some(url)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Failed to run git: {}", e);
            None
        }
    }
}
