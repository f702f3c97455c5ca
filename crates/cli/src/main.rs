mod cmd;
mod util;

use std::process::ExitCode;

use actions_watch_core::config::Config;
use anyhow::{Result, anyhow};
use argp::FromArgs;
use tokio::signal;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};
use typed_path::Utf8NativePathBuf;

use crate::util::{load_config, native_path};

#[derive(FromArgs, PartialEq, Debug)]
/// Follow GitHub Actions workflow runs from the command line.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// YAML config file with defaults
    config: Option<Utf8NativePathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Watch(cmd::watch::Args),
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    // Progress goes to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(env_filter))
        .init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let result = tokio::select! {
        result = run(args) => result,
        _ = signal::ctrl_c() => Err(anyhow!("Interrupted")),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Fatal: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: TopLevel) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    match args.command {
        SubCommand::Watch(c_args) => cmd::watch::run(c_args, &config).await,
    }
}
