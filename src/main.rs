use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use evalsh::{repl, Config, ConsoleError};

/// Problems with no transcript line of their own (a failed dispatch task, a
/// drain that gave up, a lost printer) still reach stderr.
const DEFAULT_LOG_LEVEL: &str = "warn";

fn init_logging() {
    // The prompt owns stdout; logs go to stderr.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ConsoleError::Runtime)?;
    repl::start_repl(&config, runtime.handle()).context("console session failed")?;
    Ok(())
}
