// config.rs

use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(name = "evalsh", version, about = "Line console for a remote evaluation service")]
pub struct Config {
    /// Base URL of the evaluator; commands are posted to `<server>/eval`.
    #[arg(long, env = "EVALSH_SERVER", default_value = "http://localhost:8080")]
    pub server: Url,

    /// Per-request timeout. Without it the transport's own behaviour applies.
    #[arg(long, env = "EVALSH_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// How long to wait for in-flight commands when the session ends.
    #[arg(long, default_value_t = 5)]
    pub drain_secs: u64,

    #[arg(long, default_value = "> ")]
    pub prompt: String,

    /// Never style error lines.
    #[arg(long)]
    pub no_color: bool,
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }

    pub fn color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}
