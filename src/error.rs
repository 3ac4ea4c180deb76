// error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("invalid server url `{url}`: {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("line editor: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Why a dispatch produced no Evaluation Result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid response from evaluator (HTTP {status})")]
    Decode {
        status: reqwest::StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
