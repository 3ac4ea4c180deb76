// dispatch.rs

use std::error::Error as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConsoleError, DispatchError, Result};
use crate::transcript::Severity;

pub const EVAL_PATH: &str = "/eval";
pub const CONNECT_ERROR_PREFIX: &str = "Error connecting to server: ";

#[derive(Debug, Serialize)]
pub struct EvalRequest<'a> {
    pub code: &'a str,
}

/// Body returned by the evaluator. Exactly one field is set by contract;
/// both are optional here so a sloppy evaluator still decodes.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct EvalResponse {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// How a single dispatch settled. Each one becomes exactly one transcript line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    EvaluationError(String),
    TransportFailure(String),
}

impl Outcome {
    pub fn from_response(response: EvalResponse) -> Self {
        match response.error {
            Some(error) if !error.is_empty() => Outcome::EvaluationError(error),
            _ => Outcome::Output(response.output.unwrap_or_default()),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Output(_) => Severity::Normal,
            Outcome::EvaluationError(_) | Outcome::TransportFailure(_) => Severity::Error,
        }
    }

    /// Text as it appears in the transcript. Evaluator errors are passed through unmodified.
    pub fn into_text(self) -> String {
        match self {
            Outcome::Output(text) | Outcome::EvaluationError(text) => text,
            Outcome::TransportFailure(reason) => format!("{CONNECT_ERROR_PREFIX}{reason}"),
        }
    }
}

impl From<DispatchError> for Outcome {
    fn from(err: DispatchError) -> Self {
        Outcome::TransportFailure(describe(&err))
    }
}

/// Error text followed by each distinct cause, `a: b: c`.
fn describe(err: &DispatchError) -> String {
    let mut text = err.to_string();
    let mut last = text.clone();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if cause_text != last {
            text.push_str(": ");
            text.push_str(&cause_text);
            last = cause_text;
        }
        source = cause.source();
    }
    text
}

/// Sends one command per POST to the evaluator. Cheap to clone; clones
/// share the connection pool.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl Dispatcher {
    pub fn new(server: &Url, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = server
            .join(EVAL_PATH)
            .map_err(|source| ConsoleError::InvalidServer {
                url: server.to_string(),
                source,
            })?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ConsoleError::HttpClient)?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn dispatch(&self, command: &str) -> Outcome {
        match self.evaluate(command).await {
            Ok(response) => {
                let outcome = Outcome::from_response(response);
                debug!(
                    endpoint = %self.endpoint,
                    error = outcome.severity() == Severity::Error,
                    "evaluator replied"
                );
                outcome
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, "dispatch failed: {err}");
                err.into()
            }
        }
    }

    async fn evaluate(&self, command: &str) -> std::result::Result<EvalResponse, DispatchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EvalRequest { code: command })
            .send()
            .await?;
        // Status is not checked; the body alone decides the outcome.
        let status = response.status();
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| DispatchError::Decode { status, source })
    }
}
