// console.rs

//! Interaction state of the console.
//!
//! Every input is a discrete transition on [`Console`]: key presses go
//! through [`Console::key`], network completions through
//! [`Console::settle`]. Neither blocks, so several dispatches can be in
//! flight at once and their results land in the transcript in completion
//! order, not submission order. The echo line for a command is always
//! appended before its result because it is written inside the submit
//! transition itself.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::dispatch::{Dispatcher, Outcome};
use crate::history::History;
use crate::transcript::{Severity, Transcript};

pub const ECHO_PREFIX: &str = ">> ";

/// Trimmed, non-empty text submitted to the evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequence number of a dispatch, increasing in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pending {
    pub ticket: Ticket,
    pub command: Command,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyPress {
    /// Commit key. `newline` is set when the modifier that inserts a line break is held.
    Submit { newline: bool },
    RecallPrevious,
    RecallNext,
    /// Any other key; carries the field text after the editor applied it.
    Edit(String),
}

/// What the host must do after a key press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Not intercepted; the editor's default behaviour applies.
    PassThrough,
    /// Intercepted with nothing further to do.
    Handled,
    /// Intercepted; replace the field with this text.
    SetField(String),
    /// Intercepted; start this dispatch and call [`Console::settle`] when it completes.
    Dispatch(Pending),
}

#[derive(Debug, Default)]
pub struct Console {
    field: String,
    history: History,
    cursor: usize,
    in_flight: BTreeSet<Ticket>,
    next_ticket: u64,
    transcript: Transcript,
}

impl Console {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            field: String::new(),
            history: History::new(),
            cursor: 0,
            in_flight: BTreeSet::new(),
            next_ticket: 0,
            transcript,
        }
    }

    pub fn key(&mut self, key: KeyPress) -> Effect {
        match key {
            KeyPress::Submit { newline: true } => Effect::PassThrough,
            KeyPress::Submit { newline: false } => self.submit(),
            KeyPress::RecallPrevious => self.recall_previous(),
            KeyPress::RecallNext => self.recall_next(),
            KeyPress::Edit(text) => {
                self.field = text;
                Effect::PassThrough
            }
        }
    }

    /// Puts `text` in the field and presses the commit key.
    pub fn submit_line(&mut self, text: &str) -> Effect {
        self.field = text.to_string();
        self.key(KeyPress::Submit { newline: false })
    }

    /// Routes a completed dispatch to the transcript and clears the field.
    /// Returns `false` for a ticket that is not in flight; nothing changes then.
    pub fn settle(&mut self, ticket: Ticket, outcome: Outcome) -> bool {
        if !self.in_flight.remove(&ticket) {
            debug!(%ticket, "ignoring settle for unknown dispatch");
            return false;
        }
        let severity = outcome.severity();
        self.transcript.append(outcome.into_text(), severity);
        self.field.clear();
        debug!(%ticket, in_flight = self.in_flight.len(), "dispatch settled");
        true
    }

    fn submit(&mut self) -> Effect {
        let Some(command) = Command::parse(&self.field) else {
            return Effect::Handled;
        };
        self.transcript.append(format!("{ECHO_PREFIX}{command}"), Severity::Normal);
        self.history.push(command.as_str());
        self.cursor = self.history.len();

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight.insert(ticket);
        debug!(%ticket, in_flight = self.in_flight.len(), "dispatching");
        Effect::Dispatch(Pending { ticket, command })
    }

    fn recall_previous(&mut self) -> Effect {
        if self.cursor == 0 {
            return Effect::Handled;
        }
        self.cursor -= 1;
        self.show_cursor()
    }

    fn recall_next(&mut self) -> Effect {
        if self.cursor + 1 < self.history.len() {
            self.cursor += 1;
            self.show_cursor()
        } else {
            self.cursor = self.history.len();
            self.field.clear();
            Effect::SetField(String::new())
        }
    }

    fn show_cursor(&mut self) -> Effect {
        self.field = self.history.get(self.cursor).unwrap_or_default().to_string();
        Effect::SetField(self.field.clone())
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stops rendering new lines; they are still recorded.
    pub fn detach_transcript(&mut self) {
        self.transcript.detach();
    }
}

pub type SharedConsole = Arc<Mutex<Console>>;

pub fn shared(console: Console) -> SharedConsole {
    Arc::new(Mutex::new(console))
}

/// Transitions never panic midway, so a poisoned lock still guards consistent state.
pub fn lock(console: &SharedConsole) -> MutexGuard<'_, Console> {
    console.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one dispatch to completion and feeds the outcome back. The lock is
/// not held across the request.
pub async fn complete(console: &SharedConsole, dispatcher: &Dispatcher, pending: Pending) {
    let outcome = dispatcher.dispatch(pending.command.as_str()).await;
    lock(console).settle(pending.ticket, outcome);
}
