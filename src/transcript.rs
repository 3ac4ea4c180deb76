// transcript.rs

use std::fmt;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptLine {
    pub text: String,
    pub severity: Severity,
}

impl TranscriptLine {
    pub fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Normal,
        }
    }
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Receives each line as it becomes the newest entry. Implementations are
/// responsible for keeping the newest line visible.
pub trait Render: Send {
    fn render(&mut self, line: &TranscriptLine);
}

impl<F> Render for F
where
    F: FnMut(&TranscriptLine) + Send,
{
    fn render(&mut self, line: &TranscriptLine) {
        self(line)
    }
}

pub type LineSender = mpsc::UnboundedSender<TranscriptLine>;

/// Renders transcript lines on a thread of its own. A renderer that blocks
/// (a terminal waiting on its reader) only stalls this thread, never the
/// side that appends.
pub struct Printer {
    thread: JoinHandle<()>,
}

impl Printer {
    pub fn spawn(mut renderer: impl Render + 'static) -> (LineSender, Printer) {
        let (lines, mut rx) = mpsc::unbounded_channel::<TranscriptLine>();
        let thread = thread::spawn(move || {
            while let Some(line) = rx.blocking_recv() {
                renderer.render(&line);
            }
        });
        (lines, Printer { thread })
    }

    /// Returns once every queued line is rendered. Only finishes after all
    /// senders are dropped.
    pub fn join(self) {
        if self.thread.join().is_err() {
            warn!("transcript printer panicked");
        }
    }
}

/// Append-only log of echoed commands and dispatch outcomes.
pub struct Transcript {
    lines: Vec<TranscriptLine>,
    sink: Option<LineSender>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            sink: None,
        }
    }

    pub fn with_sink(sink: LineSender) -> Self {
        Self {
            lines: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Records the line and queues it for rendering. Never blocks.
    pub fn append(&mut self, text: impl Into<String>, severity: Severity) {
        let line = TranscriptLine {
            text: text.into(),
            severity,
        };
        if let Some(sink) = &self.sink {
            if sink.send(line.clone()).is_err() {
                warn!("transcript printer is gone; lines are only recorded");
                self.sink = None;
            }
        }
        self.lines.push(line);
    }

    /// Stops queueing lines for rendering so the printer can finish.
    pub fn detach(&mut self) {
        self.sink = None;
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptLine> {
        self.lines.last()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcript")
            .field("lines", &self.lines)
            .field("attached", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    #[test]
    fn append_records_and_printer_renders_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (lines, printer) = Printer::spawn(move |line: &TranscriptLine| {
            sink.lock().unwrap().push(line.clone());
        });
        let mut transcript = Transcript::with_sink(lines);
        transcript.append(">> 1", Severity::Normal);
        transcript.append("boom", Severity::Error);
        transcript.detach();
        printer.join();

        let expected = vec![TranscriptLine::normal(">> 1"), TranscriptLine::error("boom")];
        assert_eq!(transcript.lines(), expected.as_slice());
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn append_survives_a_stopped_printer() {
        let (lines, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut transcript = Transcript::with_sink(lines);
        transcript.append("still recorded", Severity::Normal);
        assert_eq!(transcript.lines(), &[TranscriptLine::normal("still recorded")]);
    }

    #[test]
    fn plain_transcript_only_records() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());
        transcript.append("", Severity::Normal);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last(), Some(&TranscriptLine::normal("")));
        assert!(!transcript.last().unwrap().is_error());
    }
}
