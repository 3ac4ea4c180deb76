pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod render;
pub mod repl;
pub mod transcript;

pub use config::Config;
pub use console::{Command, Console, Effect, KeyPress, Pending, Ticket};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{ConsoleError, Result};
pub use transcript::{Severity, Transcript, TranscriptLine};
