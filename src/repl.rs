// repl.rs

use rustyline::error::ReadlineError;
use rustyline::history::{History, SearchDirection, SearchResult};
use rustyline::{
    Cmd, ConditionalEventHandler, Config as EditorConfig, Editor, Event, EventContext,
    EventHandler, KeyCode, KeyEvent, Modifiers, Movement, RepeatCount,
};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::console::{complete, lock, shared, Console, Effect, KeyPress, SharedConsole};
use crate::dispatch::Dispatcher;
use crate::error::{ConsoleError, Result};
use crate::render::{PrinterRenderer, WriterRenderer};
use crate::transcript::{LineSender, Printer, Transcript};

type ConsoleEditor = Editor<(), RecallSlot>;

/// The editor's only history entry: the text of the latest recall. The
/// console owns the real history; recalls reach the buffer through
/// history navigation because that leaves the cursor after the text.
#[derive(Clone, Default)]
struct RecallSlot(Arc<Mutex<String>>);

impl RecallSlot {
    fn stage(&self, text: String) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }
}

impl History for RecallSlot {
    fn get(&self, _index: usize, _dir: SearchDirection) -> rustyline::Result<Option<SearchResult>> {
        let entry = self.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        // `idx == len` keeps the editor at the live-edit position, so the
        // next recall comes back here as well.
        Ok(Some(SearchResult {
            entry: Cow::Owned(entry),
            idx: self.len(),
            pos: 0,
        }))
    }

    fn add(&mut self, _line: &str) -> rustyline::Result<bool> {
        Ok(false)
    }

    fn add_owned(&mut self, _line: String) -> rustyline::Result<bool> {
        Ok(false)
    }

    fn len(&self) -> usize {
        1
    }

    fn is_empty(&self) -> bool {
        false
    }

    fn set_max_len(&mut self, _len: usize) -> rustyline::Result<()> {
        Ok(())
    }

    fn ignore_dups(&mut self, _yes: bool) -> rustyline::Result<()> {
        Ok(())
    }

    fn ignore_space(&mut self, _yes: bool) {}

    fn save(&mut self, _path: &Path) -> rustyline::Result<()> {
        Ok(())
    }

    fn append(&mut self, _path: &Path) -> rustyline::Result<()> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> rustyline::Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> rustyline::Result<()> {
        Ok(())
    }

    fn search(
        &self,
        _term: &str,
        _start: usize,
        _dir: SearchDirection,
    ) -> rustyline::Result<Option<SearchResult>> {
        Ok(None)
    }

    fn starts_with(
        &self,
        _term: &str,
        _start: usize,
        _dir: SearchDirection,
    ) -> rustyline::Result<Option<SearchResult>> {
        Ok(None)
    }
}

/// Editor command that carries out `effect`; `fallback` applies to keys the
/// console does not intercept.
fn editor_command(effect: Effect, slot: &RecallSlot, fallback: Option<Cmd>) -> Option<Cmd> {
    match effect {
        Effect::SetField(text) if text.is_empty() => {
            Some(Cmd::Replace(Movement::WholeBuffer, None))
        }
        Effect::SetField(text) => {
            slot.stage(text);
            Some(Cmd::PreviousHistory)
        }
        Effect::PassThrough => fallback,
        Effect::Handled | Effect::Dispatch(_) => Some(Cmd::Noop),
    }
}

/// Feeds one intercepted key into the console.
struct KeyHandler {
    console: SharedConsole,
    slot: RecallSlot,
    key: KeyPress,
    fallback: Option<Cmd>,
}

impl KeyHandler {
    fn press(&self, line: &str) -> Option<Cmd> {
        let effect = {
            let mut console = lock(&self.console);
            console.key(KeyPress::Edit(line.to_string()));
            console.key(self.key.clone())
        };
        editor_command(effect, &self.slot, self.fallback.clone())
    }
}

impl ConditionalEventHandler for KeyHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext,
    ) -> Option<Cmd> {
        self.press(ctx.line())
    }
}

fn bind_keys(rl: &mut ConsoleEditor, console: &SharedConsole, slot: &RecallSlot) {
    let newline = KeyPress::Submit { newline: true };
    let bindings = [
        (KeyEvent(KeyCode::Up, Modifiers::NONE), KeyPress::RecallPrevious, None),
        (KeyEvent::ctrl('P'), KeyPress::RecallPrevious, None),
        (KeyEvent(KeyCode::Down, Modifiers::NONE), KeyPress::RecallNext, None),
        (KeyEvent::ctrl('N'), KeyPress::RecallNext, None),
        (KeyEvent(KeyCode::Enter, Modifiers::SHIFT), newline.clone(), Some(Cmd::Newline)),
        (KeyEvent(KeyCode::Enter, Modifiers::ALT), newline, Some(Cmd::Newline)),
    ];
    for (event, key, fallback) in bindings {
        let handler = KeyHandler {
            console: Arc::clone(console),
            slot: slot.clone(),
            key,
            fallback,
        };
        rl.bind_sequence(event, EventHandler::Conditional(Box::new(handler)));
    }
    // The slot is not a history to jump around in.
    rl.bind_sequence(KeyEvent::alt('<'), Cmd::Noop);
    rl.bind_sequence(KeyEvent::alt('>'), Cmd::Noop);
}

fn printer_for(rl: &mut ConsoleEditor, color: bool) -> (LineSender, Printer) {
    if !std::io::stdin().is_terminal() {
        return Printer::spawn(WriterRenderer::stdout(color));
    }
    match rl.create_external_printer() {
        Ok(printer) => Printer::spawn(PrinterRenderer::new(printer, color)),
        Err(err) => {
            debug!("external printer unavailable, writing to stdout: {err}");
            Printer::spawn(WriterRenderer::stdout(color))
        }
    }
}

fn reap(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        if let Err(err) = joined {
            warn!("dispatch task failed: {err}");
        }
    }
}

/// Runs the console until end of input. Dispatches run on `runtime`; the
/// line editor blocks this thread.
pub fn start_repl(config: &Config, runtime: &Handle) -> Result<()> {
    let dispatcher = Dispatcher::new(&config.server, config.timeout())?;
    let editor_config = EditorConfig::builder().auto_add_history(false).build();
    let slot = RecallSlot::default();
    let mut rl = ConsoleEditor::with_history(editor_config, slot.clone())?;
    let (lines, printer) = printer_for(&mut rl, config.color());
    let console = shared(Console::new(Transcript::with_sink(lines)));
    bind_keys(&mut rl, &console, &slot);
    info!(endpoint = %dispatcher.endpoint(), "console ready");

    let mut tasks = JoinSet::new();
    let outcome = loop {
        let line = match rl.readline(&config.prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break Ok(()),
            Err(err) => break Err(ConsoleError::from(err)),
        };
        let effect = lock(&console).submit_line(&line);
        if let Effect::Dispatch(pending) = effect {
            let console = Arc::clone(&console);
            let dispatcher = dispatcher.clone();
            tasks.spawn_on(
                async move { complete(&console, &dispatcher, pending).await },
                runtime,
            );
        }
        reap(&mut tasks);
    };

    let remaining = lock(&console).in_flight();
    if remaining > 0 {
        debug!(remaining, "waiting for in-flight commands");
        let drained = runtime.block_on(async {
            tokio::time::timeout(config.drain(), async {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(err) = joined {
                        warn!("dispatch task failed: {err}");
                    }
                }
            })
            .await
        });
        if drained.is_err() {
            warn!(
                remaining = lock(&console).in_flight(),
                "gave up waiting for in-flight commands"
            );
        }
    }

    // The editor owns the receiving end of the external printer; dropping it
    // lets a print that is still queued fail instead of waiting forever.
    lock(&console).detach_transcript();
    drop(rl);
    printer.join();
    outcome
}
