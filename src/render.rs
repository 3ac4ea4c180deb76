// render.rs

use std::io::{self, Write};

use owo_colors::OwoColorize;
use rustyline::ExternalPrinter;
use tracing::warn;

use crate::transcript::{Render, TranscriptLine};

fn styled(line: &TranscriptLine, color: bool) -> String {
    // Evaluator output usually ends with the newline of its last print.
    let text = line.text.trim_end_matches('\n');
    if color && line.is_error() {
        text.red().to_string()
    } else {
        text.to_string()
    }
}

fn writeln_ignore_broken_pipe<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    match writeln!(w, "{s}").and_then(|()| w.flush()) {
        Err(ref e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Prints above an active prompt and redraws it, so the newest line stays in view.
pub struct PrinterRenderer<P> {
    printer: P,
    color: bool,
}

impl<P: ExternalPrinter + Send> PrinterRenderer<P> {
    pub fn new(printer: P, color: bool) -> Self {
        Self { printer, color }
    }
}

impl<P: ExternalPrinter + Send> Render for PrinterRenderer<P> {
    fn render(&mut self, line: &TranscriptLine) {
        let mut text = styled(line, self.color);
        text.push('\n');
        if let Err(err) = self.printer.print(text) {
            warn!("failed to print transcript line: {err}");
        }
    }
}

/// Plain sequential output, used when no prompt is being drawn.
pub struct WriterRenderer<W> {
    writer: W,
    color: bool,
}

impl<W: Write + Send> WriterRenderer<W> {
    pub fn new(writer: W, color: bool) -> Self {
        Self { writer, color }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterRenderer<io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write + Send> Render for WriterRenderer<W> {
    fn render(&mut self, line: &TranscriptLine) {
        if let Err(err) = writeln_ignore_broken_pipe(&mut self.writer, &styled(line, self.color)) {
            warn!("failed to write transcript line: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_writer_has_no_escapes() {
        let mut renderer = WriterRenderer::new(Vec::new(), false);
        renderer.render(&TranscriptLine::normal(">> 1/0"));
        renderer.render(&TranscriptLine::error("division by zero"));
        renderer.render(&TranscriptLine::normal("hello\n"));
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, ">> 1/0\ndivision by zero\nhello\n");
    }

    #[test]
    fn errors_are_red_when_colored() {
        let mut renderer = WriterRenderer::new(Vec::new(), true);
        renderer.render(&TranscriptLine::normal("ok"));
        renderer.render(&TranscriptLine::error("bad"));
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, format!("ok\n{}\n", "bad".red()));
    }
}
