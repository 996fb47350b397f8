use crate::error::Result;
use crate::markdown::MarkdownStyler;
use crate::spinner::Handoff;
use futures::stream::{Stream, StreamExt};
use std::io::Write;

/// What a finished stream produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResponse {
    /// Exact concatenation of every delta, unstyled
    pub content: String,
    pub lines: usize,
}

/// Reassembles streamed deltas into lines and prints them styled.
///
/// Nothing is written to `out` before the spinner has handed over the
/// terminal through `handoff`.
pub struct StreamRenderer<'a, W: Write> {
    out: W,
    styler: MarkdownStyler,
    handoff: &'a Handoff,
    handed_off: bool,
    line_buffer: String,
    content: String,
    lines: usize,
}

impl<'a, W: Write> StreamRenderer<'a, W> {
    pub fn new(out: W, plain: bool, handoff: &'a Handoff) -> Self {
        Self {
            out,
            styler: MarkdownStyler::new(plain),
            handoff,
            handed_off: false,
            line_buffer: String::new(),
            content: String::new(),
            lines: 0,
        }
    }

    /// Drains `deltas` to the end. The first error stops rendering; lines
    /// already printed stay on screen.
    ///
    /// Waiting for the spinner blocks the calling thread, so drive this with
    /// `Runtime::block_on` rather than spawning it onto a worker.
    pub async fn render<S>(mut self, deltas: S) -> Result<RenderedResponse>
    where
        S: Stream<Item = Result<String>>,
    {
        futures::pin_mut!(deltas);

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => self.push(&delta)?,
                Err(e) => {
                    tracing::error!(error = %e, lines = self.lines, "Response stream failed");
                    self.handoff.abort();
                    return Err(e);
                }
            }
        }

        self.finish()
    }

    /// Buffers one delta and prints every line it completes.
    pub fn push(&mut self, delta: &str) -> Result<()> {
        self.line_buffer.push_str(delta);
        self.content.push_str(delta);

        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            self.print_line(&line[..pos])?;
        }
        Ok(())
    }

    /// Flushes an unterminated last line and ends the turn with a blank line.
    pub fn finish(mut self) -> Result<RenderedResponse> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            self.print_line(&line)?;
        }

        if self.styler.inside_fence() {
            tracing::debug!("Response ended inside an open code fence");
        }

        self.take_terminal();
        writeln!(self.out)?;
        self.out.flush()?;

        Ok(RenderedResponse {
            content: self.content,
            lines: self.lines,
        })
    }

    /// Waits for the spinner once; later calls are free.
    fn take_terminal(&mut self) {
        if !self.handed_off {
            self.handoff.begin_output();
            self.handed_off = true;
        }
    }

    fn print_line(&mut self, line: &str) -> Result<()> {
        self.take_terminal();
        let styled = self.styler.style(line);
        writeln!(self.out, "{}", styled)?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }
}
