//! Output sink abstraction for stage results.
//!
//! The [`Sink`] trait decouples the stage loop from the actual output
//! destination (stdout in the CLI). It has exactly two write modes: a raw
//! chunk with no terminator, and a line with a trailing newline. Tests use a
//! recording sink that captures every write together with its mode.

use std::io;

use anyhow::{Context, Result};

/// Destination for intermediate and final stage results.
///
/// The stage never reads from the sink; a failed write propagates unchanged
/// to the caller of the stage.
pub trait Sink {
    /// Write `text` with no terminator.
    fn write_chunk(&mut self, text: &str) -> Result<()>;

    /// Write `text` followed by a single `\n`.
    fn write_line(&mut self, text: &str) -> Result<()>;
}

/// Sink backed by any [`io::Write`] implementation.
///
/// Flushes after every write so chunk output is visible immediately even on
/// line-buffered streams.
pub struct WriterSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> Sink for WriterSink<W> {
    fn write_chunk(&mut self, text: &str) -> Result<()> {
        self.inner
            .write_all(text.as_bytes())
            .context("write chunk to sink")?;
        self.inner.flush().context("flush sink")?;
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        self.inner
            .write_all(text.as_bytes())
            .context("write line to sink")?;
        self.inner.write_all(b"\n").context("write line terminator")?;
        self.inner.flush().context("flush sink")?;
        Ok(())
    }
}

/// Sink writing to the process stdout.
pub fn stdout_sink() -> WriterSink<io::Stdout> {
    WriterSink::new(io::stdout())
}
