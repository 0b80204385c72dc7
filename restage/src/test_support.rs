//! Test-only doubles for the stage's collaborators.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;

use crate::sink::Sink;
use crate::transform::Transform;

/// One recorded sink write, with the mode it was made in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub text: String,
    /// True for `write_line`, false for `write_chunk`.
    pub newline: bool,
}

/// Sink that records every write instead of producing output.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub writes: Vec<RecordedWrite>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts of all writes, in order, ignoring the terminator mode.
    pub fn texts(&self) -> Vec<&str> {
        self.writes.iter().map(|w| w.text.as_str()).collect()
    }
}

impl Sink for RecordingSink {
    fn write_chunk(&mut self, text: &str) -> Result<()> {
        self.writes.push(RecordedWrite {
            text: text.to_string(),
            newline: false,
        });
        Ok(())
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        self.writes.push(RecordedWrite {
            text: text.to_string(),
            newline: true,
        });
        Ok(())
    }
}

/// Sink whose writes always fail, for exercising write-error paths.
#[derive(Debug, Default)]
pub struct FailingSink;

impl Sink for FailingSink {
    fn write_chunk(&mut self, _text: &str) -> Result<()> {
        Err(anyhow::anyhow!("sink is closed"))
    }

    fn write_line(&mut self, _text: &str) -> Result<()> {
        Err(anyhow::anyhow!("sink is closed"))
    }
}

/// Shared handle observing how many times a [`CountingTransform`] ran.
///
/// Remains usable after the transform is moved into a runner.
#[derive(Debug, Clone)]
pub struct ApplicationCounter(Rc<Cell<u32>>);

impl ApplicationCounter {
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

/// Wraps a transform and counts its applications.
pub struct CountingTransform<T: Transform> {
    inner: T,
    count: Rc<Cell<u32>>,
}

impl<T: Transform> CountingTransform<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            count: Rc::new(Cell::new(0)),
        }
    }

    pub fn counter(&self) -> ApplicationCounter {
        ApplicationCounter(Rc::clone(&self.count))
    }
}

impl<T: Transform> Transform for CountingTransform<T> {
    fn apply(&self, input: &str) -> Result<String> {
        self.count.set(self.count.get() + 1);
        self.inner.apply(input)
    }
}
