use anyhow::Result;

use crate::app::{ByteSource, Display, LineEditor, LineOutcome};

/// What the executor made of a submitted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Complete,
    /// The line was rejected; the message is shown to the user.
    Failed(String),
}

/// Receives every accepted line.
pub trait LineExecutor {
    fn submit(&mut self, line: &str) -> ParseResult;
}

impl<F: FnMut(&str) -> ParseResult> LineExecutor for F {
    fn submit(&mut self, line: &str) -> ParseResult {
        self(line)
    }
}

impl<S: ByteSource, D: Display> LineEditor<S, D> {
    /// Read and submit lines until input ends. Returns the number of lines
    /// submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or drawing fails.
    pub fn run(&mut self, executor: &mut impl LineExecutor) -> Result<usize> {
        let mut submitted = 0;
        loop {
            match self.read_line()? {
                LineOutcome::Accepted(line) => {
                    self.submit_line(executor, &line);
                    submitted += 1;
                }
                LineOutcome::Cancelled => {}
                LineOutcome::Eof => return Ok(submitted),
            }
        }
    }

    /// Hand an accepted line to the executor, then record it in history.
    pub fn submit_line(&mut self, executor: &mut impl LineExecutor, line: &str) {
        if let ParseResult::Failed(message) = executor.submit(line) {
            tracing::warn!(line, %message, "line rejected");
            self.session.show_status(message);
        }
        if self.session.history.push(line) {
            tracing::debug!(entries = self.session.history.len(), "history appended");
        }
    }
}
