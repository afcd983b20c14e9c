//! The editor session and its dispatch loop.
//!
//! The structure follows The Elm Architecture:
//! - [`EditorSession`]: the complete editor state
//! - [`Widget`](crate::widget::Widget): every editing action
//! - [`apply`]: runs one widget against the session
//! - [`LineEditor::read_line`]: reads keys, dispatches widgets and redraws

mod effects;
mod event_loop;
mod input;
mod model;
mod render;
mod update;

pub use effects::{LineExecutor, ParseResult};
pub use event_loop::{DEFAULT_KEY_TIMEOUT, MAX_MACRO_INPUT};
pub use input::{
    ByteClass, ByteClassifier, ByteSource, Interrupt, ReadOutcome, ScriptedInput, TerminalInput,
    Utf8Classifier,
};
pub use model::{DispatchState, EditorSession};
pub use render::{Display, LineView, NullDisplay, RawModeGuard, TerminalDisplay, visible_text};
pub use update::{Flow, apply};

use std::collections::VecDeque;
use std::time::Duration;

/// How a call to [`LineEditor::read_line`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Accepted(String),
    Cancelled,
    /// Input is exhausted; no further lines can be read.
    Eof,
}

/// Reads lines from a byte source, drawing on a display.
pub struct LineEditor<S, D> {
    session: EditorSession,
    input: S,
    display: D,
    classifier: Box<dyn ByteClassifier>,
    prompt: String,
    key_timeout: Duration,
    interrupt: Interrupt,
    pushback: VecDeque<u8>,
    /// Send-string bytes fed back during the current line.
    macro_input: usize,
}

impl<S: ByteSource, D: Display> LineEditor<S, D> {
    /// Create an editor over `session`.
    pub fn new(session: EditorSession, input: S, display: D) -> Self {
        Self {
            session,
            input,
            display,
            classifier: Box::new(Utf8Classifier),
            prompt: String::new(),
            key_timeout: DEFAULT_KEY_TIMEOUT,
            interrupt: Interrupt::new(),
            pushback: VecDeque::new(),
            macro_input: 0,
        }
    }

    /// Set the prompt drawn before the line.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set how long to wait for the next byte of a multi-byte key sequence.
    #[must_use]
    pub const fn with_key_timeout(mut self, timeout: Duration) -> Self {
        self.key_timeout = timeout;
        self
    }

    /// Replace the byte classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl ByteClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Share an interrupt handle with other threads.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// A handle that interrupts this editor when raised.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub const fn session(&self) -> &EditorSession {
        &self.session
    }

    pub const fn session_mut(&mut self) -> &mut EditorSession {
        &mut self.session
    }

    pub const fn display(&self) -> &D {
        &self.display
    }

    /// Give back the session, e.g. to save its history.
    pub fn into_session(self) -> EditorSession {
        self.session
    }
}
