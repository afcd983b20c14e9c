//! Byte input: where key bytes come from and how they are classified.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Result of waiting for one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Byte(u8),
    /// No byte arrived within the timeout.
    Timeout,
    /// The input is closed.
    Eof,
}

/// A source of raw key bytes.
pub trait ByteSource {
    /// Wait for the next byte. `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying input fails.
    fn next_byte(&mut self, timeout: Option<Duration>) -> io::Result<ReadOutcome>;
}

/// Bytes fed from memory, for tests and benchmarks.
///
/// Once the script is exhausted, a read with a timeout times out and a read
/// without one reports end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    bytes: VecDeque<u8>,
}

impl ScriptedInput {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            bytes: bytes.as_ref().iter().copied().collect(),
        }
    }

    /// Queue more bytes after the ones not yet read.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) {
        self.bytes.extend(bytes.as_ref());
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

impl ByteSource for ScriptedInput {
    fn next_byte(&mut self, timeout: Option<Duration>) -> io::Result<ReadOutcome> {
        Ok(match (self.bytes.pop_front(), timeout) {
            (Some(byte), _) => ReadOutcome::Byte(byte),
            (None, Some(_)) => ReadOutcome::Timeout,
            (None, None) => ReadOutcome::Eof,
        })
    }
}

/// Standard input, read on a background thread so that reads can time out.
pub struct TerminalInput {
    rx: Receiver<io::Result<Vec<u8>>>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl TerminalInput {
    /// Start the reader thread. The thread exits when stdin reaches end of
    /// file or the receiver is dropped.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 256];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            pending: VecDeque::new(),
            closed: false,
        }
    }
}

impl ByteSource for TerminalInput {
    fn next_byte(&mut self, timeout: Option<Duration>) -> io::Result<ReadOutcome> {
        if let Some(byte) = self.pending.pop_front() {
            return Ok(ReadOutcome::Byte(byte));
        }
        if self.closed {
            return Ok(ReadOutcome::Eof);
        }
        let chunk = match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(ReadOutcome::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    self.closed = true;
                    return Ok(ReadOutcome::Eof);
                }
            },
            None => match self.rx.recv() {
                Ok(chunk) => chunk,
                Err(_) => {
                    self.closed = true;
                    return Ok(ReadOutcome::Eof);
                }
            },
        };
        self.pending.extend(chunk?);
        Ok(self
            .pending
            .pop_front()
            .map_or(ReadOutcome::Timeout, ReadOutcome::Byte))
    }
}

/// How a raw input byte participates in character decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// A complete single-byte printable character.
    Printable,
    /// A control byte other than ESC.
    Control,
    /// Starts a multi-byte character.
    LeadByte,
    /// Continues a multi-byte character (or cannot start one).
    ContinuationByte,
    /// ESC, the prefix of terminal escape sequences and meta keys.
    MetaEscape,
}

pub trait ByteClassifier {
    fn classify(&self, byte: u8) -> ByteClass;
}

/// Classification for UTF-8 input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Classifier;

impl ByteClassifier for Utf8Classifier {
    fn classify(&self, byte: u8) -> ByteClass {
        match byte {
            0x1b => ByteClass::MetaEscape,
            0x00..=0x1f | 0x7f => ByteClass::Control,
            0x20..=0x7e => ByteClass::Printable,
            0xc2..=0xf4 => ByteClass::LeadByte,
            _ => ByteClass::ContinuationByte,
        }
    }
}

/// Cooperative interrupt for a running editor.
///
/// Clones share one flag. Raising it cancels the reverse search if one is
/// active, otherwise the line being read. The flag is checked before every
/// input read.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}
