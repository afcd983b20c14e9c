use std::time::Duration;

use anyhow::Result;

use crate::app::{
    ByteClass, ByteSource, DispatchState, Display, Flow, LineEditor, LineOutcome, LineView,
    ReadOutcome, apply,
};
use crate::error::ZleError;
use crate::keymap::{KeyBinding, KeyMatch, format_key_sequence, utf8_len};

/// How long to wait for the next byte of a multi-byte key sequence before
/// settling for the longest sequence matched so far.
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_millis(40);

/// Upper bound on bytes that send-string bindings may feed back into the
/// input while one line is read. Expansions past it are refused, so a
/// macro that expands to itself stops.
pub const MAX_MACRO_INPUT: usize = 4096;

/// Control sequence introducer sent by terminal function keys.
const CSI: &[u8] = b"\x1b[";
const MAX_CSI_LEN: usize = 32;

/// One decoded unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyInput {
    /// A bound sequence (or a fallback action for unbound input), with the
    /// character it was typed as.
    Action { binding: KeyBinding, ch: Option<char> },
    Eof,
}

impl<S: ByteSource, D: Display> LineEditor<S, D> {
    /// Read one line.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte source or the display fails. Editing
    /// errors never end the session: a line that outgrows the buffer is
    /// cancelled, and other errors are shown as a status message.
    pub fn read_line(&mut self) -> Result<LineOutcome> {
        self.session.begin_line();
        self.macro_input = 0;
        self.refresh()?;
        loop {
            if self.interrupt.take() {
                if self.session.is_searching() {
                    tracing::debug!("interrupt cancelled search");
                    if let Err(err) = self.session.cancel_search() {
                        return self.abort_line(&err);
                    }
                    self.refresh()?;
                    continue;
                }
                tracing::debug!("interrupt cancelled line");
                return self.finish(DispatchState::Cancelled, LineOutcome::Cancelled);
            }

            if self.session.quote_next {
                self.session.quote_next = false;
                match self.read_char()? {
                    Some(ch) => {
                        if let Err(err) = self.session.buffer.insert_char(ch) {
                            return self.abort_line(&err);
                        }
                    }
                    None => return self.finish(DispatchState::Cancelled, LineOutcome::Eof),
                }
                self.refresh()?;
                continue;
            }

            let (binding, ch) = match self.read_key()? {
                KeyInput::Action { binding, ch } => (binding, ch),
                KeyInput::Eof => return self.finish(DispatchState::Cancelled, LineOutcome::Eof),
            };
            if !self.session.is_searching() {
                self.session.status = None;
            }

            match binding {
                KeyBinding::SendString(bytes) => self.unread_macro(&bytes),
                KeyBinding::Thingy(name) => match self.dispatch(&name, ch) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Done) => {
                        let line = self.session.buffer.as_string();
                        tracing::debug!(%line, "line accepted");
                        return self.finish(DispatchState::Done, LineOutcome::Accepted(line));
                    }
                    Ok(Flow::Cancelled) => {
                        return self.finish(DispatchState::Cancelled, LineOutcome::Cancelled);
                    }
                    Ok(Flow::Eof) => {
                        return self.finish(DispatchState::Cancelled, LineOutcome::Eof);
                    }
                    Err(err @ ZleError::CapacityExceeded { .. }) => return self.abort_line(&err),
                    Err(err) => {
                        if err.is_registry_error() {
                            tracing::warn!(%err, widget = %name, "widget lookup failed");
                        } else {
                            tracing::debug!(%err, widget = %name, "widget failed");
                        }
                        self.session.show_status(err.to_string());
                        self.session.ring_bell();
                    }
                },
            }
            self.refresh()?;
        }
    }

    /// Resolve `name` and run its widget.
    fn dispatch(&mut self, name: &str, ch: Option<char>) -> Result<Flow, ZleError> {
        let resolved = self.session.registry.resolve(name)?;
        tracing::debug!(name, widget = %resolved.widget, hops = resolved.hops, "dispatch");
        self.session.last_char = ch;
        apply(resolved.widget, resolved.flags, &mut self.session)
    }

    /// Read bytes until they form one key: the longest bound sequence, an
    /// unbound sequence, or a single character handed to the keymap's
    /// fallback action.
    fn read_key(&mut self) -> Result<KeyInput> {
        loop {
            let Some(first) = self.next_byte(None)? else {
                return Ok(KeyInput::Eof);
            };
            let mut seq = vec![first];
            let mut best: Option<(usize, KeyBinding)> = None;
            loop {
                match self.session.keymaps.match_prefix(&seq) {
                    KeyMatch::NoMatch => break,
                    KeyMatch::Partial => {}
                    KeyMatch::Exact(binding) => {
                        best = Some((seq.len(), binding));
                        break;
                    }
                    KeyMatch::Ambiguous(binding) => best = Some((seq.len(), binding)),
                }
                self.enter_escape();
                match self.next_byte(Some(self.key_timeout))? {
                    Some(byte) => seq.push(byte),
                    None => break,
                }
            }
            self.leave_escape();

            if let Some((len, binding)) = best {
                self.unread(&seq[len..]);
                tracing::debug!(seq = %format_key_sequence(&seq[..len]), %binding, "key matched");
                let ch = std::str::from_utf8(&seq[..len])
                    .ok()
                    .and_then(|text| text.chars().last());
                return Ok(KeyInput::Action { binding, ch });
            }

            let first_class = self.classifier.classify(first);
            if seq.len() > 1 && first_class != ByteClass::LeadByte {
                return self.unbound_sequence(seq);
            }
            self.unread(&seq[1..]);
            let fallback = self.session.keymaps.fallback();
            match first_class {
                ByteClass::Printable => {
                    let action = fallback.printable.clone();
                    return Ok(KeyInput::Action {
                        binding: KeyBinding::Thingy(action),
                        ch: Some(char::from(first)),
                    });
                }
                ByteClass::Control | ByteClass::MetaEscape => {
                    let action = fallback.other.clone();
                    return Ok(KeyInput::Action {
                        binding: KeyBinding::Thingy(action),
                        ch: Some(char::from(first)),
                    });
                }
                ByteClass::LeadByte => {
                    let action = fallback.printable.clone();
                    if let Some(ch) = self.complete_char(first)? {
                        return Ok(KeyInput::Action {
                            binding: KeyBinding::Thingy(action),
                            ch: Some(ch),
                        });
                    }
                }
                ByteClass::ContinuationByte => {
                    tracing::warn!(byte = first, "dropped stray continuation byte");
                }
            }
        }
    }

    /// A prefix of bound sequences followed by a byte that continues none of
    /// them is consumed whole and sent to the fallback for non-printable
    /// input. An unfinished `ESC [` control sequence is read up to its final
    /// byte. A final lead byte starts the next key instead, so a character
    /// typed after the prefix is not split into stray bytes.
    fn unbound_sequence(&mut self, mut seq: Vec<u8>) -> Result<KeyInput> {
        if let Some(&last) = seq.last()
            && self.classifier.classify(last) == ByteClass::LeadByte
        {
            self.unread(&[last]);
            seq.pop();
        } else if seq.starts_with(CSI) {
            while seq.len() < MAX_CSI_LEN && csi_unfinished(&seq) {
                match self.next_byte(Some(self.key_timeout))? {
                    Some(byte) => seq.push(byte),
                    None => break,
                }
            }
        }
        tracing::debug!(seq = %format_key_sequence(&seq), "unbound key sequence");
        let action = self.session.keymaps.fallback().other.clone();
        Ok(KeyInput::Action {
            binding: KeyBinding::Thingy(action),
            ch: None,
        })
    }

    /// Read one character without keymap lookup. `None` at end of input.
    fn read_char(&mut self) -> Result<Option<char>> {
        loop {
            let Some(first) = self.next_byte(None)? else {
                return Ok(None);
            };
            match self.classifier.classify(first) {
                ByteClass::LeadByte => {
                    if let Some(ch) = self.complete_char(first)? {
                        return Ok(Some(ch));
                    }
                }
                ByteClass::ContinuationByte => {
                    tracing::warn!(byte = first, "dropped stray continuation byte");
                }
                _ => return Ok(Some(char::from(first))),
            }
        }
    }

    /// Collect the continuation bytes of a multi-byte character. Returns
    /// `None` (after logging) when the bytes do not form a character; a
    /// byte that is not a continuation is pushed back.
    fn complete_char(&mut self, lead: u8) -> Result<Option<char>> {
        let mut bytes = vec![lead];
        while bytes.len() < utf8_len(lead) {
            match self.next_byte(Some(self.key_timeout))? {
                Some(byte) if self.classifier.classify(byte) == ByteClass::ContinuationByte => {
                    bytes.push(byte);
                }
                Some(byte) => {
                    self.unread(&[byte]);
                    break;
                }
                None => break,
            }
        }
        let decoded = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| text.chars().next());
        if decoded.is_none() {
            tracing::warn!(bytes = ?bytes, "dropped malformed character");
        }
        Ok(decoded)
    }

    /// Next byte from the pushback queue or the source. `None` on timeout
    /// or end of input.
    fn next_byte(&mut self, timeout: Option<Duration>) -> Result<Option<u8>> {
        if let Some(byte) = self.pushback.pop_front() {
            return Ok(Some(byte));
        }
        Ok(match self.input.next_byte(timeout)? {
            ReadOutcome::Byte(byte) => Some(byte),
            ReadOutcome::Timeout | ReadOutcome::Eof => None,
        })
    }

    /// Push bytes back so they are read next, in order.
    fn unread(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.pushback.push_front(byte);
        }
    }

    fn unread_macro(&mut self, bytes: &[u8]) {
        let total = self.macro_input + bytes.len();
        if total > MAX_MACRO_INPUT {
            tracing::warn!(len = bytes.len(), total, "send-string expansion refused");
            self.session.show_status("send-string expansion limit reached");
            self.session.ring_bell();
            return;
        }
        self.macro_input = total;
        self.unread(bytes);
    }

    fn enter_escape(&mut self) {
        if matches!(self.session.state, DispatchState::ReadingLine) {
            self.session.state = DispatchState::ReadingEscape;
        }
    }

    fn leave_escape(&mut self) {
        if matches!(self.session.state, DispatchState::ReadingEscape) {
            self.session.state = DispatchState::ReadingLine;
        }
    }

    /// Cancel the current line after an edit could not be stored.
    fn abort_line(&mut self, err: &ZleError) -> Result<LineOutcome> {
        tracing::warn!(%err, "line aborted");
        self.session.show_status(err.to_string());
        self.display.bell()?;
        self.finish(DispatchState::Cancelled, LineOutcome::Cancelled)
    }

    fn finish(&mut self, state: DispatchState, outcome: LineOutcome) -> Result<LineOutcome> {
        if self.session.is_searching() {
            // Leave the line as last shown.
            if let Err(err) = self.session.accept_search() {
                tracing::warn!(%err, "failed to keep search match");
            }
        }
        self.session.state = state;
        self.refresh()?;
        self.display.finish_line()?;
        Ok(outcome)
    }

    pub(super) fn refresh(&mut self) -> Result<()> {
        if std::mem::take(&mut self.session.clear_screen) {
            self.display.clear_screen()?;
        }
        if std::mem::take(&mut self.session.bell) {
            self.display.bell()?;
        }
        let line = self.session.buffer.chars();
        let view = LineView {
            prompt: &self.prompt,
            line,
            cursor: self.session.buffer.cursor(),
            status: self.session.status.as_deref(),
        };
        self.display.refresh(&view)?;
        Ok(())
    }
}

/// Whether a control sequence still expects bytes: parameter and
/// intermediate bytes (`0x20..=0x3f`) continue it, anything else ends it.
fn csi_unfinished(seq: &[u8]) -> bool {
    seq.len() == CSI.len() || seq.last().is_some_and(|&b| matches!(b, 0x20..=0x3f))
}
