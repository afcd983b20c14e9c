use std::ops::Range;

use unicode_width::UnicodeWidthChar;

use crate::error::{Result, ZleError};

/// Non-alphanumeric characters that count as part of a word
/// (zsh's default `WORDCHARS`).
pub const WORDCHARS: &str = "*?_-.[]~=/&;!#$%^(){}<>";

/// Allocation floor for the first growth of an empty buffer.
const MIN_CAPACITY: usize = 256;

/// Whether `ch` is a word constituent for word motion and word kills.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || WORDCHARS.contains(ch)
}

/// Columns a character occupies on screen. Control characters are shown
/// in caret notation (`^X`) and take two columns.
pub fn char_display_width(ch: char) -> usize {
    if ch.is_control() {
        2
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Direction for single-character cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// The editable line.
///
/// Text is stored as `char`s so that the cursor, the length and every
/// insert/delete count are in characters, never in bytes. The invariant
/// `0 <= cursor <= len() <= capacity()` holds after every call.
#[derive(Clone, Default)]
pub struct LineBuffer {
    text: Vec<char>,
    cursor: usize,
    limit: Option<usize>,
    revision: u64,
}

impl LineBuffer {
    /// Create an empty buffer with no length limit.
    pub const fn new() -> Self {
        Self {
            text: Vec::new(),
            cursor: 0,
            limit: None,
            revision: 0,
        }
    }

    /// Create an empty buffer that refuses to grow past `limit` characters.
    pub const fn with_limit(limit: Option<usize>) -> Self {
        Self {
            text: Vec::new(),
            cursor: 0,
            limit,
            revision: 0,
        }
    }

    /// Create a buffer holding `text`, cursor at the end.
    pub fn from_text(text: &str) -> Self {
        let text: Vec<char> = text.chars().collect();
        Self {
            cursor: text.len(),
            text,
            limit: None,
            revision: 0,
        }
    }

    /// Number of characters in use.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The cursor position, in characters from the start of the line.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Characters that fit without reallocating.
    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Counter bumped by every mutation. A display snapshot taken at an
    /// older revision is stale.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn chars(&self) -> &[char] {
        &self.text
    }

    pub fn char_at(&self, idx: usize) -> Option<char> {
        self.text.get(idx).copied()
    }

    /// Snapshot of the whole line.
    pub fn as_string(&self) -> String {
        self.text.iter().collect()
    }

    /// Snapshot of a range of the line, clamped to the current length.
    pub fn slice(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.text[start..end].iter().collect()
    }

    /// Insert `fragment` at the cursor and move the cursor past it.
    ///
    /// # Errors
    ///
    /// Returns [`ZleError::CapacityExceeded`] if the buffer cannot grow; the
    /// buffer is left untouched in that case.
    pub fn insert(&mut self, fragment: &str) -> Result<()> {
        let count = fragment.chars().count();
        if count == 0 {
            return Ok(());
        }
        self.ensure_capacity(count)?;
        self.text.splice(self.cursor..self.cursor, fragment.chars());
        self.cursor += count;
        self.touch();
        Ok(())
    }

    /// Insert a single character at the cursor.
    ///
    /// # Errors
    ///
    /// See [`LineBuffer::insert`].
    pub fn insert_char(&mut self, ch: char) -> Result<()> {
        self.ensure_capacity(1)?;
        self.text.insert(self.cursor, ch);
        self.cursor += 1;
        self.touch();
        Ok(())
    }

    /// Overwrite up to `count` characters at the cursor with `fragment`.
    ///
    /// # Errors
    ///
    /// See [`LineBuffer::insert`]. Nothing is removed if the insert would fail.
    pub fn replace(&mut self, count: usize, fragment: &str) -> Result<()> {
        let count = count.min(self.len() - self.cursor);
        let incoming = fragment.chars().count();
        if incoming > count {
            self.ensure_capacity(incoming - count)?;
        }
        self.text.splice(self.cursor..self.cursor + count, fragment.chars());
        self.cursor += incoming;
        self.touch();
        Ok(())
    }

    /// Remove up to `count` characters starting at the cursor.
    ///
    /// Returns the number of characters removed.
    pub fn delete_forward(&mut self, count: usize) -> usize {
        let count = count.min(self.len() - self.cursor);
        if count == 0 {
            return 0;
        }
        self.text.drain(self.cursor..self.cursor + count);
        self.touch();
        count
    }

    /// Remove up to `count` characters before the cursor.
    ///
    /// Returns the number of characters removed.
    pub fn delete_backward(&mut self, count: usize) -> usize {
        let count = count.min(self.cursor);
        self.cursor -= count;
        self.delete_forward(count)
    }

    /// Move the cursor, clamping to `[0, len()]`.
    pub fn set_cursor(&mut self, pos: usize) {
        let pos = pos.min(self.len());
        if pos != self.cursor {
            self.cursor = pos;
            self.touch();
        }
    }

    /// Move the cursor one character. Returns `false` at either end.
    pub fn move_cursor(&mut self, direction: Direction) -> bool {
        match direction {
            Direction::Left if self.cursor > 0 => {
                self.set_cursor(self.cursor - 1);
                true
            }
            Direction::Right if self.cursor < self.len() => {
                self.set_cursor(self.cursor + 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_home(&mut self) {
        self.set_cursor(0);
    }

    pub fn move_end(&mut self) {
        self.set_cursor(self.len());
    }

    /// Replace the whole line with `text`, cursor at the end.
    ///
    /// # Errors
    ///
    /// Returns [`ZleError::CapacityExceeded`] if `text` does not fit; the
    /// previous contents are kept in that case.
    pub fn set_line(&mut self, text: &str) -> Result<()> {
        let count = text.chars().count();
        if count > self.len() {
            self.ensure_capacity(count - self.len())?;
        }
        self.text.clear();
        self.text.extend(text.chars());
        self.cursor = count;
        self.touch();
        Ok(())
    }

    /// Empty the line for the next read. Capacity is kept.
    pub fn reset(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.touch();
    }

    /// Exchange two characters. Returns `false` if either index is out of range.
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.len() || b >= self.len() {
            return false;
        }
        self.text.swap(a, b);
        self.touch();
        true
    }

    /// Start of the word before `pos`: skip non-word characters backwards,
    /// then word characters.
    pub fn prev_word_start(&self, pos: usize) -> usize {
        let mut idx = pos.min(self.len());
        while idx > 0 && !is_word_char(self.text[idx - 1]) {
            idx -= 1;
        }
        while idx > 0 && is_word_char(self.text[idx - 1]) {
            idx -= 1;
        }
        idx
    }

    /// Start of the next word after `pos`: skip the rest of the current
    /// word, then the separators after it.
    pub fn next_word_start(&self, pos: usize) -> usize {
        let mut idx = pos.min(self.len());
        while idx < self.len() && is_word_char(self.text[idx]) {
            idx += 1;
        }
        while idx < self.len() && !is_word_char(self.text[idx]) {
            idx += 1;
        }
        idx
    }

    /// End of the word at or after `pos`: skip separators, then word characters.
    pub fn word_end_after(&self, pos: usize) -> usize {
        let mut idx = pos.min(self.len());
        while idx < self.len() && !is_word_char(self.text[idx]) {
            idx += 1;
        }
        while idx < self.len() && is_word_char(self.text[idx]) {
            idx += 1;
        }
        idx
    }

    /// Screen columns taken by the text before the cursor.
    pub fn width_before_cursor(&self) -> usize {
        self.text[..self.cursor]
            .iter()
            .copied()
            .map(char_display_width)
            .sum()
    }

    // --- Private helpers ---

    /// Make room for `additional` more characters, growing geometrically.
    fn ensure_capacity(&mut self, additional: usize) -> Result<()> {
        let len = self.len();
        let exceeded = |limit| ZleError::CapacityExceeded {
            requested: len.saturating_add(additional),
            limit,
        };
        let needed = len
            .checked_add(additional)
            .ok_or_else(|| exceeded(usize::MAX))?;
        if let Some(limit) = self.limit
            && needed > limit
        {
            return Err(exceeded(limit));
        }
        if needed <= self.text.capacity() {
            return Ok(());
        }
        let target = needed
            .max(self.text.capacity().saturating_mul(2))
            .max(MIN_CAPACITY);
        let current = self.text.capacity();
        self.text
            .try_reserve_exact(target - len)
            .map_err(|_| exceeded(current))
    }

    const fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

impl std::fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineBuffer")
            .field("text", &self.as_string())
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity())
            .field("limit", &self.limit)
            .finish()
    }
}
