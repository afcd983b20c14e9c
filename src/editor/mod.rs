//! The line buffer: one editable line of text with a cursor.
//!
//! Counts and positions are in characters, so wide and multi-byte
//! characters are inserted and deleted as single units.

mod buffer;

pub use buffer::{Direction, LineBuffer, WORDCHARS, char_display_width, is_word_char};
