//! Drawing the line being edited.

use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};
use unicode_width::UnicodeWidthStr;

use crate::editor::char_display_width;

/// Everything needed to draw the current line.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    pub prompt: &'a str,
    pub line: &'a [char],
    pub cursor: usize,
    /// Message shown below the line (search prompt, errors).
    pub status: Option<&'a str>,
}

impl LineView<'_> {
    /// Screen column of the cursor.
    pub fn cursor_column(&self) -> usize {
        self.prompt.width()
            + self.line[..self.cursor.min(self.line.len())]
                .iter()
                .copied()
                .map(char_display_width)
                .sum::<usize>()
    }
}

/// Render a line for the screen, with control characters in caret notation.
pub fn visible_text(line: &[char]) -> String {
    let mut out = String::with_capacity(line.len());
    for &ch in line {
        match ch {
            '\x7f' => out.push_str("^?"),
            c if c.is_ascii_control() => {
                out.push('^');
                out.push(char::from(c as u8 ^ 0x40));
            }
            c if c.is_control() => out.push('?'),
            c => out.push(c),
        }
    }
    out
}

/// Receives redraw requests from the dispatch loop.
pub trait Display {
    /// Redraw the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn refresh(&mut self, view: &LineView<'_>) -> io::Result<()>;

    /// Signal an error to the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn bell(&mut self) -> io::Result<()>;

    /// Clear the screen; the line is redrawn by the next refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn clear_screen(&mut self) -> io::Result<()>;

    /// The line is finished: leave it on screen and move below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn finish_line(&mut self) -> io::Result<()>;
}

/// Discards all output. Used when no terminal is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn refresh(&mut self, _view: &LineView<'_>) -> io::Result<()> {
        Ok(())
    }

    fn bell(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn finish_line(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Draws on a terminal with crossterm commands. The line does not wrap:
/// it is expected to fit the terminal width.
pub struct TerminalDisplay<W: Write> {
    out: W,
    status_shown: bool,
}

impl<W: Write> TerminalDisplay<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out,
            status_shown: false,
        }
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.status_shown {
            queue!(
                self.out,
                Print("\r\n"),
                Clear(ClearType::CurrentLine),
                MoveUp(1)
            )?;
            self.status_shown = false;
        }
        Ok(())
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn refresh(&mut self, view: &LineView<'_>) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Print(view.prompt),
            Print(visible_text(view.line)),
            Clear(ClearType::UntilNewLine)
        )?;
        match view.status {
            Some(status) => {
                queue!(
                    self.out,
                    Print("\r\n"),
                    Print(status),
                    Clear(ClearType::UntilNewLine),
                    MoveUp(1)
                )?;
                self.status_shown = true;
            }
            None => self.clear_status()?,
        }
        let column = u16::try_from(view.cursor_column()).unwrap_or(u16::MAX);
        queue!(self.out, MoveToColumn(column))?;
        self.out.flush()
    }

    fn bell(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x07")?;
        self.out.flush()
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        self.status_shown = false;
        self.out.flush()
    }

    fn finish_line(&mut self) -> io::Result<()> {
        self.clear_status()?;
        queue!(self.out, Print("\r\n"))?;
        self.out.flush()
    }
}

/// Keeps the terminal in raw mode for its lifetime.
pub struct RawModeGuard(());

impl RawModeGuard {
    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal does not support raw mode.
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
