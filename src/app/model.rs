use crate::editor::LineBuffer;
use crate::error::Result;
use crate::history::History;
use crate::keymap::{ISEARCH_KEYMAP, KeymapTable, MAIN_KEYMAP};
use crate::search::SearchState;
use crate::thingy::ThingyRegistry;
use crate::widget::WidgetFlags;

/// Where the dispatch loop is in reading a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    ReadingLine,
    /// Bytes of a multi-byte key sequence are being collected.
    ReadingEscape,
    ReverseSearch,
    Done,
    Cancelled,
}

/// The complete editor state.
///
/// All state lives here - no global or scattered state. The dispatch loop
/// owns one session and widgets mutate it through [`super::apply`].
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub buffer: LineBuffer,
    pub registry: ThingyRegistry,
    pub keymaps: KeymapTable,
    pub history: History,
    /// Text removed by the last kill (or run of kills).
    pub kill_buffer: String,
    /// Flags of the last widget that counts as a command.
    pub last_flags: WidgetFlags,
    /// Character that triggered the current widget, for `self-insert`.
    pub last_char: Option<char>,
    /// Index into history of the line being shown; `history.len()` is the
    /// line being edited.
    pub history_cursor: usize,
    /// The edited line, kept while walking through history.
    pub saved_line: Option<String>,
    pub search: Option<SearchState>,
    pub status: Option<String>,
    pub bell: bool,
    /// The next character is inserted without keymap lookup.
    pub quote_next: bool,
    pub overwrite: bool,
    pub clear_screen: bool,
    pub state: DispatchState,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(false)
    }
}

impl EditorSession {
    /// A session with the builtin widgets and keymaps; `main` is linked to
    /// `viins` when `vi` is set, else to `emacs`.
    pub fn new(vi: bool) -> Self {
        Self {
            buffer: LineBuffer::new(),
            registry: ThingyRegistry::with_builtins(),
            keymaps: KeymapTable::with_defaults(vi),
            history: History::default(),
            kill_buffer: String::new(),
            last_flags: WidgetFlags::empty(),
            last_char: None,
            history_cursor: 0,
            saved_line: None,
            search: None,
            status: None,
            bell: false,
            quote_next: false,
            overwrite: false,
            clear_screen: false,
            state: DispatchState::ReadingLine,
        }
    }

    /// Limit the line length, in characters.
    #[must_use]
    pub fn with_line_limit(mut self, limit: Option<usize>) -> Self {
        self.buffer = LineBuffer::with_limit(limit);
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Prepare for reading a new line. The status message survives so
    /// feedback from the previous line stays visible until the next key.
    pub fn begin_line(&mut self) {
        self.buffer.reset();
        self.last_flags = WidgetFlags::empty();
        self.last_char = None;
        self.history_cursor = self.history.len();
        self.saved_line = None;
        self.search = None;
        self.quote_next = false;
        self.state = DispatchState::ReadingLine;
        if let Err(err) = self.keymaps.set_local(None) {
            tracing::error!(%err, "failed to clear local keymap");
        }
        if let Err(err) = self.keymaps.select(MAIN_KEYMAP) {
            tracing::error!(%err, "failed to select main keymap");
        }
    }

    pub const fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn show_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub const fn ring_bell(&mut self) {
        self.bell = true;
    }

    /// Enter reverse incremental search over the current line.
    ///
    /// # Errors
    ///
    /// Returns an error if the `isearch` keymap has been removed.
    pub fn start_search(&mut self) -> Result<()> {
        self.keymaps.set_local(Some(ISEARCH_KEYMAP))?;
        let search = SearchState::new(self.buffer.as_string(), self.buffer.cursor());
        self.status = Some(search.status_line());
        self.search = Some(search);
        self.state = DispatchState::ReverseSearch;
        Ok(())
    }

    /// Leave search mode keeping the matched line, cursor at the end.
    ///
    /// # Errors
    ///
    /// [`crate::ZleError::CapacityExceeded`] if the match does not fit.
    pub fn accept_search(&mut self) -> Result<()> {
        let Some(search) = self.end_search() else {
            return Ok(());
        };
        if let Some(idx) = search.matched()
            && let Some(line) = self.history.get(idx)
        {
            let line = line.to_string();
            self.buffer.set_line(&line)?;
            if self.history_cursor == self.history.len() {
                self.saved_line = Some(search.saved().0.to_string());
            }
            self.history_cursor = idx;
        }
        Ok(())
    }

    /// Leave search mode restoring the line as it was before the search.
    ///
    /// # Errors
    ///
    /// [`crate::ZleError::CapacityExceeded`] if the saved line no longer fits.
    pub fn cancel_search(&mut self) -> Result<()> {
        let Some(search) = self.end_search() else {
            return Ok(());
        };
        let (line, cursor) = search.saved();
        self.buffer.set_line(line)?;
        self.buffer.set_cursor(cursor);
        Ok(())
    }

    /// Show the current match (or the saved line if nothing matches yet)
    /// and refresh the search status.
    ///
    /// # Errors
    ///
    /// [`crate::ZleError::CapacityExceeded`] if the text does not fit.
    pub fn show_search_match(&mut self) -> Result<()> {
        let Some(search) = self.search.as_ref() else {
            return Ok(());
        };
        let line = search
            .matched_line(&self.history)
            .unwrap_or_else(|| search.saved().0)
            .to_string();
        self.status = Some(search.status_line());
        if line != self.buffer.as_string() {
            self.buffer.set_line(&line)?;
        }
        Ok(())
    }

    fn end_search(&mut self) -> Option<SearchState> {
        let search = self.search.take()?;
        if let Err(err) = self.keymaps.set_local(None) {
            tracing::error!(%err, "failed to clear local keymap");
        }
        self.status = None;
        self.state = DispatchState::ReadingLine;
        Some(search)
    }
}
