//! Reverse incremental history search.
//!
//! [`SearchState`] holds the pattern typed so far, the line that was being
//! edited when the search started, and the history entry currently matched.
//! Matching itself is [`History::search_backward`]; this module keeps the
//! bookkeeping for extending, repeating and undoing search steps.

use crate::history::History;

/// Status-line prefix shown while searching.
pub const SEARCH_PROMPT: &str = "bck-i-search: ";

/// Search position before one step, restored when the step is undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    pattern_len: usize,
    matched: Option<usize>,
    failing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pattern: String,
    saved_line: String,
    saved_cursor: usize,
    /// History index of the current match.
    matched: Option<usize>,
    failing: bool,
    steps: Vec<Step>,
}

impl SearchState {
    /// Start a search over the line being edited.
    pub const fn new(saved_line: String, saved_cursor: usize) -> Self {
        Self {
            pattern: String::new(),
            saved_line,
            saved_cursor,
            matched: None,
            failing: false,
            steps: Vec::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub const fn matched(&self) -> Option<usize> {
        self.matched
    }

    pub const fn is_failing(&self) -> bool {
        self.failing
    }

    /// The line and cursor to restore on cancel.
    pub fn saved(&self) -> (&str, usize) {
        (&self.saved_line, self.saved_cursor)
    }

    /// The text of the current match, if any.
    pub fn matched_line<'h>(&self, history: &'h History) -> Option<&'h str> {
        self.matched.and_then(|idx| history.get(idx))
    }

    /// Append to the pattern and search again, starting at the current
    /// match so it stays put while it still matches.
    pub fn push_char(&mut self, ch: char, history: &History) {
        self.record_step();
        self.pattern.push(ch);
        let from = self.matched.map_or(history.len(), |idx| idx + 1);
        self.research(from, history);
    }

    /// Undo the last step, whether it added a character or moved to an
    /// older match. Returns false when there is nothing left to undo.
    pub fn pop_char(&mut self) -> bool {
        let Some(step) = self.steps.pop() else {
            return false;
        };
        let keep = self
            .pattern
            .char_indices()
            .nth(step.pattern_len)
            .map_or(self.pattern.len(), |(idx, _)| idx);
        self.pattern.truncate(keep);
        self.matched = step.matched;
        self.failing = step.failing;
        true
    }

    /// Move to the next older match. Returns false (and keeps the current
    /// match) when there is none.
    pub fn search_older(&mut self, history: &History) -> bool {
        self.record_step();
        let before = self.matched.unwrap_or(history.len());
        match history.search_backward(&self.pattern, before) {
            Some(idx) => {
                self.matched = Some(idx);
                self.failing = false;
                true
            }
            None => {
                self.failing = !self.pattern.is_empty();
                false
            }
        }
    }

    /// Status line: `bck-i-search: pat_`, prefixed by `failing ` when the
    /// pattern has no match.
    pub fn status_line(&self) -> String {
        let prefix = if self.failing { "failing " } else { "" };
        format!("{prefix}{SEARCH_PROMPT}{}_", self.pattern)
    }

    fn record_step(&mut self) {
        self.steps.push(Step {
            pattern_len: self.pattern.chars().count(),
            matched: self.matched,
            failing: self.failing,
        });
    }

    fn research(&mut self, before: usize, history: &History) {
        match history.search_backward(&self.pattern, before) {
            Some(idx) => {
                self.matched = Some(idx);
                self.failing = false;
            }
            None => self.failing = true,
        }
    }
}
