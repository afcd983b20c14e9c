// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. keymap::KeymapTable)
    clippy::module_name_repetitions
)]

//! # zline
//!
//! An extensible terminal line editor in the style of the zsh line editor.
//!
//! zline edits one line at a time with:
//! - Named editing actions (widgets) that can be aliased and rebound
//! - Keymaps with longest-match reading of multi-byte key sequences
//! - Emacs and vi key bindings
//! - Reverse incremental history search
//!
//! ## Architecture
//!
//! Input bytes are matched against the current keymap to find a widget
//! name; the name is resolved through the thingy registry to a builtin
//! widget; the widget mutates the editor session; the display redraws.
//!
//! ## Modules
//!
//! - [`app`]: Editor session, dispatch loop, input and display
//! - [`editor`]: The line buffer
//! - [`thingy`]: Widget names and aliases
//! - [`keymap`]: Keymaps and key-sequence notation
//! - [`widget`]: Builtin widgets
//! - [`history`]: Accepted-line history
//! - [`search`]: Reverse incremental search
//! - [`config`]: Flags and rc directives

pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod keymap;
pub mod search;
pub mod thingy;
pub mod widget;

pub use error::ZleError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{EditorSession, LineEditor, LineExecutor, LineOutcome, ParseResult};
    pub use crate::editor::LineBuffer;
    pub use crate::keymap::KeymapTable;
    pub use crate::thingy::ThingyRegistry;
    pub use crate::widget::Widget;
}
