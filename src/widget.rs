//! Builtin widgets: the closed set of editing operations.
//!
//! Widgets are plain enum values. The thingy registry maps names onto
//! them, keymaps map key sequences onto names, and
//! [`crate::app::apply`] performs them against an editor session.

use bitflags::bitflags;

bitflags! {
    /// Behaviour flags carried by a widget's registry entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WidgetFlags: u8 {
        /// Kills by consecutive widgets with this flag accumulate in the
        /// kill buffer instead of replacing it.
        const KILL        = 0b0000_0001;
        /// Does not count as the last command (keeps a kill sequence going).
        const NOT_COMMAND = 0b0000_0010;
    }
}

/// All builtin editing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Widget {
    // Insertion
    SelfInsert,
    QuotedInsert,
    OverwriteMode,

    // Line control
    AcceptLine,
    SendBreak,
    UndefinedKey,
    Beep,
    ClearScreen,
    Redisplay,

    // Movement
    ForwardChar,
    BackwardChar,
    BeginningOfLine,
    EndOfLine,
    ForwardWord,
    BackwardWord,

    // Deletion and killing
    DeleteChar,
    BackwardDeleteChar,
    DeleteCharOrEof,
    KillLine,
    BackwardKillLine,
    KillWholeLine,
    KillWord,
    BackwardKillWord,
    Yank,
    TransposeChars,

    // History
    UpLineOrHistory,
    DownLineOrHistory,
    BeginningOfHistory,
    EndOfHistory,
    HistoryIncrementalSearchBackward,
    AcceptSearch,

    // Vi modes
    ViCmdMode,
    ViInsert,
    ViAddNext,
    ViAddEol,
    ViInsertBol,
}

/// The builtin table loaded into the registry at startup, in registration
/// order: `(name, flags, widget)`.
pub const BUILTIN_WIDGETS: &[(&str, WidgetFlags, Widget)] = &[
    ("accept-line", WidgetFlags::empty(), Widget::AcceptLine),
    ("accept-search", WidgetFlags::empty(), Widget::AcceptSearch),
    ("backward-char", WidgetFlags::empty(), Widget::BackwardChar),
    ("backward-delete-char", WidgetFlags::empty(), Widget::BackwardDeleteChar),
    ("backward-kill-line", WidgetFlags::KILL, Widget::BackwardKillLine),
    ("backward-kill-word", WidgetFlags::KILL, Widget::BackwardKillWord),
    ("backward-word", WidgetFlags::empty(), Widget::BackwardWord),
    ("beep", WidgetFlags::NOT_COMMAND, Widget::Beep),
    ("beginning-of-history", WidgetFlags::empty(), Widget::BeginningOfHistory),
    ("beginning-of-line", WidgetFlags::empty(), Widget::BeginningOfLine),
    ("clear-screen", WidgetFlags::empty(), Widget::ClearScreen),
    ("delete-char", WidgetFlags::empty(), Widget::DeleteChar),
    ("delete-char-or-eof", WidgetFlags::empty(), Widget::DeleteCharOrEof),
    ("down-line-or-history", WidgetFlags::empty(), Widget::DownLineOrHistory),
    ("end-of-history", WidgetFlags::empty(), Widget::EndOfHistory),
    ("end-of-line", WidgetFlags::empty(), Widget::EndOfLine),
    ("forward-char", WidgetFlags::empty(), Widget::ForwardChar),
    ("forward-word", WidgetFlags::empty(), Widget::ForwardWord),
    (
        "history-incremental-search-backward",
        WidgetFlags::empty(),
        Widget::HistoryIncrementalSearchBackward,
    ),
    ("kill-line", WidgetFlags::KILL, Widget::KillLine),
    ("kill-whole-line", WidgetFlags::KILL, Widget::KillWholeLine),
    ("kill-word", WidgetFlags::KILL, Widget::KillWord),
    ("overwrite-mode", WidgetFlags::empty(), Widget::OverwriteMode),
    ("quoted-insert", WidgetFlags::empty(), Widget::QuotedInsert),
    ("redisplay", WidgetFlags::NOT_COMMAND, Widget::Redisplay),
    ("self-insert", WidgetFlags::empty(), Widget::SelfInsert),
    ("send-break", WidgetFlags::empty(), Widget::SendBreak),
    ("transpose-chars", WidgetFlags::empty(), Widget::TransposeChars),
    ("undefined-key", WidgetFlags::NOT_COMMAND, Widget::UndefinedKey),
    ("up-line-or-history", WidgetFlags::empty(), Widget::UpLineOrHistory),
    ("vi-add-eol", WidgetFlags::empty(), Widget::ViAddEol),
    ("vi-add-next", WidgetFlags::empty(), Widget::ViAddNext),
    ("vi-cmd-mode", WidgetFlags::empty(), Widget::ViCmdMode),
    ("vi-insert", WidgetFlags::empty(), Widget::ViInsert),
    ("vi-insert-bol", WidgetFlags::empty(), Widget::ViInsertBol),
    ("yank", WidgetFlags::empty(), Widget::Yank),
];

impl Widget {
    /// Canonical registry name of the widget.
    pub fn name(self) -> &'static str {
        BUILTIN_WIDGETS
            .iter()
            .find(|(_, _, widget)| *widget == self)
            .map_or("undefined-key", |(name, _, _)| *name)
    }

    /// Flags the widget is registered with.
    pub fn default_flags(self) -> WidgetFlags {
        BUILTIN_WIDGETS
            .iter()
            .find(|(_, _, widget)| *widget == self)
            .map_or(WidgetFlags::empty(), |(_, flags, _)| *flags)
    }

    /// Widgets that drive the incremental search instead of ending it.
    pub const fn is_search_control(self) -> bool {
        matches!(
            self,
            Self::SelfInsert
                | Self::BackwardDeleteChar
                | Self::HistoryIncrementalSearchBackward
                | Self::AcceptSearch
                | Self::SendBreak
                | Self::Redisplay
        )
    }
}

impl std::fmt::Display for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_table_names_are_unique() {
        let mut seen = HashSet::new();
        for (name, _, _) in BUILTIN_WIDGETS {
            assert!(seen.insert(*name), "duplicate builtin {name}");
        }
    }

    #[test]
    fn test_every_widget_has_one_table_entry() {
        let widgets: HashSet<Widget> = BUILTIN_WIDGETS.iter().map(|(_, _, w)| *w).collect();
        assert_eq!(widgets.len(), BUILTIN_WIDGETS.len());
        assert_eq!(Widget::ViInsertBol.name(), "vi-insert-bol");
    }

    #[test]
    fn test_kill_widgets_carry_kill_flag() {
        assert!(Widget::KillLine.default_flags().contains(WidgetFlags::KILL));
        assert!(Widget::BackwardKillWord.default_flags().contains(WidgetFlags::KILL));
        assert!(!Widget::Yank.default_flags().contains(WidgetFlags::KILL));
        assert!(Widget::Redisplay.default_flags().contains(WidgetFlags::NOT_COMMAND));
    }
}
