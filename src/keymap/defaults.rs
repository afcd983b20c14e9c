//! Compiled-in keymaps and their default bindings.

use super::{Fallback, Keymap, KeymapTable, parse_key_sequence};
use crate::keymap::KeyBinding;

/// Terminal cursor/editing keys shared by `emacs`, `viins` and `vicmd`.
const CURSOR_KEYS: &[(&str, &str)] = &[
    ("\\e[A", "up-line-or-history"),
    ("\\e[B", "down-line-or-history"),
    ("\\e[C", "forward-char"),
    ("\\e[D", "backward-char"),
    ("\\eOA", "up-line-or-history"),
    ("\\eOB", "down-line-or-history"),
    ("\\eOC", "forward-char"),
    ("\\eOD", "backward-char"),
    ("\\e[H", "beginning-of-line"),
    ("\\e[F", "end-of-line"),
    ("\\eOH", "beginning-of-line"),
    ("\\eOF", "end-of-line"),
    ("\\e[1~", "beginning-of-line"),
    ("\\e[4~", "end-of-line"),
    ("\\e[3~", "delete-char"),
];

const EMACS: &[(&str, &str)] = &[
    ("^A", "beginning-of-line"),
    ("^B", "backward-char"),
    ("^C", "send-break"),
    ("^D", "delete-char-or-eof"),
    ("^E", "end-of-line"),
    ("^F", "forward-char"),
    ("^G", "send-break"),
    ("^H", "backward-delete-char"),
    ("^J", "accept-line"),
    ("^K", "kill-line"),
    ("^L", "clear-screen"),
    ("^M", "accept-line"),
    ("^N", "down-line-or-history"),
    ("^P", "up-line-or-history"),
    ("^R", "history-incremental-search-backward"),
    ("^T", "transpose-chars"),
    ("^U", "kill-whole-line"),
    ("^V", "quoted-insert"),
    ("^W", "backward-kill-word"),
    ("^X^O", "overwrite-mode"),
    ("^X^K", "backward-kill-line"),
    ("^Y", "yank"),
    ("^?", "backward-delete-char"),
    ("\\eb", "backward-word"),
    ("\\ef", "forward-word"),
    ("\\ed", "kill-word"),
    ("\\e^?", "backward-kill-word"),
    ("\\e^H", "backward-kill-word"),
    ("\\e<", "beginning-of-history"),
    ("\\e>", "end-of-history"),
    ("\\e^L", "redisplay"),
];

const VIINS: &[(&str, &str)] = &[
    ("^C", "send-break"),
    ("^D", "delete-char-or-eof"),
    ("^H", "backward-delete-char"),
    ("^J", "accept-line"),
    ("^L", "clear-screen"),
    ("^M", "accept-line"),
    ("^R", "history-incremental-search-backward"),
    ("^U", "backward-kill-line"),
    ("^V", "quoted-insert"),
    ("^W", "backward-kill-word"),
    ("^?", "backward-delete-char"),
    ("^[", "vi-cmd-mode"),
];

const VICMD: &[(&str, &str)] = &[
    ("^C", "send-break"),
    ("^H", "backward-char"),
    ("^J", "accept-line"),
    ("^L", "clear-screen"),
    ("^M", "accept-line"),
    ("^?", "backward-char"),
    (" ", "forward-char"),
    ("$", "end-of-line"),
    ("/", "history-incremental-search-backward"),
    ("0", "beginning-of-line"),
    ("A", "vi-add-eol"),
    ("D", "kill-line"),
    ("I", "vi-insert-bol"),
    ("X", "backward-delete-char"),
    ("\\^", "beginning-of-line"),
    ("a", "vi-add-next"),
    ("b", "backward-word"),
    ("h", "backward-char"),
    ("i", "vi-insert"),
    ("j", "down-line-or-history"),
    ("k", "up-line-or-history"),
    ("l", "forward-char"),
    ("p", "yank"),
    ("w", "forward-word"),
    ("x", "delete-char"),
];

/// Overlay installed while an incremental search is running.
const ISEARCH: &[(&str, &str)] = &[
    ("^C", "send-break"),
    ("^G", "send-break"),
    ("^H", "backward-delete-char"),
    ("^J", "accept-search"),
    ("^M", "accept-search"),
    ("^R", "history-incremental-search-backward"),
    ("^?", "backward-delete-char"),
];

/// Minimal, read-only keymap for degraded or untrusted sessions.
const SAFE: &[(&str, &str)] = &[
    ("^C", "send-break"),
    ("^D", "delete-char-or-eof"),
    ("^G", "send-break"),
    ("^H", "backward-delete-char"),
    ("^J", "accept-line"),
    ("^M", "accept-line"),
    ("^?", "backward-delete-char"),
];

pub const SAFE_KEYMAP: &str = ".safe";
pub const ISEARCH_KEYMAP: &str = "isearch";
pub const MAIN_KEYMAP: &str = "main";

/// Build the builtin keymaps, link `main` to `emacs` (or `viins` when
/// `vi` is set) and select it.
pub(super) fn install(table: &mut KeymapTable, vi: bool) {
    let editing = Fallback::default();
    let command = Fallback {
        printable: "undefined-key".to_string(),
        other: "undefined-key".to_string(),
    };

    table.insert_builtin("emacs", build(&[CURSOR_KEYS, EMACS], editing.clone(), false));
    table.insert_builtin("viins", build(&[CURSOR_KEYS, VIINS], editing.clone(), false));
    table.insert_builtin("vicmd", build(&[CURSOR_KEYS, VICMD], command, false));
    table.insert_builtin(ISEARCH_KEYMAP, build(&[ISEARCH], editing.clone(), false));
    table.insert_builtin(SAFE_KEYMAP, build(&[SAFE], editing, true));

    let main_target = if vi { "viins" } else { "emacs" };
    if let Err(err) = table.link_keymap(MAIN_KEYMAP, main_target) {
        tracing::error!(%err, "failed to link main keymap");
    }
    if let Err(err) = table.select(MAIN_KEYMAP) {
        tracing::error!(%err, "failed to select main keymap");
    }
}

fn build(sets: &[&[(&str, &str)]], fallback: Fallback, immutable: bool) -> Keymap {
    let mut keymap = Keymap::new(fallback);
    for (notation, action) in sets.iter().flat_map(|set| set.iter()) {
        match parse_key_sequence(notation) {
            Ok(seq) => {
                keymap.insert(seq, KeyBinding::Thingy((*action).to_string()));
            }
            Err(err) => tracing::error!(%err, "bad default binding"),
        }
    }
    keymap.immutable = immutable;
    keymap
}
