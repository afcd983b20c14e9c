//! End-to-end editing through the public API: scripted bytes in, lines out.

use std::time::Duration;

use zline::app::{EditorSession, LineEditor, LineOutcome, NullDisplay, ParseResult, ScriptedInput};
use zline::config::apply_directive;
use zline::keymap::{MAIN_KEYMAP, SAFE_KEYMAP};

fn read_one(session: EditorSession, input: &[u8]) -> LineOutcome {
    LineEditor::new(session, ScriptedInput::new(input), NullDisplay)
        .with_key_timeout(Duration::from_millis(1))
        .read_line()
        .unwrap()
}

fn accepted(text: &str) -> LineOutcome {
    LineOutcome::Accepted(text.to_string())
}

#[test]
fn test_plain_line() {
    assert_eq!(read_one(EditorSession::default(), b"ls -la\r"), accepted("ls -la"));
}

#[test]
fn test_kill_word_then_yank_at_start() {
    let outcome = read_one(EditorSession::default(), b"hello world\x17\x01\x19\r");
    assert_eq!(outcome, accepted("worldhello "));
}

#[test]
fn test_arrow_keys_move_the_cursor() {
    // Left twice, then insert.
    let outcome = read_one(EditorSession::default(), b"abcd\x1b[D\x1b[DX\r");
    assert_eq!(outcome, accepted("abXcd"));
}

#[test]
fn test_vi_escape_then_commands() {
    let outcome = read_one(EditorSession::new(true), b"hello\x1b0ix\r");
    assert_eq!(outcome, accepted("xhello"));
}

#[test]
fn test_run_walks_history_with_up_arrow() {
    let mut seen = Vec::new();
    let mut executor = |line: &str| {
        seen.push(line.to_string());
        ParseResult::Complete
    };
    let mut editor = LineEditor::new(
        EditorSession::default(),
        ScriptedInput::new(b"first\rsecond\r\x10\x10\r"),
        NullDisplay,
    )
    .with_key_timeout(Duration::from_millis(1));

    assert_eq!(editor.run(&mut executor).unwrap(), 3);
    assert_eq!(seen, ["first", "second", "first"]);
    let history: Vec<&str> = editor.session().history.iter().collect();
    assert_eq!(history, ["first", "second", "first"]);
}

#[test]
fn test_reverse_search_finds_older_match() {
    let mut session = EditorSession::default();
    for line in ["git commit", "ls", "git push"] {
        session.history.push(line);
    }
    // The second ^R skips "git push".
    let outcome = read_one(session, b"\x12git\x12\r\r");
    assert_eq!(outcome, accepted("git commit"));
}

#[test]
fn test_rebound_alias_drives_editing() {
    let mut session = EditorSession::default();
    apply_directive(&mut session, "zle -A beginning-of-line go-home").unwrap();
    apply_directive(&mut session, "bindkey '^O' go-home").unwrap();
    let outcome = read_one(session, b"world\x0fhello \r");
    assert_eq!(outcome, accepted("hello world"));
}

#[test]
fn test_send_string_expands_to_keys() {
    let mut session = EditorSession::default();
    apply_directive(&mut session, "bindkey -s '^Xg' 'git status^M'").unwrap();
    assert_eq!(read_one(session, b"\x18g"), accepted("git status"));
}

#[test]
fn test_safe_keymap_ignores_editing_keys() {
    let mut session = EditorSession::default();
    session.keymaps.link_keymap(MAIN_KEYMAP, SAFE_KEYMAP).unwrap();
    // ^A and ^K are unbound here; only the text and backspace apply.
    let outcome = read_one(session, b"abc\x01\x0b\x7fd\r");
    assert_eq!(outcome, accepted("abd"));
}

#[test]
fn test_line_limit_cancels_overlong_line() {
    let session = EditorSession::default().with_line_limit(Some(4));
    assert_eq!(read_one(session, b"hello\r"), LineOutcome::Cancelled);
}

#[test]
fn test_ctrl_d_on_empty_line_ends_input() {
    assert_eq!(read_one(EditorSession::default(), b"\x04"), LineOutcome::Eof);
}
