use crate::app::EditorSession;
use crate::editor::Direction;
use crate::error::Result;
use crate::keymap::MAIN_KEYMAP;
use crate::widget::{Widget, WidgetFlags};

/// What the dispatch loop does after a widget has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The line was accepted.
    Done,
    /// The line was abandoned.
    Cancelled,
    /// End of input was requested on an empty line.
    Eof,
}

/// Which end of the killed text a kill extends the kill buffer at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillEnd {
    Append,
    Prepend,
}

/// Run one widget against the session.
///
/// While a reverse search is active, search-control widgets drive the
/// search; any other widget first accepts the search and then runs as
/// usual.
///
/// # Errors
///
/// [`crate::ZleError::CapacityExceeded`] if an insertion does not fit, or a
/// keymap error if a mode switch names a keymap that no longer exists.
pub fn apply(widget: Widget, flags: WidgetFlags, session: &mut EditorSession) -> Result<Flow> {
    if session.is_searching() {
        if widget.is_search_control() {
            return apply_search(widget, session);
        }
        session.accept_search()?;
    }
    let continues_kill = session.last_flags.contains(WidgetFlags::KILL);
    let flow = apply_edit(widget, flags, continues_kill, session)?;
    if !flags.contains(WidgetFlags::NOT_COMMAND) {
        session.last_flags = flags;
    }
    Ok(flow)
}

fn apply_search(widget: Widget, session: &mut EditorSession) -> Result<Flow> {
    let Some(search) = session.search.as_mut() else {
        return Ok(Flow::Continue);
    };
    match widget {
        Widget::SelfInsert => match session.last_char {
            Some(ch) => search.push_char(ch, &session.history),
            None => session.bell = true,
        },
        Widget::BackwardDeleteChar => {
            if !search.pop_char() {
                session.bell = true;
            }
        }
        Widget::HistoryIncrementalSearchBackward => {
            if !search.search_older(&session.history) {
                session.bell = true;
            }
        }
        Widget::AcceptSearch => {
            session.accept_search()?;
            return Ok(Flow::Continue);
        }
        Widget::SendBreak => {
            session.cancel_search()?;
            return Ok(Flow::Continue);
        }
        _ => {}
    }
    session.show_search_match()?;
    Ok(Flow::Continue)
}

fn apply_edit(
    widget: Widget,
    flags: WidgetFlags,
    continues_kill: bool,
    session: &mut EditorSession,
) -> Result<Flow> {
    let buffer = &mut session.buffer;
    match widget {
        // Insertion
        Widget::SelfInsert => match session.last_char {
            Some(ch) if session.overwrite => buffer.replace(1, ch.encode_utf8(&mut [0; 4]))?,
            Some(ch) => buffer.insert_char(ch)?,
            None => session.bell = true,
        },
        Widget::QuotedInsert => session.quote_next = true,
        Widget::OverwriteMode => session.overwrite = !session.overwrite,

        // Line control
        Widget::AcceptLine => return Ok(Flow::Done),
        Widget::SendBreak => return Ok(Flow::Cancelled),
        Widget::UndefinedKey | Widget::Beep => session.bell = true,
        Widget::ClearScreen => session.clear_screen = true,
        Widget::Redisplay => {}

        // Movement
        Widget::ForwardChar => {
            buffer.move_cursor(Direction::Right);
        }
        Widget::BackwardChar => {
            buffer.move_cursor(Direction::Left);
        }
        Widget::BeginningOfLine => buffer.move_home(),
        Widget::EndOfLine => buffer.move_end(),
        Widget::ForwardWord => {
            let target = buffer.next_word_start(buffer.cursor());
            buffer.set_cursor(target);
        }
        Widget::BackwardWord => {
            let target = buffer.prev_word_start(buffer.cursor());
            buffer.set_cursor(target);
        }

        // Deletion and killing
        Widget::DeleteChar => {
            buffer.delete_forward(1);
        }
        Widget::BackwardDeleteChar => {
            buffer.delete_backward(1);
        }
        Widget::DeleteCharOrEof => {
            if buffer.is_empty() {
                return Ok(Flow::Eof);
            }
            buffer.delete_forward(1);
        }
        Widget::KillLine => {
            let (start, end) = (buffer.cursor(), buffer.len());
            kill_region(session, start, end, KillEnd::Append, continues_kill);
        }
        Widget::BackwardKillLine => {
            let end = buffer.cursor();
            kill_region(session, 0, end, KillEnd::Prepend, continues_kill);
        }
        Widget::KillWholeLine => {
            let end = buffer.len();
            kill_region(session, 0, end, KillEnd::Append, continues_kill);
        }
        Widget::KillWord => {
            let start = buffer.cursor();
            let end = buffer.word_end_after(start);
            kill_region(session, start, end, KillEnd::Append, continues_kill);
        }
        Widget::BackwardKillWord => {
            let end = buffer.cursor();
            let start = buffer.prev_word_start(end);
            kill_region(session, start, end, KillEnd::Prepend, continues_kill);
        }
        Widget::Yank => {
            if session.kill_buffer.is_empty() {
                session.bell = true;
            } else {
                buffer.insert(&session.kill_buffer)?;
            }
        }
        Widget::TransposeChars => {
            if !transpose_chars(session) {
                session.bell = true;
            }
        }

        // History
        Widget::UpLineOrHistory => match session.history_cursor.checked_sub(1) {
            Some(index) => show_history_entry(session, index)?,
            None => session.bell = true,
        },
        Widget::DownLineOrHistory => {
            let index = session.history_cursor + 1;
            if index > session.history.len() {
                session.bell = true;
            } else {
                show_history_entry(session, index)?;
            }
        }
        Widget::BeginningOfHistory => {
            if session.history.is_empty() {
                session.bell = true;
            } else {
                show_history_entry(session, 0)?;
            }
        }
        Widget::EndOfHistory => {
            let index = session.history.len();
            show_history_entry(session, index)?;
        }
        Widget::HistoryIncrementalSearchBackward => session.start_search()?,
        Widget::AcceptSearch => {}

        // Vi modes
        Widget::ViCmdMode => {
            session.keymaps.select("vicmd")?;
            session.buffer.move_cursor(Direction::Left);
        }
        Widget::ViInsert => session.keymaps.select(MAIN_KEYMAP)?,
        Widget::ViAddNext => {
            session.keymaps.select(MAIN_KEYMAP)?;
            session.buffer.move_cursor(Direction::Right);
        }
        Widget::ViAddEol => {
            session.keymaps.select(MAIN_KEYMAP)?;
            session.buffer.move_end();
        }
        Widget::ViInsertBol => {
            session.keymaps.select(MAIN_KEYMAP)?;
            session.buffer.move_home();
        }
    }
    tracing::trace!(%widget, ?flags, cursor = session.buffer.cursor(), "applied widget");
    Ok(Flow::Continue)
}

/// Remove `[start, end)` and record it in the kill buffer, extending the
/// previous kill when the last command was also a kill.
fn kill_region(
    session: &mut EditorSession,
    start: usize,
    end: usize,
    at: KillEnd,
    continues_kill: bool,
) {
    if start >= end {
        return;
    }
    let killed = session.buffer.slice(start..end);
    session.buffer.set_cursor(start);
    session.buffer.delete_forward(end - start);
    if !continues_kill {
        session.kill_buffer.clear();
    }
    match at {
        KillEnd::Append => session.kill_buffer.push_str(&killed),
        KillEnd::Prepend => session.kill_buffer.insert_str(0, &killed),
    }
}

/// Swap the character before the cursor with the one under it, or the two
/// before the cursor at end of line, then advance. Returns false when
/// there are not two characters to swap.
fn transpose_chars(session: &mut EditorSession) -> bool {
    let buffer = &mut session.buffer;
    let len = buffer.len();
    let mut cursor = buffer.cursor();
    if len < 2 {
        return false;
    }
    if cursor == 0 {
        cursor = 1;
    }
    if cursor == len {
        cursor -= 1;
    }
    buffer.swap(cursor - 1, cursor);
    buffer.set_cursor(cursor + 1);
    true
}

/// Replace the line with history entry `index`, or with the saved edited
/// line when `index` is past the newest entry. Moving to the edited line
/// while already on it leaves the buffer alone.
fn show_history_entry(session: &mut EditorSession, index: usize) -> Result<()> {
    let len = session.history.len();
    if index >= len && session.history_cursor >= len {
        return Ok(());
    }
    if session.history_cursor == len && index < len {
        session.saved_line = Some(session.buffer.as_string());
    }
    let line = if index >= len {
        session.saved_line.take().unwrap_or_default()
    } else {
        session.history.get(index).unwrap_or_default().to_string()
    };
    session.buffer.set_line(&line)?;
    session.history_cursor = index.min(len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::LineBuffer;

    fn session_with(text: &str, cursor: usize) -> EditorSession {
        let mut session = EditorSession::default();
        session.begin_line();
        session.buffer = LineBuffer::from_text(text);
        session.buffer.set_cursor(cursor);
        session
    }

    fn run(session: &mut EditorSession, widget: Widget) -> Flow {
        apply(widget, widget.default_flags(), session).unwrap()
    }

    fn type_str(session: &mut EditorSession, text: &str) {
        for ch in text.chars() {
            session.last_char = Some(ch);
            run(session, Widget::SelfInsert);
        }
    }

    #[test]
    fn test_self_insert_and_overwrite() {
        let mut session = session_with("abc", 1);
        type_str(&mut session, "X");
        assert_eq!(session.buffer.as_string(), "aXbc");

        run(&mut session, Widget::OverwriteMode);
        type_str(&mut session, "YZW");
        assert_eq!(session.buffer.as_string(), "aXYZW");
    }

    #[test]
    fn test_accept_and_break_flows() {
        let mut session = session_with("ls", 2);
        assert_eq!(run(&mut session, Widget::AcceptLine), Flow::Done);
        assert_eq!(run(&mut session, Widget::SendBreak), Flow::Cancelled);
    }

    #[test]
    fn test_delete_char_or_eof() {
        let mut session = session_with("", 0);
        assert_eq!(run(&mut session, Widget::DeleteCharOrEof), Flow::Eof);

        let mut session = session_with("ab", 0);
        assert_eq!(run(&mut session, Widget::DeleteCharOrEof), Flow::Continue);
        assert_eq!(session.buffer.as_string(), "b");
    }

    #[test]
    fn test_word_motion() {
        let mut session = session_with("git commit -m", 0);
        run(&mut session, Widget::ForwardWord);
        assert_eq!(session.buffer.cursor(), 4);
        run(&mut session, Widget::EndOfLine);
        run(&mut session, Widget::BackwardWord);
        // `-` is a word character.
        assert_eq!(session.buffer.cursor(), 11);
    }

    #[test]
    fn test_consecutive_kills_accumulate() {
        let mut session = session_with("one two three", 13);
        run(&mut session, Widget::BackwardKillWord);
        run(&mut session, Widget::BackwardKillWord);
        assert_eq!(session.kill_buffer, "two three");
        assert_eq!(session.buffer.as_string(), "one ");

        run(&mut session, Widget::BeginningOfLine);
        run(&mut session, Widget::KillLine);
        assert_eq!(session.kill_buffer, "one ");
    }

    #[test]
    fn test_not_command_widget_keeps_kill_sequence() {
        let mut session = session_with("alpha beta", 0);
        run(&mut session, Widget::KillWord);
        run(&mut session, Widget::Redisplay);
        run(&mut session, Widget::KillWord);
        assert_eq!(session.kill_buffer, "alpha beta");
    }

    #[test]
    fn test_movement_breaks_kill_sequence() {
        let mut session = session_with("alpha beta", 0);
        run(&mut session, Widget::KillWord);
        run(&mut session, Widget::ForwardChar);
        run(&mut session, Widget::KillWord);
        assert_eq!(session.kill_buffer, "beta");
    }

    #[test]
    fn test_yank_inserts_kill_buffer() {
        let mut session = session_with("hello world", 5);
        run(&mut session, Widget::KillLine);
        run(&mut session, Widget::BeginningOfLine);
        run(&mut session, Widget::Yank);
        assert_eq!(session.buffer.as_string(), " worldhello");
    }

    #[test]
    fn test_yank_empty_rings_bell() {
        let mut session = session_with("", 0);
        run(&mut session, Widget::Yank);
        assert!(session.bell);
    }

    #[test]
    fn test_transpose_chars() {
        let mut session = session_with("abc", 1);
        run(&mut session, Widget::TransposeChars);
        assert_eq!(session.buffer.as_string(), "bac");
        assert_eq!(session.buffer.cursor(), 2);

        let mut session = session_with("abc", 3);
        run(&mut session, Widget::TransposeChars);
        assert_eq!(session.buffer.as_string(), "acb");

        let mut session = session_with("abc", 0);
        run(&mut session, Widget::TransposeChars);
        assert_eq!(session.buffer.as_string(), "bac");

        let mut session = session_with("a", 1);
        run(&mut session, Widget::TransposeChars);
        assert!(session.bell);
    }

    #[test]
    fn test_history_walk_restores_edited_line() {
        let mut session = EditorSession::default();
        session.history.push("first");
        session.history.push("second");
        session.begin_line();
        type_str(&mut session, "draft");

        run(&mut session, Widget::UpLineOrHistory);
        assert_eq!(session.buffer.as_string(), "second");
        run(&mut session, Widget::UpLineOrHistory);
        assert_eq!(session.buffer.as_string(), "first");
        run(&mut session, Widget::UpLineOrHistory);
        assert!(session.bell);

        run(&mut session, Widget::DownLineOrHistory);
        run(&mut session, Widget::DownLineOrHistory);
        assert_eq!(session.buffer.as_string(), "draft");
        assert_eq!(session.buffer.cursor(), 5);
    }

    #[test]
    fn test_beginning_and_end_of_history() {
        let mut session = EditorSession::default();
        session.history.push("old");
        session.history.push("new");
        session.begin_line();
        type_str(&mut session, "x");
        run(&mut session, Widget::BeginningOfHistory);
        assert_eq!(session.buffer.as_string(), "old");
        run(&mut session, Widget::EndOfHistory);
        assert_eq!(session.buffer.as_string(), "x");
    }

    #[test]
    fn test_end_of_history_on_edited_line_keeps_it() {
        let mut session = EditorSession::default();
        session.history.push("old");
        session.begin_line();
        type_str(&mut session, "draft");
        session.buffer.set_cursor(2);
        let revision = session.buffer.revision();

        run(&mut session, Widget::EndOfHistory);
        assert_eq!(session.buffer.as_string(), "draft");
        assert_eq!(session.buffer.cursor(), 2);
        assert_eq!(session.buffer.revision(), revision);
        assert_eq!(session.history_cursor, 1);
    }

    #[test]
    fn test_vi_mode_switches() {
        let mut session = EditorSession::new(true);
        session.begin_line();
        type_str(&mut session, "abc");
        run(&mut session, Widget::ViCmdMode);
        assert_eq!(session.keymaps.current_name(), "vicmd");
        assert_eq!(session.buffer.cursor(), 2);

        run(&mut session, Widget::ViAddEol);
        assert_eq!(session.keymaps.current_name(), "main");
        assert_eq!(session.buffer.cursor(), 3);
    }

    #[test]
    fn test_search_mode_routing() {
        let mut session = EditorSession::default();
        for line in ["make build", "make test", "git status"] {
            session.history.push(line);
        }
        session.begin_line();
        run(&mut session, Widget::HistoryIncrementalSearchBackward);
        assert!(session.is_searching());
        type_str(&mut session, "mak");
        assert_eq!(session.buffer.as_string(), "make test");
        assert_eq!(session.status.as_deref(), Some("bck-i-search: mak_"));

        run(&mut session, Widget::HistoryIncrementalSearchBackward);
        assert_eq!(session.buffer.as_string(), "make build");

        // A non-search widget accepts the match and then runs.
        run(&mut session, Widget::BeginningOfLine);
        assert!(!session.is_searching());
        assert_eq!(session.buffer.as_string(), "make build");
        assert_eq!(session.buffer.cursor(), 0);
        assert_eq!(session.status, None);
    }

    #[test]
    fn test_search_send_break_restores_line() {
        let mut session = EditorSession::default();
        session.history.push("make test");
        session.begin_line();
        type_str(&mut session, "draft");
        session.buffer.set_cursor(2);
        run(&mut session, Widget::HistoryIncrementalSearchBackward);
        type_str(&mut session, "make");
        run(&mut session, Widget::SendBreak);
        assert!(!session.is_searching());
        assert_eq!(session.buffer.as_string(), "draft");
        assert_eq!(session.buffer.cursor(), 2);
    }

    #[test]
    fn test_capacity_exceeded_propagates() {
        let mut session = EditorSession::default().with_line_limit(Some(2));
        session.begin_line();
        type_str(&mut session, "ab");
        session.last_char = Some('c');
        let err = apply(Widget::SelfInsert, WidgetFlags::empty(), &mut session).unwrap_err();
        assert!(matches!(err, crate::error::ZleError::CapacityExceeded { .. }));
        assert_eq!(session.buffer.as_string(), "ab");
    }
}
