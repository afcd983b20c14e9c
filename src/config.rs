//! Startup configuration: flag tokens shared by the command line and rc
//! files, and rc directives that edit keymaps and widgets.
//!
//! An rc file mixes two kinds of lines:
//!
//! ```text
//! # comment
//! --vi
//! --history-size 500
//! bindkey '^[[1;5D' backward-word
//! bindkey -M vicmd -s 'gs' 'git status^M'
//! zle -A kill-line my-kill
//! ```
//!
//! Lines starting with `--` hold flag tokens; everything else is a
//! directive applied to the session after the builtin keymaps are set up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::app::EditorSession;
use crate::keymap::{MAIN_KEYMAP, parse_key_sequence};
use crate::thingy::UserTarget;
use crate::widget::BUILTIN_WIDGETS;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub vi: bool,
    pub emacs: bool,
    /// Start in the read-only `.safe` keymap.
    pub safe: bool,
    pub history_size: Option<usize>,
    pub key_timeout_ms: Option<u64>,
    pub history_file: Option<PathBuf>,
    pub prompt: Option<String>,
    pub max_line_len: Option<usize>,
    pub log_file: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge two flag sets; options in `other` win.
    pub fn union(&self, other: &Self) -> Self {
        let (vi, emacs) = if other.vi || other.emacs {
            (other.vi, other.emacs)
        } else {
            (self.vi, self.emacs)
        };
        Self {
            vi,
            emacs,
            safe: self.safe || other.safe,
            history_size: other.history_size.or(self.history_size),
            key_timeout_ms: other.key_timeout_ms.or(self.key_timeout_ms),
            history_file: other
                .history_file
                .clone()
                .or_else(|| self.history_file.clone()),
            prompt: other.prompt.clone().or_else(|| self.prompt.clone()),
            max_line_len: other.max_line_len.or(self.max_line_len),
            log_file: other.log_file.clone().or_else(|| self.log_file.clone()),
        }
    }

    /// Whether `main` should link to `viins`.
    pub const fn vi_mode(&self) -> bool {
        self.vi && !self.emacs
    }

    pub fn key_timeout(&self) -> Option<Duration> {
        self.key_timeout_ms.map(Duration::from_millis)
    }
}

/// A loaded rc file: its flags and its directive lines with line numbers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RcFile {
    pub flags: ConfigFlags,
    pub directives: Vec<(usize, String)>,
}

impl RcFile {
    /// Merge with a file read later; its flags win and its directives run after.
    pub fn union(&self, later: &Self) -> Self {
        let mut directives = self.directives.clone();
        directives.extend(later.directives.iter().cloned());
        Self {
            flags: self.flags.union(&later.flags),
            directives,
        }
    }
}

pub fn global_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("zline").join("zlinerc");
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("zline")
            .join("zlinerc");
    }
    PathBuf::from(".zlinerc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".zlinerc")
}

/// Read an rc file. A missing file is empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_rc_file(path: &Path) -> Result<RcFile> {
    if !path.exists() {
        return Ok(RcFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    Ok(parse_rc(&content))
}

/// Split rc text into flag tokens and directive lines.
pub fn parse_rc(content: &str) -> RcFile {
    let mut tokens = Vec::new();
    let mut directives = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("--") {
            tokens.extend(line.split_whitespace().map(ToOwned::to_owned));
        } else {
            directives.push((idx + 1, line.to_string()));
        }
    }
    RcFile {
        flags: parse_flag_tokens(&tokens),
        directives,
    }
}

/// Pick the known flags out of a token list. Unknown tokens are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (token, None),
        };
        let mut value = || {
            inline.clone().or_else(|| {
                let next = tokens.get(i + 1).cloned();
                if next.is_some() {
                    i += 1;
                }
                next
            })
        };
        match name {
            "--vi" => flags.vi = true,
            "--emacs" => flags.emacs = true,
            "--safe" => flags.safe = true,
            "--history-size" => flags.history_size = value().and_then(|v| v.parse().ok()),
            "--key-timeout" => flags.key_timeout_ms = value().and_then(|v| v.parse().ok()),
            "--history-file" => flags.history_file = value().map(PathBuf::from),
            "--prompt" => flags.prompt = value(),
            "--max-line-length" => flags.max_line_len = value().and_then(|v| v.parse().ok()),
            "--log-file" => flags.log_file = value().map(PathBuf::from),
            _ => {}
        }
        i += 1;
    }
    flags
}

/// Run rc directives against a session. Each failure is reported with its
/// line number and does not stop the remaining directives.
pub fn apply_directives(
    session: &mut EditorSession,
    directives: &[(usize, String)],
) -> Vec<String> {
    let mut errors = Vec::new();
    for (line_no, line) in directives {
        if let Err(err) = apply_directive(session, line) {
            tracing::warn!(line = line_no, %err, "rc directive failed");
            errors.push(format!("line {line_no}: {err:#}"));
        }
    }
    errors
}

/// Run one directive:
///
/// - `bindkey [-M KEYMAP] SEQ WIDGET`
/// - `bindkey [-M KEYMAP] -s SEQ STRING`
/// - `bindkey [-M KEYMAP] -r SEQ`
/// - `bindkey -N NEW [OLD]` creates a keymap, optionally copying OLD
/// - `bindkey -A OLD NEW` makes NEW another name for OLD
/// - `bindkey -D KEYMAP` deletes a keymap name
/// - `zle -A OLD NEW` makes widget NEW an alias of OLD
/// - `zle -N NAME BUILTIN` binds NAME to a builtin widget
/// - `zle -D NAME` removes a user widget
///
/// # Errors
///
/// Returns an error for malformed directives and for rejected keymap or
/// widget changes.
pub fn apply_directive(session: &mut EditorSession, line: &str) -> Result<()> {
    let words = split_words(line)?;
    let Some((command, args)) = words.split_first() else {
        return Ok(());
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match command.as_str() {
        "bindkey" => bindkey(session, &args),
        "zle" => zle(session, &args),
        other => bail!("unknown directive `{other}`"),
    }
}

fn bindkey(session: &mut EditorSession, args: &[&str]) -> Result<()> {
    let keymaps = &mut session.keymaps;
    let (keymap, args) = match args {
        ["-M", keymap, rest @ ..] => (*keymap, rest),
        _ => (MAIN_KEYMAP, args),
    };
    match args {
        ["-N", new] => keymaps.create_keymap(new, None)?,
        ["-N", new, old] => keymaps.create_keymap(new, Some(*old))?,
        ["-A", old, new] => keymaps.link_keymap(new, old)?,
        ["-D", name] => keymaps.delete_keymap(name)?,
        ["-s", seq, text] => {
            let seq = parse_key_sequence(seq)?;
            let text = expand_send_string(text)?;
            keymaps.bind_string(keymap, &seq, &text)?;
        }
        ["-r", seq] => {
            let seq = parse_key_sequence(seq)?;
            if !keymaps.unbind(keymap, &seq)? {
                tracing::debug!(keymap, "bindkey -r: sequence was not bound");
            }
        }
        [seq, widget] if !seq.starts_with('-') || seq.len() == 1 => {
            let seq = parse_key_sequence(seq)?;
            keymaps.bind(keymap, &seq, widget)?;
        }
        _ => bail!("usage: bindkey [-M keymap] [-s|-r] SEQ [WIDGET|STRING]"),
    }
    Ok(())
}

fn zle(session: &mut EditorSession, args: &[&str]) -> Result<()> {
    let registry = &mut session.registry;
    match args {
        ["-A", old, new] => {
            registry.bind_user(new, UserTarget::Alias((*old).to_string()))?;
        }
        ["-N", name, builtin] => {
            let Some((_, _, widget)) = BUILTIN_WIDGETS.iter().find(|(n, _, _)| n == builtin)
            else {
                bail!("`{builtin}` is not a builtin widget");
            };
            registry.bind_user(name, UserTarget::Widget(*widget))?;
        }
        ["-D", name] => registry.unbind_user(name)?,
        _ => bail!("usage: zle -A OLD NEW | zle -N NAME BUILTIN | zle -D NAME"),
    }
    Ok(())
}

/// Send-string text uses key notation (`^M`, `\e`), so the same parser applies.
fn expand_send_string(text: &str) -> Result<Vec<u8>> {
    Ok(parse_key_sequence(text)?)
}

/// Split a directive into words. Single quotes keep text verbatim, double
/// quotes group words, and a backslash outside quotes is kept for key
/// notation.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    for ch in line.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_word = true;
            }
            (None, '#') if !in_word => break,
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        bail!("unterminated {q} quote");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
