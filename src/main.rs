//! zline - An interactive line editor in the style of the zsh line editor.
//!
//! # Usage
//!
//! ```bash
//! zline
//! zline --vi --history-file ~/.zline_history
//! zline --list-bindings main
//! ```

use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zline::app::{
    EditorSession, LineEditor, ParseResult, RawModeGuard, TerminalDisplay, TerminalInput,
};
use zline::config::{
    ConfigFlags, RcFile, apply_directives, global_config_path, load_rc_file, local_override_path,
    parse_flag_tokens,
};
use zline::history::{DEFAULT_HISTORY_SIZE, History};
use zline::keymap::{MAIN_KEYMAP, SAFE_KEYMAP, format_key_sequence};

/// A zsh-style line editor
#[derive(Parser, Debug)]
#[command(name = "zline", version, about, long_about = None)]
struct Cli {
    /// Use vi key bindings
    #[arg(long, conflicts_with = "emacs")]
    vi: bool,

    /// Use emacs key bindings (the default)
    #[arg(long)]
    emacs: bool,

    /// Start in the read-only keymap
    #[arg(long)]
    safe: bool,

    /// Number of history entries to keep
    #[arg(long, value_name = "N")]
    history_size: Option<usize>,

    /// Milliseconds to wait for the rest of a key sequence
    #[arg(long, value_name = "MS")]
    key_timeout: Option<u64>,

    /// Load history from and save it to a file
    #[arg(long, value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Prompt shown before each line
    #[arg(long)]
    prompt: Option<String>,

    /// Longest line the editor accepts, in characters
    #[arg(long, value_name = "N")]
    max_line_length: Option<usize>,

    /// Write log events to a file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Read an additional rc file after the global and local ones
    #[arg(long, value_name = "PATH")]
    rc: Option<PathBuf>,

    /// List keymap names and exit
    #[arg(long)]
    list_keymaps: bool,

    /// List the bindings of a keymap and exit
    #[arg(long, value_name = "KEYMAP")]
    list_bindings: Option<String>,

    /// List widget names and exit
    #[arg(long)]
    list_widgets: bool,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

fn load_rc(cli: &Cli) -> Result<RcFile> {
    let global = load_rc_file(&global_config_path())?;
    let local = load_rc_file(&local_override_path())?;
    let mut rc = global.union(&local);
    if let Some(path) = &cli.rc {
        if !path.exists() {
            anyhow::bail!("rc file not found: {}", path.display());
        }
        rc = rc.union(&load_rc_file(path)?);
    }
    Ok(rc)
}

fn build_session(flags: &ConfigFlags, rc: &RcFile) -> Result<EditorSession> {
    let mut history = History::new(flags.history_size.unwrap_or(DEFAULT_HISTORY_SIZE));
    if let Some(path) = &flags.history_file {
        let loaded = history.load(path)?;
        tracing::debug!(loaded, path = %path.display(), "history loaded");
    }
    let mut session = EditorSession::new(flags.vi_mode())
        .with_line_limit(flags.max_line_len)
        .with_history(history);
    for err in apply_directives(&mut session, &rc.directives) {
        eprintln!("[warn] rc: {err}");
    }
    if flags.safe {
        session.keymaps.link_keymap(MAIN_KEYMAP, SAFE_KEYMAP)?;
    }
    Ok(session)
}

fn list_bindings(session: &EditorSession, keymap: &str) -> Result<()> {
    let Some(map) = session.keymaps.keymap(keymap) else {
        anyhow::bail!("no such keymap: {keymap}");
    };
    for (seq, binding) in map.bindings() {
        println!("{:<12} {binding}", format_key_sequence(seq));
    }
    Ok(())
}

/// Demo executor: prints each line and its words.
fn echo_line(line: &str) -> ParseResult {
    if line.chars().filter(|&c| c == '"').count() % 2 == 1 {
        return ParseResult::Failed("unmatched \"".to_string());
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    print!("{line}\r\n");
    if !words.is_empty() {
        print!("  {} word(s): {}\r\n", words.len(), words.join(" | "));
    }
    ParseResult::Complete
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let rc = load_rc(&cli)?;
    let effective = rc.flags.union(&parse_flag_tokens(&raw_args));

    init_logging(effective.log_file.as_ref())?;
    let session = build_session(&effective, &rc)?;

    if cli.list_keymaps {
        for name in session.keymaps.names() {
            println!("{name}");
        }
        return Ok(());
    }
    if let Some(keymap) = &cli.list_bindings {
        return list_bindings(&session, keymap);
    }
    if cli.list_widgets {
        for name in session.registry.names() {
            if let Some(line) = session.registry.describe(name) {
                println!("{line}");
            }
        }
        return Ok(());
    }

    let display = TerminalDisplay::new(stdout());
    let mut editor = LineEditor::new(session, TerminalInput::spawn(), display)
        .with_prompt(effective.prompt.clone().unwrap_or_else(|| "% ".to_string()));
    if let Some(timeout) = effective.key_timeout() {
        editor = editor.with_key_timeout(timeout);
    }

    let submitted = {
        let _raw = RawModeGuard::enable().context("Failed to enable raw mode")?;
        editor.run(&mut echo_line).context("Line editor error")?
    };
    tracing::info!(submitted, "input ended");

    if let Some(path) = &effective.history_file {
        editor
            .into_session()
            .history
            .save(path)
            .with_context(|| format!("Failed to save history to {}", path.display()))?;
    }
    Ok(())
}
