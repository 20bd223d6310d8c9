//! Entry point for the plain-text reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Resolve the document through the catalog.
//! - Run one reading session against a headless text viewport, taking
//!   typed commands from stdin.

mod catalog;
mod config;
mod progress;
mod runtime;
mod session;
mod settings;
mod speech;
mod store;
mod viewport;

use crate::catalog::{DocumentCatalog, FsCatalog};
use crate::config::{AppConfig, load_config, serialize_config};
use crate::runtime::{Host, Runtime};
use crate::session::{COMMAND_HELP, ReaderSnapshot, ReadingSession, SessionEvent};
use crate::settings::{ReaderSettings, SettingsReconciler};
use crate::speech::{Notice, SpeechOptions, SpeechService};
use crate::store::{FileStore, KeyValueStore, MemoryStore, PreferenceStore};
use crate::viewport::TextViewport;
use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const CONFIG_PATH: &str = "conf/config.toml";
const USAGE: &str = "Usage: txt-reader [--speak] [--auto-scroll] <document-id-or-path>\n       \
                     txt-reader --list | --favorite <id> | --unfavorite <id>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Read {
        target: String,
        speak: bool,
        auto_scroll: bool,
    },
    List,
    Favorite(String),
    Unfavorite(String),
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    let config_path = Path::new(CONFIG_PATH);
    let config = load_config(config_path);
    if !config_path.exists() {
        write_default_config(config_path, &config);
    }
    set_log_level(reload_handle, config.log_level.as_filter_str());
    let catalog = FsCatalog::open(&config.corpus_dir)?;

    match command {
        Command::List => list_documents(&catalog),
        Command::Favorite(id) => {
            let title = Path::new(&id)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| id.clone());
            let favorite = catalog.add_favorite(&id, &title)?;
            println!("★ {}", favorite.title);
            Ok(())
        }
        Command::Unfavorite(id) => catalog.remove_favorite(&id),
        Command::Read {
            target,
            speak,
            auto_scroll,
        } => read_document(&config, &catalog, &target, speak, auto_scroll),
    }
}

fn read_document(
    config: &AppConfig,
    catalog: &FsCatalog,
    target: &str,
    speak: bool,
    auto_scroll: bool,
) -> Result<()> {
    let text = load_document(catalog, target)?;
    info!(
        document = target,
        chars = text.chars().count(),
        speak,
        auto_scroll,
        "Opening document"
    );
    let backend: Box<dyn KeyValueStore> = if config.store_dir.trim().is_empty() {
        warn!("No store_dir configured; settings will not persist");
        Box::new(MemoryStore::new())
    } else {
        Box::new(FileStore::open(&config.store_dir))
    };
    let reconciler =
        SettingsReconciler::load(PreferenceStore::new(backend), config.settings_key.clone());

    let speech = speech_service(config);
    info!(
        supported = speech.is_supported(),
        keepalive = %config.stall_keepalive,
        max_chunk_len = config.max_chunk_len,
        "Active speech configuration"
    );
    let options = SpeechOptions::from_config(config, speech.needs_keepalive());
    let ambient = config
        .ambient_mode
        .resolve(env::var("COLORFGBG").ok().as_deref());
    let session = ReadingSession::new(config, reconciler, options, speech.is_supported(), text.clone())
        .with_ambient_mode(ambient);
    if !speak && !auto_scroll && !session.settings().auto_scroll_enabled {
        print!("{text}");
        return Ok(());
    }
    let viewport = TextViewport::new(&text, config.viewport_height_px, config.line_height_px, io::stdout());
    let runtime = Runtime::new(session, viewport, speech, ConsoleHost::default()).stop_when_idle(true);

    let events = runtime.sender();
    let interrupt = events.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(SessionEvent::Shutdown);
    })
    .context("Installing Ctrl-C handler")?;
    if auto_scroll {
        let _ = events.send(SessionEvent::StartAutoScroll);
    }
    if speak {
        let _ = events.send(SessionEvent::Speak { start_chunk: 0 });
    }
    spawn_command_reader(events.clone());
    eprintln!("{COMMAND_HELP}");

    let executor = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Building async runtime")?;
    let snapshot = executor.block_on(runtime.run());
    info!(
        percentage = snapshot.progress.percentage,
        chunk = snapshot.speech.current_chunk_index,
        total_chunks = snapshot.speech.total_chunks,
        "Reading session closed"
    );
    Ok(())
}

/// Forwards each stdin line to the session as a typed command. The thread
/// ends at EOF or once the session has gone away.
fn spawn_command_reader(events: UnboundedSender<SessionEvent>) {
    let spawned = thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        warn!("Stopped reading commands: {err}");
                        break;
                    }
                };
                if events.send(SessionEvent::Command(line)).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        warn!("Commands unavailable; could not start stdin reader: {err}");
    }
}

/// A path to an existing file is read directly; anything else is a catalog id.
fn load_document(catalog: &FsCatalog, target: &str) -> Result<String> {
    let path = PathBuf::from(target);
    if path.is_file() {
        return fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()));
    }
    catalog.fetch_document_content(target)
}

fn list_documents(catalog: &FsCatalog) -> Result<()> {
    let favorites = catalog.list_favorites()?;
    for document in catalog.list_documents()? {
        let marker = if favorites.iter().any(|f| f.id == document.id) {
            "★"
        } else {
            " "
        };
        println!("{marker} {:<32} {}", document.id, document.content_path.display());
    }
    Ok(())
}

#[cfg(feature = "piper")]
fn speech_service(config: &AppConfig) -> Box<dyn SpeechService> {
    Box::new(crate::speech::PiperSpeech::from_config(config))
}

#[cfg(not(feature = "piper"))]
fn speech_service(_config: &AppConfig) -> Box<dyn SpeechService> {
    Box::new(crate::speech::Unavailable)
}

fn write_default_config(path: &Path, config: &AppConfig) {
    let written = serialize_config(config).and_then(|contents| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    });
    match written {
        Ok(()) => info!(path = %path.display(), "Wrote default config"),
        Err(err) => warn!(path = %path.display(), "Could not write default config: {err:#}"),
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut speak = false;
    let mut auto_scroll = false;
    let mut target = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--speak" => speak = true,
            "--auto-scroll" => auto_scroll = true,
            "--list" => return Ok(Command::List),
            "--favorite" | "--unfavorite" => {
                let id = args.next().ok_or_else(|| anyhow!("{arg} needs a document id"))?;
                return Ok(if arg == "--favorite" {
                    Command::Favorite(id)
                } else {
                    Command::Unfavorite(id)
                });
            }
            flag if flag.starts_with("--") => bail!("Unknown option {flag}\n{USAGE}"),
            other if target.is_some() => bail!("Unexpected argument {other}\n{USAGE}"),
            other => target = Some(other.to_string()),
        }
    }

    let target = target.ok_or_else(|| anyhow!(USAGE))?;
    Ok(Command::Read {
        target,
        speak,
        auto_scroll,
    })
}

/// Reports progress through the log and notices on stderr.
#[derive(Default)]
struct ConsoleHost {
    last_percentage: Option<u8>,
    last_settings: Option<ReaderSettings>,
}

impl Host for ConsoleHost {
    fn render(&mut self, snapshot: &ReaderSnapshot) {
        if self.last_settings.as_ref() != Some(&snapshot.settings) {
            let settings = &snapshot.settings;
            let colors = settings.colors();
            info!(
                font_size = settings.font_size,
                line_height = settings.line_height,
                background = %colors.background,
                text = %colors.text,
                speed = settings.auto_scroll_speed,
                "Display settings"
            );
            self.last_settings = Some(settings.clone());
        }
        if self.last_percentage != Some(snapshot.progress.percentage) {
            self.last_percentage = Some(snapshot.progress.percentage);
            info!(
                percentage = snapshot.progress.percentage,
                auto_scrolling = snapshot.progress.auto_scrolling,
                paused_by_user = snapshot.progress.paused_by_user,
                speech = ?snapshot.speech.state,
                "Progress"
            );
        }
    }

    fn notify(&mut self, notice: &Notice) {
        eprintln!("{notice}");
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn read_flags_in_any_order() {
        let command = parse_args(args(&["--speak", "book.txt", "--auto-scroll"])).expect("parse");
        assert_eq!(
            command,
            Command::Read {
                target: "book.txt".to_string(),
                speak: true,
                auto_scroll: true,
            }
        );
    }

    #[test]
    fn catalog_commands() {
        assert_eq!(parse_args(args(&["--list"])).expect("parse"), Command::List);
        assert_eq!(
            parse_args(args(&["--favorite", "a.txt"])).expect("parse"),
            Command::Favorite("a.txt".to_string())
        );
        assert!(parse_args(args(&["--unfavorite"])).is_err());
    }

    #[test]
    fn rejects_missing_or_extra_targets() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["a.txt", "b.txt"])).is_err());
        assert!(parse_args(args(&["--fast", "a.txt"])).is_err());
    }
}
