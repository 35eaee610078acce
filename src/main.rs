//! EO Chatlog - просмотрщик чат-лога Endless-Online в терминале
//!
//! Основные возможности:
//! - Вкладки [ALL] / [GLOBAL] / [WHISPER] / [SYSTEM]
//! - Подсчёт опыта и убийств монстров
//! - Импорт старых логов с сортировкой по дате

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};

use eo_chatlog::commands;
use eo_chatlog::persistence;
use eo_chatlog::{AppSettings, Category, LogError, LogParser, LogWatcher, MergeOptions, MergePolicy};

#[derive(Debug, Parser)]
#[command(name = "eo-chatlog", version, about = "Endless-Online chat log viewer")]
struct Cli {
    /// Chat log to watch (overrides ChatLogFilePath)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Settings file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the log and follow new lines
    Watch {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Print one tab once
    Show {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Total experience and top kills
    Stats {
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// All messages from one sender
    Sender { name: String },
    /// Merge older log files into the watched log (rewrites it)
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Skip lines without a MM/DD/YYYY date instead of rejecting the import
        #[arg(long)]
        skip_invalid: bool,
        /// Drop lines that are already present
        #[arg(long)]
        dedupe: bool,
        /// Keep a .bak copy of the log before rewriting it
        #[arg(long)]
        backup: bool,
    },
    /// Print the resolved settings
    Config {
        #[arg(long)]
        save: bool,
    },
}

fn resolve_settings(cli: &Cli, settings_path: Option<&std::path::Path>) -> AppSettings {
    let mut settings = match settings_path.map(persistence::load_settings) {
        Some(Ok(Some(settings))) => settings,
        Some(Ok(None)) | None => AppSettings::default(),
        Some(Err(e)) => {
            warn!("{}; using defaults", e);
            AppSettings::default()
        }
    };

    persistence::apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    if let Some(path) = &cli.log_file {
        settings.chat_log_file_path = Some(path.display().to_string());
    }
    if let Some(ms) = cli.interval_ms {
        settings.poll_interval_ms = ms.max(1);
    }
    settings
}

async fn run(cli: Cli) -> Result<(), String> {
    let settings_path = cli.settings.clone().or_else(persistence::settings_path);
    let settings = resolve_settings(&cli, settings_path.as_deref());
    let command = cli.command.unwrap_or(Command::Watch { category: None });
    let mut out = io::stdout().lock();

    if let Command::Config { save } = command {
        return commands::config(&settings, settings_path.as_deref(), save, &mut out);
    }

    let log_path = settings
        .chat_log_file_path
        .clone()
        .ok_or_else(|| LogError::NoLogPath.to_string())?;
    info!("Using chat log: {}", log_path);

    let parser = LogParser::with_markers(settings.markers.clone());
    let mut watcher = LogWatcher::new(log_path, parser);

    match command {
        Command::Watch { category } => {
            let interval = Duration::from_millis(settings.poll_interval_ms);
            commands::watch(&mut watcher, interval, category, &mut out).await
        }
        Command::Show { category } => {
            commands::initial_load(&mut watcher)?;
            commands::show(&watcher, category, &mut out)
        }
        Command::Stats { top, json } => {
            commands::initial_load(&mut watcher)?;
            commands::stats(&watcher, top.unwrap_or(settings.top_kills), json, &mut out)
        }
        Command::Sender { name } => {
            commands::initial_load(&mut watcher)?;
            commands::sender(&watcher, &name, &mut out)
        }
        Command::Import {
            files,
            skip_invalid,
            dedupe,
            backup,
        } => {
            let options = MergeOptions {
                policy: if skip_invalid {
                    MergePolicy::SkipInvalid
                } else {
                    MergePolicy::Reject
                },
                dedupe,
                backup,
            };
            commands::import(&mut watcher, &files, options, &mut out).map(|_| ())
        }
        Command::Config { .. } => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // .env — необязателен, там обычно лежит ChatLogFilePath
    let _ = dotenvy::dotenv();

    // Инициализируем логирование (RUST_LOG перекрывает уровни по умолчанию)
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("eo_chatlog", LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("EO Chatlog v{} starting...", env!("CARGO_PKG_VERSION"));

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
