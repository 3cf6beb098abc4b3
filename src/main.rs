//! Key Logger CLI
//!
//! Logs keystrokes into per-session n-gram statistics for keyboard layout
//! optimization.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use key_logger::{
    collector::{check_permission, Collector, CollectorConfig, CollectorError},
    config::Config,
    export::{build_corpus, export_file_path, write_corpus},
    store::{SessionStore, SortKey, SqliteStore, StatKind, StatQuery, StatTable},
    transparency::create_shared_log_with_persistence,
    KeySession, END_COMMAND, VERSION,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "key-logger")]
#[command(version = VERSION)]
#[command(
    about = "Log all keypresses for keyboard layout optimization",
    long_about = "Log all keypresses for keyboard layout optimization.\n\nTo see help for each command use: key-logger COMMAND --help"
)]
struct Cli {
    /// Database file (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the logger for a session. End it by typing `.end` or pressing Ctrl+C
    Run {
        /// Start a new session with the provided name
        #[arg(long, short, conflicts_with = "session")]
        new: Option<String>,

        /// Continue logging into the session with the provided name
        #[arg(long, short)]
        session: Option<String>,

        /// Seconds between periodic flushes to the database
        #[arg(long)]
        flush_interval: Option<u64>,
    },

    /// View the stats of a session
    View {
        /// Session to view
        session: String,

        /// Stat to view: letters, bigrams, trigrams or skipgrams
        #[arg(long = "ngrams", short = 'n')]
        ngrams: StatKind,

        /// Number of top entries to show
        #[arg(long, short, default_value = "20")]
        limit: usize,

        /// Sort results by name or value
        #[arg(long, short = 's', default_value = "value")]
        sort_by: SortKey,
    },

    /// Save logged stats to a corpus JSON file
    Save {
        /// Output file (defaults to the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Only include this session
        #[arg(long, short)]
        session: Option<String>,
    },

    /// List logged sessions by name
    List,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Run {
            new,
            session,
            flush_interval,
        } => {
            if let Some(secs) = flush_interval {
                config.flush_interval = Duration::from_secs(secs);
            }
            cmd_run(&config, new.or(session))
        }
        Commands::View {
            session,
            ngrams,
            limit,
            sort_by,
        } => cmd_view(&config, &session, ngrams, limit, sort_by),
        Commands::Save { output, session } => cmd_save(&config, output, session.as_deref()),
        Commands::List => cmd_list(&config),
        Commands::Config => cmd_config(),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("could not open database {:?}", config.db_path))?;
    store.init().context("could not initialize database")?;
    Ok(store)
}

fn cmd_run(config: &Config, session: Option<String>) -> anyhow::Result<()> {
    let options = config
        .session_options()
        .context("invalid session settings")?;

    if !check_permission() {
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        return Err(CollectorError::PermissionDenied.into());
    }

    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {e}");
    }

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("could not open database {:?}", config.db_path))?;

    let session_name = match session {
        Some(name) => name,
        None => prompt_session(&store)?,
    };

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let mut session = KeySession::new(session_name, store, options)
        .with_log(transparency_log.clone());

    let mut collector = Collector::new(CollectorConfig::default());
    collector
        .start()
        .context("could not start key collector")?;
    session.start(Utc::now())?;

    println!("---");
    println!(
        "Started session '{}'. Listening to all keystrokes...",
        session.name()
    );
    println!("Type `{END_COMMAND}` and press Enter (or Ctrl+C) to stop.");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());
    end_command_listener(running.clone());

    let receiver = collector.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(press) => {
                if let Some(report) = session.record(&press)? {
                    tracing::info!(
                        writes = report.writes(),
                        rows_created = report.rows_created,
                        "Flushed batch"
                    );
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                tracing::error!("Collector disconnected unexpectedly");
                break;
            }
        }
    }

    collector.stop();
    // Presses queued before the collector stopped still belong to this session.
    while let Ok(press) = receiver.try_recv() {
        session.record(&press)?;
    }

    session.stop()?;
    println!("Session ended.");

    if let Err(e) = transparency_log.save() {
        tracing::warn!("Could not save transparency log: {e}");
    }
    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

/// Ask which session to log into, offering existing ones.
fn prompt_session(store: &SqliteStore) -> anyhow::Result<String> {
    let sessions = match store.init().and_then(|_| store.sessions()) {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!("Could not list sessions: {e}");
            Vec::new()
        }
    };

    if !sessions.is_empty() {
        loop {
            let choice = prompt(&format!(
                "Existing session/s: {sessions:?}\nChoose session or 'new' to start new"
            ))?;
            if choice.eq_ignore_ascii_case("new") {
                break;
            }
            if let Some(existing) = sessions.iter().find(|s| s.eq_ignore_ascii_case(&choice)) {
                return Ok(existing.clone());
            }
            eprintln!("Error: '{choice}' is not one of the listed sessions.");
        }
    }

    loop {
        let name = prompt("Session name")?;
        if !name.is_empty() {
            return Ok(name);
        }
    }
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{message}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        anyhow::bail!("Aborted!");
    }
    Ok(line.trim().to_string())
}

fn cmd_view(
    config: &Config,
    session: &str,
    kind: StatKind,
    limit: usize,
    sort_by: SortKey,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let query = StatQuery::new(kind)
        .limit(limit)
        .sort_by(sort_by)
        .session(session);
    let table = store.query(&query)?;

    println!("Session: {session}");
    println!("Ngram: {kind}");
    print!("{}", render_table(&table));
    Ok(())
}

fn cmd_save(config: &Config, output: Option<PathBuf>, session: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let corpus = build_corpus(&store, session)?;
    let path = output.unwrap_or_else(|| export_file_path(&config.export_path, Utc::now()));
    write_corpus(&corpus, &path)?;
    println!(
        "Saved corpus ({} letters, {} bigrams, {} trigrams) to {path:?}",
        corpus.total_letters, corpus.total_bigrams, corpus.total_trigrams
    );
    Ok(())
}

fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let sessions = store.sessions()?;
    let rows = sessions
        .into_iter()
        .enumerate()
        .map(|(i, s)| vec![i.to_string(), s])
        .collect::<Vec<_>>();
    print!(
        "{}",
        render_rows(&["no".to_string(), "session".to_string()], &rows)
    );
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn render_table(table: &StatTable) -> String {
    let rows = table
        .rows
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.name.clone(),
                r.value.to_string(),
                r.session.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_rows(&table.header, &rows)
}

/// Render rows inside a rounded box, header separated from the body.
fn render_rows(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{left}{}{right}\n", segments.join(mid))
    };
    let cells = |row: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = w - cell.chars().count();
                format!(" {cell}{} ", " ".repeat(pad))
            })
            .collect();
        format!("│{}│\n", padded.join("│"))
    };

    let mut out = line("╭", "┬", "╮");
    out.push_str(&cells(header));
    out.push_str(&line("├", "┼", "┤"));
    for row in rows {
        out.push_str(&cells(row));
    }
    out.push_str(&line("╰", "┴", "╯"));
    out
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not set Ctrl+C handler: {e}");
    }
}

/// Watch stdin for the end command.
fn end_command_listener(running: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim() == END_COMMAND => break,
                Ok(_) => {}
                Err(_) => return,
            }
        }
        running.store(false, Ordering::SeqCst);
    });
}
