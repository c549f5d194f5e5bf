// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};
use tunetrace_application::{LibraryError, MusicLibrary, Recognition};
use tunetrace_config::load as load_config;

/// Index songs and recognize recorded clips by their landmark fingerprints.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file, merged over the defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Index an audio file, or every audio file directly inside a directory
    Index { path: PathBuf },
    /// Find the library song a recorded clip comes from
    Recognize { path: PathBuf },
    /// Remove a song and its fingerprint from the library
    Delete { name: String },
    /// List indexed songs with their posting counts
    List,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let filter = init_tracing();
    let config = load_config(args.config.as_deref())?;
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        apply_log_level(&filter, &config.telemetry.log_level)?;
    }

    let library = MusicLibrary::open(&config).await?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => signal_cancel.cancel(),
            Err(error) => warn!(target: "cli", %error, "failed to install signal handler"),
        }
    });

    let ok = run(&library, args.command, &cancel).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Execute one command. `Ok(false)` means it completed but should exit non-zero.
async fn run(library: &MusicLibrary, command: Command, cancel: &CancellationToken) -> Result<bool> {
    match command {
        Command::Index { path } => index(library, &path, cancel).await,
        Command::Recognize { path } => {
            let recognition = library.recognize(&path, cancel).await?;
            print_recognition(library, &recognition).await?;
            Ok(true)
        }
        Command::Delete { name } => match library.delete_song(&name).await {
            Ok(()) => {
                println!("Deleted {}", name);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                eprintln!("No song named {:?}", name);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        },
        Command::List => {
            for song in library.list_songs().await? {
                println!("{:>6}  {:>8}  {}", song.id, song.postings, song.name);
            }
            Ok(true)
        }
    }
}

async fn index(library: &MusicLibrary, path: &Path, cancel: &CancellationToken) -> Result<bool> {
    if !path.is_dir() {
        return Ok(match library.index_file(path, cancel).await {
            Ok(song) => {
                println!("indexed  {} ({} slots)", song.name, song.slots);
                true
            }
            Err(e) => {
                println!("failed   {}: {}", path.display(), e);
                false
            }
        });
    }

    let report = library.index_directory(path, cancel).await?;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(song) => println!("indexed  {} ({} slots)", song.name, song.slots),
            Err(LibraryError::Cancelled) => println!("skipped  {}", outcome.path.display()),
            Err(e) => println!("failed   {}: {}", outcome.path.display(), e),
        }
    }
    info!(
        target: "cli",
        succeeded = report.succeeded(),
        failed = report.failed(),
        "index finished"
    );
    Ok(report.is_complete_success())
}

async fn print_recognition(library: &MusicLibrary, recognition: &Recognition) -> Result<()> {
    println!("{}", recognition);
    if let Recognition::Match {
        candidates,
        query_slots,
        ..
    } = recognition
    {
        for candidate in candidates {
            let name = match library.song_name(candidate.song_id).await {
                Ok(name) => name,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            println!("  {:>5} / {:<5} {}", candidate.votes, query_slots, name);
        }
    }
    Ok(())
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn build_subscriber(
    filter: EnvFilter,
) -> (impl tracing::Subscriber + Send + Sync + 'static, FilterHandle) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let (filter_layer, handle) = reload::Layer::new(filter);

    let subscriber = tracing_subscriber::registry().with(filter_layer).with(fmt_layer);
    (subscriber, handle)
}

/// Install the subscriber at `RUST_LOG` or `info`, so configuration loading is
/// already logged. The handle swaps in the configured level afterwards.
fn init_tracing() -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (subscriber, handle) = build_subscriber(filter);
    subscriber.init();
    handle
}

fn apply_log_level(handle: &FilterHandle, level: &str) -> Result<()> {
    handle.reload(EnvFilter::new(level))?;
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!(target: "cli", "shutdown signal received, cancelling");
    Ok(())
}
