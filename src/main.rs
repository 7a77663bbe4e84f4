use clap::{Parser, ValueEnum};
use header_sync::engine::SyncMode;
use header_sync::process::ProgressSink;
use header_sync::sync::{DEFAULT_EXTENSION, HeaderSync, HeaderSyncOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
  name = "header-sync",
  about = "Keep a fixed header template at the top of every source file, or strip it back out",
  version,
  author
)]
struct Cli {
  /// Whether to add the header or remove it
  #[arg(value_enum)]
  mode: Mode,

  /// Solution directory to process (defaults to the current directory)
  #[arg(short, long)]
  root: Option<PathBuf>,

  /// Path to the header template (defaults to the built-in template)
  #[arg(short, long)]
  template: Option<PathBuf>,

  /// Extension of the source files to process
  #[arg(short, long, default_value = DEFAULT_EXTENSION)]
  extension: String,

  /// File name that marks a sub-directory as a nested project
  #[arg(long)]
  project_marker: Option<String>,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
  Insert,
  Remove,
}

impl From<Mode> for SyncMode {
  fn from(mode: Mode) -> Self {
    match mode {
      Mode::Insert => SyncMode::Insert,
      Mode::Remove => SyncMode::Remove,
    }
  }
}

/// Prints per-file progress to stderr.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
  fn report(&mut self, message: &str) {
    eprintln!("{message}");
  }
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  let options = HeaderSyncOptions {
    root: cli.root,
    template_file: cli.template,
    extension: cli.extension,
    project_marker: cli.project_marker,
    mode: cli.mode.into(),
  };

  let mut progress = ConsoleProgress;
  let sink: Option<&mut dyn ProgressSink> = if cli.verbose > 0 { Some(&mut progress) } else { None };

  let report = HeaderSync::sync_with_options(options, sink)?;
  println!("{report}");

  Ok(())
}
