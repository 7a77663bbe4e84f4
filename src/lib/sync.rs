//! Header synchronization over a directory tree.
//!
//! This module wires the filesystem collaborators to the [`Processor`]:
//!
//! 1. Resolves the solution root, defaulting to the current directory
//! 2. Loads the template from the configured file or the embedded resource
//! 3. Applies the selected mode to every file of the target language
//! 4. Returns the run report
//!
//! # Examples
//!
//! ```rust,no_run
//! use header_sync::engine::SyncMode;
//! use header_sync::sync::{HeaderSync, HeaderSyncOptions};
//! use std::path::PathBuf;
//!
//! let options = HeaderSyncOptions {
//!     root: Some(PathBuf::from("src")),
//!     template_file: None, // embedded template
//!     extension: "rs".to_string(),
//!     project_marker: None,
//!     mode: SyncMode::Insert,
//! };
//!
//! let report = HeaderSync::sync_with_options(options, None).unwrap();
//! println!("{report}");
//! ```

use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::engine::SyncMode;
use crate::process::{Language, ProcessError, ProcessReport, Processor, ProgressSink};
use crate::template::{TemplateSource, TemplateStore};
use crate::workspace::FsEnumerator;

pub const DEFAULT_EXTENSION: &str = "rs";

/// Entry point for running a header sync over the filesystem.
pub struct HeaderSync;

impl HeaderSync {
  /// Runs one pass over the configured root.
  ///
  /// Returns an error only if the template cannot be loaded. Files that cannot
  /// be processed are counted as skipped in the report.
  pub fn sync_with_options(
    options: HeaderSyncOptions,
    progress: Option<&mut dyn ProgressSink>,
  ) -> Result<ProcessReport, ProcessError> {
    let HeaderSyncOptions {
      root,
      template_file,
      extension,
      project_marker,
      mode,
    } = options;

    let root = root.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    #[cfg(feature = "tracing")]
    debug!(?root, ?template_file, %extension, "Resolved options");

    let templates = TemplateStore::new(template_file.map_or(TemplateSource::Embedded, TemplateSource::File));

    let mut enumerator = FsEnumerator::new(root);
    if let Some(marker) = project_marker {
      enumerator = enumerator.with_project_marker(marker);
    }

    let mut processor = Processor::new(&templates, Language::new(&extension));
    if let Some(progress) = progress {
      processor = processor.with_progress(progress);
    }

    processor.process(&enumerator, mode)
  }
}

/// Configuration for a filesystem header sync.
#[derive(Debug, Clone)]
pub struct HeaderSyncOptions {
  /// Solution directory. If None, defaults to the current directory.
  pub root: Option<PathBuf>,
  /// Template file. If None, the embedded template is used.
  pub template_file: Option<PathBuf>,
  /// Extension of the files to process, without the dot.
  pub extension: String,
  /// File name marking a sub-directory as a nested project.
  pub project_marker: Option<String>,
  pub mode: SyncMode,
}

impl Default for HeaderSyncOptions {
  fn default() -> Self {
    Self {
      root: None,
      template_file: None,
      extension: DEFAULT_EXTENSION.to_string(),
      project_marker: None,
      mode: SyncMode::Insert,
    }
  }
}
