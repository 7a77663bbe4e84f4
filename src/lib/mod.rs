//! Source file header synchronization library.
//!
//! This library keeps a fixed block of header lines (typically a license or
//! copyright comment) at the top of source files, or strips it back out. The
//! same operations work on files on disk and on documents open in an editor.
//!
//! # Features
//!
//! - **Idempotent edits**: inserting or removing twice changes nothing the second time
//! - **Minimal changes**: only the lines that differ from the template are touched
//! - **Encoding round-trip**: files are written back in the encoding they were read with
//! - **Editor-aware**: open documents are edited through their live buffer
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use header_sync::engine::SyncMode;
//! use header_sync::sync::{HeaderSync, HeaderSyncOptions};
//!
//! let options = HeaderSyncOptions {
//!     mode: SyncMode::Remove,
//!     ..HeaderSyncOptions::default()
//! };
//!
//! let report = HeaderSync::sync_with_options(options, None).unwrap();
//! println!("{report}");
//! ```

pub mod document;
pub mod encoding;
pub mod engine;
pub mod process;
pub mod sync;
pub mod template;
pub mod workspace;
