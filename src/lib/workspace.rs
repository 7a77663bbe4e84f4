//! Filesystem-backed collaborators for running outside an editor.
//!
//! [`FsEnumerator`] treats a directory as the solution and every file under
//! it as a project item. [`OpenBuffers`] holds documents loaded into memory,
//! playing the part of an editor's open tabs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use walkdir::{DirEntry, WalkDir};

use crate::document::{DiskDocument, DocumentError, EditBuffer, TextBuffer};
use crate::process::{EnumerateError, LiveBufferAccessor, Project, ProjectEnumerator, ProjectItem, SourceFile};

/// Enumerates files below a root directory.
///
/// Hidden entries are skipped. A directory containing the project marker file
/// becomes a nested project instead of contributing its files directly.
#[derive(Debug, Clone)]
pub struct FsEnumerator {
  root: PathBuf,
  project_marker: Option<String>,
}

impl FsEnumerator {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      project_marker: None,
    }
  }

  pub fn with_project_marker(mut self, marker: impl Into<String>) -> Self {
    self.project_marker = Some(marker.into());
    self
  }

  fn is_sub_project(&self, entry: &DirEntry) -> bool {
    entry.depth() > 0
      && entry.file_type().is_dir()
      && self
        .project_marker
        .as_ref()
        .is_some_and(|marker| entry.path().join(marker).is_file())
  }

  fn scan(&self, dir: &Path) -> Project {
    #[cfg(feature = "tracing")]
    debug!(?dir, "Scanning project directory");

    let mut items = Vec::new();
    let mut nested = Vec::new();

    let walker = WalkDir::new(dir)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| {
        if is_hidden(entry) {
          return false;
        }
        if self.is_sub_project(entry) {
          nested.push(entry.path().to_path_buf());
          return false;
        }
        true
      });

    items.extend(collect_files(walker));

    for sub_dir in nested {
      items.push(ProjectItem::SubProject(self.scan(&sub_dir)));
    }

    Project {
      name: dir_name(dir),
      items,
    }
  }
}

impl ProjectEnumerator for FsEnumerator {
  fn solution_name(&self) -> Option<String> {
    if !self.root.is_dir() {
      return None;
    }
    Some(dir_name(&self.root))
  }

  fn projects(&self) -> Result<Vec<Project>, EnumerateError> {
    if !self.root.is_dir() {
      return Err(EnumerateError::NotADirectory(self.root.clone()));
    }
    Ok(vec![self.scan(&self.root)])
  }
}

/// Files among `entries`. Entries that cannot be read are logged and skipped,
/// so one unreadable directory does not hide the rest of the tree.
fn collect_files(entries: impl IntoIterator<Item = walkdir::Result<DirEntry>>) -> Vec<ProjectItem> {
  entries
    .into_iter()
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry),
      Err(_err) => {
        #[cfg(feature = "tracing")]
        warn!(path = ?_err.path(), error = %_err, "Skipping unreadable entry");
        None
      }
    })
    .filter(|entry| entry.file_type().is_file())
    .map(|entry| {
      #[cfg(feature = "tracing")]
      trace!(path = ?entry.path(), "Found file");

      ProjectItem::File(SourceFile::new(entry.into_path()))
    })
    .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
  entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn dir_name(dir: &Path) -> String {
  let resolved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
  resolved
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| resolved.display().to_string())
}

/// In-memory documents keyed by path, standing in for an editor's open tabs.
#[derive(Debug, Default)]
pub struct OpenBuffers {
  buffers: HashMap<PathBuf, TextBuffer>,
}

impl OpenBuffers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Loads a file from disk into a new buffer.
  pub fn open(&mut self, path: impl Into<PathBuf>) -> Result<&mut TextBuffer, DocumentError> {
    let path = path.into();
    let document = DiskDocument::open(&path)?;
    Ok(self.insert(path, TextBuffer::new(&document.text())))
  }

  pub fn insert(&mut self, path: impl Into<PathBuf>, buffer: TextBuffer) -> &mut TextBuffer {
    let slot = self.buffers.entry(path.into()).or_default();
    *slot = buffer;
    slot
  }

  pub fn get(&self, path: &Path) -> Option<&TextBuffer> {
    self.buffers.get(path)
  }

  pub fn len(&self) -> usize {
    self.buffers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffers.is_empty()
  }
}

impl LiveBufferAccessor for OpenBuffers {
  fn is_open(&self, path: &Path) -> bool {
    self.buffers.contains_key(path)
  }

  fn buffer(&mut self, path: &Path) -> Option<&mut dyn EditBuffer> {
    self.buffers.get_mut(path).map(|buffer| buffer as &mut dyn EditBuffer)
  }
}
