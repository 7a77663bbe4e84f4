//! Run driver: walks every project of a solution and applies the selected
//! [`SyncMode`] to each eligible source file.
//!
//! Files are processed one at a time. Files open in an editor are edited
//! through their live buffer, everything else on disk. A failing file is
//! skipped and counted; only a missing template aborts the run.

use std::collections::VecDeque;
use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace, warn};

use crate::document::{DiskDocument, DocumentError, EditBuffer, LiveDocument};
use crate::engine::{Outcome, SyncMode};
use crate::template::{Template, TemplateError, TemplateStore};

/// Solution name reported when no solution is available.
pub const UNKNOWN_SOLUTION: &str = "N/A";

/// Source language kind, identified by lowercase file extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language(String);

impl Language {
  pub fn new(extension: &str) -> Self {
    Self(extension.trim_start_matches('.').to_ascii_lowercase())
  }

  pub fn from_path(path: &Path) -> Option<Self> {
    path.extension().and_then(|ext| ext.to_str()).map(Self::new)
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  pub path: PathBuf,
  pub language: Option<Language>,
  /// Whether the host reports the file as open in an editor.
  pub is_open: bool,
}

impl SourceFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    Self {
      language: Language::from_path(&path),
      path,
      is_open: false,
    }
  }

  pub fn opened(mut self) -> Self {
    self.is_open = true;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectItem {
  File(SourceFile),
  /// Items nested under another item; processed after the current level.
  Folder(Vec<ProjectItem>),
  /// A nested project; processed after everything else in its parent.
  SubProject(Project),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
  pub name: String,
  pub items: Vec<ProjectItem>,
}

/// Yields the projects of a solution in a stable order.
pub trait ProjectEnumerator {
  /// `None` when no solution is loaded.
  fn solution_name(&self) -> Option<String>;
  fn projects(&self) -> Result<Vec<Project>, EnumerateError>;
}

/// Access to documents currently open in an editor.
pub trait LiveBufferAccessor {
  fn is_open(&self, path: &Path) -> bool;
  fn buffer(&mut self, path: &Path) -> Option<&mut dyn EditBuffer>;
}

/// Receives human-readable status messages. Purely informational.
pub trait ProgressSink {
  fn report(&mut self, message: &str);
}

/// Runs a task on the thread that owns editor state.
pub trait OwnerThread {
  fn run(&self, task: &mut dyn FnMut());
}

/// Runs tasks inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentThread;

impl OwnerThread for CurrentThread {
  fn run(&self, task: &mut dyn FnMut()) {
    task();
  }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
  pub solution_name: String,
  pub processed_items: usize,
  pub processed_open_items: usize,
  pub changed_items: usize,
  pub skipped_items: usize,
  pub cancelled: bool,
}

impl fmt::Display for ProcessReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "The solution {} processed. Processed items: {}, include opened items {}",
      self.solution_name, self.processed_items, self.processed_open_items
    )?;
    if self.skipped_items > 0 {
      write!(f, ", skipped items {}", self.skipped_items)?;
    }
    if self.cancelled {
      write!(f, " (cancelled)")?;
    }
    Ok(())
  }
}

/// Applies a [`SyncMode`] to every eligible file of a solution.
pub struct Processor<'a> {
  templates: &'a TemplateStore,
  target: Language,
  progress: Option<&'a mut dyn ProgressSink>,
  buffers: Option<&'a mut dyn LiveBufferAccessor>,
  owner: &'a dyn OwnerThread,
  cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Processor<'a> {
  pub fn new(templates: &'a TemplateStore, target: Language) -> Self {
    Self {
      templates,
      target,
      progress: None,
      buffers: None,
      owner: &CurrentThread,
      cancel: None,
    }
  }

  pub fn with_progress(mut self, progress: &'a mut dyn ProgressSink) -> Self {
    self.progress = Some(progress);
    self
  }

  pub fn with_live_buffers(mut self, buffers: &'a mut dyn LiveBufferAccessor) -> Self {
    self.buffers = Some(buffers);
    self
  }

  /// Live buffer edits are run through `owner`. By default they run inline.
  pub fn with_owner_thread(mut self, owner: &'a dyn OwnerThread) -> Self {
    self.owner = owner;
    self
  }

  /// The flag is checked between files; a file is never left half edited.
  pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
    self.cancel = Some(cancel);
    self
  }

  /// Processes every project `enumerator` yields.
  ///
  /// Only a template that cannot be loaded is an error. Without a solution,
  /// or when enumeration fails, an empty report is returned.
  pub fn process(
    &mut self,
    enumerator: &dyn ProjectEnumerator,
    mode: SyncMode,
  ) -> Result<ProcessReport, ProcessError> {
    let templates = self.templates;
    let template = templates.get()?;

    let mut report = ProcessReport {
      solution_name: UNKNOWN_SOLUTION.to_string(),
      ..ProcessReport::default()
    };

    let Some(solution_name) = enumerator.solution_name().filter(|name| !name.is_empty()) else {
      #[cfg(feature = "tracing")]
      warn!("No solution available, nothing to process");
      return Ok(report);
    };
    report.solution_name = solution_name;

    #[cfg(feature = "tracing")]
    info!(solution = %report.solution_name, %mode, target = %self.target, "Starting run");

    let projects = match enumerator.projects() {
      Ok(projects) => projects,
      Err(_err) => {
        #[cfg(feature = "tracing")]
        warn!(error = %_err, "Cannot enumerate projects");
        return Ok(report);
      }
    };

    for project in projects {
      if self.process_project(project, template, mode, &mut report).is_break() {
        break;
      }
    }

    #[cfg(feature = "tracing")]
    info!(
      processed = report.processed_items,
      opened = report.processed_open_items,
      changed = report.changed_items,
      skipped = report.skipped_items,
      "Run finished"
    );

    self.notify(&report.to_string());
    Ok(report)
  }

  fn process_project(
    &mut self,
    project: Project,
    template: &Template,
    mode: SyncMode,
    report: &mut ProcessReport,
  ) -> ControlFlow<()> {
    self.notify(&format!("Start to process {}", project.name));

    let mut queue: VecDeque<ProjectItem> = project.items.into();
    let mut sub_projects = Vec::new();

    while let Some(item) = queue.pop_front() {
      match item {
        ProjectItem::File(file) => {
          if self.is_cancelled() {
            report.cancelled = true;
            return ControlFlow::Break(());
          }
          self.process_file(&file, template, mode, report);
        }
        ProjectItem::Folder(items) => queue.extend(items),
        ProjectItem::SubProject(sub_project) => sub_projects.push(sub_project),
      }
    }

    for sub_project in sub_projects {
      if self.process_project(sub_project, template, mode, report).is_break() {
        return ControlFlow::Break(());
      }
    }

    ControlFlow::Continue(())
  }

  fn process_file(&mut self, file: &SourceFile, template: &Template, mode: SyncMode, report: &mut ProcessReport) {
    if file.language.as_ref() != Some(&self.target) {
      #[cfg(feature = "tracing")]
      trace!(path = ?file.path, "Skipping file of another language");
      return;
    }

    self.notify(&file.path.display().to_string());

    let is_open = file.is_open || self.buffers.as_deref().is_some_and(|buffers| buffers.is_open(&file.path));

    let result = if is_open {
      self.sync_live(&file.path, template, mode).ok_or(SkipReason::BufferUnavailable)
    } else {
      sync_disk(&file.path, template, mode).map_err(SkipReason::Document)
    };

    match result {
      Ok(outcome) => {
        #[cfg(feature = "tracing")]
        debug!(path = ?file.path, is_open, ?outcome, "Processed file");

        report.processed_items += 1;
        if is_open {
          report.processed_open_items += 1;
        }
        if outcome.is_changed() {
          report.changed_items += 1;
        }
      }
      Err(reason) => {
        #[cfg(feature = "tracing")]
        warn!(path = ?file.path, %reason, "Skipping file");

        report.skipped_items += 1;
        self.notify(&format!("Skipped {}: {}", file.path.display(), reason));
      }
    }
  }

  /// Edits an open document in place. `None` if its buffer is not available.
  fn sync_live(&mut self, path: &Path, template: &Template, mode: SyncMode) -> Option<Outcome> {
    let owner = self.owner;
    let buffer = self.buffers.as_deref_mut()?.buffer(path)?;

    let mut outcome = Outcome::Unchanged;
    {
      let mut edit = || {
        let mut document = LiveDocument::new(&mut *buffer);
        outcome = mode.apply(&mut document, template);
      };
      owner.run(&mut edit);
    }
    Some(outcome)
  }

  fn is_cancelled(&self) -> bool {
    self.cancel.as_ref().is_some_and(|cancel| cancel.load(Ordering::Relaxed))
  }

  fn notify(&mut self, message: &str) {
    if let Some(progress) = self.progress.as_deref_mut() {
      progress.report(message);
    }
  }
}

/// Reads, edits and conditionally writes back a closed file.
fn sync_disk(path: &Path, template: &Template, mode: SyncMode) -> Result<Outcome, DocumentError> {
  let mut document = DiskDocument::open(path)?;
  let outcome = mode.apply(&mut document, template);
  document.commit()?;
  Ok(outcome)
}

#[derive(Debug, thiserror::Error)]
enum SkipReason {
  #[error("open in an editor but its buffer is not available")]
  BufferUnavailable,
  #[error(transparent)]
  Document(DocumentError),
}

/// Errors that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
  #[error(transparent)]
  Template(#[from] TemplateError),
}

/// Failure to list the projects of a solution.
#[derive(Debug, thiserror::Error)]
pub enum EnumerateError {
  /// The solution root is missing or not a directory
  #[error("Solution root is not a directory: {0}")]
  NotADirectory(PathBuf),
  /// The host cannot provide the project list
  #[error("Project host unavailable: {0}")]
  Unavailable(String),
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::TextBuffer;
  use crate::template::TemplateSource;
  use std::cell::Cell;
  use std::collections::HashMap;
  use std::fs;
  use tempfile::TempDir;

  struct StaticSolution {
    name: Option<String>,
    projects: Vec<Project>,
  }

  impl ProjectEnumerator for StaticSolution {
    fn solution_name(&self) -> Option<String> {
      self.name.clone()
    }

    fn projects(&self) -> Result<Vec<Project>, EnumerateError> {
      Ok(self.projects.clone())
    }
  }

  struct BrokenHost;

  impl ProjectEnumerator for BrokenHost {
    fn solution_name(&self) -> Option<String> {
      Some("Broken".to_string())
    }

    fn projects(&self) -> Result<Vec<Project>, EnumerateError> {
      Err(EnumerateError::Unavailable("no project service".to_string()))
    }
  }

  #[derive(Default)]
  struct Buffers(HashMap<PathBuf, TextBuffer>);

  impl LiveBufferAccessor for Buffers {
    fn is_open(&self, path: &Path) -> bool {
      self.0.contains_key(path)
    }

    fn buffer(&mut self, path: &Path) -> Option<&mut dyn EditBuffer> {
      self.0.get_mut(path).map(|buffer| buffer as &mut dyn EditBuffer)
    }
  }

  #[derive(Default)]
  struct Messages(Vec<String>);

  impl ProgressSink for Messages {
    fn report(&mut self, message: &str) {
      self.0.push(message.to_string());
    }
  }

  #[derive(Default)]
  struct CountingOwner(Cell<usize>);

  impl OwnerThread for CountingOwner {
    fn run(&self, task: &mut dyn FnMut()) {
      self.0.set(self.0.get() + 1);
      task();
    }
  }

  fn store(temp_dir: &TempDir) -> TemplateStore {
    let path = temp_dir.path().join("header.txt");
    fs::write(&path, "// (c) 2020\n// All rights reserved").unwrap();
    TemplateStore::new(TemplateSource::File(path))
  }

  fn solution(projects: Vec<Project>) -> StaticSolution {
    StaticSolution {
      name: Some("Demo".to_string()),
      projects,
    }
  }

  #[test]
  fn test_processes_disk_and_open_files() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let closed = temp_dir.path().join("closed.rs");
    let open = temp_dir.path().join("open.rs");
    let other = temp_dir.path().join("notes.txt");
    fs::write(&closed, "fn closed() {}\n").unwrap();
    fs::write(&other, "notes\n").unwrap();

    let mut buffers = Buffers::default();
    buffers.0.insert(open.clone(), TextBuffer::new("fn open() {}").read_only());
    let owner = CountingOwner::default();

    let enumerator = solution(vec![Project {
      name: "app".to_string(),
      items: vec![
        ProjectItem::File(SourceFile::new(&closed)),
        ProjectItem::File(SourceFile::new(&open).opened()),
        ProjectItem::File(SourceFile::new(&other)),
      ],
    }]);

    let report = Processor::new(&templates, Language::new("rs"))
      .with_live_buffers(&mut buffers)
      .with_owner_thread(&owner)
      .process(&enumerator, SyncMode::Insert)
      .unwrap();

    assert_eq!(report.solution_name, "Demo");
    assert_eq!(report.processed_items, 2);
    assert_eq!(report.processed_open_items, 1);
    assert_eq!(report.changed_items, 2);
    assert_eq!(report.skipped_items, 0);
    assert_eq!(owner.0.get(), 1);

    assert_eq!(
      fs::read_to_string(&closed).unwrap(),
      "// (c) 2020\n// All rights reserved\nfn closed() {}\n"
    );
    assert_eq!(fs::read_to_string(&other).unwrap(), "notes\n");
    assert!(!open.exists());
    assert_eq!(
      buffers.0[&open].text(),
      "// (c) 2020\n// All rights reserved\nfn open() {}"
    );
  }

  #[test]
  fn test_open_file_without_buffer_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let path = temp_dir.path().join("main.rs");
    fs::write(&path, "fn main() {}").unwrap();

    let enumerator = solution(vec![Project {
      name: "app".to_string(),
      items: vec![ProjectItem::File(SourceFile::new(&path).opened())],
    }]);

    let report = Processor::new(&templates, Language::new("rs"))
      .process(&enumerator, SyncMode::Insert)
      .unwrap();

    assert_eq!(report.processed_items, 0);
    assert_eq!(report.skipped_items, 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), "fn main() {}");
  }

  #[test]
  fn test_unreadable_file_does_not_stop_run() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let missing = temp_dir.path().join("missing.rs");
    let present = temp_dir.path().join("present.rs");
    fs::write(&present, "// (c) 2020\n// All rights reserved\nfn x() {}").unwrap();

    let enumerator = solution(vec![Project {
      name: "app".to_string(),
      items: vec![
        ProjectItem::File(SourceFile::new(&missing)),
        ProjectItem::File(SourceFile::new(&present)),
      ],
    }]);

    let mut messages = Messages::default();
    let report = Processor::new(&templates, Language::new("rs"))
      .with_progress(&mut messages)
      .process(&enumerator, SyncMode::Remove)
      .unwrap();

    assert_eq!(report.processed_items, 1);
    assert_eq!(report.skipped_items, 1);
    assert_eq!(fs::read_to_string(&present).unwrap(), "fn x() {}");
    assert!(messages.0.iter().any(|message| message.starts_with("Skipped")));
    assert_eq!(
      messages.0.last().unwrap(),
      "The solution Demo processed. Processed items: 1, include opened items 0, skipped items 1"
    );
  }

  #[test]
  fn test_traversal_order() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let file = |name: &str| {
      let path = temp_dir.path().join(name);
      fs::write(&path, "").unwrap();
      ProjectItem::File(SourceFile::new(path))
    };

    let enumerator = solution(vec![Project {
      name: "app".to_string(),
      items: vec![
        ProjectItem::SubProject(Project {
          name: "lib".to_string(),
          items: vec![file("d.rs")],
        }),
        ProjectItem::Folder(vec![file("c.rs")]),
        file("a.rs"),
        file("b.rs"),
      ],
    }]);

    let mut messages = Messages::default();
    Processor::new(&templates, Language::new("rs"))
      .with_progress(&mut messages)
      .process(&enumerator, SyncMode::Insert)
      .unwrap();

    let names: Vec<&str> = messages
      .0
      .iter()
      .map(|message| {
        Path::new(message)
          .file_name()
          .and_then(|name| name.to_str())
          .unwrap_or(message.as_str())
      })
      .collect();
    assert_eq!(
      &names[..6],
      &[
        "Start to process app",
        "a.rs",
        "b.rs",
        "c.rs",
        "Start to process lib",
        "d.rs"
      ]
    );
  }

  #[test]
  fn test_cancellation_between_files() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let path = temp_dir.path().join("a.rs");
    fs::write(&path, "fn a() {}").unwrap();

    let cancel = Arc::new(AtomicBool::new(true));
    let enumerator = solution(vec![Project {
      name: "app".to_string(),
      items: vec![ProjectItem::File(SourceFile::new(&path))],
    }]);

    let report = Processor::new(&templates, Language::new("rs"))
      .with_cancellation(cancel)
      .process(&enumerator, SyncMode::Insert)
      .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.processed_items, 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), "fn a() {}");
  }

  #[test]
  fn test_no_solution_gives_empty_report() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);
    let enumerator = StaticSolution {
      name: None,
      projects: Vec::new(),
    };

    let report = Processor::new(&templates, Language::new("rs"))
      .process(&enumerator, SyncMode::Insert)
      .unwrap();

    assert_eq!(report.solution_name, UNKNOWN_SOLUTION);
    assert_eq!(report.processed_items, 0);
  }

  #[test]
  fn test_enumeration_failure_gives_empty_report() {
    let temp_dir = TempDir::new().unwrap();
    let templates = store(&temp_dir);

    let report = Processor::new(&templates, Language::new("rs"))
      .process(&BrokenHost, SyncMode::Remove)
      .unwrap();

    assert_eq!(report.solution_name, "Broken");
    assert_eq!(report.processed_items, 0);
    assert_eq!(report.skipped_items, 0);
  }

  #[test]
  fn test_missing_template_aborts() {
    let templates = TemplateStore::new(TemplateSource::File(PathBuf::from("nonexistent.header.txt")));
    let enumerator = solution(Vec::new());

    let result = Processor::new(&templates, Language::new("rs")).process(&enumerator, SyncMode::Insert);

    assert!(matches!(
      result,
      Err(ProcessError::Template(TemplateError::ResourceMissing(_)))
    ));
  }

  #[test]
  fn test_language_from_path() {
    assert_eq!(Language::from_path(Path::new("src/Main.RS")), Some(Language::new("rs")));
    assert_eq!(Language::new(".cs").as_str(), "cs");
    assert_eq!(Language::from_path(Path::new("Makefile")), None);
  }
}
