//! Line-addressable documents the sync engine edits.
//!
//! Two forms exist. [`DiskDocument`] reads a whole file up front and writes
//! it back once, only when something changed. [`LiveDocument`] drives an
//! [`EditBuffer`] owned by an editor, moving its cursor line by line and
//! editing in place, since the buffer owns the authoritative offsets.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::encoding::{EncodingError, LineEnding, TextEncoding};

/// A sequence of lines that can be read, and edited one line at a time.
pub trait Document {
  /// Line at `index`, or `None` past the end of the document.
  fn line(&mut self, index: usize) -> Option<Cow<'_, str>>;
  /// Inserts `text` as a new line before `index`. Past the end it appends.
  fn insert_line(&mut self, index: usize, text: &str);
  /// Removes the line at `index`. Does nothing past the end.
  fn remove_line(&mut self, index: usize);
}

impl Document for Vec<String> {
  fn line(&mut self, index: usize) -> Option<Cow<'_, str>> {
    self.get(index).map(|line| Cow::Borrowed(line.as_str()))
  }

  fn insert_line(&mut self, index: usize, text: &str) {
    let index = index.min(self.len());
    self.insert(index, text.to_owned());
  }

  fn remove_line(&mut self, index: usize) {
    if index < self.len() {
      self.remove(index);
    }
  }
}

/// Lines of a text, each paired with the terminator it was read with.
///
/// Text is split at every `\n`, taking a `\r` right before it as part of the
/// terminator. The last line has none, so text ending in a line break ends
/// with an empty line and joining restores the input byte for byte. Lines
/// added later use the most common terminator of the original text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLines {
  lines: Vec<String>,
  endings: Vec<Option<LineEnding>>,
  line_ending: LineEnding,
}

impl TextLines {
  pub fn parse(text: &str) -> Self {
    let mut lines = Vec::new();
    let mut endings = Vec::new();

    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
      let line = &rest[..pos];
      match line.strip_suffix('\r') {
        Some(line) => {
          lines.push(line.to_owned());
          endings.push(Some(LineEnding::CrLf));
        }
        None => {
          lines.push(line.to_owned());
          endings.push(Some(LineEnding::Lf));
        }
      }
      rest = &rest[pos + 1..];
    }
    lines.push(rest.to_owned());
    endings.push(None);

    Self {
      lines,
      endings,
      line_ending: LineEnding::detect(text),
    }
  }

  pub fn as_slice(&self) -> &[String] {
    &self.lines
  }

  /// Terminator given to inserted lines.
  pub fn line_ending(&self) -> LineEnding {
    self.line_ending
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.lines.get(index).map(String::as_str)
  }

  /// Inserts before `index`, or appends past the end.
  pub fn insert(&mut self, index: usize, text: &str) {
    if index < self.lines.len() {
      self.lines.insert(index, text.to_owned());
      self.endings.insert(index, Some(self.line_ending));
      return;
    }

    // The current last line needs a terminator before something follows it.
    if let Some(last) = self.endings.last_mut()
      && last.is_none()
    {
      *last = Some(self.line_ending);
    }
    self.lines.push(text.to_owned());
    self.endings.push(None);
  }

  /// Removes the line at `index`. Returns false past the end.
  pub fn remove(&mut self, index: usize) -> bool {
    if index >= self.lines.len() {
      return false;
    }

    self.lines.remove(index);
    if self.endings.remove(index).is_none()
      && let Some(last) = self.endings.last_mut()
    {
      *last = None;
    }
    true
  }

  pub fn text(&self) -> String {
    let mut text = String::new();
    for (line, ending) in self.lines.iter().zip(&self.endings) {
      text.push_str(line);
      if let Some(ending) = ending {
        text.push_str(ending.as_str());
      }
    }
    text
  }
}

/// A file read fully into memory together with the encoding and line
/// ending it was detected to have.
#[derive(Debug, Clone)]
pub struct DiskDocument {
  path: PathBuf,
  encoding: TextEncoding,
  lines: TextLines,
  changed: bool,
}

impl DiskDocument {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
    let path = path.into();
    let bytes = fs::read(&path).map_err(|source| DocumentError::read(&path, source))?;

    let encoding = TextEncoding::detect(&bytes);
    let text = encoding.decode(&bytes).map_err(|err| DocumentError::Unreadable {
      path: path.clone(),
      source: io::Error::new(io::ErrorKind::InvalidData, err),
    })?;
    let lines = TextLines::parse(&text);

    #[cfg(feature = "tracing")]
    debug!(?path, %encoding, line_ending = ?lines.line_ending(), "Opened document");

    Ok(Self {
      path,
      encoding,
      lines,
      changed: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn encoding(&self) -> TextEncoding {
    self.encoding
  }

  pub fn line_ending(&self) -> LineEnding {
    self.lines.line_ending()
  }

  pub fn lines(&self) -> &[String] {
    self.lines.as_slice()
  }

  pub fn is_changed(&self) -> bool {
    self.changed
  }

  pub fn text(&self) -> String {
    self.lines.text()
  }

  /// Writes the document back in its original encoding if it was edited.
  ///
  /// Returns whether a write happened. The file is replaced atomically, so it
  /// is either fully rewritten or left as it was.
  pub fn commit(self) -> Result<bool, DocumentError> {
    if !self.changed {
      return Ok(false);
    }

    let bytes = self
      .encoding
      .encode(&self.text())
      .map_err(|source| DocumentError::Unrepresentable {
        path: self.path.clone(),
        source,
      })?;

    write_atomic(&self.path, &bytes).map_err(|source| DocumentError::write(&self.path, source))?;

    #[cfg(feature = "tracing")]
    debug!(path = ?self.path, "Wrote document");

    Ok(true)
  }
}

impl Document for DiskDocument {
  fn line(&mut self, index: usize) -> Option<Cow<'_, str>> {
    self.lines.get(index).map(Cow::Borrowed)
  }

  fn insert_line(&mut self, index: usize, text: &str) {
    self.lines.insert(index, text);
    self.changed = true;
  }

  fn remove_line(&mut self, index: usize) {
    if self.lines.remove(index) {
      self.changed = true;
    }
  }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
  let tmp_path = unique_tmp_path(path);
  if let Err(err) = write_tmp(&tmp_path, bytes) {
    let _ = fs::remove_file(&tmp_path);
    return Err(err);
  }

  if let Ok(metadata) = fs::metadata(path) {
    let _ = fs::set_permissions(&tmp_path, metadata.permissions());
  }

  if let Err(err) = fs::rename(&tmp_path, path) {
    let _ = fs::remove_file(&tmp_path);
    return Err(err);
  }

  Ok(())
}

fn write_tmp(tmp_path: &Path, bytes: &[u8]) -> io::Result<()> {
  let mut file = File::create(tmp_path)?;
  file.write_all(bytes)?;
  file.sync_all()
}

fn unique_tmp_path(path: &Path) -> PathBuf {
  let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
  let mut counter = 0u32;
  loop {
    let candidate = path.with_file_name(format!(".{file_name}.hsync{counter}"));
    if !candidate.exists() {
      return candidate;
    }
    counter += 1;
  }
}

/// Cursor-based access to a text buffer owned by an editor.
///
/// The cursor always sits at the start of a line. `current_line_index` equal
/// to the line count means the cursor is at the end of the document.
pub trait EditBuffer {
  fn is_read_only(&self) -> bool;
  fn set_read_only(&mut self, read_only: bool);

  fn start_of_document(&mut self);
  fn at_end_of_document(&self) -> bool;
  fn current_line_index(&self) -> usize;
  /// Text of the line under the cursor, without its terminator.
  fn current_line(&self) -> Option<String>;
  fn line_down(&mut self);

  /// Inserts a new line before the cursor. The cursor ends up just after the
  /// inserted line, on the line it was on before.
  fn insert_line(&mut self, text: &str);
  /// Deletes the line under the cursor; the following line moves up to it.
  fn delete_line(&mut self);
}

/// Adapts an [`EditBuffer`] to [`Document`] by walking its cursor.
pub struct LiveDocument<'b> {
  buffer: &'b mut dyn EditBuffer,
  changed: bool,
}

impl<'b> LiveDocument<'b> {
  /// Unlocks the buffer for editing and rewinds its cursor.
  pub fn new(buffer: &'b mut dyn EditBuffer) -> Self {
    buffer.set_read_only(false);
    buffer.start_of_document();
    Self {
      buffer,
      changed: false,
    }
  }

  pub fn is_changed(&self) -> bool {
    self.changed
  }

  /// Moves the cursor to `index`. Returns false if the document ends first.
  fn seek(&mut self, index: usize) -> bool {
    if self.buffer.current_line_index() > index {
      self.buffer.start_of_document();
    }
    while self.buffer.current_line_index() < index {
      if self.buffer.at_end_of_document() {
        return false;
      }
      self.buffer.line_down();
    }
    true
  }
}

impl Document for LiveDocument<'_> {
  fn line(&mut self, index: usize) -> Option<Cow<'_, str>> {
    if !self.seek(index) {
      return None;
    }
    self.buffer.current_line().map(Cow::Owned)
  }

  fn insert_line(&mut self, index: usize, text: &str) {
    self.seek(index);

    #[cfg(feature = "tracing")]
    trace!(index, "Inserting line into live buffer");

    self.buffer.insert_line(text);
    self.changed = true;
  }

  fn remove_line(&mut self, index: usize) {
    if self.seek(index) && !self.buffer.at_end_of_document() {
      self.buffer.delete_line();
      self.changed = true;
    }
  }
}

/// In-memory [`EditBuffer`], standing in for an open editor tab.
///
/// Edits are ignored while the buffer is read-only, the way an editor
/// refuses typing into a locked document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
  lines: TextLines,
  cursor: usize,
  read_only: bool,
  dirty: bool,
}

impl TextBuffer {
  pub fn new(text: &str) -> Self {
    Self {
      lines: TextLines::parse(text),
      ..Self::default()
    }
  }

  pub fn read_only(mut self) -> Self {
    self.read_only = true;
    self
  }

  pub fn lines(&self) -> &[String] {
    self.lines.as_slice()
  }

  pub fn text(&self) -> String {
    self.lines.text()
  }

  /// Whether the buffer holds edits not yet saved by the editor.
  pub fn is_dirty(&self) -> bool {
    self.dirty
  }
}

impl EditBuffer for TextBuffer {
  fn is_read_only(&self) -> bool {
    self.read_only
  }

  fn set_read_only(&mut self, read_only: bool) {
    self.read_only = read_only;
  }

  fn start_of_document(&mut self) {
    self.cursor = 0;
  }

  fn at_end_of_document(&self) -> bool {
    self.cursor >= self.lines.len()
  }

  fn current_line_index(&self) -> usize {
    self.cursor
  }

  fn current_line(&self) -> Option<String> {
    self.lines.get(self.cursor).map(str::to_owned)
  }

  fn line_down(&mut self) {
    if !self.at_end_of_document() {
      self.cursor += 1;
    }
  }

  fn insert_line(&mut self, text: &str) {
    if self.read_only {
      return;
    }
    self.lines.insert(self.cursor, text);
    self.cursor += 1;
    self.dirty = true;
  }

  fn delete_line(&mut self) {
    if self.read_only || self.at_end_of_document() {
      return;
    }
    if self.lines.remove(self.cursor) {
      self.dirty = true;
    }
  }
}

/// Per-file failures. None of them stop a run; the file is skipped.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
  /// The file could not be read or decoded
  #[error("Cannot read {path}: {source}")]
  Unreadable { path: PathBuf, source: io::Error },
  /// The file is locked or access was denied
  #[error("File is locked: {path}: {source}")]
  Locked { path: PathBuf, source: io::Error },
  /// Edited content cannot be written in the file's own encoding
  #[error("Cannot encode {path}: {source}")]
  Unrepresentable { path: PathBuf, source: EncodingError },
  /// Writing the updated file failed
  #[error("Cannot write {path}: {source}")]
  Write { path: PathBuf, source: io::Error },
}

impl DocumentError {
  fn read(path: &Path, source: io::Error) -> Self {
    if source.kind() == io::ErrorKind::PermissionDenied {
      Self::Locked {
        path: path.to_path_buf(),
        source,
      }
    } else {
      Self::Unreadable {
        path: path.to_path_buf(),
        source,
      }
    }
  }

  fn write(path: &Path, source: io::Error) -> Self {
    if source.kind() == io::ErrorKind::PermissionDenied {
      Self::Locked {
        path: path.to_path_buf(),
        source,
      }
    } else {
      Self::Write {
        path: path.to_path_buf(),
        source,
      }
    }
  }

  pub fn path(&self) -> &Path {
    match self {
      Self::Unreadable { path, .. }
      | Self::Locked { path, .. }
      | Self::Unrepresentable { path, .. }
      | Self::Write { path, .. } => path,
    }
  }
}
