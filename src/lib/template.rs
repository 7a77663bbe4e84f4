//! Header template loading.
//!
//! The template is a fixed, ordered list of lines. It is read once per
//! [`TemplateStore`] and handed out by reference for the rest of the run.

use std::path::PathBuf;
use std::sync::OnceLock;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Template compiled into the binary, used when no template file is configured.
const EMBEDDED_TEMPLATE: &str = include_str!("../../resources/template.txt");

/// Line break the template resource is written with.
#[cfg(windows)]
pub const NATIVE_LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const NATIVE_LINE_ENDING: &str = "\n";

/// An immutable, ordered sequence of header lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  lines: Vec<String>,
}

impl Template {
  /// Splits `text` on the native line break. A single trailing line break is
  /// not treated as an extra empty line.
  pub fn parse(text: &str) -> Result<Self, TemplateError> {
    let text = text.strip_suffix(NATIVE_LINE_ENDING).unwrap_or(text);
    if text.is_empty() {
      return Err(TemplateError::Empty);
    }

    Ok(Self {
      lines: text.split(NATIVE_LINE_ENDING).map(str::to_owned).collect(),
    })
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }
}

impl<S: Into<String>> FromIterator<S> for Template {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      lines: iter.into_iter().map(Into::into).collect(),
    }
  }
}

/// Where the template text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateSource {
  #[default]
  Embedded,
  File(PathBuf),
}

/// Loads the template lazily on first access and memoizes it.
#[derive(Debug, Default)]
pub struct TemplateStore {
  source: TemplateSource,
  template: OnceLock<Template>,
}

impl TemplateStore {
  pub fn new(source: TemplateSource) -> Self {
    Self {
      source,
      template: OnceLock::new(),
    }
  }

  /// Returns the template, loading it on the first call.
  ///
  /// Every later call returns the same instance without touching the source
  /// again. A failed load is not cached, so the next call retries.
  pub fn get(&self) -> Result<&Template, TemplateError> {
    if let Some(template) = self.template.get() {
      return Ok(template);
    }

    let loaded = self.load()?;
    Ok(self.template.get_or_init(|| loaded))
  }

  fn load(&self) -> Result<Template, TemplateError> {
    match &self.source {
      TemplateSource::Embedded => {
        #[cfg(feature = "tracing")]
        debug!("Loading embedded template");

        Template::parse(EMBEDDED_TEMPLATE)
      }
      TemplateSource::File(path) => {
        #[cfg(feature = "tracing")]
        debug!(?path, "Loading template file");

        if !path.is_file() {
          return Err(TemplateError::ResourceMissing(path.clone()));
        }
        let text = std::fs::read_to_string(path).map_err(TemplateError::Read)?;
        Template::parse(&text)
      }
    }
  }
}

/// Errors raised while loading the template. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
  /// The configured template file does not exist
  #[error("Template resource not found: {0}")]
  ResourceMissing(PathBuf),
  /// The template file exists but could not be read
  #[error("Template read error: {0}")]
  Read(std::io::Error),
  /// The template has no lines
  #[error("Template is empty")]
  Empty,
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_parse_keeps_order_and_whitespace() {
    let text = ["// first ", "", "  // third"].join(NATIVE_LINE_ENDING);
    let template = Template::parse(&text).unwrap();

    assert_eq!(template.lines(), &["// first ", "", "  // third"]);
  }

  #[test]
  fn test_parse_ignores_single_trailing_line_break() {
    let text = format!("// a{0}// b{0}", NATIVE_LINE_ENDING);
    let template = Template::parse(&text).unwrap();

    assert_eq!(template.len(), 2);
    assert_eq!(template.lines()[1], "// b");
  }

  #[test]
  fn test_parse_empty() {
    assert!(matches!(Template::parse(""), Err(TemplateError::Empty)));
  }

  #[test]
  fn test_embedded_template_loads() {
    let store = TemplateStore::default();
    let template = store.get().unwrap();

    assert!(!template.is_empty());
    assert!(template.lines()[0].starts_with("//"));
  }

  #[test]
  fn test_file_template_is_memoized() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("header.txt");
    std::fs::write(&path, "// (c) 2020").unwrap();

    let store = TemplateStore::new(TemplateSource::File(path.clone()));
    let first = store.get().unwrap().clone();

    // Later edits to the file are not picked up once loaded.
    std::fs::write(&path, "// changed").unwrap();
    let second = store.get().unwrap();

    assert_eq!(&first, second);
    assert_eq!(second.lines(), &["// (c) 2020"]);
  }

  #[test]
  fn test_missing_template_file() {
    let store = TemplateStore::new(TemplateSource::File(PathBuf::from("nonexistent.header.txt")));

    match store.get().unwrap_err() {
      TemplateError::ResourceMissing(path) => {
        assert_eq!(path, PathBuf::from("nonexistent.header.txt"));
      }
      other => panic!("Expected ResourceMissing, got {other:?}"),
    }
  }
}
