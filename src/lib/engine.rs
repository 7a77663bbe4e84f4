//! Header insertion and removal.
//!
//! Both operations walk the template one line at a time against the start of
//! a [`Document`] and touch only the lines that need it:
//!
//! - [`ensure_present`] inserts every template line that is not already at
//!   its position. Existing lines are only pushed down, never rewritten, so
//!   a header missing one line gets exactly that line back.
//! - [`ensure_absent`] removes the template only as an exact, contiguous
//!   prefix and stops at the first line that differs.
//!
//! Running either operation twice in a row leaves the document unchanged on
//! the second run.

use std::fmt;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::document::Document;
use crate::template::Template;

/// Which operation a run applies to every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
  Insert,
  Remove,
}

impl SyncMode {
  pub fn apply<D: Document + ?Sized>(self, document: &mut D, template: &Template) -> Outcome {
    match self {
      Self::Insert => ensure_present(document, template),
      Self::Remove => ensure_absent(document, template),
    }
  }
}

impl fmt::Display for SyncMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Insert => f.write_str("Add header"),
      Self::Remove => f.write_str("Remove header"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Changed,
  Unchanged,
}

impl Outcome {
  pub fn is_changed(self) -> bool {
    self == Self::Changed
  }
}

/// Makes the first `template.len()` lines of `document` equal the template.
///
/// Mismatched lines are never overwritten; the template line is inserted in
/// front of them. Lines missing past the end are appended.
pub fn ensure_present<D: Document + ?Sized>(document: &mut D, template: &Template) -> Outcome {
  let mut outcome = Outcome::Unchanged;

  for (index, expected) in template.lines().iter().enumerate() {
    // Past the end there is nothing to match, not even a blank line.
    let matches = document.line(index).is_some_and(|line| line == expected.as_str());
    if !matches {
      #[cfg(feature = "tracing")]
      trace!(index, "Inserting template line");

      document.insert_line(index, expected);
      outcome = Outcome::Changed;
    }
  }

  outcome
}

/// Removes the template from the start of `document` while it matches.
///
/// Stops without resynchronizing at the first line that differs, so a
/// partially matching header is only removed up to that line.
pub fn ensure_absent<D: Document + ?Sized>(document: &mut D, template: &Template) -> Outcome {
  let mut outcome = Outcome::Unchanged;

  for expected in template.lines() {
    // Each removal shifts the rest up, so the next candidate is always line 0.
    let matches = match document.line(0) {
      Some(line) => line == expected.as_str(),
      None => break,
    };
    if !matches {
      break;
    }

    #[cfg(feature = "tracing")]
    trace!("Removing template line");

    document.remove_line(0);
    outcome = Outcome::Changed;
  }

  outcome
}
