//! Types for the scribe-html public API.
use serde::{Deserialize, Serialize};

/// A heading extracted for a table of contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadingRecord {
  /// Anchor id, unique within the rendered fragment.
  pub id:    String,
  /// Heading text, whitespace collapsed.
  pub text:  String,
  /// Heading level (1-6).
  pub level: u8,
}

/// Result of rendering a fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rendered {
  /// Sanitized and enriched HTML.
  pub html: String,

  /// Extracted headings, in document order.
  pub headings: Vec<HeadingRecord>,
}
