//! Enrichment settings: headings, images, tables and code blocks.
use scribe_html::{
  enrich::{DEFAULT_CODE_LANGUAGE, DEFAULT_TABLE_WRAPPER_CLASS},
  policy::DEFAULT_IMAGE_ALT,
};
use serde::{Deserialize, Serialize};

use crate::{config::parse_bool, error::ConfigError};

// Settings a file leaves out deserialize to `None` (field-level
// `#[serde(default)]`) so that merging never resets an earlier file's value.
// `Default` fills them in, which is what the generated config shows.

/// Heading and table-of-contents settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
  /// Prepended verbatim to generated heading ids, e.g. `post-`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub heading_id_prefix: Option<String>,

  /// Whether `h1` headings are part of the extracted table of contents.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub include_h1_in_toc: Option<bool>,
}

impl Default for ContentConfig {
  fn default() -> Self {
    Self {
      heading_id_prefix: None,
      include_h1_in_toc: Some(false),
    }
  }
}

impl ContentConfig {
  #[must_use]
  pub fn include_h1_in_toc(&self) -> bool {
    self.include_h1_in_toc.unwrap_or(false)
  }

  pub(crate) fn merge(&mut self, other: Self) {
    if other.heading_id_prefix.is_some() {
      self.heading_id_prefix = other.heading_id_prefix;
    }
    if other.include_h1_in_toc.is_some() {
      self.include_h1_in_toc = other.include_h1_in_toc;
    }
  }

  pub(crate) fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "heading_id_prefix" => {
        self.heading_id_prefix = (!value.is_empty()).then(|| value.to_string());
      },
      "include_h1_in_toc" => {
        self.include_h1_in_toc =
          Some(parse_bool("include_h1_in_toc", value)?);
      },
      _ => return Err(unknown_key("content", key)),
    }
    Ok(())
  }
}

/// Image settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
  /// Alt text for images that have none.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_alt: Option<String>,
}

impl Default for ImagesConfig {
  fn default() -> Self {
    Self {
      default_alt: Some(DEFAULT_IMAGE_ALT.to_string()),
    }
  }
}

impl ImagesConfig {
  #[must_use]
  pub fn default_alt(&self) -> &str {
    self.default_alt.as_deref().unwrap_or(DEFAULT_IMAGE_ALT)
  }

  pub(crate) fn merge(&mut self, other: Self) {
    if other.default_alt.is_some() {
      self.default_alt = other.default_alt;
    }
  }

  pub(crate) fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "default_alt" => self.default_alt = Some(value.to_string()),
      _ => return Err(unknown_key("images", key)),
    }
    Ok(())
  }
}

/// Table settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
  /// Class of the scrolling wrapper around tables. Empty disables wrapping.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub wrapper_class: Option<String>,
}

impl Default for TablesConfig {
  fn default() -> Self {
    Self {
      wrapper_class: Some(DEFAULT_TABLE_WRAPPER_CLASS.to_string()),
    }
  }
}

impl TablesConfig {
  #[must_use]
  pub fn wrapper_class(&self) -> &str {
    self
      .wrapper_class
      .as_deref()
      .unwrap_or(DEFAULT_TABLE_WRAPPER_CLASS)
  }

  pub(crate) fn merge(&mut self, other: Self) {
    if other.wrapper_class.is_some() {
      self.wrapper_class = other.wrapper_class;
    }
  }

  pub(crate) fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "wrapper_class" => self.wrapper_class = Some(value.to_string()),
      _ => return Err(unknown_key("tables", key)),
    }
    Ok(())
  }
}

/// Code block settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
  /// Language assumed for `pre > code` blocks without a `language-*` class.
  /// An empty string disables the default.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_language: Option<String>,
}

impl Default for CodeConfig {
  fn default() -> Self {
    Self {
      default_language: Some(DEFAULT_CODE_LANGUAGE.to_string()),
    }
  }
}

impl CodeConfig {
  /// The configured language, `None` when disabled.
  #[must_use]
  pub fn language(&self) -> Option<&str> {
    Some(
      self
        .default_language
        .as_deref()
        .unwrap_or(DEFAULT_CODE_LANGUAGE)
        .trim(),
    )
    .filter(|language| !language.is_empty())
  }

  pub(crate) fn merge(&mut self, other: Self) {
    if other.default_language.is_some() {
      self.default_language = other.default_language;
    }
  }

  pub(crate) fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "default_language" => self.default_language = Some(value.to_string()),
      _ => return Err(unknown_key("code", key)),
    }
    Ok(())
  }
}

fn unknown_key(section: &str, key: &str) -> ConfigError {
  ConfigError::Config(format!(
    "Unknown configuration key: '{section}.{key}'. See documentation for \
     supported keys.",
  ))
}
