use scribe_html::HtmlPolicy;
use serde::{Deserialize, Serialize};

use crate::{config::parse_list, error::ConfigError};

/// Adjustments to the standard HTML allow-list.
///
/// The baseline forbidden tags (`script`, `style`, `form`, ...) and every
/// `on*` attribute stay forbidden regardless of what is configured here;
/// trying to allow one is a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
  /// Additional tags to keep, e.g. `sup` or `sub`.
  pub extra_tags: Vec<String>,

  /// Additional attributes to keep, e.g. `colspan`.
  pub extra_attributes: Vec<String>,

  /// Standard tags to unwrap instead of keeping.
  pub disallow_tags: Vec<String>,

  /// Additional tags that may never be allowed.
  pub forbid_tags: Vec<String>,

  /// Additional attributes that may never be allowed.
  pub forbid_attributes: Vec<String>,

  /// Replacement for the allowed URI scheme pattern. Must start with `^`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uri_pattern: Option<String>,
}

impl PolicyConfig {
  /// Build the HTML policy described by this configuration.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Policy`] if the resulting policy is invalid.
  pub fn build(&self, default_image_alt: &str) -> Result<HtmlPolicy, ConfigError> {
    let mut builder = HtmlPolicy::builder()
      .allow_tags(self.extra_tags.iter().map(|tag| tag.to_lowercase()))
      .allow_attributes(
        self
          .extra_attributes
          .iter()
          .map(|attribute| attribute.to_lowercase()),
      )
      .disallow_tags(&self.disallow_tags)
      .forbid_tags(self.forbid_tags.iter().map(|tag| tag.to_lowercase()))
      .forbid_attributes(
        self
          .forbid_attributes
          .iter()
          .map(|attribute| attribute.to_lowercase()),
      )
      .default_image_alt(default_image_alt);

    if let Some(pattern) = &self.uri_pattern {
      builder = builder.uri_scheme_pattern(pattern.clone());
    }

    Ok(builder.build()?)
  }

  pub(crate) fn merge(&mut self, other: Self) {
    self.extra_tags.extend(other.extra_tags);
    self.extra_attributes.extend(other.extra_attributes);
    self.disallow_tags.extend(other.disallow_tags);
    self.forbid_tags.extend(other.forbid_tags);
    self.forbid_attributes.extend(other.forbid_attributes);
    if other.uri_pattern.is_some() {
      self.uri_pattern = other.uri_pattern;
    }
  }

  pub(crate) fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    match key {
      "extra_tags" => self.extra_tags.extend(parse_list(value)),
      "extra_attributes" => self.extra_attributes.extend(parse_list(value)),
      "disallow_tags" => self.disallow_tags.extend(parse_list(value)),
      "forbid_tags" => self.forbid_tags.extend(parse_list(value)),
      "forbid_attributes" => self.forbid_attributes.extend(parse_list(value)),
      "uri_pattern" => {
        self.uri_pattern = (!value.is_empty()).then(|| value.to_string());
      },
      _ => {
        return Err(ConfigError::Config(format!(
          "Unknown configuration key: 'policy.{key}'. See documentation for \
           supported keys.",
        )));
      },
    }
    Ok(())
  }
}
