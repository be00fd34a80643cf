//! The allow-list policy consumed by the sanitizer.
//!
//! A policy is plain data: which tags and attributes survive, which are
//! forbidden no matter what, which attributes carry URIs and which URI schemes
//! those may use. It is built once at start-up, validated, and then shared
//! read-only (usually behind an `Arc`) by every rendering call.
//!
//! # Examples
//!
//! ```
//! use scribe_html::policy::HtmlPolicy;
//!
//! let policy = HtmlPolicy::builder()
//!   .allow_tags(["sup", "sub"])
//!   .build()
//!   .expect("extra inline tags are valid");
//!
//! assert!(policy.is_tag_allowed("sup"));
//! assert!(!policy.is_tag_allowed("script"));
//! ```
use std::sync::LazyLock;

use indexmap::IndexSet;
use log::error;
use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::utils::{never_matching_regex, normalize_url};

/// Tags kept by the standard policy.
pub const ALLOWED_TAGS: &[&str] = &[
  "h1",
  "h2",
  "h3",
  "h4",
  "h5",
  "h6",
  "p",
  "br",
  "hr",
  "ul",
  "ol",
  "li",
  "blockquote",
  "pre",
  "code",
  "em",
  "strong",
  "del",
  "a",
  "img",
  "table",
  "thead",
  "tbody",
  "tr",
  "th",
  "td",
  "caption",
  "div",
  "span",
  "figure",
  "figcaption",
  "iframe",
];

/// Attributes kept by the standard policy.
pub const ALLOWED_ATTRIBUTES: &[&str] = &[
  "href",
  "src",
  "alt",
  "title",
  "class",
  "id",
  "width",
  "height",
  "target",
  "rel",
  "loading",
  "frameborder",
  "allowfullscreen",
  "sandbox",
  "allow",
  "data-internal",
  "aria-label",
];

/// Tags that can never be allowed.
pub const FORBIDDEN_TAGS: &[&str] =
  &["script", "style", "form", "input", "textarea", "button"];

/// Attributes that can never be allowed, on top of every `on*` handler.
pub const FORBIDDEN_ATTRIBUTES: &[&str] =
  &["style", "onerror", "onload", "onclick", "onmouseover"];

/// Attributes whose value is a URI and must match the scheme pattern.
pub const URI_ATTRIBUTES: &[&str] = &["href", "src"];

/// Disallowed elements that are removed together with their content. Every
/// other disallowed element is unwrapped.
pub const DROP_CONTENT_TAGS: &[&str] = &[
  "script",
  "style",
  "textarea",
  "template",
  "noscript",
  "noembed",
  "noframes",
  "title",
  "xmp",
  "plaintext",
  "head",
  "object",
  "embed",
  "applet",
  "audio",
  "video",
  "svg",
  "math",
];

/// URI schemes accepted in `href`/`src`.
pub const ALLOWED_URI_PATTERN: &str =
  r"^(?:(?:https?|mailto|ftp|tel):|[#/]|data:image/)";

/// Alt text given to images that have none.
pub const DEFAULT_IMAGE_ALT: &str = "Blog post image";

static STANDARD_POLICY: LazyLock<HtmlPolicy> =
  LazyLock::new(HtmlPolicy::from_defaults);

/// Errors raised while constructing a policy.
///
/// These are configuration mistakes and should stop the process at start-up;
/// content never produces a `PolicyError`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
  #[error("Policy allows no tags")]
  EmptyAllowList,

  #[error("Invalid URI scheme pattern '{pattern}': {reason}")]
  InvalidUriPattern { pattern: String, reason: String },

  #[error("URI scheme pattern '{0}' must be anchored with '^'")]
  UnanchoredUriPattern(String),

  #[error("Tag <{0}> is forbidden and cannot be allowed")]
  ForbiddenTag(String),

  #[error("Attribute '{0}' is forbidden and cannot be allowed")]
  ForbiddenAttribute(String),

  #[error("Event handler attribute '{0}' cannot be allowed")]
  EventHandlerAttribute(String),

  #[error(
    "Invalid tag or attribute name '{0}': expected lowercase ASCII letters, \
     digits or '-'"
  )]
  InvalidName(String),

  #[error("Default image alt text must not be empty")]
  EmptyDefaultAlt,
}

/// Immutable HTML allow-list.
#[derive(Debug, Clone, Serialize)]
pub struct HtmlPolicy {
  allowed_tags:         IndexSet<String>,
  allowed_attributes:   IndexSet<String>,
  forbidden_tags:       IndexSet<String>,
  forbidden_attributes: IndexSet<String>,
  uri_attributes:       IndexSet<String>,
  drop_content_tags:    IndexSet<String>,
  #[serde(serialize_with = "serialize_regex")]
  allowed_uri_scheme:   Regex,
  default_image_alt:    String,
}

impl HtmlPolicy {
  /// The standard blog content policy, shared process-wide.
  #[must_use]
  pub fn standard() -> &'static Self {
    &STANDARD_POLICY
  }

  /// Start building a policy from the standard one.
  #[must_use]
  pub fn builder() -> HtmlPolicyBuilder {
    HtmlPolicyBuilder::new()
  }

  fn from_defaults() -> Self {
    let allowed_uri_scheme = compile_uri_pattern(ALLOWED_URI_PATTERN)
      .unwrap_or_else(|e| {
        error!("Failed to compile standard URI pattern: {e}");
        never_matching_regex()
      });

    Self {
      allowed_tags: to_set(ALLOWED_TAGS),
      allowed_attributes: to_set(ALLOWED_ATTRIBUTES),
      forbidden_tags: to_set(FORBIDDEN_TAGS),
      forbidden_attributes: to_set(FORBIDDEN_ATTRIBUTES),
      uri_attributes: to_set(URI_ATTRIBUTES),
      drop_content_tags: to_set(DROP_CONTENT_TAGS),
      allowed_uri_scheme,
      default_image_alt: DEFAULT_IMAGE_ALT.to_string(),
    }
  }

  /// Whether elements named `tag` survive sanitization.
  #[must_use]
  pub fn is_tag_allowed(&self, tag: &str) -> bool {
    self.allowed_tags.contains(tag) && !self.forbidden_tags.contains(tag)
  }

  /// Whether attributes named `name` survive sanitization.
  #[must_use]
  pub fn is_attribute_allowed(&self, name: &str) -> bool {
    !is_event_handler(name)
      && self.allowed_attributes.contains(name)
      && !self.forbidden_attributes.contains(name)
  }

  /// Whether a disallowed `tag` takes its content with it.
  #[must_use]
  pub fn drops_content(&self, tag: &str) -> bool {
    self.drop_content_tags.contains(tag)
  }

  /// Whether `name` holds a URI that must pass [`Self::is_uri_allowed`].
  #[must_use]
  pub fn is_uri_attribute(&self, name: &str) -> bool {
    self.uri_attributes.contains(name)
  }

  /// Check a URI against the allowed scheme pattern.
  ///
  /// The value is matched as the browser resolves it, see
  /// [`normalize_url`] (`java\tscript:` is `javascript:`).
  #[must_use]
  pub fn is_uri_allowed(&self, value: &str) -> bool {
    self.allowed_uri_scheme.is_match(&normalize_url(value))
  }

  /// Alt text for images that have none.
  #[must_use]
  pub fn default_image_alt(&self) -> &str {
    &self.default_image_alt
  }

  #[must_use]
  pub const fn allowed_tags(&self) -> &IndexSet<String> {
    &self.allowed_tags
  }

  #[must_use]
  pub const fn allowed_attributes(&self) -> &IndexSet<String> {
    &self.allowed_attributes
  }

  #[must_use]
  pub const fn forbidden_tags(&self) -> &IndexSet<String> {
    &self.forbidden_tags
  }

  #[must_use]
  pub const fn forbidden_attributes(&self) -> &IndexSet<String> {
    &self.forbidden_attributes
  }

  /// The URI scheme pattern as written.
  #[must_use]
  pub fn uri_scheme_pattern(&self) -> &str {
    self.allowed_uri_scheme.as_str()
  }
}

impl Default for HtmlPolicy {
  fn default() -> Self {
    Self::standard().clone()
  }
}

/// Builder for [`HtmlPolicy`].
///
/// Starts from the standard policy. The baseline forbidden tags and
/// attributes are always part of the result; the builder can only add to
/// them.
#[derive(Debug, Clone)]
pub struct HtmlPolicyBuilder {
  allowed_tags:         IndexSet<String>,
  allowed_attributes:   IndexSet<String>,
  forbidden_tags:       IndexSet<String>,
  forbidden_attributes: IndexSet<String>,
  uri_pattern:          String,
  default_image_alt:    String,
}

impl HtmlPolicyBuilder {
  /// Create a builder seeded with the standard policy data.
  #[must_use]
  pub fn new() -> Self {
    Self {
      allowed_tags:         to_set(ALLOWED_TAGS),
      allowed_attributes:   to_set(ALLOWED_ATTRIBUTES),
      forbidden_tags:       to_set(FORBIDDEN_TAGS),
      forbidden_attributes: to_set(FORBIDDEN_ATTRIBUTES),
      uri_pattern:          ALLOWED_URI_PATTERN.to_string(),
      default_image_alt:    DEFAULT_IMAGE_ALT.to_string(),
    }
  }

  /// Allow additional tags.
  #[must_use]
  pub fn allow_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.allowed_tags.extend(tags.into_iter().map(Into::into));
    self
  }

  /// Remove tags from the allow-list (they get unwrapped instead).
  #[must_use]
  pub fn disallow_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    for tag in tags {
      self.allowed_tags.shift_remove(tag.as_ref());
    }
    self
  }

  /// Allow additional attributes.
  #[must_use]
  pub fn allow_attributes<I, S>(mut self, attributes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .allowed_attributes
      .extend(attributes.into_iter().map(Into::into));
    self
  }

  /// Forbid additional tags.
  #[must_use]
  pub fn forbid_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.forbidden_tags.extend(tags.into_iter().map(Into::into));
    self
  }

  /// Forbid additional attributes.
  #[must_use]
  pub fn forbid_attributes<I, S>(mut self, attributes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .forbidden_attributes
      .extend(attributes.into_iter().map(Into::into));
    self
  }

  /// Replace the URI scheme pattern. It is matched case-insensitively and
  /// must be anchored at the start.
  #[must_use]
  pub fn uri_scheme_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
    self.uri_pattern = pattern.into();
    self
  }

  /// Set the alt text given to images without one.
  #[must_use]
  pub fn default_image_alt<S: Into<String>>(mut self, alt: S) -> Self {
    self.default_image_alt = alt.into();
    self
  }

  /// Validate and build the policy.
  ///
  /// # Errors
  ///
  /// Returns a [`PolicyError`] if a name is malformed, the allow-list is
  /// empty, a forbidden or `on*` item is allowed, the default alt text is
  /// empty, or the URI pattern is unanchored or does not compile.
  pub fn build(self) -> Result<HtmlPolicy, PolicyError> {
    for name in self
      .allowed_tags
      .iter()
      .chain(&self.allowed_attributes)
      .chain(&self.forbidden_tags)
      .chain(&self.forbidden_attributes)
    {
      if !is_valid_name(name) {
        return Err(PolicyError::InvalidName(name.clone()));
      }
    }

    if self.allowed_tags.is_empty() {
      return Err(PolicyError::EmptyAllowList);
    }

    if let Some(tag) = self
      .allowed_tags
      .iter()
      .find(|tag| self.forbidden_tags.contains(tag.as_str()))
    {
      return Err(PolicyError::ForbiddenTag(tag.clone()));
    }

    for attribute in &self.allowed_attributes {
      if is_event_handler(attribute) {
        return Err(PolicyError::EventHandlerAttribute(attribute.clone()));
      }
      if self.forbidden_attributes.contains(attribute.as_str()) {
        return Err(PolicyError::ForbiddenAttribute(attribute.clone()));
      }
    }

    if self.default_image_alt.trim().is_empty() {
      return Err(PolicyError::EmptyDefaultAlt);
    }

    if !self.uri_pattern.starts_with('^') {
      return Err(PolicyError::UnanchoredUriPattern(self.uri_pattern));
    }
    let allowed_uri_scheme =
      compile_uri_pattern(&self.uri_pattern).map_err(|e| {
        PolicyError::InvalidUriPattern {
          pattern: self.uri_pattern.clone(),
          reason:  e.to_string(),
        }
      })?;

    Ok(HtmlPolicy {
      allowed_tags: self.allowed_tags,
      allowed_attributes: self.allowed_attributes,
      forbidden_tags: self.forbidden_tags,
      forbidden_attributes: self.forbidden_attributes,
      uri_attributes: to_set(URI_ATTRIBUTES),
      drop_content_tags: to_set(DROP_CONTENT_TAGS),
      allowed_uri_scheme,
      default_image_alt: self.default_image_alt.trim().to_string(),
    })
  }
}

impl Default for HtmlPolicyBuilder {
  fn default() -> Self {
    Self::new()
  }
}

/// Whether an attribute name is an inline event handler (`onclick`, ...).
#[must_use]
pub fn is_event_handler(name: &str) -> bool {
  name.len() > 2
    && name
      .get(..2)
      .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && name
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn compile_uri_pattern(pattern: &str) -> Result<Regex, regex::Error> {
  RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn to_set(items: &[&str]) -> IndexSet<String> {
  items.iter().map(|item| (*item).to_string()).collect()
}

fn serialize_regex<S: Serializer>(
  regex: &Regex,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(regex.as_str())
}

#[cfg(test)]
mod tests {
  #![allow(clippy::expect_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn test_standard_policy_tags() {
    let policy = HtmlPolicy::standard();
    for tag in ["h1", "h6", "p", "a", "img", "table", "iframe", "figcaption"] {
      assert!(policy.is_tag_allowed(tag), "{tag} should be allowed");
    }
    for tag in FORBIDDEN_TAGS {
      assert!(!policy.is_tag_allowed(tag), "{tag} should be forbidden");
    }
    assert!(!policy.is_tag_allowed("section"));
    assert!(policy.drops_content("script"));
    assert!(!policy.drops_content("form"));
  }

  #[test]
  fn test_standard_policy_attributes() {
    let policy = HtmlPolicy::standard();
    for attribute in ["href", "src", "alt", "data-internal", "aria-label"] {
      assert!(policy.is_attribute_allowed(attribute));
    }
    assert!(!policy.is_attribute_allowed("style"));
    assert!(!policy.is_attribute_allowed("onclick"));
    assert!(!policy.is_attribute_allowed("onfocus"));
    assert!(!policy.is_attribute_allowed("srcdoc"));
    assert!(policy.is_uri_attribute("href"));
    assert!(!policy.is_uri_attribute("alt"));
  }

  #[test]
  fn test_uri_schemes() {
    let policy = HtmlPolicy::standard();
    for uri in [
      "https://example.com",
      "http://example.com",
      "HTTPS://EXAMPLE.COM",
      "mailto:me@example.com",
      "tel:+123",
      "ftp://files.example.com",
      "#section",
      "/about",
      "//cdn.example.com/x.png",
      "data:image/png;base64,AAAA",
      "  https://example.com",
      "ht\ttps://example.com",
    ] {
      assert!(policy.is_uri_allowed(uri), "{uri} should be allowed");
    }
    for uri in [
      "javascript:alert(1)",
      "JaVaScRiPt:alert(1)",
      "java\nscript:alert(1)",
      " javascript:alert(1)",
      "\u{1}java\rscript:alert(1)",
      "java\u{b}script:alert(1)",
      "vbscript:msgbox",
      "data:text/html,<script>alert(1)</script>",
      "page.html",
      "",
    ] {
      assert!(!policy.is_uri_allowed(uri), "{uri} should be rejected");
    }
  }

  #[test]
  fn test_builder_extends_policy() {
    let policy = HtmlPolicy::builder()
      .allow_tags(["sup"])
      .allow_attributes(["colspan"])
      .disallow_tags(["iframe"])
      .forbid_tags(["marquee"])
      .default_image_alt("  Illustration ")
      .build()
      .expect("valid policy");

    assert!(policy.is_tag_allowed("sup"));
    assert!(!policy.is_tag_allowed("iframe"));
    assert!(policy.is_attribute_allowed("colspan"));
    assert!(policy.forbidden_tags().contains("marquee"));
    assert!(policy.forbidden_tags().contains("script"));
    assert_eq!(policy.default_image_alt(), "Illustration");
  }

  #[test]
  fn test_builder_rejects_contract_violations() {
    assert_eq!(
      HtmlPolicy::builder().allow_tags(["script"]).build().err(),
      Some(PolicyError::ForbiddenTag("script".to_string()))
    );
    assert_eq!(
      HtmlPolicy::builder().allow_attributes(["style"]).build().err(),
      Some(PolicyError::ForbiddenAttribute("style".to_string()))
    );
    assert_eq!(
      HtmlPolicy::builder()
        .allow_attributes(["onfocus"])
        .build()
        .err(),
      Some(PolicyError::EventHandlerAttribute("onfocus".to_string()))
    );
    assert_eq!(
      HtmlPolicy::builder().allow_tags(["Bad Tag"]).build().err(),
      Some(PolicyError::InvalidName("Bad Tag".to_string()))
    );
    assert_eq!(
      HtmlPolicy::builder()
        .uri_scheme_pattern("https?:")
        .build()
        .err(),
      Some(PolicyError::UnanchoredUriPattern("https?:".to_string()))
    );
    assert!(matches!(
      HtmlPolicy::builder().uri_scheme_pattern("^(").build(),
      Err(PolicyError::InvalidUriPattern { .. })
    ));
    assert_eq!(
      HtmlPolicy::builder().default_image_alt(" ").build().err(),
      Some(PolicyError::EmptyDefaultAlt)
    );
    assert_eq!(
      HtmlPolicy::builder()
        .disallow_tags(ALLOWED_TAGS.iter().copied())
        .build()
        .err(),
      Some(PolicyError::EmptyAllowList)
    );
  }

  #[test]
  fn test_event_handler_detection() {
    assert!(is_event_handler("onclick"));
    assert!(is_event_handler("ONLOAD"));
    assert!(!is_event_handler("on"));
    assert!(!is_event_handler("alt"));
  }

  #[test]
  fn test_policy_serializes_pattern() {
    let json = serde_json::to_value(HtmlPolicy::standard())
      .expect("policy serializes");
    assert_eq!(json["allowed_uri_scheme"], ALLOWED_URI_PATTERN);
    assert_eq!(json["allowed_tags"][0], "h1");
    assert_eq!(json["default_image_alt"], DEFAULT_IMAGE_ALT);
  }
}
