//! Text, attribute and recovery helpers shared by the sanitizer and the
//! enrichment passes.
//!
//! Everything that decides the *value* of an attribute lives here, so the
//! sanitizer and the enrichment passes cannot drift apart. Running either of
//! them, or both, over the same element must settle on the same state.
use std::sync::LazyLock;

use log::error;
use regex::Regex;

/// Suffix appended to the accessible label of links that open a new window.
pub const NEW_WINDOW_LABEL: &str = "(Opens in new window)";

/// `rel` tokens carried by every external link, in canonical order.
pub const EXTERNAL_REL_TOKENS: [&str; 3] = ["noopener", "noreferrer", "nofollow"];

/// Fallback id for headings whose text yields no usable slug.
pub const FALLBACK_HEADING_ID: &str = "section";

/// Ids that would shadow a `document` or `window` property (DOM clobbering).
///
/// Author supplied ids with one of these values are stripped by the
/// sanitizer, and generated heading ids never take one of them.
pub const CLOBBERABLE_IDS: &[&str] = &[
  "URL",
  "action",
  "all",
  "anchors",
  "applets",
  "attributes",
  "baseURI",
  "body",
  "childNodes",
  "close",
  "cookie",
  "cookieStore",
  "createElement",
  "currentScript",
  "defaultView",
  "documentElement",
  "domain",
  "elements",
  "embeds",
  "firstChild",
  "forms",
  "getElementById",
  "getElementsByClassName",
  "getElementsByName",
  "getElementsByTagName",
  "head",
  "images",
  "implementation",
  "innerHTML",
  "lastChild",
  "links",
  "location",
  "method",
  "nodeName",
  "nodeType",
  "open",
  "outerHTML",
  "ownerDocument",
  "parentNode",
  "plugins",
  "querySelector",
  "querySelectorAll",
  "referrer",
  "reset",
  "scripts",
  "submit",
  "textContent",
  "write",
  "writeln",
];

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\s+").unwrap_or_else(|e| {
    error!("Failed to compile WHITESPACE_RE regex: {e}");
    never_matching_regex()
  })
});

/// Create a regex that never matches anything.
///
/// Used as a fallback when a pattern fails to compile, so that a broken
/// pattern degrades to "nothing matches" instead of a panic.
#[must_use]
pub fn never_matching_regex() -> Regex {
  #[allow(
    clippy::expect_used,
    reason = "This pattern is guaranteed to be valid"
  )]
  Regex::new(r"[^\s\S]").expect("regex pattern [^\\s\\S] should always compile")
}

/// Slugify heading text for use as an anchor id.
///
/// Lower-cases, replaces whitespace runs with `-` and drops every character
/// outside `[a-z0-9-]`.
///
/// ```
/// assert_eq!(scribe_html::utils::slugify("Hello, World!"), "hello-world");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
  let lowered = text.trim().to_lowercase();
  WHITESPACE_RE
    .replace_all(&lowered, "-")
    .chars()
    .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
    .collect()
}

/// Derive the id of a heading from its text content.
///
/// Falls back to [`FALLBACK_HEADING_ID`] when the slug has no alphanumeric
/// character and suffixes slugs that would clobber a document property.
#[must_use]
pub fn heading_id(text: &str) -> String {
  let slug = slugify(text);
  if !slug.chars().any(|c| c.is_ascii_alphanumeric()) {
    FALLBACK_HEADING_ID.to_string()
  } else if is_clobberable_id(&slug) {
    format!("{slug}-{FALLBACK_HEADING_ID}")
  } else {
    slug
  }
}

/// Whether `id` names a `document`/`window` property.
#[must_use]
pub fn is_clobberable_id(id: &str) -> bool {
  CLOBBERABLE_IDS.contains(&id)
}

/// Collapse whitespace runs into single spaces and trim the ends.
#[must_use]
pub fn normalize_text(text: &str) -> String {
  WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// The URL a browser actually resolves from an attribute value.
///
/// Leading and trailing C0 controls and spaces are trimmed and every ASCII
/// tab, newline and carriage return is removed, as the URL parser does. So
/// `ht\ttps://x` comes back as `https://x`.
#[must_use]
pub fn normalize_url(value: &str) -> String {
  value
    .trim_matches(|c: char| c <= ' ')
    .chars()
    .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
    .collect()
}

fn has_scheme(url: &str, scheme: &str) -> bool {
  url
    .get(..scheme.len())
    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// Whether an `href` points to an external `http:`/`https:` resource.
#[must_use]
pub fn is_external_href(href: &str) -> bool {
  let href = normalize_url(href);
  has_scheme(&href, "http:") || has_scheme(&href, "https:")
}

/// Rewrite an unencrypted `http:` URL to `https:`.
///
/// The result is the [normalized](normalize_url) URL. Returns `None` when the
/// URL does not use the `http:` scheme.
#[must_use]
pub fn upgrade_to_https(url: &str) -> Option<String> {
  let url = normalize_url(url);
  has_scheme(&url, "http:").then(|| format!("https:{}", &url[5..]))
}

/// Merge an existing `rel` value with [`EXTERNAL_REL_TOKENS`].
///
/// Existing tokens keep their order (lower-cased, de-duplicated), missing
/// required tokens are appended. The result is stable under repetition.
#[must_use]
pub fn merge_rel(existing: Option<&str>) -> String {
  let mut tokens: Vec<String> = Vec::new();
  for token in existing.unwrap_or_default().split_ascii_whitespace() {
    let token = token.to_ascii_lowercase();
    if !tokens.contains(&token) {
      tokens.push(token);
    }
  }
  for required in EXTERNAL_REL_TOKENS {
    if !tokens.iter().any(|token| token == required) {
      tokens.push(required.to_string());
    }
  }
  tokens.join(" ")
}

/// Accessible label for a link that opens in a new window.
///
/// An existing label gets [`NEW_WINDOW_LABEL`] appended once, otherwise the
/// label is built from the link text.
#[must_use]
pub fn external_link_label(existing: Option<&str>, link_text: &str) -> String {
  match existing.map(str::trim).filter(|label| !label.is_empty()) {
    Some(label) if label.ends_with(NEW_WINDOW_LABEL) => label.to_string(),
    Some(label) => format!("{label} {NEW_WINDOW_LABEL}"),
    None => {
      let text = normalize_text(link_text);
      if text.is_empty() {
        NEW_WINDOW_LABEL.to_string()
      } else {
        format!("{text} {NEW_WINDOW_LABEL}")
      }
    },
  }
}

/// Whether a `class` attribute carries every token of `classes`.
#[must_use]
pub fn has_class(class_attr: Option<&str>, classes: &str) -> bool {
  let Some(class_attr) = class_attr else {
    return false;
  };
  let present: Vec<&str> = class_attr.split_ascii_whitespace().collect();
  let mut wanted = classes.split_ascii_whitespace().peekable();
  wanted.peek().is_some() && wanted.all(|class| present.contains(&class))
}

/// Append `class` to a `class` attribute value.
#[must_use]
pub fn add_class(class_attr: Option<&str>, class: &str) -> String {
  match class_attr.map(str::trim).filter(|c| !c.is_empty()) {
    Some(existing) => format!("{existing} {class}"),
    None => class.to_string(),
  }
}

/// Run `f`, converting a panic into `None`.
///
/// The panic payload is logged at error level with `context` as prefix, so
/// the caller can fall back to its input and keep going.
pub fn catch_panic<T, F>(context: &str, f: F) -> Option<T>
where
  F: FnOnce() -> T,
{
  match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
    Ok(value) => Some(value),
    Err(payload) => {
      if let Some(message) = payload.downcast_ref::<String>() {
        error!("{context}: {message}");
      } else if let Some(message) = payload.downcast_ref::<&str>() {
        error!("{context}: {message}");
      } else {
        error!("{context}: unknown error");
      }
      None
    },
  }
}
