//! The standard enrichment passes.
use std::collections::HashSet;

use kuchikikiki::NodeRef;

use super::{EnrichmentContext, EnrichmentPass, Edit, PassPlan};
use crate::{
  sanitizer::{HEADING_TAGS, is_blank},
  tree::{MutableTree, html_tag},
  types::HeadingRecord,
  utils::{add_class, has_class, heading_id, is_external_href, merge_rel, normalize_text},
};

/// Assigns unique ids to headings and extracts them for a table of contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingIdPass {
  include_h1_in_toc: bool,
}

impl HeadingIdPass {
  #[must_use]
  pub const fn new(include_h1_in_toc: bool) -> Self {
    Self { include_h1_in_toc }
  }
}

impl EnrichmentPass for HeadingIdPass {
  fn name(&self) -> &'static str {
    "heading-ids"
  }

  fn plan(&self, tree: &dyn MutableTree, ctx: &EnrichmentContext) -> PassPlan {
    let headings = tree.query_all(&HEADING_TAGS);

    // Ids held by anything other than a heading are taken
    let mut used: HashSet<String> = tree
      .root()
      .descendants()
      .filter(|node| !headings.contains(node))
      .filter_map(|node| tree.get_attribute(&node, "id"))
      .collect();

    let prefix = ctx
      .heading_id_prefix
      .as_deref()
      .filter(|prefix| !prefix.trim().is_empty());

    let mut plan = PassPlan::default();
    for node in &headings {
      let level = heading_level(node);
      let text = normalize_text(&node.text_contents());
      let existing = tree
        .get_attribute(node, "id")
        .filter(|id| !id.trim().is_empty());

      // An id equal to the text-derived one was generated, not authored
      let derived = heading_id(&text);
      let base = match (existing.as_deref(), prefix) {
        (Some(id), Some(prefix)) if id == derived => format!("{prefix}{derived}"),
        (Some(id), _) => id.to_string(),
        (None, Some(prefix)) => format!("{prefix}{derived}"),
        (None, None) => derived,
      };
      let id = unique_id(&base, &mut used);

      if existing.as_deref() != Some(id.as_str()) {
        plan.edits.push(Edit::set_attribute(node, "id", &id));
      }
      if level >= 2 || self.include_h1_in_toc {
        plan.headings.push(HeadingRecord { id, text, level });
      }
    }
    plan
  }
}

fn heading_level(node: &NodeRef) -> u8 {
  html_tag(node)
    .and_then(|tag| tag.strip_prefix('h').and_then(|level| level.parse().ok()))
    .unwrap_or(1)
}

/// `base`, or `base-2`, `base-3`, ... whichever is free first.
fn unique_id(base: &str, used: &mut HashSet<String>) -> String {
  let mut candidate = base.to_string();
  let mut suffix = 2;
  while used.contains(&candidate) {
    candidate = format!("{base}-{suffix}");
    suffix += 1;
  }
  used.insert(candidate.clone());
  candidate
}

/// Lazy loading and alt text for every image.
#[derive(Debug, Clone)]
pub struct ImagePass {
  default_alt: String,
}

impl ImagePass {
  #[must_use]
  pub fn new(default_alt: &str) -> Self {
    Self {
      default_alt: default_alt.to_string(),
    }
  }
}

impl EnrichmentPass for ImagePass {
  fn name(&self) -> &'static str {
    "images"
  }

  fn plan(&self, tree: &dyn MutableTree, _ctx: &EnrichmentContext) -> PassPlan {
    let mut plan = PassPlan::default();
    for img in tree.query_all(&["img"]) {
      if is_blank(tree.get_attribute(&img, "loading")) {
        plan.edits.push(Edit::set_attribute(&img, "loading", "lazy"));
      }
      if is_blank(tree.get_attribute(&img, "alt")) {
        plan
          .edits
          .push(Edit::set_attribute(&img, "alt", &self.default_alt));
      }
    }
    plan
  }
}

/// `target="_blank"` and a safe `rel` on links leaving the site.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalLinkPass;

impl EnrichmentPass for ExternalLinkPass {
  fn name(&self) -> &'static str {
    "external-links"
  }

  fn plan(&self, tree: &dyn MutableTree, _ctx: &EnrichmentContext) -> PassPlan {
    let mut plan = PassPlan::default();
    for anchor in tree.query_all(&["a"]) {
      let is_external = tree
        .get_attribute(&anchor, "href")
        .is_some_and(|href| is_external_href(&href));
      if !is_external {
        continue;
      }

      let current = tree.get_attribute(&anchor, "rel");
      let rel = merge_rel(current.as_deref());
      if current.as_deref() != Some(rel.as_str()) {
        plan.edits.push(Edit::set_attribute(&anchor, "rel", &rel));
      }
      if tree.get_attribute(&anchor, "target").as_deref() != Some("_blank") {
        plan
          .edits
          .push(Edit::set_attribute(&anchor, "target", "_blank"));
      }
    }
    plan
  }
}

/// Wraps tables in a horizontally scrolling container.
#[derive(Debug, Clone)]
pub struct TableWrapPass {
  wrapper_class: String,
}

impl TableWrapPass {
  #[must_use]
  pub fn new(wrapper_class: &str) -> Self {
    Self {
      wrapper_class: wrapper_class.trim().to_string(),
    }
  }
}

impl EnrichmentPass for TableWrapPass {
  fn name(&self) -> &'static str {
    "table-wrap"
  }

  fn plan(&self, tree: &dyn MutableTree, ctx: &EnrichmentContext) -> PassPlan {
    let mut plan = PassPlan::default();
    if self.wrapper_class.is_empty() {
      return plan;
    }

    for table in tree.query_all(&["table"]) {
      let wrapped = table.parent().is_some_and(|parent| {
        html_tag(&parent).is_some()
          && has_class(
            tree.get_attribute(&parent, "class").as_deref(),
            &self.wrapper_class,
          )
      });
      if wrapped {
        continue;
      }

      // Moving an embed in a live page reloads it
      if ctx.interactive
        && table
          .descendants()
          .any(|node| html_tag(&node).is_some_and(|tag| &*tag == "iframe"))
      {
        continue;
      }

      plan.edits.push(Edit::Wrap {
        node:  table,
        tag:   "div".to_string(),
        class: self.wrapper_class.clone(),
      });
    }
    plan
  }
}

/// Gives code blocks without a declared language a default one.
#[derive(Debug, Clone, Default)]
pub struct CodeLanguagePass {
  default_language: Option<String>,
}

impl CodeLanguagePass {
  #[must_use]
  pub fn new(default_language: Option<&str>) -> Self {
    Self {
      default_language: default_language
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .map(ToString::to_string),
    }
  }
}

impl EnrichmentPass for CodeLanguagePass {
  fn name(&self) -> &'static str {
    "code-language"
  }

  fn plan(&self, tree: &dyn MutableTree, _ctx: &EnrichmentContext) -> PassPlan {
    let mut plan = PassPlan::default();
    let Some(language) = &self.default_language else {
      return plan;
    };
    let language_class = format!("language-{language}");

    for code in tree.query_all(&["code"]) {
      let in_pre = code
        .parent()
        .and_then(|parent| html_tag(&parent))
        .is_some_and(|tag| &*tag == "pre");
      if !in_pre {
        continue;
      }

      let class = tree.get_attribute(&code, "class");
      let declared = class.as_deref().is_some_and(|class| {
        class
          .split_ascii_whitespace()
          .any(|token| token.starts_with("language-"))
      });
      if !declared {
        let value = add_class(class.as_deref(), &language_class);
        plan.edits.push(Edit::set_attribute(&code, "class", &value));
      }
    }
    plan
  }
}
