//! Ordered enrichment passes over sanitized content.
//!
//! Each pass looks at the tree read-only and returns a [`PassPlan`]: the edits
//! it wants and the headings it found. The pipeline then applies the edits
//! through the [`MutableTree`] interface. Planning and applying both happen
//! behind a panic boundary, so one misbehaving pass is logged and skipped
//! while the others still run.
//!
//! Every pass only plans edits that change something. Running the pipeline on
//! its own output therefore plans nothing and leaves the tree untouched.
mod passes;

use std::fmt;

use kuchikikiki::NodeRef;
use log::{debug, error};
pub use passes::{
  CodeLanguagePass,
  ExternalLinkPass,
  HeadingIdPass,
  ImagePass,
  TableWrapPass,
};
use serde::{Deserialize, Serialize};

use crate::{
  policy::DEFAULT_IMAGE_ALT,
  tree::{DetachedFragment, MutableTree},
  types::{HeadingRecord, Rendered},
  utils::catch_panic,
};

/// Class of the `<div>` that makes wide tables scroll horizontally.
pub const DEFAULT_TABLE_WRAPPER_CLASS: &str = "overflow-x-auto";

/// Language assumed for code blocks that declare none.
pub const DEFAULT_CODE_LANGUAGE: &str = "javascript";

/// Per-invocation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentContext {
  /// Prepended verbatim to every generated heading id (`post-` turns
  /// "My Section" into `post-my-section`). Ids an author wrote by hand are
  /// left alone.
  pub heading_id_prefix: Option<String>,
  /// The tree is live in a page; embeds must not be re-parented.
  pub interactive:       bool,
}

impl EnrichmentContext {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Context for an in-place run over a mounted document.
  #[must_use]
  pub fn live() -> Self {
    Self {
      interactive: true,
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_heading_id_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
    self.heading_id_prefix = Some(prefix.into());
    self
  }
}

/// Pipeline construction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentOptions {
  /// Record `h1` headings for the table of contents. Ids are assigned to
  /// `h1` either way.
  pub include_h1_in_toc:     bool,
  pub default_image_alt:     String,
  pub table_wrapper_class:   String,
  /// `None` disables code language defaulting.
  pub default_code_language: Option<String>,
}

impl Default for EnrichmentOptions {
  fn default() -> Self {
    Self {
      include_h1_in_toc:     false,
      default_image_alt:     DEFAULT_IMAGE_ALT.to_string(),
      table_wrapper_class:   DEFAULT_TABLE_WRAPPER_CLASS.to_string(),
      default_code_language: Some(DEFAULT_CODE_LANGUAGE.to_string()),
    }
  }
}

/// A single planned change to the tree.
#[derive(Debug, Clone)]
pub enum Edit {
  SetAttribute {
    node:  NodeRef,
    name:  String,
    value: String,
  },
  /// Move `node` into a new `<tag class="...">` at its current position.
  Wrap {
    node:  NodeRef,
    tag:   String,
    class: String,
  },
}

impl Edit {
  #[must_use]
  pub fn set_attribute(node: &NodeRef, name: &str, value: &str) -> Self {
    Self::SetAttribute {
      node:  node.clone(),
      name:  name.to_string(),
      value: value.to_string(),
    }
  }
}

/// What a pass wants to do.
#[derive(Debug, Clone, Default)]
pub struct PassPlan {
  pub edits:    Vec<Edit>,
  pub headings: Vec<HeadingRecord>,
}

/// One enrichment step.
pub trait EnrichmentPass: Send + Sync {
  /// Name used in log messages.
  fn name(&self) -> &'static str;

  /// Inspect the tree and plan edits. Must not mutate the tree.
  fn plan(&self, tree: &dyn MutableTree, ctx: &EnrichmentContext) -> PassPlan;
}

/// Ordered list of enrichment passes.
pub struct EnrichmentPipeline {
  passes: Vec<Box<dyn EnrichmentPass>>,
}

impl EnrichmentPipeline {
  /// The standard five passes, in order: heading ids, images, external links,
  /// tables, code languages.
  #[must_use]
  pub fn new(options: &EnrichmentOptions) -> Self {
    Self::empty()
      .with_pass(HeadingIdPass::new(options.include_h1_in_toc))
      .with_pass(ImagePass::new(&options.default_image_alt))
      .with_pass(ExternalLinkPass)
      .with_pass(TableWrapPass::new(&options.table_wrapper_class))
      .with_pass(CodeLanguagePass::new(
        options.default_code_language.as_deref(),
      ))
  }

  /// A pipeline without passes.
  #[must_use]
  pub fn empty() -> Self {
    Self { passes: Vec::new() }
  }

  /// Append a pass.
  #[must_use]
  pub fn with_pass<P: EnrichmentPass + 'static>(mut self, pass: P) -> Self {
    self.passes.push(Box::new(pass));
    self
  }

  #[must_use]
  pub fn pass_names(&self) -> Vec<&'static str> {
    self.passes.iter().map(|pass| pass.name()).collect()
  }

  /// Run every pass over `tree` in order, returning the extracted headings.
  pub fn run(
    &self,
    tree: &dyn MutableTree,
    ctx: &EnrichmentContext,
  ) -> Vec<HeadingRecord> {
    let mut headings = Vec::new();
    for pass in &self.passes {
      if let Some(found) = apply_pass(pass.as_ref(), tree, ctx) {
        headings.extend(found);
      }
    }
    headings
  }

  /// Enrich already sanitized HTML.
  #[must_use]
  pub fn enrich(&self, sanitized_html: &str, ctx: &EnrichmentContext) -> Rendered {
    let fragment = DetachedFragment::parse(sanitized_html);
    let headings = self.run(&fragment, ctx);
    Rendered {
      html: fragment.to_html(),
      headings,
    }
  }
}

impl Default for EnrichmentPipeline {
  fn default() -> Self {
    Self::new(&EnrichmentOptions::default())
  }
}

impl fmt::Debug for EnrichmentPipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EnrichmentPipeline")
      .field("passes", &self.pass_names())
      .finish()
  }
}

/// Plan and apply a single pass.
///
/// Returns `None` if the pass panicked. A pass that panics while planning
/// leaves the tree untouched.
pub fn apply_pass(
  pass: &dyn EnrichmentPass,
  tree: &dyn MutableTree,
  ctx: &EnrichmentContext,
) -> Option<Vec<HeadingRecord>> {
  let name = pass.name();
  let Some(plan) = catch_panic(&format!("Pass '{name}' failed to plan"), || {
    pass.plan(tree, ctx)
  }) else {
    error!("Skipping enrichment pass '{name}'");
    return None;
  };

  debug!("Pass '{name}' planned {} edit(s)", plan.edits.len());
  let PassPlan { edits, headings } = plan;
  catch_panic(&format!("Pass '{name}' failed to apply"), || {
    for edit in edits {
      apply_edit(tree, edit);
    }
  })?;

  Some(headings)
}

fn apply_edit(tree: &dyn MutableTree, edit: Edit) {
  match edit {
    Edit::SetAttribute { node, name, value } => {
      tree.set_attribute(&node, &name, &value);
    },
    Edit::Wrap { node, tag, class } => {
      let wrapper = tree.create_element(&tag, &[("class", class.as_str())]);
      tree.insert_before(&node, wrapper.clone());
      tree.append_child(&wrapper, node);
    },
  }
}
