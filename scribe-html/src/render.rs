//! Rendering adapter over the two tree substrates.
use std::sync::Arc;

use log::{debug, error};

use crate::{
  enrich::{EnrichmentContext, EnrichmentOptions, EnrichmentPipeline},
  policy::HtmlPolicy,
  sanitizer::{sanitize, sanitize_tree},
  tree::{DetachedFragment, LiveSubtree, MutableTree},
  types::{HeadingRecord, Rendered},
  utils::catch_panic,
};

/// Sanitizes and enriches stored content, either ahead of time into a string
/// or in place inside a mounted document.
///
/// Both variants run the same sequence through [`MutableTree`], so for the
/// same input and context they produce the same markup.
///
/// # Examples
///
/// ```
/// use scribe_html::{EnrichmentContext, Renderer};
///
/// let renderer = Renderer::default();
/// let rendered = renderer.pre_render(
///   "<h2>Intro</h2><img src=\"/cat.png\">",
///   &EnrichmentContext::new(),
/// );
///
/// assert!(rendered.html.contains(r#"id="intro""#));
/// assert!(rendered.html.contains(r#"loading="lazy""#));
/// assert_eq!(rendered.headings[0].id, "intro");
/// ```
#[derive(Debug)]
pub struct Renderer {
  policy:   Arc<HtmlPolicy>,
  pipeline: EnrichmentPipeline,
}

impl Renderer {
  #[must_use]
  pub const fn new(policy: Arc<HtmlPolicy>, pipeline: EnrichmentPipeline) -> Self {
    Self { policy, pipeline }
  }

  /// Renderer with the standard passes configured by `options`.
  #[must_use]
  pub fn with_options(policy: Arc<HtmlPolicy>, options: &EnrichmentOptions) -> Self {
    Self::new(policy, EnrichmentPipeline::new(options))
  }

  #[must_use]
  pub fn policy(&self) -> &HtmlPolicy {
    &self.policy
  }

  #[must_use]
  pub const fn pipeline(&self) -> &EnrichmentPipeline {
    &self.pipeline
  }

  /// Sanitize only, without enrichment.
  #[must_use]
  pub fn sanitize(&self, raw_html: &str) -> String {
    sanitize(raw_html, &self.policy)
  }

  /// Render into a string on a detached tree.
  ///
  /// `ctx.interactive` is ignored: nothing is mounted yet.
  #[must_use]
  pub fn pre_render(&self, raw_html: &str, ctx: &EnrichmentContext) -> Rendered {
    let ctx = EnrichmentContext {
      interactive: false,
      ..ctx.clone()
    };

    let fragment = DetachedFragment::parse(&self.sanitize(raw_html));
    let headings = self.render_tree(&fragment, &ctx);
    Rendered {
      html: fragment.to_html(),
      headings,
    }
  }

  /// Render in place inside a mounted document.
  ///
  /// An empty container is first filled with the sanitized `raw_html`. A
  /// container that already has content (for example from a pre-render) is
  /// authoritative and `raw_html` is ignored.
  pub fn post_mount(
    &self,
    subtree: &LiveSubtree,
    raw_html: &str,
    ctx: &EnrichmentContext,
  ) -> Vec<HeadingRecord> {
    if subtree.is_empty() {
      debug!("Mounting content into empty container");
      let container = subtree.container();
      let leftovers: Vec<_> = container.children().collect();
      for node in leftovers {
        subtree.remove(&node);
      }

      let fragment = DetachedFragment::parse(&self.sanitize(raw_html));
      for node in fragment.children() {
        subtree.append_child(container, node);
      }
    }

    self.render_tree(subtree, ctx)
  }

  /// The sequence shared by both substrates.
  fn render_tree(
    &self,
    tree: &dyn MutableTree,
    ctx: &EnrichmentContext,
  ) -> Vec<HeadingRecord> {
    if catch_panic("Sanitizer failed", || sanitize_tree(tree, &self.policy))
      .is_none()
    {
      error!("Skipping enrichment of unsanitized content");
      return Vec::new();
    }
    self.pipeline.run(tree, ctx)
  }
}

impl Default for Renderer {
  fn default() -> Self {
    Self::new(
      Arc::new(HtmlPolicy::default()),
      EnrichmentPipeline::default(),
    )
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::expect_used, reason = "Fine in tests")]

  use super::*;
  use crate::tree::LiveDocument;

  #[test]
  fn test_pre_render_ignores_interactive() {
    let renderer = Renderer::default();
    let input = r#"<table><tbody><tr><td><iframe src="https://x.com/e"></iframe></td></tr></tbody></table>"#;
    let rendered = renderer.pre_render(input, &EnrichmentContext::live());
    assert!(rendered.html.starts_with(r#"<div class="overflow-x-auto">"#));
  }

  #[test]
  fn test_post_mount_fills_empty_container() {
    let document = LiveDocument::parse(
      "<html><body><header>site</header><main id=\"post\">\n</main></body></html>",
    );
    let subtree = document.subtree("#post").expect("container exists");
    let renderer = Renderer::default();

    let headings = renderer.post_mount(
      &subtree,
      "<h2>Hello</h2><script>x</script>",
      &EnrichmentContext::live(),
    );

    assert_eq!(subtree.inner_html(), r#"<h2 id="hello">Hello</h2>"#);
    assert_eq!(headings.len(), 1);
    assert!(document.to_html().contains("<header>site</header>"));
  }

  #[test]
  fn test_post_mount_prefers_existing_content() {
    let document = LiveDocument::parse(
      r#"<html><body><article id="post"><p>server</p></article></body></html>"#,
    );
    let subtree = document.subtree("#post").expect("container exists");
    Renderer::default().post_mount(&subtree, "<p>client</p>", &EnrichmentContext::live());
    assert_eq!(subtree.inner_html(), "<p>server</p>");
    assert_eq!(subtree.mutation_count(), 0);
  }
}
