//! # scribe-html
//!
//! Sanitization and enrichment of stored rich-text HTML for a blog/CMS.
//!
//! Editor-produced HTML is untrusted. Before it is embedded in a page it goes
//! through an allow-list [`HtmlPolicy`], then an ordered set of enrichment
//! passes that assign heading ids (and extract a table of contents), harden
//! images and external links, make tables scroll and label code blocks.
//!
//! ## Quick Start
//!
//! ```rust
//! use scribe_html::{EnrichmentContext, Renderer};
//!
//! let renderer = Renderer::default();
//! let rendered = renderer.pre_render(
//!   r#"<h2>Setup</h2><a href="https://example.com" onclick="x()">docs</a>"#,
//!   &EnrichmentContext::new().with_heading_id_prefix("post-"),
//! );
//!
//! assert!(!rendered.html.contains("onclick"));
//! assert_eq!(rendered.headings[0].id, "post-setup");
//! ```
//!
//! ## Substrates
//!
//! - [`Renderer::pre_render`] works on a detached fragment and returns a
//!   string, for server-side rendering.
//! - [`Renderer::post_mount`] works on a [`LiveSubtree`] of a whole page tree
//!   and mutates it in place, leaving the rest of the page alone.
//!
//! Both produce identical markup for identical input, and both are
//! idempotent: rendering rendered output changes nothing.
pub mod enrich;
pub mod policy;
pub mod render;
pub mod sanitizer;
pub mod tree;
mod types;
pub mod utils;

pub use crate::{
  enrich::{
    EnrichmentContext,
    EnrichmentOptions,
    EnrichmentPass,
    EnrichmentPipeline,
  },
  policy::{HtmlPolicy, HtmlPolicyBuilder, PolicyError},
  render::Renderer,
  sanitizer::{sanitize, sanitize_tree},
  tree::{DetachedFragment, LiveDocument, LiveSubtree, MutableTree},
  types::{HeadingRecord, Rendered},
};

/// Sanitize and enrich `raw_html` with the standard policy and passes.
#[must_use]
pub fn render(raw_html: &str, ctx: &EnrichmentContext) -> Rendered {
  Renderer::default().pre_render(raw_html, ctx)
}
