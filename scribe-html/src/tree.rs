//! Tree-mutation interface shared by both rendering substrates.
//!
//! The sanitizer and the enrichment passes never touch `kuchikikiki` nodes
//! for writing directly; every mutation goes through [`MutableTree`]. That
//! keeps the detached pre-render substrate ([`DetachedFragment`]) and the
//! live post-mount substrate ([`LiveSubtree`]) on exactly the same code path.
use std::cell::Cell;

use kuchikikiki::{Attribute, ExpandedName, NodeRef, parse_html};
use log::{trace, warn};
use markup5ever::{LocalName, QualName, ns};
use tendril::TendrilSink;

/// Capability set needed to sanitize and enrich a tree in place.
///
/// Only [`root`](Self::root) is required. Every write is reported through
/// [`note_mutation`](Self::note_mutation), and writes that would not change
/// anything are skipped (and not reported).
pub trait MutableTree {
  /// The container whose descendants are processed. The container itself is
  /// never queried or mutated.
  fn root(&self) -> NodeRef;

  /// Called once for every effective mutation.
  fn note_mutation(&self) {}

  /// HTML elements below the root whose tag is one of `tags`, in document
  /// order.
  fn query_all(&self, tags: &[&str]) -> Vec<NodeRef> {
    self
      .root()
      .descendants()
      .filter(|node| {
        html_tag(node).is_some_and(|tag| tags.contains(&tag.as_ref()))
      })
      .collect()
  }

  fn get_attribute(&self, node: &NodeRef, name: &str) -> Option<String> {
    node
      .as_element()?
      .attributes
      .borrow()
      .get(name)
      .map(ToString::to_string)
  }

  /// Set an attribute. Returns `false` if it already had this value.
  fn set_attribute(&self, node: &NodeRef, name: &str, value: &str) -> bool {
    let Some(element) = node.as_element() else {
      return false;
    };
    let mut attributes = element.attributes.borrow_mut();
    if attributes.get(name) == Some(value) {
      return false;
    }
    attributes.insert(name, value.to_string());
    drop(attributes);
    self.note_mutation();
    true
  }

  /// Remove an attribute by (qualified) name. Returns `false` if absent.
  fn remove_attribute(&self, node: &NodeRef, name: &str) -> bool {
    let Some(element) = node.as_element() else {
      return false;
    };
    let mut attributes = element.attributes.borrow_mut();
    let before = attributes.map.len();
    attributes
      .map
      .retain(|key, attribute| qualified_name(key, attribute) != name);
    let removed = attributes.map.len() != before;
    drop(attributes);
    if removed {
      self.note_mutation();
    }
    removed
  }

  /// Create a detached HTML element.
  fn create_element(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeRef {
    NodeRef::new_element(
      QualName::new(None, ns!(html), LocalName::from(tag)),
      attributes.iter().map(|(name, value)| {
        (ExpandedName::new("", *name), Attribute {
          prefix: None,
          value:  (*value).to_string(),
        })
      }),
    )
  }

  /// Insert `node` as the previous sibling of `reference`.
  fn insert_before(&self, reference: &NodeRef, node: NodeRef) {
    reference.insert_before(node);
    self.note_mutation();
  }

  /// Append `child` as the last child of `parent`.
  fn append_child(&self, parent: &NodeRef, child: NodeRef) {
    parent.append(child);
    self.note_mutation();
  }

  /// Remove `node` together with its content.
  fn remove(&self, node: &NodeRef) {
    node.detach();
    self.note_mutation();
  }

  /// Replace `node` with its children.
  fn unwrap(&self, node: &NodeRef) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
      node.insert_before(child);
    }
    node.detach();
    self.note_mutation();
  }
}

/// Local name of an HTML-namespace element.
#[must_use]
pub fn html_tag(node: &NodeRef) -> Option<LocalName> {
  let element = node.as_element()?;
  (element.name.ns == ns!(html)).then(|| element.name.local.clone())
}

/// Attribute names of an element, qualified with their prefix when they have
/// a namespace.
#[must_use]
pub fn attribute_names(node: &NodeRef) -> Vec<String> {
  node
    .as_element()
    .map(|element| {
      element
        .attributes
        .borrow()
        .map
        .iter()
        .map(|(key, attribute)| qualified_name(key, attribute))
        .collect()
    })
    .unwrap_or_default()
}

fn qualified_name(key: &ExpandedName, attribute: &Attribute) -> String {
  if key.ns.is_empty() {
    return key.local.to_string();
  }
  match &attribute.prefix {
    Some(prefix) => format!("{prefix}:{}", key.local),
    None => format!("{}:{}", key.ns, key.local),
  }
}

/// Serialize the children of `node` to an HTML string.
#[must_use]
pub fn inner_html(node: &NodeRef) -> String {
  let mut buf = Vec::new();
  for child in node.children() {
    if let Err(e) = child.serialize(&mut buf) {
      warn!("Failed to serialize node: {e}");
    }
  }
  String::from_utf8_lossy(&buf).into_owned()
}

/// Parse an HTML fragment into a standards-mode document and return its body.
fn parse_body(html: &str) -> NodeRef {
  let document = parse_html().one(format!(
    "<!DOCTYPE html><html><head></head><body>{html}</body></html>"
  ));
  document
    .select_first("body")
    .map(|body| body.as_node().clone())
    .unwrap_or(document)
}

/// A fragment parsed into a private document.
///
/// This is the pre-render substrate: nothing outside the fragment exists, and
/// the result is read back with [`DetachedFragment::to_html`].
#[derive(Debug, Clone)]
pub struct DetachedFragment {
  body: NodeRef,
}

impl DetachedFragment {
  /// Parse an HTML fragment. Malformed input is recovered by the parser.
  #[must_use]
  pub fn parse(html: &str) -> Self {
    Self {
      body: parse_body(html),
    }
  }

  /// Serialize the fragment.
  #[must_use]
  pub fn to_html(&self) -> String {
    inner_html(&self.body)
  }

  /// Re-parse the serialized fragment so the tree matches what a parser
  /// would build from [`Self::to_html`].
  pub fn normalize(&mut self) {
    let html = self.to_html();
    self.body = parse_body(&html);
  }

  /// Top-level nodes of the fragment.
  pub fn children(&self) -> impl Iterator<Item = NodeRef> + use<> {
    self.body.children()
  }
}

impl MutableTree for DetachedFragment {
  fn root(&self) -> NodeRef {
    self.body.clone()
  }
}

/// A whole page tree, as a browser would hold it after hydration.
#[derive(Debug, Clone)]
pub struct LiveDocument {
  document: NodeRef,
}

impl LiveDocument {
  /// Parse a complete HTML page.
  #[must_use]
  pub fn parse(html: &str) -> Self {
    Self {
      document: parse_html().one(html),
    }
  }

  /// Wrap an existing document node.
  #[must_use]
  pub const fn from_node(document: NodeRef) -> Self {
    Self { document }
  }

  #[must_use]
  pub const fn document(&self) -> &NodeRef {
    &self.document
  }

  /// The first element matching a CSS `selector`, as a mutation target.
  ///
  /// Returns `None` when nothing matches or the selector does not parse.
  #[must_use]
  pub fn subtree(&self, selector: &str) -> Option<LiveSubtree> {
    match self.document.select_first(selector) {
      Ok(container) => Some(LiveSubtree::new(container.as_node().clone())),
      Err(()) => {
        trace!("No container matches '{selector}'");
        None
      },
    }
  }

  /// Serialize the whole page.
  #[must_use]
  pub fn to_html(&self) -> String {
    let mut buf = Vec::new();
    if let Err(e) = self.document.serialize(&mut buf) {
      warn!("Failed to serialize document: {e}");
    }
    String::from_utf8_lossy(&buf).into_owned()
  }
}

/// A container element inside a [`LiveDocument`], mutated in place.
///
/// Nodes outside the container are never touched, untouched nodes inside keep
/// their identity, and every effective mutation is counted.
#[derive(Debug)]
pub struct LiveSubtree {
  container: NodeRef,
  mutations: Cell<usize>,
}

impl LiveSubtree {
  #[must_use]
  pub const fn new(container: NodeRef) -> Self {
    Self {
      container,
      mutations: Cell::new(0),
    }
  }

  #[must_use]
  pub const fn container(&self) -> &NodeRef {
    &self.container
  }

  /// Number of effective mutations performed so far.
  #[must_use]
  pub fn mutation_count(&self) -> usize {
    self.mutations.get()
  }

  pub fn reset_mutation_count(&self) {
    self.mutations.set(0);
  }

  /// Whether the container has no content besides whitespace.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.container.children().all(|child| {
      child
        .as_text()
        .is_some_and(|text| text.borrow().trim().is_empty())
    })
  }

  /// Serialize the container's content.
  #[must_use]
  pub fn inner_html(&self) -> String {
    inner_html(&self.container)
  }
}

impl MutableTree for LiveSubtree {
  fn root(&self) -> NodeRef {
    self.container.clone()
  }

  fn note_mutation(&self) {
    self.mutations.set(self.mutations.get() + 1);
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::expect_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn test_detached_round_trip() {
    let fragment = DetachedFragment::parse("<p>Hello <em>world</em></p>");
    assert_eq!(fragment.to_html(), "<p>Hello <em>world</em></p>");
    assert_eq!(DetachedFragment::parse("").to_html(), "");
  }

  #[test]
  fn test_detached_fragment_uses_standards_mode() {
    let fragment = DetachedFragment::parse("<p>a<table></table>");
    assert_eq!(fragment.to_html(), "<p>a</p><table></table>");
  }

  #[test]
  fn test_query_all_in_document_order() {
    let fragment =
      DetachedFragment::parse("<h2>a</h2><div><h3>b</h3></div><h2>c</h2>");
    let texts: Vec<String> = fragment
      .query_all(&["h2", "h3"])
      .iter()
      .map(NodeRef::text_contents)
      .collect();
    assert_eq!(texts, ["a", "b", "c"]);
  }

  #[test]
  fn test_attribute_writes_report_changes() {
    let fragment = DetachedFragment::parse(r#"<img src="/a.png" alt="A">"#);
    let img = &fragment.query_all(&["img"])[0];

    assert!(!fragment.set_attribute(img, "alt", "A"));
    assert!(fragment.set_attribute(img, "loading", "lazy"));
    assert_eq!(fragment.get_attribute(img, "loading").as_deref(), Some("lazy"));
    assert!(fragment.remove_attribute(img, "alt"));
    assert!(!fragment.remove_attribute(img, "alt"));
    assert_eq!(fragment.get_attribute(img, "alt"), None);
    assert_eq!(fragment.get_attribute(img, "src").as_deref(), Some("/a.png"));
  }

  #[test]
  fn test_unwrap_keeps_children_in_place() {
    let fragment = DetachedFragment::parse("<p>a<span>b<em>c</em></span>d</p>");
    let span = &fragment.query_all(&["span"])[0];
    fragment.unwrap(span);
    assert_eq!(fragment.to_html(), "<p>ab<em>c</em>d</p>");
  }

  #[test]
  fn test_create_and_insert() {
    let fragment = DetachedFragment::parse("<table></table>");
    let table = fragment.query_all(&["table"])[0].clone();
    let wrapper = fragment.create_element("div", &[("class", "wrap")]);
    fragment.insert_before(&table, wrapper.clone());
    fragment.append_child(&wrapper, table);
    assert_eq!(
      fragment.to_html(),
      r#"<div class="wrap"><table></table></div>"#
    );
  }

  #[test]
  fn test_normalize_reparses() {
    let mut fragment = DetachedFragment::parse("<p><span>x</span></p>");
    let span = fragment.query_all(&["span"])[0].clone();
    let table = fragment.create_element("table", &[]);
    fragment.append_child(&span, table);
    fragment.normalize();
    assert_eq!(
      fragment.to_html(),
      "<p><span>x</span></p><table></table><p></p>"
    );
  }

  #[test]
  fn test_live_subtree_counts_and_isolates() {
    let document = LiveDocument::parse(
      r#"<html><body><nav><a href="https://x.com">x</a></nav><article id="post"><p>t</p></article></body></html>"#,
    );
    let subtree = document.subtree("#post").expect("container exists");
    assert!(!subtree.is_empty());

    let anchors = subtree.query_all(&["a"]);
    assert!(anchors.is_empty());

    let p = subtree.query_all(&["p"])[0].clone();
    assert!(subtree.set_attribute(&p, "class", "lead"));
    assert!(!subtree.set_attribute(&p, "class", "lead"));
    assert_eq!(subtree.mutation_count(), 1);

    subtree.reset_mutation_count();
    assert_eq!(subtree.mutation_count(), 0);
    assert!(document.to_html().contains(r#"<nav><a href="https://x.com">x</a></nav>"#));
    assert_eq!(subtree.inner_html(), r#"<p class="lead">t</p>"#);
  }

  #[test]
  fn test_live_subtree_emptiness() {
    let document =
      LiveDocument::parse("<html><body><div id=\"c\">\n  </div></body></html>");
    let subtree = document.subtree("#c").expect("container exists");
    assert!(subtree.is_empty());
    assert!(document.subtree("#missing").is_none());
  }

  #[test]
  fn test_html_tag_ignores_foreign_elements() {
    let fragment = DetachedFragment::parse("<svg><a></a></svg><a></a>");
    let anchors = fragment.query_all(&["a"]);
    assert_eq!(anchors.len(), 1);
  }
}
