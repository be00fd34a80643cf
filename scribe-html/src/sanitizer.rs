//! Policy-driven HTML sanitizer.
//!
//! Content is parsed by html5ever (through `kuchikikiki`), walked depth first
//! and pruned according to an [`HtmlPolicy`]. After an element's children are
//! clean, a few baseline rewrites run on it: external links are hardened,
//! images get `https`, lazy loading and alt text, and headings get an id.
//!
//! Sanitizing never fails. Anything the policy does not allow is dropped
//! silently (traced at most), and a panic during the walk degrades the result
//! to escaped text.
use kuchikikiki::{NodeData, NodeRef};
use log::{error, trace};

use crate::{
  policy::HtmlPolicy,
  tree::{DetachedFragment, MutableTree, attribute_names, html_tag},
  utils::{
    catch_panic,
    external_link_label,
    heading_id,
    is_clobberable_id,
    is_external_href,
    merge_rel,
    normalize_text,
    upgrade_to_https,
  },
};

/// Heading elements, outermost level first.
pub const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Sanitize an HTML fragment.
///
/// The result is normalized: parsing and serializing it again yields the same
/// string.
///
/// ```
/// use scribe_html::{policy::HtmlPolicy, sanitizer::sanitize};
///
/// let html = sanitize(
///   r#"<p onclick="steal()">Hi<script>alert(1)</script></p>"#,
///   HtmlPolicy::standard(),
/// );
/// assert_eq!(html, "<p>Hi</p>");
/// ```
#[must_use]
pub fn sanitize(raw_html: &str, policy: &HtmlPolicy) -> String {
  if raw_html.is_empty() {
    return String::new();
  }

  let mut fragment = DetachedFragment::parse(raw_html);
  if catch_panic("Sanitizer failed", || sanitize_tree(&fragment, policy))
    .is_some()
  {
    fragment.normalize();
    return fragment.to_html();
  }

  error!("Falling back to escaped text content");
  let text = DetachedFragment::parse(raw_html).root().text_contents();
  html_escape::encode_text(&text).into_owned()
}

/// Sanitize every node below the root of `tree`, in place.
pub fn sanitize_tree<T: MutableTree + ?Sized>(tree: &T, policy: &HtmlPolicy) {
  sanitize_children(tree, &tree.root(), policy);
}

fn sanitize_children<T: MutableTree + ?Sized>(
  tree: &T,
  parent: &NodeRef,
  policy: &HtmlPolicy,
) {
  // Snapshot first, the walk detaches and unwraps nodes as it goes
  let children: Vec<NodeRef> = parent.children().collect();
  for child in children {
    sanitize_node(tree, &child, policy);
  }
}

fn sanitize_node<T: MutableTree + ?Sized>(
  tree: &T,
  node: &NodeRef,
  policy: &HtmlPolicy,
) {
  match node.data() {
    NodeData::Text(_) => {},
    NodeData::Element(_) => sanitize_element(tree, node, policy),
    NodeData::Comment(_)
    | NodeData::ProcessingInstruction(_)
    | NodeData::Doctype(_) => {
      trace!("Removing non-element markup node");
      tree.remove(node);
    },
    _ => sanitize_children(tree, node, policy),
  }
}

fn sanitize_element<T: MutableTree + ?Sized>(
  tree: &T,
  node: &NodeRef,
  policy: &HtmlPolicy,
) {
  let Some(tag) = html_tag(node) else {
    trace!("Removing foreign element");
    tree.remove(node);
    return;
  };
  let tag: &str = &tag;

  if !policy.is_tag_allowed(tag) {
    if policy.drops_content(tag) {
      trace!("Removing <{tag}> with its content");
      tree.remove(node);
    } else {
      trace!("Unwrapping <{tag}>");
      sanitize_children(tree, node, policy);
      tree.unwrap(node);
    }
    return;
  }

  sanitize_attributes(tree, node, policy);

  if tag == "iframe" {
    // Fallback content of an embed is raw text, never markup
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
      tree.remove(&child);
    }
  } else {
    sanitize_children(tree, node, policy);
  }

  match tag {
    "a" => harden_external_link(tree, node),
    "img" => harden_image(tree, node, policy),
    _ if HEADING_TAGS.contains(&tag) => ensure_heading_id(tree, node),
    _ => {},
  }
}

fn sanitize_attributes<T: MutableTree + ?Sized>(
  tree: &T,
  node: &NodeRef,
  policy: &HtmlPolicy,
) {
  for name in attribute_names(node) {
    let keep = policy.is_attribute_allowed(&name)
      && tree.get_attribute(node, &name).is_some_and(|value| {
        if policy.is_uri_attribute(&name) {
          policy.is_uri_allowed(&value)
        } else if name == "id" {
          let id = value.trim();
          !id.is_empty() && !is_clobberable_id(id)
        } else {
          true
        }
      });

    if !keep {
      trace!("Removing attribute '{name}'");
      tree.remove_attribute(node, &name);
    }
  }
}

/// `rel`, `target` and `aria-label` for links leaving the site.
fn harden_external_link<T: MutableTree + ?Sized>(tree: &T, node: &NodeRef) {
  let is_external = tree
    .get_attribute(node, "href")
    .is_some_and(|href| is_external_href(&href));
  if !is_external {
    return;
  }

  let rel = merge_rel(tree.get_attribute(node, "rel").as_deref());
  tree.set_attribute(node, "rel", &rel);
  tree.set_attribute(node, "target", "_blank");

  let label = external_link_label(
    tree.get_attribute(node, "aria-label").as_deref(),
    &node.text_contents(),
  );
  tree.set_attribute(node, "aria-label", &label);
}

fn harden_image<T: MutableTree + ?Sized>(
  tree: &T,
  node: &NodeRef,
  policy: &HtmlPolicy,
) {
  if let Some(src) = tree.get_attribute(node, "src")
    && let Some(upgraded) = upgrade_to_https(&src)
  {
    tree.set_attribute(node, "src", &upgraded);
  }

  if is_blank(tree.get_attribute(node, "loading")) {
    tree.set_attribute(node, "loading", "lazy");
  }
  if is_blank(tree.get_attribute(node, "alt")) {
    tree.set_attribute(node, "alt", policy.default_image_alt());
  }
}

fn ensure_heading_id<T: MutableTree + ?Sized>(tree: &T, node: &NodeRef) {
  if is_blank(tree.get_attribute(node, "id")) {
    let id = heading_id(&normalize_text(&node.text_contents()));
    tree.set_attribute(node, "id", &id);
  }
}

pub(crate) fn is_blank(value: Option<String>) -> bool {
  value.is_none_or(|value| value.trim().is_empty())
}
