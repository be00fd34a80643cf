#![allow(clippy::expect_used, reason = "Fine in tests")]
use std::sync::Arc;

use scribe_html::{
  EnrichmentContext,
  EnrichmentOptions,
  HtmlPolicy,
  LiveDocument,
  MutableTree,
  Renderer,
};

const CONTENT: &[&str] = &[
  "<h2>My Section</h2><p>hi</p>",
  r#"<h2>Intro</h2><p>a <a href="https://ext.com">go</a></p><h2>Intro</h2>"#,
  r#"<img src="http://x.com/a.png"><p><img src="/b.png" alt="Kept"></p>"#,
  "<table><tr><td>v</td></tr></table><pre><code>let a;</code></pre>",
  "<script>alert(1)</script><p onclick=\"x()\">safe</p><section><p>s</p></section>",
  "<p><section><table><tr><td>x</td></tr></table></section></p>",
];

fn page(article: &str) -> String {
  format!(
    concat!(
      "<!DOCTYPE html><html><head><title>Blog</title></head><body>",
      "<nav><a href=\"https://elsewhere.example\">Elsewhere</a></nav>",
      "<article id=\"post\">{}</article>",
      "<footer><img src=\"/logo.png\"></footer>",
      "</body></html>",
    ),
    article
  )
}

#[test]
fn test_pre_render_and_post_mount_agree() {
  let renderer = Renderer::default();
  for ctx in [
    EnrichmentContext::new(),
    EnrichmentContext::new().with_heading_id_prefix("p1-"),
  ] {
    for content in CONTENT {
      let pre = renderer.pre_render(content, &ctx);

      let document = LiveDocument::parse(&page(""));
      let subtree = document.subtree("#post").expect("container exists");
      let headings = renderer.post_mount(&subtree, content, &ctx);

      assert_eq!(subtree.inner_html(), pre.html, "content: {content}");
      assert_eq!(headings, pre.headings, "content: {content}");
    }
  }
}

#[test]
fn test_post_mount_over_pre_render_is_a_no_op() {
  let renderer = Renderer::default();
  for content in CONTENT {
    let pre = renderer.pre_render(content, &EnrichmentContext::new());
    let document = LiveDocument::parse(&page(&pre.html));
    let before = document.to_html();

    let subtree = document.subtree("#post").expect("container exists");
    let first_child = subtree.container().first_child();
    let headings =
      renderer.post_mount(&subtree, content, &EnrichmentContext::live());

    assert_eq!(subtree.mutation_count(), 0, "content: {content}");
    assert_eq!(subtree.container().first_child(), first_child);
    assert_eq!(document.to_html(), before);
    assert_eq!(headings, pre.headings);
  }
}

#[test]
fn test_post_mount_leaves_the_page_alone() {
  let document = LiveDocument::parse(&page(""));
  let nav = document
    .document()
    .select_first("nav")
    .expect("nav exists")
    .as_node()
    .clone();
  let footer_img = document
    .document()
    .select_first("footer img")
    .expect("footer image exists")
    .as_node()
    .clone();

  let subtree = document.subtree("#post").expect("container exists");
  Renderer::default().post_mount(
    &subtree,
    r#"<h2>Title</h2><img src="/a.png"><a href="https://x.com">x</a>"#,
    &EnrichmentContext::live(),
  );

  let nav_anchor = nav.first_child().expect("nav has a link");
  assert_eq!(subtree.get_attribute(&nav_anchor, "target"), None);
  assert_eq!(subtree.get_attribute(&footer_img, "loading"), None);
  assert_eq!(
    document
      .document()
      .select_first("nav")
      .expect("nav still exists")
      .as_node(),
    &nav
  );
  assert!(subtree.inner_html().starts_with(r#"<h2 id="title">Title</h2>"#));
}

#[test]
fn test_live_tables_with_embeds_stay_put() {
  let content = r#"<table><tbody><tr><td><iframe src="https://x.com/e"></iframe></td></tr></tbody></table>"#;
  let document = LiveDocument::parse(&page(content));
  let subtree = document.subtree("#post").expect("container exists");
  let table = subtree.query_all(&["table"])[0].clone();

  Renderer::default().post_mount(&subtree, "", &EnrichmentContext::live());

  assert_eq!(subtree.mutation_count(), 0);
  assert_eq!(subtree.query_all(&["table"])[0], table);
  assert_eq!(subtree.inner_html(), content);
}

#[test]
fn test_renderer_is_shareable_across_threads() {
  let renderer = Arc::new(Renderer::with_options(
    Arc::new(HtmlPolicy::default()),
    &EnrichmentOptions::default(),
  ));

  let handles: Vec<_> = (0..4)
    .map(|i| {
      let renderer = Arc::clone(&renderer);
      std::thread::spawn(move || {
        renderer
          .pre_render(&format!("<h2>Part {i}</h2>"), &EnrichmentContext::new())
          .headings
      })
    })
    .collect();

  for (i, handle) in handles.into_iter().enumerate() {
    let headings = handle.join().expect("render thread panicked");
    assert_eq!(headings[0].id, format!("part-{i}"));
  }
}
