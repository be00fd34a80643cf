#![allow(clippy::expect_used, reason = "Fine in tests")]
use scribe_html::{
  DetachedFragment,
  EnrichmentContext,
  EnrichmentOptions,
  EnrichmentPipeline,
  HeadingRecord,
  HtmlPolicy,
  MutableTree,
  Renderer,
  render,
  tree::attribute_names,
  utils::slugify,
};

const POSTS: &[&str] = &[
  "<h2>My Section</h2><p>hi</p>",
  r#"<h1>Title</h1><h2>Intro</h2><p>a</p><h2>Intro</h2><h3>Intro</h3>"#,
  r#"<p>See <a href="https://ext.com">go</a> and <a href="/local">here</a></p>"#,
  r#"<img src="http://x.com/a.png"><img src="/b.png" alt="Kept alt">"#,
  "<table><tr><th>k</th></tr><tr><td>v</td></tr></table>",
  r#"<div class="overflow-x-auto"><table><tbody><tr><td>1</td></tr></tbody></table></div>"#,
  "<pre><code>const x = 1;</code></pre><pre><code class=\"language-rust\">fn main() {}</code></pre>",
  r#"<p><iframe src="https://www.youtube.com/embed/abc" allowfullscreen></iframe></p>"#,
  "<section><h2>Nested <em>heading</em></h2><blockquote>q</blockquote></section>",
  r#"<p id="intro">anchor</p><h2>Intro</h2>"#,
  "<h2>Cookie</h2><h2></h2><h2>!!!</h2>",
  "<p>unclosed <strong>bold<p>next",
  "<a href=\"ht&#9;tps://evil.example\">x</a><img src=\"ht&#10;tp://x.com/a.png\">",
];

fn attribute(html: &str, tag: &str, index: usize, name: &str) -> Option<String> {
  let fragment = DetachedFragment::parse(html);
  let node = fragment.query_all(&[tag]).get(index).cloned()?;
  fragment.get_attribute(&node, name)
}

fn record(id: &str, text: &str, level: u8) -> HeadingRecord {
  HeadingRecord {
    id: id.to_string(),
    text: text.to_string(),
    level,
  }
}

#[test]
fn test_pipeline_is_idempotent() {
  let pipeline = EnrichmentPipeline::default();
  for ctx in [
    EnrichmentContext::new(),
    EnrichmentContext::new().with_heading_id_prefix("post-"),
  ] {
    for post in POSTS {
      let first = render(post, &ctx);

      let again = pipeline.enrich(&first.html, &ctx);
      assert_eq!(again.html, first.html, "enrich not stable for {post}");
      assert_eq!(again.headings, first.headings);

      let rerendered = render(&first.html, &ctx);
      assert_eq!(rerendered.html, first.html, "render not stable for {post}");
      assert_eq!(rerendered.headings, first.headings);
    }
  }
}

#[test]
fn test_external_links_are_hardened() {
  let rendered = render(
    r#"<a href="https://ext.com" rel="author">go</a><a href="HTTP://ext.com/x">x</a>"#,
    &EnrichmentContext::new(),
  );
  for index in 0..2 {
    assert_eq!(
      attribute(&rendered.html, "a", index, "target").as_deref(),
      Some("_blank")
    );
    let rel = attribute(&rendered.html, "a", index, "rel").expect("rel set");
    for token in ["noopener", "noreferrer", "nofollow"] {
      assert!(rel.split(' ').any(|t| t == token), "{rel}");
    }
  }
  assert!(
    attribute(&rendered.html, "a", 0, "rel")
      .is_some_and(|rel| rel.starts_with("author "))
  );
}

#[test]
fn test_links_with_url_whitespace_are_hardened() {
  let rendered = render(
    "<p><a href=\"ht&#9;tps://evil.example\">x</a><a href=\" h&#13;ttp://ext.com\">y</a></p><img src=\"ht&#10;tp://x.com/a.png\">",
    &EnrichmentContext::new(),
  );
  for index in 0..2 {
    assert_eq!(
      attribute(&rendered.html, "a", index, "target").as_deref(),
      Some("_blank")
    );
    assert_eq!(
      attribute(&rendered.html, "a", index, "rel").as_deref(),
      Some("noopener noreferrer nofollow")
    );
  }
  assert_eq!(
    attribute(&rendered.html, "img", 0, "src").as_deref(),
    Some("https://x.com/a.png")
  );
}

#[test]
fn test_images_get_defaults() {
  let rendered = render(
    r#"<img src="/a.png"><img src="/b.png" alt="A red bicycle"><img src="/c.png" alt="">"#,
    &EnrichmentContext::new(),
  );
  let alts: Vec<_> = (0..3)
    .map(|i| attribute(&rendered.html, "img", i, "alt"))
    .collect();
  assert_eq!(alts, [
    Some("Blog post image".to_string()),
    Some("A red bicycle".to_string()),
    Some("Blog post image".to_string()),
  ]);
  for i in 0..3 {
    assert_eq!(
      attribute(&rendered.html, "img", i, "loading").as_deref(),
      Some("lazy")
    );
  }
}

#[test]
fn test_heading_ids_are_deterministic_and_unique() {
  assert_eq!(slugify("Hello, World!"), "hello-world");

  let input = "<h2>Intro</h2><h2>Intro</h2><h2>Intro</h2>";
  let first = render(input, &EnrichmentContext::new());
  let second = render(input, &EnrichmentContext::new());
  assert_eq!(first, second);

  let ids: Vec<&str> = first.headings.iter().map(|h| h.id.as_str()).collect();
  assert_eq!(ids, ["intro", "intro-2", "intro-3"]);
}

#[test]
fn test_heading_prefix_is_prepended_verbatim() {
  let rendered = render(
    "<h2>My Section</h2><h2>A Note</h2><h2>Note</h2>",
    &EnrichmentContext::new().with_heading_id_prefix("post-"),
  );
  let ids: Vec<&str> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
  assert_eq!(ids, ["post-my-section", "post-a-note", "post-note"]);

  let rendered = render(
    "<h2>A Note</h2><h2>Note</h2>",
    &EnrichmentContext::new().with_heading_id_prefix("a"),
  );
  let ids: Vec<&str> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
  assert_eq!(ids, ["aa-note", "anote"]);
}

#[test]
fn test_degenerate_headings_get_ids() {
  let rendered = render("<h2>Cookie</h2><h2></h2><h2>!!!</h2>", &EnrichmentContext::new());
  assert_eq!(rendered.headings, [
    record("cookie-section", "Cookie", 2),
    record("section", "", 2),
    record("section-2", "!!!", 2),
  ]);
}

#[test]
fn test_table_wrap_twice_yields_one_wrapper() {
  let once = render(
    "<table><tr><td>1</td></tr></table><table><tr><td>2</td></tr></table>",
    &EnrichmentContext::new(),
  );
  let pipeline = EnrichmentPipeline::default();
  let twice = pipeline.enrich(&once.html, &EnrichmentContext::new());
  assert_eq!(twice.html, once.html);
  assert_eq!(twice.html.matches("overflow-x-auto").count(), 2);
  assert!(!twice.html.contains(r#"<div class="overflow-x-auto"><div"#));
}

#[test]
fn test_scenario_a_heading_extraction() {
  let rendered = render("<h2>My Section</h2><p>hi</p>", &EnrichmentContext::new());
  assert_eq!(
    rendered.html,
    r#"<h2 id="my-section">My Section</h2><p>hi</p>"#
  );
  assert_eq!(rendered.headings, [record("my-section", "My Section", 2)]);
}

#[test]
fn test_scenario_b_image_hardening() {
  let rendered = render(r#"<img src="http://x.com/a.png">"#, &EnrichmentContext::new());
  let fragment = DetachedFragment::parse(&rendered.html);
  let img = &fragment.query_all(&["img"])[0];

  let mut names = attribute_names(img);
  names.sort();
  assert_eq!(names, ["alt", "loading", "src"]);
  assert_eq!(
    fragment.get_attribute(img, "src").as_deref(),
    Some("https://x.com/a.png")
  );
  assert_eq!(fragment.get_attribute(img, "loading").as_deref(), Some("lazy"));
  assert_eq!(
    fragment.get_attribute(img, "alt").as_deref(),
    Some("Blog post image")
  );
}

#[test]
fn test_scenario_c_link_hardening() {
  let rendered = render(r#"<a href="https://ext.com">go</a>"#, &EnrichmentContext::new());
  assert_eq!(
    attribute(&rendered.html, "a", 0, "target").as_deref(),
    Some("_blank")
  );
  assert_eq!(
    attribute(&rendered.html, "a", 0, "rel").as_deref(),
    Some("noopener noreferrer nofollow")
  );
  assert_eq!(
    attribute(&rendered.html, "a", 0, "aria-label").as_deref(),
    Some("go (Opens in new window)")
  );
}

#[test]
fn test_scenario_d_script_removal() {
  let rendered = render("<script>alert(1)</script><p>safe</p>", &EnrichmentContext::new());
  assert_eq!(rendered.html, "<p>safe</p>");
  assert!(rendered.headings.is_empty());
}

#[test]
fn test_scenario_e_wrapped_table() {
  let input = r#"<div class="overflow-x-auto"><table><tbody><tr><td>1</td></tr></tbody></table></div>"#;
  let rendered = render(input, &EnrichmentContext::new());
  assert_eq!(rendered.html, input);
}

#[test]
fn test_code_blocks_default_language() {
  let rendered = render(
    "<pre><code>const x = 1;</code></pre><p><code>inline</code></p>",
    &EnrichmentContext::new(),
  );
  assert_eq!(
    rendered.html,
    r#"<pre><code class="language-javascript">const x = 1;</code></pre><p><code>inline</code></p>"#
  );
}

#[test]
fn test_options_shape_the_pipeline() {
  let options = EnrichmentOptions {
    include_h1_in_toc:     true,
    default_image_alt:     "Illustration".to_string(),
    table_wrapper_class:   "table-scroll".to_string(),
    default_code_language: None,
  };
  let policy = HtmlPolicy::builder()
    .default_image_alt("Illustration")
    .build()
    .expect("valid policy");
  let renderer = Renderer::with_options(policy.into(), &options);

  let rendered = renderer.pre_render(
    "<h1>Top</h1><img src=\"/a.png\"><table></table><pre><code>x</code></pre>",
    &EnrichmentContext::new(),
  );

  assert_eq!(rendered.headings, [record("top", "Top", 1)]);
  assert_eq!(attribute(&rendered.html, "img", 0, "alt").as_deref(), Some("Illustration"));
  assert!(rendered.html.contains(r#"<div class="table-scroll"><table></table></div>"#));
  assert!(rendered.html.contains("<pre><code>x</code></pre>"));
}
