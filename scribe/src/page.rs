//! Standalone page wrapper for rendered posts.
use html_escape::{encode_double_quoted_attribute, encode_text};
use scribe_html::{HeadingRecord, Rendered};

/// Head metadata for a standalone page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageMeta<'a> {
  pub title:       &'a str,
  pub description: Option<&'a str>,
}

/// Render the table of contents as a nested-by-indentation list of anchors.
///
/// Returns an empty string when there are no headings.
#[must_use]
pub fn toc_html(headings: &[HeadingRecord]) -> String {
  if headings.is_empty() {
    return String::new();
  }

  let mut html = String::from("<nav class=\"toc\" aria-label=\"Table of contents\"><ul>");
  for heading in headings {
    html.push_str(&format!(
      "<li class=\"toc-h{}\"><a href=\"#{}\">{}</a></li>",
      heading.level,
      encode_double_quoted_attribute(&heading.id),
      encode_text(&heading.text),
    ));
  }
  html.push_str("</ul></nav>");
  html
}

/// Wrap rendered content in a complete HTML document.
#[must_use]
pub fn standalone_page(meta: PageMeta<'_>, rendered: &Rendered) -> String {
  let description = meta
    .description
    .map(|description| {
      format!(
        "\n<meta name=\"description\" content=\"{}\">",
        encode_double_quoted_attribute(description)
      )
    })
    .unwrap_or_default();

  format!(
    r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>{description}
</head>
<body>
{toc}
<article class="prose">
{content}
</article>
</body>
</html>
"#,
    title = encode_text(meta.title),
    toc = toc_html(&rendered.headings),
    content = rendered.html,
  )
}
