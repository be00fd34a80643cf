//! Command implementations, separate from argument parsing so they can be
//! driven from tests.
use std::{
  collections::HashSet,
  fs,
  io::{self, Read, Write},
  path::{Path, PathBuf},
  sync::Arc,
};

use color_eyre::eyre::{Context, Result, bail, eyre};
use log::{debug, info, warn};
use rayon::prelude::*;
use scribe_config::Config;
use scribe_html::{EnrichmentContext, LiveDocument, Renderer, Rendered};

use crate::{
  cli::IoArgs,
  page::{PageMeta, standalone_page},
  store::{JsonStore, Post, RecordStore, is_valid_slug},
};

/// Build the renderer described by `config`.
///
/// # Errors
///
/// Returns an error if the configured policy is invalid.
pub fn build_renderer(config: &Config) -> Result<Renderer> {
  let policy = config
    .build_policy()
    .wrap_err("Failed to build the HTML policy")?;
  let renderer =
    Renderer::with_options(Arc::new(policy), &config.enrichment_options());
  debug!(
    "Enrichment passes: {}",
    renderer.pipeline().pass_names().join(", ")
  );
  Ok(renderer)
}

fn is_stdio(path: Option<&Path>) -> bool {
  path.is_none_or(|path| path.as_os_str() == "-")
}

/// Read a whole input file, or stdin for `None` and `-`.
///
/// # Errors
///
/// Returns an error if the input cannot be read.
pub fn read_input(path: Option<&Path>) -> Result<String> {
  match path {
    Some(path) if !is_stdio(Some(path)) => {
      fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read input: {}", path.display()))
    },
    _ => {
      let mut content = String::new();
      io::stdin()
        .read_to_string(&mut content)
        .wrap_err("Failed to read stdin")?;
      Ok(content)
    },
  }
}

/// Write `content` to a file, or stdout for `None` and `-`.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
  match path {
    Some(path) if !is_stdio(Some(path)) => {
      if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
      {
        fs::create_dir_all(parent).wrap_err_with(|| {
          format!("Failed to create directory: {}", parent.display())
        })?;
      }
      fs::write(path, content)
        .wrap_err_with(|| format!("Failed to write output: {}", path.display()))
    },
    _ => {
      let mut stdout = io::stdout().lock();
      stdout.write_all(content.as_bytes())?;
      if !content.ends_with('\n') {
        stdout.write_all(b"\n")?;
      }
      stdout.flush()?;
      Ok(())
    },
  }
}

/// Write a default configuration file.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is not set, or if it
/// cannot be written.
pub fn init(output: &Path, format: &str, force: bool) -> Result<()> {
  if output.exists() && !force {
    bail!(
      "Configuration file already exists: {}. Use --force to overwrite.",
      output.display()
    );
  }

  if let Some(parent) = output.parent()
    && !parent.as_os_str().is_empty()
    && !parent.exists()
  {
    fs::create_dir_all(parent).wrap_err_with(|| {
      format!("Failed to create directory: {}", parent.display())
    })?;
    info!("Created directory: {}", parent.display());
  }

  Config::generate_default_config(format, output).wrap_err_with(|| {
    format!("Failed to generate configuration file: {}", output.display())
  })?;

  info!(
    "Configuration file created successfully. Edit it to adjust the HTML \
     policy and enrichment."
  );
  Ok(())
}

/// Sanitize without enrichment.
///
/// # Errors
///
/// Returns an error on I/O failure or an invalid policy.
pub fn sanitize(config: &Config, io: &IoArgs) -> Result<()> {
  let renderer = build_renderer(config)?;
  let raw = read_input(io.input.as_deref())?;
  write_output(io.output.as_deref(), &renderer.sanitize(&raw))
}

/// Options of a single render.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
  pub io:         IoArgs,
  pub slug:       Option<String>,
  pub toc:        Option<PathBuf>,
  pub standalone: bool,
}

/// Render one document from a file, stdin, or the store.
///
/// # Errors
///
/// Returns an error on I/O failure, an invalid policy, or an unknown slug.
pub fn render(config: &Config, options: &RenderOptions) -> Result<Rendered> {
  let renderer = build_renderer(config)?;
  let ctx = config.enrichment_context();

  let (raw, post) = if let Some(slug) = &options.slug {
    let store = open_store(config)?;
    let post = store
      .post_by_slug(slug)?
      .ok_or_else(|| eyre!("No post with slug '{slug}' in the store"))?;
    if !post.is_published() {
      warn!("Post '{slug}' is not published");
    }
    (post.content.clone(), Some(post))
  } else {
    (read_input(options.io.input.as_deref())?, None)
  };

  let rendered = renderer.pre_render(&raw, &ctx);

  let html = if options.standalone {
    let title = post.as_ref().map_or_else(
      || {
        rendered
          .headings
          .first()
          .map_or("Untitled", |heading| heading.text.as_str())
      },
      Post::page_title,
    );
    standalone_page(
      PageMeta {
        title,
        description: post
          .as_ref()
          .and_then(|post| post.meta_description.as_deref()),
      },
      &rendered,
    )
  } else {
    rendered.html.clone()
  };

  write_output(options.io.output.as_deref(), &html)?;

  if let Some(toc) = &options.toc {
    let json = serde_json::to_string_pretty(&rendered.headings)?;
    write_output(Some(toc), &json)?;
  }

  Ok(rendered)
}

/// Outcome of a batch render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
  /// Slugs written, in store order.
  pub rendered: Vec<String>,
  /// Unpublished posts, posts whose slug is not a safe file name and posts
  /// with a duplicate slug.
  pub skipped:  usize,
}

/// Render every published post into `output_dir` in parallel.
///
/// Each post produces `<slug>.html` and `<slug>.toc.json`. Posts without a
/// valid slug, or whose slug an earlier post already uses, are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if the store cannot be read, the thread pool cannot be
/// built, or an output file cannot be written.
pub fn render_all<S: RecordStore>(
  renderer: &Renderer,
  ctx: &EnrichmentContext,
  store: &S,
  output_dir: &Path,
  jobs: usize,
  standalone: bool,
) -> Result<RenderSummary> {
  let posts = store.posts()?;
  let total = posts.len();

  // Output files are named by slug, the first post in store order keeps it
  let mut seen = HashSet::new();
  let publishable: Vec<Post> = posts
    .into_iter()
    .filter(|post| {
      if !post.is_published() {
        debug!("Skipping unpublished post '{}'", post.slug);
        return false;
      }
      if !is_valid_slug(&post.slug) {
        warn!("Skipping post '{}' with invalid slug '{}'", post.title, post.slug);
        return false;
      }
      if !seen.insert(post.slug.clone()) {
        warn!(
          "Skipping post '{}': slug '{}' is already taken by an earlier post",
          post.title, post.slug
        );
        return false;
      }
      true
    })
    .collect();

  fs::create_dir_all(output_dir).wrap_err_with(|| {
    format!("Failed to create output directory: {}", output_dir.display())
  })?;

  let pool = rayon::ThreadPoolBuilder::new()
    .num_threads(jobs)
    .build()
    .wrap_err("Failed to build render thread pool")?;

  let rendered = pool.install(|| {
    publishable
      .par_iter()
      .map(|post| render_post(renderer, ctx, post, output_dir, standalone))
      .collect::<Result<Vec<_>>>()
  })?;

  info!(
    "Rendered {} of {} posts into {}",
    rendered.len(),
    total,
    output_dir.display()
  );

  Ok(RenderSummary {
    skipped: total - rendered.len(),
    rendered,
  })
}

fn render_post(
  renderer: &Renderer,
  ctx: &EnrichmentContext,
  post: &Post,
  output_dir: &Path,
  standalone: bool,
) -> Result<String> {
  let rendered = renderer.pre_render(&post.content, ctx);

  let html = if standalone {
    standalone_page(
      PageMeta {
        title:       post.page_title(),
        description: post.meta_description.as_deref(),
      },
      &rendered,
    )
  } else {
    rendered.html.clone()
  };

  let html_path = output_dir.join(format!("{}.html", post.slug));
  fs::write(&html_path, html)
    .wrap_err_with(|| format!("Failed to write {}", html_path.display()))?;

  let toc_path = output_dir.join(format!("{}.toc.json", post.slug));
  fs::write(&toc_path, serde_json::to_string_pretty(&rendered.headings)?)
    .wrap_err_with(|| format!("Failed to write {}", toc_path.display()))?;

  debug!("Rendered post '{}'", post.slug);
  Ok(post.slug.clone())
}

/// Print the effective policy.
///
/// # Errors
///
/// Returns an error for an invalid policy or an unknown format.
pub fn policy(config: &Config, format: &str) -> Result<()> {
  let policy = config.build_policy()?;
  let output = match format {
    "json" => serde_json::to_string_pretty(&policy)?,
    "toml" => toml::to_string_pretty(&policy)?,
    other => bail!("Unsupported policy format: '{other}'"),
  };
  write_output(None, &output)
}

/// Why content is not a fixed point of rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedPointViolation {
  /// Rendering the rendered output changed it.
  Rerender,
  /// Hydrating the rendered output mutated the tree.
  PostMount { mutations: usize },
}

/// Check that rendered output survives another render and a post-mount pass
/// unchanged.
#[must_use]
pub fn check_fixed_point(
  renderer: &Renderer,
  ctx: &EnrichmentContext,
  raw: &str,
) -> Option<FixedPointViolation> {
  let once = renderer.pre_render(raw, ctx);
  let twice = renderer.pre_render(&once.html, ctx);
  if once != twice {
    return Some(FixedPointViolation::Rerender);
  }

  let document = LiveDocument::parse(&format!(
    "<html><body><article id=\"content\">{}</article></body></html>",
    once.html
  ));
  let subtree = document.subtree("#content")?;
  let live_ctx = EnrichmentContext {
    interactive: true,
    ..ctx.clone()
  };
  renderer.post_mount(&subtree, raw, &live_ctx);

  let mutations = subtree.mutation_count();
  (mutations > 0).then_some(FixedPointViolation::PostMount { mutations })
}

/// Check files (or stdin) and, optionally, every post of a store.
///
/// Returns the names of the inputs that are not fixed points.
///
/// # Errors
///
/// Returns an error if an input or the store cannot be read.
pub fn check(
  config: &Config,
  inputs: &[PathBuf],
  store: Option<&Path>,
) -> Result<Vec<String>> {
  let renderer = build_renderer(config)?;
  let ctx = config.enrichment_context();

  let mut documents = Vec::new();
  if inputs.is_empty() && store.is_none() {
    documents.push(("<stdin>".to_string(), read_input(None)?));
  }
  for input in inputs {
    documents.push((
      input.display().to_string(),
      read_input(Some(input.as_path()))?,
    ));
  }
  if let Some(store) = store {
    let store = JsonStore::open(store)?;
    for post in store.posts()? {
      documents.push((format!("post '{}'", post.slug), post.content));
    }
  }

  let failures: Vec<String> = documents
    .par_iter()
    .filter_map(|(name, raw)| {
      let violation = check_fixed_point(&renderer, &ctx, raw)?;
      warn!("{name} is not a fixed point: {violation:?}");
      Some(name.clone())
    })
    .collect();

  info!(
    "Checked {} documents, {} failed",
    documents.len(),
    failures.len()
  );
  Ok(failures)
}

/// Open the store configured by `store`.
///
/// # Errors
///
/// Returns an error if no store is configured or it cannot be read.
pub fn open_store(config: &Config) -> Result<JsonStore> {
  let path = config.store.as_deref().ok_or_else(|| {
    eyre!("No record store configured. Pass --store or set `store`.")
  })?;
  Ok(JsonStore::open(path)?)
}
