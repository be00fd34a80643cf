use color_eyre::eyre::{Result, bail};
use log::info;
use scribe::{
  cli::{Cli, Commands},
  commands::{self, RenderOptions},
};
use scribe_config::Config;

fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse_args();

  // Initialize logging first so we can log during command handling
  env_logger::Builder::new()
    .filter_level(cli.verbose.log_level_filter())
    .write_style(env_logger::WriteStyle::Auto)
    .init();

  // Init must work even when an existing config file is broken
  if let Commands::Init {
    output,
    format,
    force,
  } = &cli.command
  {
    return commands::init(output, format, *force);
  }

  let mut config = Config::load(&cli.config_files, &cli.config_overrides)?;

  match cli.command {
    Commands::Init { .. } => Ok(()),

    Commands::Sanitize { io } => commands::sanitize(&config, &io),

    Commands::Render {
      io,
      slug,
      store,
      prefix,
      include_h1,
      toc,
      standalone,
    } => {
      if store.is_some() {
        config.store = store;
      }
      if prefix.is_some() {
        config.content.heading_id_prefix = prefix;
      }
      if include_h1 {
        config.content.include_h1_in_toc = Some(true);
      }

      let rendered = commands::render(&config, &RenderOptions {
        io,
        slug,
        toc,
        standalone,
      })?;
      info!("Extracted {} headings", rendered.headings.len());
      Ok(())
    },

    Commands::RenderAll {
      store,
      output_dir,
      jobs,
      standalone,
    } => {
      if store.is_some() {
        config.store = store;
      }
      if let Some(output_dir) = output_dir {
        config.output_dir = Some(output_dir);
      }
      if jobs.is_some() {
        config.jobs = jobs;
      }
      config.validate()?;

      let renderer = commands::build_renderer(&config)?;
      let store = commands::open_store(&config)?;
      let summary = commands::render_all(
        &renderer,
        &config.enrichment_context(),
        &store,
        config.output_dir(),
        config.jobs.unwrap_or_else(num_cpus::get),
        standalone,
      )?;

      if summary.skipped > 0 {
        info!("Skipped {} posts", summary.skipped);
      }
      Ok(())
    },

    Commands::Policy { format } => commands::policy(&config, &format),

    Commands::Check { inputs, store } => {
      let failures = commands::check(&config, &inputs, store.as_deref())?;
      if !failures.is_empty() {
        bail!(
          "{} documents are not fixed points: {}",
          failures.len(),
          failures.join(", ")
        );
      }
      info!("All documents are fixed points");
      Ok(())
    },
  }
}
