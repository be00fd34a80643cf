use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

/// Command line interface for scribe
#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Scribe: sanitize and enrich stored blog content"
)]
pub struct Cli {
  /// Subcommand to execute (see [`Commands`])
  #[command(subcommand)]
  pub command: Commands,

  #[command(flatten)]
  pub verbose: Verbosity<InfoLevel>,

  /// Path to configuration file(s) (TOML or JSON, can be specified multiple
  /// times) Multiple files are merged in order, with later files overriding
  /// earlier ones
  #[arg(short = 'c', long = "config-file", global = true, action = clap::ArgAction::Append)]
  pub config_files: Vec<PathBuf>,

  /// Override configuration values (KEY=VALUE format, can be used multiple
  /// times)
  #[arg(long = "config", global = true, action = clap::ArgAction::Append)]
  pub config_overrides: Vec<String>,
}

/// Where content comes from and where it goes.
#[derive(Args, Debug, Clone, Default)]
pub struct IoArgs {
  /// Input HTML file. Reads stdin when omitted or `-`.
  pub input: Option<PathBuf>,

  /// Output file. Writes to stdout when omitted or `-`.
  #[arg(short, long)]
  pub output: Option<PathBuf>,
}

/// All supported subcommands for the scribe CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Initialize a new Scribe configuration file
  Init {
    /// Path to create the configuration file at
    #[arg(short, long, default_value = "scribe.toml")]
    output: PathBuf,

    /// Format of the configuration file.
    #[arg(short = 'F', long, default_value = "toml", value_parser = ["toml", "json"])]
    format: String,

    /// Force overwrite if file already exists
    #[arg(short, long)]
    force: bool,
  },

  /// Sanitize HTML against the configured policy, without enrichment.
  Sanitize {
    #[command(flatten)]
    io: IoArgs,
  },

  /// Sanitize and enrich HTML the way a post page renders it.
  Render {
    #[command(flatten)]
    io: IoArgs,

    /// Render the post with this slug from the record store instead of an
    /// input file.
    #[arg(short, long, conflicts_with = "input")]
    slug: Option<String>,

    /// JSON record store to read posts from. Overrides `store`.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Prefix for heading ids. Overrides `content.heading_id_prefix`.
    #[arg(short = 'P', long)]
    prefix: Option<String>,

    /// Include `h1` headings in the table of contents.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    include_h1: bool,

    /// Write the extracted table of contents as JSON to this file.
    #[arg(long)]
    toc: Option<PathBuf>,

    /// Wrap the output in a standalone HTML page.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    standalone: bool,
  },

  /// Render every published post of a record store into a directory.
  RenderAll {
    /// JSON record store to read posts from. Overrides `store`.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Output directory. Overrides `output_dir`.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of threads to use for parallel rendering.
    #[arg(short = 'p', long = "jobs")]
    jobs: Option<usize>,

    /// Wrap each post in a standalone HTML page.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    standalone: bool,
  },

  /// Print the effective HTML policy.
  Policy {
    /// Output format.
    #[arg(short = 'F', long, default_value = "json", value_parser = ["json", "toml"])]
    format: String,
  },

  /// Verify that rendering is a fixed point for the given content.
  Check {
    /// HTML files to check. Reads stdin when empty.
    inputs: Vec<PathBuf>,

    /// Check every post of this record store as well.
    #[arg(long)]
    store: Option<PathBuf>,
  },
}

impl Cli {
  /// Parse command line arguments into a [`Cli`] struct.
  #[must_use]
  pub fn parse_args() -> Self {
    Self::parse()
  }
}
