use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate_to};
use clap_mangen::Man;
use scribe::cli::Cli;
use scribe_config::Config;

const BIN_NAME: &str = "scribe";

#[derive(Parser)]
#[command(author, version, about)]
struct Xtask {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every distribution artifact for the scribe CLI
  Dist {
    /// Output directory for generated files.
    #[arg(short, long, default_value = "dist")]
    output_dir: PathBuf,
  },

  /// Generate shell completions only.
  Completions {
    #[arg(short, long, default_value = "dist/completions")]
    output_dir: PathBuf,

    /// Shells to generate for. All supported shells when omitted.
    #[arg(short, long, value_enum)]
    shell: Vec<Shell>,
  },

  /// Generate the manpage only.
  Manpage {
    #[arg(short, long, default_value = "dist/man")]
    output_dir: PathBuf,
  },

  /// Write the default configuration in every supported format.
  SampleConfig {
    #[arg(short, long, default_value = "dist/config")]
    output_dir: PathBuf,
  },
}

fn main() -> Result<()> {
  match Xtask::parse().command {
    Commands::Dist { output_dir } => {
      generate_completions(&output_dir.join("completions"), &[])?;
      generate_manpage(&output_dir.join("man"))?;
      generate_sample_configs(&output_dir.join("config"))?;
    },
    Commands::Completions { output_dir, shell } => {
      generate_completions(&output_dir, &shell)?;
    },
    Commands::Manpage { output_dir } => generate_manpage(&output_dir)?,
    Commands::SampleConfig { output_dir } => {
      generate_sample_configs(&output_dir)?;
    },
  }

  Ok(())
}

fn generate_completions(dir: &Path, shells: &[Shell]) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("Failed to create {}", dir.display()))?;

  let shells = if shells.is_empty() {
    Shell::value_variants()
  } else {
    shells
  };

  let mut cmd = Cli::command();
  for shell in shells {
    let path = generate_to(*shell, &mut cmd, BIN_NAME, dir)
      .with_context(|| format!("Failed to generate {shell} completions"))?;
    println!("Generated {}", path.display());
  }
  Ok(())
}

fn generate_manpage(dir: &Path) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("Failed to create {}", dir.display()))?;

  let file_path = dir.join(format!("{BIN_NAME}.1"));
  let mut file = fs::File::create(&file_path).with_context(|| {
    format!("Failed to create manpage file at {}", file_path.display())
  })?;
  Man::new(Cli::command())
    .render(&mut file)
    .context("Failed to render manpage")?;

  println!("Generated {}", file_path.display());
  Ok(())
}

fn generate_sample_configs(dir: &Path) -> Result<()> {
  fs::create_dir_all(dir)
    .with_context(|| format!("Failed to create {}", dir.display()))?;

  for format in ["toml", "json"] {
    let path = dir.join(format!("{BIN_NAME}.{format}"));
    Config::generate_default_config(format, &path)
      .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Generated {}", path.display());
  }
  Ok(())
}
