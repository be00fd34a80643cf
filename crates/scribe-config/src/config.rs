use std::{
  fs,
  path::{Path, PathBuf},
  sync::OnceLock,
};

use scribe_html::{EnrichmentContext, EnrichmentOptions, HtmlPolicy};
use serde::{Deserialize, Serialize};

use crate::{
  content::{CodeConfig, ContentConfig, ImagesConfig, TablesConfig},
  error::ConfigError,
  policy::PolicyConfig,
};

/// File names searched, in order, in the working directory.
const LOCAL_CONFIG_FILES: [&str; 6] = [
  "scribe.toml",
  "scribe.json",
  ".scribe.toml",
  ".scribe.json",
  ".config/scribe.toml",
  ".config/scribe.json",
];

const DEFAULT_OUTPUT_DIR: &str = "dist";

const DEFAULT_TOML_HEADER: &str = "\
# Scribe configuration
#
# Content is sanitized against the HTML policy below, then enriched with
# heading ids, image and link hardening, table wrappers and code languages.
# Run `scribe policy` to print the effective allow-list.

";

/// Configuration for the Scribe content pipeline.
///
/// [`Config`] holds the adjustments to the HTML policy, the enrichment
/// settings and the batch rendering options. Fields are typically loaded from
/// a TOML or JSON config file, but can also be set via `--config KEY=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// JSON record store read by `render --slug` and `render-all`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub store: Option<PathBuf>,

  /// Output directory for `render-all`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_dir: Option<PathBuf>,

  /// Number of parallel render jobs. Defaults to the number of CPUs.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub jobs: Option<usize>,

  /// HTML allow-list adjustments.
  pub policy: PolicyConfig,

  /// Heading and table of contents settings.
  pub content: ContentConfig,

  pub images: ImagesConfig,

  pub tables: TablesConfig,

  pub code: CodeConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      store:      None,
      output_dir: Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
      jobs:       None,
      policy:     PolicyConfig::default(),
      content:    ContentConfig::default(),
      images:     ImagesConfig::default(),
      tables:     TablesConfig::default(),
      code:       CodeConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from a TOML or JSON file.
  ///
  /// # Arguments
  ///
  /// * `path` - Path to the configuration file.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to read config file: {}: {}",
        path.display(),
        e
      ))
    })?;

    match path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_lowercase)
      .as_deref()
    {
      Some("json") => {
        serde_json::from_str(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse JSON config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      Some("toml") => {
        toml::from_str(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse TOML config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      Some(_) => {
        Err(ConfigError::Config(format!(
          "Unsupported config file format: {}",
          path.display()
        )))
      },
      None => {
        Err(ConfigError::Config(format!(
          "Config file has no extension: {}",
          path.display()
        )))
      },
    }
  }

  /// Load configuration from files and `KEY=VALUE` overrides.
  ///
  /// Explicit config files are merged in order. Without any, a config file is
  /// looked up in the standard locations, and the defaults are used if none
  /// exists. Overrides are applied last, then the result is validated.
  ///
  /// # Errors
  ///
  /// Returns an error if a file cannot be loaded, an override is malformed,
  /// or the resulting configuration is invalid.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = if let Some((first, rest)) = config_files.split_first() {
      let mut merged_config = Self::from_file(first)?;
      for config_path in rest {
        merged_config.merge(Self::from_file(config_path)?);
      }

      if config_files.len() > 1 {
        log::info!("Loaded and merged {} config files", config_files.len());
      }

      merged_config
    } else if let Some(discovered_config) = Self::find_config_file() {
      log::info!(
        "Using discovered config file: {}",
        discovered_config.display()
      );
      Self::from_file(&discovered_config).map_err(|e| {
        ConfigError::Config(format!(
          "Failed to load discovered config from {}: {}",
          discovered_config.display(),
          e
        ))
      })?
    } else {
      log::debug!("No config file found, using defaults");
      Self::default()
    };

    if !config_overrides.is_empty() {
      config.apply_overrides(config_overrides)?;
    }

    config.validate()?;
    Ok(config)
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// Keys are either top-level (`jobs`, `store`, `output_dir`) or
  /// `section.field` (`content.heading_id_prefix`, `policy.extra_tags`, ...).
  /// List values are comma separated and appended.
  ///
  /// # Errors
  ///
  /// Returns an error if:
  ///
  /// - An override string is not in KEY=VALUE format
  /// - A key is not recognized
  /// - A value cannot be parsed as the expected type
  ///
  /// # Example
  ///
  /// ```rust, ignore
  /// config.apply_overrides(&vec![
  ///     "content.heading_id_prefix=post".to_string(),
  ///     "policy.extra_tags=sup,sub".to_string(),
  /// ])?;
  /// ```
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  /// Apply a single override.
  ///
  /// # Errors
  ///
  /// Returns an error if the key is unknown or the value does not parse.
  pub fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    if let Some((section, field)) = key.split_once('.') {
      return match section {
        "policy" => self.policy.apply_override(field, value),
        "content" => self.content.apply_override(field, value),
        "images" => self.images.apply_override(field, value),
        "tables" => self.tables.apply_override(field, value),
        "code" => self.code.apply_override(field, value),
        _ => {
          Err(ConfigError::Config(format!(
            "Unknown configuration key: '{key}'. See documentation for \
             supported keys.",
          )))
        },
      };
    }

    match key {
      "store" => {
        self.store = (!value.is_empty()).then(|| PathBuf::from(value));
      },
      "output_dir" => {
        self.output_dir = (!value.is_empty()).then(|| PathBuf::from(value));
      },
      "jobs" => {
        self.jobs = if value.is_empty() {
          None
        } else {
          Some(parse_positive("jobs", value)?)
        };
      },
      _ => {
        return Err(ConfigError::Config(format!(
          "Unknown configuration key: '{key}'. See documentation for \
           supported keys.",
        )));
      },
    }
    Ok(())
  }

  /// Merge another config into this one, with the other config's values taking
  /// precedence.
  ///
  /// # Merge Rules
  ///
  /// - [`Option<T>`] fields: Other's [`Some`] value replaces this config's
  ///   value
  /// - [`Vec<T>`] fields: Other's vec is appended to this config's vec
  ///
  /// Every scalar setting is an [`Option`], so a file that leaves a key out
  /// never resets what an earlier file set.
  pub fn merge(&mut self, other: Self) {
    if other.store.is_some() {
      self.store = other.store;
    }
    if other.output_dir.is_some() {
      self.output_dir = other.output_dir;
    }
    if other.jobs.is_some() {
      self.jobs = other.jobs;
    }
    self.policy.merge(other.policy);
    self.content.merge(other.content);
    self.images.merge(other.images);
    self.tables.merge(other.tables);
    self.code.merge(other.code);
  }

  /// Output directory for `render-all`, `dist` unless configured.
  #[must_use]
  pub fn output_dir(&self) -> &Path {
    self
      .output_dir
      .as_deref()
      .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR))
  }

  /// Search for config files in common locations
  #[must_use]
  pub fn find_config_file() -> Option<PathBuf> {
    static RESULT: OnceLock<Option<PathBuf>> = OnceLock::new();
    RESULT
      .get_or_init(|| {
        let current_dir = std::env::current_dir().ok()?;
        let xdg_config_home =
          std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
        let home = std::env::var_os("HOME").map(PathBuf::from);
        find_config_file_in(
          &current_dir,
          xdg_config_home.as_deref(),
          home.as_deref(),
        )
      })
      .clone()
  }

  /// Check values that deserialize fine but cannot work.
  ///
  /// # Errors
  ///
  /// Returns an error for zero jobs or an invalid HTML policy.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.jobs == Some(0) {
      return Err(ConfigError::Config(
        "Invalid value for 'jobs': '0'. Expected a positive integer"
          .to_string(),
      ));
    }
    self.build_policy()?;
    Ok(())
  }

  /// Build the HTML policy described by this configuration.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Policy`] if the policy is invalid.
  pub fn build_policy(&self) -> Result<HtmlPolicy, ConfigError> {
    self.policy.build(self.images.default_alt())
  }

  /// Options for constructing the enrichment pipeline.
  #[must_use]
  pub fn enrichment_options(&self) -> EnrichmentOptions {
    EnrichmentOptions {
      include_h1_in_toc:     self.content.include_h1_in_toc(),
      default_image_alt:     self.images.default_alt().trim().to_string(),
      table_wrapper_class:   self.tables.wrapper_class().to_string(),
      default_code_language: self.code.language().map(ToString::to_string),
    }
  }

  /// Per-invocation enrichment context derived from the configuration.
  #[must_use]
  pub fn enrichment_context(&self) -> EnrichmentContext {
    EnrichmentContext {
      heading_id_prefix: self.content.heading_id_prefix.clone(),
      interactive:       false,
    }
  }

  /// Serialize the default configuration in `format` (`toml` or `json`).
  ///
  /// # Errors
  ///
  /// Returns an error for an unknown format or if serialization fails.
  pub fn default_config_content(format: &str) -> Result<String, ConfigError> {
    let config = Self::default();
    match format.to_lowercase().as_str() {
      "toml" => {
        Ok(format!("{DEFAULT_TOML_HEADER}{}", toml::to_string_pretty(&config)?))
      },
      "json" => Ok(serde_json::to_string_pretty(&config)? + "\n"),
      other => {
        Err(ConfigError::Config(format!(
          "Unsupported config format: '{other}'. Expected toml or json"
        )))
      },
    }
  }

  /// Generate a default configuration file
  ///
  /// # Errors
  ///
  /// Returns an error if the format is unknown or the file cannot be written.
  pub fn generate_default_config(
    format: &str,
    path: &Path,
  ) -> Result<(), ConfigError> {
    let config_content = Self::default_config_content(format)?;

    fs::write(path, config_content).map_err(|e| {
      ConfigError::Config(format!(
        "Failed to write default config to {}: {}",
        path.display(),
        e
      ))
    })?;

    log::info!("Created default configuration file: {}", path.display());
    Ok(())
  }
}

/// Look for a config file relative to explicit base directories.
///
/// Checks [`LOCAL_CONFIG_FILES`] in `current_dir`, then `scribe.toml` and
/// `scribe.json` in `xdg_config_home`, then `config.toml` and `config.json`
/// in `home/.config/scribe`.
#[must_use]
pub fn find_config_file_in(
  current_dir: &Path,
  xdg_config_home: Option<&Path>,
  home: Option<&Path>,
) -> Option<PathBuf> {
  let local = LOCAL_CONFIG_FILES
    .iter()
    .map(|filename| current_dir.join(filename));
  let xdg = xdg_config_home.into_iter().flat_map(|dir| {
    ["scribe.toml", "scribe.json"]
      .into_iter()
      .map(move |filename| dir.join(filename))
  });
  let home = home.into_iter().flat_map(|home| {
    let dir = home.join(".config").join("scribe");
    ["config.toml", "config.json"]
      .into_iter()
      .map(move |filename| dir.join(filename))
  });

  local.chain(xdg).chain(home).find(|path| path.is_file())
}

pub(crate) fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
  match value.to_lowercase().as_str() {
    "true" | "yes" | "1" => Ok(true),
    "false" | "no" | "0" => Ok(false),
    _ => {
      Err(ConfigError::Config(format!(
        "Invalid boolean value for '{field}': '{value}'. Expected true/false, \
         yes/no, or 1/0"
      )))
    },
  }
}

pub(crate) fn parse_list(value: &str) -> impl Iterator<Item = String> + '_ {
  value
    .split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(ToString::to_string)
}

fn parse_positive(field: &str, value: &str) -> Result<usize, ConfigError> {
  value
    .parse::<usize>()
    .ok()
    .filter(|n| *n > 0)
    .ok_or_else(|| {
      ConfigError::Config(format!(
        "Invalid value for '{field}': '{value}'. Expected a positive integer"
      ))
    })
}
