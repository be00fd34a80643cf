use std::io;

use scribe_html::PolicyError;
use thiserror::Error;

/// Error type for scribe-config operations
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Invalid HTML policy: {0}")]
  Policy(#[from] PolicyError),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Serde error: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("TOML error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("TOML serialization error: {0}")]
  TomlSerialize(#[from] toml::ser::Error),
}
