use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while reading a record store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Failed to read store {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to parse store {}: {source}", path.display())]
  Parse {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Collection '{0}' is not an array of records")]
  NotACollection(&'static str),

  #[error("Invalid record in '{collection}': {source}")]
  InvalidRecord {
    collection: &'static str,
    #[source]
    source:     serde_json::Error,
  },
}
