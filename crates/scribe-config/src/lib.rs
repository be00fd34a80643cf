pub mod config;
pub mod content;
pub mod error;
pub mod policy;

pub use config::Config;
pub use error::ConfigError;
