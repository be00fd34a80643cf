//! Expose Scribe's command implementations and record store for use in
//! integration tests and the `xtask` crate. The stable API lives in
//! `scribe-html`.
pub mod cli;
pub mod commands;
pub mod error;
pub mod page;
pub mod store;
