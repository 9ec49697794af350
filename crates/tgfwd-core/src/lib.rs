//! Core of the Telegram forwarder: jobs, keyword filtering, runners and
//! their supervisor, the audit log and the operator shell.
//!
//! Platform access lives behind [`messaging::port::ChatPlatform`], implemented
//! in the adapter crate.

pub mod audit;
pub mod config;
pub mod context;
pub mod credentials;
pub mod daemon;
pub mod dialogs;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod jobs;
pub mod logging;
pub mod messaging;
pub mod runner;
pub mod shell;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
