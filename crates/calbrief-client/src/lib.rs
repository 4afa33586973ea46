//! CLI, configuration, delivery and the digest pipeline
//!
//! This crate provides the `calbrief` command-line interface.

pub mod cli;
pub mod config;
pub mod error;
pub mod messenger;
pub mod pipeline;
pub mod secret;

pub use cli::Cli;
pub use config::DigestConfig;
pub use error::{ClientError, ClientResult};
pub use messenger::{DeliveryReceipt, Messenger, MessengerError};
pub use pipeline::DigestPipeline;
