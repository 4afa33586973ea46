//! CalDAV calendar source.
//!
//! This module provides a [`CalDavSource`] that lists calendars and fetches
//! raw calendar objects from CalDAV servers (Nextcloud, Monica, Radicale...).
//!
//! # Features
//!
//! - HTTP Digest (MD5, MD5-sess) and Basic authentication
//! - PROPFIND for calendar discovery
//! - REPORT calendar-query with a time-range filter
//! - TLS via rustls (verification can be disabled for test servers)
//!
//! # Example
//!
//! ```ignore
//! use calbrief_providers::caldav::{CalDavConfig, CalDavSource};
//!
//! let config = CalDavConfig::new("https://cloud.example.com/remote.php/dav/calendars/me/")?
//!     .with_credentials("me", "app-password");
//!
//! let source = CalDavSource::new(config)?;
//! let calendars = source.list_calendars().await?;
//! ```

mod auth;
mod client;
mod config;
mod source;
mod xml;

pub use config::{CalDavConfig, Credentials};
pub use source::CalDavSource;
