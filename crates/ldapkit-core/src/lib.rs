//! # ldapkit-core
//!
//! Core types and utilities shared by the ldapkit directory client.
//!
//! This crate holds everything that does not depend on the wire protocol: the error taxonomy,
//! bind credentials, pool configuration and the generic bounded session pool.
//!
//! ## Modules
//!
//! - [`error`] - Error kinds surfaced by directory operations
//! - [`credentials`] - Bind identities with secret handling
//! - [`config`] - Validated session pool configuration
//! - [`retry`] - Backoff policy for session creation
//! - [`pool`] - Bounded pool of authenticated sessions

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod pool;
pub mod retry;

// Re-export commonly used types
pub use config::PoolConfig;
pub use credentials::BindCredentials;
pub use error::{Error, Result};
pub use pool::{ManageSession, PoolStatus, PooledSession, SessionPool};
pub use retry::RetryPolicy;
