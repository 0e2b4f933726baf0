//! Configuration types for directory client usage.

use crate::Result;
use ldapkit_core::{BindCredentials, Error, PoolConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Configuration for connecting to a directory server.
#[derive(Debug)]
pub struct DirectoryConfig {
    url: String,
    credentials: BindCredentials,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
    starttls: bool,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
    pool: PoolConfig,
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// `credentials` is the default identity every pooled session binds as.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or its scheme is not `ldap` or `ldaps`.
    pub fn new(url: impl Into<String>, credentials: BindCredentials) -> Result<Self> {
        let url_string = url.into();
        let parsed = Url::parse(&url_string)?;
        if !matches!(parsed.scheme(), "ldap" | "ldaps") {
            return Err(Error::ConfigError(format!(
                "unsupported directory URL scheme `{}`",
                parsed.scheme()
            )));
        }

        Ok(Self {
            url: url_string,
            credentials,
            tls_verify: true,
            tls_ca_cert: None,
            starttls: false,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            pool: PoolConfig::default(),
        })
    }

    /// Returns the directory endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the default bind identity.
    #[must_use]
    pub const fn credentials(&self) -> &BindCredentials {
        &self.credentials
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&Path> {
        self.tls_ca_cert.as_deref()
    }

    /// Returns whether plain `ldap://` connections upgrade with StartTLS.
    #[must_use]
    pub const fn starttls(&self) -> bool {
        self.starttls
    }

    /// Session pool settings.
    #[must_use]
    pub const fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Upgrades `ldap://` connections with StartTLS. Ignored for `ldaps://`.
    #[must_use]
    pub const fn with_starttls(mut self, enabled: bool) -> Self {
        self.starttls = enabled;
        self
    }

    /// Overrides the connection timeout in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a zero timeout.
    pub fn with_connection_timeout_secs(mut self, seconds: u64) -> Result<Self> {
        self.connection_timeout_secs = non_zero_timeout("connection", seconds)?;
        Ok(self)
    }

    /// Overrides the operation timeout in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a zero timeout, which would fail every operation.
    pub fn with_operation_timeout_secs(mut self, seconds: u64) -> Result<Self> {
        self.operation_timeout_secs = non_zero_timeout("operation", seconds)?;
        Ok(self)
    }

    /// Replaces the session pool settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the pool settings are inconsistent.
    pub fn with_pool(mut self, pool: PoolConfig) -> Result<Self> {
        pool.validate()?;
        self.pool = pool;
        Ok(self)
    }
}

fn non_zero_timeout(kind: &str, seconds: u64) -> Result<u64> {
    if seconds == 0 {
        return Err(Error::ConfigError(format!(
            "{kind} timeout must be at least one second"
        )));
    }
    Ok(seconds)
}
