//! Error types for directory operations.
//!
//! Every failure a caller can observe maps to exactly one variant here. Protocol failures keep
//! the server's result code so callers can branch on it without string matching.

use thiserror::Error;

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dialing or binding a new session failed
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The server rejected the bind credentials (result code 49)
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The server answered with a non-success result code
    #[error("Protocol error (result code {code}): {message}")]
    Protocol {
        /// LDAP result code returned by the server
        code: u32,
        /// Diagnostic message returned by the server
        message: String,
    },

    /// Entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A search expected to yield at most one entry yielded several
    #[error("Multiple matches: {count} entries under `{base}` match `{filter}`")]
    MultipleMatches {
        /// Search base
        base: String,
        /// Search filter
        filter: String,
        /// Number of entries returned
        count: usize,
    },

    /// Commit was invoked on an entry that has already been committed
    #[error("Entry already committed: {0}")]
    DoubleCommit(String),

    /// Operation or pool checkout timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The session pool has been closed
    #[error("Session pool is closed")]
    PoolClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// LDAP result code for `noSuchObject`.
pub const RESULT_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code for `invalidCredentials`.
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;
/// LDAP result code for `insufficientAccessRights`.
pub const RESULT_INSUFFICIENT_ACCESS: u32 = 50;
/// LDAP result code for `entryAlreadyExists`.
pub const RESULT_ALREADY_EXISTS: u32 = 68;

impl Error {
    /// Builds the error matching a non-success LDAP result code.
    #[must_use]
    pub fn from_result_code(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            RESULT_NO_SUCH_OBJECT => Self::NotFound(message),
            RESULT_INVALID_CREDENTIALS => Self::InvalidCredentials(message),
            _ => Self::Protocol { code, message },
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MultipleMatches { .. } => "MULTIPLE_MATCHES",
            Self::DoubleCommit(_) => "DOUBLE_COMMIT",
            Self::Timeout(_) => "TIMEOUT",
            Self::PoolClosed => "POOL_CLOSED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the LDAP result code carried by this error, if any.
    #[must_use]
    pub const fn result_code(&self) -> Option<u32> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            Self::NotFound(_) => Some(RESULT_NO_SUCH_OBJECT),
            Self::InvalidCredentials(_) => Some(RESULT_INVALID_CREDENTIALS),
            _ => None,
        }
    }

    /// Returns true if the error means the addressed entry does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::ConnectionError(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid directory URL: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::ConnectionError("test".to_string()).error_code(),
            "CONNECTION_ERROR"
        );
        assert_eq!(
            Error::Protocol {
                code: 53,
                message: "unwilling".to_string()
            }
            .error_code(),
            "PROTOCOL_ERROR"
        );
        assert_eq!(
            Error::MultipleMatches {
                base: "dc=example".to_string(),
                filter: "(uid=a)".to_string(),
                count: 2
            }
            .error_code(),
            "MULTIPLE_MATCHES"
        );
        assert_eq!(
            Error::DoubleCommit("cn=x".to_string()).error_code(),
            "DOUBLE_COMMIT"
        );
        assert_eq!(Error::PoolClosed.error_code(), "POOL_CLOSED");
    }

    #[test]
    fn test_from_result_code() {
        assert!(Error::from_result_code(32, "no such object").is_not_found());
        assert!(matches!(
            Error::from_result_code(49, "bad password"),
            Error::InvalidCredentials(_)
        ));

        let err = Error::from_result_code(RESULT_ALREADY_EXISTS, "exists");
        assert_eq!(err.result_code(), Some(68));
        assert_eq!(err.to_string(), "Protocol error (result code 68): exists");
    }

    #[test]
    fn test_error_display() {
        let err = Error::MultipleMatches {
            base: "ou=people,dc=example,dc=com".to_string(),
            filter: "(sn=Doe)".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Multiple matches: 3 entries under `ou=people,dc=example,dc=com` match `(sn=Doe)`"
        );
    }

    #[test]
    fn test_should_log() {
        assert!(Error::ConnectionError("refused".to_string()).should_log());
        assert!(Error::InternalError("test".to_string()).should_log());
        assert!(!Error::NotFound("test".to_string()).should_log());
        assert!(!Error::DoubleCommit("test".to_string()).should_log());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::ConfigError(_)));
    }
}
