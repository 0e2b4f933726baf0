//! Bind identities used to authenticate directory sessions.

use secrecy::{ExposeSecret, SecretString};

/// Identity a session binds as.
///
/// A credential without a password performs an unauthenticated bind (RFC 4513 §5.1.2). The
/// anonymous identity is the unauthenticated bind with an empty DN.
#[derive(Debug)]
pub struct BindCredentials {
    bind_dn: String,
    password: Option<SecretString>,
}

impl BindCredentials {
    /// Creates credentials for a simple (password) bind.
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            password: Some(SecretString::from(password.into())),
        }
    }

    /// Creates credentials for an unauthenticated bind as `bind_dn`.
    #[must_use]
    pub fn unauthenticated(bind_dn: impl Into<String>) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            password: None,
        }
    }

    /// The anonymous identity (empty DN, no password).
    #[must_use]
    pub fn anonymous() -> Self {
        Self::unauthenticated(String::new())
    }

    /// Get the bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Get the bind password, if one is configured.
    #[must_use]
    pub fn bind_password(&self) -> Option<&str> {
        self.password.as_ref().map(|secret| secret.expose_secret())
    }

    /// Returns true if binding with these credentials sends a password.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.password.is_some()
    }

    /// Returns true for the empty-DN unauthenticated identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.password.is_none() && self.bind_dn.is_empty()
    }
}

impl Default for BindCredentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_bind_credentials() {
        let creds = BindCredentials::new("cn=admin,dc=example,dc=com", "secret");
        assert_eq!(creds.bind_dn(), "cn=admin,dc=example,dc=com");
        assert_eq!(creds.bind_password(), Some("secret"));
        assert!(creds.is_authenticated());
        assert!(!creds.is_anonymous());
    }

    #[test]
    fn test_anonymous_credentials() {
        let creds = BindCredentials::default();
        assert!(creds.is_anonymous());
        assert_eq!(creds.bind_password(), None);

        let named = BindCredentials::unauthenticated("cn=reader");
        assert!(!named.is_authenticated());
        assert!(!named.is_anonymous());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = BindCredentials::new("cn=admin", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("cn=admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
