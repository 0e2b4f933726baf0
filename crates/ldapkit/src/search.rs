//! Search requests and the entries they return.

use ldap3::Scope;
use std::collections::HashMap;

/// Filter matching every entry.
pub const MATCH_ALL_FILTER: &str = "(objectclass=*)";

/// Attribute selector asking the server for no attributes.
pub const NO_ATTRIBUTES: &str = "1.1";

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// When the server dereferences aliases during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerefPolicy {
    /// Never dereference.
    #[default]
    Never,
    /// Dereference while searching below the base.
    Searching,
    /// Dereference only when locating the base.
    Finding,
    /// Always dereference.
    Always,
}

impl From<DerefPolicy> for ldap3::DerefAliases {
    fn from(policy: DerefPolicy) -> Self {
        match policy {
            DerefPolicy::Never => Self::Never,
            DerefPolicy::Searching => Self::Searching,
            DerefPolicy::Finding => Self::Finding,
            DerefPolicy::Always => Self::Always,
        }
    }
}

/// A search operation: base, scope, filter and the attributes to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    base: String,
    scope: SearchScope,
    filter: String,
    attributes: Vec<String>,
    deref: DerefPolicy,
    size_limit: i32,
    time_limit: i32,
    types_only: bool,
}

impl SearchRequest {
    /// Creates an unlimited search returning all user attributes.
    #[must_use]
    pub fn new(base: impl Into<String>, scope: SearchScope, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            scope,
            filter: filter.into(),
            attributes: Vec::new(),
            deref: DerefPolicy::Never,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
        }
    }

    /// Reads the single entry named `dn`, following aliases.
    #[must_use]
    pub fn base_object(dn: impl Into<String>) -> Self {
        Self::new(dn, SearchScope::Base, MATCH_ALL_FILTER)
            .deref(DerefPolicy::Always)
            .size_limit(1)
    }

    /// Reads the root DSE, returning `attributes`.
    #[must_use]
    pub fn root_dse<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("", SearchScope::Base, MATCH_ALL_FILTER).attributes(attributes)
    }

    /// Restricts the returned attributes. Empty means all user attributes.
    #[must_use]
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the alias dereferencing policy.
    #[must_use]
    pub const fn deref(mut self, deref: DerefPolicy) -> Self {
        self.deref = deref;
        self
    }

    /// Caps the number of returned entries (0 = server default).
    #[must_use]
    pub const fn size_limit(mut self, limit: i32) -> Self {
        self.size_limit = limit;
        self
    }

    /// Caps server-side search time in seconds (0 = server default).
    #[must_use]
    pub const fn time_limit(mut self, seconds: i32) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Asks for attribute names only.
    #[must_use]
    pub const fn types_only(mut self, types_only: bool) -> Self {
        self.types_only = types_only;
        self
    }

    /// Search base DN.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Search scope.
    #[must_use]
    pub const fn scope(&self) -> SearchScope {
        self.scope
    }

    /// Search filter.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Requested attributes.
    #[must_use]
    pub fn requested_attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Alias dereferencing policy.
    #[must_use]
    pub const fn deref_policy(&self) -> DerefPolicy {
        self.deref
    }

    /// Entry limit.
    #[must_use]
    pub const fn entry_limit(&self) -> i32 {
        self.size_limit
    }

    /// Time limit in seconds.
    #[must_use]
    pub const fn seconds_limit(&self) -> i32 {
        self.time_limit
    }

    /// Whether only attribute names are requested.
    #[must_use]
    pub const fn is_types_only(&self) -> bool {
        self.types_only
    }
}

/// LDAP entry representation used by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserved order from server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns all values for the attribute (case-insensitive).
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }
}

impl From<ldap3::SearchEntry> for LdapEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }
}
