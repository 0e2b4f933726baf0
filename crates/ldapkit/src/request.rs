//! Protocol write requests and the change-log compiler.
//!
//! An entry's lifecycle state decides which request its log compiles to: new entries become
//! one add, loaded entries one modify, entries marked for deletion one delete.

use crate::attribute::Attribute;
use crate::change::{ChangeAction, ChangeLog};
use crate::entry::EntryState;
use secrecy::{ExposeSecret, SecretString};

/// Create request: DN plus the initial attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    dn: String,
    attributes: Vec<Attribute>,
}

impl AddRequest {
    /// Creates an add request with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.push(Attribute::new(name, values));
        self
    }

    /// Target DN.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Attributes in the order they were attached.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Values attached for `name` (case-insensitive), if any.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name().eq_ignore_ascii_case(name))
            .map(Attribute::values)
    }
}

/// LDAP modification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryModification {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes attribute).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

impl DirectoryModification {
    fn from_change(action: ChangeAction, attribute: &str, values: &[String]) -> Self {
        let attribute = attribute.to_string();
        let values = values.to_vec();
        match action {
            ChangeAction::Add => Self::Add { attribute, values },
            ChangeAction::Replace => Self::Replace { attribute, values },
            ChangeAction::Delete => Self::Delete { attribute, values },
        }
    }

    /// Attribute the step touches.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Delete { attribute, .. }
            | Self::Replace { attribute, .. } => attribute,
        }
    }
}

/// Ordered list of modification steps against one DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRequest {
    dn: String,
    modifications: Vec<DirectoryModification>,
}

impl ModifyRequest {
    /// Creates an empty modify request.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            modifications: Vec::new(),
        }
    }

    /// Appends an add-values step.
    #[must_use]
    pub fn add<I, S>(self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(DirectoryModification::Add {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Appends a replace-values step.
    #[must_use]
    pub fn replace<I, S>(self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(DirectoryModification::Replace {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Appends a delete-values step (no values removes the attribute).
    #[must_use]
    pub fn delete<I, S>(self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(DirectoryModification::Delete {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    fn push(mut self, modification: DirectoryModification) -> Self {
        self.modifications.push(modification);
        self
    }

    /// Target DN.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Steps in application order.
    #[must_use]
    pub fn modifications(&self) -> &[DirectoryModification] {
        &self.modifications
    }
}

/// Delete request addressed by DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    dn: String,
}

impl DeleteRequest {
    /// Creates a delete request.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self { dn: dn.into() }
    }

    /// Target DN.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }
}

/// Password modify extended operation (RFC 3062).
///
/// Every part is optional. Without a user identity the password of the bound identity changes;
/// without a new password the server generates one.
#[derive(Debug, Default)]
pub struct PasswordModifyRequest {
    user_identity: Option<String>,
    old_password: Option<SecretString>,
    new_password: Option<SecretString>,
}

impl PasswordModifyRequest {
    /// Creates a request; empty arguments are left out of it.
    #[must_use]
    pub fn new(user_identity: &str, old_password: &str, new_password: &str) -> Self {
        Self {
            user_identity: non_empty(user_identity).map(str::to_string),
            old_password: secret(old_password),
            new_password: secret(new_password),
        }
    }

    /// Identity whose password changes, usually a DN.
    #[must_use]
    pub fn user_identity(&self) -> Option<&str> {
        self.user_identity.as_deref()
    }

    /// Current password, if supplied.
    #[must_use]
    pub fn old_password(&self) -> Option<&str> {
        self.old_password.as_ref().map(|secret| secret.expose_secret())
    }

    /// Requested password, if supplied.
    #[must_use]
    pub fn new_password(&self) -> Option<&str> {
        self.new_password.as_ref().map(|secret| secret.expose_secret())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn secret(value: &str) -> Option<SecretString> {
    non_empty(value).map(|value| SecretString::from(value.to_string()))
}

/// The single protocol write an entry commit issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    /// Create a new entry.
    Add(AddRequest),
    /// Modify an existing entry.
    Modify(ModifyRequest),
    /// Delete an entry.
    Delete(DeleteRequest),
}

impl WriteRequest {
    /// Target DN.
    #[must_use]
    pub fn dn(&self) -> &str {
        match self {
            Self::Add(request) => request.dn(),
            Self::Modify(request) => request.dn(),
            Self::Delete(request) => request.dn(),
        }
    }

    /// Short name of the operation, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Modify(_) => "modify",
            Self::Delete(_) => "delete",
        }
    }
}

/// Translates a change log into the write request matching `state`.
///
/// - [`EntryState::New`]: add and replace records attach their attribute in log order; a later
///   record for an attribute already attached folds into it (add appends, replace overwrites).
///   Delete records are ignored.
/// - [`EntryState::Existing`]: one modify step per record, in log order.
/// - [`EntryState::ToDelete`]: a delete of `dn`; the log is ignored.
#[must_use]
pub fn compile(state: EntryState, dn: &str, log: &ChangeLog) -> WriteRequest {
    match state {
        EntryState::New => WriteRequest::Add(build_add_request(dn, log)),
        EntryState::Existing => WriteRequest::Modify(build_modify_request(dn, log)),
        EntryState::ToDelete => WriteRequest::Delete(DeleteRequest::new(dn)),
    }
}

fn build_add_request(dn: &str, log: &ChangeLog) -> AddRequest {
    let mut attributes: Vec<Attribute> = Vec::new();

    for change in log {
        if change.action() == ChangeAction::Delete {
            continue;
        }

        let attached = attributes
            .iter_mut()
            .find(|attribute| attribute.name().eq_ignore_ascii_case(change.attribute()));
        match (attached, change.action()) {
            (Some(attribute), ChangeAction::Add) => {
                for value in change.values() {
                    attribute.push(value.clone());
                }
            }
            (Some(attribute), _) => attribute.set_values(change.values().to_vec()),
            (None, _) => attributes.push(Attribute::new(change.attribute(), change.values())),
        }
    }

    attributes.retain(|attribute| !attribute.values().is_empty());
    AddRequest {
        dn: dn.to_string(),
        attributes,
    }
}

fn build_modify_request(dn: &str, log: &ChangeLog) -> ModifyRequest {
    ModifyRequest {
        dn: dn.to_string(),
        modifications: log
            .iter()
            .map(|change| {
                DirectoryModification::from_change(
                    change.action(),
                    change.attribute(),
                    change.values(),
                )
            })
            .collect(),
    }
}
