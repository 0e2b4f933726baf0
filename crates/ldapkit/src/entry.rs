//! Stateful directory entries.
//!
//! An [`Entry`] holds the working copy of a DN's attributes and records every effective edit in
//! its [`ChangeLog`]. Edits that would leave the attributes unchanged record nothing, so a
//! caller can apply desired state repeatedly and only the difference reaches the server.
//! [`Entry::commit`] compiles the log into exactly one write and may succeed only once.

use crate::attribute::{Attribute, AttributeMap, ValueMatch};
use crate::change::{ChangeAction, ChangeLog};
use crate::request::{self, WriteRequest};
use crate::search::LdapEntry;
use crate::Result;
use async_trait::async_trait;
use ldapkit_core::Error;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

/// Lifecycle state deciding which write a commit issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Not yet on the server; commits as an add.
    New,
    /// Loaded from the server; commits as a modify.
    Existing,
    /// Marked for removal; commits as a delete.
    ToDelete,
}

/// Sink for compiled entry writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryWriter: Send + Sync {
    /// Sends one write request to the directory.
    async fn write(&self, request: WriteRequest) -> Result<()>;
}

/// Attribute edits with idempotent, change-logging semantics.
///
/// The `_with` methods take the value comparison strategy explicitly; the shorthand methods
/// compare values case-sensitively.
pub trait MutableEntry {
    /// Adds values not already present. Creates the attribute if absent.
    fn add_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>;

    /// Replaces every value of the attribute unless the stored set already equals `values`.
    ///
    /// Replacing with no values removes the attribute.
    fn replace_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>;

    /// Removes the given values; no values removes the whole attribute.
    fn delete_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>;

    /// Makes the attribute hold exactly `values`, using adds and deletes rather than a replace.
    fn sync_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>;

    /// Removes the attribute and always records a whole-attribute delete.
    fn delete_attribute(&mut self, attribute: &str);

    /// Renames an attribute locally. Nothing is recorded.
    fn rename_attribute(&mut self, from: &str, to: &str);

    /// Returns true if a commit would issue a write.
    fn is_changed(&self) -> bool;

    /// Case-sensitive [`add_values_with`](Self::add_values_with).
    fn add_values<I, S>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_values_with(attribute, values, ValueMatch::CaseSensitive);
    }

    /// Case-sensitive [`replace_values_with`](Self::replace_values_with).
    fn replace_values<I, S>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_values_with(attribute, values, ValueMatch::CaseSensitive);
    }

    /// Case-sensitive [`delete_values_with`](Self::delete_values_with).
    fn delete_values<I, S>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delete_values_with(attribute, values, ValueMatch::CaseSensitive);
    }

    /// Case-sensitive [`sync_values_with`](Self::sync_values_with).
    fn sync_values<I, S>(&mut self, attribute: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sync_values_with(attribute, values, ValueMatch::CaseSensitive);
    }

    /// Adds a single value.
    fn add_value(&mut self, attribute: &str, value: impl Into<String>) {
        self.add_values(attribute, [value.into()]);
    }

    /// Replaces the attribute with a single value.
    fn replace_value(&mut self, attribute: &str, value: impl Into<String>) {
        self.replace_values(attribute, [value.into()]);
    }

    /// Deletes a single value.
    fn delete_value(&mut self, attribute: &str, value: impl Into<String>) {
        self.delete_values(attribute, [value.into()]);
    }
}

/// Working copy of one directory entry plus its pending edits.
#[derive(Debug, Serialize)]
pub struct Entry {
    dn: String,
    state: EntryState,
    attributes: AttributeMap,
    #[serde(skip_serializing_if = "ChangeLog::is_empty")]
    changes: ChangeLog,
    #[serde(skip)]
    original: AttributeMap,
    #[serde(skip)]
    committed: bool,
}

impl Entry {
    fn with_state(dn: impl Into<String>, state: EntryState, attributes: AttributeMap) -> Self {
        Self {
            dn: dn.into(),
            state,
            original: attributes.clone(),
            attributes,
            changes: ChangeLog::new(),
            committed: false,
        }
    }

    /// Creates an empty entry that commits as an add.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self::with_state(dn, EntryState::New, AttributeMap::new())
    }

    /// Wraps attributes read from the server; commits as a modify.
    #[must_use]
    pub fn from_attributes(dn: impl Into<String>, attributes: AttributeMap) -> Self {
        Self::with_state(dn, EntryState::Existing, attributes)
    }

    /// Creates an entry that commits as a delete of `dn`.
    #[must_use]
    pub fn for_deletion(dn: impl Into<String>) -> Self {
        Self::with_state(dn, EntryState::ToDelete, AttributeMap::new())
    }

    /// Turns this entry into one that deletes its DN on commit, discarding pending edits.
    #[must_use]
    pub fn into_deletion(self) -> Self {
        Self {
            state: EntryState::ToDelete,
            changes: ChangeLog::new(),
            committed: false,
            ..self
        }
    }

    /// Copies the current attributes into a fresh [`EntryState::New`] entry with the same DN.
    ///
    /// Every attribute is recorded as an add, so committing the copy creates it.
    #[must_use]
    pub fn to_new_entry(&self) -> Self {
        let mut entry = Self::new(self.dn.clone());
        let mut names = self.attributes.attribute_names();
        names.sort_unstable();
        for name in names {
            entry.add_values(name, self.values(name).iter().cloned());
        }
        entry
    }

    /// Distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EntryState {
        self.state
    }

    /// Current attributes, including uncommitted edits.
    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Attributes as they were when the entry was built.
    #[must_use]
    pub fn original_attributes(&self) -> &AttributeMap {
        &self.original
    }

    /// Pending edits in the order they were made.
    #[must_use]
    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    /// Returns true once a commit has been attempted with a non-empty log.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    /// Values of `attribute`; empty if absent.
    #[must_use]
    pub fn values(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(attribute)
            .map_or(&[], Attribute::values)
    }

    /// First value of `attribute`.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).and_then(Attribute::first)
    }

    /// Returns true if `attribute` is present.
    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.attribute_exists(attribute)
    }

    /// Display names of the current attributes.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.attribute_names()
    }

    /// The write a commit would issue, or `None` when there is nothing to write.
    #[must_use]
    pub fn write_request(&self) -> Option<WriteRequest> {
        self.is_changed()
            .then(|| request::compile(self.state, &self.dn, &self.changes))
    }

    /// Sends the pending edits through `writer` as a single request.
    ///
    /// An entry with nothing to write is marked committed and returns without I/O. Otherwise
    /// the entry is marked committed before the write, so a failed write cannot be retried on
    /// the same entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleCommit`] if the entry was already committed, or the writer's
    /// error.
    pub async fn commit<W>(&mut self, writer: &W) -> Result<()>
    where
        W: EntryWriter + ?Sized,
    {
        let Some(request) = self.write_request() else {
            self.committed = true;
            return Ok(());
        };
        if self.committed {
            return Err(Error::DoubleCommit(self.dn.clone()));
        }
        self.committed = true;

        debug!(
            dn = %self.dn,
            operation = request.kind(),
            changes = self.changes.len(),
            "committing entry"
        );
        writer.write(request).await
    }

    /// Renders the current attributes as an LDIF record, attributes sorted by name.
    #[must_use]
    pub fn to_ldif(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "dn: {}", self.dn);

        let mut attributes: Vec<&Attribute> = self.attributes.iter().collect();
        attributes.sort_by(|a, b| a.name().cmp(b.name()));
        for attribute in attributes {
            for value in attribute.values() {
                let _ = writeln!(out, "{}: {value}", attribute.name());
            }
        }
        out
    }

    /// Serializes the DN, state, attributes and pending changes as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InternalError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| Error::InternalError(format!("failed to encode entry: {err}")))
    }

    fn record(&mut self, action: ChangeAction, attribute: &str, values: Vec<String>) {
        self.changes.record(action, attribute, values);
    }
}

impl From<LdapEntry> for Entry {
    fn from(entry: LdapEntry) -> Self {
        Self::from_attributes(entry.dn, AttributeMap::from(entry.attributes))
    }
}

fn collect_values<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl MutableEntry for Entry {
    fn add_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = collect_values(values);
        if values.is_empty() {
            return;
        }

        let Some(existing) = self.attributes.get_mut(attribute) else {
            self.attributes
                .put(attribute, Attribute::new(attribute, values.clone()));
            self.record(ChangeAction::Add, attribute, values);
            return;
        };

        let mut added = Vec::new();
        for value in values {
            if matching.contains(existing.values(), &value) {
                continue;
            }
            existing.push(value.clone());
            added.push(value);
        }
        if !added.is_empty() {
            self.record(ChangeAction::Add, attribute, added);
        }
    }

    fn replace_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = collect_values(values);
        match self.attributes.get(attribute) {
            Some(existing) if matching.set_eq(existing.values(), &values) => return,
            None if values.is_empty() => return,
            _ => {}
        }

        if values.is_empty() {
            self.attributes.delete(attribute);
        } else {
            self.attributes
                .put(attribute, Attribute::new(attribute, values.clone()));
        }
        self.record(ChangeAction::Replace, attribute, values);
    }

    fn delete_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = collect_values(values);
        let Some(existing) = self.attributes.get(attribute) else {
            return;
        };
        if values.is_empty() {
            self.delete_attribute(attribute);
            return;
        }

        let (removed, remaining): (Vec<String>, Vec<String>) = existing
            .values()
            .iter()
            .cloned()
            .partition(|value| matching.contains(&values, value));
        if removed.is_empty() {
            return;
        }

        if remaining.is_empty() {
            self.delete_attribute(attribute);
        } else {
            if let Some(existing) = self.attributes.get_mut(attribute) {
                existing.set_values(remaining);
            }
            self.record(ChangeAction::Delete, attribute, removed);
        }
    }

    fn sync_values_with<I, S>(&mut self, attribute: &str, values: I, matching: ValueMatch)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let desired = collect_values(values);
        let current = self.values(attribute).to_vec();

        let mut to_add: Vec<String> = Vec::new();
        for value in &desired {
            if !matching.contains(&current, value) && !matching.contains(&to_add, value) {
                to_add.push(value.clone());
            }
        }
        let to_delete: Vec<String> = current
            .iter()
            .filter(|value| !matching.contains(&desired, value))
            .cloned()
            .collect();

        self.add_values_with(attribute, to_add, matching);
        // An empty delete list would remove the whole attribute.
        if !to_delete.is_empty() {
            self.delete_values_with(attribute, to_delete, matching);
        }
    }

    fn delete_attribute(&mut self, attribute: &str) {
        self.attributes.delete(attribute);
        self.record(ChangeAction::Delete, attribute, Vec::new());
    }

    fn rename_attribute(&mut self, from: &str, to: &str) {
        self.attributes.rename(from, to);
    }

    fn is_changed(&self) -> bool {
        self.state == EntryState::ToDelete || !self.changes.is_empty()
    }
}
