//! Ordered log of attribute-level edits recorded by an entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of attribute edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Add values to an attribute (creating it if needed).
    Add,
    /// Replace every value of an attribute.
    Replace,
    /// Remove values; an empty value list removes the whole attribute.
    Delete,
}

impl ChangeAction {
    /// Lower-case name, as used in LDIF change records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged edit. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    action: ChangeAction,
    attribute: String,
    values: Vec<String>,
}

impl ChangeRecord {
    pub(crate) fn new(
        action: ChangeAction,
        attribute: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        Self {
            action,
            attribute: attribute.into(),
            values,
        }
    }

    /// Edit kind.
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        self.action
    }

    /// Attribute name as supplied to the mutating call.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Values carried by the edit. Empty for whole-attribute deletes.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Returns true for a delete that removes the attribute entirely.
    #[must_use]
    pub fn is_delete_all(&self) -> bool {
        self.action == ChangeAction::Delete && self.values.is_empty()
    }
}

/// Append-only sequence of [`ChangeRecord`]s in the order they were made.
///
/// Records for the same attribute are never merged: the log order is the order in which the
/// compiled modify request applies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, action: ChangeAction, attribute: &str, values: Vec<String>) {
        self.records.push(ChangeRecord::new(action, attribute, values));
    }

    /// Records in log order.
    #[must_use]
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Iterates over the records in log order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_keep_order_and_are_not_merged() {
        let mut log = ChangeLog::new();
        log.record(ChangeAction::Add, "member", vec!["uid=a".to_string()]);
        log.record(ChangeAction::Add, "member", vec!["uid=b".to_string()]);
        log.record(ChangeAction::Delete, "description", Vec::new());

        assert_eq!(log.len(), 3);
        let values: Vec<&[String]> = log.iter().map(ChangeRecord::values).collect();
        assert_eq!(values[0], ["uid=a"]);
        assert_eq!(values[1], ["uid=b"]);
        assert!(log.records()[2].is_delete_all());
    }

    #[test]
    fn action_names() {
        assert_eq!(ChangeAction::Replace.to_string(), "replace");
        assert_eq!(
            serde_json::to_string(&ChangeAction::Delete).unwrap(),
            "\"delete\""
        );
    }
}
