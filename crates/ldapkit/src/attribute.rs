//! Attributes and the case-insensitive attribute map.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// How attribute values are compared when deciding whether an edit changes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMatch {
    /// Values are equal only if byte-identical.
    #[default]
    CaseSensitive,
    /// Values are equal if they match after case folding.
    IgnoreCase,
}

impl ValueMatch {
    /// Returns the comparison key for `value` under this strategy.
    #[must_use]
    pub fn key<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Self::CaseSensitive => Cow::Borrowed(value),
            Self::IgnoreCase => Cow::Owned(value.to_lowercase()),
        }
    }

    /// Returns true if both values compare equal under this strategy.
    #[must_use]
    pub fn matches(&self, left: &str, right: &str) -> bool {
        match self {
            Self::CaseSensitive => left == right,
            Self::IgnoreCase => {
                left.eq_ignore_ascii_case(right) || self.key(left) == self.key(right)
            }
        }
    }

    /// Returns true if `values` contains `candidate` under this strategy.
    #[must_use]
    pub fn contains<S: AsRef<str>>(&self, values: &[S], candidate: &str) -> bool {
        values.iter().any(|value| self.matches(value.as_ref(), candidate))
    }

    /// Returns true if both lists hold the same set of values, ignoring order and duplicates.
    #[must_use]
    pub fn set_eq<L: AsRef<str>, R: AsRef<str>>(&self, left: &[L], right: &[R]) -> bool {
        let left: HashSet<Cow<'_, str>> = left.iter().map(|v| self.key(v.as_ref())).collect();
        let right: HashSet<Cow<'_, str>> = right.iter().map(|v| self.key(v.as_ref())).collect();
        left == right
    }
}

/// A named, multi-valued attribute. Values keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    values: Vec<String>,
}

impl Attribute {
    /// Creates an attribute from a display name and its values.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Display name, case preserved.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values in insertion order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// First value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Consumes the attribute and returns its values.
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    pub(crate) fn push(&mut self, value: String) {
        self.values.push(value);
    }

    pub(crate) fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }
}

/// Attributes of one entry keyed by lower-cased name.
///
/// At most one attribute exists per case-insensitive name. Lookups, inserts and removals all
/// fold the name, while each [`Attribute`] keeps its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeMap {
    inner: HashMap<String, Attribute>,
}

fn map_key(name: &str) -> String {
    name.to_lowercase()
}

impl AttributeMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks an attribute up by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.inner.get(&map_key(name))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.inner.get_mut(&map_key(name))
    }

    /// Inserts or overwrites the attribute stored under `name`.
    pub fn put(&mut self, name: &str, attribute: Attribute) {
        self.inner.insert(map_key(name), attribute);
    }

    /// Inserts or overwrites an attribute under its own display name.
    pub fn put_attribute(&mut self, attribute: Attribute) {
        self.inner.insert(map_key(&attribute.name), attribute);
    }

    /// Removes the attribute stored under `name`; no-op if absent.
    pub fn delete(&mut self, name: &str) -> Option<Attribute> {
        self.inner.remove(&map_key(name))
    }

    /// Moves the attribute stored under `from` to `to`, updating its display name.
    ///
    /// No-op when the names are equal ignoring case or when `from` does not exist. An
    /// attribute already stored under `to` is overwritten. Returns true if anything moved.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from.eq_ignore_ascii_case(to) || map_key(from) == map_key(to) {
            return false;
        }
        let Some(mut attribute) = self.inner.remove(&map_key(from)) else {
            return false;
        };
        attribute.name = to.to_string();
        self.inner.insert(map_key(to), attribute);
        true
    }

    /// Returns true if an attribute exists under `name` (case-insensitive).
    #[must_use]
    pub fn attribute_exists(&self, name: &str) -> bool {
        self.inner.contains_key(&map_key(name))
    }

    /// Display names of every attribute, in no particular order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.inner.values().map(Attribute::name).collect()
    }

    /// Iterates over the stored attributes.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> + '_ {
        self.inner.values()
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the map holds no attribute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for AttributeMap {
    fn from(attributes: HashMap<String, Vec<String>>) -> Self {
        attributes
            .into_iter()
            .map(|(name, values)| Attribute::new(name, values))
            .collect()
    }
}

// Keys are refolded from each attribute's name; only one of any case-variant duplicates is kept.
impl<'de> Deserialize<'de> for AttributeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, Attribute>::deserialize(deserializer)?;
        Ok(raw.into_values().collect())
    }
}

impl FromIterator<Attribute> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut map = Self::new();
        for attribute in iter {
            map.put_attribute(attribute);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_put_delete_ignore_case() {
        let mut map = AttributeMap::new();
        map.put("CN", Attribute::new("CN", ["Jane"]));

        assert_eq!(map.get("cn").and_then(Attribute::first), Some("Jane"));
        assert!(map.attribute_exists("Cn"));

        map.put("cn", Attribute::new("cn", ["John"]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("CN").unwrap().values(), ["John"]);

        map.delete("cN");
        assert!(map.is_empty());
        assert!(map.delete("cn").is_none());
    }

    #[test]
    fn rename_moves_attribute() {
        let mut map = AttributeMap::new();
        map.put_attribute(Attribute::new("mail", ["a@example.com"]));

        assert!(map.rename("MAIL", "emailAddress"));
        assert!(!map.attribute_exists("mail"));
        let renamed = map.get("emailaddress").unwrap();
        assert_eq!(renamed.name(), "emailAddress");
        assert_eq!(renamed.values(), ["a@example.com"]);
        assert_eq!(map.attribute_names(), vec!["emailAddress"]);
    }

    #[test]
    fn rename_is_noop_for_same_name_or_missing_source() {
        let mut map = AttributeMap::new();
        map.put_attribute(Attribute::new("uid", ["jdoe"]));

        assert!(!map.rename("uid", "UID"));
        assert_eq!(map.get("uid").unwrap().name(), "uid");

        assert!(!map.rename("missing", "other"));
        assert!(!map.attribute_exists("other"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn value_match_strategies() {
        let values = vec!["Top".to_string(), "Person".to_string()];

        assert!(!ValueMatch::CaseSensitive.contains(&values, "top"));
        assert!(ValueMatch::IgnoreCase.contains(&values, "top"));

        assert!(ValueMatch::CaseSensitive.set_eq(&values, &["Person", "Top"]));
        assert!(!ValueMatch::CaseSensitive.set_eq(&values, &["person", "top"]));
        assert!(ValueMatch::IgnoreCase.set_eq(&values, &["PERSON", "top", "Top"]));
        assert!(!ValueMatch::IgnoreCase.set_eq(&values, &["person"]));
    }

    #[test]
    fn deserialize_folds_attribute_names() {
        let json = r#"{
            "CN": {"name": "CN", "values": ["a"]},
            "cn": {"name": "cn", "values": ["b"]},
            "Mail": {"name": "Mail", "values": ["m@example.com"]}
        }"#;
        let map: AttributeMap = serde_json::from_str(json).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("cn").unwrap().values().len(), 1);
        assert_eq!(map.get("MAIL").unwrap().name(), "Mail");

        let rendered = serde_json::to_string(&map).unwrap();
        let reparsed: AttributeMap = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed, map);
    }

    #[test]
    fn build_from_search_attributes() {
        let mut raw = HashMap::new();
        raw.insert("objectClass".to_string(), vec!["top".to_string()]);
        raw.insert("ou".to_string(), vec!["People".to_string()]);

        let map = AttributeMap::from(raw);
        assert_eq!(map.get("OBJECTCLASS").unwrap().name(), "objectClass");
        assert_eq!(map.len(), 2);
    }
}
