//! Builders for common entry shapes.

use crate::entry::{Entry, MutableEntry};

/// New `organizationalUnit` entry named `ou` directly below `base_dn`.
#[must_use]
pub fn organizational_unit(base_dn: &str, ou: &str) -> Entry {
    let mut entry = Entry::new(format!("ou={},{base_dn}", ldap3::dn_escape(ou)));
    entry.replace_values("objectclass", ["top", "organizationalUnit"]);
    entry.replace_value("ou", ou);
    entry
}
