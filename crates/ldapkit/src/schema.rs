//! Root DSE and subschema metadata.

use crate::search::LdapEntry;
use serde::Serialize;

/// Attributes requested when reading the root DSE.
pub const ROOT_DSE_ATTRIBUTES: &[&str] = &[
    "supportedLDAPVersion",
    "supportedControl",
    "supportedExtension",
    "supportedFeatures",
    "supportedSASLMechanisms",
    "supportedTLSCiphers",
    "configContext",
    "namingContexts",
    "subschemaSubentry",
    "supportedAuthPasswordSchemes",
    "vendorName",
    "vendorVersion",
];

/// Attributes requested when reading the subschema entry.
pub const SCHEMA_ATTRIBUTES: &[&str] = &[
    "ldapSyntaxes",
    "matchingRules",
    "matchingRuleUse",
    "attributeTypes",
    "objectClasses",
];

/// Server capabilities advertised in the root DSE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootDse {
    /// Supported protocol versions.
    pub supported_ldap_versions: Vec<String>,
    /// Supported control OIDs.
    pub supported_controls: Vec<String>,
    /// Supported extended operation OIDs.
    pub supported_extensions: Vec<String>,
    /// Supported feature OIDs.
    pub supported_features: Vec<String>,
    /// Supported SASL mechanisms.
    pub supported_sasl_mechanisms: Vec<String>,
    /// Supported TLS cipher suites.
    pub supported_tls_ciphers: Vec<String>,
    /// Server configuration context.
    pub config_context: Option<String>,
    /// Naming contexts held by the server.
    pub naming_contexts: Vec<String>,
    /// DN of the subschema entry.
    pub subschema_subentry: Option<String>,
    /// Supported authPassword schemes.
    pub supported_auth_password_schemes: Vec<String>,
    /// Vendor name.
    pub vendor_name: Option<String>,
    /// Vendor version.
    pub vendor_version: Option<String>,
}

/// Schema definitions published by the subschema entry, one raw definition per value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Syntax definitions.
    pub syntaxes: Vec<String>,
    /// Matching rule definitions.
    pub matching_rules: Vec<String>,
    /// Matching rule use definitions.
    pub matching_rule_use: Vec<String>,
    /// Attribute type definitions.
    pub attribute_types: Vec<String>,
    /// Object class definitions.
    pub object_classes: Vec<String>,
}

fn all(entry: &LdapEntry, attribute: &str) -> Vec<String> {
    entry.values(attribute).map(<[String]>::to_vec).unwrap_or_default()
}

fn single(entry: &LdapEntry, attribute: &str) -> Option<String> {
    entry.first(attribute).map(str::to_owned)
}

impl From<&LdapEntry> for RootDse {
    fn from(entry: &LdapEntry) -> Self {
        Self {
            supported_ldap_versions: all(entry, "supportedLDAPVersion"),
            supported_controls: all(entry, "supportedControl"),
            supported_extensions: all(entry, "supportedExtension"),
            supported_features: all(entry, "supportedFeatures"),
            supported_sasl_mechanisms: all(entry, "supportedSASLMechanisms"),
            supported_tls_ciphers: all(entry, "supportedTLSCiphers"),
            config_context: single(entry, "configContext"),
            naming_contexts: all(entry, "namingContexts"),
            subschema_subentry: single(entry, "subschemaSubentry"),
            supported_auth_password_schemes: all(entry, "supportedAuthPasswordSchemes"),
            vendor_name: single(entry, "vendorName"),
            vendor_version: single(entry, "vendorVersion"),
        }
    }
}

impl From<&LdapEntry> for Schema {
    fn from(entry: &LdapEntry) -> Self {
        Self {
            syntaxes: all(entry, "ldapSyntaxes"),
            matching_rules: all(entry, "matchingRules"),
            matching_rule_use: all(entry, "matchingRuleUse"),
            attribute_types: all(entry, "attributeTypes"),
            object_classes: all(entry, "objectClasses"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn root_dse_from_entry() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "supportedLDAPVersion".to_string(),
            vec!["2".to_string(), "3".to_string()],
        );
        attributes.insert(
            "subschemaSubentry".to_string(),
            vec!["cn=Subschema".to_string()],
        );
        attributes.insert("vendorname".to_string(), vec!["Example".to_string()]);
        let entry = LdapEntry {
            dn: String::new(),
            attributes,
        };

        let root = RootDse::from(&entry);
        assert_eq!(root.supported_ldap_versions, ["2", "3"]);
        assert_eq!(root.subschema_subentry.as_deref(), Some("cn=Subschema"));
        assert_eq!(root.vendor_name.as_deref(), Some("Example"));
        assert!(root.naming_contexts.is_empty());
        assert!(root.config_context.is_none());
    }

    #[test]
    fn schema_from_entry() {
        let mut attributes = HashMap::new();
        attributes.insert(
            "objectClasses".to_string(),
            vec!["( 2.5.6.0 NAME 'top' ABSTRACT MUST objectClass )".to_string()],
        );
        let entry = LdapEntry {
            dn: "cn=Subschema".to_string(),
            attributes,
        };

        let schema = Schema::from(&entry);
        assert_eq!(schema.object_classes.len(), 1);
        assert!(schema.attribute_types.is_empty());
    }
}
