//! Directory search results.

use std::collections::HashMap;

use ldap3::SearchEntry;

use crate::error::HydrationError;

/// One entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Create a new [`LdapEntry`] without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add (or replace) an attribute.
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Values of an attribute. Attribute names are case-insensitive.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attrs
            .get(name)
            .or_else(|| {
                self.attrs
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    /// Value of an attribute, collapsed to a single value when there is
    /// exactly one.
    pub fn value(&self, name: &str) -> Option<AttributeValue> {
        self.get(name).map(AttributeValue::from_values)
    }
}

impl From<SearchEntry> for LdapEntry {
    fn from(entry: SearchEntry) -> Self {
        if !entry.bin_attrs.is_empty() {
            tracing::trace!(
                dn = %entry.dn,
                attributes = ?entry.bin_attrs.keys().collect::<Vec<_>>(),
                "ignoring binary attributes"
            );
        }

        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// Value handed to a user setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttributeValue {
    pub fn from_values(values: &[String]) -> Self {
        match values {
            [value] => AttributeValue::Single(value.clone()),
            values => AttributeValue::Multi(values.to_vec()),
        }
    }

    /// Take the value of a single-valued attribute.
    pub fn into_single(self) -> Result<String, HydrationError> {
        match self {
            AttributeValue::Single(value) => Ok(value),
            AttributeValue::Multi(values) => {
                Err(HydrationError::ExpectedSingleValue(values.len()))
            },
        }
    }

    /// Take every value, whatever the cardinality.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            AttributeValue::Single(value) => vec![value],
            AttributeValue::Multi(values) => values,
        }
    }
}

/// Outcome of [`Driver::search`](super::Driver::search).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub entries: Vec<LdapEntry>,
}

impl SearchResult {
    pub fn new(entries: Vec<LdapEntry>) -> Self {
        Self { entries }
    }

    /// Number of matched entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
