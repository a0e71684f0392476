//! Record and identifier types
//!
//! Records are owned by the backing store. The grouped index only ever holds
//! [`RecordId`]s and [`GroupKey`]s; full bodies are fetched on demand.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Unique record identifier within a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Create record ID
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw ID
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification value used to bucket records
///
/// Ordered lexicographically by its string value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Create group key
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GroupKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a record attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeName(String);

impl AttributeName {
    /// Create attribute name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Rule or hash set a hit belongs to
    #[must_use]
    pub fn set_name() -> Self {
        Self::new("set_name")
    }

    /// Search term that produced a keyword hit
    #[must_use]
    pub fn keyword() -> Self {
        Self::new("keyword")
    }

    /// Display name of a stored item
    #[must_use]
    pub fn name() -> Self {
        Self::new("name")
    }

    /// Get name as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a record attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Integer value
    Integer(i64),
    /// Text value
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Get text value, if this is text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Immutable view of a stored evidentiary record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique ID within the case
    pub id: RecordId,

    /// Category tag used for dispatch and grouping queries
    pub category: Category,

    /// Classification attributes
    #[serde(default)]
    pub attributes: BTreeMap<AttributeName, AttributeValue>,
}

impl Record {
    /// Create record with no attributes
    #[must_use]
    pub fn new(id: RecordId, category: Category) -> Self {
        Self {
            id,
            category,
            attributes: BTreeMap::new(),
        }
    }

    /// With attribute
    #[must_use]
    pub fn with_attribute(mut self, name: AttributeName, value: AttributeValue) -> Self {
        self.attributes.insert(name, value);
        self
    }

    /// With text attribute
    #[must_use]
    pub fn with_text(self, name: AttributeName, value: impl Into<String>) -> Self {
        self.with_attribute(name, AttributeValue::Text(value.into()))
    }

    /// Get attribute value
    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &AttributeName) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get text attribute value
    #[inline]
    #[must_use]
    pub fn text(&self, name: &AttributeName) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_text)
    }

    /// Group key under the given attribute, if the record carries one
    #[must_use]
    pub fn group_key(&self, grouping: &AttributeName) -> Option<GroupKey> {
        self.text(grouping).map(GroupKey::new)
    }

    /// Display name, falling back to the record ID
    #[must_use]
    pub fn display_name(&self) -> String {
        self.text(&AttributeName::name())
            .map_or_else(|| format!("record {}", self.id), str::to_string)
    }
}
