//! Stored-property model and the custom load/save capability.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single stored field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// One named field of a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// The raw field-list representation of a record.
///
/// This is the form custom load/save types produce and consume. It can
/// be stored and fetched as a record in its own right, but it is
/// deliberately not a supported batch element shape: a batch of bare
/// property lists carries no element type to decode into (see
/// [`crate::shape::classify`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyList(Vec<Property>);

impl PropertyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named value.
    pub fn push(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.push(Property {
            name: name.into(),
            value,
        });
    }

    /// First value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0
            .iter()
            .find(|property| property.name == name)
            .map(|property| &property.value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Property> {
        self.0.iter()
    }
}

impl FromIterator<Property> for PropertyList {
    fn from_iter<I: IntoIterator<Item = Property>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Failure raised by a custom load/save implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("property conversion failed: {reason}")]
pub struct PropertyError {
    pub reason: String,
}

impl PropertyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Custom persistence capability.
///
/// A type implementing `LoadSave` controls its own stored property
/// representation instead of having it derived field by field. The
/// data-binding layer routes such types through these hooks on the way
/// to and from storage.
pub trait LoadSave: Sized {
    /// Rebuild a value from its stored properties.
    fn load(props: &PropertyList) -> Result<Self, PropertyError>;

    /// Produce the properties to store for this value.
    fn save(&self) -> Result<PropertyList, PropertyError>;
}
