//! Validated collection identifiers.
//!
//! Collection names end up in statement text (SQLite cannot bind table
//! names), so they are checked against a strict allow-list before any SQL is
//! built and are always quoted when interpolated.

use std::fmt;

use super::error::StoreError;

/// Longest accepted collection name, in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Prefix SQLite reserves for its own tables.
const RESERVED_PREFIX: &str = "sqlite_";

/// A collection (table) name that is safe to interpolate into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    /// Validate `name` as a collection identifier.
    ///
    /// Accepts `[A-Za-z_][A-Za-z0-9_]*` up to [`MAX_COLLECTION_NAME_LEN`]
    /// bytes, excluding names in the `sqlite_` namespace.
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let invalid = |reason| StoreError::InvalidCollectionName {
            name: name.clone(),
            reason,
        };

        let mut chars = name.chars();
        match chars.next() {
            None => return Err(invalid("name cannot be empty")),
            Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                return Err(invalid("name must start with a letter or underscore"))
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid(
                "name may only contain ASCII letters, digits and underscores",
            ));
        }
        if name.len() > MAX_COLLECTION_NAME_LEN {
            return Err(invalid("name too long (max 128 bytes)"));
        }
        if name.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
            return Err(invalid("the sqlite_ prefix is reserved"));
        }

        Ok(Self(name))
    }

    /// The bare name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a quoted SQL identifier.
    pub(crate) fn quoted(&self) -> String {
        // The allow-list rules out quote characters, so no escaping is needed.
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
