//! Implementation of the exactly-once field tracker.

use std::collections::HashSet;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::Error;
use crate::JsonMap;
use crate::Result;

/// Tracks the consumption of the fields of a flat input document.
///
/// The same document is scanned once per declared parameter, possibly by
/// many call sites sharing a fully-qualified name prefix. Only the first
/// request for a key receives its value; every later request receives
/// `None`, whether or not the first requester bound the value.
#[derive(Debug, Clone)]
pub struct ExactlyOnce {
    /// The name of the document, used in error messages.
    name: String,
    /// The fields of the document.
    fields: JsonMap,
    /// The keys that have been requested.
    consumed: HashSet<String>,
}

impl ExactlyOnce {
    /// Constructs a new tracker over the given fields.
    pub fn new(name: impl Into<String>, fields: JsonMap) -> Self {
        Self {
            name: name.into(),
            fields,
            consumed: HashSet::new(),
        }
    }

    /// Gets the name of the tracked document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the value of a field.
    ///
    /// Returns `None` if the field does not exist or has already been
    /// requested.
    pub fn get(&mut self, key: &str) -> Option<JsonValue> {
        let value = self.fields.get(key)?;
        if !self.consumed.insert(key.to_string()) {
            debug!("field `{key}` of `{name}` was already consumed", name = self.name);
            return None;
        }

        debug!("consumed field `{key}` of `{name}`", name = self.name);
        Some(value.clone())
    }

    /// Gets the set of keys that have been consumed.
    pub fn consumed(&self) -> &HashSet<String> {
        &self.consumed
    }

    /// Checks that every field of the document has been requested.
    ///
    /// Returns an error listing every unused key.
    pub fn check_all_used(&self) -> Result<()> {
        let mut unused: Vec<_> = self
            .fields
            .keys()
            .filter(|k| !self.consumed.contains(k.as_str()))
            .cloned()
            .collect();

        if unused.is_empty() {
            return Ok(());
        }

        unused.sort();
        Err(Error::UnmappedInputs {
            name: self.name.clone(),
            keys: unused,
        })
    }
}
