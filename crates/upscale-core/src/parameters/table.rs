use std::collections::HashMap;

use thiserror::Error;

use super::keys;
use super::value::{FromParam, ParamValue};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("parameter '{0}' is not set")]
    Missing(String),
    #[error("parameter '{0}' holds a different kind of value")]
    WrongKind(String),
}

/// Backend-agnostic key/value parameter table.
///
/// Used both as the host's per-call input and as the core's scratch storage
/// when it synthesises creation parameters for a replacement backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterTable {
    values: HashMap<String, ParamValue>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table owned by the core, tagged with [`keys::SCRATCH_TABLE_MARKER`].
    pub fn scratch() -> Self {
        let mut table = Self::new();
        table.set(keys::SCRATCH_TABLE_MARKER, 1u32);
        table
    }

    pub fn get<T: FromParam>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_param)
    }

    /// Like [`get`](Self::get), but tells a missing key from one holding a
    /// value of another kind.
    pub fn try_get<T: FromParam>(&self, key: &str) -> Result<T, ParameterError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ParameterError::Missing(key.to_string()))?;
        T::from_param(value).ok_or_else(|| ParameterError::WrongKind(key.to_string()))
    }

    /// Read `key`, falling back to `default` when it is unset or the wrong
    /// kind.
    pub fn get_or<T: FromParam>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_scratch(&self) -> bool {
        self.get::<u32>(keys::SCRATCH_TABLE_MARKER) == Some(1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
