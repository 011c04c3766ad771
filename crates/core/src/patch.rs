//! Tri-state field for partial updates.

use serde::{Deserialize, Deserializer};

use crate::error::CoreError;

/// A field in a partial update.
///
/// Deserialize with `#[serde(default)]`: a missing field is `Absent`, an
/// explicit JSON `null` is `Null`, anything else is `Value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Apply to a required field. `Null` is rejected.
    ///
    /// Returns whether the field was written.
    pub fn apply_required(self, target: &mut T, field: &str) -> Result<bool, CoreError> {
        match self {
            Self::Absent => Ok(false),
            Self::Null => Err(CoreError::Validation(format!("{field} cannot be cleared"))),
            Self::Value(v) => {
                *target = v;
                Ok(true)
            }
        }
    }

    /// Apply to an optional field. `Null` clears it.
    pub fn apply_optional(self, target: &mut Option<T>) -> bool {
        match self {
            Self::Absent => false,
            Self::Null => {
                *target = None;
                true
            }
            Self::Value(v) => {
                *target = Some(v);
                true
            }
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}
