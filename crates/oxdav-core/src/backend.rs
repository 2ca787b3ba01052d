//! Backend types, field values and the read-only backend record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::obscure;

/// Field keys whose values are obscured at rest.
pub const SENSITIVE_KEYS: &[&str] = &["password", "api_key", "drime_password"];

/// Check whether a field key holds a secret.
pub fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&key)
}

/// Storage backend types known to this build.
///
/// Matching on this enum is exhaustive, so a new backend type forces every
/// dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Directory on the local filesystem
    Local,

    /// Drime Cloud workspace
    Drime,
}

impl BackendType {
    /// Tag used in the store file and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            BackendType::Local => "local",
            BackendType::Drime => "drime",
        }
    }

    /// Get the display name for UI presentation
    pub fn display_name(self) -> &'static str {
        match self {
            BackendType::Local => "Local",
            BackendType::Drime => "Drime",
        }
    }

    /// Get a user-friendly description of this backend
    pub fn description(self) -> &'static str {
        match self {
            BackendType::Local => "Serves a directory on the local filesystem",
            BackendType::Drime => "Serves a Drime Cloud workspace (API key required)",
        }
    }

    /// Get all backend types
    pub fn all() -> &'static [BackendType] {
        &[BackendType::Local, BackendType::Drime]
    }

    /// Comma-separated list of all type tags, for error messages
    pub fn known_tags() -> String {
        Self::all()
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a type token that names no known backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend type '{0}'")]
pub struct UnknownBackendType(pub String);

impl FromStr for BackendType {
    type Err = UnknownBackendType;

    /// Case-insensitive match against the known type tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBackendType(s.to_string()))
    }
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "a boolean",
            FieldValue::Integer(_) => "an integer",
            FieldValue::Float(_) => "a float",
            FieldValue::String(_) => "a string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

/// Field map of one backend, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Immutable snapshot of one stored backend.
///
/// Sensitive fields are kept in their stored (obscured) form and revealed
/// only by [`get`](Self::get) and [`get_all`](Self::get_all).
#[derive(Clone, PartialEq)]
pub struct BackendRecord {
    name: String,
    type_tag: String,
    fields: Fields,
}

impl BackendRecord {
    /// Create a record from its stored parts.
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>, fields: Fields) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw type tag as stored, which may name a type this build does not know
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Parsed backend type, or `None` for an unknown tag
    pub fn backend_type(&self) -> Option<BackendType> {
        self.type_tag.parse().ok()
    }

    /// Look up a field, revealing obscured secrets.
    pub fn get(&self, key: &str) -> Option<FieldValue> {
        self.fields.get(key).map(|value| self.reveal_field(key, value))
    }

    /// Look up a field, falling back to `default` when absent.
    pub fn get_or(&self, key: &str, default: impl Into<FieldValue>) -> FieldValue {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// All fields, with obscured secrets revealed.
    pub fn get_all(&self) -> Fields {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), self.reveal_field(key, value)))
            .collect()
    }

    /// Stored value without revealing, for display with secrets masked.
    pub fn raw(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Stored fields without revealing.
    pub fn raw_fields(&self) -> &Fields {
        &self.fields
    }

    fn reveal_field(&self, key: &str, value: &FieldValue) -> FieldValue {
        match value {
            FieldValue::String(stored) if is_sensitive(key) => match obscure::reveal(stored) {
                Ok(plain) => FieldValue::String(plain),
                Err(e) => {
                    // Hand-edited plaintext is tolerated, but it should not go unnoticed
                    warn!(
                        backend = %self.name,
                        key,
                        error = %e,
                        "Secret field is not obscured; using stored value as-is"
                    );
                    value.clone()
                }
            },
            _ => value.clone(),
        }
    }
}

impl fmt::Debug for BackendRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked: BTreeMap<&str, String> = self
            .fields
            .iter()
            .map(|(k, v)| {
                let shown = if is_sensitive(k) {
                    "[REDACTED]".to_string()
                } else {
                    v.to_string()
                };
                (k.as_str(), shown)
            })
            .collect();

        f.debug_struct("BackendRecord")
            .field("name", &self.name)
            .field("type", &self.type_tag)
            .field("fields", &masked)
            .finish()
    }
}
