//! Message body: a string-to-string map with a canonical form for signing.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ProtocolError, Result};

/// Business payload carried by envelopes and message variants.
///
/// Values are stored in their string-encoded form. Keys are kept sorted, so
/// the canonical serialization never depends on insertion order.
///
/// On the wire the map is nested under a `body` key, matching deployed peers:
/// `{"body":{"k":"v"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBody {
    #[serde(rename = "body", default, deserialize_with = "null_as_default")]
    entries: BTreeMap<String, String>,
}

impl MsgBody {
    /// Creates an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the string form of `value`, replacing any existing entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Display) -> &mut Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    /// Builder-style variant of [`MsgBody::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.set(key, value);
        self
    }

    /// Returns whether the body contains `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the raw string stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parses the value under `key` as `T`.
    ///
    /// Fails with [`ProtocolError::MissingBodyKey`] when the key is absent and
    /// [`ProtocolError::InvalidBodyValue`] when the stored string does not
    /// parse. The string is parsed as stored, so surrounding whitespace is a
    /// parse error. No zero value is ever substituted.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self
            .get(key)
            .ok_or_else(|| ProtocolError::MissingBodyKey(key.to_string()))?;
        raw.parse::<T>()
            .map_err(|_| ProtocolError::InvalidBodyValue {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
                value: raw.to_string(),
            })
    }

    /// Reads `key` as a 32-bit integer.
    pub fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_parsed(key)
    }

    /// Reads `key` as a 64-bit integer.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_parsed(key)
    }

    /// Reads `key` as a 64-bit float.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_parsed(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the body has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical form used as signature input.
    ///
    /// Keys ascending, emitted as `{"k1":"v1","k2":"v2"}` with no escaping.
    /// An empty body yields the empty string, not `{}`.
    pub fn canonical_serialize(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let mut out = String::from("{");
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(key);
            out.push_str("\":\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('}');
        out
    }
}

impl<K, V> FromIterator<(K, V)> for MsgBody
where
    K: Into<String>,
    V: Display,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut body = MsgBody::new();
        for (key, value) in iter {
            body.set(key, value);
        }
        body
    }
}

/// Treats an explicit JSON `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
