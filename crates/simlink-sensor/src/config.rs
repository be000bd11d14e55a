//! The per-sensor configuration block.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One scalar configuration value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Text(String),
}

impl ConfigValue {
    /// Interpret as a positive dimension (integers, or integral floats).
    pub fn as_dimension(&self) -> Option<usize> {
        match *self {
            Self::Int(v) if v > 0 => usize::try_from(v).ok(),
            Self::Float(v) if v > 0.0 && v.fract() == 0.0 && v < usize::MAX as f64 => {
                Some(v as usize)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for ConfigValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Ordered map of configuration keys (`CaptureWidth`, `Interval`,
/// `GoalDistance`, ...) to scalar values.
///
/// Keys keep insertion order so the transport string is stable.
///
/// # Examples
///
/// ```
/// use simlink_sensor::SensorConfig;
///
/// let config = SensorConfig::new()
///     .with("CaptureWidth", 640)
///     .with("CaptureHeight", 480);
/// assert_eq!(
///     config.to_transport_string(),
///     r#"{"CaptureWidth":640,"CaptureHeight":480}"#
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorConfig(IndexMap<String, ConfigValue>);

impl SensorConfig {
    /// An empty configuration block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the block is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Compact JSON form sent to the engine inside `AddSensor`.
    ///
    /// Non-finite floats become `null`.
    pub fn to_transport_string(&self) -> String {
        // String keys and scalar values always serialize.
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }
}

impl FromIterator<(String, ConfigValue)> for SensorConfig {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
