//! Work unit types.
//!
//! A [`WorkUnit`] is the immutable description of a computation handed to a
//! backend. Its payload and parameters are plain serializable data so the
//! unit can cross a process or network boundary unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HalError, HalResult};

/// Unique identifier for a work unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnitId(pub String);

impl WorkUnitId {
    /// Create a new work unit ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random (UUID v4) work unit ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkUnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkUnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque structured blob: the input of a work unit or the result of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(pub serde_json::Value);

impl Payload {
    /// Check whether the payload carries no content.
    ///
    /// `null`, `""`, `[]` and `{}` are all empty.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.is_empty(),
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::Object(o) => o.is_empty(),
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
        }
    }

    /// Return the payload as a string slice if it is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Approximate encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        match &self.0 {
            serde_json::Value::String(s) => s.len(),
            other => other.to_string().len(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => write!(f, "{s}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(serde_json::Value::String(s))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Self(v)
    }
}

/// A primitive execution parameter value.
///
/// Only plain data is representable; live references cannot be smuggled
/// into a work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer (e.g. repetition count).
    Int(i64),
    /// Finite floating point value.
    Float(f64),
    /// String value (e.g. target name).
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

/// Execution parameters keyed by option name.
pub type Parameters = BTreeMap<String, ParamValue>;

/// Immutable description of a computation to run remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkUnit")]
pub struct WorkUnit {
    id: WorkUnitId,
    payload: Payload,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: Parameters,
}

impl WorkUnit {
    /// Create a validated work unit.
    ///
    /// Fails with [`HalError::InvalidWorkUnit`] if the id or payload is
    /// empty, or if a float parameter is not finite.
    pub fn new(
        id: impl Into<WorkUnitId>,
        payload: impl Into<Payload>,
        parameters: Parameters,
    ) -> HalResult<Self> {
        let unit = Self {
            id: id.into(),
            payload: payload.into(),
            parameters,
        };
        unit.validate()?;
        Ok(unit)
    }

    /// Create a work unit with a freshly generated id.
    pub fn generate(payload: impl Into<Payload>, parameters: Parameters) -> HalResult<Self> {
        Self::new(WorkUnitId::generate(), payload, parameters)
    }

    /// Start building a work unit around a payload.
    pub fn builder(payload: impl Into<Payload>) -> WorkUnitBuilder {
        WorkUnitBuilder {
            id: None,
            payload: payload.into(),
            parameters: Parameters::new(),
        }
    }

    /// The work unit identifier.
    pub fn id(&self) -> &WorkUnitId {
        &self.id
    }

    /// The opaque payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// All execution parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Look up a single execution parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }

    fn validate(&self) -> HalResult<()> {
        if self.id.0.is_empty() {
            return Err(HalError::InvalidWorkUnit("work unit id is empty".into()));
        }
        if self.payload.is_empty() {
            return Err(HalError::InvalidWorkUnit(format!(
                "work unit {} has an empty payload",
                self.id
            )));
        }
        for (name, value) in &self.parameters {
            if let ParamValue::Float(x) = value {
                if !x.is_finite() {
                    return Err(HalError::InvalidWorkUnit(format!(
                        "parameter '{name}' is not a finite number"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`WorkUnit`].
#[derive(Debug, Clone)]
pub struct WorkUnitBuilder {
    id: Option<WorkUnitId>,
    payload: Payload,
    parameters: Parameters,
}

impl WorkUnitBuilder {
    /// Set an explicit id. A UUID is generated otherwise.
    pub fn id(mut self, id: impl Into<WorkUnitId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add an execution parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Validate and build the work unit.
    pub fn build(self) -> HalResult<WorkUnit> {
        let id = self.id.unwrap_or_else(WorkUnitId::generate);
        WorkUnit::new(id, self.payload, self.parameters)
    }
}

#[derive(Deserialize)]
struct RawWorkUnit {
    id: WorkUnitId,
    payload: Payload,
    #[serde(default)]
    parameters: Parameters,
}

impl TryFrom<RawWorkUnit> for WorkUnit {
    type Error = HalError;

    fn try_from(raw: RawWorkUnit) -> HalResult<Self> {
        WorkUnit::new(raw.id, raw.payload, raw.parameters)
    }
}
