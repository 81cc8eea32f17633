//! Self-describing step metadata
//!
//! Every step publishes three schemas: the parameters it binds from the
//! caller's parameter map, the context values it reads, and the context
//! values it writes. Input and output entries name a `context_path`, which
//! is how the workflow definition checks that producers run before consumers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a parameter, driving variable or context value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Float,
    Int,
    Bool,
    Text,
    Date,
    Array,
    Object,
    Any,
}

impl ValueType {
    /// Check whether a JSON value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ValueType::Float => value.is_number(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Bool => value.is_boolean(),
            ValueType::Text => value.is_string(),
            ValueType::Date => value
                .as_str()
                .map(|s| s.parse::<chrono::NaiveDate>().is_ok())
                .unwrap_or(false),
            ValueType::Array => value.is_array(),
            ValueType::Object => value.is_object(),
            ValueType::Any => true,
        }
    }
}

/// A configuration parameter bound by a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub description: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    #[serde(default)]
    pub mandatory: bool,

    #[serde(default)]
    pub unit: String,

    /// Used when the caller does not supply the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn new(description: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            description: description.into(),
            value_type,
            mandatory: false,
            unit: String::new(),
            default: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A context value read or written by a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub description: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    #[serde(default)]
    pub unit: String,

    /// Rooted path of the value, e.g. `status.thermaltime.states.TSUM`
    pub context_path: String,
}

impl VariableSpec {
    pub fn new(
        description: impl Into<String>,
        value_type: ValueType,
        context_path: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            value_type,
            unit: String::new(),
            context_path: context_path.into(),
        }
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Parameter name -> spec, in declaration order
pub type ParameterSchema = IndexMap<String, ParameterSpec>;

/// Variable name -> spec, in declaration order
pub type VariableSchema = IndexMap<String, VariableSpec>;
