use super::catalog::{ParamType, ToolCatalog, ToolDescriptor};
use super::errors::ToolError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A parameter value after type coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Integer(value) => write!(f, "{value}"),
            ArgumentValue::Float(value) => write!(f, "{value}"),
            ArgumentValue::Text(value) => write!(f, "{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{raw}' for parameter '{parameter}': expected {expected}")]
pub struct CoercionError {
    pub parameter: String,
    pub raw: String,
    pub expected: ParamType,
}

/// Named arguments in the tool's declared parameter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedArguments(Vec<(String, ArgumentValue)>);

impl CoercedArguments {
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `arguments` object for `tools/call`.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    ArgumentValue::Integer(v) => Value::from(*v),
                    ArgumentValue::Float(v) => Value::from(*v),
                    ArgumentValue::Text(v) => Value::from(v.as_str()),
                };
                (key.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Display for CoercedArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (position, (key, value)) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {value}")?;
        }
        f.write_str("}")
    }
}

/// What to do when the model supplies more or fewer values than declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArityPolicy {
    /// Zip to the shorter side; surplus values or parameters are dropped.
    #[default]
    Lenient,
    /// Reject any mismatch as a recoverable error.
    Strict,
}

impl ArityPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ArityPolicy::Strict
        } else {
            ArityPolicy::Lenient
        }
    }
}

/// Pair raw values positionally with the declared parameters and convert
/// them. `integer` and `number` are parsed; every other type passes the
/// raw text through.
pub fn coerce_arguments(
    descriptor: &ToolDescriptor,
    raw_params: &[String],
) -> Result<CoercedArguments, CoercionError> {
    descriptor
        .parameters
        .iter()
        .zip(raw_params)
        .map(|(param, raw)| {
            coerce_value(param.kind, raw)
                .map(|value| (param.name.clone(), value))
                .ok_or_else(|| CoercionError {
                    parameter: param.name.clone(),
                    raw: raw.clone(),
                    expected: param.kind,
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CoercedArguments)
}

fn coerce_value(kind: ParamType, raw: &str) -> Option<ArgumentValue> {
    match kind {
        ParamType::Integer => raw.parse::<i64>().ok().map(ArgumentValue::Integer),
        ParamType::Number => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(ArgumentValue::Float),
        ParamType::String | ParamType::List | ParamType::Unknown => {
            Some(ArgumentValue::Text(raw.to_string()))
        }
    }
}

/// Resolve the tool and coerce its arguments in one step.
pub fn prepare_call(
    catalog: &ToolCatalog,
    tool: &str,
    raw_params: &[String],
    policy: ArityPolicy,
) -> Result<CoercedArguments, ToolError> {
    let descriptor = catalog
        .get(tool)
        .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))?;

    if policy == ArityPolicy::Strict && descriptor.parameters.len() != raw_params.len() {
        return Err(ToolError::ArityMismatch {
            tool: tool.to_string(),
            expected: descriptor.parameters.len(),
            received: raw_params.len(),
        });
    }

    Ok(coerce_arguments(descriptor, raw_params)?)
}
