use super::errors::AgentError;
use crate::application::tooling::ToolServerInterface;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

const NO_DESCRIPTION: &str = "No description available";

/// Declared parameter type, as far as coercion cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Number,
    String,
    List,
    Unknown,
}

impl ParamType {
    /// Map a JSON-Schema `type` value. Nullable unions (`["integer", "null"]`)
    /// resolve to their first non-null member.
    pub fn from_schema(value: Option<&Value>) -> Self {
        let name = match value {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(Value::Array(options)) => options
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null"),
            _ => None,
        };
        match name {
            Some("integer") => ParamType::Integer,
            Some("number") => ParamType::Number,
            Some("string") => ParamType::String,
            Some("array") | Some("list") => ParamType::List,
            _ => ParamType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::List => "array",
            ParamType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Type name as declared by the server, shown to the model
    #[serde(skip)]
    pub declared: String,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            declared: kind.as_str().to_string(),
        }
    }
}

/// A remote operation: name, description and ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Build from one `tools/list` record. Parameter order follows the
    /// order of `inputSchema.properties` as sent by the server.
    pub fn from_record(record: &Value) -> Result<Self, DescriptorError> {
        let object = record.as_object().ok_or(DescriptorError::NotAnObject)?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(DescriptorError::MissingName)?;

        let description = object
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_DESCRIPTION);

        let schema = object
            .get("inputSchema")
            .ok_or_else(|| DescriptorError::MissingInputSchema(name.to_string()))?
            .as_object()
            .ok_or_else(|| DescriptorError::MissingInputSchema(name.to_string()))?;

        let mut parameters = Vec::new();
        if let Some(properties) = schema.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| DescriptorError::InvalidProperties(name.to_string()))?;
            for (param_name, info) in properties {
                let info = info.as_object().ok_or_else(|| DescriptorError::InvalidProperty {
                    tool: name.to_string(),
                    parameter: param_name.clone(),
                })?;
                let declared = info.get("type");
                let kind = ParamType::from_schema(declared);
                let declared = match declared {
                    Some(Value::String(label)) => label.clone(),
                    _ => kind.as_str().to_string(),
                };
                parameters.push(ToolParameter {
                    name: param_name.clone(),
                    kind,
                    declared,
                });
            }
        }

        Ok(Self::new(name, description, parameters))
    }

    /// `name(a: integer, b: integer) - description`
    pub fn signature(&self) -> String {
        let params = if self.parameters.is_empty() {
            "no parameters".to_string()
        } else {
            self.parameters
                .iter()
                .map(|param| format!("{}: {}", param.name, param.declared))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{}({}) - {}", self.name, params, self.description)
    }
}

/// Why a discovered record could not become a [`ToolDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("tool record is not an object")]
    NotAnObject,
    #[error("tool record has no name")]
    MissingName,
    #[error("tool '{0}' has no inputSchema object")]
    MissingInputSchema(String),
    #[error("tool '{0}' has a non-object properties map")]
    InvalidProperties(String),
    #[error("tool '{tool}' parameter '{parameter}' is not an object")]
    InvalidProperty { tool: String, parameter: String },
}

/// The tools discovered at session start: lookup by name plus the
/// numbered description injected into the system instructions.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: Vec<Result<ToolDescriptor, DescriptorError>>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Fetch the tool list once from the server and build the catalog.
    pub async fn discover(bridge: &dyn ToolServerInterface) -> Result<Self, AgentError> {
        info!("Requesting tool list");
        let records = bridge.list_tools().await.map_err(AgentError::Discovery)?;
        let catalog = Self::from_records(&records);
        info!(
            tools = catalog.len(),
            skipped = records.len() - catalog.len(),
            "Tool catalog ready"
        );
        Ok(catalog)
    }

    /// Malformed records keep their slot in the numbering but are not callable.
    pub fn from_records(records: &[Value]) -> Self {
        let entries = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                ToolDescriptor::from_record(record).inspect_err(|err| {
                    warn!(position = position + 1, %err, "Error processing tool");
                })
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        Self::from_entries(descriptors.into_iter().map(Ok).collect())
    }

    fn from_entries(entries: Vec<Result<ToolDescriptor, DescriptorError>>) -> Self {
        let mut index = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            if let Ok(descriptor) = entry {
                if index.contains_key(&descriptor.name) {
                    warn!(tool = %descriptor.name, "Duplicate tool name; keeping the first");
                    continue;
                }
                index.insert(descriptor.name.clone(), position);
            }
        }
        debug!(callable = index.len(), total = entries.len(), "Indexed tool catalog");
        Self { entries, index }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index
            .get(name)
            .and_then(|position| self.entries[*position].as_ref().ok())
    }

    /// Callable tools, in server order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    /// Number of callable tools.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// One numbered line per discovered record.
    pub fn describe(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(position, entry)| match entry {
                Ok(descriptor) => format!("{}. {}", position + 1, descriptor.signature()),
                Err(_) => format!("{}. Error processing tool", position + 1),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
