//! Validation schemas for record fields

use crate::core::{error::PipelineError, record::Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Boolean,
}

/// One field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Maximum length of string values
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Allowed values (empty = anything)
    #[serde(default)]
    pub allowed: Vec<String>,
}

/// How a record's fields are validated and written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of every field, in declaration order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Coerce a raw string into the field's type and store it on the record
    pub fn set(&self, record: &mut Record, name: &str, raw: &str) -> Result<(), PipelineError> {
        let field = self
            .field(name)
            .ok_or_else(|| PipelineError::validation(name, "unknown field"))?;

        let value = match field.field_type {
            FieldType::String => {
                if let Some(max) = field.max_length {
                    if raw.chars().count() > max {
                        return Err(PipelineError::validation(
                            name,
                            format!("longer than {} characters", max),
                        ));
                    }
                }
                Value::String(raw.to_string())
            }
            FieldType::Integer => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else {
                    let parsed: i64 = trimmed
                        .parse()
                        .map_err(|_| PipelineError::validation(name, "must be an integer"))?;
                    Value::from(parsed)
                }
            }
            FieldType::Boolean => match raw.trim() {
                "true" | "on" | "1" => Value::Bool(true),
                "" | "false" | "off" | "0" => Value::Bool(false),
                _ => return Err(PipelineError::validation(name, "must be true or false")),
            },
        };

        if !field.allowed.is_empty() && !raw.is_empty() && !field.allowed.iter().any(|a| a == raw) {
            return Err(PipelineError::validation(
                name,
                format!("must be one of: {}", field.allowed.join(", ")),
            ));
        }

        record.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Check that every required field has a value
    pub fn validate(&self, record: &Record) -> Result<(), PipelineError> {
        for field in self.fields.iter().filter(|f| f.required) {
            let missing = match record.fields.get(&field.name) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing {
                return Err(PipelineError::validation(&field.name, "is required"));
            }
        }
        Ok(())
    }
}
