//! Workflow definitions: a JSON object whose `name` field is its identity.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::hash;

/// A parsed workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    pub name: String,
    /// Every top-level field except `name`.
    pub data: Map<String, Value>,
}

impl WorkflowDefinition {
    /// Parse the JSON content of the workflow file at `path`.
    pub fn parse(path: &Path, content: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(content).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Object(mut data) = value else {
            return Err(CoreError::InvalidWorkflow {
                path: path.to_path_buf(),
                reason: "expected a JSON object".to_string(),
            });
        };
        let name = match data.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            Some(_) => {
                return Err(CoreError::InvalidWorkflow {
                    path: path.to_path_buf(),
                    reason: "`name` must be a non-empty string".to_string(),
                })
            }
            None => {
                return Err(CoreError::InvalidWorkflow {
                    path: path.to_path_buf(),
                    reason: "missing `name` field".to_string(),
                })
            }
        };
        Ok(Self { name, data })
    }

    /// Fingerprint of the compact JSON payload. `name` is not part of it.
    pub fn data_fingerprint(&self) -> String {
        let serialized = Value::Object(self.data.clone()).to_string();
        hash::fingerprint(serialized.as_bytes())
    }
}
