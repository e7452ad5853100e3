//! Domain types for a keel project.
//!
//! The configuration document is read from `project.json` and serialized with
//! camelCase field names. List elements (`capabilities`, `instances`) are
//! identified by `name`, never by position.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of the remote project a local checkout is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Capability payload, discriminated by the `__type__` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__type__", rename_all = "lowercase")]
pub enum CapabilityPayload {
    Database { schema: String },
}

/// A named capability provided by the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub payload: CapabilityPayload,
}

// ---------------------------------------------------------------------------
// Plugin instances
// ---------------------------------------------------------------------------

/// A configured instance of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInstance {
    pub plugin_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub capability_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Configuration document
// ---------------------------------------------------------------------------

/// Root of `project.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub instances: Vec<PluginInstance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_file: Option<String>,
}

impl ConfigDocument {
    /// An empty document carrying only a project name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            capabilities: Vec::new(),
            instances: Vec::new(),
            imports: None,
            scopes: None,
            entry_file: None,
        }
    }

    /// Check the per-document uniqueness invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for capability in &self.capabilities {
            if !seen.insert(capability.name.as_str()) {
                return Err(CoreError::DuplicateCapability {
                    name: capability.name.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.name.as_str()) {
                return Err(CoreError::DuplicateInstance {
                    name: instance.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn instance(&self, name: &str) -> Option<&PluginInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Parse and validate a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let document: ConfigDocument = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_id_display() {
        assert_eq!(ProjectId::from("prj_123").to_string(), "prj_123");
    }

    #[test]
    fn payload_uses_type_discriminator() {
        let payload = CapabilityPayload::Database {
            schema: "public".to_string(),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value, json!({"__type__": "database", "schema": "public"}));
    }

    #[test]
    fn document_fields_are_camel_case() {
        let text = r#"{
            "name": "shop",
            "title": "Shop",
            "entryFile": "index.ts",
            "instances": [
                {"pluginName": "stripe", "name": "pay", "config": {"token": "a"}, "capabilityNames": ["db"]}
            ]
        }"#;
        let document = ConfigDocument::from_json(text).expect("parse");
        assert_eq!(document.entry_file.as_deref(), Some("index.ts"));
        assert_eq!(document.instances[0].plugin_name, "stripe");
        assert_eq!(document.instances[0].capability_names, vec!["db"]);
        assert!(document.capabilities.is_empty());
        assert!(document.imports.is_none());
    }

    #[test]
    fn duplicate_capability_names_are_rejected() {
        let text = r#"{
            "name": "shop",
            "capabilities": [
                {"name": "db", "payload": {"__type__": "database", "schema": "a"}},
                {"name": "db", "payload": {"__type__": "database", "schema": "b"}}
            ]
        }"#;
        let err = ConfigDocument::from_json(text).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateCapability { ref name } if name == "db"));
    }

    #[test]
    fn duplicate_instance_names_are_rejected() {
        let mut document = ConfigDocument::named("shop");
        for _ in 0..2 {
            document.instances.push(PluginInstance {
                plugin_name: "stripe".to_string(),
                name: "pay".to_string(),
                description: None,
                config: Map::new(),
                capability_names: vec![],
            });
        }
        assert!(matches!(
            document.validate(),
            Err(CoreError::DuplicateInstance { .. })
        ));
    }

    #[test]
    fn unknown_payload_type_fails_to_parse() {
        let text = r#"{
            "name": "shop",
            "capabilities": [{"name": "q", "payload": {"__type__": "queue"}}]
        }"#;
        assert!(matches!(
            ConfigDocument::from_json(text),
            Err(CoreError::Json(_))
        ));
    }
}
