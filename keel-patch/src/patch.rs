//! Typed configuration patch sent to the remote side.

use keel_core::{Capability, CapabilityPayload, PluginInstance};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Minimal set of changes turning one configuration document into another.
///
/// Fields left as `None` (or empty lists) are untouched. For the
/// double-`Option` fields, `Some(None)` clears the value remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub entry_file: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub imports: Option<Option<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub scopes: Option<Option<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<CapabilityOp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceOp>,
}

impl ConfigPatch {
    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.title.is_none()
            && self.entry_file.is_none()
            && self.imports.is_none()
            && self.scopes.is_none()
            && self.capabilities.is_empty()
            && self.instances.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum CapabilityOp {
    Create {
        name: String,
        payload: CapabilityPayload,
    },
    /// `payload` is the complete new payload, never a partial one.
    Update {
        name: String,
        payload: CapabilityPayload,
    },
    Delete {
        name: String,
    },
}

impl CapabilityOp {
    pub fn name(&self) -> &str {
        match self {
            CapabilityOp::Create { name, .. }
            | CapabilityOp::Update { name, .. }
            | CapabilityOp::Delete { name } => name,
        }
    }
}

impl From<Capability> for CapabilityOp {
    fn from(capability: Capability) -> Self {
        CapabilityOp::Create {
            name: capability.name,
            payload: capability.payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum InstanceOp {
    Create {
        plugin_name: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        config: Map<String, Value>,
        capability_names: Vec<String>,
    },
    /// Only the sub-fields that changed are present.
    Update {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
        description: Option<Option<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capability_names: Option<Vec<String>>,
    },
    Delete {
        name: String,
    },
}

impl InstanceOp {
    pub fn name(&self) -> &str {
        match self {
            InstanceOp::Create { name, .. }
            | InstanceOp::Update { name, .. }
            | InstanceOp::Delete { name } => name,
        }
    }
}

impl From<PluginInstance> for InstanceOp {
    fn from(instance: PluginInstance) -> Self {
        InstanceOp::Create {
            plugin_name: instance.plugin_name,
            name: instance.name,
            description: instance.description,
            config: instance.config,
            capability_names: instance.capability_names,
        }
    }
}

/// Serde adapter for `Option<Option<T>>`: absent, `null`, or a value.
mod nullable {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(Some(inner)) => inner.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
