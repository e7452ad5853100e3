//! Tree-diff patch compiler.
//!
//! Walks every raw [`Edit`] between two documents through a closed dispatch
//! on the first path segment:
//!
//! | path                         | effect                                        |
//! |------------------------------|-----------------------------------------------|
//! | `/name`, `/title`            | scalar replacement                            |
//! | `/entryFile`                 | scalar replacement or removal                 |
//! | `/imports/**`, `/scopes/**`  | whole map re-read from `after`                |
//! | `/capabilities/i`            | create / delete                               |
//! | `/capabilities/i/payload/**` | update, payload replaced wholesale            |
//! | `/instances/i`               | create / delete                               |
//! | `/instances/i/<field>/**`    | update of description, config, capabilityNames |
//! | `/instances/i/pluginName`    | delete + create                               |
//!
//! List indices always resolve against `before`. Nested edits accumulate in
//! per-name builders that are flushed once, in first-touch order.

use indexmap::IndexMap;
use keel_core::{CapabilityPayload, ConfigDocument, PluginInstance};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::diff::{format_path, Differ, Edit, EditOp, Segment};
use crate::edit;
use crate::error::PatchError;
use crate::patch::{CapabilityOp, ConfigPatch, InstanceOp};

/// Top-level arrays whose elements are identified by `name`.
const KEYED_LISTS: &[&str] = &["capabilities", "instances"];

/// Compile the patch that turns `before` into `after`.
pub fn compile(before: &ConfigDocument, after: &ConfigDocument) -> Result<ConfigPatch, PatchError> {
    let before_value = serde_json::to_value(before)?;
    let after_value = serde_json::to_value(after)?;
    let edits = Differ::keyed(KEYED_LISTS, "name").diff(&before_value, &after_value);

    let mut compiler = Compiler::new(before, after);
    for edit in &edits {
        compiler.apply(edit)?;
    }
    let patch = compiler.finish()?;
    tracing::debug!(
        edits = edits.len(),
        capabilities = patch.capabilities.len(),
        instances = patch.instances.len(),
        "compiled configuration patch"
    );
    Ok(patch)
}

// ---------------------------------------------------------------------------
// Dispatch keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Title,
    EntryFile,
    Imports,
    Scopes,
    Capabilities,
    Instances,
}

impl Field {
    fn parse(segment: &Segment) -> Option<Self> {
        let Segment::Field(name) = segment else {
            return None;
        };
        match name.as_str() {
            "name" => Some(Field::Name),
            "title" => Some(Field::Title),
            "entryFile" => Some(Field::EntryFile),
            "imports" => Some(Field::Imports),
            "scopes" => Some(Field::Scopes),
            "capabilities" => Some(Field::Capabilities),
            "instances" => Some(Field::Instances),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapabilityField {
    Payload,
}

impl CapabilityField {
    fn parse(segment: &Segment) -> Option<Self> {
        match segment {
            Segment::Field(name) if name == "payload" => Some(CapabilityField::Payload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceField {
    Description,
    Config,
    CapabilityNames,
    PluginName,
}

impl InstanceField {
    fn parse(segment: &Segment) -> Option<Self> {
        let Segment::Field(name) = segment else {
            return None;
        };
        match name.as_str() {
            "description" => Some(InstanceField::Description),
            "config" => Some(InstanceField::Config),
            "capabilityNames" => Some(InstanceField::CapabilityNames),
            "pluginName" => Some(InstanceField::PluginName),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum CapabilityEntry {
    Create(Value),
    Update(Value),
    Delete,
}

#[derive(Debug, Default)]
struct InstanceDraft {
    description: Option<Value>,
    config: Option<Value>,
    capability_names: Option<Value>,
}

#[derive(Debug)]
enum InstanceEntry {
    Create(Value),
    Update(InstanceDraft),
    Delete,
    /// The plugin changed; replaced by the `after` instance of the same name.
    Replace,
}

struct Compiler<'d> {
    before: &'d ConfigDocument,
    after: &'d ConfigDocument,
    patch: ConfigPatch,
    capabilities: IndexMap<String, CapabilityEntry>,
    instances: IndexMap<String, InstanceEntry>,
}

impl<'d> Compiler<'d> {
    fn new(before: &'d ConfigDocument, after: &'d ConfigDocument) -> Self {
        Self {
            before,
            after,
            patch: ConfigPatch::default(),
            capabilities: IndexMap::new(),
            instances: IndexMap::new(),
        }
    }

    fn apply(&mut self, edit: &Edit) -> Result<(), PatchError> {
        let Some((head, rest)) = edit.path.split_first() else {
            return Err(unhandled(&edit.path));
        };
        let field = Field::parse(head).ok_or_else(|| unhandled(&edit.path))?;

        match field {
            Field::Name | Field::Title if !rest.is_empty() => Err(unhandled(&edit.path)),
            Field::Name => {
                self.patch.name = Some(self.after.name.clone());
                Ok(())
            }
            Field::Title => {
                self.patch.title = Some(self.after.title.clone());
                Ok(())
            }
            Field::EntryFile => {
                self.patch.entry_file = Some(self.after.entry_file.clone());
                Ok(())
            }
            Field::Imports => {
                self.patch.imports = Some(self.after.imports.clone());
                Ok(())
            }
            Field::Scopes => {
                self.patch.scopes = Some(self.after.scopes.clone());
                Ok(())
            }
            Field::Capabilities => self.apply_capability(edit, rest),
            Field::Instances => self.apply_instance(edit, rest),
        }
    }

    fn apply_capability(&mut self, edit: &Edit, rest: &[Segment]) -> Result<(), PatchError> {
        let Some((Segment::Index(index), nested)) = rest.split_first() else {
            return Err(unhandled(&edit.path));
        };

        let Some((head, sub_path)) = nested.split_first() else {
            return match edit.op {
                EditOp::Add => {
                    let value = edit_value(edit)?;
                    let name = element_name(value, &edit.path)?;
                    self.capabilities
                        .insert(name, CapabilityEntry::Create(value.clone()));
                    Ok(())
                }
                EditOp::Remove => {
                    let name = self.capability_name(*index)?;
                    self.capabilities.insert(name, CapabilityEntry::Delete);
                    Ok(())
                }
                EditOp::Replace => Err(unhandled(&edit.path)),
            };
        };

        match CapabilityField::parse(head) {
            Some(CapabilityField::Payload) => {
                let name = self.capability_name(*index)?;
                let seed = &self.before.capabilities[*index].payload;
                let entry = match self.capabilities.entry(name) {
                    indexmap::map::Entry::Occupied(entry) => entry.into_mut(),
                    indexmap::map::Entry::Vacant(entry) => {
                        entry.insert(CapabilityEntry::Update(serde_json::to_value(seed)?))
                    }
                };
                match entry {
                    CapabilityEntry::Update(payload) => {
                        edit::apply(payload, edit.op, sub_path, edit.value.as_ref())
                    }
                    _ => Err(unhandled(&edit.path)),
                }
            }
            None => Err(unhandled(&edit.path)),
        }
    }

    fn apply_instance(&mut self, edit: &Edit, rest: &[Segment]) -> Result<(), PatchError> {
        let Some((Segment::Index(index), nested)) = rest.split_first() else {
            return Err(unhandled(&edit.path));
        };

        let Some((head, sub_path)) = nested.split_first() else {
            return match edit.op {
                EditOp::Add => {
                    let value = edit_value(edit)?;
                    let name = element_name(value, &edit.path)?;
                    self.instances
                        .insert(name, InstanceEntry::Create(value.clone()));
                    Ok(())
                }
                EditOp::Remove => {
                    let name = self.instance_name(*index)?;
                    self.instances.insert(name, InstanceEntry::Delete);
                    Ok(())
                }
                EditOp::Replace => Err(unhandled(&edit.path)),
            };
        };

        let field = InstanceField::parse(head).ok_or_else(|| unhandled(&edit.path))?;
        let name = self.instance_name(*index)?;

        if field == InstanceField::PluginName {
            if !sub_path.is_empty() {
                return Err(unhandled(&edit.path));
            }
            self.instances.insert(name, InstanceEntry::Replace);
            return Ok(());
        }

        let entry = self
            .instances
            .entry(name)
            .or_insert_with(|| InstanceEntry::Update(InstanceDraft::default()));
        let draft = match entry {
            InstanceEntry::Update(draft) => draft,
            // The whole instance is re-sent; nested edits are already covered.
            InstanceEntry::Replace => return Ok(()),
            _ => return Err(unhandled(&edit.path)),
        };

        let seeded = &self.before.instances[*index];
        let slot = match field {
            InstanceField::Description => draft.description.get_or_insert_with(|| {
                seeded
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }),
            InstanceField::Config => draft
                .config
                .get_or_insert_with(|| Value::Object(seeded.config.clone())),
            InstanceField::CapabilityNames => draft.capability_names.get_or_insert_with(|| {
                Value::Array(
                    seeded
                        .capability_names
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                )
            }),
            InstanceField::PluginName => return Err(unhandled(&edit.path)),
        };
        edit::apply(slot, edit.op, sub_path, edit.value.as_ref())
    }

    fn capability_name(&self, index: usize) -> Result<String, PatchError> {
        self.before
            .capabilities
            .get(index)
            .map(|c| c.name.clone())
            .ok_or(PatchError::IndexOutOfRange {
                list: "capabilities",
                index,
            })
    }

    fn instance_name(&self, index: usize) -> Result<String, PatchError> {
        self.before
            .instances
            .get(index)
            .map(|i| i.name.clone())
            .ok_or(PatchError::IndexOutOfRange {
                list: "instances",
                index,
            })
    }

    fn finish(mut self) -> Result<ConfigPatch, PatchError> {
        for (name, entry) in std::mem::take(&mut self.capabilities) {
            let op = match entry {
                CapabilityEntry::Create(value) => {
                    let path = format!("/capabilities/{name}");
                    CapabilityOp::from(typed::<keel_core::Capability>(value, path)?)
                }
                CapabilityEntry::Update(value) => {
                    let payload: CapabilityPayload =
                        typed(value, format!("/capabilities/{name}/payload"))?;
                    CapabilityOp::Update { name, payload }
                }
                CapabilityEntry::Delete => CapabilityOp::Delete { name },
            };
            self.patch.capabilities.push(op);
        }

        for (name, entry) in std::mem::take(&mut self.instances) {
            match entry {
                InstanceEntry::Create(value) => {
                    let instance: PluginInstance = typed(value, format!("/instances/{name}"))?;
                    self.patch.instances.push(instance.into());
                }
                InstanceEntry::Update(draft) => {
                    let op = finish_instance_update(name, draft)?;
                    self.patch.instances.push(op);
                }
                InstanceEntry::Delete => {
                    self.patch.instances.push(InstanceOp::Delete { name });
                }
                InstanceEntry::Replace => {
                    let instance = self.after.instance(&name).cloned().ok_or_else(|| {
                        PatchError::UnhandledPath {
                            path: format!("/instances/{name}/pluginName"),
                        }
                    })?;
                    self.patch.instances.push(InstanceOp::Delete { name });
                    self.patch.instances.push(instance.into());
                }
            }
        }

        Ok(self.patch)
    }
}

fn finish_instance_update(name: String, draft: InstanceDraft) -> Result<InstanceOp, PatchError> {
    let description = draft
        .description
        .map(|value| typed::<Option<String>>(value, format!("/instances/{name}/description")))
        .transpose()?;
    let config = draft
        .config
        .map(|value| typed::<Map<String, Value>>(value, format!("/instances/{name}/config")))
        .transpose()?;
    let capability_names = draft
        .capability_names
        .map(|value| typed::<Vec<String>>(value, format!("/instances/{name}/capabilityNames")))
        .transpose()?;
    Ok(InstanceOp::Update {
        name,
        description,
        config,
        capability_names,
    })
}

fn typed<T: DeserializeOwned>(value: Value, path: String) -> Result<T, PatchError> {
    serde_json::from_value(value).map_err(|source| PatchError::InvalidValue { path, source })
}

fn edit_value(edit: &Edit) -> Result<&Value, PatchError> {
    edit.value.as_ref().ok_or_else(|| PatchError::InvalidEdit {
        path: format_path(&edit.path),
        reason: "missing value".to_string(),
    })
}

fn element_name(value: &Value, path: &[Segment]) -> Result<String, PatchError> {
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PatchError::InvalidEdit {
            path: format_path(path),
            reason: "element has no name".to_string(),
        })
}

fn unhandled(path: &[Segment]) -> PatchError {
    PatchError::UnhandledPath {
        path: format_path(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(op: EditOp, path: Vec<Segment>, value: Option<Value>) -> Edit {
        Edit { op, path, value }
    }

    #[test]
    fn unknown_top_level_field_is_unhandled() {
        let doc = ConfigDocument::named("shop");
        let mut compiler = Compiler::new(&doc, &doc);
        let err = compiler
            .apply(&edit(
                EditOp::Replace,
                vec![Segment::Field("owner".to_string())],
                Some(Value::Null),
            ))
            .unwrap_err();
        assert!(matches!(err, PatchError::UnhandledPath { ref path } if path == "/owner"));
    }

    #[test]
    fn nested_capability_field_other_than_payload_is_unhandled() {
        let doc: ConfigDocument = serde_json::from_value(serde_json::json!({
            "name": "shop",
            "capabilities": [{"name": "db", "payload": {"__type__": "database", "schema": "a"}}]
        }))
        .unwrap();
        let mut compiler = Compiler::new(&doc, &doc);
        let err = compiler
            .apply(&edit(
                EditOp::Replace,
                vec![
                    Segment::Field("capabilities".to_string()),
                    Segment::Index(0),
                    Segment::Field("label".to_string()),
                ],
                Some(Value::Null),
            ))
            .unwrap_err();
        assert!(matches!(err, PatchError::UnhandledPath { .. }));
    }

    #[test]
    fn index_resolves_against_before_snapshot() {
        let doc = ConfigDocument::named("shop");
        let mut compiler = Compiler::new(&doc, &doc);
        let err = compiler
            .apply(&edit(
                EditOp::Remove,
                vec![Segment::Field("instances".to_string()), Segment::Index(2)],
                None,
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            PatchError::IndexOutOfRange {
                list: "instances",
                index: 2
            }
        ));
    }

    #[test]
    fn repeated_payload_edits_share_one_update() {
        let before: ConfigDocument = serde_json::from_value(serde_json::json!({
            "name": "shop",
            "capabilities": [{"name": "db", "payload": {"__type__": "database", "schema": "a"}}]
        }))
        .unwrap();
        let mut compiler = Compiler::new(&before, &before);
        let path = vec![
            Segment::Field("capabilities".to_string()),
            Segment::Index(0),
            Segment::Field("payload".to_string()),
            Segment::Field("schema".to_string()),
        ];
        compiler
            .apply(&edit(EditOp::Replace, path.clone(), Some("b".into())))
            .unwrap();
        compiler
            .apply(&edit(EditOp::Replace, path, Some("c".into())))
            .unwrap();
        let patch = compiler.finish().unwrap();
        assert_eq!(
            patch.capabilities,
            vec![CapabilityOp::Update {
                name: "db".to_string(),
                payload: CapabilityPayload::Database {
                    schema: "c".to_string()
                },
            }]
        );
    }
}
