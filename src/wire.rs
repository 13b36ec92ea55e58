//! Wire shapes exchanged between client, history and server.
//!
//! A [`CommandDescriptor`] is the serialized form of one command:
//!
//! ```text
//! { "name": "command.SetCellCommand", "isVolatile": false, "custom": ...,
//!   "itemId": 3, <command fields>, "undo": { <undo-only fields> } }
//! ```
//!
//! A [`ServerRequest`] is what a request command sends to the remote
//! authority: `{ "name": "command.server.*", "streamsheetId": 3, "info": {..} }`.

use crate::command::{CommandBase, CommandKind};
use crate::core::{CommandError, ItemId, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub name: String,
    #[serde(rename = "isVolatile", default)]
    pub is_volatile: bool,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub custom: JsonValue,
    #[serde(rename = "itemId", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub undo: JsonMap<String, JsonValue>,
    #[serde(flatten)]
    pub fields: JsonMap<String, JsonValue>,
}

impl CommandDescriptor {
    pub fn new(kind: CommandKind, base: &CommandBase) -> Self {
        Self {
            name: kind.wire_name().to_string(),
            is_volatile: base.is_volatile,
            custom: base.custom.clone(),
            item_id: None,
            undo: JsonMap::new(),
            fields: JsonMap::new(),
        }
    }

    pub fn with_item(mut self, item: ItemId) -> Self {
        self.item_id = Some(item);
        self
    }

    /// Merges the fields of a serializable struct into the descriptor body.
    pub fn with_fields<T: Serialize>(mut self, fields: &T) -> Result<Self> {
        merge_object(&self.name, &mut self.fields, fields)?;
        Ok(self)
    }

    pub fn with_undo<T: Serialize>(mut self, undo: &T) -> Result<Self> {
        merge_object(&self.name, &mut self.undo, undo)?;
        Ok(self)
    }

    pub fn base(&self) -> CommandBase {
        CommandBase {
            is_volatile: self.is_volatile,
            custom: self.custom.clone(),
        }
    }

    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_wire_name(&self.name)
    }

    pub fn require_item(&self) -> Result<ItemId> {
        self.item_id
            .ok_or_else(|| CommandError::malformed(&self.name, "missing itemId"))
    }

    pub fn fields_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(JsonValue::Object(self.fields.clone()))
            .map_err(|err| CommandError::malformed(&self.name, err))
    }

    /// `None` when the descriptor carries no undo data (never executed).
    pub fn undo_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if self.undo.is_empty() {
            return Ok(None);
        }
        serde_json::from_value(JsonValue::Object(self.undo.clone()))
            .map(Some)
            .map_err(|err| CommandError::malformed(&self.name, err))
    }
}

fn merge_object<T: Serialize>(
    name: &str,
    target: &mut JsonMap<String, JsonValue>,
    value: &T,
) -> Result<()> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => {
            target.extend(map);
            Ok(())
        }
        other => Err(CommandError::malformed(
            name,
            format!("expected an object, got {}", other),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRequest {
    pub name: String,
    pub streamsheet_id: ItemId,
    #[serde(default)]
    pub info: JsonValue,
}

impl ServerRequest {
    pub fn new(kind: CommandKind, streamsheet_id: ItemId, info: JsonValue) -> Self {
        Self {
            name: kind.wire_name().to_string(),
            streamsheet_id,
            info,
        }
    }

    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_wire_name(&self.name)
    }

    pub fn is_undo(&self) -> bool {
        self.info
            .get("undo")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}

/// Compact MessagePack frame for a descriptor.
pub fn encode_frame(descriptor: &CommandDescriptor) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(descriptor)?)
}

pub fn decode_frame(bytes: &[u8]) -> Result<CommandDescriptor> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// A whole history as one MessagePack array.
pub fn encode_history(descriptors: &[CommandDescriptor]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(descriptors)?)
}

pub fn decode_history(bytes: &[u8]) -> Result<Vec<CommandDescriptor>> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Reads a JSON array of descriptors.
pub fn read_history(path: impl AsRef<Path>) -> Result<Vec<CommandDescriptor>> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Writes descriptors as a JSON array, replacing the file atomically.
pub fn write_history(path: impl AsRef<Path>, descriptors: &[CommandDescriptor]) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, descriptors)?;
    file.flush()?;
    file.persist(path).map_err(|err| CommandError::IoError(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_flattens_fields() {
        let descriptor = CommandDescriptor::new(CommandKind::SetAttribute, &CommandBase::default())
            .with_item(ItemId(3))
            .with_fields(&json!({"attribute": "label", "value": "x"}))
            .unwrap()
            .with_undo(&json!({"value": null}))
            .unwrap();

        let wire = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(wire["name"], json!("command.SetAttributeCommand"));
        assert_eq!(wire["isVolatile"], json!(false));
        assert_eq!(wire["itemId"], json!(3));
        assert_eq!(wire["attribute"], json!("label"));
        assert!(wire.get("custom").is_none());
        assert_eq!(wire["value"], json!("x"));
        assert_eq!(wire["undo"]["value"], json!(null));

        let back: CommandDescriptor = serde_json::from_value(wire).unwrap();
        assert_eq!(back.item_id, Some(ItemId(3)));
        assert_eq!(back.fields.get("value"), Some(&json!("x")));
    }

    #[test]
    fn test_missing_optional_keys_default() {
        let back: CommandDescriptor =
            serde_json::from_value(json!({"name": "command.DeletePortCommand"})).unwrap();
        assert!(!back.is_volatile);
        assert!(back.custom.is_null());
        assert!(back.undo.is_empty());
        assert_eq!(back.undo_as::<JsonValue>().unwrap(), None);
    }

    #[test]
    fn test_msgpack_frame_round_trip() {
        let descriptor = CommandDescriptor::new(CommandKind::DetachEdge, &CommandBase::default())
            .with_item(ItemId(9))
            .with_fields(&json!({"end": "source"}))
            .unwrap();
        let bytes = encode_frame(&descriptor).unwrap();
        assert_eq!(decode_frame(&bytes).unwrap(), descriptor);
    }

    #[test]
    fn test_server_request_wire_shape() {
        let request = ServerRequest::new(
            CommandKind::ServerSetCells,
            ItemId(2),
            json!({"cells": [], "undo": true}),
        );
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["name"], json!("command.server.SetCellsCommand"));
        assert_eq!(wire["streamsheetId"], json!(2));
        assert!(request.is_undo());
    }
}
