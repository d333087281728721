//! Catalogue of tools exposed to the protocol client.
//!
//! Every tool maps onto the host command of the same name.

use serde::Serialize;
use serde_json::{Value, json};

/// A tool description as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool and host command name.
    pub name: &'static str,
    /// One-line summary shown to the client.
    pub description: &'static str,
    /// JSON Schema for the tool arguments.
    pub input_schema: Value,
}

impl Tool {
    fn new(name: &'static str, description: &'static str, input_schema: Value) -> Self {
        Self {
            name,
            description,
            input_schema,
        }
    }

    /// Argument names the schema marks as required.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }
}

fn vector(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "number"},
        "minItems": 3,
        "maxItems": 3,
        "description": description,
    })
}

fn object_name() -> Value {
    json!({"type": "string", "description": "Name of the object"})
}

/// Builds the full tool catalogue.
#[must_use]
pub fn catalogue() -> Vec<Tool> {
    vec![
        Tool::new(
            "get_scene_info",
            "Get information about the current scene and its objects",
            json!({"type": "object", "properties": {}}),
        ),
        Tool::new(
            "get_object_info",
            "Get detailed information about one object",
            json!({
                "type": "object",
                "properties": {"name": object_name()},
                "required": ["name"],
            }),
        ),
        Tool::new(
            "create_object",
            "Create a primitive mesh object in the scene",
            json!({
                "type": "object",
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": ["cube", "sphere", "cylinder", "cone", "plane", "torus"],
                        "default": "cube",
                        "description": "Primitive to create",
                    },
                    "name": {"type": "string", "description": "Name for the new object"},
                    "location": vector("Location [x, y, z] in 3D space"),
                    "size": {"type": "number", "default": 2.0, "description": "Cube or plane size"},
                    "radius": {"type": "number", "default": 1.0, "description": "Sphere, cylinder or cone radius"},
                    "depth": {"type": "number", "default": 2.0, "description": "Cylinder or cone depth"},
                    "segments": {"type": "integer", "default": 32, "minimum": 3, "maximum": 1024, "description": "Sphere segments"},
                    "ring_count": {"type": "integer", "default": 16, "minimum": 3, "maximum": 1024, "description": "Sphere rings"},
                    "major_radius": {"type": "number", "default": 1.0, "description": "Torus major radius"},
                    "minor_radius": {"type": "number", "default": 0.25, "description": "Torus minor radius"},
                },
            }),
        ),
        Tool::new(
            "delete_object",
            "Delete an object from the scene by name",
            json!({
                "type": "object",
                "properties": {"name": object_name()},
                "required": ["name"],
            }),
        ),
        Tool::new(
            "move_object",
            "Move an object to a new location",
            json!({
                "type": "object",
                "properties": {
                    "name": object_name(),
                    "location": vector("New location [x, y, z]"),
                },
                "required": ["name", "location"],
            }),
        ),
        Tool::new(
            "scale_object",
            "Scale an object uniformly or per axis",
            json!({
                "type": "object",
                "properties": {
                    "name": object_name(),
                    "scale": {
                        "oneOf": [
                            {"type": "number"},
                            vector("Per-axis scale [x, y, z]"),
                        ],
                        "description": "Uniform factor or per-axis scale",
                    },
                },
                "required": ["name", "scale"],
            }),
        ),
        Tool::new(
            "rotate_object",
            "Set an object's Euler rotation in radians",
            json!({
                "type": "object",
                "properties": {
                    "name": object_name(),
                    "rotation": vector("Rotation [x, y, z] in radians"),
                },
                "required": ["name", "rotation"],
            }),
        ),
        Tool::new(
            "set_material",
            "Assign a coloured material to an object",
            json!({
                "type": "object",
                "properties": {
                    "name": object_name(),
                    "color": {
                        "type": "array",
                        "items": {"type": "number", "minimum": 0, "maximum": 1},
                        "minItems": 3,
                        "maxItems": 4,
                        "description": "RGB or RGBA colour with components in [0, 1]",
                    },
                },
                "required": ["name"],
            }),
        ),
        Tool::new(
            "save_file",
            "Save the current scene to a file",
            json!({
                "type": "object",
                "properties": {
                    "filepath": {"type": "string", "description": "Destination path"},
                },
                "required": ["filepath"],
            }),
        ),
        Tool::new(
            "execute_code",
            "Run a script of commands in one host tick (host must allow it)",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Newline-separated `<command> <json params>` statements",
                    },
                },
                "required": ["code"],
            }),
        ),
    ]
}

/// Looks up a tool by name.
#[must_use]
pub fn find(name: &str) -> Option<Tool> {
    catalogue().into_iter().find(|tool| tool.name == name)
}
