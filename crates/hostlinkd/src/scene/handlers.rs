//! Command handlers operating on the in-memory [`Scene`].

use std::fs;

use hostlink_wire::Params;
use serde_json::{Value, json};

use crate::dispatch::{HandlerError, HandlerRegistry, RegistryBuilder};

use super::{ObjectKind, Primitive, Scene, SceneObject};

type SceneHandler = fn(&mut Scene, &Params) -> Result<Value, HandlerError>;

/// Name of the privileged scripting command.
pub const EXECUTE_CODE: &str = "execute_code";

const STANDARD_COMMANDS: &[(&str, SceneHandler)] = &[
    ("get_scene_info", get_scene_info),
    ("get_object_info", get_object_info),
    ("create_object", create_object),
    ("delete_object", delete_object),
    ("move_object", move_object),
    ("scale_object", scale_object),
    ("rotate_object", rotate_object),
    ("set_material", set_material),
    ("save_file", save_file),
];

const MAX_SEGMENTS: u32 = 1024;

/// Builds the scene command table.
///
/// `execute_code` is always registered but only runs when
/// `allow_execute_code` is set.
#[must_use]
pub fn registry(allow_execute_code: bool) -> HandlerRegistry<Scene> {
    builder(allow_execute_code).build()
}

/// Scene command table that callers may extend before building.
#[must_use]
pub fn builder(allow_execute_code: bool) -> RegistryBuilder<Scene> {
    STANDARD_COMMANDS
        .iter()
        .fold(HandlerRegistry::builder(), |builder, &(name, handler)| {
            builder.register(name, handler)
        })
        .register_privileged(EXECUTE_CODE, execute_code)
        .allow_privileged(allow_execute_code)
}

fn standard_handler(name: &str) -> Option<SceneHandler> {
    STANDARD_COMMANDS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, handler)| handler)
}

fn get_scene_info(scene: &mut Scene, _params: &Params) -> Result<Value, HandlerError> {
    let objects: Vec<Value> = scene
        .objects
        .iter()
        .map(|object| {
            json!({
                "name": object.name,
                "type": object.kind,
                "location": object.location,
                "rotation": object.rotation,
                "scale": object.scale,
                "visible": object.visible,
            })
        })
        .collect();
    Ok(json!({
        "name": scene.name,
        "frame_current": scene.frame_current,
        "frame_start": scene.frame_start,
        "frame_end": scene.frame_end,
        "render_engine": scene.render_engine,
        "object_count": objects.len(),
        "objects": objects,
    }))
}

fn get_object_info(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let name = object_name(params).ok_or_else(|| HandlerError::new("Object name required"))?;
    let object = scene.object(name).ok_or_else(|| not_found(name))?;
    let mut info = json!({
        "name": object.name,
        "type": object.kind,
        "location": object.location,
        "rotation_euler": object.rotation,
        "scale": object.scale,
        "dimensions": object.dimensions(),
        "visible": object.visible,
        "material": object.material,
    });
    if let (Some(primitive), Some(fields)) = (object.primitive, info.as_object_mut()) {
        let stats = primitive.topology();
        fields.insert("vertices".into(), stats.vertices.into());
        fields.insert("edges".into(), stats.edges.into());
        fields.insert("faces".into(), stats.faces.into());
    }
    Ok(info)
}

fn create_object(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let kind = match params.get("type") {
        None | Some(Value::Null) => String::from("cube"),
        Some(Value::String(kind)) => kind.to_lowercase(),
        Some(_) => return Err(HandlerError::new("Object type must be a string")),
    };
    let location = optional_vector(params, "location")?.unwrap_or([0.0; 3]);
    let primitive = match kind.as_str() {
        "cube" => Primitive::Cube {
            size: number(params, "size", 2.0)?,
        },
        "sphere" => Primitive::Sphere {
            radius: number(params, "radius", 1.0)?,
            segments: segments(params, "segments", 32)?,
            ring_count: segments(params, "ring_count", 16)?,
        },
        "cylinder" => Primitive::Cylinder {
            radius: number(params, "radius", 1.0)?,
            depth: number(params, "depth", 2.0)?,
        },
        "cone" => Primitive::Cone {
            radius: number(params, "radius", 1.0)?,
            depth: number(params, "depth", 2.0)?,
        },
        "plane" => Primitive::Plane {
            size: number(params, "size", 2.0)?,
        },
        "torus" => Primitive::Torus {
            major_radius: number(params, "major_radius", 1.0)?,
            minor_radius: number(params, "minor_radius", 0.25)?,
        },
        other => return Err(HandlerError::new(format!("Unknown object type: {other}"))),
    };
    let requested = object_name(params).unwrap_or_else(|| primitive.base_name());
    let name = scene.insert(SceneObject::mesh(requested, primitive, location));
    Ok(json!({
        "name": name,
        "type": ObjectKind::Mesh,
        "location": location,
    }))
}

fn delete_object(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let name = object_name(params).ok_or_else(|| HandlerError::new("Object name required"))?;
    scene.remove(name).ok_or_else(|| not_found(name))?;
    Ok(json!({ "deleted": name }))
}

fn move_object(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let (name, value) = name_and(params, "location")?;
    let location = vector(value, "location")?;
    let object = scene.object_mut(name).ok_or_else(|| not_found(name))?;
    object.location = location;
    Ok(json!({ "name": name, "location": object.location }))
}

fn scale_object(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let (name, value) = name_and(params, "scale")?;
    let scale = match value.as_f64() {
        Some(uniform) => [uniform; 3],
        None => vector(value, "scale")?,
    };
    let object = scene.object_mut(name).ok_or_else(|| not_found(name))?;
    object.scale = scale;
    Ok(json!({ "name": name, "scale": object.scale }))
}

fn rotate_object(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let (name, value) = name_and(params, "rotation")?;
    let rotation = vector(value, "rotation")?;
    let object = scene.object_mut(name).ok_or_else(|| not_found(name))?;
    object.rotation = rotation;
    Ok(json!({ "name": name, "rotation": object.rotation }))
}

fn set_material(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let name = object_name(params).ok_or_else(|| HandlerError::new("Object name required"))?;
    if scene.object(name).is_none() {
        return Err(not_found(name));
    }
    let color = match params.get("color") {
        None | Some(Value::Null) => None,
        Some(value) => Some(rgba(value)?),
    };

    let material_name = format!("{name}_Material");
    scene.apply_material(&material_name, color);
    if let Some(object) = scene.object_mut(name) {
        object.material = Some(material_name.clone());
    }
    Ok(json!({ "object": name, "material": material_name }))
}

fn save_file(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let path = params
        .get("filepath")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| HandlerError::new("Filepath required"))?;
    let document = serde_json::to_vec_pretty(scene)
        .map_err(|error| HandlerError::new(format!("Failed to serialise scene: {error}")))?;
    fs::write(path, document)
        .map_err(|error| HandlerError::new(format!("Failed to save '{path}': {error}")))?;
    Ok(json!({ "saved": path }))
}

/// Runs a newline-separated script of `<command> <json params>` statements.
///
/// Blank lines and lines starting with `#` are skipped. Execution stops at
/// the first failing statement; earlier statements keep their effects.
fn execute_code(scene: &mut Scene, params: &Params) -> Result<Value, HandlerError> {
    let code = params
        .get("code")
        .and_then(Value::as_str)
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| HandlerError::new("Code required"))?;

    let mut results = Vec::new();
    for (index, raw) in code.lines().enumerate() {
        let statement = raw.trim();
        if statement.is_empty() || statement.starts_with('#') {
            continue;
        }
        let line = index + 1;
        let (command, arguments) = statement
            .split_once(char::is_whitespace)
            .unwrap_or((statement, ""));
        let handler = standard_handler(command).ok_or_else(|| {
            HandlerError::new(format!("line {line}: Unknown command: {command}"))
        })?;
        let statement_params = script_params(arguments.trim())
            .map_err(|error| HandlerError::new(format!("line {line}: {error}")))?;
        let result = handler(scene, &statement_params)
            .map_err(|error| HandlerError::new(format!("line {line}: {}", error.message())))?;
        results.push(json!({ "command": command, "result": result }));
    }
    Ok(json!({ "executed": results.len(), "results": results }))
}

fn script_params(arguments: &str) -> Result<Params, String> {
    if arguments.is_empty() {
        return Ok(Params::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) => Err(String::from("parameters must be a JSON object")),
        Err(error) => Err(format!("invalid parameters: {error}")),
    }
}

fn object_name(params: &Params) -> Option<&str> {
    params
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

fn name_and<'p>(params: &'p Params, field: &str) -> Result<(&'p str, &'p Value), HandlerError> {
    let name = object_name(params);
    let value = params.get(field).filter(|value| !value.is_null());
    match (name, value) {
        (Some(name), Some(value)) => Ok((name, value)),
        _ => Err(HandlerError::new(format!(
            "Object name and {field} required"
        ))),
    }
}

fn not_found(name: &str) -> HandlerError {
    HandlerError::new(format!("Object '{name}' not found"))
}

fn vector(value: &Value, field: &str) -> Result<[f64; 3], HandlerError> {
    let invalid = || HandlerError::new(format!("{field} must be a list of three numbers"));
    let items = value
        .as_array()
        .filter(|items| items.len() == 3)
        .ok_or_else(invalid)?;
    let mut vector = [0.0; 3];
    for (slot, item) in vector.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(invalid)?;
    }
    Ok(vector)
}

fn optional_vector(params: &Params, field: &str) -> Result<Option<[f64; 3]>, HandlerError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => vector(value, field).map(Some),
    }
}

fn rgba(value: &Value) -> Result<[f64; 4], HandlerError> {
    let invalid = || HandlerError::new("color must be a list of three or four numbers");
    let channels: Vec<f64> = value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<_>>()
        .ok_or_else(invalid)?;
    match channels.as_slice() {
        &[red, green, blue] => Ok([red, green, blue, 1.0]),
        &[red, green, blue, alpha] => Ok([red, green, blue, alpha]),
        _ => Err(invalid()),
    }
}

fn number(params: &Params, field: &str, default: f64) -> Result<f64, HandlerError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| HandlerError::new(format!("{field} must be a number"))),
    }
}

fn segments(params: &Params, field: &str, default: u32) -> Result<u32, HandlerError> {
    let value = match params.get(field) {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value.as_u64(),
    };
    value
        .and_then(|count| u32::try_from(count).ok())
        .filter(|count| (3..=MAX_SEGMENTS).contains(count))
        .ok_or_else(|| {
            HandlerError::new(format!(
                "{field} must be an integer between 3 and {MAX_SEGMENTS}"
            ))
        })
}
