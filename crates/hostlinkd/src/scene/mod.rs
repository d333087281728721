//! In-memory stand-in for the host application's scene.
//!
//! The daemon binary drives this scene from its host loop so the command
//! surface can be exercised without a real 3D editor. Object naming follows
//! the editor's convention: a taken name gains a `.001`, `.002`, … suffix.

mod handlers;

use serde::{Deserialize, Serialize};

pub use self::handlers::{EXECUTE_CODE, builder, registry};

/// Scene-wide render engine reported by `get_scene_info`.
pub const DEFAULT_RENDER_ENGINE: &str = "BLENDER_EEVEE";

/// Object type as reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    /// Polygon mesh.
    Mesh,
    /// Camera.
    Camera,
    /// Light source.
    Light,
}

/// Mesh primitive used when creating objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Primitive {
    /// Axis-aligned cube with edge length `size`.
    Cube {
        /// Edge length.
        size: f64,
    },
    /// UV sphere.
    Sphere {
        /// Radius.
        radius: f64,
        /// Longitudinal segments.
        segments: u32,
        /// Latitudinal rings.
        ring_count: u32,
    },
    /// Closed cylinder with 32 sides.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Height.
        depth: f64,
    },
    /// Closed cone with 32 sides.
    Cone {
        /// Base radius.
        radius: f64,
        /// Height.
        depth: f64,
    },
    /// Square plane.
    Plane {
        /// Edge length.
        size: f64,
    },
    /// Torus.
    Torus {
        /// Distance from centre to tube centre.
        major_radius: f64,
        /// Tube radius.
        minor_radius: f64,
    },
}

const ROUND_SEGMENTS: u32 = 32;
const TORUS_MAJOR_SEGMENTS: u32 = 48;
const TORUS_MINOR_SEGMENTS: u32 = 12;

impl Primitive {
    /// Default object name for the primitive.
    #[must_use]
    pub const fn base_name(&self) -> &'static str {
        match self {
            Self::Cube { .. } => "Cube",
            Self::Sphere { .. } => "Sphere",
            Self::Cylinder { .. } => "Cylinder",
            Self::Cone { .. } => "Cone",
            Self::Plane { .. } => "Plane",
            Self::Torus { .. } => "Torus",
        }
    }

    /// Bounding box size before object scale is applied.
    #[must_use]
    pub fn extent(&self) -> [f64; 3] {
        match *self {
            Self::Cube { size } => [size; 3],
            Self::Sphere { radius, .. } => [radius * 2.0; 3],
            Self::Cylinder { radius, depth } | Self::Cone { radius, depth } => {
                [radius * 2.0, radius * 2.0, depth]
            }
            Self::Plane { size } => [size, size, 0.0],
            Self::Torus {
                major_radius,
                minor_radius,
            } => {
                let outer = (major_radius + minor_radius) * 2.0;
                [outer, outer, minor_radius * 2.0]
            }
        }
    }

    /// Vertex, edge and face counts of the generated mesh.
    #[must_use]
    pub const fn topology(&self) -> MeshStats {
        match *self {
            Self::Cube { .. } => MeshStats::new(8, 12, 6),
            Self::Sphere {
                segments,
                ring_count,
                ..
            } => MeshStats::new(
                segments * (ring_count - 1) + 2,
                segments * (ring_count - 1) + segments * ring_count,
                segments * ring_count,
            ),
            Self::Cylinder { .. } => {
                MeshStats::new(ROUND_SEGMENTS * 2, ROUND_SEGMENTS * 3, ROUND_SEGMENTS + 2)
            }
            Self::Cone { .. } => {
                MeshStats::new(ROUND_SEGMENTS + 1, ROUND_SEGMENTS * 2, ROUND_SEGMENTS + 1)
            }
            Self::Plane { .. } => MeshStats::new(4, 4, 1),
            Self::Torus { .. } => {
                let quads = TORUS_MAJOR_SEGMENTS * TORUS_MINOR_SEGMENTS;
                MeshStats::new(quads, quads * 2, quads)
            }
        }
    }
}

/// Mesh element counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Vertex count.
    pub vertices: u32,
    /// Edge count.
    pub edges: u32,
    /// Face count.
    pub faces: u32,
}

impl MeshStats {
    const fn new(vertices: u32, edges: u32, faces: u32) -> Self {
        Self {
            vertices,
            edges,
            faces,
        }
    }
}

/// One object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Unique object name.
    pub name: String,
    /// Object type as reported by the editor (`MESH`, `CAMERA`, `LIGHT`).
    pub kind: ObjectKind,
    /// Geometry for mesh objects.
    pub primitive: Option<Primitive>,
    /// World-space location.
    pub location: [f64; 3],
    /// Euler rotation in radians.
    pub rotation: [f64; 3],
    /// Per-axis scale.
    pub scale: [f64; 3],
    /// Whether the object is shown in the viewport.
    pub visible: bool,
    /// Name of the assigned material, if any.
    pub material: Option<String>,
}

impl SceneObject {
    /// Builds a mesh object at `location`.
    #[must_use]
    pub fn mesh(name: impl Into<String>, primitive: Primitive, location: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Mesh,
            primitive: Some(primitive),
            location,
            rotation: [0.0; 3],
            scale: [1.0; 3],
            visible: true,
            material: None,
        }
    }

    fn non_mesh(name: &str, kind: ObjectKind, location: [f64; 3], rotation: [f64; 3]) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            primitive: None,
            location,
            rotation,
            scale: [1.0; 3],
            visible: true,
            material: None,
        }
    }

    /// Bounding box size after scale.
    #[must_use]
    pub fn dimensions(&self) -> [f64; 3] {
        let extent = self.primitive.map_or([0.0; 3], |primitive| primitive.extent());
        [
            extent[0] * self.scale[0].abs(),
            extent[1] * self.scale[1].abs(),
            extent[2] * self.scale[2].abs(),
        ]
    }
}

const DEFAULT_BASE_COLOR: [f64; 4] = [0.8, 0.8, 0.8, 1.0];

/// A named material with a base colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material name.
    pub name: String,
    /// RGBA base colour.
    pub base_color: [f64; 4],
}

/// The host's document state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene name.
    pub name: String,
    /// Current frame.
    pub frame_current: u32,
    /// First frame of the playback range.
    pub frame_start: u32,
    /// Last frame of the playback range.
    pub frame_end: u32,
    /// Render engine identifier.
    pub render_engine: String,
    /// Objects in creation order.
    pub objects: Vec<SceneObject>,
    /// Materials in creation order.
    pub materials: Vec<Material>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            name: String::from("Scene"),
            frame_current: 1,
            frame_start: 1,
            frame_end: 250,
            render_engine: DEFAULT_RENDER_ENGINE.to_owned(),
            objects: vec![
                SceneObject::mesh("Cube", Primitive::Cube { size: 2.0 }, [0.0; 3]),
                SceneObject::non_mesh(
                    "Camera",
                    ObjectKind::Camera,
                    [7.36, -6.93, 4.96],
                    [1.109, 0.0, 0.815],
                ),
                SceneObject::non_mesh(
                    "Light",
                    ObjectKind::Light,
                    [4.08, 1.01, 5.90],
                    [0.650, 0.055, 1.866],
                ),
            ],
            materials: Vec::new(),
        }
    }
}

impl Scene {
    /// An empty scene with default settings.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            objects: Vec::new(),
            ..Self::default()
        }
    }

    /// Looks up an object by exact name.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    /// Looks up an object by exact name for modification.
    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|object| object.name == name)
    }

    /// Returns `base` if free, otherwise the first free `base.NNN`.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        if self.object(base).is_none() {
            return base.to_owned();
        }
        (1_u32..)
            .map(|suffix| format!("{base}.{suffix:03}"))
            .find(|candidate| self.object(candidate).is_none())
            .unwrap_or_else(|| base.to_owned())
    }

    /// Adds `object`, renaming it if its name is taken. Returns the final name.
    pub fn insert(&mut self, mut object: SceneObject) -> String {
        object.name = self.unique_name(&object.name);
        let name = object.name.clone();
        self.objects.push(object);
        name
    }

    /// Removes and returns the named object.
    pub fn remove(&mut self, name: &str) -> Option<SceneObject> {
        let index = self.objects.iter().position(|object| object.name == name)?;
        Some(self.objects.remove(index))
    }

    /// Named material, if the scene has one.
    #[must_use]
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|material| material.name == name)
    }

    /// Creates the named material when missing and applies `color` to it.
    ///
    /// New materials without a colour start light grey.
    pub fn apply_material(&mut self, name: &str, color: Option<[f64; 4]>) {
        if let Some(material) = self
            .materials
            .iter_mut()
            .find(|material| material.name == name)
        {
            if let Some(color) = color {
                material.base_color = color;
            }
            return;
        }
        self.materials.push(Material {
            name: name.to_owned(),
            base_color: color.unwrap_or(DEFAULT_BASE_COLOR),
        });
    }
}
