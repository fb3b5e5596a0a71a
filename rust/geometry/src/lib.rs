//! CADRep Geometry Core
//!
//! Mesh container with per-material primitive groups, parametric
//! generators (extruded profiles, cylinders) using earcutr triangulation
//! and nalgebra for transforms.

pub mod bounds;
pub mod cylinder;
pub mod error;
pub mod extruded;
pub mod geometry;
pub mod material;
pub mod mesh;
pub mod primitive;
pub mod render;
pub mod serialize;
pub mod transform;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use bounds::BoundingBox;
pub use cylinder::Cylinder;
pub use error::{Error, Result};
pub use extruded::ExtrudedMesh;
pub use geometry::Geometry;
pub use material::{Material, MaterialId, DEFAULT_MATERIAL_ID};
pub use mesh::{MeshData, WireData};
pub use primitive::PrimitiveGroup;
pub use render::{RenderBackend, RenderMode, RenderProperties};
pub use serialize::{ByteReader, ByteWriter};
