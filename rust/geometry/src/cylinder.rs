// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Right circular cylinder along the +Z axis
//!
//! The side is one triangle strip around a closed ring of `discret + 1`
//! samples (the seam sample is doubled so texture coordinates stay
//! monotonic). Caps are triangle fans with axial normals on their own
//! vertices.

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::material::{MaterialId, DEFAULT_MATERIAL_ID};
use crate::mesh::MeshData;
use crate::transform::same_scalar;
use std::f64::consts::TAU;

/// Smallest accepted ring discretization
pub const MIN_DISCRETIZATION: u32 = 6;

const DEFAULT_DISCRETIZATION: u32 = 16;

/// Cylinder from z = 0 to z = length, centered on the Z axis
#[derive(Debug, Clone)]
pub struct Cylinder {
    radius: f64,
    length: f64,
    /// Ring sample count, never below `MIN_DISCRETIZATION`
    discret: u32,
    /// Generate the two end disks
    capped: bool,
    material: MaterialId,
    mesh: MeshData,
    dirty: bool,
}

impl Cylinder {
    pub fn new(radius: f64, length: f64) -> Result<Self> {
        if radius <= 0.0 {
            return Err(Error::Geometry(format!(
                "cylinder radius must be positive, got {radius}"
            )));
        }
        if length <= 0.0 {
            return Err(Error::Geometry(format!(
                "cylinder length must be positive, got {length}"
            )));
        }
        Ok(Self {
            radius,
            length,
            discret: DEFAULT_DISCRETIZATION,
            capped: true,
            material: DEFAULT_MATERIAL_ID,
            mesh: MeshData::new(),
            dirty: true,
        })
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn discret(&self) -> u32 {
        self.discret
    }

    #[inline]
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    #[inline]
    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<()> {
        if same_scalar(radius, self.radius) {
            return Ok(());
        }
        if radius <= 0.0 {
            return Err(Error::Geometry(format!(
                "cylinder radius must be positive, got {radius}"
            )));
        }
        self.radius = radius;
        self.dirty = true;
        Ok(())
    }

    pub fn set_length(&mut self, length: f64) -> Result<()> {
        if same_scalar(length, self.length) {
            return Ok(());
        }
        if length <= 0.0 {
            return Err(Error::Geometry(format!(
                "cylinder length must be positive, got {length}"
            )));
        }
        self.length = length;
        self.dirty = true;
        Ok(())
    }

    /// Ring sample count, clamped up to `MIN_DISCRETIZATION`
    pub fn set_discret(&mut self, discret: u32) {
        let discret = discret.max(MIN_DISCRETIZATION);
        if discret != self.discret {
            self.discret = discret;
            self.dirty = true;
        }
    }

    pub fn set_capped(&mut self, capped: bool) {
        if capped != self.capped {
            self.capped = capped;
            self.dirty = true;
        }
    }

    pub fn set_material(&mut self, material: MaterialId) {
        if material != self.material {
            self.material = material;
            self.dirty = true;
        }
    }

    fn build(&mut self) -> Result<()> {
        let d = self.discret as usize;
        let radius = self.radius;
        let length = self.length;

        let angles: Vec<(f64, f64)> = (0..=d)
            .map(|i| {
                let angle = TAU * i as f64 / d as f64;
                (angle.cos(), angle.sin())
            })
            .collect();

        let mut positions: Vec<f32> = Vec::new();
        let mut normals: Vec<f32> = Vec::new();
        let mut texels: Vec<f32> = Vec::new();

        // Side vertices: top/bottom pair per ring sample, radial normals
        for (i, &(cos, sin)) in angles.iter().enumerate() {
            let x = (radius * cos) as f32;
            let y = (radius * sin) as f32;
            let u = i as f32 / d as f32;

            positions.extend_from_slice(&[x, y, length as f32]);
            normals.extend_from_slice(&[cos as f32, sin as f32, 0.0]);
            texels.extend_from_slice(&[u, 1.0]);

            positions.extend_from_slice(&[x, y, 0.0]);
            normals.extend_from_slice(&[cos as f32, sin as f32, 0.0]);
            texels.extend_from_slice(&[u, 0.0]);
        }

        let side_strip: Vec<u32> = (0..2 * (d + 1) as u32).collect();

        if self.capped {
            // Bottom disk: center plus ring, all facing -z
            positions.extend_from_slice(&[0.0, 0.0, 0.0]);
            normals.extend_from_slice(&[0.0, 0.0, -1.0]);
            texels.extend_from_slice(&[0.5, 0.5]);
            for &(cos, sin) in &angles {
                positions.extend_from_slice(&[(radius * cos) as f32, (radius * sin) as f32, 0.0]);
                normals.extend_from_slice(&[0.0, 0.0, -1.0]);
                texels.extend_from_slice(&[((cos + 1.0) / 2.0) as f32, ((sin + 1.0) / 2.0) as f32]);
            }

            // Top disk facing +z
            positions.extend_from_slice(&[0.0, 0.0, length as f32]);
            normals.extend_from_slice(&[0.0, 0.0, 1.0]);
            texels.extend_from_slice(&[0.5, 0.5]);
            for &(cos, sin) in &angles {
                positions.extend_from_slice(&[
                    (radius * cos) as f32,
                    (radius * sin) as f32,
                    length as f32,
                ]);
                normals.extend_from_slice(&[0.0, 0.0, 1.0]);
                texels.extend_from_slice(&[((cos + 1.0) / 2.0) as f32, ((sin + 1.0) / 2.0) as f32]);
            }
        }

        self.mesh.add_vertices(&positions)?;
        self.mesh.add_normals(&normals)?;
        self.mesh.add_texels(&texels)?;

        self.mesh.add_strip(self.material, &side_strip, 0)?;

        if self.capped {
            let bottom_center = 2 * (d + 1) as u32;
            // Ring walked backwards so the fan faces -z
            let mut bottom_fan = Vec::with_capacity(d + 2);
            bottom_fan.push(bottom_center);
            for i in (0..=d as u32).rev() {
                bottom_fan.push(bottom_center + 1 + i);
            }
            self.mesh.add_fan(self.material, &bottom_fan, 1)?;

            let top_center = bottom_center + d as u32 + 2;
            let mut top_fan = Vec::with_capacity(d + 2);
            top_fan.push(top_center);
            for i in 0..=d as u32 {
                top_fan.push(top_center + 1 + i);
            }
            self.mesh.add_fan(self.material, &top_fan, 2)?;
        }

        // Wire: one circle per end
        for z in [0.0f32, length as f32] {
            let mut circle = Vec::with_capacity((d + 1) * 3);
            for &(cos, sin) in &angles {
                circle.extend_from_slice(&[(radius * cos) as f32, (radius * sin) as f32, z]);
            }
            self.mesh.add_wire_polyline(&circle)?;
        }

        self.mesh.finish()?;
        tracing::debug!(
            discret = self.discret,
            capped = self.capped,
            faces = self.mesh.face_count(),
            "cylinder generated"
        );
        Ok(())
    }
}

impl Geometry for Cylinder {
    fn update(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.mesh.clear();
        self.build()?;
        self.dirty = false;
        Ok(true)
    }

    fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    fn bounding_box(&mut self) -> Result<crate::bounds::BoundingBox> {
        self.update()?;
        self.mesh.bounding_box()
    }

    fn boxed_clone(&self) -> Box<dyn Geometry> {
        Box::new(self.clone())
    }
}
