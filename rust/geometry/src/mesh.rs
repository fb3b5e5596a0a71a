// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh engine: bulk vertex arrays plus per-material primitive groups
//!
//! Generators append flat vertex/normal/texel data and route index lists
//! into the group keyed by their material. `finish` freezes everything
//! into one shared index buffer with per-group byte offsets. The cached
//! bounding box and the wire store are invalidated through `clear`, the
//! single chokepoint every generator setter funnels through.

use crate::bounds::BoundingBox;
use crate::error::{Error, Result};
use crate::material::{Material, MaterialId};
use crate::primitive::PrimitiveGroup;
use crate::render::{BackendResult, RenderBackend, RenderMode, RenderProperties};
use crate::serialize::{ByteReader, ByteWriter};
use nalgebra::Point3;
use rustc_hash::FxHashMap;

/// Chunk id tag for serialized mesh engine state
pub const MESH_CHUNK_ID: u32 = 0xA702;

/// Line-segment store for non-filled rendering
///
/// Holds packed xyz runs; each run is one polyline.
#[derive(Debug, Clone, Default)]
pub struct WireData {
    verts: Vec<f32>,
    polyline_sizes: Vec<u32>,
}

impl WireData {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub fn polyline_count(&self) -> usize {
        self.polyline_sizes.len()
    }

    /// Append one polyline of packed xyz vertices (at least 2 points)
    pub fn add_polyline(&mut self, vertices: &[f32]) -> Result<()> {
        if vertices.len() < 6 || vertices.len() % 3 != 0 {
            return Err(Error::Geometry(format!(
                "polyline needs packed xyz data for at least 2 points, got {} floats",
                vertices.len()
            )));
        }
        self.verts.extend_from_slice(vertices);
        self.polyline_sizes.push((vertices.len() / 3) as u32);
        Ok(())
    }

    /// Iterate polylines as packed xyz slices
    pub fn polylines(&self) -> impl Iterator<Item = &[f32]> {
        let mut start = 0usize;
        self.polyline_sizes.iter().map(move |&size| {
            let end = start + size as usize * 3;
            let run = &self.verts[start..end];
            start = end;
            run
        })
    }

    pub fn clear(&mut self) {
        self.verts.clear();
        self.polyline_sizes.clear();
    }
}

/// Mesh engine owning bulk arrays, material registry and primitive groups
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    positions: Vec<f32>,
    normals: Vec<f32>,
    texels: Vec<f32>,
    /// Shared index buffer, laid out at finish in group order
    index: Vec<u32>,
    groups: FxHashMap<MaterialId, PrimitiveGroup>,
    materials: FxHashMap<MaterialId, Material>,
    wire: WireData,
    bbox: Option<BoundingBox>,
    finished: bool,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.groups.is_empty() && self.wire.is_empty()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Triangle count across all groups, strips and fans included
    pub fn face_count(&self) -> usize {
        self.groups
            .values()
            .map(|g| {
                g.triangles_index_size() / 3
                    + g.strips_sizes().iter().map(|&s| s as usize - 2).sum::<usize>()
                    + g.fans_sizes().iter().map(|&s| s as usize - 2).sum::<usize>()
            })
            .sum()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    pub fn wire(&self) -> &WireData {
        &self.wire
    }

    /// Material ids that own a primitive group, in ascending order
    pub fn group_ids(&self) -> Vec<MaterialId> {
        let mut ids: Vec<MaterialId> = self.groups.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn group(&self, id: MaterialId) -> Option<&PrimitiveGroup> {
        self.groups.get(&id)
    }

    /// Register the material bound to a group id
    pub fn set_material(&mut self, id: MaterialId, material: Material) {
        self.materials.insert(id, material);
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    fn ensure_editable(&self, operation: &'static str) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState(operation));
        }
        Ok(())
    }

    /// Append packed xyz vertex data
    pub fn add_vertices(&mut self, vertices: &[f32]) -> Result<()> {
        self.ensure_editable("add_vertices on finished mesh")?;
        if vertices.len() % 3 != 0 {
            return Err(Error::Geometry(format!(
                "vertex data must be packed xyz, got {} floats",
                vertices.len()
            )));
        }
        self.positions.extend_from_slice(vertices);
        self.bbox = None;
        Ok(())
    }

    /// Append packed xyz normal data
    pub fn add_normals(&mut self, normals: &[f32]) -> Result<()> {
        self.ensure_editable("add_normals on finished mesh")?;
        if normals.len() % 3 != 0 {
            return Err(Error::Geometry(format!(
                "normal data must be packed xyz, got {} floats",
                normals.len()
            )));
        }
        self.normals.extend_from_slice(normals);
        Ok(())
    }

    /// Append packed uv texel data
    pub fn add_texels(&mut self, texels: &[f32]) -> Result<()> {
        self.ensure_editable("add_texels on finished mesh")?;
        if texels.len() % 2 != 0 {
            return Err(Error::Geometry(format!(
                "texel data must be packed uv, got {} floats",
                texels.len()
            )));
        }
        self.texels.extend_from_slice(texels);
        Ok(())
    }

    fn group_mut(&mut self, material: MaterialId) -> &mut PrimitiveGroup {
        self.groups
            .entry(material)
            .or_insert_with(|| PrimitiveGroup::new(material))
    }

    /// Route triangle indices into the group of `material`, creating the
    /// group on first use of the id
    pub fn add_triangles(&mut self, material: MaterialId, indices: &[u32]) -> Result<()> {
        self.ensure_editable("add_triangles on finished mesh")?;
        self.bbox = None;
        self.group_mut(material).add_triangles(indices)
    }

    pub fn add_strip(&mut self, material: MaterialId, indices: &[u32], id: u32) -> Result<()> {
        self.ensure_editable("add_strip on finished mesh")?;
        self.bbox = None;
        self.group_mut(material).add_strip(indices, id)
    }

    pub fn add_fan(&mut self, material: MaterialId, indices: &[u32], id: u32) -> Result<()> {
        self.ensure_editable("add_fan on finished mesh")?;
        self.bbox = None;
        self.group_mut(material).add_fan(indices, id)
    }

    /// Append one wire polyline (packed xyz)
    pub fn add_wire_polyline(&mut self, vertices: &[f32]) -> Result<()> {
        self.ensure_editable("add_wire_polyline on finished mesh")?;
        self.wire.add_polyline(vertices)
    }

    /// Freeze the mesh: build the shared index buffer, convert every
    /// group to offset mode and finish it. Irreversible short of `clear`.
    pub fn finish(&mut self) -> Result<()> {
        self.ensure_editable("mesh finished twice")?;
        if self.positions.is_empty() {
            return Err(Error::InvalidState("finish on empty mesh"));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(Error::Geometry(format!(
                "normal count {} does not match vertex count {}",
                self.normals.len() / 3,
                self.positions.len() / 3
            )));
        }
        if !self.texels.is_empty() && self.texels.len() / 2 != self.positions.len() / 3 {
            return Err(Error::Geometry(format!(
                "texel count {} does not match vertex count {}",
                self.texels.len() / 2,
                self.positions.len() / 3
            )));
        }

        let mut byte_cursor = 0usize;
        for id in self.group_ids() {
            let Some(group) = self.groups.get_mut(&id) else {
                continue;
            };
            self.index.extend_from_slice(group.triangles_index()?);
            self.index.extend_from_slice(group.strips_index()?);
            self.index.extend_from_slice(group.fans_index()?);
            group.change_to_vbo_mode(&mut byte_cursor)?;
            group.finish()?;
        }

        self.finished = true;
        self.bounding_box()?;
        tracing::debug!(
            vertices = self.vertex_count(),
            faces = self.face_count(),
            groups = self.groups.len(),
            "mesh finished"
        );
        Ok(())
    }

    /// Lazily computed bounding box over all vertex positions
    pub fn bounding_box(&mut self) -> Result<BoundingBox> {
        if let Some(bbox) = self.bbox {
            return Ok(bbox);
        }
        if self.positions.is_empty() {
            return Err(Error::InvalidState("bounding box of empty mesh"));
        }

        let mut bbox = BoundingBox::new();
        self.positions.chunks_exact(3).for_each(|chunk| {
            bbox.combine(Point3::new(
                chunk[0] as f64,
                chunk[1] as f64,
                chunk[2] as f64,
            ));
        });
        self.bbox = Some(bbox);
        Ok(bbox)
    }

    /// Invalidate mesh, wire and bounding box; the invalidation
    /// chokepoint every generative setter must reach.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.texels.clear();
        self.index.clear();
        self.groups.clear();
        self.wire.clear();
        self.bbox = None;
        self.finished = false;
    }

    fn checked(operation: &'static str, result: BackendResult) -> Result<()> {
        result.map_err(|code| Error::Render { operation, code })
    }

    /// Index run of a group slice given its byte offset and length
    fn index_run(&self, byte_offset: usize, len: usize) -> &[u32] {
        let start = byte_offset / std::mem::size_of::<u32>();
        &self.index[start..start + len]
    }

    /// Issue the finished mesh to the render backend
    pub fn draw(&self, properties: &RenderProperties, backend: &mut dyn RenderBackend) -> Result<()> {
        if !self.finished {
            return Err(Error::InvalidState("draw before finish"));
        }

        Self::checked("configure", backend.configure(properties))?;

        if properties.mode != RenderMode::Wireframe {
            Self::checked(
                "bind_arrays",
                backend.bind_arrays(&self.positions, &self.normals, &self.texels),
            )?;

            let default_material = Material::default();
            for id in self.group_ids() {
                let group = &self.groups[&id];
                let material = self.materials.get(&id).unwrap_or(&default_material);
                let effective = properties.effective_material(material);
                Self::checked("bind_material", backend.bind_material(&effective))?;

                if group.contains_triangles() {
                    let run =
                        self.index_run(group.triangles_offset()?, group.triangles_index_size());
                    Self::checked("draw_triangles", backend.draw_triangles(run))?;
                }
                for (&offset, &size) in group.strips_offsets()?.iter().zip(group.strips_sizes()) {
                    let run = self.index_run(offset, size as usize);
                    Self::checked("draw_strip", backend.draw_strip(run))?;
                }
                for (&offset, &size) in group.fans_offsets()?.iter().zip(group.fans_sizes()) {
                    let run = self.index_run(offset, size as usize);
                    Self::checked("draw_fan", backend.draw_fan(run))?;
                }
            }
        }

        if properties.mode != RenderMode::Filled {
            for polyline in self.wire.polylines() {
                Self::checked("draw_polyline", backend.draw_polyline(polyline))?;
            }
        }

        Ok(())
    }

    /// Serialize the editable state; a finished mesh has dropped its
    /// group contents and can no longer be written.
    pub fn write_to(&self, writer: &mut ByteWriter) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidState("serialization of finished mesh"));
        }

        writer.write_chunk_id(MESH_CHUNK_ID);
        writer.write_f32_slice(&self.positions);
        writer.write_f32_slice(&self.normals);
        writer.write_f32_slice(&self.texels);
        writer.write_f32_slice(&self.wire.verts);
        writer.write_u32_slice(&self.wire.polyline_sizes);

        let mut material_ids: Vec<MaterialId> = self.materials.keys().copied().collect();
        material_ids.sort_unstable();
        writer.write_u32(material_ids.len() as u32);
        for id in material_ids {
            let material = &self.materials[&id];
            writer.write_u32(id);
            writer.write_string(&material.name);
            for component in material.diffuse {
                writer.write_f32(component);
            }
            writer.write_f32(material.opacity);
            writer.write_u8(material.has_texture() as u8);
        }

        let group_ids = self.group_ids();
        writer.write_u32(group_ids.len() as u32);
        for id in group_ids {
            self.groups[&id].write_to(writer)?;
        }
        Ok(())
    }

    pub fn read_from(reader: &mut ByteReader) -> Result<Self> {
        reader.expect_chunk_id(MESH_CHUNK_ID)?;
        let positions = reader.read_f32_vec()?;
        let normals = reader.read_f32_vec()?;
        let texels = reader.read_f32_vec()?;
        let wire_verts = reader.read_f32_vec()?;
        let wire_sizes = reader.read_u32_vec()?;

        if wire_sizes.iter().map(|&s| s as usize * 3).sum::<usize>() != wire_verts.len() {
            return Err(Error::Corrupt(
                "wire polyline sizes disagree with vertex data".into(),
            ));
        }

        let mut materials = FxHashMap::default();
        let material_count = reader.read_u32()? as usize;
        for _ in 0..material_count {
            let id = reader.read_u32()?;
            let name = reader.read_string()?;
            let mut diffuse = [0.0f32; 4];
            for component in &mut diffuse {
                *component = reader.read_f32()?;
            }
            let opacity = reader.read_f32()?;
            let textured = reader.read_u8()? != 0;
            let mut material = Material::new(name, diffuse);
            material.set_opacity(opacity);
            if textured {
                material = material.with_texture();
            }
            materials.insert(id, material);
        }

        let mut groups = FxHashMap::default();
        let group_count = reader.read_u32()? as usize;
        for _ in 0..group_count {
            let group = PrimitiveGroup::read_from(reader)?;
            groups.insert(group.id(), group);
        }

        Ok(Self {
            positions,
            normals,
            texels,
            index: Vec::new(),
            groups,
            materials,
            wire: WireData {
                verts: wire_verts,
                polyline_sizes: wire_sizes,
            },
            bbox: None,
            finished: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::RecordingBackend;
    use approx::assert_relative_eq;

    fn quad_mesh() -> MeshData {
        let mut mesh = MeshData::new();
        mesh.add_vertices(&[
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ])
        .unwrap();
        mesh.add_normals(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0])
            .unwrap();
        mesh.add_triangles(0, &[0, 1, 2, 0, 2, 3]).unwrap();
        mesh
    }

    #[test]
    fn test_group_auto_created_per_material() {
        let mut mesh = MeshData::new();
        mesh.add_triangles(0, &[0, 1, 2]).unwrap();
        mesh.add_strip(7, &[0, 1, 2, 3], 1).unwrap();
        mesh.add_fan(7, &[4, 0, 1, 2], 2).unwrap();

        assert_eq!(mesh.group_ids(), vec![0, 7]);
        assert_eq!(mesh.face_count(), 1 + 2 + 2);
    }

    #[test]
    fn test_finish_freezes_groups_with_disjoint_offsets() {
        let mut mesh = quad_mesh();
        mesh.add_strip(3, &[0, 3, 1, 2], 1).unwrap();
        mesh.finish().unwrap();
        assert!(mesh.is_finished());

        let first = mesh.group(0).unwrap();
        let second = mesh.group(3).unwrap();
        assert!(first.is_finished() && second.is_finished());
        assert_eq!(first.triangles_offset().unwrap(), 0);
        // Group 3 starts right after group 0's six triangle indices
        assert_eq!(second.strips_offsets().unwrap(), &[24]);

        assert!(mesh.add_vertices(&[0.0; 3]).is_err());
        assert!(mesh.add_triangles(0, &[0, 1, 2]).is_err());
        assert!(mesh.finish().is_err());
    }

    #[test]
    fn test_finish_rejects_mismatched_attribute_counts() {
        let mut mesh = MeshData::new();
        mesh.add_vertices(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        mesh.add_normals(&[0.0, 0.0, 1.0]).unwrap();
        assert!(matches!(mesh.finish(), Err(Error::Geometry(_))));
    }

    #[test]
    fn test_bounding_box_is_lazy_and_invalidated() {
        let mut mesh = quad_mesh();
        let bbox = mesh.bounding_box().unwrap();
        assert_relative_eq!(bbox.upper().unwrap().x, 1.0);

        mesh.add_vertices(&[5.0, -2.0, 3.0]).unwrap();
        let grown = mesh.bounding_box().unwrap();
        assert_relative_eq!(grown.upper().unwrap().x, 5.0);
        assert_relative_eq!(grown.lower().unwrap().y, -2.0);
        assert_relative_eq!(grown.upper().unwrap().z, 3.0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut mesh = quad_mesh();
        mesh.add_wire_polyline(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        mesh.finish().unwrap();

        mesh.clear();
        assert!(mesh.is_empty());
        assert!(!mesh.is_finished());
        assert!(mesh.bounding_box().is_err());
    }

    #[test]
    fn test_draw_issues_groups_and_wire() {
        let mut mesh = quad_mesh();
        mesh.set_material(0, Material::new("paint", [1.0, 0.0, 0.0, 1.0]));
        mesh.add_wire_polyline(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0])
            .unwrap();
        mesh.finish().unwrap();

        let mut backend = RecordingBackend::default();
        let props = RenderProperties::new(RenderMode::FilledWithEdges);
        mesh.draw(&props, &mut backend).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                "configure FilledWithEdges",
                "bind_arrays 12 12 0",
                "bind_material paint",
                "draw_triangles 6",
                "draw_polyline 9",
            ]
        );
    }

    #[test]
    fn test_draw_before_finish_is_invalid() {
        let mesh = quad_mesh();
        let mut backend = RecordingBackend::default();
        let props = RenderProperties::default();
        assert!(matches!(
            mesh.draw(&props, &mut backend),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_backend_failure_is_wrapped_with_operation_and_code() {
        let mut mesh = quad_mesh();
        mesh.finish().unwrap();

        let mut backend = RecordingBackend {
            fail_on: Some("draw_triangles"),
            fail_code: 1281,
            ..Default::default()
        };
        let err = mesh
            .draw(&RenderProperties::default(), &mut backend)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Render {
                operation: "draw_triangles",
                code: 1281
            }
        ));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut mesh = quad_mesh();
        mesh.set_material(0, Material::new("paint", [1.0, 0.0, 0.0, 0.5]));
        mesh.add_wire_polyline(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();

        let mut writer = ByteWriter::new();
        mesh.write_to(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let mut restored = MeshData::read_from(&mut reader).unwrap();
        assert_eq!(restored.positions(), mesh.positions());
        assert_eq!(restored.normals(), mesh.normals());
        assert_eq!(restored.group_ids(), mesh.group_ids());
        assert_eq!(restored.wire().polyline_count(), 1);
        assert_eq!(restored.material(0).unwrap().name, "paint");
        assert!(restored.material(0).unwrap().is_transparent());

        // The restored mesh is editable and can be finished
        restored.finish().unwrap();
    }

    #[test]
    fn test_serialization_rejects_wrong_chunk_id() {
        let mut writer = ByteWriter::new();
        writer.write_chunk_id(0xA701);
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            MeshData::read_from(&mut reader),
            Err(Error::ChunkMismatch { .. })
        ));
    }

    #[test]
    fn test_finished_mesh_cannot_be_serialized() {
        let mut mesh = quad_mesh();
        mesh.finish().unwrap();
        let mut writer = ByteWriter::new();
        assert!(mesh.write_to(&mut writer).is_err());
    }
}
