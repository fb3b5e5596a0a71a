// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Render contract between the mesh engine and the external rasterizer
//!
//! The core never touches graphics state itself. It hands finished
//! primitive runs to a `RenderBackend` and wraps any native error code
//! the backend reports into `Error::Render`.

use crate::material::Material;

/// How geometry should be rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Filled triangles only
    #[default]
    Filled,
    /// Wire-frame line data only
    Wireframe,
    /// Filled triangles with the wire overlaid
    FilledWithEdges,
}

/// Per-draw configuration bundle consumed by `MeshData::draw`
#[derive(Debug, Clone, Default)]
pub struct RenderProperties {
    pub mode: RenderMode,
    /// Selection highlight requested by the scene layer
    pub selected: bool,
    /// Overrides every material's opacity when set
    pub transparency_override: Option<f32>,
    /// Overrides every material's diffuse color when set
    pub color_override: Option<[f32; 4]>,
}

impl RenderProperties {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Material actually bound for a group, with overrides applied
    pub fn effective_material(&self, material: &Material) -> Material {
        let mut effective = material.clone();
        if let Some(color) = self.color_override {
            effective.diffuse = color;
        }
        if let Some(opacity) = self.transparency_override {
            effective.set_opacity(opacity);
        }
        effective
    }
}

/// Native result reported by the rasterizer; `Err` carries its error code
pub type BackendResult = std::result::Result<(), i32>;

/// External rasterizer interface
///
/// By the time any draw method is called the owning mesh is finished:
/// vertex data is complete and index runs are immutable.
pub trait RenderBackend {
    /// Apply per-draw state (render mode, selection highlight)
    fn configure(&mut self, properties: &RenderProperties) -> BackendResult;

    /// Bind vertex/normal/texel arrays for the runs that follow
    fn bind_arrays(&mut self, positions: &[f32], normals: &[f32], texels: &[f32])
        -> BackendResult;

    fn bind_material(&mut self, material: &Material) -> BackendResult;

    fn draw_triangles(&mut self, indices: &[u32]) -> BackendResult;

    fn draw_strip(&mut self, indices: &[u32]) -> BackendResult;

    fn draw_fan(&mut self, indices: &[u32]) -> BackendResult;

    /// One polyline of packed xyz vertices from the wire store
    fn draw_polyline(&mut self, vertices: &[f32]) -> BackendResult;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_material_applies_overrides() {
        let material = Material::new("steel", [0.5, 0.5, 0.55, 1.0]);
        let props = RenderProperties {
            mode: RenderMode::Filled,
            selected: false,
            transparency_override: Some(0.25),
            color_override: Some([1.0, 0.0, 0.0, 1.0]),
        };

        let effective = props.effective_material(&material);
        assert_eq!(effective.diffuse, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(effective.opacity, 0.25);
        assert!(effective.is_transparent());
        // Source material untouched
        assert_eq!(material.opacity, 1.0);
    }

    #[test]
    fn test_no_overrides_is_a_plain_copy() {
        let material = Material::new("steel", [0.5, 0.5, 0.55, 1.0]);
        let props = RenderProperties::new(RenderMode::Wireframe);
        assert_eq!(props.effective_material(&material), material);
    }
}
