// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Material model consumed by primitive groups and the render backend

/// Material identifier; 0 is the default/no-material group
pub type MaterialId = u32;

/// Id of the default material group
pub const DEFAULT_MATERIAL_ID: MaterialId = 0;

/// Opaque material handle bound to primitive groups
///
/// Texture decoding and GPU state live behind the render backend; the
/// core only tracks the queries the mesh engine and renderer need.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Display name, kept for serialization and tooling
    pub name: String,
    /// Diffuse RGBA color
    pub diffuse: [f32; 4],
    /// Opacity in [0, 1]; below 1 the material renders blended
    pub opacity: f32,
    textured: bool,
}

impl Material {
    pub fn new(name: impl Into<String>, diffuse: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            diffuse,
            opacity: 1.0,
            textured: false,
        }
    }

    pub fn with_texture(mut self) -> Self {
        self.textured = true;
        self
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn has_texture(&self) -> bool {
        self.textured
    }

    /// True when the material must render through the blending path
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0 || self.diffuse[3] < 1.0
    }
}

impl Default for Material {
    /// Neutral gray used for geometry without an assigned material
    fn default() -> Self {
        Self::new("default", [0.7, 0.7, 0.7, 1.0])
    }
}
