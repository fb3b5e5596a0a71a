// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common interface for parametric geometry generators
//!
//! A generator owns a `MeshData` it rebuilds on demand. Parameter setters
//! clear the mesh; `update` regenerates it lazily, so consumers can change
//! several parameters without paying for intermediate rebuilds.

use crate::bounds::BoundingBox;
use crate::error::Result;
use crate::mesh::MeshData;
use crate::render::{RenderBackend, RenderProperties};

/// Parametric geometry with a lazily rebuilt mesh
pub trait Geometry {
    /// Rebuild the mesh if a parameter change invalidated it.
    /// Returns `true` when a rebuild actually happened.
    fn update(&mut self) -> Result<bool>;

    /// The generated mesh; empty until the first `update`
    fn mesh(&self) -> &MeshData;

    /// Bounding box of the (re)generated mesh
    fn bounding_box(&mut self) -> Result<BoundingBox>;

    /// Clone behind the trait object, for deep-copying owners
    fn boxed_clone(&self) -> Box<dyn Geometry>;

    /// Regenerate if needed, then issue the mesh to the backend
    fn draw(
        &mut self,
        properties: &RenderProperties,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        self.update()?;
        self.mesh().draw(properties, backend)
    }

    fn vertex_count(&self) -> usize {
        self.mesh().vertex_count()
    }

    fn face_count(&self) -> usize {
        self.mesh().face_count()
    }
}

impl Clone for Box<dyn Geometry> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}
