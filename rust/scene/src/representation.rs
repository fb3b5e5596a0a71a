// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric representation attached to a structure reference
//!
//! A tagged variant instead of downcasting: consumers match on the kind
//! and get its capabilities through typed methods.

use cadrep_geometry::{Geometry, MaterialId};
use rustc_hash::FxHashSet;

/// 3D body list with mesh-level capability queries
pub struct Rep3d {
    pub name: String,
    bodies: Vec<Box<dyn Geometry>>,
}

impl Rep3d {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bodies: Vec::new(),
        }
    }

    pub fn add_body(&mut self, body: Box<dyn Geometry>) {
        self.bodies.push(body);
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> &[Box<dyn Geometry>] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Box<dyn Geometry>] {
        &mut self.bodies
    }

    pub fn face_count(&self) -> usize {
        self.bodies.iter().map(|b| b.face_count()).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.bodies.iter().map(|b| b.vertex_count()).sum()
    }

    /// Distinct material ids used across all bodies
    pub fn material_set(&self) -> FxHashSet<MaterialId> {
        self.bodies
            .iter()
            .flat_map(|b| b.mesh().group_ids())
            .collect()
    }
}

impl Clone for Rep3d {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            bodies: self.bodies.iter().map(|b| b.boxed_clone()).collect(),
        }
    }
}

impl std::fmt::Debug for Rep3d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rep3d")
            .field("name", &self.name)
            .field("bodies", &self.bodies.len())
            .finish()
    }
}

/// Representation kinds a reference can carry
#[derive(Debug, Clone)]
pub enum Representation {
    Mesh3d(Rep3d),
}

impl Representation {
    pub fn face_count(&self) -> usize {
        match self {
            Representation::Mesh3d(rep) => rep.face_count(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Representation::Mesh3d(rep) => rep.vertex_count(),
        }
    }

    pub fn material_set(&self) -> FxHashSet<MaterialId> {
        match self {
            Representation::Mesh3d(rep) => rep.material_set(),
        }
    }

    pub fn body_count(&self) -> usize {
        match self {
            Representation::Mesh3d(rep) => rep.body_count(),
        }
    }
}
