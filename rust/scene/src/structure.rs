// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structure references and their placed instances
//!
//! One arena owns every reference and instance and keys them by id, so
//! registration bookkeeping cannot go stale: creating an instance records
//! its id in the owning reference, removing it erases that record, and
//! nothing else holds a back-pointer.

use crate::error::{Error, Result};
use crate::representation::Representation;
use cadrep_geometry::{BoundingBox, Geometry, MaterialId, Matrix4};
use rustc_hash::{FxHashMap, FxHashSet};

/// Handle to a structure reference owned by the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceId(u32);

impl ReferenceId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Handle to a placed instance owned by the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Shared definition: a name, at most one representation, and the set of
/// instances currently placed from it
#[derive(Debug)]
pub struct StructReference {
    name: String,
    representation: Option<Representation>,
    instances: FxHashSet<InstanceId>,
}

impl StructReference {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn representation(&self) -> Option<&Representation> {
        self.representation.as_ref()
    }

    #[inline]
    pub fn has_instances(&self) -> bool {
        !self.instances.is_empty()
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// One placement of a reference
#[derive(Debug)]
pub struct StructInstance {
    name: String,
    reference: ReferenceId,
    placement: Matrix4<f64>,
}

impl StructInstance {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn reference(&self) -> ReferenceId {
        self.reference
    }

    pub fn placement(&self) -> &Matrix4<f64> {
        &self.placement
    }
}

/// Owner of all references and instances
///
/// Lazy geometry caches inside representations rebuild on demand, so
/// shared mutation across threads needs external serialization.
#[derive(Debug, Default)]
pub struct StructureArena {
    references: FxHashMap<ReferenceId, StructReference>,
    instances: FxHashMap<InstanceId, StructInstance>,
    next_id: u32,
}

impl StructureArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_reference(&mut self, name: impl Into<String>) -> ReferenceId {
        let id = ReferenceId(self.next_id());
        self.references.insert(
            id,
            StructReference {
                name: name.into(),
                representation: None,
                instances: FxHashSet::default(),
            },
        );
        id
    }

    pub fn reference(&self, id: ReferenceId) -> Result<&StructReference> {
        self.references
            .get(&id)
            .ok_or(Error::UnknownReference(id.0))
    }

    fn reference_mut(&mut self, id: ReferenceId) -> Result<&mut StructReference> {
        self.references
            .get_mut(&id)
            .ok_or(Error::UnknownReference(id.0))
    }

    pub fn instance(&self, id: InstanceId) -> Result<&StructInstance> {
        self.instances.get(&id).ok_or(Error::UnknownInstance(id.0))
    }

    /// Deep-copy a representation into the reference; each reference
    /// carries exactly one.
    pub fn set_representation(
        &mut self,
        id: ReferenceId,
        representation: &Representation,
    ) -> Result<()> {
        let reference = self.reference_mut(id)?;
        if reference.representation.is_some() {
            return Err(Error::RepresentationAlreadySet(id.0));
        }
        reference.representation = Some(representation.clone());
        Ok(())
    }

    pub fn has_representation(&self, id: ReferenceId) -> Result<bool> {
        Ok(self.reference(id)?.representation.is_some())
    }

    /// Place a new instance of `reference`, registering it with its owner
    pub fn create_instance(&mut self, reference: ReferenceId) -> Result<InstanceId> {
        // Resolve the owner first so a stale id cannot mint an instance
        let name = self.reference(reference)?.name.clone();
        let id = InstanceId(self.next_id());
        self.instances.insert(
            id,
            StructInstance {
                name,
                reference,
                placement: Matrix4::identity(),
            },
        );
        self.reference_mut(reference)?.instances.insert(id);
        tracing::debug!(
            instance = id.0,
            reference = reference.0,
            "instance created"
        );
        Ok(id)
    }

    /// Remove an instance and unregister it from its reference
    pub fn remove_instance(&mut self, id: InstanceId) -> Result<()> {
        let instance = self
            .instances
            .remove(&id)
            .ok_or(Error::UnknownInstance(id.0))?;
        if let Some(owner) = self.references.get_mut(&instance.reference) {
            owner.instances.remove(&id);
        }
        tracing::debug!(
            instance = id.0,
            reference = instance.reference.0,
            "instance removed"
        );
        Ok(())
    }

    pub fn has_instances(&self, id: ReferenceId) -> Result<bool> {
        Ok(self.reference(id)?.has_instances())
    }

    pub fn instance_count(&self, id: ReferenceId) -> Result<usize> {
        Ok(self.reference(id)?.instance_count())
    }

    /// Instance ids placed from `id`, in creation order
    pub fn instances_of(&self, id: ReferenceId) -> Result<Vec<InstanceId>> {
        let mut ids: Vec<InstanceId> = self.reference(id)?.instances.iter().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn set_placement(&mut self, id: InstanceId, placement: Matrix4<f64>) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(Error::UnknownInstance(id.0))?;
        instance.placement = placement;
        Ok(())
    }

    /// Faces across the reference's representation; 0 without one
    pub fn reference_face_count(&self, id: ReferenceId) -> Result<usize> {
        Ok(self
            .reference(id)?
            .representation
            .as_ref()
            .map_or(0, |rep| rep.face_count()))
    }

    pub fn reference_vertex_count(&self, id: ReferenceId) -> Result<usize> {
        Ok(self
            .reference(id)?
            .representation
            .as_ref()
            .map_or(0, |rep| rep.vertex_count()))
    }

    pub fn reference_body_count(&self, id: ReferenceId) -> Result<usize> {
        Ok(self
            .reference(id)?
            .representation
            .as_ref()
            .map_or(0, |rep| rep.body_count()))
    }

    pub fn reference_material_set(&self, id: ReferenceId) -> Result<FxHashSet<MaterialId>> {
        Ok(self
            .reference(id)?
            .representation
            .as_ref()
            .map(|rep| rep.material_set())
            .unwrap_or_default())
    }

    /// World-space bounding box of one instance: the union of its
    /// reference's body boxes mapped through the placement. Empty when
    /// the reference has no representation.
    pub fn instance_bounding_box(&mut self, id: InstanceId) -> Result<BoundingBox> {
        let (reference, placement) = {
            let instance = self.instances.get(&id).ok_or(Error::UnknownInstance(id.0))?;
            (instance.reference, instance.placement)
        };

        let owner = self
            .references
            .get_mut(&reference)
            .ok_or(Error::UnknownReference(reference.0))?;

        let mut bbox = BoundingBox::new();
        if let Some(Representation::Mesh3d(rep)) = owner.representation.as_mut() {
            for body in rep.bodies_mut() {
                bbox.combine_box(&body.bounding_box()?);
            }
        }
        bbox.transform(&placement);
        Ok(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::Rep3d;
    use approx::assert_relative_eq;
    use cadrep_geometry::{transform, ExtrudedMesh, Point3, Vector3};

    fn square_rep() -> Representation {
        let square = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut prism = ExtrudedMesh::new(square, Vector3::z(), 2.0).unwrap();
        prism.update().unwrap();
        let mut rep = Rep3d::new("block");
        rep.add_body(Box::new(prism));
        Representation::Mesh3d(rep)
    }

    #[test]
    fn test_instances_register_and_unregister() {
        let mut arena = StructureArena::new();
        let block = arena.add_reference("block");
        assert!(!arena.has_instances(block).unwrap());

        let first = arena.create_instance(block).unwrap();
        let second = arena.create_instance(block).unwrap();
        assert_eq!(arena.instance_count(block).unwrap(), 2);
        assert_eq!(arena.instances_of(block).unwrap(), vec![first, second]);
        assert_eq!(arena.instance(first).unwrap().reference(), block);
        assert_eq!(arena.instance(first).unwrap().name(), "block");

        arena.remove_instance(first).unwrap();
        assert_eq!(arena.instances_of(block).unwrap(), vec![second]);
        assert!(arena.instance(first).is_err());
        assert!(arena.remove_instance(first).is_err());

        arena.remove_instance(second).unwrap();
        assert!(!arena.has_instances(block).unwrap());
    }

    #[test]
    fn test_stale_ids_are_typed_errors() {
        let mut arena = StructureArena::new();
        let ghost = ReferenceId(99);
        assert!(matches!(
            arena.create_instance(ghost),
            Err(Error::UnknownReference(99))
        ));
        assert!(matches!(
            arena.reference(ghost),
            Err(Error::UnknownReference(99))
        ));
        assert!(matches!(
            arena.instance_bounding_box(InstanceId(7)),
            Err(Error::UnknownInstance(7))
        ));
    }

    #[test]
    fn test_representation_can_only_be_set_once() {
        let mut arena = StructureArena::new();
        let block = arena.add_reference("block");
        assert!(!arena.has_representation(block).unwrap());

        let rep = square_rep();
        arena.set_representation(block, &rep).unwrap();
        assert!(arena.has_representation(block).unwrap());
        assert!(matches!(
            arena.set_representation(block, &rep),
            Err(Error::RepresentationAlreadySet(_))
        ));
    }

    #[test]
    fn test_capability_passthrough_defaults_to_zero() {
        let mut arena = StructureArena::new();
        let bare = arena.add_reference("bare");
        assert_eq!(arena.reference_face_count(bare).unwrap(), 0);
        assert_eq!(arena.reference_vertex_count(bare).unwrap(), 0);
        assert_eq!(arena.reference_body_count(bare).unwrap(), 0);
        assert!(arena.reference_material_set(bare).unwrap().is_empty());

        let block = arena.add_reference("block");
        arena.set_representation(block, &square_rep()).unwrap();
        assert_eq!(arena.reference_face_count(block).unwrap(), 12);
        assert_eq!(arena.reference_body_count(block).unwrap(), 1);
    }

    #[test]
    fn test_instance_bounding_box_applies_placement() {
        let mut arena = StructureArena::new();
        let block = arena.add_reference("block");
        arena.set_representation(block, &square_rep()).unwrap();

        let placed = arena.create_instance(block).unwrap();
        arena
            .set_placement(placed, transform::translation(&Vector3::new(10.0, 0.0, -1.0)))
            .unwrap();

        let bbox = arena.instance_bounding_box(placed).unwrap();
        assert_relative_eq!(bbox.lower().unwrap().x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.upper().unwrap().x, 11.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.lower().unwrap().z, -1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.upper().unwrap().z, 1.0, epsilon = 1e-9);

        // A reference without a representation yields the empty box
        let bare = arena.add_reference("bare");
        let empty_instance = arena.create_instance(bare).unwrap();
        assert!(arena
            .instance_bounding_box(empty_instance)
            .unwrap()
            .is_empty());
    }
}
