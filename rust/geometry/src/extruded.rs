// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear extrusion of a planar profile polygon
//!
//! The profile may be given in either winding; generation re-orients the
//! traversal so the base cap normal always opposes the extrusion
//! direction. Caps are ear-clipped (with a convex fast path), sides come
//! out as one quad strip per profile edge. Per-corner smoothing and
//! per-corner wire visibility are addressed by the original input
//! indices, independent of the internal traversal order.

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::material::{MaterialId, DEFAULT_MATERIAL_ID};
use crate::mesh::MeshData;
use crate::transform::{same_point, same_scalar, same_vector, EPSILON};
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;

/// Polygon profile swept along a straight extrusion vector
#[derive(Debug, Clone)]
pub struct ExtrudedMesh {
    points: Vec<Point3<f64>>,
    /// Unit extrusion direction
    extrusion: Vector3<f64>,
    length: f64,
    /// Center the sweep on the profile plane instead of starting there
    mirrored: bool,
    /// Original point indices whose corner gets an averaged side normal
    smoothed: FxHashSet<usize>,
    /// Original point indices whose vertical wire edge is suppressed
    hidden_edges: FxHashSet<usize>,
    material: MaterialId,
    mesh: MeshData,
    dirty: bool,
}

impl ExtrudedMesh {
    /// A profile of at least 3 coplanar points swept by `length` along
    /// `extrusion`. The direction must not lie in the profile plane.
    pub fn new(points: Vec<Point3<f64>>, extrusion: Vector3<f64>, length: f64) -> Result<Self> {
        if extrusion.norm() <= EPSILON {
            return Err(Error::Geometry(
                "extrusion direction must be a non-null vector".into(),
            ));
        }
        if length <= 0.0 {
            return Err(Error::Geometry(format!(
                "extrusion length must be positive, got {length}"
            )));
        }
        let extrusion = extrusion.normalize();
        validate_profile(&points, &extrusion)?;

        Ok(Self {
            points,
            extrusion,
            length,
            mirrored: false,
            smoothed: FxHashSet::default(),
            hidden_edges: FxHashSet::default(),
            material: DEFAULT_MATERIAL_ID,
            mesh: MeshData::new(),
            dirty: true,
        })
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[inline]
    pub fn extrusion(&self) -> Vector3<f64> {
        self.extrusion
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    #[inline]
    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn is_smoothed(&self, point_index: usize) -> bool {
        self.smoothed.contains(&point_index)
    }

    pub fn is_edge_visible(&self, point_index: usize) -> bool {
        !self.hidden_edges.contains(&point_index)
    }

    #[inline]
    fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Replace the profile; equal points within tolerance are a no-op
    pub fn set_points(&mut self, points: &[Point3<f64>]) -> Result<()> {
        if points.len() == self.points.len()
            && points
                .iter()
                .zip(&self.points)
                .all(|(a, b)| same_point(a, b))
        {
            return Ok(());
        }
        validate_profile(points, &self.extrusion)?;
        self.points = points.to_vec();
        // Per-corner flags for corners that no longer exist are dropped
        self.smoothed.retain(|&i| i < points.len());
        self.hidden_edges.retain(|&i| i < points.len());
        self.invalidate();
        Ok(())
    }

    pub fn set_extrusion(&mut self, extrusion: Vector3<f64>) -> Result<()> {
        if extrusion.norm() <= EPSILON {
            return Err(Error::Geometry(
                "extrusion direction must be a non-null vector".into(),
            ));
        }
        let extrusion = extrusion.normalize();
        if same_vector(&extrusion, &self.extrusion) {
            return Ok(());
        }
        validate_profile(&self.points, &extrusion)?;
        self.extrusion = extrusion;
        self.invalidate();
        Ok(())
    }

    pub fn set_length(&mut self, length: f64) -> Result<()> {
        if same_scalar(length, self.length) {
            return Ok(());
        }
        if length <= 0.0 {
            return Err(Error::Geometry(format!(
                "extrusion length must be positive, got {length}"
            )));
        }
        self.length = length;
        self.invalidate();
        Ok(())
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        if mirrored != self.mirrored {
            self.mirrored = mirrored;
            self.invalidate();
        }
    }

    pub fn set_material(&mut self, material: MaterialId) {
        if material != self.material {
            self.material = material;
            self.invalidate();
        }
    }

    /// Toggle normal smoothing for the corner at original point index
    pub fn set_smoothing(&mut self, point_index: usize, smoothed: bool) -> Result<()> {
        if point_index >= self.points.len() {
            return Err(Error::Geometry(format!(
                "corner index {point_index} out of range for {} profile points",
                self.points.len()
            )));
        }
        let changed = if smoothed {
            self.smoothed.insert(point_index)
        } else {
            self.smoothed.remove(&point_index)
        };
        if changed {
            self.invalidate();
        }
        Ok(())
    }

    /// Toggle the vertical wire edge at original point index
    pub fn set_edge_visible(&mut self, point_index: usize, visible: bool) -> Result<()> {
        if point_index >= self.points.len() {
            return Err(Error::Geometry(format!(
                "edge index {point_index} out of range for {} profile points",
                self.points.len()
            )));
        }
        let changed = if visible {
            self.hidden_edges.remove(&point_index)
        } else {
            self.hidden_edges.insert(point_index)
        };
        if changed {
            self.invalidate();
        }
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let n = self.points.len();
        let ex = self.extrusion;

        let plane_normal = polygon_normal(&self.points)?;
        // Traversal is flipped so the base cap always faces away from the
        // extrusion direction, whatever the input winding.
        let reversed = plane_normal.dot(&ex) > 0.0;
        let base_normal = if reversed { -plane_normal } else { plane_normal };
        let top_normal = -base_normal;

        let orig = |k: usize| if reversed { n - 1 - k } else { k };
        let orig_edge = |k: usize| {
            if reversed {
                (n as isize - 2 - k as isize).rem_euclid(n as isize) as usize
            } else {
                k
            }
        };

        let base_offset = if self.mirrored {
            -0.5 * self.length * ex
        } else {
            Vector3::zeros()
        };
        let lift = self.length * ex;

        let base_ring: Vec<Point3<f64>> =
            (0..n).map(|k| self.points[orig(k)] + base_offset).collect();

        let edge_normals: Vec<Vector3<f64>> = (0..n)
            .map(|k| ex.cross(&(base_ring[(k + 1) % n] - base_ring[k])).normalize())
            .collect();

        let ring_texels = profile_texels(&base_ring, &base_normal);

        let mut positions: Vec<f32> = Vec::with_capacity(6 * n * 3);
        let mut normals: Vec<f32> = Vec::with_capacity(6 * n * 3);
        let mut texels: Vec<f32> = Vec::with_capacity(6 * n * 2);
        let mut push_vertex = |p: &Point3<f64>, normal: &Vector3<f64>, texel: [f32; 2]| {
            positions.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
            normals.extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
            texels.extend_from_slice(&texel);
        };

        // Cap rings: base in traversal order, top reversed so both rings
        // wind around their outward normal.
        for (point, &texel) in base_ring.iter().zip(&ring_texels) {
            push_vertex(point, &base_normal, texel);
        }
        for k in 0..n {
            push_vertex(
                &(base_ring[n - 1 - k] + lift),
                &top_normal,
                ring_texels[n - 1 - k],
            );
        }

        // Side corner pairs: each corner carries one vertex for its
        // incoming edge and one for its outgoing edge.
        for ring_lift in [Vector3::zeros(), lift] {
            for k in 0..n {
                let incoming = edge_normals[(k + n - 1) % n];
                let outgoing = edge_normals[k];
                let (normal_in, normal_out) = if self.smoothed.contains(&orig(k)) {
                    let averaged = (incoming + outgoing).normalize();
                    (averaged, averaged)
                } else {
                    (incoming, outgoing)
                };
                let point = base_ring[k] + ring_lift;
                push_vertex(&point, &normal_in, ring_texels[k]);
                push_vertex(&point, &normal_out, ring_texels[k]);
            }
        }

        self.mesh.add_vertices(&positions)?;
        self.mesh.add_normals(&normals)?;
        self.mesh.add_texels(&texels)?;

        let base_triangles = triangulate_ring(&base_ring, &base_normal)?;
        let top_ring: Vec<Point3<f64>> =
            (0..n).map(|k| base_ring[n - 1 - k] + lift).collect();
        let top_triangles = triangulate_ring(&top_ring, &top_normal)?;

        let mut cap_indices: Vec<u32> =
            Vec::with_capacity(base_triangles.len() + top_triangles.len());
        cap_indices.extend(base_triangles.iter().map(|&i| i as u32));
        cap_indices.extend(top_triangles.iter().map(|&i| (i + n) as u32));
        self.mesh.add_triangles(self.material, &cap_indices)?;

        for k in 0..n {
            let next = (k + 1) % n;
            let strip = [
                (2 * n + 2 * k + 1) as u32,
                (4 * n + 2 * k + 1) as u32,
                (2 * n + 2 * next) as u32,
                (4 * n + 2 * next) as u32,
            ];
            self.mesh.add_strip(self.material, &strip, orig_edge(k) as u32)?;
        }

        self.add_wire(&base_ring, &lift)?;

        self.mesh.finish()?;
        tracing::debug!(
            profile_points = n,
            reversed,
            faces = self.mesh.face_count(),
            "extruded mesh generated"
        );
        Ok(())
    }

    fn add_wire(&mut self, base_ring: &[Point3<f64>], lift: &Vector3<f64>) -> Result<()> {
        let n = base_ring.len();

        let mut outline: Vec<f32> = Vec::with_capacity((n + 1) * 3);
        for k in 0..=n {
            let p = base_ring[k % n];
            outline.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        }
        self.mesh.add_wire_polyline(&outline)?;

        let mut top_outline: Vec<f32> = Vec::with_capacity((n + 1) * 3);
        for k in 0..=n {
            let p = base_ring[k % n] + lift;
            top_outline.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
        }
        self.mesh.add_wire_polyline(&top_outline)?;

        let base_offset = if self.mirrored {
            -0.5 * self.length * self.extrusion
        } else {
            Vector3::zeros()
        };
        for j in 0..self.points.len() {
            if self.hidden_edges.contains(&j) {
                continue;
            }
            let bottom = self.points[j] + base_offset;
            let top = bottom + lift;
            self.mesh.add_wire_polyline(&[
                bottom.x as f32,
                bottom.y as f32,
                bottom.z as f32,
                top.x as f32,
                top.y as f32,
                top.z as f32,
            ])?;
        }
        Ok(())
    }
}

impl Geometry for ExtrudedMesh {
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

/// Polygon normal by Newell's method, robust for non-convex profiles
fn polygon_normal(points: &[Point3<f64>]) -> Result<Vector3<f64>> {
    let mut normal = Vector3::zeros();
    for (i, current) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    if normal.norm() <= EPSILON {
        return Err(Error::Geometry(
            "profile points are collinear or the profile has no area".into(),
        ));
    }
    Ok(normal.normalize())
}

fn validate_profile(points: &[Point3<f64>], extrusion: &Vector3<f64>) -> Result<()> {
    if points.len() < 3 {
        return Err(Error::Geometry(format!(
            "extrusion profile needs at least 3 points, got {}",
            points.len()
        )));
    }
    for (i, point) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        if same_point(point, next) {
            return Err(Error::Geometry(format!(
                "degenerate profile edge at point {i}"
            )));
        }
    }

    let normal = polygon_normal(points)?;
    let origin = points[0];
    for (i, point) in points.iter().enumerate() {
        let tolerance = EPSILON * (1.0 + point.coords.norm());
        if (point - origin).dot(&normal).abs() > tolerance {
            return Err(Error::Geometry(format!(
                "profile point {i} is off the profile plane"
            )));
        }
    }

    if normal.dot(extrusion).abs() <= EPSILON {
        return Err(Error::Geometry(
            "extrusion direction lies in the profile plane".into(),
        ));
    }
    Ok(())
}

/// Triangulate a planar ring winding around `normal`; returns local
/// indices into the ring
fn triangulate_ring(ring: &[Point3<f64>], normal: &Vector3<f64>) -> Result<Vec<usize>> {
    let n = ring.len();
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // Orthonormal in-plane basis with u x v = normal, so triangles that
    // come out counter-clockwise in (u, v) wind around `normal` in 3D.
    let reference = least_aligned_axis(normal);
    let u = normal.cross(&reference).normalize();
    let v = normal.cross(&u);

    let origin = ring[0];
    let coords: Vec<(f64, f64)> = ring
        .iter()
        .map(|p| {
            let d = p - origin;
            (d.dot(&u), d.dot(&v))
        })
        .collect();

    if is_convex(&coords) {
        let mut indices = Vec::with_capacity((n - 2) * 3);
        for k in 1..n - 1 {
            indices.extend_from_slice(&[0, k, k + 1]);
        }
        return Ok(indices);
    }

    let flat: Vec<f64> = coords.iter().flat_map(|&(x, y)| [x, y]).collect();
    let triangles = earcutr::earcut(&flat, &[], 2)
        .map_err(|e| Error::Triangulation(format!("ear clipping failed: {e:?}")))?;
    if triangles.is_empty() {
        return Err(Error::Triangulation(
            "ear clipping produced no triangles".into(),
        ));
    }
    Ok(triangles)
}

/// Texture coordinates from the profile's in-plane projection, normalized
/// to [0, 1] over its 2D extent
fn profile_texels(ring: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<[f32; 2]> {
    let reference = least_aligned_axis(normal);
    let u = normal.cross(&reference).normalize();
    let v = normal.cross(&u);

    let origin = ring[0];
    let coords: Vec<(f64, f64)> = ring
        .iter()
        .map(|p| {
            let d = p - origin;
            (d.dot(&u), d.dot(&v))
        })
        .collect();

    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &coords {
        min.0 = min.0.min(x);
        min.1 = min.1.min(y);
        max.0 = max.0.max(x);
        max.1 = max.1.max(y);
    }
    let width = (max.0 - min.0).max(EPSILON);
    let height = (max.1 - min.1).max(EPSILON);

    coords
        .iter()
        .map(|&(x, y)| {
            [
                ((x - min.0) / width) as f32,
                ((y - min.1) / height) as f32,
            ]
        })
        .collect()
}

fn least_aligned_axis(v: &Vector3<f64>) -> Vector3<f64> {
    let abs_x = v.x.abs();
    let abs_y = v.y.abs();
    let abs_z = v.z.abs();
    if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::x()
    } else if abs_y <= abs_z {
        Vector3::y()
    } else {
        Vector3::z()
    }
}

/// True when every corner of the counter-clockwise ring turns left
fn is_convex(coords: &[(f64, f64)]) -> bool {
    let n = coords.len();
    (0..n).all(|i| {
        let (ax, ay) = coords[i];
        let (bx, by) = coords[(i + 1) % n];
        let (cx, cy) = coords[(i + 2) % n];
        (bx - ax) * (cy - by) - (by - ay) * (cx - bx) >= -EPSILON
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        assert!(ExtrudedMesh::new(square(), Vector3::zeros(), 1.0).is_err());
        assert!(ExtrudedMesh::new(square(), Vector3::z(), 0.0).is_err());
        assert!(ExtrudedMesh::new(square(), Vector3::z(), -2.0).is_err());
        assert!(ExtrudedMesh::new(square()[..2].to_vec(), Vector3::z(), 1.0).is_err());
        // Direction inside the profile plane
        assert!(ExtrudedMesh::new(square(), Vector3::x(), 1.0).is_err());
        // Non-planar profile
        let mut bent = square();
        bent[2].z = 0.5;
        assert!(ExtrudedMesh::new(bent, Vector3::z(), 1.0).is_err());
        // Collinear points
        let line = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(ExtrudedMesh::new(line, Vector3::z(), 1.0).is_err());
    }

    #[test]
    fn test_square_extrusion_counts_and_bounds() {
        let mut prism = ExtrudedMesh::new(square(), Vector3::z(), 2.0).unwrap();
        assert!(prism.update().unwrap());

        // 4 cap ring vertices per cap plus 2 side vertices per corner per ring
        assert_eq!(prism.vertex_count(), 24);
        // 2 triangles per cap, 2 per side quad
        assert_eq!(prism.face_count(), 12);

        let bbox = prism.bounding_box().unwrap();
        assert_relative_eq!(bbox.lower().unwrap().z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.upper().unwrap().z, 2.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.upper().unwrap().x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_extrusion_centers_on_profile_plane() {
        let mut prism = ExtrudedMesh::new(square(), Vector3::z(), 2.0).unwrap();
        prism.set_mirrored(true);
        let bbox = prism.bounding_box().unwrap();
        assert_relative_eq!(bbox.lower().unwrap().z, -1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.upper().unwrap().z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_base_cap_opposes_extrusion_for_both_windings() {
        let ccw = square();
        let cw: Vec<_> = square().into_iter().rev().collect();

        for profile in [ccw, cw] {
            let mut prism = ExtrudedMesh::new(profile, Vector3::z(), 1.0).unwrap();
            prism.update().unwrap();
            // First ring vertex carries the base cap normal
            let normals = prism.mesh().normals();
            let base_normal = Vector3::new(
                normals[0] as f64,
                normals[1] as f64,
                normals[2] as f64,
            );
            assert!(base_normal.dot(&Vector3::z()) < 0.0);
        }
    }

    #[test]
    fn test_triangular_prism_has_eight_faces() {
        let triangle = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 1.5, 0.0),
        ];
        let mut prism = ExtrudedMesh::new(triangle, Vector3::z(), 1.0).unwrap();
        prism.update().unwrap();
        assert_eq!(prism.face_count(), 8);
        assert_eq!(prism.vertex_count(), 18);
    }

    #[test]
    fn test_setters_within_tolerance_skip_rebuild() {
        let mut prism = ExtrudedMesh::new(square(), Vector3::z(), 2.0).unwrap();
        assert!(prism.update().unwrap());
        assert!(!prism.update().unwrap());

        prism.set_length(2.0 + 5e-11).unwrap();
        prism.set_extrusion(Vector3::new(0.0, 0.0, 3.0)).unwrap();
        prism.set_points(&square()).unwrap();
        prism.set_mirrored(false);
        assert!(!prism.update().unwrap());

        prism.set_length(3.0).unwrap();
        assert!(prism.update().unwrap());
        assert_relative_eq!(
            prism.bounding_box().unwrap().upper().unwrap().z,
            3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_smoothed_corner_averages_side_normals() {
        let mut prism = ExtrudedMesh::new(square(), Vector3::z(), 1.0).unwrap();
        prism.set_smoothing(1, true).unwrap();
        prism.update().unwrap();
        assert!(prism.is_smoothed(1));

        let n = 4;
        let normals = prism.mesh().normals();
        let corner = |index: usize| {
            Vector3::new(
                normals[index * 3] as f64,
                normals[index * 3 + 1] as f64,
                normals[index * 3 + 2] as f64,
            )
        };

        // Input corner 1 sits at traversal slot 2 here (the CCW square
        // against +z gets its traversal flipped). It joins the +x and -y
        // faces; smoothed, both pair vertices carry their diagonal.
        let pair_in = corner(2 * n + 4);
        let pair_out = corner(2 * n + 5);
        assert_relative_eq!((pair_in - pair_out).norm(), 0.0, epsilon = 1e-6);
        let expected = Vector3::new(1.0, -1.0, 0.0).normalize();
        assert_relative_eq!(pair_in.dot(&expected), 1.0, epsilon = 1e-6);

        // Unsmoothed input corner 0 (traversal slot 3) keeps flat normals
        let flat_in = corner(2 * n + 6);
        let flat_out = corner(2 * n + 7);
        assert!((flat_in - flat_out).norm() > 0.5);

        assert!(prism.set_smoothing(9, true).is_err());
    }

    #[test]
    fn test_hidden_edge_drops_one_wire_segment() {
        let mut prism = ExtrudedMesh::new(square(), Vector3::z(), 1.0).unwrap();
        prism.update().unwrap();
        // Two closed outlines plus one vertical segment per corner
        assert_eq!(prism.mesh().wire().polyline_count(), 6);

        prism.set_edge_visible(2, false).unwrap();
        prism.update().unwrap();
        assert!(!prism.is_edge_visible(2));
        assert_eq!(prism.mesh().wire().polyline_count(), 5);

        assert!(prism.set_edge_visible(4, false).is_err());
    }

    #[test]
    fn test_concave_profile_triangulates() {
        // L-shaped profile forces the ear-clipping path
        let profile = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let mut solid = ExtrudedMesh::new(profile, Vector3::z(), 1.0).unwrap();
        solid.update().unwrap();
        // 4 triangles per cap, 2 per side quad
        assert_eq!(solid.face_count(), 4 + 4 + 6 * 2);
    }
}
