// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding box with an explicit empty state

use crate::error::{Error, Result};
use nalgebra::{Matrix4, Point3, Vector3};

/// Axis-aligned bounding box
///
/// A freshly created box is empty; `combine` grows it to include points.
/// Extrema queries on the empty box return `Error::InvalidState` instead
/// of undefined corners.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    extent: Option<(Point3<f64>, Point3<f64>)>,
}

impl BoundingBox {
    pub fn new() -> Self {
        Self { extent: None }
    }

    /// Box spanning two corner points
    pub fn from_corners(a: Point3<f64>, b: Point3<f64>) -> Self {
        let mut bbox = Self::new();
        bbox.combine(a);
        bbox.combine(b);
        bbox
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.is_none()
    }

    /// Grow the box to include `point`
    pub fn combine(&mut self, point: Point3<f64>) {
        match &mut self.extent {
            None => self.extent = Some((point, point)),
            Some((min, max)) => {
                min.x = min.x.min(point.x);
                min.y = min.y.min(point.y);
                min.z = min.z.min(point.z);
                max.x = max.x.max(point.x);
                max.y = max.y.max(point.y);
                max.z = max.z.max(point.z);
            }
        }
    }

    /// Grow the box to include another box
    pub fn combine_box(&mut self, other: &BoundingBox) {
        if let Some((min, max)) = other.extent {
            self.combine(min);
            self.combine(max);
        }
    }

    /// Map all 8 corners through `matrix` and re-derive axis-aligned
    /// extrema. A no-op on the empty box.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        let Some((min, max)) = self.extent else {
            return;
        };

        let corners = [
            Point3::new(min.x, min.y, min.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(max.x, max.y, min.z),
            Point3::new(min.x, min.y, max.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(min.x, max.y, max.z),
            Point3::new(max.x, max.y, max.z),
        ];

        let mut mapped = BoundingBox::new();
        for corner in &corners {
            mapped.combine(matrix.transform_point(corner));
        }
        *self = mapped;
    }

    pub fn lower(&self) -> Result<Point3<f64>> {
        self.extent
            .map(|(min, _)| min)
            .ok_or(Error::InvalidState("extrema query on empty bounding box"))
    }

    pub fn upper(&self) -> Result<Point3<f64>> {
        self.extent
            .map(|(_, max)| max)
            .ok_or(Error::InvalidState("extrema query on empty bounding box"))
    }

    pub fn center(&self) -> Result<Point3<f64>> {
        let (min, max) = self
            .extent
            .ok_or(Error::InvalidState("extrema query on empty bounding box"))?;
        Ok(nalgebra::center(&min, &max))
    }

    pub fn size(&self) -> Result<Vector3<f64>> {
        let (min, max) = self
            .extent
            .ok_or(Error::InvalidState("extrema query on empty bounding box"))?;
        Ok(max - min)
    }
}
