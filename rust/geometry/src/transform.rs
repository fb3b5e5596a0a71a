// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 4x4 homogeneous transform helpers
//!
//! Composition, transpose and matrix-vector products come straight from
//! nalgebra; this module adds the placement constructors the scene layer
//! needs plus an inverse with an explicit near-singular failure mode.

use crate::error::{Error, Result};
use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3};

/// Tolerance for point/vector/scalar equality checks
pub const EPSILON: f64 = 1e-10;

/// Determinants at or below this magnitude are treated as singular
pub const SINGULAR_EPSILON: f64 = 1e-12;

#[inline]
pub fn same_scalar(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

#[inline]
pub fn same_vector(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    same_scalar(a.x, b.x) && same_scalar(a.y, b.y) && same_scalar(a.z, b.z)
}

#[inline]
pub fn same_point(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    same_vector(&a.coords, &b.coords)
}

/// Angle between two vectors in radians, in [0, pi]
#[inline]
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom <= EPSILON {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Rotation matrix from an axis and an angle in radians
pub fn rotation(axis: &Vector3<f64>, angle: f64) -> Matrix4<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle).to_homogeneous()
}

/// Rotation matrix mapping `from` onto `to` after normalization
///
/// Parallel inputs yield the identity; antiparallel inputs yield a half
/// turn about an arbitrary axis orthogonal to `from`, so the general
/// axis-from-cross-product formula is never evaluated near its pole.
pub fn rotation_between(from: &Vector3<f64>, to: &Vector3<f64>) -> Matrix4<f64> {
    let from = from.normalize();
    let to = to.normalize();
    let cos_angle = from.dot(&to).clamp(-1.0, 1.0);

    if cos_angle >= 1.0 - EPSILON {
        return Matrix4::identity();
    }

    if cos_angle <= -1.0 + EPSILON {
        return rotation(&orthogonal_to(&from), std::f64::consts::PI);
    }

    let axis = from.cross(&to);
    rotation(&axis, cos_angle.acos())
}

/// Some unit vector orthogonal to `v`
///
/// Crosses with the basis axis least aligned with `v` for stability.
fn orthogonal_to(v: &Vector3<f64>) -> Vector3<f64> {
    let abs_x = v.x.abs();
    let abs_y = v.y.abs();
    let abs_z = v.z.abs();

    let reference = if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::new(1.0, 0.0, 0.0)
    } else if abs_y <= abs_z {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };

    v.cross(&reference).normalize()
}

/// Translation matrix
#[inline]
pub fn translation(v: &Vector3<f64>) -> Matrix4<f64> {
    Matrix4::new_translation(v)
}

/// Non-uniform scaling matrix
#[inline]
pub fn scaling(sx: f64, sy: f64, sz: f64) -> Matrix4<f64> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
}

/// Determinant of the signed 3x3 minor obtained by deleting `row`/`col`
fn minor3(m: &Matrix4<f64>, row: usize, col: usize) -> f64 {
    let mut sub = [0.0f64; 9];
    let mut k = 0;
    for r in 0..4 {
        if r == row {
            continue;
        }
        for c in 0..4 {
            if c == col {
                continue;
            }
            sub[k] = m[(r, c)];
            k += 1;
        }
    }
    sub[0] * (sub[4] * sub[8] - sub[5] * sub[7])
        - sub[1] * (sub[3] * sub[8] - sub[5] * sub[6])
        + sub[2] * (sub[3] * sub[7] - sub[4] * sub[6])
}

#[inline]
fn cofactor(m: &Matrix4<f64>, row: usize, col: usize) -> f64 {
    let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
    sign * minor3(m, row, col)
}

/// Determinant via Laplace expansion along the first row
pub fn determinant(m: &Matrix4<f64>) -> f64 {
    (0..4).map(|c| m[(0, c)] * cofactor(m, 0, c)).sum()
}

/// General inverse via the adjugate/cofactor method
///
/// Returns `Error::SingularMatrix` when the determinant magnitude is at or
/// below `SINGULAR_EPSILON`; there is no identity fallback.
pub fn try_invert(m: &Matrix4<f64>) -> Result<Matrix4<f64>> {
    let det = determinant(m);
    if det.abs() <= SINGULAR_EPSILON {
        return Err(Error::SingularMatrix);
    }

    let mut inverse = Matrix4::zeros();
    for r in 0..4 {
        for c in 0..4 {
            // Adjugate: transposed cofactor matrix
            inverse[(c, r)] = cofactor(m, r, c) / det;
        }
    }
    Ok(inverse)
}

/// Rotation matrix from Euler angles, composed as Rz * Ry * Rx
pub fn from_euler(rx: f64, ry: f64, rz: f64) -> Matrix4<f64> {
    rotation(&Vector3::z(), rz) * rotation(&Vector3::y(), ry) * rotation(&Vector3::x(), rx)
}

/// Euler angles (rx, ry, rz) such that `from_euler(rx, ry, rz)` rebuilds
/// the rotation part of `m`
pub fn to_euler(m: &Matrix4<f64>) -> (f64, f64, f64) {
    let sy = (-m[(2, 0)]).clamp(-1.0, 1.0);
    let ry = sy.asin();

    if sy.abs() < 1.0 - EPSILON {
        let rx = m[(2, 1)].atan2(m[(2, 2)]);
        let rz = m[(1, 0)].atan2(m[(0, 0)]);
        (rx, ry, rz)
    } else if sy > 0.0 {
        // Gimbal lock, ry = +pi/2: only rx - rz is determined
        (m[(0, 1)].atan2(m[(1, 1)]), ry, 0.0)
    } else {
        // Gimbal lock, ry = -pi/2
        ((-m[(0, 1)]).atan2(m[(1, 1)]), ry, 0.0)
    }
}

/// 16 doubles in the memory order the rasterizer expects
#[inline]
pub fn to_opengl(m: &Matrix4<f64>) -> [f64; 16] {
    let mut out = [0.0f64; 16];
    out.copy_from_slice(m.as_slice());
    out
}
