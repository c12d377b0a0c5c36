// matrix.rs — 3x4 affine matrices for skeletal and rigid-body transforms
//
// Row-major: each row holds three rotation/scale terms followed by the
// translation component, so `a[3]`, `b[3]`, `c[3]` form the origin.

use crate::q_shared::{
    angle_vectors, cross_product, dot_product, perpendicular_vector, vector_negate,
    vector_normalize, Vec3,
};

const ORTHO_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x4 {
    pub a: [f32; 4],
    pub b: [f32; 4],
    pub c: [f32; 4],
}

impl Default for Matrix3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix3x4 {
    pub const IDENTITY: Matrix3x4 = Matrix3x4 {
        a: [1.0, 0.0, 0.0, 0.0],
        b: [0.0, 1.0, 0.0, 0.0],
        c: [0.0, 0.0, 1.0, 0.0],
    };

    pub const ZERO: Matrix3x4 = Matrix3x4 {
        a: [0.0; 4],
        b: [0.0; 4],
        c: [0.0; 4],
    };

    /// Build from three basis columns and an origin.
    pub fn from_columns(x: &Vec3, y: &Vec3, z: &Vec3, origin: &Vec3) -> Self {
        Self {
            a: [x[0], y[0], z[0], origin[0]],
            b: [x[1], y[1], z[1], origin[1]],
            c: [x[2], y[2], z[2], origin[2]],
        }
    }

    /// Entity transform: forward, left and up columns at `origin`.
    pub fn for_entity(angles: &Vec3, origin: &Vec3) -> Self {
        let (forward, right, up) = angle_vectors(angles);
        let left = [-right[0], -right[1], -right[2]];
        Self::from_columns(&forward, &left, &up, origin)
    }

    #[inline]
    pub fn rows(&self) -> [&[f32; 4]; 3] {
        [&self.a, &self.b, &self.c]
    }

    #[inline]
    fn rows_mut(&mut self) -> [&mut [f32; 4]; 3] {
        [&mut self.a, &mut self.b, &mut self.c]
    }

    pub fn column(&self, i: usize) -> Vec3 {
        [self.a[i], self.b[i], self.c[i]]
    }

    pub fn origin(&self) -> Vec3 {
        self.column(3)
    }

    pub fn set_origin(&mut self, origin: &Vec3) {
        self.a[3] = origin[0];
        self.b[3] = origin[1];
        self.c[3] = origin[2];
    }

    /// self * other
    pub fn multiply(&self, other: &Matrix3x4) -> Matrix3x4 {
        let mut out = Matrix3x4::ZERO;
        let rhs = other.rows();
        for (dst, src) in out.rows_mut().into_iter().zip(self.rows()) {
            for j in 0..4 {
                dst[j] = src[0] * rhs[0][j] + src[1] * rhs[1][j] + src[2] * rhs[2][j];
            }
            dst[3] += src[3];
        }
        out
    }

    pub fn add(&self, other: &Matrix3x4) -> Matrix3x4 {
        let mut out = *self;
        for (dst, src) in out.rows_mut().into_iter().zip(other.rows()) {
            for j in 0..4 {
                dst[j] += src[j];
            }
        }
        out
    }

    pub fn scale(&self, s: f32) -> Matrix3x4 {
        let mut out = *self;
        for row in out.rows_mut() {
            for v in row.iter_mut() {
                *v *= s;
            }
        }
        out
    }

    /// Inverse of a matrix whose basis columns are mutually orthogonal.
    /// Per-axis scale is handled; shear is not. Zero-length columns stay zero.
    pub fn invert(&self) -> Matrix3x4 {
        let mut cols = [self.column(0), self.column(1), self.column(2)];
        for col in cols.iter_mut() {
            let len2 = dot_product(col, col);
            let inv = if len2 > 0.0 { 1.0 / len2 } else { 0.0 };
            col.iter_mut().for_each(|v| *v *= inv);
        }
        let trans = self.origin();
        let row = |c: &Vec3| [c[0], c[1], c[2], -dot_product(c, &trans)];
        Matrix3x4 {
            a: row(&cols[0]),
            b: row(&cols[1]),
            c: row(&cols[2]),
        }
    }

    /// Gram-Schmidt the basis columns back to an orthonormal frame with the
    /// same handedness. Degenerate columns are rebuilt from the ones before
    /// them; a fully collapsed basis becomes the identity rotation.
    pub fn orthonormalize(&mut self) {
        let (c0, c1, c2) = (self.column(0), self.column(1), self.column(2));

        let mut x = c0;
        if vector_normalize(&mut x) < ORTHO_EPSILON {
            x = [1.0, 0.0, 0.0];
        }

        let d = dot_product(&c1, &x);
        let mut y = [c1[0] - d * x[0], c1[1] - d * x[1], c1[2] - d * x[2]];
        if vector_normalize(&mut y) < ORTHO_EPSILON {
            y = perpendicular_vector(&x);
        }

        let mut z = cross_product(&x, &y);
        let len2 = dot_product(&c2, &c2);
        if len2 > ORTHO_EPSILON * ORTHO_EPSILON && dot_product(&c2, &z) < 0.0 {
            z = vector_negate(&z);
        }

        let origin = self.origin();
        *self = Matrix3x4::from_columns(&x, &y, &z, &origin);
    }

    pub fn transform_point(&self, p: &Vec3) -> Vec3 {
        let r = self.rows();
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + r[0][3],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + r[1][3],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + r[2][3],
        ]
    }

    /// Rotate/scale only, ignoring translation.
    pub fn transform_vector(&self, v: &Vec3) -> Vec3 {
        let r = self.rows();
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.rows().iter().all(|r| r.iter().all(|v| v.is_finite()))
    }

    /// Zero every non-finite component. Returns how many were replaced.
    pub fn sanitize(&mut self) -> usize {
        let mut fixed = 0;
        for row in self.rows_mut() {
            for v in row.iter_mut() {
                if !v.is_finite() {
                    *v = 0.0;
                    fixed += 1;
                }
            }
        }
        fixed
    }
}

/// Zero every non-finite component of a vector. Returns how many were replaced.
pub fn vector_sanitize(v: &mut Vec3) -> usize {
    let mut fixed = 0;
    for c in v.iter_mut() {
        if !c.is_finite() {
            *c = 0.0;
            fixed += 1;
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat_eq(m: &Matrix3x4, n: &Matrix3x4, eps: f32) {
        for (r1, r2) in m.rows().iter().zip(n.rows()) {
            for j in 0..4 {
                assert!((r1[j] - r2[j]).abs() < eps, "{:?} != {:?}", m, n);
            }
        }
    }

    #[test]
    fn test_identity_multiply() {
        let m = Matrix3x4::for_entity(&[10.0, 45.0, 5.0], &[1.0, 2.0, 3.0]);
        assert_mat_eq(&Matrix3x4::IDENTITY.multiply(&m), &m, 1e-6);
        assert_mat_eq(&m.multiply(&Matrix3x4::IDENTITY), &m, 1e-6);
    }

    #[test]
    fn test_for_entity_zero_angles() {
        let m = Matrix3x4::for_entity(&[0.0; 3], &[5.0, 6.0, 7.0]);
        assert_mat_eq(
            &m,
            &Matrix3x4 {
                a: [1.0, 0.0, 0.0, 5.0],
                b: [0.0, 1.0, 0.0, 6.0],
                c: [0.0, 0.0, 1.0, 7.0],
            },
            1e-6,
        );
    }

    #[test]
    fn test_invert_rigid() {
        let m = Matrix3x4::for_entity(&[30.0, 120.0, -15.0], &[64.0, -32.0, 8.0]);
        let inv = m.invert();
        assert_mat_eq(&m.multiply(&inv), &Matrix3x4::IDENTITY, 1e-5);
        assert_mat_eq(&inv.multiply(&m), &Matrix3x4::IDENTITY, 1e-5);
    }

    #[test]
    fn test_invert_scaled_axes() {
        let m = Matrix3x4::from_columns(
            &[2.0, 0.0, 0.0],
            &[0.0, 0.5, 0.0],
            &[0.0, 0.0, 4.0],
            &[1.0, 1.0, 1.0],
        );
        let p = [3.0, -7.0, 0.25];
        let q = m.invert().transform_point(&m.transform_point(&p));
        for i in 0..3 {
            assert!((q[i] - p[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_add_scale_average() {
        let m = Matrix3x4::for_entity(&[0.0, 90.0, 0.0], &[2.0, 0.0, 0.0]);
        let avg = m.add(&m).scale(0.5);
        assert_mat_eq(&avg, &m, 1e-6);
    }

    fn assert_orthonormal(m: &Matrix3x4) {
        let (x, y, z) = (m.column(0), m.column(1), m.column(2));
        for c in [&x, &y, &z] {
            assert!((dot_product(c, c) - 1.0).abs() < 1e-5, "{:?}", m);
        }
        assert!(dot_product(&x, &y).abs() < 1e-5, "{:?}", m);
        assert!(dot_product(&y, &z).abs() < 1e-5, "{:?}", m);
        assert!(dot_product(&x, &z).abs() < 1e-5, "{:?}", m);
    }

    #[test]
    fn test_orthonormalize_scaled_identity() {
        let mut m = Matrix3x4::IDENTITY.scale(3.0);
        m.set_origin(&[9.0, 9.0, 9.0]);
        m.orthonormalize();
        assert_eq!(m.a, [1.0, 0.0, 0.0, 9.0]);
        assert_eq!(m.c, [0.0, 0.0, 1.0, 9.0]);
    }

    #[test]
    fn test_orthonormalize_averaged_rotations() {
        // 90 degrees about z averaged with 90 degrees about x
        let rz = Matrix3x4::from_columns(&[0.0, 1.0, 0.0], &[-1.0, 0.0, 0.0], &[0.0, 0.0, 1.0], &[0.0; 3]);
        let rx = Matrix3x4::from_columns(&[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0], &[0.0, -1.0, 0.0], &[0.0; 3]);
        let mut avg = rz.add(&rx).scale(0.5);
        avg.orthonormalize();
        assert_orthonormal(&avg);
        let handed = cross_product(&avg.column(0), &avg.column(1));
        assert!(dot_product(&handed, &avg.column(2)) > 0.99);
    }

    #[test]
    fn test_orthonormalize_degenerate() {
        let mut m = Matrix3x4::ZERO;
        m.orthonormalize();
        assert_orthonormal(&m);

        // parallel first two columns
        let mut m = Matrix3x4::from_columns(&[0.0, 0.0, 2.0], &[0.0, 0.0, 1.0], &[1.0, 0.0, 0.0], &[0.0; 3]);
        m.orthonormalize();
        assert_orthonormal(&m);
        assert_eq!(m.column(0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_orthonormalize_keeps_handedness() {
        let mut m = Matrix3x4::from_columns(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0], &[0.0, 0.0, -1.0], &[0.0; 3]);
        m.orthonormalize();
        assert_eq!(m.column(2), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_transform_vector_ignores_origin() {
        let m = Matrix3x4::for_entity(&[0.0, 90.0, 0.0], &[100.0, 100.0, 100.0]);
        let v = m.transform_vector(&[1.0, 0.0, 0.0]);
        assert!(v[0].abs() < 1e-5);
        assert!((v[1] - 1.0).abs() < 1e-5);
        assert!(v[2].abs() < 1e-5);
    }

    #[test]
    fn test_sanitize() {
        let mut m = Matrix3x4::IDENTITY;
        m.a[1] = f32::NAN;
        m.c[3] = f32::INFINITY;
        assert!(!m.is_finite());
        assert_eq!(m.sanitize(), 2);
        assert!(m.is_finite());
        assert_eq!(m.a[1], 0.0);
        assert_eq!(m.sanitize(), 0);

        let mut v = [f32::NAN, 1.0, f32::NAN];
        assert_eq!(vector_sanitize(&mut v), 2);
        assert_eq!(v, [0.0, 1.0, 0.0]);
    }
}
