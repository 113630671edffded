//! Common types used across swgkit
//!
//! This module provides shared value types used by multiple codecs.

use serde::{Deserialize, Serialize};

/// 3D vector (position, normal, offset)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0, z: 1.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Rotation quaternion, stored scalar-first as on disk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Derive a quaternion from a row-major 3x3 rotation matrix.
    ///
    /// Trace-based: when the trace is positive the scalar term is recovered
    /// first, otherwise the largest diagonal element picks the branch so the
    /// square root argument stays well away from zero.
    pub fn from_rotation_rows(m: &[[f32; 3]; 3]) -> Self {
        const EPSILON: f32 = 1.0e-6;

        let trace = m[0][0] + m[1][1] + m[2][2];

        let q = if trace > EPSILON {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quat::new(
                0.25 * s,
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).max(EPSILON).sqrt() * 2.0;
            Quat::new(
                (m[2][1] - m[1][2]) / s,
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).max(EPSILON).sqrt() * 2.0;
            Quat::new(
                (m[0][2] - m[2][0]) / s,
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
            )
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).max(EPSILON).sqrt() * 2.0;
            Quat::new(
                (m[1][0] - m[0][1]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
            )
        };

        q.normalized()
    }

    pub fn length(&self) -> f32 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Quat::new(self.w / len, self.x / len, self.y / len, self.z / len)
        } else {
            Quat::IDENTITY
        }
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid transform as stored in asset files: a row-major 3x3 rotation
/// followed by a translation, twelve floats in total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation: [[f32; 3]; 3],
    pub translation: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: Vec3::ZERO,
    };

    /// Build from the on-disk float order
    pub fn from_floats(f: &[f32; 12]) -> Self {
        Self {
            rotation: [[f[0], f[1], f[2]], [f[3], f[4], f[5]], [f[6], f[7], f[8]]],
            translation: Vec3::new(f[9], f[10], f[11]),
        }
    }

    /// Flatten back into the on-disk float order
    pub fn to_floats(&self) -> [f32; 12] {
        let r = &self.rotation;
        [
            r[0][0], r[0][1], r[0][2],
            r[1][0], r[1][1], r[1][2],
            r[2][0], r[2][1], r[2][2],
            self.translation.x, self.translation.y, self.translation.z,
        ]
    }

    pub fn quaternion(&self) -> Quat {
        Quat::from_rotation_rows(&self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Floating point color with alpha, stored alpha-first on disk
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorArgb {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorArgb {
    pub const fn new(a: f32, r: f32, g: f32, b: f32) -> Self {
        Self { a, r, g, b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-4
    }

    #[test]
    fn test_vec3_operations() {
        let v1 = Vec3::new(1.0, 2.0, 3.0);
        let v2 = Vec3::new(4.0, 5.0, 6.0);

        assert!(approx(v1.dot(&v2), 32.0));
        assert_eq!(v1 + v2, Vec3::new(5.0, 7.0, 9.0));

        let cross = v1.cross(&v2);
        assert!(approx(cross.x, -3.0));
        assert!(approx(cross.y, 6.0));
        assert!(approx(cross.z, -3.0));
    }

    #[test]
    fn test_identity_quaternion() {
        let q = Transform::IDENTITY.quaternion();
        assert!(approx(q.w, 1.0));
        assert!(approx(q.x, 0.0) && approx(q.y, 0.0) && approx(q.z, 0.0));
    }

    #[test]
    fn test_half_turn_uses_diagonal_branch() {
        // 180 degrees about Y: trace is -1 so the y branch must be taken
        let m = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        let q = Quat::from_rotation_rows(&m);
        assert!(approx(q.w.abs(), 0.0));
        assert!(approx(q.y.abs(), 1.0));
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let (s, c) = std::f32::consts::FRAC_PI_2.sin_cos();
        let m = [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]];
        let q = Quat::from_rotation_rows(&m);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!(approx(q.w, half));
        assert!(approx(q.z, half));
    }

    #[test]
    fn test_transform_float_order() {
        let floats = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 5.0, 6.0, 7.0];
        let t = Transform::from_floats(&floats);
        assert_eq!(t.translation, Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(t.to_floats(), floats);
    }
}
