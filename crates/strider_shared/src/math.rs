//! Mathematical types shared between the core and its hosts.
//!
//! Units are centimetres and seconds. `+Z` is the default up axis.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Tolerance below which a vector is treated as zero.
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// Looser tolerance used for direction and velocity checks.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit X vector (default forward)
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector (default right)
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector (default up)
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// True when every component is finite (no NaN, no infinity).
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// True when the length is within `tolerance` of zero on every axis.
    #[must_use]
    pub fn is_nearly_zero(self, tolerance: f32) -> bool {
        self.x.abs() <= tolerance && self.y.abs() <= tolerance && self.z.abs() <= tolerance
    }

    /// Unit vector in the same direction, or zero for degenerate input.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= SMALL_NUMBER || !len_sq.is_finite() {
            return Self::ZERO;
        }
        self * (1.0 / len_sq.sqrt())
    }

    /// Component of `self` along `normal` (`normal` need not be unit length).
    #[must_use]
    pub fn project_onto_normal(self, normal: Self) -> Self {
        let len_sq = normal.length_squared();
        if len_sq <= SMALL_NUMBER {
            return Self::ZERO;
        }
        normal * (self.dot(normal) / len_sq)
    }

    /// Removes the component along `normal`, leaving the in-plane part.
    #[must_use]
    pub fn project_onto_plane(self, normal: Self) -> Self {
        self - self.project_onto_normal(normal)
    }

    /// Clamps the length to `max_length`, preserving direction.
    #[must_use]
    pub fn clamp_length(self, max_length: f32) -> Self {
        if max_length <= 0.0 {
            return Self::ZERO;
        }
        let len_sq = self.length_squared();
        if len_sq > max_length * max_length {
            self * (max_length / len_sq.sqrt())
        } else {
            self
        }
    }

    /// Replaces NaN/infinite components with zero.
    #[must_use]
    pub fn finite_or_zero(self) -> Self {
        if self.is_finite() {
            self
        } else {
            Self::ZERO
        }
    }

    /// Signed angle in radians from `self` to `other` around `axis`.
    ///
    /// Both vectors are flattened onto the plane orthogonal to `axis` first.
    #[must_use]
    pub fn signed_angle_about(self, other: Self, axis: Self) -> f32 {
        let from = self.project_onto_plane(axis);
        let to = other.project_onto_plane(axis);
        let sin = from.cross(to).dot(axis.normalize_or_zero());
        let cos = from.dot(to);
        sin.atan2(cos)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::MulAssign<f32> for Vec3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `radians` around `axis`. A degenerate axis yields identity.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, radians: f32) -> Self {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO || !radians.is_finite() {
            return Self::IDENTITY;
        }
        let (sin, cos) = (radians * 0.5).sin_cos();
        Self::new(axis.x * sin, axis.y * sin, axis.z * sin, cos)
    }

    /// Heading rotation around `up` that turns [`Vec3::X`] towards `direction`.
    #[must_use]
    pub fn from_heading(direction: Vec3, up: Vec3) -> Self {
        let flat = direction.project_onto_plane(up);
        if flat.is_nearly_zero(KINDA_SMALL_NUMBER) {
            return Self::IDENTITY;
        }
        Self::from_axis_angle(up, Vec3::X.signed_angle_about(flat, up))
    }

    /// Length squared of the four components.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Unit quaternion, or identity when degenerate.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= SMALL_NUMBER || !len_sq.is_finite() {
            return Self::IDENTITY;
        }
        let inv = 1.0 / len_sq.sqrt();
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Rotates a vector by this quaternion.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// The rotated forward axis.
    #[must_use]
    pub fn forward(self) -> Vec3 {
        self.rotate(Vec3::X)
    }

    /// True when every component is finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Self;
    /// Hamilton product: `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).is_nearly_zero(1.0e-4)
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 7.0);
        assert_eq!(sum.z, 9.0);

        let dot = a.dot(b);
        assert_eq!(dot, 32.0); // 1*4 + 2*5 + 3*6
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn test_vec3_bytemuck() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 12); // 3 * 4 bytes
    }

    #[test]
    fn test_projection_splits_vector() {
        let v = Vec3::new(3.0, 4.0, -5.0);
        let up = v.project_onto_normal(Vec3::Z);
        let plane = v.project_onto_plane(Vec3::Z);
        assert_eq!(up, Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(plane, Vec3::new(3.0, 4.0, 0.0));
        assert_eq!(up + plane, v);
    }

    #[test]
    fn test_degenerate_inputs_stay_finite() {
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
        assert_eq!(Vec3::new(f32::NAN, 0.0, 0.0).finite_or_zero(), Vec3::ZERO);
        assert_eq!(Vec3::X.project_onto_normal(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(Quaternion::from_axis_angle(Vec3::ZERO, 1.0), Quaternion::IDENTITY);
    }

    #[test]
    fn test_clamp_length() {
        let v = Vec3::new(300.0, 400.0, 0.0);
        assert!((v.clamp_length(100.0).length() - 100.0).abs() < 1.0e-3);
        assert_eq!(v.clamp_length(1000.0), v);
    }

    #[test]
    fn test_quaternion_rotation() {
        let quarter = Quaternion::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        assert!(approx(quarter.rotate(Vec3::X), Vec3::Y));
        assert!(approx((quarter * quarter).rotate(Vec3::X), -Vec3::X));
    }

    #[test]
    fn test_heading_faces_direction() {
        let q = Quaternion::from_heading(Vec3::new(0.0, -2.0, 5.0), Vec3::Z);
        assert!(approx(q.forward(), -Vec3::Y));
    }

    #[test]
    fn test_signed_angle_about() {
        let angle = Vec3::X.signed_angle_about(Vec3::Y, Vec3::Z);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1.0e-5);
        let angle = Vec3::X.signed_angle_about(-Vec3::Y, Vec3::Z);
        assert!((angle + std::f32::consts::FRAC_PI_2).abs() < 1.0e-5);
    }
}
