//! Rigid transforms reported by the AR subsystem
//!
//! WebXR hands out poses as 16 floats in column-major order. A [`Pose`] is
//! that matrix after validation: finite, affine, and with an invertible
//! basis, so it can always be decomposed into scale, rotation and
//! translation.

use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when checking the affine row and the basis determinant
const EPSILON: f32 = 1e-6;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PoseError {
    #[error("Pose matrix contains a non-finite value at index {0}")]
    NonFinite(usize),
    #[error("Pose matrix is not affine (bottom row {0:?})")]
    NotAffine([f32; 4]),
    #[error("Pose matrix has a singular basis")]
    Singular,
    #[error("Hit result has no pose in the requested reference space")]
    Unavailable,
}

/// A validated 4x4 world transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    matrix: Mat4,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        matrix: Mat4::IDENTITY,
    };

    /// Build a pose from a column-major 16-float array
    pub fn from_cols_array(cols: &[f32; 16]) -> Result<Self, PoseError> {
        if let Some(index) = cols.iter().position(|v| !v.is_finite()) {
            return Err(PoseError::NonFinite(index));
        }
        Self::from_matrix(Mat4::from_cols_array(cols))
    }

    /// Build a pose from a matrix, rejecting anything that is not a rigid
    /// (or scaled rigid) affine transform
    pub fn from_matrix(matrix: Mat4) -> Result<Self, PoseError> {
        if !matrix.is_finite() {
            return Err(PoseError::NonFinite(first_non_finite(&matrix)));
        }

        let row = matrix.row(3);
        if !row.abs_diff_eq(Vec4::W, EPSILON) {
            return Err(PoseError::NotAffine(row.to_array()));
        }

        if matrix.determinant().abs() < EPSILON {
            return Err(PoseError::Singular);
        }

        Ok(Self { matrix })
    }

    /// Pose that only translates
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            matrix: Mat4::from_translation(translation),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    /// Column-major array, the layout the AR subsystem and renderers expect
    pub fn to_cols_array(&self) -> [f32; 16] {
        self.matrix.to_cols_array()
    }

    /// World position (translation column)
    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    pub fn rotation(&self) -> Quat {
        self.decompose().1
    }

    pub fn scale(&self) -> Vec3 {
        self.decompose().0
    }

    /// Split into (scale, rotation, translation)
    pub fn decompose(&self) -> (Vec3, Quat, Vec3) {
        self.matrix.to_scale_rotation_translation()
    }
}

impl TryFrom<[f32; 16]> for Pose {
    type Error = PoseError;

    fn try_from(cols: [f32; 16]) -> Result<Self, Self::Error> {
        Self::from_cols_array(&cols)
    }
}

fn first_non_finite(matrix: &Mat4) -> usize {
    matrix
        .to_cols_array()
        .iter()
        .position(|v| !v.is_finite())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_from_webxr_layout() {
        // WebXR matrices are column-major: translation lives in elements 12..15
        let cols = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            1.0, 0.0, 2.0, 1.0,
        ];
        let pose = Pose::from_cols_array(&cols).unwrap();
        assert_eq!(pose.position(), Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(pose.to_cols_array(), cols);
    }

    #[test]
    fn test_rotation_is_preserved() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let matrix = Mat4::from_rotation_translation(rotation, Vec3::new(0.5, -1.0, 0.0));
        let pose = Pose::from_matrix(matrix).unwrap();
        assert!(pose.rotation().abs_diff_eq(rotation, 1e-5));
        assert!(pose.scale().abs_diff_eq(Vec3::ONE, 1e-5));
    }

    #[test]
    fn test_rejects_nan() {
        let mut cols = Mat4::IDENTITY.to_cols_array();
        cols[13] = f32::NAN;
        assert_eq!(Pose::from_cols_array(&cols), Err(PoseError::NonFinite(13)));
    }

    #[test]
    fn test_rejects_projective_row() {
        let mut cols = Mat4::IDENTITY.to_cols_array();
        cols[3] = 0.5;
        assert!(matches!(
            Pose::from_cols_array(&cols),
            Err(PoseError::NotAffine(_))
        ));
    }

    #[test]
    fn test_rejects_singular_basis() {
        let matrix = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(Pose::from_matrix(matrix), Err(PoseError::Singular));
    }
}
