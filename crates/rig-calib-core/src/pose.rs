use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Camera position in rig-relative coordinates (camera 0 frame).
pub type RigPosition = Point3<f64>;

/// Tolerance used when validating rotations and unit translations.
pub const POSE_TOLERANCE: f64 = 1e-6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseValidationError {
    #[error("pose contains non-finite values")]
    NonFinite,
    #[error("rotation is not orthonormal (max deviation {deviation:.3e})")]
    NotOrthonormal { deviation: f64 },
    #[error("rotation determinant is {determinant:.6}, expected +1")]
    BadDeterminant { determinant: f64 },
    #[error("translation direction has norm {norm:.6}, expected 1")]
    NotUnit { norm: f64 },
}

/// Relative pose between two cameras of an adjacent pair.
///
/// Maps a point from the first camera's frame into the second camera's frame,
/// `X2 = R * X1 + s * t`. Only the direction of `t` is observable, `s` comes
/// from the rig baseline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairwisePose {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl PairwisePose {
    /// Validate and build a pose.
    ///
    /// The rotation must be orthonormal with determinant +1 and the
    /// translation must be unit length, both within [`POSE_TOLERANCE`].
    pub fn new(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, PoseValidationError> {
        validate_rotation(&rotation)?;
        if !translation.iter().all(|v| v.is_finite()) {
            return Err(PoseValidationError::NonFinite);
        }
        let norm = translation.norm();
        if (norm - 1.0).abs() > POSE_TOLERANCE {
            return Err(PoseValidationError::NotUnit { norm });
        }
        Ok(Self {
            rotation,
            translation,
        })
    }

    /// Like [`PairwisePose::new`], but rescales a non-zero translation to unit length first.
    pub fn from_direction(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, PoseValidationError> {
        let norm = translation.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(PoseValidationError::NotUnit { norm });
        }
        Self::new(rotation, translation / norm)
    }

    pub fn identity_along(translation: Vector3<f64>) -> Result<Self, PoseValidationError> {
        Self::from_direction(Matrix3::identity(), translation)
    }

    #[inline]
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    #[inline]
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn rotation_rows(&self) -> [[f64; 3]; 3] {
        let r = &self.rotation;
        [
            [r[(0, 0)], r[(0, 1)], r[(0, 2)]],
            [r[(1, 0)], r[(1, 1)], r[(1, 2)]],
            [r[(2, 0)], r[(2, 1)], r[(2, 2)]],
        ]
    }

    pub fn translation_array(&self) -> [f64; 3] {
        [self.translation.x, self.translation.y, self.translation.z]
    }

    pub fn from_arrays(
        rotation: [[f64; 3]; 3],
        translation: [f64; 3],
    ) -> Result<Self, PoseValidationError> {
        let r = Matrix3::from_row_slice(&[
            rotation[0][0],
            rotation[0][1],
            rotation[0][2],
            rotation[1][0],
            rotation[1][1],
            rotation[1][2],
            rotation[2][0],
            rotation[2][1],
            rotation[2][2],
        ]);
        Self::new(r, Vector3::from(translation))
    }
}

/// Check that `r` is a proper rotation: `R^T R = I` and `det(R) = +1`.
pub fn validate_rotation(r: &Matrix3<f64>) -> Result<(), PoseValidationError> {
    if !r.iter().all(|v| v.is_finite()) {
        return Err(PoseValidationError::NonFinite);
    }
    let deviation = (r.transpose() * r - Matrix3::identity()).amax();
    if deviation > POSE_TOLERANCE {
        return Err(PoseValidationError::NotOrthonormal { deviation });
    }
    let determinant = r.determinant();
    if (determinant - 1.0).abs() > POSE_TOLERANCE {
        return Err(PoseValidationError::BadDeterminant { determinant });
    }
    Ok(())
}

/// Angle in radians of the relative rotation `a^T b`.
pub fn rotation_angle_between(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
    let cos_theta = (((a.transpose() * b).trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    cos_theta.acos()
}

/// Angle in radians between two (non-zero) direction vectors.
pub fn direction_angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom <= f64::EPSILON {
        return std::f64::consts::PI;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}
