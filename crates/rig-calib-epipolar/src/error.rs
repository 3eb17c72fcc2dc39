use rig_calib_core::PoseValidationError;

/// Errors returned by the pairwise pose estimator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EpipolarError {
    #[error("need at least {required} point correspondences, got {got}")]
    InsufficientCorrespondences { got: usize, required: usize },
    #[error("correspondence views differ in length ({first} vs {second})")]
    LengthMismatch { first: usize, second: usize },
    #[error("duplicate point at index {index} in view {view}")]
    DuplicatePoint { view: usize, index: usize },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("svd failed in epipolar estimation")]
    SvdFailed,
    #[error(transparent)]
    InvalidPose(#[from] PoseValidationError),
}
