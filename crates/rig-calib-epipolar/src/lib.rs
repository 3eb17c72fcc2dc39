//! Relative pose between two rig cameras from matched marker centroids.
//!
//! Given index-aligned dot lists from two views, [`PoseEstimator`]:
//! 1. maps pixels into `[-1, 1]` with [`ImageNormalization`],
//! 2. solves the linear 8-point system for the essential matrix and projects
//!    it onto singular values `(1, 1, 0)`,
//! 3. decomposes it into the four `(R, t)` hypotheses of [`PoseCandidate`],
//! 4. keeps the hypothesis that reconstructs the most points in front of both
//!    cameras.
//!
//! Convention: `X2 = R X1 + s t` with `t` unit length and `s` unknown.

mod candidates;
mod correspondence;
mod error;
mod essential;
mod estimator;
mod normalize;

pub use candidates::{
    cheirality_score, decompose_essential, score_candidates, select_candidate,
    triangulate_depths, EssentialDecomposition, PoseCandidate,
};
pub use correspondence::{CorrespondenceSet, MIN_CORRESPONDENCES};
pub use error::EpipolarError;
pub use essential::{enforce_essential_constraints, essential_8point, skew};
pub use estimator::{PoseEstimate, PoseEstimator, PoseEstimatorParams};
pub use normalize::ImageNormalization;
