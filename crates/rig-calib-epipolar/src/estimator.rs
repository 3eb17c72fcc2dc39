use log::debug;
use rig_calib_core::PairwisePose;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::candidates::{decompose_essential, score_candidates, select_candidate, PoseCandidate};
use crate::correspondence::CorrespondenceSet;
use crate::essential::essential_8point;
use crate::normalize::ImageNormalization;
use crate::EpipolarError;

/// Tuning for [`PoseEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseEstimatorParams {
    /// Minimum `sigma_8 / sigma_1` of the constraint matrix before the
    /// configuration is reported as degenerate.
    pub min_singular_ratio: f64,
}

impl Default for PoseEstimatorParams {
    fn default() -> Self {
        Self {
            min_singular_ratio: 1e-5,
        }
    }
}

/// Estimated pose plus the cheirality vote that selected it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseEstimate {
    pub pose: PairwisePose,
    pub candidate: PoseCandidate,
    /// Points in front of both cameras for the chosen hypothesis.
    pub inliers: usize,
    pub scores: [(PoseCandidate, usize); 4],
}

/// Relative pose of one camera with respect to another from index-aligned dots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseEstimator {
    normalization: ImageNormalization,
    params: PoseEstimatorParams,
}

impl PoseEstimator {
    pub fn new(width: u32, height: u32, params: PoseEstimatorParams) -> Self {
        Self {
            normalization: ImageNormalization::new(width, height),
            params,
        }
    }

    pub fn normalization(&self) -> &ImageNormalization {
        &self.normalization
    }

    pub fn params(&self) -> &PoseEstimatorParams {
        &self.params
    }

    /// `(R, t)` such that `X2 = R X1 + s t` for points seen by both cameras.
    pub fn estimate(&self, set: &CorrespondenceSet) -> Result<PairwisePose, EpipolarError> {
        self.estimate_detailed(set).map(|e| e.pose)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, set), fields(points = set.len()))
    )]
    pub fn estimate_detailed(&self, set: &CorrespondenceSet) -> Result<PoseEstimate, EpipolarError> {
        let x1 = self.normalization.normalize_all(set.first());
        let x2 = self.normalization.normalize_all(set.second());

        let e = essential_8point(&x1, &x2, self.params.min_singular_ratio)?;
        let decomposition = decompose_essential(&e)?;
        let scores = score_candidates(&decomposition, &x1, &x2);
        let (candidate, inliers) = select_candidate(&scores);
        if inliers == 0 {
            return Err(EpipolarError::DegenerateGeometry(
                "no pose hypothesis places points in front of both cameras".into(),
            ));
        }

        let (r, t) = decomposition.hypothesis(candidate);
        let pose = PairwisePose::from_direction(r, t)?;
        debug!(
            "pose from {} correspondences: {:?} with {}/{} points in front",
            set.len(),
            candidate,
            inliers,
            set.len()
        );

        Ok(PoseEstimate {
            pose,
            candidate,
            inliers,
            scores,
        })
    }
}
