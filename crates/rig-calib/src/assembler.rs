use nalgebra::Matrix3;
use rig_calib_core::{PairwisePose, RigPosition};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("pose chain has {got} links, expected {expected}")]
    ChainLengthMismatch { expected: usize, got: usize },
}

/// Chains adjacent pairwise poses into absolute camera positions.
///
/// Camera 0 sits at `reference`. Camera `i` is placed at
/// `position[i - 1] + scale * R_acc * t(i-1, i)` where `R_acc` is the
/// ordered product of all rotations before pair `(i-1, i)`, so each
/// translation direction is expressed in the camera-0 frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigAssembler {
    pub reference: RigPosition,
    pub scale: f64,
    pub camera_count: usize,
}

impl RigAssembler {
    pub fn new(reference: RigPosition, scale: f64, camera_count: usize) -> Self {
        Self {
            reference,
            scale,
            camera_count,
        }
    }

    pub fn assemble(&self, poses: &[PairwisePose]) -> Result<Vec<RigPosition>, AssemblyError> {
        assemble(self.reference, poses, self.scale, self.camera_count)
    }
}

pub fn assemble(
    reference: RigPosition,
    poses: &[PairwisePose],
    scale: f64,
    camera_count: usize,
) -> Result<Vec<RigPosition>, AssemblyError> {
    let expected = camera_count.saturating_sub(1);
    if camera_count == 0 || poses.len() != expected {
        return Err(AssemblyError::ChainLengthMismatch {
            expected,
            got: poses.len(),
        });
    }

    let mut positions = Vec::with_capacity(camera_count);
    positions.push(reference);
    let mut accumulated = Matrix3::identity();
    let mut current = reference;
    for pose in poses {
        current += scale * (accumulated * pose.translation());
        positions.push(current);
        accumulated *= pose.rotation();
    }
    Ok(positions)
}
