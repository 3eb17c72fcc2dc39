//! Process-wide rig state shared by calibration sessions and the broadcaster.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nalgebra::Point3;
use rig_calib_core::{PairwisePose, RigPosition};
use serde::{Deserialize, Serialize};

use crate::source::now_seconds;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("expected {expected} camera positions, got {got}")]
    CameraCountMismatch { expected: usize, got: usize },
}

/// Outcome of the last successful calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMetadata {
    pub timestamp: f64,
    pub poses: Vec<PairwisePose>,
}

/// Current camera layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigState {
    pub positions: Vec<RigPosition>,
    pub look_ats: Vec<Point3<f64>>,
    pub last_updated: f64,
    pub last_calibration: Option<CalibrationMetadata>,
}

impl RigState {
    pub fn new(positions: Vec<RigPosition>, look_ats: Vec<Point3<f64>>) -> Self {
        Self {
            positions,
            look_ats,
            last_updated: now_seconds(),
            last_calibration: None,
        }
    }

    pub fn camera_count(&self) -> usize {
        self.positions.len()
    }

    pub fn to_update(&self) -> PositionUpdate {
        PositionUpdate {
            positions: self.positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
            look_ats: self.look_ats.iter().map(|p| [p.x, p.y, p.z]).collect(),
            timestamp: self.last_updated,
        }
    }
}

/// Broadcast payload: `{ positions, lookAts, timestamp }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub positions: Vec<[f64; 3]>,
    #[serde(rename = "lookAts")]
    pub look_ats: Vec<[f64; 3]>,
    pub timestamp: f64,
}

/// Cloneable handle to the single [`RigState`] of the process.
///
/// Readers always see a whole state; every mutation replaces the position
/// array under one short write lock.
#[derive(Clone, Debug)]
pub struct SharedRig {
    inner: Arc<RwLock<RigState>>,
}

impl SharedRig {
    pub fn new(state: RigState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn snapshot(&self) -> RigState {
        self.read().clone()
    }

    pub fn camera_count(&self) -> usize {
        self.read().camera_count()
    }

    /// Install calibrated positions and the poses that produced them.
    pub fn commit(
        &self,
        positions: Vec<RigPosition>,
        poses: Vec<PairwisePose>,
        timestamp: f64,
    ) -> Result<RigState, StateError> {
        let mut state = self.write();
        check_count(state.positions.len(), positions.len())?;
        state.positions = positions;
        state.last_updated = timestamp;
        state.last_calibration = Some(CalibrationMetadata { timestamp, poses });
        Ok(state.clone())
    }

    /// Replace all positions at once, e.g. from an external simulator tick.
    pub fn update_positions(&self, positions: Vec<RigPosition>) -> Result<(), StateError> {
        let mut state = self.write();
        check_count(state.positions.len(), positions.len())?;
        state.positions = positions;
        state.last_updated = now_seconds();
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, RigState> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, RigState> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn check_count(expected: usize, got: usize) -> Result<(), StateError> {
    if expected != got {
        return Err(StateError::CameraCountMismatch { expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn rig() -> SharedRig {
        SharedRig::new(RigState::new(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            vec![Point3::origin(); 2],
        ))
    }

    #[test]
    fn commit_replaces_positions_and_records_poses() {
        let rig = rig();
        let pose = PairwisePose::identity_along(Vector3::y()).expect("pose");
        let next = vec![Point3::origin(), Point3::new(0.0, 2.0, 0.0)];
        let state = rig.commit(next.clone(), vec![pose], 42.0).expect("commit");

        assert_eq!(state.positions, next);
        assert_eq!(rig.snapshot(), state);
        let meta = state.last_calibration.expect("metadata");
        assert_eq!(meta.timestamp, 42.0);
        assert_eq!(meta.poses, vec![pose]);
    }

    #[test]
    fn wrong_position_count_leaves_state_untouched() {
        let rig = rig();
        let before = rig.snapshot();
        let err = rig.update_positions(vec![Point3::origin()]).unwrap_err();
        assert_eq!(err, StateError::CameraCountMismatch { expected: 2, got: 1 });
        assert_eq!(rig.snapshot(), before);
    }

    #[test]
    fn update_serializes_with_look_ats_key() {
        let json = serde_json::to_value(rig().snapshot().to_update()).expect("json");
        assert_eq!(json["positions"][1], serde_json::json!([1.0, 0.0, 0.0]));
        assert_eq!(json["lookAts"].as_array().map(Vec::len), Some(2));
    }
}
