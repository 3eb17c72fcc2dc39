//! Durable calibration results.
//!
//! On disk a record is a JSON object:
//!
//! ```json
//! {
//!   "camera_positions": [[0, 0, 0], [1, 0, 0], [2, 0, 0]],
//!   "calibration_data": {
//!     "timestamp": 1700000000.0,
//!     "num_cameras": 3,
//!     "resolution": [640, 480],
//!     "R01": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
//!     "t01": [1, 0, 0],
//!     "R12": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
//!     "t12": [1, 0, 0]
//!   }
//! }
//! ```
//!
//! `calibration_data` is absent for a layout that was never calibrated. Keys
//! inside it other than the pose entries are ignored.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use nalgebra::Point3;
use rig_calib_core::{PairwisePose, RigPosition};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("inconsistent calibration record: {0}")]
    Inconsistent(String),
}

/// Metadata and pairwise poses of a completed calibration.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationDetails {
    pub timestamp: f64,
    pub camera_count: usize,
    pub resolution: [u32; 2],
    /// Pose of camera `i + 1` relative to camera `i`.
    pub poses: Vec<PairwisePose>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationRecord {
    pub positions: Vec<RigPosition>,
    pub details: Option<CalibrationDetails>,
}

impl CalibrationRecord {
    pub fn calibrated(
        positions: Vec<RigPosition>,
        poses: Vec<PairwisePose>,
        timestamp: f64,
        resolution: [u32; 2],
    ) -> Self {
        let camera_count = positions.len();
        Self {
            positions,
            details: Some(CalibrationDetails {
                timestamp,
                camera_count,
                resolution,
                poses,
            }),
        }
    }

    pub fn camera_count(&self) -> usize {
        self.positions.len()
    }

    /// Position count, pose chain length and declared camera count agree.
    pub fn check_consistency(&self) -> Result<(), StoreError> {
        let Some(details) = &self.details else {
            return Ok(());
        };
        if details.camera_count != self.positions.len() {
            return Err(StoreError::Inconsistent(format!(
                "num_cameras is {} but {} positions are stored",
                details.camera_count,
                self.positions.len()
            )));
        }
        if details.poses.len() + 1 != details.camera_count {
            return Err(StoreError::Inconsistent(format!(
                "{} pairwise poses for {} cameras",
                details.poses.len(),
                details.camera_count
            )));
        }
        Ok(())
    }
}

/// Persistence backend for calibration records.
pub trait CalibrationStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<CalibrationRecord>, StoreError>;

    fn save(&self, record: &CalibrationRecord) -> Result<(), StoreError>;
}

/// [`CalibrationStore`] backed by one JSON file.
#[derive(Clone, Debug)]
pub struct JsonCalibrationStore {
    path: PathBuf,
}

impl JsonCalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for JsonCalibrationStore {
    fn load(&self) -> Result<Option<CalibrationRecord>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: CalibrationFile = serde_json::from_str(&raw)?;
        let record = file.into_record()?;
        record.check_consistency()?;
        Ok(Some(record))
    }

    fn save(&self, record: &CalibrationRecord) -> Result<(), StoreError> {
        record.check_consistency()?;
        let json = serde_json::to_string_pretty(&CalibrationFile::from_record(record))?;
        fs::write(&self.path, json)?;
        log::debug!("calibration saved to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationFile {
    camera_positions: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calibration_data: Option<CalibrationData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationData {
    timestamp: f64,
    num_cameras: usize,
    resolution: [u32; 2],
    /// `R{i}{i+1}` and `t{i}{i+1}` entries.
    #[serde(flatten)]
    poses: BTreeMap<String, PoseEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum PoseEntry {
    Rotation([[f64; 3]; 3]),
    Translation([f64; 3]),
    /// Keys other tools add next to the poses; ignored on load.
    Extra(serde_json::Value),
}

fn rotation_key(i: usize) -> String {
    format!("R{}{}", i, i + 1)
}

fn translation_key(i: usize) -> String {
    format!("t{}{}", i, i + 1)
}

impl CalibrationFile {
    fn from_record(record: &CalibrationRecord) -> Self {
        let calibration_data = record.details.as_ref().map(|d| {
            let mut poses = BTreeMap::new();
            for (i, pose) in d.poses.iter().enumerate() {
                poses.insert(rotation_key(i), PoseEntry::Rotation(pose.rotation_rows()));
                poses.insert(
                    translation_key(i),
                    PoseEntry::Translation(pose.translation_array()),
                );
            }
            CalibrationData {
                timestamp: d.timestamp,
                num_cameras: d.camera_count,
                resolution: d.resolution,
                poses,
            }
        });
        Self {
            camera_positions: record.positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
            calibration_data,
        }
    }

    fn into_record(self) -> Result<CalibrationRecord, StoreError> {
        let positions = self
            .camera_positions
            .iter()
            .map(|&[x, y, z]| Point3::new(x, y, z))
            .collect();
        let details = match self.calibration_data {
            None => None,
            Some(data) => {
                for (key, entry) in &data.poses {
                    if let PoseEntry::Extra(value) = entry {
                        log::debug!("ignoring calibration_data entry `{key}`: {value}");
                    }
                }
                let pairs = data.num_cameras.saturating_sub(1);
                let mut poses = Vec::with_capacity(pairs);
                for i in 0..pairs {
                    let r = match data.poses.get(&rotation_key(i)) {
                        Some(PoseEntry::Rotation(r)) => *r,
                        _ => return Err(missing(&rotation_key(i))),
                    };
                    let t = match data.poses.get(&translation_key(i)) {
                        Some(PoseEntry::Translation(t)) => *t,
                        _ => return Err(missing(&translation_key(i))),
                    };
                    let pose = PairwisePose::from_arrays(r, t).map_err(|e| {
                        StoreError::Inconsistent(format!("pose {}: {e}", rotation_key(i)))
                    })?;
                    poses.push(pose);
                }
                Some(CalibrationDetails {
                    timestamp: data.timestamp,
                    camera_count: data.num_cameras,
                    resolution: data.resolution,
                    poses,
                })
            }
        };
        Ok(CalibrationRecord { positions, details })
    }
}

fn missing(key: &str) -> StoreError {
    StoreError::Inconsistent(format!("missing or malformed entry `{key}`"))
}
