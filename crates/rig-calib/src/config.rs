//! JSON configuration of the rig and its calibration pipeline.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use nalgebra::Point3;
use rig_calib_core::RigPosition;
use rig_calib_dots::DotDetectorParams;
use rig_calib_epipolar::PoseEstimatorParams;
use serde::{Deserialize, Serialize};

use crate::ordering::DotOrdering;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid rig config: {0}")]
    Invalid(String),
}

fn default_camera_count() -> usize {
    3
}

fn default_resolution() -> [u32; 2] {
    [640, 480]
}

fn default_reference_position() -> RigPosition {
    Point3::origin()
}

fn default_positions() -> Vec<RigPosition> {
    vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
    ]
}

fn default_look_ats() -> Vec<Point3<f64>> {
    vec![Point3::origin(); 3]
}

fn default_baseline() -> f64 {
    1.0
}

fn default_broadcast_interval_ms() -> u64 {
    100
}

fn default_store_path() -> PathBuf {
    PathBuf::from("calibration.json")
}

/// Rig layout and calibration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    #[serde(default = "default_camera_count")]
    pub camera_count: usize,
    /// Frame size `[width, height]` in pixels.
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    /// Fixed position of camera 0.
    #[serde(default = "default_reference_position")]
    pub reference_position: RigPosition,
    /// Positions used until a calibration is loaded or computed.
    #[serde(default = "default_positions")]
    pub default_positions: Vec<RigPosition>,
    #[serde(default = "default_look_ats")]
    pub look_ats: Vec<Point3<f64>>,
    /// Length assigned to every unit translation direction when chaining.
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default)]
    pub detector: DotDetectorParams,
    #[serde(default)]
    pub estimator: PoseEstimatorParams,
    #[serde(default)]
    pub ordering: DotOrdering,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            camera_count: default_camera_count(),
            resolution: default_resolution(),
            reference_position: default_reference_position(),
            default_positions: default_positions(),
            look_ats: default_look_ats(),
            baseline: default_baseline(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            store_path: default_store_path(),
            detector: DotDetectorParams::default(),
            estimator: PoseEstimatorParams::default(),
            ordering: DotOrdering::default(),
        }
    }
}

impl RigConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Reject layouts the calibration pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.camera_count < 2 {
            return invalid(format!("need at least 2 cameras, got {}", self.camera_count));
        }
        if self.resolution[0] == 0 || self.resolution[1] == 0 {
            return invalid(format!("empty resolution {:?}", self.resolution));
        }
        if self.default_positions.len() != self.camera_count {
            return invalid(format!(
                "{} default positions for {} cameras",
                self.default_positions.len(),
                self.camera_count
            ));
        }
        if self.look_ats.len() != self.camera_count {
            return invalid(format!(
                "{} look-at targets for {} cameras",
                self.look_ats.len(),
                self.camera_count
            ));
        }
        if self.default_positions[0] != self.reference_position {
            return invalid("camera 0 default position must equal the reference position".into());
        }
        if !(self.baseline.is_finite() && self.baseline > 0.0) {
            return invalid(format!("baseline must be positive, got {}", self.baseline));
        }
        if self.broadcast_interval_ms == 0 {
            return invalid("broadcast interval must be non-zero".into());
        }
        Ok(())
    }
}
