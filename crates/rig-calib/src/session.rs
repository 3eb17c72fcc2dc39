//! One calibration attempt from frame capture to committed rig positions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use rig_calib_core::{Dot, PairwisePose, RigPosition};
use rig_calib_dots::DotDetector;
use rig_calib_epipolar::{
    CorrespondenceSet, EpipolarError, PoseEstimator, MIN_CORRESPONDENCES,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::assembler::{AssemblyError, RigAssembler};
use crate::config::{ConfigError, RigConfig};
use crate::source::{now_seconds, CameraReadError, CameraSettings, Frame, FrameSource};
use crate::state::{RigState, SharedRig, StateError};
use crate::store::{CalibrationRecord, CalibrationStore};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("cameras are not streaming")]
    NotStreaming,
    #[error("a calibration session is already in progress")]
    SessionInFlight,
    #[error(transparent)]
    CameraRead(#[from] CameraReadError),
    #[error("camera {camera_index} shows {count} dots, at least {required} are needed")]
    InsufficientDots {
        camera_index: usize,
        count: usize,
        required: usize,
    },
    #[error("pose between cameras {first} and {second}: {source}")]
    PairPose {
        first: usize,
        second: usize,
        #[source]
        source: EpipolarError,
    },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Progress of the calibration engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Collecting,
    Estimating,
    Committing,
}

/// Result of a calibration trigger as reported to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub success: bool,
    pub message: String,
    pub positions: Option<Vec<[f64; 3]>>,
}

/// Everything a successful session produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationReport {
    pub positions: Vec<RigPosition>,
    pub poses: Vec<PairwisePose>,
    pub timestamp: f64,
    /// `false` when the in-memory commit succeeded but persisting it failed.
    pub persisted: bool,
}

/// A frame plus the dots found in it, when preview detection is enabled.
#[derive(Clone, Debug)]
pub struct Preview {
    pub frame: Frame,
    pub dots: Option<Vec<Dot>>,
}

/// Holds the session slot; releases it back to `Idle` on drop.
struct PhaseGuard<'a> {
    phase: &'a Mutex<SessionPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn begin(phase: &'a Mutex<SessionPhase>) -> Result<Self, CalibrationError> {
        let mut current = lock(phase);
        if *current != SessionPhase::Idle {
            return Err(CalibrationError::SessionInFlight);
        }
        *current = SessionPhase::Collecting;
        Ok(Self { phase })
    }

    fn advance(&self, next: SessionPhase) {
        *lock(self.phase) = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = SessionPhase::Idle;
    }
}

fn lock(phase: &Mutex<SessionPhase>) -> MutexGuard<'_, SessionPhase> {
    match phase.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Calibration engine bound to one rig.
///
/// Owns the detector, estimator and assembler configured from a
/// [`RigConfig`], and funnels every successful result through
/// [`SharedRig::commit`] before persisting it.
pub struct CalibrationService {
    config: RigConfig,
    source: Arc<dyn FrameSource>,
    store: Arc<dyn CalibrationStore>,
    rig: SharedRig,
    detector: DotDetector,
    estimator: PoseEstimator,
    assembler: RigAssembler,
    streaming: AtomicBool,
    dot_detection: AtomicBool,
    phase: Mutex<SessionPhase>,
}

impl CalibrationService {
    /// Validate `config`, then build the rig state from the stored
    /// calibration or, when there is none or it does not fit, from the
    /// configured defaults.
    pub fn startup(
        config: RigConfig,
        source: Arc<dyn FrameSource>,
        store: Arc<dyn CalibrationStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if source.camera_count() != config.camera_count {
            return Err(ConfigError::Invalid(format!(
                "frame source has {} cameras, config expects {}",
                source.camera_count(),
                config.camera_count
            )));
        }

        let positions = match store.load() {
            Ok(Some(record)) if record.camera_count() == config.camera_count => {
                info!("loaded calibration with {} cameras", record.camera_count());
                record.positions
            }
            Ok(Some(record)) => {
                warn!(
                    "stored calibration has {} cameras, expected {}; using defaults",
                    record.camera_count(),
                    config.camera_count
                );
                config.default_positions.clone()
            }
            Ok(None) => {
                info!("no stored calibration, using default positions");
                config.default_positions.clone()
            }
            Err(err) => {
                warn!("could not load calibration ({err}); using default positions");
                config.default_positions.clone()
            }
        };

        let rig = SharedRig::new(RigState::new(positions, config.look_ats.clone()));
        let (width, height) = (config.resolution[0], config.resolution[1]);
        Ok(Self {
            detector: DotDetector::new(config.detector.clone()),
            estimator: PoseEstimator::new(width, height, config.estimator),
            assembler: RigAssembler::new(
                config.reference_position,
                config.baseline,
                config.camera_count,
            ),
            config,
            source,
            store,
            rig,
            streaming: AtomicBool::new(false),
            dot_detection: AtomicBool::new(false),
            phase: Mutex::new(SessionPhase::Idle),
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Handle to the shared rig state, for broadcasters and simulators.
    pub fn rig(&self) -> SharedRig {
        self.rig.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        *lock(&self.phase)
    }

    pub fn start_stream(&self) {
        self.streaming.store(true, Ordering::SeqCst);
        info!("camera stream started");
    }

    pub fn stop_stream(&self) {
        self.streaming.store(false, Ordering::SeqCst);
        info!("camera stream stopped");
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    pub fn set_dot_detection(&self, enabled: bool) {
        self.dot_detection.store(enabled, Ordering::SeqCst);
    }

    pub fn dot_detection(&self) -> bool {
        self.dot_detection.load(Ordering::SeqCst)
    }

    pub fn apply_settings(&self, settings: CameraSettings) -> Result<(), CameraReadError> {
        self.source.apply_settings(settings)?;
        info!(
            "camera settings applied: exposure {}, gain {}",
            settings.exposure, settings.gain
        );
        Ok(())
    }

    /// One frame from `camera_index`, with dots when preview detection is on.
    pub fn preview(&self, camera_index: usize) -> Result<Preview, CameraReadError> {
        let frame = self.source.read(camera_index)?;
        let dots = self
            .dot_detection()
            .then(|| self.detector.detect_rgb(&frame.image));
        Ok(Preview { frame, dots })
    }

    /// Run a calibration and fold the result into a caller-facing outcome.
    pub fn trigger(&self) -> CalibrationOutcome {
        match self.calibrate() {
            Ok(report) => {
                let message = if report.persisted {
                    "calibration succeeded".to_string()
                } else {
                    "calibration succeeded (not saved to disk)".to_string()
                };
                CalibrationOutcome {
                    success: true,
                    message,
                    positions: Some(report.positions.iter().map(|p| [p.x, p.y, p.z]).collect()),
                }
            }
            Err(err) => CalibrationOutcome {
                success: false,
                message: format!("calibration failed: {err}"),
                positions: None,
            },
        }
    }

    /// Run one calibration attempt.
    ///
    /// On any error the rig state is left exactly as it was.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn calibrate(&self) -> Result<CalibrationReport, CalibrationError> {
        if !self.is_streaming() {
            return Err(CalibrationError::NotStreaming);
        }
        let session = PhaseGuard::begin(&self.phase)?;

        let result = self.run_session(&session);
        match &result {
            Ok(report) => info!(
                "calibration committed for {} cameras",
                report.positions.len()
            ),
            Err(err @ (CalibrationError::Assembly(_) | CalibrationError::State(_))) => {
                error!("calibration aborted on internal inconsistency: {err}")
            }
            Err(err) => warn!("calibration failed: {err}"),
        }
        result
    }

    fn run_session(&self, session: &PhaseGuard<'_>) -> Result<CalibrationReport, CalibrationError> {
        let observations = self.collect_observations()?;

        session.advance(SessionPhase::Estimating);
        let poses = self.estimate_chain(&observations)?;
        let positions = self.assembler.assemble(&poses)?;

        session.advance(SessionPhase::Committing);
        let timestamp = now_seconds();
        self.rig.commit(positions.clone(), poses.clone(), timestamp)?;

        let record = CalibrationRecord::calibrated(
            positions.clone(),
            poses.clone(),
            timestamp,
            self.config.resolution,
        );
        let persisted = match self.store.save(&record) {
            Ok(()) => true,
            Err(err) => {
                warn!("calibration kept in memory, saving failed: {err}");
                false
            }
        };

        Ok(CalibrationReport {
            positions,
            poses,
            timestamp,
            persisted,
        })
    }

    fn collect_observations(&self) -> Result<Vec<Vec<Dot>>, CalibrationError> {
        let mut observations = Vec::with_capacity(self.config.camera_count);
        for camera_index in 0..self.config.camera_count {
            let frame = self.source.read(camera_index)?;
            let dots = self
                .config
                .ordering
                .apply(self.detector.detect_rgb(&frame.image));
            debug!("camera {camera_index}: {} dots", dots.len());
            if dots.len() < MIN_CORRESPONDENCES {
                return Err(CalibrationError::InsufficientDots {
                    camera_index,
                    count: dots.len(),
                    required: MIN_CORRESPONDENCES,
                });
            }
            observations.push(dots);
        }
        Ok(observations)
    }

    fn estimate_chain(&self, observations: &[Vec<Dot>]) -> Result<Vec<PairwisePose>, CalibrationError> {
        observations
            .windows(2)
            .enumerate()
            .map(|(first, pair)| {
                let second = first + 1;
                if pair[0].len() != pair[1].len() {
                    warn!(
                        "cameras {first} and {second} disagree on dot count ({} vs {}), pairing the common prefix",
                        pair[0].len(),
                        pair[1].len()
                    );
                }
                CorrespondenceSet::truncated(&pair[0], &pair[1])
                    .and_then(|set| self.estimator.estimate(&set))
                    .map_err(|source| CalibrationError::PairPose {
                        first,
                        second,
                        source,
                    })
            })
            .collect()
    }
}
