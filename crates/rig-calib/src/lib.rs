//! Multi-camera rig calibration from bright fiducial dots.
//!
//! This crate ties the `rig-calib-*` workspace together:
//! - re-exports of the core types, the dot detector and the pairwise pose
//!   estimator,
//! - [`RigAssembler`] to chain pairwise poses into camera positions,
//! - [`CalibrationService`] to run calibration sessions against a
//!   [`FrameSource`], commit into [`SharedRig`] and persist through a
//!   [`CalibrationStore`],
//! - a [`Broadcaster`] that pushes the rig layout on a fixed period,
//! - (feature `image`) adapters to and from `image` buffers.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use rig_calib::{
//!     default_synthetic_rig, CalibrationService, DotOrdering, JsonCalibrationStore, Resolution,
//!     RigConfig, SyntheticFrameSource, SyntheticTarget,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RigConfig {
//!     ordering: DotOrdering::RowMajor { row_tolerance: 30.0 },
//!     ..RigConfig::default()
//! };
//! let source = SyntheticFrameSource::from_target(
//!     Resolution::Large,
//!     SyntheticTarget::Cube,
//!     &default_synthetic_rig(),
//! );
//! let store = JsonCalibrationStore::new(&config.store_path);
//! let service = CalibrationService::startup(config, Arc::new(source), Arc::new(store))?;
//!
//! service.start_stream();
//! let outcome = service.trigger();
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub use rig_calib_core as core;
pub use rig_calib_dots as dots;
pub use rig_calib_epipolar as epipolar;

pub use rig_calib_core::{Dot, PairwisePose, RigPosition};
pub use rig_calib_dots::{DotDetector, DotDetectorParams};
pub use rig_calib_epipolar::{CorrespondenceSet, PoseEstimator, PoseEstimatorParams};

mod assembler;
mod broadcast;
mod config;
mod ordering;
mod session;
mod source;
mod state;
mod store;

#[cfg(feature = "image")]
pub mod detect;

pub use assembler::{assemble, AssemblyError, RigAssembler};
pub use broadcast::{BroadcastSink, Broadcaster, BroadcasterHandle, ChannelSink, JsonLinesSink};
pub use config::{ConfigError, RigConfig};
pub use ordering::DotOrdering;
pub use session::{
    CalibrationError, CalibrationOutcome, CalibrationReport, CalibrationService, Preview,
    SessionPhase,
};
pub use source::{
    default_synthetic_rig, now_seconds, CameraReadError, CameraSettings, Frame, FrameSource,
    Resolution, SyntheticCamera, SyntheticFrameSource, SyntheticTarget,
};
pub use state::{CalibrationMetadata, PositionUpdate, RigState, SharedRig, StateError};
pub use store::{
    CalibrationDetails, CalibrationRecord, CalibrationStore, JsonCalibrationStore, StoreError,
};
