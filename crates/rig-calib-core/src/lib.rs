//! Core types and utilities for multi-camera rig calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any camera driver, image codec or storage backend.

mod image;
mod logger;
mod pose;

pub use image::{GrayImage, GrayImageView, RgbImage};
pub use pose::{
    direction_angle_between, rotation_angle_between, validate_rotation, PairwisePose,
    PoseValidationError, RigPosition, POSE_TOLERANCE,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_str, init_with_level};

pub use nalgebra::Point2;

/// Pixel-space marker centroid, `(x, y)` with the origin at the top-left pixel.
pub type Dot = Point2<f32>;
