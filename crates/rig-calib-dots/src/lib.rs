//! Bright fiducial dot detector.
//!
//! Pipeline:
//! 1. Convert the frame to single-channel intensity.
//! 2. Binary-threshold at a fixed brightness cutoff.
//! 3. Label 8-connected components and trace the outer boundary of each.
//! 4. Keep components whose enclosed area lies in `[min_area, max_area]` and
//!    whose circularity `4 pi A / P^2` exceeds `min_circularity`.
//! 5. Report the centroid from the first-order area moments of the boundary.

mod contour;
mod detector;
mod params;
mod threshold;

pub use contour::{contour_moments, find_component_contours, Contour, ContourMoments};
pub use detector::{DotCandidate, DotDetector};
pub use params::DotDetectorParams;
pub use threshold::threshold_binary;
