use serde::{Deserialize, Serialize};

/// Parameters for the bright-dot detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotDetectorParams {
    /// Intensity cutoff; pixels strictly above it are foreground.
    pub threshold: u8,
    /// Minimal enclosed contour area in square pixels.
    pub min_area: f64,
    /// Maximal enclosed contour area in square pixels.
    pub max_area: f64,
    /// Minimal circularity `4 pi A / P^2` (1.0 for a perfect disc).
    pub min_circularity: f64,
}

impl Default for DotDetectorParams {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_area: 10.0,
            max_area: 3000.0,
            min_circularity: 0.6,
        }
    }
}
