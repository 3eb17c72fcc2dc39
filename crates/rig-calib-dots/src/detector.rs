use log::debug;
use rig_calib_core::{Dot, GrayImageView, RgbImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::contour::{contour_moments, find_component_contours};
use crate::params::DotDetectorParams;
use crate::threshold::threshold_binary;

/// One accepted bright blob with its shape measurements.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DotCandidate {
    pub center: Dot,
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
}

/// Bright circular marker detector.
///
/// Each call is independent: there is no identity tracking across frames,
/// and centroids are returned in the order their components are discovered
/// by a row-major scan.
#[derive(Clone, Debug, Default)]
pub struct DotDetector {
    params: DotDetectorParams,
}

impl DotDetector {
    pub fn new(params: DotDetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DotDetectorParams {
        &self.params
    }

    /// Detect dot centroids in a grayscale image. An empty result is valid.
    pub fn detect(&self, image: &GrayImageView<'_>) -> Vec<Dot> {
        self.detect_candidates(image)
            .into_iter()
            .map(|c| c.center)
            .collect()
    }

    /// Detect dot centroids in a color frame.
    pub fn detect_rgb(&self, image: &RgbImage) -> Vec<Dot> {
        let gray = image.to_gray();
        self.detect(&gray.view())
    }

    /// Full detection with per-dot area, perimeter and circularity.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect_candidates(&self, image: &GrayImageView<'_>) -> Vec<DotCandidate> {
        let p = &self.params;
        let mask = threshold_binary(image, p.threshold);
        let contours = find_component_contours(&mask.view());

        let mut out = Vec::new();
        for contour in &contours {
            let m = contour_moments(&contour.points);
            if m.area < p.min_area || m.area > p.max_area {
                continue;
            }
            let circularity = m.circularity();
            if circularity <= p.min_circularity {
                continue;
            }
            out.push(DotCandidate {
                center: Dot::new(m.centroid.0 as f32, m.centroid.1 as f32),
                area: m.area,
                perimeter: m.perimeter,
                circularity,
            });
        }

        debug!(
            "dot detector: {} components, {} accepted",
            contours.len(),
            out.len()
        );
        out
    }
}
