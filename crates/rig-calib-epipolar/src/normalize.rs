use nalgebra::{Point2, Point3};
use rig_calib_core::Dot;
use serde::{Deserialize, Serialize};

/// Pixel-to-normalized mapping used to condition the linear solve.
///
/// Pixel `(x, y)` maps to `((x - w/2) / (w/2), (y - h/2) / (h/2))`, so the
/// whole frame lands in `[-1, 1]^2`. The same mapping doubles as the implied
/// pinhole model of the rig cameras: focal lengths `(w/2, h/2)` and the
/// principal point at the image center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageNormalization {
    pub half_width: f64,
    pub half_height: f64,
}

impl ImageNormalization {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            half_width: 0.5 * width.max(1) as f64,
            half_height: 0.5 * height.max(1) as f64,
        }
    }

    #[inline]
    pub fn normalize(&self, p: &Dot) -> Point2<f64> {
        Point2::new(
            (p.x as f64 - self.half_width) / self.half_width,
            (p.y as f64 - self.half_height) / self.half_height,
        )
    }

    pub fn normalize_all(&self, pts: &[Dot]) -> Vec<Point2<f64>> {
        pts.iter().map(|p| self.normalize(p)).collect()
    }

    #[inline]
    pub fn to_pixel(&self, p: &Point2<f64>) -> Dot {
        Dot::new(
            (p.x * self.half_width + self.half_width) as f32,
            (p.y * self.half_height + self.half_height) as f32,
        )
    }

    /// Project a camera-frame point to pixels, `None` behind the camera.
    pub fn project(&self, p_cam: &Point3<f64>) -> Option<Dot> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        Some(self.to_pixel(&Point2::new(p_cam.x / p_cam.z, p_cam.y / p_cam.z)))
    }
}
