//! Frame acquisition contract and a synthetic rig that renders dot targets.

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use nalgebra::{Matrix3, Point3, Vector3};
use rig_calib_core::{Dot, RgbImage};
use rig_calib_epipolar::ImageNormalization;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraReadError {
    #[error("camera {camera_index} is not available")]
    Unavailable { camera_index: usize },
    #[error("camera {camera_index} read failed: {reason}")]
    Failed { camera_index: usize, reason: String },
    #[error("invalid camera settings: {0}")]
    InvalidSettings(String),
}

/// One color frame with its capture time in seconds since the Unix epoch.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp: f64,
}

/// Sensor exposure and gain, applied to every camera of the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub exposure: u32,
    pub gain: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure: 100,
            gain: 10,
        }
    }
}

impl CameraSettings {
    /// Brightness multiplier of the synthetic sensor.
    pub fn brightness(&self) -> f64 {
        (self.gain as f64 / 16.0) * (self.exposure as f64 / 64.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Large,
    Small,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Large => (640, 480),
            Resolution::Small => (320, 240),
        }
    }
}

/// Source of camera frames for the calibration engine.
///
/// Reads may block on hardware I/O; callers never hold rig locks while
/// reading.
pub trait FrameSource: Send + Sync {
    fn camera_count(&self) -> usize;

    /// Frame size `(width, height)` in pixels, identical for every camera.
    fn resolution(&self) -> (u32, u32);

    fn read(&self, camera_index: usize) -> Result<Frame, CameraReadError>;

    fn apply_settings(&self, _settings: CameraSettings) -> Result<(), CameraReadError> {
        Ok(())
    }
}

/// Seconds since the Unix epoch, `0.0` if the clock is before it.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Calibration target in world coordinates, centered on the origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticTarget {
    /// Twelve markers on three rows with staggered depths.
    #[default]
    Cube,
    /// The same twelve markers flattened onto `z = 0`.
    Plane,
}

const TARGET_DEPTHS: [f64; 12] = [-0.5, 0.3, -0.1, 0.5, 0.4, -0.4, 0.1, -0.2, 0.0, 0.5, -0.3, 0.2];

impl SyntheticTarget {
    pub fn points(self) -> Vec<Point3<f64>> {
        (0..12)
            .map(|i| {
                let x = -1.2 + 0.8 * (i % 4) as f64;
                let y = -0.9 + 0.9 * (i / 4) as f64;
                let z = match self {
                    SyntheticTarget::Cube => TARGET_DEPTHS[i],
                    SyntheticTarget::Plane => 0.0,
                };
                Point3::new(x, y, z)
            })
            .collect()
    }
}

/// Pinhole camera of the synthetic rig: `X_cam = R (X_world - center)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticCamera {
    pub rotation: Matrix3<f64>,
    pub center: Point3<f64>,
}

impl SyntheticCamera {
    /// Camera at `center` with its optical axis on `target`; image `y` points
    /// along world `+y`.
    pub fn looking_at(center: Point3<f64>, target: Point3<f64>) -> Self {
        let z = (target - center).normalize();
        let x = Vector3::y().cross(&z).normalize();
        let y = z.cross(&x);
        Self {
            rotation: Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]),
            center,
        }
    }

    pub fn to_camera(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * (p - self.center))
    }

    /// Ground-truth `(R, t)` with `X_other = R X_self + t`.
    pub fn relative_to(&self, other: &SyntheticCamera) -> (Matrix3<f64>, Vector3<f64>) {
        let r = other.rotation * self.rotation.transpose();
        let t = other.rotation * (self.center - other.center);
        (r, t)
    }
}

/// Three cameras on a horizontal line four units in front of the target.
pub fn default_synthetic_rig() -> Vec<SyntheticCamera> {
    [-0.6, 0.0, 0.6]
        .into_iter()
        .map(|x| SyntheticCamera::looking_at(Point3::new(x, 0.0, -4.0), Point3::origin()))
        .collect()
}

/// Frame source that renders white discs on a black frame.
///
/// Each camera has a fixed list of pixel positions, given explicitly or
/// projected from a [`SyntheticTarget`]. Brightness follows the current
/// [`CameraSettings`].
#[derive(Debug)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    patterns: Vec<Vec<Dot>>,
    dot_radius: f32,
    settings: RwLock<CameraSettings>,
}

impl SyntheticFrameSource {
    pub fn from_patterns(resolution: Resolution, patterns: Vec<Vec<Dot>>) -> Self {
        let (width, height) = resolution.dimensions();
        Self {
            width,
            height,
            patterns,
            dot_radius: 6.0,
            settings: RwLock::new(CameraSettings::default()),
        }
    }

    /// Project `target` through every camera of `rig`. Points behind a camera
    /// are dropped.
    pub fn from_target(
        resolution: Resolution,
        target: SyntheticTarget,
        rig: &[SyntheticCamera],
    ) -> Self {
        let (width, height) = resolution.dimensions();
        let norm = ImageNormalization::new(width, height);
        let points = target.points();
        let patterns = rig
            .iter()
            .map(|cam| {
                points
                    .iter()
                    .filter_map(|p| norm.project(&cam.to_camera(p)))
                    .collect()
            })
            .collect();
        Self::from_patterns(resolution, patterns)
    }

    pub fn with_dot_radius(mut self, radius: f32) -> Self {
        self.dot_radius = radius;
        self
    }

    pub fn pattern(&self, camera_index: usize) -> Option<&[Dot]> {
        self.patterns.get(camera_index).map(Vec::as_slice)
    }

    pub fn settings(&self) -> CameraSettings {
        match self.settings.read() {
            Ok(s) => *s,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn render(&self, dots: &[Dot], level: u8) -> RgbImage {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut img = RgbImage::new(w, h);
        let r = self.dot_radius;
        for d in dots {
            let x0 = (d.x - r).floor().max(0.0) as usize;
            let y0 = (d.y - r).floor().max(0.0) as usize;
            let x1 = ((d.x + r).ceil().max(0.0) as usize).min(w.saturating_sub(1));
            let y1 = ((d.y + r).ceil().max(0.0) as usize).min(h.saturating_sub(1));
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let dx = x as f32 - d.x;
                    let dy = y as f32 - d.y;
                    if dx * dx + dy * dy <= r * r {
                        img.put_pixel(x, y, [level; 3]);
                    }
                }
            }
        }
        img
    }
}

impl FrameSource for SyntheticFrameSource {
    fn camera_count(&self) -> usize {
        self.patterns.len()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read(&self, camera_index: usize) -> Result<Frame, CameraReadError> {
        let dots = self
            .patterns
            .get(camera_index)
            .ok_or(CameraReadError::Unavailable { camera_index })?;
        let level = (255.0 * self.settings().brightness()).clamp(0.0, 255.0) as u8;
        Ok(Frame {
            image: self.render(dots, level),
            timestamp: now_seconds(),
        })
    }

    fn apply_settings(&self, settings: CameraSettings) -> Result<(), CameraReadError> {
        if settings.gain == 0 || settings.exposure == 0 {
            return Err(CameraReadError::InvalidSettings(format!(
                "exposure {} and gain {} must be positive",
                settings.exposure, settings.gain
            )));
        }
        match self.settings.write() {
            Ok(mut s) => *s = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_render_bright_dots() {
        let src = SyntheticFrameSource::from_patterns(
            Resolution::Small,
            vec![vec![Dot::new(100.0, 80.0)]],
        );
        let frame = src.read(0).expect("frame");
        assert_eq!((frame.image.width, frame.image.height), (320, 240));
        assert_eq!(frame.image.pixel(100, 80), [249; 3]);
        assert_eq!(frame.image.pixel(10, 10), [0; 3]);
    }

    #[test]
    fn gain_and_exposure_scale_brightness() {
        let src = SyntheticFrameSource::from_patterns(
            Resolution::Large,
            vec![vec![Dot::new(50.0, 50.0)]],
        );
        src.apply_settings(CameraSettings {
            exposure: 64,
            gain: 8,
        })
        .expect("valid settings");
        assert_eq!(src.read(0).expect("frame").image.pixel(50, 50), [127; 3]);
        assert!(src
            .apply_settings(CameraSettings {
                exposure: 0,
                gain: 8
            })
            .is_err());
    }

    #[test]
    fn dot_radius_sets_disc_size() {
        let src = SyntheticFrameSource::from_patterns(
            Resolution::Small,
            vec![vec![Dot::new(100.0, 80.0)]],
        )
        .with_dot_radius(3.0);
        let frame = src.read(0).expect("frame");
        assert_eq!(frame.image.pixel(103, 80), [249; 3]);
        assert_eq!(frame.image.pixel(105, 80), [0; 3]);
    }

    #[test]
    fn unknown_camera_is_unavailable() {
        let src = SyntheticFrameSource::from_patterns(Resolution::Large, vec![vec![]]);
        assert_eq!(
            src.read(3).unwrap_err(),
            CameraReadError::Unavailable { camera_index: 3 }
        );
    }

    #[test]
    fn look_at_points_the_optical_axis() {
        let cam = SyntheticCamera::looking_at(Point3::new(0.6, 0.0, -4.0), Point3::origin());
        let p = cam.to_camera(&Point3::origin());
        assert!(p.x.abs() < 1e-12 && p.y.abs() < 1e-12 && p.z > 0.0);
        assert!((cam.rotation.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cube_target_projects_inside_every_frame() {
        let src = SyntheticFrameSource::from_target(
            Resolution::Large,
            SyntheticTarget::Cube,
            &default_synthetic_rig(),
        );
        for i in 0..3 {
            let dots = src.pattern(i).expect("camera");
            assert_eq!(dots.len(), 12);
            assert!(dots
                .iter()
                .all(|d| d.x > 20.0 && d.x < 620.0 && d.y > 20.0 && d.y < 460.0));
        }
    }
}
