//! Adapters between `image` buffers and the rig-calib image types.

use std::path::Path;

use rig_calib_core::{Dot, RgbImage};
use rig_calib_dots::{DotDetector, DotDetectorParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error("invalid image buffer ({width}x{height}, {len} bytes)")]
    InvalidBuffer { width: u32, height: u32, len: usize },
}

/// Copy an `image::RgbImage` into the lightweight core type.
pub fn rgb_from_image(img: &::image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Copy a core RGB frame into an `image::RgbImage`.
pub fn image_from_rgb(img: &RgbImage) -> Result<::image::RgbImage, DetectError> {
    let (width, height) = (img.width as u32, img.height as u32);
    ::image::RgbImage::from_raw(width, height, img.data.clone()).ok_or(DetectError::InvalidBuffer {
        width,
        height,
        len: img.data.len(),
    })
}

/// Decode any supported file format into an RGB frame.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, DetectError> {
    let img = ::image::ImageReader::open(path)?.decode()?.to_rgb8();
    Ok(rgb_from_image(&img))
}

pub fn save_rgb(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), DetectError> {
    image_from_rgb(img)?.save(path)?;
    Ok(())
}

/// Run the dot detector on an `image::RgbImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn detect_dots(img: &::image::RgbImage, params: &DotDetectorParams) -> Vec<Dot> {
    DotDetector::new(params.clone()).detect_rgb(&rgb_from_image(img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_convert_both_ways() {
        let mut img = ::image::RgbImage::new(4, 3);
        img.put_pixel(2, 1, ::image::Rgb([10, 20, 30]));
        let core = rgb_from_image(&img);
        assert_eq!(core.pixel(2, 1), [10, 20, 30]);
        assert_eq!(image_from_rgb(&core).expect("convert"), img);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            load_rgb(dir.path().join("absent.png")),
            Err(DetectError::Io(_))
        ));
    }

    #[test]
    fn png_roundtrip_keeps_dots_detectable() {
        let mut img = ::image::RgbImage::new(160, 120);
        for y in 0..120u32 {
            for x in 0..160u32 {
                let (dx, dy) = (x as f32 - 80.0, y as f32 - 60.0);
                if dx * dx + dy * dy <= 36.0 {
                    img.put_pixel(x, y, ::image::Rgb([255, 255, 255]));
                }
            }
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dot.png");
        save_rgb(&rgb_from_image(&img), &path).expect("save");

        let loaded = ::image::open(&path).expect("open").to_rgb8();
        let dots = detect_dots(&loaded, &DotDetectorParams::default());
        assert_eq!(dots.len(), 1);
        assert!((dots[0].x - 80.0).abs() < 0.5 && (dots[0].y - 60.0).abs() < 0.5);
        assert_eq!(load_rgb(&path).expect("load").width, 160);
    }
}
