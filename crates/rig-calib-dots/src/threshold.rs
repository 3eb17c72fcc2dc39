//! Fixed-cutoff binarization.

use rig_calib_core::{GrayImage, GrayImageView};

/// Binary threshold: 255 where `value > cutoff`, 0 elsewhere.
pub fn threshold_binary(src: &GrayImageView<'_>, cutoff: u8) -> GrayImage {
    let data = src
        .data
        .iter()
        .map(|&v| if v > cutoff { 255 } else { 0 })
        .collect();
    GrayImage {
        width: src.width,
        height: src.height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_exclusive() {
        let img = GrayImage::from_raw(4, 1, vec![0, 200, 201, 255]).expect("size");
        let bin = threshold_binary(&img.view(), 200);
        assert_eq!(bin.data, vec![0, 0, 255, 255]);
    }
}
