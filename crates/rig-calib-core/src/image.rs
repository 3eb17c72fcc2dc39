#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Wrap a row-major buffer, `None` if its length does not match `width * height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Interleaved 8-bit RGB frame as delivered by a camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major, len = w*h*3
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (width.checked_mul(height)?.checked_mul(3)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = 3 * (y * self.width + x);
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let idx = 3 * (y * self.width + x);
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Single-channel intensity using the ITU-R BT.601 luma weights.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                ((y + 500) / 1000) as u8
            })
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_of_white_and_black() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, [255, 255, 255]);
        let gray = img.to_gray();
        assert_eq!(gray.data, vec![0, 255]);
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(GrayImage::from_raw(4, 3, vec![0; 12]).is_some());
        assert!(GrayImage::from_raw(4, 3, vec![0; 11]).is_none());
        assert!(RgbImage::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(RgbImage::from_raw(2, 2, vec![0; 4]).is_none());
    }

    #[test]
    fn view_reads_row_major() {
        let gray = GrayImage::from_raw(3, 2, vec![0, 1, 2, 3, 4, 5]).expect("size");
        let view = gray.view();
        assert_eq!(view.get(2, 0), 2);
        assert_eq!(view.get(0, 1), 3);
    }
}
