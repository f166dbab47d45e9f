use std::sync::Arc;

use image::GrayImage;

use crate::error::{ScanError, ScanResult};

// Luminance source
//------------------------------------------------------------------------------

/// Read-only view over an 8-bit grayscale frame. Crops, inversion and
/// right-angle rotation are lazy view transforms over a shared buffer.
#[derive(Debug, Clone)]
pub struct LumaSource {
    buffer: Arc<[u8]>,
    // Stride of the underlying buffer, which may exceed `width` for crops.
    data_width: usize,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    inverted: bool,
}

impl LumaSource {
    pub fn new(buffer: Vec<u8>, width: usize, height: usize) -> ScanResult<Self> {
        if buffer.len() < width * height {
            return Err(ScanError::InvalidDimensions);
        }
        Ok(Self {
            buffer: buffer.into(),
            data_width: width,
            left: 0,
            top: 0,
            width,
            height,
            inverted: false,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        debug_assert!(x < self.width && y < self.height, "Index out of bounds: ({x}, {y})");

        let v = self.buffer[(self.top + y) * self.data_width + self.left + x];
        if self.inverted {
            255 - v
        } else {
            v
        }
    }

    /// Copies one row of luminance values into `out`, which is resized to
    /// `width`.
    pub fn row(&self, y: usize, out: &mut Vec<u8>) {
        debug_assert!(y < self.height, "Row out of bounds: {y}");

        out.clear();
        out.extend((0..self.width).map(|x| self.get(x, y)));
    }

    pub fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<Self> {
        if left + width > self.width || top + height > self.height {
            return Err(ScanError::InvalidDimensions);
        }
        let mut out = self.clone();
        out.left += left;
        out.top += top;
        out.width = width;
        out.height = height;
        Ok(out)
    }

    /// Same frame with black and white swapped, for symbols printed
    /// light-on-dark.
    pub fn invert(&self) -> Self {
        let mut out = self.clone();
        out.inverted = !out.inverted;
        out
    }

    /// Rotates the view 90 degrees counterclockwise, materializing a new
    /// buffer.
    pub fn rotate_ccw(&self) -> Self {
        let (w, h) = (self.width, self.height);
        let mut buffer = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                // Pixel (x, y) lands at row (w - 1 - x), column y.
                buffer[(w - 1 - x) * h + y] = self.get(x, y);
            }
        }
        Self {
            buffer: buffer.into(),
            data_width: h,
            left: 0,
            top: 0,
            width: h,
            height: w,
            inverted: false,
        }
    }
}

impl From<&GrayImage> for LumaSource {
    fn from(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        Self {
            buffer: img.as_raw().clone().into(),
            data_width: w,
            left: 0,
            top: 0,
            width: w,
            height: h,
            inverted: false,
        }
    }
}

#[cfg(test)]
mod luma_source_tests {
    use super::*;

    fn gradient(w: usize, h: usize) -> LumaSource {
        let buf: Vec<u8> = (0..w * h).map(|i| (i % 256) as u8).collect();
        LumaSource::new(buf, w, h).unwrap()
    }

    #[test]
    fn test_get_and_row() {
        let src = gradient(10, 4);
        assert_eq!(src.get(3, 2), 23);
        let mut row = Vec::new();
        src.row(1, &mut row);
        assert_eq!(row, (10..20).map(|v| v as u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_crop() {
        let src = gradient(10, 4).crop(2, 1, 5, 3).unwrap();
        assert_eq!(src.width(), 5);
        assert_eq!(src.height(), 3);
        assert_eq!(src.get(0, 0), 12);
        assert!(src.crop(0, 0, 6, 3).is_err());
    }

    #[test]
    fn test_invert() {
        let src = gradient(4, 4);
        assert_eq!(src.invert().get(0, 0), 255);
        assert_eq!(src.invert().invert().get(0, 0), 0);
    }

    #[test]
    fn test_rotate_ccw() {
        let src = gradient(3, 2);
        let rot = src.rotate_ccw();
        assert_eq!(rot.width(), 2);
        assert_eq!(rot.height(), 3);
        // Rightmost column of the source becomes the top row.
        assert_eq!(rot.get(0, 0), src.get(2, 0));
        assert_eq!(rot.get(1, 0), src.get(2, 1));
        assert_eq!(rot.get(0, 2), src.get(0, 0));
    }
}
