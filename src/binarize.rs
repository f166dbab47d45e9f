use std::cell::OnceCell;

use crate::bits::{BitArray, BitMatrix};
use crate::error::{ScanError, ScanResult};
use crate::luminance::LumaSource;

// Histogram binarizer
//------------------------------------------------------------------------------

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const BUCKETS: usize = 1 << LUMINANCE_BITS;

/// Picks a global threshold from a 32-bucket luminance histogram: the valley
/// between the two most significant peaks. Fails when the histogram has no
/// usable bimodal shape.
fn estimate_black_point(buckets: &[usize; BUCKETS]) -> ScanResult<u8> {
    let mut max_bucket_count = 0;
    let mut first_peak = 0;
    let mut first_peak_size = 0;
    for (x, &count) in buckets.iter().enumerate() {
        if count > first_peak_size {
            first_peak = x;
            first_peak_size = count;
        }
        max_bucket_count = max_bucket_count.max(count);
    }

    // Second peak: favors distance from the first so pure black/white images
    // still split.
    let mut second_peak = 0;
    let mut second_peak_score = 0;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x.abs_diff(first_peak);
        let score = count * distance * distance;
        if score > second_peak_score {
            second_peak = x;
            second_peak_score = score;
        }
    }

    let (first_peak, second_peak) = if first_peak > second_peak {
        (second_peak, first_peak)
    } else {
        (first_peak, second_peak)
    };
    if second_peak - first_peak <= BUCKETS / 16 {
        return Err(ScanError::NotFound);
    }

    let mut best_valley = second_peak - 1;
    let mut best_valley_score = -1i64;
    let mut x = second_peak - 1;
    while x > first_peak {
        let from_first = (x - first_peak) as i64;
        let score = from_first
            * from_first
            * (second_peak - x) as i64
            * (max_bucket_count - buckets[x]) as i64;
        if score > best_valley_score {
            best_valley = x;
            best_valley_score = score;
        }
        x -= 1;
    }
    Ok((best_valley << LUMINANCE_SHIFT) as u8)
}

/// Thresholds one row, with a light sharpening filter to keep thin bars from
/// washing out.
pub fn binarize_row(source: &LumaSource, y: usize, luminances: &mut Vec<u8>) -> ScanResult<BitArray> {
    let width = source.width();
    if width < 3 {
        return Err(ScanError::NotFound);
    }
    source.row(y, luminances);

    let mut buckets = [0usize; BUCKETS];
    for &v in luminances.iter() {
        buckets[(v >> LUMINANCE_SHIFT) as usize] += 1;
    }
    let black_point = estimate_black_point(&buckets)? as i32;

    let mut row = BitArray::new(width);
    let mut left = luminances[0] as i32;
    let mut center = luminances[1] as i32;
    for x in 1..width - 1 {
        let right = luminances[x + 1] as i32;
        let luminance = ((center * 4) - left - right) / 2;
        if luminance < black_point {
            row.set(x);
        }
        left = center;
        center = right;
    }
    Ok(row)
}

/// Thresholds the whole frame against a black point estimated from a handful
/// of interior rows.
pub fn binarize_matrix(source: &LumaSource) -> ScanResult<BitMatrix> {
    let width = source.width();
    let height = source.height();
    if width == 0 || height == 0 {
        return Err(ScanError::NotFound);
    }

    let mut buckets = [0usize; BUCKETS];
    for y in 1..5 {
        let row = height * y / 5;
        let right = (width * 4) / 5;
        for x in width / 5..right {
            buckets[(source.get(x, row) >> LUMINANCE_SHIFT) as usize] += 1;
        }
    }
    let black_point = estimate_black_point(&buckets)?;

    let mut matrix = BitMatrix::new(width, height);
    for y in 0..height {
        for x in 0..width {
            if source.get(x, y) < black_point {
                matrix.set(x, y);
            }
        }
    }
    Ok(matrix)
}

// Binary bitmap
//------------------------------------------------------------------------------

/// A luminance frame paired with a lazily built, cached black/white matrix.
pub struct BinaryBitmap {
    source: LumaSource,
    matrix: OnceCell<ScanResult<BitMatrix>>,
}

impl BinaryBitmap {
    pub fn new(source: LumaSource) -> Self {
        Self { source, matrix: OnceCell::new() }
    }

    pub fn width(&self) -> usize {
        self.source.width()
    }

    pub fn height(&self) -> usize {
        self.source.height()
    }

    pub fn source(&self) -> &LumaSource {
        &self.source
    }

    pub fn black_row(&self, y: usize, luminances: &mut Vec<u8>) -> ScanResult<BitArray> {
        binarize_row(&self.source, y, luminances)
    }

    /// The thresholded frame. Built once; repeated calls are free.
    pub fn black_matrix(&self) -> ScanResult<&BitMatrix> {
        match self.matrix.get_or_init(|| binarize_matrix(&self.source)) {
            Ok(m) => Ok(m),
            Err(e) => Err(*e),
        }
    }

    pub fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<Self> {
        Ok(Self::new(self.source.crop(left, top, width, height)?))
    }

    pub fn rotate_ccw(&self) -> Self {
        Self::new(self.source.rotate_ccw())
    }
}

#[cfg(test)]
mod binarize_tests {
    use super::*;

    fn bimodal_source(width: usize, height: usize, dark_cols: &[usize]) -> LumaSource {
        let mut buf = vec![220u8; width * height];
        for y in 0..height {
            for &x in dark_cols {
                buf[y * width + x] = 20;
            }
        }
        LumaSource::new(buf, width, height).unwrap()
    }

    #[test]
    fn test_matrix_threshold() {
        let src = bimodal_source(30, 30, &[7, 8, 9, 20]);
        let m = binarize_matrix(&src).unwrap();
        assert!(m.get(8, 15));
        assert!(m.get(20, 0));
        assert!(!m.get(0, 0));
        assert!(!m.get(29, 29));
    }

    #[test]
    fn test_row_threshold() {
        let src = bimodal_source(40, 4, &[10, 11, 12, 13]);
        let mut lums = Vec::new();
        let row = binarize_row(&src, 2, &mut lums).unwrap();
        assert!(row.get(11));
        assert!(row.get(12));
        assert!(!row.get(5));
        assert!(!row.get(30));
    }

    #[test]
    fn test_flat_image_has_no_black_point() {
        let src = LumaSource::new(vec![0u8; 100], 10, 10).unwrap();
        assert!(binarize_matrix(&src).is_err());
    }

    #[test]
    fn test_bitmap_caches_matrix() {
        let src = bimodal_source(20, 20, &[3]);
        let bitmap = BinaryBitmap::new(src);
        let a = bitmap.black_matrix().unwrap() as *const BitMatrix;
        let b = bitmap.black_matrix().unwrap() as *const BitMatrix;
        assert_eq!(a, b);
    }
}
