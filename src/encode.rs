//! Writers: turn text into printable module patterns.
//!
//! The QR writer lives in [`crate::qr::encoder`] and is re-exported here;
//! this module adds the retail 1D writers (EAN-13, EAN-8, UPC-A) and the
//! raster rendering helpers.

use image::{GrayImage, Luma};

use crate::bits::BitMatrix;
use crate::error::{ScanError, ScanResult};
use crate::oned::upc_ean::{
    standard_checksum, FIRST_DIGIT_ENCODINGS, L_AND_G_PATTERNS, L_PATTERNS, MIDDLE_PATTERN,
    START_END_PATTERN,
};

pub use crate::qr::encoder::{encode_qr, EncodedQr, QrOptions, StructuredAppend};

/// Quiet zone on each side of a retail symbol, in modules.
const QUIET_ZONE: usize = 9;

// Module synthesis
//------------------------------------------------------------------------------

/// Bar pattern of an EAN-13 symbol, one bool per module, guards included
/// but no quiet zones. A 12-digit input gets its check digit appended; a
/// 13-digit input must already carry a valid one.
pub fn ean13_row_modules(contents: &str) -> ScanResult<Vec<bool>> {
    let mut digits = digit_values(contents)?;
    match digits.len() {
        12 => {
            let check = standard_checksum(&digits);
            digits.push(check);
        }
        13 => {
            if standard_checksum(&digits[..12]) != digits[12] {
                return Err(ScanError::Checksum);
            }
        }
        _ => return Err(ScanError::InvalidDimensions),
    }

    let parities = FIRST_DIGIT_ENCODINGS[digits[0] as usize];
    let mut modules = Vec::with_capacity(95);
    append_runs(&mut modules, &START_END_PATTERN, true);
    for (i, &digit) in digits[1..7].iter().enumerate() {
        let mut pattern = digit as usize;
        if parities >> (5 - i) & 1 == 1 {
            pattern += 10;
        }
        append_runs(&mut modules, &L_AND_G_PATTERNS[pattern], false);
    }
    append_runs(&mut modules, &MIDDLE_PATTERN, false);
    for &digit in &digits[7..13] {
        append_runs(&mut modules, &L_PATTERNS[digit as usize], true);
    }
    append_runs(&mut modules, &START_END_PATTERN, true);
    Ok(modules)
}

/// Bar pattern of an EAN-8 symbol. Takes 7 digits plus an optional check
/// digit, like [`ean13_row_modules`].
pub fn ean8_row_modules(contents: &str) -> ScanResult<Vec<bool>> {
    let mut digits = digit_values(contents)?;
    match digits.len() {
        7 => {
            let check = standard_checksum(&digits);
            digits.push(check);
        }
        8 => {
            if standard_checksum(&digits[..7]) != digits[7] {
                return Err(ScanError::Checksum);
            }
        }
        _ => return Err(ScanError::InvalidDimensions),
    }

    let mut modules = Vec::with_capacity(67);
    append_runs(&mut modules, &START_END_PATTERN, true);
    for &digit in &digits[..4] {
        append_runs(&mut modules, &L_PATTERNS[digit as usize], false);
    }
    append_runs(&mut modules, &MIDDLE_PATTERN, false);
    for &digit in &digits[4..8] {
        append_runs(&mut modules, &L_PATTERNS[digit as usize], true);
    }
    append_runs(&mut modules, &START_END_PATTERN, true);
    Ok(modules)
}

/// Bar pattern of a UPC-A symbol: the EAN-13 pattern of "0" + contents.
pub fn upca_row_modules(contents: &str) -> ScanResult<Vec<bool>> {
    if contents.len() != 11 && contents.len() != 12 {
        return Err(ScanError::InvalidDimensions);
    }
    let mut ean = String::with_capacity(13);
    ean.push('0');
    ean.push_str(contents);
    ean13_row_modules(&ean)
}

fn digit_values(contents: &str) -> ScanResult<Vec<u8>> {
    contents
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8).ok_or(ScanError::InvalidChar))
        .collect()
}

fn append_runs(modules: &mut Vec<bool>, pattern: &[usize], start_dark: bool) {
    let mut dark = start_dark;
    for &run in pattern {
        modules.extend(std::iter::repeat(dark).take(run));
        dark = !dark;
    }
}

// Matrix assembly
//------------------------------------------------------------------------------

/// EAN-13 symbol as a single-row matrix with quiet zones.
pub fn encode_ean13(contents: &str) -> ScanResult<BitMatrix> {
    Ok(row_matrix(&ean13_row_modules(contents)?))
}

/// EAN-8 symbol as a single-row matrix with quiet zones.
pub fn encode_ean8(contents: &str) -> ScanResult<BitMatrix> {
    Ok(row_matrix(&ean8_row_modules(contents)?))
}

/// UPC-A symbol as a single-row matrix with quiet zones.
pub fn encode_upca(contents: &str) -> ScanResult<BitMatrix> {
    Ok(row_matrix(&upca_row_modules(contents)?))
}

fn row_matrix(modules: &[bool]) -> BitMatrix {
    let mut matrix = BitMatrix::new(modules.len() + 2 * QUIET_ZONE, 1);
    for (i, &m) in modules.iter().enumerate() {
        if m {
            matrix.set(QUIET_ZONE + i, 0);
        }
    }
    matrix
}

// Render
//------------------------------------------------------------------------------

/// Stretches a single-row matrix into a barcode image of the given bar
/// height, `module_width` pixels per module.
pub fn render_row(matrix: &BitMatrix, module_width: u32, height: u32) -> GrayImage {
    let width = matrix.width() as u32 * module_width;
    let mut canvas = GrayImage::new(width, height);
    for x in 0..width {
        let pixel = if matrix.get((x / module_width) as usize, 0) {
            Luma([0])
        } else {
            Luma([255])
        };
        for y in 0..height {
            canvas.put_pixel(x, y, pixel);
        }
    }
    canvas
}

/// Rasterizes an encoded QR symbol with the standard 4-module quiet zone.
pub fn render_qr(encoded: &EncodedQr, module_sz: u32) -> GrayImage {
    let qz_sz = 4 * module_sz;
    let qr_sz = encoded.matrix.width() as u32 * module_sz;
    let total_sz = qz_sz + qr_sz + qz_sz;

    let mut canvas = GrayImage::new(total_sz, total_sz);
    for i in 0..total_sz {
        for j in 0..total_sz {
            if i < qz_sz || i >= qz_sz + qr_sz || j < qz_sz || j >= qz_sz + qr_sz {
                canvas.put_pixel(j, i, Luma([255]));
                continue;
            }
            let r = ((i - qz_sz) / module_sz) as usize;
            let c = ((j - qz_sz) / module_sz) as usize;
            let pixel = if encoded.matrix.get(c, r) { Luma([0]) } else { Luma([255]) };
            canvas.put_pixel(j, i, pixel);
        }
    }
    canvas
}
