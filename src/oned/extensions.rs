use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::oned::upc_ean::{decode_digit, find_guard_pattern, L_AND_G_PATTERNS};
use crate::result::{Decoded, Format, Point};

// EAN/UPC add-ons
//------------------------------------------------------------------------------

const EXTENSION_START_PATTERN: [usize; 3] = [1, 1, 2];

/// Parity word over five digits selects the add-on check digit.
const CHECK_DIGIT_ENCODINGS: [u8; 10] =
    [0x18, 0x14, 0x12, 0x11, 0x0C, 0x06, 0x03, 0x0A, 0x09, 0x05];

/// Reads the optional 2- or 5-digit supplement to the right of an EAN/UPC
/// symbol. Five digits are tried first.
pub struct ExtensionReader;

impl ExtensionReader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_row(
        &self,
        row_number: usize,
        row: &BitArray,
        row_offset: usize,
    ) -> ScanResult<Decoded> {
        let start = find_guard_pattern(row, row_offset, false, &EXTENSION_START_PATTERN)?;
        decode_five(row_number, row, start).or_else(|_| decode_two(row_number, row, start))
    }
}

fn extension_result(
    text: String,
    row_number: usize,
    start: (usize, usize),
    end: usize,
) -> Decoded {
    Decoded::new(
        text,
        Vec::new(),
        vec![
            Point::new((start.0 + start.1) as f32 / 2.0, row_number as f32),
            Point::new(end as f32, row_number as f32),
        ],
        Format::UpcEanExtension,
    )
}

// Five digits
//------------------------------------------------------------------------------

fn decode_five(row_number: usize, row: &BitArray, start: (usize, usize)) -> ScanResult<Decoded> {
    let mut counters = [0usize; 4];
    let mut row_offset = start.1;
    let mut lg_pattern = 0u8;
    let mut text = String::new();
    let end = row.size();

    for x in 0..5 {
        if row_offset >= end {
            return Err(ScanError::NotFound);
        }
        let best = decode_digit(row, &mut counters, row_offset, &L_AND_G_PATTERNS)?;
        text.push((b'0' + (best % 10) as u8) as char);
        row_offset += counters.iter().sum::<usize>();
        if best >= 10 {
            lg_pattern |= 1 << (4 - x);
        }
        if x != 4 {
            // Skip the delineator between digits.
            row_offset = row.next_set(row_offset);
            row_offset = row.next_unset(row_offset);
        }
    }

    if text.len() != 5 {
        return Err(ScanError::NotFound);
    }
    let check = CHECK_DIGIT_ENCODINGS
        .iter()
        .position(|&enc| enc == lg_pattern)
        .ok_or(ScanError::NotFound)?;
    if extension_checksum(&text) != check as u32 {
        return Err(ScanError::NotFound);
    }
    Ok(extension_result(text, row_number, start, row_offset))
}

fn extension_checksum(text: &str) -> u32 {
    let digits: Vec<u32> = text.bytes().map(|b| (b - b'0') as u32).collect();
    let mut sum = 0;
    let mut i = digits.len() as isize - 2;
    while i >= 0 {
        sum += digits[i as usize];
        i -= 2;
    }
    sum *= 3;
    let mut i = digits.len() as isize - 1;
    while i >= 0 {
        sum += digits[i as usize];
        i -= 2;
    }
    sum *= 3;
    sum % 10
}

// Two digits
//------------------------------------------------------------------------------

fn decode_two(row_number: usize, row: &BitArray, start: (usize, usize)) -> ScanResult<Decoded> {
    let mut counters = [0usize; 4];
    let mut row_offset = start.1;
    let mut lg_pattern = 0u8;
    let mut text = String::new();
    let end = row.size();

    for x in 0..2 {
        if row_offset >= end {
            return Err(ScanError::NotFound);
        }
        let best = decode_digit(row, &mut counters, row_offset, &L_AND_G_PATTERNS)?;
        text.push((b'0' + (best % 10) as u8) as char);
        row_offset += counters.iter().sum::<usize>();
        if best >= 10 {
            lg_pattern |= 1 << (1 - x);
        }
        if x != 1 {
            row_offset = row.next_set(row_offset);
            row_offset = row.next_unset(row_offset);
        }
    }

    if text.len() != 2 {
        return Err(ScanError::NotFound);
    }
    // The parity word encodes the value mod 4.
    let value: u32 = text.parse().map_err(|_| ScanError::NotFound)?;
    if value % 4 != lg_pattern as u32 {
        return Err(ScanError::NotFound);
    }
    Ok(extension_result(text, row_number, start, row_offset))
}

#[cfg(test)]
mod extensions_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools, L_PATTERNS};

    // G patterns are the reversed L patterns.
    fn g_pattern(digit: usize) -> [usize; 4] {
        let mut p = L_PATTERNS[digit];
        p.reverse();
        p
    }

    fn push_digit(bits: &mut Vec<bool>, widths: &[usize; 4]) {
        // Add-on digits start with a space run.
        for (i, &w) in widths.iter().enumerate() {
            push_run(bits, i % 2 == 1, w);
        }
    }

    fn build_five(digits: [usize; 5], parities: u8) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 12);
        // Start guard: bar, space, double bar.
        push_run(&mut bits, true, 1);
        push_run(&mut bits, false, 1);
        push_run(&mut bits, true, 2);
        for (x, &d) in digits.iter().enumerate() {
            push_digit(
                &mut bits,
                &if parities & (1 << (4 - x)) != 0 { g_pattern(d) } else { L_PATTERNS[d] },
            );
            if x != 4 {
                // Delineator: space then bar.
                push_run(&mut bits, false, 1);
                push_run(&mut bits, true, 1);
            }
        }
        push_run(&mut bits, false, 12);
        row_from_bools(&bits)
    }

    #[test]
    fn test_extension_checksum() {
        // ((3 + 1) * 3 + 4 + 2 + 5) * 3 = 69.
        assert_eq!(extension_checksum("51234"), 9);
        // ((9 + 0) * 3 + 9 + 9 + 9) * 3 = 162.
        assert_eq!(extension_checksum("90999"), 2);
    }

    #[test]
    fn test_five_digit_supplement() {
        let digits = [5usize, 1, 2, 3, 4];
        let check = extension_checksum("51234") as usize;
        let parities = CHECK_DIGIT_ENCODINGS[check];
        let row = build_five(digits, parities);
        let reader = ExtensionReader::new();
        let result = reader.decode_row(0, &row, 0).unwrap();
        assert_eq!(result.text, "51234");
        assert_eq!(result.format, Format::UpcEanExtension);
    }

    #[test]
    fn test_five_digit_bad_parity_rejected() {
        let digits = [5usize, 1, 2, 3, 4];
        let check = extension_checksum("51234") as usize;
        // Wrong parity word for this checksum.
        let parities = CHECK_DIGIT_ENCODINGS[(check + 1) % 10];
        let row = build_five(digits, parities);
        let reader = ExtensionReader::new();
        assert!(reader.decode_row(0, &row, 0).is_err());
    }

    #[test]
    fn test_two_digit_supplement() {
        // "34" has parity word 34 % 4 = 2, so G then L.
        let mut bits = Vec::new();
        push_run(&mut bits, false, 12);
        push_run(&mut bits, true, 1);
        push_run(&mut bits, false, 1);
        push_run(&mut bits, true, 2);
        push_digit(&mut bits, &g_pattern(3));
        push_run(&mut bits, false, 1);
        push_run(&mut bits, true, 1);
        push_digit(&mut bits, &L_PATTERNS[4]);
        push_run(&mut bits, false, 12);
        let row = row_from_bools(&bits);
        let reader = ExtensionReader::new();
        let result = reader.decode_row(0, &row, 0).unwrap();
        assert_eq!(result.text, "34");
    }
}
