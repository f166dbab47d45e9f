use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::pattern::record_pattern;
use crate::result::{Decoded, Format, Metadata, Point};

// Tables
//------------------------------------------------------------------------------

/// The trailing a-d stand for the four shift metacharacters, then the stop
/// asterisk.
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%abcd*";

/// Nine-module bitmaps, one bit per module, bars set.
const CHARACTER_ENCODINGS: [u16; 48] = [
    0x114, 0x148, 0x144, 0x142, 0x128, 0x124, 0x122, 0x150, 0x112, 0x10A, // 0-9
    0x1A8, 0x1A4, 0x1A2, 0x194, 0x192, 0x18A, 0x168, 0x164, 0x162, 0x134, // A-J
    0x11A, 0x158, 0x14C, 0x146, 0x12C, 0x116, 0x1B4, 0x1B2, 0x1AC, 0x1A6, // K-T
    0x196, 0x19A, 0x16C, 0x166, 0x136, 0x13A, // U-Z
    0x12E, 0x1D4, 0x1D2, 0x1CA, 0x16E, 0x176, 0x1AE, // - . SP $ / + %
    0x126, 0x1DA, 0x1D6, 0x132, // shifts a-d
    0x15E, // *
];

const ASTERISK_ENCODING: u16 = 0x15E;

// Pattern conversion
//------------------------------------------------------------------------------

/// Scales six runs to nine modules and packs them as a bitmap, bars first.
fn to_pattern(counters: &[usize; 6]) -> Option<u16> {
    let sum: usize = counters.iter().sum();
    let mut pattern = 0u16;
    for (i, &counter) in counters.iter().enumerate() {
        let scaled = ((counter * 9) as f32 / sum as f32).round() as usize;
        if !(1..=4).contains(&scaled) {
            return None;
        }
        if i % 2 == 0 {
            for _ in 0..scaled {
                pattern = (pattern << 1) | 1;
            }
        } else {
            pattern <<= scaled;
        }
    }
    Some(pattern)
}

fn pattern_to_char(pattern: u16) -> ScanResult<char> {
    CHARACTER_ENCODINGS
        .iter()
        .position(|&e| e == pattern)
        .map(|i| ALPHABET[i] as char)
        .ok_or(ScanError::NotFound)
}

fn find_asterisk(row: &BitArray) -> ScanResult<(usize, usize)> {
    let width = row.size();
    let row_offset = row.next_set(0);
    let mut counters = [0usize; 6];
    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_white = false;

    for i in row_offset..width {
        if row.get(i) != is_white {
            counters[counter_position] += 1;
        } else {
            if counter_position == 5 {
                if to_pattern(&counters) == Some(ASTERISK_ENCODING) {
                    return Ok((pattern_start, i));
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[4] = 0;
                counters[5] = 0;
                counter_position -= 1;
            } else {
                counter_position += 1;
            }
            counters[counter_position] = 1;
            is_white = !is_white;
        }
    }
    Err(ScanError::NotFound)
}

// Checksums and extended mode
//------------------------------------------------------------------------------

fn check_one_checksum(chars: &[u8], check_position: usize, max_weight: usize) -> ScanResult<()> {
    let mut weight = 1;
    let mut total = 0;
    for i in (0..check_position).rev() {
        let value = ALPHABET
            .iter()
            .position(|&a| a == chars[i])
            .ok_or(ScanError::Format)?;
        total += weight * value;
        weight += 1;
        if weight > max_weight {
            weight = 1;
        }
    }
    if chars[check_position] != ALPHABET[total % 47] {
        return Err(ScanError::Checksum);
    }
    Ok(())
}

fn check_checksums(chars: &[u8]) -> ScanResult<()> {
    let length = chars.len();
    check_one_checksum(chars, length - 2, 20)?;
    check_one_checksum(chars, length - 1, 15)
}

/// Expands the a-d shift characters into full ASCII.
fn decode_extended(chars: &[u8]) -> ScanResult<String> {
    let mut decoded = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if (b'a'..=b'd').contains(&c) {
            let next = *chars.get(i + 1).ok_or(ScanError::Format)?;
            let decoded_char = match c {
                b'a' if next.is_ascii_uppercase() => next - 64,
                b'b' => match next {
                    b'A'..=b'E' => next - 38,
                    b'F'..=b'J' => next - 11,
                    b'K'..=b'O' => next + 16,
                    b'P'..=b'T' => next + 43,
                    b'U' => 0,
                    b'V' => b'@',
                    b'W' => b'`',
                    b'X' | b'Y' | b'Z' => 127,
                    _ => return Err(ScanError::Format),
                },
                b'c' => match next {
                    b'A'..=b'O' => next - 32,
                    b'Z' => b':',
                    _ => return Err(ScanError::Format),
                },
                b'd' if next.is_ascii_uppercase() => next + 32,
                _ => return Err(ScanError::Format),
            };
            decoded.push(decoded_char as char);
            i += 2;
        } else {
            decoded.push(c as char);
            i += 1;
        }
    }
    Ok(decoded)
}

// Reader
//------------------------------------------------------------------------------

pub struct Code93Reader;

impl Code93Reader {
    pub fn new() -> Self {
        Self
    }
}

impl RowReader for Code93Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let start = find_asterisk(row)?;
        let mut next_start = row.next_set(start.1);
        let end = row.size();

        let mut counters = [0usize; 6];
        let mut chars: Vec<u8> = Vec::new();
        let mut last_start;
        loop {
            record_pattern(row, next_start, &mut counters)?;
            let pattern = to_pattern(&counters).ok_or(ScanError::NotFound)?;
            let decoded_char = pattern_to_char(pattern)?;
            last_start = next_start;
            next_start += counters.iter().sum::<usize>();
            next_start = row.next_set(next_start);
            if decoded_char == '*' {
                break;
            }
            chars.push(decoded_char as u8);
        }

        // The stop asterisk is followed by a termination bar.
        if next_start == end || !row.get(next_start) {
            return Err(ScanError::NotFound);
        }
        if chars.len() < 2 {
            return Err(ScanError::NotFound);
        }
        check_checksums(&chars)?;
        chars.truncate(chars.len() - 2);
        let text = decode_extended(&chars)?;

        hints.report_point(Point::new((start.0 + start.1) as f32 / 2.0, row_number as f32));
        let last_pattern_size = counters.iter().sum::<usize>();
        let left = (start.0 + start.1) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let mut result = Decoded::new(
            text,
            Vec::new(),
            vec![Point::new(left, row_number as f32), Point::new(right, row_number as f32)],
            Format::Code93,
        );
        result.put_metadata(Metadata::SymbologyIdentifier("]G0".into()));
        Ok(result)
    }
}

#[cfg(test)]
mod code93_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    fn push_encoding(bits: &mut Vec<bool>, encoding: u16, scale: usize) {
        for i in (0..9).rev() {
            push_run(bits, encoding & (1 << i) != 0, scale);
        }
    }

    fn value_of(c: u8) -> usize {
        ALPHABET.iter().position(|&a| a == c).unwrap()
    }

    fn checksum_char(body: &[u8], max_weight: usize) -> u8 {
        let mut weight = 1;
        let mut total = 0;
        for &c in body.iter().rev() {
            total += weight * value_of(c);
            weight += 1;
            if weight > max_weight {
                weight = 1;
            }
        }
        ALPHABET[total % 47]
    }

    fn build_row(content: &str, scale: usize) -> BitArray {
        let mut body: Vec<u8> = content.bytes().collect();
        let c = checksum_char(&body, 20);
        body.push(c);
        let k = checksum_char(&body, 15);
        body.push(k);

        let mut bits = Vec::new();
        push_run(&mut bits, false, 20);
        push_encoding(&mut bits, ASTERISK_ENCODING, scale);
        for &c in &body {
            push_encoding(&mut bits, CHARACTER_ENCODINGS[value_of(c)], scale);
        }
        push_encoding(&mut bits, ASTERISK_ENCODING, scale);
        // Termination bar.
        push_run(&mut bits, true, scale);
        push_run(&mut bits, false, 20);
        row_from_bools(&bits)
    }

    #[test]
    fn test_basic_decode() {
        let row = build_row("CODE 93", 2);
        let hints = DecodeHints::default();
        let mut reader = Code93Reader::new();
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "CODE 93");
        assert_eq!(result.format, Format::Code93);
    }

    #[test]
    fn test_checksum_rejects_swap() {
        // Compute checksums for one string, then transpose two body chars.
        let mut body: Vec<u8> = b"AB12".to_vec();
        let c = checksum_char(&body, 20);
        body.push(c);
        let k = checksum_char(&body, 15);
        body.push(k);
        body.swap(0, 1);
        assert_eq!(check_checksums(&body), Err(ScanError::Checksum));
    }

    #[test]
    fn test_extended_shifts() {
        assert_eq!(decode_extended(b"dA").unwrap(), "a");
        assert_eq!(decode_extended(b"aM").unwrap(), "\r");
        assert_eq!(decode_extended(b"bV").unwrap(), "@");
        assert_eq!(decode_extended(b"cA").unwrap(), "!");
        assert!(decode_extended(b"d").is_err());
    }

    #[test]
    fn test_to_pattern() {
        // Asterisk is 101011110: runs 1,1,1,1,4,1.
        assert_eq!(to_pattern(&[2, 2, 2, 2, 8, 2]), Some(ASTERISK_ENCODING));
        // A run rounding to more than four modules is invalid.
        assert_eq!(to_pattern(&[10, 1, 1, 1, 1, 1]), None);
    }
}
