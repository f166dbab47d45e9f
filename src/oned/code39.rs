use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::pattern::record_pattern;
use crate::result::{Decoded, Format, Metadata, Point};

// Tables
//------------------------------------------------------------------------------

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Nine-bit words, one bit per element, set for wide. Bars and spaces
/// alternate starting with a bar.
const CHARACTER_ENCODINGS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-Z, -, ., SP, $
    0x0A2, 0x08A, 0x02A, // /, +, %
];

const ASTERISK_ENCODING: u16 = 0x094;

// Narrow/wide classification
//------------------------------------------------------------------------------

/// Classifies nine runs as narrow or wide, returning the wide-flag word.
/// Exactly three elements must be wide and no single wide element may hold
/// half the total wide width.
fn to_narrow_wide_pattern(counters: &[usize; 9]) -> Option<u16> {
    let mut max_narrow = 0usize;
    loop {
        let min_above = counters.iter().copied().filter(|&c| c > max_narrow).min()?;
        max_narrow = min_above;
        let mut wide_count = 0;
        let mut total_wide = 0;
        let mut pattern = 0u16;
        for (i, &counter) in counters.iter().enumerate() {
            if counter > max_narrow {
                pattern |= 1 << (8 - i);
                wide_count += 1;
                total_wide += counter;
            }
        }
        if wide_count == 3 {
            for &counter in counters.iter() {
                if counter > max_narrow && counter * 2 >= total_wide {
                    return None;
                }
            }
            return Some(pattern);
        }
        if wide_count < 3 {
            return None;
        }
    }
}

fn pattern_to_char(pattern: u16) -> ScanResult<char> {
    if let Some(i) = CHARACTER_ENCODINGS.iter().position(|&e| e == pattern) {
        return Ok(ALPHABET[i] as char);
    }
    if pattern == ASTERISK_ENCODING {
        return Ok('*');
    }
    Err(ScanError::NotFound)
}

fn find_asterisk(row: &BitArray, counters: &mut [usize; 9]) -> ScanResult<(usize, usize)> {
    let width = row.size();
    let row_offset = row.next_set(0);
    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_white = false;

    for i in row_offset..width {
        if row.get(i) != is_white {
            counters[counter_position] += 1;
        } else {
            if counter_position == 8 {
                // The start character needs a half-width quiet zone.
                let quiet_start = pattern_start.saturating_sub((i - pattern_start) / 2);
                if to_narrow_wide_pattern(counters) == Some(ASTERISK_ENCODING)
                    && row.is_range(quiet_start, pattern_start, false)?
                {
                    return Ok((pattern_start, i));
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[7] = 0;
                counters[8] = 0;
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

// Extended mode
//------------------------------------------------------------------------------

/// Expands the +/$/%// shift pairs of extended Code 39 into full ASCII.
fn decode_extended(text: &str) -> ScanResult<String> {
    let bytes = text.as_bytes();
    let mut decoded = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if matches!(c, b'+' | b'$' | b'%' | b'/') {
            let next = *bytes.get(i + 1).ok_or(ScanError::Format)?;
            let decoded_char = match c {
                b'+' if next.is_ascii_uppercase() => next + 32,
                b'$' if next.is_ascii_uppercase() => next - 64,
                b'%' => match next {
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
                b'/' => match next {
                    b'A'..=b'O' => next - 32,
                    b'Z' => b':',
                    _ => return Err(ScanError::Format),
                },
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

/// Decodes Code 39, optionally verifying the mod-43 check character and
/// expanding extended-mode shift sequences.
pub struct Code39Reader {
    using_check_digit: bool,
    extended_mode: bool,
}

impl Code39Reader {
    pub fn new() -> Self {
        Self { using_check_digit: false, extended_mode: false }
    }

    pub fn with_options(using_check_digit: bool, extended_mode: bool) -> Self {
        Self { using_check_digit, extended_mode }
    }
}

impl RowReader for Code39Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let mut counters = [0usize; 9];
        let start = find_asterisk(row, &mut counters)?;
        let mut next_start = row.next_set(start.1);
        let end = row.size();

        let mut text = String::new();
        let mut last_start;
        loop {
            record_pattern(row, next_start, &mut counters)?;
            let pattern = to_narrow_wide_pattern(&counters).ok_or(ScanError::NotFound)?;
            let decoded_char = pattern_to_char(pattern)?;
            last_start = next_start;
            next_start += counters.iter().sum::<usize>();
            next_start = row.next_set(next_start);
            if decoded_char == '*' {
                break;
            }
            text.push(decoded_char);
        }

        let last_pattern_size = counters.iter().sum::<usize>();
        let white_space_after = next_start - last_start - last_pattern_size;
        if next_start != end && white_space_after * 2 < last_pattern_size {
            return Err(ScanError::NotFound);
        }

        if self.using_check_digit {
            let check = text.pop().ok_or(ScanError::NotFound)?;
            let total: usize = text
                .bytes()
                .map(|b| {
                    ALPHABET
                        .iter()
                        .position(|&a| a == b)
                        .ok_or(ScanError::Format)
                })
                .sum::<ScanResult<usize>>()?;
            if check != ALPHABET[total % 43] as char {
                return Err(ScanError::Checksum);
            }
        }
        if text.is_empty() {
            return Err(ScanError::NotFound);
        }
        if self.extended_mode {
            text = decode_extended(&text)?;
        }

        hints.report_point(Point::new((start.0 + start.1) as f32 / 2.0, row_number as f32));
        let left = (start.0 + start.1) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        let mut result = Decoded::new(
            text,
            Vec::new(),
            vec![Point::new(left, row_number as f32), Point::new(right, row_number as f32)],
            Format::Code39,
        );
        result.put_metadata(Metadata::SymbologyIdentifier("]A0".into()));
        Ok(result)
    }
}

#[cfg(test)]
mod code39_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    fn push_char(bits: &mut Vec<bool>, encoding: u16, narrow: usize, wide: usize) {
        for i in 0..9 {
            let w = if encoding & (1 << (8 - i)) != 0 { wide } else { narrow };
            push_run(bits, i % 2 == 0, w);
        }
        // Inter-character narrow gap.
        push_run(bits, false, narrow);
    }

    fn encoding_for(c: char) -> u16 {
        if c == '*' {
            return ASTERISK_ENCODING;
        }
        let i = ALPHABET.iter().position(|&a| a == c as u8).unwrap();
        CHARACTER_ENCODINGS[i]
    }

    fn build_row(content: &str) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 20);
        push_char(&mut bits, ASTERISK_ENCODING, 2, 5);
        for c in content.chars() {
            push_char(&mut bits, encoding_for(c), 2, 5);
        }
        push_char(&mut bits, ASTERISK_ENCODING, 2, 5);
        push_run(&mut bits, false, 20);
        row_from_bools(&bits)
    }

    #[test]
    fn test_basic_decode() {
        let row = build_row("CODE-39");
        let hints = DecodeHints::default();
        let mut reader = Code39Reader::new();
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "CODE-39");
        assert_eq!(result.format, Format::Code39);
    }

    #[test]
    fn test_check_digit() {
        // "CODE" sums to 12+24+13+14 = 63, 63 % 43 = 20 which is "K".
        let row = build_row("CODEK");
        let hints = DecodeHints::default();
        let mut reader = Code39Reader::with_options(true, false);
        assert_eq!(reader.decode_row(0, &row, &hints).unwrap().text, "CODE");

        let bad = build_row("CODEL");
        assert_eq!(reader.decode_row(0, &bad, &hints), Err(ScanError::Checksum));
    }

    #[test]
    fn test_extended_mode() {
        assert_eq!(decode_extended("+A").unwrap(), "a");
        assert_eq!(decode_extended("$A").unwrap(), "\u{1}");
        assert_eq!(decode_extended("%V").unwrap(), "@");
        assert_eq!(decode_extended("/Z").unwrap(), ":");
        assert_eq!(decode_extended("AB+C1").unwrap(), "ABc1");
        assert!(decode_extended("+1").is_err());
        assert!(decode_extended("+").is_err());
    }

    #[test]
    fn test_narrow_wide_classification() {
        // Asterisk is bwwbWbWbw with wides at 3, 4 and 6 counting bars and
        // spaces together: 0x094 = 0b010010100.
        let counters = [2usize, 5, 2, 2, 5, 2, 5, 2, 2];
        assert_eq!(to_narrow_wide_pattern(&counters), Some(ASTERISK_ENCODING));
        // Four wide elements never settle on three.
        let counters = [5usize, 5, 2, 2, 5, 2, 5, 2, 2];
        assert_eq!(to_narrow_wide_pattern(&counters), None);
    }

    #[test]
    fn test_empty_between_asterisks() {
        let row = build_row("");
        let hints = DecodeHints::default();
        let mut reader = Code39Reader::new();
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }
}
