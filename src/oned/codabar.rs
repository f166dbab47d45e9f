use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::result::{Decoded, Format, Metadata, Point};

// Tables
//------------------------------------------------------------------------------

const ALPHABET: &[u8] = b"0123456789-$:/.+ABCD";

/// Seven-bit words, one bit per element from the left, set for wide.
const CHARACTER_ENCODINGS: [u16; 20] = [
    0x003, 0x006, 0x009, 0x060, 0x012, 0x042, 0x021, 0x024, 0x030, 0x048, // 0-9
    0x00C, 0x018, 0x045, 0x051, 0x054, 0x015, 0x01A, 0x029, 0x00B, 0x00E, // -$:/.+ABCD
];

const START_END_CHARS: [u8; 4] = [b'A', b'B', b'C', b'D'];

const MIN_CHARACTER_LENGTH: usize = 3;

/// Wide elements may be at most this multiple of the average, plus padding
/// for rounding at small module sizes.
const MAX_ACCEPTABLE: f32 = 2.0;
const PADDING: f32 = 1.5;

// Reader
//------------------------------------------------------------------------------

/// Codabar has no checksum; the reader leans on start/stop characters and a
/// whole-symbol width consistency check instead.
pub struct CodabarReader {
    counters: Vec<usize>,
}

impl CodabarReader {
    pub fn new() -> Self {
        Self { counters: Vec::new() }
    }

    /// Records every run in the row. Entry 0 is the leading white run.
    fn set_counters(&mut self, row: &BitArray) -> ScanResult<()> {
        self.counters.clear();
        let i = row.next_unset(0);
        let end = row.size();
        if i >= end {
            return Err(ScanError::NotFound);
        }
        let mut is_white = true;
        let mut count = 0;
        for x in i..end {
            if row.get(x) != is_white {
                count += 1;
            } else {
                self.counters.push(count);
                count = 1;
                is_white = !is_white;
            }
        }
        self.counters.push(count);
        Ok(())
    }

    /// Classifies the seven runs at `position` against per-color thresholds
    /// halfway between the narrowest and widest element.
    fn to_narrow_wide_pattern(&self, position: usize) -> Option<usize> {
        let end = position + 7;
        // One more run must follow: the inter-character gap.
        if end >= self.counters.len() {
            return None;
        }
        let mut max_bar = 0;
        let mut min_bar = usize::MAX;
        for j in (position..end).step_by(2) {
            min_bar = min_bar.min(self.counters[j]);
            max_bar = max_bar.max(self.counters[j]);
        }
        let threshold_bar = (min_bar + max_bar) / 2;
        let mut max_space = 0;
        let mut min_space = usize::MAX;
        for j in ((position + 1)..end).step_by(2) {
            min_space = min_space.min(self.counters[j]);
            max_space = max_space.max(self.counters[j]);
        }
        let threshold_space = (min_space + max_space) / 2;

        let mut pattern = 0u16;
        for i in 0..7 {
            let threshold = if i % 2 == 0 { threshold_bar } else { threshold_space };
            if self.counters[position + i] > threshold {
                pattern |= 1 << (6 - i);
            }
        }
        CHARACTER_ENCODINGS.iter().position(|&e| e == pattern)
    }

    /// First odd counter index whose character is a start/stop letter with
    /// enough whitespace before it.
    fn find_start_pattern(&self) -> ScanResult<usize> {
        let mut i = 1;
        while i + 7 <= self.counters.len() {
            if let Some(char_offset) = self.to_narrow_wide_pattern(i) {
                if START_END_CHARS.contains(&ALPHABET[char_offset]) {
                    let pattern_size: usize = self.counters[i..i + 7].iter().sum();
                    if i == 1 || self.counters[i - 1] >= pattern_size / 2 {
                        return Ok(i);
                    }
                }
            }
            i += 2;
        }
        Err(ScanError::NotFound)
    }

    /// Re-checks every element of the decoded symbol against narrow and wide
    /// size bands averaged over the whole symbol.
    fn validate_pattern(&self, char_offsets: &[usize], start: usize) -> ScanResult<()> {
        let mut sizes = [0usize; 4];
        let mut counts = [0usize; 4];

        let mut pos = start;
        for &offset in char_offsets {
            let mut pattern = CHARACTER_ENCODINGS[offset];
            for j in (0..7).rev() {
                // Category: bar/space crossed with narrow/wide.
                let category = (j & 1) + (pattern & 1) as usize * 2;
                sizes[category] += self.counters[pos + j];
                counts[category] += 1;
                pattern >>= 1;
            }
            pos += 8;
        }

        let mut mins = [0f32; 4];
        let mut maxes = [0f32; 4];
        for i in 0..2 {
            mins[i] = 0.0;
            mins[i + 2] =
                (sizes[i] as f32 / counts[i] as f32 + sizes[i + 2] as f32 / counts[i + 2] as f32)
                    / 2.0;
            maxes[i] = mins[i + 2];
            maxes[i + 2] = (sizes[i + 2] as f32 * MAX_ACCEPTABLE + PADDING) / counts[i + 2] as f32;
        }

        let mut pos = start;
        for &offset in char_offsets {
            let mut pattern = CHARACTER_ENCODINGS[offset];
            for j in (0..7).rev() {
                let category = (j & 1) + (pattern & 1) as usize * 2;
                let size = self.counters[pos + j] as f32;
                if size < mins[category] || size > maxes[category] {
                    return Err(ScanError::NotFound);
                }
                pattern >>= 1;
            }
            pos += 8;
        }
        Ok(())
    }
}

impl RowReader for CodabarReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        self.set_counters(row)?;
        let start_offset = self.find_start_pattern()?;

        let mut char_offsets: Vec<usize> = Vec::new();
        let mut next_start = start_offset;
        loop {
            let char_offset = self.to_narrow_wide_pattern(next_start).ok_or(ScanError::NotFound)?;
            char_offsets.push(char_offset);
            next_start += 8;
            if char_offsets.len() > 1 && START_END_CHARS.contains(&ALPHABET[char_offset]) {
                break;
            }
            if next_start >= self.counters.len() {
                break;
            }
        }

        // Trailing whitespace must be at least half the stop character.
        let trailing_whitespace = self.counters[next_start - 1];
        let last_pattern_size: usize = self.counters[next_start - 8..next_start - 1].iter().sum();
        if next_start < self.counters.len() && trailing_whitespace < last_pattern_size / 2 {
            return Err(ScanError::NotFound);
        }

        self.validate_pattern(&char_offsets, start_offset)?;

        let chars: Vec<u8> = char_offsets.iter().map(|&o| ALPHABET[o]).collect();
        let (first, last) = match (chars.first(), chars.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => return Err(ScanError::NotFound),
        };
        if !START_END_CHARS.contains(&first) || !START_END_CHARS.contains(&last) {
            return Err(ScanError::NotFound);
        }
        if chars.len() <= MIN_CHARACTER_LENGTH {
            // No payload besides the guard characters.
            return Err(ScanError::NotFound);
        }
        let text: String = chars[1..chars.len() - 1].iter().map(|&c| c as char).collect();

        let mut running: usize = self.counters[..start_offset].iter().sum();
        let left = running as f32;
        running += self.counters[start_offset..next_start - 1].iter().sum::<usize>();
        let right = running as f32;

        hints.report_point(Point::new(left, row_number as f32));
        let mut result = Decoded::new(
            text,
            Vec::new(),
            vec![Point::new(left, row_number as f32), Point::new(right, row_number as f32)],
            Format::Codabar,
        );
        result.put_metadata(Metadata::SymbologyIdentifier("]F0".into()));
        Ok(result)
    }

    fn reset(&mut self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod codabar_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    fn push_char(bits: &mut Vec<bool>, c: u8, narrow: usize, wide: usize) {
        let i = ALPHABET.iter().position(|&a| a == c).unwrap();
        let encoding = CHARACTER_ENCODINGS[i];
        for j in 0..7 {
            let w = if encoding & (1 << (6 - j)) != 0 { wide } else { narrow };
            push_run(bits, j % 2 == 0, w);
        }
        // Inter-character gap.
        push_run(bits, false, narrow);
    }

    fn build_row(content: &str, narrow: usize, wide: usize) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, narrow * 12);
        for c in content.bytes() {
            push_char(&mut bits, c, narrow, wide);
        }
        push_run(&mut bits, false, narrow * 12);
        row_from_bools(&bits)
    }

    #[test]
    fn test_basic_decode() {
        let row = build_row("A1234567890B", 2, 6);
        let hints = DecodeHints::default();
        let mut reader = CodabarReader::new();
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "1234567890");
        assert_eq!(result.format, Format::Codabar);
    }

    #[test]
    fn test_punctuation() {
        let row = build_row("C$99.50-D", 2, 6);
        let hints = DecodeHints::default();
        let mut reader = CodabarReader::new();
        assert_eq!(reader.decode_row(0, &row, &hints).unwrap().text, "$99.50-");
    }

    #[test]
    fn test_requires_start_stop_letters() {
        let row = build_row("123456", 2, 6);
        let hints = DecodeHints::default();
        let mut reader = CodabarReader::new();
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }

    #[test]
    fn test_too_short_rejected() {
        let row = build_row("A1B", 2, 6);
        let hints = DecodeHints::default();
        let mut reader = CodabarReader::new();
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }

    #[test]
    fn test_pattern_classification() {
        let row = build_row("A7A", 2, 6);
        let hints = DecodeHints::default();
        let mut reader = CodabarReader::new();
        reader.set_counters(&row).unwrap();
        let start = reader.find_start_pattern().unwrap();
        // 'A' is index 16 in the alphabet.
        assert_eq!(reader.to_narrow_wide_pattern(start), Some(16));
        assert_eq!(reader.to_narrow_wide_pattern(start + 8), Some(7));
    }
}
