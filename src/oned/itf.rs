use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::pattern::{pattern_match_variance, record_pattern};
use crate::result::{Decoded, Format, Metadata, Point};

// Tables
//------------------------------------------------------------------------------

const MAX_AVG_VARIANCE: f32 = 0.38;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.5;

const W: usize = 3;
const N: usize = 1;

const START_PATTERN: [usize; 4] = [N, N, N, N];
/// The asymmetric stop pattern read right to left, with a loose and a tight
/// rendition of the wide bar.
const END_PATTERN_REVERSED: [[usize; 3]; 2] = [[N, N, 2], [N, N, W]];

/// Two-of-five patterns for each digit, narrow and wide variants.
const PATTERNS: [[usize; 5]; 20] = [
    [N, N, 2, 2, N],
    [2, N, N, N, 2],
    [N, 2, N, N, 2],
    [2, 2, N, N, N],
    [N, N, 2, N, 2],
    [2, N, 2, N, N],
    [N, 2, 2, N, N],
    [N, N, N, 2, 2],
    [2, N, N, 2, N],
    [N, 2, N, 2, N],
    [N, N, W, W, N],
    [W, N, N, N, W],
    [N, W, N, N, W],
    [W, W, N, N, N],
    [N, N, W, N, W],
    [W, N, W, N, N],
    [N, W, W, N, N],
    [N, N, N, W, W],
    [W, N, N, W, N],
    [N, W, N, W, N],
];

const DEFAULT_ALLOWED_LENGTHS: [usize; 5] = [6, 8, 10, 12, 14];

// Guard search
//------------------------------------------------------------------------------

fn skip_white_space(row: &BitArray) -> ScanResult<usize> {
    let end_start = row.next_set(0);
    if end_start == row.size() {
        return Err(ScanError::NotFound);
    }
    Ok(end_start)
}

fn find_guard_pattern(
    row: &BitArray,
    from: usize,
    pattern: &[usize],
) -> ScanResult<(usize, usize)> {
    let width = row.size();
    let pattern_length = pattern.len();
    let mut counters = vec![0usize; pattern_length];
    let mut counter_position = 0;
    let mut pattern_start = from;
    let mut is_white = false;

    for x in from..width {
        if row.get(x) != is_white {
            counters[counter_position] += 1;
        } else {
            if counter_position == pattern_length - 1 {
                if pattern_match_variance(&counters, pattern, MAX_INDIVIDUAL_VARIANCE)
                    < MAX_AVG_VARIANCE
                {
                    return Ok((pattern_start, x));
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[pattern_length - 2] = 0;
                counters[pattern_length - 1] = 0;
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

fn decode_digit(counters: &[usize; 5]) -> ScanResult<usize> {
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match = None;
    for (i, pattern) in PATTERNS.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(i % 10);
        }
    }
    best_match.ok_or(ScanError::NotFound)
}

// Reader
//------------------------------------------------------------------------------

/// Interleaved 2 of 5: digit pairs share ten runs, bars for the first digit
/// and spaces for the second.
pub struct ItfReader {
    narrow_line_width: usize,
}

impl ItfReader {
    pub fn new() -> Self {
        Self { narrow_line_width: 0 }
    }

    fn validate_quiet_zone(&self, row: &BitArray, start: usize) -> ScanResult<()> {
        let mut quiet_count = (self.narrow_line_width * 10).min(start);
        let mut i = start;
        while quiet_count > 0 && i > 0 {
            i -= 1;
            if row.get(i) {
                break;
            }
            quiet_count -= 1;
        }
        if quiet_count != 0 {
            return Err(ScanError::NotFound);
        }
        Ok(())
    }

    fn decode_start(&mut self, row: &BitArray) -> ScanResult<(usize, usize)> {
        let end_start = skip_white_space(row)?;
        let start_pattern = find_guard_pattern(row, end_start, &START_PATTERN)?;
        self.narrow_line_width = (start_pattern.1 - start_pattern.0) / 4;
        self.validate_quiet_zone(row, start_pattern.0)?;
        Ok(start_pattern)
    }

    fn decode_end(&mut self, row: &BitArray) -> ScanResult<(usize, usize)> {
        let mut reversed = row.clone();
        reversed.reverse();
        let end_start = skip_white_space(&reversed)?;
        let end_pattern = find_guard_pattern(&reversed, end_start, &END_PATTERN_REVERSED[0])
            .or_else(|_| find_guard_pattern(&reversed, end_start, &END_PATTERN_REVERSED[1]))?;
        self.validate_quiet_zone(&reversed, end_pattern.0)?;
        let size = row.size();
        Ok((size - end_pattern.1, size - end_pattern.0))
    }
}

fn decode_middle(
    row: &BitArray,
    payload_start: usize,
    payload_end: usize,
    text: &mut String,
) -> ScanResult<()> {
    let mut pair = [0usize; 10];
    let mut black = [0usize; 5];
    let mut white = [0usize; 5];
    let mut offset = payload_start;

    while offset < payload_end {
        record_pattern(row, offset, &mut pair)?;
        for k in 0..5 {
            black[k] = pair[2 * k];
            white[k] = pair[2 * k + 1];
        }
        text.push((b'0' + decode_digit(&black)? as u8) as char);
        text.push((b'0' + decode_digit(&white)? as u8) as char);
        offset += pair.iter().sum::<usize>();
    }
    Ok(())
}

impl RowReader for ItfReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let start_range = self.decode_start(row)?;
        let end_range = self.decode_end(row)?;

        let mut text = String::new();
        decode_middle(row, start_range.1, end_range.0, &mut text)?;

        // Without a checksum, length is the only guard against misreads of
        // partial symbols.
        let length = text.len();
        let max_allowed = DEFAULT_ALLOWED_LENGTHS[DEFAULT_ALLOWED_LENGTHS.len() - 1];
        if !DEFAULT_ALLOWED_LENGTHS.contains(&length) && length <= max_allowed {
            return Err(ScanError::Format);
        }

        hints.report_point(Point::new(start_range.1 as f32, row_number as f32));
        let mut result = Decoded::new(
            text,
            Vec::new(),
            vec![
                Point::new(start_range.1 as f32, row_number as f32),
                Point::new(end_range.0 as f32, row_number as f32),
            ],
            Format::Itf,
        );
        result.put_metadata(Metadata::SymbologyIdentifier("]I0".into()));
        Ok(result)
    }

    fn reset(&mut self) {
        self.narrow_line_width = 0;
    }
}

#[cfg(test)]
mod itf_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    fn digit_widths(d: usize, narrow: usize, wide: usize) -> [usize; 5] {
        PATTERNS[d].map(|w| if w == 1 { narrow } else { wide })
    }

    fn build_row(digits: &str, narrow: usize, wide: usize) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, narrow * 12);
        // Start: narrow bar, space, bar, space.
        for i in 0..4 {
            push_run(&mut bits, i % 2 == 0, narrow);
        }
        let ds: Vec<usize> = digits.bytes().map(|b| (b - b'0') as usize).collect();
        for chunk in ds.chunks(2) {
            let black = digit_widths(chunk[0], narrow, wide);
            let white = digit_widths(chunk[1], narrow, wide);
            for k in 0..5 {
                push_run(&mut bits, true, black[k]);
                push_run(&mut bits, false, white[k]);
            }
        }
        // Stop: wide bar, narrow space, narrow bar.
        push_run(&mut bits, true, wide);
        push_run(&mut bits, false, narrow);
        push_run(&mut bits, true, narrow);
        push_run(&mut bits, false, narrow * 12);
        row_from_bools(&bits)
    }

    #[test]
    fn test_basic_decode() {
        let row = build_row("30712345000010", 2, 5);
        let hints = DecodeHints::default();
        let mut reader = ItfReader::new();
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "30712345000010");
        assert_eq!(result.format, Format::Itf);
    }

    #[test]
    fn test_six_digits() {
        let row = build_row("123457", 2, 5);
        let hints = DecodeHints::default();
        let mut reader = ItfReader::new();
        assert_eq!(reader.decode_row(0, &row, &hints).unwrap().text, "123457");
    }

    #[test]
    fn test_unexpected_length_rejected() {
        // Four digits is not an allowed length.
        let row = build_row("1234", 2, 5);
        let hints = DecodeHints::default();
        let mut reader = ItfReader::new();
        assert_eq!(reader.decode_row(0, &row, &hints), Err(ScanError::Format));
    }

    #[test]
    fn test_quiet_zone_required() {
        let mut bits = Vec::new();
        // A stray mark two modules before the start pattern.
        push_run(&mut bits, true, 2);
        push_run(&mut bits, false, 4);
        for i in 0..4 {
            push_run(&mut bits, i % 2 == 0, 2);
        }
        let black = digit_widths(1, 2, 5);
        let white = digit_widths(2, 2, 5);
        for k in 0..5 {
            push_run(&mut bits, true, black[k]);
            push_run(&mut bits, false, white[k]);
        }
        push_run(&mut bits, true, 5);
        push_run(&mut bits, false, 2);
        push_run(&mut bits, true, 2);
        push_run(&mut bits, false, 24);
        let row = row_from_bools(&bits);
        let hints = DecodeHints::default();
        let mut reader = ItfReader::new();
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }

    #[test]
    fn test_decode_digit() {
        assert_eq!(decode_digit(&[2, 2, 5, 5, 2]).unwrap(), 0);
        assert_eq!(decode_digit(&[5, 2, 2, 2, 5]).unwrap(), 1);
        assert!(decode_digit(&[5, 5, 5, 5, 5]).is_err());
    }
}
