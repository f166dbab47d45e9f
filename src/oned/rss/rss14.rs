//! RSS-14 (GS1 DataBar Omnidirectional), including truncated variants.
//! See ISO/IEC 24724.

use super::{
    decrement, increment, is_finder_pattern, parse_finder_value, rss_value, DataCharacter,
    FinderPattern, Pair,
};
use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::result::{Decoded, Format, Point};

// Constants
//------------------------------------------------------------------------------

const OUTSIDE_EVEN_TOTAL_SUBSET: [u32; 5] = [1, 10, 34, 70, 126];
const INSIDE_ODD_TOTAL_SUBSET: [u32; 4] = [4, 20, 48, 81];
const OUTSIDE_GSUM: [u32; 5] = [0, 161, 961, 2015, 2715];
const INSIDE_GSUM: [u32; 4] = [0, 336, 1036, 1516];
const OUTSIDE_ODD_WIDEST: [u32; 5] = [8, 6, 4, 3, 1];
const INSIDE_ODD_WIDEST: [u32; 4] = [2, 4, 6, 8];

const FINDER_PATTERNS: [[usize; 4]; 9] = [
    [3, 8, 2, 1],
    [3, 5, 5, 1],
    [3, 3, 7, 1],
    [3, 1, 9, 1],
    [2, 7, 4, 1],
    [2, 5, 6, 1],
    [2, 3, 8, 1],
    [1, 5, 7, 1],
    [1, 3, 9, 1],
];

// Reader
//------------------------------------------------------------------------------

/// Decodes the left and right halves of an RSS-14 symbol independently and
/// pairs them once each half has been confirmed on more than one row.
pub struct Rss14Reader {
    possible_left_pairs: Vec<Pair>,
    possible_right_pairs: Vec<Pair>,
}

impl Rss14Reader {
    pub fn new() -> Self {
        Self { possible_left_pairs: Vec::new(), possible_right_pairs: Vec::new() }
    }

    fn decode_pair(
        &self,
        row: &BitArray,
        right: bool,
        row_number: usize,
        hints: &DecodeHints,
    ) -> Option<Pair> {
        let start_end = find_finder_pattern(row, right).ok()?;
        let pattern = parse_found_finder_pattern(row, row_number, right, start_end).ok()?;

        let mut center = (start_end.0 + start_end.1) as f32 / 2.0;
        if right {
            // The row under scan is reversed.
            center = row.size() as f32 - 1.0 - center;
        }
        hints.report_point(Point::new(center, row_number as f32));

        let outside = decode_data_character(row, &pattern, true).ok()?;
        let inside = decode_data_character(row, &pattern, false).ok()?;
        Some(Pair::new(
            1597 * outside.value + inside.value,
            outside.checksum_portion + 4 * inside.checksum_portion,
            pattern,
        ))
    }
}

impl RowReader for Rss14Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let left = self.decode_pair(row, false, row_number, hints);
        add_or_tally(&mut self.possible_left_pairs, left);
        let mut reversed = row.clone();
        reversed.reverse();
        let right = self.decode_pair(&reversed, true, row_number, hints);
        add_or_tally(&mut self.possible_right_pairs, right);

        for left in &self.possible_left_pairs {
            if left.count > 1 {
                for right in &self.possible_right_pairs {
                    if right.count > 1 && check_checksum(left, right) {
                        return Ok(construct_result(left, right));
                    }
                }
            }
        }
        Err(ScanError::NotFound)
    }

    fn reset(&mut self) {
        self.possible_left_pairs.clear();
        self.possible_right_pairs.clear();
    }
}

fn add_or_tally(possible_pairs: &mut Vec<Pair>, pair: Option<Pair>) {
    let Some(pair) = pair else {
        return;
    };
    for other in possible_pairs.iter_mut() {
        if other.value == pair.value {
            other.count += 1;
            return;
        }
    }
    possible_pairs.push(pair);
}

// Symbol assembly
//------------------------------------------------------------------------------

fn construct_result(left: &Pair, right: &Pair) -> Decoded {
    let symbol_value = 4_537_077u64 * left.value as u64 + right.value as u64;
    let digits = symbol_value.to_string();

    let mut buffer = String::with_capacity(14);
    for _ in digits.len()..13 {
        buffer.push('0');
    }
    buffer.push_str(&digits);

    let mut check_digit: u32 = 0;
    for (i, c) in buffer.bytes().enumerate() {
        let digit = (c - b'0') as u32;
        check_digit += if i & 0x01 == 0 { 3 * digit } else { digit };
    }
    check_digit = 10 - (check_digit % 10);
    if check_digit == 10 {
        check_digit = 0;
    }
    buffer.push((b'0' + check_digit as u8) as char);

    let points = vec![
        Point::new(left.finder.points[0].0, left.finder.points[0].1),
        Point::new(left.finder.points[1].0, left.finder.points[1].1),
        Point::new(right.finder.points[0].0, right.finder.points[0].1),
        Point::new(right.finder.points[1].0, right.finder.points[1].1),
    ];
    Decoded::new(buffer, Vec::new(), points, Format::Rss14)
}

fn check_checksum(left: &Pair, right: &Pair) -> bool {
    let check_value = (left.checksum_portion + 16 * right.checksum_portion) % 79;
    let mut target_check_value = (9 * left.finder.value + right.finder.value) as u32;
    if target_check_value > 72 {
        target_check_value -= 1;
    }
    if target_check_value > 8 {
        target_check_value -= 1;
    }
    check_value == target_check_value
}

// Character decoding
//------------------------------------------------------------------------------

fn decode_data_character(
    row: &BitArray,
    pattern: &FinderPattern,
    outside_char: bool,
) -> ScanResult<DataCharacter> {
    let mut counters = [0usize; 8];
    if outside_char {
        crate::pattern::record_pattern_in_reverse(row, pattern.start_end[0], &mut counters)?;
    } else {
        crate::pattern::record_pattern(row, pattern.start_end[1] + 1, &mut counters)?;
        counters.reverse();
    }

    let num_modules: usize = if outside_char { 16 } else { 15 };
    let total: usize = counters.iter().sum();
    let element_width = total as f32 / num_modules as f32;

    let mut odd_counts = [0u32; 4];
    let mut even_counts = [0u32; 4];
    let mut odd_rounding_errors = [0f32; 4];
    let mut even_rounding_errors = [0f32; 4];

    for (i, &counter) in counters.iter().enumerate() {
        let value = counter as f32 / element_width;
        let count = ((value + 0.5) as u32).clamp(1, 8);
        let offset = i / 2;
        if i & 0x01 == 0 {
            odd_counts[offset] = count;
            odd_rounding_errors[offset] = value - count as f32;
        } else {
            even_counts[offset] = count;
            even_rounding_errors[offset] = value - count as f32;
        }
    }

    adjust_odd_even_counts(
        outside_char,
        num_modules,
        &mut odd_counts,
        &mut even_counts,
        &odd_rounding_errors,
        &even_rounding_errors,
    )?;

    let mut odd_sum: u32 = 0;
    let mut odd_checksum_portion: u32 = 0;
    for &c in odd_counts.iter().rev() {
        odd_checksum_portion = odd_checksum_portion * 9 + c;
        odd_sum += c;
    }
    let mut even_sum: u32 = 0;
    let mut even_checksum_portion: u32 = 0;
    for &c in even_counts.iter().rev() {
        even_checksum_portion = even_checksum_portion * 9 + c;
        even_sum += c;
    }
    let checksum_portion = odd_checksum_portion + 3 * even_checksum_portion;

    if outside_char {
        if odd_sum & 0x01 != 0 || !(4..=12).contains(&odd_sum) {
            return Err(ScanError::NotFound);
        }
        let group = ((12 - odd_sum) / 2) as usize;
        let odd_widest = OUTSIDE_ODD_WIDEST[group];
        let even_widest = 9 - odd_widest;
        let v_odd = rss_value(&odd_counts, odd_widest, false);
        let v_even = rss_value(&even_counts, even_widest, true);
        let t_even = OUTSIDE_EVEN_TOTAL_SUBSET[group];
        let g_sum = OUTSIDE_GSUM[group];
        Ok(DataCharacter::new(v_odd * t_even + v_even + g_sum, checksum_portion))
    } else {
        if even_sum & 0x01 != 0 || !(4..=10).contains(&even_sum) {
            return Err(ScanError::NotFound);
        }
        let group = ((10 - even_sum) / 2) as usize;
        let odd_widest = INSIDE_ODD_WIDEST[group];
        let even_widest = 9 - odd_widest;
        let v_odd = rss_value(&odd_counts, odd_widest, true);
        let v_even = rss_value(&even_counts, even_widest, false);
        let t_odd = INSIDE_ODD_TOTAL_SUBSET[group];
        let g_sum = INSIDE_GSUM[group];
        Ok(DataCharacter::new(v_even * t_odd + v_odd + g_sum, checksum_portion))
    }
}

fn adjust_odd_even_counts(
    outside_char: bool,
    num_modules: usize,
    odd_counts: &mut [u32; 4],
    even_counts: &mut [u32; 4],
    odd_rounding_errors: &[f32; 4],
    even_rounding_errors: &[f32; 4],
) -> ScanResult<()> {
    let odd_sum: u32 = odd_counts.iter().sum();
    let even_sum: u32 = even_counts.iter().sum();

    let mut increment_odd = false;
    let mut decrement_odd = false;
    let mut increment_even = false;
    let mut decrement_even = false;

    if outside_char {
        if odd_sum > 12 {
            decrement_odd = true;
        } else if odd_sum < 4 {
            increment_odd = true;
        }
        if even_sum > 12 {
            decrement_even = true;
        } else if even_sum < 4 {
            increment_even = true;
        }
    } else {
        if odd_sum > 11 {
            decrement_odd = true;
        } else if odd_sum < 5 {
            increment_odd = true;
        }
        if even_sum > 10 {
            decrement_even = true;
        } else if even_sum < 4 {
            increment_even = true;
        }
    }

    let mismatch = (odd_sum + even_sum) as i32 - num_modules as i32;
    let odd_parity_bad = (odd_sum & 0x01) == u32::from(outside_char);
    let even_parity_bad = (even_sum & 0x01) == 1;
    match mismatch {
        1 => {
            if odd_parity_bad {
                if even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                decrement_odd = true;
            } else {
                if !even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                decrement_even = true;
            }
        }
        -1 => {
            if odd_parity_bad {
                if even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                increment_odd = true;
            } else {
                if !even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                increment_even = true;
            }
        }
        0 => {
            if odd_parity_bad {
                if !even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                // Both parities are off by one module.
                if odd_sum < even_sum {
                    increment_odd = true;
                    decrement_even = true;
                } else {
                    decrement_odd = true;
                    increment_even = true;
                }
            } else if even_parity_bad {
                return Err(ScanError::NotFound);
            }
        }
        _ => return Err(ScanError::NotFound),
    }

    if increment_odd {
        if decrement_odd {
            return Err(ScanError::NotFound);
        }
        increment(odd_counts, odd_rounding_errors);
    }
    if decrement_odd {
        decrement(odd_counts, odd_rounding_errors);
    }
    if increment_even {
        if decrement_even {
            return Err(ScanError::NotFound);
        }
        // The even increment keys off the odd rounding errors.
        increment(even_counts, odd_rounding_errors);
    }
    if decrement_even {
        decrement(even_counts, even_rounding_errors);
    }
    Ok(())
}

// Finder location
//------------------------------------------------------------------------------

/// Slides a four-element window along the row until it lands on elements 2-5
/// of a finder pattern. Returns the window's pixel span.
fn find_finder_pattern(row: &BitArray, right_finder_pattern: bool) -> ScanResult<(usize, usize)> {
    let mut counters = [0usize; 4];
    let width = row.size();
    let mut is_white = false;
    let mut row_offset = 0;
    while row_offset < width {
        is_white = !row.get(row_offset);
        if right_finder_pattern == is_white {
            // The right finder starts beyond white on the reversed row.
            break;
        }
        row_offset += 1;
    }

    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    for x in row_offset..width {
        if row.get(x) != is_white {
            counters[counter_position] += 1;
        } else {
            if counter_position == 3 {
                if is_finder_pattern(&counters) {
                    return Ok((pattern_start, x));
                }
                pattern_start += counters[0] + counters[1];
                counters[0] = counters[2];
                counters[1] = counters[3];
                counters[2] = 0;
                counters[3] = 0;
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

/// Backs up over element 1, which sits just before the located window, and
/// classifies the full five-element finder.
fn parse_found_finder_pattern(
    row: &BitArray,
    row_number: usize,
    right: bool,
    start_end: (usize, usize),
) -> ScanResult<FinderPattern> {
    let first_is_black = row.get(start_end.0);
    let mut first_element_start = start_end.0;
    while first_element_start > 0 && first_is_black != row.get(first_element_start - 1) {
        first_element_start -= 1;
    }
    let first_counter = start_end.0 - first_element_start;

    let mut window = [0usize; 4];
    crate::pattern::record_pattern(row, start_end.0, &mut window)?;
    let counters = [first_counter, window[0], window[1], window[2]];
    let value = parse_finder_value(&counters, &FINDER_PATTERNS)?;

    let mut start = first_element_start;
    let mut end = start_end.1;
    if right {
        // Map back from the reversed row.
        start = row.size() - 1 - start;
        end = row.size() - 1 - end;
    }
    Ok(FinderPattern::new(value, [first_element_start, start_end.1], start, end, row_number))
}

#[cfg(test)]
mod rss14_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    // One RSS-14 half in module widths, dark-first after the guard bar.
    // Outside character, then the five-element finder, then the inside
    // character.
    const LEFT_HALF: [(bool, usize); 22] = [
        (true, 1), // guard
        (false, 1),
        (true, 1),
        (false, 2),
        (true, 1),
        (false, 1),
        (true, 1),
        (false, 8),
        (true, 1),
        (false, 2), // finder element 1
        (true, 5),
        (false, 6),
        (true, 1),
        (false, 1),
        (true, 1), // inside character
        (false, 8),
        (true, 1),
        (false, 1),
        (true, 1),
        (false, 1),
        (true, 1),
        (false, 1),
    ];

    fn symbol_row(scale: usize) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 12 * scale);
        for &(dark, len) in &LEFT_HALF {
            push_run(&mut bits, dark, len * scale);
        }
        // The right half mirrors the left with inverted colors.
        for &(dark, len) in LEFT_HALF.iter().rev() {
            push_run(&mut bits, !dark, len * scale);
        }
        push_run(&mut bits, false, 12 * scale);
        row_from_bools(&bits)
    }

    fn decode(row: &BitArray) -> ScanResult<Decoded> {
        let hints = DecodeHints::default();
        let mut reader = Rss14Reader::new();
        // Pairs must be confirmed on several rows before they are trusted.
        let mut last = reader.decode_row(1, row, &hints);
        for row_number in 2..4 {
            last = reader.decode_row(row_number, row, &hints);
        }
        last
    }

    #[test]
    fn test_decode_symbol() {
        let row = symbol_row(4);
        let result = decode(&row).unwrap();
        assert_eq!(result.text, "00575982052106");
        assert_eq!(result.format, Format::Rss14);
        assert_eq!(result.points.len(), 4);
        // The right finder points map back to forward row coordinates.
        assert!(result.points[2].x > result.points[1].x);
    }

    #[test]
    fn test_single_row_is_not_trusted() {
        let row = symbol_row(4);
        let hints = DecodeHints::default();
        let mut reader = Rss14Reader::new();
        assert_eq!(reader.decode_row(1, &row, &hints), Err(ScanError::NotFound));
    }

    #[test]
    fn test_reset_clears_tallies() {
        let row = symbol_row(4);
        let hints = DecodeHints::default();
        let mut reader = Rss14Reader::new();
        let _ = reader.decode_row(1, &row, &hints);
        let _ = reader.decode_row(2, &row, &hints);
        reader.reset();
        assert_eq!(reader.decode_row(3, &row, &hints), Err(ScanError::NotFound));
    }

    #[test]
    fn test_check_digit() {
        // Construction appends a GTIN-14 check digit over the 13 data
        // digits.
        let row = symbol_row(3);
        let result = decode(&row).unwrap();
        let digits: Vec<u32> = result.text.bytes().map(|b| (b - b'0') as u32).collect();
        let sum: u32 = digits[..13]
            .iter()
            .enumerate()
            .map(|(i, &d)| if i % 2 == 0 { 3 * d } else { d })
            .sum();
        assert_eq!(digits[13], (10 - sum % 10) % 10);
    }

    #[test]
    fn test_plain_row_not_found() {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 30);
        push_run(&mut bits, true, 5);
        push_run(&mut bits, false, 30);
        let row = row_from_bools(&bits);
        let hints = DecodeHints::default();
        let mut reader = Rss14Reader::new();
        for n in 0..3 {
            assert_eq!(reader.decode_row(n, &row, &hints), Err(ScanError::NotFound));
        }
    }
}
