//! RSS Expanded (GS1 DataBar Expanded), linear and stacked.
//! See ISO/IEC 24724.

use super::expanded_decode;
use super::{
    decrement, increment, is_finder_pattern, parse_finder_value, rss_value, DataCharacter,
    FinderPattern,
};
use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::pattern::{record_pattern, record_pattern_in_reverse};
use crate::result::{Decoded, Format, Point};

// Constants
//------------------------------------------------------------------------------

const SYMBOL_WIDEST: [u32; 5] = [7, 5, 4, 3, 1];
const EVEN_TOTAL_SUBSET: [u32; 5] = [4, 20, 52, 104, 204];
const GSUM: [u32; 5] = [0, 348, 1388, 2948, 3988];

const FINDER_PAT_A: usize = 0;
const FINDER_PAT_B: usize = 1;
const FINDER_PAT_C: usize = 2;
const FINDER_PAT_D: usize = 3;
const FINDER_PAT_E: usize = 4;
const FINDER_PAT_F: usize = 5;

const FINDER_PATTERNS: [[usize; 4]; 6] = [
    [1, 8, 4, 1], // A
    [3, 6, 4, 1], // B
    [3, 4, 6, 1], // C
    [3, 2, 8, 1], // D
    [2, 6, 5, 1], // E
    [2, 2, 9, 1], // F
];

/// Checksum weights indexed by finder value and character position within
/// the pair.
const WEIGHTS: [[u32; 8]; 23] = [
    [1, 3, 9, 27, 81, 32, 96, 77],
    [20, 60, 180, 118, 143, 7, 21, 63],
    [189, 145, 13, 39, 117, 140, 209, 205],
    [193, 157, 49, 147, 19, 57, 171, 91],
    [62, 186, 136, 197, 169, 85, 44, 132],
    [185, 133, 188, 142, 4, 12, 36, 108],
    [113, 128, 173, 97, 80, 29, 87, 50],
    [150, 28, 84, 41, 123, 158, 52, 156],
    [46, 138, 203, 187, 139, 206, 196, 166],
    [76, 17, 51, 153, 37, 111, 122, 155],
    [43, 129, 176, 106, 107, 110, 119, 146],
    [16, 48, 144, 10, 30, 90, 59, 177],
    [109, 116, 137, 200, 178, 112, 125, 164],
    [70, 210, 208, 202, 184, 130, 179, 115],
    [134, 191, 151, 31, 93, 68, 204, 190],
    [148, 22, 66, 198, 172, 94, 71, 2],
    [6, 18, 54, 162, 64, 192, 154, 40],
    [120, 149, 25, 75, 14, 42, 126, 167],
    [79, 26, 78, 23, 69, 207, 199, 175],
    [103, 98, 83, 38, 114, 131, 182, 124],
    [161, 61, 183, 127, 170, 88, 53, 159],
    [55, 165, 73, 8, 24, 72, 5, 15],
    [45, 135, 194, 160, 58, 174, 100, 89],
];

/// Valid finder sequences for symbols of one to eleven pairs.
const FINDER_PATTERN_SEQUENCES: [&[usize]; 10] = [
    &[FINDER_PAT_A, FINDER_PAT_A],
    &[FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B],
    &[FINDER_PAT_A, FINDER_PAT_C, FINDER_PAT_B, FINDER_PAT_D],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_C],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_D, FINDER_PAT_F],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_E, FINDER_PAT_F, FINDER_PAT_F],
    &[
        FINDER_PAT_A, FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B, FINDER_PAT_C, FINDER_PAT_C,
        FINDER_PAT_D, FINDER_PAT_D,
    ],
    &[
        FINDER_PAT_A, FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B, FINDER_PAT_C, FINDER_PAT_C,
        FINDER_PAT_D, FINDER_PAT_E, FINDER_PAT_E,
    ],
    &[
        FINDER_PAT_A, FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B, FINDER_PAT_C, FINDER_PAT_C,
        FINDER_PAT_D, FINDER_PAT_E, FINDER_PAT_F, FINDER_PAT_F,
    ],
    &[
        FINDER_PAT_A, FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B, FINDER_PAT_C, FINDER_PAT_D,
        FINDER_PAT_D, FINDER_PAT_E, FINDER_PAT_E, FINDER_PAT_F, FINDER_PAT_F,
    ],
];

const MAX_PAIRS: usize = 11;

// Components
//------------------------------------------------------------------------------

/// One decoded pair: the characters flanking a finder pattern. The right
/// character is absent when the pair ends the symbol on an odd character
/// count.
#[derive(Debug, Clone)]
pub struct ExpandedPair {
    pub left_char: DataCharacter,
    pub right_char: Option<DataCharacter>,
    pub finder: FinderPattern,
}

impl ExpandedPair {
    pub fn must_be_last(&self) -> bool {
        self.right_char.is_none()
    }
}

// Pairs found on different rows compare equal when they carry the same
// characters and finder value, whatever their pixel positions.
impl PartialEq for ExpandedPair {
    fn eq(&self, other: &Self) -> bool {
        self.left_char == other.left_char
            && self.right_char == other.right_char
            && self.finder.value == other.finder.value
    }
}

#[derive(Debug, Clone)]
struct ExpandedRow {
    pairs: Vec<ExpandedPair>,
    row_number: usize,
}

// Reader
//------------------------------------------------------------------------------

/// Decodes RSS Expanded rows, accumulating partial rows across the image so
/// stacked symbols split over several scan lines can be reassembled.
pub struct RssExpandedReader {
    pairs: Vec<ExpandedPair>,
    rows: Vec<ExpandedRow>,
    start_end: [usize; 2],
    start_from_even: bool,
}

impl RowReader for RssExpandedReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        _hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        // Rows of a stacked symbol can open with an even pattern when prior
        // rows held an odd number of patterns, so try both phases.
        self.pairs.clear();
        self.start_from_even = false;
        match self
            .decode_row_pairs(row_number, row)
            .and_then(|pairs| construct_result(&pairs))
        {
            Ok(result) => return Ok(result),
            Err(ScanError::NotFound) => {}
            Err(e) => return Err(e),
        }

        self.pairs.clear();
        self.start_from_even = true;
        let pairs = self.decode_row_pairs(row_number, row)?;
        construct_result(&pairs)
    }

    fn reset(&mut self) {
        self.pairs.clear();
        self.rows.clear();
    }
}

impl RssExpandedReader {
    pub fn new() -> Self {
        Self {
            pairs: Vec::with_capacity(MAX_PAIRS),
            rows: Vec::new(),
            start_end: [0; 2],
            start_from_even: false,
        }
    }

    fn decode_row_pairs(
        &mut self,
        row_number: usize,
        row: &BitArray,
    ) -> ScanResult<Vec<ExpandedPair>> {
        loop {
            match self.retrieve_next_pair(row, row_number) {
                Ok(pair) => self.pairs.push(pair),
                Err(e) => {
                    if self.pairs.is_empty() {
                        return Err(e);
                    }
                    break;
                }
            }
        }

        if self.check_checksum() {
            return Ok(self.pairs.clone());
        }

        let try_stacked_decode = !self.rows.is_empty();
        self.store_row(row_number);
        if try_stacked_decode {
            // Rows of an upside-down image sort in the wrong direction, so
            // search both ways.
            if let Some(pairs) = self.check_rows_in_direction(false) {
                return Ok(pairs);
            }
            if let Some(pairs) = self.check_rows_in_direction(true) {
                return Ok(pairs);
            }
        }
        Err(ScanError::NotFound)
    }

    fn check_rows_in_direction(&mut self, reverse: bool) -> Option<Vec<ExpandedPair>> {
        // The search backtracks over row subsets; cap the arena so it cannot
        // blow up on noisy images. Stacked symbols have at most 11 rows.
        if self.rows.len() > 25 {
            self.rows.clear();
            return None;
        }

        self.pairs.clear();
        if reverse {
            self.rows.reverse();
        }
        let result = self.check_rows(&[], 0).ok();
        if reverse {
            self.rows.reverse();
        }
        result
    }

    fn check_rows(
        &mut self,
        collected_rows: &[ExpandedRow],
        current_row: usize,
    ) -> ScanResult<Vec<ExpandedPair>> {
        for i in current_row..self.rows.len() {
            let row = self.rows[i].clone();
            self.pairs.clear();
            for collected in collected_rows {
                self.pairs.extend(collected.pairs.iter().cloned());
            }
            self.pairs.extend(row.pairs.iter().cloned());

            if !is_valid_sequence(&self.pairs) {
                continue;
            }
            if self.check_checksum() {
                return Ok(self.pairs.clone());
            }

            let mut with_row = collected_rows.to_vec();
            with_row.push(row);
            if let Ok(pairs) = self.check_rows(&with_row, i + 1) {
                return Ok(pairs);
            }
        }
        Err(ScanError::NotFound)
    }

    /// Inserts the current pair run into the row arena, sorted by row
    /// number, dropping duplicates and rows subsumed by a longer run.
    fn store_row(&mut self, row_number: usize) {
        let mut insert_pos = 0;
        let mut prev_is_same = false;
        let mut next_is_same = false;
        while insert_pos < self.rows.len() {
            let row = &self.rows[insert_pos];
            if row.row_number > row_number {
                next_is_same = row.pairs == self.pairs;
                break;
            }
            prev_is_same = row.pairs == self.pairs;
            insert_pos += 1;
        }
        if next_is_same || prev_is_same {
            return;
        }
        if is_partial_row(&self.pairs, &self.rows) {
            return;
        }
        self.rows.insert(insert_pos, ExpandedRow { pairs: self.pairs.clone(), row_number });
        remove_partial_rows(&self.pairs, &mut self.rows);
    }

    fn check_checksum(&self) -> bool {
        let Some(first_pair) = self.pairs.first() else {
            return false;
        };
        let check_character = &first_pair.left_char;
        let Some(first_character) = &first_pair.right_char else {
            return false;
        };

        let mut checksum = first_character.checksum_portion as i64;
        let mut s: i64 = 2;
        for pair in &self.pairs[1..] {
            checksum += pair.left_char.checksum_portion as i64;
            s += 1;
            if let Some(right) = &pair.right_char {
                checksum += right.checksum_portion as i64;
                s += 1;
            }
        }
        checksum %= 211;
        211 * (s - 4) + checksum == check_character.value as i64
    }

    fn retrieve_next_pair(
        &mut self,
        row: &BitArray,
        row_number: usize,
    ) -> ScanResult<ExpandedPair> {
        let mut is_odd_pattern = self.pairs.len() % 2 == 0;
        if self.start_from_even {
            is_odd_pattern = !is_odd_pattern;
        }

        let mut forced_offset: Option<usize> = None;
        let pattern = loop {
            self.find_next_pair(row, forced_offset)?;
            match self.parse_found_finder_pattern(row, row_number, is_odd_pattern) {
                Some(pattern) => break pattern,
                // A window that classifies as no finder: skip to the next
                // bar and resume the search there.
                None => forced_offset = Some(get_next_second_bar(row, self.start_end[0])),
            }
        };

        let left_char = decode_data_character(row, &pattern, is_odd_pattern, true)?;

        if self.pairs.last().map_or(false, |p| p.must_be_last()) {
            return Err(ScanError::NotFound);
        }

        let right_char = decode_data_character(row, &pattern, is_odd_pattern, false).ok();
        Ok(ExpandedPair { left_char, right_char, finder: pattern })
    }

    fn find_next_pair(&mut self, row: &BitArray, forced_offset: Option<usize>) -> ScanResult<()> {
        let mut counters = [0usize; 4];
        let width = row.size();

        let mut row_offset = match forced_offset {
            Some(offset) => offset,
            None => match self.pairs.last() {
                Some(last) => last.finder.start_end[1],
                None => 0,
            },
        };
        let mut searching_even_pair = self.pairs.len() % 2 != 0;
        if self.start_from_even {
            searching_even_pair = !searching_even_pair;
        }

        let mut is_white = false;
        while row_offset < width {
            is_white = !row.get(row_offset);
            if !is_white {
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
                    if searching_even_pair {
                        counters.reverse();
                    }
                    if is_finder_pattern(&counters) {
                        self.start_end = [pattern_start, x];
                        return Ok(());
                    }
                    if searching_even_pair {
                        counters.reverse();
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

    /// The search window held elements 2-5; element 1 sits before the window
    /// for odd patterns and after it for even (mirrored) ones.
    fn parse_found_finder_pattern(
        &self,
        row: &BitArray,
        row_number: usize,
        odd_pattern: bool,
    ) -> Option<FinderPattern> {
        let (first_counter, start, end) = if odd_pattern {
            let mut first_element_start = self.start_end[0];
            while first_element_start > 0 && !row.get(first_element_start - 1) {
                first_element_start -= 1;
            }
            (self.start_end[0] - first_element_start, first_element_start, self.start_end[1])
        } else {
            let end = row.next_unset(self.start_end[1] + 1);
            (end - self.start_end[1], self.start_end[0], end)
        };

        let mut window = [0usize; 4];
        record_pattern(row, self.start_end[0], &mut window).ok()?;
        if !odd_pattern {
            window.reverse();
        }
        let counters = [first_counter, window[0], window[1], window[2]];
        let value = parse_finder_value(&counters, &FINDER_PATTERNS).ok()?;
        Some(FinderPattern::new(value, [start, end], start, end, row_number))
    }
}

fn get_next_second_bar(row: &BitArray, initial_pos: usize) -> usize {
    if row.get(initial_pos) {
        row.next_set(row.next_unset(initial_pos))
    } else {
        row.next_unset(row.next_set(initial_pos))
    }
}

// Sequence and row-arena helpers
//------------------------------------------------------------------------------

/// Whether the pairs form a valid finder sequence, complete or a prefix.
fn is_valid_sequence(pairs: &[ExpandedPair]) -> bool {
    FINDER_PATTERN_SEQUENCES.iter().any(|sequence| {
        pairs.len() <= sequence.len()
            && pairs
                .iter()
                .zip(sequence.iter())
                .all(|(pair, &expected)| pair.finder.value == expected)
    })
}

/// Whether some stored row already contains every one of these pairs.
fn is_partial_row(pairs: &[ExpandedPair], rows: &[ExpandedRow]) -> bool {
    rows.iter()
        .any(|row| pairs.iter().all(|p| row.pairs.contains(p)))
}

/// Drops stored rows whose pairs are all subsumed by the new, longer run.
fn remove_partial_rows(pairs: &[ExpandedPair], rows: &mut Vec<ExpandedRow>) {
    rows.retain(|row| {
        row.pairs.len() == pairs.len() || !row.pairs.iter().all(|p| pairs.contains(p))
    });
}

// Symbol assembly
//------------------------------------------------------------------------------

fn construct_result(pairs: &[ExpandedPair]) -> ScanResult<Decoded> {
    let binary = expanded_decode::build_bit_array(pairs);
    let text = expanded_decode::parse_information(&binary)?;

    let first = &pairs[0].finder.points;
    let last = &pairs[pairs.len() - 1].finder.points;
    let points = vec![
        Point::new(first[0].0, first[0].1),
        Point::new(first[1].0, first[1].1),
        Point::new(last[0].0, last[0].1),
        Point::new(last[1].0, last[1].1),
    ];
    Ok(Decoded::new(text, Vec::new(), points, Format::RssExpanded))
}

// Character decoding
//------------------------------------------------------------------------------

fn decode_data_character(
    row: &BitArray,
    pattern: &FinderPattern,
    is_odd_pattern: bool,
    left_char: bool,
) -> ScanResult<DataCharacter> {
    let mut counters = [0usize; 8];
    if left_char {
        record_pattern_in_reverse(row, pattern.start_end[0], &mut counters)?;
    } else {
        record_pattern(row, pattern.start_end[1], &mut counters)?;
        counters.reverse();
    }

    // Left and right data characters are both 17 modules wide.
    let num_modules: usize = 17;
    let total: usize = counters.iter().sum();
    let element_width = total as f32 / num_modules as f32;

    // The module pitch of the character should match the finder's.
    let expected_element_width =
        (pattern.start_end[1] - pattern.start_end[0]) as f32 / 15.0;
    if (element_width - expected_element_width).abs() / expected_element_width > 0.3 {
        return Err(ScanError::NotFound);
    }

    let mut odd_counts = [0u32; 4];
    let mut even_counts = [0u32; 4];
    let mut odd_rounding_errors = [0f32; 4];
    let mut even_rounding_errors = [0f32; 4];

    for (i, &counter) in counters.iter().enumerate() {
        let value = counter as f32 / element_width;
        let mut count = (value + 0.5) as i32;
        if count < 1 {
            if value < 0.3 {
                return Err(ScanError::NotFound);
            }
            count = 1;
        } else if count > 8 {
            if value > 8.7 {
                return Err(ScanError::NotFound);
            }
            count = 8;
        }
        let count = count as u32;
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
        num_modules,
        &mut odd_counts,
        &mut even_counts,
        &odd_rounding_errors,
        &even_rounding_errors,
    )?;

    let odd_sum: u32 = odd_counts.iter().sum();

    // The check character (an A finder's odd left character) does not weigh
    // into the symbol checksum.
    let weighted = !(pattern.value == 0 && is_odd_pattern && left_char);
    let checksum_portion = if weighted {
        let parity_offset = if is_odd_pattern { 0 } else { 2 };
        let side_offset = if left_char { 0 } else { 1 };
        let weight_row = 4 * pattern.value + parity_offset + side_offset - 1;
        let odd_portion: u32 = odd_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| count * WEIGHTS[weight_row][2 * i])
            .sum();
        let even_portion: u32 = even_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| count * WEIGHTS[weight_row][2 * i + 1])
            .sum();
        odd_portion + even_portion
    } else {
        0
    };

    if odd_sum & 0x01 != 0 || !(4..=13).contains(&odd_sum) {
        return Err(ScanError::NotFound);
    }

    let group = ((13 - odd_sum) / 2) as usize;
    let odd_widest = SYMBOL_WIDEST[group];
    let even_widest = 9 - odd_widest;
    let v_odd = rss_value(&odd_counts, odd_widest, true);
    let v_even = rss_value(&even_counts, even_widest, false);
    let t_even = EVEN_TOTAL_SUBSET[group];
    let g_sum = GSUM[group];
    Ok(DataCharacter::new(v_odd * t_even + v_even + g_sum, checksum_portion))
}

fn adjust_odd_even_counts(
    num_modules: usize,
    odd_counts: &mut [u32; 4],
    even_counts: &mut [u32; 4],
    odd_rounding_errors: &[f32; 4],
    even_rounding_errors: &[f32; 4],
) -> ScanResult<()> {
    let odd_sum: u32 = odd_counts.iter().sum();
    let even_sum: u32 = even_counts.iter().sum();

    let mut increment_odd = odd_sum < 4;
    let mut decrement_odd = odd_sum > 13;
    let mut increment_even = even_sum < 4;
    let mut decrement_even = even_sum > 13;

    let mismatch = (odd_sum + even_sum) as i32 - num_modules as i32;
    let odd_parity_bad = (odd_sum & 0x01) == 1;
    let even_parity_bad = (even_sum & 0x01) == 0;
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

#[cfg(test)]
mod expanded_tests {
    use super::*;
    use crate::oned::upc_ean::{push_run, row_from_bools};

    // A two-pair symbol (finder sequence A, A) encoding "(10)123456".
    // Characters in scan order: check character, then data characters with
    // values 19, 683, 1576. Runs are dark-first after the guard bar.
    const SYMBOL: [(bool, usize); 43] = [
        (true, 1), // guard
        // Check character.
        (false, 1),
        (true, 1),
        (false, 2),
        (true, 1),
        (false, 5),
        (true, 2),
        (false, 4),
        (true, 1),
        // Finder A, odd orientation.
        (false, 1),
        (true, 8),
        (false, 4),
        (true, 1),
        (false, 1),
        // Value 19.
        (true, 1),
        (false, 3),
        (true, 1),
        (false, 7),
        (true, 1),
        (false, 1),
        (true, 2),
        (false, 1),
        // Value 683.
        (true, 1),
        (false, 2),
        (true, 5),
        (false, 3),
        (true, 1),
        (false, 1),
        (true, 3),
        (false, 1),
        // Finder A, even (mirrored) orientation.
        (true, 1),
        (false, 1),
        (true, 4),
        (false, 8),
        (true, 1),
        // Value 1576.
        (false, 1),
        (true, 4),
        (false, 1),
        (true, 1),
        (false, 5),
        (true, 2),
        (false, 2),
        (true, 1),
    ];

    fn symbol_row(scale: usize) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 12 * scale);
        for &(dark, len) in &SYMBOL {
            push_run(&mut bits, dark, len * scale);
        }
        push_run(&mut bits, false, 12 * scale);
        row_from_bools(&bits)
    }

    fn pair(
        left: (u32, u32),
        right: Option<(u32, u32)>,
        finder_value: usize,
        row_number: usize,
    ) -> ExpandedPair {
        ExpandedPair {
            left_char: DataCharacter::new(left.0, left.1),
            right_char: right.map(|(v, c)| DataCharacter::new(v, c)),
            finder: FinderPattern::new(finder_value, [0, 30], 0, 30, row_number),
        }
    }

    #[test]
    fn test_decode_symbol() {
        let row = symbol_row(2);
        let hints = DecodeHints::default();
        let mut reader = RssExpandedReader::new();
        let result = reader.decode_row(7, &row, &hints).unwrap();
        assert_eq!(result.text, "(10)123456");
        assert_eq!(result.format, Format::RssExpanded);
        assert_eq!(result.points.len(), 4);
    }

    #[test]
    fn test_plain_row_not_found() {
        let mut bits = Vec::new();
        push_run(&mut bits, false, 40);
        push_run(&mut bits, true, 3);
        push_run(&mut bits, false, 40);
        let row = row_from_bools(&bits);
        let hints = DecodeHints::default();
        let mut reader = RssExpandedReader::new();
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }

    #[test]
    fn test_valid_sequences() {
        let a = pair((0, 0), Some((1, 1)), FINDER_PAT_A, 0);
        let b = pair((2, 2), Some((3, 3)), FINDER_PAT_B, 0);
        let e = pair((4, 4), Some((5, 5)), FINDER_PAT_E, 0);
        // A alone is a prefix of every sequence.
        assert!(is_valid_sequence(std::slice::from_ref(&a)));
        assert!(is_valid_sequence(&[a.clone(), a.clone()]));
        assert!(is_valid_sequence(&[a.clone(), e.clone(), b.clone()]));
        // No sequence starts with B or continues A with E, B, A.
        assert!(!is_valid_sequence(std::slice::from_ref(&b)));
        assert!(!is_valid_sequence(&[a.clone(), e, b, a]));
    }

    #[test]
    fn test_store_row_dedupes_and_merges() {
        let mut reader = RssExpandedReader::new();
        let p1 = pair((10, 10), Some((11, 11)), FINDER_PAT_A, 3);
        let p2 = pair((20, 20), Some((21, 21)), FINDER_PAT_B, 3);

        reader.pairs = vec![p1.clone()];
        reader.store_row(3);
        assert_eq!(reader.rows.len(), 1);

        // The same pair run on an adjacent row is a duplicate.
        reader.store_row(4);
        assert_eq!(reader.rows.len(), 1);

        // A longer run subsumes the stored partial row.
        reader.pairs = vec![p1.clone(), p2];
        reader.store_row(5);
        assert_eq!(reader.rows.len(), 1);
        assert_eq!(reader.rows[0].pairs.len(), 2);

        // A subset of an already stored row is not kept.
        reader.pairs = vec![p1];
        reader.store_row(6);
        assert_eq!(reader.rows.len(), 1);
        assert_eq!(reader.rows[0].pairs.len(), 2);
    }

    #[test]
    fn test_stacked_rows_combine() {
        // Split the valid two-pair symbol across two stored rows and let the
        // row search reassemble it.
        let mut reader = RssExpandedReader::new();
        let first = pair((33, 0), Some((19, 1007)), FINDER_PAT_A, 2);
        let second = pair((683, 1670), Some((1576, 1998)), FINDER_PAT_A, 5);
        reader.rows = vec![
            ExpandedRow { pairs: vec![first], row_number: 2 },
            ExpandedRow { pairs: vec![second], row_number: 5 },
        ];
        let pairs = reader.check_rows_in_direction(false).unwrap();
        assert_eq!(pairs.len(), 2);
        let result = construct_result(&pairs).unwrap();
        assert_eq!(result.text, "(10)123456");
    }

    #[test]
    fn test_checksum_rejects_altered_character() {
        let mut reader = RssExpandedReader::new();
        reader.pairs = vec![
            pair((33, 0), Some((19, 1007)), FINDER_PAT_A, 0),
            pair((683, 1670), Some((1576, 1998)), FINDER_PAT_A, 0),
        ];
        assert!(reader.check_checksum());
        reader.pairs[1].right_char = Some(DataCharacter::new(1576, 1999));
        assert!(!reader.check_checksum());
    }
}
