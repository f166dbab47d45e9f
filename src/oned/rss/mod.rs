//! Shared primitives for the RSS (GS1 DataBar) family.

pub mod expanded;
pub mod expanded_decode;
pub mod rss14;

use crate::error::{ScanError, ScanResult};
use crate::pattern::pattern_match_variance;

// Constants
//------------------------------------------------------------------------------

pub const MAX_AVG_VARIANCE: f32 = 0.2;
pub const MAX_INDIVIDUAL_VARIANCE: f32 = 0.45;

/// The first two elements of a finder pattern take between 9.5 and 12.5 of
/// its 12 to 14 modules.
const MIN_FINDER_PATTERN_RATIO: f32 = 9.5 / 12.0;
const MAX_FINDER_PATTERN_RATIO: f32 = 12.5 / 14.0;

// Components
//------------------------------------------------------------------------------

/// One decoded RSS character: its value in the symbology's combinatorial
/// numbering and its contribution to the symbol checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataCharacter {
    pub value: u32,
    pub checksum_portion: u32,
}

impl DataCharacter {
    pub fn new(value: u32, checksum_portion: u32) -> Self {
        Self { value, checksum_portion }
    }
}

/// A located finder pattern: which of the defined patterns it is, plus its
/// span in row pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub value: usize,
    pub start_end: [usize; 2],
    pub points: [(f32, f32); 2],
}

impl FinderPattern {
    pub fn new(value: usize, start_end: [usize; 2], start: usize, end: usize, row: usize) -> Self {
        Self {
            value,
            start_end,
            points: [(start as f32, row as f32), (end as f32, row as f32)],
        }
    }
}

/// Outer and inner data character anchored on one finder pattern, tallied
/// across rows until trusted.
#[derive(Debug, Clone)]
pub struct Pair {
    pub value: u32,
    pub checksum_portion: u32,
    pub finder: FinderPattern,
    pub count: usize,
}

impl Pair {
    pub fn new(value: u32, checksum_portion: u32, finder: FinderPattern) -> Self {
        Self { value, checksum_portion, finder, count: 0 }
    }
}

// Shared routines
//------------------------------------------------------------------------------

pub fn parse_finder_value(
    counters: &[usize; 4],
    finder_patterns: &[[usize; 4]],
) -> ScanResult<usize> {
    for (value, pattern) in finder_patterns.iter().enumerate() {
        if pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE) < MAX_AVG_VARIANCE {
            return Ok(value);
        }
    }
    Err(ScanError::NotFound)
}

pub fn is_finder_pattern(counters: &[usize; 4]) -> bool {
    let first_two = counters[0] + counters[1];
    let sum = first_two + counters[2] + counters[3];
    if sum == 0 {
        return false;
    }
    let ratio = first_two as f32 / sum as f32;
    if !(MIN_FINDER_PATTERN_RATIO..=MAX_FINDER_PATTERN_RATIO).contains(&ratio) {
        return false;
    }
    let min = counters.iter().copied().min().unwrap_or(0);
    let max = counters.iter().copied().max().unwrap_or(0);
    max < 10 * min
}

/// Bumps the count with the largest positive rounding error.
pub fn increment(counts: &mut [u32], errors: &[f32]) {
    let mut index = 0;
    let mut biggest = errors[0];
    for (i, &e) in errors.iter().enumerate().skip(1) {
        if e > biggest {
            biggest = e;
            index = i;
        }
    }
    counts[index] += 1;
}

/// Shrinks the count with the most negative rounding error.
pub fn decrement(counts: &mut [u32], errors: &[f32]) {
    let mut index = 0;
    let mut smallest = errors[0];
    for (i, &e) in errors.iter().enumerate().skip(1) {
        if e < smallest {
            smallest = e;
            index = i;
        }
    }
    counts[index] -= 1;
}

// RSS value computation
//------------------------------------------------------------------------------

fn combins(n: u32, r: u32) -> u32 {
    let (max_denom, min_denom) = if n - r > r { (n - r, r) } else { (r, n - r) };
    let mut val: u64 = 1;
    let mut j: u64 = 1;
    for i in ((max_denom + 1)..=n).rev() {
        val *= i as u64;
        if j <= min_denom as u64 {
            val /= j;
            j += 1;
        }
    }
    while j <= min_denom as u64 {
        val /= j;
        j += 1;
    }
    val as u32
}

/// Ranks a width sequence within the RSS combinatorial character set: the
/// number of valid sequences lexically before it.
pub fn rss_value(widths: &[u32], max_width: u32, no_narrow: bool) -> u32 {
    let mut n: u32 = widths.iter().sum();
    let mut val: u32 = 0;
    let mut narrow_mask: u32 = 0;
    let elements = widths.len() as u32;

    for bar in 0..elements - 1 {
        let mut elm_width: u32 = 1;
        narrow_mask |= 1 << bar;
        while elm_width < widths[bar as usize] {
            narrow_mask &= !(1 << bar);
            let mut sub_val = combins(n - elm_width - 1, elements - bar - 2);
            if no_narrow
                && narrow_mask == 0
                && n - elm_width >= 2 * (elements - bar - 1)
            {
                sub_val -= combins(n - elm_width - (elements - bar), elements - bar - 2);
            }
            if elements - bar - 1 > 1 {
                let mut less_val = 0;
                let mut mxw_element = n - elm_width - (elements - bar - 2);
                while mxw_element > max_width {
                    less_val += combins(n - elm_width - mxw_element - 1, elements - bar - 3);
                    mxw_element -= 1;
                }
                sub_val -= less_val * (elements - 1 - bar);
            } else if n - elm_width > max_width {
                sub_val -= 1;
            }
            val += sub_val;
            elm_width += 1;
            narrow_mask |= 1 << bar;
        }
        n -= elm_width;
    }
    val
}

#[cfg(test)]
mod rss_tests {
    use super::*;

    #[test]
    fn test_combins() {
        assert_eq!(combins(5, 2), 10);
        assert_eq!(combins(10, 3), 120);
        assert_eq!(combins(7, 0), 1);
        assert_eq!(combins(7, 7), 1);
    }

    #[test]
    fn test_rss_value_orders_sequences() {
        // The all-narrowest sequence ranks first.
        assert_eq!(rss_value(&[1, 1, 1, 9], 9, false), 0);
        // Widening the first element skips all completions of the narrower
        // prefix.
        let base = rss_value(&[2, 1, 1, 8], 9, false);
        assert!(base > 0);
        assert!(rss_value(&[3, 1, 1, 7], 9, false) > base);
    }

    #[test]
    fn test_is_finder_pattern() {
        // The scan window holds finder elements 2-5, e.g. 8,2,1,1 for the
        // 3,8,2,1 pattern: ratio 10/12.
        assert!(is_finder_pattern(&[8, 2, 1, 1]));
        assert!(is_finder_pattern(&[16, 4, 2, 2]));
        // Ratio far off.
        assert!(!is_finder_pattern(&[1, 1, 8, 8]));
        // Too large a spread between elements.
        assert!(!is_finder_pattern(&[1, 11, 1, 1]));
    }

    #[test]
    fn test_parse_finder_value() {
        let patterns: [[usize; 4]; 2] = [[3, 8, 2, 1], [3, 5, 5, 1]];
        assert_eq!(parse_finder_value(&[6, 16, 4, 2], &patterns), Ok(0));
        assert_eq!(parse_finder_value(&[6, 10, 10, 2], &patterns), Ok(1));
        assert!(parse_finder_value(&[5, 5, 5, 5], &patterns).is_err());
    }

    #[test]
    fn test_increment_decrement() {
        let mut counts = [2u32, 3, 1, 4];
        increment(&mut counts, &[-0.2, 0.4, 0.1, -0.3]);
        assert_eq!(counts, [2, 4, 1, 4]);
        decrement(&mut counts, &[-0.2, 0.4, 0.1, -0.3]);
        assert_eq!(counts, [2, 4, 1, 3]);
    }
}
