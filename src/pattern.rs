use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};

// Run-length primitives
//------------------------------------------------------------------------------

/// Records `counters.len()` alternating runs starting at `start`, which must
/// sit on a color transition (or row start). The run at `start` may be either
/// color; callers decide what the first counter means.
pub fn record_pattern(row: &BitArray, start: usize, counters: &mut [usize]) -> ScanResult<()> {
    let num_counters = counters.len();
    counters.iter_mut().for_each(|c| *c = 0);
    let end = row.size();
    if start >= end {
        return Err(ScanError::NotFound);
    }
    let mut is_white = !row.get(start);
    let mut counter_pos = 0;
    let mut i = start;
    while i < end {
        if row.get(i) != is_white {
            counters[counter_pos] += 1;
        } else {
            counter_pos += 1;
            if counter_pos == num_counters {
                break;
            }
            counters[counter_pos] = 1;
            is_white = !is_white;
        }
        i += 1;
    }
    // Accept a pattern that runs into the row edge only if it filled every
    // counter.
    if counter_pos == num_counters || (counter_pos == num_counters - 1 && i == end) {
        Ok(())
    } else {
        Err(ScanError::NotFound)
    }
}

/// Records runs leftward from `start` and leaves them in scan order, so that
/// `counters[0]` is the leftmost run of the recorded window.
pub fn record_pattern_in_reverse(
    row: &BitArray,
    start: usize,
    counters: &mut [usize],
) -> ScanResult<()> {
    let mut num_transitions_left = counters.len() as isize;
    let mut last = row.get(start);
    let mut start = start;
    while start > 0 && num_transitions_left >= 0 {
        start -= 1;
        if row.get(start) != last {
            num_transitions_left -= 1;
            last = !last;
        }
    }
    if num_transitions_left >= 0 {
        return Err(ScanError::NotFound);
    }
    record_pattern(row, start + 1, counters)
}

/// Mean per-module deviation of observed runs against an ideal pattern,
/// normalized to module units. Returns `f32::INFINITY` when the runs cannot
/// match: too few pixels, or any single run off by more than
/// `max_individual_variance` (a fraction of the unit width).
pub fn pattern_match_variance(
    counters: &[usize],
    pattern: &[usize],
    max_individual_variance: f32,
) -> f32 {
    debug_assert_eq!(counters.len(), pattern.len(), "Counter count mismatch");

    let total: usize = counters.iter().sum();
    let pattern_length: usize = pattern.iter().sum();
    if total < pattern_length {
        return f32::INFINITY;
    }
    let unit_bar_width = total as f32 / pattern_length as f32;
    let max_individual_variance = max_individual_variance * unit_bar_width;

    let mut total_variance = 0.0f32;
    for (&counter, &scaled) in counters.iter().zip(pattern.iter()) {
        let variance = (counter as f32 - scaled as f32 * unit_bar_width).abs();
        if variance > max_individual_variance {
            return f32::INFINITY;
        }
        total_variance += variance;
    }
    total_variance / total as f32
}

#[cfg(test)]
mod pattern_tests {
    use super::*;

    fn row_from(runs: &[(usize, bool)]) -> BitArray {
        let size: usize = runs.iter().map(|r| r.0).sum();
        let mut row = BitArray::new(size);
        let mut i = 0;
        for &(len, dark) in runs {
            for _ in 0..len {
                if dark {
                    row.set(i);
                }
                i += 1;
            }
        }
        row
    }

    #[test]
    fn test_record_pattern() {
        let row = row_from(&[(4, false), (3, true), (2, false), (5, true), (6, false)]);
        let mut counters = [0usize; 3];
        record_pattern(&row, 4, &mut counters).unwrap();
        assert_eq!(counters, [3, 2, 5]);
    }

    #[test]
    fn test_record_pattern_hits_row_end() {
        let row = row_from(&[(2, true), (3, false)]);
        let mut counters = [0usize; 2];
        record_pattern(&row, 0, &mut counters).unwrap();
        assert_eq!(counters, [2, 3]);

        let mut too_many = [0usize; 3];
        assert!(record_pattern(&row, 0, &mut too_many).is_err());
    }

    #[test]
    fn test_record_pattern_in_reverse() {
        let row = row_from(&[(5, false), (2, true), (3, false), (4, true), (1, false)]);
        let mut counters = [0usize; 3];
        record_pattern_in_reverse(&row, 14, &mut counters).unwrap();
        assert_eq!(counters, [2, 3, 4]);
    }

    #[test]
    fn test_variance_perfect_match() {
        let v = pattern_match_variance(&[3, 3, 9, 3, 3], &[1, 1, 3, 1, 1], 0.7);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_variance_rejects_single_outlier() {
        let v = pattern_match_variance(&[3, 3, 30, 3, 3], &[1, 1, 3, 1, 1], 0.7);
        assert!(v.is_infinite());
    }

    #[test]
    fn test_variance_rejects_too_few_pixels() {
        let v = pattern_match_variance(&[1, 1, 1], &[2, 2, 2], 0.7);
        assert!(v.is_infinite());
    }
}
