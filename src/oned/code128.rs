use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::RowReader;
use crate::pattern::{pattern_match_variance, record_pattern};
use crate::result::{Decoded, Format, Metadata, Point};

// Tables
//------------------------------------------------------------------------------

/// Run widths for symbols 0-105, the three start codes and the stop code.
/// The stop pattern really has seven runs; the trailing termination bar is
/// read separately.
const CODE_PATTERNS: [[usize; 6]; 107] = [
    [2, 1, 2, 2, 2, 2],
    [2, 2, 2, 1, 2, 2],
    [2, 2, 2, 2, 2, 1],
    [1, 2, 1, 2, 2, 3],
    [1, 2, 1, 3, 2, 2],
    [1, 3, 1, 2, 2, 2],
    [1, 2, 2, 2, 1, 3],
    [1, 2, 2, 3, 1, 2],
    [1, 3, 2, 2, 1, 2],
    [2, 2, 1, 2, 1, 3],
    [2, 2, 1, 3, 1, 2],
    [2, 3, 1, 2, 1, 2],
    [1, 1, 2, 2, 3, 2],
    [1, 2, 2, 1, 3, 2],
    [1, 2, 2, 2, 3, 1],
    [1, 1, 3, 2, 2, 2],
    [1, 2, 3, 1, 2, 2],
    [1, 2, 3, 2, 2, 1],
    [2, 2, 3, 2, 1, 1],
    [2, 2, 1, 1, 3, 2],
    [2, 2, 1, 2, 3, 1],
    [2, 1, 3, 2, 1, 2],
    [2, 2, 3, 1, 1, 2],
    [3, 1, 2, 1, 3, 1],
    [3, 1, 1, 2, 2, 2],
    [3, 2, 1, 1, 2, 2],
    [3, 2, 1, 2, 2, 1],
    [3, 1, 2, 2, 1, 2],
    [3, 2, 2, 1, 1, 2],
    [3, 2, 2, 2, 1, 1],
    [2, 1, 2, 1, 2, 3],
    [2, 1, 2, 3, 2, 1],
    [2, 3, 2, 1, 2, 1],
    [1, 1, 1, 3, 2, 3],
    [1, 3, 1, 1, 2, 3],
    [1, 3, 1, 3, 2, 1],
    [1, 1, 2, 3, 1, 3],
    [1, 3, 2, 1, 1, 3],
    [1, 3, 2, 3, 1, 1],
    [2, 1, 1, 3, 1, 3],
    [2, 3, 1, 1, 1, 3],
    [2, 3, 1, 3, 1, 1],
    [1, 1, 2, 1, 3, 3],
    [1, 1, 2, 3, 3, 1],
    [1, 3, 2, 1, 3, 1],
    [1, 1, 3, 1, 2, 3],
    [1, 1, 3, 3, 2, 1],
    [1, 3, 3, 1, 2, 1],
    [3, 1, 3, 1, 2, 1],
    [2, 1, 1, 3, 3, 1],
    [2, 3, 1, 1, 3, 1],
    [2, 1, 3, 1, 1, 3],
    [2, 1, 3, 3, 1, 1],
    [2, 1, 3, 1, 3, 1],
    [3, 1, 1, 1, 2, 3],
    [3, 1, 1, 3, 2, 1],
    [3, 3, 1, 1, 2, 1],
    [3, 1, 2, 1, 1, 3],
    [3, 1, 2, 3, 1, 1],
    [3, 3, 2, 1, 1, 1],
    [3, 1, 4, 1, 1, 1],
    [2, 2, 1, 4, 1, 1],
    [4, 3, 1, 1, 1, 1],
    [1, 1, 1, 2, 2, 4],
    [1, 1, 1, 4, 2, 2],
    [1, 2, 1, 1, 2, 4],
    [1, 2, 1, 4, 2, 1],
    [1, 4, 1, 1, 2, 2],
    [1, 4, 1, 2, 2, 1],
    [1, 1, 2, 2, 1, 4],
    [1, 1, 2, 4, 1, 2],
    [1, 2, 2, 1, 1, 4],
    [1, 2, 2, 4, 1, 1],
    [1, 4, 2, 1, 1, 2],
    [1, 4, 2, 2, 1, 1],
    [2, 4, 1, 2, 1, 1],
    [2, 2, 1, 1, 1, 4],
    [4, 1, 3, 1, 1, 1],
    [2, 4, 1, 1, 1, 2],
    [1, 3, 4, 1, 1, 1],
    [1, 1, 1, 2, 4, 2],
    [1, 2, 1, 1, 4, 2],
    [1, 2, 1, 2, 4, 1],
    [1, 1, 4, 2, 1, 2],
    [1, 2, 4, 1, 1, 2],
    [1, 2, 4, 2, 1, 1],
    [4, 1, 1, 2, 1, 2],
    [4, 2, 1, 1, 1, 2],
    [4, 2, 1, 2, 1, 1],
    [2, 1, 2, 1, 4, 1],
    [2, 1, 4, 1, 2, 1],
    [4, 1, 2, 1, 2, 1],
    [1, 1, 1, 1, 4, 3],
    [1, 1, 1, 3, 4, 1],
    [1, 3, 1, 1, 4, 1],
    [1, 1, 4, 1, 1, 3],
    [1, 1, 4, 3, 1, 1],
    [4, 1, 1, 1, 1, 3],
    [4, 1, 1, 3, 1, 1],
    [1, 1, 3, 1, 4, 1],
    [1, 1, 4, 1, 3, 1],
    [3, 1, 1, 1, 4, 1],
    [4, 1, 1, 1, 3, 1],
    [2, 1, 1, 4, 1, 2],
    [2, 1, 1, 2, 1, 4],
    [2, 1, 1, 2, 3, 2],
    [2, 3, 3, 1, 1, 1],
];

const MAX_AVG_VARIANCE: f32 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

const CODE_FNC_3: usize = 96;
const CODE_FNC_2: usize = 97;
const CODE_SHIFT: usize = 98;
const CODE_CODE_C: usize = 99;
const CODE_CODE_B: usize = 100;
const CODE_CODE_A: usize = 101;
const CODE_FNC_1: usize = 102;
// FNC4 in code set A shares a value with the CODE A latch; same for B.
const CODE_FNC_4_A: usize = 101;
const CODE_FNC_4_B: usize = 100;
const CODE_START_A: usize = 103;
const CODE_START_B: usize = 104;
const CODE_START_C: usize = 105;
const CODE_STOP: usize = 106;

// Row parsing
//------------------------------------------------------------------------------

fn find_start_pattern(row: &BitArray) -> ScanResult<(usize, usize, usize)> {
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
                let mut best_variance = MAX_AVG_VARIANCE;
                let mut best_match = None;
                for start_code in CODE_START_A..=CODE_START_C {
                    let variance = pattern_match_variance(
                        &counters,
                        &CODE_PATTERNS[start_code],
                        MAX_INDIVIDUAL_VARIANCE,
                    );
                    if variance < best_variance {
                        best_variance = variance;
                        best_match = Some(start_code);
                    }
                }
                if let Some(start_code) = best_match {
                    // Half-width quiet zone before the start pattern.
                    let quiet_start = pattern_start.saturating_sub((i - pattern_start) / 2);
                    if row.is_range(quiet_start, pattern_start, false)? {
                        return Ok((pattern_start, i, start_code));
                    }
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

fn decode_code(row: &BitArray, counters: &mut [usize; 6], row_offset: usize) -> ScanResult<usize> {
    record_pattern(row, row_offset, counters)?;
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match = None;
    for (code, pattern) in CODE_PATTERNS.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(code);
        }
    }
    best_match.ok_or(ScanError::NotFound)
}

// Reader
//------------------------------------------------------------------------------

/// Decodes Code 128 in all three code sets, including shifts, FNC1 for
/// GS1-128 and the FNC4 high-ASCII extension.
pub struct Code128Reader;

impl Code128Reader {
    pub fn new() -> Self {
        Self
    }
}

impl RowReader for Code128Reader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let (start, start_end, start_code) = find_start_pattern(row)?;
        hints.report_point(Point::new((start + start_end) as f32 / 2.0, row_number as f32));

        let mut code_set = match start_code {
            CODE_START_A => CODE_CODE_A,
            CODE_START_B => CODE_CODE_B,
            CODE_START_C => CODE_CODE_C,
            _ => return Err(ScanError::Format),
        };

        let mut done = false;
        let mut is_next_shifted = false;
        let mut text = String::new();
        let mut raw_codes: Vec<u8> = vec![start_code as u8];
        let mut checksum_total = start_code;
        let mut multiplier = 0;
        let mut last_character_was_printable = true;
        let mut upper_mode = false;
        let mut shift_upper_mode = false;

        let mut counters = [0usize; 6];
        let mut next_start = start_end;
        let mut last_start = start;
        let mut last_code = 0;
        let mut code = 0;

        while !done {
            let unshift = is_next_shifted;
            is_next_shifted = false;
            last_code = code;
            code = decode_code(row, &mut counters, next_start)?;
            raw_codes.push(code as u8);

            if code != CODE_STOP {
                last_character_was_printable = true;
                multiplier += 1;
                checksum_total += multiplier * code;
            }
            last_start = next_start;
            next_start += counters.iter().sum::<usize>();

            if matches!(code, CODE_START_A | CODE_START_B | CODE_START_C) {
                return Err(ScanError::Format);
            }

            match code_set {
                CODE_CODE_A if code < 64 => {
                    push_shifted(&mut text, b' ' + code as u8, upper_mode, &mut shift_upper_mode);
                }
                CODE_CODE_A if code < 96 => {
                    push_shifted(&mut text, code as u8 - 64, upper_mode, &mut shift_upper_mode);
                }
                CODE_CODE_A => {
                    if code != CODE_STOP {
                        last_character_was_printable = false;
                    }
                    match code {
                        CODE_FNC_1 => push_fnc1(&mut text),
                        CODE_FNC_2 | CODE_FNC_3 => {}
                        CODE_FNC_4_A => {
                            toggle_upper(&mut upper_mode, &mut shift_upper_mode);
                        }
                        CODE_SHIFT => {
                            is_next_shifted = true;
                            code_set = CODE_CODE_B;
                        }
                        CODE_CODE_B => code_set = CODE_CODE_B,
                        CODE_CODE_C => code_set = CODE_CODE_C,
                        CODE_STOP => done = true,
                        _ => return Err(ScanError::Format),
                    }
                }
                CODE_CODE_B if code < 96 => {
                    push_shifted(&mut text, b' ' + code as u8, upper_mode, &mut shift_upper_mode);
                }
                CODE_CODE_B => {
                    if code != CODE_STOP {
                        last_character_was_printable = false;
                    }
                    match code {
                        CODE_FNC_1 => push_fnc1(&mut text),
                        CODE_FNC_2 | CODE_FNC_3 => {}
                        CODE_FNC_4_B => {
                            toggle_upper(&mut upper_mode, &mut shift_upper_mode);
                        }
                        CODE_SHIFT => {
                            is_next_shifted = true;
                            code_set = CODE_CODE_A;
                        }
                        CODE_CODE_A => code_set = CODE_CODE_A,
                        CODE_CODE_C => code_set = CODE_CODE_C,
                        CODE_STOP => done = true,
                        _ => return Err(ScanError::Format),
                    }
                }
                CODE_CODE_C if code < 100 => {
                    if code < 10 {
                        text.push('0');
                    }
                    text.push_str(&code.to_string());
                }
                CODE_CODE_C => {
                    if code != CODE_STOP {
                        last_character_was_printable = false;
                    }
                    match code {
                        CODE_FNC_1 => push_fnc1(&mut text),
                        CODE_CODE_A => code_set = CODE_CODE_A,
                        CODE_CODE_B => code_set = CODE_CODE_B,
                        CODE_STOP => done = true,
                        _ => return Err(ScanError::Format),
                    }
                }
                _ => return Err(ScanError::Format),
            }

            if unshift {
                code_set = if code_set == CODE_CODE_A { CODE_CODE_B } else { CODE_CODE_A };
            }
        }

        let last_pattern_size = next_start - last_start;
        // The stop pattern carries a seventh run, a termination bar still
        // unread at this point.
        next_start = row.next_unset(next_start);
        let quiet_end = (next_start + (next_start - last_start) / 2).min(row.size());
        if !row.is_range(next_start, quiet_end, false)? {
            return Err(ScanError::NotFound);
        }

        checksum_total -= multiplier * last_code;
        if checksum_total % 103 != last_code {
            return Err(ScanError::Checksum);
        }

        if text.is_empty() {
            return Err(ScanError::NotFound);
        }
        // The check character was appended as text; strip it.
        if last_character_was_printable {
            let strip = if code_set == CODE_CODE_C { 2 } else { 1 };
            let new_len = text.len().saturating_sub(strip);
            text.truncate(new_len);
        }

        let left = (start + start_end) as f32 / 2.0;
        let right = last_start as f32 + last_pattern_size as f32 / 2.0;
        hints.report_point(Point::new(right, row_number as f32));

        let mut result = Decoded::new(
            text,
            raw_codes,
            vec![Point::new(left, row_number as f32), Point::new(right, row_number as f32)],
            Format::Code128,
        );
        result.put_metadata(Metadata::SymbologyIdentifier("]C0".into()));
        Ok(result)
    }
}

fn push_fnc1(text: &mut String) {
    // Leading FNC1 marks GS1-128; later ones separate variable-length AIs.
    if text.is_empty() {
        text.push_str("]C1");
    } else {
        text.push('\u{1D}');
    }
}

fn push_shifted(text: &mut String, base: u8, upper_mode: bool, shift_upper_mode: &mut bool) {
    if *shift_upper_mode == upper_mode {
        text.push(base as char);
    } else {
        text.push((base as u16 + 128) as u8 as char);
    }
    *shift_upper_mode = false;
}

fn toggle_upper(upper_mode: &mut bool, shift_upper_mode: &mut bool) {
    if *shift_upper_mode {
        *upper_mode = !*upper_mode;
        *shift_upper_mode = false;
    } else {
        *shift_upper_mode = true;
    }
}
