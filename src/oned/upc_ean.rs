use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::extensions::ExtensionReader;
use crate::oned::RowReader;
use crate::pattern::{pattern_match_variance, record_pattern};
use crate::result::{Decoded, Format, Metadata, Point};

// Patterns
//------------------------------------------------------------------------------

pub const MAX_AVG_VARIANCE: f32 = 0.48;
pub const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

pub const START_END_PATTERN: [usize; 3] = [1, 1, 1];
pub const MIDDLE_PATTERN: [usize; 5] = [1, 1, 1, 1, 1];

/// Odd-parity widths for digits 0-9: space, bar, space, bar from the left.
pub const L_PATTERNS: [[usize; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// L patterns followed by their reversals, the even-parity G set.
pub const L_AND_G_PATTERNS: [[usize; 4]; 20] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

/// Parity word of the left half selects the implied leading digit of EAN-13.
pub(crate) const FIRST_DIGIT_ENCODINGS: [u8; 10] =
    [0x00, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A];

// Guard search
//------------------------------------------------------------------------------

/// Slides a window of alternating runs from `from` until one matches
/// `pattern`. Returns [start, end) of the match.
pub fn find_guard_pattern(
    row: &BitArray,
    from: usize,
    white_first: bool,
    pattern: &[usize],
) -> ScanResult<(usize, usize)> {
    let width = row.size();
    let pattern_length = pattern.len();
    let mut counters = vec![0usize; pattern_length];
    let row_offset = if white_first { row.next_unset(from) } else { row.next_set(from) };
    let mut counter_position = 0;
    let mut pattern_start = row_offset;
    let mut is_white = white_first;

    for x in row_offset..width {
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

/// Start guard plus the requirement of a clean quiet zone before it.
pub fn find_start_guard(row: &BitArray) -> ScanResult<(usize, usize)> {
    let mut next_start = 0;
    loop {
        let (start, end) = find_guard_pattern(row, next_start, false, &START_END_PATTERN)?;
        next_start = end;
        let guard_width = end - start;
        if let Some(quiet_start) = start.checked_sub(guard_width) {
            if row.is_range(quiet_start, start, false)? {
                return Ok((start, end));
            }
        }
    }
}

/// Best digit match for the four runs starting at `row_offset`.
pub fn decode_digit(
    row: &BitArray,
    counters: &mut [usize; 4],
    row_offset: usize,
    patterns: &[[usize; 4]],
) -> ScanResult<usize> {
    record_pattern(row, row_offset, counters)?;
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best_match = None;
    for (i, pattern) in patterns.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best_match = Some(i);
        }
    }
    best_match.ok_or(ScanError::NotFound)
}

// Checksum
//------------------------------------------------------------------------------

/// Mod-10 check digit with 3/1 weights from the right.
pub fn standard_checksum(digits: &[u8]) -> u8 {
    let mut sum: u32 = 0;
    for (i, &d) in digits.iter().rev().enumerate() {
        if i % 2 == 0 {
            sum += d as u32;
        }
    }
    sum *= 3;
    for (i, &d) in digits.iter().rev().enumerate() {
        if i % 2 == 1 {
            sum += d as u32;
        }
    }
    ((1000 - sum) % 10) as u8
}

fn check_checksum(text: &str) -> ScanResult<bool> {
    let digits: Vec<u8> = text
        .bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(ScanError::Format)
            }
        })
        .collect::<ScanResult<_>>()?;
    let (body, check) = digits.split_at(digits.len() - 1);
    Ok(standard_checksum(body) == check[0])
}

// Middle decoding
//------------------------------------------------------------------------------

fn decode_middle_ean13(
    row: &BitArray,
    start_end: usize,
    text: &mut String,
) -> ScanResult<usize> {
    let mut counters = [0usize; 4];
    let mut row_offset = start_end;
    let mut lg_pattern = 0u8;

    for x in 0..6 {
        let best = decode_digit(row, &mut counters, row_offset, &L_AND_G_PATTERNS)?;
        text.push((b'0' + (best % 10) as u8) as char);
        row_offset += counters.iter().sum::<usize>();
        if best >= 10 {
            lg_pattern |= 1 << (5 - x);
        }
    }

    let first = FIRST_DIGIT_ENCODINGS
        .iter()
        .position(|&enc| enc == lg_pattern)
        .ok_or(ScanError::NotFound)?;
    text.insert(0, (b'0' + first as u8) as char);

    let (_, middle_end) = find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN)?;
    row_offset = middle_end;

    for _ in 0..6 {
        let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
        text.push((b'0' + best as u8) as char);
        row_offset += counters.iter().sum::<usize>();
    }
    Ok(row_offset)
}

fn decode_middle_ean8(row: &BitArray, start_end: usize, text: &mut String) -> ScanResult<usize> {
    let mut counters = [0usize; 4];
    let mut row_offset = start_end;

    for _ in 0..4 {
        let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
        text.push((b'0' + best as u8) as char);
        row_offset += counters.iter().sum::<usize>();
    }

    let (_, middle_end) = find_guard_pattern(row, row_offset, true, &MIDDLE_PATTERN)?;
    row_offset = middle_end;

    for _ in 0..4 {
        let best = decode_digit(row, &mut counters, row_offset, &L_PATTERNS)?;
        text.push((b'0' + best as u8) as char);
        row_offset += counters.iter().sum::<usize>();
    }
    Ok(row_offset)
}

// Country lookup
//------------------------------------------------------------------------------

/// Abridged registry of EAN-13 number-system prefixes.
fn country_for_prefix(text: &str) -> Option<&'static str> {
    let p3: u32 = text.get(..3)?.parse().ok()?;
    let entry = match p3 {
        0..=199 => "US/CA",
        300..=379 => "FR",
        380 => "BG",
        400..=440 => "DE",
        450..=459 | 490..=499 => "JP",
        460..=469 => "RU",
        500..=509 => "GB",
        520 => "GR",
        539 => "IE",
        560 => "PT",
        600..=601 => "ZA",
        690..=695 => "CN",
        700..=709 => "NO",
        729 => "IL",
        730..=739 => "SE",
        760..=769 => "CH",
        800..=839 => "IT",
        840..=849 => "ES",
        870..=879 => "NL",
        880 => "KR",
        885 => "TH",
        888 => "SG",
        890 => "IN",
        893 => "VN",
        930..=939 => "AU",
        940..=949 => "NZ",
        955 => "MY",
        _ => return None,
    };
    Some(entry)
}

// Reader
//------------------------------------------------------------------------------

/// Decodes the EAN/UPC family from one row. UPC-A is an EAN-13 with an
/// implied leading zero, reported separately when allowed.
pub struct EanUpcReader {
    allow_upca: bool,
    allow_ean13: bool,
    allow_ean8: bool,
    extensions: ExtensionReader,
}

impl EanUpcReader {
    pub fn new(hints: &DecodeHints) -> Self {
        Self {
            allow_upca: hints.allows(Format::UpcA),
            allow_ean13: hints.allows(Format::Ean13),
            allow_ean8: hints.allows(Format::Ean8),
            extensions: ExtensionReader::new(),
        }
    }

    fn decode_variant(
        &self,
        row_number: usize,
        row: &BitArray,
        start: (usize, usize),
        ean8: bool,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        hints.report_point(Point::new(
            (start.0 + start.1) as f32 / 2.0,
            row_number as f32,
        ));

        let mut text = String::new();
        let middle_end = if ean8 {
            decode_middle_ean8(row, start.1, &mut text)?
        } else {
            decode_middle_ean13(row, start.1, &mut text)?
        };

        let (end_start, end) = find_guard_pattern(row, middle_end, false, &START_END_PATTERN)?;
        hints.report_point(Point::new((end_start + end) as f32 / 2.0, row_number as f32));

        // The quiet zone after the symbol must be at least as wide as the
        // end guard.
        let quiet_end = end + (end - end_start);
        if quiet_end >= row.size() || !row.is_range(end, quiet_end, false)? {
            return Err(ScanError::NotFound);
        }

        if text.len() < 8 {
            return Err(ScanError::Format);
        }
        if !check_checksum(&text)? {
            return Err(ScanError::Checksum);
        }

        let left = (start.0 + start.1) as f32 / 2.0;
        let right = (end_start + end) as f32 / 2.0;
        let mut format = if ean8 { Format::Ean8 } else { Format::Ean13 };

        // Collapse to UPC-A when the leading zero is implied and wanted.
        if format == Format::Ean13 && text.starts_with('0') && self.allow_upca {
            text.remove(0);
            format = Format::UpcA;
        }

        let mut result = Decoded::new(
            text,
            Vec::new(),
            vec![
                Point::new(left, row_number as f32),
                Point::new(right, row_number as f32),
            ],
            format,
        );

        let extension_length = match self.extensions.decode_row(row_number, row, end) {
            Ok(ext) => {
                let length = ext.text.len();
                result.put_metadata(Metadata::UpcEanExtension(ext.text));
                result.points.extend(ext.points);
                length
            }
            Err(_) => 0,
        };
        if !hints.allowed_ean_extensions.is_empty()
            && !hints.allowed_ean_extensions.contains(&extension_length)
        {
            return Err(ScanError::NotFound);
        }

        if matches!(format, Format::Ean13 | Format::UpcA) {
            if let Some(country) = country_for_prefix(&result.text) {
                result.put_metadata(Metadata::PossibleCountry(country.into()));
            }
        }
        let identifier = match format {
            Format::Ean8 => "]E4",
            _ => "]E0",
        };
        result.put_metadata(Metadata::SymbologyIdentifier(identifier.into()));
        Ok(result)
    }
}

impl RowReader for EanUpcReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded> {
        let start = find_start_guard(row)?;
        if self.allow_ean13 || self.allow_upca {
            if let Ok(result) = self.decode_variant(row_number, row, start, false, hints) {
                return Ok(result);
            }
        }
        if self.allow_ean8 {
            return self.decode_variant(row_number, row, start, true, hints);
        }
        Err(ScanError::NotFound)
    }
}

// Row synthesis for tests
//------------------------------------------------------------------------------

/// Appends `count` modules of one color to a row under construction.
#[cfg(test)]
pub(crate) fn push_run(bits: &mut Vec<bool>, dark: bool, count: usize) {
    bits.extend(std::iter::repeat(dark).take(count));
}

#[cfg(test)]
pub(crate) fn row_from_bools(bits: &[bool]) -> BitArray {
    let mut row = BitArray::new(bits.len());
    for (i, &b) in bits.iter().enumerate() {
        if b {
            row.set(i);
        }
    }
    row
}

#[cfg(test)]
mod upc_ean_tests {
    use super::*;
    use crate::encode::{ean13_row_modules, ean8_row_modules};
    use test_case::test_case;

    fn widen(modules: &[bool], scale: usize, quiet: usize) -> BitArray {
        let mut bits = Vec::new();
        push_run(&mut bits, false, quiet * scale);
        for &m in modules {
            push_run(&mut bits, m, scale);
        }
        push_run(&mut bits, false, quiet * scale);
        row_from_bools(&bits)
    }

    #[test]
    fn test_standard_checksum() {
        // 4006381333931 is a valid EAN-13.
        assert_eq!(standard_checksum(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3]), 1);
        // 96385074 is a valid EAN-8.
        assert_eq!(standard_checksum(&[9, 6, 3, 8, 5, 0, 7]), 4);
    }

    #[test_case("4006381333931"; "german prefix")]
    #[test_case("5012345678900"; "british prefix")]
    #[test_case("0012345678905"; "upc range")]
    fn test_ean13_roundtrip(code: &str) {
        let modules = ean13_row_modules(code).unwrap();
        let row = widen(&modules, 3, 9);
        let hints = DecodeHints { formats: vec![Format::Ean13], ..Default::default() };
        let mut reader = EanUpcReader::new(&hints);
        let result = reader.decode_row(1, &row, &hints).unwrap();
        assert_eq!(result.text, code);
        assert_eq!(result.format, Format::Ean13);
    }

    #[test]
    fn test_upca_collapse() {
        let modules = ean13_row_modules("0036000291452").unwrap();
        let row = widen(&modules, 3, 9);
        let hints = DecodeHints { formats: vec![Format::UpcA], ..Default::default() };
        let mut reader = EanUpcReader::new(&hints);
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "036000291452");
        assert_eq!(result.format, Format::UpcA);
    }

    #[test]
    fn test_upca_collapse_with_open_hints() {
        // No format restriction still reports the UPC-A reading, not the
        // 13-digit one.
        let modules = ean13_row_modules("0036000291452").unwrap();
        let row = widen(&modules, 3, 9);
        let hints = DecodeHints::default();
        let mut reader = EanUpcReader::new(&hints);
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "036000291452");
        assert_eq!(result.format, Format::UpcA);
    }

    #[test]
    fn test_ean8_roundtrip() {
        let modules = ean8_row_modules("96385074").unwrap();
        let row = widen(&modules, 3, 9);
        let hints = DecodeHints { formats: vec![Format::Ean8], ..Default::default() };
        let mut reader = EanUpcReader::new(&hints);
        let result = reader.decode_row(0, &row, &hints).unwrap();
        assert_eq!(result.text, "96385074");
        assert_eq!(result.format, Format::Ean8);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Corrupt the check digit.
        let modules = ean13_row_modules("4006381333930");
        assert!(modules.is_err());
        // Build with a forced bad digit via the valid encoder then flip the
        // last digit's bars is messy; instead verify the checker directly.
        assert!(!check_checksum("4006381333930").unwrap());
    }

    #[test]
    fn test_missing_quiet_zone() {
        let modules = ean13_row_modules("4006381333931").unwrap();
        // No quiet zone at all.
        let row = row_from_bools(&modules);
        let hints = DecodeHints::default();
        let mut reader = EanUpcReader::new(&hints);
        assert!(reader.decode_row(0, &row, &hints).is_err());
    }

    #[test]
    fn test_country_prefix() {
        assert_eq!(country_for_prefix("4006381333931"), Some("DE"));
        assert_eq!(country_for_prefix("5012345678900"), Some("GB"));
        assert_eq!(country_for_prefix("9991234567890"), None);
    }
}
