use crate::error::{ScanError, ScanResult};
use crate::qr::version::EcLevel;

// Format information
//------------------------------------------------------------------------------

const FORMAT_GENERATOR: u32 = 0x537;
const FORMAT_MASK: u32 = 0x5412;

/// Decoded contents of the 15-bit format information field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub ec_level: EcLevel,
    pub mask: u8,
}

/// Masked 15-bit format field for a level and mask pattern: 5 data bits, a
/// 10-bit BCH remainder over 0x537, then the fixed XOR mask.
pub fn format_info_bits(level: EcLevel, mask: u8) -> u32 {
    debug_assert!(mask < 8, "Invalid mask: {mask}");

    let data = ((level.bits() as u32) << 3) | mask as u32;
    let mut value = data << 10;
    let mut rem = value;
    while 32 - rem.leading_zeros() >= 11 {
        rem ^= FORMAT_GENERATOR << (32 - rem.leading_zeros() - 11);
    }
    value |= rem;
    value ^ FORMAT_MASK
}

impl FormatInfo {
    /// Matches the two redundant raw reads against all 32 valid fields,
    /// accepting the closest at a Hamming distance of at most 3. Both reads
    /// are tried unmasked as well, for encoders that forgot the fixed mask.
    pub fn decode(raw1: u32, raw2: u32) -> ScanResult<FormatInfo> {
        if let Some(info) = Self::best_match(raw1, raw2) {
            return Ok(info);
        }
        if let Some(info) = Self::best_match(raw1 ^ FORMAT_MASK, raw2 ^ FORMAT_MASK) {
            return Ok(info);
        }
        Err(ScanError::Format)
    }

    fn best_match(raw1: u32, raw2: u32) -> Option<FormatInfo> {
        let mut best: Option<FormatInfo> = None;
        let mut best_diff = u32::MAX;
        for bits in 0..32u8 {
            let level = EcLevel::from_bits(bits >> 3).ok()?;
            let mask = bits & 7;
            let expected = format_info_bits(level, mask);
            if raw1 == expected || raw2 == expected {
                return Some(FormatInfo { ec_level: level, mask });
            }
            let diff = (raw1 ^ expected).count_ones().min((raw2 ^ expected).count_ones());
            if diff < best_diff {
                best_diff = diff;
                best = Some(FormatInfo { ec_level: level, mask });
            }
        }
        (best_diff <= 3).then_some(best).flatten()
    }
}

// Mask patterns
//------------------------------------------------------------------------------

/// True when the data module at (x, y) must be flipped under the given mask
/// pattern.
pub fn mask_bit(mask: u8, x: usize, y: usize) -> bool {
    match mask {
        0 => (x + y) % 2 == 0,
        1 => y % 2 == 0,
        2 => x % 3 == 0,
        3 => (x + y) % 3 == 0,
        4 => (y / 2 + x / 3) % 2 == 0,
        5 => (x * y) % 2 + (x * y) % 3 == 0,
        6 => ((x * y) % 2 + (x * y) % 3) % 2 == 0,
        7 => ((x + y) % 2 + (x * y) % 3) % 2 == 0,
        _ => unreachable!("Invalid mask: {mask}"),
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_published_example() {
        // The symbology's worked example: level M, mask 101.
        assert_eq!(format_info_bits(EcLevel::M, 5), 0x40CE);
    }

    #[test_case(EcLevel::L, 0)]
    #[test_case(EcLevel::M, 5)]
    #[test_case(EcLevel::Q, 3)]
    #[test_case(EcLevel::H, 7)]
    fn test_roundtrip(level: EcLevel, mask: u8) {
        let bits = format_info_bits(level, mask);
        let info = FormatInfo::decode(bits, bits).unwrap();
        assert_eq!(info.ec_level, level);
        assert_eq!(info.mask, mask);
    }

    #[test]
    fn test_tolerates_three_bit_errors() {
        let bits = format_info_bits(EcLevel::Q, 6) ^ 0b1000_0000_0101;
        let info = FormatInfo::decode(bits, bits).unwrap();
        assert_eq!(info.ec_level, EcLevel::Q);
        assert_eq!(info.mask, 6);
    }

    #[test]
    fn test_second_read_can_rescue() {
        let good = format_info_bits(EcLevel::H, 2);
        let info = FormatInfo::decode(good ^ 0x7FFF, good).unwrap();
        assert_eq!(info.ec_level, EcLevel::H);
        assert_eq!(info.mask, 2);
    }

    #[test]
    fn test_garbage_rejected() {
        // Find a word at Hamming distance 4+ from every valid field, under
        // both the masked and unmasked interpretations.
        let valid: Vec<u32> = (0..32u8)
            .map(|b| format_info_bits(EcLevel::from_bits(b >> 3).unwrap(), b & 7))
            .collect();
        let garbage = (0..1u32 << 15)
            .find(|&w| {
                valid.iter().all(|&v| {
                    (w ^ v).count_ones() > 3 && (w ^ v ^ super::FORMAT_MASK).count_ones() > 3
                })
            })
            .unwrap();
        assert!(FormatInfo::decode(garbage, garbage).is_err());
    }

    #[test]
    fn test_mask_bit_patterns() {
        assert!(mask_bit(0, 0, 0));
        assert!(!mask_bit(0, 1, 0));
        assert!(mask_bit(1, 4, 0));
        assert!(!mask_bit(1, 4, 1));
        assert!(mask_bit(2, 3, 7));
        assert!(mask_bit(7, 0, 0));
    }
}
