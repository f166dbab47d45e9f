use crate::error::{ScanError, ScanResult};

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EcLevel {
    L,
    M,
    Q,
    H,
}

impl EcLevel {
    /// Two-bit field value carried in format information.
    pub fn bits(self) -> u8 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_bits(bits: u8) -> ScanResult<Self> {
        match bits & 3 {
            0b01 => Ok(Self::L),
            0b00 => Ok(Self::M),
            0b11 => Ok(Self::Q),
            0b10 => Ok(Self::H),
            _ => Err(ScanError::InvalidEcLevel),
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::L => 'L',
            Self::M => 'M',
            Self::Q => 'Q',
            Self::H => 'H',
        }
    }
}

// Encoding mode
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
    Kanji,
}

pub const ALPHANUMERIC_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

impl Mode {
    pub fn indicator(self) -> u8 {
        match self {
            Self::Numeric => 0b0001,
            Self::Alphanumeric => 0b0010,
            Self::Byte => 0b0100,
            Self::Kanji => 0b1000,
        }
    }

    /// Width of the character count field, which grows with version.
    pub fn char_count_bits(self, version: usize) -> usize {
        debug_assert!((1..=40).contains(&version), "Invalid version: {version}");

        let idx = match version {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match self {
            Self::Numeric => [10, 12, 14][idx],
            Self::Alphanumeric => [9, 11, 13][idx],
            Self::Byte => [8, 16, 16][idx],
            Self::Kanji => [8, 10, 12][idx],
        }
    }

    pub fn contains(self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => ALPHANUMERIC_CHARSET.contains(&byte),
            Self::Byte => true,
            Self::Kanji => false,
        }
    }
}

// Mode indicators that are headers rather than data segments.
pub const MODE_TERMINATOR: u16 = 0b0000;
pub const MODE_STRUCTURED_APPEND: u16 = 0b0011;
pub const MODE_FNC1_FIRST: u16 = 0b0101;
pub const MODE_ECI: u16 = 0b0111;
pub const MODE_FNC1_SECOND: u16 = 0b1001;

// Version
//------------------------------------------------------------------------------

/// One run of identical error correction blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcbRun {
    pub count: usize,
    pub data_codewords: usize,
}

/// Error correction layout for one version at one level.
#[derive(Debug, Clone, Copy)]
pub struct EcBlocks {
    pub ec_codewords_per_block: usize,
    pub runs: [EcbRun; 2],
}

impl EcBlocks {
    pub fn num_blocks(&self) -> usize {
        self.runs.iter().map(|r| r.count).sum()
    }

    pub fn total_data_codewords(&self) -> usize {
        self.runs.iter().map(|r| r.count * r.data_codewords).sum()
    }

    pub fn total_ec_codewords(&self) -> usize {
        self.num_blocks() * self.ec_codewords_per_block
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Version {
    pub number: usize,
    pub alignment_centers: &'static [usize],
    ec_blocks: [EcBlocks; 4],
}

impl Version {
    pub fn get(number: usize) -> ScanResult<&'static Version> {
        VERSIONS.get(number.wrapping_sub(1)).ok_or(ScanError::InvalidVersion)
    }

    pub fn dimension(&self) -> usize {
        17 + 4 * self.number
    }

    pub fn ec_blocks(&self, level: EcLevel) -> &EcBlocks {
        &self.ec_blocks[level as usize]
    }

    pub fn total_codewords(&self) -> usize {
        let ecb = &self.ec_blocks[0];
        ecb.total_data_codewords() + ecb.total_ec_codewords()
    }

    /// Version whose symbol is `dimension` modules wide.
    pub fn from_dimension(dimension: usize) -> ScanResult<&'static Version> {
        if dimension < 21 || dimension > 177 || dimension % 4 != 1 {
            return Err(ScanError::InvalidVersion);
        }
        Self::get((dimension - 17) / 4)
    }

    /// Decodes the 18-bit version info field found in symbols of version 7
    /// and up, tolerating up to three bit errors.
    pub fn from_version_info(bits: u32) -> ScanResult<&'static Version> {
        let mut best_version = 0;
        let mut best_diff = u32::MAX;
        for number in 7..=40usize {
            let expected = version_info_bits(number);
            if expected == bits {
                return Self::get(number);
            }
            let diff = (expected ^ bits).count_ones();
            if diff < best_diff {
                best_diff = diff;
                best_version = number;
            }
        }
        if best_diff <= 3 {
            return Self::get(best_version);
        }
        Err(ScanError::Format)
    }
}

/// 18-bit version info: 6 data bits followed by a 12-bit BCH remainder over
/// generator 0x1F25.
pub fn version_info_bits(version: usize) -> u32 {
    debug_assert!((7..=40).contains(&version), "No version info below 7: {version}");

    let mut value = (version as u32) << 12;
    let mut rem = value;
    while 32 - rem.leading_zeros() >= 13 {
        rem ^= 0x1F25 << (32 - rem.leading_zeros() - 13);
    }
    value |= rem;
    value
}

macro_rules! ecb {
    ($ec:expr, ($c1:expr, $d1:expr)) => {
        EcBlocks {
            ec_codewords_per_block: $ec,
            runs: [EcbRun { count: $c1, data_codewords: $d1 }, EcbRun { count: 0, data_codewords: 0 }],
        }
    };
    ($ec:expr, ($c1:expr, $d1:expr), ($c2:expr, $d2:expr)) => {
        EcBlocks {
            ec_codewords_per_block: $ec,
            runs: [
                EcbRun { count: $c1, data_codewords: $d1 },
                EcbRun { count: $c2, data_codewords: $d2 },
            ],
        }
    };
}

macro_rules! version {
    ($n:expr, [$($align:expr),*], $l:expr, $m:expr, $q:expr, $h:expr) => {
        Version {
            number: $n,
            alignment_centers: &[$($align),*],
            ec_blocks: [$l, $m, $q, $h],
        }
    };
}

#[rustfmt::skip]
static VERSIONS: [Version; 40] = [
    version!(1, [],
        ecb!(7, (1, 19)), ecb!(10, (1, 16)), ecb!(13, (1, 13)), ecb!(17, (1, 9))),
    version!(2, [6, 18],
        ecb!(10, (1, 34)), ecb!(16, (1, 28)), ecb!(22, (1, 22)), ecb!(28, (1, 16))),
    version!(3, [6, 22],
        ecb!(15, (1, 55)), ecb!(26, (1, 44)), ecb!(18, (2, 17)), ecb!(22, (2, 13))),
    version!(4, [6, 26],
        ecb!(20, (1, 80)), ecb!(18, (2, 32)), ecb!(26, (2, 24)), ecb!(16, (4, 9))),
    version!(5, [6, 30],
        ecb!(26, (1, 108)), ecb!(24, (2, 43)),
        ecb!(18, (2, 15), (2, 16)), ecb!(22, (2, 11), (2, 12))),
    version!(6, [6, 34],
        ecb!(18, (2, 68)), ecb!(16, (4, 27)), ecb!(24, (4, 19)), ecb!(28, (4, 15))),
    version!(7, [6, 22, 38],
        ecb!(20, (2, 78)), ecb!(18, (4, 31)),
        ecb!(18, (2, 14), (4, 15)), ecb!(26, (4, 13), (1, 14))),
    version!(8, [6, 24, 42],
        ecb!(24, (2, 97)), ecb!(22, (2, 38), (2, 39)),
        ecb!(22, (4, 18), (2, 19)), ecb!(26, (4, 14), (2, 15))),
    version!(9, [6, 26, 46],
        ecb!(30, (2, 116)), ecb!(22, (3, 36), (2, 37)),
        ecb!(20, (4, 16), (4, 17)), ecb!(24, (4, 12), (4, 13))),
    version!(10, [6, 28, 50],
        ecb!(18, (2, 68), (2, 69)), ecb!(26, (4, 43), (1, 44)),
        ecb!(24, (6, 19), (2, 20)), ecb!(28, (6, 15), (2, 16))),
    version!(11, [6, 30, 54],
        ecb!(20, (4, 81)), ecb!(30, (1, 50), (4, 51)),
        ecb!(28, (4, 22), (4, 23)), ecb!(24, (3, 12), (8, 13))),
    version!(12, [6, 32, 58],
        ecb!(24, (2, 92), (2, 93)), ecb!(22, (6, 36), (2, 37)),
        ecb!(26, (4, 20), (6, 21)), ecb!(28, (7, 14), (4, 15))),
    version!(13, [6, 34, 62],
        ecb!(26, (4, 107)), ecb!(22, (8, 37), (1, 38)),
        ecb!(24, (8, 20), (4, 21)), ecb!(22, (12, 11), (4, 12))),
    version!(14, [6, 26, 46, 66],
        ecb!(30, (3, 115), (1, 116)), ecb!(24, (4, 40), (5, 41)),
        ecb!(20, (11, 16), (5, 17)), ecb!(24, (11, 12), (5, 13))),
    version!(15, [6, 26, 48, 70],
        ecb!(22, (5, 87), (1, 88)), ecb!(24, (5, 41), (5, 42)),
        ecb!(30, (5, 24), (7, 25)), ecb!(24, (11, 12), (7, 13))),
    version!(16, [6, 26, 50, 74],
        ecb!(24, (5, 98), (1, 99)), ecb!(28, (7, 45), (3, 46)),
        ecb!(24, (15, 19), (2, 20)), ecb!(30, (3, 15), (13, 16))),
    version!(17, [6, 30, 54, 78],
        ecb!(28, (1, 107), (5, 108)), ecb!(28, (10, 46), (1, 47)),
        ecb!(28, (1, 22), (15, 23)), ecb!(28, (2, 14), (17, 15))),
    version!(18, [6, 30, 56, 82],
        ecb!(30, (5, 120), (1, 121)), ecb!(26, (9, 43), (4, 44)),
        ecb!(28, (17, 22), (1, 23)), ecb!(28, (2, 14), (19, 15))),
    version!(19, [6, 30, 58, 86],
        ecb!(28, (3, 113), (4, 114)), ecb!(26, (3, 44), (11, 45)),
        ecb!(26, (17, 21), (4, 22)), ecb!(26, (9, 13), (16, 14))),
    version!(20, [6, 34, 62, 90],
        ecb!(28, (3, 107), (5, 108)), ecb!(26, (3, 41), (13, 42)),
        ecb!(30, (15, 24), (5, 25)), ecb!(28, (15, 15), (10, 16))),
    version!(21, [6, 28, 50, 72, 94],
        ecb!(28, (4, 116), (4, 117)), ecb!(26, (17, 42)),
        ecb!(28, (17, 22), (6, 23)), ecb!(30, (19, 16), (6, 17))),
    version!(22, [6, 26, 50, 74, 98],
        ecb!(28, (2, 111), (7, 112)), ecb!(28, (17, 46)),
        ecb!(30, (7, 24), (16, 25)), ecb!(24, (34, 13))),
    version!(23, [6, 30, 54, 78, 102],
        ecb!(30, (4, 121), (5, 122)), ecb!(28, (4, 47), (14, 48)),
        ecb!(30, (11, 24), (14, 25)), ecb!(30, (16, 15), (14, 16))),
    version!(24, [6, 28, 54, 80, 106],
        ecb!(30, (6, 117), (4, 118)), ecb!(28, (6, 45), (14, 46)),
        ecb!(30, (11, 24), (16, 25)), ecb!(30, (30, 16), (2, 17))),
    version!(25, [6, 32, 58, 84, 110],
        ecb!(26, (8, 106), (4, 107)), ecb!(28, (8, 47), (13, 48)),
        ecb!(30, (7, 24), (22, 25)), ecb!(30, (22, 15), (13, 16))),
    version!(26, [6, 30, 58, 86, 114],
        ecb!(28, (10, 114), (2, 115)), ecb!(28, (19, 46), (4, 47)),
        ecb!(28, (28, 22), (6, 23)), ecb!(30, (33, 16), (4, 17))),
    version!(27, [6, 34, 62, 90, 118],
        ecb!(30, (8, 122), (4, 123)), ecb!(28, (22, 45), (3, 46)),
        ecb!(30, (8, 23), (26, 24)), ecb!(30, (12, 15), (28, 16))),
    version!(28, [6, 26, 50, 74, 98, 122],
        ecb!(30, (3, 117), (10, 118)), ecb!(28, (3, 45), (23, 46)),
        ecb!(30, (4, 24), (31, 25)), ecb!(30, (11, 15), (31, 16))),
    version!(29, [6, 30, 54, 78, 102, 126],
        ecb!(30, (7, 116), (7, 117)), ecb!(28, (21, 45), (7, 46)),
        ecb!(30, (1, 23), (37, 24)), ecb!(30, (19, 15), (26, 16))),
    version!(30, [6, 26, 52, 78, 104, 130],
        ecb!(30, (5, 115), (10, 116)), ecb!(28, (19, 47), (10, 48)),
        ecb!(30, (15, 24), (25, 25)), ecb!(30, (23, 15), (25, 16))),
    version!(31, [6, 30, 56, 82, 108, 134],
        ecb!(30, (13, 115), (3, 116)), ecb!(28, (2, 46), (29, 47)),
        ecb!(30, (42, 24), (1, 25)), ecb!(30, (23, 15), (28, 16))),
    version!(32, [6, 34, 60, 86, 112, 138],
        ecb!(30, (17, 115)), ecb!(28, (10, 46), (23, 47)),
        ecb!(30, (10, 24), (35, 25)), ecb!(30, (19, 15), (35, 16))),
    version!(33, [6, 30, 58, 86, 114, 142],
        ecb!(30, (17, 115), (1, 116)), ecb!(28, (14, 46), (21, 47)),
        ecb!(30, (29, 24), (19, 25)), ecb!(30, (11, 15), (46, 16))),
    version!(34, [6, 34, 62, 90, 118, 146],
        ecb!(30, (13, 115), (6, 116)), ecb!(28, (14, 46), (23, 47)),
        ecb!(30, (44, 24), (7, 25)), ecb!(30, (59, 16), (1, 17))),
    version!(35, [6, 30, 54, 78, 102, 126, 150],
        ecb!(30, (12, 121), (7, 122)), ecb!(28, (12, 47), (26, 48)),
        ecb!(30, (39, 24), (14, 25)), ecb!(30, (22, 15), (41, 16))),
    version!(36, [6, 24, 50, 76, 102, 128, 154],
        ecb!(30, (6, 121), (14, 122)), ecb!(28, (6, 47), (34, 48)),
        ecb!(30, (46, 24), (10, 25)), ecb!(30, (2, 15), (64, 16))),
    version!(37, [6, 28, 54, 80, 106, 132, 158],
        ecb!(30, (17, 122), (4, 123)), ecb!(28, (29, 46), (14, 47)),
        ecb!(30, (49, 24), (10, 25)), ecb!(30, (24, 15), (46, 16))),
    version!(38, [6, 32, 58, 84, 110, 136, 162],
        ecb!(30, (4, 122), (18, 123)), ecb!(28, (13, 46), (32, 47)),
        ecb!(30, (48, 24), (14, 25)), ecb!(30, (42, 15), (32, 16))),
    version!(39, [6, 26, 54, 82, 110, 138, 166],
        ecb!(30, (20, 117), (4, 118)), ecb!(28, (40, 47), (7, 48)),
        ecb!(30, (43, 24), (22, 25)), ecb!(30, (10, 15), (67, 16))),
    version!(40, [6, 30, 58, 86, 114, 142, 170],
        ecb!(30, (19, 118), (6, 119)), ecb!(28, (18, 47), (31, 48)),
        ecb!(30, (34, 24), (34, 25)), ecb!(30, (20, 15), (61, 16))),
];

#[cfg(test)]
mod version_tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 21)]
    #[test_case(7, 45)]
    #[test_case(40, 177)]
    fn test_dimension(number: usize, dim: usize) {
        let v = Version::get(number).unwrap();
        assert_eq!(v.dimension(), dim);
        assert_eq!(Version::from_dimension(dim).unwrap().number, number);
    }

    #[test]
    fn test_invalid_lookups() {
        assert!(Version::get(0).is_err());
        assert!(Version::get(41).is_err());
        assert!(Version::from_dimension(20).is_err());
        assert!(Version::from_dimension(181).is_err());
    }

    #[test_case(1, EcLevel::L, 19, 7, 1)]
    #[test_case(1, EcLevel::H, 9, 17, 1)]
    #[test_case(5, EcLevel::Q, 62, 18, 4)]
    #[test_case(10, EcLevel::M, 216, 26, 5)]
    #[test_case(40, EcLevel::H, 1276, 30, 81)]
    fn test_ec_blocks(number: usize, level: EcLevel, data: usize, ec_per_block: usize, blocks: usize) {
        let ecb = Version::get(number).unwrap().ec_blocks(level);
        assert_eq!(ecb.total_data_codewords(), data);
        assert_eq!(ecb.ec_codewords_per_block, ec_per_block);
        assert_eq!(ecb.num_blocks(), blocks);
    }

    #[test]
    fn test_total_codewords_consistent_across_levels() {
        for v in VERSIONS.iter() {
            let total = v.total_codewords();
            for level in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
                let ecb = v.ec_blocks(level);
                assert_eq!(
                    ecb.total_data_codewords() + ecb.total_ec_codewords(),
                    total,
                    "version {}",
                    v.number
                );
            }
        }
    }

    #[test]
    fn test_version_info_bits() {
        // Reference value from the symbology's published example.
        assert_eq!(version_info_bits(7), 0x07C94);
        let v = Version::from_version_info(0x07C94).unwrap();
        assert_eq!(v.number, 7);
        // Three flipped bits still resolve.
        let v = Version::from_version_info(0x07C94 ^ 0b1011).unwrap();
        assert_eq!(v.number, 7);
    }

    #[test]
    fn test_char_count_bits() {
        assert_eq!(Mode::Numeric.char_count_bits(1), 10);
        assert_eq!(Mode::Byte.char_count_bits(9), 8);
        assert_eq!(Mode::Byte.char_count_bits(10), 16);
        assert_eq!(Mode::Kanji.char_count_bits(40), 12);
        assert_eq!(Mode::Alphanumeric.char_count_bits(27), 13);
    }
}
