use encoding_rs::SHIFT_JIS;

use crate::bits::{BitMatrix, BitStream};
use crate::ec::rs_compute_ec;
use crate::error::{ScanError, ScanResult};
use crate::qr::matrix::{build_symbol, choose_mask};
use crate::qr::version::{
    EcLevel, Mode, Version, ALPHANUMERIC_CHARSET, MODE_ECI, MODE_STRUCTURED_APPEND,
};

// Encode options
//------------------------------------------------------------------------------

/// Structured append header: this symbol's place in a multi-symbol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredAppend {
    pub index: u8,
    pub total: u8,
    /// XOR of all bytes of the complete message.
    pub parity: u8,
}

#[derive(Debug, Clone, Default)]
pub struct QrOptions {
    pub level: Option<EcLevel>,
    /// Force a version; otherwise the smallest fitting one is used.
    pub version: Option<usize>,
    /// Force a mask; otherwise all eight are scored.
    pub mask: Option<u8>,
    pub structured_append: Option<StructuredAppend>,
}

/// A drawn symbol plus the parameters it was drawn with.
#[derive(Debug, Clone)]
pub struct EncodedQr {
    pub matrix: BitMatrix,
    pub version: usize,
    pub level: EcLevel,
    pub mask: u8,
}

// Mode and charset selection
//------------------------------------------------------------------------------

const ECI_UTF8: u16 = 26;

fn is_double_byte_kanji(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let (encoded, _, unmappable) = SHIFT_JIS.encode(text);
    if unmappable || encoded.len() % 2 != 0 {
        return false;
    }
    encoded.chunks(2).all(|pair| {
        let hi = pair[0];
        (0x81..=0x9F).contains(&hi) || (0xE0..=0xEB).contains(&hi)
    })
}

/// Narrowest mode that can carry the whole text.
fn choose_mode(text: &str) -> Mode {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return Mode::Numeric;
    }
    if !text.is_empty() && text.bytes().all(|b| ALPHANUMERIC_CHARSET.contains(&b)) {
        return Mode::Alphanumeric;
    }
    if is_double_byte_kanji(text) {
        return Mode::Kanji;
    }
    Mode::Byte
}

/// Byte-mode payload and the ECI needed for it, if any. Text that fits in
/// Latin-1 travels without an ECI.
fn byte_payload(text: &str) -> (Vec<u8>, Option<u16>) {
    if text.chars().all(|c| (c as u32) < 256) {
        (text.chars().map(|c| c as u8).collect(), None)
    } else {
        (text.as_bytes().to_vec(), Some(ECI_UTF8))
    }
}

// Bitstream assembly
//------------------------------------------------------------------------------

fn push_header_and_payload(
    bits: &mut BitStream,
    mode: Mode,
    version: usize,
    text: &str,
    payload: &[u8],
    eci: Option<u16>,
    sa: Option<StructuredAppend>,
) -> ScanResult<()> {
    if let Some(sa) = sa {
        if sa.total == 0 || sa.total > 16 || sa.index >= sa.total {
            return Err(ScanError::Format);
        }
        bits.push_bits(MODE_STRUCTURED_APPEND, 4);
        bits.push_bits(sa.index as u16, 4);
        bits.push_bits((sa.total - 1) as u16, 4);
        bits.push_bits(sa.parity as u16, 8);
    }
    if let Some(eci) = eci {
        debug_assert!(eci < 128, "Single-byte ECI designators only: {eci}");

        bits.push_bits(MODE_ECI, 4);
        bits.push_bits(eci, 8);
    }

    bits.push_bits(mode.indicator() as u16, 4);
    let count = match mode {
        Mode::Byte => payload.len(),
        Mode::Kanji => {
            let (encoded, _, _) = SHIFT_JIS.encode(text);
            encoded.len() / 2
        }
        _ => text.len(),
    };
    bits.push_bits(count as u32, mode.char_count_bits(version));

    match mode {
        Mode::Numeric => {
            for chunk in text.as_bytes().chunks(3) {
                let val: u16 = chunk.iter().fold(0, |acc, b| acc * 10 + (b - b'0') as u16);
                bits.push_bits(val, 1 + 3 * chunk.len());
            }
        }
        Mode::Alphanumeric => {
            let index = |b: u8| {
                ALPHANUMERIC_CHARSET.iter().position(|&c| c == b).unwrap_or(0) as u16
            };
            for pair in text.as_bytes().chunks(2) {
                if pair.len() == 2 {
                    bits.push_bits(index(pair[0]) * 45 + index(pair[1]), 11);
                } else {
                    bits.push_bits(index(pair[0]), 6);
                }
            }
        }
        Mode::Byte => {
            for &b in payload {
                bits.push_bits(b, 8);
            }
        }
        Mode::Kanji => {
            let (encoded, _, _) = SHIFT_JIS.encode(text);
            for pair in encoded.chunks(2) {
                let word = ((pair[0] as u16) << 8) | pair[1] as u16;
                let offset = if word < 0xA000 { 0x8140 } else { 0xC140 };
                let diff = word - offset;
                bits.push_bits((diff >> 8) * 0xC0 + (diff & 0xFF), 13);
            }
        }
    }
    Ok(())
}

const PAD_CODEWORDS: [u8; 2] = [0xEC, 0x11];

fn push_terminator_and_pad(bits: &mut BitStream, data_capacity_bytes: usize) -> ScanResult<()> {
    let capacity_bits = data_capacity_bytes * 8;
    if bits.len() > capacity_bits {
        return Err(ScanError::DataTooLong);
    }
    let terminator = (capacity_bits - bits.len()).min(4);
    bits.push_bits(0u8, terminator);
    if bits.len() % 8 != 0 {
        bits.push_bits(0u8, 8 - bits.len() % 8);
    }
    let mut pad = 0;
    while bits.len() < capacity_bits {
        bits.push_bits(PAD_CODEWORDS[pad], 8);
        pad ^= 1;
    }
    Ok(())
}

// Block interleaving
//------------------------------------------------------------------------------

/// Splits data codewords into EC blocks, appends parity per block, and
/// interleaves both halves column-wise.
fn interleave(data: &[u8], version: &Version, level: EcLevel) -> Vec<u8> {
    let ecb = version.ec_blocks(level);
    let ec_len = ecb.ec_codewords_per_block;

    let mut blocks: Vec<(&[u8], Vec<u8>)> = Vec::with_capacity(ecb.num_blocks());
    let mut offset = 0;
    for run in &ecb.runs {
        for _ in 0..run.count {
            let chunk = &data[offset..offset + run.data_codewords];
            offset += run.data_codewords;
            blocks.push((chunk, rs_compute_ec(chunk, ec_len)));
        }
    }
    debug_assert_eq!(offset, data.len(), "Data codewords not fully consumed");

    let max_data = blocks.iter().map(|(d, _)| d.len()).max().unwrap_or(0);
    let mut out = Vec::with_capacity(version.total_codewords());
    for i in 0..max_data {
        for (d, _) in &blocks {
            if let Some(&b) = d.get(i) {
                out.push(b);
            }
        }
    }
    for i in 0..ec_len {
        for (_, e) in &blocks {
            out.push(e[i]);
        }
    }
    out
}

// Encoder
//------------------------------------------------------------------------------

fn header_overhead_bits(sa: Option<StructuredAppend>, eci: Option<u16>) -> usize {
    (if sa.is_some() { 20 } else { 0 }) + (if eci.is_some() { 12 } else { 0 })
}

fn payload_bits(mode: Mode, text: &str, payload: &[u8]) -> usize {
    match mode {
        Mode::Numeric => {
            let n = text.len();
            (n / 3) * 10 + [0, 4, 7][n % 3]
        }
        Mode::Alphanumeric => {
            let n = text.len();
            (n / 2) * 11 + (n % 2) * 6
        }
        Mode::Byte => payload.len() * 8,
        Mode::Kanji => {
            let (encoded, _, _) = SHIFT_JIS.encode(text);
            (encoded.len() / 2) * 13
        }
    }
}

/// Encodes `text` into a complete symbol. Level defaults to M, version and
/// mask are chosen automatically unless forced.
pub fn encode_qr(text: &str, opts: &QrOptions) -> ScanResult<EncodedQr> {
    if text.is_empty() {
        return Err(ScanError::EmptyData);
    }
    let level = opts.level.unwrap_or(EcLevel::M);
    let mode = choose_mode(text);
    let (payload, eci) = match mode {
        Mode::Byte => byte_payload(text),
        _ => (Vec::new(), None),
    };

    let fixed = header_overhead_bits(opts.structured_append, eci) + 4 + payload_bits(mode, text, &payload);
    let version = match opts.version {
        Some(n) => {
            let v = Version::get(n)?;
            let needed = fixed + mode.char_count_bits(n);
            if needed > v.ec_blocks(level).total_data_codewords() * 8 {
                return Err(ScanError::DataTooLong);
            }
            v
        }
        None => (1..=40)
            .map(Version::get)
            .filter_map(Result::ok)
            .find(|v| {
                fixed + mode.char_count_bits(v.number)
                    <= v.ec_blocks(level).total_data_codewords() * 8
            })
            .ok_or(ScanError::DataTooLong)?,
    };

    let mut bits = BitStream::new();
    push_header_and_payload(
        &mut bits,
        mode,
        version.number,
        text,
        &payload,
        eci,
        opts.structured_append,
    )?;
    push_terminator_and_pad(&mut bits, version.ec_blocks(level).total_data_codewords())?;

    let codewords = interleave(bits.data(), version, level);
    debug_assert_eq!(codewords.len(), version.total_codewords());

    let (mask, matrix) = match opts.mask {
        Some(m) => {
            if m > 7 {
                return Err(ScanError::InvalidMask);
            }
            (m, build_symbol(version, level, m, &codewords))
        }
        None => choose_mask(version, level, &codewords),
    };
    Ok(EncodedQr { matrix, version: version.number, level, mask })
}

/// Message parity for structured append: XOR over the original data bytes.
pub fn structured_append_parity(message: &str) -> u8 {
    message.bytes().fold(0, |acc, b| acc ^ b)
}

#[cfg(test)]
mod encoder_tests {
    use super::*;
    use test_case::test_case;

    #[test_case("012345", Mode::Numeric)]
    #[test_case("HELLO WORLD $1", Mode::Alphanumeric)]
    #[test_case("hello", Mode::Byte)]
    #[test_case("茗荷", Mode::Kanji)]
    #[test_case("HELLOx", Mode::Byte)]
    fn test_choose_mode(text: &str, mode: Mode) {
        assert_eq!(choose_mode(text), mode);
    }

    #[test]
    fn test_numeric_bitstream() {
        let mut bits = BitStream::new();
        push_header_and_payload(&mut bits, Mode::Numeric, 1, "01234567", &[], None, None)
            .unwrap();
        // Mode 0001, count 8 in 10 bits, then 012/345/67.
        assert_eq!(bits.take_bits(4).unwrap(), 0b0001);
        assert_eq!(bits.take_bits(10).unwrap(), 8);
        assert_eq!(bits.take_bits(10).unwrap(), 12);
        assert_eq!(bits.take_bits(10).unwrap(), 345);
        assert_eq!(bits.take_bits(7).unwrap(), 67);
    }

    #[test]
    fn test_alphanumeric_bitstream() {
        let mut bits = BitStream::new();
        push_header_and_payload(&mut bits, Mode::Alphanumeric, 1, "AC-42", &[], None, None)
            .unwrap();
        assert_eq!(bits.take_bits(4).unwrap(), 0b0010);
        assert_eq!(bits.take_bits(9).unwrap(), 5);
        // A=10, C=12 -> 10*45+12.
        assert_eq!(bits.take_bits(11).unwrap(), 462);
        // '-'=41, '4'=4.
        assert_eq!(bits.take_bits(11).unwrap(), 41 * 45 + 4);
        assert_eq!(bits.take_bits(6).unwrap(), 2);
    }

    #[test]
    fn test_padding_alternates() {
        let mut bits = BitStream::new();
        push_header_and_payload(&mut bits, Mode::Byte, 1, "a", b"a", None, None).unwrap();
        push_terminator_and_pad(&mut bits, 19).unwrap();
        assert_eq!(bits.len(), 19 * 8);
        let data = bits.data();
        assert_eq!(data[data.len() - 2], 0xEC);
        assert_eq!(data[data.len() - 1], 0x11);
    }

    #[test]
    fn test_version_selection_grows() {
        let short = encode_qr("HI", &QrOptions::default()).unwrap();
        assert_eq!(short.version, 1);
        let long = encode_qr(&"A".repeat(200), &QrOptions::default()).unwrap();
        assert!(long.version > 1);
    }

    #[test]
    fn test_forced_version_too_small() {
        let opts = QrOptions { version: Some(1), ..Default::default() };
        assert!(matches!(
            encode_qr(&"X".repeat(100), &opts),
            Err(ScanError::DataTooLong)
        ));
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(matches!(encode_qr("", &QrOptions::default()), Err(ScanError::EmptyData)));
    }

    #[test]
    fn test_interleave_v5() {
        // Version 5 level Q has four blocks of 15, 15, 16, 16 data codewords.
        let v = Version::get(5).unwrap();
        let data: Vec<u8> = (0..62u8).collect();
        let out = interleave(&data, v, EcLevel::Q);
        assert_eq!(out.len(), v.total_codewords());
        // First cycle picks the first codeword of each block.
        assert_eq!(&out[..4], &[0, 15, 30, 46]);
        // Codeword 16 of the last two blocks arrives after the short blocks
        // are exhausted.
        assert_eq!(&out[60..62], &[45, 61]);
    }

    #[test]
    fn test_structured_append_parity() {
        assert_eq!(structured_append_parity(""), 0);
        assert_eq!(structured_append_parity("AB"), b'A' ^ b'B');
    }
}
