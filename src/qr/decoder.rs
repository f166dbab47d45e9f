use encoding_rs::{Encoding, ISO_8859_15, SHIFT_JIS, UTF_8, WINDOWS_1252};

use crate::bits::{BitMatrix, BitStream};
use crate::ec::rs_correct;
use crate::error::{ScanError, ScanResult};
use crate::qr::format::FormatInfo;
use crate::qr::matrix::read_codewords;
use crate::qr::version::{
    EcLevel, Mode, Version, ALPHANUMERIC_CHARSET, MODE_ECI, MODE_FNC1_FIRST, MODE_FNC1_SECOND,
    MODE_STRUCTURED_APPEND, MODE_TERMINATOR,
};

// Decoded symbol contents
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct QrContents {
    pub text: String,
    pub raw_bytes: Vec<u8>,
    pub ec_level: EcLevel,
    pub mask: u8,
    pub version: usize,
    pub mirrored: bool,
    pub structured_append: Option<(u8, u8, u8)>,
    pub errors_corrected: usize,
}

// Matrix parsing
//------------------------------------------------------------------------------

#[inline]
fn bit(matrix: &BitMatrix, x: usize, y: usize, mirrored: bool) -> u32 {
    let v = if mirrored { matrix.get(y, x) } else { matrix.get(x, y) };
    v as u32
}

fn read_format_info(matrix: &BitMatrix, mirrored: bool) -> ScanResult<FormatInfo> {
    let dim = matrix.width();

    // First copy hugs the top-left finder.
    let mut raw1 = 0u32;
    for i in 0..6 {
        raw1 = (raw1 << 1) | bit(matrix, i, 8, mirrored);
    }
    raw1 = (raw1 << 1) | bit(matrix, 7, 8, mirrored);
    raw1 = (raw1 << 1) | bit(matrix, 8, 8, mirrored);
    raw1 = (raw1 << 1) | bit(matrix, 8, 7, mirrored);
    for i in (0..6).rev() {
        raw1 = (raw1 << 1) | bit(matrix, 8, i, mirrored);
    }

    // Second copy is split between the other two finders.
    let mut raw2 = 0u32;
    for i in (dim - 7..dim).rev() {
        raw2 = (raw2 << 1) | bit(matrix, 8, i, mirrored);
    }
    for i in dim - 8..dim {
        raw2 = (raw2 << 1) | bit(matrix, i, 8, mirrored);
    }
    FormatInfo::decode(raw1, raw2)
}

fn read_version<'a>(matrix: &BitMatrix, mirrored: bool) -> ScanResult<&'a Version> {
    let dim = matrix.width();
    let provisional = (dim - 17) / 4;
    if provisional <= 6 {
        return Version::from_dimension(dim);
    }

    // Top-right info block, then the bottom-left copy if it disagrees. The
    // low bit sits nearest the corner in both copies.
    let mut raw = 0u32;
    for y in 0..6 {
        for (k, x) in (dim - 11..dim - 8).enumerate() {
            raw |= bit(matrix, x, y, mirrored) << (3 * y + k);
        }
    }
    if let Ok(v) = Version::from_version_info(raw) {
        if v.dimension() == dim {
            return Ok(v);
        }
    }

    let mut raw = 0u32;
    for x in 0..6 {
        for (k, y) in (dim - 11..dim - 8).enumerate() {
            raw |= bit(matrix, x, y, mirrored) << (3 * x + k);
        }
    }
    if let Ok(v) = Version::from_version_info(raw) {
        if v.dimension() == dim {
            return Ok(v);
        }
    }
    Err(ScanError::Format)
}

// Error correction
//------------------------------------------------------------------------------

/// Undoes codeword interleaving, corrects each block, and returns the data
/// bytes in stream order plus the number of errors fixed.
fn correct_blocks(raw: &[u8], version: &Version, level: EcLevel) -> ScanResult<(Vec<u8>, usize)> {
    let ecb = version.ec_blocks(level);
    if raw.len() != version.total_codewords() {
        return Err(ScanError::Format);
    }
    let ec_len = ecb.ec_codewords_per_block;

    let mut data_lens = Vec::with_capacity(ecb.num_blocks());
    for run in &ecb.runs {
        for _ in 0..run.count {
            data_lens.push(run.data_codewords);
        }
    }
    let max_data = data_lens.iter().copied().max().unwrap_or(0);

    let mut blocks: Vec<Vec<u8>> = data_lens.iter().map(|&l| Vec::with_capacity(l + ec_len)).collect();
    let mut cursor = raw.iter();
    for i in 0..max_data {
        for (block, &len) in blocks.iter_mut().zip(&data_lens) {
            if i < len {
                block.push(*cursor.next().ok_or(ScanError::Format)?);
            }
        }
    }
    for _ in 0..ec_len {
        for block in blocks.iter_mut() {
            block.push(*cursor.next().ok_or(ScanError::Format)?);
        }
    }

    let mut data = Vec::with_capacity(ecb.total_data_codewords());
    let mut errors = 0;
    for (block, &len) in blocks.iter_mut().zip(&data_lens) {
        errors += rs_correct(block, ec_len)?;
        data.extend_from_slice(&block[..len]);
    }
    Ok((data, errors))
}

// Bitstream parsing
//------------------------------------------------------------------------------

fn charset_for_eci(value: u32) -> ScanResult<&'static Encoding> {
    match value {
        1 | 3 => Ok(WINDOWS_1252),
        17 => Ok(ISO_8859_15),
        20 => Ok(SHIFT_JIS),
        26 => Ok(UTF_8),
        _ => Err(ScanError::Format),
    }
}

fn read_eci_value(bits: &mut BitStream) -> ScanResult<u32> {
    let first = bits.take_bits(8)? as u32;
    if first & 0x80 == 0 {
        Ok(first)
    } else if first & 0xC0 == 0x80 {
        Ok(((first & 0x3F) << 8) | bits.take_bits(8)? as u32)
    } else if first & 0xE0 == 0xC0 {
        Ok(((first & 0x1F) << 16) | bits.take_bits(16)? as u32)
    } else {
        Err(ScanError::Format)
    }
}

struct ParsedStream {
    text: String,
    structured_append: Option<(u8, u8, u8)>,
}

fn parse_bitstream(data: &[u8], version: usize, charset_hint: Option<&str>) -> ScanResult<ParsedStream> {
    let mut bits = BitStream::from_bytes(data);
    let mut text = String::new();
    let mut structured_append = None;
    let mut charset: Option<&'static Encoding> = match charset_hint {
        Some(label) => Encoding::for_label(label.as_bytes()),
        None => None,
    };
    let mut fnc1 = false;

    loop {
        let indicator = if bits.remaining() < 4 { MODE_TERMINATOR } else { bits.take_bits(4)? };
        match indicator {
            MODE_TERMINATOR => break,
            MODE_ECI => {
                charset = Some(charset_for_eci(read_eci_value(&mut bits)?)?);
            }
            MODE_FNC1_FIRST | MODE_FNC1_SECOND => {
                fnc1 = true;
                if indicator == MODE_FNC1_SECOND {
                    // Application indicator byte, not part of the content.
                    bits.take_bits(8)?;
                }
            }
            MODE_STRUCTURED_APPEND => {
                if bits.remaining() < 16 {
                    return Err(ScanError::Format);
                }
                let index = bits.take_bits(4)? as u8;
                let total = bits.take_bits(4)? as u8 + 1;
                let parity = bits.take_bits(8)? as u8;
                structured_append = Some((index, total, parity));
            }
            0b0001 => decode_numeric(&mut bits, version, &mut text)?,
            0b0010 => decode_alphanumeric(&mut bits, version, fnc1, &mut text)?,
            0b0100 => decode_byte(&mut bits, version, charset, &mut text)?,
            0b1000 => decode_kanji(&mut bits, version, &mut text)?,
            _ => return Err(ScanError::Format),
        }
    }
    Ok(ParsedStream { text, structured_append })
}

fn decode_numeric(bits: &mut BitStream, version: usize, out: &mut String) -> ScanResult<()> {
    let mut count = bits.take_bits(Mode::Numeric.char_count_bits(version))? as usize;
    while count >= 3 {
        let v = bits.take_bits(10)?;
        if v >= 1000 {
            return Err(ScanError::Format);
        }
        out.push((b'0' + (v / 100) as u8) as char);
        out.push((b'0' + (v / 10 % 10) as u8) as char);
        out.push((b'0' + (v % 10) as u8) as char);
        count -= 3;
    }
    if count == 2 {
        let v = bits.take_bits(7)?;
        if v >= 100 {
            return Err(ScanError::Format);
        }
        out.push((b'0' + (v / 10) as u8) as char);
        out.push((b'0' + (v % 10) as u8) as char);
    } else if count == 1 {
        let v = bits.take_bits(4)?;
        if v >= 10 {
            return Err(ScanError::Format);
        }
        out.push((b'0' + v as u8) as char);
    }
    Ok(())
}

fn decode_alphanumeric(
    bits: &mut BitStream,
    version: usize,
    fnc1: bool,
    out: &mut String,
) -> ScanResult<()> {
    let mut count = bits.take_bits(Mode::Alphanumeric.char_count_bits(version))? as usize;
    let start = out.len();
    while count >= 2 {
        let v = bits.take_bits(11)?;
        if v >= 45 * 45 {
            return Err(ScanError::Format);
        }
        out.push(ALPHANUMERIC_CHARSET[(v / 45) as usize] as char);
        out.push(ALPHANUMERIC_CHARSET[(v % 45) as usize] as char);
        count -= 2;
    }
    if count == 1 {
        let v = bits.take_bits(6)?;
        if v >= 45 {
            return Err(ScanError::Format);
        }
        out.push(ALPHANUMERIC_CHARSET[v as usize] as char);
    }
    if fnc1 {
        // "%%" is a literal percent; a lone "%" is the field separator.
        let decoded: String = out[start..].to_string();
        out.truncate(start);
        let mut chars = decoded.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' {
                if chars.peek() == Some(&'%') {
                    chars.next();
                    out.push('%');
                } else {
                    out.push('\u{1D}');
                }
            } else {
                out.push(c);
            }
        }
    }
    Ok(())
}

fn decode_byte(
    bits: &mut BitStream,
    version: usize,
    charset: Option<&'static Encoding>,
    out: &mut String,
) -> ScanResult<()> {
    let count = bits.take_bits(Mode::Byte.char_count_bits(version))? as usize;
    if bits.remaining() < count * 8 {
        return Err(ScanError::Format);
    }
    let mut bytes = Vec::with_capacity(count);
    for _ in 0..count {
        bytes.push(bits.take_byte()?);
    }
    match charset {
        Some(enc) => {
            let (decoded, _, _) = enc.decode(&bytes);
            out.push_str(&decoded);
        }
        // No ECI: take valid UTF-8 at face value, otherwise read as Latin-1.
        None => match std::str::from_utf8(&bytes) {
            Ok(s) => out.push_str(s),
            Err(_) => out.extend(bytes.iter().map(|&b| b as char)),
        },
    }
    Ok(())
}

fn decode_kanji(bits: &mut BitStream, version: usize, out: &mut String) -> ScanResult<()> {
    let count = bits.take_bits(Mode::Kanji.char_count_bits(version))? as usize;
    let mut sjis = Vec::with_capacity(count * 2);
    for _ in 0..count {
        let v = bits.take_bits(13)? as u16;
        let assembled = ((v / 0xC0) << 8) | (v % 0xC0);
        let word = if assembled < 0x1F00 { assembled + 0x8140 } else { assembled + 0xC140 };
        sjis.push((word >> 8) as u8);
        sjis.push((word & 0xFF) as u8);
    }
    let (decoded, _, had_errors) = SHIFT_JIS.decode(&sjis);
    if had_errors {
        return Err(ScanError::Format);
    }
    out.push_str(&decoded);
    Ok(())
}

// Decoder
//------------------------------------------------------------------------------

fn decode_oriented(
    matrix: &BitMatrix,
    mirrored: bool,
    charset_hint: Option<&str>,
) -> ScanResult<QrContents> {
    let version = read_version(matrix, mirrored)?;
    let format = read_format_info(matrix, mirrored)?;
    let raw = read_codewords(matrix, version, format.mask, mirrored);
    let (data, errors_corrected) = correct_blocks(&raw, version, format.ec_level)?;
    let parsed = parse_bitstream(&data, version.number, charset_hint)?;
    Ok(QrContents {
        text: parsed.text,
        raw_bytes: data,
        ec_level: format.ec_level,
        mask: format.mask,
        version: version.number,
        mirrored,
        structured_append: parsed.structured_append,
        errors_corrected,
    })
}

/// Decodes a sampled module grid. A failed pass is retried mirrored, for
/// symbols scanned through the back of a transparent surface.
pub fn decode_matrix(matrix: &BitMatrix, charset_hint: Option<&str>) -> ScanResult<QrContents> {
    if matrix.width() != matrix.height() {
        return Err(ScanError::Format);
    }
    match decode_oriented(matrix, false, charset_hint) {
        Ok(contents) => Ok(contents),
        Err(first_err) => match decode_oriented(matrix, true, charset_hint) {
            Ok(contents) => Ok(contents),
            Err(_) => Err(first_err),
        },
    }
}

#[cfg(test)]
mod decoder_tests {
    use super::*;
    use crate::qr::encoder::{encode_qr, EncodedQr, QrOptions, StructuredAppend};

    fn encode(text: &str) -> EncodedQr {
        encode_qr(text, &QrOptions::default()).unwrap()
    }

    #[test]
    fn test_roundtrip_numeric() {
        let sym = encode("31415926535897932384");
        let contents = decode_matrix(&sym.matrix, None).unwrap();
        assert_eq!(contents.text, "31415926535897932384");
        assert_eq!(contents.version, sym.version);
        assert_eq!(contents.mask, sym.mask);
        assert!(!contents.mirrored);
    }

    #[test]
    fn test_roundtrip_alphanumeric_and_byte() {
        for text in ["HELLO WORLD", "mixed Case 123!", "ünïcödé"] {
            let sym = encode(text);
            assert_eq!(decode_matrix(&sym.matrix, None).unwrap().text, text);
        }
    }

    #[test]
    fn test_roundtrip_kanji() {
        let sym = encode("点茗");
        assert_eq!(decode_matrix(&sym.matrix, None).unwrap().text, "点茗");
    }

    #[test]
    fn test_roundtrip_utf8_eci() {
        let text = "Привет мир";
        let sym = encode(text);
        assert_eq!(decode_matrix(&sym.matrix, None).unwrap().text, text);
    }

    #[test]
    fn test_mirrored_symbol_decodes() {
        let sym = encode("MIRROR TEST 42");
        let dim = sym.matrix.width();
        let mut transposed = BitMatrix::square(dim);
        for y in 0..dim {
            for x in 0..dim {
                if sym.matrix.get(x, y) {
                    transposed.set(y, x);
                }
            }
        }
        let contents = decode_matrix(&transposed, None).unwrap();
        assert_eq!(contents.text, "MIRROR TEST 42");
        assert!(contents.mirrored);
    }

    #[test]
    fn test_corrects_damaged_modules() {
        let sym = encode("DAMAGE TOLERANCE");
        let mut matrix = sym.matrix.clone();
        // Flip a handful of data-region modules.
        for (x, y) in [(12, 12), (13, 12), (12, 13), (14, 15)] {
            matrix.flip(x, y);
        }
        let contents = decode_matrix(&matrix, None).unwrap();
        assert_eq!(contents.text, "DAMAGE TOLERANCE");
        assert!(contents.errors_corrected > 0);
    }

    #[test]
    fn test_structured_append_header_surfaces() {
        let opts = QrOptions {
            structured_append: Some(StructuredAppend { index: 1, total: 3, parity: 77 }),
            ..Default::default()
        };
        let sym = encode_qr("PART TWO", &opts).unwrap();
        let contents = decode_matrix(&sym.matrix, None).unwrap();
        assert_eq!(contents.structured_append, Some((1, 3, 77)));
        assert_eq!(contents.text, "PART TWO");
    }

    #[test]
    fn test_blank_matrix_rejected() {
        let blank = BitMatrix::square(21);
        assert!(decode_matrix(&blank, None).is_err());
    }
}
