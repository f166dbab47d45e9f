//! Decodes the bit stream assembled from RSS Expanded pairs into a GS1
//! element string, e.g. "(01)98898765432106(3202)012345".

use super::expanded::ExpandedPair;
use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};

// Bit assembly
//------------------------------------------------------------------------------

/// Concatenates the data characters into one bit array, 12 bits per
/// character, skipping the check character.
pub fn build_bit_array(pairs: &[ExpandedPair]) -> BitArray {
    let mut char_number = pairs.len() * 2 - 1;
    if pairs.last().map_or(false, |p| p.right_char.is_none()) {
        char_number -= 1;
    }
    let mut binary = BitArray::new(12 * char_number);
    let mut acc_pos = 0;

    if let Some(right) = &pairs[0].right_char {
        push_char_bits(&mut binary, &mut acc_pos, right.value);
    }
    for pair in &pairs[1..] {
        push_char_bits(&mut binary, &mut acc_pos, pair.left_char.value);
        if let Some(right) = &pair.right_char {
            push_char_bits(&mut binary, &mut acc_pos, right.value);
        }
    }
    binary
}

fn push_char_bits(binary: &mut BitArray, acc_pos: &mut usize, value: u32) {
    for i in (0..12).rev() {
        if value & (1 << i) != 0 {
            binary.set(*acc_pos);
        }
        *acc_pos += 1;
    }
}

/// Reads `bits` bits at `pos` as a big-endian number. Bits past the end of
/// the array read as zero.
fn extract_numeric(information: &BitArray, pos: usize, bits: usize) -> u32 {
    let mut value = 0u32;
    for i in 0..bits {
        if pos + i < information.size() && information.get(pos + i) {
            value |= 1 << (bits - i - 1);
        }
    }
    value
}

// Encodation dispatch
//------------------------------------------------------------------------------

/// Decodes the assembled bit stream, dispatching on the encodation method
/// declared in the header bits.
pub fn parse_information(information: &BitArray) -> ScanResult<String> {
    if information.size() < 12 {
        return Err(ScanError::NotFound);
    }
    if information.get(1) {
        return decode_ai01_and_other_ais(information);
    }
    if !information.get(2) {
        return decode_any_ai(information);
    }
    match extract_numeric(information, 1, 4) {
        4 => return decode_ai013103(information),
        5 => return decode_ai01320x(information),
        _ => {}
    }
    match extract_numeric(information, 1, 5) {
        12 => return decode_ai01392x(information),
        13 => return decode_ai01393x(information),
        _ => {}
    }
    match extract_numeric(information, 1, 7) {
        56 => decode_ai013x0x1x(information, "310", "11"),
        57 => decode_ai013x0x1x(information, "320", "11"),
        58 => decode_ai013x0x1x(information, "310", "13"),
        59 => decode_ai013x0x1x(information, "320", "13"),
        60 => decode_ai013x0x1x(information, "310", "15"),
        61 => decode_ai013x0x1x(information, "320", "15"),
        62 => decode_ai013x0x1x(information, "310", "17"),
        63 => decode_ai013x0x1x(information, "320", "17"),
        _ => Err(ScanError::Format),
    }
}

// AI 01 (GTIN) encodation methods
//------------------------------------------------------------------------------

const GTIN_SIZE: usize = 40;

fn decode_ai01_and_other_ais(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 1 + 1 + 2;

    let mut buf = String::new();
    buf.push_str("(01)");
    let initial_gtin_position = buf.len();
    let first_gtin_digit = extract_numeric(information, HEADER_SIZE, 4);
    push_number(&mut buf, first_gtin_digit, 1);
    encode_compressed_gtin_digits(information, &mut buf, HEADER_SIZE + 4, initial_gtin_position);

    let mut decoder = GeneralAppIdDecoder::new(information);
    decoder.decode_all_codes(buf, HEADER_SIZE + 44)
}

fn decode_any_ai(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 2 + 1 + 2;
    let mut decoder = GeneralAppIdDecoder::new(information);
    decoder.decode_all_codes(String::new(), HEADER_SIZE)
}

fn decode_ai013103(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 4 + 1;
    const WEIGHT_SIZE: usize = 15;
    if information.size() != HEADER_SIZE + GTIN_SIZE + WEIGHT_SIZE {
        return Err(ScanError::NotFound);
    }
    let mut buf = String::new();
    encode_compressed_gtin(information, &mut buf, HEADER_SIZE);
    let weight = extract_numeric(information, HEADER_SIZE + GTIN_SIZE, WEIGHT_SIZE);
    buf.push_str("(3103)");
    push_number(&mut buf, weight, 6);
    Ok(buf)
}

fn decode_ai01320x(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 4 + 1;
    const WEIGHT_SIZE: usize = 15;
    if information.size() != HEADER_SIZE + GTIN_SIZE + WEIGHT_SIZE {
        return Err(ScanError::NotFound);
    }
    let mut buf = String::new();
    encode_compressed_gtin(information, &mut buf, HEADER_SIZE);
    let weight = extract_numeric(information, HEADER_SIZE + GTIN_SIZE, WEIGHT_SIZE);
    if weight < 10_000 {
        buf.push_str("(3202)");
        push_number(&mut buf, weight, 6);
    } else {
        buf.push_str("(3203)");
        push_number(&mut buf, weight - 10_000, 6);
    }
    Ok(buf)
}

fn decode_ai01392x(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 5 + 1 + 2;
    const LAST_DIGIT_SIZE: usize = 2;
    if information.size() < HEADER_SIZE + GTIN_SIZE {
        return Err(ScanError::NotFound);
    }
    let mut buf = String::new();
    encode_compressed_gtin(information, &mut buf, HEADER_SIZE);

    let last_ai_digit = extract_numeric(information, HEADER_SIZE + GTIN_SIZE, LAST_DIGIT_SIZE);
    buf.push_str("(392");
    push_number(&mut buf, last_ai_digit, 1);
    buf.push(')');

    let mut decoder = GeneralAppIdDecoder::new(information);
    let info = decoder
        .decode_general_purpose_field(HEADER_SIZE + GTIN_SIZE + LAST_DIGIT_SIZE, None)?;
    buf.push_str(&info.new_string);
    Ok(buf)
}

fn decode_ai01393x(information: &BitArray) -> ScanResult<String> {
    const HEADER_SIZE: usize = 5 + 1 + 2;
    const LAST_DIGIT_SIZE: usize = 2;
    const FIRST_THREE_DIGITS_SIZE: usize = 10;
    if information.size() < HEADER_SIZE + GTIN_SIZE {
        return Err(ScanError::NotFound);
    }
    let mut buf = String::new();
    encode_compressed_gtin(information, &mut buf, HEADER_SIZE);

    let last_ai_digit = extract_numeric(information, HEADER_SIZE + GTIN_SIZE, LAST_DIGIT_SIZE);
    buf.push_str("(393");
    push_number(&mut buf, last_ai_digit, 1);
    buf.push(')');

    let first_three_digits = extract_numeric(
        information,
        HEADER_SIZE + GTIN_SIZE + LAST_DIGIT_SIZE,
        FIRST_THREE_DIGITS_SIZE,
    );
    push_number(&mut buf, first_three_digits, 3);

    let mut decoder = GeneralAppIdDecoder::new(information);
    let info = decoder.decode_general_purpose_field(
        HEADER_SIZE + GTIN_SIZE + LAST_DIGIT_SIZE + FIRST_THREE_DIGITS_SIZE,
        None,
    )?;
    buf.push_str(&info.new_string);
    Ok(buf)
}

fn decode_ai013x0x1x(
    information: &BitArray,
    first_ai_digits: &str,
    date_code: &str,
) -> ScanResult<String> {
    const HEADER_SIZE: usize = 7 + 1;
    const WEIGHT_SIZE: usize = 20;
    const DATE_SIZE: usize = 16;
    if information.size() != HEADER_SIZE + GTIN_SIZE + WEIGHT_SIZE + DATE_SIZE {
        return Err(ScanError::NotFound);
    }
    let mut buf = String::new();
    encode_compressed_gtin(information, &mut buf, HEADER_SIZE);

    let weight = extract_numeric(information, HEADER_SIZE + GTIN_SIZE, WEIGHT_SIZE);
    buf.push('(');
    buf.push_str(first_ai_digits);
    push_number(&mut buf, weight / 100_000, 1);
    buf.push(')');
    push_number(&mut buf, weight % 100_000, 6);

    let date = extract_numeric(information, HEADER_SIZE + GTIN_SIZE + WEIGHT_SIZE, DATE_SIZE);
    // 38400 encodes "no date".
    if date != 38_400 {
        buf.push('(');
        buf.push_str(date_code);
        buf.push(')');
        let day = date % 32;
        let month = (date / 32) % 12 + 1;
        let year = date / 32 / 12;
        push_number(&mut buf, year, 2);
        push_number(&mut buf, month, 2);
        push_number(&mut buf, day, 2);
    }
    Ok(buf)
}

/// A compressed GTIN always implies an indicator digit of 9.
fn encode_compressed_gtin(information: &BitArray, buf: &mut String, current_pos: usize) {
    buf.push_str("(01)");
    let initial_position = buf.len();
    buf.push('9');
    encode_compressed_gtin_digits(information, buf, current_pos, initial_position);
}

fn encode_compressed_gtin_digits(
    information: &BitArray,
    buf: &mut String,
    current_pos: usize,
    initial_buffer_position: usize,
) {
    for i in 0..4 {
        let block = extract_numeric(information, current_pos + 10 * i, 10);
        push_number(buf, block, 3);
    }
    append_check_digit(buf, initial_buffer_position);
}

fn append_check_digit(buf: &mut String, current_pos: usize) {
    let mut check_digit: u32 = 0;
    for (i, c) in buf[current_pos..current_pos + 13].bytes().enumerate() {
        let digit = (c - b'0') as u32;
        check_digit += if i & 0x01 == 0 { 3 * digit } else { digit };
    }
    check_digit = 10 - (check_digit % 10);
    if check_digit == 10 {
        check_digit = 0;
    }
    push_number(buf, check_digit, 1);
}

/// Appends `value` zero-padded to at least `min_digits` digits.
fn push_number(buf: &mut String, value: u32, min_digits: usize) {
    let digits = value.to_string();
    for _ in digits.len()..min_digits {
        buf.push('0');
    }
    buf.push_str(&digits);
}

// General-purpose field decoding
//------------------------------------------------------------------------------

const FNC1: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Numeric,
    Alpha,
    IsoIec646,
}

#[derive(Debug, Clone)]
struct DecodedInformation {
    new_position: usize,
    new_string: String,
    remaining_value: Option<u32>,
}

struct DecodedNumeric {
    new_position: usize,
    first_digit: u32,
    second_digit: u32,
}

struct DecodedChar {
    new_position: usize,
    value: char,
    is_fnc1: bool,
}

/// Walks the variable-length tail of the bit stream, switching between the
/// numeric, alphanumeric and ISO 646 encodations as latch sequences direct.
struct GeneralAppIdDecoder<'a> {
    information: &'a BitArray,
    buffer: String,
    position: usize,
    encoding: Encoding,
}

impl<'a> GeneralAppIdDecoder<'a> {
    fn new(information: &'a BitArray) -> Self {
        Self { information, buffer: String::new(), position: 0, encoding: Encoding::Numeric }
    }

    fn size(&self) -> usize {
        self.information.size()
    }

    fn decode_all_codes(&mut self, mut buf: String, initial_position: usize) -> ScanResult<String> {
        let mut current_position = initial_position;
        let mut remaining: Option<u32> = None;
        loop {
            let info = self.decode_general_purpose_field(current_position, remaining)?;
            if let Some(parsed) = parse_fields_in_general_purpose(&info.new_string)? {
                buf.push_str(&parsed);
            }
            remaining = info.remaining_value;
            if current_position == info.new_position {
                break;
            }
            current_position = info.new_position;
        }
        Ok(buf)
    }

    fn decode_general_purpose_field(
        &mut self,
        pos: usize,
        remaining: Option<u32>,
    ) -> ScanResult<DecodedInformation> {
        self.buffer.clear();
        if let Some(r) = remaining {
            push_number(&mut self.buffer, r, 1);
        }
        self.position = pos;
        let last_decoded = self.parse_blocks()?;
        match last_decoded {
            Some(info) if info.remaining_value.is_some() => Ok(DecodedInformation {
                new_position: self.position,
                new_string: self.buffer.clone(),
                remaining_value: info.remaining_value,
            }),
            _ => Ok(DecodedInformation {
                new_position: self.position,
                new_string: self.buffer.clone(),
                remaining_value: None,
            }),
        }
    }

    fn parse_blocks(&mut self) -> ScanResult<Option<DecodedInformation>> {
        loop {
            let initial_position = self.position;
            let (result, finished) = match self.encoding {
                Encoding::Alpha => self.parse_alpha_block()?,
                Encoding::IsoIec646 => self.parse_iso_iec_646_block()?,
                Encoding::Numeric => self.parse_numeric_block()?,
            };
            if finished || initial_position == self.position {
                return Ok(result);
            }
        }
    }

    fn parse_numeric_block(&mut self) -> ScanResult<(Option<DecodedInformation>, bool)> {
        while self.is_still_numeric(self.position) {
            let numeric = self.decode_numeric(self.position)?;
            self.position = numeric.new_position;
            if numeric.first_digit == FNC1 {
                let remaining_value =
                    (numeric.second_digit != FNC1).then_some(numeric.second_digit);
                let info = DecodedInformation {
                    new_position: self.position,
                    new_string: self.buffer.clone(),
                    remaining_value,
                };
                return Ok((Some(info), true));
            }
            push_number(&mut self.buffer, numeric.first_digit, 1);
            if numeric.second_digit == FNC1 {
                let info = DecodedInformation {
                    new_position: self.position,
                    new_string: self.buffer.clone(),
                    remaining_value: None,
                };
                return Ok((Some(info), true));
            }
            push_number(&mut self.buffer, numeric.second_digit, 1);
        }
        if self.is_numeric_to_alpha_numeric_latch(self.position) {
            self.encoding = Encoding::Alpha;
            self.position += 4;
        }
        Ok((None, false))
    }

    fn parse_alpha_block(&mut self) -> ScanResult<(Option<DecodedInformation>, bool)> {
        while self.is_still_alpha(self.position) {
            let alpha = self.decode_alphanumeric(self.position)?;
            self.position = alpha.new_position;
            if alpha.is_fnc1 {
                let info = DecodedInformation {
                    new_position: self.position,
                    new_string: self.buffer.clone(),
                    remaining_value: None,
                };
                return Ok((Some(info), true));
            }
            self.buffer.push(alpha.value);
        }
        if self.is_alpha_or_646_to_numeric_latch(self.position) {
            self.position += 3;
            self.encoding = Encoding::Numeric;
        } else if self.is_alpha_to_646_to_alpha_latch(self.position) {
            if self.position + 5 < self.size() {
                self.position += 5;
            } else {
                self.position = self.size();
            }
            self.encoding = Encoding::IsoIec646;
        }
        Ok((None, false))
    }

    fn parse_iso_iec_646_block(&mut self) -> ScanResult<(Option<DecodedInformation>, bool)> {
        while self.is_still_iso_iec_646(self.position) {
            let iso = self.decode_iso_iec_646(self.position)?;
            self.position = iso.new_position;
            if iso.is_fnc1 {
                let info = DecodedInformation {
                    new_position: self.position,
                    new_string: self.buffer.clone(),
                    remaining_value: None,
                };
                return Ok((Some(info), true));
            }
            self.buffer.push(iso.value);
        }
        if self.is_alpha_or_646_to_numeric_latch(self.position) {
            self.position += 3;
            self.encoding = Encoding::Numeric;
        } else if self.is_alpha_to_646_to_alpha_latch(self.position) {
            if self.position + 5 < self.size() {
                self.position += 5;
            } else {
                self.position = self.size();
            }
            self.encoding = Encoding::Alpha;
        }
        Ok((None, false))
    }

    fn decode_numeric(&self, pos: usize) -> ScanResult<DecodedNumeric> {
        if pos + 7 > self.size() {
            // Truncated final pair: one digit plus an implicit FNC1.
            let numeric = extract_numeric(self.information, pos, 4);
            let first_digit = if numeric == 0 { FNC1 } else { numeric - 1 };
            return Ok(DecodedNumeric {
                new_position: self.size(),
                first_digit,
                second_digit: FNC1,
            });
        }
        let numeric = extract_numeric(self.information, pos, 7);
        if numeric < 8 {
            return Err(ScanError::Format);
        }
        let first_digit = (numeric - 8) / 11;
        let second_digit = (numeric - 8) % 11;
        if first_digit > FNC1 || second_digit > FNC1 {
            return Err(ScanError::Format);
        }
        Ok(DecodedNumeric { new_position: pos + 7, first_digit, second_digit })
    }

    fn is_still_numeric(&self, pos: usize) -> bool {
        // A full digit pair takes 7 bits, a final digit 4.
        if pos + 7 > self.size() {
            return pos + 4 <= self.size();
        }
        (pos..pos + 4).any(|i| self.information.get(i))
    }

    fn decode_alphanumeric(&self, pos: usize) -> ScanResult<DecodedChar> {
        let five_bit_value = extract_numeric(self.information, pos, 5);
        if five_bit_value == 15 {
            return Ok(DecodedChar { new_position: pos + 5, value: '\0', is_fnc1: true });
        }
        if (5..15).contains(&five_bit_value) {
            let value = (b'0' + (five_bit_value - 5) as u8) as char;
            return Ok(DecodedChar { new_position: pos + 5, value, is_fnc1: false });
        }
        let six_bit_value = extract_numeric(self.information, pos, 6);
        if (32..58).contains(&six_bit_value) {
            let value = (six_bit_value as u8 + 33) as char;
            return Ok(DecodedChar { new_position: pos + 6, value, is_fnc1: false });
        }
        let value = match six_bit_value {
            58 => '*',
            59 => ',',
            60 => '-',
            61 => '.',
            62 => '/',
            _ => return Err(ScanError::Format),
        };
        Ok(DecodedChar { new_position: pos + 6, value, is_fnc1: false })
    }

    fn is_still_alpha(&self, pos: usize) -> bool {
        if pos + 5 > self.size() {
            return false;
        }
        let five_bit_value = extract_numeric(self.information, pos, 5);
        if (5..16).contains(&five_bit_value) {
            return true;
        }
        if pos + 6 > self.size() {
            return false;
        }
        let six_bit_value = extract_numeric(self.information, pos, 6);
        (16..63).contains(&six_bit_value)
    }

    fn decode_iso_iec_646(&self, pos: usize) -> ScanResult<DecodedChar> {
        let five_bit_value = extract_numeric(self.information, pos, 5);
        if five_bit_value == 15 {
            return Ok(DecodedChar { new_position: pos + 5, value: '\0', is_fnc1: true });
        }
        if (5..15).contains(&five_bit_value) {
            let value = (b'0' + (five_bit_value - 5) as u8) as char;
            return Ok(DecodedChar { new_position: pos + 5, value, is_fnc1: false });
        }
        let seven_bit_value = extract_numeric(self.information, pos, 7);
        if (64..90).contains(&seven_bit_value) {
            let value = (seven_bit_value as u8 + 1) as char;
            return Ok(DecodedChar { new_position: pos + 7, value, is_fnc1: false });
        }
        if (90..116).contains(&seven_bit_value) {
            let value = (seven_bit_value as u8 + 7) as char;
            return Ok(DecodedChar { new_position: pos + 7, value, is_fnc1: false });
        }
        let eight_bit_value = extract_numeric(self.information, pos, 8);
        let value = match eight_bit_value {
            232 => '!',
            233 => '"',
            234 => '%',
            235 => '&',
            236 => '\'',
            237 => '(',
            238 => ')',
            239 => '*',
            240 => '+',
            241 => ',',
            242 => '-',
            243 => '.',
            244 => '/',
            245 => ':',
            246 => ';',
            247 => '<',
            248 => '=',
            249 => '>',
            250 => '?',
            251 => '_',
            252 => ' ',
            _ => return Err(ScanError::Format),
        };
        Ok(DecodedChar { new_position: pos + 8, value, is_fnc1: false })
    }

    fn is_still_iso_iec_646(&self, pos: usize) -> bool {
        if pos + 5 > self.size() {
            return false;
        }
        let five_bit_value = extract_numeric(self.information, pos, 5);
        if (5..16).contains(&five_bit_value) {
            return true;
        }
        if pos + 7 > self.size() {
            return false;
        }
        let seven_bit_value = extract_numeric(self.information, pos, 7);
        if (64..116).contains(&seven_bit_value) {
            return true;
        }
        if pos + 8 > self.size() {
            return false;
        }
        let eight_bit_value = extract_numeric(self.information, pos, 8);
        (232..253).contains(&eight_bit_value)
    }

    // Latch "0000": numeric to alphanumeric. Tolerates truncation at the
    // end of the stream.
    fn is_numeric_to_alpha_numeric_latch(&self, pos: usize) -> bool {
        if pos >= self.size() {
            return false;
        }
        (0..4).all(|i| pos + i >= self.size() || !self.information.get(pos + i))
    }

    // Latch "000": alphanumeric or ISO 646 back to numeric.
    fn is_alpha_or_646_to_numeric_latch(&self, pos: usize) -> bool {
        if pos + 3 > self.size() {
            return false;
        }
        (pos..pos + 3).all(|i| !self.information.get(i))
    }

    // Latch "00100": alphanumeric to ISO 646 and back. Tolerates truncation.
    fn is_alpha_to_646_to_alpha_latch(&self, pos: usize) -> bool {
        if pos >= self.size() {
            return false;
        }
        (0..5).all(|i| {
            pos + i >= self.size()
                || (self.information.get(pos + i) == (i == 2))
        })
    }
}

// AI field parsing
//------------------------------------------------------------------------------

enum AiLength {
    Fixed(usize),
    Variable(usize),
}

use AiLength::{Fixed, Variable};

const TWO_DIGIT_DATA_LENGTH: [(&str, AiLength); 24] = [
    ("00", Fixed(18)),
    ("01", Fixed(14)),
    ("02", Fixed(14)),
    ("10", Variable(20)),
    ("11", Fixed(6)),
    ("12", Fixed(6)),
    ("13", Fixed(6)),
    ("15", Fixed(6)),
    ("17", Fixed(6)),
    ("20", Fixed(2)),
    ("21", Variable(20)),
    ("22", Variable(29)),
    ("30", Variable(8)),
    ("37", Variable(8)),
    // Internal company codes.
    ("90", Variable(30)),
    ("91", Variable(30)),
    ("92", Variable(30)),
    ("93", Variable(30)),
    ("94", Variable(30)),
    ("95", Variable(30)),
    ("96", Variable(30)),
    ("97", Variable(30)),
    ("98", Variable(30)),
    ("99", Variable(30)),
];

const THREE_DIGIT_DATA_LENGTH: [(&str, AiLength); 23] = [
    ("240", Variable(30)),
    ("241", Variable(30)),
    ("242", Variable(6)),
    ("250", Variable(30)),
    ("251", Variable(30)),
    ("253", Variable(17)),
    ("254", Variable(20)),
    ("400", Variable(30)),
    ("401", Variable(30)),
    ("402", Fixed(17)),
    ("403", Variable(30)),
    ("410", Fixed(13)),
    ("411", Fixed(13)),
    ("412", Fixed(13)),
    ("413", Fixed(13)),
    ("414", Fixed(13)),
    ("420", Variable(20)),
    ("421", Variable(15)),
    ("422", Fixed(3)),
    ("423", Variable(15)),
    ("424", Fixed(3)),
    ("425", Fixed(3)),
    ("426", Fixed(3)),
];

/// AIs whose fourth digit is a free decimal-point indicator.
const THREE_DIGIT_PLUS_DIGIT_DATA_LENGTH: [(&str, AiLength); 57] = [
    ("310", Fixed(6)),
    ("311", Fixed(6)),
    ("312", Fixed(6)),
    ("313", Fixed(6)),
    ("314", Fixed(6)),
    ("315", Fixed(6)),
    ("316", Fixed(6)),
    ("320", Fixed(6)),
    ("321", Fixed(6)),
    ("322", Fixed(6)),
    ("323", Fixed(6)),
    ("324", Fixed(6)),
    ("325", Fixed(6)),
    ("326", Fixed(6)),
    ("327", Fixed(6)),
    ("328", Fixed(6)),
    ("329", Fixed(6)),
    ("330", Fixed(6)),
    ("331", Fixed(6)),
    ("332", Fixed(6)),
    ("333", Fixed(6)),
    ("334", Fixed(6)),
    ("335", Fixed(6)),
    ("336", Fixed(6)),
    ("340", Fixed(6)),
    ("341", Fixed(6)),
    ("342", Fixed(6)),
    ("343", Fixed(6)),
    ("344", Fixed(6)),
    ("345", Fixed(6)),
    ("346", Fixed(6)),
    ("347", Fixed(6)),
    ("348", Fixed(6)),
    ("349", Fixed(6)),
    ("350", Fixed(6)),
    ("351", Fixed(6)),
    ("352", Fixed(6)),
    ("353", Fixed(6)),
    ("354", Fixed(6)),
    ("355", Fixed(6)),
    ("356", Fixed(6)),
    ("357", Fixed(6)),
    ("360", Fixed(6)),
    ("361", Fixed(6)),
    ("362", Fixed(6)),
    ("363", Fixed(6)),
    ("364", Fixed(6)),
    ("365", Fixed(6)),
    ("366", Fixed(6)),
    ("367", Fixed(6)),
    ("368", Fixed(6)),
    ("369", Fixed(6)),
    ("390", Variable(15)),
    ("391", Variable(18)),
    ("392", Variable(15)),
    ("393", Variable(18)),
    ("703", Variable(30)),
];

const FOUR_DIGIT_DATA_LENGTH: [(&str, AiLength); 18] = [
    ("7001", Fixed(13)),
    ("7002", Variable(30)),
    ("7003", Fixed(10)),
    ("8001", Fixed(14)),
    ("8002", Variable(20)),
    ("8003", Variable(30)),
    ("8004", Variable(30)),
    ("8005", Fixed(6)),
    ("8006", Fixed(18)),
    ("8007", Variable(30)),
    ("8008", Variable(12)),
    ("8018", Fixed(18)),
    ("8020", Variable(25)),
    ("8100", Fixed(6)),
    ("8101", Fixed(10)),
    ("8102", Fixed(2)),
    ("8110", Variable(70)),
    ("8200", Variable(70)),
];

/// Splits a raw digit-and-letter run into parenthesized AI fields, e.g.
/// "103456" into "(10)3456". Returns `None` for an empty run.
fn parse_fields_in_general_purpose(raw: &str) -> ScanResult<Option<String>> {
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() >= 2 {
        for (ai, length) in &TWO_DIGIT_DATA_LENGTH {
            if raw.starts_with(ai) {
                return process_ai(2, length, raw).map(Some);
            }
        }
    }
    if raw.len() >= 3 {
        for (ai, length) in &THREE_DIGIT_DATA_LENGTH {
            if raw.starts_with(ai) {
                return process_ai(3, length, raw).map(Some);
            }
        }
        for (ai, length) in &THREE_DIGIT_PLUS_DIGIT_DATA_LENGTH {
            if raw.starts_with(ai) {
                return process_ai(4, length, raw).map(Some);
            }
        }
    }
    if raw.len() >= 4 {
        for (ai, length) in &FOUR_DIGIT_DATA_LENGTH {
            if raw.starts_with(ai) {
                return process_ai(4, length, raw).map(Some);
            }
        }
    }
    Err(ScanError::NotFound)
}

fn process_ai(ai_size: usize, length: &AiLength, raw: &str) -> ScanResult<String> {
    if raw.len() < ai_size {
        return Err(ScanError::NotFound);
    }
    let ai = &raw[..ai_size];
    let field_end = match *length {
        Fixed(field_size) => {
            if raw.len() < ai_size + field_size {
                return Err(ScanError::NotFound);
            }
            ai_size + field_size
        }
        Variable(max_field_size) => raw.len().min(ai_size + max_field_size),
    };
    let mut result = format!("({}){}", ai, &raw[ai_size..field_end]);
    if let Some(rest) = parse_fields_in_general_purpose(&raw[field_end..])? {
        result.push_str(&rest);
    }
    Ok(result)
}

#[cfg(test)]
mod expanded_decode_tests {
    use super::*;

    fn push_bits(bits: &mut Vec<bool>, value: u32, count: usize) {
        for i in (0..count).rev() {
            bits.push(value & (1 << i) != 0);
        }
    }

    fn bit_array(bits: &[bool]) -> BitArray {
        let mut array = BitArray::new(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            if b {
                array.set(i);
            }
        }
        array
    }

    #[test]
    fn test_any_ai_numeric_field() {
        // Header, then the digit pairs 10 12 34 56, then zero padding.
        let mut bits = Vec::new();
        push_bits(&mut bits, 0, 5);
        for pair in [19u32, 21, 45, 69] {
            push_bits(&mut bits, pair, 7);
        }
        push_bits(&mut bits, 0, 3);
        let information = bit_array(&bits);
        assert_eq!(parse_information(&information).unwrap(), "(10)123456");
    }

    #[test]
    fn test_ai01_with_following_ais() {
        // Compressed GTIN 90012345678908 followed by a lot number.
        let mut bits = Vec::new();
        push_bits(&mut bits, 0b0100, 4); // linkage 0, AI 01 flag
        push_bits(&mut bits, 9, 4);
        for block in [1u32, 234, 567, 890] {
            push_bits(&mut bits, block, 10);
        }
        // (10)77: numeric pairs for the digits 1,0 and 7,7. The field ends
        // with the bit stream.
        push_bits(&mut bits, 8 + 11, 7);
        push_bits(&mut bits, 8 + 11 * 7 + 7, 7);
        let information = bit_array(&bits);
        let text = parse_information(&information).unwrap();
        assert!(text.starts_with("(01)90012345678908"));
        assert_eq!(text, "(01)90012345678908(10)77");
    }

    #[test]
    fn test_weight_method_3103() {
        let mut bits = Vec::new();
        push_bits(&mut bits, 0, 1); // linkage
        push_bits(&mut bits, 4, 4); // encodation method
        for block in [1u32, 234, 567, 890] {
            push_bits(&mut bits, block, 10);
        }
        push_bits(&mut bits, 3177, 15);
        let information = bit_array(&bits);
        assert_eq!(
            parse_information(&information).unwrap(),
            "(01)90012345678908(3103)003177"
        );
    }

    #[test]
    fn test_weight_method_3202_and_3203() {
        for (weight, expected) in [(1750u32, "(3202)001750"), (11750, "(3203)001750")] {
            let mut bits = Vec::new();
            push_bits(&mut bits, 0, 1);
            push_bits(&mut bits, 5, 4);
            for block in [1u32, 234, 567, 890] {
                push_bits(&mut bits, block, 10);
            }
            push_bits(&mut bits, weight, 15);
            let information = bit_array(&bits);
            let text = parse_information(&information).unwrap();
            assert_eq!(text, format!("(01)90012345678908{expected}"));
        }
    }

    #[test]
    fn test_weight_and_date_method() {
        // Method 56: AI 310x with a production date (11).
        let mut bits = Vec::new();
        push_bits(&mut bits, 0, 1);
        push_bits(&mut bits, 56, 7);
        for block in [1u32, 234, 567, 890] {
            push_bits(&mut bits, block, 10);
        }
        push_bits(&mut bits, 103_400, 20); // (3101)003400
        let date = ((26 * 12 + 7) * 32 + 29) as u32; // 2026-08-29
        push_bits(&mut bits, date, 16);
        let information = bit_array(&bits);
        assert_eq!(
            parse_information(&information).unwrap(),
            "(01)90012345678908(3101)003400(11)260829"
        );
    }

    #[test]
    fn test_date_sentinel_is_omitted() {
        let mut bits = Vec::new();
        push_bits(&mut bits, 0, 1);
        push_bits(&mut bits, 56, 7);
        for block in [1u32, 234, 567, 890] {
            push_bits(&mut bits, block, 10);
        }
        push_bits(&mut bits, 99_999, 20);
        push_bits(&mut bits, 38_400, 16);
        let information = bit_array(&bits);
        assert_eq!(
            parse_information(&information).unwrap(),
            "(01)90012345678908(3100)099999"
        );
    }

    #[test]
    fn test_field_parser() {
        assert_eq!(parse_fields_in_general_purpose("").unwrap(), None);
        assert_eq!(
            parse_fields_in_general_purpose("101234").unwrap(),
            Some("(10)1234".to_string())
        );
        // A fixed-length AI chains into the next field.
        assert_eq!(
            parse_fields_in_general_purpose("0112345678901231103456").unwrap(),
            Some("(01)12345678901231(10)3456".to_string())
        );
        assert_eq!(
            parse_fields_in_general_purpose("242123456").unwrap(),
            Some("(242)123456".to_string())
        );
        // Unknown AI prefix.
        assert!(parse_fields_in_general_purpose("89").is_err());
    }

    #[test]
    fn test_alphanumeric_field() {
        // (10)AB: digits 1,0 then latch 0000 then 6-bit letters.
        let mut bits = Vec::new();
        push_bits(&mut bits, 0, 5);
        push_bits(&mut bits, 8 + 11, 7); // "10"
        push_bits(&mut bits, 0, 4); // numeric to alphanumeric latch
        push_bits(&mut bits, 'A' as u32 - 33, 6);
        push_bits(&mut bits, 'B' as u32 - 33, 6);
        push_bits(&mut bits, 0, 8); // back to numeric, then padding
        let information = bit_array(&bits);
        assert_eq!(parse_information(&information).unwrap(), "(10)AB");
    }

    #[test]
    fn test_build_bit_array_skips_check_character() {
        use crate::oned::rss::{DataCharacter, FinderPattern};

        let finder = FinderPattern::new(0, [0, 30], 0, 30, 0);
        let pairs = vec![
            ExpandedPair {
                left_char: DataCharacter::new(33, 0),
                right_char: Some(DataCharacter::new(19, 0)),
                finder,
            },
            ExpandedPair {
                left_char: DataCharacter::new(683, 0),
                right_char: Some(DataCharacter::new(1576, 0)),
                finder,
            },
        ];
        let binary = build_bit_array(&pairs);
        assert_eq!(binary.size(), 36);
        assert_eq!(parse_information(&binary).unwrap(), "(10)123456");
    }
}
