use std::fmt::{Display, Formatter};

use num_traits::{AsPrimitive, PrimInt, Unsigned};

// Bit array
//------------------------------------------------------------------------------

/// Fixed-length row of bits backed by u32 words, least significant bit first
/// within each word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitArray {
    bits: Vec<u32>,
    size: usize,
}

impl BitArray {
    pub fn new(size: usize) -> Self {
        Self { bits: vec![0; (size + 31) / 32], size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.size, "Index out of bounds: {i} >= {}", self.size);

        (self.bits[i / 32] >> (i & 0x1f)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        debug_assert!(i < self.size, "Index out of bounds: {i} >= {}", self.size);

        self.bits[i / 32] |= 1 << (i & 0x1f);
    }

    pub fn clear_all(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    /// Index of the first set bit at or after `from`, or `size` if none.
    pub fn next_set(&self, from: usize) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mut word_idx = from / 32;
        let mut word = self.bits[word_idx] & !((1u32 << (from & 0x1f)) - 1);
        while word == 0 {
            word_idx += 1;
            if word_idx == self.bits.len() {
                return self.size;
            }
            word = self.bits[word_idx];
        }
        let res = word_idx * 32 + word.trailing_zeros() as usize;
        res.min(self.size)
    }

    /// Index of the first unset bit at or after `from`, or `size` if none.
    pub fn next_unset(&self, from: usize) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mut word_idx = from / 32;
        let mut word = !self.bits[word_idx] & !((1u32 << (from & 0x1f)) - 1);
        while word == 0 {
            word_idx += 1;
            if word_idx == self.bits.len() {
                return self.size;
            }
            word = !self.bits[word_idx];
        }
        let res = word_idx * 32 + word.trailing_zeros() as usize;
        res.min(self.size)
    }

    /// True if every bit in [start, end) matches `value`.
    pub fn is_range(&self, start: usize, end: usize, value: bool) -> ScanResult<bool> {
        if end < start || end > self.size {
            return Err(ScanError::InvalidDimensions);
        }
        if start == end {
            return Ok(true);
        }
        Ok((start..end).all(|i| self.get(i) == value))
    }

    pub fn reverse(&mut self) {
        let mut out = BitArray::new(self.size);
        for i in 0..self.size {
            if self.get(self.size - 1 - i) {
                out.set(i);
            }
        }
        *self = out;
    }
}

// Bit matrix
//------------------------------------------------------------------------------

/// Row-major 2D bit grid. `true` is a dark module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    row_words: usize,
    bits: Vec<u32>,
}

impl BitMatrix {
    pub fn new(width: usize, height: usize) -> Self {
        let row_words = (width + 31) / 32;
        Self { width, height, row_words, bits: vec![0; row_words * height] }
    }

    pub fn square(dimension: usize) -> Self {
        Self::new(dimension, dimension)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        debug_assert!(x < self.width && y < self.height, "Index out of bounds: ({x}, {y})");

        (self.bits[y * self.row_words + x / 32] >> (x & 0x1f)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize) {
        debug_assert!(x < self.width && y < self.height, "Index out of bounds: ({x}, {y})");

        self.bits[y * self.row_words + x / 32] |= 1 << (x & 0x1f);
    }

    #[inline]
    pub fn unset(&mut self, x: usize, y: usize) {
        debug_assert!(x < self.width && y < self.height, "Index out of bounds: ({x}, {y})");

        self.bits[y * self.row_words + x / 32] &= !(1 << (x & 0x1f));
    }

    #[inline]
    pub fn flip(&mut self, x: usize, y: usize) {
        debug_assert!(x < self.width && y < self.height, "Index out of bounds: ({x}, {y})");

        self.bits[y * self.row_words + x / 32] ^= 1 << (x & 0x1f);
    }

    pub fn set_region(&mut self, left: usize, top: usize, width: usize, height: usize) {
        debug_assert!(left + width <= self.width && top + height <= self.height);

        for y in top..top + height {
            for x in left..left + width {
                self.set(x, y);
            }
        }
    }

    pub fn row(&self, y: usize) -> BitArray {
        let mut out = BitArray::new(self.width);
        for x in 0..self.width {
            if self.get(x, y) {
                out.set(x);
            }
        }
        out
    }

    /// Smallest rectangle [left, top, width, height] containing all set bits,
    /// or None if the matrix is blank.
    pub fn enclosing_rectangle(&self) -> Option<[usize; 4]> {
        let mut left = self.width;
        let mut top = self.height;
        let mut right = 0usize;
        let mut bottom = 0usize;
        let mut any = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    any = true;
                    left = left.min(x);
                    right = right.max(x);
                    top = top.min(y);
                    bottom = bottom.max(y);
                }
            }
        }
        any.then(|| [left, top, right - left + 1, bottom - top + 1])
    }

    /// Coordinates of the first set bit in row-major order.
    pub fn top_left_on_bit(&self) -> Option<(usize, usize)> {
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    pub fn bottom_right_on_bit(&self) -> Option<(usize, usize)> {
        for y in (0..self.height).rev() {
            for x in (0..self.width).rev() {
                if self.get(x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }
}

impl Display for BitMatrix {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.get(x, y) { "X " } else { "  " })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

// Bit stream
//------------------------------------------------------------------------------

use crate::error::{ScanError, ScanResult};

/// Append-only bit buffer with a read cursor, used both to assemble encoded
/// payloads and to consume decoded codeword streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitStream {
    data: Vec<u8>,
    len: usize,
    cursor: usize,
}

impl BitStream {
    pub fn new() -> Self {
        Self { data: Vec::new(), len: 0, cursor: 0 }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec(), len: bytes.len() * 8, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.len - self.cursor
    }

    pub fn byte_offset(&self) -> usize {
        self.cursor / 8
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Appends the low `bit_len` bits of `bits`, most significant first.
    pub fn push_bits<T>(&mut self, bits: T, bit_len: usize)
    where
        T: PrimInt + Unsigned + AsPrimitive<u8>,
    {
        debug_assert!(
            bit_len == 0 || bit_len >= (T::zero().count_zeros() as usize) - bits.leading_zeros() as usize,
            "Bit length shorter than value: {bit_len}"
        );

        let mut rem = bit_len;
        while rem > 0 {
            let free = 8 - (self.len & 7);
            if free == 8 {
                self.data.push(0);
            }
            let take = rem.min(free);
            let chunk: u8 = (bits.unsigned_shr((rem - take) as u32)
                & T::from((1u16 << take) - 1).unwrap_or_else(T::max_value))
            .as_();
            let last = self.data.len() - 1;
            self.data[last] |= chunk << (free - take);
            self.len += take;
            rem -= take;
        }
    }

    /// Reads `bit_len` bits (at most 16) from the cursor, most significant
    /// first.
    pub fn take_bits(&mut self, bit_len: usize) -> ScanResult<u16> {
        debug_assert!(bit_len <= 16, "Bit length too long for u16: {bit_len}");

        if self.cursor + bit_len > self.len {
            return Err(ScanError::Format);
        }
        let mut out = 0u16;
        for _ in 0..bit_len {
            let byte = self.data[self.cursor / 8];
            let bit = (byte >> (7 - (self.cursor & 7))) & 1;
            out = (out << 1) | bit as u16;
            self.cursor += 1;
        }
        Ok(out)
    }

    /// Reads the next whole byte. The cursor must be byte aligned.
    pub fn take_byte(&mut self) -> ScanResult<u8> {
        Ok(self.take_bits(8)? as u8)
    }
}

impl Default for BitStream {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod bit_matrix_tests {
    use super::BitMatrix;

    #[test]
    fn test_set_flip() {
        let mut m = BitMatrix::square(33);
        m.set(32, 32);
        assert!(m.get(32, 32));
        m.flip(32, 32);
        assert!(!m.get(32, 32));
        m.flip(0, 0);
        assert!(m.get(0, 0));
    }

    #[test]
    fn test_enclosing_rectangle() {
        let mut m = BitMatrix::new(40, 20);
        assert_eq!(m.enclosing_rectangle(), None);
        m.set(5, 3);
        m.set(20, 10);
        assert_eq!(m.enclosing_rectangle(), Some([5, 3, 16, 8]));
    }

    #[test]
    fn test_row() {
        let mut m = BitMatrix::new(10, 2);
        m.set(7, 1);
        let row = m.row(1);
        assert!(row.get(7));
        assert!(!row.get(6));
    }
}

#[cfg(test)]
mod bit_stream_tests {
    use super::BitStream;

    #[test]
    fn test_push_then_take() {
        let mut bs = BitStream::new();
        bs.push_bits(0b101u8, 3);
        bs.push_bits(0xABCDu16, 16);
        bs.push_bits(0u8, 5);
        assert_eq!(bs.len(), 24);
        assert_eq!(bs.take_bits(3).unwrap(), 0b101);
        assert_eq!(bs.take_bits(16).unwrap(), 0xABCD);
        assert_eq!(bs.take_bits(5).unwrap(), 0);
        assert!(bs.take_bits(1).is_err());
    }

    #[test]
    fn test_from_bytes() {
        let mut bs = BitStream::from_bytes(&[0x40, 0x51]);
        assert_eq!(bs.take_bits(4).unwrap(), 0b0100);
        assert_eq!(bs.remaining(), 12);
        assert_eq!(bs.take_bits(8).unwrap(), 0b0000_0101);
    }

    #[test]
    fn test_push_crosses_byte_boundary() {
        let mut bs = BitStream::new();
        bs.push_bits(0x1FFu16, 9);
        assert_eq!(bs.data(), &[0xFF, 0x80]);
    }
}
