use std::fmt::{Display, Formatter};

// Barcode format
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Codabar,
    Code39,
    Code93,
    Code128,
    Ean8,
    Ean13,
    Itf,
    QrCode,
    Rss14,
    RssExpanded,
    UpcA,
    UpcEanExtension,
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Codabar => "CODABAR",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Code128 => "CODE_128",
            Self::Ean8 => "EAN_8",
            Self::Ean13 => "EAN_13",
            Self::Itf => "ITF",
            Self::QrCode => "QR_CODE",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
            Self::UpcA => "UPC_A",
            Self::UpcEanExtension => "UPC_EAN_EXTENSION",
        };
        f.write_str(name)
    }
}

// Result point
//------------------------------------------------------------------------------

/// A point of interest in image coordinates: a finder center, or the middle
/// of a 1D guard pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// Metadata
//------------------------------------------------------------------------------

/// Supplemental facts about a decode, attached to the result rather than the
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    /// Symbol decoded upside down (1D) or mirrored (QR).
    Orientation(u32),
    /// QR error correction level, as a letter.
    ErrorCorrectionLevel(char),
    /// Structured append: position byte packing sequence index and total.
    StructuredAppendSequence(u8),
    StructuredAppendParity(u8),
    /// Text of a 2- or 5-digit EAN/UPC add-on.
    UpcEanExtension(String),
    /// Issue country guess for an EAN-13 prefix.
    PossibleCountry(String),
    /// Symbology identifier, e.g. "]E0".
    SymbologyIdentifier(String),
    Mirrored,
}

impl Metadata {
    fn same_kind(&self, other: &Metadata) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

// Decoded result
//------------------------------------------------------------------------------

/// A successfully decoded symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub raw_bytes: Vec<u8>,
    /// Number of valid bits in `raw_bytes`; the final byte may be partial.
    pub num_bits: usize,
    pub points: Vec<Point>,
    pub format: Format,
    pub metadata: Vec<Metadata>,
}

impl Decoded {
    pub fn new(text: String, raw_bytes: Vec<u8>, points: Vec<Point>, format: Format) -> Self {
        let num_bits = raw_bytes.len() * 8;
        Self { text, raw_bytes, num_bits, points, format, metadata: Vec::new() }
    }

    /// Inserts or replaces a metadata entry of the same kind.
    pub fn put_metadata(&mut self, entry: Metadata) {
        if let Some(existing) = self.metadata.iter_mut().find(|m| m.same_kind(&entry)) {
            *existing = entry;
        } else {
            self.metadata.push(entry);
        }
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn orientation(&self) -> u32 {
        self.metadata
            .iter()
            .find_map(|m| match m {
                Metadata::Orientation(deg) => Some(*deg),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Shifts every result point, used after decoding a cropped region.
    pub fn translate_points(&mut self, dx: f32, dy: f32) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
    }
}

#[cfg(test)]
mod result_tests {
    use super::*;

    #[test]
    fn test_put_metadata_upserts() {
        let mut r = Decoded::new("x".into(), vec![], vec![], Format::QrCode);
        r.put_metadata(Metadata::Orientation(90));
        r.put_metadata(Metadata::ErrorCorrectionLevel('M'));
        r.put_metadata(Metadata::Orientation(180));
        assert_eq!(r.metadata().len(), 2);
        assert_eq!(r.orientation(), 180);
    }

    #[test]
    fn test_translate_points() {
        let mut r = Decoded::new(
            "x".into(),
            vec![],
            vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            Format::Ean13,
        );
        r.translate_points(10.0, 20.0);
        assert_eq!(r.points[0], Point::new(11.0, 22.0));
        assert_eq!(r.points[1], Point::new(13.0, 24.0));
    }
}
