//! QR symbology: detection, decoding and encoding.

pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod format;
pub mod matrix;
pub mod version;

use crate::binarize::BinaryBitmap;
use crate::error::ScanResult;
use crate::hints::DecodeHints;
use crate::result::{Decoded, Format, Metadata};

// QR reader
//------------------------------------------------------------------------------

/// Finds and decodes one QR symbol per image.
#[derive(Debug, Default)]
pub struct QrReader;

impl QrReader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Decoded> {
        let matrix = image.black_matrix()?;
        let detection = if hints.pure_barcode {
            detector::extract_pure(matrix)?
        } else {
            detector::detect(matrix, hints)?
        };
        let contents = decoder::decode_matrix(&detection.bits, hints.character_set.as_deref())?;

        let mut points = detection.points;
        if contents.mirrored && points.len() >= 3 {
            // A mirrored read means bottom-left and top-right traded places.
            points.swap(0, 2);
        }

        let mut result = Decoded::new(
            contents.text,
            contents.raw_bytes,
            points,
            Format::QrCode,
        );
        result.put_metadata(Metadata::ErrorCorrectionLevel(contents.ec_level.letter()));
        result.put_metadata(Metadata::SymbologyIdentifier("]Q1".into()));
        if contents.mirrored {
            result.put_metadata(Metadata::Mirrored);
        }
        if let Some((index, total, parity)) = contents.structured_append {
            result.put_metadata(Metadata::StructuredAppendSequence((index << 4) | (total - 1)));
            result.put_metadata(Metadata::StructuredAppendParity(parity));
        }
        Ok(result)
    }
}
