//! One-dimensional symbologies and the shared row-scanning driver.

pub mod codabar;
pub mod code128;
pub mod code39;
pub mod code93;
pub mod extensions;
pub mod itf;
pub mod rss;
pub mod upc_ean;

use crate::binarize::BinaryBitmap;
use crate::bits::BitArray;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::result::{Decoded, Format, Metadata, Point};

// Row reader
//------------------------------------------------------------------------------

/// A symbology that decodes from a single binarized row. Implementations may
/// carry state across rows of one image; `reset` clears it between images.
pub trait RowReader {
    fn decode_row(
        &mut self,
        row_number: usize,
        row: &BitArray,
        hints: &DecodeHints,
    ) -> ScanResult<Decoded>;

    fn reset(&mut self) {}
}

// Row scan driver
//------------------------------------------------------------------------------

/// Sweeps rows middle-out, trying each reader forward and reversed. More
/// rows and a finer step under `try_harder`.
pub fn scan_rows(
    image: &BinaryBitmap,
    hints: &DecodeHints,
    readers: &mut [Box<dyn RowReader>],
) -> ScanResult<Decoded> {
    let width = image.width();
    let height = image.height();
    let middle = height >> 1;
    let row_step = (height >> if hints.try_harder { 8 } else { 5 }).max(1);
    let max_lines = if hints.try_harder { height } else { 15.min(height) };

    let quiet_hints = hints.without_callback();
    let mut luminances = Vec::with_capacity(width);
    for attempt in 0..max_lines {
        let steps = (attempt + 1) / 2;
        let offset = row_step * steps;
        let row_number = if attempt % 2 == 0 {
            match middle.checked_add(offset) {
                Some(n) if n < height => n,
                _ => break,
            }
        } else {
            match middle.checked_sub(offset) {
                Some(n) => n,
                None => break,
            }
        };

        let Ok(mut row) = image.black_row(row_number, &mut luminances) else {
            continue;
        };

        for pass in 0..2 {
            // Second pass reads the row right to left for upside-down
            // symbols.
            let pass_hints = if pass == 1 {
                row.reverse();
                &quiet_hints
            } else {
                hints
            };
            for reader in readers.iter_mut() {
                match reader.decode_row(row_number, &row, pass_hints) {
                    Ok(mut result) => {
                        if pass == 1 {
                            result.put_metadata(Metadata::Orientation(180));
                            for p in &mut result.points {
                                p.x = width as f32 - p.x - 1.0;
                            }
                        }
                        return Ok(result);
                    }
                    Err(_) => continue,
                }
            }
        }
    }
    Err(ScanError::NotFound)
}

// Aggregate scanner
//------------------------------------------------------------------------------

/// Runs every hinted 1D reader over the image, retrying rotated when asked
/// to try harder.
pub struct OneDScanner {
    readers: Vec<Box<dyn RowReader>>,
}

impl OneDScanner {
    pub fn new(hints: &DecodeHints) -> Self {
        let mut readers: Vec<Box<dyn RowReader>> = Vec::new();
        if hints.allows(Format::UpcA)
            || hints.allows(Format::Ean13)
            || hints.allows(Format::Ean8)
        {
            readers.push(Box::new(upc_ean::EanUpcReader::new(hints)));
        }
        if hints.allows(Format::Code39) {
            readers.push(Box::new(code39::Code39Reader::new()));
        }
        if hints.allows(Format::Code93) {
            readers.push(Box::new(code93::Code93Reader::new()));
        }
        if hints.allows(Format::Code128) {
            readers.push(Box::new(code128::Code128Reader::new()));
        }
        if hints.allows(Format::Itf) {
            readers.push(Box::new(itf::ItfReader::new()));
        }
        if hints.allows(Format::Codabar) {
            readers.push(Box::new(codabar::CodabarReader::new()));
        }
        if hints.allows(Format::Rss14) {
            readers.push(Box::new(rss::rss14::Rss14Reader::new()));
        }
        if hints.allows(Format::RssExpanded) {
            readers.push(Box::new(rss::expanded::RssExpandedReader::new()));
        }
        Self { readers }
    }

    pub fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Decoded> {
        self.reset();
        match scan_rows(image, hints, &mut self.readers) {
            Ok(result) => Ok(result),
            Err(e) if !hints.try_harder => Err(e),
            Err(e) => {
                // Vertical symbols: rotate a quarter turn and sweep again.
                let rotated = image.rotate_ccw();
                self.reset();
                let mut result = scan_rows(&rotated, hints, &mut self.readers).map_err(|_| e)?;
                let orientation = result.orientation();
                result.put_metadata(Metadata::Orientation((orientation + 270) % 360));
                // Map points from rotated back to original coordinates.
                let orig_width = image.width() as f32;
                for p in &mut result.points {
                    *p = Point::new(orig_width - p.y - 1.0, p.x);
                }
                Ok(result)
            }
        }
    }

    pub fn reset(&mut self) {
        for r in &mut self.readers {
            r.reset();
        }
    }
}
