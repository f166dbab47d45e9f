//! Format dispatch: one entry point that tries every hinted symbology.

use crate::binarize::BinaryBitmap;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::oned::OneDScanner;
use crate::qr::QrReader;
use crate::result::{Decoded, Format};

// Multi-format scanner
//------------------------------------------------------------------------------

/// Tries every reader the hints allow, in a cost-ordered sequence, and
/// returns the first hit. Individual reader failures are swallowed; only
/// the aggregate miss surfaces.
///
/// Without `try_harder` the cheap 1D row sweep runs before the QR detector.
/// With it, the row sweep instead runs last so its slow rotated retry does
/// not starve the QR pass.
pub struct MultiFormatScanner {
    one_d: Option<OneDScanner>,
    qr: Option<QrReader>,
    one_d_last: bool,
}

impl MultiFormatScanner {
    pub fn new(hints: &DecodeHints) -> Self {
        Self {
            one_d: hints.any_one_d().then(|| OneDScanner::new(hints)),
            qr: hints.allows(Format::QrCode).then(QrReader::new),
            one_d_last: hints.try_harder,
        }
    }

    pub fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Decoded> {
        let mut last_err = ScanError::NotFound;

        if !self.one_d_last {
            if let Some(one_d) = &mut self.one_d {
                match one_d.decode(image, hints) {
                    Ok(result) => return Ok(result),
                    Err(e) => last_err = e,
                }
            }
        }
        if let Some(qr) = &self.qr {
            match qr.decode(image, hints) {
                Ok(result) => return Ok(result),
                Err(e) => last_err = e,
            }
        }
        if self.one_d_last {
            if let Some(one_d) = &mut self.one_d {
                match one_d.decode(image, hints) {
                    Ok(result) => return Ok(result),
                    Err(e) => last_err = e,
                }
            }
        }
        Err(last_err)
    }

    pub fn reset(&mut self) {
        if let Some(one_d) = &mut self.one_d {
            one_d.reset();
        }
    }
}
