use std::sync::Arc;

use crate::result::{Format, Point};

// Decode hints
//------------------------------------------------------------------------------

pub type PointCallback = Arc<dyn Fn(Point) + Send + Sync>;

/// Caller guidance for a decode attempt. The default scans for every format
/// with the fast settings.
#[derive(Clone, Default)]
pub struct DecodeHints {
    /// Restrict the search to these formats. Empty means all.
    pub formats: Vec<Format>,
    /// Spend more time: scan more rows, retry rotated and mirrored.
    pub try_harder: bool,
    /// The image is a clean, axis-aligned symbol with nothing else in frame.
    pub pure_barcode: bool,
    /// Charset label to assume for byte segments without an ECI.
    pub character_set: Option<String>,
    /// Require an EAN/UPC add-on of one of these lengths (2 or 5).
    pub allowed_ean_extensions: Vec<usize>,
    /// Invoked as finder points are located, for viewfinder feedback.
    pub point_callback: Option<PointCallback>,
}

impl DecodeHints {
    /// True if the given format should be attempted.
    pub fn allows(&self, format: Format) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }

    pub fn any_one_d(&self) -> bool {
        [
            Format::UpcA,
            Format::Ean13,
            Format::Ean8,
            Format::Code39,
            Format::Code93,
            Format::Code128,
            Format::Itf,
            Format::Codabar,
            Format::Rss14,
            Format::RssExpanded,
        ]
        .iter()
        .any(|&f| self.allows(f))
    }

    /// Copy with the point callback removed, for speculative passes that
    /// should not emit feedback.
    pub fn without_callback(&self) -> DecodeHints {
        DecodeHints { point_callback: None, ..self.clone() }
    }

    pub fn report_point(&self, p: Point) {
        if let Some(cb) = &self.point_callback {
            cb(p);
        }
    }
}

impl std::fmt::Debug for DecodeHints {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DecodeHints")
            .field("formats", &self.formats)
            .field("try_harder", &self.try_harder)
            .field("pure_barcode", &self.pure_barcode)
            .field("character_set", &self.character_set)
            .field("allowed_ean_extensions", &self.allowed_ean_extensions)
            .field("point_callback", &self.point_callback.as_ref().map(|_| "..."))
            .finish()
    }
}

#[cfg(test)]
mod hints_tests {
    use super::*;

    #[test]
    fn test_empty_formats_allow_all() {
        let hints = DecodeHints::default();
        assert!(hints.allows(Format::QrCode));
        assert!(hints.allows(Format::Codabar));
        assert!(hints.any_one_d());
    }

    #[test]
    fn test_restricted_formats() {
        let hints = DecodeHints { formats: vec![Format::QrCode], ..Default::default() };
        assert!(hints.allows(Format::QrCode));
        assert!(!hints.allows(Format::Ean13));
        assert!(!hints.any_one_d());
    }
}
