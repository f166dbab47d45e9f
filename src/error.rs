use std::fmt::{Debug, Display, Error, Formatter};

// Error
//------------------------------------------------------------------------------

/// Crate-wide error type. The first three variants are the only failures a
/// decode attempt reports; the rest are hard encoder failures.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ScanError {
    // No candidate symbol was located. Expected and common while scanning.
    NotFound,
    // A symbol-like region was located but its structure violates the
    // symbology's encoding rules.
    Format,
    // Structure parsed but the checksum or error correction failed.
    Checksum,

    // Encoding
    EmptyData,
    DataTooLong,
    InvalidChar,
    InvalidVersion,
    InvalidEcLevel,
    InvalidMask,
    UnsupportedCharset,
    InvalidDimensions,
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::NotFound => "No symbol found",
            Self::Format => "Symbol structure is invalid",
            Self::Checksum => "Checksum or error correction failed",

            Self::EmptyData => "Empty data",
            Self::DataTooLong => "Data too long",
            Self::InvalidChar => "Invalid character for the chosen mode",
            Self::InvalidVersion => "Invalid version",
            Self::InvalidEcLevel => "Invalid error correction level",
            Self::InvalidMask => "Invalid masking pattern",
            Self::UnsupportedCharset => "Unsupported character set",
            Self::InvalidDimensions => "Invalid dimensions",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ScanError {}

pub type ScanResult<T> = Result<T, ScanError>;
