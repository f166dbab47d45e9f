//! # symscan
//!
//! A Rust library for reading and writing optical symbols: the retail and
//! logistics 1D barcodes (UPC-A, EAN-13/8, Code 39/93/128, ITF, Codabar,
//! GS1 DataBar and DataBar Expanded) and QR codes with Reed-Solomon error
//! correction.
//!
//! ## Features
//!
//! - **1D decoding**: middle-out row sweeps over a binarized image, with
//!   upside-down and (under `try_harder`) rotated retries
//! - **QR detection and decoding**: finder pattern search, perspective
//!   sampling, mirror retry and per-block Reed-Solomon correction
//! - **Encoding**: QR symbols (mode and version selection, mask scoring,
//!   structured append) and EAN/UPC bar patterns, rendered to greyscale
//!   images via the `image` crate
//! - **Multi-symbol search**: quadrant sweeps and recursive region splits,
//!   plus structured-append reassembly
//!
//! ## Quick Start
//!
//! ### Decoding
//!
//! ```rust,no_run
//! use symscan::{BinaryBitmap, DecodeHints, LumaSource, MultiFormatScanner};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("symbol.png")?.to_luma8();
//! let bitmap = BinaryBitmap::new(LumaSource::from(&img));
//!
//! let hints = DecodeHints { try_harder: true, ..Default::default() };
//! let mut scanner = MultiFormatScanner::new(&hints);
//! let result = scanner.decode(&bitmap, &hints)?;
//! println!("{:?}: {}", result.format, result.text);
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding
//!
//! ```rust
//! use symscan::encode::{encode_qr, render_qr, QrOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let symbol = encode_qr("Hello, World!", &QrOptions::default())?;
//! let img = render_qr(&symbol, 4); // 4 pixels per module
//! # Ok(())
//! # }
//! ```
//!
//! Decode failure is a normal outcome: every miss surfaces as a
//! [`ScanError`] value, never a panic.

pub mod binarize;
pub mod bits;
pub mod ec;
pub mod encode;
pub mod error;
pub mod hints;
pub mod luminance;
pub mod multi;
pub mod oned;
pub mod pattern;
pub mod qr;
pub mod result;
pub mod scanner;

pub use binarize::BinaryBitmap;
pub use error::{ScanError, ScanResult};
pub use hints::DecodeHints;
pub use luminance::LumaSource;
pub use multi::{decode_by_quadrants, decode_multiple, reassemble_structured_append};
pub use result::{Decoded, Format, Metadata, Point};
pub use scanner::MultiFormatScanner;
