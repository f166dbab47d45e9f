//! Finding more than one symbol per image.
//!
//! Two strategies layered over [`MultiFormatScanner`]: a quadrant sweep for
//! a single symbol that sits off-center, and a recursive region split that
//! collects every distinct symbol in frame. QR structured-append groups
//! found this way can be reassembled into the original message.

use crate::binarize::BinaryBitmap;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::result::{Decoded, Format, Metadata};
use crate::scanner::MultiFormatScanner;

/// Regions smaller than this are not split further.
const MIN_DIMENSION_TO_RECUR: usize = 100;
const MAX_DEPTH: usize = 4;

// Quadrant sweep
//------------------------------------------------------------------------------

/// Decodes one symbol that may sit anywhere in frame by trying each
/// half-size quadrant, then the center. Points come back in whole-image
/// coordinates.
pub fn decode_by_quadrants(
    scanner: &mut MultiFormatScanner,
    image: &BinaryBitmap,
    hints: &DecodeHints,
) -> ScanResult<Decoded> {
    let half_width = image.width() / 2;
    let half_height = image.height() / 2;

    let quadrants = [
        (0, 0),
        (half_width, 0),
        (0, half_height),
        (half_width, half_height),
        (half_width / 2, half_height / 2),
    ];
    let mut last_err = ScanError::NotFound;
    for (left, top) in quadrants {
        let region = image.crop(left, top, half_width, half_height)?;
        scanner.reset();
        match scanner.decode(&region, hints) {
            Ok(mut result) => {
                result.translate_points(left as f32, top as f32);
                return Ok(result);
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

// Multi-symbol search
//------------------------------------------------------------------------------

/// Finds every decodable symbol by repeatedly decoding and then recursing
/// into the regions strictly left of, above, right of and below each hit.
/// Results are deduplicated by text.
pub fn decode_multiple(
    scanner: &mut MultiFormatScanner,
    image: &BinaryBitmap,
    hints: &DecodeHints,
) -> ScanResult<Vec<Decoded>> {
    let mut results = Vec::new();
    decode_region(scanner, image, hints, &mut results, 0.0, 0.0, 0);
    if results.is_empty() {
        return Err(ScanError::NotFound);
    }
    Ok(results)
}

fn decode_region(
    scanner: &mut MultiFormatScanner,
    image: &BinaryBitmap,
    hints: &DecodeHints,
    results: &mut Vec<Decoded>,
    x_offset: f32,
    y_offset: f32,
    depth: usize,
) {
    if depth > MAX_DEPTH {
        return;
    }
    scanner.reset();
    let Ok(result) = scanner.decode(image, hints) else {
        return;
    };

    let already_found = results.iter().any(|r| r.text == result.text);
    if !already_found {
        let mut translated = result.clone();
        translated.translate_points(x_offset, y_offset);
        results.push(translated);
    }
    if result.points.is_empty() {
        return;
    }

    let width = image.width();
    let height = image.height();
    let mut min_x = width as f32;
    let mut min_y = height as f32;
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for p in &result.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    if min_x > MIN_DIMENSION_TO_RECUR as f32 {
        if let Ok(region) = image.crop(0, 0, min_x as usize, height) {
            decode_region(scanner, &region, hints, results, x_offset, y_offset, depth + 1);
        }
    }
    if min_y > MIN_DIMENSION_TO_RECUR as f32 {
        if let Ok(region) = image.crop(0, 0, width, min_y as usize) {
            decode_region(scanner, &region, hints, results, x_offset, y_offset, depth + 1);
        }
    }
    if width > MIN_DIMENSION_TO_RECUR && max_x < (width - MIN_DIMENSION_TO_RECUR) as f32 {
        if let Ok(region) = image.crop(max_x as usize, 0, width - max_x as usize, height) {
            decode_region(
                scanner,
                &region,
                hints,
                results,
                x_offset + max_x,
                y_offset,
                depth + 1,
            );
        }
    }
    if height > MIN_DIMENSION_TO_RECUR && max_y < (height - MIN_DIMENSION_TO_RECUR) as f32 {
        if let Ok(region) = image.crop(0, max_y as usize, width, height - max_y as usize) {
            decode_region(
                scanner,
                &region,
                hints,
                results,
                x_offset,
                y_offset + max_y,
                depth + 1,
            );
        }
    }
}

// Structured append reassembly
//------------------------------------------------------------------------------

fn structured_append_sequence(result: &Decoded) -> Option<u8> {
    result.metadata().iter().find_map(|m| match m {
        Metadata::StructuredAppendSequence(seq) => Some(*seq),
        _ => None,
    })
}

/// Merges QR structured-append parts back into one message, ordered by
/// their sequence numbers rather than discovery order. Results without a
/// structured-append header pass through untouched.
pub fn reassemble_structured_append(results: Vec<Decoded>) -> Vec<Decoded> {
    let (mut parts, mut merged): (Vec<Decoded>, Vec<Decoded>) = results
        .into_iter()
        .partition(|r| structured_append_sequence(r).is_some());
    if parts.is_empty() {
        return merged;
    }

    // Sequence bytes pack the index in the high nibble, so byte order is
    // index order.
    parts.sort_by_key(|r| structured_append_sequence(r).unwrap_or(0));

    let mut text = String::new();
    let mut raw_bytes = Vec::new();
    for part in &parts {
        text.push_str(&part.text);
        raw_bytes.extend_from_slice(&part.raw_bytes);
    }
    merged.push(Decoded::new(text, raw_bytes, Vec::new(), Format::QrCode));
    merged
}

#[cfg(test)]
mod multi_tests {
    use super::*;
    use crate::luminance::LumaSource;
    use crate::result::Point;

    fn blended(symbols: &[(image::GrayImage, usize, usize)], width: usize, height: usize) -> BinaryBitmap {
        let mut buf = vec![255u8; width * height];
        for (img, left, top) in symbols {
            for (x, y, pixel) in img.enumerate_pixels() {
                buf[(top + y as usize) * width + left + x as usize] = pixel.0[0];
            }
        }
        BinaryBitmap::new(LumaSource::new(buf, width, height).unwrap())
    }

    fn qr_image(text: &str) -> image::GrayImage {
        let sym = crate::encode::encode_qr(text, &Default::default()).unwrap();
        crate::encode::render_qr(&sym, 4)
    }

    #[test]
    fn test_quadrant_decode_off_center() {
        let img = qr_image("corner");
        let dim = img.width() as usize;
        let bitmap = blended(&[(img, 0, 0)], dim * 3, dim * 3);

        let hints = DecodeHints::default();
        let mut scanner = MultiFormatScanner::new(&hints);
        let result = decode_by_quadrants(&mut scanner, &bitmap, &hints).unwrap();
        assert_eq!(result.text, "corner");
        // Points must land inside the top-left quadrant of the full image.
        assert!(result.points.iter().all(|p| p.x < (dim * 3 / 2) as f32));
    }

    #[test]
    fn test_decode_multiple_two_symbols() {
        let left = qr_image("left symbol");
        let right = qr_image("right symbol");
        let dim = left.width() as usize;
        let gap = MIN_DIMENSION_TO_RECUR + dim;
        let width = dim + gap + right.width() as usize;
        let bitmap = blended(&[(left, 0, 0), (right, dim + gap, 0)], width, dim);

        let hints = DecodeHints::default();
        let mut scanner = MultiFormatScanner::new(&hints);
        let results = decode_multiple(&mut scanner, &bitmap, &hints).unwrap();
        let mut texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        texts.sort_unstable();
        assert_eq!(texts, ["left symbol", "right symbol"]);
    }

    #[test]
    fn test_decode_multiple_short_image() {
        // A dimension under the recursion minimum must stop the split, not
        // wrap around.
        let row = crate::encode::encode_ean13("5901234123457").unwrap();
        let img = crate::encode::render_row(&row, 2, 50);
        let bitmap = BinaryBitmap::new(LumaSource::from(&img));
        let hints = DecodeHints::default();
        let mut scanner = MultiFormatScanner::new(&hints);
        let results = decode_multiple(&mut scanner, &bitmap, &hints).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "5901234123457");
    }

    #[test]
    fn test_decode_multiple_empty_image() {
        let bitmap = BinaryBitmap::new(
            LumaSource::new(vec![255; 150 * 150], 150, 150).unwrap(),
        );
        let hints = DecodeHints::default();
        let mut scanner = MultiFormatScanner::new(&hints);
        assert!(decode_multiple(&mut scanner, &bitmap, &hints).is_err());
    }

    #[test]
    fn test_structured_append_reassembly_orders_by_sequence() {
        let mut second = Decoded::new("WORLD".into(), vec![], vec![], Format::QrCode);
        second.put_metadata(Metadata::StructuredAppendSequence(0x11));
        let mut first = Decoded::new("HELLO ".into(), vec![], vec![], Format::QrCode);
        first.put_metadata(Metadata::StructuredAppendSequence(0x01));
        let plain = Decoded::new(
            "standalone".into(),
            vec![],
            vec![Point::new(1.0, 2.0)],
            Format::Ean13,
        );

        let merged = reassemble_structured_append(vec![second, plain, first]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "standalone");
        assert_eq!(merged[1].text, "HELLO WORLD");
    }
}
