//! End-to-end round trips: encode, rasterize, then scan the pixels back.

use image::imageops;
use image::GrayImage;

use symscan::encode::{
    encode_ean13, encode_qr, render_qr, render_row, QrOptions, StructuredAppend,
};
use symscan::qr::encoder::structured_append_parity;
use symscan::qr::version::EcLevel;
use symscan::{
    decode_multiple, reassemble_structured_append, BinaryBitmap, DecodeHints, Format, LumaSource,
    Metadata, MultiFormatScanner,
};

fn bitmap(img: &GrayImage) -> BinaryBitmap {
    BinaryBitmap::new(LumaSource::from(img))
}

fn scan(img: &GrayImage, hints: &DecodeHints) -> symscan::ScanResult<symscan::Decoded> {
    MultiFormatScanner::new(hints).decode(&bitmap(img), hints)
}

/// Pastes rendered symbols onto one white canvas.
fn compose(symbols: &[(&GrayImage, usize, usize)], width: usize, height: usize) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width as u32, height as u32, image::Luma([255]));
    for (img, left, top) in symbols {
        for (x, y, pixel) in img.enumerate_pixels() {
            canvas.put_pixel(*left as u32 + x, *top as u32 + y, *pixel);
        }
    }
    canvas
}

#[test]
fn test_qr_roundtrip_all_ec_levels() {
    for level in [EcLevel::L, EcLevel::M, EcLevel::Q, EcLevel::H] {
        let text = format!("round trip at level {}", level.letter());
        let opts = QrOptions { level: Some(level), ..Default::default() };
        let img = render_qr(&encode_qr(&text, &opts).unwrap(), 4);

        let result = scan(&img, &DecodeHints::default()).unwrap();
        assert_eq!(result.text, text);
        assert_eq!(result.format, Format::QrCode);
        assert!(result
            .metadata()
            .iter()
            .any(|m| *m == Metadata::ErrorCorrectionLevel(level.letter())));
    }
}

#[test]
fn test_qr_roundtrip_non_latin_text() {
    let text = "こんにちは世界";
    let img = render_qr(&encode_qr(text, &QrOptions::default()).unwrap(), 4);
    let result = scan(&img, &DecodeHints::default()).unwrap();
    assert_eq!(result.text, text);
}

#[test]
fn test_ean13_image_roundtrip() {
    let img = render_row(&encode_ean13("4006381333931").unwrap(), 3, 50);
    let result = scan(&img, &DecodeHints::default()).unwrap();
    assert_eq!(result.text, "4006381333931");
    assert_eq!(result.format, Format::Ean13);
}

#[test]
fn test_upside_down_symbol() {
    let img = imageops::rotate180(&render_row(&encode_ean13("5012345678900").unwrap(), 3, 50));
    let result = scan(&img, &DecodeHints::default()).unwrap();
    assert_eq!(result.text, "5012345678900");
    assert_eq!(result.orientation(), 180);
}

#[test]
fn test_vertical_symbol_needs_try_harder() {
    let img = imageops::rotate90(&render_row(&encode_ean13("4006381333931").unwrap(), 3, 50));

    assert!(scan(&img, &DecodeHints::default()).is_err());

    let hints = DecodeHints { try_harder: true, ..Default::default() };
    let result = scan(&img, &hints).unwrap();
    assert_eq!(result.text, "4006381333931");
    assert_eq!(result.orientation(), 270);
}

#[test]
fn test_multi_symbol_structured_append() {
    let message = "first half + second half";
    let (a, b) = message.split_at(12);
    let parity = structured_append_parity(message);

    let part = |index: u8, text: &str| {
        let opts = QrOptions {
            structured_append: Some(StructuredAppend { index, total: 2, parity }),
            ..Default::default()
        };
        render_qr(&encode_qr(text, &opts).unwrap(), 4)
    };
    let left = part(0, a);
    let right = part(1, b);

    // Wide gap so the region split recurses past the first hit.
    let gap = 120;
    let width = left.width() as usize + gap + right.width() as usize;
    let height = left.height().max(right.height()) as usize;
    let img = compose(
        &[(&left, 0, 0), (&right, left.width() as usize + gap, 0)],
        width,
        height,
    );

    let hints = DecodeHints::default();
    let mut scanner = MultiFormatScanner::new(&hints);
    let results = decode_multiple(&mut scanner, &bitmap(&img), &hints).unwrap();
    assert_eq!(results.len(), 2);

    let merged = reassemble_structured_append(results);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].text, message);
}

#[test]
fn test_random_noise_never_decodes() {
    use rand::Rng;

    let mut rng = rand::rng();
    for _ in 0..20 {
        let buf: Vec<u8> = (0..120 * 120).map(|_| rng.random()).collect();
        let source = LumaSource::new(buf, 120, 120).unwrap();
        let hints = DecodeHints::default();
        let outcome = MultiFormatScanner::new(&hints).decode(&BinaryBitmap::new(source), &hints);
        assert!(outcome.is_err());
    }
}

mod roundtrip_proptests {
    use proptest::prelude::*;

    use super::*;
    use symscan::oned::upc_ean::standard_checksum;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn proptest_ean13_payloads(payload in "[0-9]{12}") {
            let digits: Vec<u8> =
                payload.bytes().map(|b| b - b'0').collect();
            let check = standard_checksum(&digits);
            let mut expected = format!("{payload}{check}");
            // An implied-leading-zero code reads back in its UPC-A form.
            if expected.starts_with('0') {
                expected.remove(0);
            }

            let img = render_row(&encode_ean13(&payload).unwrap(), 3, 40);
            let result = scan(&img, &DecodeHints::default()).unwrap();
            prop_assert_eq!(result.text, expected);
        }

        #[test]
        fn proptest_qr_printable_ascii(text in "[ -~]{1,60}") {
            let img = render_qr(&encode_qr(&text, &QrOptions::default()).unwrap(), 3);
            let result = scan(&img, &DecodeHints::default()).unwrap();
            prop_assert_eq!(result.text, text);
        }
    }
}
