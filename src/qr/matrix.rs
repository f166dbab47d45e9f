use crate::bits::BitMatrix;
use crate::qr::format::{format_info_bits, mask_bit};
use crate::qr::version::{version_info_bits, EcLevel, Version};

// Function pattern layout
//------------------------------------------------------------------------------

/// Marks every module that carries structure rather than data: finders with
/// separators, timing, alignment, the dark module, and the reserved format
/// and version areas.
pub fn function_pattern_mask(version: &Version) -> BitMatrix {
    let dim = version.dimension();
    let mut mask = BitMatrix::square(dim);

    // Finder corners, including separators and format areas.
    mask.set_region(0, 0, 9, 9);
    mask.set_region(dim - 8, 0, 8, 9);
    mask.set_region(0, dim - 8, 9, 8);

    // Timing rows share index 6 with the finder regions already marked.
    for i in 0..dim {
        mask.set(i, 6);
        mask.set(6, i);
    }

    let centers = version.alignment_centers;
    for &cy in centers {
        for &cx in centers {
            if covers_finder(dim, cx, cy) {
                continue;
            }
            mask.set_region(cx - 2, cy - 2, 5, 5);
        }
    }

    if version.number >= 7 {
        mask.set_region(dim - 11, 0, 3, 6);
        mask.set_region(0, dim - 11, 6, 3);
    }
    mask
}

fn covers_finder(dim: usize, cx: usize, cy: usize) -> bool {
    (cx < 9 && cy < 9) || (cx >= dim - 9 && cy < 9) || (cx < 9 && cy >= dim - 9)
}

// Symbol matrix
//------------------------------------------------------------------------------

/// A fully drawn symbol: function patterns, masked data, and info fields.
pub fn build_symbol(
    version: &'static Version,
    level: EcLevel,
    mask: u8,
    codewords: &[u8],
) -> BitMatrix {
    let dim = version.dimension();
    let func = function_pattern_mask(version);
    let mut grid = BitMatrix::square(dim);

    draw_finder(&mut grid, 0, 0);
    draw_finder(&mut grid, dim - 7, 0);
    draw_finder(&mut grid, 0, dim - 7);

    for i in (8..dim - 8).step_by(2) {
        grid.set(i, 6);
        grid.set(6, i);
    }

    for &cy in version.alignment_centers {
        for &cx in version.alignment_centers {
            if covers_finder(dim, cx, cy) {
                continue;
            }
            draw_alignment(&mut grid, cx, cy);
        }
    }

    // Dark module above the bottom-left finder.
    grid.set(8, dim - 8);

    place_data(&mut grid, &func, mask, codewords);
    draw_format_info(&mut grid, level, mask);
    if version.number >= 7 {
        draw_version_info(&mut grid, version);
    }
    grid
}

fn draw_finder(grid: &mut BitMatrix, left: usize, top: usize) {
    for dy in 0..7 {
        for dx in 0..7 {
            let ring = dx == 0 || dx == 6 || dy == 0 || dy == 6;
            let core = (2..=4).contains(&dx) && (2..=4).contains(&dy);
            if ring || core {
                grid.set(left + dx, top + dy);
            }
        }
    }
}

fn draw_alignment(grid: &mut BitMatrix, cx: usize, cy: usize) {
    for dy in 0..5usize {
        for dx in 0..5usize {
            let ring = dx == 0 || dx == 4 || dy == 0 || dy == 4;
            if ring || (dx == 2 && dy == 2) {
                grid.set(cx - 2 + dx, cy - 2 + dy);
            }
        }
    }
}

/// Zigzag placement: two-module columns from the right edge, alternating up
/// and down, hopping over the vertical timing column.
fn place_data(grid: &mut BitMatrix, func: &BitMatrix, mask: u8, codewords: &[u8]) {
    let dim = grid.width();
    let total_bits = codewords.len() * 8;
    let mut bit_index = 0usize;
    let mut upward = true;
    let mut col = dim as isize - 1;
    while col > 0 {
        if col == 6 {
            col -= 1;
        }
        for i in 0..dim {
            let y = if upward { dim - 1 - i } else { i };
            for dx in 0..2usize {
                let x = (col as usize) - dx;
                if func.get(x, y) {
                    continue;
                }
                // Remainder positions past the last codeword stay light
                // before masking.
                let mut bit = bit_index < total_bits
                    && (codewords[bit_index / 8] >> (7 - bit_index % 8)) & 1 != 0;
                bit_index += 1;
                if mask_bit(mask, x, y) {
                    bit = !bit;
                }
                if bit {
                    grid.set(x, y);
                }
            }
        }
        upward = !upward;
        col -= 2;
    }
    debug_assert!(bit_index >= total_bits, "Codewords overflow the data region");
}

fn draw_format_info(grid: &mut BitMatrix, level: EcLevel, mask: u8) {
    let dim = grid.width();
    let bits = format_info_bits(level, mask);

    let set_if = |grid: &mut BitMatrix, x: usize, y: usize, on: bool| {
        if on {
            grid.set(x, y);
        } else {
            grid.unset(x, y);
        }
    };

    // Copy around the top-left finder, bit 14 first.
    for i in 0..6 {
        set_if(grid, i, 8, (bits >> (14 - i)) & 1 != 0);
    }
    set_if(grid, 7, 8, (bits >> 8) & 1 != 0);
    set_if(grid, 8, 8, (bits >> 7) & 1 != 0);
    set_if(grid, 8, 7, (bits >> 6) & 1 != 0);
    for i in 0..6 {
        set_if(grid, 8, 5 - i, (bits >> (5 - i)) & 1 != 0);
    }

    // Second copy split across the other two finders: low bits run left from
    // the top-right corner, high bits run down beside the bottom-left finder.
    for i in 0..8 {
        set_if(grid, dim - 1 - i, 8, (bits >> i) & 1 != 0);
    }
    for i in 0..7 {
        set_if(grid, 8, dim - 7 + i, (bits >> (8 + i)) & 1 != 0);
    }
}

fn draw_version_info(grid: &mut BitMatrix, version: &Version) {
    let dim = grid.width();
    let bits = version_info_bits(version.number);
    // 6x3 block above the bottom-left finder, low bit nearest the corner,
    // and its transpose left of the top-right finder.
    for k in 0..18usize {
        let on = (bits >> k) & 1 != 0;
        let row = k / 3;
        let col = k % 3;
        if on {
            grid.set(row, dim - 11 + col);
            grid.set(dim - 11 + col, row);
        }
    }
}

// Codeword extraction
//------------------------------------------------------------------------------

/// Walks the same zigzag as placement and returns the unmasked codewords.
/// `mirrored` reads the transposed matrix, for symbols seen through glass.
pub fn read_codewords(
    matrix: &BitMatrix,
    version: &Version,
    mask: u8,
    mirrored: bool,
) -> Vec<u8> {
    let dim = matrix.width();
    let func = function_pattern_mask(version);
    let total = version.total_codewords();
    let mut codewords = Vec::with_capacity(total);

    let mut current = 0u8;
    let mut bits_in_current = 0usize;
    let mut upward = true;
    let mut col = dim as isize - 1;
    while col > 0 && codewords.len() < total {
        if col == 6 {
            col -= 1;
        }
        for i in 0..dim {
            let y = if upward { dim - 1 - i } else { i };
            for dx in 0..2usize {
                let x = (col as usize) - dx;
                if func.get(x, y) {
                    continue;
                }
                let mut bit = if mirrored { matrix.get(y, x) } else { matrix.get(x, y) };
                if mask_bit(mask, x, y) {
                    bit = !bit;
                }
                current = (current << 1) | bit as u8;
                bits_in_current += 1;
                if bits_in_current == 8 {
                    codewords.push(current);
                    current = 0;
                    bits_in_current = 0;
                    if codewords.len() == total {
                        return codewords;
                    }
                }
            }
        }
        upward = !upward;
        col -= 2;
    }
    codewords
}

// Mask evaluation
//------------------------------------------------------------------------------

const PENALTY_RUN: u32 = 3;
const PENALTY_BLOCK: u32 = 3;
const PENALTY_FINDER_LOOKALIKE: u32 = 40;
const PENALTY_BALANCE: u32 = 10;

/// Standard four-rule penalty. Lower is better.
pub fn penalty_score(grid: &BitMatrix) -> u32 {
    let dim = grid.width();
    let mut score = 0u32;

    // Rule 1: runs of five or more like modules, both axes.
    for axis in 0..2 {
        for a in 0..dim {
            let mut run = 1usize;
            let mut prev = if axis == 0 { grid.get(0, a) } else { grid.get(a, 0) };
            for b in 1..dim {
                let cur = if axis == 0 { grid.get(b, a) } else { grid.get(a, b) };
                if cur == prev {
                    run += 1;
                } else {
                    if run >= 5 {
                        score += PENALTY_RUN + (run as u32 - 5);
                    }
                    run = 1;
                    prev = cur;
                }
            }
            if run >= 5 {
                score += PENALTY_RUN + (run as u32 - 5);
            }
        }
    }

    // Rule 2: 2x2 blocks of one color.
    for y in 0..dim - 1 {
        for x in 0..dim - 1 {
            let v = grid.get(x, y);
            if grid.get(x + 1, y) == v && grid.get(x, y + 1) == v && grid.get(x + 1, y + 1) == v {
                score += PENALTY_BLOCK;
            }
        }
    }

    // Rule 3: 1:1:3:1:1 ratio with a 4-module light flank, either side.
    const PAT_A: [bool; 11] = [
        true, false, true, true, true, false, true, false, false, false, false,
    ];
    const PAT_B: [bool; 11] = [
        false, false, false, false, true, false, true, true, true, false, true,
    ];
    for axis in 0..2 {
        for a in 0..dim {
            for start in 0..=dim.saturating_sub(11) {
                let matches = |pat: &[bool; 11]| {
                    pat.iter().enumerate().all(|(i, &p)| {
                        let v = if axis == 0 {
                            grid.get(start + i, a)
                        } else {
                            grid.get(a, start + i)
                        };
                        v == p
                    })
                };
                if matches(&PAT_A) || matches(&PAT_B) {
                    score += PENALTY_FINDER_LOOKALIKE;
                }
            }
        }
    }

    // Rule 4: dark module balance in steps of five percent.
    let dark: usize = (0..dim)
        .map(|y| (0..dim).filter(|&x| grid.get(x, y)).count())
        .sum();
    let percent = (dark * 100) / (dim * dim);
    let deviation = percent.abs_diff(50) / 5;
    score += PENALTY_BALANCE * deviation as u32;

    score
}

/// Draws the symbol under each mask and keeps the lowest penalty.
pub fn choose_mask(version: &'static Version, level: EcLevel, codewords: &[u8]) -> (u8, BitMatrix) {
    let mut best: Option<(u32, u8, BitMatrix)> = None;
    for mask in 0..8u8 {
        let grid = build_symbol(version, level, mask, codewords);
        let score = penalty_score(&grid);
        match &best {
            Some((s, _, _)) if *s <= score => {}
            _ => best = Some((score, mask, grid)),
        }
    }
    let (_, mask, grid) = best.unwrap_or_else(|| unreachable!("Eight masks were scored"));
    (mask, grid)
}

#[cfg(test)]
mod matrix_tests {
    use super::*;

    #[test]
    fn test_function_mask_counts() {
        // Data capacity must equal the codeword total plus remainder bits.
        for number in [1usize, 2, 7, 25, 40] {
            let v = Version::get(number).unwrap();
            let dim = v.dimension();
            let func = function_pattern_mask(v);
            let data_modules: usize = (0..dim)
                .map(|y| (0..dim).filter(|&x| !func.get(x, y)).count())
                .sum();
            assert_eq!(data_modules / 8, v.total_codewords(), "version {number}");
        }
    }

    #[test]
    fn test_symbol_has_finders_and_dark_module() {
        let v = Version::get(2).unwrap();
        let grid = build_symbol(v, EcLevel::M, 3, &vec![0u8; v.total_codewords()]);
        let dim = grid.width();
        // Finder cores.
        assert!(grid.get(3, 3));
        assert!(grid.get(dim - 4, 3));
        assert!(grid.get(3, dim - 4));
        // Separators stay light.
        assert!(!grid.get(7, 3));
        // Dark module.
        assert!(grid.get(8, dim - 8));
        // Alignment center for this version.
        assert!(grid.get(18, 18));
    }

    #[test]
    fn test_placement_roundtrip() {
        let v = Version::get(3).unwrap();
        let codewords: Vec<u8> =
            (0..v.total_codewords()).map(|i| (i * 37 + 11) as u8).collect();
        for mask in 0..8u8 {
            let grid = build_symbol(v, EcLevel::Q, mask, &codewords);
            assert_eq!(read_codewords(&grid, v, mask, false), codewords);
        }
    }

    #[test]
    fn test_mirrored_read() {
        let v = Version::get(1).unwrap();
        let codewords: Vec<u8> = (0..v.total_codewords()).map(|i| i as u8 ^ 0xA5).collect();
        let grid = build_symbol(v, EcLevel::L, 6, &codewords);
        // Transpose the drawn symbol and read it back mirrored.
        let dim = grid.width();
        let mut flipped = BitMatrix::square(dim);
        for y in 0..dim {
            for x in 0..dim {
                if grid.get(x, y) {
                    flipped.set(y, x);
                }
            }
        }
        assert_eq!(read_codewords(&flipped, v, 6, true), codewords);
    }

    #[test]
    fn test_penalty_prefers_balanced() {
        let mut all_dark = BitMatrix::square(21);
        all_dark.set_region(0, 0, 21, 21);
        let mixed = build_symbol(
            Version::get(1).unwrap(),
            EcLevel::L,
            0,
            &[0x6Au8; 26],
        );
        assert!(penalty_score(&mixed) < penalty_score(&all_dark));
    }
}
