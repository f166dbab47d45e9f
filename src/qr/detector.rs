use crate::bits::BitMatrix;
use crate::error::{ScanError, ScanResult};
use crate::hints::DecodeHints;
use crate::result::Point;

// Finder patterns
//------------------------------------------------------------------------------

const CENTER_QUORUM: usize = 2;
const MIN_SKIP: usize = 3;
const MAX_MODULES: usize = 97;

#[derive(Debug, Clone, Copy)]
struct FinderPattern {
    x: f32,
    y: f32,
    module_size: f32,
    count: usize,
}

impl FinderPattern {
    fn about_equals(&self, module_size: f32, x: f32, y: f32) -> bool {
        (self.y - y).abs() <= module_size
            && (self.x - x).abs() <= module_size
            && (self.module_size - module_size).abs() <= 1.0
    }

    fn combine(&mut self, x: f32, y: f32, module_size: f32) {
        let n = self.count as f32;
        self.x = (n * self.x + x) / (n + 1.0);
        self.y = (n * self.y + y) / (n + 1.0);
        self.module_size = (n * self.module_size + module_size) / (n + 1.0);
        self.count += 1;
    }

    fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// True when five adjacent runs look like 1:1:3:1:1 within 50 percent per
/// module.
fn found_pattern_cross(counts: &[usize; 5]) -> bool {
    let total: usize = counts.iter().sum();
    if total < 7 {
        return false;
    }
    let module_size = total as f32 / 7.0;
    let max_variance = module_size / 2.0;
    (counts[0] as f32 - module_size).abs() < max_variance
        && (counts[1] as f32 - module_size).abs() < max_variance
        && (counts[2] as f32 - 3.0 * module_size).abs() < 3.0 * max_variance
        && (counts[3] as f32 - module_size).abs() < max_variance
        && (counts[4] as f32 - module_size).abs() < max_variance
}

fn center_from_end(counts: &[usize; 5], end: usize) -> f32 {
    (end - counts[4] - counts[3]) as f32 - counts[2] as f32 / 2.0
}

struct FinderScanner<'a> {
    image: &'a BitMatrix,
    centers: Vec<FinderPattern>,
}

impl<'a> FinderScanner<'a> {
    fn new(image: &'a BitMatrix) -> Self {
        Self { image, centers: Vec::new() }
    }

    fn cross_check_vertical(
        &self,
        start_y: usize,
        center_x: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        let max_y = image.height();
        let mut counts = [0usize; 5];

        let mut y = start_y as isize;
        while y >= 0 && image.get(center_x, y as usize) {
            counts[2] += 1;
            y -= 1;
        }
        if y < 0 {
            return None;
        }
        while y >= 0 && !image.get(center_x, y as usize) && counts[1] <= max_count {
            counts[1] += 1;
            y -= 1;
        }
        if y < 0 || counts[1] > max_count {
            return None;
        }
        while y >= 0 && image.get(center_x, y as usize) && counts[0] <= max_count {
            counts[0] += 1;
            y -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        let mut y = start_y + 1;
        while y < max_y && image.get(center_x, y) {
            counts[2] += 1;
            y += 1;
        }
        if y == max_y {
            return None;
        }
        while y < max_y && !image.get(center_x, y) && counts[3] < max_count {
            counts[3] += 1;
            y += 1;
        }
        if y == max_y || counts[3] >= max_count {
            return None;
        }
        while y < max_y && image.get(center_x, y) && counts[4] < max_count {
            counts[4] += 1;
            y += 1;
        }
        if counts[4] >= max_count {
            return None;
        }

        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(original_total) >= 2 * original_total {
            return None;
        }
        found_pattern_cross(&counts).then(|| center_from_end(&counts, y))
    }

    fn cross_check_horizontal(
        &self,
        start_x: usize,
        center_y: usize,
        max_count: usize,
        original_total: usize,
    ) -> Option<f32> {
        let image = self.image;
        let max_x = image.width();
        let mut counts = [0usize; 5];

        let mut x = start_x as isize;
        while x >= 0 && image.get(x as usize, center_y) {
            counts[2] += 1;
            x -= 1;
        }
        if x < 0 {
            return None;
        }
        while x >= 0 && !image.get(x as usize, center_y) && counts[1] <= max_count {
            counts[1] += 1;
            x -= 1;
        }
        if x < 0 || counts[1] > max_count {
            return None;
        }
        while x >= 0 && image.get(x as usize, center_y) && counts[0] <= max_count {
            counts[0] += 1;
            x -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        let mut x = start_x + 1;
        while x < max_x && image.get(x, center_y) {
            counts[2] += 1;
            x += 1;
        }
        if x == max_x {
            return None;
        }
        while x < max_x && !image.get(x, center_y) && counts[3] < max_count {
            counts[3] += 1;
            x += 1;
        }
        if x == max_x || counts[3] >= max_count {
            return None;
        }
        while x < max_x && image.get(x, center_y) && counts[4] < max_count {
            counts[4] += 1;
            x += 1;
        }
        if counts[4] >= max_count {
            return None;
        }

        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(original_total) >= original_total {
            return None;
        }
        found_pattern_cross(&counts).then(|| center_from_end(&counts, x))
    }

    /// Confirms a row-scan candidate by re-walking the pattern vertically and
    /// horizontally through the proposed center.
    fn handle_possible_center(&mut self, counts: &[usize; 5], row: usize, end: usize, hints: &DecodeHints) -> bool {
        let total: usize = counts.iter().sum();
        let center_x = center_from_end(counts, end);
        let Some(center_y) =
            self.cross_check_vertical(row, center_x as usize, counts[2], total)
        else {
            return false;
        };
        let Some(center_x) =
            self.cross_check_horizontal(center_x as usize, center_y as usize, counts[2], total)
        else {
            return false;
        };

        let module_size = total as f32 / 7.0;
        for center in self.centers.iter_mut() {
            if center.about_equals(module_size, center_x, center_y) {
                center.combine(center_x, center_y, module_size);
                return true;
            }
        }
        self.centers.push(FinderPattern { x: center_x, y: center_y, module_size, count: 1 });
        hints.report_point(Point::new(center_x, center_y));
        true
    }

    fn find(&mut self, hints: &DecodeHints) -> ScanResult<[FinderPattern; 3]> {
        let image = self.image;
        let height = image.height();
        let width = image.width();
        let mut skip = (3 * height) / (4 * MAX_MODULES);
        if skip < MIN_SKIP || hints.try_harder {
            skip = MIN_SKIP;
        }

        let mut done = false;
        let mut row = skip - 1;
        while row < height && !done {
            let mut counts = [0usize; 5];
            let mut state = 0usize;
            for col in 0..width {
                if image.get(col, row) {
                    if state & 1 == 1 {
                        state += 1;
                    }
                    counts[state] += 1;
                } else if state & 1 == 0 {
                    if state == 4 {
                        if found_pattern_cross(&counts) {
                            if self.handle_possible_center(&counts, row, col, hints)
                                && self.confirmed_count() >= 3
                            {
                                done = true;
                            }
                            counts = [0; 5];
                            state = 0;
                        } else {
                            counts.copy_within(2.., 0);
                            counts[3] = 1;
                            counts[4] = 0;
                            state = 3;
                        }
                    } else {
                        state += 1;
                        counts[state] += 1;
                    }
                } else {
                    counts[state] += 1;
                }
            }
            if state == 4 && found_pattern_cross(&counts) {
                self.handle_possible_center(&counts, row, width, hints);
            }
            row += skip;
        }

        self.select_best_patterns()
    }

    fn confirmed_count(&self) -> usize {
        self.centers.iter().filter(|c| c.count >= CENTER_QUORUM).count()
    }

    /// Narrows candidates to the three whose module sizes agree best.
    fn select_best_patterns(&mut self) -> ScanResult<[FinderPattern; 3]> {
        if self.centers.len() < 3 {
            return Err(ScanError::NotFound);
        }
        if self.centers.len() > 3 {
            let mean: f32 = self.centers.iter().map(|c| c.module_size).sum::<f32>()
                / self.centers.len() as f32;
            self.centers.sort_by(|a, b| {
                let da = (a.module_size - mean).abs();
                let db = (b.module_size - mean).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
            self.centers.truncate(3);
        }
        Ok([self.centers[0], self.centers[1], self.centers[2]])
    }
}

/// Orders three centers as [bottom-left, top-left, top-right]: the farthest
/// apart pair is the diagonal, and the cross product fixes handedness.
fn order_patterns(mut p: [FinderPattern; 3]) -> [FinderPattern; 3] {
    let d01 = dist(&p[0], &p[1]);
    let d12 = dist(&p[1], &p[2]);
    let d02 = dist(&p[0], &p[2]);

    // Put the top-left candidate, the one off the longest side, in slot 1.
    if d12 >= d01 && d12 >= d02 {
        p.swap(0, 1);
    } else if d01 >= d02 && d01 >= d12 {
        p.swap(1, 2);
    }

    // Cross product of (A->B) x (A->C) with B = top-left.
    let cross = (p[2].x - p[1].x) * (p[0].y - p[1].y) - (p[2].y - p[1].y) * (p[0].x - p[1].x);
    if cross < 0.0 {
        p.swap(0, 2);
    }
    p
}

fn dist(a: &FinderPattern, b: &FinderPattern) -> f32 {
    a.point().distance(&b.point())
}

// Alignment pattern
//------------------------------------------------------------------------------

fn found_alignment_cross(counts: &[usize; 3], module_size: f32) -> bool {
    let max_variance = module_size / 2.0;
    counts
        .iter()
        .all(|&c| (c as f32 - module_size).abs() < max_variance)
}

/// Searches a small region for the alignment pattern: a lone dark module
/// with single-module light flanks, confirmed vertically. The target runs
/// are white:black:white, centered on the middle black.
fn find_alignment(
    image: &BitMatrix,
    module_size: f32,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
) -> Option<Point> {
    let right = (left + width).min(image.width());
    let bottom = (top + height).min(image.height());
    if left >= right || top >= bottom {
        return None;
    }

    // Middle-out row order: the estimate points at the pattern center, so
    // the true middle row is tried first.
    let middle = (top + bottom) / 2;
    let mut runs: Vec<(bool, usize, usize)> = Vec::new();
    for step in 0..bottom - top {
        let offset = (step + 1) / 2;
        let y = if step % 2 == 0 { middle + offset } else { middle.saturating_sub(offset) };
        if y < top || y >= bottom {
            continue;
        }
        runs.clear();
        for x in left..right {
            let dark = image.get(x, y);
            match runs.last_mut() {
                Some((color, _, len)) if *color == dark => *len += 1,
                _ => runs.push((dark, x, 1)),
            }
        }
        for i in 1..runs.len().saturating_sub(1) {
            let (dark, start, black) = runs[i];
            if !dark {
                continue;
            }
            let counts = [runs[i - 1].2, black, runs[i + 1].2];
            if !found_alignment_cross(&counts, module_size) {
                continue;
            }
            let cx = start as f32 + black as f32 / 2.0;
            if let Some(cy) = alignment_cross_check_vertical(image, y, cx as usize, module_size) {
                return Some(Point::new(cx, cy));
            }
        }
    }
    None
}

fn alignment_cross_check_vertical(
    image: &BitMatrix,
    start_y: usize,
    center_x: usize,
    module_size: f32,
) -> Option<f32> {
    if center_x >= image.width() {
        return None;
    }
    let max_count = (2.0 * module_size) as usize + 1;
    let max_y = image.height();
    let mut black = 0usize;
    let mut white_above = 0usize;
    let mut white_below = 0usize;

    let mut y = start_y as isize;
    while y >= 0 && image.get(center_x, y as usize) && black <= max_count {
        black += 1;
        y -= 1;
    }
    if y < 0 || black > max_count {
        return None;
    }
    while y >= 0 && !image.get(center_x, y as usize) && white_above <= max_count {
        white_above += 1;
        y -= 1;
    }
    if white_above > max_count {
        return None;
    }

    let mut y = start_y + 1;
    while y < max_y && image.get(center_x, y) && black <= max_count {
        black += 1;
        y += 1;
    }
    if y == max_y || black > max_count {
        return None;
    }
    let black_end = y;
    while y < max_y && !image.get(center_x, y) && white_below <= max_count {
        white_below += 1;
        y += 1;
    }
    if white_below > max_count {
        return None;
    }

    found_alignment_cross(&[white_above, black, white_below], module_size)
        .then(|| black_end as f32 - black as f32 / 2.0)
}

// Perspective transform
//------------------------------------------------------------------------------

/// Plane-to-plane projective map, as nine coefficients.
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveTransform {
    a11: f32, a21: f32, a31: f32,
    a12: f32, a22: f32, a32: f32,
    a13: f32, a23: f32, a33: f32,
}

impl PerspectiveTransform {
    pub fn quadrilateral_to_quadrilateral(src: [(f32, f32); 4], dst: [(f32, f32); 4]) -> Self {
        let q_to_s = Self::quadrilateral_to_square(src);
        let s_to_q = Self::square_to_quadrilateral(dst);
        s_to_q.times(&q_to_s)
    }

    fn square_to_quadrilateral(q: [(f32, f32); 4]) -> Self {
        let [(x0, y0), (x1, y1), (x2, y2), (x3, y3)] = q;
        let dx3 = x0 - x1 + x2 - x3;
        let dy3 = y0 - y1 + y2 - y3;
        if dx3 == 0.0 && dy3 == 0.0 {
            // Affine case.
            return Self {
                a11: x1 - x0, a21: x2 - x1, a31: x0,
                a12: y1 - y0, a22: y2 - y1, a32: y0,
                a13: 0.0, a23: 0.0, a33: 1.0,
            };
        }
        let dx1 = x1 - x2;
        let dx2 = x3 - x2;
        let dy1 = y1 - y2;
        let dy2 = y3 - y2;
        let denominator = dx1 * dy2 - dx2 * dy1;
        let a13 = (dx3 * dy2 - dx2 * dy3) / denominator;
        let a23 = (dx1 * dy3 - dx3 * dy1) / denominator;
        Self {
            a11: x1 - x0 + a13 * x1, a21: x3 - x0 + a23 * x3, a31: x0,
            a12: y1 - y0 + a13 * y1, a22: y3 - y0 + a23 * y3, a32: y0,
            a13, a23, a33: 1.0,
        }
    }

    fn quadrilateral_to_square(q: [(f32, f32); 4]) -> Self {
        Self::square_to_quadrilateral(q).build_adjoint()
    }

    fn build_adjoint(&self) -> Self {
        Self {
            a11: self.a22 * self.a33 - self.a23 * self.a32,
            a21: self.a23 * self.a31 - self.a21 * self.a33,
            a31: self.a21 * self.a32 - self.a22 * self.a31,
            a12: self.a13 * self.a32 - self.a12 * self.a33,
            a22: self.a11 * self.a33 - self.a13 * self.a31,
            a32: self.a12 * self.a31 - self.a11 * self.a32,
            a13: self.a12 * self.a23 - self.a13 * self.a22,
            a23: self.a13 * self.a21 - self.a11 * self.a23,
            a33: self.a11 * self.a22 - self.a12 * self.a21,
        }
    }

    fn times(&self, other: &Self) -> Self {
        Self {
            a11: self.a11 * other.a11 + self.a21 * other.a12 + self.a31 * other.a13,
            a21: self.a11 * other.a21 + self.a21 * other.a22 + self.a31 * other.a23,
            a31: self.a11 * other.a31 + self.a21 * other.a32 + self.a31 * other.a33,
            a12: self.a12 * other.a11 + self.a22 * other.a12 + self.a32 * other.a13,
            a22: self.a12 * other.a21 + self.a22 * other.a22 + self.a32 * other.a23,
            a32: self.a12 * other.a31 + self.a22 * other.a32 + self.a32 * other.a33,
            a13: self.a13 * other.a11 + self.a23 * other.a12 + self.a33 * other.a13,
            a23: self.a13 * other.a21 + self.a23 * other.a22 + self.a33 * other.a23,
            a33: self.a13 * other.a31 + self.a23 * other.a32 + self.a33 * other.a33,
        }
    }

    pub fn transform(&self, x: f32, y: f32) -> (f32, f32) {
        let denominator = self.a13 * x + self.a23 * y + self.a33;
        (
            (self.a11 * x + self.a21 * y + self.a31) / denominator,
            (self.a12 * x + self.a22 * y + self.a32) / denominator,
        )
    }
}

// Grid sampling
//------------------------------------------------------------------------------

fn sample_grid(
    image: &BitMatrix,
    transform: &PerspectiveTransform,
    dimension: usize,
) -> ScanResult<BitMatrix> {
    let mut bits = BitMatrix::square(dimension);
    let width = image.width() as f32;
    let height = image.height() as f32;
    for y in 0..dimension {
        for x in 0..dimension {
            let (px, py) = transform.transform(x as f32 + 0.5, y as f32 + 0.5);
            // A point slightly off-frame is clamped; far off means the
            // transform is bogus.
            if px < -1.0 || px > width || py < -1.0 || py > height {
                return Err(ScanError::NotFound);
            }
            let ix = (px.max(0.0) as usize).min(image.width() - 1);
            let iy = (py.max(0.0) as usize).min(image.height() - 1);
            if image.get(ix, iy) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

// Detector
//------------------------------------------------------------------------------

/// A sampled module grid plus the image points it was sampled between:
/// [bottom-left, top-left, top-right] and the alignment center when present.
pub struct Detection {
    pub bits: BitMatrix,
    pub points: Vec<Point>,
}

fn compute_dimension(tl: &FinderPattern, tr: &FinderPattern, bl: &FinderPattern, module_size: f32) -> ScanResult<usize> {
    let w = (dist(tl, tr) / module_size).round() as usize;
    let h = (dist(tl, bl) / module_size).round() as usize;
    let mut dimension = (w + h) / 2 + 7;
    match dimension % 4 {
        0 => dimension += 1,
        2 => dimension -= 1,
        3 => return Err(ScanError::NotFound),
        _ => {}
    }
    Ok(dimension)
}

/// Locates one symbol in the image and samples its module grid.
pub fn detect(image: &BitMatrix, hints: &DecodeHints) -> ScanResult<Detection> {
    let mut scanner = FinderScanner::new(image);
    let patterns = scanner.find(hints)?;
    let [bl, tl, tr] = order_patterns(patterns);

    let module_size = (tl.module_size + tr.module_size + bl.module_size) / 3.0;
    if module_size < 1.0 {
        return Err(ScanError::NotFound);
    }
    let dimension = compute_dimension(&tl, &tr, &bl, module_size)?;
    let modules_between_centers = dimension - 7;

    // Alignment pattern lives near the would-be fourth corner on version 2+.
    let mut alignment: Option<Point> = None;
    if dimension >= 25 {
        let correction = 1.0 - 3.0 / modules_between_centers as f32;
        let est_x = tl.x + correction * (tr.x + bl.x - tl.x - tl.x);
        let est_y = tl.y + correction * (tr.y + bl.y - tl.y - tl.y);
        for allowance in [4usize, 8, 16] {
            let allowance_px = (allowance as f32 * module_size) as usize;
            let left = (est_x as usize).saturating_sub(allowance_px);
            let top = (est_y as usize).saturating_sub(allowance_px);
            alignment =
                find_alignment(image, module_size, left, top, 2 * allowance_px, 2 * allowance_px);
            if alignment.is_some() {
                break;
            }
        }
    }

    let dim_minus_three = dimension as f32 - 3.5;
    let (src_br, dst_br) = match alignment {
        Some(p) => ((dim_minus_three - 3.0, dim_minus_three - 3.0), (p.x, p.y)),
        // Without an alignment fix, assume a parallelogram.
        None => ((dim_minus_three, dim_minus_three), (tr.x - tl.x + bl.x, tr.y - tl.y + bl.y)),
    };
    let transform = PerspectiveTransform::quadrilateral_to_quadrilateral(
        [(3.5, 3.5), (dim_minus_three, 3.5), (src_br.0, src_br.1), (3.5, dim_minus_three)],
        [(tl.x, tl.y), (tr.x, tr.y), (dst_br.0, dst_br.1), (bl.x, bl.y)],
    );
    let bits = sample_grid(image, &transform, dimension)?;

    let mut points = vec![bl.point(), tl.point(), tr.point()];
    if let Some(p) = alignment {
        points.push(p);
    }
    Ok(Detection { bits, points })
}

// Pure symbol extraction
//------------------------------------------------------------------------------

/// Fast path for synthetic images: an axis-aligned symbol with only quiet
/// zone around it. Module size is read off the top finder run.
pub fn extract_pure(image: &BitMatrix) -> ScanResult<Detection> {
    let (left, top) = image.top_left_on_bit().ok_or(ScanError::NotFound)?;
    let (right, bottom) = image.bottom_right_on_bit().ok_or(ScanError::NotFound)?;

    // Walk the finder diagonal: its 1:1:3:1:1 runs span seven modules, so
    // the fifth transition marks seven module widths from the corner.
    let mut transitions = 0;
    let mut x = left;
    let mut y = top;
    let mut in_black = true;
    while x <= right && y <= bottom {
        if image.get(x, y) != in_black {
            transitions += 1;
            if transitions == 5 {
                break;
            }
            in_black = !in_black;
        }
        x += 1;
        y += 1;
    }
    if transitions < 5 {
        return Err(ScanError::NotFound);
    }
    let module_size = (x - left) as f32 / 7.0;
    if module_size < 1.0 {
        return Err(ScanError::NotFound);
    }

    let width = right - left + 1;
    let height = bottom - top + 1;
    let dimension = (width as f32 / module_size).round() as usize;
    if dimension < 21 || dimension % 4 != 1 {
        return Err(ScanError::NotFound);
    }
    if ((height as f32 / module_size).round() as usize) != dimension {
        return Err(ScanError::NotFound);
    }

    let mut bits = BitMatrix::square(dimension);
    for y in 0..dimension {
        for x in 0..dimension {
            let px = left + (module_size * (x as f32 + 0.5)) as usize;
            let py = top + (module_size * (y as f32 + 0.5)) as usize;
            if image.get(px.min(right), py.min(bottom)) {
                bits.set(x, y);
            }
        }
    }
    Ok(Detection {
        bits,
        points: vec![
            Point::new(left as f32, bottom as f32),
            Point::new(left as f32, top as f32),
            Point::new(right as f32, top as f32),
        ],
    })
}
