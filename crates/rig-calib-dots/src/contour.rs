//! Connected components and their outer boundaries on a binary mask.

use rig_calib_core::GrayImageView;
use std::collections::VecDeque;

/// Clockwise in image coordinates (y down), starting east.
const DIRS_8: [(i32, i32); 8] = [
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
    (0, -1),  // N
    (1, -1),  // NE
];

const WEST: usize = 4;

/// Ordered outer boundary of one 8-connected foreground component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    /// Boundary pixel centers in tracing order (clockwise on screen).
    pub points: Vec<(i32, i32)>,
    /// Number of pixels in the component.
    pub pixel_count: usize,
}

fn dir_index(dx: i32, dy: i32) -> usize {
    DIRS_8
        .iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(WEST)
}

/// Label 8-connected foreground components and trace the outer boundary of each.
///
/// Components are returned in the order their first pixel appears in a
/// row-major scan, so the output order is deterministic for a given mask.
pub fn find_component_contours(mask: &GrayImageView<'_>) -> Vec<Contour> {
    let w = mask.width as i32;
    let h = mask.height as i32;
    let mut labels = vec![0u32; mask.width * mask.height];
    let mut next_label = 1u32;
    let mut queue = VecDeque::new();
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if mask.get(x as usize, y as usize) == 0 || labels[idx] != 0 {
                continue;
            }

            let label = next_label;
            next_label += 1;
            labels[idx] = label;
            queue.push_back((x, y));
            let mut pixel_count = 0usize;

            while let Some((cx, cy)) = queue.pop_front() {
                pixel_count += 1;
                for (dx, dy) in DIRS_8 {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if mask.get(nx as usize, ny as usize) != 0 && labels[nidx] == 0 {
                        labels[nidx] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            let is_member = |px: i32, py: i32| {
                px >= 0 && py >= 0 && px < w && py < h && labels[(py * w + px) as usize] == label
            };
            let points = trace_boundary(is_member, (x, y), pixel_count);
            contours.push(Contour {
                points,
                pixel_count,
            });
        }
    }

    contours
}

/// Moore-neighbour tracing from the top-left pixel of a component.
///
/// `start` must be the first component pixel in row-major order, so its
/// western neighbour is guaranteed to lie outside the component.
fn trace_boundary(
    is_member: impl Fn(i32, i32) -> bool,
    start: (i32, i32),
    pixel_count: usize,
) -> Vec<(i32, i32)> {
    let mut contour = vec![start];
    let mut current = start;
    let mut back = WEST;
    let mut first_move: Option<(i32, i32)> = None;
    let max_steps = 4 * pixel_count + 16;

    for _ in 0..max_steps {
        let mut found = None;
        for step in 1..=8 {
            let k = (back + step) % 8;
            let cand = (current.0 + DIRS_8[k].0, current.1 + DIRS_8[k].1);
            if is_member(cand.0, cand.1) {
                let prev = (back + step - 1) % 8;
                let outside = (current.0 + DIRS_8[prev].0, current.1 + DIRS_8[prev].1);
                back = dir_index(outside.0 - cand.0, outside.1 - cand.1);
                found = Some(cand);
                break;
            }
        }

        // Isolated pixel.
        let Some(next) = found else { break };

        if current == start {
            match first_move {
                None => first_move = Some(next),
                Some(first) if first == next => break,
                Some(_) => {}
            }
        }

        current = next;
        contour.push(current);
    }

    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    contour
}

/// Area, perimeter and centroid of a closed contour polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContourMoments {
    pub area: f64,
    pub perimeter: f64,
    pub centroid: (f64, f64),
}

impl ContourMoments {
    /// `4 pi A / P^2`; 1.0 for a perfect circle, 0 for degenerate contours.
    pub fn circularity(&self) -> f64 {
        if self.perimeter <= f64::EPSILON {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area / (self.perimeter * self.perimeter)
    }
}

/// Green's-theorem moments of the polygon through the boundary pixel centers.
pub fn contour_moments(points: &[(i32, i32)]) -> ContourMoments {
    let n = points.len();
    let mut twice_area = 0.0f64;
    let mut mx = 0.0f64;
    let mut my = 0.0f64;
    let mut perimeter = 0.0f64;

    for i in 0..n {
        let (x0, y0) = (points[i].0 as f64, points[i].1 as f64);
        let (x1, y1) = (points[(i + 1) % n].0 as f64, points[(i + 1) % n].1 as f64);
        let cross = x0 * y1 - x1 * y0;
        twice_area += cross;
        mx += (x0 + x1) * cross;
        my += (y0 + y1) * cross;
        perimeter += (x1 - x0).hypot(y1 - y0);
    }

    let area = 0.5 * twice_area;
    let centroid = if area.abs() > 1e-9 {
        (mx / (6.0 * area), my / (6.0 * area))
    } else if n > 0 {
        // Zero-area polygon (line or single pixel): fall back to the vertex mean.
        let sx: f64 = points.iter().map(|p| p.0 as f64).sum();
        let sy: f64 = points.iter().map(|p| p.1 as f64).sum();
        (sx / n as f64, sy / n as f64)
    } else {
        (0.0, 0.0)
    };

    ContourMoments {
        area: area.abs(),
        perimeter: if n > 1 { perimeter } else { 0.0 },
        centroid,
    }
}
