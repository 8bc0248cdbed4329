//! External contour tracing on binary masks.
//!
//! Foreground is 8-connected, background 4-connected. Only the outermost
//! boundary of each region is reported: holes are filled first, so regions
//! nested inside a hole of another region disappear into it.

use std::collections::VecDeque;

use headtrack_core::GrayImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Clockwise neighbour offsets in image coordinates (y down), starting east.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// After stepping in direction `d`, the background pixel examined just before
/// the step, seen from the new pixel.
const BACKTRACK: [usize; 8] = [6, 6, 0, 0, 2, 2, 4, 4];

const WEST: usize = 4;

/// Closed outer boundary of one connected region, in tracing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<[i32; 2]>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `[min_x, min_y, max_x, max_y]`, `None` for an empty contour.
    pub fn bounds(&self) -> Option<[i32; 4]> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            [first[0], first[1], first[0], first[1]],
            |[x0, y0, x1, y1], &[x, y]| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
        ))
    }
}

/// Trace the external contours of all foreground regions of `mask`.
///
/// Contours are returned in raster order of each region's first pixel; each
/// starts at that pixel and runs clockwise.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = mask.width, height = mask.height))
)]
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = (mask.width, mask.height);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let outside = background_reachable_from_border(mask);
    // Foreground plus holes.
    let solid = |x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
            return false;
        }
        !outside[y as usize * w + x as usize]
    };

    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();
    let mut queue = VecDeque::new();

    for y0 in 0..h {
        for x0 in 0..w {
            let idx0 = y0 * w + x0;
            if visited[idx0] || !solid(x0 as i32, y0 as i32) {
                continue;
            }

            visited[idx0] = true;
            queue.push_back((x0 as i32, y0 as i32));
            while let Some((x, y)) = queue.pop_front() {
                for (dx, dy) in DIRS {
                    let (nx, ny) = (x + dx, y + dy);
                    if !solid(nx, ny) {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if !visited[nidx] {
                        visited[nidx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }

            contours.push(trace_outer(&solid, [x0 as i32, y0 as i32], w * h));
        }
    }

    contours
}

/// Flood the background from the image border with 4-connectivity.
fn background_reachable_from_border(mask: &GrayImage) -> Vec<bool> {
    let (w, h) = (mask.width, mask.height);
    let mut outside = vec![false; w * h];
    let mut queue = VecDeque::new();

    let seed = |x: usize, y: usize, outside: &mut [bool], queue: &mut VecDeque<(usize, usize)>| {
        let idx = y * w + x;
        if mask.data[idx] == 0 && !outside[idx] {
            outside[idx] = true;
            queue.push_back((x, y));
        }
    };

    for x in 0..w {
        seed(x, 0, &mut outside, &mut queue);
        seed(x, h - 1, &mut outside, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut outside, &mut queue);
        seed(w - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            seed(x - 1, y, &mut outside, &mut queue);
        }
        if x + 1 < w {
            seed(x + 1, y, &mut outside, &mut queue);
        }
        if y > 0 {
            seed(x, y - 1, &mut outside, &mut queue);
        }
        if y + 1 < h {
            seed(x, y + 1, &mut outside, &mut queue);
        }
    }

    outside
}

/// Moore-neighbour tracing with Jacob's stopping criterion.
///
/// `start` must be the region's first pixel in raster order, so its west,
/// north-west, north and north-east neighbours are background.
fn trace_outer(solid: &impl Fn(i32, i32) -> bool, start: [i32; 2], max_steps: usize) -> Contour {
    let next_step = |p: [i32; 2], backtrack: usize| -> Option<usize> {
        (1..8)
            .map(|k| (backtrack + k) % 8)
            .find(|&d| solid(p[0] + DIRS[d].0, p[1] + DIRS[d].1))
    };

    let mut points = vec![start];
    let Some(first_dir) = next_step(start, WEST) else {
        // isolated pixel
        return Contour { points };
    };

    let mut p = start;
    let mut backtrack = WEST;
    // Each boundary pixel is entered at most once per incoming direction.
    for _ in 0..8 * max_steps + 8 {
        let Some(d) = next_step(p, backtrack) else {
            break;
        };
        if p == start && d == first_dir && points.len() > 1 {
            break;
        }
        p = [p[0] + DIRS[d].0, p[1] + DIRS[d].1];
        backtrack = BACKTRACK[d];
        points.push(p);
    }

    if points.len() > 1 && points.last() == Some(&start) {
        points.pop();
    }
    Contour { points }
}
