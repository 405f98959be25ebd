//! Brush geometry: midpoint circles and Bresenham lines as pixel offsets.

use std::collections::BTreeSet;

use glam::IVec2;

#[derive(Debug, Clone)]
struct CachedCircle {
    radius: u32,
    offsets: Vec<IVec2>,
}

/// Produces brush footprints, remembering the last circle of each kind.
///
/// Filled and border circles are cached independently; each cache holds a
/// single radius and is recomputed when a different radius is requested.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    filled: Option<CachedCircle>,
    border: Option<CachedCircle>,
    computations: usize,
}

impl Rasterizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the offsets of a circle centered on `(0, 0)`.
    ///
    /// `filled` returns every interior pixel; otherwise only the one-pixel
    /// boundary of the same disc. Offsets are sorted by `y`, then `x`.
    pub fn circle(&mut self, radius: u32, filled: bool) -> &[IVec2] {
        let slot = if filled {
            &mut self.filled
        } else {
            &mut self.border
        };
        if slot.as_ref().map_or(true, |c| c.radius != radius) {
            let offsets = if filled {
                filled_circle(radius)
            } else {
                circle_border(radius)
            };
            self.computations += 1;
            *slot = Some(CachedCircle { radius, offsets });
        }
        match slot {
            Some(cached) => &cached.offsets,
            None => &[],
        }
    }

    /// Returns the radius currently cached for a circle kind.
    #[must_use]
    pub fn cached_radius(&self, filled: bool) -> Option<u32> {
        let slot = if filled { &self.filled } else { &self.border };
        slot.as_ref().map(|c| c.radius)
    }

    /// Number of circles computed so far (cache misses).
    #[must_use]
    pub fn computations(&self) -> usize {
        self.computations
    }

    /// Footprint of a brush dragged from `from` to `to`: the border circle
    /// stamped on every point of the line. Duplicates are removed; order is
    /// first-stamped first.
    pub fn stroke_segment(&mut self, from: IVec2, to: IVec2, radius: u32) -> Vec<IVec2> {
        let centers = line(from, to);
        let border = self.circle(radius, false);
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(centers.len() * border.len());
        for center in centers {
            for &offset in border {
                let p = center + offset;
                if seen.insert((p.y, p.x)) {
                    out.push(p);
                }
            }
        }
        out
    }
}

/// Bresenham line from `from` to `to`, both endpoints included.
#[must_use]
pub fn line(from: IVec2, to: IVec2) -> Vec<IVec2> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut p = from;
    #[allow(clippy::cast_sign_loss)]
    let mut points = Vec::with_capacity(dx.max(-dy) as usize + 1);

    loop {
        points.push(p);
        if p == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.x += sx;
        }
        if e2 <= dx {
            err += dx;
            p.y += sy;
        }
    }
    points
}

/// Every pixel of a midpoint-algorithm disc, filled with horizontal spans.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn filled_circle(radius: u32) -> Vec<IVec2> {
    let r = radius as i32;
    // Half-width of the span on each row offset.
    let mut half = vec![0i32; radius as usize + 1];
    let mut x = r;
    let mut y = 0;
    let mut err = 1 - r;
    while x >= y {
        half[y as usize] = half[y as usize].max(x);
        half[x as usize] = half[x as usize].max(y);
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }

    let mut out = Vec::new();
    for dy in -r..=r {
        let w = half[dy.unsigned_abs() as usize];
        out.extend((-w..=w).map(|dx| IVec2::new(dx, dy)));
    }
    out
}

/// Pixels of the filled disc with at least one 4-neighbor outside it.
fn circle_border(radius: u32) -> Vec<IVec2> {
    let disc = filled_circle(radius);
    let inside: BTreeSet<(i32, i32)> = disc.iter().map(|p| (p.x, p.y)).collect();
    disc.into_iter()
        .filter(|p| {
            [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .any(|(dx, dy)| !inside.contains(&(p.x + dx, p.y + dy)))
        })
        .collect()
}
