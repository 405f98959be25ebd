//! Smart-brush segmentation: intensity-bounded flood fill within one slice.

use bitvec::prelude::{BitVec, Lsb0};
use glam::IVec2;

use crate::error::{AtlasError, Result};
use crate::options::SmartBrushOptions;
use crate::sample::Sample;

const NEIGHBORS: [IVec2; 8] = [
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
];

/// Visited set over a `width * height` plane, row-major.
pub type PlaneMask = BitVec<usize, Lsb0>;

/// Creates an empty mask for a plane.
#[must_use]
pub fn plane_mask(width: u32, height: u32) -> PlaneMask {
    BitVec::repeat(false, width as usize * height as usize)
}

/// Grows a region from seed pixels across an intensity plane.
///
/// A neighbor is accepted when it has not been visited, differs from the
/// pixel it was reached from by strictly less than `neighbor_threshold`,
/// and lies within `[min(seeds) - seed_threshold, max(seeds) + seed_threshold]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionGrower {
    seed_threshold: f64,
    neighbor_threshold: f64,
}

impl RegionGrower {
    #[must_use]
    pub fn new(seed_threshold: f64, neighbor_threshold: f64) -> Self {
        Self {
            seed_threshold,
            neighbor_threshold,
        }
    }

    #[must_use]
    pub fn from_options(options: &SmartBrushOptions) -> Self {
        Self::new(options.seed_threshold, options.neighbor_threshold)
    }

    #[must_use]
    pub fn seed_threshold(&self) -> f64 {
        self.seed_threshold
    }

    #[must_use]
    pub fn neighbor_threshold(&self) -> f64 {
        self.neighbor_threshold
    }

    /// Runs the fill and returns the newly accepted pixels in visit order.
    ///
    /// `visited` starts as the pixels already painted in the current stroke;
    /// seeds and accepted pixels are marked in it, so each pixel is accepted
    /// at most once. Seeds outside the plane are ignored.
    ///
    /// # Errors
    /// Returns [`AtlasError::SizeMismatch`] if `intensity` or `visited` does
    /// not cover exactly `width * height` pixels.
    pub fn grow<I: Sample>(
        &self,
        intensity: &[I],
        width: u32,
        height: u32,
        seeds: &[IVec2],
        visited: &mut PlaneMask,
    ) -> Result<Vec<IVec2>> {
        let len = width as usize * height as usize;
        for actual in [intensity.len(), visited.len()] {
            if actual != len {
                return Err(AtlasError::SizeMismatch {
                    expected: len,
                    actual,
                });
            }
        }

        let index_of = |p: IVec2| -> Option<usize> {
            let x = u32::try_from(p.x).ok().filter(|&x| x < width)?;
            let y = u32::try_from(p.y).ok().filter(|&y| y < height)?;
            Some(y as usize * width as usize + x as usize)
        };

        let mut stack: Vec<IVec2> = Vec::with_capacity(seeds.len());
        let mut min_value = f64::INFINITY;
        let mut max_value = f64::NEG_INFINITY;
        for &seed in seeds {
            let Some(i) = index_of(seed) else {
                continue;
            };
            let value = intensity[i].to_f64();
            min_value = min_value.min(value);
            max_value = max_value.max(value);
            visited.set(i, true);
            stack.push(seed);
        }
        if stack.is_empty() {
            return Ok(Vec::new());
        }
        let min_value = min_value - self.seed_threshold;
        let max_value = max_value + self.seed_threshold;

        let mut accepted = Vec::new();
        while let Some(current) = stack.pop() {
            let Some(ci) = index_of(current) else {
                continue;
            };
            let current_value = intensity[ci].to_f64();
            for offset in NEIGHBORS {
                let neighbor = current + offset;
                let Some(ni) = index_of(neighbor) else {
                    continue;
                };
                if visited[ni] {
                    continue;
                }
                let value = intensity[ni].to_f64();
                if (current_value - value).abs() < self.neighbor_threshold
                    && (min_value..=max_value).contains(&value)
                {
                    visited.set(ni, true);
                    accepted.push(neighbor);
                    stack.push(neighbor);
                }
            }
        }
        log::debug!(
            "region grow from {} seeds accepted {} pixels in range [{min_value}, {max_value}]",
            seeds.len(),
            accepted.len()
        );
        Ok(accepted)
    }
}
