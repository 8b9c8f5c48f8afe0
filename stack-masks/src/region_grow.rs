//! Seeded region growing (flood fill) on a single channel image.
//!
//! Growth is a depth first traversal with an explicit work stack and
//! 4-connectivity. Every pixel is finalized at most once, either as
//! [`Segment::Filled`] or [`Segment::Boundary`], so a call is `O(width * height)`.

use log::debug;

use crate::{Intensity, IntensityGrid, MaskError};

/// Inclusion test relative to the intensity of the seed pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdPolicy {
    /// Include pixels with `value <= seed + tolerance` ("only darker pixels")
    #[default]
    AbsoluteCeiling,
    /// Include pixels with `|value - seed| <= tolerance`
    RelativeBand,
}

impl ThresholdPolicy {
    pub fn from_only_darker(only_darker_pixels: bool) -> Self {
        if only_darker_pixels {
            Self::AbsoluteCeiling
        } else {
            Self::RelativeBand
        }
    }

    fn admits(self, value: i64, seed: i64, tolerance: i64) -> bool {
        match self {
            ThresholdPolicy::AbsoluteCeiling => value <= seed + tolerance,
            ThresholdPolicy::RelativeBand => (value - seed).abs() <= tolerance,
        }
    }
}

/// Which neighbours are eligible growth targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeMargin {
    /// Every in-bounds neighbour
    #[default]
    Full,
    /// A neighbour must lie below `dimension - 1`, so the last row and the
    /// last column are never grown into
    ExcludeTrailing,
}

impl EdgeMargin {
    fn neighbours(
        self,
        x: usize,
        y: usize,
        [width, height]: [usize; 2],
    ) -> impl Iterator<Item = (usize, usize)> {
        let trailing = match self {
            EdgeMargin::Full => 0,
            EdgeMargin::ExcludeTrailing => 1,
        };
        [
            x.checked_sub(1).map(|x| (x, y)),
            (y + 1 + trailing < height).then_some((x, y + 1)),
            (x + 1 + trailing < width).then_some((x + 1, y)),
            y.checked_sub(1).map(|y| (x, y)),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segment {
    #[default]
    Unvisited,
    /// Reached, but failed the inclusion test
    Boundary,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationResult {
    size: [usize; 2],
    cells: Vec<Segment>,
}

impl SegmentationResult {
    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    /// Out of bounds positions are reported as [`Segment::Unvisited`]
    pub fn get(&self, x: usize, y: usize) -> Segment {
        if x < self.size[0] && y < self.size[1] {
            self.cells[y * self.size[0] + x]
        } else {
            Segment::Unvisited
        }
    }

    pub fn cells(&self) -> &[Segment] {
        &self.cells
    }

    pub fn filled(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.size[0];
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Segment::Filled)
            .map(move |(i, _)| (i % width, i / width))
    }

    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|s| **s == Segment::Filled)
            .count()
    }
}

/// Region growing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionGrow {
    pub tolerance: u32,
    pub policy: ThresholdPolicy,
    pub margin: EdgeMargin,
}

impl RegionGrow {
    pub fn new(tolerance: u32, policy: ThresholdPolicy) -> Self {
        Self {
            tolerance,
            policy,
            margin: EdgeMargin::default(),
        }
    }

    pub fn with_margin(self, margin: EdgeMargin) -> Self {
        Self { margin, ..self }
    }

    pub fn grow<T: Intensity>(
        &self,
        image: &IntensityGrid<T>,
        (seed_x, seed_y): (usize, usize),
    ) -> Result<SegmentationResult, MaskError> {
        let size @ [width, height] = image.size();
        if !image.contains(seed_x, seed_y) {
            return Err(MaskError::SeedOutOfBounds {
                x: seed_x as i64,
                y: seed_y as i64,
                width,
                height,
            });
        }

        let seed_value = image.sample(seed_x, seed_y);
        let tolerance = i64::from(self.tolerance);
        let mut cells = vec![Segment::Unvisited; width * height];
        let mut stack = vec![(seed_x, seed_y)];

        while let Some((x, y)) = stack.pop() {
            let cell = &mut cells[y * width + x];
            if *cell != Segment::Unvisited {
                continue;
            }
            if self.policy.admits(image.sample(x, y), seed_value, tolerance) {
                *cell = Segment::Filled;
                stack.extend(
                    self.margin
                        .neighbours(x, y, size)
                        .filter(|(nx, ny)| cells[ny * width + nx] == Segment::Unvisited),
                );
            } else {
                *cell = Segment::Boundary;
            }
        }

        let result = SegmentationResult { size, cells };
        debug!(
            "Region grow from ({seed_x}, {seed_y}) with {:?}/{}: {} pixels",
            self.policy,
            self.tolerance,
            result.filled_count()
        );
        Ok(result)
    }
}

/// Grows a region from `seed` using every in-bounds neighbour
pub fn grow<T: Intensity>(
    image: &IntensityGrid<T>,
    seed: (usize, usize),
    tolerance: u32,
    policy: ThresholdPolicy,
) -> Result<SegmentationResult, MaskError> {
    RegionGrow::new(tolerance, policy).grow(image, seed)
}
