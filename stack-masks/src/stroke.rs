use itertools::Itertools;

use crate::{MaskError, ThresholdPolicy};

/// Pixel coordinate in image space. May lie outside of the image, e.g. while
/// the pointer is dragged past the border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPos {
    pub x: i64,
    pub y: i64,
}

impl PixelPos {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Pixel containing the (fractional) pointer position
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self {
            x: x.floor() as i64,
            y: y.floor() as i64,
        }
    }

    /// `Some((x, y))` if the position lies within an image of `size`
    pub fn within(self, [width, height]: [usize; 2]) -> Option<(usize, usize)> {
        let x = usize::try_from(self.x).ok().filter(|x| *x < width)?;
        let y = usize::try_from(self.y).ok().filter(|y| *y < height)?;
        Some((x, y))
    }
}

impl From<(usize, usize)> for PixelPos {
    fn from((x, y): (usize, usize)) -> Self {
        Self::new(x as i64, y as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sign {
    #[default]
    Add,
    Remove,
}

impl Sign {
    /// Value written into the mask
    pub fn value(self) -> bool {
        matches!(self, Sign::Add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Point(PixelPos),
    /// All pixels within euclidean distance `radius` of `center`
    Disk { center: PixelPos, radius: u32 },
    /// Axis aligned square `center ± radius / 2`
    Block { center: PixelPos, radius: u32 },
    /// Closed polygon, filled with the even-odd rule
    Polygon(Vec<PixelPos>),
    RegionGrow {
        seed: PixelPos,
        tolerance: u32,
        policy: ThresholdPolicy,
    },
}

impl Shape {
    /// Calls `f` for every pixel covered by the shape, clipped to `size`.
    ///
    /// [`Shape::RegionGrow`] depends on image content and has no footprint of
    /// its own, it is resolved by the [`crate::MaskCanvas`].
    pub fn for_each_pixel(&self, size: [usize; 2], mut f: impl FnMut(usize, usize)) {
        match self {
            Shape::Point(p) => {
                if let Some((x, y)) = p.within(size) {
                    f(x, y);
                }
            }
            Shape::Disk { center, radius } => {
                let r = i64::from(*radius);
                let mut in_disk = |x: usize, y: usize| {
                    let dx = x as i64 - center.x;
                    let dy = y as i64 - center.y;
                    if dx * dx + dy * dy <= r * r {
                        f(x, y)
                    }
                };
                fill_rect(
                    size,
                    [center.x - r, center.y - r],
                    [center.x + r, center.y + r],
                    &mut in_disk,
                );
            }
            Shape::Block { center, radius } => {
                let half = i64::from(*radius / 2);
                fill_rect(
                    size,
                    [center.x - half, center.y - half],
                    [center.x + half, center.y + half],
                    &mut f,
                );
            }
            Shape::Polygon(points) => fill_polygon(points, size, f),
            Shape::RegionGrow { .. } => {}
        }
    }

    /// Collects the footprint of [`Shape::for_each_pixel`]
    pub fn pixels(&self, size: [usize; 2]) -> Vec<(usize, usize)> {
        let mut pixels = Vec::new();
        self.for_each_pixel(size, |x, y| pixels.push((x, y)));
        pixels
    }
}

/// Visits the inclusive rectangle `min..=max`, clipped to `size`
fn fill_rect(
    [width, height]: [usize; 2],
    [x0, y0]: [i64; 2],
    [x1, y1]: [i64; 2],
    f: &mut dyn FnMut(usize, usize),
) {
    for y in y0.max(0)..=y1.min(height as i64 - 1) {
        for x in x0.max(0)..=x1.min(width as i64 - 1) {
            f(x as usize, y as usize);
        }
    }
}

/// Scanline fill. Edges cover the rows `[min(y0, y1), max(y0, y1))`, so
/// horizontal edges and shared vertices never count twice.
fn fill_polygon(points: &[PixelPos], [width, height]: [usize; 2], mut f: impl FnMut(usize, usize)) {
    if points.len() < 3 || width == 0 || height == 0 {
        return;
    }
    let Some((min_y, max_y)) = points.iter().map(|p| p.y).minmax().into_option() else {
        return;
    };

    for y in min_y.max(0)..=max_y.min(height as i64 - 1) {
        let crossings = points
            .iter()
            .circular_tuple_windows()
            .filter(|(a, b)| (a.y <= y && y < b.y) || (b.y <= y && y < a.y))
            .map(|(a, b)| {
                a.x as f64 + (y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64
            })
            .sorted_by(f64::total_cmp)
            .collect::<Vec<_>>();

        for span in crossings.chunks_exact(2) {
            let x0 = (span[0].ceil() as i64).max(0);
            let x1 = (span[1].floor() as i64).min(width as i64 - 1);
            for x in x0..=x1 {
                f(x as usize, y as usize);
            }
        }
    }
}

/// One discrete edit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stroke {
    pub shape: Shape,
    pub sign: Sign,
}

impl Stroke {
    pub fn new(shape: Shape, sign: Sign) -> Self {
        Self { shape, sign }
    }

    pub fn add(shape: Shape) -> Self {
        Self::new(shape, Sign::Add)
    }

    pub fn remove(shape: Shape) -> Self {
        Self::new(shape, Sign::Remove)
    }

    /// Checks the preconditions which would make [`crate::MaskCanvas::apply`] fail
    pub fn validate(&self, size @ [width, height]: [usize; 2]) -> Result<(), MaskError> {
        match &self.shape {
            Shape::RegionGrow { seed, .. } if seed.within(size).is_none() => {
                Err(MaskError::SeedOutOfBounds {
                    x: seed.x,
                    y: seed.y,
                    width,
                    height,
                })
            }
            _ => Ok(()),
        }
    }
}
