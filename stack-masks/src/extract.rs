use crate::{IntensityGrid, LabelMask, PixelPos};

/// Axis aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    /// Rectangle spanned by two corners (both inclusive), clipped to `size`.
    /// Returns `None` if nothing of it lies within the image.
    pub fn from_corners(a: PixelPos, b: PixelPos, [width, height]: [usize; 2]) -> Option<Self> {
        let x0 = a.x.min(b.x).max(0);
        let y0 = a.y.min(b.y).max(0);
        let x1 = a.x.max(b.x).min(width as i64 - 1);
        let y1 = a.y.max(b.y).min(height as i64 - 1);
        (x0 <= x1 && y0 <= y1).then(|| Self {
            x: x0 as usize,
            y: y0 as usize,
            width: (x1 - x0 + 1) as usize,
            height: (y1 - y0 + 1) as usize,
        })
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x..self.x + self.width).contains(&x) && (self.y..self.y + self.height).contains(&y)
    }

    /// Corner positions in clockwise order, starting top left
    pub fn corners(&self) -> [PixelPos; 4] {
        let (x0, y0) = (self.x as i64, self.y as i64);
        let (x1, y1) = (x0 + self.width as i64 - 1, y0 + self.height as i64 - 1);
        [
            PixelPos::new(x0, y0),
            PixelPos::new(x1, y0),
            PixelPos::new(x1, y1),
            PixelPos::new(x0, y1),
        ]
    }
}

/// Rectangle seeded foreground segmentation, e.g. GrabCut.
///
/// The result must have the size of `image`. It is merged into the active
/// mask with [`crate::Sign::Add`].
pub trait ForegroundExtractor {
    fn extract(&self, image: &IntensityGrid, rect: PixelRect, iterations: u32) -> LabelMask;
}

impl<F> ForegroundExtractor for F
where
    F: Fn(&IntensityGrid, PixelRect, u32) -> LabelMask,
{
    fn extract(&self, image: &IntensityGrid, rect: PixelRect, iterations: u32) -> LabelMask {
        self(image, rect, iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_in_any_order() {
        let a = PixelPos::new(5, 1);
        let b = PixelPos::new(2, 3);
        let expected = PixelRect {
            x: 2,
            y: 1,
            width: 4,
            height: 3,
        };
        assert_eq!(PixelRect::from_corners(a, b, [10, 10]), Some(expected));
        assert_eq!(PixelRect::from_corners(b, a, [10, 10]), Some(expected));
        assert!(expected.contains(5, 3));
        assert!(!expected.contains(6, 3));
    }

    #[test]
    fn rect_is_clipped_to_image() {
        let rect = PixelRect::from_corners(PixelPos::new(-3, -3), PixelPos::new(20, 1), [8, 6]);
        assert_eq!(
            rect,
            Some(PixelRect {
                x: 0,
                y: 0,
                width: 8,
                height: 2
            })
        );
        assert_eq!(
            PixelRect::from_corners(PixelPos::new(9, 0), PixelPos::new(12, 3), [8, 6]),
            None
        );
    }

    #[test]
    fn closures_are_extractors() {
        let extractor = |image: &IntensityGrid, rect: PixelRect, _: u32| {
            LabelMask::from_fn(image.size(), |x, y| rect.contains(x, y))
        };
        let image = IntensityGrid::from_fn([4, 4], |_, _| 0u8);
        let rect = PixelRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        assert_eq!(extractor.extract(&image, rect, 1).count(), 4);
    }
}
