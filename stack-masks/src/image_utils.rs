use image::{DynamicImage, ImageBuffer, Luma};
use num_traits::{AsPrimitive, PrimInt, Unsigned};

/// Sample type of an [`IntensityGrid`]. Comparisons happen in `i64`, so
/// `seed + tolerance` never overflows the sample type.
pub trait Intensity: PrimInt + Unsigned + AsPrimitive<i64> {}

impl<T: PrimInt + Unsigned + AsPrimitive<i64>> Intensity for T {}

/// Single channel image, stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityGrid<T = u8> {
    size: [usize; 2],
    samples: Vec<T>,
}

impl<T: Intensity> IntensityGrid<T> {
    /// Returns `None` if `samples` doesn't hold exactly `width * height` values
    pub fn from_vec(size: [usize; 2], samples: Vec<T>) -> Option<Self> {
        (size[0] * size[1] == samples.len()).then_some(Self { size, samples })
    }

    pub fn from_fn(size: [usize; 2], mut f: impl FnMut(usize, usize) -> T) -> Self {
        let [width, height] = size;
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self { size, samples }
    }

    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size[0]
    }

    pub fn height(&self) -> usize {
        self.size[1]
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.size[0] && y < self.size[1]
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.contains(x, y)
            .then(|| self.samples[y * self.size[0] + x])
    }

    pub(crate) fn sample(&self, x: usize, y: usize) -> i64 {
        self.samples[y * self.size[0] + x].as_()
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }
}

impl IntensityGrid<u8> {
    /// Gray levels of an arbitrary decoded image (luminance for color images)
    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        Self::from(&image.to_luma8())
    }
}

impl<T: Intensity + image::Primitive> From<&ImageBuffer<Luma<T>, Vec<T>>> for IntensityGrid<T> {
    fn from(value: &ImageBuffer<Luma<T>, Vec<T>>) -> Self {
        let (width, height) = value.dimensions();
        Self {
            size: [width as usize, height as usize],
            samples: value.as_raw().clone(),
        }
    }
}
