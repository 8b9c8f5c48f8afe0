use crate::{MaskError, Sign};

/// Boolean "pixel is labeled" grid of one frame, stored row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelMask {
    size: [usize; 2],
    bits: Vec<bool>,
}

impl LabelMask {
    /// Creates an all-false mask
    pub fn new(size: [usize; 2]) -> Self {
        Self {
            size,
            bits: vec![false; size[0] * size[1]],
        }
    }

    /// Returns `None` if `bits` doesn't hold exactly `width * height` values
    pub fn from_vec(size: [usize; 2], bits: Vec<bool>) -> Option<Self> {
        (size[0] * size[1] == bits.len()).then_some(Self { size, bits })
    }

    pub fn from_fn(size: [usize; 2], mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let [width, height] = size;
        let bits = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self { size, bits }
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

    /// Out of bounds positions are never labeled
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.size[0] && y < self.size[1] && self.bits[y * self.size[0] + x]
    }

    /// Returns whether the pixel changed. Out of bounds positions are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: bool) -> bool {
        if x >= self.size[0] || y >= self.size[1] {
            return false;
        }
        let bit = &mut self.bits[y * self.size[0] + x];
        let changed = *bit != value;
        *bit = value;
        changed
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn into_bits(self) -> Vec<bool> {
        self.bits
    }

    /// True if no pixel is labeled
    pub fn is_blank(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.count();
        self.bits.fill(false);
        count
    }

    pub fn labeled(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.size[0].max(1);
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, b)| **b)
            .map(move |(i, _)| (i % width, i / width))
    }

    /// Overwrites all pixels with the ones of `other`
    pub fn copy_from(&mut self, other: &LabelMask) -> Result<(), MaskError> {
        MaskError::check_shape(self.size, other.size)?;
        self.bits.copy_from_slice(&other.bits);
        Ok(())
    }

    /// Sets (`Add`) or clears (`Remove`) every pixel labeled in `other`.
    /// Returns the number of changed pixels.
    pub fn merge(&mut self, other: &LabelMask, sign: Sign) -> Result<usize, MaskError> {
        MaskError::check_shape(self.size, other.size)?;
        let value = sign.value();
        let mut changed = 0;
        for (current, _) in self
            .bits
            .iter_mut()
            .zip(other.bits.iter())
            .filter(|(current, labeled)| **labeled && **current != value)
        {
            *current = value;
            changed += 1;
        }
        Ok(changed)
    }
}
