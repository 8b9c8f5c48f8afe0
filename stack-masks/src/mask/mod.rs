use std::sync::Arc;

use log::debug;

use crate::{EdgeMargin, IntensityGrid, MaskError, RegionGrow, Shape, Sign, Stroke};

mod history;
mod label_mask;

pub use history::*;
pub use label_mask::*;

/// The editable mask of the active frame together with the image it belongs to.
///
/// The canvas never records history, see [`EditHistory`].
#[derive(Debug, Clone)]
pub struct MaskCanvas {
    image: Arc<IntensityGrid>,
    mask: LabelMask,
    margin: EdgeMargin,
}

impl MaskCanvas {
    pub fn new(image: Arc<IntensityGrid>, mask: LabelMask) -> Result<Self, MaskError> {
        MaskError::check_shape(image.size(), mask.size())?;
        Ok(Self {
            image,
            mask,
            margin: EdgeMargin::default(),
        })
    }

    /// Canvas with an all-false mask
    pub fn blank(image: Arc<IntensityGrid>) -> Self {
        let mask = LabelMask::new(image.size());
        Self {
            image,
            mask,
            margin: EdgeMargin::default(),
        }
    }

    /// Binds another frame. Returns the previously bound mask.
    pub fn bind(
        &mut self,
        image: Arc<IntensityGrid>,
        mask: LabelMask,
    ) -> Result<LabelMask, MaskError> {
        MaskError::check_shape(image.size(), mask.size())?;
        self.image = image;
        Ok(std::mem::replace(&mut self.mask, mask))
    }

    pub fn set_edge_margin(&mut self, margin: EdgeMargin) {
        self.margin = margin;
    }

    pub fn edge_margin(&self) -> EdgeMargin {
        self.margin
    }

    /// Applies a stroke to the mask and returns the number of changed pixels.
    ///
    /// Fails only for region growing from a seed outside of the image, in
    /// which case the mask is left untouched.
    pub fn apply(&mut self, stroke: &Stroke) -> Result<usize, MaskError> {
        let value = stroke.sign.value();
        let changed = match &stroke.shape {
            Shape::RegionGrow {
                seed,
                tolerance,
                policy,
            } => {
                let seed = seed.within(self.size()).ok_or(MaskError::SeedOutOfBounds {
                    x: seed.x,
                    y: seed.y,
                    width: self.image.width(),
                    height: self.image.height(),
                })?;
                let segmentation = RegionGrow::new(*tolerance, *policy)
                    .with_margin(self.margin)
                    .grow(self.image.as_ref(), seed)?;
                let mut changed = 0;
                for (x, y) in segmentation.filled() {
                    if self.mask.set(x, y, value) {
                        changed += 1;
                    }
                }
                changed
            }
            shape => {
                let mut changed = 0;
                shape.for_each_pixel(self.size(), |x, y| {
                    if self.mask.set(x, y, value) {
                        changed += 1;
                    }
                });
                changed
            }
        };
        debug!("{:?} changed {changed} pixels", stroke.sign);
        Ok(changed)
    }

    /// Merges a foreign mask, e.g. the result of a foreground extraction
    pub fn merge(&mut self, other: &LabelMask, sign: Sign) -> Result<usize, MaskError> {
        self.mask.merge(other, sign)
    }

    pub fn clear(&mut self) -> usize {
        self.mask.clear()
    }

    /// Overwrites the mask, e.g. when copying a neighbouring frame
    pub fn replace(&mut self, mask: &LabelMask) -> Result<(), MaskError> {
        self.mask.copy_from(mask)
    }

    pub fn is_blank(&self) -> bool {
        self.mask.is_blank()
    }

    pub fn mask(&self) -> &LabelMask {
        &self.mask
    }

    pub(crate) fn mask_mut(&mut self) -> &mut LabelMask {
        &mut self.mask
    }

    pub fn image(&self) -> &Arc<IntensityGrid> {
        &self.image
    }

    pub fn size(&self) -> [usize; 2] {
        self.image.size()
    }
}
