//! Ordered frames of a stack and the one frame which is currently edited.

use std::{num::NonZeroUsize, sync::Arc};

use log::{debug, info, warn};

use crate::{EdgeMargin, EditHistory, IntensityGrid, LabelMask, MaskCanvas, MaskError, Sign, Stroke};

/// One image of the stack with its mask
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<IntensityGrid>,
    mask: LabelMask,
}

impl Frame {
    /// Frame without prior annotations
    pub fn new(image: Arc<IntensityGrid>) -> Self {
        let mask = LabelMask::new(image.size());
        Self { image, mask }
    }

    pub fn with_mask(image: Arc<IntensityGrid>, mask: LabelMask) -> Result<Self, MaskError> {
        MaskError::check_shape(image.size(), mask.size())?;
        Ok(Self { image, mask })
    }

    pub fn image(&self) -> &Arc<IntensityGrid> {
        &self.image
    }

    pub fn mask(&self) -> &LabelMask {
        &self.mask
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Relative(isize),
    Absolute(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Owns all frames, binds the active one to a [`MaskCanvas`] and tracks its
/// [`EditHistory`].
///
/// The mask slot of the active frame is stale while it is bound, the canvas
/// holds the current state. It is written back on navigation and by
/// [`FrameSequenceController::all_masks`].
#[derive(Debug)]
pub struct FrameSequenceController {
    frames: Vec<Frame>,
    current: usize,
    canvas: MaskCanvas,
    history: EditHistory,
    /// Incremented by every edit
    revision: u64,
    saved_revision: u64,
}

impl FrameSequenceController {
    pub fn new(frames: Vec<Frame>) -> Result<Self, MaskError> {
        let first = frames.first().ok_or(MaskError::EmptySequence)?;
        let canvas = MaskCanvas::new(first.image.clone(), first.mask.clone())?;
        info!("Opened sequence with {} frames", frames.len());
        Ok(Self {
            frames,
            current: 0,
            canvas,
            history: EditHistory::default(),
            revision: 0,
            saved_revision: 0,
        })
    }

    /// Builds the frames from images and optionally previously saved masks
    pub fn from_parts(
        images: Vec<Arc<IntensityGrid>>,
        masks: Option<Vec<LabelMask>>,
    ) -> Result<Self, MaskError> {
        let frames = match masks {
            None => images.into_iter().map(Frame::new).collect(),
            Some(masks) if masks.len() != images.len() => {
                return Err(MaskError::SourceUnavailable(format!(
                    "{} saved masks for {} images",
                    masks.len(),
                    images.len()
                )));
            }
            Some(masks) => images
                .into_iter()
                .zip(masks)
                .map(|(image, mask)| Frame::with_mask(image, mask))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Self::new(frames)
    }

    /// Keeps at most `limit` undo steps
    pub fn with_history_limit(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.history = match limit {
            Some(limit) => EditHistory::with_limit(limit),
            None => EditHistory::default(),
        };
        self
    }

    /// Moves to another frame and returns its index. Targets are clamped to
    /// the sequence.
    pub fn navigate(&mut self, navigation: Navigation) -> usize {
        let last = self.frames.len() - 1;
        let target = match navigation {
            Navigation::Relative(delta) => self.current.saturating_add_signed(delta),
            Navigation::Absolute(index) => index,
        }
        .min(last);
        if target == self.current {
            return target;
        }

        let frame = &self.frames[target];
        match self.canvas.bind(frame.image.clone(), frame.mask.clone()) {
            Ok(previous) => self.frames[self.current].mask = previous,
            Err(e) => {
                warn!("Cannot open frame {target}: {e}");
                return self.current;
            }
        }
        self.current = target;
        self.history.reset();
        info!("Frame {}/{}", target + 1, self.frames.len());
        target
    }

    /// Copies the mask of the neighbouring frame into the active frame if the
    /// active one has no labels yet. Returns whether anything was copied.
    pub fn propagate(&mut self, direction: Direction) -> Result<bool, MaskError> {
        let neighbour = match direction {
            Direction::Previous => self.current.checked_sub(1),
            Direction::Next => Some(self.current + 1).filter(|i| *i < self.frames.len()),
        };
        let Some(source) = neighbour.map(|i| &self.frames[i].mask) else {
            debug!("No {direction:?} frame to propagate from");
            return Ok(false);
        };
        if !self.canvas.is_blank() || source.is_blank() {
            return Ok(false);
        }
        MaskError::check_shape(self.canvas.size(), source.size())?;

        self.history.record_if_first(self.canvas.mask());
        self.canvas.replace(source)?;
        self.history.end_session();
        self.revision += 1;
        info!("Copied mask from {direction:?} frame");
        Ok(true)
    }

    /// Applies a stroke to the active frame, returns the number of changed pixels
    pub fn paint(&mut self, stroke: &Stroke) -> Result<usize, MaskError> {
        stroke.validate(self.canvas.size())?;
        self.edit(|canvas| canvas.apply(stroke))
    }

    /// Adds the labels of `mask`, e.g. a foreground extraction result
    pub fn merge_extracted(&mut self, mask: &LabelMask) -> Result<usize, MaskError> {
        MaskError::check_shape(self.canvas.size(), mask.size())?;
        self.edit(|canvas| canvas.merge(mask, Sign::Add))
    }

    pub fn clear_current(&mut self) -> usize {
        let cleared = self.edit(|canvas| Ok(canvas.clear())).unwrap_or_default();
        self.history.end_session();
        cleared
    }

    pub fn undo(&mut self) -> Result<(), MaskError> {
        self.history.undo(self.canvas.mask_mut())?;
        self.revision += 1;
        Ok(())
    }

    /// Called when the pointer is released
    pub fn end_gesture(&mut self) {
        self.history.end_session();
    }

    pub fn current_mask(&self) -> &LabelMask {
        self.canvas.mask()
    }

    pub fn current_image(&self) -> &Arc<IntensityGrid> {
        self.canvas.image()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Never true, a sequence holds at least one frame
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn set_edge_margin(&mut self, margin: EdgeMargin) {
        self.canvas.set_edge_margin(margin);
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Masks of all frames in order, including unflushed edits of the active one
    pub fn all_masks(&mut self) -> Vec<LabelMask> {
        self.flush();
        self.frames.iter().map(|f| f.mask.clone()).collect()
    }

    pub fn into_masks(mut self) -> Vec<LabelMask> {
        self.flush();
        self.frames.into_iter().map(|f| f.mask).collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Identifies the current state of the masks, changes with every edit
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mark_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    /// Marks the state at `revision` as saved, edits made after it keep the
    /// sequence dirty
    pub fn mark_saved_at(&mut self, revision: u64) {
        self.saved_revision = revision.min(self.revision);
    }

    /// Runs `edit` on the canvas. The mask before the edit is recorded if this
    /// is the first edit of the session which changes any pixel.
    fn edit(
        &mut self,
        f: impl FnOnce(&mut MaskCanvas) -> Result<usize, MaskError>,
    ) -> Result<usize, MaskError> {
        let snapshot = self
            .history
            .needs_snapshot()
            .then(|| self.canvas.mask().clone());
        let changed = f(&mut self.canvas)?;
        if changed > 0 {
            if let Some(snapshot) = snapshot {
                self.history.push(snapshot);
            }
            self.revision += 1;
        }
        Ok(changed)
    }

    fn flush(&mut self) {
        self.frames[self.current].mask = self.canvas.mask().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PixelPos, Shape};

    fn controller(frames: usize) -> FrameSequenceController {
        let images = (0..frames)
            .map(|i| Arc::new(IntensityGrid::from_fn([6, 4], |_, _| i as u8)))
            .collect();
        FrameSequenceController::from_parts(images, None).unwrap()
    }

    fn point(x: i64, y: i64) -> Stroke {
        Stroke::add(Shape::Point(PixelPos::new(x, y)))
    }

    #[test]
    fn empty_sequence_is_rejected() {
        assert_eq!(
            FrameSequenceController::new(vec![]).unwrap_err(),
            MaskError::EmptySequence
        );
    }

    #[test]
    fn saved_masks_must_match_images() {
        let images = vec![Arc::new(IntensityGrid::from_fn([2, 2], |_, _| 0u8)); 2];
        assert!(matches!(
            FrameSequenceController::from_parts(images.clone(), Some(vec![LabelMask::new([2, 2])])),
            Err(MaskError::SourceUnavailable(_))
        ));
        assert!(matches!(
            FrameSequenceController::from_parts(
                images,
                Some(vec![LabelMask::new([2, 2]), LabelMask::new([3, 2])])
            ),
            Err(MaskError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn navigation_is_clamped() {
        let mut seq = controller(3);
        assert_eq!(seq.navigate(Navigation::Relative(-1)), 0);
        assert_eq!(seq.navigate(Navigation::Relative(5)), 2);
        assert_eq!(seq.navigate(Navigation::Absolute(17)), 2);
        assert_eq!(seq.navigate(Navigation::Absolute(1)), 1);
        assert_eq!(seq.current_image().get(0, 0), Some(1));
    }

    #[test]
    fn edits_survive_navigation() {
        let mut seq = controller(3);
        seq.paint(&point(1, 1)).unwrap();
        seq.navigate(Navigation::Relative(1));
        assert!(seq.current_mask().is_blank());
        seq.paint(&point(2, 2)).unwrap();
        seq.navigate(Navigation::Absolute(0));
        assert!(seq.current_mask().get(1, 1));

        let masks = seq.all_masks();
        assert_eq!(masks[0].labeled().collect::<Vec<_>>(), vec![(1, 1)]);
        assert_eq!(masks[1].labeled().collect::<Vec<_>>(), vec![(2, 2)]);
        assert!(masks[2].is_blank());
    }

    #[test]
    fn navigation_drops_history() {
        let mut seq = controller(2);
        seq.paint(&point(1, 1)).unwrap();
        seq.end_gesture();
        seq.navigate(Navigation::Relative(1));
        seq.navigate(Navigation::Relative(-1));
        assert_eq!(seq.undo(), Err(MaskError::NothingToUndo));
        assert!(seq.current_mask().get(1, 1));
    }

    #[test]
    fn navigating_to_current_frame_keeps_history() {
        let mut seq = controller(2);
        seq.paint(&point(1, 1)).unwrap();
        seq.end_gesture();
        seq.navigate(Navigation::Relative(-1));
        seq.undo().unwrap();
        assert!(seq.current_mask().is_blank());
    }

    #[test]
    fn propagate_only_into_blank_masks() {
        let mut seq = controller(3);
        seq.paint(&point(1, 1)).unwrap();
        seq.end_gesture();
        seq.navigate(Navigation::Relative(1));
        assert_eq!(seq.propagate(Direction::Next), Ok(false));
        assert_eq!(seq.propagate(Direction::Previous), Ok(true));
        assert!(seq.current_mask().get(1, 1));
        assert_eq!(seq.propagate(Direction::Previous), Ok(false));

        seq.undo().unwrap();
        assert!(seq.current_mask().is_blank());
    }

    #[test]
    fn propagate_at_the_first_frame_does_nothing() {
        let mut seq = controller(2);
        assert_eq!(seq.propagate(Direction::Previous), Ok(false));
    }

    #[test]
    fn out_of_bounds_region_grow_is_not_recorded() {
        let mut seq = controller(1);
        let result = seq.paint(&Stroke::add(Shape::RegionGrow {
            seed: PixelPos::new(10, 10),
            tolerance: 1,
            policy: Default::default(),
        }));
        assert!(matches!(result, Err(MaskError::SeedOutOfBounds { .. })));
        assert!(seq.history().is_empty());
        assert!(!seq.is_dirty());
    }

    #[test]
    fn dirty_until_saved() {
        let mut seq = controller(1);
        assert!(!seq.is_dirty());
        seq.paint(&point(0, 0)).unwrap();
        assert!(seq.is_dirty());
        seq.mark_saved();
        assert!(!seq.is_dirty());
        seq.paint(&point(0, 0)).unwrap();
        assert!(!seq.is_dirty());
        seq.clear_current();
        assert!(seq.is_dirty());
    }

    #[test]
    fn edits_without_effect_leave_no_undo_step() {
        let mut seq = controller(1);
        let erase = Stroke::remove(Shape::Disk {
            center: PixelPos::new(2, 2),
            radius: 2,
        });
        assert_eq!(seq.paint(&erase).unwrap(), 0);
        seq.end_gesture();
        assert_eq!(seq.clear_current(), 0);
        assert!(seq.history().is_empty());
        assert!(!seq.is_dirty());

        // the first edit of a gesture which changes pixels is recorded
        seq.paint(&point(1, 1)).unwrap();
        seq.end_gesture();
        seq.paint(&Stroke::remove(Shape::Point(PixelPos::new(5, 3)))).unwrap();
        seq.paint(&point(3, 3)).unwrap();
        seq.end_gesture();
        assert_eq!(seq.history().len(), 2);
        seq.undo().unwrap();
        assert_eq!(seq.current_mask().labeled().collect::<Vec<_>>(), vec![(1, 1)]);
        seq.undo().unwrap();
        assert!(seq.current_mask().is_blank());
        assert_eq!(seq.undo(), Err(MaskError::NothingToUndo));
    }

    #[test]
    fn saving_an_older_revision_keeps_later_edits_dirty() {
        let mut seq = controller(1);
        seq.paint(&point(0, 0)).unwrap();
        let saved = seq.revision();
        seq.paint(&point(1, 0)).unwrap();
        seq.mark_saved_at(saved);
        assert!(seq.is_dirty());
        seq.mark_saved_at(seq.revision());
        assert!(!seq.is_dirty());
    }
}
