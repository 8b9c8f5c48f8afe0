//! Translates pointer, keyboard and wheel input into edits of a
//! [`FrameSequenceController`].
//!
//! Input arrives in image coordinates together with the modifier state at the
//! time of the event. Every handler returns an [`Update`] telling the caller
//! what needs to be redrawn.

use log::{debug, info};

use crate::{
    Direction, ForegroundExtractor, FrameSequenceController, LabelMask, MaskError, Navigation,
    PixelPos, PixelRect, Settings, Shape, Sign, Stroke,
};

pub const DEFAULT_RADIUS: u32 = 6;
/// The radius only grows while it is at most this value
const GROWABLE_RADIUS: u32 = 14;
/// GrabCut style extractors are run with a single iteration
const EXTRACT_ITERATIONS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintMode {
    #[default]
    BrushCircle,
    BrushBlock,
    Outline,
    ExternalExtract,
    RegionGrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Adds to the mask
    Primary,
    /// Removes from the mask
    Secondary,
}

impl Button {
    fn sign(self) -> Sign {
        match self {
            Button::Primary => Sign::Add,
            Button::Secondary => Sign::Remove,
        }
    }
}

/// Keys with a meaning for the annotator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Num1,
    Num2,
    Num8,
    A,
    C,
    D,
    M,
    O,
    P,
    Q,
    R,
    S,
    W,
    X,
    Z,
    Space,
}

/// What changed through an event, ordered by the amount of work to redraw
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Update {
    #[default]
    None,
    Cursor,
    Mask,
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorPreview {
    /// Pixels a brush would touch at the cursor
    Pixels(Vec<(usize, usize)>),
    /// Points of the outline drawn so far
    Outline(Vec<PixelPos>),
    Rectangle(PixelRect),
}

#[derive(Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    Brush(Sign),
    Outline {
        sign: Sign,
        points: Vec<PixelPos>,
    },
    Rectangle {
        start: PixelPos,
        end: PixelPos,
    },
}

pub struct Annotator {
    sequence: FrameSequenceController,
    mode: PaintMode,
    radius: u32,
    settings: Settings,
    cursor: Option<PixelPos>,
    gesture: Gesture,
    panning: bool,
    mask_visible: bool,
    extractor: Option<Box<dyn ForegroundExtractor>>,
}

impl Annotator {
    pub fn new(sequence: FrameSequenceController) -> Self {
        Self {
            sequence,
            mode: PaintMode::default(),
            radius: DEFAULT_RADIUS,
            settings: Settings::default(),
            cursor: None,
            gesture: Gesture::Idle,
            panning: false,
            mask_visible: true,
            extractor: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn ForegroundExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    pub fn on_stroke_start(
        &mut self,
        pos: PixelPos,
        button: Button,
        modifiers: Modifiers,
    ) -> Result<Update, MaskError> {
        self.cursor = Some(pos);
        if modifiers.shift || self.panning {
            return Ok(Update::None);
        }
        let sign = button.sign();
        match self.mode {
            PaintMode::Outline => {
                self.gesture = Gesture::Outline {
                    sign,
                    points: vec![pos],
                };
                Ok(Update::Cursor)
            }
            PaintMode::ExternalExtract => {
                self.gesture = Gesture::Rectangle {
                    start: pos,
                    end: pos,
                };
                Ok(Update::Cursor)
            }
            PaintMode::BrushCircle | PaintMode::BrushBlock | PaintMode::RegionGrow => {
                self.gesture = Gesture::Brush(sign);
                self.paint_at(pos, sign, modifiers)
            }
        }
    }

    pub fn on_stroke_move(&mut self, pos: PixelPos, modifiers: Modifiers) -> Result<Update, MaskError> {
        self.cursor = Some(pos);
        match &mut self.gesture {
            Gesture::Brush(sign) if !self.panning => {
                let sign = *sign;
                self.paint_at(pos, sign, modifiers)
            }
            Gesture::Outline { points, .. } => {
                if points.last() != Some(&pos) {
                    points.push(pos);
                }
                Ok(Update::Cursor)
            }
            Gesture::Rectangle { end, .. } => {
                *end = pos;
                Ok(Update::Cursor)
            }
            Gesture::Brush(_) | Gesture::Idle => Ok(Update::Cursor),
        }
    }

    /// Finishes the current gesture. Outlines are filled and rectangles are
    /// passed to the foreground extractor.
    pub fn on_stroke_end(&mut self) -> Result<Update, MaskError> {
        let result = match std::mem::take(&mut self.gesture) {
            Gesture::Outline { sign, points } => self
                .sequence
                .paint(&Stroke::new(Shape::Polygon(points), sign))
                .map(|changed| self.mask_update(changed)),
            Gesture::Rectangle { start, end } => self.extract(start, end),
            Gesture::Brush(_) | Gesture::Idle => Ok(Update::None),
        };
        self.sequence.end_gesture();
        result
    }

    pub fn on_key(&mut self, key: Key, modifiers: Modifiers) -> Result<Update, MaskError> {
        let update = match key {
            Key::Num8 => {
                if self.radius <= GROWABLE_RADIUS {
                    self.radius += self.radius_step();
                }
                Update::Cursor
            }
            Key::Num2 => {
                if self.radius >= 2 {
                    self.radius -= self.radius_step();
                } else if self.radius == 1 {
                    self.radius = 0;
                }
                Update::Cursor
            }
            Key::Q => {
                self.mask_visible = !self.mask_visible;
                Update::Mask
            }
            Key::M => self.toggle_mode(PaintMode::BrushBlock),
            Key::O => self.toggle_mode(PaintMode::Outline),
            Key::P => self.toggle_mode(PaintMode::ExternalExtract),
            Key::R => self.toggle_mode(PaintMode::RegionGrow),
            Key::Num1 => match self.mode {
                PaintMode::BrushCircle => self.set_mode(PaintMode::BrushBlock),
                PaintMode::BrushBlock => self.set_mode(PaintMode::Outline),
                PaintMode::Outline => self.set_mode(PaintMode::BrushCircle),
                PaintMode::ExternalExtract | PaintMode::RegionGrow => Update::None,
            },
            Key::Z if modifiers.ctrl => {
                self.sequence.undo()?;
                info!("Undo");
                Update::Mask
            }
            Key::X => {
                self.sequence.clear_current();
                Update::Mask
            }
            Key::Space => {
                self.panning = true;
                Update::None
            }
            Key::D | Key::W => self.navigate(Navigation::Relative(1)),
            Key::A => self.navigate(Navigation::Relative(-1)),
            Key::S if !modifiers.ctrl => self.navigate(Navigation::Relative(-1)),
            Key::C => {
                let direction = if modifiers.shift {
                    Direction::Next
                } else {
                    Direction::Previous
                };
                if self.sequence.propagate(direction)? {
                    self.mask_visible = true;
                    Update::Mask
                } else {
                    Update::None
                }
            }
            Key::Z | Key::S => Update::None,
        };
        Ok(update)
    }

    pub fn on_key_release(&mut self, key: Key) -> Update {
        if key == Key::Space {
            self.panning = false;
        }
        Update::None
    }

    /// With ctrl held the wheel moves through the stack, otherwise the event
    /// is left to the caller (zoom).
    pub fn on_wheel(&mut self, delta: f32, modifiers: Modifiers) -> Update {
        if !modifiers.ctrl || delta == 0.0 || delta.is_nan() {
            return Update::None;
        }
        self.navigate(Navigation::Relative(if delta > 0.0 { 1 } else { -1 }))
    }

    pub fn cursor_preview(&self) -> Option<CursorPreview> {
        match &self.gesture {
            Gesture::Outline { points, .. } => return Some(CursorPreview::Outline(points.clone())),
            Gesture::Rectangle { start, end } => {
                return PixelRect::from_corners(*start, *end, self.size())
                    .map(CursorPreview::Rectangle);
            }
            Gesture::Brush(_) | Gesture::Idle => {}
        }
        let cursor = self.cursor?;
        let shape = match self.mode {
            PaintMode::Outline | PaintMode::ExternalExtract => return None,
            PaintMode::RegionGrow => Shape::Point(cursor),
            PaintMode::BrushCircle | PaintMode::BrushBlock => self.brush_shape(cursor),
        };
        Some(CursorPreview::Pixels(shape.pixels(self.size())))
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        debug!("Apply {settings:?}");
        self.settings = settings;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_mask(&self) -> &LabelMask {
        self.sequence.current_mask()
    }

    pub fn sequence(&self) -> &FrameSequenceController {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut FrameSequenceController {
        &mut self.sequence
    }

    pub fn into_sequence(self) -> FrameSequenceController {
        self.sequence
    }

    pub fn mode(&self) -> PaintMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PaintMode) -> Update {
        if self.mode != mode {
            self.gesture = Gesture::Idle;
            self.sequence.end_gesture();
            self.mode = mode;
            info!("Paint mode {mode:?}");
        }
        Update::Cursor
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn is_mask_visible(&self) -> bool {
        self.mask_visible
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    pub fn cursor(&self) -> Option<PixelPos> {
        self.cursor
    }

    fn size(&self) -> [usize; 2] {
        self.sequence.current_image().size()
    }

    fn radius_step(&self) -> u32 {
        if self.mode == PaintMode::BrushBlock { 2 } else { 1 }
    }

    fn toggle_mode(&mut self, mode: PaintMode) -> Update {
        if self.mode == mode {
            self.set_mode(PaintMode::BrushCircle)
        } else {
            self.set_mode(mode)
        }
    }

    fn brush_shape(&self, center: PixelPos) -> Shape {
        match (self.radius, self.mode) {
            (0, _) => Shape::Point(center),
            (radius, PaintMode::BrushBlock) => Shape::Block { center, radius },
            (radius, _) => Shape::Disk { center, radius },
        }
    }

    fn paint_at(&mut self, pos: PixelPos, sign: Sign, modifiers: Modifiers) -> Result<Update, MaskError> {
        if pos.within(self.size()).is_none() {
            return Ok(Update::Cursor);
        }
        let shape = if modifiers.ctrl || self.mode == PaintMode::RegionGrow {
            Shape::RegionGrow {
                seed: pos,
                tolerance: self.settings.tolerance,
                policy: self.settings.policy(),
            }
        } else {
            self.brush_shape(pos)
        };
        let changed = self.sequence.paint(&Stroke::new(shape, sign))?;
        Ok(self.mask_update(changed))
    }

    fn extract(&mut self, start: PixelPos, end: PixelPos) -> Result<Update, MaskError> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(MaskError::ExtractorUnavailable)?;
        let Some(rect) = PixelRect::from_corners(start, end, self.size()) else {
            return Ok(Update::Cursor);
        };
        let mask = extractor.extract(self.sequence.current_image(), rect, EXTRACT_ITERATIONS);
        let changed = self.sequence.merge_extracted(&mask)?;
        info!("Extracted {changed} pixels from {rect:?}");
        Ok(self.mask_update(changed))
    }

    fn mask_update(&mut self, changed: usize) -> Update {
        if changed > 0 {
            self.mask_visible = true;
            Update::Mask
        } else {
            Update::Cursor
        }
    }

    fn navigate(&mut self, navigation: Navigation) -> Update {
        self.gesture = Gesture::Idle;
        self.sequence.end_gesture();
        let before = self.sequence.current_index();
        if self.sequence.navigate(navigation) == before {
            Update::None
        } else {
            Update::Frame
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{IntensityGrid, ThresholdPolicy};

    fn annotator(frames: usize, size: [usize; 2]) -> Annotator {
        let images = (0..frames)
            .map(|_| Arc::new(IntensityGrid::from_fn(size, |x, _| if x < 4 { 10 } else { 200 })))
            .collect();
        Annotator::new(FrameSequenceController::from_parts(images, None).unwrap())
    }

    fn at(x: i64, y: i64) -> PixelPos {
        PixelPos::new(x, y)
    }

    #[test]
    fn brush_drag_is_undone_at_once() {
        let mut a = annotator(1, [20, 20]);
        a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_move(at(10, 5), Modifiers::NONE).unwrap();
        a.on_stroke_move(at(15, 5), Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        assert!(a.current_mask().get(15, 5) && a.current_mask().get(5, 5));

        assert_eq!(a.on_key(Key::Z, Modifiers::CTRL), Ok(Update::Mask));
        assert!(a.current_mask().is_blank());
        assert_eq!(a.on_key(Key::Z, Modifiers::CTRL), Err(MaskError::NothingToUndo));
    }

    #[test]
    fn moving_without_pressed_button_only_moves_cursor() {
        let mut a = annotator(1, [20, 20]);
        assert_eq!(a.on_stroke_move(at(5, 5), Modifiers::NONE), Ok(Update::Cursor));
        assert!(a.current_mask().is_blank());
        assert_eq!(a.cursor(), Some(at(5, 5)));
    }

    #[test]
    fn secondary_button_removes() {
        let mut a = annotator(1, [20, 20]);
        a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        a.on_stroke_start(at(5, 5), Button::Secondary, Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        assert!(a.current_mask().is_blank());
    }

    #[test]
    fn shift_and_space_pan_instead_of_painting() {
        let mut a = annotator(1, [20, 20]);
        assert_eq!(
            a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::SHIFT),
            Ok(Update::None)
        );
        a.on_stroke_move(at(6, 5), Modifiers::SHIFT).unwrap();
        a.on_stroke_end().unwrap();

        a.on_key(Key::Space, Modifiers::NONE).unwrap();
        assert!(a.is_panning());
        a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        a.on_key_release(Key::Space);
        assert!(!a.is_panning());
        assert!(a.current_mask().is_blank());
    }

    #[test]
    fn ctrl_grows_region_from_pointer() {
        let mut a = annotator(1, [10, 6]);
        a.apply_settings(Settings {
            tolerance: 0,
            ..Settings::default()
        });
        a.on_stroke_start(at(1, 1), Button::Primary, Modifiers::CTRL).unwrap();
        a.on_stroke_end().unwrap();
        assert_eq!(a.current_mask().count(), 4 * 6);
        assert!(!a.current_mask().get(4, 0));
    }

    #[test]
    fn region_grow_mode_without_ctrl() {
        let mut a = annotator(1, [10, 6]);
        a.on_key(Key::R, Modifiers::NONE).unwrap();
        assert_eq!(a.mode(), PaintMode::RegionGrow);
        a.on_stroke_start(at(8, 1), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        // Darker pixels are admitted by the default ceiling policy
        assert_eq!(a.current_mask().count(), 60);
        a.on_key(Key::R, Modifiers::NONE).unwrap();
        assert_eq!(a.mode(), PaintMode::BrushCircle);
    }

    #[test]
    fn strokes_outside_of_image_are_ignored() {
        let mut a = annotator(1, [10, 10]);
        assert_eq!(
            a.on_stroke_start(at(-3, 4), Button::Primary, Modifiers::CTRL),
            Ok(Update::Cursor)
        );
        a.on_stroke_end().unwrap();
        assert!(a.current_mask().is_blank());
    }

    #[test]
    fn outline_is_filled_on_release() {
        let mut a = annotator(1, [10, 10]);
        a.on_key(Key::O, Modifiers::NONE).unwrap();
        a.on_stroke_start(at(2, 2), Button::Primary, Modifiers::NONE).unwrap();
        for p in [at(6, 2), at(6, 6), at(2, 6)] {
            a.on_stroke_move(p, Modifiers::NONE).unwrap();
        }
        assert!(a.current_mask().is_blank());
        assert!(matches!(a.cursor_preview(), Some(CursorPreview::Outline(p)) if p.len() == 4));
        assert_eq!(a.on_stroke_end(), Ok(Update::Mask));
        assert_eq!(a.current_mask().count(), 4 * 5);
    }

    #[test]
    fn extraction_requires_extractor() {
        let mut a = annotator(1, [10, 10]);
        a.on_key(Key::P, Modifiers::NONE).unwrap();
        a.on_stroke_start(at(1, 1), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_move(at(3, 3), Modifiers::NONE).unwrap();
        assert_eq!(a.on_stroke_end(), Err(MaskError::ExtractorUnavailable));
        assert!(a.current_mask().is_blank());
    }

    #[test]
    fn extraction_result_is_added() {
        let extractor = |image: &IntensityGrid, rect: PixelRect, iterations: u32| {
            assert_eq!(iterations, 1);
            LabelMask::from_fn(image.size(), |x, y| rect.contains(x, y))
        };
        let mut a = annotator(1, [10, 10]).with_extractor(Box::new(extractor));
        a.on_key(Key::P, Modifiers::NONE).unwrap();
        a.on_stroke_start(at(4, 4), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_move(at(1, 2), Modifiers::NONE).unwrap();
        assert_eq!(
            a.cursor_preview(),
            Some(CursorPreview::Rectangle(PixelRect {
                x: 1,
                y: 2,
                width: 4,
                height: 3
            }))
        );
        assert_eq!(a.on_stroke_end(), Ok(Update::Mask));
        assert_eq!(a.current_mask().count(), 12);
        a.on_key(Key::Z, Modifiers::CTRL).unwrap();
        assert!(a.current_mask().is_blank());
    }

    #[test]
    fn radius_steps_depend_on_mode() {
        let mut a = annotator(1, [10, 10]);
        assert_eq!(a.radius(), DEFAULT_RADIUS);
        for _ in 0..20 {
            a.on_key(Key::Num8, Modifiers::NONE).unwrap();
        }
        assert_eq!(a.radius(), 15);
        for _ in 0..20 {
            a.on_key(Key::Num2, Modifiers::NONE).unwrap();
        }
        assert_eq!(a.radius(), 0);

        a.on_key(Key::M, Modifiers::NONE).unwrap();
        a.on_key(Key::Num8, Modifiers::NONE).unwrap();
        a.on_key(Key::Num8, Modifiers::NONE).unwrap();
        assert_eq!(a.radius(), 4);
        a.on_key(Key::Num2, Modifiers::NONE).unwrap();
        assert_eq!(a.radius(), 2);
    }

    #[test]
    fn key_one_cycles_brush_modes() {
        let mut a = annotator(1, [4, 4]);
        let mut modes = vec![];
        for _ in 0..3 {
            a.on_key(Key::Num1, Modifiers::NONE).unwrap();
            modes.push(a.mode());
        }
        assert_eq!(
            modes,
            vec![PaintMode::BrushBlock, PaintMode::Outline, PaintMode::BrushCircle]
        );
    }

    #[test]
    fn keys_and_wheel_navigate() {
        let mut a = annotator(3, [4, 4]);
        assert_eq!(a.on_key(Key::A, Modifiers::NONE), Ok(Update::None));
        assert_eq!(a.on_key(Key::D, Modifiers::NONE), Ok(Update::Frame));
        assert_eq!(a.on_key(Key::W, Modifiers::NONE), Ok(Update::Frame));
        assert_eq!(a.on_key(Key::W, Modifiers::NONE), Ok(Update::None));
        assert_eq!(a.sequence().current_index(), 2);
        assert_eq!(a.on_key(Key::S, Modifiers::CTRL), Ok(Update::None));
        assert_eq!(a.on_key(Key::S, Modifiers::NONE), Ok(Update::Frame));
        assert_eq!(a.sequence().current_index(), 1);

        assert_eq!(a.on_wheel(-120.0, Modifiers::NONE), Update::None);
        assert_eq!(a.on_wheel(-120.0, Modifiers::CTRL), Update::Frame);
        assert_eq!(a.sequence().current_index(), 0);
        assert_eq!(a.on_wheel(3.0, Modifiers::CTRL), Update::Frame);
        assert_eq!(a.sequence().current_index(), 1);
    }

    #[test]
    fn copy_mask_from_neighbours() {
        let mut a = annotator(3, [10, 10]);
        a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::NONE).unwrap();
        a.on_stroke_end().unwrap();
        let painted = a.current_mask().clone();

        a.on_key(Key::D, Modifiers::NONE).unwrap();
        assert_eq!(a.on_key(Key::C, Modifiers::NONE), Ok(Update::Mask));
        assert_eq!(a.current_mask(), &painted);

        a.on_key(Key::D, Modifiers::NONE).unwrap();
        a.on_key(Key::A, Modifiers::NONE).unwrap();
        a.on_key(Key::X, Modifiers::NONE).unwrap();
        assert!(a.current_mask().is_blank());
        assert_eq!(a.on_key(Key::C, Modifiers::SHIFT), Ok(Update::None));
        assert_eq!(a.on_key(Key::C, Modifiers::NONE), Ok(Update::Mask));
    }

    #[test]
    fn mask_visibility_is_toggled_and_restored_by_painting() {
        let mut a = annotator(1, [10, 10]);
        a.on_key(Key::Q, Modifiers::NONE).unwrap();
        assert!(!a.is_mask_visible());
        a.on_stroke_start(at(5, 5), Button::Primary, Modifiers::NONE).unwrap();
        assert!(a.is_mask_visible());
    }

    #[test]
    fn cursor_preview_follows_brush() {
        let mut a = annotator(1, [20, 20]);
        assert_eq!(a.cursor_preview(), None);
        a.on_stroke_move(at(10, 10), Modifiers::NONE).unwrap();
        assert!(matches!(a.cursor_preview(), Some(CursorPreview::Pixels(p)) if p.len() == 113));

        for _ in 0..6 {
            a.on_key(Key::Num2, Modifiers::NONE).unwrap();
        }
        assert_eq!(a.cursor_preview(), Some(CursorPreview::Pixels(vec![(10, 10)])));
        a.on_key(Key::O, Modifiers::NONE).unwrap();
        assert_eq!(a.cursor_preview(), None);
    }

    #[test]
    fn relative_band_from_settings() {
        let mut a = annotator(1, [10, 6]);
        a.apply_settings(Settings {
            tolerance: 20,
            only_darker_pixels: false,
            ..Settings::default()
        });
        assert_eq!(a.settings().policy(), ThresholdPolicy::RelativeBand);
        a.on_stroke_start(at(8, 1), Button::Primary, Modifiers::CTRL).unwrap();
        assert_eq!(a.current_mask().count(), 6 * 6);
    }
}
