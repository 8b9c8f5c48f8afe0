use std::sync::Arc;

use stack_masks::{
    Direction, EditHistory, FrameSequenceController, IntensityGrid, LabelMask, MaskCanvas,
    Navigation, PixelPos, Segment, Shape, Stroke, ThresholdPolicy, grow,
};

fn disk(x: i64, y: i64, radius: u32) -> Shape {
    Shape::Disk {
        center: PixelPos::new(x, y),
        radius,
    }
}

fn three_frames() -> FrameSequenceController {
    let images = (0..3u8)
        .map(|i| Arc::new(IntensityGrid::from_fn([10, 10], move |x, _| x as u8 * i)))
        .collect();
    FrameSequenceController::from_parts(images, None).unwrap()
}

#[test]
fn uniform_image_fills_everything() {
    let image = IntensityGrid::from_fn([5, 5], |_, _| 100u8);
    let result = grow(&image, (2, 2), 0, ThresholdPolicy::AbsoluteCeiling).unwrap();
    assert_eq!(result.filled_count(), 25);
}

#[test]
fn single_bright_pixel_is_boundary() {
    let rows = [[0u8, 0, 0], [0, 0, 100], [0, 0, 0]];
    let image = IntensityGrid::from_fn([3, 3], |x, y| rows[y][x]);
    let result = grow(&image, (1, 1), 5, ThresholdPolicy::AbsoluteCeiling).unwrap();
    for y in 0..3 {
        for x in 0..3 {
            let expected = if (x, y) == (2, 1) {
                Segment::Boundary
            } else {
                Segment::Filled
            };
            assert_eq!(result.get(x, y), expected, "({x}, {y})");
        }
    }
}

#[test]
fn disk_add_then_remove() {
    let mut canvas = MaskCanvas::blank(Arc::new(IntensityGrid::from_fn([10, 10], |_, _| 0u8)));
    canvas.apply(&Stroke::add(disk(5, 5, 2))).unwrap();
    let expected = LabelMask::from_fn([10, 10], |x, y| {
        let (dx, dy) = (x as i64 - 5, y as i64 - 5);
        dx * dx + dy * dy <= 4
    });
    assert_eq!(canvas.mask(), &expected);

    canvas.apply(&Stroke::remove(disk(5, 5, 2))).unwrap();
    assert!(canvas.is_blank());
}

#[test]
fn one_undo_reverts_a_whole_session() {
    let mut canvas = MaskCanvas::blank(Arc::new(IntensityGrid::from_fn([10, 10], |_, _| 0u8)));
    let mut history = EditHistory::default();
    history.record_if_first(canvas.mask());
    canvas.apply(&Stroke::add(disk(2, 2, 1))).unwrap();
    history.record_if_first(canvas.mask());
    canvas.apply(&Stroke::add(disk(7, 7, 1))).unwrap();

    let mut mask = canvas.mask().clone();
    history.undo(&mut mask).unwrap();
    assert!(mask.is_blank());
}

#[test]
fn navigation_past_the_end_stays_on_last_frame() {
    let mut sequence = three_frames();
    assert_eq!(sequence.navigate(Navigation::Absolute(2)), 2);
    assert_eq!(sequence.navigate(Navigation::Relative(5)), 2);
    assert_eq!(sequence.current_index(), 2);
    assert_eq!(sequence.navigate(Navigation::Relative(-9)), 0);
}

#[test]
fn propagate_copies_previous_mask() {
    let mut sequence = three_frames();
    sequence.paint(&Stroke::add(disk(3, 3, 2))).unwrap();
    sequence.end_gesture();
    let first = sequence.current_mask().clone();

    sequence.navigate(Navigation::Relative(1));
    assert!(sequence.propagate(Direction::Previous).unwrap());
    assert_eq!(sequence.current_mask(), &first);

    let masks = sequence.all_masks();
    assert_eq!(masks[0], masks[1]);
    assert!(masks[2].is_blank());
}

#[test]
fn masks_survive_a_round_trip_through_the_sequence() {
    let mut sequence = three_frames();
    for (i, center) in [(0, 2), (1, 5), (2, 8)] {
        sequence.navigate(Navigation::Absolute(i));
        sequence.paint(&Stroke::add(disk(center, center, 1))).unwrap();
    }
    let masks = sequence.all_masks();

    let images = (0..3)
        .map(|_| Arc::new(IntensityGrid::from_fn([10, 10], |_, _| 0u8)))
        .collect();
    let reloaded = FrameSequenceController::from_parts(images, Some(masks.clone())).unwrap();
    assert_eq!(reloaded.into_masks(), masks);
}
