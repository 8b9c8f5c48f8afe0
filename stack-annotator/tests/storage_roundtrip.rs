use futures::executor::block_on;
use image::{GrayImage, Luma};
use stack_annotator::{FileStorage, InMemoryStorage, SYNTHETIC_ID, Storage};
use stack_masks::{FrameSequenceController, Navigation, PixelPos, Shape, Stroke};

fn controller(storage: &dyn Storage, id: &str) -> (FrameSequenceController, Option<Vec<String>>) {
    let data = block_on(storage.load_sequence(&id.to_string())).unwrap();
    let files = data.files.clone();
    (
        FrameSequenceController::from_parts(data.images, data.masks).unwrap(),
        files,
    )
}

#[test]
fn synthetic_masks_survive_a_store() {
    let storage = InMemoryStorage::synthetic();
    let (mut sequence, files) = controller(&storage, SYNTHETIC_ID);
    assert_eq!(sequence.len(), 20);

    sequence.navigate(Navigation::Absolute(3));
    sequence
        .paint(&Stroke::add(Shape::Disk {
            center: PixelPos::new(50, 50),
            radius: 4,
        }))
        .unwrap();
    sequence.end_gesture();
    block_on(storage.store_masks(SYNTHETIC_ID.into(), sequence.all_masks(), files)).unwrap();

    let (reloaded, _) = controller(&storage, SYNTHETIC_ID);
    let masks = reloaded.into_masks();
    assert!(masks[0].is_blank());
    assert!(masks[3].get(50, 50));
    assert_eq!(masks[3].count(), sequence.all_masks()[3].count());
}

#[test]
fn folder_sequence_masks_are_stored_next_to_the_images() {
    let dir = std::env::temp_dir().join(format!("stack-annotator-roundtrip-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for (i, name) in ["b.png", "a.png"].iter().enumerate() {
        GrayImage::from_pixel(8, 6, Luma([40 * i as u8]))
            .save(dir.join(name))
            .unwrap();
    }
    let id = dir.to_str().unwrap().to_string();
    let storage = FileStorage::new();

    let (mut sequence, files) = controller(&storage, &id);
    assert_eq!(files.as_deref(), Some(&["a.png".to_string(), "b.png".to_string()][..]));
    assert!(sequence.current_mask().is_blank());
    sequence
        .paint(&Stroke::add(Shape::Point(PixelPos::new(7, 5))))
        .unwrap();
    block_on(storage.store_masks(id.clone(), sequence.all_masks(), files)).unwrap();
    assert!(dir.join("images.mask").exists());

    let (reloaded, _) = controller(&storage, &id);
    assert!(reloaded.current_mask().get(7, 5));
    assert_eq!(reloaded.current_mask().count(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}
