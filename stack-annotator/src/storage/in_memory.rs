use futures::{FutureExt, future::BoxFuture};
use image::{GrayImage, Luma};
use stack_masks::{IntensityGrid, LabelMask};
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use super::{SequenceData, SequenceId, Storage};

pub const SYNTHETIC_ID: &str = "synthetic";

/// Keeps sequences in memory, stored masks replace the ones of the sequence
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<Mutex<HashMap<SequenceId, SequenceData>>>,
}

impl InMemoryStorage {
    pub fn new(x: impl IntoIterator<Item = SequenceData>) -> Self {
        Self {
            data: Arc::new(Mutex::new(
                x.into_iter().map(|x| (x.id.clone(), x)).collect(),
            )),
        }
    }

    /// 20 noisy 100x100 frames with a dark ellipse whose height oscillates
    /// over time, available as [`SYNTHETIC_ID`]
    pub fn synthetic() -> Self {
        let images = (0..20).map(|i| Arc::new(synthetic_frame(i))).collect();
        Self::new([SequenceData {
            id: SYNTHETIC_ID.into(),
            images,
            masks: None,
            files: None,
        }])
    }

    pub fn masks(&self, id: &str) -> Option<Vec<LabelMask>> {
        self.data.lock().ok()?.get(id)?.masks.clone()
    }
}

impl Storage for InMemoryStorage {
    fn load_sequence(&self, id: &SequenceId) -> BoxFuture<'static, io::Result<SequenceData>> {
        let data = match self.data.lock() {
            Ok(data) => data
                .get(id)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("Unknown sequence {id:?}"))),
            Err(_) => Err(io::Error::other("Storage is poisoned")),
        };
        std::future::ready(data).boxed()
    }

    fn store_masks(
        &self,
        id: SequenceId,
        masks: Vec<LabelMask>,
        files: Option<Vec<String>>,
    ) -> BoxFuture<'static, io::Result<()>> {
        let result = match self.data.lock() {
            Ok(mut data) => match data.get_mut(&id) {
                Some(x) => {
                    x.masks = Some(masks);
                    x.files = files.or(x.files.take());
                    Ok(())
                }
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Unknown sequence {id:?}"),
                )),
            },
            Err(_) => Err(io::Error::other("Storage is poisoned")),
        };
        std::future::ready(result).boxed()
    }
}

fn synthetic_frame(index: usize) -> IntensityGrid {
    const SIZE: u32 = 100;
    let center = (SIZE / 2) as f32;
    let radius_y = (17.0 * (0.2 * index as f32).sin() + 5.0).abs().max(1.0);
    let radius_x = 40.0;

    let noisy = GrayImage::from_fn(SIZE, SIZE, |x, y| {
        let dy = (y as f32 - center) / radius_y;
        let dx = (x as f32 - center) / radius_x;
        if dx * dx + dy * dy < 1.0 {
            Luma([125])
        } else {
            Luma([173 + (noise(x, y, index as u32) % 83) as u8])
        }
    });
    IntensityGrid::from(&image::imageops::blur(&noisy, 2.5))
}

fn noise(x: u32, y: u32, z: u32) -> u32 {
    let mut v = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B) ^ z.wrapping_mul(0xC2B2_AE35);
    v ^= v >> 15;
    v = v.wrapping_mul(0x2C1B_3C6D);
    v ^ (v >> 12)
}
