use std::{
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use futures::{FutureExt, future::BoxFuture};
use image::{
    AnimationDecoder, DynamicImage, GrayImage, ImageBuffer, RgbImage, RgbaImage,
    codecs::gif::GifDecoder,
};
use itertools::Itertools;
use log::{info, warn};
use stack_masks::IntensityGrid;
use tiff::{
    ColorType, TiffError,
    decoder::{Decoder, DecodingResult},
};

use super::{Kind, SequenceData, SequenceId, Storage, read_masks, write_masks};

/// Mask file name of folder backed sequences
const FOLDER_MASK_NAME: &str = "images.mask";

/// Reads image stacks from the filesystem.
///
/// A sequence is either a folder of images (sorted by name), an animated GIF
/// (one frame per GIF frame) or a single image. Masks are stored next to it,
/// see [`FileStorage::mask_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }

    /// `<dir>/<stem>.mask` for a file, `<folder>/images.mask` for a folder
    pub fn mask_path(path: &Path) -> io::Result<PathBuf> {
        if path.is_dir() {
            return Ok(path.join(FOLDER_MASK_NAME));
        }
        let stem = path
            .file_stem()
            .and_then(|x| x.to_str())
            .ok_or_else(|| io::Error::other("File has no filename"))?;
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::other("Base musten't be a root-dir"))?;
        Ok(dir.join(format!("{stem}.mask")))
    }

    fn load_blocking(id: SequenceId) -> io::Result<SequenceData> {
        let path = PathBuf::from(&id);
        let (images, files) = if path.is_dir() {
            let files = list_folder_images(&path)?;
            let images = files
                .iter()
                .map(|name| load_image(&path.join(name)))
                .collect::<io::Result<Vec<_>>>()?;
            (images, Some(files))
        } else {
            (load_frames(&path)?, None)
        };
        if images.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No images found in {id}"),
            ));
        }

        let masks = match std::fs::File::open(Self::mask_path(&path)?) {
            Ok(f) => {
                let (masks, saved_files) = read_masks(BufReader::new(f))?;
                if saved_files.is_some() && saved_files != files {
                    warn!("Files of {id} changed since the masks were saved");
                }
                Some(masks)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };
        info!(
            "Loaded {} frames from {id} ({})",
            images.len(),
            if masks.is_some() { "with masks" } else { "no masks" }
        );

        Ok(SequenceData {
            id,
            images: images.into_iter().map(Arc::new).collect(),
            masks,
            files,
        })
    }
}

impl Storage for FileStorage {
    fn load_sequence(&self, id: &SequenceId) -> BoxFuture<'static, io::Result<SequenceData>> {
        let (tx, rx) = futures::channel::oneshot::channel();
        let id = id.clone();

        let handle = std::thread::spawn(move || tx.send(Self::load_blocking(id)));
        async move {
            let r = rx.await.map_err(io::Error::other).and_then(|a| a);
            if handle.join().is_err() {
                return Err(io::Error::other("Loader thread panicked"));
            }
            r
        }
        .boxed()
    }

    fn store_masks(
        &self,
        id: SequenceId,
        masks: Vec<stack_masks::LabelMask>,
        files: Option<Vec<String>>,
    ) -> BoxFuture<'static, io::Result<()>> {
        let path = Self::mask_path(Path::new(&id));

        async move {
            info!("Store at: {path:?}");
            let f = std::fs::File::create(path?)?;
            write_masks(BufWriter::new(f), &masks, files.as_deref())
        }
        .boxed()
    }
}

/// Image files directly within `dir`, sorted by name
fn list_folder_images(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Kind::from_str(e).ok());
        if matches!(kind, Some(Kind::Image | Kind::Stack)) {
            names.push(name);
        }
    }
    Ok(names.into_iter().sorted_unstable().collect())
}

fn load_image(path: &Path) -> io::Result<IntensityGrid> {
    let image = image::open(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(IntensityGrid::from_dynamic_image(&image))
}

/// All frames of a single file
fn load_frames(path: &Path) -> io::Result<Vec<IntensityGrid>> {
    let kind = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| Kind::from_str(e).ok());
    match kind {
        Some(Kind::Animation) => {
            let reader = BufReader::new(std::fs::File::open(path)?);
            let decoder = GifDecoder::new(reader).map_err(io::Error::other)?;
            decoder
                .into_frames()
                .map(|frame| {
                    let frame = frame.map_err(io::Error::other)?;
                    Ok(IntensityGrid::from_dynamic_image(&DynamicImage::ImageRgba8(
                        frame.into_buffer(),
                    )))
                })
                .collect()
        }
        Some(Kind::Stack) => load_tiff_pages(path),
        Some(Kind::Image) => Ok(vec![load_image(path)?]),
        Some(Kind::Mask) | None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Unsupported file type: {}", path.display()),
        )),
    }
}

/// Every page of a (multi-page) TIFF
fn load_tiff_pages(path: &Path) -> io::Result<Vec<IntensityGrid>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut decoder = Decoder::new(reader).map_err(tiff_error)?;
    let mut pages = vec![tiff_page(&mut decoder)?];
    while decoder.more_images() {
        decoder.next_image().map_err(tiff_error)?;
        pages.push(tiff_page(&mut decoder)?);
    }
    Ok(pages)
}

fn tiff_page<R: io::Read + io::Seek>(decoder: &mut Decoder<R>) -> io::Result<IntensityGrid> {
    let (width, height) = decoder.dimensions().map_err(tiff_error)?;
    let color = decoder.colortype().map_err(tiff_error)?;
    let image = match (color, decoder.read_image().map_err(tiff_error)?) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => {
            GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (ColorType::RGB(8), DecodingResult::U8(buf)) => {
            RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => {
            RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (ColorType::RGB(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (ColorType::RGBA(16), DecodingResult::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba16)
        }
        (color, _) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported TIFF color type {color:?}"),
            ));
        }
    }
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "TIFF page is truncated"))?;
    Ok(IntensityGrid::from_dynamic_image(&image))
}

fn tiff_error(e: TiffError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("TIFF decode error: {e}"))
}
