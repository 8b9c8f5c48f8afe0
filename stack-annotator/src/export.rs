//! Writes all masks as 8 bit images (0 and 255): a numbered PNG series or
//! one multi-page TIFF.

use std::{
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use image::GrayImage;
use tiff::encoder::{TiffEncoder, colortype::Gray8};
use log::info;
use stack_masks::LabelMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Tiff,
}

impl FromStr for ExportFormat {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "tif" | "tiff" => Ok(Self::Tiff),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Cannot export masks as '{s}', use png or tif"),
            )),
        }
    }
}

/// `<dir>/<stem>_<index>.<ext>` for an export target `<dir>/<stem>.<ext>`
pub fn export_path(target: &Path, index: usize) -> io::Result<PathBuf> {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Export target has no name"))?;
    let ext = target.extension().and_then(|s| s.to_str()).unwrap_or_default();
    Ok(target.with_file_name(format!("{stem}_{index}.{ext}")))
}

/// Exports every mask of the sequence. The format follows the extension of
/// `target`: PNG writes `<stem>_<index>.png` per frame, TIFF writes all frames
/// as pages of `target`. Returns the written files.
pub fn export_masks(target: &Path, masks: &[LabelMask]) -> io::Result<Vec<PathBuf>> {
    let format = target
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .parse::<ExportFormat>()?;

    let written = match format {
        ExportFormat::Png => {
            let mut written = Vec::with_capacity(masks.len());
            for (index, mask) in masks.iter().enumerate() {
                let path = export_path(target, index)?;
                mask_image(mask)
                    .save_with_format(&path, image::ImageFormat::Png)
                    .map_err(io::Error::other)?;
                written.push(path);
            }
            written
        }
        ExportFormat::Tiff => {
            write_tiff_stack(target, masks)?;
            vec![target.to_path_buf()]
        }
    };
    info!("Exported {} masks to {}", masks.len(), target.display());
    Ok(written)
}

fn write_tiff_stack(target: &Path, masks: &[LabelMask]) -> io::Result<()> {
    let err_map = |e: tiff::TiffError| io::Error::other(format!("TIFF encode error: {e}"));
    let writer = io::BufWriter::new(std::fs::File::create(target)?);
    let mut encoder = TiffEncoder::new(writer).map_err(err_map)?;
    for mask in masks {
        let image = mask_image(mask);
        encoder
            .write_image::<Gray8>(image.width(), image.height(), image.as_raw())
            .map_err(err_map)?;
    }
    Ok(())
}

fn mask_image(mask: &LabelMask) -> GrayImage {
    let [width, height] = mask.size();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([if mask.get(x as usize, y as usize) { 255 } else { 0 }])
    })
}
