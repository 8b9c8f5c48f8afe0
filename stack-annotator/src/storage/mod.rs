use std::{
    io::{self, ErrorKind, Read, Write},
    str::FromStr,
    sync::Arc,
};

use futures::future::BoxFuture;
use stack_masks::{IntensityGrid, LabelMask};

pub mod file;
pub mod in_memory;

const PREAMBLE: [u8; 7] = *b"stkmask";
const VERSION: u16 = 1;

/// Identifies a sequence within a [`Storage`], e.g. a file or folder path
pub type SequenceId = String;

/// Everything needed to open a sequence for annotation
#[derive(Debug, Clone)]
pub struct SequenceData {
    pub id: SequenceId,
    pub images: Vec<Arc<IntensityGrid>>,
    /// Previously saved masks, one per image
    pub masks: Option<Vec<LabelMask>>,
    /// Source files of folder backed sequences, in frame order
    pub files: Option<Vec<String>>,
}

pub trait Storage {
    fn load_sequence(&self, id: &SequenceId) -> BoxFuture<'static, io::Result<SequenceData>>;
    fn store_masks(
        &self,
        id: SequenceId,
        masks: Vec<LabelMask>,
        files: Option<Vec<String>>,
    ) -> BoxFuture<'static, io::Result<()>>;
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
enum Kind {
    Mask,
    Image,
    /// Multi-page TIFF, one frame per page
    Stack,
    Animation,
}

impl FromStr for Kind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "png" => Ok(Self::Image),
            "tiff" | "tif" => Ok(Self::Stack),
            "gif" => Ok(Self::Animation),
            "mask" => Ok(Self::Mask),
            _ => Err(()),
        }
    }
}

/// Writes the masks (and optional file list) in the binary mask format
pub fn write_masks(
    mut w: impl Write,
    masks: &[LabelMask],
    files: Option<&[String]>,
) -> io::Result<()> {
    w.write_all(&PREAMBLE)?;
    w.write_all(&VERSION.to_le_bytes())?;

    let mut f = brotli::CompressorWriter::new(w, 4096, 11, 22);
    f.write_all(&length_u32(masks.len())?.to_le_bytes())?;
    for mask in masks {
        let [width, height] = mask.size();
        let dims = [length_u32(width)?.to_le(), length_u32(height)?.to_le()];
        f.write_all(bytemuck::cast_slice(&dims))?;
        f.write_all(&pack_bits(mask.bits()))?;
    }
    match files {
        Some(files) => {
            f.write_all(&[1])?;
            f.write_all(&length_u32(files.len())?.to_le_bytes())?;
            for file in files {
                f.write_all(&length_u32(file.len())?.to_le_bytes())?;
                f.write_all(file.as_bytes())?;
            }
        }
        None => f.write_all(&[0])?,
    }
    f.flush()
}

/// Reads masks written by [`write_masks`]
pub fn read_masks(mut r: impl Read) -> io::Result<(Vec<LabelMask>, Option<Vec<String>>)> {
    let mut preamble = [0; PREAMBLE.len()];
    r.read_exact(&mut preamble)?;
    if preamble != PREAMBLE {
        return Err(io::Error::new(ErrorKind::InvalidData, "Invalid preamble"));
    }
    let mut version_bytes = [0; 2];
    r.read_exact(&mut version_bytes)?;
    let version = u16::from_le_bytes(version_bytes);
    if version != VERSION {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("Unsupported mask file version {version}"),
        ));
    }

    let mut f = brotli::Decompressor::new(r, 4096);
    let count = read_u32(&mut f)?;
    let mut masks = Vec::new();
    for _ in 0..count {
        let mut dims = [0u32; 2];
        f.read_exact(bytemuck::cast_slice_mut(&mut dims))?;
        let size = dims.map(|d| u32::from_le(d) as usize);
        let len = size[0].checked_mul(size[1]).ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidData, format!("Invalid mask size {size:?}"))
        })?;
        let packed = read_payload(&mut f, len.div_ceil(8))?;
        let bits = (0..len).map(|i| (packed[i / 8] >> (i % 8)) & 1 == 1).collect();
        masks.push(LabelMask::from_vec(size, bits).ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidData, "Mask length doesn't match its size")
        })?);
    }

    let mut has_files = [0];
    f.read_exact(&mut has_files)?;
    let files = match has_files[0] {
        0 => None,
        _ => {
            let count = read_u32(&mut f)?;
            let mut files = Vec::new();
            for _ in 0..count {
                let len = read_u32(&mut f)? as usize;
                let name = read_payload(&mut f, len)?;
                files.push(
                    String::from_utf8(name)
                        .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?,
                );
            }
            Some(files)
        }
    };
    Ok((masks, files))
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, bit)| acc | (u8::from(*bit) << i))
        })
        .collect()
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut bytes = [0; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Reads exactly `len` bytes. The buffer grows with the data actually read,
/// so corrupt lengths fail with `UnexpectedEof` instead of a huge allocation.
fn read_payload(r: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("Expected {len} bytes, got {}", buf.len()),
        ));
    }
    Ok(buf)
}

fn length_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("Version1 allows for MAX {} entries, got {len}", u32::MAX),
        )
    })
}
