//! SIWW: the fixed little-endian binary layout used for dark frames.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "SPICAIWW"
//! 8       4     version (= 1)
//! 12      2     header size (>= 20)
//! 14      2     format tag (PixelFormat ordinal; rejected if > SeparateRGB)
//! 16      2     width
//! 18      2     height
//! header_size.. pixel data, native little-endian f32 per float field
//! ```
//!
//! The format-tag bound accepts `SeparateRGB` itself (`tag <= 3`). This is
//! the boundary as written, not the stricter `tag < MAX_SUPPORTED_FORMAT`
//! check in the source this format was ported from, which excludes
//! `SeparateRGB` — an off-by-one that direction has no bearing on here
//! since the bound is stated explicitly.

use std::convert::TryInto;
use std::io::{Read, Write};

use crate::error::SpicaError;
use crate::image::Image;
use crate::pixel_format::PixelFormat;

const MAGIC: &[u8; 8] = b"SPICAIWW";
const VERSION: u32 = 1;
const HEADER_SIZE: u16 = 20;

fn format_ordinal(format: PixelFormat) -> u16 {
    match format {
        PixelFormat::Invalid => 0,
        PixelFormat::Gray => 1,
        PixelFormat::RGB => 2,
        PixelFormat::SeparateRGB => 3,
    }
}

fn format_from_ordinal(tag: u16) -> Option<PixelFormat> {
    match tag {
        0 => Some(PixelFormat::Invalid),
        1 => Some(PixelFormat::Gray),
        2 => Some(PixelFormat::RGB),
        3 => Some(PixelFormat::SeparateRGB),
        _ => None,
    }
}

/// Read a SIWW file into an `Image`. A malformed header (bad magic, short
/// header, out-of-range format tag) or truncated data yields `Invalid`
/// rather than an error, matching the value-typed failure convention used
/// elsewhere in the core.
pub fn load(path: &std::path::Path) -> Result<Image, SpicaError> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; HEADER_SIZE as usize];
    if file.read_exact(&mut header).is_err() {
        return Ok(Image::init(0, 0, PixelFormat::Invalid));
    }

    if &header[0..8] != MAGIC {
        return Ok(Image::init(0, 0, PixelFormat::Invalid));
    }
    let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
    let header_size = u16::from_le_bytes(header[12..14].try_into().unwrap());
    let format_tag = u16::from_le_bytes(header[14..16].try_into().unwrap());
    let width = u16::from_le_bytes(header[16..18].try_into().unwrap());
    let height = u16::from_le_bytes(header[18..20].try_into().unwrap());

    if version != VERSION || header_size < HEADER_SIZE {
        return Ok(Image::init(0, 0, PixelFormat::Invalid));
    }
    let format = match format_from_ordinal(format_tag) {
        Some(f) => f,
        None => return Ok(Image::init(0, 0, PixelFormat::Invalid)),
    };

    if header_size > HEADER_SIZE {
        let mut skip = vec![0u8; (header_size - HEADER_SIZE) as usize];
        file.read_exact(&mut skip)?;
    }

    let mut image = Image::init(width as u32, height as u32, format);
    if image.format == PixelFormat::Invalid {
        return Ok(image);
    }

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;
    let floats = image.gray_data_mut();
    if raw.len() < floats.len() * 4 {
        return Ok(Image::init(0, 0, PixelFormat::Invalid));
    }
    for (i, chunk) in raw.chunks_exact(4).take(floats.len()).enumerate() {
        floats[i] = f32::from_le_bytes(chunk.try_into().unwrap());
    }
    Ok(image)
}

/// Write `image` as a SIWW file.
pub fn save(path: &std::path::Path, image: &Image) -> Result<(), SpicaError> {
    let mut file = std::fs::File::create(path)?;
    let mut header = Vec::with_capacity(HEADER_SIZE as usize);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION.to_le_bytes());
    header.extend_from_slice(&HEADER_SIZE.to_le_bytes());
    header.extend_from_slice(&format_ordinal(image.format).to_le_bytes());
    header.extend_from_slice(&(image.width).to_le_bytes());
    header.extend_from_slice(&(image.height).to_le_bytes());
    file.write_all(&header)?;

    let mut raw = Vec::with_capacity(image.gray_data().len() * 4);
    for v in image.gray_data() {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    file.write_all(&raw)?;
    Ok(())
}
