//! PNG input/output, mapping between 8/16-bit integer samples and the
//! normalized weighted-pixel model.
//!
//! Read: an 8-bit byte `b` becomes `(b + 0.5) / 256`, a 16-bit word `w`
//! becomes `(w + 0.5) / 65536`; every decoded pixel gets `weight = 1`
//! (a PNG carries no notion of missing data).
//!
//! Write: a normalized value `v` is rescaled by the pixel's own weight,
//! then quantized as `clamp(round(v * 2^n), 0, 2^n - 1)` for `n` in `{8,
//! 16}`. A zero-weight pixel writes as black.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

type GrayImage16 = ImageBuffer<Luma<u16>, Vec<u16>>;
type RgbImage16 = ImageBuffer<Rgb<u16>, Vec<u16>>;

use crate::error::SpicaError;
use crate::image::Image;
use crate::pixel_format::PixelFormat;

fn decode_u8(b: u8) -> f32 {
    (b as f32 + 0.5) / 256.0
}

fn decode_u16(w: u16) -> f32 {
    (w as f32 + 0.5) / 65536.0
}

fn encode(v: f32, weight: f32, max: f32) -> f32 {
    if weight == 0.0 {
        0.0
    } else {
        (v / weight * max).round().max(0.0).min(max)
    }
}

/// Load a PNG, gray or RGB, 8- or 16-bit, into a weighted `Image`.
pub fn load(path: &std::path::Path) -> Result<Image, SpicaError> {
    match image::open(path)? {
        DynamicImage::ImageLuma8(img) => Ok(gray_from_u8(&img)),
        DynamicImage::ImageLuma16(img) => Ok(gray_from_u16(&img)),
        DynamicImage::ImageRgb8(img) => Ok(rgb_from_u8(&img)),
        DynamicImage::ImageRgb16(img) => Ok(rgb_from_u16(&img)),
        other => Ok(rgb_from_u8(&other.to_rgb8())),
    }
}

/// Save an `Image` as a 16-bit PNG, the depth this tool always writes
/// (mirroring the original's own `align` example, which hardcodes
/// `SPF_RGB16`/`SPF_Gray16` with no depth flag).
pub fn save(path: &std::path::Path, image: &Image) -> Result<(), SpicaError> {
    match image.format {
        PixelFormat::Invalid => Err(SpicaError::InvalidImage("cannot save an Invalid image".into())),
        PixelFormat::Gray => {
            let buf = gray_to_u16(image);
            buf.save(path)?;
            Ok(())
        }
        PixelFormat::RGB | PixelFormat::SeparateRGB => {
            let buf = rgb_to_u16(image);
            buf.save(path)?;
            Ok(())
        }
    }
}

fn gray_from_u8(img: &GrayImage) -> Image {
    let (w, h) = img.dimensions();
    let mut out = Image::init(w, h, PixelFormat::Gray);
    let data = out.gray_data_mut();
    for (i, p) in img.pixels().enumerate() {
        data[i * 2] = decode_u8(p.0[0]);
        data[i * 2 + 1] = 1.0;
    }
    out
}

fn gray_from_u16(img: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Image {
    let (w, h) = img.dimensions();
    let mut out = Image::init(w, h, PixelFormat::Gray);
    let data = out.gray_data_mut();
    for (i, p) in img.pixels().enumerate() {
        data[i * 2] = decode_u16(p.0[0]);
        data[i * 2 + 1] = 1.0;
    }
    out
}

fn rgb_from_u8(img: &RgbImage) -> Image {
    let (w, h) = img.dimensions();
    let mut out = Image::init(w, h, PixelFormat::RGB);
    let data = out.rgb_data_mut();
    for (i, p) in img.pixels().enumerate() {
        data[i * 4] = decode_u8(p.0[0]);
        data[i * 4 + 1] = decode_u8(p.0[1]);
        data[i * 4 + 2] = decode_u8(p.0[2]);
        data[i * 4 + 3] = 1.0;
    }
    out
}

fn rgb_from_u16(img: &ImageBuffer<Rgb<u16>, Vec<u16>>) -> Image {
    let (w, h) = img.dimensions();
    let mut out = Image::init(w, h, PixelFormat::RGB);
    let data = out.rgb_data_mut();
    for (i, p) in img.pixels().enumerate() {
        data[i * 4] = decode_u16(p.0[0]);
        data[i * 4 + 1] = decode_u16(p.0[1]);
        data[i * 4 + 2] = decode_u16(p.0[2]);
        data[i * 4 + 3] = 1.0;
    }
    out
}

fn gray_to_u8(image: &Image) -> GrayImage {
    let mut buf = ImageBuffer::new(image.w() as u32, image.h() as u32);
    for (x, y, pixel) in buf.enumerate_pixels_mut() {
        let p = image.pixel_gray(x as i32, y as i32);
        *pixel = Luma([encode(p.x(), p.y(), 255.0) as u8]);
    }
    buf
}

fn rgb_to_u8(image: &Image) -> RgbImage {
    let mut buf = ImageBuffer::new(image.w() as u32, image.h() as u32);
    for (x, y, pixel) in buf.enumerate_pixels_mut() {
        let p = image.pixel_rgb(x as i32, y as i32);
        *pixel = Rgb([
            encode(p.0[0], p.0[3], 255.0) as u8,
            encode(p.0[1], p.0[3], 255.0) as u8,
            encode(p.0[2], p.0[3], 255.0) as u8,
        ]);
    }
    buf
}

fn gray_to_u16(image: &Image) -> GrayImage16 {
    let mut buf = ImageBuffer::new(image.w() as u32, image.h() as u32);
    for (x, y, pixel) in buf.enumerate_pixels_mut() {
        let p = image.pixel_gray(x as i32, y as i32);
        *pixel = Luma([encode(p.x(), p.y(), 65535.0) as u16]);
    }
    buf
}

fn rgb_to_u16(image: &Image) -> RgbImage16 {
    let mut buf = ImageBuffer::new(image.w() as u32, image.h() as u32);
    for (x, y, pixel) in buf.enumerate_pixels_mut() {
        let p = image.pixel_rgb(x as i32, y as i32);
        *pixel = Rgb([
            encode(p.0[0], p.0[3], 65535.0) as u16,
            encode(p.0[1], p.0[3], 65535.0) as u16,
            encode(p.0[2], p.0[3], 65535.0) as u16,
        ]);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_u8_maps_bin_centers() {
        assert!((decode_u8(0) - 1.0 / 512.0).abs() < 1e-6);
        assert!((decode_u8(255) - 511.0 / 512.0).abs() < 1e-6);
    }

    #[test]
    fn encode_rescales_by_weight_and_clamps() {
        assert_eq!(encode(0.5, 1.0, 255.0), 128.0);
        assert_eq!(encode(0.0, 0.0, 255.0), 0.0);
        assert_eq!(encode(10.0, 1.0, 255.0), 255.0);
    }

    #[test]
    fn gray_round_trip_through_u8_buffer() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(0, 1, Luma([255]));
        img.put_pixel(1, 1, Luma([64]));
        let decoded = gray_from_u8(&img);
        let reencoded = gray_to_u8(&decoded);
        assert_eq!(reencoded.get_pixel(1, 0).0[0], 128);
        assert_eq!(reencoded.get_pixel(0, 1).0[0], 255);
    }

    #[test]
    fn zero_weight_pixel_writes_black() {
        let img = Image::init(1, 1, PixelFormat::Gray);
        let buf = gray_to_u8(&img);
        assert_eq!(buf.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn gray_round_trip_through_u16_buffer() {
        let mut img = GrayImage16::new(2, 1);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([40000]));
        let decoded = gray_from_u16(&img);
        let reencoded = gray_to_u16(&decoded);
        assert_eq!(reencoded.get_pixel(1, 0).0[0], 40000);
    }

    #[test]
    fn zero_weight_pixel_writes_black_at_16_bit() {
        let img = Image::init(1, 1, PixelFormat::Gray);
        let buf = gray_to_u16(&img);
        assert_eq!(buf.get_pixel(0, 0).0[0], 0);
    }
}
