//! The weighted-pixel image buffer: allocation, clearing, and pixel access.

use crate::pixel_format::PixelFormat;
use crate::vec::{Vec2, Vec4};

/// A raster of weighted pixels in one of [`PixelFormat`]'s layouts.
///
/// Every pixel carries a nonnegative weight alongside its value(s); weight
/// `0` means "no data at this pixel" (spec §3). The backing buffer is a flat
/// `Vec<f32>`:
/// - `Gray`: `width * height * 2` floats, `(value, weight)` per pixel.
/// - `RGB`: `width * height * 4` floats, `(r, g, b, weight)` per pixel.
/// - `SeparateRGB`: three concatenated `Gray`-shaped planes (R, then G, then
///   B), each with its own independent weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u16,
    pub height: u16,
    pub format: PixelFormat,
    pub(crate) data: Vec<f32>,
}

const MAX_DIM: u32 = 65535;

impl Image {
    /// Allocate a new image. If `width` or `height` exceeds 65535 the image
    /// is forced to `Invalid` (spec §4.1).
    ///
    /// The backing buffer is zero-filled rather than left byte-uninitialized
    /// (safe Rust has no uninitialized `Vec<f32>`); this happens to coincide
    /// with "no data" (`weight == 0`) everywhere, but callers that need a
    /// specific clear policy should still call [`Image::clear`],
    /// [`Image::clear_black`], or [`Image::clear_white`] explicitly.
    pub fn init(width: u32, height: u32, format: PixelFormat) -> Image {
        if width > MAX_DIM || height > MAX_DIM || format == PixelFormat::Invalid {
            return Image {
                width: 0,
                height: 0,
                format: PixelFormat::Invalid,
                data: Vec::new(),
            };
        }
        let pixel_count = width as usize * height as usize;
        let len = pixel_count * format.channel_width() * format.plane_count();
        Image {
            width: width as u16,
            height: height as u16,
            format,
            data: vec![0.0; len],
        }
    }

    pub fn w(&self) -> usize {
        self.width as usize
    }

    pub fn h(&self) -> usize {
        self.height as usize
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.w() && (y as usize) < self.h()
    }

    /// Zero all bytes: every pixel becomes `(0, ..., weight=0)`, i.e. "no
    /// data".
    pub fn clear(&mut self) {
        if self.format == PixelFormat::Invalid {
            return;
        }
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Value channels to 0, weight to 1.
    pub fn clear_black(&mut self) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => fill_gray_plane(&mut self.data, Vec2::new(0.0, 1.0)),
            PixelFormat::RGB => fill_rgb_plane(&mut self.data, Vec4::new(0.0, 0.0, 0.0, 1.0)),
            PixelFormat::SeparateRGB => fill_gray_plane(&mut self.data, Vec2::new(0.0, 1.0)),
        }
    }

    /// All components (including weight) to 1.
    pub fn clear_white(&mut self) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => fill_gray_plane(&mut self.data, Vec2::new(1.0, 1.0)),
            PixelFormat::RGB => fill_rgb_plane(&mut self.data, Vec4::new(1.0, 1.0, 1.0, 1.0)),
            PixelFormat::SeparateRGB => fill_gray_plane(&mut self.data, Vec2::new(1.0, 1.0)),
        }
    }

    pub(crate) fn gray_data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn gray_data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub(crate) fn rgb_data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn rgb_data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Plane `0..3` (R, G, B) of a `SeparateRGB` image, Gray-shaped.
    pub(crate) fn plane(&self, plane: usize) -> &[f32] {
        let plane_len = self.w() * self.h() * 2;
        &self.data[plane * plane_len..(plane + 1) * plane_len]
    }

    pub(crate) fn plane_mut(&mut self, plane: usize) -> &mut [f32] {
        let plane_len = self.w() * self.h() * 2;
        &mut self.data[plane * plane_len..(plane + 1) * plane_len]
    }

    pub fn data_red(&self) -> &[f32] {
        match self.format {
            PixelFormat::SeparateRGB => self.plane(0),
            _ => &[],
        }
    }

    pub fn data_green(&self) -> &[f32] {
        match self.format {
            PixelFormat::SeparateRGB => self.plane(1),
            _ => &[],
        }
    }

    pub fn data_blue(&self) -> &[f32] {
        match self.format {
            PixelFormat::SeparateRGB => self.plane(2),
            _ => &[],
        }
    }

    pub(crate) fn data_red_mut(&mut self) -> &mut [f32] {
        self.plane_mut(0)
    }

    pub(crate) fn data_green_mut(&mut self) -> &mut [f32] {
        self.plane_mut(1)
    }

    pub(crate) fn data_blue_mut(&mut self) -> &mut [f32] {
        self.plane_mut(2)
    }

    fn gray_at(&self, x: i32, y: i32) -> Vec2 {
        let idx = (y as usize * self.w() + x as usize) * 2;
        Vec2::new(self.data[idx], self.data[idx + 1])
    }

    fn rgb_at(&self, x: i32, y: i32) -> Vec4 {
        let idx = (y as usize * self.w() + x as usize) * 4;
        Vec4::new(
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    fn plane_at(&self, plane: usize, x: i32, y: i32) -> Vec2 {
        let idx = (y as usize * self.w() + x as usize) * 2;
        let p = self.plane(plane);
        Vec2::new(p[idx], p[idx + 1])
    }

    /// Out-of-bounds queries return zero-pixels. Conversion on the fly for
    /// formats that don't natively hold Gray data.
    pub fn pixel_gray(&self, x: i32, y: i32) -> Vec2 {
        if !self.in_bounds(x, y) {
            return Vec2::new(0.0, 0.0);
        }
        match self.format {
            PixelFormat::Invalid => Vec2::new(0.0, 0.0),
            PixelFormat::Gray => self.gray_at(x, y),
            PixelFormat::RGB => {
                let p = self.rgb_at(x, y);
                Vec2::new((p.0[0] + p.0[1] + p.0[2]) / 3.0, p.0[3])
            }
            PixelFormat::SeparateRGB => {
                let r = self.plane_at(0, x, y);
                let g = self.plane_at(1, x, y);
                let b = self.plane_at(2, x, y);
                (r + g + b) / 3.0
            }
        }
    }

    pub fn pixel_rgb(&self, x: i32, y: i32) -> Vec4 {
        if !self.in_bounds(x, y) {
            return Vec4::new(0.0, 0.0, 0.0, 0.0);
        }
        match self.format {
            PixelFormat::Invalid => Vec4::new(0.0, 0.0, 0.0, 0.0),
            PixelFormat::Gray => {
                let p = self.gray_at(x, y);
                Vec4::new(p.x(), p.x(), p.x(), p.y())
            }
            PixelFormat::RGB => self.rgb_at(x, y),
            PixelFormat::SeparateRGB => {
                let r = self.plane_at(0, x, y);
                let g = self.plane_at(1, x, y);
                let b = self.plane_at(2, x, y);
                let weight = (r.y() + g.y() + b.y()) / 3.0;
                let chan = |c: Vec2| if c.y() == 0.0 { 0.0 } else { c.x() * weight / c.y() };
                Vec4::new(chan(r), chan(g), chan(b), weight)
            }
        }
    }

    pub fn pixel_red(&self, x: i32, y: i32) -> Vec2 {
        self.pixel_channel(x, y, 0)
    }

    pub fn pixel_green(&self, x: i32, y: i32) -> Vec2 {
        self.pixel_channel(x, y, 1)
    }

    pub fn pixel_blue(&self, x: i32, y: i32) -> Vec2 {
        self.pixel_channel(x, y, 2)
    }

    fn pixel_channel(&self, x: i32, y: i32, channel: usize) -> Vec2 {
        if !self.in_bounds(x, y) {
            return Vec2::new(0.0, 0.0);
        }
        match self.format {
            PixelFormat::Invalid => Vec2::new(0.0, 0.0),
            PixelFormat::Gray => self.gray_at(x, y),
            PixelFormat::RGB => {
                let p = self.rgb_at(x, y);
                Vec2::new(p.0[channel], p.0[3])
            }
            PixelFormat::SeparateRGB => self.plane_at(channel, x, y),
        }
    }

    /// Row pointers per channel are only defined for compatible formats:
    /// `row_red` on `Gray` returns the Gray row; on `RGB` returns `None`
    /// (channels are interleaved, not contiguous); on `SeparateRGB` returns
    /// the R-plane row.
    pub fn row_red(&self, y: usize) -> Option<&[f32]> {
        self.row_channel(y, 0)
    }

    pub fn row_green(&self, y: usize) -> Option<&[f32]> {
        self.row_channel(y, 1)
    }

    pub fn row_blue(&self, y: usize) -> Option<&[f32]> {
        self.row_channel(y, 2)
    }

    fn row_channel(&self, y: usize, channel: usize) -> Option<&[f32]> {
        if y >= self.h() {
            return None;
        }
        match self.format {
            PixelFormat::Gray => {
                let start = y * self.w() * 2;
                Some(&self.data[start..start + self.w() * 2])
            }
            PixelFormat::RGB => None,
            PixelFormat::SeparateRGB => {
                let start = y * self.w() * 2;
                let p = self.plane(channel);
                Some(&p[start..start + self.w() * 2])
            }
            PixelFormat::Invalid => None,
        }
    }

    /// Bilinear-interpolate the four pixels surrounding `pos`, offsetting
    /// by `+1` so that floor-based indexing picks the unit cell's corners.
    pub fn subpixel_gray(&self, pos: Vec2) -> Vec2 {
        let (x, y, d) = subpixel_cell(pos);
        lerp2(
            d.y(),
            lerp2(d.x(), self.pixel_gray(x - 1, y - 1), self.pixel_gray(x, y - 1)),
            lerp2(d.x(), self.pixel_gray(x - 1, y), self.pixel_gray(x, y)),
        )
    }

    pub fn subpixel_rgb(&self, pos: Vec2) -> Vec4 {
        let (x, y, d) = subpixel_cell(pos);
        lerp4(
            d.y(),
            lerp4(d.x(), self.pixel_rgb(x - 1, y - 1), self.pixel_rgb(x, y - 1)),
            lerp4(d.x(), self.pixel_rgb(x - 1, y), self.pixel_rgb(x, y)),
        )
    }

    pub fn subpixel_red(&self, pos: Vec2) -> Vec2 {
        self.subpixel_channel(pos, 0)
    }

    pub fn subpixel_green(&self, pos: Vec2) -> Vec2 {
        self.subpixel_channel(pos, 1)
    }

    pub fn subpixel_blue(&self, pos: Vec2) -> Vec2 {
        self.subpixel_channel(pos, 2)
    }

    fn subpixel_channel(&self, pos: Vec2, channel: usize) -> Vec2 {
        let (x, y, d) = subpixel_cell(pos);
        let get = |x, y| self.pixel_channel(x, y, channel);
        lerp2(
            d.y(),
            lerp2(d.x(), get(x - 1, y - 1), get(x, y - 1)),
            lerp2(d.x(), get(x - 1, y), get(x, y)),
        )
    }
}

fn subpixel_cell(pos: Vec2) -> (i32, i32, Vec2) {
    let pos = pos + Vec2::new(1.0, 1.0);
    let x = pos.x().floor() as i32;
    let y = pos.y().floor() as i32;
    let d = pos - Vec2::new(x as f32, y as f32);
    (x, y, d)
}

fn lerp2(t: f32, a: Vec2, b: Vec2) -> Vec2 {
    a * (1.0 - t) + b * t
}

fn lerp4(t: f32, a: Vec4, b: Vec4) -> Vec4 {
    a * (1.0 - t) + b * t
}

fn fill_gray_plane(data: &mut [f32], v: Vec2) {
    for chunk in data.chunks_exact_mut(2) {
        chunk[0] = v.x();
        chunk[1] = v.y();
    }
}

fn fill_rgb_plane(data: &mut [f32], v: Vec4) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.copy_from_slice(&v.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_image_is_invalid() {
        let img = Image::init(65536, 10, PixelFormat::Gray);
        assert_eq!(img.format, PixelFormat::Invalid);
    }

    #[test]
    fn pixel_gray_out_of_bounds_is_zero() {
        let img = Image::init(4, 4, PixelFormat::Gray);
        assert_eq!(img.pixel_gray(-1, 0), Vec2::new(0.0, 0.0));
        assert_eq!(img.pixel_gray(0, -1), Vec2::new(0.0, 0.0));
        assert_eq!(img.pixel_gray(4, 0), Vec2::new(0.0, 0.0));
    }

    #[test]
    fn subpixel_at_grid_point_matches_pixel() {
        let mut img = Image::init(4, 4, PixelFormat::Gray);
        for (i, v) in img.gray_data_mut().iter_mut().enumerate() {
            *v = i as f32;
        }
        let p = img.pixel_gray(2, 1);
        let s = img.subpixel_gray(Vec2::new(2.0, 1.0));
        assert!((p.x() - s.x()).abs() < 1e-5);
        assert!((p.y() - s.y()).abs() < 1e-5);
    }

    #[test]
    fn clear_black_sets_weight_one_value_zero() {
        let mut img = Image::init(2, 2, PixelFormat::Gray);
        img.clear_black();
        for p in img.gray_data().chunks_exact(2) {
            assert_eq!(p[0], 0.0);
            assert_eq!(p[1], 1.0);
        }
        // idempotent
        img.clear_black();
        for p in img.gray_data().chunks_exact(2) {
            assert_eq!(p[0], 0.0);
            assert_eq!(p[1], 1.0);
        }
    }

    #[test]
    fn clear_white_idempotent() {
        let mut img = Image::init(2, 2, PixelFormat::RGB);
        img.clear_white();
        img.clear_white();
        for p in img.rgb_data().chunks_exact(4) {
            assert_eq!(p, &[1.0, 1.0, 1.0, 1.0]);
        }
    }
}
