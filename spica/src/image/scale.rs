//! Block-summing downscale, used by star detection to search a coarser
//! grid before refining candidates at full resolution.

use super::core::Image;
use crate::pixel_format::PixelFormat;
use crate::vec::{Vec2, Vec4};

impl Image {
    /// Downscale by an integer `factor`, summing (not averaging) every
    /// `factor x factor` block of source pixels into one destination pixel.
    /// Destination dimensions are `ceil(dim / factor)`; the last row/column
    /// of blocks may be partial at the source's edges.
    ///
    /// Panics if `factor == 0`.
    pub fn scale_down(&self, factor: u32) -> Image {
        assert!(factor != 0, "scale_down factor must be nonzero");
        let width = (self.width as u32 + factor - 1) / factor;
        let height = (self.height as u32 + factor - 1) / factor;
        let mut dst = Image::init(width, height, self.format);
        match dst.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => scale_down_gray(dst.gray_data_mut(), dst.w(), dst.h(), self.gray_data(), self.w(), self.h(), factor),
            PixelFormat::RGB => scale_down_rgb(dst.rgb_data_mut(), dst.w(), dst.h(), self.rgb_data(), self.w(), self.h(), factor),
            PixelFormat::SeparateRGB => {
                let (dw, dh, sw, sh) = (dst.w(), dst.h(), self.w(), self.h());
                scale_down_gray(dst.data_red_mut(), dw, dh, self.data_red(), sw, sh, factor);
                scale_down_gray(dst.data_green_mut(), dw, dh, self.data_green(), sw, sh, factor);
                scale_down_gray(dst.data_blue_mut(), dw, dh, self.data_blue(), sw, sh, factor);
            }
        }
        dst
    }
}

fn scale_down_gray(dst: &mut [f32], dst_w: usize, dst_h: usize, src: &[f32], src_w: usize, src_h: usize, factor: u32) {
    let factor = factor as usize;
    for y in 0..dst_h {
        for x in 0..dst_w {
            let mut v = Vec2::new(0.0, 0.0);
            let mx = src_w.min(factor * (x + 1));
            let my = src_h.min(factor * (y + 1));
            for sy in factor * y..my {
                for sx in factor * x..mx {
                    let idx = (sy * src_w + sx) * 2;
                    v += Vec2::new(src[idx], src[idx + 1]);
                }
            }
            let idx = (y * dst_w + x) * 2;
            dst[idx] = v.x();
            dst[idx + 1] = v.y();
        }
    }
}

fn scale_down_rgb(dst: &mut [f32], dst_w: usize, dst_h: usize, src: &[f32], src_w: usize, src_h: usize, factor: u32) {
    let factor = factor as usize;
    for y in 0..dst_h {
        for x in 0..dst_w {
            let mut v = Vec4::new(0.0, 0.0, 0.0, 0.0);
            let mx = src_w.min(factor * (x + 1));
            let my = src_h.min(factor * (y + 1));
            for sy in factor * y..my {
                for sx in factor * x..mx {
                    let idx = (sy * src_w + sx) * 4;
                    v += Vec4::new(src[idx], src[idx + 1], src[idx + 2], src[idx + 3]);
                }
            }
            let idx = (y * dst_w + x) * 4;
            dst[idx..idx + 4].copy_from_slice(&v.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_down_sums_each_block() {
        let mut img = Image::init(4, 4, PixelFormat::Gray);
        for p in img.gray_data_mut().chunks_exact_mut(2) {
            p[0] = 1.0;
            p[1] = 1.0;
        }
        let small = img.scale_down(2);
        assert_eq!(small.w(), 2);
        assert_eq!(small.h(), 2);
        for p in small.gray_data().chunks_exact(2) {
            assert_eq!(p[0], 4.0);
            assert_eq!(p[1], 4.0);
        }
    }

    #[test]
    fn scale_down_handles_partial_edge_blocks() {
        let mut img = Image::init(3, 3, PixelFormat::Gray);
        for p in img.gray_data_mut().chunks_exact_mut(2) {
            p[0] = 1.0;
            p[1] = 1.0;
        }
        let small = img.scale_down(2);
        assert_eq!(small.w(), 2);
        assert_eq!(small.h(), 2);
        // bottom-right block is 1x1, rest are 2x2 or 2x1/1x2
        assert_eq!(small.gray_data()[6], 1.0); // (1,1) block is 1x1
    }

    #[test]
    fn scale_down_by_one_is_identity() {
        let mut img = Image::init(2, 2, PixelFormat::Gray);
        for (i, p) in img.gray_data_mut().chunks_exact_mut(2).enumerate() {
            p[0] = i as f32;
            p[1] = 1.0;
        }
        let same = img.scale_down(1);
        assert_eq!(same.gray_data(), img.gray_data());
    }
}
