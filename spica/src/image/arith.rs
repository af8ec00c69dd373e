//! Per-pixel arithmetic: `stack`, `add`/`sub`, `mul`/`div`, `mask`, the
//! scalar `*_const`/`mul_weight` family, and `invert`.
//!
//! Every binary op reads the source pixel through the format-appropriate
//! getter on [`super::core::Image`] (`pixel_gray`/`pixel_rgb`/`pixel_red`
//! etc.), which already performs on-the-fly format conversion per spec
//! §4.1. That getter is the single source of truth for the conversion
//! formulas, so there is no separate "materialize a converted temporary,
//! operate, then free it" step as in the original C (spec §9's
//! ownership-of-temporaries note): the per-pixel conversion is numerically
//! identical and Rust's ownership rules make the degenerate-conversion
//! leak the note warns about structurally impossible here.

use super::core::Image;
use crate::pixel_format::PixelFormat;
use crate::vec::{Vec2, Vec4};

/// Clip `(dx, dy)`-offset `src` bounds against `tgt`'s own bounds, returning
/// `[min_x, max_x) x [min_y, max_y)` in `tgt` coordinates.
fn frame_bounds(tgt_w: usize, tgt_h: usize, src_w: usize, src_h: usize, dx: i32, dy: i32) -> (i32, i32, i32, i32) {
    let min_x = dx.max(0);
    let min_y = dy.max(0);
    let mut max_x = src_w as i32 + dx;
    let mut max_y = src_h as i32 + dy;
    if (tgt_w as i32) < max_x {
        max_x = tgt_w as i32;
    }
    if (tgt_h as i32) < max_y {
        max_y = tgt_h as i32;
    }
    (min_x, min_y, max_x, max_y)
}

impl Image {
    /// Elementwise vector add: the weighted-mean stacking accumulator.
    pub fn stack(&mut self, dx: i32, dy: i32, src: &Image) {
        if self.format == PixelFormat::Invalid || src.format == PixelFormat::Invalid {
            return;
        }
        let (min_x, min_y, max_x, max_y) = frame_bounds(self.w(), self.h(), src.w(), src.h(), dx, dy);
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_gray(x - dx, y - dy);
                        self.add_gray_at(x, y, s);
                    }
                }
            }
            PixelFormat::RGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_rgb(x - dx, y - dy);
                        self.add_rgb_at(x, y, s);
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let r = src.pixel_red(x - dx, y - dy);
                        let g = src.pixel_green(x - dx, y - dy);
                        let b = src.pixel_blue(x - dx, y - dy);
                        self.add_plane_at(0, x, y, r);
                        self.add_plane_at(1, x, y, g);
                        self.add_plane_at(2, x, y, b);
                    }
                }
            }
        }
    }

    /// `tgt.value += src.value * tgt.weight / src.weight`; weights unchanged.
    /// Pixels with `src.weight == 0` are skipped.
    pub fn add(&mut self, dx: i32, dy: i32, src: &Image) {
        self.add_or_sub(dx, dy, src, 1.0);
    }

    pub fn sub(&mut self, dx: i32, dy: i32, src: &Image) {
        self.add_or_sub(dx, dy, src, -1.0);
    }

    fn add_or_sub(&mut self, dx: i32, dy: i32, src: &Image, sign: f32) {
        if self.format == PixelFormat::Invalid || src.format == PixelFormat::Invalid {
            return;
        }
        let (min_x, min_y, max_x, max_y) = frame_bounds(self.w(), self.h(), src.w(), src.h(), dx, dy);
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_gray(x - dx, y - dy);
                        if s.y() == 0.0 {
                            continue;
                        }
                        self.map_gray_at(x, y, |t| Vec2::new(t.x() + sign * s.x() * t.y() / s.y(), t.y()));
                    }
                }
            }
            PixelFormat::RGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_rgb(x - dx, y - dy);
                        if s.0[3] == 0.0 {
                            continue;
                        }
                        self.map_rgb_at(x, y, |t| {
                            let mut out = t;
                            for c in 0..3 {
                                out.0[c] += sign * s.0[c] * t.0[3] / s.0[3];
                            }
                            out
                        });
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        for (plane, s) in [
                            (0, src.pixel_red(x - dx, y - dy)),
                            (1, src.pixel_green(x - dx, y - dy)),
                            (2, src.pixel_blue(x - dx, y - dy)),
                        ] {
                            if s.y() == 0.0 {
                                continue;
                            }
                            self.map_plane_at(plane, x, y, |t| {
                                Vec2::new(t.x() + sign * s.x() * t.y() / s.y(), t.y())
                            });
                        }
                    }
                }
            }
        }
    }

    /// Multiply by the source's normalized value; weight unchanged. Division
    /// additionally skips `src.value == 0`, except on same-format `RGB`,
    /// where only `src.weight == 0` is checked and each channel divides by
    /// its own (possibly zero) normalized component.
    pub fn mul(&mut self, dx: i32, dy: i32, src: &Image) {
        self.mul_or_div(dx, dy, src, false);
    }

    pub fn div(&mut self, dx: i32, dy: i32, src: &Image) {
        self.mul_or_div(dx, dy, src, true);
    }

    fn mul_or_div(&mut self, dx: i32, dy: i32, src: &Image, divide: bool) {
        if self.format == PixelFormat::Invalid || src.format == PixelFormat::Invalid {
            return;
        }
        let (min_x, min_y, max_x, max_y) = frame_bounds(self.w(), self.h(), src.w(), src.h(), dx, dy);
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_gray(x - dx, y - dy);
                        if s.y() == 0.0 || (divide && s.x() == 0.0) {
                            continue;
                        }
                        let v = s.x() / s.y();
                        self.map_gray_at(x, y, |t| Vec2::new(if divide { t.x() / v } else { t.x() * v }, t.y()));
                    }
                }
            }
            PixelFormat::RGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_rgb(x - dx, y - dy);
                        if s.0[3] == 0.0 {
                            continue;
                        }
                        self.map_rgb_at(x, y, |t| {
                            let mut out = t;
                            for c in 0..3 {
                                let v = s.0[c] / s.0[3];
                                out.0[c] = if divide { t.0[c] / v } else { t.0[c] * v };
                            }
                            out
                        });
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        for (plane, s) in [
                            (0, src.pixel_red(x - dx, y - dy)),
                            (1, src.pixel_green(x - dx, y - dy)),
                            (2, src.pixel_blue(x - dx, y - dy)),
                        ] {
                            if s.y() == 0.0 || (divide && s.x() == 0.0) {
                                continue;
                            }
                            let v = s.x() / s.y();
                            self.map_plane_at(plane, x, y, |t| {
                                Vec2::new(if divide { t.x() / v } else { t.x() * v }, t.y())
                            });
                        }
                    }
                }
            }
        }
    }

    /// Multiply the full pixel vector (value and weight) by `src`'s
    /// normalized value. `Gray` mask on `RGB` broadcasts across channels;
    /// `RGB` mask on `SeparateRGB` applies channelwise.
    pub fn mask(&mut self, dx: i32, dy: i32, src: &Image) {
        if self.format == PixelFormat::Invalid || src.format == PixelFormat::Invalid {
            return;
        }
        let (min_x, min_y, max_x, max_y) = frame_bounds(self.w(), self.h(), src.w(), src.h(), dx, dy);
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_gray(x - dx, y - dy);
                        if s.y() == 0.0 {
                            continue;
                        }
                        let v = s.x() / s.y();
                        self.map_gray_at(x, y, |t| t * v);
                    }
                }
            }
            PixelFormat::RGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let s = src.pixel_gray(x - dx, y - dy);
                        if s.y() == 0.0 {
                            continue;
                        }
                        let v = s.x() / s.y();
                        self.map_rgb_at(x, y, |t| t * v);
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                if src.format == PixelFormat::RGB {
                    for y in min_y..max_y {
                        for x in min_x..max_x {
                            let s = src.pixel_rgb(x - dx, y - dy);
                            if s.0[3] == 0.0 {
                                continue;
                            }
                            let inv_w = 1.0 / s.0[3];
                            self.map_plane_at(0, x, y, |t| t * (s.0[0] * inv_w));
                            self.map_plane_at(1, x, y, |t| t * (s.0[1] * inv_w));
                            self.map_plane_at(2, x, y, |t| t * (s.0[2] * inv_w));
                        }
                    }
                } else {
                    for y in min_y..max_y {
                        for x in min_x..max_x {
                            for (plane, s) in [
                                (0, src.pixel_red(x - dx, y - dy)),
                                (1, src.pixel_green(x - dx, y - dy)),
                                (2, src.pixel_blue(x - dx, y - dy)),
                            ] {
                                if s.y() == 0.0 {
                                    continue;
                                }
                                let v = s.x() / s.y();
                                self.map_plane_at(plane, x, y, |t| t * v);
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn add_const(&mut self, v: f32) {
        self.add_const_rgb(v, v, v);
    }

    pub fn sub_const(&mut self, v: f32) {
        self.add_const_rgb(-v, -v, -v);
    }

    pub fn add_const_rgb(&mut self, r: f32, g: f32, b: f32) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => add_const_gray(self.gray_data_mut(), (r + g + b) / 3.0),
            PixelFormat::RGB => add_const_rgb_plane(self.rgb_data_mut(), r, g, b),
            PixelFormat::SeparateRGB => {
                add_const_gray(self.data_red_mut(), r);
                add_const_gray(self.data_green_mut(), g);
                add_const_gray(self.data_blue_mut(), b);
            }
        }
    }

    pub fn sub_const_rgb(&mut self, r: f32, g: f32, b: f32) {
        self.add_const_rgb(-r, -g, -b);
    }

    pub fn mul_const(&mut self, v: f32) {
        self.mul_const_rgb(v, v, v);
    }

    pub fn div_const(&mut self, v: f32) {
        self.mul_const_rgb(1.0 / v, 1.0 / v, 1.0 / v);
    }

    pub fn mul_const_rgb(&mut self, r: f32, g: f32, b: f32) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => mul_const_gray(self.gray_data_mut(), (r + g + b) / 3.0),
            PixelFormat::RGB => mul_const_rgb_plane(self.rgb_data_mut(), r, g, b),
            PixelFormat::SeparateRGB => {
                mul_const_gray(self.data_red_mut(), r);
                mul_const_gray(self.data_green_mut(), g);
                mul_const_gray(self.data_blue_mut(), b);
            }
        }
    }

    pub fn div_const_rgb(&mut self, r: f32, g: f32, b: f32) {
        self.mul_const_rgb(1.0 / r, 1.0 / g, 1.0 / b);
    }

    /// Multiply weight only, leaving value untouched. Applies to every
    /// format, unlike [`Image::mul_weight_rgb`].
    pub fn mul_weight(&mut self, v: f32) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for p in self.gray_data_mut().chunks_exact_mut(2) {
                    p[1] *= v;
                }
            }
            PixelFormat::RGB => {
                for p in self.rgb_data_mut().chunks_exact_mut(4) {
                    p[3] *= v;
                }
            }
            PixelFormat::SeparateRGB => {
                for p in self.data_red_mut().chunks_exact_mut(2) {
                    p[1] *= v;
                }
                for p in self.data_green_mut().chunks_exact_mut(2) {
                    p[1] *= v;
                }
                for p in self.data_blue_mut().chunks_exact_mut(2) {
                    p[1] *= v;
                }
            }
        }
    }

    /// Multiply each channel's weight by its own factor. A no-op outside
    /// `SeparateRGB`, which is the only format with per-channel weights.
    pub fn mul_weight_rgb(&mut self, r: f32, g: f32, b: f32) {
        if self.format != PixelFormat::SeparateRGB {
            return;
        }
        for p in self.data_red_mut().chunks_exact_mut(2) {
            p[1] *= r;
        }
        for p in self.data_green_mut().chunks_exact_mut(2) {
            p[1] *= g;
        }
        for p in self.data_blue_mut().chunks_exact_mut(2) {
            p[1] *= b;
        }
    }

    /// `value <- weight^2 / value` per channel (guarded against `value ==
    /// 0`). Not a color negative.
    pub fn invert(&mut self) {
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => invert_gray(self.gray_data_mut()),
            PixelFormat::RGB => {
                for p in self.rgb_data_mut().chunks_exact_mut(4) {
                    let w = p[3];
                    if w == 0.0 {
                        continue;
                    }
                    for c in p[0..3].iter_mut() {
                        if *c != 0.0 {
                            *c = w * w / *c;
                        }
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                invert_gray(self.data_red_mut());
                invert_gray(self.data_green_mut());
                invert_gray(self.data_blue_mut());
            }
        }
    }

    fn add_gray_at(&mut self, x: i32, y: i32, v: Vec2) {
        let idx = (y as usize * self.w() + x as usize) * 2;
        let data = self.gray_data_mut();
        data[idx] += v.x();
        data[idx + 1] += v.y();
    }

    fn add_rgb_at(&mut self, x: i32, y: i32, v: Vec4) {
        let idx = (y as usize * self.w() + x as usize) * 4;
        let data = self.rgb_data_mut();
        for c in 0..4 {
            data[idx + c] += v.0[c];
        }
    }

    fn add_plane_at(&mut self, plane: usize, x: i32, y: i32, v: Vec2) {
        let w = self.w();
        let idx = (y as usize * w + x as usize) * 2;
        let data = self.plane_mut(plane);
        data[idx] += v.x();
        data[idx + 1] += v.y();
    }

    fn map_gray_at(&mut self, x: i32, y: i32, f: impl FnOnce(Vec2) -> Vec2) {
        let idx = (y as usize * self.w() + x as usize) * 2;
        let data = self.gray_data_mut();
        let r = f(Vec2::new(data[idx], data[idx + 1]));
        data[idx] = r.x();
        data[idx + 1] = r.y();
    }

    fn map_rgb_at(&mut self, x: i32, y: i32, f: impl FnOnce(Vec4) -> Vec4) {
        let idx = (y as usize * self.w() + x as usize) * 4;
        let data = self.rgb_data_mut();
        let mut v = [0.0f32; 4];
        v.copy_from_slice(&data[idx..idx + 4]);
        let r = f(Vec4(v));
        data[idx..idx + 4].copy_from_slice(&r.0);
    }

    fn map_plane_at(&mut self, plane: usize, x: i32, y: i32, f: impl FnOnce(Vec2) -> Vec2) {
        let w = self.w();
        let idx = (y as usize * w + x as usize) * 2;
        let data = self.plane_mut(plane);
        let r = f(Vec2::new(data[idx], data[idx + 1]));
        data[idx] = r.x();
        data[idx + 1] = r.y();
    }
}

fn add_const_gray(data: &mut [f32], v: f32) {
    for p in data.chunks_exact_mut(2) {
        p[0] += v * p[1];
    }
}

fn add_const_rgb_plane(data: &mut [f32], r: f32, g: f32, b: f32) {
    for p in data.chunks_exact_mut(4) {
        let w = p[3];
        p[0] += r * w;
        p[1] += g * w;
        p[2] += b * w;
    }
}

fn mul_const_gray(data: &mut [f32], v: f32) {
    for p in data.chunks_exact_mut(2) {
        p[0] *= v;
    }
}

fn mul_const_rgb_plane(data: &mut [f32], r: f32, g: f32, b: f32) {
    for p in data.chunks_exact_mut(4) {
        p[0] *= r;
        p[1] *= g;
        p[2] *= b;
    }
}

fn invert_gray(data: &mut [f32]) {
    for p in data.chunks_exact_mut(2) {
        if p[0] == 0.0 {
            continue;
        }
        p[0] = p[1] * p[1] / p[0];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(values: &[(f32, f32)], w: u32, h: u32) -> Image {
        let mut img = Image::init(w, h, PixelFormat::Gray);
        for (i, (v, wt)) in values.iter().enumerate() {
            img.gray_data_mut()[i * 2] = *v;
            img.gray_data_mut()[i * 2 + 1] = *wt;
        }
        img
    }

    #[test]
    fn stack_two_identical_frames_doubles_weighted_mean() {
        let f1 = gray_image(&[(0.1, 1.0), (0.2, 1.0), (0.3, 1.0), (0.4, 1.0)], 2, 2);
        let f2 = f1.clone();
        let mut out = Image::init(2, 2, PixelFormat::Gray);
        out.clear();
        out.stack(0, 0, &f1);
        out.stack(0, 0, &f2);
        let expected = [(0.2, 2.0), (0.4, 2.0), (0.6, 2.0), (0.8, 2.0)];
        for (i, (v, wt)) in expected.iter().enumerate() {
            assert!((out.gray_data()[i * 2] - v).abs() < 1e-5);
            assert_eq!(out.gray_data()[i * 2 + 1], *wt);
        }
    }

    #[test]
    fn stack_is_order_independent_for_identity_frames() {
        let f1 = gray_image(&[(0.5, 1.0), (0.1, 1.0)], 2, 1);
        let f2 = gray_image(&[(0.2, 1.0), (0.7, 1.0)], 2, 1);
        let mut out_a = Image::init(2, 1, PixelFormat::Gray);
        out_a.clear();
        out_a.stack(0, 0, &f1);
        out_a.stack(0, 0, &f2);
        let mut out_b = Image::init(2, 1, PixelFormat::Gray);
        out_b.clear();
        out_b.stack(0, 0, &f2);
        out_b.stack(0, 0, &f1);
        assert_eq!(out_a.gray_data(), out_b.gray_data());
    }

    #[test]
    fn mul_skips_zero_weight_source_pixels() {
        let mut tgt = gray_image(&[(2.0, 1.0)], 1, 1);
        let src = gray_image(&[(5.0, 0.0)], 1, 1);
        tgt.mul(0, 0, &src);
        assert_eq!(tgt.gray_data()[0], 2.0);
    }

    #[test]
    fn invert_guards_zero_value() {
        let mut img = gray_image(&[(0.0, 3.0), (2.0, 3.0)], 2, 1);
        img.invert();
        assert_eq!(img.gray_data()[0], 0.0);
        assert!((img.gray_data()[2] - 4.5).abs() < 1e-5);
    }

    #[test]
    fn div_rgb_only_guards_on_weight_not_per_channel_value() {
        let mut tgt = Image::init(1, 1, PixelFormat::RGB);
        tgt.rgb_data_mut().copy_from_slice(&[8.0, 8.0, 8.0, 1.0]);
        let mut src = Image::init(1, 1, PixelFormat::RGB);
        // Red channel normalized value is 0; original `divRGB` only skips
        // on zero weight, so this channel still divides (by zero).
        src.rgb_data_mut().copy_from_slice(&[0.0, 2.0, 1.0, 1.0]);
        tgt.div(0, 0, &src);
        let out = tgt.rgb_data_mut();
        assert!(out[0].is_infinite());
        assert!((out[1] - 4.0).abs() < 1e-5);
        assert!((out[2] - 8.0).abs() < 1e-5);
    }

    #[test]
    fn mul_weight_scales_all_formats_mul_weight_rgb_only_separate() {
        let mut gray = gray_image(&[(1.0, 2.0)], 1, 1);
        gray.mul_weight(3.0);
        assert_eq!(gray.gray_data()[1], 6.0);

        let mut rgb = Image::init(1, 1, PixelFormat::RGB);
        rgb.rgb_data_mut().copy_from_slice(&[1.0, 1.0, 1.0, 2.0]);
        rgb.mul_weight_rgb(2.0, 3.0, 4.0);
        assert_eq!(rgb.rgb_data_mut()[3], 2.0, "mul_weight_rgb is a no-op outside SeparateRGB");

        let mut sep = Image::init(1, 1, PixelFormat::SeparateRGB);
        sep.data_red_mut().copy_from_slice(&[1.0, 2.0]);
        sep.data_green_mut().copy_from_slice(&[1.0, 2.0]);
        sep.data_blue_mut().copy_from_slice(&[1.0, 2.0]);
        sep.mul_weight_rgb(2.0, 3.0, 4.0);
        assert_eq!(sep.data_red_mut()[1], 4.0);
        assert_eq!(sep.data_green_mut()[1], 6.0);
        assert_eq!(sep.data_blue_mut()[1], 8.0);
    }
}
