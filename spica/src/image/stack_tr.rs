//! Transform-aware variants of [`Image::stack`]/[`Image::sub`]/[`Image::mul`]:
//! instead of an integer `(dx, dy)` offset, `src` is resampled through a
//! [`Transform`] via bilinear subpixel interpolation.
//!
//! The iteration frame is the transformed bounding box of `src`'s extent,
//! clipped to `tgt`'s own bounds — the transformed-geometry analogue of the
//! offset-based frame clipping in [`super::arith`].

use crate::bounding_box::BoundingBox;
use crate::pixel_format::PixelFormat;
use crate::transform::Transform;
use crate::vec::{Vec2, Vec4};

use super::core::Image;

/// Integer pixel range in `tgt` coordinates covered by `tr(src's box)`,
/// clipped to `tgt`'s own dimensions.
fn transformed_frame(tgt: &Image, src: &Image, tr: &Transform) -> (i32, i32, i32, i32) {
    let src_box = BoundingBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: src.w() as f32,
        max_y: src.h() as f32,
    };
    let bb = tr.bounding_box(src_box);
    if bb.is_empty() {
        return (0, 0, 0, 0);
    }
    let min_x = (bb.min_x.floor() as i32).max(0);
    let min_y = (bb.min_y.floor() as i32).max(0);
    let max_x = (bb.max_x.ceil() as i32).min(tgt.w() as i32);
    let max_y = (bb.max_y.ceil() as i32).min(tgt.h() as i32);
    (min_x, min_y, max_x, max_y)
}

enum TrOp {
    Stack,
    Sub,
    Mul,
}

impl Image {
    /// Resample `src` through `tr` and accumulate into `self`.
    pub fn stack_tr(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(tr, src, TrOp::Stack);
    }

    /// Like [`Image::stack_tr`] but resamples through `tr`'s inverse.
    pub fn stack_tr_inv(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(&tr.inverse(), src, TrOp::Stack);
    }

    /// Subtract a weighted, `tr`-resampled `src` from `self`.
    pub fn sub_tr(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(tr, src, TrOp::Sub);
    }

    pub fn sub_tr_inv(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(&tr.inverse(), src, TrOp::Sub);
    }

    /// Multiply `self` by a `tr`-resampled, normalized `src`.
    pub fn mul_tr(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(tr, src, TrOp::Mul);
    }

    pub fn mul_tr_inv(&mut self, tr: &Transform, src: &Image) {
        self.apply_tr(&tr.inverse(), src, TrOp::Mul);
    }

    fn apply_tr(&mut self, tr: &Transform, src: &Image, op: TrOp) {
        if src.format == PixelFormat::Invalid || matches!(tr, Transform::Drop) {
            return;
        }
        let tr_inv = tr.inverse();
        let (min_x, min_y, max_x, max_y) = transformed_frame(self, src, tr);
        match self.format {
            PixelFormat::Invalid => {}
            PixelFormat::Gray => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let pos = tr_inv.apply(Vec2::new(x as f32, y as f32));
                        let s = src.subpixel_gray(pos);
                        apply_gray_op(self, x, y, s, &op);
                    }
                }
            }
            PixelFormat::RGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let pos = tr_inv.apply(Vec2::new(x as f32, y as f32));
                        let s = src.subpixel_rgb(pos);
                        apply_rgb_op(self, x, y, s, &op);
                    }
                }
            }
            PixelFormat::SeparateRGB => {
                for y in min_y..max_y {
                    for x in min_x..max_x {
                        let pos = tr_inv.apply(Vec2::new(x as f32, y as f32));
                        apply_plane_op(self, 0, x, y, src.subpixel_red(pos), &op);
                        apply_plane_op(self, 1, x, y, src.subpixel_green(pos), &op);
                        apply_plane_op(self, 2, x, y, src.subpixel_blue(pos), &op);
                    }
                }
            }
        }
    }
}

fn apply_gray_op(tgt: &mut Image, x: i32, y: i32, s: Vec2, op: &TrOp) {
    let idx = (y as usize * tgt.w() + x as usize) * 2;
    let data = tgt.gray_data_mut();
    match op {
        TrOp::Stack => {
            data[idx] += s.x();
            data[idx + 1] += s.y();
        }
        TrOp::Sub => {
            if s.y() == 0.0 {
                return;
            }
            let v = s.x() * data[idx + 1] / s.y();
            data[idx] -= v;
        }
        TrOp::Mul => {
            if s.y() == 0.0 {
                return;
            }
            data[idx] *= s.x() / s.y();
        }
    }
}

fn apply_rgb_op(tgt: &mut Image, x: i32, y: i32, s: Vec4, op: &TrOp) {
    let idx = (y as usize * tgt.w() + x as usize) * 4;
    let data = tgt.rgb_data_mut();
    match op {
        TrOp::Stack => {
            for c in 0..4 {
                data[idx + c] += s.0[c];
            }
        }
        TrOp::Sub => {
            if s.0[3] == 0.0 {
                return;
            }
            let ratio = data[idx + 3] / s.0[3];
            for c in 0..3 {
                data[idx + c] -= s.0[c] * ratio;
            }
        }
        TrOp::Mul => {
            if s.0[3] == 0.0 {
                return;
            }
            let inv_w = 1.0 / s.0[3];
            for c in 0..4 {
                data[idx + c] *= s.0[c] * inv_w;
            }
        }
    }
}

fn apply_plane_op(tgt: &mut Image, plane: usize, x: i32, y: i32, s: Vec2, op: &TrOp) {
    let w = tgt.w();
    let idx = (y as usize * w + x as usize) * 2;
    let data = tgt.plane_mut(plane);
    match op {
        TrOp::Stack => {
            data[idx] += s.x();
            data[idx + 1] += s.y();
        }
        TrOp::Sub => {
            if s.y() == 0.0 {
                return;
            }
            let v = s.x() * data[idx + 1] / s.y();
            data[idx] -= v;
        }
        TrOp::Mul => {
            if s.y() == 0.0 {
                return;
            }
            data[idx] *= s.x() / s.y();
        }
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
    fn identity_stack_tr_matches_plain_stack() {
        let src = gray_image(&[(0.1, 1.0), (0.2, 1.0), (0.3, 1.0), (0.4, 1.0)], 2, 2);
        let mut a = Image::init(2, 2, PixelFormat::Gray);
        a.stack(0, 0, &src);
        let mut b = Image::init(2, 2, PixelFormat::Gray);
        b.stack_tr(&Transform::Identity, &src);
        for i in 0..8 {
            assert!((a.gray_data()[i] - b.gray_data()[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn drop_transform_is_a_no_op() {
        let src = gray_image(&[(0.5, 1.0)], 1, 1);
        let mut tgt = Image::init(1, 1, PixelFormat::Gray);
        tgt.stack_tr(&Transform::Drop, &src);
        assert_eq!(tgt.gray_data(), &[0.0, 0.0]);
    }

    #[test]
    fn shift_stack_tr_places_pixel_at_shifted_location() {
        let src = gray_image(&[(1.0, 1.0)], 1, 1);
        let mut tgt = Image::init(3, 3, PixelFormat::Gray);
        tgt.stack_tr(&Transform::shift(Vec2::new(1.0, 1.0)), &src);
        let p = tgt.pixel_gray(1, 1);
        assert!(p.y() > 0.0);
    }
}
