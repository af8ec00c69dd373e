//! Tagged 2D transform: Drop / Identity / Shift / Linear.

use crate::bounding_box::BoundingBox;
use crate::vec::Vec2;

/// A transform mapping one frame's coordinate system onto another's.
///
/// `Drop` is a first-class "reject this frame" value: it propagates through
/// [`Transform::compose`] and collapses [`Transform::bounding_box`] to
/// empty. It is treated as identity by [`Transform::apply`] for safety, but
/// callers are expected to skip `Drop` frames rather than apply them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Drop,
    Identity,
    Shift { shift: Vec2 },
    Linear { rot: Vec2, shift: Vec2 },
}

impl Transform {
    pub fn shift(shift: Vec2) -> Self {
        Transform::Shift { shift }
    }

    pub fn linear(rot: Vec2, shift: Vec2) -> Self {
        Transform::Linear { rot, shift }
    }

    /// Apply this transform to a vector. `Drop` is treated as identity.
    pub fn apply(&self, v: Vec2) -> Vec2 {
        match self {
            Transform::Linear { rot, shift } => v.complex_mul(*rot) + *shift,
            Transform::Shift { shift } => v + *shift,
            Transform::Identity | Transform::Drop => v,
        }
    }

    /// Inverse transform. `Identity` and `Drop` are self-inverse.
    pub fn inverse(&self) -> Self {
        match self {
            Transform::Drop => Transform::Drop,
            Transform::Identity => Transform::Identity,
            Transform::Shift { shift } => Transform::Shift { shift: *shift * -1.0 },
            Transform::Linear { rot, shift } => {
                let rot_inv = rot.complex_inv();
                Transform::Linear {
                    rot: rot_inv,
                    shift: shift.complex_div(*rot) * -1.0,
                }
            }
        }
    }

    /// Compose `tr2 ∘ tr1`, i.e. `tr1` is applied first.
    pub fn compose(tr2: &Transform, tr1: &Transform) -> Self {
        match tr2 {
            Transform::Drop => Transform::Drop,
            Transform::Identity => *tr1,
            Transform::Shift { shift } => compose_with_shift(*shift, tr1),
            Transform::Linear { rot, shift } => compose_with_linear(*rot, *shift, tr1),
        }
    }

    /// Envelope of `tr(bb)`. Empty for a `Drop` transform or an empty box.
    pub fn bounding_box(&self, bb: BoundingBox) -> BoundingBox {
        if bb.is_empty() || matches!(self, Transform::Drop) {
            return BoundingBox::empty();
        }
        let p1 = self.apply(Vec2::new(bb.min_x, bb.min_y));
        let p2 = self.apply(Vec2::new(bb.min_x, bb.max_y));
        let p3 = self.apply(Vec2::new(bb.max_x, bb.min_y));
        let p4 = self.apply(Vec2::new(bb.max_x, bb.max_y));
        let xs = [p1.x(), p2.x(), p3.x(), p4.x()];
        let ys = [p1.y(), p2.y(), p3.y(), p4.y()];
        BoundingBox {
            min_x: xs.iter().cloned().fold(f32::INFINITY, f32::min),
            min_y: ys.iter().cloned().fold(f32::INFINITY, f32::min),
            max_x: xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
            max_y: ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
        }
    }
}

fn compose_with_shift(shift: Vec2, tr: &Transform) -> Transform {
    match tr {
        Transform::Drop => Transform::Drop,
        Transform::Identity => Transform::shift(shift),
        Transform::Shift { shift: s1 } => Transform::shift(shift + *s1),
        Transform::Linear { rot, shift: s1 } => Transform::linear(*rot, *s1 + shift),
    }
}

fn compose_with_linear(rot: Vec2, shift: Vec2, tr: &Transform) -> Transform {
    match tr {
        Transform::Drop => Transform::Drop,
        Transform::Identity => Transform::linear(rot, shift),
        Transform::Shift { shift: s1 } => Transform::linear(rot, rot.complex_mul(*s1) + shift),
        Transform::Linear {
            rot: rot1,
            shift: s1,
        } => Transform::linear(rot.complex_mul(*rot1), rot.complex_mul(*s1) + shift),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a.x() - b.x()).abs() < 1e-4 && (a.y() - b.y()).abs() < 1e-4
    }

    #[test]
    fn shift_composition_adds_shifts() {
        let tr = Transform::compose(
            &Transform::shift(Vec2::new(3.0, 4.0)),
            &Transform::shift(Vec2::new(-1.0, 2.0)),
        );
        assert_eq!(tr, Transform::shift(Vec2::new(2.0, 6.0)));
        assert!(close(tr.apply(Vec2::new(1.0, 1.0)), Vec2::new(3.0, 7.0)));
    }

    #[test]
    fn inverse_undoes_apply() {
        let tr = Transform::linear(Vec2::new(0.6, 0.8), Vec2::new(5.0, -2.0));
        let v = Vec2::new(3.0, -7.0);
        let round_tripped = tr.inverse().apply(tr.apply(v));
        assert!(close(round_tripped, v));
    }

    #[test]
    fn compose_matches_apply_then_apply() {
        let tr1 = Transform::linear(Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0));
        let tr2 = Transform::shift(Vec2::new(2.0, -3.0));
        let v = Vec2::new(4.0, 5.0);
        let composed = Transform::compose(&tr2, &tr1).apply(v);
        let chained = tr2.apply(tr1.apply(v));
        assert!(close(composed, chained));
    }

    #[test]
    fn drop_absorbs_composition_both_sides() {
        let tr = Transform::linear(Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0));
        assert_eq!(Transform::compose(&Transform::Drop, &tr), Transform::Drop);
        assert_eq!(Transform::compose(&tr, &Transform::Drop), Transform::Drop);
    }

    #[test]
    fn bounding_box_of_empty_or_drop_is_empty() {
        let bb = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 10.0,
            max_y: 10.0,
        };
        assert!(Transform::Drop.bounding_box(bb).is_empty());
        assert!(Transform::Identity.bounding_box(BoundingBox::empty()).is_empty());
    }
}
