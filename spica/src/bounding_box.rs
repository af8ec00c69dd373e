//! Axis-aligned bounding boxes over the float plane.

/// Emptiness convention: `min_x > max_x` marks empty. Empty is the identity
/// element for union, absorbing for intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn empty() -> Self {
        BoundingBox {
            min_x: 1.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        }
    }

    pub fn is_empty(self) -> bool {
        self.min_x > self.max_x
    }

    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Intersection. Matches the source's observed behavior of resetting
    /// emptiness only via the Y range (`min_y > max_y`), which in turn
    /// forces `min_x > max_x` (see Design Notes): whenever the Y ranges of
    /// two non-empty boxes don't overlap, the X range is reset to the
    /// canonical empty value too, so the `min_x > max_x` convention used by
    /// `is_empty` is never violated by a non-canonical inverted box.
    pub fn intersection(self, other: Self) -> Self {
        let mut bb = BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        if bb.min_y > bb.max_y {
            bb.min_x = 1.0;
            bb.max_x = 0.0;
        }
        bb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_with_empty_is_identity() {
        let bb = BoundingBox {
            min_x: 1.0,
            min_y: 2.0,
            max_x: 3.0,
            max_y: 4.0,
        };
        assert_eq!(bb.union(BoundingBox::empty()), bb);
        assert_eq!(BoundingBox::empty().union(bb), bb);
    }

    #[test]
    fn intersection_with_empty_is_empty() {
        let bb = BoundingBox {
            min_x: 1.0,
            min_y: 2.0,
            max_x: 3.0,
            max_y: 4.0,
        };
        assert!(bb.intersection(BoundingBox::empty()).is_empty());
    }

    #[test]
    fn intersection_of_disjoint_boxes_is_empty() {
        let a = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
        };
        let b = BoundingBox {
            min_x: 0.0,
            min_y: 5.0,
            max_x: 1.0,
            max_y: 6.0,
        };
        assert!(a.intersection(b).is_empty());
    }
}
