//! Pixel format tag, ordered so that the richest format wins promotion.

/// Layout of a pixel in an [`crate::image::Image`].
///
/// Variant order is meaningful: `Invalid < Gray < RGB < SeparateRGB`, so that
/// the orchestrator can promote the output format by taking the maximum
/// across frames (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    Invalid,
    Gray,
    RGB,
    SeparateRGB,
}

impl PixelFormat {
    /// Number of `f32` components per pixel in the flat backing buffer.
    /// `SeparateRGB` packs three independent `Gray` planes, so its
    /// per-"pixel" width as tracked here is still 2 (one plane's worth);
    /// the plane count multiplier is applied by the caller.
    pub fn channel_width(self) -> usize {
        match self {
            PixelFormat::Invalid => 0,
            PixelFormat::Gray => 2,
            PixelFormat::RGB => 4,
            PixelFormat::SeparateRGB => 2,
        }
    }

    /// Number of stacked planes (3 for `SeparateRGB`, 1 otherwise).
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::SeparateRGB => 3,
            _ => 1,
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_richest_wins_max() {
        assert_eq!(
            PixelFormat::Gray.max(PixelFormat::SeparateRGB),
            PixelFormat::SeparateRGB
        );
        assert_eq!(
            PixelFormat::Invalid.max(PixelFormat::Gray),
            PixelFormat::Gray
        );
    }
}
