//! The two-pass stacking pipeline: pass one aligns every frame against a
//! running reference star set (coarse small-change, falling back to brut,
//! then a fine matcher transform); pass two resamples each aligned frame
//! into a single accumulator sized to fit them all.

use std::path::PathBuf;

use crate::bounding_box::BoundingBox;
use crate::coarse_align::{brut, small_change};
use crate::error::SpicaError;
use crate::image::Image;
use crate::pixel_format::PixelFormat;
use crate::png_io;
use crate::star_finder::{self, StarFinder};
use crate::star_matcher::{self, StarMatcher};
use crate::transform::Transform;
use crate::vec::Vec2;

/// A source of loadable frames. Keeps the pipeline itself free of any
/// concrete file format, so callers can plug in PNG, SIWW, or anything
/// else behind this trait.
pub trait FrameSource {
    fn len(&self) -> usize;
    fn load(&self, index: usize) -> Result<Image, SpicaError>;
}

/// A plain list of PNG paths, with an optional dark frame subtracted from
/// every loaded image.
pub struct PathSource {
    pub paths: Vec<PathBuf>,
    pub dark: Option<Image>,
}

impl PathSource {
    pub fn new(paths: Vec<PathBuf>, dark: Option<Image>) -> Self {
        PathSource { paths, dark }
    }
}

impl FrameSource for PathSource {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn load(&self, index: usize) -> Result<Image, SpicaError> {
        let mut image = png_io::load(&self.paths[index])?;
        if let Some(dark) = &self.dark {
            subtract_dark(&mut image, dark);
        }
        Ok(image)
    }
}

/// Subtract a dark frame in place: an un-transformed, weighted subtraction
/// (`image::stack_tr::sub_tr` composed with `Transform::Identity`).
pub fn subtract_dark(image: &mut Image, dark: &Image) {
    image.sub_tr(&Transform::Identity, dark);
}

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub star_finder: star_finder::Config,
    pub small_change: small_change::Config,
    pub brut: brut::Config,
    pub star_matcher: star_matcher::Config,
}

/// Minimum number of detected stars a frame must contribute to be aligned
/// at all (spec §4.7 step 4).
const MIN_STARS: usize = 3;

pub struct Pipeline {
    pub config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Pipeline { config }
    }

    /// Run both passes and return the stacked output image.
    pub fn run(&self, source: &dyn FrameSource) -> Result<Image, SpicaError> {
        let (transforms, bbox, format) = self.align_all(source)?;
        self.stack_all(source, &transforms, bbox, format)
    }

    /// Pass one: a transform (possibly `Drop`) per frame, the accumulated
    /// bounding box, and the promoted output format.
    fn align_all(&self, source: &dyn FrameSource) -> Result<(Vec<Transform>, BoundingBox, PixelFormat), SpicaError> {
        let finder = StarFinder::new(self.config.star_finder);
        let mut matcher = StarMatcher::new(self.config.star_matcher);
        let mut prev_tr = Transform::Drop;
        let mut bbox = BoundingBox::empty();
        let mut format = PixelFormat::Invalid;
        let mut transforms = Vec::with_capacity(source.len());

        for i in 0..source.len() {
            let (tr, dims) = self.align_one(&finder, &mut matcher, &mut prev_tr, source, i);
            if let (false, Some((w, h, fmt))) = (matches!(tr, Transform::Drop), dims) {
                let frame_box = BoundingBox {
                    min_x: 0.0,
                    min_y: 0.0,
                    max_x: w as f32,
                    max_y: h as f32,
                };
                bbox = bbox.union(tr.bounding_box(frame_box));
                format = format.max(fmt);
            }
            transforms.push(tr);
        }
        Ok((transforms, bbox, format))
    }

    /// Align one frame, returning its transform and (when not dropped) its
    /// native dimensions and format for the bounding-box/format accumulator.
    fn align_one(
        &self,
        finder: &StarFinder,
        matcher: &mut StarMatcher,
        prev_tr: &mut Transform,
        source: &dyn FrameSource,
        index: usize,
    ) -> (Transform, Option<(usize, usize, PixelFormat)>) {
        let image = match source.load(index) {
            Ok(image) if image.format != PixelFormat::Invalid => image,
            Ok(_) => {
                log::warn!("frame {}: invalid image, skipping", index);
                return (Transform::Drop, None);
            }
            Err(e) => {
                log::warn!("frame {}: failed to load ({}), skipping", index, e);
                return (Transform::Drop, None);
            }
        };
        let dims = (image.w(), image.h(), image.format);

        let gray = match image.format {
            PixelFormat::Gray => image,
            _ => image.to_format(PixelFormat::Gray),
        };
        let mut stars = finder.find(&gray);
        log::info!("frame {}: {} stars found", index, stars.len());
        if stars.len() < MIN_STARS {
            log::warn!("frame {}: fewer than {} stars, skipping", index, MIN_STARS);
            return (Transform::Drop, None);
        }

        let fine = if matcher.sset.is_empty() {
            Transform::Identity
        } else {
            let mut coarse = small_change::align(&self.config.small_change, &matcher.sset, prev_tr, &stars);
            if matches!(coarse, Transform::Drop) {
                coarse = brut::align(&self.config.brut, &matcher.sset, &stars);
            }
            if matches!(coarse, Transform::Drop) {
                log::warn!("frame {}: coarse alignment failed, skipping", index);
                Transform::Drop
            } else {
                matcher.match_stars(&coarse, &mut stars);
                matcher.get_transform(&stars)
            }
        };

        if matches!(fine, Transform::Drop) {
            log::warn!("frame {}: fine alignment failed, skipping", index);
            return (Transform::Drop, None);
        }

        *prev_tr = fine;
        matcher.update(&fine, &mut stars);
        log::info!("frame {}: aligned as {:?}", index, fine);
        (fine, Some(dims))
    }

    /// Pass two: allocate the output sized to the union of every aligned
    /// frame, shift it so the bounding box's minimum lands at the origin,
    /// and resample each frame in.
    fn stack_all(
        &self,
        source: &dyn FrameSource,
        transforms: &[Transform],
        bbox: BoundingBox,
        format: PixelFormat,
    ) -> Result<Image, SpicaError> {
        if bbox.is_empty() || format == PixelFormat::Invalid {
            return Err(SpicaError::InvalidImage(
                "no frame survived alignment; nothing to stack".into(),
            ));
        }

        let tr_shift = Transform::shift(Vec2::new(-bbox.min_x, -bbox.min_y));

        let width = (bbox.max_x - bbox.min_x).ceil() as u32 + 1;
        let height = (bbox.max_y - bbox.min_y).ceil() as u32 + 1;

        let mut output = Image::init(width, height, format);
        if output.format == PixelFormat::Invalid {
            return Err(SpicaError::AllocationFailure);
        }
        output.clear();

        for (i, tr) in transforms.iter().enumerate() {
            if matches!(tr, Transform::Drop) {
                continue;
            }
            let image = match source.load(i) {
                Ok(image) if image.format != PixelFormat::Invalid => image,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("frame {}: failed to reload for stacking ({}), skipping", i, e);
                    continue;
                }
            };
            let composed = Transform::compose(&tr_shift, tr);
            output.stack_tr(&composed, &image);
        }

        Ok(output)
    }
}
