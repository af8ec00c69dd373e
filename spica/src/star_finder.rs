//! Star detection: local-maxima candidates on a scaled-down image, refined
//! by an iterative Gaussian fit at full resolution.

use crate::image::Image;
use crate::pixel_format::PixelFormat;
use crate::star::{Star, StarSet};
use crate::vec::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub sigma: f32,
    pub brightness_threshold: f32,
    pub candidate_threshold: f32,
    pub min_dist: f32,
    pub fit_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sigma: 3.0,
            brightness_threshold: 0.1,
            candidate_threshold: 0.5,
            min_dist: 2.0,
            fit_steps: 30,
        }
    }
}

pub struct StarFinder {
    pub config: Config,
}

impl StarFinder {
    pub fn new(config: Config) -> Self {
        StarFinder { config }
    }

    /// Find and sort (descending brightness) the stars in `image`.
    pub fn find(&self, image: &Image) -> StarSet {
        let mut sset = StarSet::new();
        if image.format == PixelFormat::Invalid {
            return sset;
        }
        let gray = match image.format {
            PixelFormat::Gray => image.clone(),
            _ => image.to_format(PixelFormat::Gray),
        };

        let scale = if self.config.sigma >= 1.0 {
            self.config.sigma.floor() as u32
        } else {
            1
        };
        let scaled = if scale == 1 { gray.clone() } else { gray.scale_down(scale) };

        let sw = scaled.w();
        let sh = scaled.h();
        if sw < 3 || sh < 3 {
            return sset;
        }
        for y in 1..(sh - 1) as i32 {
            for x in 1..(sw - 1) as i32 {
                if self.is_candidate(&scaled, x, y) {
                    let fx = x as f32 * scale as f32 + 0.5 * (scale as f32 - 1.0);
                    let fy = y as f32 * scale as f32 + 0.5 * (scale as f32 - 1.0);
                    self.process_candidate(&gray, &mut sset, fx, fy);
                }
            }
        }

        sset.sort_by_brightness_desc();
        sset
    }

    /// Local-maximum test over the asymmetric 2x2 upper-left window
    /// (`y1 in [y-1, y+1)`, `x1 in [x-1, x+1)`) — this omits the lower-right
    /// neighbors of a true 3x3 block. Observed behavior, intentionally kept.
    fn is_candidate(&self, image: &Image, x: i32, y: i32) -> bool {
        let pix = image.pixel_gray(x, y);
        if pix.y() == 0.0 {
            return false;
        }
        let v = pix.x() / pix.y();

        let mut sum = Vec2::new(0.0, 0.0);
        for y1 in y - 1..y + 1 {
            for x1 in x - 1..x + 1 {
                let p = image.pixel_gray(x1, y1);
                if p.y() > 0.0 && p.x() > v * p.y() {
                    return false;
                }
                sum += p;
            }
        }
        let b = sum.x() / sum.y();
        v - b > self.config.brightness_threshold * self.config.candidate_threshold
    }

    fn process_candidate(&self, gray: &Image, sset: &mut StarSet, x: f32, y: f32) {
        let mut star = Star {
            pos: Vec2::new(x, y),
            brightness: 1.0,
            bias: 0.0,
            sigma: self.config.sigma,
            index: -1,
            weight: 1,
        };
        fit_star(&mut star, gray, self.config.fit_steps);

        if star.brightness < self.config.brightness_threshold {
            return;
        }
        if star_is_in_set(&self.config, &star, sset) {
            return;
        }
        sset.push(star);
    }
}

fn star_is_in_set(config: &Config, star: &Star, sset: &StarSet) -> bool {
    let min_dist = config.sigma * config.min_dist;
    let min_dist_sq = min_dist * min_dist;
    sset.iter().any(|r| (star.pos - r.pos).length_sq() < min_dist_sq)
}

/// Unit-amplitude 2D Gaussian, `a * exp(-(x^2+y^2) / (2 sigma^2))`.
fn gauss2(a: f32, sigma: f32, x: f32, y: f32) -> f32 {
    a * (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
}

pub fn fit_star(star: &mut Star, image: &Image, steps: u32) {
    for _ in 0..steps {
        fit_star_pos(star, image);
        fit_star_brightness(star, image);
    }
}

fn fit_range(center: f32, sigma: f32) -> (i32, i32) {
    let c = center as i32;
    let dist = (sigma * 3.0) as i32 + 1;
    (c - dist, c + dist)
}

fn fit_star_pos(star: &mut Star, image: &Image) {
    let mut pos = Vec2::new(0.0, 0.0);
    let mut mass = 0.0f32;
    let (px, py) = (star.pos.x(), star.pos.y());
    let sigma = star.sigma;
    let bias = star.bias;
    let (y0, y1) = fit_range(py, sigma);
    let (x0, x1) = fit_range(px, sigma);

    for y in y0..=y1 {
        if y < 0 || y as usize >= image.h() {
            continue;
        }
        for x in x0..=x1 {
            if x < 0 || x as usize >= image.w() {
                continue;
            }
            let pix = image.pixel_gray(x, y);
            if pix.y() == 0.0 {
                continue;
            }
            let mut v = pix.x() / pix.y() - bias;
            v *= gauss2(1.0, sigma, x as f32 - px, y as f32 - py);
            pos += Vec2::new(x as f32, y as f32) * v;
            mass += v;
        }
    }
    star.pos = pos / mass;
}

fn fit_star_brightness(star: &mut Star, image: &Image) {
    let mut bght = Vec2::new(0.0, 0.0);
    let mut bias = Vec2::new(0.0, 0.0);
    let (px, py) = (star.pos.x(), star.pos.y());
    let sigma = star.sigma;
    let (y0, y1) = fit_range(py, sigma);
    let (x0, x1) = fit_range(px, sigma);
    let bias0 = star.bias;
    let bght0 = star.brightness;

    for y in y0..=y1 {
        if y < 0 || y as usize >= image.h() {
            continue;
        }
        for x in x0..=x1 {
            if x < 0 || x as usize >= image.w() {
                continue;
            }
            let pix = image.pixel_gray(x, y);
            if pix.y() == 0.0 {
                continue;
            }
            let v = pix.x() / pix.y();
            let g = gauss2(1.0, sigma, x as f32 - px, y as f32 - py);

            bght = Vec2::new(bght.x() + (v - bias0) * g, bght.y() + g * g);
            bias = Vec2::new(bias.x() + (v - g * bght0) * (1.0 - g), bias.y() + (1.0 - g));
        }
    }
    star.brightness = bght.x() / bght.y();
    star.bias = bias.x() / bias.y();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_gaussian(w: u32, h: u32, cx: f32, cy: f32, sigma: f32, brightness: f32, bias: f32) -> Image {
        let mut img = Image::init(w, h, PixelFormat::Gray);
        for y in 0..h {
            for x in 0..w {
                let v = bias + gauss2(brightness, sigma, x as f32 - cx, y as f32 - cy);
                let idx = (y as usize * w as usize + x as usize) * 2;
                img.gray_data_mut()[idx] = v;
                img.gray_data_mut()[idx + 1] = 1.0;
            }
        }
        img
    }

    #[test]
    fn recovers_synthesized_star_position_and_brightness() {
        let img = synth_gaussian(21, 21, 10.3, 10.7, 3.0, 0.5, 0.1);
        let mut star = Star {
            pos: Vec2::new(10.0, 10.0),
            brightness: 1.0,
            bias: 0.0,
            sigma: 3.0,
            index: -1,
            weight: 1,
        };
        fit_star(&mut star, &img, 30);
        assert!((star.pos.x() - 10.3).abs() < 0.1);
        assert!((star.pos.y() - 10.7).abs() < 0.1);
        assert!((star.brightness - 0.5).abs() < 0.05);
        assert!((star.bias - 0.1).abs() < 0.01);
    }

    #[test]
    fn find_detects_single_bright_star() {
        let img = synth_gaussian(41, 41, 20.0, 20.0, 2.0, 1.0, 0.0);
        let finder = StarFinder::new(Config {
            sigma: 2.0,
            ..Config::default()
        });
        let stars = finder.find(&img);
        assert!(!stars.is_empty());
        assert!((stars[0].pos.x() - 20.0).abs() < 1.0);
        assert!((stars[0].pos.y() - 20.0).abs() < 1.0);
    }

    #[test]
    fn find_returns_empty_for_blank_image() {
        let mut img = Image::init(30, 30, PixelFormat::Gray);
        img.clear_black();
        let finder = StarFinder::new(Config::default());
        assert!(finder.find(&img).is_empty());
    }

    #[test]
    fn find_sorts_descending_by_brightness() {
        let mut img = synth_gaussian(61, 31, 10.0, 15.0, 1.5, 0.6, 0.0);
        let bright2 = synth_gaussian(61, 31, 45.0, 15.0, 1.5, 0.9, 0.0);
        for (p, q) in img.gray_data_mut().iter_mut().zip(bright2.gray_data()) {
            *p += *q;
        }
        let finder = StarFinder::new(Config {
            sigma: 1.5,
            ..Config::default()
        });
        let stars = finder.find(&img);
        for w in stars.as_slice().windows(2) {
            assert!(w[0].brightness >= w[1].brightness);
        }
    }
}
