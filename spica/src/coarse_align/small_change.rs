//! Coarse alignment by nearest-star correspondence plus complex linear
//! regression, assuming the transform has changed little since the
//! previous frame.

use crate::star::StarSet;
use crate::transform::Transform;
use crate::vec::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub dist_threshold: f32,
    pub min_star_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dist_threshold: 5.0,
            min_star_n: 4,
        }
    }
}

/// Nearest reference star to `pos` under the `sigma`-weighted metric, or
/// `None` if `ref_sset` is empty or the closest match exceeds
/// `config.dist_threshold`.
fn closest_star_index(config: &Config, ref_sset: &StarSet, pos: Vec2, sigma: f32) -> Option<usize> {
    if ref_sset.is_empty() {
        return None;
    }
    let mut best_idx = 0;
    let mut best_dist = (pos - ref_sset[0].pos).length_sq() / (sigma * ref_sset[0].sigma);
    for (i, r) in ref_sset.iter().enumerate() {
        let dist = (pos - r.pos).length_sq() / (sigma * r.sigma);
        if dist < best_dist {
            best_idx = i;
            best_dist = dist;
        }
    }
    if best_dist > config.dist_threshold * config.dist_threshold {
        None
    } else {
        Some(best_idx)
    }
}

/// Coarse-align `sset` against `ref_sset`, using `prev_tr` as a prior for
/// nearest-neighbor matching. Returns `Drop` if fewer than `min_star_n`
/// correspondences survive, or if the regression is degenerate.
pub fn align(config: &Config, ref_sset: &StarSet, prev_tr: &Transform, sset: &StarSet) -> Transform {
    let mut sx = Vec2::new(0.0, 0.0);
    let mut sy = Vec2::new(0.0, 0.0);
    let mut sxy = Vec2::new(0.0, 0.0);
    let mut sx2 = 0.0f32;
    let mut tot = 0usize;

    for s in sset.iter() {
        let x = s.pos;
        let idx = match closest_star_index(config, ref_sset, prev_tr.apply(x), s.sigma) {
            Some(i) => i,
            None => continue,
        };
        let y = ref_sset[idx].pos;

        sx += x;
        sy += y;
        sxy += x.conj().complex_mul(y);
        sx2 += x.length_sq();
        tot += 1;
    }

    if tot < config.min_star_n {
        return Transform::Drop;
    }

    let n = tot as f32;
    let sxy = sxy * n;
    let sx2_scaled = sx2 * n;
    let s2x = sx.length_sq();
    if sx2_scaled == s2x {
        return Transform::Drop;
    }

    let rot = (sxy - sx.conj().complex_mul(sy)) / (sx2_scaled - s2x);
    let shift = (sy - rot.complex_mul(sx)) / n;
    Transform::linear(rot, shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::Star;

    fn star_at(x: f32, y: f32) -> Star {
        Star {
            pos: Vec2::new(x, y),
            ..Star::default()
        }
    }

    #[test]
    fn perfect_identity_match_recovers_identity() {
        let mut refs = StarSet::new();
        let mut cur = StarSet::new();
        for (x, y) in [(1.0, 2.0), (5.0, -3.0), (8.0, 8.0), (-4.0, 1.0)] {
            refs.push(star_at(x, y));
            cur.push(star_at(x, y));
        }
        let config = Config::default();
        let tr = align(&config, &refs, &Transform::Identity, &cur);
        match tr {
            Transform::Linear { rot, shift } => {
                assert!((rot.x() - 1.0).abs() < 1e-3 && rot.y().abs() < 1e-3);
                assert!(shift.x().abs() < 1e-3 && shift.y().abs() < 1e-3);
            }
            other => panic!("expected Linear, got {:?}", other),
        }
    }

    #[test]
    fn too_few_correspondences_drops() {
        let mut refs = StarSet::new();
        refs.push(star_at(0.0, 0.0));
        let mut cur = StarSet::new();
        cur.push(star_at(0.0, 0.0));
        let config = Config::default();
        let tr = align(&config, &refs, &Transform::Identity, &cur);
        assert_eq!(tr, Transform::Drop);
    }

    #[test]
    fn empty_reference_set_drops() {
        let refs = StarSet::new();
        let mut cur = StarSet::new();
        for (x, y) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)] {
            cur.push(star_at(x, y));
        }
        let tr = align(&Config::default(), &refs, &Transform::Identity, &cur);
        assert_eq!(tr, Transform::Drop);
    }
}
