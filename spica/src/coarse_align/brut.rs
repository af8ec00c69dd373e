//! Exhaustive coarse alignment: search all pairs-of-pairs of stars for a
//! rotation+scale that's consistent with a reference pair, gated by
//! tolerance, then rank the survivor.

use crate::star::StarSet;
use crate::transform::Transform;
use crate::vec::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Negative means "use every star in the set."
    pub star_n: i32,
    pub ref_star_n: i32,
    pub rank_star_n: i32,
    pub dist_tol: f32,
    pub scale_tol: f32,
    pub rot_tol: f32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            star_n: 30,
            ref_star_n: -1,
            rank_star_n: -1,
            dist_tol: 1.5,
            scale_tol: 0.1,
            rot_tol: 3.0,
        }
    }
}

/// `a` capped by `b` unless `a` is negative ("unlimited"), in which case `b`
/// (the set's actual length) is used.
fn min_int_opt(a: i32, b: usize) -> usize {
    if a < 0 || (b as i32) < a {
        b
    } else {
        a as usize
    }
}

fn rank_transform(rank_star_n: usize, dist_tol: f32, ref_sset: &StarSet, tr: &Transform, sset: &StarSet) -> f32 {
    let dist_tol_sq = dist_tol * dist_tol;
    let mut result = 0.0f32;
    for i in 0..rank_star_n {
        let s = &sset[i];
        let pos = tr.apply(s.pos);
        let sigma = s.sigma * dist_tol_sq;

        let mut best_rank = 1.0f32;
        for r in ref_sset.iter() {
            let rank = (pos - r.pos).length_sq() / (sigma * r.sigma);
            if rank < best_rank {
                best_rank = rank;
            }
        }
        result += best_rank;
    }
    result
}

fn respects_scale_rot_tol(config: &Config, rot: Vec2) -> bool {
    let lsq = rot.length_sq();
    let tol = config.scale_tol + 1.0;
    let tol = tol * tol;
    if lsq > tol || 1.0 / lsq > tol {
        return false;
    }
    if config.rot_tol > 2.0 {
        return true;
    }
    let normalized = rot / lsq.sqrt();
    let rot = Vec2::new(1.0, normalized.y());
    let lsq = rot.length_sq();
    lsq <= config.rot_tol * config.rot_tol
}

/// Search for the best-ranking rotation+shift. Returns `Drop` if no
/// candidate improves on the initial score (`rank_star_n`, i.e. every
/// ranked star fully unmatched).
pub fn align(config: &Config, ref_sset: &StarSet, sset: &StarSet) -> Transform {
    let star_n = min_int_opt(config.star_n, sset.len());
    let ref_star_n = min_int_opt(config.ref_star_n, ref_sset.len());
    let rank_star_n = min_int_opt(config.rank_star_n, sset.len());

    let mut result = Transform::Drop;
    let mut best_rank = rank_star_n as f32;

    for a1 in 0..star_n {
        for b1 in a1 + 1..star_n {
            let pos1 = sset[a1].pos;
            let dir1 = sset[b1].pos - pos1;
            if dir1.x() == 0.0 && dir1.y() == 0.0 {
                continue;
            }

            for a2 in 0..ref_star_n {
                for b2 in 0..ref_star_n {
                    if b2 == a2 {
                        continue;
                    }
                    let pos2 = ref_sset[a2].pos;
                    let dir2 = ref_sset[b2].pos - pos2;
                    if dir2.x() == 0.0 && dir2.y() == 0.0 {
                        continue;
                    }

                    let rot = dir2.complex_div(dir1);
                    if !respects_scale_rot_tol(config, rot) {
                        continue;
                    }

                    let tr = Transform::linear(rot, pos2 - pos1.complex_mul(rot));
                    let rank = rank_transform(rank_star_n, config.dist_tol, ref_sset, &tr, sset);
                    if rank < best_rank {
                        best_rank = rank;
                        result = tr;
                    }
                }
            }
        }
    }
    result
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
    fn recovers_90_degree_rotation() {
        let pts = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (5.0, 7.0)];
        let mut refs = StarSet::new();
        let mut cur = StarSet::new();
        for (x, y) in pts {
            refs.push(star_at(x, y));
            // rotate 90 degrees: (x, y) -> (-y, x)
            cur.push(star_at(-y, x));
        }
        let config = Config::default();
        let tr = align(&config, &refs, &cur);
        match tr {
            Transform::Linear { rot, .. } => {
                assert!((rot.x()).abs() < 1e-3);
                assert!((rot.y() + 1.0).abs() < 1e-3);
            }
            other => panic!("expected Linear, got {:?}", other),
        }
    }

    #[test]
    fn no_plausible_match_drops() {
        let mut refs = StarSet::new();
        refs.push(star_at(0.0, 0.0));
        refs.push(star_at(1.0, 0.0));
        let mut cur = StarSet::new();
        cur.push(star_at(0.0, 0.0));
        let tr = align(&Config::default(), &refs, &cur);
        assert_eq!(tr, Transform::Drop);
    }
}
