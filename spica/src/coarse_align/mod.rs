//! Coarse (pixel-scale) alignment: a cheap small-change aligner tried
//! first, falling back to an exhaustive pair-of-pairs search.

pub mod brut;
pub mod small_change;
