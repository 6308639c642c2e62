//! Rounders: turn a panel set `B` and a continuous or target
//! distribution into a uniform-over-`M` distribution, each by a different
//! route but all sharing the same postcondition: `M·λ_j ∈ ℤ≥0` and
//! `Σ(M·λ_j) = M`.

pub mod beck_fiala;
pub mod ilp_rounding;
pub mod minimax;
pub mod pipage;

use crate::panel::{Panel, UniformDistribution};

/// Builds a [`UniformDistribution`], dropping panels rounded down to zero
/// multiplicity — every rounder below produces a dense `Vec<u64>` aligned
/// with its input panel list, and callers don't want zero-weight columns in
/// the result.
pub(crate) fn to_uniform_distribution(panels: &[Panel], multiplicities: Vec<u64>, m: u64) -> UniformDistribution {
    let mut kept_panels = Vec::new();
    let mut kept_mult = Vec::new();
    for (panel, mult) in panels.iter().zip(multiplicities) {
        if mult > 0 {
            kept_panels.push(panel.clone());
            kept_mult.push(mult);
        }
    }
    UniformDistribution::new(kept_panels, kept_mult, m)
}
