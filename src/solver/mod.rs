//! Column-generation solvers: maximin, leximin and Nash all share the same
//! shape — grow a panel set `B` seeded by the [`crate::oracle::PanelOracle`],
//! alternate a master LP/convex solve with a pricing call into the oracle,
//! stop once pricing can no longer beat the current bound by more than `ε`.
//!
//! Each submodule owns its own variable-key enum and its own master-problem
//! construction; only the outer shape (seed → price-and-generate loop →
//! primal recovery) is common, so it is not abstracted into a shared trait —
//! the three objectives differ enough in their master LPs (a minimax LP, a
//! sequence of fixed-probability duals, a convex log-sum program) that a
//! forced common interface would buy nothing.

pub mod leximin;
pub mod maximin;
pub mod nash;

use std::collections::HashSet;

use crate::panel::Panel;

/// Number of seed rounds handed to [`crate::oracle::PanelOracle::seed`]
/// before any master LP is built. Twice the pool's feature-value count gives
/// the multiplicative-weights walk enough rounds to visit every quota
/// boundary at least once in practice; solvers grow `B` further during
/// column generation regardless; seeding only sets the starting point.
pub fn seed_rounds(covered_upper_bound: usize) -> usize {
    (2 * covered_upper_bound).max(8)
}

pub(crate) fn covered_indices(covered: &HashSet<usize>) -> Vec<usize> {
    let mut v: Vec<usize> = covered.iter().copied().collect();
    v.sort_unstable();
    v
}

pub(crate) fn panel_index(panels: &[Panel], panel: &Panel) -> Option<usize> {
    panels.iter().position(|p| p == panel)
}
