//! Panels and distributions over panels.
//!
//! A panel is stored as a sorted vector of dense respondent indices plus a
//! precomputed 64-bit content hash, so hash-set-based deduplication at
//! insertion is cheap. Equality and hashing are defined on the sorted member
//! set, so two panels built from members in different orders compare equal.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::respondent::Pool;

/// A feasible (or, before checking, candidate) k-subset of respondents,
/// identified by dense indices into a [`Pool`].
#[derive(Debug, Clone, Eq)]
pub struct Panel {
    members: Vec<usize>,
    hash: u64,
}

impl Panel {
    /// Builds a panel from member indices, sorting and deduplicating them.
    /// Does not check feasibility — see [`Panel::check_feasible`].
    pub fn from_members(mut members: Vec<usize>) -> Self {
        members.sort_unstable();
        members.dedup();
        let hash = Self::compute_hash(&members);
        Panel { members, hash }
    }

    fn compute_hash(members: &[usize]) -> u64 {
        let mut hasher = DefaultHasher::new();
        members.hash(&mut hasher);
        hasher.finish()
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, respondent: usize) -> bool {
        self.members.binary_search(&respondent).is_ok()
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }

    /// Re-checks feasibility against the quota table. Every panel stored
    /// anywhere in the system is expected to be feasible; this is the check
    /// that verifies it.
    pub fn check_feasible(&self, pool: &Pool, k: usize) -> bool {
        if self.members.len() != k {
            return false;
        }
        for (fi, feature) in pool.features().iter().enumerate() {
            let mut counts = vec![0u32; feature.quotas.len()];
            for &m in &self.members {
                counts[pool.value_index(fi, m)] += 1;
            }
            for (vi, count) in counts.into_iter().enumerate() {
                let q = pool.quota_at(fi, vi);
                if count < q.min || count > q.max {
                    return false;
                }
            }
        }
        true
    }
}

impl PartialEq for Panel {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Hash for Panel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// A continuous distribution: feasible panels paired with weights summing
/// to 1.
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    pub panels: Vec<Panel>,
    pub weights: Vec<f64>,
}

impl Distribution {
    pub fn new(panels: Vec<Panel>, weights: Vec<f64>) -> Self {
        assert_eq!(panels.len(), weights.len());
        Distribution { panels, weights }
    }

    /// marginal(i) = Σ_{j : i∈P_j} λ_j
    pub fn marginal(&self, respondent: usize) -> f64 {
        self.panels
            .iter()
            .zip(&self.weights)
            .filter(|(p, _)| p.contains(respondent))
            .map(|(_, &w)| w)
            .sum()
    }

    pub fn marginals(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.marginal(i)).collect()
    }

    /// Clips weights to `[0, 1]` and renormalizes so they sum to exactly 1,
    /// per every solver's final-recovery step.
    pub fn clip_and_renormalize(mut self) -> Self {
        for w in self.weights.iter_mut() {
            *w = w.clamp(0.0, 1.0);
        }
        let sum: f64 = self.weights.iter().sum();
        if sum > 0.0 {
            for w in self.weights.iter_mut() {
                *w /= sum;
            }
        }
        self
    }

    pub fn sum_weights(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// A uniform-over-`M` distribution: feasible panels with integer
/// multiplicities summing to exactly `M`.
#[derive(Debug, Clone, Default)]
pub struct UniformDistribution {
    pub panels: Vec<Panel>,
    pub multiplicities: Vec<u64>,
    pub m: u64,
}

impl UniformDistribution {
    pub fn new(panels: Vec<Panel>, multiplicities: Vec<u64>, m: u64) -> Self {
        assert_eq!(panels.len(), multiplicities.len());
        UniformDistribution {
            panels,
            multiplicities,
            m,
        }
    }

    pub fn marginal(&self, respondent: usize) -> f64 {
        let count: u64 = self
            .panels
            .iter()
            .zip(&self.multiplicities)
            .filter(|(p, _)| p.contains(respondent))
            .map(|(_, &mult)| mult)
            .sum();
        count as f64 / self.m as f64
    }

    pub fn total_multiplicity(&self) -> u64 {
        self.multiplicities.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_built_from_different_orders_are_equal() {
        let a = Panel::from_members(vec![3, 1, 2]);
        let b = Panel::from_members(vec![1, 2, 3]);
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn marginal_sums_weights_of_covering_panels() {
        let p1 = Panel::from_members(vec![0, 1]);
        let p2 = Panel::from_members(vec![0, 2]);
        let dist = Distribution::new(vec![p1, p2], vec![0.4, 0.6]);
        assert!((dist.marginal(0) - 1.0).abs() < 1e-12);
        assert!((dist.marginal(1) - 0.4).abs() < 1e-12);
        assert!((dist.marginal(2) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn clip_and_renormalize_restores_unit_sum() {
        let p1 = Panel::from_members(vec![0]);
        let p2 = Panel::from_members(vec![1]);
        let dist = Distribution::new(vec![p1, p2], vec![1.2, -0.1]).clip_and_renormalize();
        assert!((dist.sum_weights() - 1.0).abs() < 1e-9);
        assert!(dist.weights.iter().all(|&w| w >= 0.0 && w <= 1.0));
    }

    #[test]
    fn uniform_distribution_marginal_is_multiplicity_over_m() {
        let p = Panel::from_members(vec![0, 1]);
        let u = UniformDistribution::new(vec![p], vec![5], 10);
        assert!((u.marginal(0) - 0.5).abs() < 1e-12);
    }
}
