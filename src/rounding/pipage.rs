//! Pipage randomized rounding: repeatedly merges the
//! fractional remainder of two panels at a time, preserving `Σq_j` exactly
//! and inducing negative correlation between rounded indicators.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::panel::{Distribution, Panel, UniformDistribution};

const SNAP_EPS: f64 = 1e-5;

pub fn round(panels: &[Panel], input: &Distribution, m: u64, seed: u64) -> UniformDistribution {
    let m_f = m as f64;
    let s: Vec<f64> = input.weights.iter().map(|&lambda| m_f * lambda).collect();
    let f: Vec<u64> = s.iter().map(|&si| si.floor().max(0.0) as u64).collect();
    let mut q: Vec<f64> = s.iter().zip(&f).map(|(&si, &fi)| si - fi as f64).collect();

    let mut fractional: Vec<usize> = (0..q.len())
        .filter(|&j| q[j] > SNAP_EPS && q[j] < 1.0 - SNAP_EPS)
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);

    while fractional.len() >= 2 {
        let j1 = fractional[0];
        let j2 = fractional[1];
        let p1 = q[j1];
        let p2 = q[j2];
        let alpha = (1.0 - p1).min(p2);
        let beta = p1.min(1.0 - p2);

        if alpha + beta <= 0.0 {
            fractional.remove(0);
            continue;
        }
        let u: f64 = rng.gen_range(0.0..1.0);
        if u <= alpha / (alpha + beta) {
            q[j1] = p1 - beta;
            q[j2] = p2 + beta;
        } else {
            q[j1] = p1 + alpha;
            q[j2] = p2 - alpha;
        }

        fractional.retain(|&j| {
            let v = q[j];
            !(v <= SNAP_EPS || v >= 1.0 - SNAP_EPS)
        });
    }

    for qj in q.iter_mut() {
        if *qj <= SNAP_EPS {
            *qj = 0.0;
        } else if *qj >= 1.0 - SNAP_EPS {
            *qj = 1.0;
        }
    }

    let multiplicities: Vec<u64> = (0..panels.len())
        .map(|j| (f[j] as f64 + q[j]).round().max(0.0) as u64)
        .collect();
    super::to_uniform_distribution(panels, multiplicities, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_integral_distribution_is_unchanged() {
        let panels = vec![
            Panel::from_members(vec![0]),
            Panel::from_members(vec![1]),
            Panel::from_members(vec![2]),
        ];
        let input = Distribution::new(panels.clone(), vec![0.3, 0.3, 0.4]);
        let rounded = round(&panels, &input, 10, 42);
        let mults: Vec<u64> = panels
            .iter()
            .map(|p| {
                rounded
                    .panels
                    .iter()
                    .zip(&rounded.multiplicities)
                    .find(|(rp, _)| *rp == p)
                    .map(|(_, &m)| m)
                    .unwrap_or(0)
            })
            .collect();
        assert_eq!(mults, vec![3, 3, 4]);
    }

    #[test]
    fn pipage_preserves_total_multiplicity() {
        let panels = vec![
            Panel::from_members(vec![0, 1]),
            Panel::from_members(vec![1, 2]),
            Panel::from_members(vec![2, 3]),
        ];
        let input = Distribution::new(panels.clone(), vec![0.5, 0.25, 0.25]);
        let rounded = round(&panels, &input, 8, 7);
        assert_eq!(rounded.total_multiplicity(), 8);
    }
}
