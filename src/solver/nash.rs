//! Nash welfare solver: maximize Σ log(marginal(i)) over covered
//! respondents via convex column generation, pricing reciprocals of the
//! current marginals through the oracle.

use sprs::TriMat;

use crate::backend::clarabel_backend::solve_nash_relaxation;
use crate::config::RunConfig;
use crate::diagnostics::ColumnGenerationDiagnostics;
use crate::error::Result;
use crate::oracle::PanelOracle;
use crate::panel::{Distribution, Panel};
use crate::respondent::Pool;
use crate::solver::{covered_indices, panel_index, seed_rounds};
use tracing::debug;

const MAX_ITERATIONS: usize = 500;
const CONVEX_TIME_LIMIT_SECS: f64 = 60.0;

pub fn solve(pool: &Pool, oracle: &PanelOracle, config: &RunConfig) -> Result<(Distribution, ColumnGenerationDiagnostics)> {
    let n = pool.len();
    let (mut panels, covered_set, _seed) = oracle.seed(seed_rounds(n))?;
    let covered = covered_indices(&covered_set);
    let mut diagnostics = ColumnGenerationDiagnostics::default();

    let mut lambdas: Vec<f64> = Vec::new();
    let mut marginals: Vec<f64> = Vec::new();

    for _ in 0..MAX_ITERATIONS {
        diagnostics.iterations += 1;
        let incidence = build_incidence(&panels, &covered);
        let relaxed = solve_nash_relaxation(&incidence, CONVEX_TIME_LIMIT_SECS)?;
        lambdas = relaxed.lambdas;
        marginals = relaxed.marginals;

        let reciprocals: Vec<f64> = marginals
            .iter()
            .map(|&m| if m > 1e-12 { 1.0 / m } else { 1.0 / 1e-12 })
            .collect();
        let mut w = vec![0.0; n];
        for (pos, &i) in covered.iter().enumerate() {
            w[i] = reciprocals[pos];
        }

        let (priced, v) = oracle.best_panel(&w)?;

        let d_max = panels
            .iter()
            .map(|p| {
                covered
                    .iter()
                    .enumerate()
                    .filter(|(_, &i)| p.contains(i))
                    .map(|(pos, _)| reciprocals[pos])
                    .sum::<f64>()
            })
            .fold(f64::NEG_INFINITY, f64::max);

        if v <= d_max + config.eps_nash {
            diagnostics.final_gap = v - d_max;
            diagnostics.panels_added = panels.len();
            debug!(
                iterations = diagnostics.iterations,
                panels = panels.len(),
                gap = diagnostics.final_gap,
                "nash convex column generation converged"
            );
            let dist = Distribution::new(panels, lambdas).clip_and_renormalize();
            return Ok((dist, diagnostics));
        }

        if panel_index(&panels, &priced).is_none() {
            panels.push(priced);
        }
    }

    diagnostics.panels_added = panels.len();
    let dist = Distribution::new(panels, lambdas).clip_and_renormalize();
    let _ = marginals;
    Ok((dist, diagnostics))
}

fn build_incidence(panels: &[Panel], covered: &[usize]) -> sprs::CsMat<f64> {
    let mut triplets = TriMat::new((covered.len(), panels.len()));
    for (row, &i) in covered.iter().enumerate() {
        for (col, panel) in panels.iter().enumerate() {
            if panel.contains(i) {
                triplets.add_triplet(row, col, 1.0);
            }
        }
    }
    triplets.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Objective, Rounder, RunConfig};
    use crate::respondent::{Feature, Quota, Respondent, RespondentId};
    use std::collections::BTreeMap;

    fn toy_pool() -> Pool {
        let feature = Feature {
            name: "group".into(),
            quotas: BTreeMap::from([("only".to_string(), Quota::new(0, 3))]),
        };
        let respondents = vec![mk("1"), mk("2"), mk("3")];
        Pool::new(respondents, vec![feature]).unwrap()
    }

    fn mk(id: &str) -> Respondent {
        Respondent {
            id: RespondentId(id.to_string()),
            values: BTreeMap::from([("group".to_string(), "only".to_string())]),
        }
    }

    #[test]
    fn unconstrained_triple_instance_gives_symmetric_marginals() {
        let pool = toy_pool();
        let oracle = PanelOracle::init(&pool, 2).unwrap();
        let config = RunConfig::new(2, 1, Objective::Nash, Rounder::OptIlp, 0);
        let (dist, _diag) = solve(&pool, &oracle, &config).unwrap();
        for i in 0..3 {
            assert!((dist.marginal(i) - 2.0 / 3.0).abs() < 0.05);
        }
    }
}
