//! Maximin solver: column generation on the dual-like "weights
//! LP", pricing through the oracle, recovering the primal distribution once
//! pricing stalls.

use crate::backend::highs_backend;
use crate::backend::{Model, Sense, SolveOptions, Status};
use crate::config::{RunConfig, MAXIMIN_SPEEDUP_ROUNDS};
use crate::diagnostics::ColumnGenerationDiagnostics;
use crate::error::{Error, Result};
use crate::linexpr::LinExpr;
use crate::oracle::PanelOracle;
use crate::panel::{Distribution, Panel};
use crate::respondent::Pool;
use crate::solver::{covered_indices, panel_index, seed_rounds};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum DualVar {
    Y(usize),
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PrimalVar {
    Lambda(usize),
    L,
}

pub fn solve(pool: &Pool, oracle: &PanelOracle, config: &RunConfig) -> Result<(Distribution, ColumnGenerationDiagnostics)> {
    let n = pool.len();
    let (mut panels, covered_set, _seed) = oracle.seed(seed_rounds(n))?;
    let covered = covered_indices(&covered_set);
    let mut diagnostics = ColumnGenerationDiagnostics::default();

    loop {
        diagnostics.iterations += 1;
        let (mut y, mut z) = solve_weights_lp(&panels, &covered, n, config)?;

        let w = weights_vector(n, &y);
        let (priced, mut v) = oracle.best_panel(&w)?;

        if v <= z + config.eps {
            diagnostics.final_gap = v - z;
            diagnostics.panels_added = panels.len();
            debug!(
                iterations = diagnostics.iterations,
                panels = panels.len(),
                gap = diagnostics.final_gap,
                "maximin column generation converged"
            );
            return recover_primal(&panels, &covered, n, config, &mut diagnostics);
        }
        panels.push(priced.clone());

        // Speed heuristic: keep repricing off the cheaply updated dual
        // instead of re-solving the LP, as long as it keeps finding
        // genuinely new panels.
        let mut last_panel = priced;
        for _ in 0..MAXIMIN_SPEEDUP_ROUNDS {
            let scale = if v.abs() > 1e-15 { z / v } else { 1.0 };
            for &i in last_panel.members() {
                y[i] *= scale;
            }
            let sum: f64 = covered.iter().map(|&i| y[i]).sum();
            if sum <= 0.0 {
                break;
            }
            for &i in &covered {
                y[i] /= sum;
            }
            z /= sum;

            let w = weights_vector(n, &y);
            let (next_panel, next_v) = oracle.best_panel(&w)?;
            if next_v <= z + config.eps || panel_index(&panels, &next_panel).is_some() {
                break;
            }
            panels.push(next_panel.clone());
            last_panel = next_panel;
            v = next_v;
        }
    }
}

fn weights_vector(n: usize, y: &[f64]) -> Vec<f64> {
    (0..n).map(|i| y.get(i).copied().unwrap_or(0.0)).collect()
}

/// Builds and solves the "weights LP": minimize z subject to
/// `Σ_{i∈P} y_i ≤ z` for every panel in `B`, `Σ y_i = 1` over covered
/// respondents. Returns a dense `y` vector of length `n` (zero off the
/// covered set) plus `z*`.
fn solve_weights_lp(
    panels: &[Panel],
    covered: &[usize],
    n: usize,
    config: &RunConfig,
) -> Result<(Vec<f64>, f64)> {
    let mut model: Model<DualVar> = Model::new();
    for &i in covered {
        model.add_continuous_var(DualVar::Y(i), 0.0, 1.0);
    }
    model.add_continuous_var(DualVar::Z, 0.0, f64::INFINITY);

    let sum_y = LinExpr::from_terms(covered.iter().map(|&i| (DualVar::Y(i), 1.0)));
    model.add_constraint(sum_y.eq(&LinExpr::constant(1.0)));

    for panel in panels {
        let members_covered: Vec<usize> = panel
            .members()
            .iter()
            .copied()
            .filter(|m| covered.contains(m))
            .collect();
        let panel_sum = LinExpr::from_terms(members_covered.into_iter().map(|i| (DualVar::Y(i), 1.0)));
        model.add_constraint(panel_sum.leq(&LinExpr::var(DualVar::Z)));
    }

    model.set_objective(LinExpr::var(DualVar::Z), Sense::Minimize);
    let solution = highs_backend::solve(&model, SolveOptions {
        time_limit_secs: None,
        mip_gap: Some(config.eps),
    })?;

    match solution.status {
        Status::Optimal => {
            let mut y = vec![0.0; n];
            for &i in covered {
                y[i] = solution.value(DualVar::Y(i));
            }
            Ok((y, solution.value(DualVar::Z)))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("maximin weights LP: {other:?}"))),
    }
}

/// Recovers the primal distribution.
fn recover_primal(
    panels: &[Panel],
    covered: &[usize],
    n: usize,
    config: &RunConfig,
    diagnostics: &mut ColumnGenerationDiagnostics,
) -> Result<(Distribution, ColumnGenerationDiagnostics)> {
    let _ = n;
    let mut model: Model<PrimalVar> = Model::new();
    for j in 0..panels.len() {
        model.add_continuous_var(PrimalVar::Lambda(j), 0.0, 1.0);
    }
    model.add_continuous_var(PrimalVar::L, 0.0, 1.0);

    let sum_lambda = LinExpr::from_terms((0..panels.len()).map(|j| (PrimalVar::Lambda(j), 1.0)));
    model.add_constraint(sum_lambda.eq(&LinExpr::constant(1.0)));

    for &i in covered {
        let covering: Vec<usize> = (0..panels.len()).filter(|&j| panels[j].contains(i)).collect();
        let marginal_expr = LinExpr::from_terms(covering.into_iter().map(|j| (PrimalVar::Lambda(j), 1.0)));
        model.add_constraint(LinExpr::var(PrimalVar::L).leq(&marginal_expr));
    }

    model.set_objective(LinExpr::var(PrimalVar::L), Sense::Maximize);
    let solution = highs_backend::solve(&model, SolveOptions {
        time_limit_secs: None,
        mip_gap: Some(config.eps),
    })?;

    match solution.status {
        Status::Optimal => {
            let weights: Vec<f64> = (0..panels.len())
                .map(|j| solution.value(PrimalVar::Lambda(j)))
                .collect();
            let dist = Distribution::new(panels.to_vec(), weights).clip_and_renormalize();
            Ok((dist, diagnostics.clone()))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("maximin primal LP: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Objective, Rounder, RunConfig};
    use crate::respondent::{Feature, Quota, Respondent, RespondentId};
    use std::collections::BTreeMap;

    fn toy_pool() -> Pool {
        let feature = Feature {
            name: "color".into(),
            quotas: BTreeMap::from([
                ("red".to_string(), Quota::new(1, 1)),
                ("blue".to_string(), Quota::new(1, 1)),
            ]),
        };
        let respondents = vec![
            mk("1", "red"),
            mk("2", "red"),
            mk("3", "blue"),
            mk("4", "blue"),
        ];
        Pool::new(respondents, vec![feature]).unwrap()
    }

    fn mk(id: &str, color: &str) -> Respondent {
        Respondent {
            id: RespondentId(id.to_string()),
            values: BTreeMap::from([("color".to_string(), color.to_string())]),
        }
    }

    #[test]
    fn symmetric_instance_gives_uniform_half_marginals() {
        let pool = toy_pool();
        let oracle = PanelOracle::init(&pool, 2).unwrap();
        let config = RunConfig::new(2, 1, Objective::Maximin, Rounder::OptIlp, 0);
        let (dist, _diag) = solve(&pool, &oracle, &config).unwrap();
        for i in 0..4 {
            assert!((dist.marginal(i) - 0.5).abs() < 1e-3);
        }
    }
}
