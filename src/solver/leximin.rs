//! Leximin solver: outer loop over a fixed-probability
//! dictionary `F`, each stage running its own column generation on the
//! fixed-probability dual, recovering a primal once `F` is complete.

use std::collections::BTreeMap;

use crate::backend::highs_backend;
use crate::backend::{Model, Sense, SolveOptions, Status};
use crate::config::{RunConfig, LEXIMIN_RELAXATION_STEP};
use crate::diagnostics::{ColumnGenerationDiagnostics, LeximinDiagnostics};
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
    YHat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PrimalVar {
    Lambda(usize),
    Slack,
}

const MAX_RELAXATION_RETRIES: usize = 50;

pub fn solve(pool: &Pool, oracle: &PanelOracle, config: &RunConfig) -> Result<(Distribution, LeximinDiagnostics)> {
    let n = pool.len();
    let (mut panels, covered_set, _seed) = oracle.seed(seed_rounds(n))?;
    let covered = covered_indices(&covered_set);

    let mut fixed: BTreeMap<usize, f64> = BTreeMap::new();
    let mut diagnostics = LeximinDiagnostics::default();

    while fixed.len() < covered.len() {
        diagnostics.stages += 1;
        let mut stage_diag = ColumnGenerationDiagnostics::default();
        let mut relaxation = fixed.clone();
        let mut relaxation_attempts = 0usize;

        let mut progressed = false;
        loop {
            stage_diag.iterations += 1;
            let solved = solve_dual(&panels, &covered, &relaxation, n, config);

            let (y, y_hat, d_star) = match solved {
                Ok(triple) => triple,
                Err(Error::BackendUnexpectedStatus(_)) => {
                    relaxation_attempts += 1;
                    diagnostics.relaxations += 1;
                    if relaxation_attempts > MAX_RELAXATION_RETRIES {
                        return Err(Error::BackendUnexpectedStatus(
                            "leximin dual did not stabilize after relaxation retries".into(),
                        ));
                    }
                    for v in relaxation.values_mut() {
                        *v = (*v - LEXIMIN_RELAXATION_STEP).max(0.0);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (priced, v) = oracle.best_panel(&y)?;
            if v <= y_hat + config.eps {
                for &i in &covered {
                    if y[i] > config.eps && !fixed.contains_key(&i) {
                        fixed.insert(i, d_star.max(0.0));
                        progressed = true;
                    }
                }
                break;
            }
            if panel_index(&panels, &priced).is_none() {
                panels.push(priced);
            }
        }

        if !progressed {
            return Err(Error::LeximinStalled {
                stage: diagnostics.stages,
                fixed: fixed.len(),
                covered: covered.len(),
            });
        }
        debug!(stage = diagnostics.stages, fixed = fixed.len(), covered = covered.len(), "leximin stage complete");
        diagnostics.per_stage.push(stage_diag);
    }

    recover_leximin_primal(&panels, &covered, &fixed, n, config, diagnostics)
}

/// Builds and solves the fixed-probability dual. Returns
/// `(y*, ŷ*, d*)` where `d* = ŷ* - Σ_{i∈F} F[i]·y_i*` is the dual objective.
fn solve_dual(
    panels: &[Panel],
    covered: &[usize],
    fixed: &BTreeMap<usize, f64>,
    n: usize,
    config: &RunConfig,
) -> Result<(Vec<f64>, f64, f64)> {
    let mut model: Model<DualVar> = Model::new();
    for &i in covered {
        model.add_continuous_var(DualVar::Y(i), 0.0, 1.0);
    }
    model.add_continuous_var(DualVar::YHat, 0.0, f64::INFINITY);

    let free: Vec<usize> = covered.iter().copied().filter(|i| !fixed.contains_key(i)).collect();
    let sum_free = LinExpr::from_terms(free.into_iter().map(|i| (DualVar::Y(i), 1.0)));
    model.add_constraint(sum_free.eq(&LinExpr::constant(1.0)));

    for panel in panels {
        let members: Vec<usize> = panel.members().iter().copied().filter(|m| covered.contains(m)).collect();
        let panel_sum = LinExpr::from_terms(members.into_iter().map(|i| (DualVar::Y(i), 1.0)));
        model.add_constraint(panel_sum.leq(&LinExpr::var(DualVar::YHat)));
    }

    let penalty = LinExpr::from_terms(fixed.iter().map(|(&i, &f)| (DualVar::Y(i), f)));
    let objective = (&LinExpr::var(DualVar::YHat) - &penalty).cleaned();
    model.set_objective(objective, Sense::Minimize);

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
            let y_hat = solution.value(DualVar::YHat);
            Ok((y, y_hat, solution.objective_value))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("leximin dual: {other:?}"))),
    }
}

/// Final recovery: find `λ` over `B` satisfying every fixed marginal up to
/// a minimized slack, then clip and renormalize.
fn recover_leximin_primal(
    panels: &[Panel],
    covered: &[usize],
    fixed: &BTreeMap<usize, f64>,
    n: usize,
    config: &RunConfig,
    diagnostics: LeximinDiagnostics,
) -> Result<(Distribution, LeximinDiagnostics)> {
    let _ = n;
    let mut model: Model<PrimalVar> = Model::new();
    for j in 0..panels.len() {
        model.add_continuous_var(PrimalVar::Lambda(j), 0.0, 1.0);
    }
    model.add_continuous_var(PrimalVar::Slack, 0.0, 1.0);

    let sum_lambda = LinExpr::from_terms((0..panels.len()).map(|j| (PrimalVar::Lambda(j), 1.0)));
    model.add_constraint(sum_lambda.eq(&LinExpr::constant(1.0)));

    for &i in covered {
        let target = fixed.get(&i).copied().unwrap_or(0.0);
        let covering: Vec<usize> = (0..panels.len()).filter(|&j| panels[j].contains(i)).collect();
        let marginal_expr = LinExpr::from_terms(covering.into_iter().map(|j| (PrimalVar::Lambda(j), 1.0)));
        // marginal(i) + slack >= target  <=>  target - marginal(i) - slack <= 0
        let lhs = &LinExpr::constant(target) - &marginal_expr;
        let lhs = &lhs - &LinExpr::var(PrimalVar::Slack);
        model.add_constraint(lhs.leq(&LinExpr::constant(0.0)));
    }

    model.set_objective(LinExpr::var(PrimalVar::Slack), Sense::Minimize);
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
            Ok((dist, diagnostics))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("leximin primal: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Objective, Rounder, RunConfig};
    use crate::respondent::{Feature, Quota, Respondent, RespondentId};
    use std::collections::BTreeMap as Map;

    fn toy_pool() -> Pool {
        let feature = Feature {
            name: "color".into(),
            quotas: Map::from([
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
            values: Map::from([("color".to_string(), color.to_string())]),
        }
    }

    #[test]
    fn symmetric_instance_gives_uniform_half_marginals() {
        let pool = toy_pool();
        let oracle = PanelOracle::init(&pool, 2).unwrap();
        let config = RunConfig::new(2, 1, Objective::Leximin, Rounder::OptIlp, 0);
        let (dist, _diag) = solve(&pool, &oracle, &config).unwrap();
        for i in 0..4 {
            assert!((dist.marginal(i) - 0.5).abs() < 1e-2);
        }
    }
}
