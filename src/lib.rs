//! Column-generation engine for fair sortition.
//!
//! Given a respondent pool, a per-(feature, value) quota table, a target
//! panel size and a number of uniform replicate panels, this crate computes
//! a maximin-, leximin- or Nash-optimal distribution over feasible panels
//! and rounds it to a uniform-over-`M` distribution with a chosen rounder.
//!
//! The public surface is one function, [`run`]: one call per (solver,
//! rounder) pair, operating entirely on in-memory inputs with no
//! process-wide state.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod linexpr;
pub mod oracle;
pub mod panel;
pub mod respondent;
pub mod rounding;
pub mod solver;

use std::collections::HashSet;

pub use config::{Objective, Rounder, RunConfig};
pub use diagnostics::{RunDiagnostics, SolverDiagnostics};
pub use error::{Error, Result};
pub use panel::{Distribution, Panel, UniformDistribution};
pub use respondent::{Feature, Pool, Quota, Respondent, RespondentId};

use oracle::PanelOracle;

/// Runs one full solver-and-rounder pipeline: builds the oracle, solves the
/// chosen objective, rounds the result to a uniform-over-`M` distribution.
///
/// Returns `Err(Error::InfeasibleQuotas)` immediately if the quota table
/// admits no feasible panel of size `config.panel_size`.
pub fn run(pool: &Pool, config: &RunConfig) -> Result<(UniformDistribution, RunDiagnostics)> {
    if config.panel_size == 0 {
        return Err(Error::InvalidPanelSize(config.panel_size));
    }
    if config.uniform_count == 0 {
        return Err(Error::InvalidUniformCount(config.uniform_count));
    }

    let oracle = PanelOracle::init(pool, config.panel_size)?;

    let (panels, covered_set, continuous, solver_diag) = match config.objective {
        Objective::Maximin => {
            let (dist, diag) = solver::maximin::solve(pool, &oracle, config)?;
            let covered = covered_from_distribution(&dist, pool.len());
            (dist.panels.clone(), covered, dist, SolverDiagnostics::Maximin(diag))
        }
        Objective::Leximin => {
            let (dist, diag) = solver::leximin::solve(pool, &oracle, config)?;
            let covered = covered_from_distribution(&dist, pool.len());
            (dist.panels.clone(), covered, dist, SolverDiagnostics::Leximin(diag))
        }
        Objective::Nash => {
            let (dist, diag) = solver::nash::solve(pool, &oracle, config)?;
            let covered = covered_from_distribution(&dist, pool.len());
            (dist.panels.clone(), covered, dist, SolverDiagnostics::Nash(diag))
        }
    };

    let covered_vec: Vec<usize> = {
        let mut v: Vec<usize> = covered_set.into_iter().collect();
        v.sort_unstable();
        v
    };
    let m = config.uniform_count as u64;

    let (uniform, rounding_diag) = match config.rounder {
        Rounder::OptIlp => match config.objective {
            Objective::Nash => rounding::ilp_rounding::round_nash(&panels, &covered_vec, m)?,
            _ => rounding::ilp_rounding::round_maximin(&panels, &covered_vec, m)?,
        },
        Rounder::BeckFiala => {
            let uniform = rounding::beck_fiala::round(&panels, &continuous, config.panel_size, m)?;
            (uniform, diagnostics::RoundingDiagnostics::default())
        }
        Rounder::Pipage => {
            let uniform = rounding::pipage::round(&panels, &continuous, m, config.pipage_seed);
            (uniform, diagnostics::RoundingDiagnostics::default())
        }
        Rounder::MinimaxChange => {
            let targets = continuous.marginals(pool.len());
            rounding::minimax::round(&panels, &covered_vec, &targets, m)?
        }
    };

    Ok((
        uniform,
        RunDiagnostics {
            solver: solver_diag,
            rounding: rounding_diag,
        },
    ))
}

fn covered_from_distribution(dist: &Distribution, n: usize) -> HashSet<usize> {
    let mut covered = HashSet::new();
    for panel in &dist.panels {
        for i in 0..n {
            if panel.contains(i) {
                covered.insert(i);
            }
        }
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn symmetric_pool() -> Pool {
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
    fn scenario_1_maximin_gives_half_marginals() {
        let pool = symmetric_pool();
        let config = RunConfig::new(2, 10, Objective::Maximin, Rounder::OptIlp, 1);
        let (uniform, _diag) = run(&pool, &config).unwrap();
        assert_eq!(uniform.total_multiplicity(), 10);
        for i in 0..4 {
            assert!((uniform.marginal(i) - 0.5).abs() < 0.2);
        }
    }

    #[test]
    fn scenario_4_reports_infeasible_quotas() {
        let feature = Feature {
            name: "color".into(),
            quotas: BTreeMap::from([("red".to_string(), Quota::new(0, 2))]),
        };
        let respondents = vec![mk("1", "red"), mk("2", "red")];
        let pool = Pool::new(respondents, vec![feature]).unwrap();
        let config = RunConfig::new(3, 10, Objective::Maximin, Rounder::OptIlp, 1);
        let err = run(&pool, &config).unwrap_err();
        assert!(matches!(err, Error::InfeasibleQuotas { .. }));
    }
}
