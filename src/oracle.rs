//! Panel Oracle: the feasible-panel pricing subproblem every solver in
//! [`crate::solver`] calls into.
//!
//! The oracle owns one binary program — `Σx_i = k`, one quota constraint per
//! (feature, value) — and only ever replaces its objective row between
//! solves, avoiding a full model rebuild on every price call.

use crate::backend::highs_backend;
use crate::backend::{Model, Sense, SolveOptions, Status};
use crate::diagnostics::SeedDiagnostics;
use crate::error::{Error, Result};
use crate::linexpr::LinExpr;
use crate::panel::Panel;
use crate::respondent::Pool;

use std::collections::HashSet;

use tracing::{debug, info, warn};

/// An initialized oracle for a fixed pool, quota table and panel size `k`.
/// Construction itself proves feasibility.
pub struct PanelOracle<'a> {
    pool: &'a Pool,
    k: usize,
}

impl<'a> PanelOracle<'a> {
    /// Builds the oracle, returning `Err(Error::InfeasibleQuotas)` if no
    /// feasible panel of size `k` exists at all.
    pub fn init(pool: &'a Pool, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidPanelSize(k));
        }
        let oracle = PanelOracle { pool, k };
        let trivial_weights = vec![1.0; pool.len()];
        match oracle.best_panel(&trivial_weights) {
            Ok(_) => {
                info!(n = pool.len(), k, "panel oracle initialized");
                Ok(oracle)
            }
            Err(Error::InfeasibleQuotas { .. }) => {
                warn!(n = pool.len(), k, "quota table admits no feasible panel");
                Err(Error::InfeasibleQuotas { n: pool.len(), k })
            }
            Err(e) => Err(e),
        }
    }

    /// Builds the binary program's fixed constraint set and objective row for
    /// weights `w`, then solves it.
    pub fn best_panel(&self, w: &[f64]) -> Result<(Panel, f64)> {
        let n = self.pool.len();
        let mut model: Model<usize> = Model::new();
        for i in 0..n {
            model.add_binary_var(i);
        }

        let size_lhs = LinExpr::from_terms((0..n).map(|i| (i, 1.0)));
        model.add_constraint(size_lhs.eq(&LinExpr::constant(self.k as f64)));

        for (fi, feature) in self.pool.features().iter().enumerate() {
            for (vi, (_, quota)) in feature.quotas.iter().enumerate() {
                let bucket = self.pool.buckets(fi)[vi].clone();
                let count_expr = LinExpr::from_terms(bucket.into_iter().map(|i| (i, 1.0)));
                model.add_constraint(count_expr.geq(&LinExpr::constant(quota.min as f64)));
                model.add_constraint(count_expr.leq(&LinExpr::constant(quota.max as f64)));
            }
        }

        let objective = LinExpr::from_terms((0..n).map(|i| (i, w.get(i).copied().unwrap_or(0.0))));
        model.set_objective(objective, Sense::Maximize);

        let solution = highs_backend::solve(&model, SolveOptions::default())?;
        match solution.status {
            Status::Optimal => {
                let members: Vec<usize> = (0..n)
                    .filter(|&i| solution.value(i) > 0.5)
                    .collect();
                let panel = Panel::from_members(members);
                Ok((panel, solution.objective_value))
            }
            Status::Infeasible => Err(Error::InfeasibleQuotas { n, k: self.k }),
            other => Err(Error::BackendUnexpectedStatus(format!("{other:?}"))),
        }
    }

    /// Multiplicative-weights warm start: grows an initial panel set that
    /// covers as many respondents as possible before column generation
    /// begins.
    pub fn seed(&self, rounds: usize) -> Result<(Vec<Panel>, HashSet<usize>, SeedDiagnostics)> {
        let n = self.pool.len();
        let mut w = vec![1.0; n];
        let mut seen: HashSet<Panel> = HashSet::new();
        let mut panels: Vec<Panel> = Vec::new();
        let mut diagnostics = SeedDiagnostics::default();

        for _ in 0..rounds {
            diagnostics.rounds_run += 1;
            let (panel, _) = self.best_panel(&w)?;

            for &i in panel.members() {
                w[i] *= crate::config::SEED_DECAY;
            }
            let sum: f64 = w.iter().sum();
            if sum > 0.0 {
                let scale = n as f64 / sum;
                for wi in w.iter_mut() {
                    *wi *= scale;
                }
            }

            if seen.insert(panel.clone()) {
                panels.push(panel);
            } else {
                for wi in w.iter_mut() {
                    *wi = crate::config::SEED_SMOOTHING * *wi + (1.0 - crate::config::SEED_SMOOTHING);
                }
            }
        }
        diagnostics.panels_discovered = panels.len();
        debug!(panels = panels.len(), rounds, "seed walk discovered panels");

        let mut covered: HashSet<usize> = HashSet::new();
        for panel in &panels {
            for &m in panel.members() {
                covered.insert(m);
            }
        }

        for i in 0..n {
            if covered.contains(&i) {
                continue;
            }
            let mut indicator = vec![0.0; n];
            indicator[i] = 1.0;
            match self.best_panel(&indicator) {
                Ok((panel, _)) if panel.contains(i) => {
                    covered.insert(i);
                    if seen.insert(panel.clone()) {
                        panels.push(panel);
                    }
                }
                _ => {
                    diagnostics.uncovered.push(self.pool.id_at(i).clone());
                }
            }
        }

        if !diagnostics.uncovered.is_empty() {
            warn!(count = diagnostics.uncovered.len(), "respondents not in any feasible panel");
        }

        Ok((panels, covered, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn init_succeeds_on_feasible_instance() {
        let pool = toy_pool();
        assert!(PanelOracle::init(&pool, 2).is_ok());
    }

    #[test]
    fn init_reports_infeasible_quotas() {
        let pool = toy_pool();
        let err = PanelOracle::init(&pool, 3).unwrap_err();
        assert!(matches!(err, Error::InfeasibleQuotas { .. }));
    }

    #[test]
    fn best_panel_respects_quotas_and_size() {
        let pool = toy_pool();
        let oracle = PanelOracle::init(&pool, 2).unwrap();
        let (panel, _) = oracle.best_panel(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert!(panel.check_feasible(&pool, 2));
    }

    #[test]
    fn seed_covers_every_respondent_on_symmetric_instance() {
        let pool = toy_pool();
        let oracle = PanelOracle::init(&pool, 2).unwrap();
        let (panels, covered, diagnostics) = oracle.seed(8).unwrap();
        assert!(!panels.is_empty());
        assert_eq!(covered.len(), 4);
        assert!(diagnostics.uncovered.is_empty());
    }
}
