//! Minimax-change rounding: the integer multiplicities whose
//! worst per-respondent deviation from a target marginal is smallest.

use crate::backend::highs_backend;
use crate::backend::{Model, Sense, SolveOptions, Status};
use crate::config::ROUNDING_TIME_LIMIT_SECS;
use crate::diagnostics::RoundingDiagnostics;
use crate::error::{Error, Result};
use crate::linexpr::LinExpr;
use crate::panel::{Panel, UniformDistribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Var {
    X(usize),
    U,
}

/// `target_marginals` is indexed by respondent id (dense pool index); only
/// entries in `covered` are constrained.
pub fn round(
    panels: &[Panel],
    covered: &[usize],
    target_marginals: &[f64],
    m: u64,
) -> Result<(UniformDistribution, RoundingDiagnostics)> {
    let m_f = m as f64;
    let mut model: Model<Var> = Model::new();
    for j in 0..panels.len() {
        model.add_integer_var(Var::X(j), 0.0, m_f);
    }
    model.add_continuous_var(Var::U, 0.0, m_f);

    let sum_x = LinExpr::from_terms((0..panels.len()).map(|j| (Var::X(j), 1.0)));
    model.add_constraint(sum_x.eq(&LinExpr::constant(m_f)));

    for &i in covered {
        let target = target_marginals.get(i).copied().unwrap_or(0.0) * m_f;
        let covering: Vec<usize> = (0..panels.len()).filter(|&j| panels[j].contains(i)).collect();
        let coverage = LinExpr::from_terms(covering.into_iter().map(|j| (Var::X(j), 1.0)));

        // -u <= target - coverage <= u
        let deviation = &LinExpr::constant(target) - &coverage;
        model.add_constraint(deviation.leq(&LinExpr::var(Var::U)));
        let neg_deviation = &LinExpr::constant(0.0) - &deviation;
        model.add_constraint(neg_deviation.leq(&LinExpr::var(Var::U)));
    }

    model.set_objective(LinExpr::var(Var::U), Sense::Minimize);
    let opts = SolveOptions {
        time_limit_secs: Some(ROUNDING_TIME_LIMIT_SECS as f64),
        mip_gap: None,
    };
    let solution = highs_backend::solve(&model, opts)?;

    let diagnostics = RoundingDiagnostics {
        time_limit_hit: matches!(solution.status, Status::TimeLimitReached),
        elapsed_secs: 0.0,
    };

    match solution.status {
        Status::Optimal | Status::TimeLimitReached => {
            let mult: Vec<u64> = (0..panels.len())
                .map(|j| solution.value(Var::X(j)).round().max(0.0) as u64)
                .collect();
            Ok((super::to_uniform_distribution(panels, mult, m), diagnostics))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("minimax rounding ILP: {other:?}"))),
    }
}
