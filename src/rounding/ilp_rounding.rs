//! Optimal ILP rounders: re-solve directly over the
//! panel set for the best integer distribution, time-bounded.

use crate::backend::highs_backend;
use crate::backend::{Model, Sense, SolveOptions, Status};
use crate::config::{
    NASH_LOG_APPROX_RELATIVE_ERROR, NASH_ROUNDING_MIP_GAP, NASH_ROUNDING_TIME_LIMIT_SECS,
    ROUNDING_TIME_LIMIT_SECS,
};
use crate::diagnostics::RoundingDiagnostics;
use crate::error::{Error, Result};
use crate::linexpr::LinExpr;
use crate::panel::{Panel, UniformDistribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum MaximinVar {
    X(usize),
    L,
}

/// Maximin-variant optimal ILP rounding: `x_j ∈ ℕ`, `Σx_j = M`,
/// `ℓ ≤ Σ_{j:i∈P_j} x_j` per covered respondent, maximize `ℓ`.
pub fn round_maximin(panels: &[Panel], covered: &[usize], m: u64) -> Result<(UniformDistribution, RoundingDiagnostics)> {
    let mut model: Model<MaximinVar> = Model::new();
    for j in 0..panels.len() {
        model.add_integer_var(MaximinVar::X(j), 0.0, m as f64);
    }
    model.add_integer_var(MaximinVar::L, 0.0, m as f64);

    let sum_x = LinExpr::from_terms((0..panels.len()).map(|j| (MaximinVar::X(j), 1.0)));
    model.add_constraint(sum_x.eq(&LinExpr::constant(m as f64)));

    for &i in covered {
        let covering: Vec<usize> = (0..panels.len()).filter(|&j| panels[j].contains(i)).collect();
        let coverage = LinExpr::from_terms(covering.into_iter().map(|j| (MaximinVar::X(j), 1.0)));
        model.add_constraint(LinExpr::var(MaximinVar::L).leq(&coverage));
    }

    model.set_objective(LinExpr::var(MaximinVar::L), Sense::Maximize);
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
                .map(|j| solution.value(MaximinVar::X(j)).round().max(0.0) as u64)
                .collect();
            Ok((super::to_uniform_distribution(panels, mult, m), diagnostics))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("maximin rounding ILP: {other:?}"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum NashVar {
    X(usize),
    U(usize),
    LogU(usize),
}

/// Nash-variant optimal ILP rounding: as [`round_maximin`] but
/// maximizing `Σ log(u_i)` for integer utilities `u_i = Σ_{j:i∈P_j} x_j`,
/// with `log` modeled by tangent-line cuts (log is concave, so every tangent
/// is a global upper bound; tightening the grid of tangent points drives the
/// gap below [`NASH_LOG_APPROX_RELATIVE_ERROR`]).
pub fn round_nash(panels: &[Panel], covered: &[usize], m: u64) -> Result<(UniformDistribution, RoundingDiagnostics)> {
    let mut model: Model<NashVar> = Model::new();
    for j in 0..panels.len() {
        model.add_integer_var(NashVar::X(j), 0.0, m as f64);
    }
    for &i in covered {
        model.add_integer_var(NashVar::U(i), 0.0, m as f64);
        model.add_continuous_var(NashVar::LogU(i), f64::NEG_INFINITY, (m as f64).ln());
    }

    let sum_x = LinExpr::from_terms((0..panels.len()).map(|j| (NashVar::X(j), 1.0)));
    model.add_constraint(sum_x.eq(&LinExpr::constant(m as f64)));

    for &i in covered {
        let covering: Vec<usize> = (0..panels.len()).filter(|&j| panels[j].contains(i)).collect();
        let coverage = LinExpr::from_terms(covering.into_iter().map(|j| (NashVar::X(j), 1.0)));
        model.add_constraint(LinExpr::var(NashVar::U(i)).eq(&coverage));

        for cut in log_tangent_cuts(NashVar::U(i), NashVar::LogU(i), m) {
            model.add_constraint(cut);
        }
    }

    let objective = LinExpr::from_terms(covered.iter().map(|&i| (NashVar::LogU(i), 1.0)));
    model.set_objective(objective, Sense::Maximize);

    let opts = SolveOptions {
        time_limit_secs: Some(NASH_ROUNDING_TIME_LIMIT_SECS as f64),
        mip_gap: Some(NASH_ROUNDING_MIP_GAP),
    };
    let solution = highs_backend::solve(&model, opts)?;

    let diagnostics = RoundingDiagnostics {
        time_limit_hit: matches!(solution.status, Status::TimeLimitReached),
        elapsed_secs: 0.0,
    };

    match solution.status {
        Status::Optimal | Status::TimeLimitReached => {
            let mult: Vec<u64> = (0..panels.len())
                .map(|j| solution.value(NashVar::X(j)).round().max(0.0) as u64)
                .collect();
            Ok((super::to_uniform_distribution(panels, mult, m), diagnostics))
        }
        other => Err(Error::BackendUnexpectedStatus(format!("nash rounding ILP: {other:?}"))),
    }
}

/// Geometrically spaced tangent points in `[1, m]`; the relative error of a
/// concave tangent-line outer approximation shrinks with the point count, so
/// the count below is chosen generously relative to
/// [`NASH_LOG_APPROX_RELATIVE_ERROR`] rather than solved for exactly.
fn log_tangent_cuts<V: crate::linexpr::VarId>(u_var: V, log_var: V, m: u64) -> Vec<crate::linexpr::Constraint<V>> {
    let point_count = ((1.0 / NASH_LOG_APPROX_RELATIVE_ERROR).sqrt().ceil() as usize)
        .clamp(8, 128)
        .min((m as usize).max(1));
    let m = m as f64;
    (0..point_count)
        .map(|k| {
            let t = k as f64 / (point_count - 1).max(1) as f64;
            let u0 = (1.0 * (m / 1.0).powf(t)).max(1.0);
            // log_var <= ln(u0) + (u_var - u0)/u0
            let rhs = &LinExpr::constant(u0.ln() - 1.0) + &(1.0 / u0 * &LinExpr::var(u_var));
            LinExpr::var(log_var).leq(&rhs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::Panel;

    #[test]
    fn maximin_rounding_preserves_symmetric_marginals() {
        let panels = vec![
            Panel::from_members(vec![0, 2]),
            Panel::from_members(vec![0, 3]),
            Panel::from_members(vec![1, 2]),
            Panel::from_members(vec![1, 3]),
        ];
        let covered = vec![0, 1, 2, 3];
        let (dist, _diag) = round_maximin(&panels, &covered, 10).unwrap();
        assert_eq!(dist.total_multiplicity(), 10);
        for i in 0..4 {
            assert!((dist.marginal(i) - 0.5).abs() < 0.15);
        }
    }
}
