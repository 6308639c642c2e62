//! LP/MIP binding via the raw [`highs`] crate, for every solve in this crate
//! except the Nash convex subproblem.
//!
//! Builds a `highs::RowProblem` column-by-column from the model's variable
//! table (the objective coefficient is supplied at column-creation time, not
//! as a separate vector), translates each [`Constraint`] into a row, then
//! reads the incumbent back out by column position. Column values are read
//! from `get_solution()` unconditionally, which is what lets a time-limited
//! solve still report its best incumbent instead of losing it.

use std::collections::BTreeMap;

use highs::{HighsModelStatus, RowProblem, Sense as HighsSense};

use crate::backend::{Model, Sense, SolveOptions, Solution, Status, VarKind};
use crate::error::{Error, Result};
use crate::linexpr::{EqSymbol, VarId};

pub fn solve<V: VarId>(model: &Model<V>, opts: SolveOptions) -> Result<Solution<V>> {
    let objective_coeffs: BTreeMap<V, f64> = model.objective().coefficients().collect();

    let mut problem = RowProblem::default();
    let mut order: Vec<V> = Vec::new();
    let mut cols: BTreeMap<V, highs::Col> = BTreeMap::new();

    for (v, kind, bounds) in model.variables() {
        let cost = objective_coeffs.get(&v).copied().unwrap_or(0.0);
        let col = if matches!(kind, VarKind::Integer | VarKind::Binary) {
            problem.add_integer_column(cost, bounds.lb..=bounds.ub)
        } else {
            problem.add_column(cost, bounds.lb..=bounds.ub)
        };
        order.push(v);
        cols.insert(v, col);
    }

    for c in model.constraints() {
        let lhs = c.get_lhs();
        let constant = lhs.get_constant();
        let row_factors: Vec<(highs::Col, f64)> = lhs
            .coefficients()
            .map(|(v, coeff)| (cols[&v], coeff))
            .collect();
        match c.get_symbol() {
            EqSymbol::Equals => problem.add_row(-constant..=-constant, row_factors),
            EqSymbol::LessThan => problem.add_row(..=-constant, row_factors),
        }
    }

    let sense = match model.sense() {
        Sense::Minimize => HighsSense::Minimise,
        Sense::Maximize => HighsSense::Maximise,
    };

    let mut highs_model = match problem.try_optimise(sense) {
        Ok(m) => m,
        Err(_) => return Err(Error::BackendUnexpectedStatus("highs model build failed".into())),
    };
    highs_model.make_quiet();
    if let Some(secs) = opts.time_limit_secs {
        highs_model.set_option("time_limit", secs);
    }
    if let Some(gap) = opts.mip_gap {
        highs_model.set_option("mip_rel_gap", gap);
    }

    let solved = match highs_model.try_solve() {
        Ok(s) => s,
        Err(_) => return Err(Error::BackendUnexpectedStatus("highs solve failed".into())),
    };

    let status = solved.status();
    let read_values = || -> BTreeMap<V, f64> {
        let columns = solved.get_solution().columns().to_vec();
        order.iter().copied().zip(columns).collect()
    };

    let (status, values) = match status {
        HighsModelStatus::Optimal => (Status::Optimal, read_values()),
        HighsModelStatus::ReachedTimeLimit => (Status::TimeLimitReached, read_values()),
        HighsModelStatus::Infeasible => (Status::Infeasible, BTreeMap::new()),
        HighsModelStatus::Unbounded => (Status::Unbounded, BTreeMap::new()),
        other => return Err(Error::BackendUnexpectedStatus(format!("{other:?}"))),
    };

    let objective_value = match status {
        Status::Optimal | Status::TimeLimitReached => {
            model
                .objective()
                .coefficients()
                .map(|(v, c)| c * values.get(&v).copied().unwrap_or(0.0))
                .sum::<f64>()
                + model.objective().get_constant()
        }
        _ => f64::NAN,
    };

    Ok(Solution {
        status,
        objective_value,
        values,
    })
}
