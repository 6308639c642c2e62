//! Exponential-cone binding for the Nash welfare subproblem: maximizes
//! `Σ log(marginal_i)` as a convex program rather than via the
//! piecewise-linear approximation used by the rounder of the same name.
//!
//! No LP backend in this crate has a cone-constraint DSL, so this talks to
//! [`clarabel`] directly: accumulate `(row, value)` pairs per column, convert
//! to CSC, hand `P`, `q`, `A`, `b` and a cone list to
//! `clarabel::solver::DefaultSolver`. On a numerically exhausted primary
//! solve, [`solve_nash_relaxation`] retries once against the same cone
//! program under a relaxed fallback configuration (loosened tolerances,
//! regularization enabled, a longer iteration budget) before giving up —
//! there being one convex solver in the dependency stack, an alternate
//! configuration stands in for an alternate solver.
//!
//! The program solved is
//! ```text
//! maximize   Σ_i t_i
//! subject to u = A λ            (A: respondent × panel incidence, 0/1)
//!            Σ_j λ_j = 1,  λ ≥ 0
//!            (t_i, 1, u_i) ∈ K_exp   for every respondent i
//! ```
//! where `K_exp` is Clarabel's exponential cone `{(x,y,z) : y·exp(x/y) ≤ z, y
//! > 0}`; fixing `y=1` makes the membership constraint `exp(t_i) ≤ u_i`, i.e.
//! `t_i ≤ log(u_i)`, so maximizing `Σ t_i` at the optimum drives every `t_i`
//! to exactly `log(u_i)`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use sprs::CsMat;

use crate::error::{Error, Result};

/// Result of the Nash relaxation: panel weights `λ` (length = number of
/// columns of `incidence`) and the achieved respondent marginals `u`.
pub struct NashSolution {
    pub lambdas: Vec<f64>,
    pub marginals: Vec<f64>,
}

/// Solves the Nash log-welfare relaxation over the panel set encoded by
/// `incidence` (rows = respondents, columns = panels, entry 1 iff the
/// respondent sits on that panel).
pub fn solve_nash_relaxation(incidence: &CsMat<f64>, time_limit_secs: f64) -> Result<NashSolution> {
    let n = incidence.rows();
    let j = incidence.cols();
    let n_var = j + n + n; // lambda, u, t
    let lambda_at = |col: usize| col;
    let u_at = |i: usize| j + i;
    let t_at = |i: usize| j + n + i;

    let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
    let mut b: Vec<f64> = Vec::new();
    let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

    // u_i - sum_{j: i in panel_j} lambda_j = 0
    for i in 0..n {
        let row = b.len();
        cols[u_at(i)].push((row, 1.0));
        b.push(0.0);
    }
    // incidence is respondent-major (CSR); walk it row by row so each nonzero
    // (respondent i, panel col) contributes -1 to row i's lambda_col entry.
    for (i, row) in incidence.outer_iterator().enumerate() {
        for (panel_col, &val) in row.iter() {
            if val != 0.0 {
                cols[lambda_at(panel_col)].push((i, -1.0));
            }
        }
    }
    cones.push(SupportedConeT::ZeroConeT(n));

    // sum_j lambda_j = 1
    {
        let row = b.len();
        for col in 0..j {
            cols[lambda_at(col)].push((row, 1.0));
        }
        b.push(1.0);
    }
    cones.push(SupportedConeT::ZeroConeT(1));

    // lambda_j >= 0, encoded as s = lambda_j in the nonnegative cone
    for col in 0..j {
        let row = b.len();
        cols[lambda_at(col)].push((row, -1.0));
        b.push(0.0);
    }
    cones.push(SupportedConeT::NonnegativeConeT(j));

    // (t_i, 1, u_i) in K_exp for each respondent
    for i in 0..n {
        let row = b.len();
        cols[t_at(i)].push((row, -1.0));
        b.push(0.0);
        b.push(1.0);
        cols[u_at(i)].push((row + 2, -1.0));
        b.push(0.0);
        cones.push(SupportedConeT::ExponentialConeT());
    }

    let n_rows = b.len();
    let mut col_ptr = Vec::with_capacity(n_var + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    let mut nnz = 0usize;
    for col in cols.iter_mut() {
        col_ptr.push(nnz);
        col.sort_by_key(|(r, _)| *r);
        for &(r, v) in col.iter() {
            row_idx.push(r);
            values.push(v);
            nnz += 1;
        }
    }
    col_ptr.push(nnz);

    let a_mat = CscMatrix::new(n_rows, n_var, col_ptr, row_idx, values);
    let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());

    let mut q = vec![0.0; n_var];
    for i in 0..n {
        q[t_at(i)] = -1.0; // minimize -sum t_i == maximize sum t_i
    }

    let primary = DefaultSettingsBuilder::default()
        .verbose(false)
        .time_limit(time_limit_secs)
        .build()
        .map_err(|e| Error::BackendUnexpectedStatus(format!("clarabel settings: {e:?}")))?;

    if let Some(solution) = try_solve(&p_mat, &q, &a_mat, &b, &cones, primary, j, n, lambda_at, u_at)? {
        return Ok(solution);
    }

    // Primary configuration reported a numerically exhausted solve; retry
    // once with loosened tolerances, regularization enabled and a longer
    // iteration budget before surfacing the failure.
    let fallback = DefaultSettingsBuilder::default()
        .verbose(false)
        .time_limit(time_limit_secs * 4.0)
        .max_iter(400)
        .tol_gap_abs(1e-6)
        .tol_gap_rel(1e-6)
        .tol_feas(1e-6)
        .static_regularization_enable(true)
        .build()
        .map_err(|e| Error::BackendUnexpectedStatus(format!("clarabel fallback settings: {e:?}")))?;

    try_solve(&p_mat, &q, &a_mat, &b, &cones, fallback, j, n, lambda_at, u_at)?
        .ok_or(Error::ConvexSolverExhausted)
}

#[allow(clippy::too_many_arguments)]
fn try_solve(
    p_mat: &CscMatrix<f64>,
    q: &[f64],
    a_mat: &CscMatrix<f64>,
    b: &[f64],
    cones: &[SupportedConeT<f64>],
    settings: clarabel::solver::DefaultSettings<f64>,
    j: usize,
    n: usize,
    lambda_at: impl Fn(usize) -> usize,
    u_at: impl Fn(usize) -> usize,
) -> Result<Option<NashSolution>> {
    let mut solver = DefaultSolver::new(p_mat, q, a_mat, b, cones, settings)
        .map_err(|e| Error::BackendUnexpectedStatus(format!("clarabel init: {e:?}")))?;
    solver.solve();

    let sol = &solver.solution;
    if !matches!(sol.status, SolverStatus::Solved | SolverStatus::AlmostSolved) {
        return Ok(None);
    }

    let lambdas: Vec<f64> = (0..j).map(|c| sol.x[lambda_at(c)].max(0.0)).collect();
    let marginals: Vec<f64> = (0..n).map(|i| sol.x[u_at(i)]).collect();
    Ok(Some(NashSolution { lambdas, marginals }))
}
