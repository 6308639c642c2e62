//! Diagnostic records with no semantic role. Callers may log or discard these
//! freely; no solver or rounder branches on their content.

use crate::respondent::RespondentId;

#[derive(Debug, Clone, Default)]
pub struct SeedDiagnostics {
    pub rounds_run: usize,
    pub panels_discovered: usize,
    /// Respondents the seed procedure could not place in any feasible
    /// panel, even when directly maximizing their own inclusion.
    pub uncovered: Vec<RespondentId>,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnGenerationDiagnostics {
    pub iterations: usize,
    pub panels_added: usize,
    pub final_gap: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LeximinDiagnostics {
    pub stages: usize,
    pub relaxations: usize,
    pub per_stage: Vec<ColumnGenerationDiagnostics>,
}

#[derive(Debug, Clone, Default)]
pub struct RoundingDiagnostics {
    pub time_limit_hit: bool,
    pub elapsed_secs: f64,
}

/// Which column-generation solver ran, carrying that solver's own
/// diagnostics.
#[derive(Debug, Clone)]
pub enum SolverDiagnostics {
    Maximin(ColumnGenerationDiagnostics),
    Leximin(LeximinDiagnostics),
    Nash(ColumnGenerationDiagnostics),
}

/// Full diagnostics for one end-to-end run: solver stage plus rounding
/// stage. Carries no semantic role, as with every other record in this
/// module.
#[derive(Debug, Clone)]
pub struct RunDiagnostics {
    pub solver: SolverDiagnostics,
    pub rounding: RoundingDiagnostics,
}
