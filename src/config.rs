//! Explicit run configuration: every parameter a solve needs is bundled
//! into one record passed into each entry point, rather than read from
//! process-wide state.

/// Which column-generation objective to optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Maximin,
    Leximin,
    Nash,
}

/// Which rounding routine turns a continuous distribution into a
/// uniform-over-`M` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounder {
    OptIlp,
    BeckFiala,
    Pipage,
    MinimaxChange,
}

/// LP-scale tolerance used throughout column generation.
pub const EPS: f64 = 5e-4;

/// Nash's looser KKT tolerance.
pub const EPS_NASH: f64 = 1.0;

/// Wall-clock budget for the maximin-variant and minimax-change optimal
/// rounders.
pub const ROUNDING_TIME_LIMIT_SECS: u64 = 1800;

/// Wall-clock budget for the Nash-variant optimal rounder.
pub const NASH_ROUNDING_TIME_LIMIT_SECS: u64 = 7200;

/// MIP gap target for the Nash-variant optimal rounder.
pub const NASH_ROUNDING_MIP_GAP: f64 = 5e-4;

/// Relative error tolerated by the piecewise-linear log approximation used
/// to model `log(u_i)` in the Nash-variant optimal rounder.
pub const NASH_LOG_APPROX_RELATIVE_ERROR: f64 = 1e-4;

/// Number of cheap reprice-and-scale updates attempted after each LP solve
/// in the maximin speed heuristic.
pub const MAXIMIN_SPEEDUP_ROUNDS: usize = 10;

/// Multiplicative-weight decay applied to panel members during the oracle's
/// seed procedure.
pub const SEED_DECAY: f64 = 0.8;

/// Smoothing factor applied toward uniform weight when the seed procedure
/// re-discovers an already-known panel.
pub const SEED_SMOOTHING: f64 = 0.9;

/// Per-round fixed-probability relaxation applied when the leximin dual
/// solve is non-optimal.
pub const LEXIMIN_RELAXATION_STEP: f64 = 1e-4;

/// Full run configuration threaded into every entry point: target panel
/// size, number of uniform panels, objective selector, rounder selector and
/// random seed, bundled into one record collected before any solve is
/// attempted.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub panel_size: usize,
    pub uniform_count: usize,
    pub objective: Objective,
    pub rounder: Rounder,
    pub pipage_seed: u64,
    pub eps: f64,
    pub eps_nash: f64,
}

impl RunConfig {
    pub fn new(
        panel_size: usize,
        uniform_count: usize,
        objective: Objective,
        rounder: Rounder,
        pipage_seed: u64,
    ) -> Self {
        RunConfig {
            panel_size,
            uniform_count,
            objective,
            rounder,
            pipage_seed,
            eps: EPS,
            eps_nash: EPS_NASH,
        }
    }
}
