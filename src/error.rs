//! Error taxonomy for the core.
//!
//! Most numerically-recoverable conditions are handled locally and never
//! surface as an `Err` — the leximin inner loop's numerical relaxation, the
//! Nash solver's fallback convex solve, and a rounder's time-limit expiry are
//! all absorbed by the algorithm and reported only through
//! [`crate::diagnostics`]. Only the genuinely unrecoverable cases below
//! propagate: malformed input, or a stage that cannot make the progress the
//! algorithm's complementary-slackness argument promises it should.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("quota specification admits no feasible panel of size {k} among {n} respondents")]
    InfeasibleQuotas { n: usize, k: usize },

    #[error("respondent pool is empty")]
    EmptyPool,

    #[error("feature {feature:?} value {value:?} has min quota {min} greater than max quota {max}")]
    InvalidQuota {
        feature: String,
        value: String,
        min: u32,
        max: u32,
    },

    #[error("respondent {0:?} has no value recorded for feature {1:?}")]
    MissingFeatureValue(String, String),

    #[error("panel size k={0} must be positive")]
    InvalidPanelSize(usize),

    #[error("uniform panel count M={0} must be positive")]
    InvalidUniformCount(usize),

    #[error("LP/ILP backend returned an unexpected status: {0}")]
    BackendUnexpectedStatus(String),

    #[error("convex backend failed numerically and no fallback solver is configured")]
    ConvexSolverExhausted,

    #[error("leximin stage {stage} converged with no respondent crossing the threshold ({fixed}/{covered} fixed so far)")]
    LeximinStalled {
        stage: usize,
        fixed: usize,
        covered: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
