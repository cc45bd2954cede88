use thiserror::Error;

/// Failures of the solver itself, as opposed to infeasible or unbounded problems
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Iteration limit reached after {iterations} pivots")]
    IterationLimit { iterations: usize },
    #[error("Invalid bounds on variable {variable}: [{lower}, {upper}]")]
    InvalidBound { variable: String, lower: f64, upper: f64 },
    #[error("Non-finite coefficient or right-hand side in {row}")]
    NonFinite { row: String },
    #[error("Constraint {row} references unknown variable #{index}")]
    UnknownVariable { row: String, index: usize },
}
