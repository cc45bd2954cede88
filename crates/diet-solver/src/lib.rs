mod error;
mod problem;
mod simplex;
mod solution;

pub use error::SolverError;
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective, Sense, VarId, Variable};
pub use simplex::{LpSolver, SimplexSolver};
pub use solution::{Solution, SolutionStatus};
