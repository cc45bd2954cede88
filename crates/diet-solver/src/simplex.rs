use tracing::debug;

use crate::error::SolverError;
use crate::problem::{ConstraintOp, LpProblem, Sense};
use crate::solution::{Solution, SolutionStatus};

/// Anything that can solve an [`LpProblem`]
pub trait LpSolver {
    fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverError>;
}

/// Consecutive degenerate pivots allowed before switching to Bland's rule
const DEGENERATE_PIVOT_LIMIT: usize = 50;

/// Simplex solver for linear programming problems
#[derive(Debug, Clone)]
pub struct SimplexSolver {
    /// Maximum pivots (both phases) before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
        }
    }
}

impl LpSolver for SimplexSolver {
    /// Solve the LP problem using the two-phase simplex method
    fn solve(&self, problem: &LpProblem) -> Result<Solution, SolverError> {
        self.check(problem)?;

        if let Some(v) = problem
            .variables()
            .iter()
            .find(|v| v.lower > v.upper + self.tolerance)
        {
            debug!(variable = %v.name, lower = v.lower, upper = v.upper, "crossed bounds");
            return Ok(Solution::infeasible());
        }

        let rows = self.standard_rows(problem);
        let mut tableau = Tableau::new(problem, &rows);
        let mut iterations = 0;

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            let feasible = self.phase1(&mut tableau, &rows, &mut iterations)?;
            debug!(iterations, feasible, "phase 1 finished");
            if !feasible {
                return Ok(Solution::infeasible().with_iterations(iterations));
            }
        }

        // Phase 2: Optimize
        let exclude_from = tableau.artificial_start();
        let result = self.iterate(&mut tableau, exclude_from, &mut iterations)?;
        debug!(iterations, "phase 2 finished");
        match result {
            SimplexResult::Optimal => Ok(self.extract_solution(&tableau, problem, iterations)),
            SimplexResult::Unbounded => Ok(Solution::unbounded().with_iterations(iterations)),
        }
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Reject problems the tableau cannot represent
    fn check(&self, problem: &LpProblem) -> Result<(), SolverError> {
        for v in problem.variables() {
            if !(v.lower.is_finite() && v.lower >= 0.0) || v.upper.is_nan() {
                return Err(SolverError::InvalidBound {
                    variable: v.name.clone(),
                    lower: v.lower,
                    upper: v.upper,
                });
            }
        }

        if problem.objective.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(SolverError::NonFinite {
                row: "objective".to_string(),
            });
        }

        let n = problem.num_variables();
        for c in &problem.constraints {
            if !c.rhs.is_finite() {
                return Err(SolverError::NonFinite { row: c.name.clone() });
            }
            for &(var, coef) in &c.terms {
                if var.index() >= n {
                    return Err(SolverError::UnknownVariable {
                        row: c.name.clone(),
                        index: var.index(),
                    });
                }
                if !coef.is_finite() {
                    return Err(SolverError::NonFinite { row: c.name.clone() });
                }
            }
        }

        Ok(())
    }

    /// Lower constraints and variable bounds to dense rows with non-negative right-hand sides
    fn standard_rows(&self, problem: &LpProblem) -> Vec<Row> {
        let n = problem.num_variables();
        let mut rows = Vec::with_capacity(problem.num_constraints() + n);

        for c in &problem.constraints {
            let mut coefficients = vec![0.0; n];
            for &(var, coef) in &c.terms {
                coefficients[var.index()] += coef;
            }
            rows.push(Row::normalized(coefficients, c.op, c.rhs));
        }

        for (j, v) in problem.variables().iter().enumerate() {
            if v.lower > 0.0 {
                let mut coefficients = vec![0.0; n];
                coefficients[j] = 1.0;
                rows.push(Row::normalized(coefficients, ConstraintOp::Ge, v.lower));
            }
            if v.upper.is_finite() {
                let mut coefficients = vec![0.0; n];
                coefficients[j] = 1.0;
                rows.push(Row::normalized(coefficients, ConstraintOp::Le, v.upper));
            }
        }

        rows
    }

    fn phase1(
        &self,
        tableau: &mut Tableau,
        rows: &[Row],
        iterations: &mut usize,
    ) -> Result<bool, SolverError> {
        let n_constraints = tableau.n_constraints();
        let n_cols = tableau.n_cols();
        let rhs_col = n_cols - 1;
        let art_start = tableau.artificial_start();

        // Auxiliary objective: maximize -sum(artificials)
        let orig_obj = std::mem::replace(&mut tableau.data[n_constraints], vec![0.0; n_cols]);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    let v = tableau.data[i][j];
                    tableau.data[n_constraints][j] += v;
                }
            }
        }

        if let SimplexResult::Unbounded = self.iterate(tableau, rhs_col, iterations)? {
            // The auxiliary objective is bounded by zero
            return Ok(false);
        }

        let scale = 1.0 + rows.iter().map(|r| r.rhs).fold(0.0, f64::max);
        let infeasibility: f64 = (0..n_constraints)
            .filter(|&i| tableau.basic_vars[i] >= art_start)
            .map(|i| tableau.data[i][rhs_col])
            .sum();
        if infeasibility > self.tolerance * scale {
            debug!(infeasibility, "artificials remain positive");
            return Ok(false);
        }

        // Drive zero-level artificials out of the basis
        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let candidate = (0..art_start)
                .filter(|&j| tableau.data[i][j].abs() > self.tolerance)
                .max_by(|&a, &b| {
                    tableau.data[i][a]
                        .abs()
                        .total_cmp(&tableau.data[i][b].abs())
                });
            // No candidate means the row is redundant; its artificial stays basic at zero
            if let Some(col) = candidate {
                tableau.pivot(i, col);
            }
        }

        // Restore original objective and adjust for basic variables
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio != 0.0 {
                for j in 0..n_cols {
                    let v = tableau.data[i][j];
                    tableau.data[n_constraints][j] -= ratio * v;
                }
            }
        }

        Ok(true)
    }

    /// Pivot until no column below `exclude_from` can improve the objective row
    fn iterate(
        &self,
        tableau: &mut Tableau,
        exclude_from: usize,
        iterations: &mut usize,
    ) -> Result<SimplexResult, SolverError> {
        let rhs_col = tableau.n_cols() - 1;
        let mut degenerate_run = 0;

        loop {
            let rule = if degenerate_run >= DEGENERATE_PIVOT_LIMIT {
                PivotRule::Bland
            } else {
                PivotRule::Dantzig
            };

            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from, rule) else {
                return Ok(SimplexResult::Optimal);
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return Ok(SimplexResult::Unbounded);
            };

            if *iterations >= self.max_iterations {
                return Err(SolverError::IterationLimit {
                    iterations: *iterations,
                });
            }

            if tableau.data[pivot_row][rhs_col] <= self.tolerance {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }

            tableau.pivot(pivot_row, pivot_col);
            *iterations += 1;
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize, rule: PivotRule) -> Option<usize> {
        let obj = &tableau.data[tableau.n_constraints()];
        let mut candidates = (0..exclude_from).filter(|&j| obj[j] > self.tolerance);

        match rule {
            // Most positive reduced cost
            PivotRule::Dantzig => candidates.max_by(|&a, &b| obj[a].total_cmp(&obj[b])),
            // Lowest improving index
            PivotRule::Bland => candidates.next(),
        }
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.n_cols() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..tableau.n_constraints() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(r) if (ratio - min_ratio).abs() <= self.tolerance => {
                    tableau.basic_vars[i] < tableau.basic_vars[r]
                }
                Some(_) => ratio < min_ratio,
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem, iterations: usize) -> Solution {
        let n_vars = problem.num_variables();
        let rhs_col = tableau.n_cols() - 1;

        let mut values = vec![0.0; n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < n_vars {
                values[basic] = tableau.data[i][rhs_col].max(0.0);
            }
        }

        let objective_value = problem.evaluate_objective(&values);

        Solution {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            iterations,
        }
    }
}

/// A dense constraint row with `rhs >= 0`
struct Row {
    coefficients: Vec<f64>,
    op: ConstraintOp,
    rhs: f64,
}

impl Row {
    fn normalized(mut coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) -> Self {
        if rhs < 0.0 {
            coefficients.iter_mut().for_each(|c| *c = -*c);
            Self {
                coefficients,
                op: op.flipped(),
                rhs: -rhs,
            }
        } else {
            Self { coefficients, op, rhs }
        }
    }
}

/// Columns: structural, slack/surplus, artificial, RHS. The last row holds reduced costs.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn new(problem: &LpProblem, rows: &[Row]) -> Self {
        let n_vars = problem.num_variables();
        let n_slack = rows.iter().filter(|r| r.op != ConstraintOp::Eq).count();
        let n_artificial = rows.iter().filter(|r| r.op != ConstraintOp::Le).count();
        let total_cols = n_vars + n_slack + n_artificial + 1;

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; rows.len() + 1],
            basic_vars: vec![0; rows.len()],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, row) in rows.iter().enumerate() {
            tableau.data[i][..n_vars].copy_from_slice(&row.coefficients);
            tableau.data[i][total_cols - 1] = row.rhs;

            match row.op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Pivoting maximizes, so a minimization stores -c
        let obj_row = rows.len();
        for (j, &coef) in problem.objective.coefficients.iter().enumerate() {
            tableau.data[obj_row][j] = match problem.objective.sense {
                Sense::Minimize => -coef,
                Sense::Maximize => coef,
            };
        }

        tableau
    }

    fn n_constraints(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    fn artificial_start(&self) -> usize {
        self.n_vars + self.n_slack
    }

    fn pivot(&mut self, row: usize, col: usize) {
        self.basic_vars[row] = col;

        let pivot_val = self.data[row][col];
        for v in self.data[row].iter_mut() {
            *v /= pivot_val;
        }

        let pivot_row = self.data[row].clone();
        for (i, r) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor != 0.0 {
                for (v, p) in r.iter_mut().zip(&pivot_row) {
                    *v -= factor * p;
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum PivotRule {
    Dantzig,
    Bland,
}

enum SimplexResult {
    Optimal,
    Unbounded,
}
