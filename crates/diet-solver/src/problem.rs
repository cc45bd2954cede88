/// Handle to a variable of an [`LpProblem`]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A continuous decision variable with simple bounds
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// Lower bound, must be finite and non-negative
    pub lower: f64,
    /// Upper bound, `f64::INFINITY` when unbounded
    pub upper: f64,
}

/// Represents a linear programming problem
#[derive(Debug, Clone, Default)]
pub struct LpProblem {
    variables: Vec<Variable>,
    /// Objective function
    pub objective: Objective,
    /// Constraints, in insertion order
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Default)]
pub struct Objective {
    /// Dense coefficients, one per variable
    pub coefficients: Vec<f64>,
    pub sense: Sense,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Sparse left-hand side
    pub terms: Vec<(VarId, f64)>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    /// The operator obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl Constraint {
    /// Evaluate the left-hand side at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * values.get(var.index()).copied().unwrap_or(0.0))
            .sum()
    }

    /// Whether `values` satisfy this constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + tolerance,
            ConstraintOp::Ge => lhs >= self.rhs - tolerance,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

impl LpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable bounded by `[lower, upper]` and return its handle
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
        });
        self.objective.coefficients.push(0.0);
        id
    }

    /// Replace the objective. Repeated terms for the same variable are summed.
    pub fn set_objective(&mut self, terms: impl IntoIterator<Item = (VarId, f64)>, sense: Sense) {
        let mut coefficients = vec![0.0; self.variables.len()];
        for (var, coef) in terms {
            if let Some(c) = coefficients.get_mut(var.index()) {
                *c += coef;
            }
        }
        self.objective = Objective { coefficients, sense };
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        op: ConstraintOp,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            op,
            rhs,
        });
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value at `values`
    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(c, x)| c * x)
            .sum()
    }
}
