use std::collections::HashSet;
use std::fmt;

use diet_solver::{ConstraintOp, LpProblem, LpSolver, Sense, Solution, SolutionStatus, VarId};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::error::{DietError, ValidationError};

/// Name of the dairy constraint added after the first solve
pub const DAIRY_LIMIT_NAME: &str = "limit_dairy";
/// Foods counted by the dairy limit
pub const DAIRY_FOODS: [&str; 2] = ["milk", "ice cream"];
/// Default cap on total dairy servings
pub const DAIRY_LIMIT: f64 = 10.0;

/// Lifecycle of a [`DietModel`]. An unbuilt model is simply one that does not exist yet.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Variables, objective and balance rows exist; never solved
    Built,
    /// The stored solution matches the current constraint set
    Solved,
    /// Constraints were appended after the last solve; stored values are stale
    Modified,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelState::Built => "built",
            ModelState::Solved => "solved",
            ModelState::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// The diet LP together with its last solution
#[derive(Debug, Clone)]
pub struct DietModel {
    dataset: Dataset,
    problem: LpProblem,
    /// Achieved total per category, parallel to `dataset.categories`
    nutrition: Vec<VarId>,
    /// Servings bought per food, parallel to `dataset.foods`
    buy: Vec<VarId>,
    constraint_names: HashSet<String>,
    state: ModelState,
    solution: Option<Solution>,
}

impl DietModel {
    /// Validate `dataset` and build variables, the cost objective and one balance row per category
    pub fn build(dataset: Dataset) -> Result<Self, DietError> {
        dataset.validate()?;

        let mut problem = LpProblem::new();

        let nutrition: Vec<VarId> = dataset
            .categories
            .iter()
            .map(|c| problem.add_variable(format!("nutrition[{}]", c.name), c.min, c.max))
            .collect();

        let buy: Vec<VarId> = dataset
            .foods
            .iter()
            .map(|f| problem.add_variable(format!("buy[{}]", f.name), 0.0, f64::INFINITY))
            .collect();

        problem.set_objective(
            dataset.foods.iter().zip(&buy).map(|(f, &var)| (var, f.cost)),
            Sense::Minimize,
        );

        let mut model = Self {
            dataset,
            problem,
            nutrition,
            buy,
            constraint_names: HashSet::new(),
            state: ModelState::Built,
            solution: None,
        };

        // sum_f value(f, c) * buy[f] - nutrition[c] = 0
        for (ci, category) in model.dataset.categories.iter().enumerate() {
            let mut terms: Vec<(VarId, f64)> = model
                .dataset
                .foods
                .iter()
                .zip(&model.buy)
                .filter_map(|(f, &var)| {
                    let amount = model.dataset.nutrition.get(&f.name, &category.name)?;
                    (amount != 0.0).then_some((var, amount))
                })
                .collect();
            terms.push((model.nutrition[ci], -1.0));

            if !model.constraint_names.insert(category.name.clone()) {
                return Err(ValidationError::DuplicateConstraint(category.name.clone()).into());
            }
            model
                .problem
                .add_constraint(category.name.clone(), terms, ConstraintOp::Eq, 0.0);
        }

        info!(
            categories = model.nutrition.len(),
            foods = model.buy.len(),
            constraints = model.problem.num_constraints(),
            "diet model built"
        );

        Ok(model)
    }

    /// Solve the current model. Infeasible and unbounded outcomes are statuses, not errors.
    ///
    /// On a solver failure the state and any previous solution are left untouched.
    pub fn optimize<S: LpSolver + ?Sized>(&mut self, solver: &S) -> Result<SolutionStatus, DietError> {
        let solution = solver.solve(&self.problem)?;
        let status = solution.status;

        match status {
            SolutionStatus::Optimal => info!(
                objective = solution.objective_value,
                iterations = solution.iterations,
                constraints = self.problem.num_constraints(),
                "solved"
            ),
            _ => warn!(%status, iterations = solution.iterations, "no optimal solution"),
        }

        self.solution = Some(solution);
        self.state = ModelState::Solved;
        Ok(status)
    }

    /// Append a linear constraint. Existing variables, bounds and constraints are never touched.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), DietError> {
        let name = name.into();
        if self.constraint_names.contains(&name) {
            return Err(ValidationError::DuplicateConstraint(name).into());
        }
        if let Some(&(var, _)) = terms
            .iter()
            .find(|(var, _)| self.problem.variable(*var).is_none())
        {
            return Err(ValidationError::UnknownVariable(var.index()).into());
        }

        info!(constraint = %name, ?op, rhs, "constraint added");
        self.constraint_names.insert(name.clone());
        self.problem.add_constraint(name, terms, op, rhs);

        if self.state == ModelState::Solved {
            self.state = ModelState::Modified;
        }
        Ok(())
    }

    /// Cap the total servings of `foods` at `limit`
    pub fn add_food_limit(&mut self, name: &str, foods: &[&str], limit: f64) -> Result<(), DietError> {
        let terms = foods
            .iter()
            .map(|&food| {
                self.buy_var(food)
                    .map(|var| (var, 1.0))
                    .ok_or_else(|| ValidationError::UnknownFood(food.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.add_constraint(name, terms, ConstraintOp::Le, limit)
    }

    /// The dairy constraint: milk plus ice cream at most `limit` servings
    pub fn add_dairy_limit(&mut self, limit: f64) -> Result<(), DietError> {
        self.add_food_limit(DAIRY_LIMIT_NAME, &DAIRY_FOODS, limit)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn problem(&self) -> &LpProblem {
        &self.problem
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Status of the last solve, `None` if never solved
    pub fn status(&self) -> Option<SolutionStatus> {
        self.solution.as_ref().map(|s| s.status)
    }

    pub fn buy_var(&self, food: &str) -> Option<VarId> {
        let idx = self.dataset.foods.iter().position(|f| f.name == food)?;
        Some(self.buy[idx])
    }

    pub fn nutrition_var(&self, category: &str) -> Option<VarId> {
        let idx = self.dataset.categories.iter().position(|c| c.name == category)?;
        Some(self.nutrition[idx])
    }

    /// The solution matching the current constraint set
    pub fn current_solution(&self) -> Result<&Solution, DietError> {
        match (&self.solution, self.state) {
            (Some(solution), ModelState::Solved) => Ok(solution),
            _ => Err(DietError::NotSolved { state: self.state }),
        }
    }

    /// Optimal cost, or `None` when the last solve found no solution
    pub fn objective_value(&self) -> Result<Option<f64>, DietError> {
        let solution = self.current_solution()?;
        Ok(solution.is_optimal().then_some(solution.objective_value))
    }

    /// Servings of `food` in the current solution
    pub fn buy(&self, food: &str) -> Result<Option<f64>, DietError> {
        let var = self
            .buy_var(food)
            .ok_or_else(|| ValidationError::UnknownFood(food.to_string()))?;
        Ok(self.current_solution()?.value(var))
    }

    /// Achieved total of `category` in the current solution
    pub fn nutrition(&self, category: &str) -> Result<Option<f64>, DietError> {
        let var = self
            .nutrition_var(category)
            .ok_or_else(|| ValidationError::UnknownCategory(category.to_string()))?;
        Ok(self.current_solution()?.value(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diet_solver::{SimplexSolver, SolverError};

    const TOL: f64 = 1e-6;

    fn solved_classic() -> DietModel {
        let mut model = DietModel::build(Dataset::classic()).unwrap();
        let status = model.optimize(&SimplexSolver::new()).unwrap();
        assert_eq!(status, SolutionStatus::Optimal);
        model
    }

    struct FailingSolver;

    impl LpSolver for FailingSolver {
        fn solve(&self, _problem: &LpProblem) -> Result<Solution, SolverError> {
            Err(SolverError::IterationLimit { iterations: 3 })
        }
    }

    #[test]
    fn test_build_structure() {
        let model = DietModel::build(Dataset::classic()).unwrap();

        assert_eq!(model.state(), ModelState::Built);
        assert_eq!(model.status(), None);
        assert_eq!(model.problem().num_variables(), 13);
        assert_eq!(model.problem().num_constraints(), 4);

        let protein = model.nutrition_var("protein").unwrap();
        let bounds = model.problem().variable(protein).unwrap();
        assert_eq!((bounds.lower, bounds.upper), (91.0, f64::INFINITY));

        let milk = model.buy_var("milk").unwrap();
        assert_eq!(model.problem().objective.coefficients[milk.index()], 0.89);
        assert_eq!(model.problem().objective.coefficients[protein.index()], 0.0);
    }

    #[test]
    fn test_classic_optimum() {
        let model = solved_classic();

        let cost = model.objective_value().unwrap().unwrap();
        assert!((cost - 11.828861).abs() < TOL, "cost = {}", cost);

        assert!((model.buy("hamburger").unwrap().unwrap() - 0.604514).abs() < TOL);
        assert!((model.buy("milk").unwrap().unwrap() - 6.970139).abs() < TOL);
        assert!((model.buy("ice cream").unwrap().unwrap() - 2.591319).abs() < TOL);
        assert!((model.nutrition("fat").unwrap().unwrap() - 59.055903).abs() < TOL);
    }

    #[test]
    fn test_solution_respects_bounds_and_balance() {
        let model = solved_classic();
        let solution = model.current_solution().unwrap();
        let dataset = model.dataset();

        for food in &dataset.foods {
            assert!(model.buy(&food.name).unwrap().unwrap() >= 0.0);
        }

        for category in &dataset.categories {
            let achieved = model.nutrition(&category.name).unwrap().unwrap();
            assert!(achieved >= category.min - TOL, "{} below min", category.name);
            assert!(achieved <= category.max + TOL, "{} above max", category.name);

            let total: f64 = dataset
                .foods
                .iter()
                .map(|f| {
                    dataset.nutrition.get(&f.name, &category.name).unwrap()
                        * model.buy(&f.name).unwrap().unwrap()
                })
                .sum();
            assert!((total - achieved).abs() < TOL, "{} unbalanced", category.name);
        }

        for constraint in &model.problem().constraints {
            assert!(constraint.is_satisfied(&solution.values, TOL));
        }
    }

    #[test]
    fn test_dairy_limit_then_resolve() {
        let mut model = solved_classic();
        let before = model.objective_value().unwrap().unwrap();

        model.add_dairy_limit(DAIRY_LIMIT).unwrap();
        assert_eq!(model.state(), ModelState::Modified);
        assert_eq!(model.problem().num_constraints(), 5);

        let status = model.optimize(&SimplexSolver::new()).unwrap();
        assert_eq!(status, SolutionStatus::Optimal);

        let dairy: f64 = DAIRY_FOODS
            .iter()
            .map(|f| model.buy(f).unwrap().unwrap())
            .sum();
        assert!(dairy <= DAIRY_LIMIT + TOL, "dairy = {}", dairy);

        let after = model.objective_value().unwrap().unwrap();
        assert!(after >= before - TOL);
    }

    #[test]
    fn test_tight_dairy_limit_is_infeasible() {
        let mut model = solved_classic();
        model.add_dairy_limit(6.0).unwrap();

        let status = model.optimize(&SimplexSolver::new()).unwrap();

        assert_eq!(status, SolutionStatus::Infeasible);
        assert_eq!(model.state(), ModelState::Solved);
        assert_eq!(model.objective_value().unwrap(), None);
        assert_eq!(model.buy("milk").unwrap(), None);
    }

    #[test]
    fn test_dairy_limit_after_infeasible_solve() {
        let mut dataset = Dataset::classic();
        let fat = dataset.categories.iter_mut().find(|c| c.name == "fat").unwrap();
        fat.min = 70.0;
        let mut model = DietModel::build(dataset).unwrap();

        let status = model.optimize(&SimplexSolver::new()).unwrap();
        assert_eq!(status, SolutionStatus::Infeasible);
        assert_eq!(model.state(), ModelState::Solved);

        model.add_dairy_limit(DAIRY_LIMIT).unwrap();
        assert_eq!(model.state(), ModelState::Modified);
        assert!(model.problem().constraint(DAIRY_LIMIT_NAME).is_some());

        let status = model.optimize(&SimplexSolver::new()).unwrap();
        assert_eq!(status, SolutionStatus::Infeasible);
        assert_eq!(model.state(), ModelState::Solved);
        assert_eq!(model.objective_value().unwrap(), None);
    }

    #[test]
    fn test_stale_values_are_refused() {
        let mut model = DietModel::build(Dataset::classic()).unwrap();
        assert!(matches!(
            model.objective_value(),
            Err(DietError::NotSolved { state: ModelState::Built })
        ));

        model.optimize(&SimplexSolver::new()).unwrap();
        model.add_food_limit("limit_fries", &["fries"], 1.0).unwrap();

        assert!(matches!(
            model.buy("hamburger"),
            Err(DietError::NotSolved { state: ModelState::Modified })
        ));
    }

    #[test]
    fn test_resolve_unmodified_model_is_stable() {
        let mut model = solved_classic();
        let first = model.current_solution().unwrap().clone();

        model.optimize(&SimplexSolver::new()).unwrap();
        let second = model.current_solution().unwrap();

        assert!((first.objective_value - second.objective_value).abs() < TOL);
        for (a, b) in first.values.iter().zip(&second.values) {
            assert!((a - b).abs() < TOL);
        }
    }

    #[test]
    fn test_duplicate_food_fails_validation() {
        let mut dataset = Dataset::classic();
        dataset.add_food("pizza", 3.0);

        let err = DietModel::build(dataset).unwrap_err();

        assert!(matches!(
            err,
            DietError::Validation(ValidationError::DuplicateFood(ref name)) if name == "pizza"
        ));
    }

    #[test]
    fn test_crossed_category_bounds_are_infeasible() {
        let mut dataset = Dataset::classic();
        let fat = dataset.categories.iter_mut().find(|c| c.name == "fat").unwrap();
        fat.min = 70.0;

        let mut model = DietModel::build(dataset).unwrap();
        let status = model.optimize(&SimplexSolver::new()).unwrap();

        assert_eq!(status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_modifier_rejects_bad_input() {
        let mut model = solved_classic();

        let err = model.add_food_limit("limit_bread", &["bread"], 2.0).unwrap_err();
        assert!(matches!(err, DietError::Validation(ValidationError::UnknownFood(_))));

        let err = model.add_food_limit("protein", &["milk"], 2.0).unwrap_err();
        assert!(matches!(err, DietError::Validation(ValidationError::DuplicateConstraint(_))));

        model.add_dairy_limit(DAIRY_LIMIT).unwrap();
        let err = model.add_dairy_limit(DAIRY_LIMIT).unwrap_err();
        assert!(matches!(err, DietError::Validation(ValidationError::DuplicateConstraint(_))));

        // only the first dairy limit was appended
        assert_eq!(model.problem().num_constraints(), 5);
    }

    #[test]
    fn test_solver_failure_keeps_state() {
        let mut model = solved_classic();

        let err = model.optimize(&FailingSolver).unwrap_err();

        assert!(matches!(err, DietError::Solver(SolverError::IterationLimit { .. })));
        assert_eq!(model.state(), ModelState::Solved);
        assert!(model.objective_value().unwrap().is_some());
    }
}
