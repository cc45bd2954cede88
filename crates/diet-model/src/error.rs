use diet_solver::SolverError;
use thiserror::Error;

use crate::model::ModelState;

/// Malformed input, detected before anything is solved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate nutrient category: {0}")]
    DuplicateCategory(String),
    #[error("Duplicate food: {0}")]
    DuplicateFood(String),
    #[error("Duplicate constraint name: {0}")]
    DuplicateConstraint(String),
    #[error("Missing nutrient value for {food} / {category}")]
    MissingNutrientValue { food: String, category: String },
    #[error("Nutrient value for {food} / {category} given more than once")]
    DuplicateNutrientValue { food: String, category: String },
    #[error("Invalid cost {cost} for food {food}")]
    InvalidCost { food: String, cost: f64 },
    #[error("Invalid bounds [{min}, {max}] for category {category}")]
    InvalidBound { category: String, min: f64, max: f64 },
    #[error("Invalid nutrient value {amount} for {food} / {category}")]
    InvalidNutrientValue { food: String, category: String, amount: f64 },
    #[error("Unknown food: {0}")]
    UnknownFood(String),
    #[error("Unknown nutrient category: {0}")]
    UnknownCategory(String),
    #[error("Unknown variable #{0}")]
    UnknownVariable(usize),
}

#[derive(Error, Debug)]
pub enum DietError {
    #[error("Invalid model: {0}")]
    Validation(#[from] ValidationError),
    #[error("Solver failed: {0}")]
    Solver(#[from] SolverError),
    #[error("Model has no current solution (state: {state})")]
    NotSolved { state: ModelState },
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot write report: {0}")]
    Output(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("Invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}
