pub mod dataset;
pub mod error;
pub mod model;
pub mod report;

pub use dataset::{Dataset, Food, NutrientCategory, NutrientEntry, NutrientTable};
pub use error::{DietError, ValidationError};
pub use model::{DietModel, ModelState, DAIRY_FOODS, DAIRY_LIMIT, DAIRY_LIMIT_NAME};
pub use report::{format_g, Quantity, Report, PURCHASE_THRESHOLD};
