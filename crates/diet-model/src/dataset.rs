use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;

/// A nutrient with the daily range the diet must reach
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientCategory {
    pub name: String,
    pub min: f64,
    /// `f64::INFINITY` when there is no upper limit
    #[cfg_attr(feature = "serde", serde(default = "unbounded::infinity", with = "unbounded"))]
    pub max: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pub name: String,
    /// Cost per serving
    pub cost: f64,
}

/// One `(food, category) -> amount` entry, as stored on disk
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientEntry {
    pub food: String,
    pub category: String,
    pub amount: f64,
}

/// Sparse nutrient content per serving, keyed by food then category
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<NutrientEntry>", into = "Vec<NutrientEntry>")
)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NutrientTable {
    values: HashMap<String, HashMap<String, f64>>,
}

impl NutrientTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the amount for a pair, returning the previous amount
    pub fn insert(&mut self, food: impl Into<String>, category: impl Into<String>, amount: f64) -> Option<f64> {
        self.values
            .entry(food.into())
            .or_default()
            .insert(category.into(), amount)
    }

    pub fn get(&self, food: &str, category: &str) -> Option<f64> {
        self.values.get(food)?.get(category).copied()
    }

    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries sorted by food, then category
    pub fn entries(&self) -> Vec<NutrientEntry> {
        let mut entries: Vec<NutrientEntry> = self
            .values
            .iter()
            .flat_map(|(food, per_category)| {
                per_category.iter().map(move |(category, &amount)| NutrientEntry {
                    food: food.clone(),
                    category: category.clone(),
                    amount,
                })
            })
            .collect();
        entries.sort_by(|a, b| (&a.food, &a.category).cmp(&(&b.food, &b.category)));
        entries
    }
}

impl TryFrom<Vec<NutrientEntry>> for NutrientTable {
    type Error = ValidationError;

    /// Fails on a `(food, category)` pair that appears twice
    fn try_from(entries: Vec<NutrientEntry>) -> Result<Self, Self::Error> {
        let mut table = NutrientTable::new();
        for e in entries {
            if table.get(&e.food, &e.category).is_some() {
                return Err(ValidationError::DuplicateNutrientValue {
                    food: e.food,
                    category: e.category,
                });
            }
            table.insert(e.food, e.category, e.amount);
        }
        Ok(table)
    }
}

impl From<NutrientTable> for Vec<NutrientEntry> {
    fn from(table: NutrientTable) -> Self {
        table.entries()
    }
}

/// Everything needed to build a diet model. Order of categories and foods is the report order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub categories: Vec<NutrientCategory>,
    pub foods: Vec<Food>,
    pub nutrition: NutrientTable,
}

impl Dataset {
    /// The classic fast-food diet: four nutrient categories and nine foods
    pub fn classic() -> Self {
        let categories = [
            ("calories", 1800.0, 2200.0),
            ("protein", 91.0, f64::INFINITY),
            ("fat", 0.0, 65.0),
            ("sodium", 0.0, 1779.0),
        ];

        // cost, then calories / protein / fat / sodium per serving
        let foods: [(&str, f64, [f64; 4]); 9] = [
            ("hamburger", 2.49, [410.0, 24.0, 26.0, 730.0]),
            ("chicken", 2.89, [420.0, 32.0, 10.0, 1190.0]),
            ("hot dog", 1.50, [560.0, 20.0, 32.0, 1800.0]),
            ("fries", 1.89, [380.0, 4.0, 19.0, 270.0]),
            ("macaroni", 2.09, [320.0, 12.0, 10.0, 930.0]),
            ("pizza", 1.99, [320.0, 15.0, 12.0, 820.0]),
            ("salad", 2.49, [320.0, 31.0, 12.0, 1230.0]),
            ("milk", 0.89, [100.0, 8.0, 2.5, 125.0]),
            ("ice cream", 1.59, [330.0, 8.0, 10.0, 180.0]),
        ];

        let mut dataset = Dataset::default();
        for (name, min, max) in categories {
            dataset.add_category(name, min, max);
        }
        for (name, cost, amounts) in foods {
            dataset.add_food(name, cost);
            for ((category, _, _), amount) in categories.iter().zip(amounts) {
                dataset.nutrition.insert(name, *category, amount);
            }
        }
        dataset
    }

    pub fn add_category(&mut self, name: impl Into<String>, min: f64, max: f64) {
        self.categories.push(NutrientCategory {
            name: name.into(),
            min,
            max,
        });
    }

    pub fn add_food(&mut self, name: impl Into<String>, cost: f64) {
        self.foods.push(Food {
            name: name.into(),
            cost,
        });
    }

    pub fn category(&self, name: &str) -> Option<&NutrientCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn food(&self, name: &str) -> Option<&Food> {
        self.foods.iter().find(|f| f.name == name)
    }

    /// Check names, costs, bounds and nutrient coverage.
    ///
    /// A category whose `min` exceeds its `max` is accepted; the model is then infeasible.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for c in &self.categories {
            if !seen.insert(c.name.as_str()) {
                return Err(ValidationError::DuplicateCategory(c.name.clone()));
            }
            let min_ok = c.min.is_finite() && c.min >= 0.0;
            let max_ok = !c.max.is_nan() && c.max >= 0.0;
            if !(min_ok && max_ok) {
                return Err(ValidationError::InvalidBound {
                    category: c.name.clone(),
                    min: c.min,
                    max: c.max,
                });
            }
        }

        let mut seen = HashSet::new();
        for f in &self.foods {
            if !seen.insert(f.name.as_str()) {
                return Err(ValidationError::DuplicateFood(f.name.clone()));
            }
            if !(f.cost.is_finite() && f.cost >= 0.0) {
                return Err(ValidationError::InvalidCost {
                    food: f.name.clone(),
                    cost: f.cost,
                });
            }
        }

        for e in self.nutrition.entries() {
            if self.food(&e.food).is_none() {
                return Err(ValidationError::UnknownFood(e.food));
            }
            if self.category(&e.category).is_none() {
                return Err(ValidationError::UnknownCategory(e.category));
            }
            if !(e.amount.is_finite() && e.amount >= 0.0) {
                return Err(ValidationError::InvalidNutrientValue {
                    food: e.food,
                    category: e.category,
                    amount: e.amount,
                });
            }
        }

        for f in &self.foods {
            for c in &self.categories {
                if self.nutrition.get(&f.name, &c.name).is_none() {
                    return Err(ValidationError::MissingNutrientValue {
                        food: f.name.clone(),
                        category: c.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(feature = "serde")]
impl Dataset {
    /// Parse a JSON dataset. A category without `max` is unbounded above.
    pub fn from_json(source: &str) -> Result<Self, crate::DietError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, crate::DietError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| crate::DietError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&source)
    }
}

/// JSON has no infinity, so an unbounded maximum is written as `null` or left out
#[cfg(feature = "serde")]
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn infinity() -> f64 {
        f64::INFINITY
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Dataset {
        let mut dataset = Dataset::default();
        dataset.add_category("protein", 10.0, f64::INFINITY);
        dataset.add_food("beans", 1.0);
        dataset.add_food("rice", 0.5);
        dataset.nutrition.insert("beans", "protein", 8.0);
        dataset.nutrition.insert("rice", "protein", 3.0);
        dataset
    }

    #[test]
    fn test_classic_dataset_is_complete() {
        let dataset = Dataset::classic();

        assert_eq!(dataset.categories.len(), 4);
        assert_eq!(dataset.foods.len(), 9);
        assert_eq!(dataset.nutrition.len(), 36);
        assert_eq!(dataset.nutrition.get("milk", "fat"), Some(2.5));
        assert_eq!(dataset.nutrition.get("hot dog", "sodium"), Some(1800.0));
        assert_eq!(dataset.category("protein").unwrap().max, f64::INFINITY);
        assert_eq!(dataset.food("ice cream").unwrap().cost, 1.59);
        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let mut dataset = tiny();
        dataset.add_food("rice", 0.7);
        assert_eq!(
            dataset.validate(),
            Err(ValidationError::DuplicateFood("rice".to_string()))
        );

        let mut dataset = tiny();
        dataset.add_category("protein", 0.0, 5.0);
        assert_eq!(
            dataset.validate(),
            Err(ValidationError::DuplicateCategory("protein".to_string()))
        );
    }

    #[test]
    fn test_missing_nutrient_value() {
        let mut dataset = tiny();
        dataset.add_food("water", 0.0);

        assert_eq!(
            dataset.validate(),
            Err(ValidationError::MissingNutrientValue {
                food: "water".to_string(),
                category: "protein".to_string(),
            })
        );
    }

    #[test]
    fn test_negative_inputs() {
        let mut dataset = tiny();
        dataset.foods[0].cost = -1.0;
        assert!(matches!(dataset.validate(), Err(ValidationError::InvalidCost { .. })));

        let mut dataset = tiny();
        dataset.categories[0].min = -3.0;
        assert!(matches!(dataset.validate(), Err(ValidationError::InvalidBound { .. })));

        let mut dataset = tiny();
        dataset.nutrition.insert("rice", "protein", -0.5);
        assert!(matches!(
            dataset.validate(),
            Err(ValidationError::InvalidNutrientValue { .. })
        ));
    }

    #[test]
    fn test_crossed_bounds_are_not_a_validation_error() {
        let mut dataset = tiny();
        dataset.categories[0].min = 20.0;
        dataset.categories[0].max = 5.0;

        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_entry_for_unknown_food() {
        let mut dataset = tiny();
        dataset.nutrition.insert("bread", "protein", 4.0);

        assert_eq!(
            dataset.validate(),
            Err(ValidationError::UnknownFood("bread".to_string()))
        );
    }

    #[test]
    fn test_repeated_entry_is_rejected() {
        let entry = |amount| NutrientEntry {
            food: "beans".to_string(),
            category: "protein".to_string(),
            amount,
        };

        let result = NutrientTable::try_from(vec![entry(8.0), entry(9.0)]);

        assert_eq!(
            result,
            Err(ValidationError::DuplicateNutrientValue {
                food: "beans".to_string(),
                category: "protein".to_string(),
            })
        );
        assert_eq!(NutrientTable::try_from(vec![entry(8.0)]).unwrap().len(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_with_repeated_entry() {
        let source = r#"{
            "categories": [{ "name": "protein", "min": 10 }],
            "foods": [{ "name": "beans", "cost": 1.0 }],
            "nutrition": [
                { "food": "beans", "category": "protein", "amount": 8 },
                { "food": "beans", "category": "protein", "amount": 9 }
            ]
        }"#;

        let err = Dataset::from_json(source).unwrap_err();

        assert!(err.to_string().contains("beans / protein given more than once"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let source = r#"{
            "categories": [
                { "name": "protein", "min": 10 },
                { "name": "fat", "min": 0, "max": 20 }
            ],
            "foods": [{ "name": "beans", "cost": 1.0 }],
            "nutrition": [
                { "food": "beans", "category": "protein", "amount": 8 },
                { "food": "beans", "category": "fat", "amount": 1 }
            ]
        }"#;

        let dataset = Dataset::from_json(source).unwrap();

        assert_eq!(dataset.category("protein").unwrap().max, f64::INFINITY);
        assert_eq!(dataset.category("fat").unwrap().max, 20.0);
        assert_eq!(dataset.nutrition.get("beans", "protein"), Some(8.0));
        assert!(dataset.validate().is_ok());

        let json = serde_json::to_string(&dataset).unwrap();
        assert!(json.contains(r#""max":null"#));
    }
}
