use std::fmt;

use diet_solver::SolutionStatus;

use crate::error::DietError;
use crate::model::DietModel;

/// Foods bought in smaller amounts are left out of the report
pub const PURCHASE_THRESHOLD: f64 = 0.0001;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub name: String,
    pub value: f64,
}

/// Snapshot of a solved model
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "outcome", rename_all = "snake_case")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Optimal {
        cost: f64,
        /// Foods above [`PURCHASE_THRESHOLD`], in dataset order
        buy: Vec<Quantity>,
        /// Every category, in dataset order
        nutrition: Vec<Quantity>,
    },
    NoSolution {
        status: SolutionStatus,
    },
}

impl Report {
    /// Fails with [`DietError::NotSolved`] if the model changed since its last solve
    pub fn from_model(model: &DietModel) -> Result<Self, DietError> {
        let solution = model.current_solution()?;
        if !solution.is_optimal() {
            return Ok(Report::NoSolution {
                status: solution.status,
            });
        }

        let dataset = model.dataset();
        let mut buy = Vec::new();
        for food in &dataset.foods {
            let value = model.buy(&food.name)?.unwrap_or(0.0);
            if value > PURCHASE_THRESHOLD {
                buy.push(Quantity {
                    name: food.name.clone(),
                    value,
                });
            }
        }

        let nutrition = dataset
            .categories
            .iter()
            .map(|c| {
                Ok(Quantity {
                    name: c.name.clone(),
                    value: model.nutrition(&c.name)?.unwrap_or(0.0),
                })
            })
            .collect::<Result<Vec<_>, DietError>>()?;

        Ok(Report::Optimal {
            cost: solution.objective_value,
            buy,
            nutrition,
        })
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, Report::Optimal { .. })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Optimal { cost, buy, nutrition } => {
                writeln!(f)?;
                writeln!(f, "Cost: {}", format_g(*cost))?;
                writeln!(f)?;
                writeln!(f, "Buy:")?;
                for q in buy {
                    writeln!(f, "{} {}", q.name, format_g(q.value))?;
                }
                writeln!(f)?;
                writeln!(f, "Nutrition:")?;
                for q in nutrition {
                    writeln!(f, "{} {}", q.name, format_g(q.value))?;
                }
                Ok(())
            }
            Report::NoSolution { .. } => writeln!(f, "No solution"),
        }
    }
}

/// Format like C's `%g`: six significant digits, trailing zeros dropped,
/// exponent notation outside `1e-4 <= |x| < 1e6`
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // Rounding to six digits first fixes the exponent (9.999995 -> 1.00000e1)
    let sci = format!("{:.5e}", value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (5 - exp) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
