//! Typed player and AI decisions, plus the validation errors they raise.
//!
//! Decisions are tagged variants rather than loosely keyed maps; every
//! variant is validated against the catalog and the current restaurant state
//! when submitted, and rejected wholesale without mutating anything.

use crate::employee::Employee;
use crate::money::Money;
use crate::orders::PurchaseOrderLine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One decision a player (or the AI) takes for a restaurant on a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Set the TTC price of a menu recipe (adds it to the menu if absent).
    SetPrice { recipe_id: String, price_ttc: Money },
    ActivateRecipe { recipe_id: String },
    DeactivateRecipe { recipe_id: String },
    /// Staffing level 0 (closed) to 3 (reinforced).
    SetStaffingLevel { level: u8 },
    /// Choose the quality tier 1..=5 purchased for an ingredient.
    SetIngredientQuality { ingredient_id: String, level: u8 },
    Hire { employee: Employee },
    Fire { employee_id: String },
    /// Spend `cost` now for an attractiveness boost lasting `impact_turns`.
    RunMarketingCampaign { cost: Money, impact_turns: u32 },
    /// Confirmed purchase order; lines arrive after their lead time.
    SubmitPurchaseOrder { lines: Vec<PurchaseOrderLine> },
    /// Draw a loan; repaid linearly with interest over `term_turns`.
    RequestLoan {
        amount: Money,
        annual_rate: Decimal,
        term_turns: u32,
    },
}

/// Rejections raised while validating a submitted decision set.
#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("unknown restaurant {0}")]
    UnknownRestaurant(String),
    #[error("restaurant {0} already exists")]
    DuplicateRestaurant(String),
    #[error("restaurant spec invalid: {0}")]
    InvalidSpec(String),
    #[error("price must be > 0 for {recipe_id}: {price}")]
    NonPositivePrice { recipe_id: String, price: Money },
    #[error("recipe {0} is not in the catalog")]
    UnknownRecipe(String),
    #[error("recipe {0} has no menu price yet")]
    RecipeNotOnMenu(String),
    #[error("staffing level {0} is out of 0..=3")]
    StaffingOutOfRange(u8),
    #[error("quality level {0} is out of 1..=5")]
    QualityLevelOutOfRange(u8),
    #[error("ingredient {0} is not in the catalog")]
    UnknownIngredient(String),
    #[error("employee {0} is already on the roster")]
    DuplicateEmployee(String),
    #[error("employee {0} is not on the roster")]
    UnknownEmployee(String),
    #[error("apprentice {employee_id} cannot have {months} months of experience (max 24)")]
    ApprenticeTooExperienced { employee_id: String, months: u32 },
    #[error("intern {employee_id} cannot draw a salary")]
    InternWithSalary { employee_id: String },
    #[error("negative salary for {employee_id}")]
    NegativeSalary { employee_id: String },
    #[error("productivity out of [0.5, 2.0] for {employee_id}")]
    ProductivityOutOfRange { employee_id: String },
    #[error("part-time ratio out of (0, 1] for {employee_id}")]
    PartTimeRatioOutOfRange { employee_id: String },
    #[error("marketing cost must be > 0")]
    NonPositiveMarketingCost,
    #[error("marketing campaign must last at least one turn")]
    ZeroImpactTurns,
    #[error("purchase order line for {0} must order a positive quantity")]
    EmptyOrderLine(String),
    #[error("loan must have a positive amount and term")]
    InvalidLoan,
    #[error(transparent)]
    Cash(#[from] CashError),
}

/// Cash-limit rejections for explicit checks; ordinary operation may still
/// drive cash negative.
#[derive(Debug, Error, PartialEq)]
pub enum CashError {
    #[error("loan of {requested} exceeds the configured cap {cap}")]
    LoanExceedsCap { requested: Money, cap: Money },
    #[error("investment of {requested} exceeds the configured cap {cap}")]
    InvestmentExceedsCap { requested: Money, cap: Money },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tagging_round_trips() {
        let d = Decision::SetPrice {
            recipe_id: "pasta_pomodoro".to_string(),
            price_ttc: Decimal::new(1600, 2),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kind\":\"set_price\""));
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn money_serializes_as_decimal_string() {
        let d = Decision::RequestLoan {
            amount: Decimal::new(50_000_00, 2),
            annual_rate: Decimal::new(5, 2),
            term_turns: 24,
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"amount\":\"50000.00\""));
    }
}
