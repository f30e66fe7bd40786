//! Recipe costing: per-portion ingredient cost, labor share and margins.
//!
//! Ingredients are valued at the FEFO-weighted cost of the lots that would be
//! drawn, with the catalog price covering any shortfall; the restaurant's
//! quality choices multiply the unit cost. All arithmetic is exact decimal,
//! intermediate values rounded to 4 fractional digits.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::money::{ht_from_ttc, round_intermediate, Money};
use sim_core::{Catalog, CatalogError, Recipe, RestaurantType, StockManager};
use std::collections::BTreeMap;

/// Base hourly labor cost before the restaurant-type factor.
pub fn base_hourly_rate() -> Money {
    Decimal::new(1200, 2)
}

/// Hourly labor cost for a restaurant type.
pub fn hourly_labor_cost(kind: Option<RestaurantType>) -> Money {
    let factor = kind.map_or(Decimal::ONE, RestaurantType::labor_cost_factor);
    base_hourly_rate() * factor
}

/// Cost detail for one ingredient line of a recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngredientCost {
    pub ingredient_id: String,
    pub quantity_used: Decimal,
    pub unit_cost_ht: Money,
    pub total_cost_ht: Money,
    /// Loss fraction already modeled by the recipe yields.
    pub waste_fraction: Decimal,
}

/// Full cost decomposition of one recipe batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub recipe_id: String,
    pub portions: u32,
    pub ingredient_costs: Vec<IngredientCost>,
    /// Sum of the ingredient lines, HT.
    pub total_cost_ht: Money,
    /// Labor share for one batch.
    pub labor_cost: Money,
    /// (ingredients + labor) / portions.
    pub cost_per_portion: Money,
}

/// Margin analysis of a recipe at a given selling price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginAnalysis {
    pub selling_price_ht: Money,
    pub cost_per_portion: Money,
    pub margin_ht: Money,
    /// Margin as a fraction of the HT price.
    pub margin_ratio: Decimal,
    /// Cost as a fraction of the HT price; 1 when the HT price is not positive.
    pub food_cost_ratio: Decimal,
    pub labor_cost_per_portion: Money,
}

/// FEFO-weighted unit cost of `quantity` of an ingredient.
///
/// Walks the non-expired lots in expiry order without consuming them; any
/// shortfall is valued at the catalog cost.
fn stocked_unit_cost(
    catalog_cost: Money,
    stock: &StockManager,
    ingredient_id: &str,
    quantity: Decimal,
    today: NaiveDate,
) -> Money {
    if quantity <= Decimal::ZERO {
        return catalog_cost;
    }
    let mut remaining = quantity;
    let mut total = Decimal::ZERO;
    for lot in stock.lots_for(ingredient_id) {
        if remaining <= Decimal::ZERO {
            break;
        }
        if lot.is_expired(today) {
            continue;
        }
        let drawn = remaining.min(lot.quantity);
        total += drawn * lot.unit_cost_ht;
        remaining -= drawn;
    }
    if remaining > Decimal::ZERO {
        total += remaining * catalog_cost;
    }
    round_intermediate(total / quantity)
}

/// Compute the cost decomposition of one recipe batch.
///
/// `quality_choices` maps ingredient ids to the quality tier the restaurant
/// buys; `stock` switches valuation from catalog prices to current lots.
pub fn recipe_cost(
    catalog: &Catalog,
    recipe: &Recipe,
    quality_choices: &BTreeMap<String, u8>,
    stock: Option<(&StockManager, NaiveDate)>,
    kind: Option<RestaurantType>,
) -> Result<CostBreakdown, CatalogError> {
    let mut lines = Vec::with_capacity(recipe.items.len());
    let mut total = Decimal::ZERO;

    for item in &recipe.items {
        let ingredient = catalog.ingredient(&item.ingredient_id).ok_or_else(|| {
            CatalogError::UnknownRecipeIngredient {
                recipe_id: recipe.id.clone(),
                ingredient_id: item.ingredient_id.clone(),
            }
        })?;

        let quantity = item.qty_brute;
        let mut unit_cost = match stock {
            Some((stock, today)) => {
                stocked_unit_cost(ingredient.cost_ht, stock, &ingredient.id, quantity, today)
            }
            None => ingredient.cost_ht,
        };
        if let Some(level) = quality_choices.get(&item.ingredient_id) {
            unit_cost =
                round_intermediate(unit_cost * catalog.quality_cost_multiplier(&ingredient.id, *level));
        }

        let line_total = round_intermediate(quantity * unit_cost);
        total += line_total;
        lines.push(IngredientCost {
            ingredient_id: ingredient.id.clone(),
            quantity_used: quantity,
            unit_cost_ht: unit_cost,
            total_cost_ht: line_total,
            waste_fraction: Decimal::ONE - item.yield_prep * item.yield_cook,
        });
    }

    let minutes = Decimal::from(recipe.total_minutes());
    let labor_cost =
        round_intermediate(minutes / Decimal::new(60, 0) * hourly_labor_cost(kind));
    let portions = Decimal::from(recipe.portions);
    let cost_per_portion = round_intermediate((total + labor_cost) / portions);

    Ok(CostBreakdown {
        recipe_id: recipe.id.clone(),
        portions: recipe.portions,
        ingredient_costs: lines,
        total_cost_ht: total,
        labor_cost,
        cost_per_portion,
    })
}

/// Margin analysis of a recipe against a TTC selling price.
pub fn margin_analysis(
    breakdown: &CostBreakdown,
    selling_price_ttc: Money,
    vat_rate: Decimal,
) -> MarginAnalysis {
    let selling_price_ht = ht_from_ttc(selling_price_ttc, vat_rate);
    let cost_per_portion = breakdown.cost_per_portion;
    let margin_ht = selling_price_ht - cost_per_portion;
    let (margin_ratio, food_cost_ratio) = if selling_price_ht > Decimal::ZERO {
        (
            round_intermediate(margin_ht / selling_price_ht),
            round_intermediate(cost_per_portion / selling_price_ht),
        )
    } else {
        (Decimal::ZERO, Decimal::ONE)
    };
    let portions = Decimal::from(breakdown.portions);
    MarginAnalysis {
        selling_price_ht,
        cost_per_portion,
        margin_ht,
        margin_ratio,
        food_cost_ratio,
        labor_cost_per_portion: round_intermediate(breakdown.labor_cost / portions),
    }
}
