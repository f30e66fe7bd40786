//! Immutable seed data: ingredients, quality variants, suppliers, offers and
//! recipes, bundled into a validated [`Catalog`].
//!
//! Catalogs are loaded once at startup and read-only afterwards. All
//! cross-references are by id; `Catalog::new` rejects dangling or duplicate
//! references so downstream code can look entities up without re-checking.

use crate::money::Money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A purchasable base ingredient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Short opaque id, unique among ingredients.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stock-keeping unit, e.g. "kg" or "l".
    pub unit: String,
    /// Catalog cost HT per unit.
    pub cost_ht: Money,
    /// VAT rate in [0, 1].
    pub vat_rate: Decimal,
    /// Default shelf life in days, counted from the reception date.
    pub shelf_life_days: u16,
    /// Category used to resolve VAT by scenario, e.g. "food_onsite".
    pub category: String,
    /// Optional density for unit conversions (kg per litre).
    pub density: Option<Decimal>,
}

/// Modifiers a quality tier applies on top of a base ingredient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityModifiers {
    /// Cost multiplier, strictly positive (1.25 = +25%).
    pub cost_multiplier: Decimal,
    /// Customer satisfaction delta in [-1, 1].
    pub satisfaction_bonus: Decimal,
    /// Preparation time multiplier, strictly positive.
    pub prep_time_multiplier: Decimal,
    /// Shelf life multiplier, strictly positive.
    pub shelf_life_multiplier: Decimal,
}

/// A quality-tiered variant of a base ingredient supplied by one supplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityVariant {
    pub base_ingredient_id: String,
    /// Quality level 1 (economy) to 5 (luxury).
    pub quality_level: u8,
    /// Range tag, e.g. "frozen", "fresh_local", "organic".
    pub range_tag: String,
    pub supplier_id: String,
    pub modifiers: QualityModifiers,
}

impl QualityVariant {
    /// Derived id, compound of the identifying fields.
    pub fn id(&self) -> String {
        format!(
            "{}-q{}-{}-{}",
            self.base_ingredient_id, self.quality_level, self.range_tag, self.supplier_id
        )
    }
}

/// A supplier with its commercial terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    /// Delivery reliability in [0, 1].
    pub reliability: Decimal,
    pub lead_time_days: u16,
    /// Minimum order value per order (MOQ value).
    pub min_order_value: Money,
    pub shipping_cost: Money,
    pub payment_terms_days: u16,
    pub discount_threshold: Option<Money>,
    pub discount_rate: Option<Decimal>,
}

/// One purchasable line of the supplier price list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierOffer {
    pub ingredient_id: String,
    pub supplier_id: String,
    /// Quality level 1..=5 of the goods delivered under this offer.
    pub quality_level: u8,
    /// Pack size in catalog units; orders are rounded up to whole packs.
    pub pack_size: Decimal,
    pub pack_unit: String,
    pub unit_price_ht: Money,
    pub vat_rate: Decimal,
    /// Minimum order quantity in units.
    pub moq_qty: Decimal,
    /// Minimum order value HT.
    pub moq_value: Money,
    pub lead_time_days: u16,
    pub reliability: Decimal,
    pub available: bool,
}

/// One ingredient line of a recipe, with preparation and cooking yields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub ingredient_id: String,
    /// Gross quantity to purchase for the whole recipe (before yields).
    pub qty_brute: Decimal,
    /// Yield after peeling/trimming, in (0, 1].
    pub yield_prep: Decimal,
    /// Yield after cooking, in (0, 1].
    pub yield_cook: Decimal,
}

impl RecipeItem {
    /// Net quantity on the plate after both yields.
    pub fn net_qty(&self) -> Decimal {
        self.qty_brute * self.yield_prep * self.yield_cook
    }
}

/// A dish with its ingredient lines and timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub items: Vec<RecipeItem>,
    pub prep_minutes: u16,
    pub service_minutes: u16,
    /// Portions produced by one batch, strictly positive.
    pub portions: u32,
    pub category: String,
    /// Difficulty 1..=5.
    pub difficulty: u8,
    pub description: String,
}

impl Recipe {
    /// Total labor minutes for one batch.
    pub fn total_minutes(&self) -> u16 {
        self.prep_minutes + self.service_minutes
    }
}

/// Validation errors raised when assembling a catalog.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("duplicate ingredient id: {0}")]
    DuplicateIngredient(String),
    #[error("duplicate supplier id: {0}")]
    DuplicateSupplier(String),
    #[error("duplicate recipe id: {0}")]
    DuplicateRecipe(String),
    #[error("duplicate offer for {ingredient_id} from {supplier_id} at level {quality_level}")]
    DuplicateOffer {
        ingredient_id: String,
        supplier_id: String,
        quality_level: u8,
    },
    #[error("recipe {recipe_id} references unknown ingredient {ingredient_id}")]
    UnknownRecipeIngredient {
        recipe_id: String,
        ingredient_id: String,
    },
    #[error("offer references unknown ingredient {0}")]
    UnknownOfferIngredient(String),
    #[error("offer references unknown supplier {0}")]
    UnknownOfferSupplier(String),
    #[error("variant references unknown ingredient {0}")]
    UnknownVariantIngredient(String),
    #[error("variant references unknown supplier {0}")]
    UnknownVariantSupplier(String),
    #[error("pack size must be > 0 on offer {ingredient_id} from {supplier_id}")]
    InvalidPackSize {
        ingredient_id: String,
        supplier_id: String,
    },
    #[error("quality level {0} is out of 1..=5")]
    QualityLevelOutOfRange(u8),
    #[error("yields must be within (0, 1] in recipe {0}")]
    InvalidYield(String),
    #[error("recipe {0} must produce at least one portion")]
    NoPortions(String),
    #[error("negative monetary value on {0}")]
    NegativeMoney(String),
    #[error("vat rate must be within [0, 1] on {0}")]
    InvalidVatRate(String),
    #[error("quality multipliers must be > 0 on variant {0}")]
    InvalidMultiplier(String),
    #[error("reliability must be within [0, 1] on {0}")]
    InvalidReliability(String),
}

/// Default cost multipliers by quality level, used when no explicit variant
/// exists for an (ingredient, level) pair.
const DEFAULT_COST_MULTIPLIERS: [(u8, i64); 5] =
    [(1, 70), (2, 100), (3, 125), (4, 150), (5, 200)];

/// The immutable seed data of one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    ingredients: BTreeMap<String, Ingredient>,
    variants: Vec<QualityVariant>,
    recipes: BTreeMap<String, Recipe>,
    suppliers: BTreeMap<String, Supplier>,
    offers: Vec<SupplierOffer>,
}

impl Catalog {
    /// Assemble and strictly validate a catalog.
    pub fn new(
        ingredients: Vec<Ingredient>,
        variants: Vec<QualityVariant>,
        recipes: Vec<Recipe>,
        suppliers: Vec<Supplier>,
        offers: Vec<SupplierOffer>,
    ) -> Result<Self, CatalogError> {
        let mut ingredient_map = BTreeMap::new();
        for ing in ingredients {
            validate_ingredient(&ing)?;
            let id = ing.id.clone();
            if ingredient_map.insert(id.clone(), ing).is_some() {
                return Err(CatalogError::DuplicateIngredient(id));
            }
        }

        let mut supplier_map = BTreeMap::new();
        for sup in suppliers {
            validate_supplier(&sup)?;
            let id = sup.id.clone();
            if supplier_map.insert(id.clone(), sup).is_some() {
                return Err(CatalogError::DuplicateSupplier(id));
            }
        }

        let mut recipe_map = BTreeMap::new();
        for recipe in recipes {
            validate_recipe(&recipe, &ingredient_map)?;
            let id = recipe.id.clone();
            if recipe_map.insert(id.clone(), recipe).is_some() {
                return Err(CatalogError::DuplicateRecipe(id));
            }
        }

        for variant in &variants {
            validate_variant(variant, &ingredient_map, &supplier_map)?;
        }

        let mut offer_keys = BTreeSet::new();
        for offer in &offers {
            validate_offer(offer, &ingredient_map, &supplier_map)?;
            let key = (
                offer.ingredient_id.clone(),
                offer.supplier_id.clone(),
                offer.quality_level,
            );
            if !offer_keys.insert(key) {
                return Err(CatalogError::DuplicateOffer {
                    ingredient_id: offer.ingredient_id.clone(),
                    supplier_id: offer.supplier_id.clone(),
                    quality_level: offer.quality_level,
                });
            }
        }

        Ok(Self {
            ingredients: ingredient_map,
            variants,
            recipes: recipe_map,
            suppliers: supplier_map,
            offers,
        })
    }

    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.get(id)
    }

    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn supplier(&self, id: &str) -> Option<&Supplier> {
        self.suppliers.get(id)
    }

    /// All available offers for one ingredient, catalog order.
    pub fn offers_for(&self, ingredient_id: &str) -> Vec<&SupplierOffer> {
        self.offers
            .iter()
            .filter(|o| o.ingredient_id == ingredient_id && o.available)
            .collect()
    }

    pub fn offers(&self) -> &[SupplierOffer] {
        &self.offers
    }

    /// The explicit variant for an (ingredient, level) pair, if declared.
    pub fn variant(&self, ingredient_id: &str, level: u8) -> Option<&QualityVariant> {
        self.variants
            .iter()
            .find(|v| v.base_ingredient_id == ingredient_id && v.quality_level == level)
    }

    /// Cost multiplier for an ingredient at a quality level.
    ///
    /// Falls back to the default tier table when no variant is declared.
    pub fn quality_cost_multiplier(&self, ingredient_id: &str, level: u8) -> Decimal {
        if let Some(variant) = self.variant(ingredient_id, level) {
            return variant.modifiers.cost_multiplier;
        }
        DEFAULT_COST_MULTIPLIERS
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, pct)| Decimal::new(*pct, 2))
            .unwrap_or(Decimal::ONE)
    }

    /// Shelf-life adjustment in days applied at goods receipt for a quality
    /// level: economy goods expire earlier, luxury goods later.
    pub fn shelf_life_adjustment(&self, ingredient_id: &str, level: Option<u8>) -> i64 {
        let Some(level) = level else { return 0 };
        if let Some(variant) = self.variant(ingredient_id, level) {
            // Variant multiplier converts to a day delta against the base
            // shelf life, rounded to the nearest day.
            if let Some(ing) = self.ingredient(ingredient_id) {
                let base = Decimal::from(ing.shelf_life_days);
                let adjusted = base * variant.modifiers.shelf_life_multiplier;
                return (adjusted - base).round().to_i64().unwrap_or(0);
            }
        }
        i64::from(level) - 3
    }
}

fn validate_ingredient(ing: &Ingredient) -> Result<(), CatalogError> {
    if ing.cost_ht < Decimal::ZERO {
        return Err(CatalogError::NegativeMoney(format!("ingredient {}", ing.id)));
    }
    if ing.vat_rate < Decimal::ZERO || ing.vat_rate > Decimal::ONE {
        return Err(CatalogError::InvalidVatRate(format!("ingredient {}", ing.id)));
    }
    Ok(())
}

fn validate_supplier(sup: &Supplier) -> Result<(), CatalogError> {
    if sup.reliability < Decimal::ZERO || sup.reliability > Decimal::ONE {
        return Err(CatalogError::InvalidReliability(format!("supplier {}", sup.id)));
    }
    if sup.min_order_value < Decimal::ZERO || sup.shipping_cost < Decimal::ZERO {
        return Err(CatalogError::NegativeMoney(format!("supplier {}", sup.id)));
    }
    Ok(())
}

fn validate_recipe(
    recipe: &Recipe,
    ingredients: &BTreeMap<String, Ingredient>,
) -> Result<(), CatalogError> {
    if recipe.portions == 0 {
        return Err(CatalogError::NoPortions(recipe.id.clone()));
    }
    for item in &recipe.items {
        if !ingredients.contains_key(&item.ingredient_id) {
            return Err(CatalogError::UnknownRecipeIngredient {
                recipe_id: recipe.id.clone(),
                ingredient_id: item.ingredient_id.clone(),
            });
        }
        let prep_ok = item.yield_prep > Decimal::ZERO && item.yield_prep <= Decimal::ONE;
        let cook_ok = item.yield_cook > Decimal::ZERO && item.yield_cook <= Decimal::ONE;
        if !prep_ok || !cook_ok {
            return Err(CatalogError::InvalidYield(recipe.id.clone()));
        }
        if item.qty_brute < Decimal::ZERO {
            return Err(CatalogError::NegativeMoney(format!("recipe {}", recipe.id)));
        }
    }
    Ok(())
}

fn validate_variant(
    variant: &QualityVariant,
    ingredients: &BTreeMap<String, Ingredient>,
    suppliers: &BTreeMap<String, Supplier>,
) -> Result<(), CatalogError> {
    if !(1..=5).contains(&variant.quality_level) {
        return Err(CatalogError::QualityLevelOutOfRange(variant.quality_level));
    }
    if !ingredients.contains_key(&variant.base_ingredient_id) {
        return Err(CatalogError::UnknownVariantIngredient(
            variant.base_ingredient_id.clone(),
        ));
    }
    if !suppliers.contains_key(&variant.supplier_id) {
        return Err(CatalogError::UnknownVariantSupplier(variant.supplier_id.clone()));
    }
    let m = &variant.modifiers;
    if m.cost_multiplier <= Decimal::ZERO
        || m.prep_time_multiplier <= Decimal::ZERO
        || m.shelf_life_multiplier <= Decimal::ZERO
    {
        return Err(CatalogError::InvalidMultiplier(variant.id()));
    }
    Ok(())
}

fn validate_offer(
    offer: &SupplierOffer,
    ingredients: &BTreeMap<String, Ingredient>,
    suppliers: &BTreeMap<String, Supplier>,
) -> Result<(), CatalogError> {
    if !ingredients.contains_key(&offer.ingredient_id) {
        return Err(CatalogError::UnknownOfferIngredient(offer.ingredient_id.clone()));
    }
    if !suppliers.contains_key(&offer.supplier_id) {
        return Err(CatalogError::UnknownOfferSupplier(offer.supplier_id.clone()));
    }
    if !(1..=5).contains(&offer.quality_level) {
        return Err(CatalogError::QualityLevelOutOfRange(offer.quality_level));
    }
    if offer.pack_size <= Decimal::ZERO {
        return Err(CatalogError::InvalidPackSize {
            ingredient_id: offer.ingredient_id.clone(),
            supplier_id: offer.supplier_id.clone(),
        });
    }
    if offer.unit_price_ht < Decimal::ZERO || offer.moq_value < Decimal::ZERO {
        return Err(CatalogError::NegativeMoney(format!(
            "offer {}/{}",
            offer.ingredient_id, offer.supplier_id
        )));
    }
    if offer.vat_rate < Decimal::ZERO || offer.vat_rate > Decimal::ONE {
        return Err(CatalogError::InvalidVatRate(format!(
            "offer {}/{}",
            offer.ingredient_id, offer.supplier_id
        )));
    }
    if offer.reliability < Decimal::ZERO || offer.reliability > Decimal::ONE {
        return Err(CatalogError::InvalidReliability(format!(
            "offer {}/{}",
            offer.ingredient_id, offer.supplier_id
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn ingredient(id: &str, cost_cents: i64, shelf_life: u16) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            name: id.to_string(),
            unit: "kg".to_string(),
            cost_ht: Decimal::new(cost_cents, 2),
            vat_rate: Decimal::new(10, 2),
            shelf_life_days: shelf_life,
            category: "food_onsite".to_string(),
            density: None,
        }
    }

    pub fn supplier(id: &str) -> Supplier {
        Supplier {
            id: id.to_string(),
            name: id.to_string(),
            reliability: Decimal::new(9, 1),
            lead_time_days: 2,
            min_order_value: Decimal::new(5000, 2),
            shipping_cost: Decimal::new(1500, 2),
            payment_terms_days: 30,
            discount_threshold: None,
            discount_rate: None,
        }
    }

    pub fn offer(ingredient_id: &str, supplier_id: &str, price_cents: i64) -> SupplierOffer {
        SupplierOffer {
            ingredient_id: ingredient_id.to_string(),
            supplier_id: supplier_id.to_string(),
            quality_level: 2,
            pack_size: Decimal::new(10, 0),
            pack_unit: "kg".to_string(),
            unit_price_ht: Decimal::new(price_cents, 2),
            vat_rate: Decimal::new(10, 2),
            moq_qty: Decimal::ZERO,
            moq_value: Decimal::new(5000, 2),
            lead_time_days: 2,
            reliability: Decimal::new(9, 1),
            available: true,
        }
    }

    pub fn recipe(id: &str, ingredient_id: &str, qty_brute_milli: i64, portions: u32) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            items: vec![RecipeItem {
                ingredient_id: ingredient_id.to_string(),
                qty_brute: Decimal::new(qty_brute_milli, 3),
                yield_prep: Decimal::ONE,
                yield_cook: Decimal::ONE,
            }],
            prep_minutes: 15,
            service_minutes: 10,
            portions,
            category: "main".to_string(),
            difficulty: 2,
            description: String::new(),
        }
    }

    pub fn small_catalog() -> Catalog {
        Catalog::new(
            vec![ingredient("tomato", 100, 5), ingredient("pasta", 150, 365)],
            vec![],
            vec![recipe("pasta_pomodoro", "pasta", 120, 1)],
            vec![supplier("metro")],
            vec![offer("tomato", "metro", 100), offer("pasta", "metro", 150)],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn builds_and_looks_up() {
        let catalog = small_catalog();
        assert!(catalog.ingredient("tomato").is_some());
        assert!(catalog.recipe("pasta_pomodoro").is_some());
        assert_eq!(catalog.offers_for("tomato").len(), 1);
    }

    #[test]
    fn rejects_unknown_recipe_ingredient() {
        let err = Catalog::new(
            vec![ingredient("tomato", 100, 5)],
            vec![],
            vec![recipe("mystery_dish", "truffle", 100, 2)],
            vec![supplier("metro")],
            vec![],
        )
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownRecipeIngredient {
                recipe_id: "mystery_dish".to_string(),
                ingredient_id: "truffle".to_string(),
            }
        );
    }

    #[test]
    fn rejects_zero_pack_size() {
        let mut bad = offer("tomato", "metro", 100);
        bad.pack_size = Decimal::ZERO;
        let err = Catalog::new(
            vec![ingredient("tomato", 100, 5)],
            vec![],
            vec![],
            vec![supplier("metro")],
            vec![bad],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPackSize { .. }));
    }

    #[test]
    fn rejects_duplicate_offer_key() {
        let err = Catalog::new(
            vec![ingredient("tomato", 100, 5)],
            vec![],
            vec![],
            vec![supplier("metro")],
            vec![offer("tomato", "metro", 100), offer("tomato", "metro", 90)],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateOffer { .. }));
    }

    #[test]
    fn quality_multiplier_falls_back_to_tier_table() {
        let catalog = small_catalog();
        assert_eq!(
            catalog.quality_cost_multiplier("tomato", 1),
            Decimal::new(70, 2)
        );
        assert_eq!(
            catalog.quality_cost_multiplier("tomato", 5),
            Decimal::new(200, 2)
        );
        assert_eq!(catalog.quality_cost_multiplier("tomato", 9), Decimal::ONE);
    }

    #[test]
    fn variant_overrides_tier_table() {
        let variant = QualityVariant {
            base_ingredient_id: "tomato".to_string(),
            quality_level: 3,
            range_tag: "fresh_local".to_string(),
            supplier_id: "metro".to_string(),
            modifiers: QualityModifiers {
                cost_multiplier: Decimal::new(135, 2),
                satisfaction_bonus: Decimal::new(15, 2),
                prep_time_multiplier: Decimal::ONE,
                shelf_life_multiplier: Decimal::new(12, 1),
            },
        };
        let catalog = Catalog::new(
            vec![ingredient("tomato", 100, 5)],
            vec![variant],
            vec![],
            vec![supplier("metro")],
            vec![],
        )
        .unwrap();
        assert_eq!(
            catalog.quality_cost_multiplier("tomato", 3),
            Decimal::new(135, 2)
        );
        // 5 days * 1.2 = 6 days -> +1 day against the base shelf life.
        assert_eq!(catalog.shelf_life_adjustment("tomato", Some(3)), 1);
    }

    #[test]
    fn level_keyed_shelf_life_rule() {
        let catalog = small_catalog();
        assert_eq!(catalog.shelf_life_adjustment("tomato", Some(1)), -2);
        assert_eq!(catalog.shelf_life_adjustment("tomato", Some(3)), 0);
        assert_eq!(catalog.shelf_life_adjustment("tomato", Some(5)), 2);
        assert_eq!(catalog.shelf_life_adjustment("tomato", None), 0);
    }

    #[test]
    fn recipe_net_quantity_applies_yields() {
        let item = RecipeItem {
            ingredient_id: "potato".to_string(),
            qty_brute: Decimal::new(130, 3),
            yield_prep: Decimal::new(85, 2),
            yield_cook: Decimal::new(90, 2),
        };
        assert_eq!(item.net_qty(), Decimal::new(99_450, 6));
    }
}
