//! Procurement: net requirements, offer selection and goods receiving.
//!
//! Order quantities always land on whole supplier packs. When an order would
//! fall under the supplier's minimum order value it is topped up to the MOQ
//! and then rounded up to the pack size again.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use sim_core::{
    Catalog, DeliveryLine, GoodsReceipt, GoodsReceiptLine, PendingPurchaseOrder, PoStatus,
    PurchaseOrderLine, ReceivingError, StockLot, StockManager, SupplierOffer,
};
use std::collections::BTreeMap;

/// Net ingredient requirements for a sales forecast.
///
/// Gross need per ingredient is the forecast portions scaled by the recipe's
/// per-batch quantities; the non-expired stock on hand is deducted.
pub fn compute_requirements(
    catalog: &Catalog,
    forecast: &BTreeMap<String, u32>,
    stock: &StockManager,
    today: NaiveDate,
) -> BTreeMap<String, Decimal> {
    let mut gross: BTreeMap<String, Decimal> = BTreeMap::new();
    for (recipe_id, portions) in forecast {
        if *portions == 0 {
            continue;
        }
        let Some(recipe) = catalog.recipe(recipe_id) else {
            continue;
        };
        let ratio = Decimal::from(*portions) / Decimal::from(recipe.portions);
        for item in &recipe.items {
            *gross.entry(item.ingredient_id.clone()).or_insert(Decimal::ZERO) +=
                item.qty_brute * ratio;
        }
    }

    gross
        .into_iter()
        .filter_map(|(ingredient_id, need)| {
            let available = stock.available(&ingredient_id, today, true);
            let net = need - available;
            (net > Decimal::ZERO).then_some((ingredient_id, net))
        })
        .collect()
}

/// Round a target quantity up to whole packs, then top up to the supplier's
/// minimum order value and round up to packs once more.
fn order_quantity(target: Decimal, offer: &SupplierOffer) -> Decimal {
    let packs = (target / offer.pack_size).ceil();
    let mut qty = packs * offer.pack_size;
    if qty < offer.moq_qty {
        qty = (offer.moq_qty / offer.pack_size).ceil() * offer.pack_size;
    }
    let value = qty * offer.unit_price_ht;
    if value < offer.moq_value && offer.unit_price_ht > Decimal::ZERO {
        let deficit = offer.moq_value - value;
        qty += (deficit / offer.unit_price_ht).ceil();
        qty = (qty / offer.pack_size).ceil() * offer.pack_size;
    }
    qty
}

/// Offer score: order value plus a lead-time penalty minus a reliability
/// bonus. Lower is better.
fn offer_score(qty: Decimal, offer: &SupplierOffer) -> Decimal {
    qty * offer.unit_price_ht + Decimal::new(5, 1) * Decimal::from(offer.lead_time_days)
        - Decimal::new(10, 0) * offer.reliability
}

fn line_from_offer(offer: &SupplierOffer, qty: Decimal) -> PurchaseOrderLine {
    PurchaseOrderLine {
        ingredient_id: offer.ingredient_id.clone(),
        quantity: qty,
        unit_price_ht: offer.unit_price_ht,
        vat_rate: offer.vat_rate,
        supplier_id: offer.supplier_id.clone(),
        pack_size: offer.pack_size,
        pack_unit: offer.pack_unit.clone(),
        quality_level: Some(offer.quality_level),
        eta_days: offer.lead_time_days,
        received_qty: Decimal::ZERO,
        accepted_qty: Decimal::ZERO,
        status: PoStatus::Open,
    }
}

/// Propose one purchase order line per required ingredient.
///
/// When the restaurant has picked a quality tier for an ingredient and
/// matching offers exist, only those offers compete; otherwise every
/// available offer does. Ties on score break by lower price, shorter lead
/// time, higher reliability, then supplier id.
pub fn propose_orders(
    catalog: &Catalog,
    requirements: &BTreeMap<String, Decimal>,
    safety_stock: &BTreeMap<String, Decimal>,
    quality_choices: &BTreeMap<String, u8>,
) -> Vec<PurchaseOrderLine> {
    let mut lines = Vec::new();
    for (ingredient_id, need) in requirements {
        let target = *need + safety_stock.get(ingredient_id).copied().unwrap_or(Decimal::ZERO);
        let offers = catalog.offers_for(ingredient_id);
        let chosen_level = quality_choices.get(ingredient_id).copied();
        let tier_matches: Vec<&SupplierOffer> = match chosen_level {
            Some(level) => offers
                .iter()
                .copied()
                .filter(|o| o.quality_level == level)
                .collect(),
            None => Vec::new(),
        };
        let pool: &[&SupplierOffer] = if tier_matches.is_empty() {
            &offers
        } else {
            &tier_matches
        };

        let mut best: Option<(Decimal, &SupplierOffer, Decimal)> = None;
        for &offer in pool {
            let qty = order_quantity(target, offer);
            let score = offer_score(qty, offer);
            let better = match &best {
                None => true,
                Some((best_score, best_offer, _)) => {
                    (
                        score,
                        offer.unit_price_ht,
                        offer.lead_time_days,
                        -offer.reliability,
                        offer.supplier_id.as_str(),
                    ) < (
                        *best_score,
                        best_offer.unit_price_ht,
                        best_offer.lead_time_days,
                        -best_offer.reliability,
                        best_offer.supplier_id.as_str(),
                    )
                }
            };
            if better {
                best = Some((score, offer, qty));
            }
        }
        if let Some((_, offer, qty)) = best {
            lines.push(line_from_offer(offer, qty));
        }
    }
    lines
}

/// Build a manually picked order line: any offer, any quantity at least the
/// need; pack rounding and MOQ still apply.
pub fn manual_order_line(offer: &SupplierOffer, quantity: Decimal) -> PurchaseOrderLine {
    line_from_offer(offer, order_quantity(quantity, offer))
}

/// Convert a delivery into stock lots and close out the matching PO lines.
///
/// Each delivery line matches the first non-closed PO line for the same
/// ingredient. The lot's use-by date is the reception date plus the
/// ingredient's shelf life, adjusted by the delivered quality tier.
pub fn receive_delivery(
    catalog: &Catalog,
    order: &mut PendingPurchaseOrder,
    deliveries: &[DeliveryLine],
    received_date: NaiveDate,
    allow_over_delivery: bool,
) -> Result<(GoodsReceipt, Vec<StockLot>), ReceivingError> {
    let mut receipt_lines = Vec::with_capacity(deliveries.len());
    let mut lots = Vec::with_capacity(deliveries.len());
    let mut total_ht = Decimal::ZERO;
    let mut total_ttc = Decimal::ZERO;

    for delivery in deliveries {
        let ingredient = catalog
            .ingredient(&delivery.ingredient_id)
            .ok_or_else(|| ReceivingError::UnknownIngredient(delivery.ingredient_id.clone()))?;

        let line = order
            .lines
            .iter_mut()
            .find(|l| l.ingredient_id == delivery.ingredient_id && l.status != PoStatus::Closed)
            .ok_or_else(|| ReceivingError::NoMatchingLine {
                po_id: order.id.clone(),
                ingredient_id: delivery.ingredient_id.clone(),
            })?;

        let accepted = line.record_receipt(delivery.quantity_received, allow_over_delivery);

        let shelf_life = i64::from(ingredient.shelf_life_days)
            + catalog.shelf_life_adjustment(&ingredient.id, delivery.quality_level);
        let dlc = received_date + Duration::days(shelf_life.max(0));

        let mut line_lots = Vec::new();
        if accepted > Decimal::ZERO {
            let lot = StockLot {
                ingredient_id: delivery.ingredient_id.clone(),
                quantity: accepted,
                dlc,
                unit_cost_ht: delivery.unit_price_ht,
                vat_rate: delivery.vat_rate,
                supplier_id: delivery.supplier_id.clone(),
                received_date,
                lot_number: delivery.lot_number.clone(),
            };
            lots.push(lot.clone());
            line_lots.push(lot);
        }

        let amount_ht = accepted * delivery.unit_price_ht;
        total_ht += amount_ht;
        total_ttc += amount_ht * (Decimal::ONE + delivery.vat_rate);

        receipt_lines.push(GoodsReceiptLine {
            ingredient_id: delivery.ingredient_id.clone(),
            qty_ordered: line.quantity,
            qty_delivered: delivery.quantity_received,
            qty_accepted: accepted,
            unit_price_ht: delivery.unit_price_ht,
            vat_rate: delivery.vat_rate,
            supplier_id: delivery.supplier_id.clone(),
            lots: line_lots,
        });
    }

    let status = if order.lines.iter().all(|l| l.status == PoStatus::Closed) {
        PoStatus::Closed
    } else if order
        .lines
        .iter()
        .any(|l| l.accepted_qty > Decimal::ZERO)
    {
        PoStatus::Partial
    } else {
        PoStatus::Open
    };

    Ok((
        GoodsReceipt {
            date: received_date,
            lines: receipt_lines,
            total_ht,
            total_ttc,
            status,
        },
        lots,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{Ingredient, Recipe, RecipeItem, Supplier};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn ingredient(id: &str, cost_cents: i64, shelf: u16) -> Ingredient {
        Ingredient {
            id: id.to_string(),
            name: id.to_string(),
            unit: "kg".to_string(),
            cost_ht: Decimal::new(cost_cents, 2),
            vat_rate: Decimal::new(10, 2),
            shelf_life_days: shelf,
            category: "food_onsite".to_string(),
            density: None,
        }
    }

    fn supplier(id: &str) -> Supplier {
        Supplier {
            id: id.to_string(),
            name: id.to_string(),
            reliability: Decimal::new(9, 1),
            lead_time_days: 2,
            min_order_value: Decimal::new(5000, 2),
            shipping_cost: Decimal::ZERO,
            payment_terms_days: 30,
            discount_threshold: None,
            discount_rate: None,
        }
    }

    fn offer(
        ingredient_id: &str,
        supplier_id: &str,
        price_cents: i64,
        pack: i64,
        moq_value_cents: i64,
        lead: u16,
        reliability_tenths: i64,
    ) -> SupplierOffer {
        SupplierOffer {
            ingredient_id: ingredient_id.to_string(),
            supplier_id: supplier_id.to_string(),
            quality_level: 2,
            pack_size: Decimal::new(pack, 0),
            pack_unit: "kg".to_string(),
            unit_price_ht: Decimal::new(price_cents, 2),
            vat_rate: Decimal::new(10, 2),
            moq_qty: Decimal::ZERO,
            moq_value: Decimal::new(moq_value_cents, 2),
            lead_time_days: lead,
            reliability: Decimal::new(reliability_tenths, 1),
            available: true,
        }
    }

    fn catalog() -> Catalog {
        let recipe = Recipe {
            id: "soup".to_string(),
            name: "Soup".to_string(),
            items: vec![RecipeItem {
                ingredient_id: "tomato".to_string(),
                qty_brute: Decimal::new(2, 0),
                yield_prep: Decimal::ONE,
                yield_cook: Decimal::ONE,
            }],
            prep_minutes: 10,
            service_minutes: 5,
            portions: 4,
            category: "starter".to_string(),
            difficulty: 1,
            description: String::new(),
        };
        Catalog::new(
            vec![ingredient("tomato", 100, 5)],
            vec![],
            vec![recipe],
            vec![supplier("metro"), supplier("rungis")],
            vec![
                offer("tomato", "metro", 200, 10, 5000, 2, 9),
                offer("tomato", "rungis", 210, 10, 0, 1, 9),
            ],
        )
        .unwrap()
    }

    #[test]
    fn requirements_scale_by_forecast_and_deduct_stock() {
        let catalog = catalog();
        let mut stock = StockManager::new();
        stock
            .add_lot(StockLot {
                ingredient_id: "tomato".to_string(),
                quantity: Decimal::new(3, 0),
                dlc: date(20),
                unit_cost_ht: Decimal::ONE,
                vat_rate: Decimal::new(10, 2),
                supplier_id: "metro".to_string(),
                received_date: date(1),
                lot_number: None,
            })
            .unwrap();

        // 16 portions of a 4-portion batch needing 2kg -> gross 8kg, minus 3 in stock.
        let forecast = BTreeMap::from([("soup".to_string(), 16u32)]);
        let needs = compute_requirements(&catalog, &forecast, &stock, date(2));
        assert_eq!(needs["tomato"], Decimal::new(5, 0));
    }

    #[test]
    fn fully_stocked_ingredient_drops_out() {
        let catalog = catalog();
        let mut stock = StockManager::new();
        stock
            .add_lot(StockLot {
                ingredient_id: "tomato".to_string(),
                quantity: Decimal::new(100, 0),
                dlc: date(20),
                unit_cost_ht: Decimal::ONE,
                vat_rate: Decimal::new(10, 2),
                supplier_id: "metro".to_string(),
                received_date: date(1),
                lot_number: None,
            })
            .unwrap();
        let forecast = BTreeMap::from([("soup".to_string(), 16u32)]);
        let needs = compute_requirements(&catalog, &forecast, &stock, date(2));
        assert!(needs.is_empty());
    }

    #[test]
    fn moq_top_up_then_pack_round_again() {
        // Pack 10 at 2.00, MOQ value 50.00, need 7:
        // ceil(7/10)*10 = 10 -> 20.00 < 50.00 -> +ceil(30/2)=15 -> 25 -> 30.
        let o = offer("tomato", "metro", 200, 10, 5000, 2, 9);
        assert_eq!(order_quantity(Decimal::new(7, 0), &o), Decimal::new(30, 0));
    }

    #[test]
    fn order_without_moq_pressure_stays_on_packs() {
        let o = offer("tomato", "rungis", 210, 10, 0, 1, 9);
        assert_eq!(order_quantity(Decimal::new(7, 0), &o), Decimal::new(10, 0));
        assert_eq!(order_quantity(Decimal::new(10, 0), &o), Decimal::new(10, 0));
        assert_eq!(order_quantity(Decimal::new(11, 0), &o), Decimal::new(20, 0));
    }

    #[test]
    fn cheapest_total_score_wins() {
        let catalog = catalog();
        let needs = BTreeMap::from([("tomato".to_string(), Decimal::new(7, 0))]);
        let lines = propose_orders(&catalog, &needs, &BTreeMap::new(), &BTreeMap::new());
        assert_eq!(lines.len(), 1);
        // metro: qty 30 (MOQ) at 2.00 -> 60 + 1 - 9 = 52
        // rungis: qty 10 at 2.10 -> 21 + 0.5 - 9 = 12.5 -> rungis wins
        assert_eq!(lines[0].supplier_id, "rungis");
        assert_eq!(lines[0].quantity, Decimal::new(10, 0));
    }

    #[test]
    fn receipt_creates_lot_with_quality_adjusted_dlc() {
        let catalog = catalog();
        let mut order = PendingPurchaseOrder {
            id: "po-1".to_string(),
            created_turn: 1,
            due_date: date(3),
            lines: vec![manual_order_line(
                &offer("tomato", "metro", 200, 10, 0, 2, 9),
                Decimal::new(10, 0),
            )],
        };
        let deliveries = vec![DeliveryLine {
            ingredient_id: "tomato".to_string(),
            quantity_received: Decimal::new(10, 0),
            unit_price_ht: Decimal::new(200, 2),
            vat_rate: Decimal::new(10, 2),
            supplier_id: "metro".to_string(),
            pack_size: Decimal::new(10, 0),
            lot_number: Some("L1".to_string()),
            quality_level: Some(1),
        }];
        let (receipt, lots) =
            receive_delivery(&catalog, &mut order, &deliveries, date(3), false).unwrap();

        assert_eq!(lots.len(), 1);
        // Shelf life 5 days, level 1 adjustment -2 -> DLC = 3 + 3 days.
        assert_eq!(lots[0].dlc, date(6));
        assert_eq!(receipt.status, PoStatus::Closed);
        assert_eq!(order.lines[0].status, PoStatus::Closed);
        assert_eq!(receipt.total_ht, Decimal::new(2000, 2));
    }

    #[test]
    fn partial_delivery_keeps_line_open() {
        let catalog = catalog();
        let mut order = PendingPurchaseOrder {
            id: "po-1".to_string(),
            created_turn: 1,
            due_date: date(3),
            lines: vec![manual_order_line(
                &offer("tomato", "metro", 200, 10, 0, 2, 9),
                Decimal::new(20, 0),
            )],
        };
        let deliveries = vec![DeliveryLine {
            ingredient_id: "tomato".to_string(),
            quantity_received: Decimal::new(10, 0),
            unit_price_ht: Decimal::new(200, 2),
            vat_rate: Decimal::new(10, 2),
            supplier_id: "metro".to_string(),
            pack_size: Decimal::new(10, 0),
            lot_number: None,
            quality_level: Some(3),
        }];
        let (receipt, _) =
            receive_delivery(&catalog, &mut order, &deliveries, date(3), false).unwrap();
        assert_eq!(receipt.status, PoStatus::Partial);
        assert_eq!(order.lines[0].accepted_qty, Decimal::new(10, 0));
    }

    proptest::proptest! {
        #[test]
        fn order_quantity_respects_pack_and_moq(
            need in 1i64..500,
            pack in 1i64..50,
            price_cents in 1i64..2000,
            moq_cents in 0i64..100_000,
        ) {
            let o = offer("tomato", "metro", price_cents, pack, moq_cents, 2, 9);
            let qty = order_quantity(Decimal::new(need, 0), &o);
            proptest::prop_assert!(qty >= Decimal::new(need, 0));
            proptest::prop_assert_eq!(qty % o.pack_size, Decimal::ZERO);
            proptest::prop_assert!(qty * o.unit_price_ht >= o.moq_value);
        }
    }

    #[test]
    fn unknown_ingredient_is_a_receiving_error() {
        let catalog = catalog();
        let mut order = PendingPurchaseOrder {
            id: "po-1".to_string(),
            created_turn: 1,
            due_date: date(3),
            lines: vec![],
        };
        let deliveries = vec![DeliveryLine {
            ingredient_id: "caviar".to_string(),
            quantity_received: Decimal::ONE,
            unit_price_ht: Decimal::ONE,
            vat_rate: Decimal::new(10, 2),
            supplier_id: "metro".to_string(),
            pack_size: Decimal::ONE,
            lot_number: None,
            quality_level: None,
        }];
        let err = receive_delivery(&catalog, &mut order, &deliveries, date(3), false).unwrap_err();
        assert_eq!(err, ReceivingError::UnknownIngredient("caviar".to_string()));
    }
}
