//! FEFO stock engine: lot store keyed by ingredient, consumed in
//! First-Expired-First-Out order.
//!
//! Lots are created by goods receipts, mutated only by consumption and the
//! expiry sweep, and purged as soon as their quantity reaches zero. Equal
//! expiry dates are broken by reception date, then by insertion order; the
//! order is stable so identical inputs always consume identical slices.

use crate::money::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A quantity of one ingredient received on a date, with its own cost and
/// use-by date (DLC).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockLot {
    pub ingredient_id: String,
    pub quantity: Decimal,
    /// Use-by date; the lot is expired once today is past it.
    pub dlc: NaiveDate,
    pub unit_cost_ht: Money,
    pub vat_rate: Decimal,
    pub supplier_id: String,
    pub received_date: NaiveDate,
    pub lot_number: Option<String>,
}

impl StockLot {
    /// Validate the lot invariants: non-negative quantity and cost, VAT in
    /// [0, 1], reception on or before the DLC.
    pub fn validate(&self) -> Result<(), StockError> {
        if self.quantity < Decimal::ZERO {
            return Err(StockError::InvalidLot(format!(
                "negative quantity on lot of {}",
                self.ingredient_id
            )));
        }
        if self.unit_cost_ht < Decimal::ZERO {
            return Err(StockError::InvalidLot(format!(
                "negative unit cost on lot of {}",
                self.ingredient_id
            )));
        }
        if self.vat_rate < Decimal::ZERO || self.vat_rate > Decimal::ONE {
            return Err(StockError::InvalidLot(format!(
                "vat rate out of [0, 1] on lot of {}",
                self.ingredient_id
            )));
        }
        if self.dlc < self.received_date {
            return Err(StockError::InvalidLot(format!(
                "lot of {} expires before its reception date",
                self.ingredient_id
            )));
        }
        Ok(())
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.dlc
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.dlc - today).num_days()
    }

    pub fn value_ht(&self) -> Money {
        self.quantity * self.unit_cost_ht
    }
}

/// One slice of a FEFO consumption: which lot was drawn, how much, at what
/// cost. Slices are the source of truth for COGS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumedSlice {
    pub ingredient_id: String,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub unit_cost_ht: Money,
    pub dlc: NaiveDate,
    pub supplier_id: String,
}

impl ConsumedSlice {
    pub fn cost_ht(&self) -> Money {
        self.quantity * self.unit_cost_ht
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StockError {
    #[error("insufficient stock of {ingredient_id}: requested {requested}, available {available}")]
    InsufficientStock {
        ingredient_id: String,
        requested: Decimal,
        available: Decimal,
    },
    #[error("invalid lot: {0}")]
    InvalidLot(String),
}

/// Per-ingredient lot store with FEFO consumption.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StockManager {
    /// Lots per ingredient, kept sorted by (DLC, received date) with stable
    /// insertion order among equals.
    lots: BTreeMap<String, Vec<StockLot>>,
}

impl StockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a lot, keeping the ingredient's list in FEFO order.
    pub fn add_lot(&mut self, lot: StockLot) -> Result<(), StockError> {
        lot.validate()?;
        let lots = self.lots.entry(lot.ingredient_id.clone()).or_default();
        lots.push(lot);
        // Stable sort: equal (dlc, received) keep insertion order.
        lots.sort_by_key(|l| (l.dlc, l.received_date));
        Ok(())
    }

    /// Total quantity of one ingredient.
    pub fn available(&self, ingredient_id: &str, today: NaiveDate, exclude_expired: bool) -> Decimal {
        self.lots
            .get(ingredient_id)
            .map(|lots| {
                lots.iter()
                    .filter(|l| !exclude_expired || !l.is_expired(today))
                    .map(|l| l.quantity)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO)
    }

    /// Consume `quantity` of an ingredient from the earliest-expiring lots.
    ///
    /// Transactional: when the non-expired stock cannot cover the request no
    /// lot is touched and `InsufficientStock` is returned.
    pub fn consume(
        &mut self,
        ingredient_id: &str,
        quantity: Decimal,
        today: NaiveDate,
    ) -> Result<Vec<ConsumedSlice>, StockError> {
        let available = self.available(ingredient_id, today, true);
        if quantity > available {
            return Err(StockError::InsufficientStock {
                ingredient_id: ingredient_id.to_string(),
                requested: quantity,
                available,
            });
        }

        let mut slices = Vec::new();
        let mut remaining = quantity;
        if let Some(lots) = self.lots.get_mut(ingredient_id) {
            for lot in lots.iter_mut() {
                if remaining <= Decimal::ZERO {
                    break;
                }
                if lot.is_expired(today) {
                    continue;
                }
                let drawn = remaining.min(lot.quantity);
                if drawn <= Decimal::ZERO {
                    continue;
                }
                lot.quantity -= drawn;
                remaining -= drawn;
                slices.push(ConsumedSlice {
                    ingredient_id: lot.ingredient_id.clone(),
                    lot_number: lot.lot_number.clone(),
                    quantity: drawn,
                    unit_cost_ht: lot.unit_cost_ht,
                    dlc: lot.dlc,
                    supplier_id: lot.supplier_id.clone(),
                });
            }
            lots.retain(|l| l.quantity > Decimal::ZERO);
        }
        debug_assert!(remaining <= Decimal::ZERO);
        self.lots.retain(|_, lots| !lots.is_empty());
        Ok(slices)
    }

    /// Remove and return every expired lot.
    pub fn sweep_expired(&mut self, today: NaiveDate) -> Vec<StockLot> {
        let mut removed = Vec::new();
        for lots in self.lots.values_mut() {
            let mut kept = Vec::with_capacity(lots.len());
            for lot in lots.drain(..) {
                if lot.is_expired(today) {
                    removed.push(lot);
                } else {
                    kept.push(lot);
                }
            }
            *lots = kept;
        }
        self.lots.retain(|_, lots| !lots.is_empty());
        removed
    }

    /// Lots expiring within `days` days (today included).
    pub fn near_expiry(&self, today: NaiveDate, days: i64) -> Vec<StockLot> {
        self.lots
            .values()
            .flatten()
            .filter(|l| {
                let left = l.days_until_expiry(today);
                (0..=days).contains(&left)
            })
            .cloned()
            .collect()
    }

    /// Stock value HT over non-expired lots, for one ingredient or all.
    pub fn value_ht(&self, ingredient_id: Option<&str>, today: NaiveDate) -> Money {
        self.lots
            .iter()
            .filter(|(id, _)| ingredient_id.map_or(true, |wanted| wanted == id.as_str()))
            .flat_map(|(_, lots)| lots.iter())
            .filter(|l| !l.is_expired(today))
            .map(StockLot::value_ht)
            .sum()
    }

    /// Ids of ingredients currently holding stock.
    pub fn ingredient_ids(&self) -> impl Iterator<Item = &str> {
        self.lots.keys().map(String::as_str)
    }

    pub fn lots_for(&self, ingredient_id: &str) -> &[StockLot] {
        self.lots
            .get(ingredient_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
