//! Purchase orders, deliveries and goods receipts.

use crate::money::Money;
use crate::stock::StockLot;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a purchase order line, derived from accepted vs ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoStatus {
    Open,
    Partial,
    Closed,
}

/// One line of a supplier purchase order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub ingredient_id: String,
    /// Ordered quantity, a whole multiple of the pack size.
    pub quantity: Decimal,
    pub unit_price_ht: Money,
    pub vat_rate: Decimal,
    pub supplier_id: String,
    pub pack_size: Decimal,
    pub pack_unit: String,
    pub quality_level: Option<u8>,
    /// Expected days until delivery.
    pub eta_days: u16,
    pub received_qty: Decimal,
    pub accepted_qty: Decimal,
    pub status: PoStatus,
}

impl PurchaseOrderLine {
    pub fn amount_ht(&self) -> Money {
        self.quantity * self.unit_price_ht
    }

    pub fn amount_ttc(&self) -> Money {
        self.amount_ht() * (Decimal::ONE + self.vat_rate)
    }

    /// Record a delivery against this line.
    ///
    /// Accepted quantity is capped at the ordered quantity unless
    /// `allow_over_delivery`; status follows from accepted vs ordered.
    pub fn record_receipt(&mut self, delivered: Decimal, allow_over_delivery: bool) -> Decimal {
        self.received_qty += delivered;
        let headroom = (self.quantity - self.accepted_qty).max(Decimal::ZERO);
        let accepted = if allow_over_delivery {
            delivered
        } else {
            delivered.min(headroom)
        };
        self.accepted_qty += accepted;
        self.status = if self.accepted_qty >= self.quantity {
            PoStatus::Closed
        } else if self.accepted_qty > Decimal::ZERO {
            PoStatus::Partial
        } else {
            PoStatus::Open
        };
        accepted
    }
}

/// A confirmed purchase order waiting for its delivery date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingPurchaseOrder {
    pub id: String,
    pub created_turn: u32,
    pub due_date: NaiveDate,
    pub lines: Vec<PurchaseOrderLine>,
}

/// A delivered quantity for one PO line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub ingredient_id: String,
    pub quantity_received: Decimal,
    pub unit_price_ht: Money,
    pub vat_rate: Decimal,
    pub supplier_id: String,
    pub pack_size: Decimal,
    pub lot_number: Option<String>,
    pub quality_level: Option<u8>,
}

/// One line of a goods receipt with the stock lots it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    pub ingredient_id: String,
    pub qty_ordered: Decimal,
    pub qty_delivered: Decimal,
    pub qty_accepted: Decimal,
    pub unit_price_ht: Money,
    pub vat_rate: Decimal,
    pub supplier_id: String,
    pub lots: Vec<StockLot>,
}

/// A goods receipt for one delivery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub date: NaiveDate,
    pub lines: Vec<GoodsReceiptLine>,
    pub total_ht: Money,
    pub total_ttc: Money,
    pub status: PoStatus,
}

/// Rejections raised while processing a delivery.
#[derive(Debug, Error, PartialEq)]
pub enum ReceivingError {
    #[error("delivery references unknown ingredient {0}")]
    UnknownIngredient(String),
    #[error("delivery references unknown purchase order {0}")]
    UnknownOrder(String),
    #[error("no open line for {ingredient_id} on order {po_id}")]
    NoMatchingLine { po_id: String, ingredient_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64) -> PurchaseOrderLine {
        PurchaseOrderLine {
            ingredient_id: "tomato".to_string(),
            quantity: Decimal::new(qty, 0),
            unit_price_ht: Decimal::new(200, 2),
            vat_rate: Decimal::new(10, 2),
            supplier_id: "metro".to_string(),
            pack_size: Decimal::new(10, 0),
            pack_unit: "kg".to_string(),
            quality_level: Some(2),
            eta_days: 2,
            received_qty: Decimal::ZERO,
            accepted_qty: Decimal::ZERO,
            status: PoStatus::Open,
        }
    }

    #[test]
    fn status_follows_accepted_quantity() {
        let mut l = line(30);
        assert_eq!(l.status, PoStatus::Open);

        let accepted = l.record_receipt(Decimal::new(10, 0), false);
        assert_eq!(accepted, Decimal::new(10, 0));
        assert_eq!(l.status, PoStatus::Partial);

        let accepted = l.record_receipt(Decimal::new(20, 0), false);
        assert_eq!(accepted, Decimal::new(20, 0));
        assert_eq!(l.status, PoStatus::Closed);
    }

    #[test]
    fn over_delivery_is_capped_by_default() {
        let mut l = line(30);
        let accepted = l.record_receipt(Decimal::new(45, 0), false);
        assert_eq!(accepted, Decimal::new(30, 0));
        assert_eq!(l.received_qty, Decimal::new(45, 0));
        assert_eq!(l.accepted_qty, Decimal::new(30, 0));
        assert_eq!(l.status, PoStatus::Closed);
    }

    #[test]
    fn over_delivery_accepted_when_allowed() {
        let mut l = line(30);
        let accepted = l.record_receipt(Decimal::new(45, 0), true);
        assert_eq!(accepted, Decimal::new(45, 0));
        assert_eq!(l.accepted_qty, Decimal::new(45, 0));
        assert_eq!(l.status, PoStatus::Closed);
    }

    #[test]
    fn amounts_include_vat() {
        let l = line(30);
        assert_eq!(l.amount_ht(), Decimal::new(6000, 2));
        assert_eq!(l.amount_ttc(), Decimal::new(660_000, 4));
    }
}
