//! Per-turn results surfaced by the turn engine.

use crate::events::EventInstance;
use crate::ledger::{LedgerEntry, PnlSummary};
use crate::money::Money;
use crate::stock::{ConsumedSlice, StockLot};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Recoverable conditions recorded during a turn instead of aborting it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnWarning {
    /// Stock could not cover the demand for a recipe; production was cut.
    InsufficientStock {
        restaurant_id: String,
        recipe_id: String,
        requested_portions: u32,
        produced_portions: u32,
    },
}

/// Outcome of one turn for one restaurant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub restaurant_id: String,
    /// Customers the allocator sent to this restaurant.
    pub allocated_demand: u32,
    /// Customers actually served after stock constraints.
    pub served_customers: u32,
    pub capacity: u32,
    /// served / capacity, 0 when closed.
    pub utilization: f64,
    pub revenue: Money,
    pub average_ticket: Money,
    /// Allocated but not served (capacity was reserved, stock ran short).
    pub lost_customers: u32,
    pub pnl: PnlSummary,
    pub cash_after: Money,
    pub negative_cash: bool,
    /// Satisfaction sample pushed this turn, when any customer was served.
    pub satisfaction: Option<Decimal>,
    pub reputation_after: Decimal,
    /// FEFO slices consumed this turn; the source of COGS.
    pub consumption: Vec<ConsumedSlice>,
}

/// Deterministic result of `run_turn`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// One-based turn index.
    pub turn: u32,
    pub date: NaiveDate,
    /// Total demand drawn this turn, before per-segment modifiers.
    pub total_demand: u32,
    /// Demand per segment after event and seasonal modifiers.
    pub segment_demand: BTreeMap<String, u32>,
    pub per_restaurant: Vec<TurnResult>,
    pub new_events: Vec<EventInstance>,
    pub ledger_delta: Vec<LedgerEntry>,
    /// Lots written off by the expiry sweep.
    pub waste: Vec<StockLot>,
    pub warnings: Vec<TurnWarning>,
}

impl TurnOutcome {
    pub fn result_for(&self, restaurant_id: &str) -> Option<&TurnResult> {
        self.per_restaurant
            .iter()
            .find(|r| r.restaurant_id == restaurant_id)
    }
}
