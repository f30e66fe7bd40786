//! Per-restaurant mutable state: menu, staffing, quality choices, roster,
//! reputation, stock and outstanding commitments.

use crate::employee::Employee;
use crate::money::Money;
use crate::orders::PendingPurchaseOrder;
use crate::stock::StockManager;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Restaurant concepts, each with its own labor cost and quality baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RestaurantType {
    Fast,
    Classic,
    Brasserie,
    Gastronomique,
}

impl RestaurantType {
    /// Multiplier on the base hourly labor rate.
    pub fn labor_cost_factor(self) -> Decimal {
        match self {
            RestaurantType::Fast => Decimal::new(85, 2),
            RestaurantType::Classic => Decimal::ONE,
            RestaurantType::Brasserie => Decimal::new(110, 2),
            RestaurantType::Gastronomique => Decimal::new(140, 2),
        }
    }

    /// Baseline quality score when no explicit ingredient choices exist.
    pub fn quality_baseline(self) -> Decimal {
        match self {
            RestaurantType::Fast => Decimal::new(20, 1),
            RestaurantType::Classic => Decimal::new(25, 1),
            RestaurantType::Brasserie => Decimal::new(30, 1),
            RestaurantType::Gastronomique => Decimal::new(35, 1),
        }
    }
}

/// Who drives this restaurant's decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantController {
    #[default]
    Human,
    Ai,
}

/// A running marketing campaign boosting attractiveness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketingCampaign {
    /// Multiplier applied to the attractiveness score while active.
    pub boost: f64,
    pub remaining_turns: u32,
}

/// An outstanding loan, repaid linearly over its term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub principal: Money,
    pub outstanding: Money,
    pub annual_rate: Decimal,
    pub term_turns: u32,
    pub remaining_turns: u32,
}

/// Bounded length of the satisfaction history.
pub const SATISFACTION_HISTORY_LEN: usize = 10;

/// Staffing factor per level: closed, light, normal, reinforced.
fn staffing_factor(level: u8) -> Decimal {
    match level {
        0 => Decimal::ZERO,
        1 => Decimal::new(7, 1),
        2 => Decimal::ONE,
        _ => Decimal::new(13, 1),
    }
}

/// A restaurant with its operational state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub kind: RestaurantType,
    /// Raw covers per turn at normal staffing before speed and crew.
    pub capacity_base: u32,
    /// Service speed coefficient, strictly positive.
    pub speed_service: Decimal,
    /// Recipe id -> TTC price; the full price card.
    pub menu: BTreeMap<String, Money>,
    /// Subset of the menu currently offered.
    pub active_recipes: BTreeSet<String>,
    pub employees: Vec<Employee>,
    pub cash: Money,
    pub equipment_value: Money,
    pub rent_monthly: Money,
    pub fixed_costs_monthly: Money,
    /// 0 = closed, 1 = light, 2 = normal, 3 = reinforced.
    pub staffing_level: u8,
    /// Ingredient id -> chosen quality level 1..=5.
    pub ingredient_choices: BTreeMap<String, u8>,
    /// Reputation on a 0..=10 scale.
    pub reputation: Decimal,
    /// Last satisfaction samples on a 1..=5 scale, bounded length.
    pub satisfaction_history: Vec<Decimal>,
    pub stock: StockManager,
    pub pending_orders: Vec<PendingPurchaseOrder>,
    pub loans: Vec<Loan>,
    pub campaigns: Vec<MarketingCampaign>,
    pub controller: RestaurantController,
    /// Utilization of the previous turn, for AI steering and reporting.
    pub last_utilization: f64,
    pub last_served: u32,
}

impl Restaurant {
    /// Recipes offered right now with their prices.
    pub fn active_menu(&self) -> BTreeMap<String, Money> {
        self.active_recipes
            .iter()
            .filter_map(|id| self.menu.get(id).map(|p| (id.clone(), *p)))
            .collect()
    }

    /// Median TTC price over the active menu, `None` when empty.
    pub fn median_active_price(&self) -> Option<Money> {
        let mut prices: Vec<Money> = self.active_menu().into_values().collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort();
        let mid = prices.len() / 2;
        if prices.len() % 2 == 1 {
            Some(prices[mid])
        } else {
            Some((prices[mid - 1] + prices[mid]) / Decimal::new(2, 0))
        }
    }

    /// Mean TTC price over the active menu.
    pub fn average_ticket(&self) -> Money {
        let menu = self.active_menu();
        if menu.is_empty() {
            return Decimal::ZERO;
        }
        let total: Money = menu.values().copied().sum();
        total / Decimal::from(menu.len() as u64)
    }

    /// Covers this restaurant can serve this turn.
    ///
    /// base x speed x staffing factor plus the crew contributions, summed
    /// exactly and floored once over the whole expression.
    pub fn capacity_current(&self) -> u32 {
        if self.staffing_level == 0 {
            return 0;
        }
        let mut total = Decimal::from(self.capacity_base)
            * self.speed_service
            * staffing_factor(self.staffing_level);
        for employee in &self.employees {
            total += employee.capacity_contribution(self.capacity_base);
        }
        total.floor().to_u32().unwrap_or(0)
    }

    /// Composite quality score on a 1..=5 scale.
    pub fn overall_quality_score(&self) -> Decimal {
        let baseline = self.kind.quality_baseline();
        if self.ingredient_choices.is_empty() {
            return baseline;
        }
        let total: Decimal = self
            .ingredient_choices
            .values()
            .map(|l| Decimal::from(*l))
            .sum();
        let avg = total / Decimal::from(self.ingredient_choices.len() as u64);
        let staff_bonus =
            Decimal::new(2, 1) * (Decimal::from(self.staffing_level) - Decimal::ONE);
        let score =
            baseline + Decimal::new(6, 1) * (avg - Decimal::new(2, 0)) + staff_bonus;
        score.clamp(Decimal::ONE, Decimal::new(5, 0))
    }

    /// Push a satisfaction sample, clamped to [1, 5], keeping the last ten.
    pub fn push_satisfaction(&mut self, satisfaction: Decimal) {
        let clamped = satisfaction.clamp(Decimal::ONE, Decimal::new(5, 0));
        self.satisfaction_history.push(clamped);
        if self.satisfaction_history.len() > SATISFACTION_HISTORY_LEN {
            let excess = self.satisfaction_history.len() - SATISFACTION_HISTORY_LEN;
            self.satisfaction_history.drain(..excess);
        }
    }

    /// Drift reputation toward twice the recent mean satisfaction.
    ///
    /// No-op while the history is empty.
    pub fn update_reputation(&mut self) {
        if self.satisfaction_history.is_empty() {
            return;
        }
        let total: Decimal = self.satisfaction_history.iter().copied().sum();
        let mean = total / Decimal::from(self.satisfaction_history.len() as u64);
        let target = mean * Decimal::new(2, 0);
        let drift = (target - self.reputation) * Decimal::new(15, 2);
        self.reputation =
            (self.reputation + drift).clamp(Decimal::ZERO, Decimal::new(10, 0));
    }

    /// Product of active campaign boosts, 1.0 when none runs.
    pub fn marketing_boost(&self) -> f64 {
        self.campaigns.iter().map(|c| c.boost).product::<f64>().max(0.0)
    }

    /// Age campaigns by one turn and drop the finished ones.
    pub fn tick_campaigns(&mut self) {
        for c in &mut self.campaigns {
            c.remaining_turns = c.remaining_turns.saturating_sub(1);
        }
        self.campaigns.retain(|c| c.remaining_turns > 0);
    }

    /// Total monthly fixed charges (rent + other fixed costs).
    pub fn monthly_fixed_total(&self) -> Money {
        self.rent_monthly + self.fixed_costs_monthly
    }

    pub fn employee(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Open for business: staffed and with something on the menu.
    pub fn is_open(&self) -> bool {
        self.staffing_level > 0 && !self.active_menu().is_empty()
    }
}
