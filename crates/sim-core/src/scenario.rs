//! Market scenarios: segments, turn cadence, seasons and validation.

use crate::employee::Contract;
use crate::money::Money;
use crate::restaurant::RestaurantType;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Season labels derived from the calendar month.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// Calendar span one turn represents; drives the accounting divisor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDuration {
    Week,
    #[default]
    Month,
}

impl TurnDuration {
    /// Number of turns that make up one month of fixed costs.
    pub fn monthly_divisor(self) -> Decimal {
        match self {
            TurnDuration::Week => Decimal::new(4, 0),
            TurnDuration::Month => Decimal::ONE,
        }
    }

    /// Advance the calendar by one turn.
    pub fn advance(self, date: NaiveDate) -> NaiveDate {
        match self {
            TurnDuration::Week => date + chrono::Duration::days(7),
            TurnDuration::Month => date + Months::new(1),
        }
    }

    /// Taxes accrue only on monthly turns.
    pub fn is_fiscal(self) -> bool {
        matches!(self, TurnDuration::Month)
    }
}

/// How served customers spread over a restaurant's active menu.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionPolicy {
    #[default]
    UniformOverMenu,
    SegmentWeighted,
}

/// Difficulty of the scripted AI competitors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDifficulty {
    Easy,
    #[default]
    Medium,
    /// Declared but not yet implemented; behaves like Medium.
    Hard,
}

/// A customer segment with budget, affinity and sensitivity profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSegment {
    pub name: String,
    /// Market share in [0, 1]; shares sum to ~1 across segments.
    pub share: Decimal,
    /// Typical budget per meal, TTC.
    pub budget: Money,
    /// Affinity coefficient per restaurant type; missing types default to 1.
    pub type_affinity: BTreeMap<RestaurantType, Decimal>,
    /// Price sensitivity in [0, 2].
    pub price_sensitivity: Decimal,
    /// Quality sensitivity in [0, 2].
    pub quality_sensitivity: Decimal,
    /// Optional demand factor per calendar month (1..=12).
    #[serde(default)]
    pub seasonality: BTreeMap<u32, Decimal>,
}

impl MarketSegment {
    pub fn seasonal_factor(&self, month: u32) -> Decimal {
        self.seasonality.get(&month).copied().unwrap_or(Decimal::ONE)
    }

    pub fn affinity_for(&self, kind: RestaurantType) -> Decimal {
        self.type_affinity.get(&kind).copied().unwrap_or(Decimal::ONE)
    }
}

/// A complete game scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    /// Number of turns in the game, strictly positive.
    pub turns: u32,
    /// Baseline customers per turn before noise and modifiers.
    pub base_demand: u32,
    /// Relative demand noise amplitude in [0, 1].
    pub demand_noise: Decimal,
    pub segments: Vec<MarketSegment>,
    /// VAT rate per ingredient/recipe category.
    #[serde(default)]
    pub vat_rates: BTreeMap<String, Decimal>,
    /// Employer social charge rate per contract kind.
    #[serde(default)]
    pub social_charges: BTreeMap<Contract, Decimal>,
    #[serde(default = "default_interest_rate")]
    pub interest_rate: Decimal,
    #[serde(default)]
    pub ai_competitors: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default)]
    pub turn_duration: TurnDuration,
    #[serde(default)]
    pub consumption_policy: ConsumptionPolicy,
    #[serde(default)]
    pub ai_difficulty: AiDifficulty,
    /// Corporate tax rate applied to positive profit on fiscal turns.
    #[serde(default)]
    pub corporate_tax_rate: Option<Decimal>,
    /// Cap on a single loan drawdown; no check when absent.
    #[serde(default)]
    pub loan_cap: Option<Money>,
}

fn default_interest_rate() -> Decimal {
    Decimal::new(5, 2)
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid default date")
}

impl Scenario {
    /// Validate the scenario invariants.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.turns == 0 {
            return Err(ScenarioError::NoTurns);
        }
        if self.base_demand == 0 {
            return Err(ScenarioError::NoDemand);
        }
        if self.demand_noise < Decimal::ZERO || self.demand_noise > Decimal::ONE {
            return Err(ScenarioError::InvalidNoise(self.demand_noise));
        }
        if self.segments.is_empty() {
            return Err(ScenarioError::NoSegments);
        }
        let total_share: Decimal = self.segments.iter().map(|s| s.share).sum();
        if total_share < Decimal::new(95, 2) || total_share > Decimal::new(105, 2) {
            return Err(ScenarioError::SharesOutOfBalance(total_share));
        }
        let two = Decimal::new(2, 0);
        for seg in &self.segments {
            if seg.share < Decimal::ZERO || seg.share > Decimal::ONE {
                return Err(ScenarioError::InvalidShare(seg.name.clone()));
            }
            if seg.budget <= Decimal::ZERO {
                return Err(ScenarioError::NonPositiveBudget(seg.name.clone()));
            }
            if seg.price_sensitivity < Decimal::ZERO
                || seg.price_sensitivity > two
                || seg.quality_sensitivity < Decimal::ZERO
                || seg.quality_sensitivity > two
            {
                return Err(ScenarioError::SensitivityOutOfRange(seg.name.clone()));
            }
            for affinity in seg.type_affinity.values() {
                if *affinity < Decimal::ZERO {
                    return Err(ScenarioError::NegativeAffinity(seg.name.clone()));
                }
            }
            for (month, factor) in &seg.seasonality {
                if !(1..=12).contains(month) {
                    return Err(ScenarioError::InvalidSeasonMonth(*month));
                }
                if *factor < Decimal::ZERO {
                    return Err(ScenarioError::NegativeSeasonFactor(seg.name.clone()));
                }
            }
        }
        for (category, rate) in &self.vat_rates {
            if *rate < Decimal::ZERO || *rate > Decimal::ONE {
                return Err(ScenarioError::InvalidRate(category.clone()));
            }
        }
        for rate in self.social_charges.values() {
            if *rate < Decimal::ZERO || *rate > Decimal::ONE {
                return Err(ScenarioError::InvalidRate("social_charges".to_string()));
            }
        }
        Ok(())
    }

    /// VAT rate for a category, 10% by default.
    pub fn vat_rate(&self, category: &str) -> Decimal {
        self.vat_rates
            .get(category)
            .copied()
            .unwrap_or(Decimal::new(10, 2))
    }

    /// Employer social charge rate for a contract kind.
    pub fn social_charge_rate(&self, contract: Contract) -> Decimal {
        self.social_charges
            .get(&contract)
            .copied()
            .unwrap_or_else(|| contract.default_employer_rate())
    }

    pub fn segment(&self, name: &str) -> Option<&MarketSegment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Calendar date at the start of a zero-based turn index.
    pub fn date_of_turn(&self, turn: u32) -> NaiveDate {
        let mut date = self.start_date;
        for _ in 0..turn {
            date = self.turn_duration.advance(date);
        }
        date
    }

    pub fn season_of(&self, date: NaiveDate) -> Season {
        Season::from_month(date.month())
    }
}

/// Validation errors for scenarios.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("scenario must have at least one turn")]
    NoTurns,
    #[error("base demand must be positive")]
    NoDemand,
    #[error("demand noise {0} is out of [0, 1]")]
    InvalidNoise(Decimal),
    #[error("scenario needs at least one segment")]
    NoSegments,
    #[error("segment shares sum to {0}, expected within [0.95, 1.05]")]
    SharesOutOfBalance(Decimal),
    #[error("segment {0} has a share outside [0, 1]")]
    InvalidShare(String),
    #[error("segment {0} needs a positive budget")]
    NonPositiveBudget(String),
    #[error("segment {0} has a sensitivity outside [0, 2]")]
    SensitivityOutOfRange(String),
    #[error("segment {0} has a negative type affinity")]
    NegativeAffinity(String),
    #[error("seasonality month {0} is out of 1..=12")]
    InvalidSeasonMonth(u32),
    #[error("segment {0} has a negative seasonality factor")]
    NegativeSeasonFactor(String),
    #[error("rate out of [0, 1] for {0}")]
    InvalidRate(String),
    #[error("simulation already ran its {0} turns")]
    Exhausted(u32),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn segment(name: &str, share_pct: i64, budget_cents: i64) -> MarketSegment {
        MarketSegment {
            name: name.to_string(),
            share: Decimal::new(share_pct, 2),
            budget: Decimal::new(budget_cents, 2),
            type_affinity: BTreeMap::new(),
            price_sensitivity: Decimal::ONE,
            quality_sensitivity: Decimal::ONE,
            seasonality: BTreeMap::new(),
        }
    }

    pub fn single_segment_scenario(base_demand: u32) -> Scenario {
        Scenario {
            name: "test".to_string(),
            description: String::new(),
            turns: 12,
            base_demand,
            demand_noise: Decimal::ZERO,
            segments: vec![segment("families", 100, 1700)],
            vat_rates: BTreeMap::new(),
            social_charges: BTreeMap::new(),
            interest_rate: Decimal::new(5, 2),
            ai_competitors: 0,
            seed: Some(42),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            turn_duration: TurnDuration::Month,
            consumption_policy: ConsumptionPolicy::UniformOverMenu,
            ai_difficulty: AiDifficulty::Easy,
            corporate_tax_rate: None,
            loan_cap: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn valid_scenario_passes() {
        assert!(single_segment_scenario(420).validate().is_ok());
    }

    #[test]
    fn share_balance_is_enforced() {
        let mut s = single_segment_scenario(420);
        s.segments = vec![segment("a", 50, 1500), segment("b", 30, 1500)];
        assert_eq!(
            s.validate(),
            Err(ScenarioError::SharesOutOfBalance(Decimal::new(80, 2)))
        );
    }

    #[test]
    fn slightly_unbalanced_shares_are_tolerated() {
        let mut s = single_segment_scenario(420);
        s.segments = vec![segment("a", 52, 1500), segment("b", 51, 1500)];
        assert!(s.validate().is_ok());
    }

    #[test]
    fn seasons_follow_months() {
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(7), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
    }

    #[test]
    fn monthly_turns_advance_by_calendar_month() {
        let s = single_segment_scenario(420);
        assert_eq!(
            s.date_of_turn(2),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn weekly_turns_advance_by_seven_days() {
        let mut s = single_segment_scenario(420);
        s.turn_duration = TurnDuration::Week;
        assert_eq!(
            s.date_of_turn(3),
            NaiveDate::from_ymd_opt(2024, 1, 22).unwrap()
        );
        assert_eq!(s.turn_duration.monthly_divisor(), Decimal::new(4, 0));
    }

    #[test]
    fn seasonality_months_are_checked() {
        let mut s = single_segment_scenario(420);
        s.segments[0]
            .seasonality
            .insert(13, Decimal::ONE);
        assert_eq!(s.validate(), Err(ScenarioError::InvalidSeasonMonth(13)));
    }
}
