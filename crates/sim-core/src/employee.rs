//! Employee records: positions, contract kinds and their invariants.

use crate::decisions::DecisionError;
use crate::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Working positions in a restaurant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Cuisine,
    Salle,
    Manager,
    Plonge,
    Caisse,
}

impl Position {
    /// Share of the base capacity one person at this position adds.
    pub fn capacity_weight(self) -> Decimal {
        match self {
            Position::Cuisine => Decimal::new(40, 2),
            Position::Salle => Decimal::new(30, 2),
            Position::Manager => Decimal::new(20, 2),
            Position::Plonge => Decimal::new(5, 2),
            Position::Caisse => Decimal::new(5, 2),
        }
    }
}

/// Contract kinds, mirroring French labor law categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Contract {
    Cdi,
    Cdd,
    Extra,
    Apprenti,
    Stage,
}

impl Contract {
    /// Default employer social charge rate, used when the scenario does not
    /// configure one.
    pub fn default_employer_rate(self) -> Decimal {
        match self {
            Contract::Cdi => Decimal::new(42, 2),
            Contract::Cdd => Decimal::new(44, 2),
            Contract::Extra => Decimal::new(45, 2),
            Contract::Apprenti => Decimal::new(11, 2),
            Contract::Stage => Decimal::ZERO,
        }
    }
}

/// Legal monthly hours for a full-time contract (35h/week).
pub const MONTHLY_LEGAL_HOURS: Decimal = Decimal::from_parts(15167, 0, 0, false, 2);

/// An employee on a restaurant's roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub contract: Contract,
    /// Gross monthly salary on a full-time basis.
    pub salary_gross_monthly: Money,
    /// Productivity coefficient in [0.5, 2.0].
    pub productivity: Decimal,
    pub experience_months: u32,
    pub is_part_time: bool,
    /// Working-time ratio in (0, 1]; 1 for full time.
    pub part_time_ratio: Decimal,
    pub sunday_work: bool,
    pub overtime_eligible: bool,
}

impl Employee {
    /// Check the roster invariants before hiring.
    pub fn validate(&self) -> Result<(), DecisionError> {
        if self.salary_gross_monthly < Decimal::ZERO {
            return Err(DecisionError::NegativeSalary {
                employee_id: self.id.clone(),
            });
        }
        if self.contract == Contract::Stage && self.salary_gross_monthly > Decimal::ZERO {
            return Err(DecisionError::InternWithSalary {
                employee_id: self.id.clone(),
            });
        }
        if self.contract == Contract::Apprenti && self.experience_months > 24 {
            return Err(DecisionError::ApprenticeTooExperienced {
                employee_id: self.id.clone(),
                months: self.experience_months,
            });
        }
        if self.productivity < Decimal::new(5, 1) || self.productivity > Decimal::new(2, 0) {
            return Err(DecisionError::ProductivityOutOfRange {
                employee_id: self.id.clone(),
            });
        }
        if self.part_time_ratio <= Decimal::ZERO || self.part_time_ratio > Decimal::ONE {
            return Err(DecisionError::PartTimeRatioOutOfRange {
                employee_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Gross salary scaled by working time.
    pub fn effective_salary_monthly(&self) -> Money {
        self.salary_gross_monthly * self.part_time_ratio
    }

    /// Gross hourly rate on the legal monthly hours basis.
    pub fn hourly_rate(&self) -> Money {
        if MONTHLY_LEGAL_HOURS == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.effective_salary_monthly() / MONTHLY_LEGAL_HOURS
    }

    /// Seniority bonus rate by experience.
    pub fn seniority_bonus(&self) -> Decimal {
        match self.experience_months {
            0..=11 => Decimal::ZERO,
            12..=23 => Decimal::new(2, 2),
            24..=59 => Decimal::new(5, 2),
            _ => Decimal::new(10, 2),
        }
    }

    /// Covers this person adds on top of the staffed base capacity.
    ///
    /// weight x productivity x working time, plus up to +20% after ten
    /// years of experience. The term stays fractional; the restaurant
    /// floors the combined capacity once, over the whole sum.
    pub fn capacity_contribution(&self, base_capacity: u32) -> Decimal {
        let base = Decimal::from(base_capacity) * self.position.capacity_weight();
        let experience_bonus =
            (Decimal::from(self.experience_months) / Decimal::new(120, 0)).min(Decimal::new(20, 2));
        base * self.productivity * self.part_time_ratio * (Decimal::ONE + experience_bonus)
    }

    /// Overtime applies to full-time CDI/CDD staff flagged as eligible.
    pub fn is_eligible_for_overtime(&self) -> bool {
        self.overtime_eligible
            && matches!(self.contract, Contract::Cdi | Contract::Cdd)
            && !self.is_part_time
    }
}
