//! Payroll: monthly team cost and detailed payslips with overtime, Sunday
//! premium and the social security ceiling.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::employee::MONTHLY_LEGAL_HOURS;
use sim_core::money::{round_intermediate, Money};
use sim_core::{Contract, Employee, Scenario};

/// Monthly social security ceiling; only the capped portion of employer
/// charges applies below it.
pub fn social_security_ceiling() -> Money {
    Decimal::new(3864, 0)
}

/// Overtime premium for the first eight extra hours.
fn overtime_premium_25() -> Decimal {
    Decimal::new(25, 2)
}

/// Overtime premium beyond eight extra hours.
fn overtime_premium_50() -> Decimal {
    Decimal::new(50, 2)
}

/// Sunday work premium rate.
fn sunday_premium_rate() -> Decimal {
    Decimal::new(30, 2)
}

/// Charge rates used by the detailed payslip computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayrollCharges {
    /// Employee-side rate applied to the capped salary.
    pub employee_rate: Decimal,
    /// Explicit employer rate; when absent the capped/uncapped split applies.
    pub employer_rate: Option<Decimal>,
}

impl Default for PayrollCharges {
    fn default() -> Self {
        Self {
            employee_rate: Decimal::new(22, 2),
            employer_rate: None,
        }
    }
}

/// One employee's payslip for a month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayrollResult {
    pub employee_id: String,
    pub gross_salary: Money,
    pub overtime_hours: Decimal,
    pub overtime_pay: Money,
    pub sunday_hours: Decimal,
    pub sunday_premium: Money,
    pub charges_employee: Money,
    pub charges_employer: Money,
    pub net_salary: Money,
    /// Gross plus employer charges.
    pub total_cost: Money,
}

/// Simple monthly personnel cost: gross scaled by working time, loaded with
/// the scenario's employer charge rate per contract.
pub fn monthly_team_cost(employees: &[Employee], scenario: &Scenario) -> Money {
    employees
        .iter()
        .map(|e| {
            let rate = scenario.social_charge_rate(e.contract);
            e.effective_salary_monthly() * (Decimal::ONE + rate)
        })
        .sum()
}

/// Detailed monthly payslip for one employee.
///
/// `hours_worked` defaults to the legal monthly hours when the caller has no
/// timesheet; overtime and the Sunday premium only apply to eligible staff.
pub fn compute_payroll(
    employee: &Employee,
    hours_worked: Decimal,
    sunday_hours: Decimal,
    charges: &PayrollCharges,
) -> PayrollResult {
    let base_salary = employee.effective_salary_monthly();
    let hourly = employee.hourly_rate();

    let overtime_hours = if employee.is_eligible_for_overtime() {
        (hours_worked - MONTHLY_LEGAL_HOURS).max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };
    // Extra hours are settled as premium increments on top of the prorated
    // monthly salary: 25% for the first eight, 50% beyond.
    let hours_25 = overtime_hours.min(Decimal::new(8, 0));
    let hours_50 = (overtime_hours - hours_25).max(Decimal::ZERO);
    let overtime_pay = round_intermediate(
        hours_25 * hourly * overtime_premium_25() + hours_50 * hourly * overtime_premium_50(),
    );

    let sunday_premium = if employee.sunday_work && sunday_hours > Decimal::ZERO {
        round_intermediate(sunday_hours * hourly * sunday_premium_rate())
    } else {
        Decimal::ZERO
    };

    let gross = base_salary + overtime_pay + sunday_premium;
    let capped = gross.min(social_security_ceiling());

    let charges_employee = round_intermediate(capped * charges.employee_rate);
    let charges_employer = match charges.employer_rate {
        Some(rate) => round_intermediate(gross * rate),
        None => {
            if employee.contract == Contract::Apprenti {
                round_intermediate(gross * Contract::Apprenti.default_employer_rate())
            } else {
                // Capped contributions (pension, unemployment) plus uncapped
                // ones (family, accidents).
                round_intermediate(
                    capped * Decimal::new(25, 2) + gross * Decimal::new(17, 2),
                )
            }
        }
    };

    PayrollResult {
        employee_id: employee.id.clone(),
        gross_salary: gross,
        overtime_hours,
        overtime_pay,
        sunday_hours,
        sunday_premium,
        charges_employee,
        charges_employer,
        net_salary: gross - charges_employee,
        total_cost: gross + charges_employer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::Position;

    fn employee(salary_cents: i64, contract: Contract) -> Employee {
        Employee {
            id: "e1".to_string(),
            name: "Test".to_string(),
            position: Position::Cuisine,
            contract,
            salary_gross_monthly: Decimal::new(salary_cents, 2),
            productivity: Decimal::ONE,
            experience_months: 12,
            is_part_time: false,
            part_time_ratio: Decimal::ONE,
            sunday_work: false,
            overtime_eligible: true,
        }
    }

    fn scenario() -> Scenario {
        use sim_core::MarketSegment;
        use std::collections::BTreeMap;
        Scenario {
            name: "payroll".to_string(),
            description: String::new(),
            turns: 12,
            base_demand: 100,
            demand_noise: Decimal::ZERO,
            segments: vec![MarketSegment {
                name: "families".to_string(),
                share: Decimal::ONE,
                budget: Decimal::new(1700, 2),
                type_affinity: BTreeMap::new(),
                price_sensitivity: Decimal::ONE,
                quality_sensitivity: Decimal::ONE,
                seasonality: BTreeMap::new(),
            }],
            vat_rates: BTreeMap::new(),
            social_charges: BTreeMap::new(),
            interest_rate: Decimal::new(5, 2),
            ai_competitors: 0,
            seed: None,
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            turn_duration: sim_core::TurnDuration::Month,
            consumption_policy: sim_core::ConsumptionPolicy::UniformOverMenu,
            ai_difficulty: sim_core::AiDifficulty::Easy,
            corporate_tax_rate: None,
            loan_cap: None,
        }
    }

    #[test]
    fn team_cost_loads_contract_charges() {
        let team = vec![
            employee(200_000, Contract::Cdi),      // 2000 * 1.42 = 2840
            employee(150_000, Contract::Apprenti), // 1500 * 1.11 = 1665
        ];
        assert_eq!(
            monthly_team_cost(&team, &scenario()),
            Decimal::new(4505_00, 2)
        );
    }

    #[test]
    fn no_overtime_below_legal_hours() {
        let e = employee(200_000, Contract::Cdi);
        let slip = compute_payroll(
            &e,
            Decimal::new(15167, 2),
            Decimal::ZERO,
            &PayrollCharges::default(),
        );
        assert_eq!(slip.overtime_hours, Decimal::ZERO);
        assert_eq!(slip.overtime_pay, Decimal::ZERO);
        assert_eq!(slip.gross_salary, Decimal::new(200_000, 2));
    }

    #[test]
    fn overtime_splits_25_then_50() {
        let e = employee(200_000, Contract::Cdi);
        let slip = compute_payroll(
            &e,
            Decimal::new(16367, 2), // 12 extra hours
            Decimal::ZERO,
            &PayrollCharges::default(),
        );
        assert_eq!(slip.overtime_hours, Decimal::new(12, 0));
        let hourly = e.hourly_rate();
        let expected = round_intermediate(
            Decimal::new(8, 0) * hourly * Decimal::new(25, 2)
                + Decimal::new(4, 0) * hourly * Decimal::new(50, 2),
        );
        assert_eq!(slip.overtime_pay, expected);
    }

    #[test]
    fn part_time_staff_earn_no_overtime() {
        let mut e = employee(200_000, Contract::Cdi);
        e.is_part_time = true;
        e.part_time_ratio = Decimal::new(5, 1);
        let slip = compute_payroll(
            &e,
            Decimal::new(16000, 2),
            Decimal::ZERO,
            &PayrollCharges::default(),
        );
        assert_eq!(slip.overtime_pay, Decimal::ZERO);
    }

    #[test]
    fn sunday_premium_requires_the_flag() {
        let mut e = employee(200_000, Contract::Cdi);
        let slip = compute_payroll(
            &e,
            MONTHLY_LEGAL_HOURS,
            Decimal::new(8, 0),
            &PayrollCharges::default(),
        );
        assert_eq!(slip.sunday_premium, Decimal::ZERO);

        e.sunday_work = true;
        let slip = compute_payroll(
            &e,
            MONTHLY_LEGAL_HOURS,
            Decimal::new(8, 0),
            &PayrollCharges::default(),
        );
        let expected = round_intermediate(
            Decimal::new(8, 0) * e.hourly_rate() * Decimal::new(30, 2),
        );
        assert_eq!(slip.sunday_premium, expected);
    }

    #[test]
    fn ceiling_caps_the_capped_portion() {
        let e = employee(600_000, Contract::Cdi); // well above the ceiling
        let slip = compute_payroll(
            &e,
            MONTHLY_LEGAL_HOURS,
            Decimal::ZERO,
            &PayrollCharges::default(),
        );
        let expected_employer = round_intermediate(
            social_security_ceiling() * Decimal::new(25, 2)
                + Decimal::new(600_000, 2) * Decimal::new(17, 2),
        );
        assert_eq!(slip.charges_employer, expected_employer);
        let expected_employee =
            round_intermediate(social_security_ceiling() * Decimal::new(22, 2));
        assert_eq!(slip.charges_employee, expected_employee);
    }

    #[test]
    fn apprentice_uses_reduced_flat_rate() {
        let e = employee(120_000, Contract::Apprenti);
        let slip = compute_payroll(
            &e,
            MONTHLY_LEGAL_HOURS,
            Decimal::ZERO,
            &PayrollCharges::default(),
        );
        assert_eq!(
            slip.charges_employer,
            round_intermediate(Decimal::new(120_000, 2) * Decimal::new(11, 2))
        );
    }
}
