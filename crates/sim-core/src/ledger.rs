//! Append-only accounting journal.
//!
//! Every cash or P&L movement of a restaurant is one signed entry. Cash
//! application is the sum of a restaurant's signed entries, so the per-turn
//! cash identity holds by construction; P&L and trial balance are pure
//! functions over the journal.

use crate::money::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Journal entry categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LedgerKind {
    Revenue,
    Cogs,
    Labor,
    Rent,
    Fixed,
    Marketing,
    Invest,
    Loan,
    Tax,
    Other,
}

/// Label on loan entries that carry interest expense (P&L relevant).
pub const LABEL_LOAN_INTEREST: &str = "interest";
/// Label on loan entries that move principal (cash only).
pub const LABEL_LOAN_PRINCIPAL: &str = "principal";
/// Label on the cash credit when a loan is drawn (cash only).
pub const LABEL_LOAN_DRAWDOWN: &str = "drawdown";
/// Label on expired-stock write-offs.
pub const LABEL_WASTE: &str = "waste";

/// One signed journal line. Positive amounts increase cash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub kind: LedgerKind,
    pub label: String,
    pub amount: Money,
    pub restaurant_id: String,
    pub turn: u32,
}

impl LedgerEntry {
    /// Whether this entry belongs to the profit and loss statement.
    ///
    /// Loan principal movements and investments touch cash but not P&L.
    pub fn is_pnl(&self) -> bool {
        match self.kind {
            LedgerKind::Invest => false,
            LedgerKind::Loan => self.label == LABEL_LOAN_INTEREST,
            _ => true,
        }
    }
}

/// Derived per-restaurant P&L over a set of entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    pub revenue: Money,
    pub cogs: Money,
    pub labor: Money,
    pub rent: Money,
    pub fixed_costs: Money,
    pub marketing: Money,
    pub loan_interest: Money,
    pub taxes: Money,
    pub other: Money,
    pub profit: Money,
}

/// Append-only journal of ledger entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entries_for_turn(&self, turn: u32) -> Vec<LedgerEntry> {
        self.entries.iter().filter(|e| e.turn == turn).cloned().collect()
    }

    /// Net cash movement for one restaurant over one turn.
    pub fn cash_delta(&self, restaurant_id: &str, turn: u32) -> Money {
        self.entries
            .iter()
            .filter(|e| e.restaurant_id == restaurant_id && e.turn == turn)
            .map(|e| e.amount)
            .sum()
    }

    /// P&L for one restaurant over one turn, derived purely from entries.
    pub fn pnl(&self, restaurant_id: &str, turn: u32) -> PnlSummary {
        let mut out = PnlSummary::default();
        for e in self
            .entries
            .iter()
            .filter(|e| e.restaurant_id == restaurant_id && e.turn == turn)
        {
            match e.kind {
                LedgerKind::Revenue => out.revenue += e.amount,
                LedgerKind::Cogs => out.cogs += -e.amount,
                LedgerKind::Labor => out.labor += -e.amount,
                LedgerKind::Rent => out.rent += -e.amount,
                LedgerKind::Fixed => out.fixed_costs += -e.amount,
                LedgerKind::Marketing => out.marketing += -e.amount,
                LedgerKind::Tax => out.taxes += -e.amount,
                LedgerKind::Other => out.other += -e.amount,
                LedgerKind::Loan if e.label == LABEL_LOAN_INTEREST => {
                    out.loan_interest += -e.amount
                }
                LedgerKind::Loan | LedgerKind::Invest => {}
            }
            if e.is_pnl() {
                out.profit += e.amount;
            }
        }
        out
    }

    /// Signed totals by kind over the whole journal.
    pub fn trial_balance(&self) -> BTreeMap<LedgerKind, Money> {
        let mut totals = BTreeMap::new();
        for e in &self.entries {
            *totals.entry(e.kind).or_insert(Decimal::ZERO) += e.amount;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn entry(kind: LedgerKind, label: &str, cents: i64) -> LedgerEntry {
        LedgerEntry {
            date: date(),
            kind,
            label: label.to_string(),
            amount: Decimal::new(cents, 2),
            restaurant_id: "r1".to_string(),
            turn: 1,
        }
    }

    #[test]
    fn pnl_and_cash_delta_agree_for_operating_entries() {
        let mut ledger = Ledger::new();
        ledger.append(entry(LedgerKind::Revenue, "service", 128_000));
        ledger.append(entry(LedgerKind::Cogs, "ingredients", -40_000));
        ledger.append(entry(LedgerKind::Labor, "payroll", -30_000));
        ledger.append(entry(LedgerKind::Rent, "rent", -25_000));

        let pnl = ledger.pnl("r1", 1);
        assert_eq!(pnl.revenue, Decimal::new(128_000, 2));
        assert_eq!(pnl.cogs, Decimal::new(40_000, 2));
        assert_eq!(pnl.profit, Decimal::new(33_000, 2));
        assert_eq!(ledger.cash_delta("r1", 1), pnl.profit);
    }

    #[test]
    fn loan_principal_moves_cash_but_not_profit() {
        let mut ledger = Ledger::new();
        ledger.append(entry(LedgerKind::Loan, LABEL_LOAN_DRAWDOWN, 500_000));
        ledger.append(entry(LedgerKind::Loan, LABEL_LOAN_INTEREST, -2_500));
        ledger.append(entry(LedgerKind::Loan, LABEL_LOAN_PRINCIPAL, -20_000));

        let pnl = ledger.pnl("r1", 1);
        assert_eq!(pnl.loan_interest, Decimal::new(2_500, 2));
        assert_eq!(pnl.profit, Decimal::new(-2_500, 2));
        assert_eq!(ledger.cash_delta("r1", 1), Decimal::new(477_500, 2));
    }

    #[test]
    fn trial_balance_sums_by_kind() {
        let mut ledger = Ledger::new();
        ledger.append(entry(LedgerKind::Revenue, "service", 100_000));
        ledger.append(entry(LedgerKind::Revenue, "service", 50_000));
        ledger.append(entry(LedgerKind::Other, LABEL_WASTE, -1_250));

        let tb = ledger.trial_balance();
        assert_eq!(tb[&LedgerKind::Revenue], Decimal::new(150_000, 2));
        assert_eq!(tb[&LedgerKind::Other], Decimal::new(-1_250, 2));
    }
}
