#![deny(warnings)]

//! Persistence layer: versioned JSON snapshots and results export.
//!
//! Snapshots are UTF-8 JSON; money serializes as decimal strings and dates
//! as ISO 8601, so a round trip is exact. The RNG stream position is part of
//! the snapshot, making `restore(snapshot(sim))` bit-identical to `sim`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::money::{round_display, Money};
use sim_core::TurnOutcome;
use sim_runtime::{RngState, Simulation, SimulationState};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A saved simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub rng: RngState,
    pub state: SimulationState,
}

/// Snapshot failures: version drift or structural corruption.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot is structurally corrupt: {0}")]
    Corrupt(String),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture a simulation into a snapshot.
pub fn snapshot(sim: &Simulation) -> Snapshot {
    Snapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        rng: sim.rng_state(),
        state: sim.state().clone(),
    }
}

/// Rebuild a simulation from a snapshot, rejecting unknown versions.
pub fn restore(snapshot: Snapshot) -> Result<Simulation, SnapshotError> {
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.schema_version,
            expected: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    Ok(Simulation::from_parts(snapshot.state, snapshot.rng))
}

pub fn to_json(snapshot: &Snapshot) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| SnapshotError::Corrupt(e.to_string()))
}

pub fn from_json(json: &str) -> Result<Snapshot, SnapshotError> {
    serde_json::from_str(json).map_err(|e| SnapshotError::Corrupt(e.to_string()))
}

/// Save a simulation as `<dir>/<name>.json`.
pub fn save_to_file<P: AsRef<Path>>(path: P, sim: &Simulation) -> Result<(), SnapshotError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = to_json(&snapshot(sim))?;
    fs::write(&path, json)?;
    info!(path = %path.as_ref().display(), "snapshot written");
    Ok(())
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Simulation, SnapshotError> {
    let json = fs::read_to_string(path)?;
    restore(from_json(&json)?)
}

/// Derived end-of-run indicators for one restaurant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestaurantKpis {
    pub restaurant_id: String,
    pub total_revenue: Money,
    pub total_profit: Money,
    pub final_cash: Money,
    pub mean_utilization: f64,
    pub total_served: u64,
    pub went_negative: bool,
}

/// The results document written next to the CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultsExport {
    pub scenario: String,
    pub seed: u64,
    pub turns_run: u32,
    pub kpis: Vec<RestaurantKpis>,
    pub outcomes: Vec<TurnOutcome>,
}

/// Aggregate per-restaurant KPIs over a run.
pub fn derive_kpis(sim: &Simulation) -> Vec<RestaurantKpis> {
    let history = sim.history();
    sim.state()
        .restaurants
        .keys()
        .map(|id| {
            let mut total_revenue = Decimal::ZERO;
            let mut total_profit = Decimal::ZERO;
            let mut total_served = 0u64;
            let mut utilization_sum = 0.0;
            let mut went_negative = false;
            for outcome in history {
                if let Some(r) = outcome.result_for(id) {
                    total_revenue += r.revenue;
                    total_profit += r.pnl.profit;
                    total_served += u64::from(r.served_customers);
                    utilization_sum += r.utilization;
                    went_negative |= r.negative_cash;
                }
            }
            let turns = history.len().max(1) as f64;
            RestaurantKpis {
                restaurant_id: id.clone(),
                total_revenue,
                total_profit,
                final_cash: sim.restaurant(id).map(|r| r.cash).unwrap_or(Decimal::ZERO),
                mean_utilization: utilization_sum / turns,
                total_served,
                went_negative,
            }
        })
        .collect()
}

/// Build the results document for a finished (or in-progress) run.
pub fn results_export(sim: &Simulation) -> ResultsExport {
    ResultsExport {
        scenario: sim.state().scenario.name.clone(),
        seed: sim.rng_state().seed,
        turns_run: sim.turn(),
        kpis: derive_kpis(sim),
        outcomes: sim.history().to_vec(),
    }
}

/// Write `results.json` into `dir`.
pub fn write_results_json<P: AsRef<Path>>(dir: P, sim: &Simulation) -> Result<(), SnapshotError> {
    fs::create_dir_all(&dir)?;
    let path = dir.as_ref().join("results.json");
    let json = serde_json::to_string_pretty(&results_export(sim))
        .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "results written");
    Ok(())
}

/// Write `turns.csv` into `dir`: one row per restaurant per turn.
pub fn write_turns_csv<P: AsRef<Path>>(dir: P, sim: &Simulation) -> Result<(), SnapshotError> {
    fs::create_dir_all(&dir)?;
    let path = dir.as_ref().join("turns.csv");
    let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
    writer.write_record([
        "turn",
        "date",
        "restaurant_id",
        "allocated",
        "served",
        "capacity",
        "utilization",
        "revenue",
        "cogs",
        "labor",
        "rent",
        "fixed",
        "marketing",
        "loan_interest",
        "taxes",
        "other",
        "profit",
        "cash_after",
        "reputation",
    ])
    .map_err(csv_error)?;
    for outcome in sim.history() {
        for r in &outcome.per_restaurant {
            writer
                .write_record([
                    outcome.turn.to_string(),
                    outcome.date.format("%Y-%m-%d").to_string(),
                    r.restaurant_id.clone(),
                    r.allocated_demand.to_string(),
                    r.served_customers.to_string(),
                    r.capacity.to_string(),
                    format!("{:.4}", r.utilization),
                    money_cell(r.revenue),
                    money_cell(r.pnl.cogs),
                    money_cell(r.pnl.labor),
                    money_cell(r.pnl.rent),
                    money_cell(r.pnl.fixed_costs),
                    money_cell(r.pnl.marketing),
                    money_cell(r.pnl.loan_interest),
                    money_cell(r.pnl.taxes),
                    money_cell(r.pnl.other),
                    money_cell(r.pnl.profit),
                    money_cell(r.cash_after),
                    r.reputation_after
                        .to_f64()
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_default(),
                ])
                .map_err(csv_error)?;
        }
    }
    writer.flush()?;
    info!(path = %path.display(), "turns csv written");
    Ok(())
}

fn money_cell(amount: Money) -> String {
    round_display(amount).to_string()
}

fn csv_error(err: csv::Error) -> SnapshotError {
    SnapshotError::Corrupt(err.to_string())
}
