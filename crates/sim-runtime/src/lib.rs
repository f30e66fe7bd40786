#![deny(warnings)]

//! Turn engine: owns the simulation state and advances it one turn at a
//! time, deterministically from a seed.
//!
//! The kernel is synchronous and single-threaded. A [`Simulation`] owns its
//! state and a single ChaCha8 RNG stream; every turn runs the same fixed
//! pipeline (decisions, procurement, events, allocation, consumption,
//! accounting, expiry sweep) and yields a [`sim_core::TurnOutcome`]. Hosts
//! running several games in parallel instantiate one `Simulation` each.

mod engine;
mod state;

pub use state::{RestaurantSpec, RngState, Simulation, SimulationState};
