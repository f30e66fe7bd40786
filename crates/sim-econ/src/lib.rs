#![deny(warnings)]

//! Economic engines: recipe costing, procurement, payroll and the market
//! demand allocator.

pub mod costing;
pub mod market;
pub mod payroll;
pub mod procurement;

pub use costing::{hourly_labor_cost, margin_analysis, recipe_cost, CostBreakdown, MarginAnalysis};
pub use market::{allocate, MarketOutcome, RestaurantAllocation, SegmentAllocation};
pub use payroll::{compute_payroll, monthly_team_cost, PayrollCharges, PayrollResult};
pub use procurement::{
    compute_requirements, manual_order_line, propose_orders, receive_delivery,
};
