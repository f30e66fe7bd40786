#![deny(warnings)]

//! Core domain models and invariants for the FoodOps simulation kernel.
//!
//! This crate defines the serializable entities shared by every other crate:
//! the immutable catalog (ingredients, quality variants, suppliers, offers,
//! recipes), the FEFO stock engine, restaurants and their rosters, market
//! scenarios, random events, typed player decisions, purchase orders and the
//! append-only accounting ledger. Validation helpers guarantee the basic
//! invariants; behavior that combines several entities lives in `sim-econ`
//! and `sim-runtime`.

pub mod catalog;
pub mod decisions;
pub mod employee;
pub mod events;
pub mod ledger;
pub mod money;
pub mod orders;
pub mod outcome;
pub mod restaurant;
pub mod scenario;
pub mod stock;

pub use catalog::{
    Catalog, CatalogError, Ingredient, QualityModifiers, QualityVariant, Recipe, RecipeItem,
    Supplier, SupplierOffer,
};
pub use decisions::{CashError, Decision, DecisionError};
pub use employee::{Contract, Employee, Position};
pub use events::{
    default_registry, EventCategory, EventEngine, EventInstance, EventMultipliers, EventTemplate,
    Modifiers,
};
pub use ledger::{Ledger, LedgerEntry, LedgerKind, PnlSummary};
pub use money::Money;
pub use orders::{
    DeliveryLine, GoodsReceipt, GoodsReceiptLine, PendingPurchaseOrder, PoStatus,
    PurchaseOrderLine, ReceivingError,
};
pub use outcome::{TurnOutcome, TurnResult, TurnWarning};
pub use restaurant::{Loan, MarketingCampaign, Restaurant, RestaurantController, RestaurantType};
pub use scenario::{
    AiDifficulty, ConsumptionPolicy, MarketSegment, Scenario, ScenarioError, Season, TurnDuration,
};
pub use stock::{ConsumedSlice, StockError, StockLot, StockManager};
