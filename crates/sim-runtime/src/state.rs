//! Simulation state, construction and the decision/delivery intake surface.

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::money::Money;
use sim_core::{
    default_registry, Catalog, CashError, Decision, DecisionError, Employee, EventEngine,
    EventTemplate, GoodsReceipt, Ledger, ReceivingError, Restaurant, RestaurantController,
    RestaurantType, Scenario, ScenarioError, StockManager, TurnOutcome,
};
use std::collections::{BTreeMap, BTreeSet};

/// Everything a simulation needs to resume, minus the RNG stream itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub scenario: Scenario,
    pub catalog: Catalog,
    pub restaurants: BTreeMap<String, Restaurant>,
    pub ledger: Ledger,
    pub events: EventEngine,
    /// Decisions staged for the next turn, per restaurant.
    pub pending_decisions: BTreeMap<String, Vec<Decision>>,
    /// Completed turns.
    pub turn: u32,
    /// Calendar date of the upcoming turn.
    pub current_date: NaiveDate,
    pub po_counter: u32,
    pub history: Vec<TurnOutcome>,
}

/// Serializable RNG stream position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub word_pos: u128,
}

/// Spec for adding a restaurant to a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSpec {
    pub id: String,
    pub name: String,
    pub kind: RestaurantType,
    pub capacity_base: u32,
    pub speed_service: Decimal,
    pub starting_cash: Money,
    pub equipment_value: Money,
    pub rent_monthly: Money,
    pub fixed_costs_monthly: Money,
    /// Initial price card, recipe id -> TTC price.
    #[serde(default)]
    pub menu: BTreeMap<String, Money>,
    /// Recipes active from the start; must be priced in `menu`.
    #[serde(default)]
    pub active_recipes: Vec<String>,
    #[serde(default = "default_staffing")]
    pub staffing_level: u8,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub controller: RestaurantController,
}

fn default_staffing() -> u8 {
    2
}

/// One running simulation: owned state plus the seeded RNG stream.
#[derive(Clone, Debug)]
pub struct Simulation {
    pub(crate) state: SimulationState,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) seed: u64,
}

impl PartialEq for Simulation {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state && self.rng_state() == other.rng_state()
    }
}

impl Simulation {
    /// Create a simulation with the stock event registry.
    pub fn new(
        scenario: Scenario,
        catalog: Catalog,
        seed: Option<u64>,
    ) -> Result<Self, ScenarioError> {
        Self::with_event_registry(scenario, catalog, default_registry(), seed)
    }

    /// Create a simulation with a custom event registry.
    pub fn with_event_registry(
        scenario: Scenario,
        catalog: Catalog,
        registry: Vec<EventTemplate>,
        seed: Option<u64>,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let seed = seed.or(scenario.seed).unwrap_or(0);
        let current_date = scenario.start_date;
        Ok(Self {
            state: SimulationState {
                scenario,
                catalog,
                restaurants: BTreeMap::new(),
                ledger: Ledger::new(),
                events: EventEngine::new(registry),
                pending_decisions: BTreeMap::new(),
                turn: 0,
                current_date,
                po_counter: 0,
                history: Vec::new(),
            },
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    /// Rebuild a simulation from a restored state and RNG position.
    pub fn from_parts(state: SimulationState, rng_state: RngState) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(rng_state.seed);
        rng.set_word_pos(rng_state.word_pos);
        Self {
            state,
            rng,
            seed: rng_state.seed,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn rng_state(&self) -> RngState {
        RngState {
            seed: self.seed,
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Completed turns.
    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    pub fn is_finished(&self) -> bool {
        self.state.turn >= self.state.scenario.turns
    }

    pub fn restaurant(&self, id: &str) -> Option<&Restaurant> {
        self.state.restaurants.get(id)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    pub fn history(&self) -> &[TurnOutcome] {
        &self.state.history
    }

    /// Add a restaurant; its menu must reference catalog recipes with
    /// positive prices and its roster must satisfy the contract invariants.
    pub fn add_restaurant(&mut self, spec: RestaurantSpec) -> Result<String, DecisionError> {
        if self.state.restaurants.contains_key(&spec.id) {
            return Err(DecisionError::DuplicateRestaurant(spec.id));
        }
        if spec.capacity_base == 0 {
            return Err(DecisionError::InvalidSpec(format!(
                "{} needs a positive base capacity",
                spec.id
            )));
        }
        if spec.speed_service <= Decimal::ZERO {
            return Err(DecisionError::InvalidSpec(format!(
                "{} needs a positive service speed",
                spec.id
            )));
        }
        for (recipe_id, price) in &spec.menu {
            if self.state.catalog.recipe(recipe_id).is_none() {
                return Err(DecisionError::UnknownRecipe(recipe_id.clone()));
            }
            if *price <= Decimal::ZERO {
                return Err(DecisionError::NonPositivePrice {
                    recipe_id: recipe_id.clone(),
                    price: *price,
                });
            }
        }
        for recipe_id in &spec.active_recipes {
            if !spec.menu.contains_key(recipe_id) {
                return Err(DecisionError::RecipeNotOnMenu(recipe_id.clone()));
            }
        }
        if spec.staffing_level > 3 {
            return Err(DecisionError::StaffingOutOfRange(spec.staffing_level));
        }
        let mut seen = BTreeSet::new();
        for employee in &spec.employees {
            employee.validate()?;
            if !seen.insert(employee.id.clone()) {
                return Err(DecisionError::DuplicateEmployee(employee.id.clone()));
            }
        }

        let restaurant = Restaurant {
            id: spec.id.clone(),
            name: spec.name,
            kind: spec.kind,
            capacity_base: spec.capacity_base,
            speed_service: spec.speed_service,
            menu: spec.menu,
            active_recipes: spec.active_recipes.into_iter().collect(),
            employees: spec.employees,
            cash: spec.starting_cash,
            equipment_value: spec.equipment_value,
            rent_monthly: spec.rent_monthly,
            fixed_costs_monthly: spec.fixed_costs_monthly,
            staffing_level: spec.staffing_level,
            ingredient_choices: BTreeMap::new(),
            reputation: Decimal::new(50, 1),
            satisfaction_history: Vec::new(),
            stock: StockManager::new(),
            pending_orders: Vec::new(),
            loans: Vec::new(),
            campaigns: Vec::new(),
            controller: spec.controller,
            last_utilization: 0.0,
            last_served: 0,
        };
        let id = spec.id;
        self.state.restaurants.insert(id.clone(), restaurant);
        Ok(id)
    }

    /// Stage decisions for the next turn.
    ///
    /// The whole set is validated against the catalog and the restaurant's
    /// current state first; on any rejection nothing is staged.
    pub fn submit_decisions(
        &mut self,
        restaurant_id: &str,
        decisions: Vec<Decision>,
    ) -> Result<(), DecisionError> {
        let restaurant = self
            .state
            .restaurants
            .get(restaurant_id)
            .ok_or_else(|| DecisionError::UnknownRestaurant(restaurant_id.to_string()))?;

        let mut priced_in_batch: BTreeSet<&str> = BTreeSet::new();
        for decision in &decisions {
            self.validate_decision(restaurant, decision, &priced_in_batch)?;
            if let Decision::SetPrice { recipe_id, .. } = decision {
                priced_in_batch.insert(recipe_id);
            }
        }

        self.state
            .pending_decisions
            .entry(restaurant_id.to_string())
            .or_default()
            .extend(decisions);
        Ok(())
    }

    fn validate_decision(
        &self,
        restaurant: &Restaurant,
        decision: &Decision,
        priced_in_batch: &BTreeSet<&str>,
    ) -> Result<(), DecisionError> {
        let catalog = &self.state.catalog;
        match decision {
            Decision::SetPrice { recipe_id, price_ttc } => {
                if catalog.recipe(recipe_id).is_none() {
                    return Err(DecisionError::UnknownRecipe(recipe_id.clone()));
                }
                if *price_ttc <= Decimal::ZERO {
                    return Err(DecisionError::NonPositivePrice {
                        recipe_id: recipe_id.clone(),
                        price: *price_ttc,
                    });
                }
            }
            Decision::ActivateRecipe { recipe_id } => {
                if catalog.recipe(recipe_id).is_none() {
                    return Err(DecisionError::UnknownRecipe(recipe_id.clone()));
                }
                let priced = restaurant.menu.contains_key(recipe_id)
                    || priced_in_batch.contains(recipe_id.as_str());
                if !priced {
                    return Err(DecisionError::RecipeNotOnMenu(recipe_id.clone()));
                }
            }
            Decision::DeactivateRecipe { .. } => {}
            Decision::SetStaffingLevel { level } => {
                if *level > 3 {
                    return Err(DecisionError::StaffingOutOfRange(*level));
                }
            }
            Decision::SetIngredientQuality {
                ingredient_id,
                level,
            } => {
                if catalog.ingredient(ingredient_id).is_none() {
                    return Err(DecisionError::UnknownIngredient(ingredient_id.clone()));
                }
                if !(1..=5).contains(level) {
                    return Err(DecisionError::QualityLevelOutOfRange(*level));
                }
            }
            Decision::Hire { employee } => {
                employee.validate()?;
                if restaurant.employee(&employee.id).is_some() {
                    return Err(DecisionError::DuplicateEmployee(employee.id.clone()));
                }
            }
            Decision::Fire { employee_id } => {
                if restaurant.employee(employee_id).is_none() {
                    return Err(DecisionError::UnknownEmployee(employee_id.clone()));
                }
            }
            Decision::RunMarketingCampaign { cost, impact_turns } => {
                if *cost <= Decimal::ZERO {
                    return Err(DecisionError::NonPositiveMarketingCost);
                }
                if *impact_turns == 0 {
                    return Err(DecisionError::ZeroImpactTurns);
                }
            }
            Decision::SubmitPurchaseOrder { lines } => {
                for line in lines {
                    if line.quantity <= Decimal::ZERO {
                        return Err(DecisionError::EmptyOrderLine(line.ingredient_id.clone()));
                    }
                    if catalog.ingredient(&line.ingredient_id).is_none() {
                        return Err(DecisionError::UnknownIngredient(
                            line.ingredient_id.clone(),
                        ));
                    }
                }
            }
            Decision::RequestLoan {
                amount, term_turns, ..
            } => {
                if *amount <= Decimal::ZERO || *term_turns == 0 {
                    return Err(DecisionError::InvalidLoan);
                }
                if let Some(cap) = self.state.scenario.loan_cap {
                    if *amount > cap {
                        return Err(CashError::LoanExceedsCap {
                            requested: *amount,
                            cap,
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Record an out-of-band delivery against a pending purchase order.
    ///
    /// Lots land in the owning restaurant's stock immediately; the order is
    /// dropped once every line is closed.
    pub fn confirm_delivery(
        &mut self,
        po_id: &str,
        deliveries: &[sim_core::DeliveryLine],
        received_date: NaiveDate,
    ) -> Result<GoodsReceipt, ReceivingError> {
        let SimulationState {
            catalog,
            restaurants,
            ..
        } = &mut self.state;
        for restaurant in restaurants.values_mut() {
            let Some(index) = restaurant.pending_orders.iter().position(|o| o.id == po_id)
            else {
                continue;
            };
            let order = &mut restaurant.pending_orders[index];
            let (receipt, lots) =
                sim_econ::receive_delivery(catalog, order, deliveries, received_date, false)?;
            let closed = order
                .lines
                .iter()
                .all(|l| l.status == sim_core::PoStatus::Closed);
            if closed {
                restaurant.pending_orders.remove(index);
            }
            for lot in lots {
                restaurant
                    .stock
                    .add_lot(lot)
                    .expect("received lot is valid");
            }
            return Ok(receipt);
        }
        Err(ReceivingError::UnknownOrder(po_id.to_string()))
    }
}
