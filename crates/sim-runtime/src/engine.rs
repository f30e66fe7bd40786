//! The per-turn pipeline.
//!
//! Fixed execution order, never reordered: demand-noise draw, decision
//! application, deliveries, events, AI decisions, market allocation, stock
//! consumption, accounting, satisfaction and reputation, expiry sweep,
//! taxes, cash application. RNG draws happen in a fixed order (noise, then
//! event trials in registration order, then AI jitter when enabled) so
//! identical seeds yield bit-identical outcomes.

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::ledger::{LABEL_LOAN_DRAWDOWN, LABEL_LOAN_INTEREST, LABEL_LOAN_PRINCIPAL, LABEL_WASTE};
use sim_core::money::{round_intermediate, Money};
use sim_core::{
    Catalog, ConsumedSlice, ConsumptionPolicy, Decision, DeliveryLine, LedgerEntry, LedgerKind,
    Loan, MarketingCampaign, MarketSegment, PoStatus, Restaurant, Scenario, ScenarioError, Season,
    StockManager, TurnDuration, TurnOutcome, TurnResult, TurnWarning,
};
use std::collections::BTreeMap;

use crate::state::{Simulation, SimulationState};

/// Marketing spend saturates its attractiveness boost at +25%.
const MARKETING_BOOST_CAP: f64 = 0.25;
/// Spend that buys one percentage point of boost, times 100.
const MARKETING_SPEND_SCALE: f64 = 10_000.0;

impl Simulation {
    /// Advance the simulation by one turn.
    ///
    /// Atomic: all decision validation happened at submit time, so the
    /// pipeline never aborts halfway. Recoverable conditions (stock
    /// shortages, expired lots) surface in the outcome's warnings and waste.
    pub fn run_turn(&mut self) -> Result<TurnOutcome, ScenarioError> {
        if self.is_finished() {
            return Err(ScenarioError::Exhausted(self.state.scenario.turns));
        }
        let turn = self.state.turn + 1;
        let date = self.state.current_date;
        tracing::info!(turn, %date, "running turn");

        // Single demand-noise draw, always consumed to keep the stream
        // position independent of the noise amplitude.
        let unit: f64 = self.rng.gen();
        let amplitude = self.state.scenario.demand_noise.to_f64().unwrap_or(0.0);
        let noise = (unit * 2.0 - 1.0) * amplitude;

        self.apply_decisions(turn, date);
        self.receive_due_orders(date);

        let season = Season::from_month(date.month());
        let month = date.month();
        let segments = self.state.scenario.segments.clone();
        let (new_events, modifiers) =
            self.state
                .events
                .process_turn(turn, season, month, &segments, &mut self.rng);

        // AI jitter draws, when enabled, come after the event trials;
        // staffing changes still land before the allocator reads capacity.
        self.generate_ai_decisions();
        self.apply_decisions(turn, date);

        let market = sim_econ::allocate(
            &self.state.scenario,
            &self.state.restaurants,
            &modifiers,
            noise,
        );

        let mut warnings = Vec::new();
        let mut results = Vec::new();
        let mut all_waste = Vec::new();

        let SimulationState {
            scenario,
            catalog,
            restaurants,
            ledger,
            ..
        } = &mut self.state;
        let divisor = scenario.turn_duration.monthly_divisor();

        for (id, restaurant) in restaurants.iter_mut() {
            let allocation = market
                .restaurants
                .get(id)
                .expect("allocator covers every restaurant");

            let (served, revenue, slices, mut recipe_warnings) = consume_for_service(
                catalog,
                scenario,
                restaurant,
                allocation.allocated,
                &allocation.by_segment,
                date,
            );
            warnings.append(&mut recipe_warnings);

            let mut post = |kind: LedgerKind, label: &str, amount: Money| {
                ledger.append(LedgerEntry {
                    date,
                    kind,
                    label: label.to_string(),
                    amount,
                    restaurant_id: id.clone(),
                    turn,
                });
            };

            if revenue > Decimal::ZERO {
                post(LedgerKind::Revenue, "service", revenue);
            }
            let cogs: Money = slices.iter().map(ConsumedSlice::cost_ht).sum();
            if cogs > Decimal::ZERO {
                post(LedgerKind::Cogs, "ingredients", -cogs);
            }

            let labor = sim_econ::monthly_team_cost(&restaurant.employees, scenario) / divisor;
            if labor > Decimal::ZERO {
                post(LedgerKind::Labor, "payroll", -round_intermediate(labor));
            }
            if restaurant.rent_monthly > Decimal::ZERO {
                post(
                    LedgerKind::Rent,
                    "rent",
                    -round_intermediate(restaurant.rent_monthly / divisor),
                );
            }
            if restaurant.fixed_costs_monthly > Decimal::ZERO {
                post(
                    LedgerKind::Fixed,
                    "fixed charges",
                    -round_intermediate(restaurant.fixed_costs_monthly / divisor),
                );
            }

            service_loans(&mut restaurant.loans, scenario.turn_duration, &mut post);

            // Satisfaction only when someone was served; reputation drifts
            // whenever any history exists.
            let satisfaction = if served > 0 {
                let sample = satisfaction_sample(restaurant);
                restaurant.push_satisfaction(sample);
                Some(sample)
            } else {
                None
            };
            restaurant.update_reputation();
            restaurant.tick_campaigns();

            let capacity = allocation.capacity;
            restaurant.last_utilization = if capacity > 0 {
                f64::from(served) / f64::from(capacity)
            } else {
                0.0
            };
            restaurant.last_served = served;

            // Expiry sweep is the last stock mutation of the turn.
            let waste = restaurant.stock.sweep_expired(date);
            let waste_value: Money = waste.iter().map(|l| l.value_ht()).sum();
            if waste_value > Decimal::ZERO {
                post(LedgerKind::Other, LABEL_WASTE, -waste_value);
            }
            all_waste.extend(waste);

            if scenario.turn_duration.is_fiscal() {
                if let Some(rate) = scenario.corporate_tax_rate {
                    let pre_tax = ledger.pnl(id, turn).profit;
                    if pre_tax > Decimal::ZERO {
                        let tax = round_intermediate(pre_tax * rate);
                        ledger.append(LedgerEntry {
                            date,
                            kind: LedgerKind::Tax,
                            label: "corporate tax".to_string(),
                            amount: -tax,
                            restaurant_id: id.clone(),
                            turn,
                        });
                    }
                }
            }

            // Cash is exactly the sum of this turn's signed entries.
            restaurant.cash += ledger.cash_delta(id, turn);

            let pnl = ledger.pnl(id, turn);
            let average_ticket = if served > 0 {
                round_intermediate(revenue / Decimal::from(served))
            } else {
                Decimal::ZERO
            };
            results.push(TurnResult {
                restaurant_id: id.clone(),
                allocated_demand: allocation.allocated,
                served_customers: served,
                capacity,
                utilization: restaurant.last_utilization,
                revenue,
                average_ticket,
                lost_customers: allocation.allocated - served,
                pnl,
                cash_after: restaurant.cash,
                negative_cash: restaurant.cash < Decimal::ZERO,
                satisfaction,
                reputation_after: restaurant.reputation,
                consumption: slices,
            });
        }

        let outcome = TurnOutcome {
            turn,
            date,
            total_demand: market.total_demand,
            segment_demand: market.segment_demand,
            per_restaurant: results,
            new_events,
            ledger_delta: self.state.ledger.entries_for_turn(turn),
            waste: all_waste,
            warnings,
        };

        self.state.turn = turn;
        self.state.current_date = self.state.scenario.turn_duration.advance(date);
        self.state.history.push(outcome.clone());
        Ok(outcome)
    }

    /// Generate staged decisions for every AI-controlled restaurant.
    fn generate_ai_decisions(&mut self) {
        let config = sim_ai::AiConfig::from_default_yaml().unwrap_or_default();
        let difficulty = self.state.scenario.ai_difficulty;
        let ai_ids: Vec<String> = self
            .state
            .restaurants
            .iter()
            .filter(|(_, r)| r.controller == sim_core::RestaurantController::Ai)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ai_ids {
            let restaurant = &self.state.restaurants[&id];
            let decisions = sim_ai::decide(restaurant, difficulty, &config, &mut self.rng);
            if !decisions.is_empty() {
                self.state
                    .pending_decisions
                    .entry(id)
                    .or_default()
                    .extend(decisions);
            }
        }
    }

    /// Apply every staged decision. Validation already happened at submit.
    fn apply_decisions(&mut self, turn: u32, date: NaiveDate) {
        let staged = std::mem::take(&mut self.state.pending_decisions);
        for (restaurant_id, decisions) in staged {
            let SimulationState {
                restaurants,
                ledger,
                po_counter,
                ..
            } = &mut self.state;
            let Some(restaurant) = restaurants.get_mut(&restaurant_id) else {
                continue;
            };
            for decision in decisions {
                apply_one(restaurant, decision, ledger, po_counter, turn, date);
            }
        }
    }

    /// Convert pending orders whose date has come into stock lots.
    fn receive_due_orders(&mut self, date: NaiveDate) {
        let SimulationState {
            catalog,
            restaurants,
            ..
        } = &mut self.state;
        for restaurant in restaurants.values_mut() {
            let mut due: Vec<usize> = restaurant
                .pending_orders
                .iter()
                .enumerate()
                .filter(|(_, o)| o.due_date <= date)
                .map(|(i, _)| i)
                .collect();
            // Remove back to front so indices stay valid.
            due.reverse();
            for index in due {
                let mut order = restaurant.pending_orders.remove(index);
                let deliveries: Vec<DeliveryLine> = order
                    .lines
                    .iter()
                    .filter(|l| l.status != PoStatus::Closed)
                    .map(|l| DeliveryLine {
                        ingredient_id: l.ingredient_id.clone(),
                        quantity_received: l.quantity - l.accepted_qty,
                        unit_price_ht: l.unit_price_ht,
                        vat_rate: l.vat_rate,
                        supplier_id: l.supplier_id.clone(),
                        pack_size: l.pack_size,
                        lot_number: None,
                        quality_level: l.quality_level,
                    })
                    .collect();
                match sim_econ::receive_delivery(catalog, &mut order, &deliveries, date, false) {
                    Ok((_, lots)) => {
                        for lot in lots {
                            restaurant
                                .stock
                                .add_lot(lot)
                                .expect("received lot is valid");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(order = %order.id, %err, "delivery failed");
                        restaurant.pending_orders.push(order);
                    }
                }
            }
        }
    }
}

fn apply_one(
    restaurant: &mut Restaurant,
    decision: Decision,
    ledger: &mut sim_core::Ledger,
    po_counter: &mut u32,
    turn: u32,
    date: NaiveDate,
) {
    match decision {
        Decision::SetPrice { recipe_id, price_ttc } => {
            restaurant.menu.insert(recipe_id, price_ttc);
        }
        Decision::ActivateRecipe { recipe_id } => {
            restaurant.active_recipes.insert(recipe_id);
        }
        Decision::DeactivateRecipe { recipe_id } => {
            restaurant.active_recipes.remove(&recipe_id);
        }
        Decision::SetStaffingLevel { level } => {
            restaurant.staffing_level = level;
        }
        Decision::SetIngredientQuality {
            ingredient_id,
            level,
        } => {
            restaurant.ingredient_choices.insert(ingredient_id, level);
        }
        Decision::Hire { employee } => {
            restaurant.employees.push(employee);
        }
        Decision::Fire { employee_id } => {
            restaurant.employees.retain(|e| e.id != employee_id);
        }
        Decision::RunMarketingCampaign { cost, impact_turns } => {
            let spend = cost.to_f64().unwrap_or(0.0);
            let boost = 1.0 + (spend / MARKETING_SPEND_SCALE).min(MARKETING_BOOST_CAP);
            restaurant.campaigns.push(MarketingCampaign {
                boost,
                remaining_turns: impact_turns,
            });
            ledger.append(LedgerEntry {
                date,
                kind: LedgerKind::Marketing,
                label: "campaign".to_string(),
                amount: -cost,
                restaurant_id: restaurant.id.clone(),
                turn,
            });
        }
        Decision::SubmitPurchaseOrder { lines } => {
            *po_counter += 1;
            let eta = lines.iter().map(|l| i64::from(l.eta_days)).max().unwrap_or(0);
            restaurant.pending_orders.push(sim_core::PendingPurchaseOrder {
                id: format!("po-{po_counter}"),
                created_turn: turn,
                due_date: date + Duration::days(eta),
                lines,
            });
        }
        Decision::RequestLoan {
            amount,
            annual_rate,
            term_turns,
        } => {
            restaurant.loans.push(Loan {
                principal: amount,
                outstanding: amount,
                annual_rate,
                term_turns,
                remaining_turns: term_turns,
            });
            ledger.append(LedgerEntry {
                date,
                kind: LedgerKind::Loan,
                label: LABEL_LOAN_DRAWDOWN.to_string(),
                amount,
                restaurant_id: restaurant.id.clone(),
                turn,
            });
        }
    }
}

/// Accrue interest and repay principal on every outstanding loan.
fn service_loans<F: FnMut(LedgerKind, &str, Money)>(
    loans: &mut Vec<Loan>,
    duration: TurnDuration,
    post: &mut F,
) {
    let periods_per_year = match duration {
        TurnDuration::Week => Decimal::new(52, 0),
        TurnDuration::Month => Decimal::new(12, 0),
    };
    for loan in loans.iter_mut() {
        if loan.remaining_turns == 0 || loan.outstanding <= Decimal::ZERO {
            continue;
        }
        let interest = round_intermediate(loan.outstanding * loan.annual_rate / periods_per_year);
        if interest > Decimal::ZERO {
            post(LedgerKind::Loan, LABEL_LOAN_INTEREST, -interest);
        }
        let installment = if loan.remaining_turns == 1 {
            loan.outstanding
        } else {
            round_intermediate(loan.principal / Decimal::from(loan.term_turns))
                .min(loan.outstanding)
        };
        if installment > Decimal::ZERO {
            post(LedgerKind::Loan, LABEL_LOAN_PRINCIPAL, -installment);
        }
        loan.outstanding -= installment;
        loan.remaining_turns -= 1;
    }
    loans.retain(|l| l.remaining_turns > 0 && l.outstanding > Decimal::ZERO);
}

/// Satisfaction sample from quality and the median price.
fn satisfaction_sample(restaurant: &Restaurant) -> Decimal {
    let quality = restaurant.overall_quality_score();
    let price = restaurant.median_active_price().unwrap_or(Decimal::ZERO);
    let price_malus =
        ((price - Decimal::new(15, 0)) * Decimal::new(1, 1)).max(Decimal::ZERO);
    let sample = Decimal::new(2, 0) + Decimal::new(5, 1) * (quality - Decimal::ONE) - price_malus;
    sample.clamp(Decimal::ONE, Decimal::new(5, 0))
}

/// Draw stock, tolerating the rounding edge of non-terminating per-portion
/// divisions by falling back to whatever is available.
fn draw_stock(
    stock: &mut StockManager,
    ingredient_id: &str,
    quantity: Decimal,
    today: NaiveDate,
) -> Vec<ConsumedSlice> {
    match stock.consume(ingredient_id, quantity, today) {
        Ok(slices) => slices,
        Err(_) => {
            let available = stock.available(ingredient_id, today, true);
            stock
                .consume(ingredient_id, available, today)
                .unwrap_or_default()
        }
    }
}

/// Split served customers over the active menu and consume stock.
///
/// Returns (served, revenue, slices, warnings). A recipe whose ingredients
/// run short produces what stock permits; other recipes are unaffected.
fn consume_for_service(
    catalog: &Catalog,
    scenario: &Scenario,
    restaurant: &mut Restaurant,
    allocated: u32,
    by_segment: &BTreeMap<String, u32>,
    date: NaiveDate,
) -> (u32, Money, Vec<ConsumedSlice>, Vec<TurnWarning>) {
    let menu: Vec<(String, Money)> = restaurant.active_menu().into_iter().collect();
    if menu.is_empty() || allocated == 0 {
        return (0, Decimal::ZERO, Vec::new(), Vec::new());
    }

    let desired = match scenario.consumption_policy {
        ConsumptionPolicy::UniformOverMenu => split_uniform(&menu, allocated),
        ConsumptionPolicy::SegmentWeighted => {
            split_by_segments(&menu, by_segment, &scenario.segments)
        }
    };

    let mut served = 0u32;
    let mut revenue = Decimal::ZERO;
    let mut slices = Vec::new();
    let mut warnings = Vec::new();

    for (recipe_id, price) in &menu {
        let requested = desired.get(recipe_id).copied().unwrap_or(0);
        if requested == 0 {
            continue;
        }
        let recipe = catalog.recipe(recipe_id).expect("menu recipes are cataloged");
        let batch_portions = Decimal::from(recipe.portions);

        // Feasible portions are bounded by every ingredient's availability.
        let mut feasible = requested;
        for item in &recipe.items {
            let per_portion = item.qty_brute / batch_portions;
            if per_portion <= Decimal::ZERO {
                continue;
            }
            let available = restaurant.stock.available(&item.ingredient_id, date, true);
            let cap = (available / per_portion).floor().to_u32().unwrap_or(0);
            feasible = feasible.min(cap);
        }

        if feasible < requested {
            warnings.push(TurnWarning::InsufficientStock {
                restaurant_id: restaurant.id.clone(),
                recipe_id: recipe_id.clone(),
                requested_portions: requested,
                produced_portions: feasible,
            });
        }
        if feasible == 0 {
            continue;
        }

        for item in &recipe.items {
            let per_portion = item.qty_brute / batch_portions;
            let quantity = per_portion * Decimal::from(feasible);
            if quantity > Decimal::ZERO {
                slices.extend(draw_stock(
                    &mut restaurant.stock,
                    &item.ingredient_id,
                    quantity,
                    date,
                ));
            }
        }

        served += feasible;
        revenue += *price * Decimal::from(feasible);
    }

    (served, revenue, slices, warnings)
}

/// Equal split over the menu, remainder to the first recipes in id order.
fn split_uniform(menu: &[(String, Money)], allocated: u32) -> BTreeMap<String, u32> {
    let n = menu.len() as u32;
    let base = allocated / n;
    let remainder = allocated % n;
    menu.iter()
        .enumerate()
        .map(|(i, (id, _))| {
            let extra = u32::from((i as u32) < remainder);
            (id.clone(), base + extra)
        })
        .collect()
}

/// Per-segment split: each segment's customers go to the recipes they can
/// afford (all recipes when none fits their budget), uniformly within.
fn split_by_segments(
    menu: &[(String, Money)],
    by_segment: &BTreeMap<String, u32>,
    segments: &[MarketSegment],
) -> BTreeMap<String, u32> {
    let mut desired: BTreeMap<String, u32> = BTreeMap::new();
    for segment in segments {
        let count = by_segment.get(&segment.name).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let affordable: Vec<(String, Money)> = menu
            .iter()
            .filter(|(_, price)| *price <= segment.budget)
            .cloned()
            .collect();
        let pool = if affordable.is_empty() {
            menu.to_vec()
        } else {
            affordable
        };
        for (recipe_id, portions) in split_uniform(&pool, count) {
            *desired.entry(recipe_id).or_insert(0) += portions;
        }
    }
    desired
}
