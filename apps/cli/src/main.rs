#![deny(warnings)]

//! Headless reference host: runs a scenario end to end and exports results.
//!
//! Exit codes: 0 success, 2 unreadable input, 3 invalid scenario or catalog,
//! 4 runtime error. Logging is controlled by `FOODOPS_LOG_LEVEL`.

use clap::Parser;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sim_core::money::round_display;
use sim_core::{
    Catalog, Ingredient, MarketSegment, QualityVariant, Recipe, RecipeItem, Restaurant,
    RestaurantController, RestaurantType, Scenario, Supplier, SupplierOffer,
};
use sim_runtime::{RestaurantSpec, Simulation};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "run-simulation", version, about = "Run a restaurant market simulation")]
struct Args {
    /// Scenario file (.json or .yaml); a built-in demo runs when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Override the scenario's number of turns.
    #[arg(long)]
    turns: Option<u32>,
    /// Override the RNG seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Output directory for results.json and turns.csv.
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// Write a snapshot of the final state to this path.
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Host-side scenario file: scenario, optional catalog, restaurant specs.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenario: Scenario,
    #[serde(default)]
    catalog: Option<CatalogFile>,
    #[serde(default)]
    restaurants: Vec<RestaurantSpec>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    ingredients: Vec<Ingredient>,
    #[serde(default)]
    quality_variants: Vec<QualityVariant>,
    recipes: Vec<Recipe>,
    suppliers: Vec<Supplier>,
    offers: Vec<SupplierOffer>,
}

enum CliError {
    Input(String),
    Scenario(String),
    Runtime(String),
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            CliError::Input(_) => 2,
            CliError::Scenario(_) => 3,
            CliError::Runtime(_) => 4,
        }
    }

    fn message(&self) -> &str {
        match self {
            CliError::Input(m) | CliError::Scenario(m) | CliError::Runtime(m) => m,
        }
    }
}

fn main() -> ExitCode {
    let filter = std::env::var("FOODOPS_LOG_LEVEL")
        .map(|level| EnvFilter::new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message());
            ExitCode::from(err.code())
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let (mut scenario, catalog, specs) = match &args.scenario {
        Some(path) => load_scenario_file(path)?,
        None => {
            info!("no scenario file given, running the built-in demo");
            demo_setup()
        }
    };
    if let Some(turns) = args.turns {
        scenario.turns = turns;
    }

    let mut sim = Simulation::new(scenario, catalog, args.seed)
        .map_err(|e| CliError::Scenario(e.to_string()))?;
    for spec in specs {
        sim.add_restaurant(spec)
            .map_err(|e| CliError::Scenario(e.to_string()))?;
    }
    add_ai_competitors(&mut sim).map_err(|e| CliError::Scenario(e.to_string()))?;

    info!(
        scenario = %sim.state().scenario.name,
        turns = sim.state().scenario.turns,
        restaurants = sim.state().restaurants.len(),
        "simulation ready"
    );
    print_menu_margins(&sim);

    let turns = sim.state().scenario.turns;
    for turn in 1..=turns {
        replenish_stocks(&mut sim, turn == 1).map_err(CliError::Runtime)?;
        let outcome = sim.run_turn().map_err(|e| CliError::Runtime(e.to_string()))?;
        let served: u32 = outcome
            .per_restaurant
            .iter()
            .map(|r| r.served_customers)
            .sum();
        println!(
            "turn {:>3} | {} | demand {:>5} | served {:>5} | events {}",
            outcome.turn,
            outcome.date,
            outcome.total_demand,
            served,
            outcome.new_events.len()
        );
    }

    println!();
    for kpi in persistence::derive_kpis(&sim) {
        println!(
            "{:<16} revenue {:>12} | profit {:>12} | cash {:>12} | utilization {:>5.1}% | served {}{}",
            kpi.restaurant_id,
            round_display(kpi.total_revenue),
            round_display(kpi.total_profit),
            round_display(kpi.final_cash),
            kpi.mean_utilization * 100.0,
            kpi.total_served,
            if kpi.went_negative { " | went negative" } else { "" }
        );
    }

    persistence::write_results_json(&args.out, &sim)
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    persistence::write_turns_csv(&args.out, &sim)
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    if let Some(save) = &args.save {
        persistence::save_to_file(save, &sim).map_err(|e| CliError::Runtime(e.to_string()))?;
    }
    println!("\nresults written to {}", args.out.display());
    Ok(())
}

/// Opening margin report for the human-controlled restaurants.
fn print_menu_margins(sim: &Simulation) {
    let state = sim.state();
    for restaurant in state
        .restaurants
        .values()
        .filter(|r| r.controller == RestaurantController::Human)
    {
        println!("menu of {} ({:?}):", restaurant.name, restaurant.kind);
        for (recipe_id, price) in restaurant.active_menu() {
            let Some(recipe) = state.catalog.recipe(&recipe_id) else {
                continue;
            };
            let Ok(breakdown) = sim_econ::recipe_cost(
                &state.catalog,
                recipe,
                &restaurant.ingredient_choices,
                None,
                Some(restaurant.kind),
            ) else {
                continue;
            };
            let vat = state.scenario.vat_rate(&recipe.category);
            let analysis = sim_econ::margin_analysis(&breakdown, price, vat);
            println!(
                "  {:<16} {:>7} TTC | cost/portion {:>7} | margin {:>7} | food cost {:>5.1}%",
                recipe_id,
                round_display(price),
                round_display(analysis.cost_per_portion),
                round_display(analysis.margin_ht),
                analysis
                    .food_cost_ratio
                    .to_f64()
                    .map(|v| v * 100.0)
                    .unwrap_or(0.0),
            );
        }
    }
}

fn load_scenario_file(path: &Path) -> Result<(Scenario, Catalog, Vec<RestaurantSpec>), CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("cannot read {}: {e}", path.display())))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    let file: ScenarioFile = if is_yaml {
        serde_yaml::from_str(&text)
            .map_err(|e| CliError::Input(format!("malformed scenario file: {e}")))?
    } else {
        serde_json::from_str(&text)
            .map_err(|e| CliError::Input(format!("malformed scenario file: {e}")))?
    };

    let catalog = match file.catalog {
        Some(c) => Catalog::new(
            c.ingredients,
            c.quality_variants,
            c.recipes,
            c.suppliers,
            c.offers,
        )
        .map_err(|e| CliError::Scenario(e.to_string()))?,
        None => demo_catalog(),
    };
    Ok((file.scenario, catalog, file.restaurants))
}

/// Add the scenario's AI competitors with stock names and type-based menus.
fn add_ai_competitors(sim: &mut Simulation) -> Result<(), sim_core::DecisionError> {
    let roster: [(&str, RestaurantType); 4] = [
        ("Chez Mario", RestaurantType::Classic),
        ("Quick Burger", RestaurantType::Fast),
        ("Le Gourmet", RestaurantType::Gastronomique),
        ("Brasserie du Port", RestaurantType::Brasserie),
    ];
    let count = sim.state().scenario.ai_competitors as usize;
    let recipe_ids: Vec<String> = sim.state().catalog.recipes().map(|r| r.id.clone()).collect();
    for i in 0..count {
        let (name, kind) = roster[i % roster.len()];
        let price = match kind {
            RestaurantType::Fast => Decimal::new(1100, 2),
            RestaurantType::Classic => Decimal::new(1600, 2),
            RestaurantType::Brasserie => Decimal::new(1900, 2),
            RestaurantType::Gastronomique => Decimal::new(3400, 2),
        };
        let menu: BTreeMap<String, Decimal> = recipe_ids
            .iter()
            .take(3)
            .map(|id| (id.clone(), price))
            .collect();
        sim.add_restaurant(RestaurantSpec {
            id: format!("ai-{}", i + 1),
            name: name.to_string(),
            kind,
            capacity_base: 70,
            speed_service: Decimal::ONE,
            starting_cash: Decimal::new(5_000_000, 2),
            equipment_value: Decimal::new(3_000_000, 2),
            rent_monthly: Decimal::new(250_000, 2),
            fixed_costs_monthly: Decimal::new(80_000, 2),
            active_recipes: menu.keys().cloned().collect(),
            menu,
            staffing_level: 2,
            employees: Vec::new(),
            controller: RestaurantController::Ai,
        })?;
    }
    Ok(())
}

/// Host-side auto-replenishment: order next turn's needs from the catalog.
///
/// The first order of a run is expedited so restaurants open with stock.
fn replenish_stocks(sim: &mut Simulation, expedite: bool) -> Result<(), String> {
    let today = sim.state().current_date;
    let catalog = sim.state().catalog.clone();
    let plans: Vec<(String, Vec<sim_core::PurchaseOrderLine>)> = sim
        .state()
        .restaurants
        .values()
        .map(|r| (r.id.clone(), plan_orders(&catalog, r, today)))
        .collect();
    for (id, mut lines) in plans {
        if lines.is_empty() {
            continue;
        }
        if expedite {
            for line in &mut lines {
                line.eta_days = 0;
            }
        }
        sim.submit_decisions(&id, vec![sim_core::Decision::SubmitPurchaseOrder { lines }])
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn plan_orders(
    catalog: &Catalog,
    restaurant: &Restaurant,
    today: chrono::NaiveDate,
) -> Vec<sim_core::PurchaseOrderLine> {
    let capacity = restaurant.capacity_current().max(restaurant.capacity_base);
    let menu = restaurant.active_menu();
    if menu.is_empty() {
        return Vec::new();
    }
    let per_recipe = capacity / menu.len() as u32 + 1;
    let forecast: BTreeMap<String, u32> =
        menu.keys().map(|id| (id.clone(), per_recipe)).collect();
    let needs = sim_econ::compute_requirements(catalog, &forecast, &restaurant.stock, today);
    sim_econ::propose_orders(
        catalog,
        &needs,
        &BTreeMap::new(),
        &restaurant.ingredient_choices,
    )
}

fn demo_setup() -> (Scenario, Catalog, Vec<RestaurantSpec>) {
    let catalog = demo_catalog();
    let scenario = demo_scenario();
    let player = RestaurantSpec {
        id: "player-1".to_string(),
        name: "La Bonne Table".to_string(),
        kind: RestaurantType::Classic,
        capacity_base: 80,
        speed_service: Decimal::ONE,
        starting_cash: Decimal::new(2_000_000, 2),
        equipment_value: Decimal::new(1_500_000, 2),
        rent_monthly: Decimal::new(220_000, 2),
        fixed_costs_monthly: Decimal::new(60_000, 2),
        menu: BTreeMap::from([
            ("pasta_pomodoro".to_string(), Decimal::new(1600, 2)),
            ("tomato_soup".to_string(), Decimal::new(900, 2)),
            ("steak_frites".to_string(), Decimal::new(2100, 2)),
        ]),
        active_recipes: vec![
            "pasta_pomodoro".to_string(),
            "tomato_soup".to_string(),
            "steak_frites".to_string(),
        ],
        staffing_level: 2,
        employees: Vec::new(),
        controller: RestaurantController::Human,
    };
    (scenario, catalog, vec![player])
}

fn demo_scenario() -> Scenario {
    let affinity = |pairs: &[(RestaurantType, i64)]| -> BTreeMap<RestaurantType, Decimal> {
        pairs.iter().map(|(k, v)| (*k, Decimal::new(*v, 2))).collect()
    };
    let summer_lift: BTreeMap<u32, Decimal> = [
        (6, Decimal::new(110, 2)),
        (7, Decimal::new(120, 2)),
        (8, Decimal::new(115, 2)),
        (12, Decimal::new(105, 2)),
    ]
    .into();
    Scenario {
        name: "quartier-latin".to_string(),
        description: "Three customer segments on a busy street".to_string(),
        turns: 12,
        base_demand: 600,
        demand_noise: Decimal::new(10, 2),
        segments: vec![
            MarketSegment {
                name: "students".to_string(),
                share: Decimal::new(35, 2),
                budget: Decimal::new(1200, 2),
                type_affinity: affinity(&[
                    (RestaurantType::Fast, 140),
                    (RestaurantType::Classic, 100),
                    (RestaurantType::Gastronomique, 30),
                ]),
                price_sensitivity: Decimal::new(15, 1),
                quality_sensitivity: Decimal::new(5, 1),
                seasonality: BTreeMap::new(),
            },
            MarketSegment {
                name: "families".to_string(),
                share: Decimal::new(40, 2),
                budget: Decimal::new(1700, 2),
                type_affinity: affinity(&[
                    (RestaurantType::Fast, 110),
                    (RestaurantType::Classic, 120),
                    (RestaurantType::Brasserie, 100),
                ]),
                price_sensitivity: Decimal::ONE,
                quality_sensitivity: Decimal::ONE,
                seasonality: summer_lift.clone(),
            },
            MarketSegment {
                name: "foodies".to_string(),
                share: Decimal::new(25, 2),
                budget: Decimal::new(3500, 2),
                type_affinity: affinity(&[
                    (RestaurantType::Classic, 90),
                    (RestaurantType::Brasserie, 110),
                    (RestaurantType::Gastronomique, 150),
                ]),
                price_sensitivity: Decimal::new(5, 1),
                quality_sensitivity: Decimal::new(15, 1),
                seasonality: summer_lift,
            },
        ],
        vat_rates: BTreeMap::from([("food_onsite".to_string(), Decimal::new(10, 2))]),
        social_charges: BTreeMap::new(),
        interest_rate: Decimal::new(5, 2),
        ai_competitors: 2,
        seed: Some(42),
        start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        turn_duration: sim_core::TurnDuration::Month,
        consumption_policy: sim_core::ConsumptionPolicy::UniformOverMenu,
        ai_difficulty: sim_core::AiDifficulty::Medium,
        corporate_tax_rate: None,
        loan_cap: Some(Decimal::new(50_000_00, 2)),
    }
}

fn demo_catalog() -> Catalog {
    let ingredient = |id: &str, cost_cents: i64, shelf: u16, category: &str| Ingredient {
        id: id.to_string(),
        name: id.replace('_', " "),
        unit: "kg".to_string(),
        cost_ht: Decimal::new(cost_cents, 2),
        vat_rate: Decimal::new(10, 2),
        shelf_life_days: shelf,
        category: category.to_string(),
        density: None,
    };
    let supplier = |id: &str, reliability_pct: i64, lead: u16| Supplier {
        id: id.to_string(),
        name: id.replace('_', " "),
        reliability: Decimal::new(reliability_pct, 2),
        lead_time_days: lead,
        min_order_value: Decimal::new(5000, 2),
        shipping_cost: Decimal::new(1500, 2),
        payment_terms_days: 30,
        discount_threshold: None,
        discount_rate: None,
    };
    let offer = |ingredient: &str, supplier: &str, price_cents: i64, pack_milli: i64, lead: u16| {
        SupplierOffer {
            ingredient_id: ingredient.to_string(),
            supplier_id: supplier.to_string(),
            quality_level: 2,
            pack_size: Decimal::new(pack_milli, 3),
            pack_unit: "kg".to_string(),
            unit_price_ht: Decimal::new(price_cents, 2),
            vat_rate: Decimal::new(10, 2),
            moq_qty: Decimal::ZERO,
            moq_value: Decimal::new(3000, 2),
            lead_time_days: lead,
            reliability: Decimal::new(92, 2),
            available: true,
        }
    };
    let item = |ingredient: &str, qty_milli: i64, prep_pct: i64, cook_pct: i64| RecipeItem {
        ingredient_id: ingredient.to_string(),
        qty_brute: Decimal::new(qty_milli, 3),
        yield_prep: Decimal::new(prep_pct, 2),
        yield_cook: Decimal::new(cook_pct, 2),
    };

    Catalog::new(
        vec![
            ingredient("pasta", 150, 365, "food_onsite"),
            ingredient("tomato", 120, 6, "food_onsite"),
            ingredient("beef", 1450, 4, "food_onsite"),
            ingredient("potato", 90, 30, "food_onsite"),
            ingredient("cream", 320, 8, "food_onsite"),
        ],
        vec![QualityVariant {
            base_ingredient_id: "beef".to_string(),
            quality_level: 4,
            range_tag: "label_rouge".to_string(),
            supplier_id: "rungis".to_string(),
            modifiers: sim_core::QualityModifiers {
                cost_multiplier: Decimal::new(155, 2),
                satisfaction_bonus: Decimal::new(20, 2),
                prep_time_multiplier: Decimal::ONE,
                shelf_life_multiplier: Decimal::new(125, 2),
            },
        }],
        vec![
            Recipe {
                id: "pasta_pomodoro".to_string(),
                name: "Pasta pomodoro".to_string(),
                items: vec![item("pasta", 120, 100, 100), item("tomato", 180, 90, 95)],
                prep_minutes: 15,
                service_minutes: 8,
                portions: 1,
                category: "main".to_string(),
                difficulty: 2,
                description: "House classic with slow-cooked sauce".to_string(),
            },
            Recipe {
                id: "tomato_soup".to_string(),
                name: "Tomato soup".to_string(),
                items: vec![item("tomato", 250, 90, 90), item("cream", 40, 100, 100)],
                prep_minutes: 10,
                service_minutes: 5,
                portions: 1,
                category: "starter".to_string(),
                difficulty: 1,
                description: String::new(),
            },
            Recipe {
                id: "steak_frites".to_string(),
                name: "Steak frites".to_string(),
                items: vec![item("beef", 180, 95, 85), item("potato", 300, 85, 90)],
                prep_minutes: 12,
                service_minutes: 10,
                portions: 1,
                category: "main".to_string(),
                difficulty: 3,
                description: String::new(),
            },
        ],
        vec![supplier("metro", 92, 2), supplier("rungis", 97, 1)],
        vec![
            offer("pasta", "metro", 150, 5_000, 2),
            offer("tomato", "metro", 120, 2_000, 2),
            offer("tomato", "rungis", 135, 1_000, 1),
            offer("beef", "rungis", 1450, 1_000, 1),
            offer("potato", "metro", 90, 10_000, 2),
            offer("cream", "metro", 320, 1_000, 2),
        ],
    )
    .expect("demo catalog is consistent")
}
