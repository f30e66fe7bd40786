//! Random events and seasonality: the per-turn modifier engine.
//!
//! Templates are evaluated in registration order every turn, each with one
//! Bernoulli draw from the shared RNG stream when eligible. Active instances
//! multiply into a single [`Modifiers`] aggregate; seasonality lands on the
//! per-segment map so it applies exactly once.

use crate::scenario::{MarketSegment, Season};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Broad event families; at most one active per family at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    Weather,
    Economic,
    Social,
    Competition,
    Supply,
    Regulation,
}

/// Multiplicative effects of one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMultipliers {
    pub demand: f64,
    pub price_sensitivity: f64,
    pub quality_importance: f64,
    /// Extra demand multiplier per segment name.
    #[serde(default)]
    pub per_segment: BTreeMap<String, f64>,
}

impl EventMultipliers {
    pub fn neutral() -> Self {
        Self {
            demand: 1.0,
            price_sensitivity: 1.0,
            quality_importance: 1.0,
            per_segment: BTreeMap::new(),
        }
    }
}

/// A triggerable event blueprint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    /// Trigger probability per eligible turn, in [0, 1].
    pub probability: f64,
    /// Turns the instance stays active.
    pub duration: u32,
    pub min_turn: u32,
    pub max_turn: u32,
    pub required_season: Option<Season>,
    pub multipliers: EventMultipliers,
}

impl EventTemplate {
    fn eligible(&self, turn: u32, season: Season) -> bool {
        (self.min_turn..=self.max_turn).contains(&turn)
            && self.required_season.map_or(true, |s| s == season)
    }
}

/// A triggered event counting down its remaining turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventInstance {
    /// Instance id: template id suffixed with the trigger turn.
    pub id: String,
    pub template_id: String,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub remaining_turns: u32,
    pub multipliers: EventMultipliers,
}

/// Aggregated multiplicative modifiers for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub demand: f64,
    pub price_sensitivity: f64,
    pub quality_importance: f64,
    /// Per-segment demand multiplier, seasonality included.
    pub per_segment: BTreeMap<String, f64>,
}

impl Modifiers {
    pub fn neutral() -> Self {
        Self {
            demand: 1.0,
            price_sensitivity: 1.0,
            quality_importance: 1.0,
            per_segment: BTreeMap::new(),
        }
    }

    pub fn segment_multiplier(&self, name: &str) -> f64 {
        self.per_segment.get(name).copied().unwrap_or(1.0)
    }
}

/// Stateful event engine: registry, active instances and archive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEngine {
    registry: Vec<EventTemplate>,
    active: Vec<EventInstance>,
    history: Vec<EventInstance>,
}

impl EventEngine {
    pub fn new(registry: Vec<EventTemplate>) -> Self {
        Self {
            registry,
            active: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn active(&self) -> &[EventInstance] {
        &self.active
    }

    pub fn history(&self) -> &[EventInstance] {
        &self.history
    }

    /// Run one turn of the event lifecycle and aggregate modifiers.
    ///
    /// Order matters: ageing precedes evaluation, so an event on its last
    /// turn no longer blocks a new one of the same category; Bernoulli draws
    /// happen in registration order to keep the RNG stream deterministic.
    pub fn process_turn<R: Rng>(
        &mut self,
        turn: u32,
        season: Season,
        month: u32,
        segments: &[MarketSegment],
        rng: &mut R,
    ) -> (Vec<EventInstance>, Modifiers) {
        // 1. Age active events; archive the finished ones.
        for event in &mut self.active {
            event.remaining_turns = event.remaining_turns.saturating_sub(1);
        }
        let (expired, alive): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|e| e.remaining_turns == 0);
        self.active = alive;
        self.history.extend(expired);

        // 2. Evaluate templates in registration order.
        let mut new_events = Vec::new();
        for template in &self.registry {
            if !template.eligible(turn, season) {
                continue;
            }
            let blocked = self
                .active
                .iter()
                .any(|e| e.category == template.category && e.remaining_turns > 1);
            if blocked {
                continue;
            }
            if rng.gen_bool(template.probability.clamp(0.0, 1.0)) {
                let instance = EventInstance {
                    id: format!("{}-{turn}", template.id),
                    template_id: template.id.clone(),
                    title: template.title.clone(),
                    description: template.description.clone(),
                    category: template.category,
                    remaining_turns: template.duration,
                    multipliers: template.multipliers.clone(),
                };
                tracing::debug!(event = %instance.id, "event triggered");
                self.active.push(instance.clone());
                new_events.push(instance);
            }
        }

        // 3. Aggregate multiplicative modifiers over active events.
        let mut modifiers = Modifiers::neutral();
        for event in &self.active {
            modifiers.demand *= event.multipliers.demand;
            modifiers.price_sensitivity *= event.multipliers.price_sensitivity;
            modifiers.quality_importance *= event.multipliers.quality_importance;
            for (segment, mult) in &event.multipliers.per_segment {
                *modifiers.per_segment.entry(segment.clone()).or_insert(1.0) *= mult;
            }
        }

        // 4. Seasonality folds into the per-segment map.
        for segment in segments {
            let factor = segment.seasonal_factor(month).to_f64().unwrap_or(1.0);
            if (factor - 1.0).abs() > f64::EPSILON {
                *modifiers
                    .per_segment
                    .entry(segment.name.clone())
                    .or_insert(1.0) *= factor;
            }
        }

        (new_events, modifiers)
    }
}

fn template(
    id: &str,
    title: &str,
    description: &str,
    category: EventCategory,
    probability: f64,
    duration: u32,
) -> EventTemplate {
    EventTemplate {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        category,
        probability,
        duration,
        min_turn: 1,
        max_turn: u32::MAX,
        required_season: None,
        multipliers: EventMultipliers::neutral(),
    }
}

/// The stock registry of sixteen market events.
pub fn default_registry() -> Vec<EventTemplate> {
    let mut registry = Vec::new();

    let mut heatwave = template(
        "heatwave",
        "Heatwave",
        "Scorching weather; customers crowd terraces for cold drinks and light dishes.",
        EventCategory::Weather,
        0.15,
        3,
    );
    heatwave.required_season = Some(Season::Summer);
    heatwave.multipliers.demand = 1.25;
    heatwave.multipliers.per_segment =
        [("students".to_string(), 1.4), ("families".to_string(), 1.3)].into();
    registry.push(heatwave);

    let mut heavy_rain = template(
        "heavy_rain",
        "Heavy rain",
        "Persistent downpours; people stay home.",
        EventCategory::Weather,
        0.20,
        2,
    );
    heavy_rain.required_season = Some(Season::Autumn);
    heavy_rain.multipliers.demand = 0.80;
    registry.push(heavy_rain);

    let mut snow_storm = template(
        "snow_storm",
        "Snow storm",
        "Heavy snowfall makes travel difficult.",
        EventCategory::Weather,
        0.12,
        2,
    );
    snow_storm.required_season = Some(Season::Winter);
    snow_storm.multipliers.demand = 0.70;
    registry.push(snow_storm);

    let mut crisis = template(
        "economic_crisis",
        "Economic downturn",
        "Households tighten their belts; price sensitivity spikes.",
        EventCategory::Economic,
        0.08,
        5,
    );
    crisis.multipliers.price_sensitivity = 1.6;
    crisis.multipliers.per_segment =
        [("students".to_string(), 0.7), ("families".to_string(), 0.8)].into();
    registry.push(crisis);

    let mut bonus = template(
        "bonus_payment",
        "Exceptional bonus",
        "Employees receive a one-off bonus; purchasing power rises.",
        EventCategory::Economic,
        0.15,
        3,
    );
    bonus.multipliers.demand = 1.20;
    bonus.multipliers.price_sensitivity = 0.85;
    registry.push(bonus);

    let mut festival = template(
        "local_festival",
        "Local festival",
        "A cultural event fills the neighborhood with visitors.",
        EventCategory::Social,
        0.25,
        2,
    );
    festival.multipliers.demand = 1.50;
    festival.multipliers.per_segment =
        [("foodies".to_string(), 1.8), ("families".to_string(), 1.4)].into();
    registry.push(festival);

    let mut strike = template(
        "transport_strike",
        "Transport strike",
        "A general transport strike keeps customers away.",
        EventCategory::Social,
        0.10,
        1,
    );
    strike.multipliers.demand = 0.65;
    registry.push(strike);

    let mut exams = template(
        "university_exams",
        "Exam season",
        "Students cram instead of eating out.",
        EventCategory::Social,
        0.30,
        4,
    );
    exams.min_turn = 3;
    exams.multipliers.per_segment = [("students".to_string(), 0.6)].into();
    registry.push(exams);

    let mut competitor = template(
        "new_competitor",
        "New competitor",
        "A new restaurant opens nearby; competition stiffens.",
        EventCategory::Competition,
        0.06,
        10,
    );
    competitor.min_turn = 5;
    competitor.multipliers.demand = 0.85;
    registry.push(competitor);

    let mut closure = template(
        "competitor_closure",
        "Competitor closes",
        "A rival shuts down for good; their regulars look elsewhere.",
        EventCategory::Competition,
        0.04,
        999,
    );
    closure.min_turn = 8;
    closure.multipliers.demand = 1.25;
    registry.push(closure);

    let mut shortage = template(
        "meat_shortage",
        "Meat shortage",
        "Supply troubles push prices up; quality matters more.",
        EventCategory::Supply,
        0.08,
        4,
    );
    shortage.multipliers.quality_importance = 1.4;
    registry.push(shortage);

    let mut harvest = template(
        "excellent_harvest",
        "Excellent harvest",
        "Local produce is abundant and outstanding.",
        EventCategory::Supply,
        0.20,
        6,
    );
    harvest.required_season = Some(Season::Autumn);
    harvest.multipliers.quality_importance = 1.2;
    registry.push(harvest);

    let mut inspection = template(
        "health_inspection",
        "Health inspection wave",
        "Hygiene inspections sweep the sector.",
        EventCategory::Regulation,
        0.18,
        3,
    );
    inspection.multipliers.quality_importance = 1.5;
    registry.push(inspection);

    let mut relief = template(
        "tax_reduction",
        "Charges relief",
        "A temporary cut in social charges lifts the whole sector.",
        EventCategory::Regulation,
        0.12,
        8,
    );
    relief.multipliers.demand = 1.10;
    registry.push(relief);

    let mut trend = template(
        "food_trend",
        "Viral food trend",
        "A cuisine goes viral on social media; foodies swarm.",
        EventCategory::Social,
        0.22,
        5,
    );
    trend.multipliers.quality_importance = 1.3;
    trend.multipliers.per_segment = [("foodies".to_string(), 1.6)].into();
    registry.push(trend);

    let mut celebrity = template(
        "celebrity_visit",
        "Celebrity sighting",
        "A celebrity is spotted in the neighborhood.",
        EventCategory::Social,
        0.05,
        2,
    );
    celebrity.multipliers.demand = 1.80;
    celebrity.multipliers.per_segment = [("foodies".to_string(), 2.2)].into();
    registry.push(celebrity);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::fixtures::segment;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal::Decimal;

    fn always(id: &str, category: EventCategory, duration: u32) -> EventTemplate {
        let mut t = template(id, id, "", category, 1.0, duration);
        t.multipliers.demand = 1.25;
        t
    }

    #[test]
    fn certain_event_triggers_and_expires() {
        let mut engine = EventEngine::new(vec![always("boom", EventCategory::Economic, 2)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let segments = vec![segment("families", 100, 1700)];

        let (new_events, modifiers) =
            engine.process_turn(1, Season::Winter, 1, &segments, &mut rng);
        assert_eq!(new_events.len(), 1);
        assert!((modifiers.demand - 1.25).abs() < 1e-12);

        // Second turn: the event is on its last turn and blocks re-trigger
        // only while remaining > 1, so a fresh instance fires.
        let (_, modifiers) = engine.process_turn(2, Season::Winter, 1, &segments, &mut rng);
        assert!(modifiers.demand > 1.0);

        assert!(!engine.history().is_empty() || !engine.active().is_empty());
    }

    #[test]
    fn same_category_does_not_stack() {
        let mut engine = EventEngine::new(vec![
            always("one", EventCategory::Economic, 5),
            always("two", EventCategory::Economic, 5),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (new_events, _) = engine.process_turn(1, Season::Winter, 1, &[], &mut rng);
        assert_eq!(new_events.len(), 1);
        assert_eq!(new_events[0].template_id, "one");
    }

    #[test]
    fn season_gate_blocks_off_season_events() {
        let mut t = always("heat", EventCategory::Weather, 3);
        t.required_season = Some(Season::Summer);
        let mut engine = EventEngine::new(vec![t]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (new_events, _) = engine.process_turn(1, Season::Winter, 1, &[], &mut rng);
        assert!(new_events.is_empty());
    }

    #[test]
    fn turn_window_gates_eligibility() {
        let mut t = always("late", EventCategory::Social, 2);
        t.min_turn = 5;
        let mut engine = EventEngine::new(vec![t]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (new_events, _) = engine.process_turn(4, Season::Winter, 1, &[], &mut rng);
        assert!(new_events.is_empty());
        let (new_events, _) = engine.process_turn(5, Season::Winter, 1, &[], &mut rng);
        assert_eq!(new_events.len(), 1);
    }

    #[test]
    fn per_segment_multipliers_compose_with_seasonality() {
        let mut t = always("fest", EventCategory::Social, 2);
        t.multipliers.per_segment = [("families".to_string(), 1.3)].into();
        let mut engine = EventEngine::new(vec![t]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut seg = segment("families", 100, 1700);
        seg.seasonality.insert(7, Decimal::new(12, 1));
        let (_, modifiers) =
            engine.process_turn(1, Season::Summer, 7, &[seg], &mut rng);
        // 1.3 event x 1.2 season = 1.56
        assert!((modifiers.segment_multiplier("families") - 1.56).abs() < 1e-9);
    }

    #[test]
    fn identical_seeds_trigger_identical_events() {
        let registry = default_registry();
        let segments = vec![segment("families", 100, 1700)];
        let run = |seed: u64| {
            let mut engine = EventEngine::new(registry.clone());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut log = Vec::new();
            for turn in 1..=20 {
                let (new_events, _) =
                    engine.process_turn(turn, Season::Summer, 7, &segments, &mut rng);
                log.extend(new_events.into_iter().map(|e| e.id));
            }
            log
        };
        assert_eq!(run(42), run(42));
        // Not a guarantee in general, but with 20 turns of draws these seeds
        // diverge in practice.
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn default_registry_is_well_formed() {
        let registry = default_registry();
        assert_eq!(registry.len(), 16);
        for t in &registry {
            assert!((0.0..=1.0).contains(&t.probability), "{}", t.id);
            assert!(t.duration > 0, "{}", t.id);
        }
    }
}
