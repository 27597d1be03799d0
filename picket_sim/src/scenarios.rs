//! Scenario generators - scripted observation waves.
//!
//! Reproduces the demo scenarios the operator dashboard injects: a handful
//! of air/sea/benign contacts scattered around a reference point, re-sighted
//! with positional jitter on every wave so repeated submissions exercise the
//! correlation path.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use picket_core::models::{ContactType, Observation, Position, Quality, Velocity};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Reference point the scenarios orbit (Gulf/Houston-ish).
const CENTER_LAT: f64 = 29.7604;
const CENTER_LON: f64 = -95.3698;

/// Per-wave re-sighting jitter in miles.
const RESIGHT_JITTER_MILES: f64 = 0.3;

// 1 degree latitude ~ 69 miles
fn miles_to_lat(dmiles: f64) -> f64 {
    dmiles / 69.0
}

// 1 degree longitude ~ 69*cos(lat) miles
fn miles_to_lon(dmiles: f64, at_lat: f64) -> f64 {
    let denom = 69.0 * at_lat.to_radians().cos();
    if denom == 0.0 {
        return 0.0;
    }
    dmiles / denom
}

/// Available scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioId {
    /// Three air contacts, one with a fast-closing profile
    Air,
    /// Three surface contacts, one sourced from an AIS edge sensor
    Sea,
    /// Two benign low-altitude contacts
    Benign,
    /// All of the above in one wave
    Mixed,
}

impl ScenarioId {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Air => "air",
            ScenarioId::Sea => "sea",
            ScenarioId::Benign => "benign",
            ScenarioId::Mixed => "mixed",
        }
    }
}

struct ContactSpec {
    prefix: &'static str,
    idx: usize,
    label: String,
    sensor_id: &'static str,
    sensor_type: &'static str,
    contact_type: ContactType,
    alt_m: f64,
    velocity: Velocity,
    confidence: f64,
    max_miles: f64,
    scenario_tag: &'static str,
}

fn air_specs() -> Vec<ContactSpec> {
    (1..=3)
        .map(|i| {
            let closing_fast = i == 1;
            let (sensor_id, sensor_type) = if i == 2 {
                ("EOIR-02", "EOIR")
            } else {
                ("RADAR-01", "RADAR")
            };
            ContactSpec {
                prefix: "AIR",
                idx: i,
                label: format!("AIRPLANE-{:02}", i),
                sensor_id,
                sensor_type,
                contact_type: ContactType::Air,
                alt_m: if closing_fast { 12000.0 } else { 9000.0 },
                velocity: Velocity {
                    vx_mps: if closing_fast { 420.0 } else { 250.0 },
                    vy_mps: 80.0,
                    vz_mps: 0.0,
                },
                confidence: 0.88,
                max_miles: 10.0,
                scenario_tag: if closing_fast {
                    "airborne_fast_closing"
                } else {
                    "air"
                },
            }
        })
        .collect()
}

fn sea_specs() -> Vec<ContactSpec> {
    (1..=3)
        .map(|i| {
            let (sensor_id, sensor_type) = if i == 3 {
                ("AIS-EDGE-01", "AIS")
            } else {
                ("RADAR-01", "RADAR")
            };
            ContactSpec {
                prefix: "SEA",
                idx: i,
                label: format!("VESSEL-{:02}", i),
                sensor_id,
                sensor_type,
                contact_type: ContactType::Sea,
                alt_m: 0.0,
                velocity: Velocity {
                    vx_mps: 18.0,
                    vy_mps: 3.0,
                    vz_mps: 0.0,
                },
                confidence: 0.82,
                max_miles: 12.0,
                scenario_tag: "sea_surface_no_ais",
            }
        })
        .collect()
}

fn benign_specs() -> Vec<ContactSpec> {
    (1..=2)
        .map(|i| ContactSpec {
            prefix: "BENIGN",
            idx: i,
            label: format!("BENIGN-{:02}", i),
            sensor_id: "RADAR-01",
            sensor_type: "RADAR",
            contact_type: ContactType::Benign,
            alt_m: 1500.0,
            velocity: Velocity {
                vx_mps: 120.0,
                vy_mps: 40.0,
                vz_mps: 0.0,
            },
            confidence: 0.85,
            max_miles: 6.0,
            scenario_tag: "benign",
        })
        .collect()
}

fn specs_for(scenario: ScenarioId) -> Vec<ContactSpec> {
    match scenario {
        ScenarioId::Air => air_specs(),
        ScenarioId::Sea => sea_specs(),
        ScenarioId::Benign => benign_specs(),
        ScenarioId::Mixed => {
            let mut specs = air_specs();
            specs.extend(sea_specs());
            specs.extend(benign_specs());
            specs
        }
    }
}

/// Seeded observation generator.
///
/// Contacts keep their identity (object_id) across waves; positions take a
/// small random walk so later waves re-sight the same tracks.
pub struct ScenarioGenerator {
    rng: ChaCha8Rng,
    run_id: String,
    positions: HashMap<String, Position>,
}

impl ScenarioGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e3779b97f4a7c15)),
            run_id: format!("{:08x}", seed),
            positions: HashMap::new(),
        }
    }

    fn object_id(&self, prefix: &str, idx: usize) -> String {
        // Unique per run and per contact
        format!("{}-{}-{:02}", prefix, self.run_id, idx)
    }

    fn observation_id(&mut self) -> String {
        format!("OBS-{:012x}", self.rng.gen::<u64>() & 0xffff_ffff_ffff)
    }

    fn offset_position(&mut self, max_miles: f64, alt_m: f64) -> Position {
        let dx = self.rng.gen_range(-max_miles..=max_miles);
        let dy = self.rng.gen_range(-max_miles..=max_miles);
        Position {
            lat: CENTER_LAT + miles_to_lat(dy),
            lon: CENTER_LON + miles_to_lon(dx, CENTER_LAT),
            alt_m,
        }
    }

    fn resight(&mut self, base: Position) -> Position {
        let dx = self.rng.gen_range(-RESIGHT_JITTER_MILES..=RESIGHT_JITTER_MILES);
        let dy = self.rng.gen_range(-RESIGHT_JITTER_MILES..=RESIGHT_JITTER_MILES);
        Position {
            lat: base.lat + miles_to_lat(dy),
            lon: base.lon + miles_to_lon(dx, base.lat),
            alt_m: base.alt_m,
        }
    }

    /// Builds one wave of observations for the scenario.
    pub fn wave(&mut self, scenario: ScenarioId, ts_utc: DateTime<Utc>) -> Vec<Observation> {
        specs_for(scenario)
            .into_iter()
            .map(|spec| {
                let object_id = self.object_id(spec.prefix, spec.idx);

                let position = match self.positions.get(&object_id).copied() {
                    Some(base) => self.resight(base),
                    None => self.offset_position(spec.max_miles, spec.alt_m),
                };
                self.positions.insert(object_id.clone(), position);

                Observation {
                    observation_id: self.observation_id(),
                    sensor_id: spec.sensor_id.into(),
                    sensor_type: spec.sensor_type.into(),
                    ts_utc,
                    position,
                    velocity: spec.velocity,
                    quality: Quality {
                        snr_db: 0.0,
                        confidence: spec.confidence,
                    },
                    object_id: Some(object_id),
                    label: Some(spec.label),
                    contact_type: Some(spec.contact_type),
                    metadata: Some(serde_json::json!({ "scenario": spec.scenario_tag })),
                }
            })
            .collect()
    }
}
