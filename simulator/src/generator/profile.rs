use crate::generator::template::{offset, Route};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sightcore::ingestion::{CellIdentity, CellInfo, RadioSighting, WifiScanResult};
use sightcore::{EmitterType, Location};
use std::f64::consts::PI;

/// Configuration for generating a synthetic drive through a field of emitters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    pub start: Location,
    /// Waypoints after the start, as (bearing degrees, miles) legs.
    pub legs: Vec<(f64, f64)>,
    pub speed_mps: f64,
    pub stationary_per_type: usize,
    /// Emitters that ride along with the operator.
    pub co_travelers: usize,
    pub detection_radius_m: f64,
    /// Source types that answer every poll with a permission error.
    pub denied: Vec<EmitterType>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            start: Location::new(40.0, -74.0),
            legs: vec![(0.0, 6.0), (90.0, 4.0), (0.0, 8.0)],
            speed_mps: 25.0,
            stationary_per_type: 40,
            co_travelers: 3,
            detection_radius_m: 400.0,
            denied: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimEmitter {
    pub emitter: EmitterType,
    pub name: Option<String>,
    pub id: String,
    pub base_rssi: i32,
    /// `None` for emitters that travel with the operator.
    pub anchor: Option<Location>,
    pub cell: Option<CellIdentity>,
}

#[derive(Debug, Clone)]
pub struct World {
    pub route: Route,
    pub emitters: Vec<SimEmitter>,
    pub detection_radius_m: f64,
}

fn mac(rng: &mut StdRng) -> String {
    let bytes: [u8; 6] = rng.gen();
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

fn emitter(rng: &mut StdRng, emitter: EmitterType, index: usize, anchor: Option<Location>) -> SimEmitter {
    let (name, cell) = match emitter {
        EmitterType::Wifi => {
            let hidden = rng.gen_bool(0.1);
            ((!hidden).then(|| format!("Network-{:03}", index)), None)
        }
        EmitterType::Bt | EmitterType::Ble => {
            let named = rng.gen_bool(0.6);
            (named.then(|| format!("{}-{:03}", emitter, index)), None)
        }
        EmitterType::Cell => {
            let identity = CellIdentity::Lte {
                mcc: "310".into(),
                mnc: "260".into(),
                tac: rng.gen_range(1..65_535),
                pci: rng.gen_range(0..504),
                ci: rng.gen_range(1..268_435_455),
            };
            (None, Some(identity))
        }
    };
    SimEmitter {
        emitter,
        name,
        id: mac(rng),
        base_rssi: rng.gen_range(-85..-45),
        anchor,
        cell,
    }
}

pub fn build_world(config: &WorldConfig) -> World {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut waypoints = vec![config.start];
    for (bearing, miles) in &config.legs {
        let last = waypoints[waypoints.len() - 1];
        waypoints.push(offset(last, bearing.to_radians(), *miles));
    }
    let route = Route::new(waypoints, config.speed_mps);

    let mut emitters = Vec::new();
    for kind in EmitterType::ALL {
        for index in 0..config.stationary_per_type {
            let leg = rng.gen_range(0..route.waypoints.len());
            let jitter_miles = rng.gen_range(0.0..0.2);
            let anchor = offset(route.waypoints[leg], rng.gen_range(0.0..2.0 * PI), jitter_miles);
            emitters.push(emitter(&mut rng, kind, index, Some(anchor)));
        }
    }
    for index in 0..config.co_travelers {
        let kind = if index % 2 == 0 { EmitterType::Ble } else { EmitterType::Bt };
        emitters.push(emitter(&mut rng, kind, 900 + index, None));
    }

    World {
        route,
        emitters,
        detection_radius_m: config.detection_radius_m,
    }
}

impl World {
    fn visible(&self, kind: EmitterType, at: Location) -> impl Iterator<Item = &SimEmitter> {
        let radius = self.detection_radius_m;
        self.emitters.iter().filter(move |e| {
            e.emitter == kind && e.anchor.map_or(true, |anchor| anchor.distance_meters(&at) <= radius)
        })
    }

    fn rssi(base: i32, rng: &mut StdRng) -> i32 {
        base + rng.gen_range(-6..=6)
    }

    pub fn wifi_scan(&self, at: Location, rng: &mut StdRng) -> Vec<WifiScanResult> {
        self.visible(EmitterType::Wifi, at)
            .map(|e| WifiScanResult {
                ssid: e.name.clone(),
                bssid: Some(e.id.clone()),
                level: Self::rssi(e.base_rssi, rng),
            })
            .collect()
    }

    pub fn radios(&self, kind: EmitterType, at: Location, rng: &mut StdRng) -> Vec<RadioSighting> {
        self.visible(kind, at)
            .map(|e| RadioSighting {
                name: e.name.clone(),
                address: e.id.clone(),
                rssi: Self::rssi(e.base_rssi, rng),
            })
            .collect()
    }

    pub fn cells(&self, at: Location, rng: &mut StdRng) -> Vec<CellInfo> {
        self.visible(EmitterType::Cell, at)
            .filter_map(|e| {
                e.cell.clone().map(|identity| CellInfo {
                    identity,
                    dbm: Self::rssi(e.base_rssi, rng) - 30,
                })
            })
            .collect()
    }
}
