use serde::{Deserialize, Serialize};
use sightcore::geodesy::METERS_PER_MILE;
use sightcore::Location;

/// Piecewise-linear path driven at constant speed; the operator parks at the
/// final waypoint once it is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub waypoints: Vec<Location>,
    pub speed_mps: f64,
}

impl Route {
    pub fn new(waypoints: Vec<Location>, speed_mps: f64) -> Self {
        Self { waypoints, speed_mps }
    }

    pub fn length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance_meters(&pair[1]))
            .sum()
    }

    /// Position after `elapsed_secs` of driving.
    pub fn position_at(&self, elapsed_secs: f64) -> Option<Location> {
        let first = *self.waypoints.first()?;
        let mut remaining = (elapsed_secs * self.speed_mps).max(0.0);
        for pair in self.waypoints.windows(2) {
            let leg = pair[0].distance_meters(&pair[1]);
            if remaining <= leg && leg > 0.0 {
                let t = remaining / leg;
                return Some(Location::new(
                    pair[0].latitude + (pair[1].latitude - pair[0].latitude) * t,
                    pair[0].longitude + (pair[1].longitude - pair[0].longitude) * t,
                ));
            }
            remaining -= leg;
        }
        Some(*self.waypoints.last().unwrap_or(&first))
    }
}

/// Offsets `origin` by a bearing and distance on a flat local approximation.
pub fn offset(origin: Location, bearing_rad: f64, miles: f64) -> Location {
    let meters = miles * METERS_PER_MILE;
    let dlat = meters * bearing_rad.cos() / 111_320.0;
    let dlon = meters * bearing_rad.sin() / (111_320.0 * origin.latitude.to_radians().cos().max(0.01));
    Location::new(origin.latitude + dlat, origin.longitude + dlon)
}
