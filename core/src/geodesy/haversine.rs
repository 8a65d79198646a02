pub const EARTH_RADIUS_MILES: f64 = 3958.8;
pub const METERS_PER_MILE: f64 = 1609.344;

/// Great-circle distance between two points in statute miles.
pub fn haversine_distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    EARTH_RADIUS_MILES * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero_apart() {
        for &(lat, lon) in &[(0.0, 0.0), (40.0, -74.0), (-33.85, 151.2), (89.9, 180.0)] {
            assert_eq!(haversine_distance_miles(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let forward = haversine_distance_miles(51.5007, -0.1246, 40.6892, -74.0445);
        let backward = haversine_distance_miles(40.6892, -74.0445, 51.5007, -0.1246);
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_equator_is_about_69_miles() {
        let d = haversine_distance_miles(0.0, 0.0, 0.0, 1.0);
        assert!((d - 69.094).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antimeridian_crossing_takes_the_short_way() {
        let d = haversine_distance_miles(0.0, 179.9, 0.0, -179.9);
        assert!((d - 13.82).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antipodal_points_stay_finite() {
        let half_circumference = EARTH_RADIUS_MILES * std::f64::consts::PI;
        for lat in (-90..=90).step_by(3) {
            for lon in (-180..=180).step_by(5) {
                let (lat, lon) = (lat as f64, lon as f64);
                for other_lon in [lon + 180.0, lon - 180.0] {
                    let d = haversine_distance_miles(lat, lon, -lat, other_lon);
                    assert!(d.is_finite(), "NaN for ({lat}, {lon})");
                    assert!((d - half_circumference).abs() < 1.0, "got {d} for ({lat}, {lon})");
                }
            }
        }
    }
}
