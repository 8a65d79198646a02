//! Latitude/longitude to UTM and MGRS-style grid references (WGS84).

const LAT_BANDS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";
const EASTING_SETS: [&[u8; 8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
const NORTHING_SET: &[u8; 20] = b"ABCDEFGHJKLMNPQRSTUV";

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Projected UTM position; easting and northing never go below zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmCoordinate {
    pub zone: u32,
    pub band: char,
    pub easting: f64,
    pub northing: f64,
}

impl UtmCoordinate {
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        let zone = zone_for(lon);
        let (easting, northing) = project(lat, lon, zone);
        Self {
            zone,
            band: band_for(lat),
            easting,
            northing,
        }
    }

    /// Two-letter 100 km square identifier.
    pub fn square_id(&self) -> (char, char) {
        let set = self.zone % 6;
        let set_index: usize = if set == 0 { 5 } else { (set - 1) as usize };

        let easting_letters = EASTING_SETS[set_index % 3];
        let column = ((self.easting / 100_000.0) as i64 - 1).clamp(0, 7) as usize;

        let row = ((self.northing / 100_000.0) as i64 % 20) as usize;
        let row_offset = if set_index % 2 == 0 { 0 } else { 5 };

        (
            easting_letters[column] as char,
            NORTHING_SET[(row + row_offset) % 20] as char,
        )
    }
}

fn zone_for(lon: f64) -> u32 {
    (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32
}

fn band_for(lat: f64) -> char {
    let index = ((lat + 80.0) / 8.0).floor() as i64;
    LAT_BANDS[index.clamp(0, LAT_BANDS.len() as i64 - 1) as usize] as char
}

fn project(lat: f64, lon: f64, zone: u32) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();
    let central_meridian = (-183.0 + zone as f64 * 6.0).to_radians();

    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let tan_lat = lat_rad.tan();

    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = ep2 * cos_lat * cos_lat;
    let a = cos_lat * (lon_rad - central_meridian);

    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat_rad
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat_rad).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat_rad).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * tan_lat
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    if lat < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    (easting.max(0.0), northing.max(0.0))
}

/// Formats a coordinate as `"{zone}{band} {E}{N} {eeeee} {nnnnn}"`.
pub fn to_grid_reference(lat: f64, lon: f64) -> String {
    let utm = UtmCoordinate::from_lat_lon(lat, lon);
    let (e_letter, n_letter) = utm.square_id();
    let e_remainder = (utm.easting % 100_000.0) as i64;
    let n_remainder = (utm.northing % 100_000.0) as i64;
    format!(
        "{}{} {}{} {:05} {:05}",
        utm.zone,
        utm.band,
        e_letter,
        n_letter,
        e_remainder.max(0),
        n_remainder.max(0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_landmarks_match_reference_grids() {
        assert_eq!(to_grid_reference(40.0, -74.0), "18T WK 85360 28236");
        assert_eq!(to_grid_reference(51.5007, -0.1246), "30U XC 99567 09427");
        assert_eq!(to_grid_reference(-33.8568, 151.2153), "56H LH 34900 52288");
    }

    #[test]
    fn zone_boundaries_clamp_to_valid_range() {
        assert_eq!(UtmCoordinate::from_lat_lon(0.0, -180.0).zone, 1);
        assert_eq!(UtmCoordinate::from_lat_lon(10.0, -174.0).zone, 2);
        assert_eq!(UtmCoordinate::from_lat_lon(10.0, 180.0).zone, 60);
        assert!(to_grid_reference(10.0, 180.0).starts_with("60P "));
    }

    #[test]
    fn polar_latitudes_clamp_band() {
        assert_eq!(UtmCoordinate::from_lat_lon(-85.0, 10.0).band, 'C');
        assert_eq!(UtmCoordinate::from_lat_lon(86.0, 10.0).band, 'X');
    }

    #[test]
    fn conversion_is_deterministic() {
        let first = to_grid_reference(37.7749, -122.4194);
        for _ in 0..10 {
            assert_eq!(to_grid_reference(37.7749, -122.4194), first);
        }
    }

    #[test]
    fn equator_origin_has_zero_padded_northing() {
        assert_eq!(to_grid_reference(0.0, 0.0), "31N AA 66021 00000");
    }
}
