pub mod haversine;
pub mod mgrs;

pub use haversine::{haversine_distance_miles, EARTH_RADIUS_MILES, METERS_PER_MILE};
pub use mgrs::{to_grid_reference, UtmCoordinate};
