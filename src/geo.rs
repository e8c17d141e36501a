//! Great-circle distance and constant-speed ETA.

use crate::model::{ArrivalEstimate, Coordinates};

/// Mean Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Whole minutes needed to cover `distance_km` at `speed_kmh`, rounded up.
pub fn eta_minutes(distance_km: f64, speed_kmh: f64) -> u32 {
    if distance_km <= 0.0 || speed_kmh <= 0.0 {
        return 0;
    }
    let minutes = (distance_km / speed_kmh * 60.0).ceil();
    if minutes >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        minutes as u32
    }
}

pub fn estimate(from: Coordinates, to: Coordinates, speed_kmh: f64) -> ArrivalEstimate {
    let distance_km = haversine_km(from, to);
    ArrivalEstimate {
        distance_km: (distance_km * 100.0).round() / 100.0,
        eta_minutes: eta_minutes(distance_km, speed_kmh),
    }
}
