//! Great-circle distance and path interpolation.

use crate::LatLng;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points (haversine formula).
#[must_use]
pub fn distance_meters(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Linear interpolation of latitude and longitude along `a -> b`.
///
/// This is not a geodesic slerp. Positions are recomputed from the
/// endpoints on every tick, so the error stays bounded by the chord/arc
/// difference of a single leg and is invisible at sub-10,000 km legs.
/// `fraction` is clamped to `[0, 1]`.
#[must_use]
pub fn interpolate(a: LatLng, b: LatLng, fraction: f64) -> LatLng {
    let f = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    LatLng {
        lat: a.lat + (b.lat - a.lat) * f,
        lng: a.lng + (b.lng - a.lng) * f,
    }
}
