use crate::dataset::{pickup_locations, RouteDataset, RouteId};
use crate::error::FinderError;
use crate::location::Location;
use derive_more::Display;
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Mean earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_MAX_RADIUS_KM: f64 = 5.0;
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Great-circle distance in kilometers. `atan2` keeps it defined when rounding
/// pushes `a` slightly past 1 near antipodal points.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nearest {
    pub route_id: RouteId,
    pub location_name: String,
    pub distance_km: f64,
}

/// Closest pickup location to `origin`, if it lies within `max_radius_km`.
/// Locations with unusable coordinates produce a NaN distance and are skipped.
#[instrument(skip(dataset))]
pub fn nearest_route(
    origin: &Location,
    dataset: &RouteDataset,
    max_radius_km: f64,
) -> Option<Nearest> {
    let mut closest = None;
    let mut closest_km = f64::INFINITY;
    for (route_id, _, location) in pickup_locations(dataset) {
        let distance = haversine_km(
            origin.lat(),
            origin.lng(),
            location.latitude,
            location.longitude,
        );
        if distance < closest_km {
            closest_km = distance;
            closest = Some((route_id, location));
        }
    }

    let (route_id, location) = closest?;
    // a NaN radius must not let a far-away route through
    if !(closest_km <= max_radius_km) {
        debug!(route_id = %route_id, distance_km = closest_km, "closest route out of range");
        return None;
    }
    Some(Nearest {
        route_id: route_id.clone(),
        location_name: location.name.clone(),
        distance_km: closest_km,
    })
}

/// Parses a search radius in km, rejecting negative and non-finite values.
pub fn parse_radius(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(radius) if radius.is_finite() && radius >= 0.0 => Ok(radius),
        Ok(radius) => Err(format!("invalid radius: {}", radius)),
        Err(e) => Err(format!("invalid radius {:?}: {}", s, e)),
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq)]
pub enum GeolocationError {
    #[display(fmt = "Geolocation not supported.")]
    Unsupported,
    #[display(fmt = "Location permission denied.")]
    Denied,
    #[display(fmt = "Location unavailable.")]
    Unavailable,
    #[display(fmt = "Location request timed out.")]
    Timeout,
}

impl std::error::Error for GeolocationError {}

/// Source of a single position fix for the current device.
pub trait GeolocationProvider: Send + Sync {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, GeolocationError>>;
}

/// A position known up front, e.g. passed on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Location);

impl GeolocationProvider for FixedPosition {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, GeolocationError>> {
        futures_util::future::ready(Ok(self.0)).boxed()
    }
}

/// Host without any geolocation capability.
#[derive(Debug, Clone, Copy)]
pub struct Unsupported;

impl GeolocationProvider for Unsupported {
    fn current_position(&self) -> BoxFuture<'_, Result<Location, GeolocationError>> {
        futures_util::future::ready(Err(GeolocationError::Unsupported)).boxed()
    }
}

pub async fn locate_with_timeout<P>(
    provider: &P,
    timeout: Duration,
) -> Result<Location, GeolocationError>
where
    P: GeolocationProvider + ?Sized,
{
    tokio::time::timeout(timeout, provider.current_position())
        .await
        .unwrap_or(Err(GeolocationError::Timeout))
}

/// Asks `provider` for a fix and resolves it to the nearest route in range.
pub async fn find_nearest<P>(
    provider: &P,
    dataset: &RouteDataset,
    max_radius_km: f64,
    timeout: Duration,
) -> Result<Nearest, FinderError>
where
    P: GeolocationProvider + ?Sized,
{
    let origin = locate_with_timeout(provider, timeout).await?;
    nearest_route(&origin, dataset, max_radius_km).ok_or(FinderError::OutOfRange)
}
