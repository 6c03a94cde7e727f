use derive_more::Display;
use std::str::FromStr;

#[derive(Debug, Display, PartialEq)]
pub enum LocationError {
    #[display(fmt = "location needs to have 2 fields: \"lng,lat\"")]
    Fields,
    #[display(fmt = "could not parse coordinate: {}", _0)]
    Coordinate(String),
    #[display(fmt = "coordinate out of range: lng={} lat={}", _0, _1)]
    OutOfRange(f64, f64),
}

impl std::error::Error for LocationError {}

/// An origin coordinate in decimal degrees, ordered `lng,lat` like GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    lng: f64,
    lat: f64,
}

impl Location {
    pub fn new(lng: f64, lat: f64) -> Result<Self, LocationError> {
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(LocationError::OutOfRange(lng, lat));
        }
        Ok(Self { lng, lat })
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lng, self.lat)
    }
}

fn parse_coordinate(s: &str) -> Result<f64, LocationError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| LocationError::Coordinate(s.to_string()))
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let coords: Vec<&str> = s.split(',').collect();
        if coords.len() != 2 {
            return Err(LocationError::Fields);
        }
        let lng = parse_coordinate(coords[0])?;
        let lat = parse_coordinate(coords[1])?;
        Location::new(lng, lat)
    }
}

impl TryFrom<&str> for Location {
    type Error = LocationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}
