use super::dataset::{PickupLocation, Route};
use geo_types::Point;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::map::Map;
use std::fs::write;
use std::path::Path;

impl PickupLocation {
    pub fn to_feature(&self, route_id: &str, route: &Route) -> Feature {
        let mut properties = Map::new();
        properties.insert("name".to_string(), self.name.clone().into());
        properties.insert("route_id".to_string(), route_id.into());
        properties.insert("route_name".to_string(), route.route_name.clone().into());

        // unusable coordinates are kept as a feature without geometry
        let geometry = if self.longitude.is_finite() && self.latitude.is_finite() {
            let point = Point::new(self.longitude, self.latitude);
            Some(Geometry::new(Value::from(&point)))
        } else {
            None
        };

        Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

pub fn route_features(route_id: &str, route: &Route) -> FeatureCollection {
    let features = route
        .pickup_locations
        .iter()
        .map(|location| location.to_feature(route_id, route))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn write_geojson(
    path: impl AsRef<Path>,
    route_id: &str,
    route: &Route,
) -> Result<(), std::io::Error> {
    write(path, route_features(route_id, route).to_string())
}
