use crate::error::LoadError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub type RouteId = String;

/// Routes keyed by id, iterated in the order of the source document.
pub type RouteDataset = IndexMap<RouteId, Route>;

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_name: String,
    #[serde(default)]
    pub pickup_locations: Vec<PickupLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickupLocation {
    pub name: String,
    #[serde(default = "nan", deserialize_with = "lenient_coordinate")]
    pub latitude: f64,
    #[serde(default = "nan", deserialize_with = "lenient_coordinate")]
    pub longitude: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

fn nan() -> f64 {
    f64::NAN
}

// Anything that is not a number or a numeric string becomes NaN, which never
// qualifies as the nearest location.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawCoordinate>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawCoordinate::Number(value)) => value,
        Some(RawCoordinate::Text(text)) => text.trim().parse().unwrap_or(f64::NAN),
        Some(RawCoordinate::Other(_)) | None => f64::NAN,
    };
    Ok(value)
}

/// All (route id, route, pickup location) triples in dataset order.
pub fn pickup_locations(
    dataset: &RouteDataset,
) -> impl Iterator<Item = (&RouteId, &Route, &PickupLocation)> {
    dataset.iter().flat_map(|(route_id, route)| {
        route
            .pickup_locations
            .iter()
            .map(move |location| (route_id, route, location))
    })
}

/// Navigation target for the host UI.
pub fn route_target(route_id: &str) -> String {
    format!("route/{}", route_id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl From<&str> for DataSource {
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            DataSource::Url(s.to_string())
        } else {
            DataSource::File(s.into())
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => write!(f, "{}", url),
        }
    }
}

pub fn parse_dataset(text: &str) -> Result<RouteDataset, LoadError> {
    let dataset = serde_json::from_str(text)?;
    Ok(dataset)
}

async fn fetch(url: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

#[instrument]
pub async fn load_dataset(source: &DataSource) -> Result<RouteDataset, LoadError> {
    let text = match source {
        DataSource::File(path) => tokio::fs::read_to_string(path).await?,
        DataSource::Url(url) => fetch(url).await?,
    };
    parse_dataset(&text)
}

#[derive(Debug)]
enum State {
    Loading,
    Ready(Arc<RouteDataset>),
    Failed(String),
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DatasetStatus {
    pub state: &'static str,
    pub routes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared handle to the dataset. It starts out empty and is swapped exactly
/// once, when the load resolves.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    state: Arc<RwLock<State>>,
    empty: Arc<RouteDataset>,
}

impl Default for DatasetStore {
    fn default() -> Self {
        DatasetStore {
            state: Arc::new(RwLock::new(State::Loading)),
            empty: Arc::new(RouteDataset::new()),
        }
    }
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: RouteDataset) -> Self {
        let store = Self::default();
        store.set_ready(dataset);
        store
    }

    /// Snapshot of the current dataset; empty while loading or after a failure.
    pub fn get(&self) -> Arc<RouteDataset> {
        match &*self.state.read() {
            State::Ready(dataset) => dataset.clone(),
            State::Loading | State::Failed(_) => self.empty.clone(),
        }
    }

    pub fn status(&self) -> DatasetStatus {
        match &*self.state.read() {
            State::Loading => DatasetStatus {
                state: "loading",
                routes: 0,
                message: None,
            },
            State::Ready(dataset) => DatasetStatus {
                state: "ready",
                routes: dataset.len(),
                message: None,
            },
            State::Failed(message) => DatasetStatus {
                state: "failed",
                routes: 0,
                message: Some(message.clone()),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(&*self.state.read(), State::Failed(_))
    }

    pub fn set_ready(&self, dataset: RouteDataset) {
        *self.state.write() = State::Ready(Arc::new(dataset));
    }

    pub fn set_failed(&self, message: String) {
        *self.state.write() = State::Failed(message);
    }

    pub async fn load(&self, source: &DataSource) {
        match load_dataset(source).await {
            Ok(dataset) => {
                info!(routes = dataset.len(), %source, "route data loaded");
                self.set_ready(dataset);
            }
            Err(e) => {
                error!(error = %e, %source, "route data unavailable");
                self.set_failed(crate::FinderError::DataUnavailable.to_string());
            }
        }
    }

    pub fn spawn_load(&self, source: DataSource) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move { store.load(&source).await })
    }
}
