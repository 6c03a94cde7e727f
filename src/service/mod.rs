use crate::dataset::{route_target, DatasetStatus, DatasetStore, RouteDataset, RouteId};
use crate::error::FinderError;
use crate::geolocator::{nearest_route, GeolocationError, Nearest};
use crate::location::Location;
use crate::matcher::{self, Candidate};
use actix_web::dev::{Server, Service as _};
use actix_web::http::StatusCode;
use actix_web::{error, get, post, web, App, Error, HttpResponse, HttpServer, Responder};
use derive_more::Display;
use futures_util::future::FutureExt;
use futures_util::StreamExt;
use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::net::TcpListener;
use std::str::from_utf8;
use time::OffsetDateTime;
use tracing::{info, instrument};
use tracing_actix_web::TracingLogger;

lazy_static! {
    static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = register_int_counter_vec!(
        Opts::new("http_requests_total", "Total Requests"),
        &["code", "method", "route"],
    )
    .unwrap();
    static ref RESPONSE_TIME_COLLECTOR: HistogramVec = register_histogram_vec!(
        HistogramOpts::new("http_request_duration_seconds", "Response Times"),
        &["code", "method", "route"]
    )
    .unwrap();
}

const TRACKED_ROUTES: [&str; 6] = [
    "/health",
    "/dataset",
    "/suggest",
    "/best_match",
    "/nearest",
    "/bulk",
];

pub struct ServiceConfig {
    pub store: DatasetStore,
    pub listener: TcpListener,
    pub max_radius_km: f64,
    pub parallel: bool,
}

struct AppState {
    store: DatasetStore,
    max_radius_km: f64,
    parallel: bool,
}

#[derive(Debug, Display)]
pub struct ParsingError(String);

impl error::ResponseError for ParsingError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
pub struct NearestQuery {
    loc: Option<String>,
    radius_km: Option<f64>,
}

#[derive(Deserialize, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<SuggestionResponse>,
}

#[derive(Deserialize, Serialize)]
pub struct SuggestionResponse {
    pub route_id: RouteId,
    pub route_name: String,
    pub location: String,
    pub score: f64,
    pub target: String,
}

impl From<Candidate> for SuggestionResponse {
    fn from(candidate: Candidate) -> Self {
        SuggestionResponse {
            target: route_target(&candidate.route_id),
            route_id: candidate.route_id,
            route_name: candidate.route_name,
            location: candidate.location_name,
            score: candidate.score,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct MatchResponse {
    pub route_id: RouteId,
    pub target: String,
}

impl From<RouteId> for MatchResponse {
    fn from(route_id: RouteId) -> Self {
        MatchResponse {
            target: route_target(&route_id),
            route_id,
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct NearestResponse {
    pub route_id: RouteId,
    pub location: String,
    pub distance_km: f64,
    pub target: String,
}

impl From<Nearest> for NearestResponse {
    fn from(n: Nearest) -> Self {
        NearestResponse {
            target: route_target(&n.route_id),
            route_id: n.route_id,
            location: n.location_name,
            distance_km: n.distance_km,
        }
    }
}

fn parse_loc_line(line: &str) -> Result<(&str, Location), ParsingError> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 3 {
        return Err(ParsingError(format!(
            "csv row needs to have 3 fields: \"id,lng,lat\" {}",
            line
        )));
    }
    let id = parts[0];
    let location = (|| -> Result<Location, Box<dyn std::error::Error>> {
        let lng: f64 = parts[1].trim().parse()?;
        let lat: f64 = parts[2].trim().parse()?;
        let location = Location::new(lng, lat)?;
        Ok(location)
    })()
    .map_err(|e| ParsingError(e.to_string()))?;
    Ok((id, location))
}

#[instrument(skip(dataset))]
fn process_line(
    line: &str,
    dataset: &RouteDataset,
    max_radius_km: f64,
) -> Result<String, ParsingError> {
    let (id, loc) = parse_loc_line(line)?;
    let route_id = nearest_route(&loc, dataset, max_radius_km)
        .map(|n| n.route_id)
        .unwrap_or_default();
    Ok(format!("{},{}\n", id, route_id))
}

fn process_payload(
    bytes: &[u8],
    dataset: &RouteDataset,
    max_radius_km: f64,
    parallel: bool,
) -> Result<Vec<String>, ParsingError> {
    let process = |line: &&str| process_line(line, dataset, max_radius_km);
    let utf8_str = from_utf8(bytes)
        .map_err(|_| ParsingError("could not parse payload into utf8 string".into()))?;
    let lines: Vec<&str> = utf8_str.split_terminator('\n').collect();
    if parallel {
        lines.par_iter().map(process).collect()
    } else {
        lines.iter().map(process).collect()
    }
}

#[get("/health")]
async fn health() -> &'static str {
    "Ok"
}

#[get("/dataset")]
async fn dataset_status(state: web::Data<AppState>) -> web::Json<DatasetStatus> {
    web::Json(state.store.status())
}

#[get("/suggest")]
async fn suggest(query: web::Query<SearchQuery>, state: web::Data<AppState>) -> impl Responder {
    let dataset = state.store.get();
    let suggestions = matcher::suggest(&query.q, &dataset)
        .into_iter()
        .map(SuggestionResponse::from)
        .collect();
    web::Json(SuggestResponse { suggestions })
}

#[get("/best_match")]
async fn best_match(
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> Result<web::Json<MatchResponse>, FinderError> {
    if matcher::normalize(&query.q).is_none() {
        return Err(FinderError::EmptyQuery);
    }
    if state.store.is_failed() {
        return Err(FinderError::DataUnavailable);
    }
    let dataset = state.store.get();
    let route_id = matcher::best_match(&query.q, &dataset).ok_or(FinderError::NoMatch)?;
    info!(route_id = %route_id, "best match");
    Ok(web::Json(route_id.into()))
}

#[get("/nearest")]
async fn nearest(
    query: web::Query<NearestQuery>,
    state: web::Data<AppState>,
) -> Result<web::Json<NearestResponse>, Error> {
    let loc = query
        .loc
        .as_deref()
        .ok_or(FinderError::Geolocation(GeolocationError::Unsupported))?;
    let origin: Location = loc.try_into().map_err(error::ErrorBadRequest)?;
    let max_radius_km = match query.radius_km {
        None => state.max_radius_km,
        Some(radius) if radius.is_finite() && radius >= 0.0 => radius,
        Some(radius) => {
            return Err(ParsingError(format!("invalid radius_km: {}", radius)).into());
        }
    };
    if state.store.is_failed() {
        return Err(FinderError::DataUnavailable.into());
    }
    let dataset = state.store.get();
    let found =
        nearest_route(&origin, &dataset, max_radius_km).ok_or(FinderError::OutOfRange)?;
    Ok(web::Json(found.into()))
}

#[post("/bulk")]
async fn bulk(
    mut payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut bytes = web::BytesMut::new();
    while let Some(item) = payload.next().await {
        bytes.extend_from_slice(&item?);
    }
    let dataset = state.store.get();
    let max_radius_km = state.max_radius_km;
    let parallel = state.parallel;
    let output_lines =
        web::block(move || process_payload(&bytes, &dataset, max_radius_km, parallel)).await??;
    let body: String = output_lines.into_iter().collect();

    Ok(HttpResponse::Ok().body(body))
}

#[get("/metrics")]
async fn metrics() -> Result<String, Error> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(error::ErrorInternalServerError)
}

fn track_metrics(code: u16, method: &str, route: &str, time: f64) {
    if !TRACKED_ROUTES.contains(&route) {
        return;
    }

    let normalized_code = match code {
        200..=299 => "2XX",
        300..=399 => "3XX",
        400..=499 => "4XX",
        500..=599 => "5XX",
        _ => "invalid",
    };

    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[normalized_code, method, route])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[normalized_code, method, route])
        .observe(time);
}

pub fn run_service(config: ServiceConfig) -> Result<Server, std::io::Error> {
    let ServiceConfig {
        store,
        listener,
        max_radius_km,
        parallel,
    } = config;
    let state = web::Data::new(AppState {
        store,
        max_radius_km,
        parallel,
    });
    info!(address = %listener.local_addr()?, "starting route finder");
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap_fn(|req, srv| {
                let path = String::from(req.path());
                let method = String::from(req.method().as_str());
                let offset = OffsetDateTime::now_utc();
                srv.call(req).map(move |res| {
                    let time = OffsetDateTime::now_utc() - offset;
                    if let Ok(ref res) = res {
                        let status = res.response().status();
                        track_metrics(status.into(), &method, &path, time.as_seconds_f64());
                    }
                    res
                })
            })
            .service(health)
            .service(dataset_status)
            .service(suggest)
            .service(best_match)
            .service(nearest)
            .service(bulk)
            .service(metrics)
    })
    .listen(listener)?
    .run();
    Ok(server)
}
