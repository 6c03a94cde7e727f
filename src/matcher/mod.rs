use crate::dataset::{pickup_locations, RouteDataset, RouteId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;

pub const SUGGESTION_LIMIT: usize = 4;

const EXACT: u32 = 6;
const PREFIX: u32 = 4;
const SUBSTRING: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub route_id: RouteId,
    pub route_name: String,
    pub location_name: String,
    pub score: f64,
}

/// Trims and lower-cases a raw query. Blank input yields `None`.
pub fn normalize(query: &str) -> Option<String> {
    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_lowercase())
    }
}

/// Base tier of `text` against `query`. Both must already be normalized.
pub fn score(query: &str, text: &str) -> u32 {
    if text == query {
        EXACT
    } else if text.starts_with(query) {
        PREFIX
    } else if text.contains(query) {
        SUBSTRING
    } else {
        0
    }
}

/// Base tier plus `len(query) / len(text)`, which favours shorter names within
/// a tier. A match implies `len(text) >= len(query)`, so the bonus stays in
/// (0, 1] and never lifts a candidate into the next tier.
pub fn ranking_score(query: &str, text: &str) -> f64 {
    match score(query, text) {
        0 => 0.0,
        base => base as f64 + query.chars().count() as f64 / text.chars().count() as f64,
    }
}

fn candidates<'a>(
    query: &'a str,
    dataset: &'a RouteDataset,
) -> impl Iterator<Item = Candidate> + 'a {
    pickup_locations(dataset).filter_map(move |(route_id, route, location)| {
        let score = ranking_score(query, &location.name.to_lowercase());
        if score <= 0.0 {
            return None;
        }
        Some(Candidate {
            route_id: route_id.clone(),
            route_name: route.route_name.clone(),
            location_name: location.name.clone(),
            score,
        })
    })
}

/// Up to [`SUGGESTION_LIMIT`] candidates, best first, one per route.
#[instrument(skip(dataset))]
pub fn suggest(query: &str, dataset: &RouteDataset) -> Vec<Candidate> {
    let query = match normalize(query) {
        Some(query) => query,
        None => return vec![],
    };
    let mut results: Vec<Candidate> = candidates(&query, dataset).collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|candidate| seen.insert(candidate.route_id.clone()))
        .take(SUGGESTION_LIMIT)
        .collect()
}

/// Route owning the best-ranked location. Ties keep the first one found.
#[instrument(skip(dataset))]
pub fn best_match(query: &str, dataset: &RouteDataset) -> Option<RouteId> {
    let query = normalize(query)?;
    let mut best: Option<Candidate> = None;
    for candidate in candidates(&query, dataset) {
        if best.as_ref().map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    best.map(|candidate| candidate.route_id)
}
