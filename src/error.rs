use crate::geolocator::GeolocationError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::{Display, From};
use serde::Serialize;

/// Every failure a user can run into. The display strings are shown verbatim.
#[derive(Debug, Display, PartialEq)]
pub enum FinderError {
    #[display(fmt = "Failed to load route data.")]
    DataUnavailable,
    #[display(fmt = "Please type your nearest location.")]
    EmptyQuery,
    #[display(fmt = "No matching route found.")]
    NoMatch,
    #[display(fmt = "No route found nearby. Please contact student services.")]
    OutOfRange,
    #[display(fmt = "{}", _0)]
    Geolocation(GeolocationError),
}

impl std::error::Error for FinderError {}

impl From<GeolocationError> for FinderError {
    fn from(err: GeolocationError) -> Self {
        FinderError::Geolocation(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for FinderError {
    fn status_code(&self) -> StatusCode {
        match self {
            FinderError::DataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            FinderError::EmptyQuery => StatusCode::BAD_REQUEST,
            FinderError::NoMatch | FinderError::OutOfRange => StatusCode::NOT_FOUND,
            FinderError::Geolocation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Why the route dataset could not be fetched or decoded.
#[derive(Debug, Display, From)]
pub enum LoadError {
    #[display(fmt = "could not read route data: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "could not fetch route data: {}", _0)]
    Http(reqwest::Error),
    #[display(fmt = "could not parse route data: {}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for LoadError {}
