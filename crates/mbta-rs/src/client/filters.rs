//! Typed query arguments.
//!
//! These structs are both the client's method parameters and the tool
//! argument schemas: they derive `JsonSchema` so the dispatcher can publish
//! and validate them, and `Deserialize` so validated JSON maps straight onto
//! them. Validation that a schema cannot express (cross-field requirements,
//! time formats) happens in [`apply`](StopFilter::apply) before any request
//! is built, so library callers get the same checks as tool callers.

use super::query::Query;
use crate::error::ApiError;
use crate::geo::{haversine_m, is_valid_coordinate};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub(super) fn direction(direction_id: Option<u8>) -> Result<Option<u8>, ApiError> {
    match direction_id {
        Some(d) if d > 1 => Err(ApiError::invalid(
            "direction_id",
            format!("must be 0 or 1, got {d}"),
        )),
        other => Ok(other),
    }
}

fn route_type(route_type: Option<u8>) -> Result<Option<u8>, ApiError> {
    match route_type {
        Some(t) if t > 4 => Err(ApiError::invalid(
            "route_type",
            format!("must be between 0 and 4, got {t}"),
        )),
        other => Ok(other),
    }
}

/// `YYYY-MM-DD`.
fn service_date(date: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| Some(d.format("%Y-%m-%d").to_string()))
        .map_err(|_| ApiError::invalid("date", format!("expected YYYY-MM-DD, got '{date}'")))
}

/// `HH:MM`, where hours may exceed 23 for service after midnight.
fn service_time(field: &str, time: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(time) = time.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let invalid = || ApiError::invalid(field, format!("expected HH:MM, got '{time}'"));
    let (hours, minutes) = time.split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 47 || minutes > 59 {
        return Err(invalid());
    }
    Ok(Some(format!("{hours:02}:{minutes:02}")))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Paging controls shared by every single-page listing.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct Paging {
    /// Maximum number of results to return (1-100).
    #[serde(default)]
    #[schemars(range(min = 1, max = 100))]
    pub page_limit: Option<u32>,
    /// Number of results to skip, as returned in `next_offset`.
    #[serde(default)]
    pub page_offset: Option<u32>,
}

impl Paging {
    pub fn apply(&self, query: Query, default_limit: u32) -> Result<Query, ApiError> {
        query
            .page_limit(self.page_limit.unwrap_or(default_limit))
            .map(|q| q.page_offset(self.page_offset))
    }
}

// ── Network ────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct RouteFilter {
    /// Route ID(s), comma-separated (e.g. "Red,Orange").
    #[serde(default)]
    pub route_id: Option<String>,
    /// GTFS route type: 0 light rail, 1 subway, 2 commuter rail, 3 bus, 4 ferry.
    #[serde(default)]
    #[schemars(range(min = 0, max = 4))]
    pub route_type: Option<u8>,
    /// Only routes serving this stop.
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl RouteFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query
            .filter("id", non_blank(&self.route_id))
            .filter("type", route_type(self.route_type)?)
            .filter("stop", non_blank(&self.stop_id)))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct RouteWithStopsArgs {
    /// Route ID (e.g. "Red", "1", "Green-B").
    pub route_id: String,
    /// Restrict the stop list to one direction (0 or 1).
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct StopFilter {
    /// Stop ID(s), comma-separated (e.g. "place-pktrm").
    #[serde(default)]
    pub stop_id: Option<String>,
    /// Only stops served by this route.
    #[serde(default)]
    pub route_id: Option<String>,
    /// GTFS route type served at the stop.
    #[serde(default)]
    #[schemars(range(min = 0, max = 4))]
    pub route_type: Option<u8>,
    /// 0 stop/platform, 1 station, 2 entrance, 3 generic node, 4 boarding area.
    #[serde(default)]
    #[schemars(range(min = 0, max = 4))]
    pub location_type: Option<u8>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl StopFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        if let Some(t) = self.location_type
            && t > 4
        {
            return Err(ApiError::invalid(
                "location_type",
                format!("must be between 0 and 4, got {t}"),
            ));
        }
        Ok(query
            .filter("id", non_blank(&self.stop_id))
            .filter("route", non_blank(&self.route_id))
            .filter("route_type", route_type(self.route_type)?)
            .filter("location_type", self.location_type))
    }
}

/// Search radius used when none is given.
pub const DEFAULT_RADIUS_M: f64 = 1_000.0;

/// Metres per degree of latitude; upstream's `filter[radius]` is in degrees.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// A validated circle around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl SearchArea {
    pub fn new(latitude: f64, longitude: f64, radius_m: Option<f64>) -> Result<Self, ApiError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ApiError::invalid(
                "latitude",
                format!("must be between -90 and 90, got {latitude}"),
            ));
        }
        if !is_valid_coordinate(latitude, longitude) {
            return Err(ApiError::invalid(
                "longitude",
                format!("must be between -180 and 180, got {longitude}"),
            ));
        }
        let radius_m = radius_m.unwrap_or(DEFAULT_RADIUS_M);
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ApiError::invalid("radius_m", "must be a positive number of metres"));
        }
        Ok(Self {
            latitude,
            longitude,
            radius_m,
        })
    }

    /// Upstream's location filter. It only narrows candidates; use
    /// [`SearchArea::distance_to`] for the exact bound.
    pub fn apply(&self, query: Query) -> Query {
        query
            .filter("latitude", Some(self.latitude))
            .filter("longitude", Some(self.longitude))
            .filter("radius", Some(format!("{:.6}", self.radius_m / METRES_PER_DEGREE)))
    }

    /// Haversine distance from the centre, if `point` lies inside.
    pub fn distance_to(&self, point: (f64, f64)) -> Option<f64> {
        let distance_m = haversine_m((self.latitude, self.longitude), point);
        (distance_m <= self.radius_m).then_some(distance_m)
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct NearbyStopsArgs {
    /// Latitude in decimal degrees (e.g. 42.3564).
    pub latitude: f64,
    /// Longitude in decimal degrees (e.g. -71.0624).
    pub longitude: f64,
    /// Search radius in metres (default 1000).
    #[serde(default)]
    #[schemars(range(min = 1.0, max = 50000.0))]
    pub radius_m: Option<f64>,
    /// Maximum number of stops to return (default 10).
    #[serde(default)]
    #[schemars(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

impl NearbyStopsArgs {
    pub fn area(&self) -> Result<SearchArea, ApiError> {
        SearchArea::new(self.latitude, self.longitude, self.radius_m)
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct SearchArgs {
    /// Free-text name to match (e.g. "park st", "harvard").
    #[schemars(length(min = 1))]
    pub query: String,
    /// Maximum number of matches to return (default 10).
    #[serde(default)]
    #[schemars(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    /// Only match stations near this latitude; requires `longitude`.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Only match stations near this longitude; requires `latitude`.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Radius around the point in metres (default 1000).
    #[serde(default)]
    #[schemars(range(min = 1.0, max = 50000.0))]
    pub radius_m: Option<f64>,
}

impl SearchArgs {
    /// The area to search in, if a point was given.
    pub fn area(&self) -> Result<Option<SearchArea>, ApiError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                SearchArea::new(latitude, longitude, self.radius_m).map(Some)
            }
            (None, None) if self.radius_m.is_some() => Err(ApiError::invalid(
                "radius_m",
                "requires latitude and longitude",
            )),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ApiError::invalid("longitude", "required with latitude")),
            (None, Some(_)) => Err(ApiError::invalid("latitude", "required with longitude")),
        }
    }
}

/// Arguments for the list-everything tools with optional fuzzy filtering.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct ListArgs {
    /// Optional free-text filter; results are ranked by match quality.
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum number of results (default 50).
    #[serde(default)]
    #[schemars(range(min = 1, max = 500))]
    pub max_results: Option<u32>,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct ShapeArgs {
    /// Route ID whose shapes to fetch.
    pub route_id: String,
    /// Decode each polyline into coordinate points.
    #[serde(default)]
    pub decode_points: bool,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct LineFilter {
    /// Line ID(s), comma-separated (e.g. "line-Red").
    #[serde(default)]
    pub line_id: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl LineFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query.filter("id", non_blank(&self.line_id)))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct FacilityFilter {
    /// Only facilities at this stop.
    #[serde(default)]
    pub stop_id: Option<String>,
    /// Facility type (e.g. "ELEVATOR", "ESCALATOR", "BIKE_STORAGE").
    #[serde(default)]
    pub facility_type: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl FacilityFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query
            .filter("stop", non_blank(&self.stop_id))
            .filter(
                "type",
                non_blank(&self.facility_type).map(str::to_ascii_uppercase),
            ))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct LiveFacilityFilter {
    /// Facility ID(s), comma-separated (e.g. "park-alfcl-garage").
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl LiveFacilityFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query.filter("id", non_blank(&self.facility_id)))
    }
}

// ── Planned service ────────────────────────────────────────────────

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct ScheduleFilter {
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    /// Service date, YYYY-MM-DD. Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    /// Earliest time, HH:MM. Hours past 23 select after-midnight service.
    #[serde(default)]
    pub min_time: Option<String>,
    /// Latest time, HH:MM.
    #[serde(default)]
    pub max_time: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl ScheduleFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        if non_blank(&self.route_id).is_none()
            && non_blank(&self.stop_id).is_none()
            && non_blank(&self.trip_id).is_none()
        {
            return Err(ApiError::invalid(
                "route_id",
                "at least one of route_id, stop_id or trip_id is required",
            ));
        }
        let min_time = service_time("min_time", self.min_time.as_deref())?;
        let max_time = service_time("max_time", self.max_time.as_deref())?;
        if let (Some(min), Some(max)) = (&min_time, &max_time)
            && min > max
        {
            return Err(ApiError::invalid(
                "max_time",
                format!("{max} is earlier than min_time {min}"),
            ));
        }
        Ok(query
            .filter("route", non_blank(&self.route_id))
            .filter("stop", non_blank(&self.stop_id))
            .filter("trip", non_blank(&self.trip_id))
            .filter("direction_id", direction(self.direction_id)?)
            .filter("date", service_date(self.date.as_deref())?)
            .filter("min_time", min_time)
            .filter("max_time", max_time)
            .sort("arrival_time"))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct TripFilter {
    /// Trip ID(s), comma-separated.
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub route_pattern_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    /// Service date, YYYY-MM-DD.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl TripFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        if non_blank(&self.trip_id).is_none()
            && non_blank(&self.route_id).is_none()
            && non_blank(&self.route_pattern_id).is_none()
        {
            return Err(ApiError::invalid(
                "route_id",
                "at least one of trip_id, route_id or route_pattern_id is required",
            ));
        }
        Ok(query
            .filter("id", non_blank(&self.trip_id))
            .filter("route", non_blank(&self.route_id))
            .filter("route_pattern", non_blank(&self.route_pattern_id))
            .filter("direction_id", direction(self.direction_id)?)
            .filter("date", service_date(self.date.as_deref())?))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct TripDetailsArgs {
    pub trip_id: String,
    /// Include live predictions for the trip.
    #[serde(default)]
    pub include_predictions: bool,
    /// Include the scheduled stop times.
    #[serde(default)]
    pub include_schedule: bool,
    /// Include the vehicle operating the trip.
    #[serde(default)]
    pub include_vehicle: bool,
}

impl TripDetailsArgs {
    pub fn includes(&self) -> Vec<&'static str> {
        let mut includes = Vec::new();
        if self.include_predictions {
            includes.push("predictions");
        }
        if self.include_schedule {
            includes.push("schedules");
        }
        if self.include_vehicle {
            includes.push("vehicle");
        }
        includes
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct ServiceFilter {
    /// Service ID(s), comma-separated.
    #[serde(default)]
    pub service_id: Option<String>,
    /// Only services used by this route.
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl ServiceFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query
            .filter("id", non_blank(&self.service_id))
            .filter("route", non_blank(&self.route_id)))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct RoutePatternFilter {
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl RoutePatternFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query
            .filter("route", non_blank(&self.route_id))
            .filter("direction_id", direction(self.direction_id)?))
    }
}

// ── Realtime ───────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct PredictionFilter {
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl PredictionFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        if non_blank(&self.stop_id).is_none()
            && non_blank(&self.route_id).is_none()
            && non_blank(&self.trip_id).is_none()
        {
            return Err(ApiError::invalid(
                "stop_id",
                "at least one of stop_id, route_id or trip_id is required",
            ));
        }
        Ok(query
            .filter("stop", non_blank(&self.stop_id))
            .filter("route", non_blank(&self.route_id))
            .filter("trip", non_blank(&self.trip_id))
            .filter("direction_id", direction(self.direction_id)?)
            .sort("arrival_time"))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct StopPredictionsArgs {
    /// Stop or station ID (e.g. "place-pktrm").
    pub stop_id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl StopPredictionsArgs {
    pub fn to_filter(&self) -> Result<PredictionFilter, ApiError> {
        if self.stop_id.trim().is_empty() {
            return Err(ApiError::invalid("stop_id", "must not be empty"));
        }
        Ok(PredictionFilter {
            stop_id: Some(self.stop_id.clone()),
            route_id: self.route_id.clone(),
            trip_id: None,
            direction_id: self.direction_id,
            paging: self.paging.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct VehicleFilter {
    /// Vehicle ID(s), comma-separated.
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 4))]
    pub route_type: Option<u8>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 1))]
    pub direction_id: Option<u8>,
    #[serde(flatten)]
    pub paging: Paging,
}

impl VehicleFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        Ok(query
            .filter("id", non_blank(&self.vehicle_id))
            .filter("route", non_blank(&self.route_id))
            .filter("trip", non_blank(&self.trip_id))
            .filter("route_type", route_type(self.route_type)?)
            .filter("direction_id", direction(self.direction_id)?))
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct AlertFilter {
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub trip_id: Option<String>,
    #[serde(default)]
    #[schemars(range(min = 0, max = 4))]
    pub route_type: Option<u8>,
    /// Minimum severity, 0 (informational) to 10.
    #[serde(default)]
    #[schemars(range(min = 0, max = 10))]
    pub severity: Option<u8>,
    /// Only alerts in effect now.
    #[serde(default)]
    pub active_only: bool,
    #[serde(flatten)]
    pub paging: Paging,
}

impl AlertFilter {
    pub fn apply(&self, query: Query) -> Result<Query, ApiError> {
        if let Some(s) = self.severity
            && s > 10
        {
            return Err(ApiError::invalid(
                "severity",
                format!("must be between 0 and 10, got {s}"),
            ));
        }
        Ok(query
            .filter("route", non_blank(&self.route_id))
            .filter("stop", non_blank(&self.stop_id))
            .filter("trip", non_blank(&self.trip_id))
            .filter("route_type", route_type(self.route_type)?)
            .filter("severity", self.severity.map(at_least_severity))
            .filter("datetime", self.active_only.then_some("NOW")))
    }
}

/// Upstream matches severity exactly, so "at least `s`" is sent as every
/// level from `s` to 10.
fn at_least_severity(s: u8) -> String {
    (s..=10).map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct TransferStationsArgs {
    /// Only stations served by this line (e.g. "Red", "Green", "Commuter Rail").
    #[serde(default)]
    pub line: Option<String>,
}
