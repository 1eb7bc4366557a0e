//! Static network records: stops, routes, lines, shapes, facilities.

use super::{Record, ResourceKind};
use crate::api::jsonapi::Resource;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};

// ── Stop ───────────────────────────────────────────────────────────

/// A stop, platform, station, or entrance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub description: Option<String>,
    pub municipality: Option<String>,
    pub platform_name: Option<String>,
    pub platform_code: Option<String>,
    /// 0 = stop/platform, 1 = station, 2 = entrance, 3 = generic node, 4 = boarding area.
    pub location_type: u8,
    /// 0 = no information, 1 = accessible, 2 = inaccessible.
    pub wheelchair_boarding: u8,
    pub vehicle_type: Option<u8>,
    pub parent_station_id: Option<String>,
    pub zone_id: Option<String>,
}

#[derive(Deserialize)]
struct StopAttributes {
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    municipality: Option<String>,
    #[serde(default)]
    platform_name: Option<String>,
    #[serde(default)]
    platform_code: Option<String>,
    #[serde(default)]
    location_type: Option<u8>,
    #[serde(default)]
    wheelchair_boarding: Option<u8>,
    #[serde(default)]
    vehicle_type: Option<u8>,
}

impl Stop {
    /// Coordinates when upstream supplied both.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

impl Record for Stop {
    const KIND: ResourceKind = ResourceKind::Stop;
    const FIELDS: &'static [&'static str] = &[
        "name",
        "latitude",
        "longitude",
        "description",
        "municipality",
        "platform_name",
        "platform_code",
        "location_type",
        "wheelchair_boarding",
        "vehicle_type",
        "parent_station",
        "zone",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: StopAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Stop {
            id: resource.id.clone(),
            name: a.name,
            latitude: a.latitude,
            longitude: a.longitude,
            description: a.description,
            municipality: a.municipality,
            platform_name: a.platform_name,
            platform_code: a.platform_code,
            location_type: a.location_type.unwrap_or(0),
            wheelchair_boarding: a.wheelchair_boarding.unwrap_or(0),
            vehicle_type: a.vehicle_type,
            parent_station_id: resource.to_one("parent_station"),
            zone_id: resource.to_one("zone"),
        })
    }
}

/// A stop with its great-circle distance from a query point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NearbyStop {
    #[serde(flatten)]
    pub stop: Stop,
    pub distance_m: f64,
}

// ── Route ──────────────────────────────────────────────────────────

/// A route (a single service pattern family, e.g. "Red" or bus "1").
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Route {
    pub id: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub description: Option<String>,
    /// GTFS route type: 0 light rail, 1 subway, 2 commuter rail, 3 bus, 4 ferry.
    pub route_type: u8,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub sort_order: Option<i64>,
    pub direction_names: Vec<Option<String>>,
    pub direction_destinations: Vec<Option<String>>,
    pub line_id: Option<String>,
}

#[derive(Deserialize)]
struct RouteAttributes {
    #[serde(rename = "type")]
    route_type: u8,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    text_color: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
    #[serde(default)]
    direction_names: Vec<Option<String>>,
    #[serde(default)]
    direction_destinations: Vec<Option<String>>,
}

impl Route {
    /// Best human-readable name: long name, then short name, then ID.
    pub fn display_name(&self) -> &str {
        self.long_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.short_name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.id)
    }
}

impl Record for Route {
    const KIND: ResourceKind = ResourceKind::Route;
    const FIELDS: &'static [&'static str] = &[
        "type",
        "short_name",
        "long_name",
        "description",
        "color",
        "text_color",
        "sort_order",
        "direction_names",
        "direction_destinations",
        "line",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: RouteAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Route {
            id: resource.id.clone(),
            short_name: a.short_name,
            long_name: a.long_name,
            description: a.description,
            route_type: a.route_type,
            color: a.color,
            text_color: a.text_color,
            sort_order: a.sort_order,
            direction_names: a.direction_names,
            direction_destinations: a.direction_destinations,
            line_id: resource.to_one("line"),
        })
    }
}

// ── Line ───────────────────────────────────────────────────────────

/// A line groups routes (e.g. the Green Line's B/C/D/E branches).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Line {
    pub id: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Deserialize)]
struct LineAttributes {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    text_color: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
}

impl Record for Line {
    const KIND: ResourceKind = ResourceKind::Line;
    const FIELDS: &'static [&'static str] =
        &["short_name", "long_name", "color", "text_color", "sort_order"];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: LineAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Line {
            id: resource.id.clone(),
            short_name: a.short_name,
            long_name: a.long_name,
            color: a.color,
            text_color: a.text_color,
            sort_order: a.sort_order,
        })
    }
}

// ── Shape ──────────────────────────────────────────────────────────

/// The geographic path a trip follows, as an encoded polyline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: String,
    pub polyline: String,
}

#[derive(Deserialize)]
struct ShapeAttributes {
    polyline: String,
}

impl Shape {
    /// Decode the polyline into `(latitude, longitude)` points.
    ///
    /// Uses the Google encoded-polyline format with 5 decimal places.
    /// Returns `None` if the encoding is truncated or malformed.
    pub fn points(&self) -> Option<Vec<(f64, f64)>> {
        let mut points = Vec::new();
        let mut bytes = self.polyline.bytes().peekable();
        let (mut lat, mut lon) = (0i64, 0i64);
        while bytes.peek().is_some() {
            lat += next_polyline_value(&mut bytes)?;
            lon += next_polyline_value(&mut bytes)?;
            points.push((lat as f64 / 1e5, lon as f64 / 1e5));
        }
        Some(points)
    }
}

fn next_polyline_value(bytes: &mut impl Iterator<Item = u8>) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = i64::from(bytes.next()?.checked_sub(63)?);
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
        if shift > 60 {
            return None;
        }
    }
    Some(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

impl Record for Shape {
    const KIND: ResourceKind = ResourceKind::Shape;
    const FIELDS: &'static [&'static str] = &["polyline"];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: ShapeAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Shape {
            id: resource.id.clone(),
            polyline: a.polyline,
        })
    }
}

// ── Facility ───────────────────────────────────────────────────────

/// A station amenity such as an elevator, escalator, or bike storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Facility {
    pub id: String,
    pub facility_type: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub stop_id: Option<String>,
}

#[derive(Deserialize)]
struct FacilityAttributes {
    #[serde(rename = "type")]
    facility_type: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl Record for Facility {
    const KIND: ResourceKind = ResourceKind::Facility;
    const FIELDS: &'static [&'static str] =
        &["type", "short_name", "long_name", "latitude", "longitude", "stop"];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: FacilityAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Facility {
            id: resource.id.clone(),
            facility_type: a.facility_type,
            short_name: a.short_name,
            long_name: a.long_name,
            latitude: a.latitude,
            longitude: a.longitude,
            stop_id: resource.to_one("stop"),
        })
    }
}
