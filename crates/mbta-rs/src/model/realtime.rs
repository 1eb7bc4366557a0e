//! Live records: predictions, vehicle positions, service alerts, facility
//! status.

use super::{Record, ResourceKind};
use crate::api::jsonapi::Resource;
use crate::error::ApiError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ── Prediction ─────────────────────────────────────────────────────

/// A real-time arrival/departure estimate for a trip at a stop.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub arrival_time: Option<DateTime<FixedOffset>>,
    pub departure_time: Option<DateTime<FixedOffset>>,
    pub direction_id: Option<u8>,
    pub stop_sequence: Option<u32>,
    pub status: Option<String>,
    pub schedule_relationship: Option<String>,
    pub route_id: String,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
    pub vehicle_id: Option<String>,
}

#[derive(Deserialize)]
struct PredictionAttributes {
    #[serde(default)]
    arrival_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    departure_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    stop_sequence: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    schedule_relationship: Option<String>,
}

impl Prediction {
    /// Arrival if known, otherwise departure.
    pub fn best_time(&self) -> Option<DateTime<FixedOffset>> {
        self.arrival_time.or(self.departure_time)
    }
}

impl Record for Prediction {
    const KIND: ResourceKind = ResourceKind::Prediction;
    const FIELDS: &'static [&'static str] = &[
        "arrival_time",
        "departure_time",
        "direction_id",
        "stop_sequence",
        "status",
        "schedule_relationship",
        "route",
        "trip",
        "stop",
        "vehicle",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: PredictionAttributes = resource.attributes_as(Self::KIND.type_name())?;
        let route_id = resource.to_one("route").ok_or_else(|| {
            ApiError::Decode(format!(
                "prediction {} has no route relationship",
                resource.id
            ))
        })?;
        Ok(Prediction {
            id: resource.id.clone(),
            arrival_time: a.arrival_time,
            departure_time: a.departure_time,
            direction_id: a.direction_id,
            stop_sequence: a.stop_sequence,
            status: a.status,
            schedule_relationship: a.schedule_relationship,
            route_id,
            trip_id: resource.to_one("trip"),
            stop_id: resource.to_one("stop"),
            vehicle_id: resource.to_one("vehicle"),
        })
    }
}

// ── Vehicle ────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub label: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    /// `INCOMING_AT`, `STOPPED_AT` or `IN_TRANSIT_TO`.
    pub current_status: Option<String>,
    pub current_stop_sequence: Option<u32>,
    pub direction_id: Option<u8>,
    pub occupancy_status: Option<String>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub route_id: Option<String>,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
}

#[derive(Deserialize)]
struct VehicleAttributes {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    bearing: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    current_status: Option<String>,
    #[serde(default)]
    current_stop_sequence: Option<u32>,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    occupancy_status: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<FixedOffset>>,
}

impl Record for Vehicle {
    const KIND: ResourceKind = ResourceKind::Vehicle;
    const FIELDS: &'static [&'static str] = &[
        "label",
        "latitude",
        "longitude",
        "bearing",
        "speed",
        "current_status",
        "current_stop_sequence",
        "direction_id",
        "occupancy_status",
        "updated_at",
        "route",
        "trip",
        "stop",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: VehicleAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Vehicle {
            id: resource.id.clone(),
            label: a.label,
            latitude: a.latitude,
            longitude: a.longitude,
            bearing: a.bearing,
            speed: a.speed,
            current_status: a.current_status,
            current_stop_sequence: a.current_stop_sequence,
            direction_id: a.direction_id,
            occupancy_status: a.occupancy_status,
            updated_at: a.updated_at,
            route_id: resource.to_one("route"),
            trip_id: resource.to_one("trip"),
            stop_id: resource.to_one("stop"),
        })
    }
}

// ── Alert ──────────────────────────────────────────────────────────

/// A service alert (delay, detour, closure, elevator outage, ...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: String,
    pub header: String,
    pub short_header: Option<String>,
    pub description: Option<String>,
    pub effect: Option<String>,
    pub cause: Option<String>,
    /// 0 (informational) to 10 (most severe).
    pub severity: Option<u8>,
    pub lifecycle: Option<String>,
    pub url: Option<String>,
    pub active_period: Vec<ActivePeriod>,
    pub informed_entity: Vec<InformedEntity>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivePeriod {
    pub start: Option<DateTime<FixedOffset>>,
    /// `None` means open-ended.
    #[serde(default)]
    pub end: Option<DateTime<FixedOffset>>,
}

/// A route, stop, trip or facility an alert applies to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InformedEntity {
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub route_type: Option<u8>,
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub trip: Option<String>,
    #[serde(default)]
    pub direction_id: Option<u8>,
    #[serde(default)]
    pub facility: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
}

#[derive(Deserialize)]
struct AlertAttributes {
    header: String,
    #[serde(default)]
    short_header: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    effect: Option<String>,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    severity: Option<u8>,
    #[serde(default)]
    lifecycle: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    active_period: Vec<ActivePeriod>,
    #[serde(default)]
    informed_entity: Vec<InformedEntity>,
    #[serde(default)]
    updated_at: Option<DateTime<FixedOffset>>,
}

impl Alert {
    /// Whether any active period covers `at`.
    pub fn is_active_at(&self, at: DateTime<FixedOffset>) -> bool {
        self.active_period.iter().any(|p| {
            p.start.is_none_or(|s| s <= at) && p.end.is_none_or(|e| at < e)
        })
    }

    /// Route IDs named by the informed entities, de-duplicated.
    pub fn affected_routes(&self) -> Vec<&str> {
        let mut routes: Vec<&str> = self
            .informed_entity
            .iter()
            .filter_map(|e| e.route.as_deref())
            .collect();
        routes.sort_unstable();
        routes.dedup();
        routes
    }
}

impl Record for Alert {
    const KIND: ResourceKind = ResourceKind::Alert;
    const FIELDS: &'static [&'static str] = &[
        "header",
        "short_header",
        "description",
        "effect",
        "cause",
        "severity",
        "lifecycle",
        "url",
        "active_period",
        "informed_entity",
        "updated_at",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: AlertAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Alert {
            id: resource.id.clone(),
            header: a.header,
            short_header: a.short_header,
            description: a.description,
            effect: a.effect,
            cause: a.cause,
            severity: a.severity,
            lifecycle: a.lifecycle,
            url: a.url,
            active_period: a.active_period,
            informed_entity: a.informed_entity,
            updated_at: a.updated_at,
        })
    }
}

// ── Live facility ──────────────────────────────────────────────────

/// Current status of a facility (e.g. free bike-storage spaces, parking
/// occupancy). Keyed by the facility's ID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LiveFacility {
    pub id: String,
    pub properties: Vec<FacilityProperty>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

/// One named reading; upstream values are numbers or strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FacilityProperty {
    pub name: String,
    pub value: serde_json::Value,
}

#[derive(Deserialize)]
struct LiveFacilityAttributes {
    #[serde(default)]
    properties: Vec<FacilityProperty>,
    #[serde(default)]
    updated_at: Option<DateTime<FixedOffset>>,
}

impl LiveFacility {
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

impl Record for LiveFacility {
    const KIND: ResourceKind = ResourceKind::LiveFacility;
    const FIELDS: &'static [&'static str] = &["properties", "updated_at"];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: LiveFacilityAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(LiveFacility {
            id: resource.id.clone(),
            properties: a.properties,
            updated_at: a.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::jsonapi::parse_document;

    fn resource(json: &str) -> Resource {
        let doc = parse_document(&format!(r#"{{"data": {json}}}"#)).unwrap();
        doc.primary()[0].clone()
    }

    #[test]
    fn prediction_carries_route_and_time() {
        let prediction = Prediction::decode(&resource(
            r#"{"type": "prediction", "id": "prediction-1", "attributes": {
                "arrival_time": null, "departure_time": "2026-03-02T08:15:00-05:00", "direction_id": 0
            }, "relationships": {
                "route": {"data": {"type": "route", "id": "Green-B"}},
                "stop": {"data": {"type": "stop", "id": "70196"}},
                "vehicle": {"data": null}
            }}"#,
        ))
        .unwrap();
        assert_eq!(prediction.route_id, "Green-B");
        assert_eq!(prediction.vehicle_id, None);
        assert_eq!(prediction.best_time(), prediction.departure_time);
        assert!(prediction.best_time().is_some());
    }

    #[test]
    fn prediction_without_route_fails_closed() {
        let err = Prediction::decode(&resource(
            r#"{"type": "prediction", "id": "p", "attributes": {}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn prediction_bad_timestamp_fails_closed() {
        let err = Prediction::decode(&resource(
            r#"{"type": "prediction", "id": "p", "attributes": {"arrival_time": "soon"},
                "relationships": {"route": {"data": {"type": "route", "id": "Red"}}}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn decode_vehicle_position() {
        let vehicle = Vehicle::decode(&resource(
            r#"{"type": "vehicle", "id": "y1234", "attributes": {
                "label": "1234", "latitude": 42.35, "longitude": -71.06, "bearing": 90,
                "current_status": "IN_TRANSIT_TO"
            }, "relationships": {"route": {"data": {"type": "route", "id": "1"}}}}"#,
        ))
        .unwrap();
        assert_eq!(vehicle.bearing, Some(90.0));
        assert_eq!(vehicle.route_id.as_deref(), Some("1"));
        assert_eq!(vehicle.trip_id, None);
    }

    #[test]
    fn alert_activity_window() {
        let alert = Alert::decode(&resource(
            r#"{"type": "alert", "id": "a1", "attributes": {
                "header": "Shuttle buses replace Red Line service",
                "effect": "SHUTTLE", "severity": 7,
                "active_period": [{"start": "2026-03-02T05:00:00-05:00", "end": null}],
                "informed_entity": [{"route": "Red", "stop": "place-jfk"}, {"route": "Red"}]
            }}"#,
        ))
        .unwrap();
        let before = DateTime::parse_from_rfc3339("2026-03-01T12:00:00-05:00").unwrap();
        let during = DateTime::parse_from_rfc3339("2026-04-01T12:00:00-04:00").unwrap();
        assert!(!alert.is_active_at(before));
        assert!(alert.is_active_at(during));
        assert_eq!(alert.affected_routes(), vec!["Red"]);
    }

    #[test]
    fn live_facility_properties() {
        let status = LiveFacility::decode(&resource(
            r#"{"type": "live_facility", "id": "park-alfcl-garage", "attributes": {
                "properties": [{"name": "capacity", "value": 2733},
                               {"name": "utilization", "value": 1200}],
                "updated_at": "2026-03-02T08:00:00-05:00"
            }}"#,
        ))
        .unwrap();
        assert_eq!(status.property("capacity"), Some(&serde_json::json!(2733)));
        assert_eq!(status.property("missing"), None);
        assert!(status.updated_at.is_some());
    }

    #[test]
    fn live_facility_property_without_name_fails_closed() {
        let err = LiveFacility::decode(&resource(
            r#"{"type": "live_facility", "id": "x", "attributes": {"properties": [{"value": 1}]}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
