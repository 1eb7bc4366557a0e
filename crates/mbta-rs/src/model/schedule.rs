//! Planned-service records: trips, scheduled stop times, service calendars,
//! route patterns.

use super::{Record, ResourceKind};
use crate::api::jsonapi::Resource;
use crate::error::ApiError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ── Trip ───────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: String,
    pub headsign: Option<String>,
    pub name: Option<String>,
    pub direction_id: Option<u8>,
    pub block_id: Option<String>,
    /// 0 = no information, 1 = accessible, 2 = inaccessible.
    pub wheelchair_accessible: Option<u8>,
    pub bikes_allowed: Option<u8>,
    pub route_id: Option<String>,
    pub service_id: Option<String>,
    pub shape_id: Option<String>,
    pub route_pattern_id: Option<String>,
}

#[derive(Deserialize)]
struct TripAttributes {
    #[serde(default)]
    headsign: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    block_id: Option<String>,
    #[serde(default)]
    wheelchair_accessible: Option<u8>,
    #[serde(default)]
    bikes_allowed: Option<u8>,
}

impl Record for Trip {
    const KIND: ResourceKind = ResourceKind::Trip;
    const FIELDS: &'static [&'static str] = &[
        "headsign",
        "name",
        "direction_id",
        "block_id",
        "wheelchair_accessible",
        "bikes_allowed",
        "route",
        "service",
        "shape",
        "route_pattern",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: TripAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Trip {
            id: resource.id.clone(),
            headsign: a.headsign,
            name: a.name,
            direction_id: a.direction_id,
            block_id: a.block_id,
            wheelchair_accessible: a.wheelchair_accessible,
            bikes_allowed: a.bikes_allowed,
            route_id: resource.to_one("route"),
            service_id: resource.to_one("service"),
            shape_id: resource.to_one("shape"),
            route_pattern_id: resource.to_one("route_pattern"),
        })
    }
}

// ── Schedule ───────────────────────────────────────────────────────

/// A planned arrival/departure of a trip at a stop.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Schedule {
    pub id: String,
    pub arrival_time: Option<DateTime<FixedOffset>>,
    pub departure_time: Option<DateTime<FixedOffset>>,
    pub stop_sequence: Option<u32>,
    pub direction_id: Option<u8>,
    pub stop_headsign: Option<String>,
    pub pickup_type: Option<u8>,
    pub drop_off_type: Option<u8>,
    pub timepoint: Option<bool>,
    pub route_id: String,
    pub trip_id: Option<String>,
    pub stop_id: Option<String>,
}

#[derive(Deserialize)]
struct ScheduleAttributes {
    #[serde(default)]
    arrival_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    departure_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    stop_sequence: Option<u32>,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    stop_headsign: Option<String>,
    #[serde(default)]
    pickup_type: Option<u8>,
    #[serde(default)]
    drop_off_type: Option<u8>,
    #[serde(default)]
    timepoint: Option<bool>,
}

impl Record for Schedule {
    const KIND: ResourceKind = ResourceKind::Schedule;
    const FIELDS: &'static [&'static str] = &[
        "arrival_time",
        "departure_time",
        "stop_sequence",
        "direction_id",
        "stop_headsign",
        "pickup_type",
        "drop_off_type",
        "timepoint",
        "route",
        "trip",
        "stop",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: ScheduleAttributes = resource.attributes_as(Self::KIND.type_name())?;
        let route_id = resource.to_one("route").ok_or_else(|| {
            ApiError::Decode(format!("schedule {} has no route relationship", resource.id))
        })?;
        Ok(Schedule {
            id: resource.id.clone(),
            arrival_time: a.arrival_time,
            departure_time: a.departure_time,
            stop_sequence: a.stop_sequence,
            direction_id: a.direction_id,
            stop_headsign: a.stop_headsign,
            pickup_type: a.pickup_type,
            drop_off_type: a.drop_off_type,
            timepoint: a.timepoint,
            route_id,
            trip_id: resource.to_one("trip"),
            stop_id: resource.to_one("stop"),
        })
    }
}

// ── Service ────────────────────────────────────────────────────────

/// A service calendar: the set of dates a group of trips operates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub description: Option<String>,
    pub schedule_name: Option<String>,
    pub schedule_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// ISO weekday numbers, 1 = Monday.
    pub valid_days: Vec<u8>,
    pub added_dates: Vec<NaiveDate>,
    pub removed_dates: Vec<NaiveDate>,
}

#[derive(Deserialize)]
struct ServiceAttributes {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    schedule_name: Option<String>,
    #[serde(default)]
    schedule_type: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    valid_days: Vec<u8>,
    #[serde(default)]
    added_dates: Vec<NaiveDate>,
    #[serde(default)]
    removed_dates: Vec<NaiveDate>,
}

impl Service {
    /// Whether the calendar runs on `date`.
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        if self.removed_dates.contains(&date) {
            return false;
        }
        if self.added_dates.contains(&date) {
            return true;
        }
        let in_range = self.start_date.is_none_or(|s| date >= s)
            && self.end_date.is_none_or(|e| date <= e);
        let weekday = date.weekday().number_from_monday() as u8;
        in_range && self.valid_days.contains(&weekday)
    }
}

impl Record for Service {
    const KIND: ResourceKind = ResourceKind::Service;
    const FIELDS: &'static [&'static str] = &[
        "description",
        "schedule_name",
        "schedule_type",
        "start_date",
        "end_date",
        "valid_days",
        "added_dates",
        "removed_dates",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: ServiceAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(Service {
            id: resource.id.clone(),
            description: a.description,
            schedule_name: a.schedule_name,
            schedule_type: a.schedule_type,
            start_date: a.start_date,
            end_date: a.end_date,
            valid_days: a.valid_days,
            added_dates: a.added_dates,
            removed_dates: a.removed_dates,
        })
    }
}

// ── RoutePattern ───────────────────────────────────────────────────

/// One stopping pattern of a route in one direction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutePattern {
    pub id: String,
    pub name: Option<String>,
    pub direction_id: Option<u8>,
    /// 1 = typical, 2 = deviation, 3 = atypical, 4 = diversion.
    pub typicality: Option<u8>,
    pub time_desc: Option<String>,
    pub sort_order: Option<i64>,
    pub canonical: Option<bool>,
    pub route_id: Option<String>,
    pub representative_trip_id: Option<String>,
}

#[derive(Deserialize)]
struct RoutePatternAttributes {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    typicality: Option<u8>,
    #[serde(default)]
    time_desc: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
    #[serde(default)]
    canonical: Option<bool>,
}

impl Record for RoutePattern {
    const KIND: ResourceKind = ResourceKind::RoutePattern;
    const FIELDS: &'static [&'static str] = &[
        "name",
        "direction_id",
        "typicality",
        "time_desc",
        "sort_order",
        "canonical",
        "route",
        "representative_trip",
    ];

    fn decode(resource: &Resource) -> Result<Self, ApiError> {
        let a: RoutePatternAttributes = resource.attributes_as(Self::KIND.type_name())?;
        Ok(RoutePattern {
            id: resource.id.clone(),
            name: a.name,
            direction_id: a.direction_id,
            typicality: a.typicality,
            time_desc: a.time_desc,
            sort_order: a.sort_order,
            canonical: a.canonical,
            route_id: resource.to_one("route"),
            representative_trip_id: resource.to_one("representative_trip"),
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
    fn decode_trip_relationships() {
        let trip = Trip::decode(&resource(
            r#"{"type": "trip", "id": "T1", "attributes": {"headsign": "Alewife", "direction_id": 1},
                "relationships": {
                    "route": {"data": {"type": "route", "id": "Red"}},
                    "shape": {"data": null}
                }}"#,
        ))
        .unwrap();
        assert_eq!(trip.headsign.as_deref(), Some("Alewife"));
        assert_eq!(trip.route_id.as_deref(), Some("Red"));
        assert_eq!(trip.shape_id, None);
        assert_eq!(trip.service_id, None);
    }

    #[test]
    fn schedule_requires_route() {
        let err = Schedule::decode(&resource(
            r#"{"type": "schedule", "id": "s1", "attributes": {"arrival_time": null}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn schedule_times_parse_with_offset() {
        let schedule = Schedule::decode(&resource(
            r#"{"type": "schedule", "id": "s1", "attributes": {
                "arrival_time": "2026-03-02T08:15:00-05:00", "departure_time": null, "stop_sequence": 4
            }, "relationships": {"route": {"data": {"type": "route", "id": "Orange"}}}}"#,
        ))
        .unwrap();
        let arrival = schedule.arrival_time.unwrap();
        assert_eq!(arrival.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(schedule.departure_time, None);
        assert_eq!(schedule.route_id, "Orange");
    }

    #[test]
    fn service_calendar_rules() {
        let service = Service::decode(&resource(
            r#"{"type": "service", "id": "WKDY", "attributes": {
                "start_date": "2026-03-01", "end_date": "2026-03-31",
                "valid_days": [1, 2, 3, 4, 5],
                "added_dates": ["2026-03-07"], "removed_dates": ["2026-03-03"]
            }}"#,
        ))
        .unwrap();
        let date = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        assert!(service.runs_on(date(2)));
        assert!(!service.runs_on(date(3)));
        assert!(service.runs_on(date(7)));
        assert!(!service.runs_on(date(8)));
        assert!(!service.runs_on(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
    }

    #[test]
    fn decode_route_pattern() {
        let pattern = RoutePattern::decode(&resource(
            r#"{"type": "route_pattern", "id": "Red-1-0", "attributes": {"name": "Ashmont", "typicality": 1},
                "relationships": {"representative_trip": {"data": {"type": "trip", "id": "T9"}}}}"#,
        ))
        .unwrap();
        assert_eq!(pattern.representative_trip_id.as_deref(), Some("T9"));
        assert_eq!(pattern.typicality, Some(1));
    }
}
