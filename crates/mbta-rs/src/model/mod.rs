//! Typed domain records decoded from upstream JSON:API resources.
//!
//! Each record is a value object owned by whoever received it: attributes are
//! copied into plain fields and relationships are reduced to IDs. Decoding is
//! explicit per type through [`Record::decode`]; a resource whose attributes
//! don't match the declared shape is a [`ApiError::Decode`], never a
//! partially-filled record. Optional relationships that upstream omits decode
//! as `None` / empty.
//!
//! - [`network`]: stops, routes, lines, shapes, facilities.
//! - [`schedule`]: trips, schedules, services, route patterns.
//! - [`realtime`]: predictions, vehicles, alerts, live facility status.

pub mod network;
pub mod realtime;
pub mod schedule;

pub use network::{Facility, Line, NearbyStop, Route, Shape, Stop};
pub use realtime::{
    ActivePeriod, Alert, FacilityProperty, InformedEntity, LiveFacility, Prediction, Vehicle,
};
pub use schedule::{RoutePattern, Schedule, Service, Trip};

use crate::api::jsonapi::Resource;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream resource types served by the client.
///
/// Also the unit of cache policy: every kind carries its own TTL and
/// capacity (see [`CachePolicies`](crate::config::CachePolicies)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Alert,
    Facility,
    Line,
    LiveFacility,
    Prediction,
    Route,
    RoutePattern,
    Schedule,
    Service,
    Shape,
    Stop,
    Trip,
    Vehicle,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Alert,
        ResourceKind::Facility,
        ResourceKind::Line,
        ResourceKind::LiveFacility,
        ResourceKind::Prediction,
        ResourceKind::Route,
        ResourceKind::RoutePattern,
        ResourceKind::Schedule,
        ResourceKind::Service,
        ResourceKind::Shape,
        ResourceKind::Stop,
        ResourceKind::Trip,
        ResourceKind::Vehicle,
    ];

    /// JSON:API `type` member for resources of this kind.
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Alert => "alert",
            ResourceKind::Facility => "facility",
            ResourceKind::Line => "line",
            ResourceKind::LiveFacility => "live_facility",
            ResourceKind::Prediction => "prediction",
            ResourceKind::Route => "route",
            ResourceKind::RoutePattern => "route_pattern",
            ResourceKind::Schedule => "schedule",
            ResourceKind::Service => "service",
            ResourceKind::Shape => "shape",
            ResourceKind::Stop => "stop",
            ResourceKind::Trip => "trip",
            ResourceKind::Vehicle => "vehicle",
        }
    }

    /// Collection path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Alert => "/alerts",
            ResourceKind::Facility => "/facilities",
            ResourceKind::Line => "/lines",
            ResourceKind::LiveFacility => "/live_facilities",
            ResourceKind::Prediction => "/predictions",
            ResourceKind::Route => "/routes",
            ResourceKind::RoutePattern => "/route_patterns",
            ResourceKind::Schedule => "/schedules",
            ResourceKind::Service => "/services",
            ResourceKind::Shape => "/shapes",
            ResourceKind::Stop => "/stops",
            ResourceKind::Trip => "/trips",
            ResourceKind::Vehicle => "/vehicles",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A domain record with an explicit decode function.
pub trait Record: Sized + Clone + Send + Sync + 'static {
    /// Upstream resource type this record is decoded from.
    const KIND: ResourceKind;

    /// Attribute and relationship names this record reads, sent as the
    /// sparse fieldset.
    const FIELDS: &'static [&'static str];

    /// Decode one resource object, failing closed on shape mismatches.
    fn decode(resource: &Resource) -> Result<Self, ApiError>;
}

/// Decode every resource in `resources` as `T`.
pub fn decode_all<'a, T: Record>(
    resources: impl IntoIterator<Item = &'a Resource>,
) -> Result<Vec<T>, ApiError> {
    resources.into_iter().map(T::decode).collect()
}
