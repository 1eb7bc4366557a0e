//! Convenience re-exports for common `mbta-rs` types.
//!
//! ```ignore
//! use mbta_rs::prelude::*;
//! ```
//!
//! Pulls in the client, its configuration and error type, the argument
//! structs, the decoded records and the tool registry. Pipeline internals
//! (cache, coalescer, transport) are left out; import those from [`api`]
//! directly when needed.
//!
//! [`api`]: crate::api

// ── Client ──────────────────────────────────────────────────────────
pub use crate::client::{
    AlertFilter, FacilityFilter, LineFilter, ListArgs, LiveFacilityFilter, MbtaClient,
    NearbyStopsArgs, Page, Paging, PredictionFilter, RouteFilter, RoutePatternFilter,
    RouteWithStops, RouteWithStopsArgs, ScheduleFilter, SearchArgs, ServiceFilter, ShapeArgs,
    StopFilter, StopPredictionsArgs, TransferStationsArgs, TripDetails, TripDetailsArgs,
    TripFilter, VehicleFilter,
};
pub use crate::config::{CachePolicies, CachePolicy, ClientConfig};
pub use crate::error::ApiError;
pub use crate::json_schema_for;

// ── Records ─────────────────────────────────────────────────────────
pub use crate::model::{
    Alert, Facility, Line, LiveFacility, NearbyStop, Prediction, Route, RoutePattern, Schedule,
    Service, Shape, Stop, Trip, Vehicle,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{ToolError, ToolRegistry, ToolResponse, ToolSpec, transit_tools};
