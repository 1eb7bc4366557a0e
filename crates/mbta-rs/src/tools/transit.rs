//! The `mbta_*` tool catalogue.
//!
//! Each tool binds one [`MbtaClient`] method to a [`ToolSpec`] whose
//! parameter schema is derived from the method's argument struct.

use super::core::{ToolDescriptor, ToolRegistry};
use super::spec::{ToolSpec, ToolSpecBuilder};
use crate::client::{
    AlertFilter, FacilityFilter, LineFilter, ListArgs, LiveFacilityFilter, MbtaClient,
    NearbyStopsArgs, PredictionFilter, RouteFilter, RoutePatternFilter, RouteWithStopsArgs,
    ScheduleFilter, SearchArgs, ServiceFilter, ShapeArgs, StopFilter, StopPredictionsArgs,
    TransferStationsArgs, TripDetailsArgs, TripFilter, VehicleFilter,
};
use crate::error::ApiError;
use crate::model::Shape;
use crate::stations;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

const PAGED_OUTPUT: &str = "JSON object with `records` and `next_offset` (pass back as page_offset)";
const LIST_OUTPUT: &str = "JSON array ordered by relevance";

/// Build the registry of every transit tool, sharing `client`.
pub fn transit_tools(client: Arc<MbtaClient>) -> ToolRegistry {
    let c = &client;
    ToolRegistry::new()
        // ── Routes ──
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_routes", "List routes, optionally filtered by ID, type or stop")
                .when_to_use("You need route metadata: names, colors, direction names")
                .when_not_to_use("You have a free-text route name; use mbta_list_all_routes with a query")
                .example(r#"{"route_type": 1}"#, "every subway route")
                .output_format(PAGED_OUTPUT),
            |c, a: RouteFilter| async move { c.routes(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_route_with_stops", "Get one route together with the stops it serves")
                .when_to_use("You need the ordered stop list of a known route")
                .when_not_to_use("You only need route metadata; use mbta_get_routes")
                .example(r#"{"route_id": "Red", "direction_id": 0}"#, "Red Line stops towards Ashmont/Braintree")
                .output_format("JSON object with `route` and `stops`"),
            |c, a: RouteWithStopsArgs| async move { c.route_with_stops(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_routes", "List every route, ranked by a fuzzy name match")
                .when_to_use("The user names a route loosely (\"orange line\", \"the 1 bus\")")
                .when_not_to_use("You already know the route ID; use mbta_get_routes")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_routes(&a).await },
        ))
        // ── Stops ──
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_stops", "List stops filtered by ID, route, route type or location type")
                .when_to_use("You know a route or stop ID")
                .when_not_to_use("You only have a place name; use mbta_search_stops")
                .example(r#"{"route_id": "Orange"}"#, "stops served by the Orange Line")
                .output_format(PAGED_OUTPUT),
            |c, a: StopFilter| async move { c.stops(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_nearby_stops", "Find stops within a radius of a coordinate, nearest first")
                .when_to_use("You have a latitude/longitude (e.g. the user's location)")
                .when_not_to_use("You have a station name; use mbta_search_stops")
                .example(r#"{"latitude": 42.3564, "longitude": -71.0624, "radius_m": 500}"#, "stops near Boston Common")
                .output_format("JSON array of stops, each with `distance_m`"),
            |c, a: NearbyStopsArgs| async move { c.nearby_stops(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_search_stops", "Search stations by name, optionally near a coordinate")
                .when_to_use("The user names a station (\"park st\", \"harvard\")")
                .when_not_to_use("You already have the stop ID; use mbta_get_stops")
                .example(r#"{"query": "park st"}"#, "Park Street first")
                .example(
                    r#"{"query": "harvard", "latitude": 42.3503, "longitude": -71.1313, "radius_m": 500}"#,
                    "only the Harvard Avenue stop",
                )
                .output_format(LIST_OUTPUT),
            |c, a: SearchArgs| async move { c.search_stops(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_stops", "List every stop, platform and entrance, ranked by a fuzzy name match")
                .when_to_use("You need stops that are not stations, such as bus stops or platforms")
                .when_not_to_use("You want stations only; use mbta_search_stops")
                .example(r#"{"query": "mass ave", "max_results": 20}"#, "stops named after Massachusetts Avenue")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_stops(&a).await },
        ))
        // ── Predictions and schedules ──
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_predictions", "Get real-time arrival and departure predictions")
                .when_to_use("You need live times for a stop, route or trip")
                .when_not_to_use("You need timetable times; use mbta_get_schedules")
                .example(r#"{"route_id": "Red", "direction_id": 1}"#, "next northbound Red Line trains")
                .output_format(PAGED_OUTPUT),
            |c, a: PredictionFilter| async move { c.predictions(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_predictions_for_stop", "Get real-time predictions at one stop")
                .when_to_use("The user asks when the next train or bus reaches a stop")
                .when_not_to_use("You do not know the stop ID yet; find it with mbta_search_stops first")
                .example(r#"{"stop_id": "place-pktrm"}"#, "upcoming departures at Park Street")
                .output_format(PAGED_OUTPUT),
            |c, a: StopPredictionsArgs| async move { c.predictions_for_stop(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_schedules", "Get scheduled stop times")
                .when_to_use("You need timetable times, possibly for a future date or time window")
                .when_not_to_use("You need live estimates; use mbta_get_predictions")
                .example(r#"{"stop_id": "place-sstat", "min_time": "17:00", "max_time": "18:00"}"#, "evening departures")
                .output_format(PAGED_OUTPUT),
            |c, a: ScheduleFilter| async move { c.schedules(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_trips", "List trips by ID, route or route pattern")
                .when_to_use("You need trip headsigns, directions or blocks")
                .when_not_to_use("You need one trip with its live data; use mbta_get_trip_details")
                .output_format(PAGED_OUTPUT),
            |c, a: TripFilter| async move { c.trips(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_trip_details", "Get one trip with its predictions, schedule and vehicle")
                .when_to_use("You have a trip ID and want its full picture")
                .when_not_to_use("You want many trips; use mbta_get_trips")
                .example(r#"{"trip_id": "12345", "include_vehicle": true}"#, "trip plus vehicle position")
                .output_format("JSON object with `trip`, `predictions`, `schedules`, `vehicle`"),
            |c, a: TripDetailsArgs| async move { c.trip_details(&a).await },
        ))
        // ── Live data ──
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_vehicles", "Get live vehicle positions")
                .when_to_use("You need where a vehicle is right now")
                .when_not_to_use("You need arrival times; use mbta_get_predictions")
                .output_format(PAGED_OUTPUT),
            |c, a: VehicleFilter| async move { c.vehicles(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_alerts", "Get service alerts filtered by route, stop, trip or severity")
                .when_to_use("You need delays, detours or closures affecting a known route or stop")
                .when_not_to_use("You want to search alert text; use mbta_list_all_alerts")
                .example(r#"{"route_id": "Red", "active_only": true}"#, "current Red Line alerts")
                .output_format(PAGED_OUTPUT),
            |c, a: AlertFilter| async move { c.alerts(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_alerts", "List every alert, ranked by a fuzzy text match")
                .when_to_use("The user describes a disruption in words (\"shuttle buses\", \"elevator\")")
                .when_not_to_use("You know the route or stop; use mbta_get_alerts")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_alerts(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_live_facilities", "Get the live status of facilities such as parking and bike storage")
                .when_to_use("You need current occupancy or availability at a facility")
                .when_not_to_use("You need facility locations or types; use mbta_get_facilities")
                .example(r#"{"facility_id": "park-alfcl-garage"}"#, "Alewife garage occupancy")
                .output_format(PAGED_OUTPUT),
            |c, a: LiveFacilityFilter| async move { c.live_facilities(&a).await },
        ))
        // ── Static network ──
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_shapes", "Get the drawn paths of a route")
                .when_to_use("You need route geometry for mapping")
                .when_not_to_use("You need stop locations; use mbta_get_stops")
                .output_format("JSON array of shapes; `points` holds [lat, lon] pairs when decode_points is set"),
            |c, a: ShapeArgs| async move {
                let shapes = c.shapes(&a).await?;
                Ok::<_, ApiError>(
                    shapes
                        .into_iter()
                        .map(|shape| ShapeOutput::new(shape, a.decode_points))
                        .collect::<Vec<_>>(),
                )
            },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_lines", "List lines (groups of routes such as the Green Line)")
                .when_to_use("You need the line a set of routes belongs to")
                .when_not_to_use("You need individual routes; use mbta_get_routes")
                .output_format(PAGED_OUTPUT),
            |c, a: LineFilter| async move { c.lines(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_lines", "List every line, ranked by a fuzzy name match")
                .when_to_use("The user names a line loosely (\"green line\", \"mattapan\")")
                .when_not_to_use("You already know the line ID; use mbta_get_lines")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_lines(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_services", "List service calendars")
                .when_to_use("You need which days a service runs")
                .when_not_to_use("You need actual times; use mbta_get_schedules")
                .output_format(PAGED_OUTPUT),
            |c, a: ServiceFilter| async move { c.services(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_services", "List every service calendar, ranked by a fuzzy text match")
                .when_to_use("You need a calendar by description (\"weekday\", \"holiday\")")
                .when_not_to_use("You already know the service ID; use mbta_get_services")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_services(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_facilities", "List station facilities such as elevators and escalators")
                .when_to_use("You need accessibility or amenity information for a stop")
                .when_not_to_use("You need outage notices; use mbta_get_alerts")
                .example(r#"{"stop_id": "place-pktrm", "facility_type": "ELEVATOR"}"#, "Park Street elevators")
                .output_format(PAGED_OUTPUT),
            |c, a: FacilityFilter| async move { c.facilities(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_list_all_facilities", "List every facility, ranked by a fuzzy name match")
                .when_to_use("The user names a facility loosely (\"alewife garage\")")
                .when_not_to_use("You know the stop; use mbta_get_facilities")
                .output_format(LIST_OUTPUT),
            |c, a: ListArgs| async move { c.all_facilities(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_route_patterns", "List the stop-sequence variants of a route")
                .when_to_use("You need which branches or variants a route runs")
                .when_not_to_use("You need individual trips; use mbta_get_trips")
                .output_format(PAGED_OUTPUT),
            |c, a: RoutePatternFilter| async move { c.route_patterns(&a).await },
        ))
        .with(tool(
            c,
            ToolSpec::builder("mbta_get_transfer_stations", "List major rapid-transit transfer stations")
                .when_to_use("You are planning a change between lines")
                .when_not_to_use("You need arbitrary stops; use mbta_search_stops")
                .example(r#"{"line": "Orange"}"#, "Orange Line transfer points")
                .output_format("JSON array with lines served and walking minutes"),
            |_, a: TransferStationsArgs| async move {
                Ok::<_, ApiError>(stations::transfer_stations(a.line.as_deref()))
            },
        ))
}

/// Bind one client call to a tool whose argument schema comes from `A`.
fn tool<A, R, F, Fut>(client: &Arc<MbtaClient>, spec: ToolSpecBuilder, call: F) -> ToolDescriptor
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(Arc<MbtaClient>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
{
    let client = Arc::clone(client);
    let def = spec.parameters_for::<A>().to_tool_def();
    ToolDescriptor::new(def, move |args: A| call(Arc::clone(&client), args))
}

#[derive(Serialize)]
struct ShapeOutput {
    #[serde(flatten)]
    shape: Shape,
    #[serde(skip_serializing_if = "Option::is_none")]
    points: Option<Vec<(f64, f64)>>,
}

impl ShapeOutput {
    fn new(shape: Shape, decode_points: bool) -> Self {
        let points = if decode_points { shape.points() } else { None };
        Self { shape, points }
    }
}
