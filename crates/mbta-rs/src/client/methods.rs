//! Typed resource methods on [`MbtaClient`].

use super::filters::{
    AlertFilter, FacilityFilter, LineFilter, ListArgs, LiveFacilityFilter, NearbyStopsArgs,
    PredictionFilter, RouteFilter, RoutePatternFilter, RouteWithStopsArgs, ScheduleFilter,
    SearchArgs, ServiceFilter, ShapeArgs, StopFilter, StopPredictionsArgs, TripDetailsArgs,
    TripFilter, VehicleFilter,
};
use super::page::{
    Page, RouteWithStops, TripDetails, decode_one, decode_page, decode_route_with_stops,
    decode_trip_details,
};
use super::query::{MAX_PAGE_LIMIT, Query, required_id};
use super::{FetchMode, MbtaClient, not_found_for};
use crate::error::ApiError;
use crate::fuzzy;
use crate::model::{
    Alert, Facility, Line, LiveFacility, NearbyStop, Prediction, Record, Route, RoutePattern,
    Schedule, Service, Shape, Stop, Trip, Vehicle,
};
use std::sync::Arc;
use tracing::debug;

/// Default result count for the list-everything methods.
pub const DEFAULT_MAX_RESULTS: u32 = 50;

const DEFAULT_NEARBY_LIMIT: u32 = 10;
const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// GTFS `location_type` of a parent station.
const LOCATION_STATION: u8 = 1;

impl MbtaClient {
    // ── Shared plumbing ────────────────────────────────────────────────

    async fn list<T: Record>(&self, query: Query) -> Result<Page<T>, ApiError> {
        self.fetch(self.sparse::<T>(query), FetchMode::OnePage, decode_page::<T>)
            .await
            .map(Arc::unwrap_or_clone)
    }

    /// Follow `links.next` until the collection is exhausted.
    async fn list_all<T: Record>(&self, query: Query) -> Result<Vec<T>, ApiError> {
        let query = self.sparse::<T>(query).page_limit(MAX_PAGE_LIMIT)?;
        let page = self
            .fetch(query, FetchMode::AllPages, decode_page::<T>)
            .await?;
        Ok(Arc::unwrap_or_clone(page).records)
    }

    async fn get_one<T: Record>(&self, id: &str, field: &str) -> Result<T, ApiError> {
        let query = self.sparse::<T>(Query::single(T::KIND, id, field)?);
        let id = id.trim().to_string();
        let resource = format!("{} '{id}'", T::KIND);
        self.fetch(query, FetchMode::OnePage, move |docs| decode_one::<T>(docs, &id))
            .await
            .map(Arc::unwrap_or_clone)
            .map_err(not_found_for(resource))
    }

    fn paged(&self, query: Query, paging: &super::Paging) -> Result<Query, ApiError> {
        paging.apply(query, self.config.default_page_limit)
    }

    // ── Routes ─────────────────────────────────────────────────────────

    pub async fn routes(&self, filter: &RouteFilter) -> Result<Page<Route>, ApiError> {
        let query = filter.apply(Query::collection(Route::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn route(&self, route_id: &str) -> Result<Route, ApiError> {
        self.get_one(route_id, "route_id").await
    }

    /// A route plus the stops it serves, optionally in one direction.
    pub async fn route_with_stops(&self, args: &RouteWithStopsArgs) -> Result<RouteWithStops, ApiError> {
        let direction = super::filters::direction(args.direction_id)?;
        let query = Query::single(Route::KIND, &args.route_id, "route_id")?
            .include(&["stops"])
            .filter("direction_id", direction);
        let query = self.sparse::<Stop>(self.sparse::<Route>(query));
        let id = args.route_id.trim().to_string();
        let resource = format!("route '{id}'");
        self.fetch(query, FetchMode::OnePage, move |docs| {
            decode_route_with_stops(docs, &id)
        })
        .await
        .map(Arc::unwrap_or_clone)
        .map_err(not_found_for(resource))
    }

    /// Every route, ranked against `args.query` when given.
    pub async fn all_routes(&self, args: &ListArgs) -> Result<Vec<Route>, ApiError> {
        let routes = self.list_all::<Route>(Query::collection(Route::KIND)).await?;
        Ok(rank_or_take(routes, args, |r| {
            vec![
                r.long_name.as_deref().unwrap_or_default(),
                r.short_name.as_deref().unwrap_or_default(),
                r.id.as_str(),
            ]
        }))
    }

    // ── Stops ──────────────────────────────────────────────────────────

    pub async fn stops(&self, filter: &StopFilter) -> Result<Page<Stop>, ApiError> {
        let query = filter.apply(Query::collection(Stop::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn stop(&self, stop_id: &str) -> Result<Stop, ApiError> {
        self.get_one(stop_id, "stop_id").await
    }

    /// Stops within `radius_m` of a point, nearest first.
    ///
    /// Upstream's location filter narrows the candidates across every page;
    /// distances are then recomputed with the haversine formula so the
    /// radius is exact.
    pub async fn nearby_stops(&self, args: &NearbyStopsArgs) -> Result<Vec<NearbyStop>, ApiError> {
        let area = args.area()?;
        let limit = args.limit.unwrap_or(DEFAULT_NEARBY_LIMIT).max(1) as usize;

        let candidates = self
            .list_all::<Stop>(area.apply(Query::collection(Stop::KIND)))
            .await?;
        let mut nearby: Vec<NearbyStop> = candidates
            .into_iter()
            .filter_map(|stop| {
                let distance_m = area.distance_to(stop.coordinates()?)?;
                Some(NearbyStop { stop, distance_m })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        nearby.truncate(limit);
        debug!(
            "{} stop(s) within {:.0}m of ({}, {})",
            nearby.len(),
            area.radius_m,
            area.latitude,
            area.longitude
        );
        Ok(nearby)
    }

    /// Fuzzy search over every station by name, description and ID,
    /// optionally limited to an area.
    pub async fn search_stops(&self, args: &SearchArgs) -> Result<Vec<Stop>, ApiError> {
        let needle = args.query.trim();
        if needle.is_empty() {
            return Err(ApiError::invalid("query", "must not be empty"));
        }
        let area = args.area()?;
        let limit = args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1) as usize;

        let mut query =
            Query::collection(Stop::KIND).filter("location_type", Some(LOCATION_STATION));
        if let Some(area) = &area {
            query = area.apply(query);
        }
        let mut stations = self.list_all::<Stop>(query).await?;
        if let Some(area) = &area {
            stations.retain(|s| s.coordinates().and_then(|p| area.distance_to(p)).is_some());
        }
        Ok(fuzzy::rank(stations, needle, limit, stop_fields))
    }

    /// Every stop, ranked against `args.query` when given.
    pub async fn all_stops(&self, args: &ListArgs) -> Result<Vec<Stop>, ApiError> {
        let stops = self.list_all::<Stop>(Query::collection(Stop::KIND)).await?;
        Ok(rank_or_take(stops, args, stop_fields))
    }

    // ── Predictions, schedules, trips ──────────────────────────────────

    pub async fn predictions(&self, filter: &PredictionFilter) -> Result<Page<Prediction>, ApiError> {
        let query = filter.apply(Query::collection(Prediction::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn predictions_for_stop(
        &self,
        args: &StopPredictionsArgs,
    ) -> Result<Page<Prediction>, ApiError> {
        self.predictions(&args.to_filter()?).await
    }

    pub async fn schedules(&self, filter: &ScheduleFilter) -> Result<Page<Schedule>, ApiError> {
        let query = filter.apply(Query::collection(Schedule::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn trips(&self, filter: &TripFilter) -> Result<Page<Trip>, ApiError> {
        let query = filter.apply(Query::collection(Trip::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn trip(&self, trip_id: &str) -> Result<Trip, ApiError> {
        self.get_one(trip_id, "trip_id").await
    }

    /// A trip plus whichever of its predictions, schedule and vehicle were
    /// requested, fetched as one compound document.
    pub async fn trip_details(&self, args: &TripDetailsArgs) -> Result<TripDetails, ApiError> {
        let includes = args.includes();
        let mut query = self.sparse::<Trip>(Query::single(Trip::KIND, &args.trip_id, "trip_id")?);
        if !includes.is_empty() {
            query = query.include(&includes);
        }
        if args.include_predictions {
            query = self.sparse::<Prediction>(query);
        }
        if args.include_schedule {
            query = self.sparse::<Schedule>(query);
        }
        if args.include_vehicle {
            query = self.sparse::<Vehicle>(query);
        }
        let id = args.trip_id.trim().to_string();
        let resource = format!("trip '{id}'");
        self.fetch(query, FetchMode::OnePage, move |docs| decode_trip_details(docs, &id))
            .await
            .map(Arc::unwrap_or_clone)
            .map_err(not_found_for(resource))
    }

    pub async fn route_patterns(
        &self,
        filter: &RoutePatternFilter,
    ) -> Result<Page<RoutePattern>, ApiError> {
        let query = filter.apply(Query::collection(RoutePattern::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn services(&self, filter: &ServiceFilter) -> Result<Page<Service>, ApiError> {
        let query = filter.apply(Query::collection(Service::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    /// Every service calendar, ranked against `args.query` when given.
    pub async fn all_services(&self, args: &ListArgs) -> Result<Vec<Service>, ApiError> {
        let services = self.list_all::<Service>(Query::collection(Service::KIND)).await?;
        Ok(rank_or_take(services, args, |s| {
            vec![
                s.description.as_deref().unwrap_or_default(),
                s.schedule_name.as_deref().unwrap_or_default(),
                s.id.as_str(),
            ]
        }))
    }

    // ── Live data ──────────────────────────────────────────────────────

    pub async fn vehicles(&self, filter: &VehicleFilter) -> Result<Page<Vehicle>, ApiError> {
        let query = filter.apply(Query::collection(Vehicle::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    pub async fn alerts(&self, filter: &AlertFilter) -> Result<Page<Alert>, ApiError> {
        let query = filter.apply(Query::collection(Alert::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    /// Every current alert, ranked against `args.query` when given.
    pub async fn all_alerts(&self, args: &ListArgs) -> Result<Vec<Alert>, ApiError> {
        let alerts = self.list_all::<Alert>(Query::collection(Alert::KIND)).await?;
        Ok(rank_or_take(alerts, args, |a| {
            vec![
                a.header.as_str(),
                a.description.as_deref().unwrap_or_default(),
                a.id.as_str(),
            ]
        }))
    }

    pub async fn live_facilities(
        &self,
        filter: &LiveFacilityFilter,
    ) -> Result<Page<LiveFacility>, ApiError> {
        let query = filter.apply(Query::collection(LiveFacility::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    // ── Static network ─────────────────────────────────────────────────

    /// Every shape drawn for a route.
    pub async fn shapes(&self, args: &ShapeArgs) -> Result<Vec<Shape>, ApiError> {
        let route_id = required_id("route_id", &args.route_id)?;
        self.list_all(Query::collection(Shape::KIND).filter("route", Some(route_id)))
            .await
    }

    pub async fn lines(&self, filter: &LineFilter) -> Result<Page<Line>, ApiError> {
        let query = filter.apply(Query::collection(Line::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    /// Every line, ranked against `args.query` when given.
    pub async fn all_lines(&self, args: &ListArgs) -> Result<Vec<Line>, ApiError> {
        let lines = self.list_all::<Line>(Query::collection(Line::KIND)).await?;
        Ok(rank_or_take(lines, args, |l| {
            vec![
                l.long_name.as_deref().unwrap_or_default(),
                l.short_name.as_deref().unwrap_or_default(),
                l.id.as_str(),
            ]
        }))
    }

    pub async fn facilities(&self, filter: &FacilityFilter) -> Result<Page<Facility>, ApiError> {
        let query = filter.apply(Query::collection(Facility::KIND))?;
        self.list(self.paged(query, &filter.paging)?).await
    }

    /// Every facility, ranked against `args.query` when given.
    pub async fn all_facilities(&self, args: &ListArgs) -> Result<Vec<Facility>, ApiError> {
        let facilities = self.list_all::<Facility>(Query::collection(Facility::KIND)).await?;
        Ok(rank_or_take(facilities, args, |f| {
            vec![
                f.long_name.as_deref().unwrap_or_default(),
                f.short_name.as_deref().unwrap_or_default(),
                f.id.as_str(),
            ]
        }))
    }
}

fn stop_fields(s: &Stop) -> Vec<&str> {
    vec![
        s.name.as_str(),
        s.description.as_deref().unwrap_or_default(),
        s.id.as_str(),
    ]
}

fn rank_or_take<T, F>(items: Vec<T>, args: &ListArgs, fields: F) -> Vec<T>
where
    F: Fn(&T) -> Vec<&str>,
{
    let max = args.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1) as usize;
    match args.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => fuzzy::rank(items, query, max, fields),
        None => items.into_iter().take(max).collect(),
    }
}
