//! Decoded result shapes and the functions that build them from documents.

use crate::api::jsonapi::{Document, offset_from_link};
use crate::error::ApiError;
use crate::model::{Prediction, Record, Route, Schedule, Stop, Trip, Vehicle, decode_all};
use serde::Serialize;

/// An ordered run of records plus the offset of the following page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Pass back as `page_offset` to continue; `None` on the last page.
    pub next_offset: Option<u32>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A trip with the compound data requested alongside it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TripDetails {
    pub trip: Trip,
    pub predictions: Vec<Prediction>,
    pub schedules: Vec<Schedule>,
    pub vehicle: Option<Vehicle>,
}

/// A route with the stops it serves.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RouteWithStops {
    pub route: Route,
    pub stops: Vec<Stop>,
}

/// Concatenate the primary data of every document, in order.
pub fn decode_page<T: Record>(documents: &[Document]) -> Result<Page<T>, ApiError> {
    let mut records = Vec::new();
    for document in documents {
        records.extend(decode_all::<T>(document.primary())?);
    }
    let next_offset = documents
        .last()
        .and_then(Document::next_link)
        .and_then(offset_from_link);
    Ok(Page {
        records,
        next_offset,
    })
}

/// Decode a single-resource document. `"data": null` is [`ApiError::NotFound`].
pub fn decode_one<T: Record>(documents: &[Document], id: &str) -> Result<T, ApiError> {
    let not_found = || ApiError::NotFound {
        resource: format!("{} '{id}'", T::KIND),
    };
    let document = documents.first().ok_or_else(not_found)?;
    if document.is_null() {
        return Err(not_found());
    }
    let primary = document.primary();
    let resource = primary.first().ok_or_else(not_found)?;
    T::decode(resource)
}

pub fn decode_trip_details(documents: &[Document], id: &str) -> Result<TripDetails, ApiError> {
    let trip = decode_one::<Trip>(documents, id)?;
    let included = |kind: &'static str| documents.iter().flat_map(move |d| d.included_of(kind));
    let mut vehicles = decode_all::<Vehicle>(included(Vehicle::KIND.type_name()))?;
    Ok(TripDetails {
        trip,
        predictions: decode_all(included(Prediction::KIND.type_name()))?,
        schedules: decode_all(included(Schedule::KIND.type_name()))?,
        vehicle: if vehicles.is_empty() {
            None
        } else {
            Some(vehicles.swap_remove(0))
        },
    })
}

pub fn decode_route_with_stops(documents: &[Document], id: &str) -> Result<RouteWithStops, ApiError> {
    let route = decode_one::<Route>(documents, id)?;
    let stops = documents
        .iter()
        .flat_map(|d| d.included_of(Stop::KIND.type_name()));
    Ok(RouteWithStops {
        route,
        stops: decode_all(stops)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::jsonapi::parse_document;

    fn doc(json: &str) -> Document {
        parse_document(json).unwrap()
    }

    #[test]
    fn pages_concatenate_in_order() {
        let first = doc(
            r#"{"data": [{"type": "line", "id": "line-Red", "attributes": {}}],
                "links": {"next": "https://api.test/lines?page[offset]=1&page[limit]=1"}}"#,
        );
        let second = doc(r#"{"data": [{"type": "line", "id": "line-Blue", "attributes": {}}]}"#);

        let page: Page<crate::model::Line> = decode_page(&[first.clone()]).unwrap();
        assert_eq!(page.next_offset, Some(1));

        let all: Page<crate::model::Line> = decode_page(&[first, second]).unwrap();
        let ids: Vec<_> = all.records.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["line-Red", "line-Blue"]);
        assert_eq!(all.next_offset, None);
    }

    #[test]
    fn empty_collection_is_an_empty_page() {
        let page: Page<Stop> = decode_page(&[doc(r#"{"data": []}"#)]).unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn null_single_resource_is_not_found() {
        let err = decode_one::<Stop>(&[doc(r#"{"data": null}"#)], "place-xyz").unwrap_err();
        assert_eq!(
            err,
            ApiError::NotFound {
                resource: "stop 'place-xyz'".into()
            }
        );
    }

    #[test]
    fn trip_details_pick_included_resources() {
        let document = doc(
            r#"{"data": {"type": "trip", "id": "T1", "attributes": {"headsign": "Ashmont"},
                         "relationships": {"route": {"data": {"type": "route", "id": "Red"}}}},
                "included": [
                  {"type": "vehicle", "id": "R-1", "attributes": {"label": "1801"}},
                  {"type": "prediction", "id": "p1", "attributes": {"arrival_time": null},
                   "relationships": {"route": {"data": {"type": "route", "id": "Red"}}}},
                  {"type": "route", "id": "Red", "attributes": {"type": 1}}
                ]}"#,
        );
        let details = decode_trip_details(&[document], "T1").unwrap();
        assert_eq!(details.trip.headsign.as_deref(), Some("Ashmont"));
        assert_eq!(details.predictions.len(), 1);
        assert!(details.schedules.is_empty());
        assert_eq!(details.vehicle.map(|v| v.id), Some("R-1".to_string()));
    }

    #[test]
    fn route_with_stops_decodes_included_stops() {
        let document = doc(
            r#"{"data": {"type": "route", "id": "Mattapan", "attributes": {"type": 0}},
                "included": [
                  {"type": "stop", "id": "place-matt", "attributes": {"name": "Mattapan"}},
                  {"type": "stop", "id": "place-asmnl", "attributes": {"name": "Ashmont"}}
                ]}"#,
        );
        let result = decode_route_with_stops(&[document], "Mattapan").unwrap();
        assert_eq!(result.stops.len(), 2);
        assert_eq!(result.route.route_type, 0);
    }

    #[test]
    fn malformed_included_resource_fails_closed() {
        let document = doc(
            r#"{"data": {"type": "route", "id": "Red", "attributes": {"type": 1}},
                "included": [{"type": "stop", "id": "bad", "attributes": {"latitude": 1.0}}]}"#,
        );
        assert!(matches!(
            decode_route_with_stops(&[document], "Red"),
            Err(ApiError::Decode(_))
        ));
    }
}
