//! JSON:API document types.
//!
//! Only the structural parts of a document are modelled here (`data`,
//! `included`, `links`, `errors`). Attribute payloads stay as JSON maps until
//! a record's own decode function projects them into a typed struct, so a
//! malformed resource fails closed with [`ApiError::Decode`].

use crate::error::ApiError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Media type sent in the `Accept` header.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// A top-level JSON:API document.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Document {
    #[serde(default)]
    pub data: PrimaryData,
    #[serde(default)]
    pub included: Vec<Resource>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

/// Primary data: a collection, a single resource, or an explicit `null`.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<Resource>),
    One(Box<Resource>),
    Null,
    /// The document had no `data` member at all.
    #[default]
    #[serde(skip_deserializing)]
    Absent,
}

/// A resource object.
#[derive(Deserialize, Debug, Clone)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

/// Resource linkage inside a relationship.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Linkage {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

#[derive(Deserialize, Debug, Clone)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Pagination links. Upstream emits plain URL strings; link objects with an
/// `href` member are accepted too.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Links {
    #[serde(default)]
    pub next: Option<Link>,
    #[serde(default, rename = "self")]
    pub this: Option<Link>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Link {
    Url(String),
    Object { href: String },
}

impl Link {
    pub fn href(&self) -> &str {
        match self {
            Link::Url(url) => url,
            Link::Object { href } => href,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl Document {
    /// Primary resources as a slice-like vector, regardless of cardinality.
    pub fn primary(&self) -> Vec<&Resource> {
        match &self.data {
            PrimaryData::Many(items) => items.iter().collect(),
            PrimaryData::One(item) => vec![item.as_ref()],
            PrimaryData::Null | PrimaryData::Absent => Vec::new(),
        }
    }

    /// Whether a single-resource lookup came back as `"data": null`.
    pub fn is_null(&self) -> bool {
        matches!(self.data, PrimaryData::Null)
    }

    /// Included resources of the given type.
    pub fn included_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.included.iter().filter(move |r| r.kind == kind)
    }

    /// URL of the next page, if upstream advertised one.
    pub fn next_link(&self) -> Option<&str> {
        self.links.next.as_ref().map(Link::href)
    }
}

impl Resource {
    /// ID of a to-one relationship, or `None` when absent or null.
    pub fn to_one(&self, name: &str) -> Option<String> {
        match self.relationships.get(name)?.data.as_ref()? {
            Linkage::One(target) => Some(target.id.clone()),
            Linkage::Many(targets) => targets.first().map(|t| t.id.clone()),
        }
    }

    /// IDs of a to-many relationship; empty when absent.
    pub fn to_many(&self, name: &str) -> Vec<String> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(Linkage::Many(targets)) => targets.iter().map(|t| t.id.clone()).collect(),
            Some(Linkage::One(target)) => vec![target.id.clone()],
            None => Vec::new(),
        }
    }

    /// Project this resource's attributes into a typed struct after checking
    /// the resource type.
    pub fn attributes_as<T: DeserializeOwned>(&self, expected_kind: &str) -> Result<T, ApiError> {
        if self.kind != expected_kind {
            return Err(ApiError::Decode(format!(
                "expected resource of type '{expected_kind}', got '{}' (id {})",
                self.kind, self.id
            )));
        }
        serde_json::from_value(serde_json::Value::Object(self.attributes.clone())).map_err(|e| {
            ApiError::Decode(format!("{expected_kind} {}: {e}", self.id))
        })
    }
}

/// Parse a response body into a document. A document carrying neither
/// `data` nor `errors` is rejected.
pub fn parse_document(body: &str) -> Result<Document, ApiError> {
    let doc: Document = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("malformed JSON:API document: {e}")))?;
    if matches!(doc.data, PrimaryData::Absent) && doc.errors.is_empty() {
        return Err(ApiError::Decode(
            "document contains neither 'data' nor 'errors'".into(),
        ));
    }
    Ok(doc)
}

/// Summarise an error response body for inclusion in an [`ApiError`].
///
/// Uses the JSON:API `errors` array when present, otherwise a trimmed
/// preview of the raw body.
pub fn error_detail(body: &str) -> String {
    if let Ok(doc) = serde_json::from_str::<Document>(body)
        && !doc.errors.is_empty()
    {
        return doc
            .errors
            .iter()
            .map(|e| {
                let title = e.title.as_deref().or(e.code.as_deref()).unwrap_or("error");
                match &e.detail {
                    Some(detail) => format!("{title}: {detail}"),
                    None => title.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
    }
    body.trim().chars().take(200).collect()
}

/// Extract the `page[offset]` value from a pagination link.
pub fn offset_from_link(link: &str) -> Option<u32> {
    let url = reqwest::Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "page[offset]")
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "data": [
            {
                "type": "prediction",
                "id": "p-1",
                "attributes": {"arrival_time": null, "direction_id": 0},
                "relationships": {
                    "route": {"data": {"type": "route", "id": "Red"}},
                    "vehicle": {"data": null},
                    "stop": {"links": {}}
                }
            }
        ],
        "included": [
            {"type": "route", "id": "Red", "attributes": {"long_name": "Red Line"}}
        ],
        "links": {"next": "https://api-v3.mbta.com/predictions?page%5Blimit%5D=1&page%5Boffset%5D=1"}
    }"#;

    #[test]
    fn parses_collection_with_links() {
        let doc = parse_document(COLLECTION).unwrap();
        assert_eq!(doc.primary().len(), 1);
        assert_eq!(doc.included_of("route").count(), 1);
        assert_eq!(offset_from_link(doc.next_link().unwrap()), Some(1));
    }

    #[test]
    fn missing_relationships_decode_as_absent() {
        let doc = parse_document(COLLECTION).unwrap();
        let resource = doc.primary()[0];
        assert_eq!(resource.to_one("route").as_deref(), Some("Red"));
        assert_eq!(resource.to_one("vehicle"), None);
        assert_eq!(resource.to_one("stop"), None);
        assert_eq!(resource.to_one("trip"), None);
        assert!(resource.to_many("facilities").is_empty());
    }

    #[test]
    fn single_resource_document() {
        let doc =
            parse_document(r#"{"data": {"type": "stop", "id": "place-pktrm", "attributes": {}}}"#)
                .unwrap();
        assert_eq!(doc.primary()[0].id, "place-pktrm");
        assert!(doc.next_link().is_none());
    }

    #[test]
    fn null_data_is_distinguished() {
        let doc = parse_document(r#"{"data": null}"#).unwrap();
        assert!(doc.is_null());
        assert!(doc.primary().is_empty());
    }

    #[test]
    fn empty_collection_is_valid() {
        let doc = parse_document(r#"{"data": []}"#).unwrap();
        assert!(doc.primary().is_empty());
    }

    #[test]
    fn document_without_data_is_rejected() {
        let err = parse_document(r#"{"jsonapi": {"version": "1.0"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(matches!(parse_document("<html>"), Err(ApiError::Decode(_))));
    }

    #[test]
    fn wrong_resource_type_fails_closed() {
        let doc =
            parse_document(r#"{"data": {"type": "route", "id": "Red", "attributes": {}}}"#).unwrap();
        let result: Result<serde_json::Value, _> = doc.primary()[0].attributes_as("stop");
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn error_detail_uses_errors_array() {
        let body = r#"{"errors": [{"status": "400", "code": "bad_request", "detail": "Invalid filter"}]}"#;
        assert_eq!(error_detail(body), "bad_request: Invalid filter");
        assert_eq!(error_detail("  plain text  "), "plain text");
    }

    #[test]
    fn link_object_form() {
        let doc = parse_document(
            r#"{"data": [], "links": {"next": {"href": "https://x.test/stops?page[offset]=20"}}}"#,
        )
        .unwrap();
        assert_eq!(offset_from_link(doc.next_link().unwrap()), Some(20));
    }
}
