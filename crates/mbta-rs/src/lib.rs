//! Caching, coalescing access layer for the MBTA V3 transit API, exposed as
//! agent tools.
//!
//! The core abstraction is [`MbtaClient`]: typed methods (stops, routes,
//! predictions, schedules, trips, vehicles, alerts, shapes, ...) that run
//! through one request pipeline:
//!
//! - a TTL + LRU [`ResponseCache`](api::cache::ResponseCache) keyed by a
//!   canonical request [`Fingerprint`](api::fingerprint::Fingerprint);
//! - a [`Coalescer`](api::coalesce::Coalescer) so concurrent identical
//!   requests share one upstream call;
//! - [`retry_call`](api::retry::retry_call) with exponential backoff for
//!   transient failures;
//! - JSON:API decoding into owned domain [`model`] records, failing closed on
//!   shape mismatches.
//!
//! On top sits a tool dispatcher ([`tools::ToolRegistry`]) that validates
//! tool-call arguments against JSON Schemas derived from the argument types
//! and routes them to client methods.
//!
//! # Getting started
//!
//! ```ignore
//! use mbta_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ApiError> {
//!     let client = Arc::new(MbtaClient::new(ClientConfig::from_env())?);
//!
//!     // Call the client directly...
//!     let args = StopPredictionsArgs {
//!         stop_id: "place-pktrm".into(),
//!         ..Default::default()
//!     };
//!     let page = client.predictions_for_stop(&args).await?;
//!     println!("{} predictions", page.len());
//!
//!     // ...or through the tool registry.
//!     let tools = transit_tools(client);
//!     let response = tools
//!         .call("mbta_search_stops", &serde_json::json!({"query": "harvard"}))
//!         .await;
//!     println!("{}", response.joined_text());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`MbtaClient`], query building, typed filters, result pages |
//! | [`api`] | Cache, coalescer, retry, fingerprints, JSON:API documents, HTTP transport |
//! | [`model`] | Decoded domain records |
//! | [`tools`] | Tool registry, dispatcher, `mbta_*` catalogue |
//! | [`config`] | [`ClientConfig`], cache policies |
//! | [`error`] | [`ApiError`] taxonomy |

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod geo;
pub mod model;
pub mod prelude;
pub mod stations;
pub mod tools;

pub use client::MbtaClient;
pub use config::ClientConfig;
pub use error::ApiError;

use schemars::JsonSchema;

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool argument schemas are published from this, so
/// the schema and deserialization cannot drift apart.
///
/// # Example
///
/// ```
/// use mbta_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct StopArgs {
///     stop_id: String,
///     #[serde(default)]
///     route_id: Option<String>,
/// }
///
/// let schema = json_schema_for::<StopArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"stop_id".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
