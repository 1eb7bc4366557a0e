//! The MBTA client: typed methods over a cached, coalesced, retrying
//! request pipeline.
//!
//! Every method follows the same path through [`MbtaClient::fetch`]:
//!
//! 1. validate arguments and build a canonical [`Query`];
//! 2. derive its [`Fingerprint`](crate::api::fingerprint::Fingerprint) and
//!    consult the [`ResponseCache`];
//! 3. on a miss, join or start the single in-flight call for that fingerprint
//!    in the [`Coalescer`]; the call fetches with retry (following
//!    `links.next` for fetch-all queries), decodes into domain records and
//!    writes the cache;
//! 4. return the decoded value.
//!
//! Only fully decoded successes are cached. Failures (including exhausted
//! retries and decode errors) are delivered to every waiter and then
//! forgotten.

mod filters;
mod methods;
mod page;
mod query;
#[cfg(test)]
pub(crate) mod testing;

pub use filters::{
    AlertFilter, DEFAULT_RADIUS_M, FacilityFilter, LineFilter, ListArgs, LiveFacilityFilter,
    NearbyStopsArgs, Paging, PredictionFilter, RouteFilter, RoutePatternFilter, RouteWithStopsArgs,
    ScheduleFilter, SearchArea, SearchArgs, ServiceFilter, ShapeArgs, StopFilter,
    StopPredictionsArgs, TransferStationsArgs, TripDetailsArgs, TripFilter, VehicleFilter,
};
pub use page::{Page, RouteWithStops, TripDetails};
pub use query::{MAX_PAGE_LIMIT, Query};

use crate::api::cache::{CacheStats, ResponseCache};
use crate::api::coalesce::Coalescer;
use crate::api::jsonapi::{Document, PrimaryData, error_detail, parse_document};
use crate::api::retry::{RetryConfig, retry_call};
use crate::api::transport::{HttpTransport, Transport};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::Record;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, warn};

/// Type-erased decoded value stored in the cache and shared by coalesced
/// waiters.
type CachedValue = Arc<dyn Any + Send + Sync>;

/// Whether a query reads one page or follows `links.next` to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    OnePage,
    AllPages,
}

impl FetchMode {
    fn tag(self) -> &'static str {
        match self {
            FetchMode::OnePage => "page",
            FetchMode::AllPages => "all",
        }
    }
}

/// Shared MBTA API client. Cheap to share behind an `Arc`; construct once
/// at startup and pass it to whoever needs it.
pub struct MbtaClient {
    config: ClientConfig,
    base_url: String,
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache<CachedValue>>,
    coalescer: Coalescer<CachedValue>,
}

impl std::fmt::Debug for MbtaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbtaClient")
            .field("base_url", &self.base_url)
            .field("cache", &self.cache.stats())
            .field("coalescer", &self.coalescer)
            .finish_non_exhaustive()
    }
}

impl MbtaClient {
    /// Build a client talking HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        let cache = Arc::new(ResponseCache::new(config.cache.clone()));
        Self {
            config,
            base_url,
            transport,
            cache,
            coalescer: Coalescer::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Add the sparse fieldset for `T` when enabled.
    fn sparse<T: Record>(&self, query: Query) -> Query {
        if self.config.sparse_fieldsets {
            query.fields(T::KIND, T::FIELDS)
        } else {
            query
        }
    }

    /// Run `query` through cache, coalescer and transport, decoding with
    /// `decode`.
    async fn fetch<D, F>(&self, query: Query, mode: FetchMode, decode: F) -> Result<Arc<D>, ApiError>
    where
        D: Send + Sync + 'static,
        F: FnOnce(&[Document]) -> Result<D, ApiError> + Send + 'static,
    {
        // Methods decoding the same query differently must not share entries.
        let fingerprint = query
            .fingerprint()
            .with_variant(mode.tag())
            .with_variant(std::any::type_name::<D>());
        if let Some(hit) = self.cache.get(&fingerprint)
            && let Ok(value) = hit.downcast::<D>()
        {
            debug!(key = %fingerprint, "Served from cache");
            return Ok(value);
        }

        let request = PageRequest {
            transport: Arc::clone(&self.transport),
            retry: self.config.retry.clone(),
            url: format!("{}{}", self.base_url, query.path()),
            params: query.params(),
            mode,
            max_pages: self.config.max_pages.max(1),
        };
        let cache = Arc::clone(&self.cache);
        let key = fingerprint.clone();
        let kind = query.kind();

        let value = self
            .coalescer
            .run_once(fingerprint, move || async move {
                let documents = request.fetch_documents().await?;
                let decoded: CachedValue = Arc::new(decode(&documents)?);
                cache.put(key, Arc::clone(&decoded), kind);
                Ok(decoded)
            })
            .await?;

        value.downcast::<D>().map_err(|_| {
            ApiError::Internal(format!(
                "decoded value for {} has an unexpected type",
                query.path()
            ))
        })
    }
}

/// Everything the detached fetch task needs, owned.
struct PageRequest {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    url: String,
    params: Vec<(String, String)>,
    mode: FetchMode,
    max_pages: u32,
}

impl PageRequest {
    async fn fetch_documents(&self) -> Result<Vec<Document>, ApiError> {
        let mut documents = Vec::new();
        let mut url = self.url.clone();
        let mut params = self.params.clone();
        loop {
            let document = retry_call(&self.retry, &url, || {
                fetch_document(self.transport.as_ref(), &url, &params)
            })
            .await?;
            let next = match self.mode {
                FetchMode::AllPages => document.next_link().map(str::to_string),
                FetchMode::OnePage => None,
            };
            documents.push(document);

            let Some(next) = next else { break };
            if documents.len() >= self.max_pages as usize {
                warn!("{}: more than {} pages, refusing to truncate", self.url, self.max_pages);
                return Err(ApiError::Internal(format!(
                    "{} spans more than {} pages; raise max_pages",
                    self.url, self.max_pages
                )));
            }
            // The next link already carries every query parameter.
            url = next;
            params.clear();
        }
        Ok(documents)
    }
}

async fn fetch_document(
    transport: &dyn Transport,
    url: &str,
    params: &[(String, String)],
) -> Result<Document, ApiError> {
    let response = transport.get(url, params).await?;
    if !response.is_success() {
        return Err(response.into_error());
    }
    let document = parse_document(&response.body)?;
    if matches!(document.data, PrimaryData::Absent) {
        return Err(ApiError::Rejected {
            status: response.status,
            detail: error_detail(&response.body),
        });
    }
    Ok(document)
}

/// Upstream answers unknown IDs with a 404 error document.
fn not_found_for(resource: String) -> impl FnOnce(ApiError) -> ApiError {
    move |e| match e {
        ApiError::Rejected { status: 404, .. } | ApiError::NotFound { .. } => {
            ApiError::NotFound { resource }
        }
        other => other,
    }
}
