//! Scripted transport for client and tool tests.

use crate::api::retry::RetryConfig;
use crate::api::transport::{HttpResponse, Transport, TransportFuture};
use crate::error::ApiError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted = Result<HttpResponse, ApiError>;

/// Replays scripted responses in order; the last one repeats once the
/// script runs out. Records every request it receives.
pub(crate) struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub(crate) fn scripted(responses: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        })
    }

    pub(crate) fn always(body: impl Into<String>) -> Arc<Self> {
        Self::scripted(vec![Ok(HttpResponse::ok(body))])
    }

    pub(crate) fn always_status(status: u16) -> Arc<Self> {
        Self::scripted(vec![Ok(HttpResponse {
            status,
            body: String::new(),
            retry_after: None,
        })])
    }

    /// Delay every response, so concurrent callers overlap.
    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("transport already shared"));
        inner.delay = Some(delay);
        Arc::new(inner)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Value of `key` in the most recent request.
    pub(crate) fn last_param(&self, key: &str) -> Option<String> {
        let requests = self.requests.lock().unwrap();
        let (_, params) = requests.last()?;
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn next_response(&self) -> Scripted {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match script.pop_front() {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(ApiError::Connection("empty script".into()))),
        }
    }
}

impl Transport for FakeTransport {
    fn get<'a>(&'a self, url: &'a str, query: &'a [(String, String)]) -> TransportFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), query.to_vec()));
            let response = self.next_response();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}

/// A collection document of attribute-less resources of `kind`.
pub(crate) fn collection(kind: &str, ids: &[&str]) -> String {
    let data: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"type": kind, "id": id, "attributes": {}}))
        .collect();
    serde_json::json!({ "data": data }).to_string()
}

/// Retries with millisecond delays.
pub(crate) fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts: attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
        jitter: false,
    }
}
