//! In-memory network for tests.
//!
//! Routes are keyed by absolute URL without query or fragment, so the
//! revision marker on fetch targets does not affect routing. Every request is
//! recorded in arrival order, which is how tests count network fetches.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::{Network, NetworkResponse};
use precache_core::FetchErrorKind;

#[derive(Debug, Clone)]
pub(crate) enum Route {
    Body { status: u16, body: Vec<u8> },
    Redirect { status: u16, location: Option<String> },
    Fail(FetchErrorKind),
}

#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

fn route_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub(crate) fn route(&self, url: &str, route: Route) {
        let key = route_key(&Url::parse(url).unwrap());
        self.routes.lock().unwrap().insert(key, route);
    }

    pub(crate) fn serve(&self, url: &str, body: &str) {
        self.route(url, Route::Body { status: 200, body: body.as_bytes().to_vec() });
    }

    pub(crate) fn redirect(&self, url: &str, location: &str) {
        self.route(url, Route::Redirect { status: 302, location: Some(location.to_string()) });
    }

    pub(crate) fn fail(&self, url: &str, kind: FetchErrorKind) {
        self.route(url, Route::Fail(kind));
    }

    /// Every request target seen so far, marker included.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose target routes to `url`.
    pub(crate) fn request_count(&self, url: &str) -> usize {
        let key = route_key(&Url::parse(url).unwrap());
        self.requests()
            .iter()
            .filter(|r| route_key(&Url::parse(r).unwrap()) == key)
            .count()
    }

    /// Most requests ever outstanding at the same time.
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn request(&self, target: &Url) -> Result<NetworkResponse, FetchErrorKind> {
        self.requests.lock().unwrap().push(target.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let route = self.routes.lock().unwrap().get(&route_key(target)).cloned();
        let (status, headers, body) = match route {
            None => (404, Vec::new(), b"not found".to_vec()),
            Some(Route::Body { status, body }) => {
                (status, vec![("content-type".to_string(), "text/plain".to_string())], body)
            }
            Some(Route::Redirect { status, location }) => {
                (status, location.map(|l| ("location".to_string(), l)).into_iter().collect(), Vec::new())
            }
            Some(Route::Fail(kind)) => return Err(kind),
        };

        Ok(NetworkResponse { url: target.clone(), status, headers, body: Bytes::from(body) })
    }
}
