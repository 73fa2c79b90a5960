//! Exposes an in-process blob store for use in tests.
//!
//! ```
//! use blobbench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::ambry();
//!    let url = server.url("/healthCheck");
//!    // use the URL in tests...
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use bytes::Bytes;
use uuid::Uuid;

/// The protocol dialect a [`TestServer`] speaks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreKind {
    /// Objects are created at `POST /`, the health endpoint is `/healthCheck`, and deletions
    /// are acknowledged with `202 Accepted`.
    Ambry,
    /// Objects are created at `POST /blob`, the health endpoint is `/health`, and deletions
    /// are acknowledged with `410 Gone`.
    Stored,
}

impl StoreKind {
    fn locator(self, key: &str) -> String {
        match self {
            StoreKind::Ambry => format!("/{key}"),
            StoreKind::Stored => format!("/blob/{key}"),
        }
    }
}

#[derive(Debug, Default)]
struct Objects {
    live: HashMap<String, Bytes>,
    deleted: HashSet<String>,
}

#[derive(Clone, Debug)]
struct TestState {
    kind: StoreKind,
    objects: Arc<Mutex<Objects>>,
    requests: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
}

impl TestState {
    fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            objects: Default::default(),
            requests: Default::default(),
            creates: Default::default(),
        }
    }

    fn store(&self, body: Bytes) -> String {
        let locator = self.kind.locator(&Uuid::new_v4().simple().to_string());
        self.objects
            .lock()
            .unwrap()
            .live
            .insert(locator.clone(), body);
        locator
    }
}

/// An in-process blob store for use in tests.
///
/// The server keeps all objects in memory and listens on a random available port on localhost.
/// It counts every request it receives, so tests can assert that an operation did or did not
/// reach the network.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: TestState,
}

impl TestServer {
    /// Creates a new server speaking the Ambry dialect.
    pub fn ambry() -> Self {
        Self::for_kind(StoreKind::Ambry)
    }

    /// Creates a new server speaking the Stored dialect.
    pub fn stored() -> Self {
        Self::for_kind(StoreKind::Stored)
    }

    /// Creates a new server speaking the given dialect.
    pub fn for_kind(kind: StoreKind) -> Self {
        async fn health(State(state): State<TestState>) -> &'static str {
            state.requests.fetch_add(1, Ordering::Relaxed);
            match state.kind {
                StoreKind::Ambry => "GOOD",
                StoreKind::Stored => "Ok",
            }
        }

        async fn create(State(state): State<TestState>, body: Bytes) -> Response {
            state.requests.fetch_add(1, Ordering::Relaxed);
            state.creates.fetch_add(1, Ordering::Relaxed);

            let locator = state.store(body);
            (StatusCode::CREATED, [(header::LOCATION, locator)]).into_response()
        }

        async fn get(State(state): State<TestState>, Path(key): Path<String>) -> Response {
            state.requests.fetch_add(1, Ordering::Relaxed);

            let locator = state.kind.locator(&key);
            let objects = state.objects.lock().unwrap();
            if let Some(body) = objects.live.get(&locator) {
                return ([(header::CONTENT_TYPE, "application/json")], body.clone()).into_response();
            }
            if objects.deleted.contains(&locator) {
                return StatusCode::GONE.into_response();
            }
            StatusCode::NOT_FOUND.into_response()
        }

        async fn delete(State(state): State<TestState>, Path(key): Path<String>) -> StatusCode {
            state.requests.fetch_add(1, Ordering::Relaxed);

            let locator = state.kind.locator(&key);
            let mut objects = state.objects.lock().unwrap();
            if objects.live.remove(&locator).is_some() {
                objects.deleted.insert(locator);
                return match state.kind {
                    StoreKind::Ambry => StatusCode::ACCEPTED,
                    StoreKind::Stored => StatusCode::GONE,
                };
            }
            if objects.deleted.contains(&locator) {
                return StatusCode::GONE;
            }
            StatusCode::NOT_FOUND
        }

        let state = TestState::new(kind);
        let router = match kind {
            StoreKind::Ambry => Router::new()
                .route("/healthCheck", routing::get(health))
                .route("/", routing::post(create))
                .route("/{key}", routing::get(get).delete(delete)),
            StoreKind::Stored => Router::new()
                .route("/health", routing::get(health))
                .route("/blob", routing::post(create))
                .route("/blob/{key}", routing::get(get).delete(delete)),
        };

        Self::serve(router.with_state(state.clone()), state)
    }

    /// Creates a new server with the given [`Router`].
    ///
    /// The object accessors and request counters of such a server stay empty.
    pub fn with_router(router: Router) -> Self {
        Self::serve(router, TestState::new(StoreKind::Ambry))
    }

    fn serve(router: Router, state: TestState) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Stores an object directly, bypassing HTTP, and returns its locator.
    pub fn insert(&self, body: impl Into<Bytes>) -> String {
        self.state.store(body.into())
    }

    /// Returns the object stored under `locator`, if it exists.
    pub fn object(&self, locator: &str) -> Option<Bytes> {
        self.state
            .objects
            .lock()
            .unwrap()
            .live
            .get(locator)
            .cloned()
    }

    /// Returns the number of live objects.
    pub fn object_count(&self) -> usize {
        self.state.objects.lock().unwrap().live.len()
    }

    /// Returns the number of requests the server has handled, including health checks.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::Relaxed)
    }

    /// Returns the number of create requests the server has handled.
    pub fn creates(&self) -> usize {
        self.state.creates.load(Ordering::Relaxed)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
