//! In-process HTTP mock server.
//!
//! # Overview
//! Every request, whatever its method or path, is recorded and answered by
//! the current `MockHandler`. `MockResponder` owns the socket lifecycle for
//! blocking callers; `app` and `run` expose the same dispatch for async code.

mod error;
mod handler;
mod responder;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tracing::{debug, warn};

pub use error::MockError;
pub use handler::{ComputeFn, MockHandler, MockResponse, RecordedRequest, ServerHandle};
pub use responder::MockResponder;

/// Shared dispatch state: the swappable handler and the request journal.
#[derive(Debug, Clone)]
pub struct MockState {
    addr: SocketAddr,
    handler: Arc<RwLock<MockHandler>>,
    journal: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockState {
    pub fn new(addr: SocketAddr, handler: MockHandler) -> Self {
        Self {
            addr,
            handler: Arc::new(RwLock::new(handler)),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the handler; the next request sees the new one.
    pub fn set_handler(&self, handler: MockHandler) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    pub fn handler(&self) -> MockHandler {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn record(&self, request: RecordedRequest) -> u64 {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        journal.push(request);
        journal.len() as u64
    }
}

pub fn app(state: MockState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn dispatch(State(state): State<MockState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let recorded = RecordedRequest::from_parts(&parts, body);
    let sequence = state.record(recorded.clone());
    let server = ServerHandle::new(state.addr, sequence);
    let response = state.handler().respond(&server, &recorded);

    debug!(
        sequence,
        method = %recorded.method,
        path = %recorded.path,
        status = response.status_code(),
        "dispatched request"
    );
    response.into_response()
}
