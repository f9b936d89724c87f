//! Blocking start/stop lifecycle around the axum dispatcher.
//!
//! # Design
//! The socket is bound synchronously on the caller's thread so bind errors
//! surface from `start` and the port is accepting when it returns. The server
//! then runs on a dedicated thread with a current-thread tokio runtime.
//! `stop` signals that thread and joins it; dropping the runtime tears down
//! the listener and every open connection, so a restart on the same port
//! never races the previous socket.

use std::io;
use std::net::SocketAddr;
use std::thread::JoinHandle;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::MockError;
use crate::handler::{MockHandler, RecordedRequest};
use crate::{run, MockState};

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<io::Result<()>>,
}

/// A mock HTTP server on `127.0.0.1`.
///
/// Port 0 picks a free port on first start; that port is then kept for later
/// restarts.
pub struct MockResponder {
    port: u16,
    state: MockState,
    running: Option<Running>,
}

impl MockResponder {
    pub fn new(port: u16) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        Self {
            port,
            state: MockState::new(addr, MockHandler::default()),
            running: None,
        }
    }

    /// Start with the default "Hello World" handler.
    pub fn start(&mut self) -> Result<&mut Self, MockError> {
        self.start_with(MockHandler::default())
    }

    /// Stop any running instance, install `handler`, and start listening.
    ///
    /// The request journal is cleared.
    pub fn start_with(&mut self, handler: impl Into<MockHandler>) -> Result<&mut Self, MockError> {
        self.stop();

        let port = self.port;
        let listener = std::net::TcpListener::bind(("127.0.0.1", port))
            .map_err(|source| MockError::Bind { port, source })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let state = MockState::new(addr, handler.into());
        let serve_state = state.clone();
        let (shutdown, signal) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(format!("mock-server-{}", addr.port()))
            .spawn(move || -> io::Result<()> {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                rt.block_on(async move {
                    let listener = TcpListener::from_std(listener)?;
                    tokio::select! {
                        result = run(listener, serve_state) => result,
                        _ = signal => Ok::<(), io::Error>(()),
                    }
                })
            })
            .map_err(MockError::Spawn)?;

        self.port = addr.port();
        self.state = state;
        self.running = Some(Running {
            addr,
            shutdown,
            thread,
        });
        info!(%addr, "mock server started");
        Ok(self)
    }

    /// Replace the handler without touching the socket.
    pub fn set_handler(&mut self, handler: impl Into<MockHandler>) -> &mut Self {
        self.state.set_handler(handler.into());
        self
    }

    /// Release the socket if bound. Safe to call at any time.
    pub fn stop(&mut self) -> &mut Self {
        let Some(running) = self.running.take() else {
            return self;
        };

        // The receiver is gone only if the server already exited.
        let _ = running.shutdown.send(());
        match running.thread.join() {
            Ok(Ok(())) => info!(addr = %running.addr, "mock server stopped"),
            Ok(Err(err)) => warn!(addr = %running.addr, error = %err, "mock server exited with error"),
            Err(_) => warn!(addr = %running.addr, "mock server thread panicked"),
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Configured port, or the pinned port once started on port 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Requests received since the last start.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests()
    }

    pub fn request_count(&self) -> usize {
        self.state.request_count()
    }
}

impl Drop for MockResponder {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MockResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResponder")
            .field("port", &self.port)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
