use std::io;
use std::net::SocketAddr;

use mock_server::{MockHandler, MockResponse, MockState};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Response loaded from `MOCK_RESPONSE_FILE`.
#[derive(Debug, Deserialize)]
struct ResponseFile {
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: String,
}

fn default_status() -> u16 {
    200
}

impl From<ResponseFile> for MockResponse {
    fn from(file: ResponseFile) -> Self {
        file.headers
            .into_iter()
            .fold(MockResponse::new().status(file.status), |r, (k, v)| r.header(k, v))
            .body(file.body)
    }
}

/// Pick the handler from the environment: a JSON response file, then
/// `MOCK_BODY`/`MOCK_STATUS`, then the default "Hello World".
fn handler_from_env() -> io::Result<MockHandler> {
    if let Ok(path) = std::env::var("MOCK_RESPONSE_FILE") {
        let raw = std::fs::read_to_string(&path)?;
        let file: ResponseFile = serde_json::from_str(&raw).map_err(io::Error::other)?;
        return Ok(MockResponse::from(file).into());
    }

    let status = match std::env::var("MOCK_STATUS") {
        Ok(raw) => raw.parse::<u16>().map_err(io::Error::other)?,
        Err(_) => 200,
    };
    match std::env::var("MOCK_BODY") {
        Ok(body) => Ok(MockResponse::new().status(status).body(body).into()),
        Err(_) if status != 200 => Ok(MockResponse::new().status(status).into()),
        Err(_) => Ok(MockHandler::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let handler = handler_from_env()?;
    let listener = TcpListener::bind(&addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    info!(%local, ?handler, "mock server listening");
    mock_server::run(listener, MockState::new(local, handler)).await
}
