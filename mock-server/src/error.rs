use std::io;

use thiserror::Error;

/// Errors raised while starting a `MockResponder`.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("failed to bind mock server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn mock server thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("mock server IO error: {0}")]
    Io(#[from] io::Error),
}
