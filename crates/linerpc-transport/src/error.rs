/// Errors that can occur while setting up or tearing down a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to spawn the child process.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The spawned child did not expose the requested stdio pipe.
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),

    /// An I/O error occurred while waiting on or signalling the child.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
