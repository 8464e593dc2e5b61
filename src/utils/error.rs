//! Error types for the relay.
//!
//! Setup-time failures (`GatewayError`, `AppError`) propagate to `main` and
//! are fatal. Steady-state failures (`SessionError`, publish failures) stay
//! local to the session or message that caused them.

use thiserror::Error;

/// Failures of the broker gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The transport connection to the broker could not be opened.
    #[error("cannot reach broker at {address}: {source}")]
    TransportConnect {
        address: String,
        #[source]
        source: lapin::Error,
    },

    /// A channel-level setup step was refused by the broker.
    #[error("broker setup failed while {step}: {source}")]
    Channel {
        step: &'static str,
        #[source]
        source: lapin::Error,
    },

    /// The setup protocol did not finish within the configured bound.
    #[error("broker setup did not complete within {0}s")]
    SetupTimeout(u64),

    /// A publish was rejected. Only ever logged.
    #[error("publish failed: {0}")]
    Publish(#[source] lapin::Error),

    /// The established broker connection went away after startup.
    #[error("broker connection lost")]
    ConnectionLost,
}

/// Failure to hand a message to a single client session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(String),

    #[error("write to session {0} failed")]
    Write(String),

    /// The client is not draining its outbound queue.
    #[error("session {0} outbound queue is full")]
    Lagging(String),
}

/// Failures of the relay controller on a single inbound message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("message text is empty")]
    EmptyMessage,

    #[error("message codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Fatal startup and runtime failures of the server binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
