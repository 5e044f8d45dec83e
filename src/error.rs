//! Error types for monitoring operations.

use thiserror::Error;

/// Failure talking to an external collaborator (schedule, tracking, routing).
///
/// Always transient from the engine's point of view: the next tick retries.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service}: request timed out")]
    Timeout { service: &'static str },

    #[error("{service}: transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service}: unexpected status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service}: could not decode response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service}: unknown {key}")]
    NotFound { service: &'static str, key: String },
}

impl UpstreamError {
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout { service }
        } else if err.is_decode() {
            UpstreamError::Decode {
                service,
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            UpstreamError::Status {
                service,
                status: status.as_u16(),
            }
        } else {
            UpstreamError::Transport {
                service,
                message: err.to_string(),
            }
        }
    }
}

/// Errors returned by a [`RouteEstimator`](crate::traits::RouteEstimator).
#[derive(Debug, Error)]
pub enum RouteError {
    /// The router answered, but there is no route between the points.
    #[error("no route found")]
    NoRoute,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Errors surfaced by the engine and the driver.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("no position available for device {device_id}")]
    NoPositionAvailable { device_id: String },

    #[error("no route found")]
    NoRouteFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl MonitorError {
    /// True for failures the next tick may resolve on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::Upstream(_))
    }
}

impl From<RouteError> for MonitorError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NoRoute => MonitorError::NoRouteFound,
            RouteError::Upstream(upstream) => MonitorError::Upstream(upstream),
        }
    }
}

/// Startup configuration faults. Never raised while ticking.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not build {component}: {message}")]
    Build {
        component: &'static str,
        message: String,
    },
}
