use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Registry key of a monitored project
pub type TargetId = i64;

/// Persisted liveness status of a project
///
/// The monitor only ever writes the four well-known values. Anything else
/// found in the registry (e.g. `UNKNOWN` for a project that was never probed)
/// is carried through untouched as [`StatusValue::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusValue {
    Up,
    Down,
    InvalidUrl,
    NoLiveUrl,
    Other(String),
}

impl StatusValue {
    pub fn as_str(&self) -> &str {
        match self {
            StatusValue::Up => "UP",
            StatusValue::Down => "DOWN",
            StatusValue::InvalidUrl => "INVALID_URL",
            StatusValue::NoLiveUrl => "NO_LIVE_URL",
            StatusValue::Other(raw) => raw,
        }
    }
}

impl From<&str> for StatusValue {
    fn from(raw: &str) -> Self {
        match raw {
            "UP" => StatusValue::Up,
            "DOWN" => StatusValue::Down,
            "INVALID_URL" => StatusValue::InvalidUrl,
            "NO_LIVE_URL" => StatusValue::NoLiveUrl,
            other => StatusValue::Other(other.to_string()),
        }
    }
}

impl From<String> for StatusValue {
    fn from(raw: String) -> Self {
        StatusValue::from(raw.as_str())
    }
}

impl From<StatusValue> for String {
    fn from(status: StatusValue) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitored project, as seen by the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,

    /// Only used for diagnostics
    pub name: String,

    /// Advertised deployment address, if any
    pub live_url: Option<String>,

    /// Status as it was when the snapshot was taken
    pub status: StatusValue,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>, live_url: Option<&str>, status: StatusValue) -> Self {
        Self { id, name: name.into(), live_url: live_url.map(str::to_string), status }
    }
}

/// Why a request never produced an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Timeout,
    Connect,
    Redirect,
    Request,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connect => write!(f, "connect"),
            FailureKind::Redirect => write!(f, "redirect"),
            FailureKind::Request => write!(f, "request"),
        }
    }
}

/// Network-level failure of a probe
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("no response within {}ms", after.as_millis()))
    }
}

/// Classified result of probing one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The target has no live URL
    NoUrl,
    /// The live URL is not a checkable absolute URL
    InvalidUrl,
    /// The request completed with this HTTP status
    Reachable(u16),
    /// The request never completed
    Unreachable(ProbeFailure),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NoUrl => write!(f, "no live url"),
            Outcome::InvalidUrl => write!(f, "invalid url"),
            Outcome::Reachable(code) => write!(f, "reachable ({code})"),
            Outcome::Unreachable(failure) => write!(f, "unreachable ({failure})"),
        }
    }
}
