use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

use super::types::{FailureKind, ProbeFailure};
use crate::error::MonitorError;

/// Transport used by the prober to issue a single GET
///
/// Any HTTP response, including 4xx and 5xx, is `Ok(status)`. Only failures
/// that never produced a response are `Err`.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, url: &Url) -> Result<u16, ProbeFailure>;
}

/// reqwest-backed checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, url: &Url) -> Result<u16, ProbeFailure> {
        let response = self.client.get(url.clone()).send().await.map_err(ProbeFailure::from)?;

        Ok(response.status().as_u16())
    }
}

impl From<reqwest::Error> for ProbeFailure {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_connect() {
            FailureKind::Connect
        } else if error.is_redirect() {
            FailureKind::Redirect
        } else {
            FailureKind::Request
        };

        ProbeFailure::new(kind, error_chain(&error))
    }
}

/// reqwest's top-level message rarely says what went wrong; the cause is in
/// the source chain.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
