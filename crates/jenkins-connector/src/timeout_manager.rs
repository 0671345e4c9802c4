//! Per-attempt timeouts and caller deadlines.

use crate::retry_manager::FailureClass;
use reqwest::ClientBuilder;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Why a single attempt failed before producing a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    TimedOut { after: Duration },
    Transport { message: String, class: FailureClass },
}

impl AttemptError {
    pub fn class(&self) -> FailureClass {
        match self {
            AttemptError::TimedOut { .. } => FailureClass::Transient,
            AttemptError::Transport { class, .. } => *class,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutManager {
    per_attempt: Duration,
}

impl TimeoutManager {
    pub fn new(per_attempt: Duration) -> Self {
        Self { per_attempt }
    }

    pub fn per_attempt(&self) -> Duration {
        self.per_attempt
    }

    /// Connection establishment is bounded by the attempt timeout too. The
    /// overall request timeout is applied per attempt, not on the shared client.
    pub fn apply_to_client_builder(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.connect_timeout(self.per_attempt)
    }

    /// Timeout for the next attempt: the configured bound, shortened to what is
    /// left before `deadline`. `None` when the deadline has already passed.
    pub fn attempt_timeout(&self, deadline: Option<Instant>) -> Option<Duration> {
        match deadline {
            None => Some(self.per_attempt),
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    None
                } else {
                    Some(remaining.min(self.per_attempt))
                }
            }
        }
    }

    /// Run one attempt under `limit`, translating `reqwest` failures.
    ///
    /// When the limit elapses the future is dropped, which aborts the in-flight
    /// request; nothing partial is returned.
    pub async fn run<F, T>(&self, limit: Duration, operation: F) -> Result<T, AttemptError>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        match timeout(limit, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_timeout() => Err(AttemptError::TimedOut { after: limit }),
            Ok(Err(err)) => Err(AttemptError::Transport {
                message: describe_transport_error(&err),
                class: classify_transport_error(&err),
            }),
            Err(_) => Err(AttemptError::TimedOut { after: limit }),
        }
    }
}

/// Connection setup, resets mid-request and truncated bodies may succeed on a
/// second try. Redirect loops, undecodable bodies and builder errors will not.
fn classify_transport_error(err: &reqwest::Error) -> FailureClass {
    if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    let kind = if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else if err.is_request() {
        "request failed"
    } else {
        "transport error"
    };
    // Walk the source chain for the root cause (DNS, refused, reset...).
    let mut cause = String::new();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        cause = inner.to_string();
        source = inner.source();
    }
    if cause.is_empty() {
        kind.to_string()
    } else {
        format!("{}: {}", kind, cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_timeout_without_deadline() {
        let manager = TimeoutManager::new(Duration::from_secs(5));
        assert_eq!(manager.attempt_timeout(None), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn attempt_timeout_shrinks_to_deadline() {
        let manager = TimeoutManager::new(Duration::from_secs(5));
        let deadline = Instant::now() + Duration::from_millis(200);
        let limit = manager.attempt_timeout(Some(deadline)).unwrap();
        assert!(limit <= Duration::from_millis(200));

        let far = Instant::now() + Duration::from_secs(60);
        assert_eq!(manager.attempt_timeout(Some(far)), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn expired_deadline_yields_none() {
        let manager = TimeoutManager::new(Duration::from_secs(5));
        let past = Instant::now() - Duration::from_millis(1);
        assert_eq!(manager.attempt_timeout(Some(past)), None);
    }

    #[test]
    fn timeouts_are_transient() {
        let timed_out = AttemptError::TimedOut {
            after: Duration::from_millis(5),
        };
        assert_eq!(timed_out.class(), FailureClass::Transient);

        let redirect = AttemptError::Transport {
            message: "too many redirects".into(),
            class: FailureClass::Permanent,
        };
        assert_eq!(redirect.class(), FailureClass::Permanent);
    }

    #[tokio::test]
    async fn refused_connections_are_transient() {
        let manager = TimeoutManager::new(Duration::from_secs(2));
        let client = reqwest::Client::new();
        let err = manager
            .run(Duration::from_secs(2), client.get("http://127.0.0.1:1/").send())
            .await
            .unwrap_err();
        assert_eq!(err.class(), FailureClass::Transient);
    }

    #[tokio::test]
    async fn slow_operation_times_out() {
        let manager = TimeoutManager::new(Duration::from_millis(20));
        let result: Result<(), AttemptError> = manager
            .run(Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(
            result,
            Err(AttemptError::TimedOut {
                after: Duration::from_millis(20)
            })
        );
    }
}
