//! Outbound analytics events.

use std::future::Future;

/// Publishing an event failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error("publish failed: {0}")]
    Failed(String),
}

/// Sink for analytics events (`move_played`, `game_finished`).
///
/// Delivery is best effort: the dispatch task logs failures and moves on.
pub trait EventPublisher: Send + Sync + 'static {
    fn publish(
        &self,
        event: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// An [`EventPublisher`] that writes each event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    async fn publish(
        &self,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        tracing::info!(event, %payload, "analytics event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_publisher_always_succeeds() {
        let result = TracingPublisher
            .publish("move_played", serde_json::json!({"gameId": "g1"}))
            .await;
        assert!(result.is_ok());
    }
}
