use async_trait::async_trait;
use healtour_shared::models::events::DomainEvent;

use crate::CoreResult;

/// Outbound channel for domain events. Publishing is best-effort: callers
/// log a failure and carry on, the triggering write is never rolled back.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()>;
}

/// Writes events to the log. Used when no broker is configured, and stands
/// in for notification delivery.
#[derive(Debug, Default, Clone)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        tracing::info!(topic = event.topic(), key = %event.key(), "domain event: {:?}", event);
        Ok(())
    }
}
