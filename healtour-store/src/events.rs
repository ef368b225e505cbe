use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error};
use healtour_core::events::EventPublisher;
use healtour_core::{CoreError, CoreResult};
use healtour_shared::models::events::DomainEvent;

use crate::app_config::KafkaConfig;

/// Publishes domain events to Kafka, one topic per event kind, keyed by
/// package so a package's events keep their order.
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic_prefix: String,
}

impl KafkaEventPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer, topic_prefix: config.topic_prefix.clone() })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        let topic = format!("{}{}", self.topic_prefix, event.topic());
        let key = event.key();
        let payload = serde_json::to_string(event)
            .map_err(|e| CoreError::Storage(format!("event encoding failed: {}", e)))?;

        let record = FutureRecord::to(&topic).key(&key).payload(&payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                debug!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(CoreError::Storage(e.to_string()))
            }
        }
    }
}
