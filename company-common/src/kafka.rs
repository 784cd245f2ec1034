use std::sync::{Arc, Weak};

use envconfig::Envconfig;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use tracing::warn;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    #[envconfig(from = "KAFKA_BROKER")]
    pub kafka_hosts: String,

    #[envconfig(from = "KAFKA_TLS", default = "false")]
    pub kafka_tls: bool,

    #[envconfig(from = "KAFKA_VERIFY_SSL_CERTIFICATE", default = "false")]
    pub verify_ssl_certificate: bool,
}

#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    #[envconfig(from = "KAFKA_TOPIC")]
    pub kafka_consumer_topic: String,

    #[envconfig(from = "KAFKA_GROUP_ID")]
    pub kafka_consumer_group: String,

    // Where a group with no committed offsets starts: earliest replays the topic
    #[envconfig(from = "KAFKA_OFFSET_RESET", default = "earliest")]
    pub kafka_consumer_offset_reset: String,
}

/// A consumer subscribed to a single topic.
///
/// Offsets are committed in the background, but only offsets explicitly
/// stored through [`Offset::store`] are eligible, so a message is never
/// committed before the caller is done with it.
#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Received empty payload at partition {partition} offset {offset}")]
    Empty { partition: i32, offset: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Consumer gone")]
    Gone,
}

impl SingleTopicConsumer {
    pub fn new(kafka: &KafkaConfig, consumer: &ConsumerConfig) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &kafka.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", &consumer.kafka_consumer_group)
            .set("auto.offset.reset", &consumer.kafka_consumer_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false");

        if kafka.kafka_tls {
            client_config.set("security.protocol", "ssl").set(
                "enable.ssl.certificate.verification",
                kafka.verify_ssl_certificate.to_string(),
            );
        };

        let stream_consumer: StreamConsumer = client_config.create()?;
        stream_consumer.subscribe(&[consumer.kafka_consumer_topic.as_str()])?;

        Ok(Self {
            inner: Arc::new(Inner {
                consumer: stream_consumer,
                topic: consumer.kafka_consumer_topic.clone(),
            }),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Wait for the next message and return a copy of its payload.
    pub async fn recv(&self) -> Result<(Vec<u8>, Offset), RecvErr> {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            let (partition, at) = (offset.partition, offset.offset);
            // Nothing to process, so nothing to wait for before storing
            if let Err(e) = offset.store() {
                warn!(partition, offset = at, "failed to store offset of empty message: {e}");
            }
            return Err(RecvErr::Empty {
                partition,
                offset: at,
            });
        };

        Ok((payload.to_vec(), offset))
    }
}

#[derive(Debug)]
pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
