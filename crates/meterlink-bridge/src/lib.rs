//! Bridges between the smart-meter stream, MQTT, and disk backups
//!
//! This crate implements both process roles around the framing types in
//! `meterlink-core`:
//!
//! - **Publisher** — [`meter`] dials the meter-bridge device,
//!   [`PublisherBridge`] frames its line stream into telegrams and
//!   publishes each one through a [`PublishSink`], waiting for the
//!   acknowledgment before reading on.
//! - **Subscriber** — [`ConnectionSupervisor`] owns the broker
//!   connection (subscribe on every connect, reconnect forever) and
//!   hands each received payload to [`SubscriberBridge`], which appends
//!   it to the dated log hierarchy via [`BackupWriter`].
//!
//! The MQTT specifics live in [`mqtt`]; the bridges themselves are
//! generic over the [`PublishSink`] and [`BrokerConnection`] seams so
//! the protocol logic is testable without a broker.
//!
//! # Data flow
//!
//! ```text
//! publisher:   TCP bytes -> TelegramFramer -> PublishSink (MQTT topic)
//! subscriber:  MQTT topic -> SubscriberBridge -> {base}/{YYYY}/{MM}/{DD}.log
//! ```

#![warn(missing_docs)]

pub mod backup;
pub mod meter;
pub mod mqtt;
pub mod publisher;
pub mod service;
pub mod sink;
pub mod subscriber;
pub mod supervisor;

pub use backup::BackupWriter;
pub use mqtt::{MqttBroker, MqttSink};
pub use publisher::{PublisherBridge, PublisherStats};
pub use service::{run_publisher, run_subscriber};
pub use sink::PublishSink;
pub use subscriber::{SubscriberBridge, SubscriberStats};
pub use supervisor::{
    BrokerConnection, BrokerEvent, ConnectionSupervisor, SupervisorState, RECONNECT_DELAY,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
