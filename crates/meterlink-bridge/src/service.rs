//! Role runners
//!
//! One role per process: the runner for the configured role builds that
//! role's components exclusively — the other role's components are never
//! constructed — and runs them to completion.

use tracing::info;

use meterlink_core::{Config, MeterlinkError, Result};

use crate::backup::BackupWriter;
use crate::meter;
use crate::mqtt::{MqttBroker, MqttSink};
use crate::publisher::PublisherBridge;
use crate::subscriber::SubscriberBridge;
use crate::supervisor::ConnectionSupervisor;

/// Run the publisher role: meter bridge -> MQTT
///
/// Returns when the meter stream ends; the error is fatal for the
/// process. Dial and broker-connect failures are startup-fatal.
pub async fn run_publisher(config: &Config) -> Result<()> {
    let reader = meter::connect(&config.bridge).await?;
    let sink = MqttSink::connect(&config.mqtt).await?;
    info!("running as publisher: meter bridge -> MQTT");

    let mut bridge = PublisherBridge::new(sink, &config.mqtt);
    let result = bridge.run(reader).await;

    let stats = bridge.stats();
    info!(
        published = stats.telegrams_published,
        failures = stats.publish_failures,
        discarded = stats.partial_discards,
        "publisher stopped"
    );
    result
}

/// Run the subscriber role: MQTT -> dated backup files
///
/// Blocks for the remaining lifetime of the process once the initial
/// connection succeeds; the supervisor rides out broker outages
/// indefinitely.
pub async fn run_subscriber(config: &Config) -> Result<()> {
    if config.backup.path.is_empty() {
        return Err(MeterlinkError::MissingBackupPath);
    }

    let writer = BackupWriter::new(&config.backup.path);
    let bridge = SubscriberBridge::new(writer);
    let broker = MqttBroker::connect(&config.mqtt)?;
    info!(path = %config.backup.path, "running as subscriber: MQTT -> file backup");

    let mut supervisor =
        ConnectionSupervisor::new(broker, config.mqtt.topic.clone(), config.mqtt.qos, bridge);
    supervisor.run().await
}
