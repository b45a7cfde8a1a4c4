//! rumqttc wiring for both roles
//!
//! The publisher side wraps the client in [`MqttSink`]: the event loop
//! runs on a driver task that forwards acknowledgment events over a
//! channel, and `publish` blocks until the matching acknowledgment
//! arrives (the synchronous per-telegram loop). The subscriber side
//! wraps the client in [`MqttBroker`], which surfaces the event loop as
//! [`BrokerEvent`]s for the connection supervisor.
//!
//! For both roles the first connection attempt failing is startup-fatal;
//! after a session has been established once, connection loss is ridden
//! out by re-polling the event loop, which reconnects on its own.

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use meterlink_core::{MeterlinkError, MqttConfig, QosLevel, Result};

use crate::sink::PublishSink;
use crate::supervisor::{BrokerConnection, BrokerEvent, RECONNECT_DELAY};

/// Event-loop request queue capacity
const CLIENT_QUEUE_CAPACITY: usize = 16;

/// Map the configured QoS onto the client's level
pub fn to_qos(level: QosLevel) -> rumqttc::QoS {
    match level {
        QosLevel::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QosLevel::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Build client options from the broker config
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions> {
    let (host, port) = config.broker_addr()?;
    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keep_alive);
    Ok(options)
}

/// Wait for the initial CONNACK
///
/// The first poll error before any session was established is the
/// startup-fatal "could not connect to the broker" condition.
async fn await_session(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(MeterlinkError::BrokerConnect(e.to_string())),
        }
    }
}

/// Publisher-side sink over the MQTT client
///
/// One publish is in flight at a time; `publish` waits for the
/// acknowledgment matching the configured QoS (`PUBACK` for QoS 1,
/// `PUBCOMP` for QoS 2, the outgoing wire write for QoS 0) bounded by
/// the configured `ack_timeout`.
#[derive(Debug)]
pub struct MqttSink {
    client: AsyncClient,
    ack_rx: mpsc::Receiver<()>,
    ack_timeout: std::time::Duration,
}

impl MqttSink {
    /// Connect to the broker and start the event-loop driver
    pub async fn connect(config: &MqttConfig) -> Result<Self> {
        let options = mqtt_options(config)?;
        let (client, mut eventloop) = AsyncClient::new(options, CLIENT_QUEUE_CAPACITY);

        await_session(&mut eventloop).await?;
        info!(broker = %config.broker, client_id = %config.client_id, "connected to MQTT broker");

        let (ack_tx, ack_rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let qos = config.qos;
        tokio::spawn(drive_publisher_events(eventloop, ack_tx, qos));

        Ok(Self {
            client,
            ack_rx,
            ack_timeout: config.ack_timeout,
        })
    }
}

/// Keep the publisher's event loop turning
///
/// Forwards one unit per settled publish and keeps polling across
/// connection loss so keep-alive and reconnect keep working between
/// telegrams.
async fn drive_publisher_events(
    mut eventloop: EventLoop,
    ack_tx: mpsc::Sender<()>,
    qos: QosLevel,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::PubAck(_))) | Ok(Event::Incoming(Packet::PubComp(_))) => {
                if ack_tx.send(()).await.is_err() {
                    return;
                }
            }
            Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                // QoS 0 has no broker acknowledgment; the wire write is
                // as settled as it gets.
                if qos == QosLevel::AtMostOnce && ack_tx.send(()).await.is_err() {
                    return;
                }
            }
            Ok(event) => debug!(?event, "MQTT event"),
            Err(e) => {
                warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl PublishSink for MqttSink {
    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QosLevel,
        retain: bool,
    ) -> Result<()> {
        // Acknowledgments from a timed-out earlier publish would be
        // mistaken for this one's; drop anything stale first.
        while self.ack_rx.try_recv().is_ok() {}

        self.client
            .publish(topic, to_qos(qos), retain, payload.to_vec())
            .await
            .map_err(|e| MeterlinkError::Publish(e.to_string()))?;

        match tokio::time::timeout(self.ack_timeout, self.ack_rx.recv()).await {
            Ok(Some(())) => Ok(()),
            Ok(None) => Err(MeterlinkError::ChannelClosed),
            Err(_) => Err(MeterlinkError::AckTimeout {
                duration_ms: self.ack_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Subscriber-side connection over the MQTT event loop
pub struct MqttBroker {
    client: AsyncClient,
    eventloop: EventLoop,
    session_established: bool,
}

impl MqttBroker {
    /// Create the client; the supervisor drives the actual connect
    ///
    /// The first event the supervisor sees is either `Connected` or, if
    /// the initial dial fails, a startup-fatal error from `next_event`.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let options = mqtt_options(config)?;
        let (client, eventloop) = AsyncClient::new(options, CLIENT_QUEUE_CAPACITY);
        Ok(Self {
            client,
            eventloop,
            session_established: false,
        })
    }
}

#[async_trait]
impl BrokerConnection for MqttBroker {
    async fn next_event(&mut self) -> Result<BrokerEvent> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.session_established = true;
                    return Ok(BrokerEvent::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(BrokerEvent::Message(publish.payload));
                }
                Ok(event) => debug!(?event, "MQTT event"),
                Err(e) if !self.session_established => {
                    return Err(MeterlinkError::BrokerConnect(e.to_string()));
                }
                Err(e) => return Ok(BrokerEvent::Disconnected(e.to_string())),
            }
        }
    }

    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<()> {
        self.client
            .subscribe(topic, to_qos(qos))
            .await
            .map_err(|e| MeterlinkError::Subscribe(e.to_string()))
    }
}
