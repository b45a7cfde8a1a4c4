//! ConnectionSupervisor - subscriber-side broker lifecycle
//!
//! The supervisor owns the subscriber's connection to the broker for the
//! lifetime of the process: it re-issues the topic subscription on every
//! transition into `Connected` (first connect and every reconnect) and
//! rides out connection loss indefinitely. It is generic over
//! [`BrokerConnection`] so the state machine can be exercised against a
//! scripted fake instead of a live broker.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{info, warn};

use meterlink_core::{QosLevel, Result};

use crate::subscriber::SubscriberBridge;

/// Delay before re-polling a lost connection
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Supervisor state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorState {
    /// No connection to the broker
    #[default]
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Session established, subscription issued
    Connected,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Disconnected => write!(f, "disconnected"),
            SupervisorState::Connecting => write!(f, "connecting"),
            SupervisorState::Connected => write!(f, "connected"),
        }
    }
}

/// Connection-lifecycle events surfaced by a broker connection
#[derive(Debug)]
pub enum BrokerEvent {
    /// Session established (first connect or reconnect)
    Connected,
    /// A message arrived on the subscribed topic
    Message(Bytes),
    /// Connection lost; the client will retry
    Disconnected(String),
}

/// Seam over the broker client's connection
///
/// The real implementation wraps the MQTT event loop; tests feed
/// scripted events. `next_event` returning an error is terminal for the
/// supervisor (an initial connect failure, or the connection object
/// going away), while connection loss after a successful connect is an
/// ordinary [`BrokerEvent::Disconnected`].
#[async_trait]
pub trait BrokerConnection: Send {
    /// Wait for the next connection-lifecycle event
    async fn next_event(&mut self) -> Result<BrokerEvent>;

    /// Issue the topic subscription
    async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> Result<()>;
}

/// Maintains the subscriber's broker connection indefinitely
pub struct ConnectionSupervisor<C> {
    conn: C,
    topic: String,
    qos: QosLevel,
    bridge: SubscriberBridge,
    reconnect_delay: Duration,
    state: SupervisorState,
}

impl<C: BrokerConnection> ConnectionSupervisor<C> {
    /// Create a supervisor for the given connection and handler
    pub fn new(conn: C, topic: impl Into<String>, qos: QosLevel, bridge: SubscriberBridge) -> Self {
        Self {
            conn,
            topic: topic.into(),
            qos,
            bridge,
            reconnect_delay: RECONNECT_DELAY,
            state: SupervisorState::Disconnected,
        }
    }

    /// Override the reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Current state
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Access the underlying connection
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Run for the remaining lifetime of the subscriber role
    ///
    /// Returns only when the connection reports a terminal error; under
    /// normal operation the loop blocks here until the process is
    /// externally stopped.
    pub async fn run(&mut self) -> Result<()> {
        self.state = SupervisorState::Connecting;
        loop {
            self.step().await?;
        }
    }

    /// Process one connection event
    async fn step(&mut self) -> Result<()> {
        match self.conn.next_event().await? {
            BrokerEvent::Connected => {
                self.state = SupervisorState::Connected;
                info!(topic = %self.topic, "connected to MQTT broker");

                // Re-subscribe on every connect; a failure here is logged
                // and does not force a disconnect, but no messages will
                // arrive until a later reconnect subscribes successfully.
                match self.conn.subscribe(&self.topic, self.qos).await {
                    Ok(()) => info!(topic = %self.topic, "subscribed"),
                    Err(e) => warn!(error = %e, topic = %self.topic, "subscribe failed"),
                }
            }
            BrokerEvent::Message(payload) => {
                let bridge = self.bridge.clone();
                // The broker client may deliver further messages while
                // this write is in flight; the writer's per-call append
                // keeps records intact.
                tokio::task::spawn_blocking(move || bridge.on_message(&payload));
            }
            BrokerEvent::Disconnected(reason) => {
                self.state = SupervisorState::Disconnected;
                warn!(%reason, "MQTT connection lost, will reconnect");
                tokio::time::sleep(self.reconnect_delay).await;
                self.state = SupervisorState::Connecting;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupWriter;
    use meterlink_core::MeterlinkError;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Scripted connection; `next_event` errors once the script runs out
    struct ScriptedConnection {
        events: VecDeque<BrokerEvent>,
        subscriptions: Vec<(String, QosLevel)>,
        fail_subscribes: u32,
    }

    impl ScriptedConnection {
        fn new(events: Vec<BrokerEvent>) -> Self {
            Self {
                events: events.into(),
                subscriptions: Vec::new(),
                fail_subscribes: 0,
            }
        }
    }

    #[async_trait]
    impl BrokerConnection for ScriptedConnection {
        async fn next_event(&mut self) -> meterlink_core::Result<BrokerEvent> {
            self.events.pop_front().ok_or(MeterlinkError::ChannelClosed)
        }

        async fn subscribe(&mut self, topic: &str, qos: QosLevel) -> meterlink_core::Result<()> {
            if self.fail_subscribes > 0 {
                self.fail_subscribes -= 1;
                return Err(MeterlinkError::Subscribe("broker rejected".to_string()));
            }
            self.subscriptions.push((topic.to_string(), qos));
            Ok(())
        }
    }

    fn test_bridge(dir: &TempDir) -> SubscriberBridge {
        SubscriberBridge::new(BackupWriter::new(dir.path()))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resubscribes_on_every_connect() {
        let dir = TempDir::new().unwrap();
        let conn = ScriptedConnection::new(vec![
            BrokerEvent::Connected,
            BrokerEvent::Disconnected("broker restart".to_string()),
            BrokerEvent::Connected,
        ]);
        let mut supervisor =
            ConnectionSupervisor::new(conn, "meter/telegrams", QosLevel::AtLeastOnce, test_bridge(&dir))
                .with_reconnect_delay(Duration::from_millis(1));

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, MeterlinkError::ChannelClosed));

        let subs = &supervisor.conn.subscriptions;
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0], ("meter/telegrams".to_string(), QosLevel::AtLeastOnce));
        assert_eq!(subs[1], subs[0]);
        assert_eq!(supervisor.state(), SupervisorState::Connected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subscribe_failure_does_not_disconnect() {
        let dir = TempDir::new().unwrap();
        let mut conn = ScriptedConnection::new(vec![
            BrokerEvent::Connected,
            BrokerEvent::Message(Bytes::from_static(b"/header\n!A1B2\n")),
        ]);
        conn.fail_subscribes = 1;
        let mut supervisor =
            ConnectionSupervisor::new(conn, "meter/telegrams", QosLevel::AtMostOnce, test_bridge(&dir));

        let _ = supervisor.run().await;
        assert_eq!(supervisor.state(), SupervisorState::Connected);
        assert!(supervisor.conn.subscriptions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_messages_reach_backup_files() {
        let dir = TempDir::new().unwrap();
        let bridge = test_bridge(&dir);
        let conn = ScriptedConnection::new(vec![
            BrokerEvent::Connected,
            BrokerEvent::Message(Bytes::from_static(b"/a\n!1\n")),
            BrokerEvent::Message(Bytes::from_static(b"/b\n!2\n")),
        ]);
        let mut supervisor = ConnectionSupervisor::new(
            conn,
            "meter/telegrams",
            QosLevel::AtLeastOnce,
            bridge.clone(),
        );

        let _ = supervisor.run().await;

        // Writes run on the blocking pool; give them a moment to settle.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            bridge
                .stats()
                .telegrams_saved
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_disconnect_transitions_through_disconnected() {
        let dir = TempDir::new().unwrap();
        let conn = ScriptedConnection::new(vec![BrokerEvent::Connected, BrokerEvent::Disconnected(
            "io error".to_string(),
        )]);
        let mut supervisor =
            ConnectionSupervisor::new(conn, "t", QosLevel::AtMostOnce, test_bridge(&dir))
                .with_reconnect_delay(Duration::from_millis(1));

        let _ = supervisor.run().await;
        // The script ended while reconnecting.
        assert_eq!(supervisor.state(), SupervisorState::Connecting);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SupervisorState::Disconnected.to_string(), "disconnected");
        assert_eq!(SupervisorState::Connecting.to_string(), "connecting");
        assert_eq!(SupervisorState::Connected.to_string(), "connected");
    }
}
