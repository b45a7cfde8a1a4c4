//! PublisherBridge - meter stream to MQTT
//!
//! Reads the meter-bridge connection line by line, frames telegrams,
//! and publishes each completed telegram to the configured topic. The
//! loop is deliberately synchronous per telegram: it waits for each
//! publish acknowledgment before reading further lines, so telegrams
//! reach the broker in the order they were framed and a slow broker
//! back-pressures the device through the TCP receive buffer.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use meterlink_core::{FramerState, MeterlinkError, MqttConfig, QosLevel, Result, TelegramFramer};

use crate::sink::PublishSink;

/// Counters for one publisher run
#[derive(Debug, Clone, Default)]
pub struct PublisherStats {
    /// Lines read from the meter stream
    pub lines_read: u64,
    /// Telegrams published and acknowledged
    pub telegrams_published: u64,
    /// Telegrams dropped on publish failure or acknowledgment timeout
    pub publish_failures: u64,
    /// Partial telegrams discarded by a restart marker
    pub partial_discards: u64,
}

/// Bridge from the meter line stream to a publish sink
pub struct PublisherBridge<S> {
    sink: S,
    topic: String,
    qos: QosLevel,
    retain: bool,
    framer: TelegramFramer,
    stats: PublisherStats,
}

impl<S: PublishSink> PublisherBridge<S> {
    /// Create a bridge publishing to the configured topic
    pub fn new(sink: S, config: &MqttConfig) -> Self {
        Self {
            sink,
            topic: config.topic.clone(),
            qos: config.qos,
            retain: config.retain,
            framer: TelegramFramer::new(),
            stats: PublisherStats::default(),
        }
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &PublisherStats {
        &self.stats
    }

    /// Access the underlying sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until the stream ends
    ///
    /// Terminates only on a stream error ([`MeterlinkError::StreamRead`])
    /// or EOF ([`MeterlinkError::StreamClosed`]); both are fatal for this
    /// connection. A publish failure drops that one telegram and the
    /// loop keeps reading.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, mut reader: R) -> Result<()> {
        let mut buf = String::new();

        loop {
            buf.clear();
            let n = reader
                .read_line(&mut buf)
                .await
                .map_err(|e| MeterlinkError::StreamRead(e.to_string()))?;
            if n == 0 {
                info!(
                    lines = self.stats.lines_read,
                    published = self.stats.telegrams_published,
                    "meter stream closed"
                );
                return Err(MeterlinkError::StreamClosed);
            }
            self.stats.lines_read += 1;

            let line = buf.strip_suffix('\n').unwrap_or(&buf);
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.starts_with(meterlink_core::START_MARKER)
                && self.framer.state() == FramerState::Accumulating
            {
                debug!(
                    buffered = self.framer.buffered_len(),
                    "restart marker, discarding partial telegram"
                );
                self.stats.partial_discards += 1;
            }

            if let Some(telegram) = self.framer.feed(line) {
                let size = telegram.len();
                match self
                    .sink
                    .publish(&self.topic, telegram.into_bytes(), self.qos, self.retain)
                    .await
                {
                    Ok(()) => {
                        self.stats.telegrams_published += 1;
                        debug!(topic = %self.topic, size, "published telegram");
                    }
                    Err(e) => {
                        // At-most-once: the telegram is dropped, the next
                        // one is attempted independently.
                        self.stats.publish_failures += 1;
                        warn!(error = %e, topic = %self.topic, "publish failed, telegram dropped");
                    }
                }
            }
        }
    }
}
