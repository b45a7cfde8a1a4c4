//! SubscriberBridge - MQTT to dated backup files
//!
//! The subscriber side's per-message handler. It holds no connection
//! state; [`crate::supervisor::ConnectionSupervisor`] owns the broker
//! lifecycle and hands every received payload to [`SubscriberBridge::on_message`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backup::BackupWriter;

/// Counters shared across concurrent message deliveries
#[derive(Debug, Default)]
pub struct SubscriberStats {
    /// Telegrams appended to a backup file
    pub telegrams_saved: AtomicU64,
    /// Telegrams lost to a backup write failure
    pub save_failures: AtomicU64,
}

/// Per-message handler persisting telegrams to disk
///
/// Cloneable so the supervisor can dispatch deliveries concurrently;
/// clones share the same counters, and the writer performs one
/// exclusive append per call.
#[derive(Debug, Clone)]
pub struct SubscriberBridge {
    writer: BackupWriter,
    stats: Arc<SubscriberStats>,
}

impl SubscriberBridge {
    /// Create a bridge appending through the given writer
    pub fn new(writer: BackupWriter) -> Self {
        Self {
            writer,
            stats: Arc::new(SubscriberStats::default()),
        }
    }

    /// Shared counters
    pub fn stats(&self) -> &SubscriberStats {
        &self.stats
    }

    /// Persist one received payload
    ///
    /// A write failure is logged and absorbed: the message is lost for
    /// backup purposes, nothing is retried and nothing propagates.
    pub fn on_message(&self, payload: &[u8]) {
        match self.writer.write(payload) {
            Ok(path) => {
                self.stats.telegrams_saved.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), bytes = payload.len(), "saved telegram");
            }
            Err(e) => {
                self.stats.save_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, code = e.error_code(), "failed to save telegram");
            }
        }
    }
}
