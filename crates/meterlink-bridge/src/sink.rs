//! Publish sink seam for the publisher bridge
//!
//! The publisher bridge is generic over this trait so the framing loop
//! can be exercised without a broker.

use async_trait::async_trait;
use bytes::Bytes;

use meterlink_core::{QosLevel, Result};

/// Destination for completed telegrams
///
/// `publish` returns once the broker has acknowledged the message at
/// the requested QoS level (for QoS 0, once it has been written to the
/// wire). The publisher bridge issues at most one publish at a time and
/// waits for each to settle before reading further lines.
#[async_trait]
pub trait PublishSink: Send {
    /// Publish one telegram payload and wait for its acknowledgment
    async fn publish(
        &mut self,
        topic: &str,
        payload: Bytes,
        qos: QosLevel,
        retain: bool,
    ) -> Result<()>;
}
