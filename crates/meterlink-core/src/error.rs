//! Error types for meterlink operations
//!
//! One error enum covers both roles. The variants map onto the failure
//! taxonomy the bridges rely on: fatal-startup and fatal-runtime errors
//! escape the run loops, everything else is absorbed and logged at the
//! point of occurrence.

use thiserror::Error;

/// Main error type for meterlink operations
#[derive(Error, Debug)]
pub enum MeterlinkError {
    // ===== Configuration Errors =====
    /// Config file could not be read
    #[error("failed to read config file {path}: {reason}")]
    ConfigRead {
        /// Config file path
        path: String,
        /// Failure reason
        reason: String,
    },

    /// Config file could not be parsed
    #[error("failed to parse config file: {0}")]
    ConfigParse(String),

    /// Subscriber role without a backup path
    #[error("backup.path is required when role is 'subscriber'")]
    MissingBackupPath,

    /// QoS outside 0..=2
    #[error("invalid QoS level: {0} (must be 0, 1, or 2)")]
    InvalidQos(u8),

    /// Broker URI not of the form tcp://host[:port]
    #[error("invalid broker URI '{0}' (expected tcp://host[:port])")]
    InvalidBrokerUri(String),

    // ===== Meter Bridge Errors =====
    /// Initial TCP dial to the meter bridge failed
    #[error("failed to connect to meter bridge at {addr}: {reason}")]
    MeterConnect {
        /// Bridge address (host:port)
        addr: String,
        /// Failure reason
        reason: String,
    },

    /// Read error on the meter stream
    #[error("error reading from meter bridge: {0}")]
    StreamRead(String),

    /// Meter stream reached EOF
    #[error("meter bridge stream closed")]
    StreamClosed,

    // ===== Broker Errors =====
    /// Initial MQTT connect failed
    #[error("failed to connect to MQTT broker: {0}")]
    BrokerConnect(String),

    /// Publish could not be issued
    #[error("publish failed: {0}")]
    Publish(String),

    /// Publish acknowledgment did not arrive in time
    #[error("publish acknowledgment timed out after {duration_ms}ms")]
    AckTimeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Subscribe could not be issued
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Internal event channel closed
    #[error("broker event channel closed")]
    ChannelClosed,

    // ===== Backup Errors =====
    /// Dated directory could not be created
    #[error("failed to create backup directory {path}: {source}")]
    DirectoryCreate {
        /// Directory path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Backup file could not be opened
    #[error("failed to open backup file {path}: {source}")]
    FileOpen {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Append to the backup file failed
    #[error("failed to write backup file {path}: {source}")]
    FileWrite {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl MeterlinkError {
    /// Check whether this error terminates the process
    ///
    /// Per-item failures (a single publish or backup write) are absorbed
    /// by the bridges; everything else escapes the run loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MeterlinkError::Publish(_)
                | MeterlinkError::AckTimeout { .. }
                | MeterlinkError::Subscribe(_)
                | MeterlinkError::DirectoryCreate { .. }
                | MeterlinkError::FileOpen { .. }
                | MeterlinkError::FileWrite { .. }
        )
    }

    /// Get an error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            MeterlinkError::ConfigRead { .. } => "CONFIG_READ",
            MeterlinkError::ConfigParse(_) => "CONFIG_PARSE",
            MeterlinkError::MissingBackupPath => "MISSING_BACKUP_PATH",
            MeterlinkError::InvalidQos(_) => "INVALID_QOS",
            MeterlinkError::InvalidBrokerUri(_) => "INVALID_BROKER_URI",
            MeterlinkError::MeterConnect { .. } => "METER_CONNECT",
            MeterlinkError::StreamRead(_) => "STREAM_READ",
            MeterlinkError::StreamClosed => "STREAM_CLOSED",
            MeterlinkError::BrokerConnect(_) => "BROKER_CONNECT",
            MeterlinkError::Publish(_) => "PUBLISH",
            MeterlinkError::AckTimeout { .. } => "ACK_TIMEOUT",
            MeterlinkError::Subscribe(_) => "SUBSCRIBE",
            MeterlinkError::ChannelClosed => "CHANNEL_CLOSED",
            MeterlinkError::DirectoryCreate { .. } => "DIRECTORY_CREATE",
            MeterlinkError::FileOpen { .. } => "FILE_OPEN",
            MeterlinkError::FileWrite { .. } => "FILE_WRITE",
        }
    }
}

/// Result type alias for meterlink operations
pub type Result<T> = std::result::Result<T, MeterlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = MeterlinkError::StreamClosed;
        assert_eq!(err.error_code(), "STREAM_CLOSED");

        let err = MeterlinkError::InvalidQos(3);
        assert_eq!(err.error_code(), "INVALID_QOS");
    }

    #[test]
    fn test_is_fatal() {
        assert!(MeterlinkError::StreamClosed.is_fatal());
        assert!(MeterlinkError::MissingBackupPath.is_fatal());
        assert!(MeterlinkError::BrokerConnect("refused".to_string()).is_fatal());

        assert!(!MeterlinkError::Publish("queue full".to_string()).is_fatal());
        assert!(!MeterlinkError::AckTimeout { duration_ms: 30000 }.is_fatal());
        assert!(!MeterlinkError::FileWrite {
            path: "/data/2024/03/07.log".to_string(),
            source: std::io::Error::other("disk full"),
        }
        .is_fatal());
    }

    #[test]
    fn test_ack_timeout_message() {
        let err = MeterlinkError::AckTimeout { duration_ms: 30000 };
        assert!(err.to_string().contains("30000"));
    }
}
