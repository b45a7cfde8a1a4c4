//! Configuration types for the meterlink bridge
//!
//! The configuration is one YAML document selecting the process role and
//! describing the meter-bridge endpoint, the MQTT broker, and (for the
//! subscriber role) the backup base path.
//!
//! ```yaml
//! role: publisher
//! bridge:
//!   host: 192.168.1.50
//!   port: 2001
//! mqtt:
//!   broker: tcp://broker.lan:1883
//!   client_id: meterlink
//!   topic: meter/telegrams
//!   qos: 1
//!   retain: false
//! backup:
//!   path: /var/lib/meterlink
//! verbose: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MeterlinkError, Result};

/// Default MQTT broker port
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default meter-bridge TCP port (ser2net-style serial adapters)
pub const DEFAULT_BRIDGE_PORT: u16 = 2001;

/// Default MQTT keep-alive interval
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default bound on the publish acknowledgment wait
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Process role selected at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Forward telegrams from the meter bridge to the MQTT topic
    #[default]
    Publisher,
    /// Persist telegrams from the MQTT topic to dated backup files
    Subscriber,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Publisher => write!(f, "publisher"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// MQTT delivery guarantee level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    /// QoS 0, fire and forget
    AtMostOnce,
    /// QoS 1, acknowledged delivery
    AtLeastOnce,
    /// QoS 2, assured delivery
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = MeterlinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(MeterlinkError::InvalidQos(other)),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// Main configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Process role (default: publisher)
    #[serde(default)]
    pub role: Role,

    /// Meter-bridge TCP endpoint (publisher role)
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// MQTT broker settings
    pub mqtt: MqttConfig,

    /// Backup settings (subscriber role)
    #[serde(default)]
    pub backup: BackupConfig,

    /// Enable debug-level logging
    #[serde(default)]
    pub verbose: bool,
}

/// Meter-bridge TCP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge device host
    pub host: String,

    /// Bridge device port
    #[serde(default = "default_bridge_port")]
    pub port: u16,
}

fn default_bridge_port() -> u16 {
    DEFAULT_BRIDGE_PORT
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_BRIDGE_PORT,
        }
    }
}

impl BridgeConfig {
    /// Bridge address as host:port
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker URI, tcp://host[:port] or mqtt://host[:port]
    pub broker: String,

    /// Client identifier presented to the broker
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Topic telegrams are published to / consumed from
    pub topic: String,

    /// Delivery guarantee for publish and subscribe
    #[serde(default = "default_qos")]
    pub qos: QosLevel,

    /// Retain flag on published telegrams
    #[serde(default)]
    pub retain: bool,

    /// Keep-alive interval
    #[serde(with = "humantime_serde", default = "default_keep_alive")]
    pub keep_alive: Duration,

    /// Bound on the publish acknowledgment wait
    #[serde(with = "humantime_serde", default = "default_ack_timeout")]
    pub ack_timeout: Duration,
}

fn default_client_id() -> String {
    "meterlink".to_string()
}

fn default_qos() -> QosLevel {
    QosLevel::AtMostOnce
}

fn default_keep_alive() -> Duration {
    DEFAULT_KEEP_ALIVE
}

fn default_ack_timeout() -> Duration {
    DEFAULT_ACK_TIMEOUT
}

impl MqttConfig {
    /// Parse the broker URI into host and port
    ///
    /// Accepts `tcp://` and `mqtt://` schemes; the port defaults to 1883
    /// when the URI carries none.
    pub fn broker_addr(&self) -> Result<(String, u16)> {
        let rest = self
            .broker
            .strip_prefix("tcp://")
            .or_else(|| self.broker.strip_prefix("mqtt://"))
            .ok_or_else(|| MeterlinkError::InvalidBrokerUri(self.broker.clone()))?;

        if rest.is_empty() {
            return Err(MeterlinkError::InvalidBrokerUri(self.broker.clone()));
        }

        match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| MeterlinkError::InvalidBrokerUri(self.broker.clone()))?;
                Ok((host.to_string(), port))
            }
            None => Ok((rest.to_string(), DEFAULT_BROKER_PORT)),
        }
    }
}

/// Backup settings for the subscriber role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Base path of the dated log hierarchy
    #[serde(default)]
    pub path: String,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| MeterlinkError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Config =
            serde_yaml::from_str(&raw).map_err(|e| MeterlinkError::ConfigParse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    ///
    /// The subscriber role requires a non-empty backup path; the broker
    /// URI must parse. Both are startup-fatal.
    pub fn validate(&self) -> Result<()> {
        if self.role == Role::Subscriber && self.backup.path.is_empty() {
            return Err(MeterlinkError::MissingBackupPath);
        }

        self.mqtt.broker_addr()?;
        Ok(())
    }
}

// Custom serde module for Duration with humantime
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
