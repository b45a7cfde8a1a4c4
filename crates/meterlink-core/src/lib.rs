//! Core types for the meterlink smart-meter MQTT bridge
//!
//! This crate carries the pieces shared by both process roles and by the
//! test suites: the telegram framing protocol, the configuration
//! document, and the error taxonomy. It performs no I/O of its own.
//!
//! # Telegram framing
//!
//! The meter-bridge device streams newline-delimited text. A telegram
//! begins with a line whose first character is `/` and ends with a line
//! whose first character is `!`, both inclusive; nothing else in the
//! stream is structurally meaningful. [`TelegramFramer`] segments the
//! line stream into [`Telegram`] values:
//!
//! ```rust
//! use meterlink_core::TelegramFramer;
//!
//! let mut framer = TelegramFramer::new();
//! assert!(framer.feed("/ISK5\\0003").is_none());
//! assert!(framer.feed("1-0:1.8.1(001234.567*kWh)").is_none());
//!
//! let telegram = framer.feed("!A1B2").expect("end marker completes the telegram");
//! assert_eq!(
//!     telegram.as_bytes(),
//!     b"/ISK5\\0003\n1-0:1.8.1(001234.567*kWh)\n!A1B2\n"
//! );
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod telegram;

pub use config::{BackupConfig, BridgeConfig, Config, MqttConfig, QosLevel, Role};
pub use error::{MeterlinkError, Result};
pub use telegram::{FramerState, Telegram, TelegramFramer, END_MARKER, START_MARKER};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
