//! Telegram framing for the meter-bridge line stream
//!
//! A telegram is one complete meter reading report, delimited by a line
//! whose first character is `/` (start) and a line whose first character
//! is `!` (end), both inclusive. The framer turns an unbounded sequence
//! of text lines into discrete telegrams; everything between the markers
//! is opaque to it.

use bytes::{Bytes, BytesMut};

/// First character of a telegram's opening line
pub const START_MARKER: char = '/';

/// First character of a telegram's closing line
pub const END_MARKER: char = '!';

/// One complete meter reading report
///
/// The payload is the raw telegram text, newline-terminated lines from
/// the opening `/` line through the closing `!` line inclusive. Once a
/// telegram is handed to a sink the buffer behind it is not reused by
/// the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    payload: Bytes,
}

impl Telegram {
    /// Raw telegram bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the telegram, taking ownership of its bytes
    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Framer state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramerState {
    /// Waiting for a start-marker line; input is discarded
    #[default]
    Idle,
    /// Inside a telegram, buffering lines
    Accumulating,
}

impl std::fmt::Display for FramerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramerState::Idle => write!(f, "idle"),
            FramerState::Accumulating => write!(f, "accumulating"),
        }
    }
}

/// Stateful line accumulator producing complete telegrams
///
/// Lines seen while [`FramerState::Idle`] are discarded. A start-marker
/// line always begins a fresh telegram, discarding any partial buffer
/// (a truncated telegram is dropped, never emitted). An end-marker line
/// while accumulating emits the buffered telegram and returns to idle;
/// an end marker while idle is ignored, which is what a stream truncated
/// mid-telegram looks like on reconnect.
///
/// The buffer has no upper bound: a start marker that is never followed
/// by an end marker grows the buffer for the lifetime of the stream.
/// This is an accepted limitation, kept rather than capped.
#[derive(Debug, Default)]
pub struct TelegramFramer {
    state: FramerState,
    buffer: BytesMut,
}

impl TelegramFramer {
    /// Create a new framer in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current framer state
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes buffered for the telegram in progress
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one line (without its trailing newline)
    ///
    /// Returns a completed [`Telegram`] when and only when `line` is an
    /// end-marker line and the framer was accumulating.
    pub fn feed(&mut self, line: &str) -> Option<Telegram> {
        if line.starts_with(START_MARKER) {
            // A new start while accumulating discards the partial buffer.
            self.buffer.clear();
            self.state = FramerState::Accumulating;
        }

        if self.state == FramerState::Accumulating {
            self.buffer.extend_from_slice(line.as_bytes());
            self.buffer.extend_from_slice(b"\n");

            if line.starts_with(END_MARKER) {
                self.state = FramerState::Idle;
                let payload = self.buffer.split().freeze();
                return Some(Telegram { payload });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(framer: &mut TelegramFramer, lines: &[&str]) -> Vec<Telegram> {
        lines.iter().filter_map(|line| framer.feed(line)).collect()
    }

    #[test]
    fn test_initial_state_is_idle() {
        let framer = TelegramFramer::new();
        assert_eq!(framer.state(), FramerState::Idle);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_single_telegram() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(&mut framer, &["/header", "!checksum"]);

        assert_eq!(telegrams.len(), 1);
        assert_eq!(telegrams[0].as_bytes(), b"/header\n!checksum\n");
        assert_eq!(framer.state(), FramerState::Idle);
    }

    #[test]
    fn test_round_trip_meter_report() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(
            &mut framer,
            &["/ISK5\\0003", "1-0:1.8.1(001234.567*kWh)", "!A1B2"],
        );

        assert_eq!(telegrams.len(), 1);
        assert_eq!(
            telegrams[0].as_bytes(),
            b"/ISK5\\0003\n1-0:1.8.1(001234.567*kWh)\n!A1B2\n"
        );
    }

    #[test]
    fn test_end_marker_while_idle_is_ignored() {
        let mut framer = TelegramFramer::new();
        // A stream truncated mid-telegram begins with the tail of a report.
        let telegrams = feed_all(&mut framer, &["1-0:1.8.1(000001.000*kWh)", "!FFFF"]);

        assert!(telegrams.is_empty());
        assert_eq!(framer.state(), FramerState::Idle);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_no_emission_from_end_only_lines() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(&mut framer, &["!AAAA", "!BBBB", "!CCCC"]);
        assert!(telegrams.is_empty());
    }

    #[test]
    fn test_restart_discards_partial_buffer() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(
            &mut framer,
            &["/first", "1-0:1.8.1(000001.000*kWh)", "/second", "!E5D0"],
        );

        // Only the second start contributes to the emitted telegram.
        assert_eq!(telegrams.len(), 1);
        assert_eq!(telegrams[0].as_bytes(), b"/second\n!E5D0\n");
    }

    #[test]
    fn test_lines_while_idle_are_discarded() {
        let mut framer = TelegramFramer::new();
        assert!(framer.feed("garbage before the first report").is_none());
        assert_eq!(framer.buffered_len(), 0);

        let telegrams = feed_all(&mut framer, &["/header", "!0000"]);
        assert_eq!(telegrams.len(), 1);
        assert_eq!(telegrams[0].as_bytes(), b"/header\n!0000\n");
    }

    #[test]
    fn test_consecutive_telegrams() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(&mut framer, &["/a", "!1", "/b", "!2"]);

        assert_eq!(telegrams.len(), 2);
        assert_eq!(telegrams[0].as_bytes(), b"/a\n!1\n");
        assert_eq!(telegrams[1].as_bytes(), b"/b\n!2\n");
    }

    #[test]
    fn test_accumulating_state_and_buffer_growth() {
        let mut framer = TelegramFramer::new();
        framer.feed("/header");
        assert_eq!(framer.state(), FramerState::Accumulating);
        let after_start = framer.buffered_len();

        framer.feed("1-0:1.8.1(001234.567*kWh)");
        assert!(framer.buffered_len() > after_start);
    }

    #[test]
    fn test_empty_lines_inside_telegram_are_kept() {
        let mut framer = TelegramFramer::new();
        let telegrams = feed_all(&mut framer, &["/header", "", "!0000"]);

        assert_eq!(telegrams.len(), 1);
        assert_eq!(telegrams[0].as_bytes(), b"/header\n\n!0000\n");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(FramerState::Idle.to_string(), "idle");
        assert_eq!(FramerState::Accumulating.to_string(), "accumulating");
    }
}
