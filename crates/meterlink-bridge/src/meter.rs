//! TCP connection to the meter-bridge device
//!
//! The device exposes the meter's serial output as newline-delimited
//! text over TCP. There is no reconnect policy on this side: losing the
//! stream is fatal for the publisher run, unlike the MQTT side.

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::info;

use meterlink_core::{BridgeConfig, MeterlinkError, Result};

/// Dial the meter-bridge device
///
/// Returns a buffered reader over the line stream. A dial failure is
/// startup-fatal for the publisher role.
pub async fn connect(config: &BridgeConfig) -> Result<BufReader<TcpStream>> {
    let addr = config.addr();
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| MeterlinkError::MeterConnect {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

    info!(%addr, "connected to meter bridge");
    Ok(BufReader::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_connect_refused_is_meter_connect_error() {
        // Port 1 on localhost is essentially never listening.
        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
        };
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, MeterlinkError::MeterConnect { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_connect_yields_line_reader() {
        use tokio::io::AsyncBufReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"/header\n").await.unwrap();
        });

        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mut reader = connect(&config).await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "/header\n");
    }
}
