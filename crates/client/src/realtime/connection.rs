//! Connection state, reconnect policy and the transport seam.

use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Connection state for the realtime channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Disconnected after exhausting reconnect attempts.
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Reconnect attempts after a failed or dropped connection (0 = never retry)
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier applied per attempt; 1.0 keeps the delay fixed
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            backoff_multiplier: 1.0,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis().min(u32::MAX as u128) as u32;
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay for a given attempt number (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis((delay as u32).min(self.max_delay_ms) as u64)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// An open transport, seen as two text-frame queues.
///
/// `incoming` ends when the remote side goes away; dropping `outgoing` closes
/// the connection.
pub struct TransportLink {
    pub outgoing: UnboundedSender<String>,
    pub incoming: UnboundedReceiver<String>,
}

/// Opens transport links to the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<TransportLink, TransportError>;
}

/// WebSocket transport using tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (outgoing, mut outgoing_rx) = unbounded::<String>();
        let (incoming_tx, incoming) = unbounded::<String>();

        // Write task
        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.next().await {
                if let Err(e) = write.send(Message::text(text)).await {
                    tracing::error!("WebSocket send failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Read task
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if incoming_tx.unbounded_send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("WebSocket received close frame");
                        break;
                    }
                    Ok(_) => {
                        // Pong is handled by tungstenite; binary frames are not part of the protocol
                    }
                    Err(e) => {
                        tracing::error!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(TransportLink { outgoing, incoming })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_is_fixed() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        for attempt in 1..=5 {
            assert_eq!(config.delay_for_attempt(attempt), Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = ReconnectConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 500,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(6), Duration::from_millis(500));
    }

    #[test]
    fn test_failed_counts_as_disconnected() {
        let failed = ConnectionState::Failed {
            reason: "refused".to_string(),
        };
        assert!(failed.is_disconnected());
        assert!(!failed.is_connected());
        assert!(ConnectionState::Reconnecting { attempt: 2 }.is_connecting());
    }
}
