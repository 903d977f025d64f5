//! In-memory transport for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use serde_json::Value;
use speakspace_shared::{encode_frame, ServerEvent, WsEnvelope};

use super::connection::{Connector, TransportError, TransportLink};

/// Far end of an in-memory link.
pub(crate) struct ServerEnd {
    pub(crate) from_client: UnboundedReceiver<String>,
    pub(crate) to_client: UnboundedSender<String>,
}

impl ServerEnd {
    pub(crate) async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(2), self.from_client.next())
            .await
            .expect("frame in time")
            .expect("link open");
        serde_json::from_str(&text).unwrap()
    }

    pub(crate) fn push(&self, event: ServerEvent) {
        let frame = encode_frame(&WsEnvelope::new(event)).unwrap();
        self.to_client.unbounded_send(frame).unwrap();
    }
}

#[derive(Default)]
pub(crate) struct MemoryConnector {
    opens: AtomicUsize,
    failures_left: AtomicUsize,
    pub(crate) urls: Mutex<Vec<String>>,
    ends: Mutex<Vec<ServerEnd>>,
}

impl MemoryConnector {
    /// Refuse the first `times` opens.
    pub(crate) fn failing(times: usize) -> Self {
        let connector = Self::default();
        connector.failures_left.store(times, Ordering::SeqCst);
        connector
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Oldest link not yet taken.
    pub(crate) fn take_end(&self) -> ServerEnd {
        self.ends.lock().unwrap().remove(0)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<TransportLink, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("refused".to_string()));
        }

        let (outgoing, from_client) = unbounded();
        let (to_client, incoming) = unbounded();
        self.ends.lock().unwrap().push(ServerEnd {
            from_client,
            to_client,
        });
        Ok(TransportLink { outgoing, incoming })
    }
}
