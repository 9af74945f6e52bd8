use async_trait::async_trait;
use lookout_client::{ClientError, SignalConnection, SignalTransport};
use lookout_core::{Envelope, EnvelopeType};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::signal_helpers::{ACCEPT_TIMEOUT_MS, SIGNAL_TIMEOUT_MS};

/// In-process stand-in for the relay. Every successful `connect` hands the
/// relay side of the connection to the test through [`MockRelay::accept`].
#[derive(Clone)]
pub struct MockRelay {
    inner: Arc<MockRelayInner>,
}

struct MockRelayInner {
    attempts: Mutex<Vec<Instant>>,
    refuse: AtomicU32,
    conn_tx: mpsc::UnboundedSender<MockConnection>,
    conn_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockConnection>>,
}

impl MockRelay {
    pub fn new() -> Self {
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockRelayInner {
                attempts: Mutex::new(Vec::new()),
                refuse: AtomicU32::new(0),
                conn_tx,
                conn_rx: tokio::sync::Mutex::new(conn_rx),
            }),
        }
    }

    /// Refuse the next `n` connection attempts.
    pub fn refuse_next(&self, n: u32) {
        self.inner.refuse.store(n, Ordering::SeqCst);
    }

    pub fn refuse_all(&self) {
        self.refuse_next(u32::MAX);
    }

    /// Times of every connection attempt, refused or not.
    pub fn attempts(&self) -> Vec<Instant> {
        self.inner.attempts.lock().clone()
    }

    pub async fn accept(&self) -> MockConnection {
        let mut rx = self.inner.conn_rx.lock().await;
        tokio::time::timeout(Duration::from_millis(ACCEPT_TIMEOUT_MS), rx.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("mock relay dropped")
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalTransport for MockRelay {
    async fn connect(&self, url: &str) -> Result<SignalConnection, ClientError> {
        self.inner.attempts.lock().push(Instant::now());

        let refused = self
            .inner
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            tracing::debug!("[MockRelay] refusing connection to {}", url);
            return Err(ClientError::SignalingUnavailable("connection refused".into()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.inner.conn_tx.send(MockConnection {
            to_client: Some(in_tx),
            from_client: out_rx,
        });
        Ok(SignalConnection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Relay side of one client connection.
pub struct MockConnection {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockConnection {
    pub fn send(&self, env: Envelope) {
        let text = serde_json::to_string(&env).expect("serializable envelope");
        self.send_raw(&text);
    }

    pub fn send_raw(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(text.to_owned());
        }
    }

    /// Next envelope from the client, or `None` once it closed the link.
    pub async fn recv(&mut self) -> Option<Envelope> {
        let text = tokio::time::timeout(
            Duration::from_millis(SIGNAL_TIMEOUT_MS),
            self.from_client.recv(),
        )
        .await
        .expect("timed out waiting for a client frame")?;
        Some(serde_json::from_str(&text).expect("client sent a valid envelope"))
    }

    /// Skips frames until one of `kind` arrives.
    pub async fn recv_kind(&mut self, kind: EnvelopeType) -> Envelope {
        loop {
            let env = self
                .recv()
                .await
                .unwrap_or_else(|| panic!("link closed while waiting for {:?}", kind));
            if env.kind == kind {
                return env;
            }
        }
    }

    /// Everything the client sends within `ms`.
    pub async fn collect_for(&mut self, ms: u64) -> Vec<Envelope> {
        let mut out = Vec::new();
        let deadline = Instant::now() + Duration::from_millis(ms);
        while let Ok(Some(text)) =
            tokio::time::timeout_at(deadline, self.from_client.recv()).await
        {
            out.push(serde_json::from_str(&text).expect("client sent a valid envelope"));
        }
        out
    }

    /// Waits for the client side to go away.
    pub async fn wait_closed(&mut self) {
        while self.recv().await.is_some() {}
    }

    /// Drops the relay side, which the client sees as an unexpected close.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}
