use crate::error::ClientError;
use crate::signaling::transport::{SignalConnection, SignalTransport};
use lookout_core::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Events the link reports to the dispatcher, tagged with the epoch of the
/// physical connection they belong to.
pub(crate) enum LinkEvent {
    Connected(u64, Result<SignalConnection, ClientError>),
    Message(u64, Envelope),
    Closed(u64),
    RetryDue(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkStatus {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Owner of the single control connection. Every physical connection gets a
/// fresh epoch; events carrying an older epoch are stale.
pub(crate) struct SignalingLink {
    transport: Arc<dyn SignalTransport>,
    url: String,
    events: mpsc::UnboundedSender<LinkEvent>,
    epoch: u64,
    status: LinkStatus,
    outbound: Option<mpsc::UnboundedSender<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SignalingLink {
    pub fn new(
        transport: Arc<dyn SignalTransport>,
        url: String,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            transport,
            url,
            events,
            epoch: 0,
            status: LinkStatus::Idle,
            outbound: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == LinkStatus::Open
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Starts a new physical connection, tearing down whatever was there.
    pub fn begin_connect(&mut self) -> u64 {
        self.teardown();
        self.epoch += 1;
        self.status = LinkStatus::Connecting;

        let epoch = self.epoch;
        let transport = self.transport.clone();
        let url = self.url.clone();
        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            let res = transport.connect(&url).await;
            let _ = events.send(LinkEvent::Connected(epoch, res));
        }));
        epoch
    }

    /// Adopts a freshly opened connection. Returns `false` for a stale epoch,
    /// in which case the connection is dropped.
    pub fn attach(&mut self, epoch: u64, conn: SignalConnection) -> bool {
        if !self.is_current(epoch) {
            debug!("Discarding connection from stale epoch {}", epoch);
            return false;
        }

        let SignalConnection {
            outbound,
            mut inbound,
        } = conn;
        self.outbound = Some(outbound);
        self.status = LinkStatus::Open;

        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                let parsed = serde_json::from_str::<Envelope>(&text)
                    .map_err(|e| e.to_string())
                    .and_then(|env| env.validate().map(|_| env));
                match parsed {
                    Ok(env) => {
                        if events.send(LinkEvent::Message(epoch, env)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping malformed signaling frame: {}", e),
                }
            }
            let _ = events.send(LinkEvent::Closed(epoch));
        }));
        true
    }

    /// Marks the current attempt as gone without bumping the epoch, so a
    /// retry timer scheduled afterwards still counts as current.
    pub fn mark_closed(&mut self) {
        self.outbound = None;
        self.status = LinkStatus::Closed;
    }

    pub fn schedule_retry(&mut self, delay: Duration) {
        let epoch = self.epoch;
        let events = self.events.clone();
        self.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(LinkEvent::RetryDue(epoch));
        }));
    }

    /// Local close. Nothing from the old connection is delivered afterwards.
    pub fn close(&mut self) {
        self.teardown();
        self.epoch += 1;
        self.status = LinkStatus::Closed;
    }

    pub fn send(&self, envelope: &Envelope) {
        let Some(outbound) = self.outbound.as_ref().filter(|_| self.is_open()) else {
            debug!("Link not open, dropping {:?} envelope", envelope.kind);
            return;
        };
        match serde_json::to_string(envelope) {
            Ok(text) => {
                if outbound.send(text).is_err() {
                    debug!("Link writer gone, dropping {:?} envelope", envelope.kind);
                }
            }
            Err(e) => warn!("Failed to serialize envelope: {}", e),
        }
    }

    fn teardown(&mut self) {
        self.outbound = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SignalingLink {
    fn drop(&mut self) {
        self.teardown();
    }
}
