use crate::error::ClientError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One open physical connection to the relay, as a pair of text channels.
///
/// Dropping `outbound` closes the connection. `inbound` yields `None` once
/// the remote side has gone away.
pub struct SignalConnection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait SignalTransport: Send + Sync {
    /// Resolves once the connection is open.
    async fn connect(&self, url: &str) -> Result<SignalConnection, ClientError>;
}
