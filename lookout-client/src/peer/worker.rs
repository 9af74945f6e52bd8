use crate::media::LocalTrack;
use crate::peer::session::NegotiationRole;
use crate::peer::table::SlotKey;
use crate::transport::{
    IceCandidate, PeerConnector, PeerLink, SdpKind, SessionDescription, TransportEvent,
};
use anyhow::{Result, bail};
use lookout_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Instructions from the dispatcher to one peer worker.
#[derive(Debug)]
pub enum PeerCommand {
    RemoteDescription(SessionDescription),
    RemoteCandidate(IceCandidate),
    Close,
}

/// Drives a single peer link through offer/answer. Runs as its own task so a
/// slow exchange with one peer never holds up another.
pub(crate) struct PeerWorker {
    pub slot: SlotKey,
    pub peer_id: PeerId,
    pub role: NegotiationRole,
    pub tracks: Vec<LocalTrack>,
    pub connector: Arc<dyn PeerConnector>,
    pub events: mpsc::Sender<TransportEvent>,
    pub inbox: mpsc::UnboundedReceiver<PeerCommand>,
}

impl PeerWorker {
    pub async fn run(mut self) {
        let link = match self
            .connector
            .open_link(self.slot, self.peer_id.clone(), self.events.clone())
            .await
        {
            Ok(link) => link,
            Err(e) => {
                self.fail(format!("failed to open peer connection: {:#}", e))
                    .await;
                return;
            }
        };
        debug!("Peer worker for {} started as {:?}", self.peer_id, self.role);

        let mut remote_set = false;
        let mut pending: Vec<IceCandidate> = Vec::new();
        let mut broken = false;

        if self.role == NegotiationRole::Initiator {
            if let Err(e) = self.initiate(link.as_ref()).await {
                self.fail(format!("{:#}", e)).await;
                broken = true;
            }
        }

        while let Some(cmd) = self.inbox.recv().await {
            match cmd {
                PeerCommand::Close => break,
                PeerCommand::RemoteDescription(_) | PeerCommand::RemoteCandidate(_) if broken => {}
                PeerCommand::RemoteDescription(desc) => {
                    match self.apply_remote(link.as_ref(), desc, &mut pending).await {
                        Ok(()) => remote_set = true,
                        Err(e) => {
                            self.fail(format!("{:#}", e)).await;
                            broken = true;
                        }
                    }
                }
                PeerCommand::RemoteCandidate(candidate) if !remote_set => {
                    debug!("Queueing early candidate from {}", self.peer_id);
                    pending.push(candidate);
                }
                PeerCommand::RemoteCandidate(candidate) => {
                    if let Err(e) = link.add_ice_candidate(candidate).await {
                        warn!("Failed to add ICE candidate for {}: {:?}", self.peer_id, e);
                    }
                }
            }
        }

        if let Err(e) = link.close().await {
            warn!("Error closing peer connection to {}: {:?}", self.peer_id, e);
        }
        info!("Peer worker for {} finished", self.peer_id);
    }

    async fn attach(&self, link: &dyn PeerLink) -> Result<()> {
        if self.tracks.is_empty() {
            return Ok(());
        }
        link.attach_tracks(&self.tracks).await?;
        let _ = self.events.send(TransportEvent::TracksAttached(self.slot)).await;
        Ok(())
    }

    async fn initiate(&self, link: &dyn PeerLink) -> Result<()> {
        self.attach(link).await?;
        let offer = link.create_offer().await?;
        let _ = self
            .events
            .send(TransportEvent::LocalDescription(self.slot, offer))
            .await;
        Ok(())
    }

    async fn apply_remote(
        &self,
        link: &dyn PeerLink,
        desc: SessionDescription,
        pending: &mut Vec<IceCandidate>,
    ) -> Result<()> {
        match (self.role, desc.kind) {
            (NegotiationRole::Initiator, SdpKind::Answer) => {
                link.set_remote_description(desc).await?;
                self.flush(link, pending).await;
            }
            (NegotiationRole::Responder, SdpKind::Offer) => {
                link.set_remote_description(desc).await?;
                self.flush(link, pending).await;
                self.attach(link).await?;
                let answer = link.create_answer().await?;
                let _ = self
                    .events
                    .send(TransportEvent::LocalDescription(self.slot, answer))
                    .await;
            }
            (role, kind) => bail!("unexpected {:?} for a session acting as {:?}", kind, role),
        }
        Ok(())
    }

    async fn flush(&self, link: &dyn PeerLink, pending: &mut Vec<IceCandidate>) {
        for candidate in pending.drain(..) {
            if let Err(e) = link.add_ice_candidate(candidate).await {
                warn!("Failed to add queued ICE candidate for {}: {:?}", self.peer_id, e);
            }
        }
    }

    async fn fail(&self, reason: String) {
        warn!("Negotiation with {} failed: {}", self.peer_id, reason);
        let _ = self
            .events
            .send(TransportEvent::NegotiationFailed(self.slot, reason))
            .await;
    }
}
