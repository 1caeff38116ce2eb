//! In-process signaling broker and transport.
//!
//! Stands in for the external signaling service in tests and demos:
//! issues random peer identities, pairs channels between endpoints in
//! the same process, and delivers events over per-endpoint queues that
//! preserve per-direction ordering. Payloads go through their wire
//! encoding on every send, so the protocol layer is exercised too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use duet_common::{Error, Result};
use pulse_core::{decode_payload, encode_payload, Payload};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;

use crate::transport::{ChannelId, PeerIdentity, Transport, TransportEvent};

const IDENTITY_LEN: usize = 16;

struct ChannelEnd {
    owner: PeerIdentity,
    remote: ChannelId,
    open: bool,
}

#[derive(Default)]
struct HubState {
    next_channel: u64,
    peers: HashMap<PeerIdentity, mpsc::UnboundedSender<TransportEvent>>,
    ends: HashMap<ChannelId, ChannelEnd>,
}

impl HubState {
    fn issue_channel(&mut self) -> ChannelId {
        self.next_channel += 1;
        ChannelId(self.next_channel)
    }

    fn deliver(&self, peer: &str, event: TransportEvent) {
        if let Some(queue) = self.peers.get(peer) {
            // A dropped receiver means the session is gone; nothing to
            // deliver to.
            let _ = queue.send(event);
        }
    }
}

/// In-process broker. Clone-free: endpoints share it through `Arc`.
#[derive(Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registered endpoint.
    ///
    /// The identity is issued immediately and announced through the
    /// event queue as [`TransportEvent::Registered`], mirroring the
    /// asynchronous registration of a real broker.
    pub fn endpoint(&self) -> (MemoryTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let identity: PeerIdentity = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(IDENTITY_LEN)
            .map(char::from)
            .collect();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().expect("hub lock poisoned");
        state.peers.insert(identity.clone(), events_tx.clone());
        drop(state);

        // Queued, not invoked: the session observes registration when
        // it drains its events, never re-entrantly.
        let _ = events_tx.send(TransportEvent::Registered(identity.clone()));
        debug!(%identity, "memory endpoint registered");

        (
            MemoryTransport {
                state: Arc::clone(&self.state),
                identity,
            },
            events_rx,
        )
    }
}

/// One endpoint's handle on the hub.
pub struct MemoryTransport {
    state: Arc<Mutex<HubState>>,
    identity: PeerIdentity,
}

impl MemoryTransport {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, target: &str) -> Result<ChannelId> {
        let mut state = self.state.lock().expect("hub lock poisoned");
        if !state.peers.contains_key(target) {
            return Err(Error::not_found(format!("no peer {target}")));
        }

        let local = state.issue_channel();
        let remote = state.issue_channel();
        state.ends.insert(
            local,
            ChannelEnd {
                owner: self.identity.clone(),
                remote,
                open: true,
            },
        );
        state.ends.insert(
            remote,
            ChannelEnd {
                owner: target.to_string(),
                remote: local,
                open: true,
            },
        );

        // The callee hears about the channel before its open event;
        // the caller only hears the open. Queue order per receiver is
        // what a real broker guarantees.
        state.deliver(target, TransportEvent::Incoming(remote));
        state.deliver(target, TransportEvent::ChannelOpen(remote));
        state.deliver(&self.identity, TransportEvent::ChannelOpen(local));
        Ok(local)
    }

    fn send(&mut self, channel: ChannelId, payload: &Payload) -> Result<()> {
        let wire = encode_payload(payload).map_err(Error::protocol)?;

        let state = self.state.lock().expect("hub lock poisoned");
        let end = state
            .ends
            .get(&channel)
            .filter(|end| end.open)
            .ok_or_else(|| Error::not_found(format!("{channel} not open")))?;
        let remote_end = state
            .ends
            .get(&end.remote)
            .ok_or_else(|| Error::internal(format!("{channel} has no remote end")))?;

        // Round-trip through the wire form, as a real channel would.
        let delivered = decode_payload(&wire).map_err(Error::protocol)?;
        state.deliver(
            &remote_end.owner,
            TransportEvent::ChannelData(end.remote, delivered),
        );
        Ok(())
    }

    fn close(&mut self, channel: ChannelId) -> Result<()> {
        let mut state = self.state.lock().expect("hub lock poisoned");
        let Some(end) = state.ends.get_mut(&channel) else {
            return Err(Error::not_found(format!("{channel} unknown")));
        };
        if !end.open {
            return Ok(());
        }
        end.open = false;
        let remote = end.remote;

        if let Some(remote_end) = state.ends.get_mut(&remote) {
            remote_end.open = false;
            let owner = remote_end.owner.clone();
            state.deliver(&owner, TransportEvent::ChannelClosed(remote));
        }
        Ok(())
    }
}
