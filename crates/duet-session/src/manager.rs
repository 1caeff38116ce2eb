//! Connection manager: at most one logical channel per session.
//!
//! The manager translates raw [`TransportEvent`]s into typed
//! [`ManagerEvent`]s for the timer layer, enforcing three invariants:
//! exactly one tracked channel (the most recently initiated or accepted
//! one wins), events from superseded channels are dropped, and the
//! close notice for a channel fires at most once.

use duet_common::Result;
use pulse_core::Payload;
use tracing::{debug, trace, warn};

use crate::transport::{ChannelId, PeerIdentity, Transport, TransportEvent};

/// Lifecycle of the tracked channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Requested, handshake not yet complete. Sends are rejected.
    Pending,
    /// Bidirectional payloads flow.
    Open,
    /// Terminal. A new channel must be created to reconnect.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tracked {
    id: ChannelId,
    state: ChannelState,
}

/// Typed notices for the layer above, already filtered for staleness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Local identity issued; share links can be published and
    /// `initiate` becomes possible.
    Registered(PeerIdentity),
    /// The tracked channel finished its handshake.
    ChannelOpened,
    /// One payload arrived on the open tracked channel.
    ChannelMessage(Payload),
    /// The tracked channel closed. Emitted at most once per channel.
    ChannelClosed,
    /// Transport-level failure reported to the diagnostic sink.
    TransportFailed(String),
}

/// Mediates exactly one channel at a time.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    local: Option<PeerIdentity>,
    current: Option<Tracked>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity issued by the transport, once registration completes.
    pub fn local_identity(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// True when payloads may be sent.
    pub fn is_open(&self) -> bool {
        matches!(
            self.current,
            Some(Tracked {
                state: ChannelState::Open,
                ..
            })
        )
    }

    /// Id of the tracked channel, if any.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.current.map(|tracked| tracked.id)
    }

    /// Request a connection to `target`.
    ///
    /// A no-op yielding `None` before the local identity has been
    /// issued: the broker would reject the attempt anyway, so the
    /// caller is expected to wait for [`ManagerEvent::Registered`].
    pub fn initiate<T: Transport>(
        &mut self,
        transport: &mut T,
        target: &str,
    ) -> Option<ChannelId> {
        if self.local.is_none() {
            warn!(peer = target, "initiate before registration ignored");
            return None;
        }
        match transport.connect(target) {
            Ok(id) => {
                self.track(id);
                debug!(%id, peer = target, "outbound channel requested");
                Some(id)
            }
            Err(err) => {
                warn!(peer = target, %err, "connect failed");
                None
            }
        }
    }

    /// Adopt a channel offered by the transport's inbound-connection
    /// event. Always succeeds; supersedes any tracked channel.
    pub fn accept(&mut self, id: ChannelId) {
        debug!(%id, "inbound channel accepted");
        self.track(id);
    }

    fn track(&mut self, id: ChannelId) {
        if let Some(previous) = self.current.replace(Tracked {
            id,
            state: ChannelState::Pending,
        }) {
            if previous.state != ChannelState::Closed {
                debug!(superseded = %previous.id, current = %id, "channel superseded");
            }
        }
    }

    /// Translate one transport event into a notice for the layer above.
    ///
    /// Events for a channel other than the tracked one are stale
    /// callbacks from a superseded channel; they are dropped with a
    /// trace line, never surfaced as errors.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<ManagerEvent> {
        match event {
            TransportEvent::Registered(identity) => {
                self.local = Some(identity.clone());
                Some(ManagerEvent::Registered(identity))
            }
            TransportEvent::Incoming(id) => {
                self.accept(id);
                None
            }
            TransportEvent::ChannelOpen(id) => {
                let tracked = self.tracked_mut(id)?;
                if tracked.state != ChannelState::Pending {
                    trace!(%id, state = ?tracked.state, "duplicate open ignored");
                    return None;
                }
                tracked.state = ChannelState::Open;
                Some(ManagerEvent::ChannelOpened)
            }
            TransportEvent::ChannelData(id, payload) => {
                let tracked = self.tracked_mut(id)?;
                if tracked.state != ChannelState::Open {
                    trace!(%id, "data on non-open channel dropped");
                    return None;
                }
                Some(ManagerEvent::ChannelMessage(payload))
            }
            TransportEvent::ChannelClosed(id) => {
                let tracked = self.tracked_mut(id)?;
                if tracked.state == ChannelState::Closed {
                    trace!(%id, "duplicate close ignored");
                    return None;
                }
                tracked.state = ChannelState::Closed;
                Some(ManagerEvent::ChannelClosed)
            }
            TransportEvent::Error(message) => Some(ManagerEvent::TransportFailed(message)),
        }
    }

    fn tracked_mut(&mut self, id: ChannelId) -> Option<&mut Tracked> {
        match self.current.as_mut() {
            Some(tracked) if tracked.id == id => Some(tracked),
            Some(tracked) => {
                trace!(stale = %id, current = %tracked.id, "stale channel event dropped");
                None
            }
            None => {
                trace!(stale = %id, "event with no tracked channel dropped");
                None
            }
        }
    }

    /// Transmit one payload on the tracked channel.
    ///
    /// Calling on a pending or closed channel is a caller error; the
    /// manager logs and no-ops rather than crashing, since the layer
    /// above cannot be trusted to gate every call.
    pub fn send<T: Transport>(&mut self, transport: &mut T, payload: &Payload) -> Result<()> {
        match self.current {
            Some(Tracked {
                id,
                state: ChannelState::Open,
            }) => transport.send(id, payload),
            Some(Tracked { id, state }) => {
                warn!(%id, ?state, "send on non-open channel ignored");
                Ok(())
            }
            None => {
                warn!("send with no channel ignored");
                Ok(())
            }
        }
    }

    /// Close the tracked channel.
    ///
    /// Returns the local close notice exactly once; the remote side
    /// discovers closure asynchronously through its own transport.
    /// Idempotent: closing an already-closed or absent channel no-ops.
    pub fn close<T: Transport>(&mut self, transport: &mut T) -> Option<ManagerEvent> {
        let tracked = self.current.as_mut()?;
        if tracked.state == ChannelState::Closed {
            return None;
        }
        if let Err(err) = transport.close(tracked.id) {
            debug!(id = %tracked.id, %err, "transport close reported error");
        }
        tracked.state = ChannelState::Closed;
        Some(ManagerEvent::ChannelClosed)
    }
}
