//! Transport capability seam.
//!
//! The signaling broker that turns a peer identity into a live data
//! channel is an external collaborator. The session only sees this
//! trait plus a stream of [`TransportEvent`]s; everything about
//! negotiation, NAT traversal, and wire framing stays on the other
//! side of the seam.

use duet_common::Result;
use pulse_core::Payload;

/// Opaque session-scoped address issued by the signaling transport.
pub type PeerIdentity = String;

/// Handle to one data channel, unique for the lifetime of the process.
///
/// Ids are issued from a monotonic counter, never reused. This is what
/// makes "last connection wins" checkable: events carrying a superseded
/// id are recognizably stale and dropped, instead of being confused
/// with the current channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// Events delivered by the transport, in per-channel receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport registered with its broker and issued our identity.
    /// Fires once per session; `connect` is a no-op before it.
    Registered(PeerIdentity),

    /// A remote peer opened a channel toward us.
    Incoming(ChannelId),

    /// Handshake on the given channel completed; sends are now allowed.
    ChannelOpen(ChannelId),

    /// One payload received on the given channel.
    ChannelData(ChannelId, Payload),

    /// The given channel was torn down, locally or remotely. Terminal.
    ChannelClosed(ChannelId),

    /// Transport-level failure (signaling error, unreachable peer).
    Error(String),
}

/// Operations the session may invoke on the transport.
///
/// All calls are non-blocking: `connect` begins an asynchronous
/// handshake whose completion arrives later as `ChannelOpen`.
pub trait Transport: Send {
    /// Request a channel to `target`. The returned id is `pending`
    /// until `ChannelOpen` arrives for it.
    fn connect(&mut self, target: &str) -> Result<ChannelId>;

    /// Transmit one payload on an open channel.
    fn send(&mut self, channel: ChannelId, payload: &Payload) -> Result<()>;

    /// Tear down a channel. The remote side learns of the closure
    /// asynchronously through its own `ChannelClosed` event.
    fn close(&mut self, channel: ChannelId) -> Result<()>;
}
