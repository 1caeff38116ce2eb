//! Duet session core.
//!
//! This crate provides:
//! - The transport capability seam the signaling broker plugs into
//! - The connection manager (one channel at a time, last connection wins)
//! - The shared timer state machine (host-authoritative countdown)
//! - The per-session event loop tying the two together
//! - An in-process memory transport for tests and demos

#![forbid(unsafe_code)]

pub mod manager;
pub mod memory;
pub mod session;
pub mod timer;
pub mod transport;

pub use manager::{ChannelState, ConnectionManager, ManagerEvent};
pub use memory::{MemoryHub, MemoryTransport};
pub use session::{Command, RetryPolicy, Session, SessionConfig, SessionHandle, SessionUpdate};
pub use timer::{Phase, Timer, TimerConfig, TimerEffect};
pub use transport::{ChannelId, PeerIdentity, Transport, TransportEvent};
