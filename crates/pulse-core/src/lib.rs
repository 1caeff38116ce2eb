//! Core Pulse protocol types and constants.
//!
//! This crate provides:
//! - The tagged payload exchanged over a data channel
//! - JSON encoding/decoding with strict tag validation
//! - Share-link building and parsing for peer discovery

#![forbid(unsafe_code)]

pub mod link;
pub mod payload;

pub use link::{parse_share_link, share_link, LinkError, REMOTE_PARAM};
pub use payload::{decode_payload, encode_payload, Payload, PulseError};

pub const PULSE_VERSION: u16 = 1;
