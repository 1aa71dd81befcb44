//! Audio offset decision engine
//!
//! Keeps a media player's audio delay matched to the characteristics of
//! whatever is playing. The host feeds raw playback callbacks in through
//! [`manager::PlaybackEventManager`]; they are normalized onto an in-process
//! [`events::EventBus`], where the offset policy applies the configured
//! delay for the resolved [`profile::StreamProfile`], the seek-back policy
//! masks the audible gap a delay change causes, and the active monitor
//! watches the host's delay slider to persist manual adjustments.
//!
//! All host interaction goes through the port traits in [`ports`]; nothing
//! in this crate talks to a player directly.

pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod manager;
pub mod monitor;
pub mod notify;
pub mod policy;
pub mod ports;
pub mod profile;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod shutdown;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use service::{HostPorts, OffsetService, ServiceTunables};
