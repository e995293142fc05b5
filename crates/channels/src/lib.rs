//! Chat participants, channels, and the registry that owns them.
//!
//! A [`ChatChannel`] decides who may speak in it and who hears it. A
//! [`ChatPlayer`] carries its own channel memberships and remembered active
//! channel. Both are traits so a host platform can back them with its own
//! session and permission systems; [`memory`] provides in-process versions.

pub mod channel;
pub mod error;
pub mod gating;
pub mod memory;
pub mod membership;
pub mod player;
pub mod registry;

pub use {
    channel::{ChannelConfiguration, ChatChannel, GlobalChannel, PermissionChannel, same_key},
    error::{Error, Result},
    membership::Memberships,
    player::{ChatPlayer, PlayerDirectory},
    registry::ChannelRegistry,
};
