use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use crate::{
    channel::{ChatChannel, same_key},
    player::ChatPlayer,
    registry::ChannelRegistry,
};

/// Per-player channel state: joined channels plus the remembered active
/// channel.
///
/// Channels are held weakly; the registry owns them. Each lock is taken for a
/// single read or write, so concurrent resolutions for one player settle on
/// whichever write lands last.
#[derive(Default)]
pub struct Memberships {
    joined: RwLock<Vec<Weak<dyn ChatChannel>>>,
    active: RwLock<Option<Weak<dyn ChatChannel>>>,
}

impl Memberships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `channel`. Returns `false` if already a member.
    pub fn join(&self, channel: &Arc<dyn ChatChannel>) -> bool {
        let mut joined = self.joined.write().unwrap_or_else(|e| e.into_inner());
        let already = joined
            .iter()
            .filter_map(Weak::upgrade)
            .any(|c| same_key(c.key(), channel.key()));
        if already {
            return false;
        }
        joined.push(Arc::downgrade(channel));
        true
    }

    /// Leave the channel with `key`, forgetting it as active too. Returns
    /// `false` if the player was not a member.
    pub fn leave(&self, key: &str) -> bool {
        let removed = {
            let mut joined = self.joined.write().unwrap_or_else(|e| e.into_inner());
            let before = joined.len();
            joined.retain(|weak| weak.upgrade().is_some_and(|c| !same_key(c.key(), key)));
            joined.len() != before
        };
        if self.active().is_some_and(|c| same_key(c.key(), key)) {
            self.clear_active();
        }
        removed
    }

    pub fn is_member(&self, key: &str) -> bool {
        self.channels().iter().any(|c| same_key(c.key(), key))
    }

    /// Joined channels that are still registered.
    pub fn channels(&self) -> Vec<Arc<dyn ChatChannel>> {
        self.joined
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn active(&self) -> Option<Arc<dyn ChatChannel>> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn set_active(&self, channel: &Arc<dyn ChatChannel>) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::downgrade(channel));
    }

    pub fn clear_active(&self) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Drop joined channels no longer valid for `player`, join auto-join
    /// channels that are, and forget the active channel if it was dropped.
    ///
    /// Validity is evaluated without holding any lock, since channel rules may
    /// read the player's memberships.
    pub fn refresh(&self, player: &dyn ChatPlayer, registry: &ChannelRegistry) {
        let current = self.channels();
        let mut kept: Vec<Arc<dyn ChatChannel>> = current
            .into_iter()
            .filter(|channel| channel.is_valid(player))
            .collect();

        for channel in registry.channels() {
            if channel.auto_join()
                && !kept.iter().any(|c| same_key(c.key(), channel.key()))
                && channel.is_valid(player)
            {
                debug!(player = player.name(), channel = channel.key(), "auto-joined channel");
                kept.push(channel);
            }
        }

        *self.joined.write().unwrap_or_else(|e| e.into_inner()) =
            kept.iter().map(Arc::downgrade).collect();

        if let Some(active) = self.active()
            && !active.is_global()
            && !kept.iter().any(|c| same_key(c.key(), active.key()))
        {
            debug!(player = player.name(), channel = active.key(), "active channel dropped");
            self.clear_active();
        }
    }
}
