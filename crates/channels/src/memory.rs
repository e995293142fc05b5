//! In-process players and directory, for the CLI and for tests.

use std::{
    any::Any,
    collections::HashSet,
    sync::{Arc, RwLock},
};

use crate::{
    channel::ChatChannel,
    membership::Memberships,
    player::{ChatPlayer, PlayerDirectory},
    registry::ChannelRegistry,
};

/// Native handle exposed by [`InMemoryPlayer`] to placeholder expanders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub name: String,
    pub display_name: String,
}

/// A player whose permissions and memberships live in memory.
///
/// The permission `*` grants everything.
pub struct InMemoryPlayer {
    id: String,
    profile: PlayerProfile,
    permissions: RwLock<HashSet<String>>,
    memberships: Memberships,
}

impl InMemoryPlayer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            profile: PlayerProfile {
                display_name: name.clone(),
                name,
            },
            permissions: RwLock::new(HashSet::new()),
            memberships: Memberships::new(),
        }
    }

    #[must_use]
    pub fn with_permission(self, permission: impl Into<String>) -> Self {
        self.grant_permission(permission);
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.profile.display_name = display_name.into();
        self
    }

    pub fn grant_permission(&self, permission: impl Into<String>) {
        self.permissions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(permission.into());
    }

    pub fn revoke_permission(&self, permission: &str) {
        self.permissions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(permission);
    }

    pub fn memberships(&self) -> &Memberships {
        &self.memberships
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }
}

impl ChatPlayer for InMemoryPlayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.profile.name
    }

    fn has_permission(&self, permission: &str) -> bool {
        let permissions = self.permissions.read().unwrap_or_else(|e| e.into_inner());
        permissions.contains("*") || permissions.contains(permission)
    }

    fn update_channels(&self, registry: &ChannelRegistry) {
        self.memberships.refresh(self, registry);
    }

    fn active_channel(&self) -> Option<Arc<dyn ChatChannel>> {
        self.memberships.active()
    }

    fn set_active_channel(&self, channel: &Arc<dyn ChatChannel>) {
        self.memberships.set_active(channel);
    }

    fn active_channels(&self) -> Vec<Arc<dyn ChatChannel>> {
        self.memberships.channels()
    }

    fn native_handle(&self) -> Option<&dyn Any> {
        Some(&self.profile)
    }
}

/// Online players kept in insertion order.
#[derive(Default)]
pub struct InMemoryDirectory {
    players: RwLock<Vec<Arc<dyn ChatPlayer>>>,
}

impl InMemoryDirectory {
    /// Add a player, replacing any online player with the same id.
    pub fn add(&self, player: Arc<dyn ChatPlayer>) {
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        players.retain(|p| p.id() != player.id());
        players.push(player);
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn ChatPlayer>> {
        let mut players = self.players.write().unwrap_or_else(|e| e.into_inner());
        let idx = players.iter().position(|p| p.id() == id)?;
        Some(players.remove(idx))
    }

    /// Look a player up by name, case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn ChatPlayer>> {
        let name = name.to_lowercase();
        self.players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|p| p.name().to_lowercase() == name)
            .cloned()
    }
}

impl PlayerDirectory for InMemoryDirectory {
    fn online_players(&self) -> Vec<Arc<dyn ChatPlayer>> {
        self.players.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
