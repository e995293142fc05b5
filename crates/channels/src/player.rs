use std::{any::Any, sync::Arc};

use crate::{channel::ChatChannel, registry::ChannelRegistry};

/// A participant that can send and receive chat, hold permissions, and
/// belong to channels.
///
/// Sessions are created and destroyed by the host; the chat core only reads
/// players and updates their channel state.
pub trait ChatPlayer: Send + Sync {
    /// Stable identifier, unique among online players.
    fn id(&self) -> &str;

    /// Display name used for `@name` mentions and `%name%`.
    fn name(&self) -> &str;

    fn has_permission(&self, permission: &str) -> bool;

    /// Re-evaluate channel memberships against the registry: drop channels
    /// that are no longer valid and join auto-join channels that became valid.
    fn update_channels(&self, registry: &ChannelRegistry);

    /// The remembered default send target, if any.
    fn active_channel(&self) -> Option<Arc<dyn ChatChannel>>;

    fn set_active_channel(&self, channel: &Arc<dyn ChatChannel>);

    /// Channels the player currently belongs to.
    fn active_channels(&self) -> Vec<Arc<dyn ChatChannel>>;

    /// Platform-native handle for collaborators that need more than this
    /// trait exposes (e.g. placeholder expansion). Query it through
    /// `<dyn ChatPlayer>::native::<T>()`.
    fn native_handle(&self) -> Option<&dyn Any> {
        None
    }
}

impl<'a> dyn ChatPlayer + 'a {
    /// Typed access to the player's native handle.
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native_handle()?.downcast_ref::<T>()
    }

    /// Whether the player belongs to the channel with the given key.
    pub fn is_member_of(&self, key: &str) -> bool {
        self.active_channels()
            .iter()
            .any(|channel| crate::same_key(channel.key(), key))
    }
}

/// Enumerates players currently online.
pub trait PlayerDirectory: Send + Sync {
    fn online_players(&self) -> Vec<Arc<dyn ChatPlayer>>;
}
