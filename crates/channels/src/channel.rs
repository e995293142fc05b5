use std::{fmt, sync::Arc};

use huddle_config::{ChannelConfig, ChannelKind, FormatSection};

use crate::{
    gating::sender_allowed,
    player::{ChatPlayer, PlayerDirectory},
};

/// Case-insensitive channel key comparison.
pub fn same_key(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Formatting rules owned by a channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfiguration {
    pub priority: i32,
    pub display_name: String,
    /// Mention highlight template; `%name%` is the mentioned recipient.
    pub ping_format: Option<String>,
    /// Rendered in order and concatenated.
    pub sections: Vec<FormatSection>,
}

impl ChannelConfiguration {
    /// Ping format, if one is configured and non-empty.
    pub fn ping_format(&self) -> Option<&str> {
        self.ping_format.as_deref().filter(|f| !f.is_empty())
    }
}

impl From<&ChannelConfig> for ChannelConfiguration {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            priority: config.priority,
            display_name: config.display_name().to_string(),
            ping_format: config.ping_format.clone(),
            sections: config.format.clone(),
        }
    }
}

/// A named chat scope with its own formatting rules and subscriber set.
pub trait ChatChannel: Send + Sync {
    /// Unique, case-insensitive key.
    fn key(&self) -> &str;

    fn configuration(&self) -> &ChannelConfiguration;

    /// Whether `player` may speak in this channel.
    fn is_valid(&self, player: &dyn ChatPlayer) -> bool;

    /// Players who currently hear this channel.
    fn subscribers(&self) -> Vec<Arc<dyn ChatPlayer>>;

    /// Joined automatically whenever valid for the player.
    fn auto_join(&self) -> bool {
        false
    }

    fn is_global(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn ChatChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatChannel")
            .field("key", &self.key())
            .field("priority", &self.configuration().priority)
            .finish()
    }
}

/// Build the channel described by `config`.
pub fn build_channel(
    config: &ChannelConfig,
    directory: Arc<dyn PlayerDirectory>,
) -> Arc<dyn ChatChannel> {
    match config.kind {
        ChannelKind::Global => Arc::new(GlobalChannel::new(
            config.key.clone(),
            ChannelConfiguration::from(config),
            directory,
        )),
        ChannelKind::Permission => Arc::new(
            PermissionChannel::new(
                config.key.clone(),
                ChannelConfiguration::from(config),
                config.permission_node(),
                directory,
            )
            .with_allowlist(config.allowlist.clone())
            .with_auto_join(config.auto_join),
        ),
    }
}

// ── Global ──────────────────────────────────────────────────────────────────

/// The fallback channel: everyone may speak, every online player listens.
pub struct GlobalChannel {
    key: String,
    configuration: ChannelConfiguration,
    directory: Arc<dyn PlayerDirectory>,
}

impl GlobalChannel {
    pub fn new(
        key: impl Into<String>,
        configuration: ChannelConfiguration,
        directory: Arc<dyn PlayerDirectory>,
    ) -> Self {
        Self {
            key: key.into(),
            configuration,
            directory,
        }
    }
}

impl ChatChannel for GlobalChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn configuration(&self) -> &ChannelConfiguration {
        &self.configuration
    }

    fn is_valid(&self, _player: &dyn ChatPlayer) -> bool {
        true
    }

    fn subscribers(&self) -> Vec<Arc<dyn ChatPlayer>> {
        self.directory.online_players()
    }

    fn is_global(&self) -> bool {
        true
    }
}

// ── Permission ──────────────────────────────────────────────────────────────

/// A channel gated by a permission node and an optional sender allowlist.
///
/// Subscribers are online players for whom the channel is valid and who have
/// joined it.
pub struct PermissionChannel {
    key: String,
    configuration: ChannelConfiguration,
    permission: String,
    allowlist: Vec<String>,
    auto_join: bool,
    directory: Arc<dyn PlayerDirectory>,
}

impl PermissionChannel {
    pub fn new(
        key: impl Into<String>,
        configuration: ChannelConfiguration,
        permission: impl Into<String>,
        directory: Arc<dyn PlayerDirectory>,
    ) -> Self {
        Self {
            key: key.into(),
            configuration,
            permission: permission.into(),
            allowlist: Vec::new(),
            auto_join: false,
            directory,
        }
    }

    #[must_use]
    pub fn with_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.allowlist = allowlist;
        self
    }

    #[must_use]
    pub fn with_auto_join(mut self, auto_join: bool) -> Self {
        self.auto_join = auto_join;
        self
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }
}

impl ChatChannel for PermissionChannel {
    fn key(&self) -> &str {
        &self.key
    }

    fn configuration(&self) -> &ChannelConfiguration {
        &self.configuration
    }

    fn is_valid(&self, player: &dyn ChatPlayer) -> bool {
        player.has_permission(&self.permission) && sender_allowed(player.name(), &self.allowlist)
    }

    fn subscribers(&self) -> Vec<Arc<dyn ChatPlayer>> {
        self.directory
            .online_players()
            .into_iter()
            .filter(|player| self.is_valid(player.as_ref()) && player.is_member_of(&self.key))
            .collect()
    }

    fn auto_join(&self) -> bool {
        self.auto_join
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDirectory, InMemoryPlayer};

    fn staff_config() -> ChannelConfig {
        ChannelConfig {
            key: "Staff".into(),
            priority: 4,
            allowlist: vec!["mod_*".into()],
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn same_key_ignores_case() {
        assert!(same_key("Staff", "staff"));
        assert!(!same_key("staff", "trade"));
    }

    #[test]
    fn permission_channel_requires_permission_and_allowlist() {
        let directory = Arc::new(InMemoryDirectory::default());
        let channel = build_channel(&staff_config(), directory);

        let granted = InMemoryPlayer::new("1", "mod_alice").with_permission("huddle.channel.staff");
        let wrong_name = InMemoryPlayer::new("2", "bob").with_permission("huddle.channel.staff");
        let no_permission = InMemoryPlayer::new("3", "mod_carol");

        assert!(channel.is_valid(&granted));
        assert!(!channel.is_valid(&wrong_name));
        assert!(!channel.is_valid(&no_permission));
        assert_eq!(channel.configuration().display_name, "Staff");
        assert_eq!(channel.configuration().priority, 4);
    }

    #[test]
    fn permission_subscribers_are_valid_members() {
        let directory = Arc::new(InMemoryDirectory::default());
        let channel = build_channel(&staff_config(), directory.clone());

        let member = Arc::new(
            InMemoryPlayer::new("1", "mod_alice").with_permission("huddle.channel.staff"),
        );
        member.memberships().join(&channel);
        let bystander = Arc::new(
            InMemoryPlayer::new("2", "mod_bob").with_permission("huddle.channel.staff"),
        );
        directory.add(member);
        directory.add(bystander);

        let subscribers = channel.subscribers();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].id(), "1");
    }

    #[test]
    fn global_channel_hears_everyone() {
        let directory = Arc::new(InMemoryDirectory::default());
        directory.add(Arc::new(InMemoryPlayer::new("1", "alice")));
        directory.add(Arc::new(InMemoryPlayer::new("2", "bob")));
        let channel = build_channel(&ChannelConfig::global(), directory);

        assert!(channel.is_global());
        assert!(channel.is_valid(&InMemoryPlayer::new("3", "carol")));
        assert_eq!(channel.subscribers().len(), 2);
    }

    #[test]
    fn empty_ping_format_is_absent() {
        let configuration = ChannelConfiguration {
            ping_format: Some(String::new()),
            ..ChannelConfiguration::default()
        };
        assert_eq!(configuration.ping_format(), None);
    }
}
