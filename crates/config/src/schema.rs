/// Config schema types (dispatch, channels, format sections, fragments).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub dispatch: DispatchConfig,
    pub channels: Vec<ChannelConfig>,
    pub fragments: Vec<FragmentConfig>,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            channels: vec![ChannelConfig::global()],
            fragments: Vec::new(),
        }
    }
}

/// Message listener behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Run listeners against a copy of the event and log, but never apply,
    /// their edits and cancellations.
    pub dry_run: bool,
    /// Consecutive listener failures before the listener is disabled.
    pub circuit_breaker_threshold: u64,
    /// Seconds a disabled listener stays disabled.
    pub circuit_breaker_cooldown_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown_secs: 60,
        }
    }
}

/// How a channel decides who may speak in it and who hears it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Fallback channel: everyone may speak, every online player listens.
    Global,
    /// Gated by a permission node and an optional sender allowlist.
    #[default]
    Permission,
}

/// A single channel definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Unique, case-insensitive channel key.
    pub key: String,
    pub kind: ChannelKind,
    /// Shown through `%channel%`. Defaults to the key.
    pub display_name: Option<String>,
    /// Higher wins when a player is in several channels.
    pub priority: i32,
    /// Replaces `@<name>` mentions; `%name%` is the mentioned recipient.
    pub ping_format: Option<String>,
    /// Permission node for `permission` channels. Defaults to
    /// `huddle.channel.<key>`.
    pub permission: Option<String>,
    /// Sender names allowed to speak. Empty means anyone with the permission.
    /// Supports `*` wildcards.
    pub allowlist: Vec<String>,
    /// Join this channel automatically whenever it is valid for the player.
    pub auto_join: bool,
    pub format: Vec<FormatSection>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            kind: ChannelKind::default(),
            display_name: None,
            priority: 0,
            ping_format: None,
            permission: None,
            allowlist: Vec::new(),
            auto_join: false,
            format: vec![FormatSection::text("%message%")],
        }
    }
}

impl ChannelConfig {
    /// The channel every config falls back to when none is given.
    #[must_use]
    pub fn global() -> Self {
        Self {
            key: "global".into(),
            kind: ChannelKind::Global,
            display_name: Some("Global".into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    /// Permission node gating a `permission` channel.
    #[must_use]
    pub fn permission_node(&self) -> String {
        match self.permission.as_deref() {
            Some(permission) if !permission.is_empty() => permission.to_string(),
            _ => format!("huddle.channel.{}", self.key.to_lowercase()),
        }
    }
}

/// One ordered, permission-gated piece of a channel's output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormatSection {
    /// Sender permission required for this section. Empty means unrestricted.
    pub permission: String,
    /// Template; `%message%`, `%channel%` and `%channel_id%` are substituted.
    pub text: String,
    pub hover_text: Option<String>,
    pub click_action: Option<ClickAction>,
    pub click_text: Option<String>,
}

impl FormatSection {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = permission.into();
        self
    }

    #[must_use]
    pub fn with_hover(mut self, hover_text: impl Into<String>) -> Self {
        self.hover_text = Some(hover_text.into());
        self
    }

    #[must_use]
    pub fn with_click(mut self, action: ClickAction, click_text: impl Into<String>) -> Self {
        self.click_action = Some(action);
        self.click_text = Some(click_text.into());
        self
    }

    /// Hover template, if one is configured and non-empty.
    #[must_use]
    pub fn hover(&self) -> Option<&str> {
        self.hover_text.as_deref().filter(|text| !text.is_empty())
    }

    /// Click action and template, only when both are configured.
    #[must_use]
    pub fn click(&self) -> Option<(ClickAction, &str)> {
        match (self.click_action, self.click_text.as_deref()) {
            (Some(action), Some(text)) if !text.is_empty() => Some((action, text)),
            _ => None,
        }
    }
}

/// What happens when a client clicks a segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    OpenUrl,
    OpenFile,
    RunCommand,
    SuggestCommand,
    ChangePage,
    CopyToClipboard,
}

impl ClickAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenUrl => "open_url",
            Self::OpenFile => "open_file",
            Self::RunCommand => "run_command",
            Self::SuggestCommand => "suggest_command",
            Self::ChangePage => "change_page",
            Self::CopyToClipboard => "copy_to_clipboard",
        }
    }
}

/// A fragment defined in config: fixed text spliced in for `[key]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Lowercase tokens this fragment answers to.
    pub keys: Vec<String>,
    /// Template rendered in place of the token. Placeholders are expanded
    /// against the sender.
    pub text: String,
    pub hover_text: Option<String>,
}
