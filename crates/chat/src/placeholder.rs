//! External placeholder expansion applied to format templates.

use std::any::Any;

use huddle_channels::memory::PlayerProfile;

/// Expands host-defined placeholders in a template.
///
/// `handle` is the sender's native handle, if the player exposes one.
pub trait PlaceholderExpander: Send + Sync {
    fn expand(&self, handle: Option<&dyn Any>, template: &str) -> String;
}

/// Leaves templates untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExpander;

impl PlaceholderExpander for NoopExpander {
    fn expand(&self, _handle: Option<&dyn Any>, template: &str) -> String {
        template.to_string()
    }
}

/// Expands `%player_name%` and `%player_displayname%` from a
/// [`PlayerProfile`] handle. Other handles leave the template unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileExpander;

impl PlaceholderExpander for ProfileExpander {
    fn expand(&self, handle: Option<&dyn Any>, template: &str) -> String {
        let Some(profile) = handle.and_then(|h| h.downcast_ref::<PlayerProfile>()) else {
            return template.to_string();
        };
        template
            .replace("%player_name%", &profile.name)
            .replace("%player_displayname%", &profile.display_name)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_placeholders_expand() {
        let profile = PlayerProfile {
            name: "alice".into(),
            display_name: "Alice the Bold".into(),
        };
        let out = ProfileExpander.expand(
            Some(&profile as &dyn Any),
            "%player_displayname% (%player_name%) %unknown%",
        );
        assert_eq!(out, "Alice the Bold (alice) %unknown%");
    }

    #[test]
    fn foreign_handle_is_ignored() {
        let handle = 42_u32;
        let out = ProfileExpander.expand(Some(&handle as &dyn Any), "%player_name%");
        assert_eq!(out, "%player_name%");
        assert_eq!(ProfileExpander.expand(None, "%player_name%"), "%player_name%");
    }
}
