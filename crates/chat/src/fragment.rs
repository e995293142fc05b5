//! Inline `[token]` fragments spliced into chat messages.

use std::sync::{Arc, RwLock};

use {
    huddle_channels::ChatPlayer,
    huddle_config::FragmentConfig,
    tracing::debug,
};

use crate::{
    legacy::{LegacyParser, TextParser},
    text::{HoverEvent, StyledText},
};

/// A provider of a snippet that replaces `[key]` in message text.
pub trait ChatFragment: Send + Sync {
    /// Lowercase tokens this fragment answers to.
    fn format_keys(&self) -> &[String];

    /// Render the snippet for the message's sender.
    fn create_fragment(&self, sender: &dyn ChatPlayer) -> StyledText;
}

/// Registered fragments, unique by identity and searched in registration
/// order.
#[derive(Default)]
pub struct FragmentRegistry {
    fragments: RwLock<Vec<Arc<dyn ChatFragment>>>,
}

impl FragmentRegistry {
    /// Register a fragment. Returns `false` if this exact instance is already
    /// registered; distinct fragments sharing keys are both kept.
    pub fn add(&self, fragment: Arc<dyn ChatFragment>) -> bool {
        let mut fragments = self.fragments.write().unwrap_or_else(|e| e.into_inner());
        if fragments.iter().any(|f| Arc::ptr_eq(f, &fragment)) {
            return false;
        }
        debug!(keys = ?fragment.format_keys(), "fragment registered");
        fragments.push(fragment);
        true
    }

    /// First registered fragment recognizing `key` (compared lowercase).
    pub fn find(&self, key: &str) -> Option<Arc<dyn ChatFragment>> {
        let key = key.to_lowercase();
        self.fragments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|f| f.format_keys().iter().any(|k| *k == key))
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn ChatFragment>> {
        self.fragments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.fragments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fragment defined in configuration: legacy-coded text where `%name%` is
/// the sender's name, with optional hover text.
#[derive(Debug, Clone)]
pub struct StaticFragment {
    keys: Vec<String>,
    text: String,
    hover_text: Option<String>,
    parser: LegacyParser,
}

impl StaticFragment {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>, text: impl Into<String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
            text: text.into(),
            hover_text: None,
            parser: LegacyParser::default(),
        }
    }

    #[must_use]
    pub fn with_hover(mut self, hover_text: impl Into<String>) -> Self {
        self.hover_text = Some(hover_text.into());
        self
    }
}

impl From<&FragmentConfig> for StaticFragment {
    fn from(config: &FragmentConfig) -> Self {
        let fragment = Self::new(config.keys.iter().cloned(), config.text.clone());
        match config.hover_text.as_deref().filter(|h| !h.is_empty()) {
            Some(hover) => fragment.with_hover(hover),
            None => fragment,
        }
    }
}

impl ChatFragment for StaticFragment {
    fn format_keys(&self) -> &[String] {
        &self.keys
    }

    fn create_fragment(&self, sender: &dyn ChatPlayer) -> StyledText {
        let body = self.parser.parse(&self.text.replace("%name%", sender.name()));
        let hover = self.hover_text.as_deref().map(|hover| {
            HoverEvent::show_text(self.parser.parse(&hover.replace("%name%", sender.name())))
        });
        StyledText::builder().append(body).hover_event(hover).build()
    }
}
