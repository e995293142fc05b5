use std::{collections::HashMap, sync::Arc};

use {huddle_config::HuddleConfig, tracing::info};

#[cfg(feature = "metrics")]
use huddle_metrics::{channels as ch_metrics, gauge};

use crate::{
    Error, Result,
    channel::{ChatChannel, build_channel},
    player::PlayerDirectory,
};

/// Registry of all channels, keyed by lowercase channel key.
///
/// Built at startup and then shared read-only; exactly one global channel
/// always exists.
pub struct ChannelRegistry {
    channels: HashMap<String, Arc<dyn ChatChannel>>,
    global: Arc<dyn ChatChannel>,
}

impl ChannelRegistry {
    /// Create a registry holding only the global fallback channel.
    pub fn new(global: Arc<dyn ChatChannel>) -> Self {
        let mut channels = HashMap::new();
        channels.insert(global.key().to_lowercase(), Arc::clone(&global));
        Self { channels, global }
    }

    /// Build every channel in `config`, sharing `directory` for subscriber
    /// lookups.
    pub fn from_config(config: &HuddleConfig, directory: Arc<dyn PlayerDirectory>) -> Result<Self> {
        let mut globals = Vec::new();
        let mut others = Vec::new();
        for channel_config in &config.channels {
            if channel_config.key.trim().is_empty() {
                return Err(Error::invalid_input("channel key must not be empty"));
            }
            let channel = build_channel(channel_config, Arc::clone(&directory));
            if channel.is_global() {
                globals.push(channel);
            } else {
                others.push(channel);
            }
        }

        let mut globals = globals.into_iter();
        let global = globals.next().ok_or(Error::MissingGlobal)?;
        let extra: Vec<String> = globals.map(|c| c.key().to_string()).collect();
        if !extra.is_empty() {
            let mut keys = vec![global.key().to_string()];
            keys.extend(extra);
            return Err(Error::MultipleGlobal { keys });
        }

        let mut registry = Self::new(global);
        for channel in others {
            registry.register(channel)?;
        }
        info!(channels = registry.len(), "channel registry built");
        Ok(registry)
    }

    /// Register an additional channel. Keys are unique case-insensitively.
    pub fn register(&mut self, channel: Arc<dyn ChatChannel>) -> Result<()> {
        if channel.is_global() {
            return Err(Error::MultipleGlobal {
                keys: vec![self.global.key().to_string(), channel.key().to_string()],
            });
        }
        let key = channel.key().to_lowercase();
        if self.channels.contains_key(&key) {
            return Err(Error::duplicate_channel(channel.key()));
        }
        self.channels.insert(key, channel);
        #[cfg(feature = "metrics")]
        gauge!(ch_metrics::REGISTERED).set(self.channels.len() as f64);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ChatChannel>> {
        self.channels.get(&key.to_lowercase()).cloned()
    }

    /// The global fallback channel.
    pub fn global(&self) -> Arc<dyn ChatChannel> {
        Arc::clone(&self.global)
    }

    /// All channels, ordered by lowercase key.
    pub fn channels(&self) -> Vec<Arc<dyn ChatChannel>> {
        let mut keys: Vec<&String> = self.channels.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|k| self.channels.get(k).cloned())
            .collect()
    }

    /// Channel keys as configured, ordered case-insensitively.
    pub fn list(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.channels.values().map(|c| c.key()).collect();
        keys.sort_by_key(|k| k.to_lowercase());
        keys
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
