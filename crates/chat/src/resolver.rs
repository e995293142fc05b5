use std::sync::Arc;

use {
    huddle_channels::{ChannelRegistry, ChatChannel, ChatPlayer},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use huddle_metrics::{channels as ch_metrics, counter, labels};

/// Picks the channel a message is sent to.
pub struct ChannelResolver {
    registry: Arc<ChannelRegistry>,
}

impl ChannelResolver {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Resolve the target channel for `sender`.
    ///
    /// A forced channel is returned as is. Otherwise the sender's memberships
    /// are refreshed, the remembered active channel is reused while valid, and
    /// failing that the highest-priority joined channel is picked and
    /// remembered. With no joined channels the global channel is used.
    ///
    /// The result is not checked for validity.
    pub fn resolve(
        &self,
        forced: Option<Arc<dyn ChatChannel>>,
        sender: &dyn ChatPlayer,
    ) -> Arc<dyn ChatChannel> {
        if let Some(channel) = forced {
            return channel;
        }

        sender.update_channels(&self.registry);

        if let Some(active) = sender.active_channel()
            && active.is_valid(sender)
        {
            return active;
        }

        match select_by_priority(&sender.active_channels()) {
            Some(channel) => {
                debug!(
                    sender = sender.name(),
                    channel = channel.key(),
                    "selected active channel by priority"
                );
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::ACTIVE_SELECTED_TOTAL, labels::CHANNEL => channel.key().to_string())
                    .increment(1);
                sender.set_active_channel(&channel);
                channel
            },
            None => self.registry.global(),
        }
    }
}

/// Highest priority wins; equal priorities fall back to the lowercase key,
/// ascending.
pub fn select_by_priority(candidates: &[Arc<dyn ChatChannel>]) -> Option<Arc<dyn ChatChannel>> {
    candidates
        .iter()
        .min_by(|a, b| {
            b.configuration()
                .priority
                .cmp(&a.configuration().priority)
                .then_with(|| a.key().to_lowercase().cmp(&b.key().to_lowercase()))
        })
        .cloned()
}
