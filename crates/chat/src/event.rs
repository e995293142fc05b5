use std::{fmt, sync::Arc};

use huddle_channels::{ChatChannel, ChatPlayer};

/// Raised once per message after recipients are computed and before
/// formatting. Listeners may rewrite the text, change the recipients, or
/// cancel delivery; the state left after all listeners ran is what gets sent.
///
/// Recipients form a set keyed by player id, kept in insertion order.
#[derive(Clone)]
pub struct ChannelMessageEvent {
    channel: Arc<dyn ChatChannel>,
    sender: Arc<dyn ChatPlayer>,
    message: String,
    recipients: Vec<Arc<dyn ChatPlayer>>,
    cancelled: bool,
}

impl ChannelMessageEvent {
    pub fn new(
        channel: Arc<dyn ChatChannel>,
        sender: Arc<dyn ChatPlayer>,
        message: impl Into<String>,
        recipients: impl IntoIterator<Item = Arc<dyn ChatPlayer>>,
    ) -> Self {
        let mut event = Self {
            channel,
            sender,
            message: message.into(),
            recipients: Vec::new(),
            cancelled: false,
        };
        event.set_recipients(recipients);
        event
    }

    pub fn channel(&self) -> &Arc<dyn ChatChannel> {
        &self.channel
    }

    pub fn sender(&self) -> &Arc<dyn ChatPlayer> {
        &self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn recipients(&self) -> &[Arc<dyn ChatPlayer>] {
        &self.recipients
    }

    /// Replace the recipients. Later duplicates of an id are dropped.
    pub fn set_recipients(&mut self, recipients: impl IntoIterator<Item = Arc<dyn ChatPlayer>>) {
        self.recipients.clear();
        for recipient in recipients {
            self.add_recipient(recipient);
        }
    }

    /// Add a recipient. Returns `false` if one with the same id is present.
    pub fn add_recipient(&mut self, recipient: Arc<dyn ChatPlayer>) -> bool {
        if self.has_recipient(recipient.id()) {
            return false;
        }
        self.recipients.push(recipient);
        true
    }

    pub fn remove_recipient(&mut self, id: &str) -> bool {
        let before = self.recipients.len();
        self.recipients.retain(|r| r.id() != id);
        self.recipients.len() != before
    }

    pub fn retain_recipients(&mut self, mut keep: impl FnMut(&dyn ChatPlayer) -> bool) {
        self.recipients.retain(|r| keep(r.as_ref()));
    }

    pub fn has_recipient(&self, id: &str) -> bool {
        self.recipients.iter().any(|r| r.id() == id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Final message text and recipients.
    pub fn into_parts(self) -> (String, Vec<Arc<dyn ChatPlayer>>) {
        (self.message, self.recipients)
    }
}

impl fmt::Debug for ChannelMessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recipients: Vec<&str> = self.recipients.iter().map(|r| r.id()).collect();
        f.debug_struct("ChannelMessageEvent")
            .field("channel", &self.channel.key())
            .field("sender", &self.sender.id())
            .field("message", &self.message)
            .field("recipients", &recipients)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
