use std::{
    fmt,
    sync::{Arc, Mutex},
};

use huddle_channels::{ChatChannel, ChatPlayer};

use crate::{Result, text::StyledText};

/// A message as handed to delivery and logging.
///
/// `rendered` is the per-recipient composite; it is `None` for the copy given
/// to the message log.
#[derive(Clone)]
pub struct ChatMessage {
    pub channel: Arc<dyn ChatChannel>,
    pub sender: Arc<dyn ChatPlayer>,
    pub rendered: Option<StyledText>,
    pub text: String,
}

impl fmt::Debug for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatMessage")
            .field("channel", &self.channel.key())
            .field("sender", &self.sender.id())
            .field("rendered", &self.rendered)
            .field("text", &self.text)
            .finish()
    }
}

/// Sends a rendered message to one recipient.
pub trait ChatDelivery: Send + Sync {
    fn deliver(&self, recipient: &dyn ChatPlayer, message: &ChatMessage) -> Result<()>;
}

/// One delivered message, as recorded by [`InboxDelivery`].
#[derive(Debug, Clone)]
pub struct Delivered {
    pub recipient: String,
    pub channel: String,
    pub rendered: StyledText,
    pub text: String,
}

/// Collects deliveries in memory.
#[derive(Debug, Default)]
pub struct InboxDelivery {
    delivered: Mutex<Vec<Delivered>>,
}

impl InboxDelivery {
    /// Everything delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Messages delivered to one recipient id.
    pub fn for_recipient(&self, recipient: &str) -> Vec<Delivered> {
        self.delivered()
            .into_iter()
            .filter(|d| d.recipient == recipient)
            .collect()
    }
}

impl ChatDelivery for InboxDelivery {
    fn deliver(&self, recipient: &dyn ChatPlayer, message: &ChatMessage) -> Result<()> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Delivered {
                recipient: recipient.id().to_string(),
                channel: message.channel.key().to_string(),
                rendered: message.rendered.clone().unwrap_or_default(),
                text: message.text.clone(),
            });
        Ok(())
    }
}
