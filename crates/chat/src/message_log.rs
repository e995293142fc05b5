use std::{
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::info;

use crate::{Result, message::ChatMessage};

/// A single logged chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLogEntry {
    pub channel: String,
    pub sender_id: String,
    pub sender_name: String,
    /// Final message text with color codes stripped.
    pub body: String,
    pub created_at: i64,
}

impl MessageLogEntry {
    pub fn from_message(message: &ChatMessage) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Self {
            channel: message.channel.key().to_string(),
            sender_id: message.sender.id().to_string(),
            sender_name: message.sender.name().to_string(),
            body: message.text.clone(),
            created_at,
        }
    }
}

/// Receives every accepted, non-cancelled message once.
pub trait MessageLog: Send + Sync {
    fn log_message(&self, message: &ChatMessage) -> Result<()>;
}

/// Writes each message as a structured `info!` event on the `huddle::chat`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessageLog;

impl MessageLog for TracingMessageLog {
    fn log_message(&self, message: &ChatMessage) -> Result<()> {
        info!(
            target: "huddle::chat",
            channel = message.channel.key(),
            sender = message.sender.name(),
            "{}",
            message.text
        );
        Ok(())
    }
}

/// Keeps log entries in memory, newest last.
#[derive(Debug, Default)]
pub struct MemoryMessageLog {
    entries: Mutex<Vec<MessageLogEntry>>,
}

impl MemoryMessageLog {
    pub fn entries(&self) -> Vec<MessageLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent entries for a channel, newest first.
    pub fn list_by_channel(&self, channel: &str, limit: usize) -> Vec<MessageLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .filter(|e| huddle_channels::same_key(&e.channel, channel))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageLog for MemoryMessageLog {
    fn log_message(&self, message: &ChatMessage) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MessageLogEntry::from_message(message));
        Ok(())
    }
}
