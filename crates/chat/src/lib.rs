//! Chat message routing: channel resolution, listener dispatch, per-recipient
//! formatting with inline fragments and mention highlighting, delivery, and
//! logging.
//!
//! [`MessageHandler`] ties the pieces together; each collaborator it talks to
//! (delivery, message log, placeholder expansion, text parsing, scheduling) is
//! a trait with an in-process implementation here.

pub mod error;
pub mod event;
pub mod format;
pub mod fragment;
pub mod handler;
pub mod legacy;
pub mod listeners;
pub mod message;
pub mod message_log;
pub mod placeholder;
pub mod resolver;
pub mod scheduler;
pub mod text;

pub use {
    error::{Error, Result},
    event::ChannelMessageEvent,
    format::{FormatPipeline, highlight_mentions},
    fragment::{ChatFragment, FragmentRegistry, StaticFragment},
    handler::{DispatchOutcome, MessageHandler, MessageHandlerBuilder},
    legacy::{LegacyParser, TextParser, strip_color},
    listeners::{FnListener, ListenerRegistry, ListenerStats, MessageListener},
    message::{ChatDelivery, ChatMessage, InboxDelivery},
    message_log::{MemoryMessageLog, MessageLog, MessageLogEntry, TracingMessageLog},
    placeholder::{NoopExpander, PlaceholderExpander, ProfileExpander},
    resolver::{ChannelResolver, select_by_priority},
    scheduler::{InlineScheduler, TaskScheduler, TokioScheduler},
    text::{ClickEvent, Color, HoverEvent, Style, StyledText},
};
