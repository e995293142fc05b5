//! Orchestrates a message from resolution through delivery and logging.

use std::{sync::Arc, time::Instant};

use {
    huddle_channels::{ChannelRegistry, ChatChannel, ChatPlayer},
    huddle_config::HuddleConfig,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use huddle_metrics::{counter, dispatch as dispatch_metrics, histogram, labels};

use crate::{
    Result,
    event::ChannelMessageEvent,
    format::FormatPipeline,
    fragment::{ChatFragment, FragmentRegistry, StaticFragment},
    legacy::{LegacyParser, TextParser, strip_color},
    listeners::ListenerRegistry,
    message::{ChatDelivery, ChatMessage},
    message_log::{MessageLog, TracingMessageLog},
    placeholder::{NoopExpander, PlaceholderExpander},
    resolver::ChannelResolver,
    scheduler::{InlineScheduler, TaskScheduler},
};

/// How a message left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Formatted and handed to every recipient; `failed` deliveries errored.
    Delivered {
        channel: String,
        recipients: usize,
        failed: usize,
    },
    /// The resolved channel is not valid for the sender.
    InvalidChannel { channel: String },
    /// A listener vetoed the message.
    Cancelled { channel: String },
}

/// Resolves, dispatches, formats, delivers, and logs chat messages.
pub struct MessageHandler {
    resolver: ChannelResolver,
    pipeline: FormatPipeline,
    listeners: ListenerRegistry,
    delivery: Arc<dyn ChatDelivery>,
    log: Arc<dyn MessageLog>,
    scheduler: Arc<dyn TaskScheduler>,
}

impl MessageHandler {
    pub fn builder(
        registry: Arc<ChannelRegistry>,
        delivery: Arc<dyn ChatDelivery>,
    ) -> MessageHandlerBuilder {
        MessageHandlerBuilder::new(registry, delivery)
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        self.resolver.registry()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn fragments(&self) -> &Arc<FragmentRegistry> {
        self.pipeline.fragments()
    }

    /// Register a fragment. Returns `false` if this instance is already
    /// registered.
    pub fn add_fragment(&self, fragment: Arc<dyn ChatFragment>) -> bool {
        self.pipeline.fragments().add(fragment)
    }

    /// Send `text` from `sender`, to `forced` if given or else to the channel
    /// resolved for the sender.
    ///
    /// On the scheduler's primary context the work is handed off and this
    /// returns immediately; elsewhere it runs to completion first.
    pub fn handle_message(
        self: &Arc<Self>,
        forced: Option<Arc<dyn ChatChannel>>,
        sender: Arc<dyn ChatPlayer>,
        text: impl Into<String>,
    ) -> Result<()> {
        let text = text.into();
        if self.scheduler.is_primary() {
            let handler = Arc::clone(self);
            return self.scheduler.run_async(Box::new(move || {
                handler.process_message(forced, &sender, &text);
            }));
        }
        self.process_message(forced, &sender, &text);
        Ok(())
    }

    /// Run the whole pipeline on the calling thread.
    pub fn process_message(
        &self,
        forced: Option<Arc<dyn ChatChannel>>,
        sender: &Arc<dyn ChatPlayer>,
        text: &str,
    ) -> DispatchOutcome {
        let start = Instant::now();
        let channel = self.resolver.resolve(forced, sender.as_ref());
        let channel_key = channel.key().to_string();

        if !channel.is_valid(sender.as_ref()) {
            debug!(
                sender = sender.name(),
                channel = %channel_key,
                "sender may not speak in channel, dropping message"
            );
            #[cfg(feature = "metrics")]
            counter!(dispatch_metrics::INVALID_CHANNEL_TOTAL).increment(1);
            return DispatchOutcome::InvalidChannel {
                channel: channel_key,
            };
        }

        let mut event = ChannelMessageEvent::new(
            Arc::clone(&channel),
            Arc::clone(sender),
            text,
            channel.subscribers(),
        );
        self.listeners.fire(&mut event);
        if event.is_cancelled() {
            debug!(sender = sender.name(), channel = %channel_key, "message cancelled");
            #[cfg(feature = "metrics")]
            counter!(dispatch_metrics::CANCELLED_TOTAL, labels::CHANNEL => channel_key.clone())
                .increment(1);
            return DispatchOutcome::Cancelled {
                channel: channel_key,
            };
        }
        let (message, recipients) = event.into_parts();

        let failed = self.send_message(&message, &channel, sender, &recipients);

        let logged = ChatMessage {
            channel: Arc::clone(&channel),
            sender: Arc::clone(sender),
            rendered: None,
            text: strip_color(&message),
        };
        if let Err(e) = self.log.log_message(&logged) {
            warn!(channel = %channel_key, error = %e, "failed to log message");
        }

        debug!(
            sender = sender.name(),
            channel = %channel_key,
            recipients = recipients.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "message dispatched"
        );
        #[cfg(feature = "metrics")]
        {
            counter!(dispatch_metrics::MESSAGES_TOTAL, labels::CHANNEL => channel_key.clone())
                .increment(1);
            histogram!(dispatch_metrics::PROCESSING_DURATION_SECONDS)
                .record(start.elapsed().as_secs_f64());
        }

        DispatchOutcome::Delivered {
            channel: channel_key,
            recipients: recipients.len(),
            failed,
        }
    }

    /// Render and deliver `message` to each recipient. A failed delivery is
    /// logged and does not affect the others. Returns the number of failures.
    pub fn send_message(
        &self,
        message: &str,
        channel: &Arc<dyn ChatChannel>,
        sender: &Arc<dyn ChatPlayer>,
        recipients: &[Arc<dyn ChatPlayer>],
    ) -> usize {
        let mut failed = 0;
        for recipient in recipients {
            let rendered =
                self.pipeline
                    .render(channel.as_ref(), sender.as_ref(), recipient.as_ref(), message);
            let chat_message = ChatMessage {
                channel: Arc::clone(channel),
                sender: Arc::clone(sender),
                rendered: Some(rendered),
                text: message.to_string(),
            };
            if let Err(e) = self.delivery.deliver(recipient.as_ref(), &chat_message) {
                failed += 1;
                warn!(
                    recipient = recipient.id(),
                    channel = channel.key(),
                    error = %e,
                    "delivery failed"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    dispatch_metrics::DELIVERY_FAILURES_TOTAL,
                    labels::CHANNEL => channel.key().to_string()
                )
                .increment(1);
            }
        }
        failed
    }
}

/// Assembles a [`MessageHandler`]. Unset collaborators default to tracing
/// logs, no placeholder expansion, `&`-code parsing, and inline execution.
pub struct MessageHandlerBuilder {
    registry: Arc<ChannelRegistry>,
    delivery: Arc<dyn ChatDelivery>,
    log: Arc<dyn MessageLog>,
    expander: Arc<dyn PlaceholderExpander>,
    parser: Arc<dyn TextParser>,
    fragments: Arc<FragmentRegistry>,
    listeners: ListenerRegistry,
    scheduler: Arc<dyn TaskScheduler>,
}

impl MessageHandlerBuilder {
    fn new(registry: Arc<ChannelRegistry>, delivery: Arc<dyn ChatDelivery>) -> Self {
        Self {
            registry,
            delivery,
            log: Arc::new(TracingMessageLog),
            expander: Arc::new(NoopExpander),
            parser: Arc::new(LegacyParser::default()),
            fragments: Arc::new(FragmentRegistry::default()),
            listeners: ListenerRegistry::new(),
            scheduler: Arc::new(InlineScheduler),
        }
    }

    /// Listener settings and fragments from `config`.
    #[must_use]
    pub fn config(mut self, config: &HuddleConfig) -> Self {
        self.listeners = ListenerRegistry::from_config(&config.dispatch);
        for fragment in &config.fragments {
            self.fragments.add(Arc::new(StaticFragment::from(fragment)));
        }
        self
    }

    #[must_use]
    pub fn message_log(mut self, log: Arc<dyn MessageLog>) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn expander(mut self, expander: Arc<dyn PlaceholderExpander>) -> Self {
        self.expander = expander;
        self
    }

    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn TextParser>) -> Self {
        self.parser = parser;
        self
    }

    #[must_use]
    pub fn fragments(mut self, fragments: Arc<FragmentRegistry>) -> Self {
        self.fragments = fragments;
        self
    }

    #[must_use]
    pub fn listeners(mut self, listeners: ListenerRegistry) -> Self {
        self.listeners = listeners;
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn build(self) -> MessageHandler {
        MessageHandler {
            resolver: ChannelResolver::new(self.registry),
            pipeline: FormatPipeline::new(self.fragments, self.expander, self.parser),
            listeners: self.listeners,
            delivery: self.delivery,
            log: self.log,
            scheduler: self.scheduler,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::Mutex, thread};

    use {
        huddle_channels::memory::{InMemoryDirectory, InMemoryPlayer},
        huddle_config::{ChannelConfig, FormatSection, FragmentConfig},
    };

    use super::*;
    use crate::{
        Error,
        listeners::FnListener,
        message::InboxDelivery,
        message_log::MemoryMessageLog,
        scheduler::TokioScheduler,
    };

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        registry: Arc<ChannelRegistry>,
        inbox: Arc<InboxDelivery>,
        log: Arc<MemoryMessageLog>,
    }

    impl Fixture {
        fn new(channels: Vec<ChannelConfig>) -> Self {
            let mut all = vec![ChannelConfig {
                format: vec![FormatSection::text("<%channel_id%> %message%")],
                ..ChannelConfig::global()
            }];
            all.extend(channels);
            let config = HuddleConfig {
                channels: all,
                ..HuddleConfig::default()
            };
            let directory = Arc::new(InMemoryDirectory::default());
            let registry =
                Arc::new(ChannelRegistry::from_config(&config, directory.clone()).unwrap());
            Self {
                directory,
                registry,
                inbox: Arc::new(InboxDelivery::default()),
                log: Arc::new(MemoryMessageLog::default()),
            }
        }

        fn builder(&self) -> MessageHandlerBuilder {
            MessageHandler::builder(Arc::clone(&self.registry), self.inbox.clone())
                .message_log(self.log.clone())
        }

        fn player(&self, id: &str, name: &str) -> Arc<InMemoryPlayer> {
            let player = Arc::new(InMemoryPlayer::new(id, name));
            self.directory.add(player.clone());
            player
        }
    }

    fn permission_channel(key: &str, priority: i32) -> ChannelConfig {
        ChannelConfig {
            key: key.into(),
            priority,
            format: vec![FormatSection::text("<%channel_id%> %message%")],
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn delivers_to_every_subscriber_and_logs_once() {
        let fixture = Fixture::new(vec![]);
        let alice = fixture.player("1", "alice");
        fixture.player("2", "bob");
        let handler = fixture.builder().build();

        let outcome = handler.process_message(None, &(alice as Arc<dyn ChatPlayer>), "&chi all");
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                channel: "global".into(),
                recipients: 2,
                failed: 0,
            }
        );

        let delivered = fixture.inbox.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].rendered.to_plain_text(), "<global> hi all");
        assert_eq!(delivered[0].text, "&chi all");

        let entries = fixture.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "hi all");
    }

    #[test]
    fn cancelled_message_is_neither_delivered_nor_logged() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        let handler = fixture.builder().build();
        handler
            .listeners()
            .register(Arc::new(FnListener::new("mute", |event: &mut ChannelMessageEvent| {
                event.set_cancelled(true);
                Ok(())
            })));

        let outcome = handler.process_message(None, &alice, "hello");
        assert_eq!(
            outcome,
            DispatchOutcome::Cancelled {
                channel: "global".into()
            }
        );
        assert!(fixture.inbox.delivered().is_empty());
        assert!(fixture.log.is_empty());
    }

    #[test]
    fn rewritten_message_is_formatted_and_logged() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        let handler = fixture.builder().build();
        handler
            .listeners()
            .register(Arc::new(FnListener::new("filter", |event: &mut ChannelMessageEvent| {
                let cleaned = event.message().replace("darn", "****");
                event.set_message(cleaned);
                Ok(())
            })));

        handler.process_message(None, &alice, "oh darn");
        assert_eq!(
            fixture.inbox.delivered()[0].rendered.to_plain_text(),
            "<global> oh ****"
        );
        assert_eq!(fixture.log.entries()[0].body, "oh ****");
    }

    #[test]
    fn listener_recipient_changes_are_honored() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        fixture.player("2", "bob");
        let outsider: Arc<dyn ChatPlayer> = Arc::new(InMemoryPlayer::new("9", "spy"));
        let handler = fixture.builder().build();
        handler.listeners().register(Arc::new(FnListener::new(
            "reroute",
            move |event: &mut ChannelMessageEvent| {
                event.remove_recipient("2");
                event.add_recipient(Arc::clone(&outsider));
                Ok(())
            },
        )));

        handler.process_message(None, &alice, "psst");
        let ids: Vec<String> = fixture
            .inbox
            .delivered()
            .into_iter()
            .map(|d| d.recipient)
            .collect();
        assert_eq!(ids, vec!["1", "9"]);
    }

    #[test]
    fn invalid_forced_channel_aborts_silently() {
        let fixture = Fixture::new(vec![permission_channel("staff", 1)]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        let handler = fixture.builder().build();

        let staff = fixture.registry.get("staff");
        let outcome = handler.process_message(staff, &alice, "hello");
        assert_eq!(
            outcome,
            DispatchOutcome::InvalidChannel {
                channel: "staff".into()
            }
        );
        assert!(fixture.inbox.delivered().is_empty());
        assert!(fixture.log.is_empty());
    }

    #[test]
    fn highest_priority_channel_is_chosen_and_kept() {
        let fixture = Fixture::new(vec![permission_channel("a", 1), permission_channel("b", 5)]);
        let alice = fixture.player("1", "alice");
        let bob = fixture.player("2", "bob");
        for player in [&alice, &bob] {
            player.grant_permission("huddle.channel.a");
            player.grant_permission("huddle.channel.b");
        }
        for key in ["a", "b"] {
            alice.memberships().join(&fixture.registry.get(key).unwrap());
        }
        bob.memberships().join(&fixture.registry.get("b").unwrap());

        let handler = fixture.builder().build();
        let sender: Arc<dyn ChatPlayer> = alice.clone();
        for _ in 0..2 {
            let outcome = handler.process_message(None, &sender, "hi");
            assert!(matches!(outcome, DispatchOutcome::Delivered { ref channel, recipients: 2, .. } if channel == "b"));
        }
        assert_eq!(alice.active_channel().unwrap().key(), "b");
        assert!(fixture
            .inbox
            .delivered()
            .iter()
            .all(|d| d.rendered.to_plain_text() == "<b> hi"));
    }

    struct FlakyDelivery {
        inner: InboxDelivery,
        fail_for: &'static str,
    }

    impl ChatDelivery for FlakyDelivery {
        fn deliver(&self, recipient: &dyn ChatPlayer, message: &ChatMessage) -> Result<()> {
            if recipient.id() == self.fail_for {
                return Err(Error::delivery(recipient.id(), "connection reset"));
            }
            self.inner.deliver(recipient, message)
        }
    }

    #[test]
    fn failed_delivery_does_not_stop_others() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        fixture.player("2", "bob");
        fixture.player("3", "carol");
        let flaky = Arc::new(FlakyDelivery {
            inner: InboxDelivery::default(),
            fail_for: "2",
        });
        let handler = MessageHandler::builder(Arc::clone(&fixture.registry), flaky.clone())
            .message_log(fixture.log.clone())
            .build();

        let outcome = handler.process_message(None, &alice, "hi");
        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                channel: "global".into(),
                recipients: 3,
                failed: 1,
            }
        );
        assert_eq!(flaky.inner.delivered().len(), 2);
        assert_eq!(fixture.log.len(), 1);
    }

    #[test]
    fn configured_fragments_are_spliced() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        fixture.player("2", "bob");
        let config = HuddleConfig {
            fragments: vec![FragmentConfig {
                keys: vec!["shrug".into()],
                text: "¯\\_(ツ)_/¯".into(),
                hover_text: None,
            }],
            ..HuddleConfig::default()
        };
        let handler = fixture.builder().config(&config).build();
        assert_eq!(handler.fragments().len(), 1);

        handler.process_message(None, &alice, "@Bob [shrug]");
        let to_bob = fixture.inbox.for_recipient("2");
        assert_eq!(to_bob[0].rendered.to_plain_text(), "<global> @Bob ¯\\_(ツ)_/¯");
    }

    #[test]
    fn inline_handle_message_completes_before_returning() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        let handler = Arc::new(fixture.builder().build());

        handler.handle_message(None, alice, "sync").unwrap();
        assert_eq!(fixture.inbox.delivered().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn primary_context_hands_processing_off() {
        let fixture = Fixture::new(vec![]);
        let alice: Arc<dyn ChatPlayer> = fixture.player("1", "alice");
        let handler = Arc::new(
            fixture
                .builder()
                .scheduler(Arc::new(TokioScheduler::current().unwrap()))
                .build(),
        );

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(None));
        let seen_by_listener = Arc::clone(&seen);
        handler.listeners().register(Arc::new(FnListener::new(
            "thread-probe",
            move |_: &mut ChannelMessageEvent| {
                *seen_by_listener.lock().unwrap() = Some(thread::current().id());
                let _ = tx.send(());
                Ok(())
            },
        )));

        handler.handle_message(None, alice, "async").unwrap();
        rx.recv().await.unwrap();

        let worker = seen.lock().unwrap().unwrap();
        assert_ne!(worker, thread::current().id());
    }
}
