//! Per-recipient rendering of a message through a channel's format sections.

use std::sync::{Arc, LazyLock};

use {
    huddle_channels::{ChatChannel, ChatPlayer},
    huddle_config::FormatSection,
    regex::{NoExpand, Regex, RegexBuilder},
    tracing::warn,
};

use crate::{
    fragment::FragmentRegistry,
    legacy::{LegacyParser, TextParser, strip_color},
    placeholder::{NoopExpander, PlaceholderExpander},
    text::{ClickEvent, HoverEvent, StyledText},
};

#[allow(clippy::expect_used)]
static FRAGMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<key>\S+)\]").expect("fragment pattern is valid"));

const MESSAGE_PLACEHOLDER: &str = "%message%";

/// Replace every `@<name>` (case-insensitive) with the ping format, where
/// `%name%` in the format is the recipient's name.
pub fn highlight_mentions(message: &str, name: &str, ping_format: &str) -> String {
    let pattern = regex::escape(&format!("@{name}"));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => {
            let ping = ping_format.replace("%name%", name);
            re.replace_all(message, NoExpand(&ping)).into_owned()
        },
        Err(e) => {
            warn!(mention = name, error = %e, "could not build mention pattern");
            message.to_string()
        },
    }
}

/// Renders a channel's format sections into one composite per recipient.
pub struct FormatPipeline {
    fragments: Arc<FragmentRegistry>,
    expander: Arc<dyn PlaceholderExpander>,
    parser: Arc<dyn TextParser>,
}

impl Default for FormatPipeline {
    fn default() -> Self {
        Self::new(
            Arc::new(FragmentRegistry::default()),
            Arc::new(NoopExpander),
            Arc::new(LegacyParser::default()),
        )
    }
}

impl FormatPipeline {
    pub fn new(
        fragments: Arc<FragmentRegistry>,
        expander: Arc<dyn PlaceholderExpander>,
        parser: Arc<dyn TextParser>,
    ) -> Self {
        Self {
            fragments,
            expander,
            parser,
        }
    }

    pub fn fragments(&self) -> &Arc<FragmentRegistry> {
        &self.fragments
    }

    /// Render `message` as `recipient` sees it.
    ///
    /// Sections the sender lacks permission for are skipped. The message is
    /// color-stripped, mentions of the recipient are highlighted, and `[key]`
    /// tokens are replaced by registered fragments.
    pub fn render(
        &self,
        channel: &dyn ChatChannel,
        sender: &dyn ChatPlayer,
        recipient: &dyn ChatPlayer,
        message: &str,
    ) -> StyledText {
        let configuration = channel.configuration();
        let mut stripped = strip_color(message);
        if let Some(ping) = configuration.ping_format() {
            stripped = highlight_mentions(&stripped, recipient.name(), ping);
        }

        let mut out = StyledText::builder();
        for section in &configuration.sections {
            if !section.permission.is_empty() && !sender.has_permission(&section.permission) {
                continue;
            }
            let template = self.expand(channel, sender, &section.text);
            for segment in self.render_section(channel, sender, section, &template, &stripped) {
                out = out.append(segment);
            }
        }
        out.build()
    }

    fn render_section(
        &self,
        channel: &dyn ChatChannel,
        sender: &dyn ChatPlayer,
        section: &FormatSection,
        template: &str,
        message: &str,
    ) -> Vec<StyledText> {
        if !template.contains(MESSAGE_PLACEHOLDER) || self.fragments.is_empty() {
            return vec![self.segment(channel, sender, section, template, message)];
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in FRAGMENT_PATTERN.captures_iter(message) {
            let (Some(token), Some(key)) = (caps.get(0), caps.name("key")) else {
                continue;
            };
            segments.push(self.segment(
                channel,
                sender,
                section,
                template,
                &message[last..token.start()],
            ));
            if let Some(fragment) = self.fragments.find(key.as_str()) {
                segments.push(fragment.create_fragment(sender));
            }
            last = token.end();
        }
        if last < message.len() {
            segments.push(self.segment(channel, sender, section, template, &message[last..]));
        }
        segments
    }

    /// One normal segment: the template with `%message%` replaced, carrying
    /// this section's hover and click, if any.
    fn segment(
        &self,
        channel: &dyn ChatChannel,
        sender: &dyn ChatPlayer,
        section: &FormatSection,
        template: &str,
        message: &str,
    ) -> StyledText {
        let body = self
            .parser
            .parse(&template.replace(MESSAGE_PLACEHOLDER, message));
        let hover = section.hover().map(|hover| {
            HoverEvent::show_text(self.parser.parse(&self.expand(channel, sender, hover)))
        });
        let click = section
            .click()
            .map(|(action, text)| ClickEvent::new(action, self.expand(channel, sender, text)));
        StyledText::builder()
            .append(body)
            .hover_event(hover)
            .click_event(click)
            .build()
    }

    /// External placeholders first, then `%channel%` and `%channel_id%`.
    fn expand(&self, channel: &dyn ChatChannel, sender: &dyn ChatPlayer, template: &str) -> String {
        self.expander
            .expand(sender.native_handle(), template)
            .replace("%channel%", &channel.configuration().display_name)
            .replace("%channel_id%", &channel.key().to_lowercase())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        huddle_channels::{
            ChannelConfiguration, GlobalChannel,
            memory::{InMemoryDirectory, InMemoryPlayer},
        },
        huddle_config::ClickAction,
        rstest::rstest,
    };

    use super::*;
    use crate::{fragment::StaticFragment, placeholder::ProfileExpander, text::Color};

    fn channel(sections: Vec<FormatSection>, ping: Option<&str>) -> GlobalChannel {
        GlobalChannel::new(
            "Global",
            ChannelConfiguration {
                priority: 0,
                display_name: "The Lobby".into(),
                ping_format: ping.map(str::to_string),
                sections,
            },
            Arc::new(InMemoryDirectory::default()),
        )
    }

    fn pipeline_with(fragments: &[(&str, &str)]) -> FormatPipeline {
        let registry = Arc::new(FragmentRegistry::default());
        for (key, text) in fragments {
            registry.add(Arc::new(StaticFragment::new([*key], *text)));
        }
        FormatPipeline::new(
            registry,
            Arc::new(ProfileExpander),
            Arc::new(LegacyParser::default()),
        )
    }

    fn plain_segments(rendered: &StyledText) -> Vec<String> {
        rendered.extra.iter().map(StyledText::to_plain_text).collect()
    }

    #[test]
    fn only_permitted_sections_render_in_order() {
        let channel = channel(
            vec![
                FormatSection::text("[staff] ").with_permission("huddle.format.staff"),
                FormatSection::text("<%player_name%> "),
                FormatSection::text("[vip] ").with_permission("huddle.format.vip"),
                FormatSection::text("%message%"),
            ],
            None,
        );
        let sender = InMemoryPlayer::new("1", "alice").with_permission("huddle.format.vip");
        let recipient = InMemoryPlayer::new("2", "bob");

        let rendered = FormatPipeline::default().render(&channel, &sender, &recipient, "hi");
        // Noop expander leaves %player_name% alone.
        assert_eq!(rendered.to_plain_text(), "<%player_name%> [vip] hi");

        let rendered = pipeline_with(&[]).render(&channel, &sender, &recipient, "hi");
        assert_eq!(rendered.to_plain_text(), "<alice> [vip] hi");
    }

    #[test]
    fn channel_placeholders_and_color_stripping() {
        let channel = channel(vec![FormatSection::text("&7[%channel%|%channel_id%] &f%message%")], None);
        let alice = InMemoryPlayer::new("1", "alice");

        let rendered = FormatPipeline::default().render(&channel, &alice, &alice, "&chello &lthere");
        assert_eq!(rendered.to_plain_text(), "[The Lobby|global] hello there");
    }

    #[test]
    fn message_text_is_not_reexpanded() {
        let channel = channel(vec![FormatSection::text("%message%")], None);
        let alice = InMemoryPlayer::new("1", "alice");
        let rendered = pipeline_with(&[]).render(&channel, &alice, &alice, "%channel% %player_name%");
        assert_eq!(rendered.to_plain_text(), "%channel% %player_name%");
    }

    #[rstest]
    #[case(&[("foo", "FOO")], "hello [foo] world", &["hello ", "FOO", " world"])]
    #[case(&[("foo", "FOO")], "hello [bar] world", &["hello ", " world"])]
    #[case(&[("foo", "FOO")], "[FOO]", &["", "FOO"])]
    #[case(&[("a", "A"), ("b", "B")], "[a] and [b]!", &["", "A", " and ", "B", "!"])]
    #[case(&[("foo", "FOO")], "[foo][foo]", &[""])]
    #[case(&[("foo", "FOO")], "no tokens", &["no tokens"])]
    fn fragments_are_spliced(
        #[case] fragments: &[(&str, &str)],
        #[case] message: &str,
        #[case] expected: &[&str],
    ) {
        let channel = channel(vec![FormatSection::text("%message%")], None);
        let alice = InMemoryPlayer::new("1", "alice");
        let rendered = pipeline_with(fragments).render(&channel, &alice, &alice, message);
        assert_eq!(plain_segments(&rendered), expected);
    }

    #[test]
    fn sections_without_message_placeholder_skip_scanning() {
        let channel = channel(
            vec![FormatSection::text("<prefix> "), FormatSection::text("%message%")],
            None,
        );
        let alice = InMemoryPlayer::new("1", "alice");
        let rendered = pipeline_with(&[("x", "X")]).render(&channel, &alice, &alice, "a [x] b");
        assert_eq!(plain_segments(&rendered), vec!["<prefix> ", "a ", "X", " b"]);
    }

    #[rstest]
    #[case("alice")]
    #[case("Alice")]
    #[case("ALICE")]
    fn mentions_highlight_case_insensitively(#[case] recipient_name: &str) {
        let channel = channel(vec![FormatSection::text("%message%")], Some("&e@%name%"));
        let sender = InMemoryPlayer::new("1", "bob");
        let recipient = InMemoryPlayer::new("2", recipient_name);

        let rendered = FormatPipeline::default().render(&channel, &sender, &recipient, "hi @Alice");
        assert_eq!(rendered.to_plain_text(), format!("hi @{recipient_name}"));

        let body = &rendered.extra[0].extra[0];
        let highlighted = body.extra.last().unwrap();
        assert_eq!(highlighted.style.color, Some(Color::Yellow));
        assert_eq!(highlighted.text, format!("@{recipient_name}"));
    }

    #[test]
    fn mentions_only_target_the_recipient() {
        assert_eq!(highlight_mentions("@bob hi @alicex", "alice", "!"), "@bob hi !x");
        assert_eq!(highlight_mentions("cost $1 @a.b", "a.b", "[$0]"), "cost $1 [$0]");
    }

    #[test]
    fn hover_and_click_do_not_leak_between_segments() {
        let channel = channel(
            vec![
                FormatSection::text("[%channel%] ")
                    .with_hover("Channel %channel_id%")
                    .with_click(ClickAction::SuggestCommand, "/ch %channel_id%"),
                FormatSection::text("%message%"),
            ],
            None,
        );
        let alice = InMemoryPlayer::new("1", "alice");
        let rendered = FormatPipeline::default().render(&channel, &alice, &alice, "hello");

        let header = &rendered.extra[0];
        let Some(HoverEvent::ShowText(hover)) = &header.hover_event else {
            panic!("expected hover on header");
        };
        assert_eq!(hover.to_plain_text(), "Channel global");
        assert_eq!(
            header.click_event,
            Some(ClickEvent::new(ClickAction::SuggestCommand, "/ch global"))
        );

        let body = &rendered.extra[1];
        assert!(body.hover_event.is_none());
        assert!(body.click_event.is_none());
    }

    #[test]
    fn click_without_text_is_absent() {
        let mut section = FormatSection::text("%message%");
        section.click_action = Some(ClickAction::RunCommand);
        section.click_text = Some(String::new());
        let channel = channel(vec![section], None);
        let alice = InMemoryPlayer::new("1", "alice");

        let rendered = FormatPipeline::default().render(&channel, &alice, &alice, "x");
        assert!(rendered.extra[0].click_event.is_none());
    }
}
