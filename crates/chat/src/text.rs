//! Styled text tree delivered to recipients.
//!
//! Modelled on the chat component trees game clients accept: every node has
//! text, an optional style, optional hover/click events, and children that
//! inherit its style.

use std::fmt::Write as _;

use {huddle_config::ClickAction, serde::Serialize};

/// The sixteen legacy chat colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl Color {
    const ALL: [Color; 16] = [
        Self::Black,
        Self::DarkBlue,
        Self::DarkGreen,
        Self::DarkAqua,
        Self::DarkRed,
        Self::DarkPurple,
        Self::Gold,
        Self::Gray,
        Self::DarkGray,
        Self::Blue,
        Self::Green,
        Self::Aqua,
        Self::Red,
        Self::LightPurple,
        Self::Yellow,
        Self::White,
    ];

    /// Color for a legacy code character `0-9a-f`, case-insensitive.
    pub fn from_code(code: char) -> Option<Self> {
        let idx = code.to_digit(16)?;
        Self::ALL.get(idx as usize).copied()
    }

    fn ansi(self) -> u8 {
        match self {
            Self::Black => 30,
            Self::DarkBlue => 34,
            Self::DarkGreen => 32,
            Self::DarkAqua => 36,
            Self::DarkRed => 31,
            Self::DarkPurple => 35,
            Self::Gold => 33,
            Self::Gray => 37,
            Self::DarkGray => 90,
            Self::Blue => 94,
            Self::Green => 92,
            Self::Aqua => 96,
            Self::Red => 91,
            Self::LightPurple => 95,
            Self::Yellow => 93,
            Self::White => 97,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Color and decorations of a node. Unset fields inherit from the parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub underlined: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub obfuscated: bool,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    /// `self` layered over `parent`. A node that sets a color starts from
    /// its own decorations, as a legacy color code does.
    fn inherit(&self, parent: &Style) -> Style {
        if self.color.is_some() {
            return *self;
        }
        Style {
            color: self.color.or(parent.color),
            bold: self.bold || parent.bold,
            italic: self.italic || parent.italic,
            underlined: self.underlined || parent.underlined,
            strikethrough: self.strikethrough || parent.strikethrough,
            obfuscated: self.obfuscated || parent.obfuscated,
        }
    }

    fn ansi_prefix(&self) -> String {
        let mut codes: Vec<u8> = Vec::new();
        if let Some(color) = self.color {
            codes.push(color.ansi());
        }
        for (on, code) in [
            (self.bold, 1),
            (self.italic, 3),
            (self.underlined, 4),
            (self.obfuscated, 5),
            (self.strikethrough, 9),
        ] {
            if on {
                codes.push(code);
            }
        }
        if codes.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = codes.iter().map(u8::to_string).collect();
        format!("\x1b[{}m", joined.join(";"))
    }
}

/// Hover annotation on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "contents", rename_all = "snake_case")]
pub enum HoverEvent {
    ShowText(Box<StyledText>),
}

impl HoverEvent {
    pub fn show_text(text: StyledText) -> Self {
        Self::ShowText(Box::new(text))
    }
}

/// Click action on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickEvent {
    pub action: ClickAction,
    pub value: String,
}

impl ClickEvent {
    pub fn new(action: ClickAction, value: impl Into<String>) -> Self {
        Self {
            action,
            value: value.into(),
        }
    }
}

/// A node in a styled text tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyledText {
    pub text: String,
    #[serde(flatten)]
    pub style: Style,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_event: Option<HoverEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_event: Option<ClickEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<StyledText>,
}

impl StyledText {
    /// An unstyled leaf.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn builder() -> StyledTextBuilder {
        StyledTextBuilder::default()
    }

    /// Text of the whole tree with styling removed.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_plain(&mut out);
        out
    }

    fn collect_plain(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.extra {
            child.collect_plain(out);
        }
    }

    /// Render for a terminal using ANSI escapes. Hover and click events have
    /// no terminal equivalent and are dropped.
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        self.collect_ansi(&Style::default(), &mut out);
        out
    }

    fn collect_ansi(&self, parent: &Style, out: &mut String) {
        let style = self.style.inherit(parent);
        if !self.text.is_empty() {
            let prefix = style.ansi_prefix();
            if prefix.is_empty() {
                out.push_str(&self.text);
            } else {
                let _ = write!(out, "{prefix}{}\x1b[0m", self.text);
            }
        }
        for child in &self.extra {
            child.collect_ansi(&style, out);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.extra.iter().all(StyledText::is_empty)
    }
}

/// Incrementally assembles a [`StyledText`] node.
#[derive(Debug, Default)]
pub struct StyledTextBuilder {
    node: StyledText,
}

impl StyledTextBuilder {
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.node.text = text.into();
        self
    }

    #[must_use]
    pub fn style(mut self, style: Style) -> Self {
        self.node.style = style;
        self
    }

    #[must_use]
    pub fn append(mut self, child: StyledText) -> Self {
        self.node.extra.push(child);
        self
    }

    /// Set or clear the hover event.
    #[must_use]
    pub fn hover_event(mut self, hover: Option<HoverEvent>) -> Self {
        self.node.hover_event = hover;
        self
    }

    /// Set or clear the click event.
    #[must_use]
    pub fn click_event(mut self, click: Option<ClickEvent>) -> Self {
        self.node.click_event = click;
        self
    }

    pub fn build(self) -> StyledText {
        self.node
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn colored(text: &str, color: Color) -> StyledText {
        StyledText::builder()
            .text(text)
            .style(Style {
                color: Some(color),
                ..Style::default()
            })
            .build()
    }

    #[test]
    fn color_codes_map_in_order() {
        assert_eq!(Color::from_code('0'), Some(Color::Black));
        assert_eq!(Color::from_code('e'), Some(Color::Yellow));
        assert_eq!(Color::from_code('E'), Some(Color::Yellow));
        assert_eq!(Color::from_code('g'), None);
    }

    #[test]
    fn plain_text_flattens_tree() {
        let tree = StyledText::builder()
            .append(StyledText::plain("hello "))
            .append(colored("world", Color::Red))
            .build();
        assert_eq!(tree.to_plain_text(), "hello world");
    }

    #[test]
    fn ansi_children_inherit_color() {
        let tree = StyledText::builder()
            .style(Style {
                color: Some(Color::Gray),
                ..Style::default()
            })
            .append(StyledText::plain("a"))
            .append(colored("b", Color::Red))
            .build();
        assert_eq!(tree.to_ansi(), "\x1b[37ma\x1b[0m\x1b[91mb\x1b[0m");
    }

    #[test]
    fn colored_child_drops_parent_decorations() {
        let tree = StyledText::builder()
            .style(Style {
                bold: true,
                ..Style::default()
            })
            .append(StyledText::plain("hi "))
            .append(colored("@bob", Color::Yellow))
            .append(
                StyledText::builder()
                    .text("!")
                    .style(Style {
                        italic: true,
                        ..Style::default()
                    })
                    .build(),
            )
            .build();
        assert_eq!(
            tree.to_ansi(),
            "\x1b[1mhi \x1b[0m\x1b[93m@bob\x1b[0m\x1b[1;3m!\x1b[0m"
        );
    }

    #[test]
    fn serializes_like_chat_components() {
        let node = StyledText::builder()
            .append(colored("hi", Color::Gold))
            .hover_event(Some(HoverEvent::show_text(StyledText::plain("tip"))))
            .click_event(Some(ClickEvent::new(ClickAction::RunCommand, "/help")))
            .build();
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "",
                "hoverEvent": {"action": "show_text", "contents": {"text": "tip"}},
                "clickEvent": {"action": "run_command", "value": "/help"},
                "extra": [{"text": "hi", "color": "gold"}],
            })
        );
    }

    #[test]
    fn builder_clears_events_with_none() {
        let node = StyledText::builder()
            .hover_event(Some(HoverEvent::show_text(StyledText::plain("x"))))
            .hover_event(None)
            .build();
        assert!(node.hover_event.is_none());
    }
}
