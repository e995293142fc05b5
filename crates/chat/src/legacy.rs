//! Legacy `&`-code markup: parsing into [`StyledText`] and stripping.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::{Color, Style, StyledText};

#[allow(clippy::expect_used)]
static STRIP_COLOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&[0-9A-FK-OR]").expect("strip pattern is valid"));

/// Remove `&`-prefixed color and style codes (`0-9`, `a-f`, `k-o`, `r`,
/// case-insensitive). Text without such codes is returned unchanged.
pub fn strip_color(input: &str) -> String {
    STRIP_COLOR_PATTERN.replace_all(input, "").into_owned()
}

/// Turns marked-up template text into a styled node.
pub trait TextParser: Send + Sync {
    fn parse(&self, input: &str) -> StyledText;
}

/// Parser for legacy two-character codes: a marker (default `&`) followed by a
/// color `0-9a-f`, a decoration `k-o`, or reset `r`.
///
/// A color code clears decorations, matching how game clients apply them.
#[derive(Debug, Clone, Copy)]
pub struct LegacyParser {
    marker: char,
}

impl Default for LegacyParser {
    fn default() -> Self {
        Self { marker: '&' }
    }
}

impl LegacyParser {
    pub fn with_marker(marker: char) -> Self {
        Self { marker }
    }
}

/// Apply one code to `style`. Returns `false` if `code` is not a style code.
fn apply_code(style: &mut Style, code: char) -> bool {
    if let Some(color) = Color::from_code(code) {
        *style = Style {
            color: Some(color),
            ..Style::default()
        };
        return true;
    }
    match code.to_ascii_lowercase() {
        'k' => style.obfuscated = true,
        'l' => style.bold = true,
        'm' => style.strikethrough = true,
        'n' => style.underlined = true,
        'o' => style.italic = true,
        'r' => *style = Style::default(),
        _ => return false,
    }
    true
}

impl TextParser for LegacyParser {
    fn parse(&self, input: &str) -> StyledText {
        let mut runs: Vec<StyledText> = Vec::new();
        let mut style = Style::default();
        let mut current = String::new();
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == self.marker
                && let Some(&code) = chars.peek()
            {
                let mut next = style;
                if apply_code(&mut next, code) {
                    chars.next();
                    if !current.is_empty() {
                        runs.push(
                            StyledText::builder()
                                .text(std::mem::take(&mut current))
                                .style(style)
                                .build(),
                        );
                    }
                    style = next;
                    continue;
                }
            }
            current.push(ch);
        }
        if !current.is_empty() {
            runs.push(StyledText::builder().text(current).style(style).build());
        }

        match runs.len() {
            1 if runs[0].style.is_plain() => runs.remove(0),
            _ => {
                let mut root = StyledText::builder();
                for run in runs {
                    root = root.append(run);
                }
                root.build()
            },
        }
    }
}
