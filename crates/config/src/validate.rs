//! Configuration validation.
//!
//! Detects unknown/misspelled fields and semantic problems that would make
//! channels unreachable or fragments unmatchable.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::schema::{ChannelKind, HuddleConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "channel",
    /// "format", "fragment", "dispatch", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "channels[1].format[0].click_text"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Expected shape of the configuration.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Array(Box<KnownKeys>),
    Leaf,
}

fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Array, Leaf, Struct};

    let section = Struct(HashMap::from([
        ("permission", Leaf),
        ("text", Leaf),
        ("hover_text", Leaf),
        ("click_action", Leaf),
        ("click_text", Leaf),
    ]));

    let channel = Struct(HashMap::from([
        ("key", Leaf),
        ("kind", Leaf),
        ("display_name", Leaf),
        ("priority", Leaf),
        ("ping_format", Leaf),
        ("permission", Leaf),
        ("allowlist", Leaf),
        ("auto_join", Leaf),
        ("format", Array(Box::new(section))),
    ]));

    let fragment = Struct(HashMap::from([
        ("keys", Leaf),
        ("text", Leaf),
        ("hover_text", Leaf),
    ]));

    Struct(HashMap::from([
        (
            "dispatch",
            Struct(HashMap::from([
                ("dry_run", Leaf),
                ("circuit_breaker_threshold", Leaf),
                ("circuit_breaker_cooldown_secs", Leaf),
            ])),
        ),
        ("channels", Array(Box::new(channel))),
        ("fragments", Array(Box::new(fragment))),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, levenshtein(needle, candidate)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(candidate, _)| candidate)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or the discovered default when
/// `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    match std::fs::read_to_string(&actual_path) {
        Ok(content) => {
            let content = crate::env_subst::substitute_env(&content);
            let ext = actual_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("toml");
            let mut result = validate_str(&content, ext);
            result.config_path = Some(actual_path);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: Some(actual_path),
        },
    }
}

/// Validate config text in the format named by `ext` without touching the
/// file system.
#[must_use]
pub fn validate_str(raw: &str, ext: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax: parse into a generic tree.
    let tree: Result<serde_json::Value, String> = match ext {
        "toml" => toml::from_str::<toml::Value>(raw)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(raw).map_err(|e| e.to_string()),
        other => Err(format!("unsupported config format: .{other}")),
    };
    let tree = match tree {
        Ok(tree) => tree,
        Err(message) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("syntax error: {message}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields.
    check_unknown_fields(&tree, &build_schema_map(), "", &mut diagnostics);

    // 3. Types + semantics.
    match serde_json::from_value::<HuddleConfig>(tree) {
        Ok(config) => diagnostics.extend(validate_config(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (value, schema) {
        (serde_json::Value::Object(table), KnownKeys::Struct(fields)) => {
            let known: Vec<&str> = fields.keys().copied().collect();
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                if let Some(child_schema) = fields.get(key.as_str()) {
                    check_unknown_fields(child, child_schema, &path, diagnostics);
                } else {
                    let message = match suggest(key, &known, 3) {
                        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
                        None => "unknown field".to_string(),
                    };
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        "unknown-field",
                        path,
                        message,
                    ));
                }
            }
        },
        (serde_json::Value::Array(items), KnownKeys::Array(item_schema)) => {
            for (i, item) in items.iter().enumerate() {
                check_unknown_fields(item, item_schema, &format!("{prefix}[{i}]"), diagnostics);
            }
        },
        // Leaf or type mismatch; type errors are reported by deserialization.
        _ => {},
    }
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate_config(config: &HuddleConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_channels(config, &mut diagnostics);
    check_fragments(config, &mut diagnostics);

    if config.dispatch.circuit_breaker_threshold == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "dispatch",
            "dispatch.circuit_breaker_threshold",
            "threshold 0 turns the listener circuit breaker off",
        ));
    }
    diagnostics
}

fn check_channels(config: &HuddleConfig, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    let mut globals = 0usize;

    for (i, channel) in config.channels.iter().enumerate() {
        let path = format!("channels[{i}]");

        if channel.key.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "channel",
                format!("{path}.key"),
                "channel key must not be empty",
            ));
        } else if !seen.insert(channel.key.to_lowercase()) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "channel",
                format!("{path}.key"),
                format!("duplicate channel key \"{}\" (keys are case-insensitive)", channel.key),
            ));
        }

        if channel.kind == ChannelKind::Global {
            globals += 1;
            if !channel.allowlist.is_empty() || channel.permission.is_some() {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "channel",
                    path.clone(),
                    "global channels ignore permission and allowlist",
                ));
            }
        }

        if channel.format.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "format",
                format!("{path}.format"),
                "channel has no format sections; messages render empty",
            ));
        } else if !channel.format.iter().any(|s| s.text.contains("%message%")) {
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                "format",
                format!("{path}.format"),
                "no format section contains %message%",
            ));
        }

        for (j, section) in channel.format.iter().enumerate() {
            let section_path = format!("{path}.format[{j}]");
            match (section.click_action, section.click_text.as_deref()) {
                (Some(_), None | Some("")) => diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "format",
                    format!("{section_path}.click_text"),
                    "click_action is set without click_text; it will be ignored",
                )),
                (None, Some(text)) if !text.is_empty() => diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "format",
                    format!("{section_path}.click_action"),
                    "click_text is set without click_action; it will be ignored",
                )),
                _ => {},
            }
        }
    }

    match globals {
        1 => {},
        0 => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "channel",
            "channels",
            "exactly one channel must have kind = \"global\"; found none",
        )),
        n => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "channel",
            "channels",
            format!("exactly one channel must have kind = \"global\"; found {n}"),
        )),
    }
}

fn check_fragments(config: &HuddleConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (i, fragment) in config.fragments.iter().enumerate() {
        let path = format!("fragments[{i}].keys");
        if fragment.keys.is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "fragment",
                path.clone(),
                "fragment has no keys and can never match",
            ));
        }
        for key in &fragment.keys {
            if key.is_empty() || key.chars().any(char::is_whitespace) {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "fragment",
                    path.clone(),
                    format!("fragment key \"{key}\" must be non-empty and contain no whitespace"),
                ));
            } else if key.to_lowercase() != *key {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "fragment",
                    path.clone(),
                    format!("fragment key \"{key}\" is matched in lowercase"),
                ));
            }
        }
    }
}
