use std::{fmt::Write as _, path::Path};

use {
    anyhow::{Context, Result, bail},
    tracing::debug,
};

use huddle_config::{
    ChannelKind, HuddleConfig,
    validate::{self, Diagnostic, Severity},
};

const RESET: &str = "\x1b[0m";

fn severity_style(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[1;31m",
        Severity::Warning => "\x1b[1;33m",
        Severity::Info => "\x1b[1;36m",
    }
}

/// One line per diagnostic: `severity [category] path: message`.
fn format_diagnostic(d: &Diagnostic) -> String {
    let mut line = format!(
        "  {}{}{RESET} [{}] ",
        severity_style(d.severity),
        d.severity,
        d.category
    );
    if !d.path.is_empty() {
        let _ = write!(line, "{}: ", d.path);
    }
    line.push_str(&d.message);
    line
}

/// Channels in resolution order (priority, then key) and fragment keys.
fn summarize(config: &HuddleConfig) -> String {
    let mut channels: Vec<_> = config.channels.iter().collect();
    channels.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.key.to_lowercase().cmp(&b.key.to_lowercase()))
    });

    let mut out = format!("{} channel(s):\n", channels.len());
    for channel in channels {
        let gate = match channel.kind {
            ChannelKind::Global => "global".to_string(),
            ChannelKind::Permission => channel.permission_node(),
        };
        let _ = writeln!(
            out,
            "  #{} \"{}\" priority {} [{gate}] {} section(s){}",
            channel.key,
            channel.display_name(),
            channel.priority,
            channel.format.len(),
            if channel.auto_join { ", auto-join" } else { "" },
        );
    }

    let keys: Vec<&str> = config
        .fragments
        .iter()
        .flat_map(|f| f.keys.iter().map(String::as_str))
        .collect();
    if keys.is_empty() {
        out.push_str("no fragments\n");
    } else {
        let _ = writeln!(out, "{} fragment key(s): {}", keys.len(), keys.join(", "));
    }
    out
}

pub fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(path);
    match result.config_path.as_deref() {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking the built-in default.\n"),
    }

    let shown: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(format_diagnostic)
        .collect();
    for line in &shown {
        eprintln!("{line}");
    }
    if !shown.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    debug!(errors, warnings, "config validated");
    if errors > 0 {
        bail!("{errors} error(s), {warnings} warning(s)");
    }

    let config = match result.config_path.as_deref() {
        Some(path) => huddle_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => HuddleConfig::default(),
    };
    eprint!("{}", summarize(&config));
    if warnings > 0 {
        eprintln!("{warnings} warning(s)");
    } else {
        eprintln!("No issues found.");
    }
    Ok(())
}
