use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::HuddleConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["huddle.toml", "huddle.yaml", "huddle.yml", "huddle.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<HuddleConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    parse_config(&raw, ext)
}

/// Parse already-substituted config text in the format named by `ext`.
pub fn parse_config(raw: &str, ext: &str) -> Result<HuddleConfig> {
    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./huddle.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/huddle/huddle.{toml,yaml,yml,json}` (user-global)
///
/// Returns `HuddleConfig::default()` if no config file is found or the file
/// fails to load.
pub fn discover_and_load() -> HuddleConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    HuddleConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/huddle/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "huddle").map(|d| d.config_dir().to_path_buf())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "channels:\n  - key: global\n    kind: global\n  - key: trade\n    priority: 3\n    auto_join: true"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.channels.len(), 2);
        assert_eq!(cfg.channels[1].key, "trade");
        assert!(cfg.channels[1].auto_join);
        assert_eq!(cfg.dispatch.circuit_breaker_threshold, 3);
    }

    #[test]
    fn substitutes_env_fallback_before_parsing() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[[channels]]\nkey = \"global\"\nkind = \"global\"\npriority = ${{HUDDLE_TEST_UNSET_PRIORITY:-7}}"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.channels[0].priority, 7);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/huddle.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to read /nonexistent/huddle.toml"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = parse_config("", "ini").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
    }
}
