use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FileFusionError, Result};
use crate::relocator::{TransferMode, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};

const CONFIG_FILE: &str = "config.toml";
const RULES_DIR: &str = "rules";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# filefusion configuration file
# Location: ~/.filefusion/config.toml

[rules]
# Directory holding rule documents (<identifier>.json)
# Default: ~/.filefusion/rules
# dir = "/path/to/rules"

[relocate]
# "copy" keeps the original, "move" removes it
# Default: "copy"
mode = "copy"

# Attempts per file when the destination is locked (permission denied)
# Default: 5
attempts = 5

# Linear backoff step between attempts, in milliseconds
# Default: 1000
backoff_ms = 1000

[walk]
# File and directory names to skip (glob patterns)
# Default: [".git"]
# Example: exclude = [".git", "node_modules", "*.part"]
exclude = [".git"]

# Worker threads per source root, 0 = one per CPU
# Default: 1
jobs = 1
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub relocate: RelocateConfig,

    #[serde(default)]
    pub walk: WalkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    /// Rule document directory, `<base>/rules` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocateConfig {
    #[serde(default)]
    pub mode: TransferMode,

    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Names to skip while walking
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF.as_millis() as u64
}

fn default_exclude() -> Vec<String> {
    vec![".git".to_string()]
}

fn default_jobs() -> usize {
    1
}

impl Default for RelocateConfig {
    fn default() -> Self {
        Self {
            mode: TransferMode::default(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            exclude: default_exclude(),
            jobs: default_jobs(),
        }
    }
}

impl Config {
    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| FileFusionError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| FileFusionError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Rule document directory, falling back to `<base>/rules`
    pub fn rules_dir(&self, base_dir: &Path) -> PathBuf {
        self.rules
            .dir
            .clone()
            .unwrap_or_else(|| base_dir.join(RULES_DIR))
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "rules.dir" => Some(
                self.rules
                    .dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            ),
            "relocate.mode" => Some(self.relocate.mode.to_string()),
            "relocate.attempts" => Some(self.relocate.attempts.to_string()),
            "relocate.backoff_ms" => Some(self.relocate.backoff_ms.to_string()),
            "walk.exclude" => Some(format!("{:?}", self.walk.exclude)),
            "walk.jobs" => Some(self.walk.jobs.to_string()),
            _ => None,
        }
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |message: String| FileFusionError::InvalidConfigValue {
            key: key.to_string(),
            message,
        };

        match key {
            "rules.dir" => {
                let trimmed = value.trim();
                self.rules.dir = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
            }
            "relocate.mode" => {
                self.relocate.mode = value.trim().parse().map_err(invalid)?;
            }
            "relocate.attempts" => {
                let attempts: u32 = value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
                if attempts == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.relocate.attempts = attempts;
            }
            "relocate.backoff_ms" => {
                self.relocate.backoff_ms =
                    value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
            }
            "walk.exclude" => {
                let patterns = parse_string_list(value)?;
                for pattern in &patterns {
                    glob::Pattern::new(pattern).map_err(|e| invalid(e.to_string()))?;
                }
                self.walk.exclude = patterns;
            }
            "walk.jobs" => {
                self.walk.jobs = value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
            }
            _ => {
                return Err(FileFusionError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }

        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        [
            "rules.dir",
            "relocate.mode",
            "relocate.attempts",
            "relocate.backoff_ms",
            "walk.exclude",
            "walk.jobs",
        ]
        .iter()
        .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
        .collect()
    }
}

/// Parse a comma-separated or JSON-like list string
fn parse_string_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();

    // JSON array format first: ["a", "b"]
    let inner = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let items: Vec<String> = inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_string_list_comma() {
        let result = parse_string_list(".git,node_modules").unwrap();
        assert_eq!(result, vec![".git", "node_modules"]);
    }

    #[test]
    fn test_parse_string_list_json() {
        let result = parse_string_list(r#"[".git", "*.part"]"#).unwrap();
        assert_eq!(result, vec![".git", "*.part"]);
    }

    #[test]
    fn test_parse_string_list_empty() {
        let result = parse_string_list("[]").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.relocate.mode, TransferMode::Copy);
        assert_eq!(config.relocate.attempts, 5);
        assert_eq!(config.relocate.backoff_ms, 1000);
        assert_eq!(config.walk.exclude, vec![".git"]);
        assert_eq!(config.walk.jobs, 1);
        assert_eq!(
            config.rules_dir(Path::new("/base")),
            PathBuf::from("/base/rules")
        );
    }

    #[test]
    fn test_config_get_set() {
        let mut config = Config::default();

        config.set("walk.exclude", ".git,node_modules").unwrap();
        assert_eq!(config.walk.exclude, vec![".git", "node_modules"]);
        assert!(config.get("walk.exclude").unwrap().contains("node_modules"));

        config.set("relocate.mode", "move").unwrap();
        assert_eq!(config.get("relocate.mode").unwrap(), "move");

        config.set("rules.dir", "/srv/rules").unwrap();
        assert_eq!(
            config.rules_dir(Path::new("/base")),
            PathBuf::from("/srv/rules")
        );
    }

    #[test]
    fn test_config_set_rejects_bad_values() {
        let mut config = Config::default();

        assert!(matches!(
            config.set("relocate.mode", "teleport"),
            Err(FileFusionError::InvalidConfigValue { .. })
        ));
        assert!(matches!(
            config.set("relocate.attempts", "0"),
            Err(FileFusionError::InvalidConfigValue { .. })
        ));
        assert!(matches!(
            config.set("walk.exclude", "[a"),
            Err(FileFusionError::InvalidConfigValue { .. })
        ));
        assert!(matches!(
            config.set("no.such", "1"),
            Err(FileFusionError::ConfigKeyNotFound { .. })
        ));
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = Config::init(temp.path()).unwrap();
        assert!(path.exists());

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.relocate.attempts, 5);
        assert_eq!(config.walk.exclude, vec![".git"]);
        assert!(config.rules.dir.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.set("walk.jobs", "4").unwrap();
        config.save(temp.path()).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded.walk.jobs, 4);
        assert_eq!(loaded.list().len(), 6);
    }
}
