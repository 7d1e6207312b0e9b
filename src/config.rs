use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CleanupError, Result};
use crate::registry::{builtin_targets, TargetRegistry};
use crate::strategies::filter::compile_pattern;
use crate::target::{CleanupCategory, CleanupTarget};
use crate::user::{UserContext, UserSources};

static RETENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:s|min|h|d|w|months|y)?$").expect("Invalid retention regex")
});

/// A user-defined path target, registered under [`CleanupCategory::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTarget {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    #[serde(default)]
    pub requires_elevation: bool,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub age_days: Option<u32>,
    #[serde(default)]
    pub dangerous: bool,
}

impl CustomTarget {
    fn to_target(&self) -> CleanupTarget {
        let mut target =
            CleanupTarget::new(&self.id, &self.name, &self.description, &self.path)
                .requires_elevation(self.requires_elevation)
                .recursive(self.recursive)
                .dangerous(self.dangerous);
        if let Some(pattern) = &self.pattern {
            target = target.pattern(pattern);
        }
        if let Some(days) = self.age_days {
            target = target.age_days(days);
        }
        target
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files holding the name of the user whose home `~` paths resolve to.
    /// The first readable, non-empty one wins.
    #[serde(default = "default_username_files")]
    pub username_files: Vec<PathBuf>,

    /// Username used when no other source names a non-root user.
    #[serde(default = "default_fallback_username")]
    pub fallback_username: String,

    /// Timeout applied to every external command.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Argument to `journalctl --vacuum-time`.
    #[serde(default = "default_journal_retention")]
    pub journal_retention: String,

    #[serde(default)]
    pub parallel_scan: bool,

    /// Built-in target ids to leave out.
    #[serde(default)]
    pub disabled_targets: Vec<String>,

    #[serde(default)]
    pub custom_targets: Vec<CustomTarget>,
}

fn default_username_files() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/opt/tidylinux/username.txt"),
        PathBuf::from("/etc/tidylinux/username"),
    ]
}
fn default_fallback_username() -> String {
    crate::user::FALLBACK_USERNAME.to_string()
}
fn default_command_timeout_secs() -> u64 {
    crate::command::DEFAULT_TIMEOUT.as_secs()
}
fn default_journal_retention() -> String {
    crate::strategies::journal::DEFAULT_RETENTION.to_string()
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username_files: default_username_files(),
            fallback_username: default_fallback_username(),
            command_timeout_secs: default_command_timeout_secs(),
            journal_retention: default_journal_retention(),
            parallel_scan: false,
            disabled_targets: Vec::new(),
            custom_targets: Vec::new(),
        }
    }
}

impl Config {
    /// Default config location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tidylinux").join("config.toml"))
    }

    /// Load and validate the config at `path`. The file must exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CleanupError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load the default config file, falling back to defaults when absent.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("loading config from {}", path.display());
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CleanupError::Config(format!("failed to parse config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validation rules:
    /// - `command_timeout_secs` must be positive
    /// - `journal_retention` must be digits with an optional time unit
    /// - custom target ids must be non-empty and unique, also against built-ins
    /// - custom target patterns must compile
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(CleanupError::Config(
                "command_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !RETENTION.is_match(self.journal_retention.trim()) {
            return Err(CleanupError::Config(format!(
                "journal_retention '{}' is not a duration like '7d' or '2w'",
                self.journal_retention
            )));
        }

        let mut seen: HashSet<String> = builtin_targets(&self.journal_retention)
            .iter()
            .map(|(t, _)| t.id().to_string())
            .collect();
        for custom in &self.custom_targets {
            if custom.id.trim().is_empty() {
                return Err(CleanupError::Config(
                    "custom_targets entries must have a non-empty id".to_string(),
                ));
            }
            if !seen.insert(custom.id.clone()) {
                return Err(CleanupError::Config(format!(
                    "duplicate target id '{}' in custom_targets",
                    custom.id
                )));
            }
            if custom.path.trim().is_empty() {
                return Err(CleanupError::Config(format!(
                    "custom target '{}' must have a path",
                    custom.id
                )));
            }
            if let Some(pattern) = &custom.pattern {
                compile_pattern(pattern)?;
            }
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Resolve the user whose home `~` paths refer to.
    pub fn resolve_user(&self) -> UserContext {
        let sources = UserSources::from_environment(self.username_files.clone());
        UserContext::resolve(&sources, &self.fallback_username)
    }

    /// Built-in catalog minus disabled targets, plus custom targets.
    pub fn build_registry(&self, user: UserContext) -> TargetRegistry {
        let mut registry = TargetRegistry::with_builtin(user, self.journal_retention.trim());
        for id in &self.disabled_targets {
            if !registry.remove(id) {
                tracing::warn!("disabled target '{}' is not in the catalog", id);
            }
        }
        for custom in &self.custom_targets {
            registry.register(custom.to_target(), CleanupCategory::Custom);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.command_timeout_secs, 600);
        assert_eq!(config.journal_retention, "7d");
        assert_eq!(config.fallback_username, "user");
        assert!(!config.parallel_scan);
        assert_eq!(config.username_files.len(), 2);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::from_toml_str("future_option = 3\nparallel_scan = true\n").unwrap();
        assert!(config.parallel_scan);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_toml_str("command_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn retention_must_look_like_a_duration() {
        assert!(Config::from_toml_str("journal_retention = \"2w\"").is_ok());
        assert!(Config::from_toml_str("journal_retention = \"3months\"").is_ok());
        assert!(Config::from_toml_str("journal_retention = \"7d; rm -rf /\"").is_err());
        assert!(Config::from_toml_str("journal_retention = \"week\"").is_err());
    }

    #[test]
    fn custom_target_ids_must_be_unique() {
        let toml = r#"
[[custom_targets]]
id = "apt_cache"
name = "Shadow"
path = "/tmp/x"
"#;
        let err = Config::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate target id 'apt_cache'"));
    }

    #[test]
    fn custom_target_patterns_must_compile() {
        let toml = r#"
[[custom_targets]]
id = "bad"
name = "Bad"
path = "/tmp/x"
pattern = "[unclosed"
"#;
        assert!(matches!(
            Config::from_toml_str(toml).unwrap_err(),
            CleanupError::Pattern { .. }
        ));
    }

    #[test]
    fn registry_honours_disabled_and_custom_targets() {
        let toml = r#"
disabled_targets = ["old_kernels", "snap_cache"]

[[custom_targets]]
id = "downloads_iso"
name = "Old ISO images"
path = "~/Downloads"
recursive = false
pattern = "*.iso"
age_days = 30
"#;
        let config = Config::from_toml_str(toml).unwrap();
        let registry = config.build_registry(UserContext::new("alice"));

        assert!(!registry.contains("old_kernels"));
        assert!(!registry.contains("snap_cache"));
        let custom = registry.get("downloads_iso").unwrap();
        assert_eq!(custom.path(), "/home/alice/Downloads");
        assert!(!custom.is_recursive());
        assert_eq!(custom.file_pattern(), Some("*.iso"));
        assert_eq!(custom.min_age_days(), Some(30));
        assert_eq!(
            registry.category_of("downloads_iso"),
            Some(CleanupCategory::Custom)
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, CleanupError::Config(_)));
    }
}
