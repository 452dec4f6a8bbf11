// Local configuration files.
//
// Global config: `~/.vellum/config.toml`
// Per-wiki config: `<repo>/.vellum/wiki.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vellum_common::types::Author;

/// Root directory for Vellum global state: `~/.vellum/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".vellum"))
}

/// Path to the global config file: `~/.vellum/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Path to the per-wiki config file: `<repo>/.vellum/wiki.toml`.
pub fn wiki_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".vellum").join("wiki.toml")
}

// ── Global config ──────────────────────────────────────────────────

/// Global configuration at `~/.vellum/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default author name for commits made from this machine.
    pub author_name: Option<String>,
    /// Default author email for commits made from this machine.
    pub author_email: Option<String>,
}

impl GlobalConfig {
    /// Load from `~/.vellum/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Author identity from this config, or the anonymous placeholder.
    pub fn author(&self) -> Author {
        match (&self.author_name, &self.author_email) {
            (Some(name), Some(email)) => Author::new(name.clone(), email.clone()),
            _ => Author::anonymous(),
        }
    }
}

// ── Per-wiki config ────────────────────────────────────────────────

/// Per-wiki configuration at `<repo>/.vellum/wiki.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WikiConfig {
    /// File suffix that marks a repository file as page content.
    pub content_suffix: String,
    /// Fold page paths to lowercase so `Docs/Intro` and `docs/intro`
    /// name the same page.
    pub fold_case: bool,
    /// Title-case display names derived from path segments.
    pub title_case_names: bool,
    /// Maximum number of search hits returned per query.
    pub search_limit: usize,
    /// Default number of entries per changelog page.
    pub changelog_limit: usize,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            content_suffix: ".md".into(),
            fold_case: false,
            title_case_names: true,
            search_limit: 50,
            changelog_limit: 100,
        }
    }
}

impl WikiConfig {
    /// Load from `<repo>/.vellum/wiki.toml`. Returns defaults if the
    /// file doesn't exist.
    pub fn load(repo_root: &Path) -> Self {
        Self::load_from(&wiki_config_path(repo_root)).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `<repo>/.vellum/wiki.toml`.
    pub fn save(&self, repo_root: &Path) -> Result<(), ConfigError> {
        self.save_to(&wiki_config_path(repo_root))
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── GlobalConfig ───────────────────────────────────────────────

    #[test]
    fn global_config_defaults_to_anonymous_author() {
        let cfg = GlobalConfig::default();
        assert!(cfg.author_name.is_none());
        assert_eq!(cfg.author(), Author::anonymous());
    }

    #[test]
    fn global_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = GlobalConfig {
            author_name: Some("Ada".into()),
            author_email: Some("ada@example.com".into()),
        };
        cfg.save_to(&path).unwrap();
        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
        assert_eq!(loaded.author(), Author::new("Ada", "ada@example.com"));
    }

    #[test]
    fn global_config_partial_identity_stays_anonymous() {
        let cfg = GlobalConfig { author_name: Some("Ada".into()), author_email: None };
        assert_eq!(cfg.author(), Author::anonymous());
    }

    // ── WikiConfig ─────────────────────────────────────────────────

    #[test]
    fn wiki_config_defaults() {
        let cfg = WikiConfig::default();
        assert_eq!(cfg.content_suffix, ".md");
        assert!(!cfg.fold_case);
        assert!(cfg.title_case_names);
        assert_eq!(cfg.search_limit, 50);
        assert_eq!(cfg.changelog_limit, 100);
    }

    #[test]
    fn wiki_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("wiki");
        std::fs::create_dir_all(&root).unwrap();

        let cfg = WikiConfig {
            content_suffix: ".markdown".into(),
            fold_case: true,
            title_case_names: false,
            search_limit: 10,
            changelog_limit: 25,
        };
        cfg.save(&root).unwrap();

        let loaded = WikiConfig::load(&root);
        assert_eq!(cfg, loaded);
        assert!(wiki_config_path(&root).exists());
    }

    #[test]
    fn wiki_config_partial_toml_uses_defaults() {
        let cfg: WikiConfig = toml::from_str("fold_case = true\n").unwrap();
        assert!(cfg.fold_case);
        assert_eq!(cfg.content_suffix, ".md"); // default
        assert_eq!(cfg.search_limit, 50); // default
    }

    #[test]
    fn wiki_config_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(WikiConfig::load(dir.path()), WikiConfig::default());
    }

    // ── Path helpers ───────────────────────────────────────────────

    #[test]
    fn wiki_config_path_is_under_dot_vellum() {
        let path = wiki_config_path(Path::new("/srv/wiki"));
        assert_eq!(path, PathBuf::from("/srv/wiki/.vellum/wiki.toml"));
    }
}
