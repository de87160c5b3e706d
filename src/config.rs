//! Host configuration, loaded from `config.toml`.
//!
//! ```toml
//! [suggest]
//! publish_result_delay_ms = 200
//!
//! [history]
//! min_clicks_for_corpus_ranking = 3
//!
//! [[corpora]]
//! name = "web"
//! web = true
//! default_enabled = true
//! words = ["rust", "rustup"]
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use qsb_suggest::SuggestConfig;
use serde::{Deserialize, Serialize};

use crate::error::{QsbError, Result};

/// Top-level host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QsbConfig {
    /// Suggestion engine tunables.
    pub suggest: SuggestConfig,
    /// Click history settings.
    pub history: HistoryConfig,
    /// Corpora served by the host.
    pub corpora: Vec<CorpusConfig>,
}

impl Default for QsbConfig {
    fn default() -> Self {
        Self {
            suggest: SuggestConfig::default(),
            history: HistoryConfig::default(),
            corpora: default_corpora(),
        }
    }
}

fn default_corpora() -> Vec<CorpusConfig> {
    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| (*w).to_owned()).collect()
    }
    vec![
        CorpusConfig {
            name: "web".to_owned(),
            label: Some("Web".to_owned()),
            hint: Some("Search the web".to_owned()),
            web: true,
            default_enabled: true,
            words: words(&["rust", "rust book", "rustup", "weather", "news"]),
            ..CorpusConfig::default()
        },
        CorpusConfig {
            name: "apps".to_owned(),
            label: Some("Apps".to_owned()),
            hint: Some("Search apps".to_owned()),
            default_enabled: true,
            words: words(&["Browser", "Calendar", "Camera", "Clock", "Maps", "Music"]),
            ..CorpusConfig::default()
        },
        CorpusConfig {
            name: "contacts".to_owned(),
            label: Some("Contacts".to_owned()),
            hint: Some("Search contacts".to_owned()),
            query_threshold: 1,
            words: words(&["Alice", "Bob", "Carol"]),
            ..CorpusConfig::default()
        },
    ]
}

/// Click history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Clicks older than this are ignored for corpus ranking.
    pub max_stat_age_secs: u64,
    /// Corpora with fewer recent clicks get no ranking score.
    pub min_clicks_for_corpus_ranking: usize,
    /// Load history on start and save it on shutdown.
    pub persist: bool,
    /// History file. Defaults to `history.json` in the data directory.
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_stat_age_secs: 30 * 24 * 60 * 60,
            min_clicks_for_corpus_ranking: 3,
            persist: true,
            path: None,
        }
    }
}

impl HistoryConfig {
    /// Maximum click age as a [`Duration`].
    pub fn max_stat_age(&self) -> Duration {
        Duration::from_secs(self.max_stat_age_secs)
    }

    /// Resolved history file path.
    pub fn file(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(crate::qsb_dirs::history_file)
    }
}

/// One configured corpus, backed by a static word list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Unique corpus name.
    pub name: String,
    /// Display label. Defaults to the name.
    pub label: Option<String>,
    /// Hint shown while the corpus is selected.
    pub hint: Option<String>,
    /// Whether this is the web corpus.
    pub web: bool,
    /// Enabled out of the box.
    pub default_enabled: bool,
    /// Minimum query length before the corpus is queried.
    pub query_threshold: usize,
    /// Keep querying after an empty answer for a shorter query.
    pub query_after_zero_results: bool,
    /// Query this corpus for the empty query.
    pub accepts_empty_query: bool,
    /// Words served by the corpus.
    pub words: Vec<String>,
}

impl QsbConfig {
    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QsbError::Config`] for invalid engine tunables, an empty or
    /// duplicate corpus name, more than one web corpus, or a zero history age.
    pub fn validate(&self) -> Result<()> {
        self.suggest
            .validate()
            .map_err(|e| QsbError::Config(e.to_string()))?;
        if self.history.max_stat_age_secs == 0 {
            return Err(QsbError::Config(
                "history.max_stat_age_secs must be greater than 0".into(),
            ));
        }
        let mut names = HashSet::new();
        for corpus in &self.corpora {
            if corpus.name.trim().is_empty() {
                return Err(QsbError::Config("corpus name must not be empty".into()));
            }
            if !names.insert(corpus.name.as_str()) {
                return Err(QsbError::Config(format!(
                    "duplicate corpus name: {}",
                    corpus.name
                )));
            }
        }
        if self.corpora.iter().filter(|c| c.web).count() > 1 {
            return Err(QsbError::Config("at most one web corpus is allowed".into()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| QsbError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| QsbError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the config file path: `$QSB_CONFIG`, else
    /// `$XDG_CONFIG_HOME/qsb/config.toml`, else `~/.config/qsb/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os("QSB_CONFIG") {
            PathBuf::from(path)
        } else if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("qsb").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("qsb")
                .join("config.toml")
        } else {
            crate::qsb_dirs::config_dir().join("config.toml")
        }
    }

    /// Loads the file at [`default_config_path`](Self::default_config_path),
    /// falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            tracing::info!(path = %path.display(), "loading config");
            Self::from_file(&path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}
