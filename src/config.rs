/*!
 * Configuration support for the IDSS library
 *
 * Settings are layered with the `config` crate: built-in defaults, then the
 * TOML file at the platform config path, then `IDSS_*` environment variables
 * (nested keys use `__`, e.g. `IDSS_SOURCE__KIND=remote`).
 */

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_PAGE_SIZE, PREFERRED_MODALITIES, SUBGROUP_SPLITS};
use crate::state::SubgroupRule;
use crate::{IdssError, Result};

/// Where the dataset comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Local { csv_path: PathBuf },
    Remote { url: String, table: String, api_key: String },
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdssConfig {
    /// Show a progress bar while parsing CSV
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Skip structurally broken CSV rows instead of failing the load
    #[serde(default = "default_skip_invalid_rows")]
    pub skip_invalid_rows: bool,

    /// Fixed CSV delimiter (`,` `;` `|` or `\t`); sniffed when unset
    #[serde(default)]
    pub csv_delimiter: Option<String>,

    /// Modalities pre-selected after every load
    #[serde(default = "default_preferred_modalities")]
    pub preferred_modalities: Vec<String>,

    /// Rows per page when locating an operator in a ranking
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub source: Option<DataSource>,

    /// Modalities whose selection pulls in a group-flag value
    #[serde(default = "default_subgroup_rules")]
    pub subgroup_rules: Vec<SubgroupRule>,
}

impl Default for IdssConfig {
    fn default() -> Self {
        Self {
            show_progress: default_show_progress(),
            skip_invalid_rows: default_skip_invalid_rows(),
            csv_delimiter: None,
            source: None,
            preferred_modalities: default_preferred_modalities(),
            subgroup_rules: default_subgroup_rules(),
            page_size: default_page_size(),
        }
    }
}

// Default value functions for serde
fn default_show_progress() -> bool {
    true
}

fn default_skip_invalid_rows() -> bool {
    true
}

fn default_preferred_modalities() -> Vec<String> {
    PREFERRED_MODALITIES.iter().map(|m| m.to_string()).collect()
}

fn default_subgroup_rules() -> Vec<SubgroupRule> {
    SUBGROUP_SPLITS
        .iter()
        .map(|(modality, flag)| SubgroupRule {
            modality: modality.to_string(),
            group_flag: flag.to_string(),
        })
        .collect()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn config_error(action: &str, err: impl std::fmt::Display) -> IdssError {
    IdssError::Configuration {
        message: format!("Failed to {}: {}", action, err),
        suggestion: Some("Check the config file for valid TOML and the IDSS_* environment variables".to_string()),
    }
}

impl IdssConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `IDSS_*` environment variables
    ///
    /// - `IDSS_SHOW_PROGRESS`, `IDSS_SKIP_INVALID_ROWS`: "true" or "false"
    /// - `IDSS_CSV_DELIMITER`: one character
    /// - `IDSS_PAGE_SIZE`: number
    /// - `IDSS_SOURCE__KIND` with `IDSS_SOURCE__CSV_PATH` or
    ///   `IDSS_SOURCE__URL` / `IDSS_SOURCE__TABLE` / `IDSS_SOURCE__API_KEY`
    pub fn from_env() -> Result<Self> {
        Self::layered(None)
    }

    /// Load configuration from a TOML file (no environment overrides)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&contents).map_err(|e| IdssError::Configuration {
            message: format!("Failed to parse config file: {}", e),
            suggestion: Some("Check that the file is valid TOML format".to_string()),
        })
    }

    /// Defaults, then `file` (if it exists), then the environment
    pub fn layered(file: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default()).map_err(|e| config_error("serialize defaults", e))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("IDSS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("preferred_modalities"),
        );

        builder
            .build()
            .and_then(|layers| layers.try_deserialize())
            .map_err(|e| config_error("load configuration", e))
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| IdssError::Configuration {
            message: format!("Failed to serialize config: {}", e),
            suggestion: None,
        })?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/idss/config.toml` on Unix-like systems
    /// or `%APPDATA%\idss\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "idss").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Layered load from the default path; falls back to defaults on error
    pub fn load() -> Self {
        let path = Self::default_config_path();
        match Self::layered(path.as_deref()) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring configuration: {}", err);
                Self::default()
            }
        }
    }

    /// CSV delimiter as a byte, if one is configured and valid
    pub fn delimiter_byte(&self) -> Option<u8> {
        let raw = self.csv_delimiter.as_deref()?;
        match raw {
            "\\t" | "tab" => Some(b'\t'),
            _ if raw.len() == 1 => raw.bytes().next(),
            _ => None,
        }
    }

    /// No progress output; broken rows skipped
    pub fn quiet() -> Self {
        Self {
            show_progress: false,
            skip_invalid_rows: true,
            ..Self::default()
        }
    }

    /// Any broken row fails the load
    pub fn strict() -> Self {
        Self {
            skip_invalid_rows: false,
            ..Self::default()
        }
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<IdssConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: IdssConfig) {
    *GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = Some(config);
}

/// Get the global configuration (or the layered load if not set)
pub fn global_config() -> IdssConfig {
    GLOBAL_CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .cloned()
        .unwrap_or_else(IdssConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    *GLOBAL_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Builder for customizing configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: IdssConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    pub fn skip_invalid_rows(mut self, skip: bool) -> Self {
        self.config.skip_invalid_rows = skip;
        self
    }

    pub fn csv_delimiter(mut self, delimiter: char) -> Self {
        self.config.csv_delimiter = Some(delimiter.to_string());
        self
    }

    pub fn local_source<P: AsRef<Path>>(mut self, csv_path: P) -> Self {
        self.config.source = Some(DataSource::Local {
            csv_path: csv_path.as_ref().to_path_buf(),
        });
        self
    }

    pub fn remote_source(mut self, url: impl Into<String>, table: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.source = Some(DataSource::Remote {
            url: url.into(),
            table: table.into(),
            api_key: api_key.into(),
        });
        self
    }

    pub fn preferred_modalities<I, S>(mut self, modalities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.preferred_modalities = modalities.into_iter().map(Into::into).collect();
        self
    }

    /// Add one modality/group-flag split rule
    pub fn subgroup_rule(mut self, modality: impl Into<String>, group_flag: impl Into<String>) -> Self {
        self.config.subgroup_rules.push(SubgroupRule {
            modality: modality.into(),
            group_flag: group_flag.into(),
        });
        self
    }

    pub fn no_subgroup_rules(mut self) -> Self {
        self.config.subgroup_rules.clear();
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    pub fn build(self) -> IdssConfig {
        self.config
    }
}
