use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which adapter implementation serves a source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Walmart,
    Target,
    Rainforest,
    Kroger,
    Bestbuy,
    Storefront,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Walmart => write!(f, "walmart"),
            SourceKind::Target => write!(f, "target"),
            SourceKind::Rainforest => write!(f, "rainforest"),
            SourceKind::Kroger => write!(f, "kroger"),
            SourceKind::Bestbuy => write!(f, "bestbuy"),
            SourceKind::Storefront => write!(f, "storefront"),
        }
    }
}

/// CSS selectors for a storefront search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// One element per product tile.
    pub container: String,
    pub price: String,
    #[serde(default)]
    pub fallback_price: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable identifier used in routes and failure reports.
    pub id: String,
    /// Display name stamped on every quote.
    pub name: String,
    pub kind: SourceKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub amazon_domain: Option<String>,
    #[serde(default)]
    pub search_param: Option<String>,
    /// Name of the env var holding the API key, never the key itself.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub client_id_env: Option<String>,
    #[serde(default)]
    pub client_secret_env: Option<String>,
    #[serde(default)]
    pub selectors: Option<SelectorConfig>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    /// Parse and validate a sources document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the YAML is malformed or fails validation.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let file: SourcesFile =
            serde_yaml::from_str(content).map_err(ConfigError::SourcesFileParse)?;
        validate_sources(&file)?;
        Ok(file)
    }

    /// Entries with `enabled: true`, in file order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Load and validate the source catalogue from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    SourcesFile::from_yaml(&content)
}

fn validate_sources(file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for source in &file.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id must be non-empty".to_string(),
            ));
        }
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty name",
                source.id
            )));
        }
        if !seen_ids.insert(source.id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id: '{}'",
                source.id
            )));
        }
        if source.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty base_url",
                source.id
            )));
        }

        match source.kind {
            SourceKind::Kroger if source.token_url.is_none() => {
                return Err(ConfigError::Validation(format!(
                    "kroger source '{}' requires token_url",
                    source.id
                )));
            }
            SourceKind::Storefront => validate_storefront(source)?,
            _ => {}
        }
    }

    Ok(())
}

fn validate_storefront(source: &SourceConfig) -> Result<(), ConfigError> {
    if source
        .search_param
        .as_deref()
        .is_none_or(|p| p.trim().is_empty())
    {
        return Err(ConfigError::Validation(format!(
            "storefront source '{}' requires search_param",
            source.id
        )));
    }

    let Some(selectors) = &source.selectors else {
        return Err(ConfigError::Validation(format!(
            "storefront source '{}' requires selectors",
            source.id
        )));
    };
    if selectors.container.trim().is_empty() || selectors.price.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "storefront source '{}' requires container and price selectors",
            source.id
        )));
    }

    Ok(())
}
