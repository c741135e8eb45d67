use crate::core::transaction::TransactionsByKind;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_MFAPI_URL: &str = "https://api.mfapi.in";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MfApiProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub mfapi: Option<MfApiProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            mfapi: Some(MfApiProviderConfig {
                base_url: DEFAULT_MFAPI_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn mfapi_base_url(&self) -> &str {
        self.mfapi
            .as_ref()
            .map_or(DEFAULT_MFAPI_URL, |p| p.base_url.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub transactions: TransactionsByKind,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "mfxirr", "mfxirr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "mfxirr", "mfxirr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(
            "Successfully loaded config with {} purchases and {} redemptions",
            config.transactions.purchases.len(),
            config.transactions.redemptions.len()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
transactions:
  PURCHASE:
    - schemeCode: 119551
      date: "2023-01-02"
      price: 10.0
      quantity: 100.0
    - schemeCode: 120503
      date: 19400
      price: 45.5
      quantity: 20.0
  REDEEM:
    - schemeCode: 119551
      date: "2024-01-02"
      price: 12.0
      quantity: 40.0
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.transactions.purchases.len(), 2);
        assert_eq!(config.transactions.redemptions.len(), 1);
        assert_eq!(config.transactions.purchases[0].scheme_code, 119551);
        assert_eq!(config.transactions.purchases[0].date, 19359);
        assert_eq!(config.transactions.purchases[1].date, 19400);
        assert_eq!(config.transactions.redemptions[0].quantity, 40.0);
        assert_eq!(config.transactions.scheme_codes(), vec![119551, 120503]);
        assert!(config.data_path.is_none());

        assert_eq!(config.providers.mfapi_base_url(), DEFAULT_MFAPI_URL);
    }

    #[test]
    fn test_config_with_providers_and_no_transactions() {
        let yaml_str = r#"
providers:
  mfapi:
    base_url: "http://example.com/mfapi"
data_path: "/tmp/mfxirr"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert!(config.transactions.is_empty());
        assert_eq!(config.providers.mfapi_base_url(), "http://example.com/mfapi");
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/mfxirr")
        );
    }

    #[test]
    fn test_missing_config_file_reports_path() {
        let err = AppConfig::load_from_path("/nonexistent/mfxirr/config.yaml").unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to read config file: /nonexistent/mfxirr/config.yaml")
        );
    }
}
