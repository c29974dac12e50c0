use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// sbadmin's own persisted settings.
///
/// Holds the upstream Clash API endpoint discovered at startup or set
/// through the web UI, so it survives restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Clash External Controller API URL
    #[serde(default)]
    pub api_url: Option<String>,

    /// Optional secret for authentication
    #[serde(default)]
    pub secret: Option<String>,
}

impl AppConfig {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        Ok(config_dir.join("sbadmin").join("config.yaml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let config: AppConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(self)?;
        fs::write(&path, contents)?;

        Ok(())
    }

    /// Merge command line arguments into config. CLI values win.
    pub fn merge_cli(&mut self, api_url: Option<String>, secret: Option<String>) {
        if let Some(url) = api_url {
            self.api_url = Some(url);
        }

        if let Some(s) = secret {
            self.secret = Some(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_cli_overrides_saved_values() {
        let mut config = AppConfig {
            api_url: Some("http://127.0.0.1:9090".to_string()),
            secret: None,
        };
        config.merge_cli(
            Some("http://10.0.0.1:9090".to_string()),
            Some("s3cret".to_string()),
        );
        assert_eq!(config.api_url.as_deref(), Some("http://10.0.0.1:9090"));
        assert_eq!(config.secret.as_deref(), Some("s3cret"));

        config.merge_cli(None, None);
        assert_eq!(config.api_url.as_deref(), Some("http://10.0.0.1:9090"));
    }
}
