//! File loading for deltactl configuration.

use anyhow::{Context, Result};
use std::fs;

use super::types::{default_server_origin, Config};

impl Config {
    /// Loads the config from `~/.config/deltactl/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults and
    /// returns it.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                r#"server_origin = "{}"

# api_key = "sk-..."
# model_api_url = "http://localhost:8081"

[display]
show_tokens_per_second = true
keep_stats_visible = false
"#,
                default_server_origin()
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server_origin, "http://localhost:8080");
        assert!(config.model_api_url.is_none());
        assert!(config.display.show_tokens_per_second);
        assert!(!config.display.keep_stats_visible);
    }

    #[test]
    fn partial_display_section_parses() {
        let config: Config = toml::from_str(
            r#"
server_origin = "http://192.168.1.5:8080"

[display]
keep_stats_visible = true
"#,
        )
        .unwrap();
        assert_eq!(config.server_origin, "http://192.168.1.5:8080");
        assert!(config.display.keep_stats_visible);
        assert!(config.display.show_tokens_per_second);
    }
}
