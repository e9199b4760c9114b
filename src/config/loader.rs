use crate::config::validation::validate_settings;
use crate::config::Settings;
use crate::utils::errors::{McpError, McpResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Supported settings file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension, falling back to the content.
    pub fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => {
                if content.trim_start().starts_with('{') {
                    ConfigFormat::Json
                } else {
                    ConfigFormat::Yaml
                }
            }
        }
    }
}

/// Parse and validate settings text.
pub fn parse_settings(content: &str, format: ConfigFormat) -> McpResult<Settings> {
    let settings: Settings = match format {
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| McpError::ConfigError(format!("Failed to parse JSON settings: {}", e)))?,
        ConfigFormat::Yaml => {
            if content.trim().is_empty() {
                Settings::default()
            } else {
                serde_yaml::from_str(content).map_err(|e| {
                    McpError::ConfigError(format!("Failed to parse YAML settings: {}", e))
                })?
            }
        }
    };

    validate_settings(&settings).map_err(|errors| {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        McpError::ConfigError(format!("Invalid settings: {}", joined))
    })?;

    Ok(settings)
}

/// Load the provider settings file.
///
/// A missing file is not an error: the fleet simply starts empty.
pub async fn load_settings(path: impl AsRef<Path>) -> McpResult<Settings> {
    let expanded = PathBuf::from(shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string());

    let content = match tokio::fs::read_to_string(&expanded).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "MCP settings file {} not found, no tool providers configured",
                expanded.display()
            );
            return Ok(Settings::default());
        }
        Err(e) => {
            return Err(McpError::ConfigError(format!(
                "Failed to read {}: {}",
                expanded.display(),
                e
            )))
        }
    };

    let format = ConfigFormat::detect(&expanded, &content);
    debug!("Detected settings format: {:?}", format);

    let settings = parse_settings(&content, format)?;
    info!(
        "Loaded {} tool provider(s) from {}",
        settings.mcp_servers.len(),
        expanded.display()
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn test_load_json_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".mcp_server_settings.json");
        let content = r#"{
            "mcpServers": {
                "weather": {"command": "uvx", "args": ["weather-mcp"], "env": {"UNITS": "metric"}},
                "home": {"url": "ws://127.0.0.1:9000/mcp", "callTimeoutSecs": 10}
            },
            "fleet": {"retryDelayMs": 500}
        }"#;
        fs::write(&path, content).await.unwrap();

        let settings = load_settings(&path).await.unwrap();
        assert_eq!(settings.mcp_servers.len(), 2);
        assert_eq!(settings.mcp_servers["weather"].args, vec!["weather-mcp".to_string()]);
        assert_eq!(settings.mcp_servers["home"].call_timeout_secs, Some(10));
        assert_eq!(settings.fleet.retry_delay_ms, 500);
        assert_eq!(settings.fleet.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_load_yaml_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mcp.yaml");
        let content = "mcpServers:\n  notes:\n    command: notes-mcp\nvision:\n  url: http://10.0.0.2:8003/mcp/vision/explain\n  authKey: secret\n";
        fs::write(&path, content).await.unwrap();

        let settings = load_settings(&path).await.unwrap();
        assert_eq!(settings.mcp_servers["notes"].command.as_deref(), Some("notes-mcp"));
        let vision = settings.vision.unwrap();
        assert_eq!(vision.token_ttl_secs, 3600);
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_settings() {
        let temp_dir = TempDir::new().unwrap();
        let settings = load_settings(temp_dir.path().join("absent.json")).await.unwrap();
        assert!(settings.mcp_servers.is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let result = parse_settings(r#"{"fleet": {"maxAttempts": 0}}"#, ConfigFormat::Json);
        assert!(matches!(result, Err(McpError::ConfigError(_))));
    }

    #[test]
    fn test_format_detection() {
        let cases = vec![
            ("settings.json", "", ConfigFormat::Json),
            ("settings.yaml", "", ConfigFormat::Yaml),
            ("settings.yml", "", ConfigFormat::Yaml),
            ("settings", "{\"mcpServers\":{}}", ConfigFormat::Json),
            ("settings", "mcpServers: {}", ConfigFormat::Yaml),
        ];
        for (path, content, expected) in cases {
            assert_eq!(
                ConfigFormat::detect(Path::new(path), content),
                expected,
                "Failed for: {}",
                path
            );
        }
    }
}
