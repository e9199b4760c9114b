//! Settings validation
//!
//! Field ranges come from the `validator` derives on the config types; the
//! cross-field checks live here.

use crate::config::Settings;
use validator::{Validate, ValidationErrors};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed settings file. Providers lacking both a command and a url
/// are not errors; the fleet skips them at startup.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = settings.fleet.validate() {
        collect("fleet", &e, &mut errors);
    }

    if let Some(vision) = &settings.vision {
        if let Err(e) = vision.validate() {
            collect("vision", &e, &mut errors);
        }
    }

    for (name, provider) in &settings.mcp_servers {
        let path = format!("mcpServers.{}", name);

        if name.trim().is_empty() {
            errors.push(ValidationError {
                path: path.clone(),
                message: "Provider name must not be empty".to_string(),
            });
        }

        if let Err(e) = provider.validate() {
            collect(&path, &e, &mut errors);
        }

        if let Some(url) = provider.url.as_deref().filter(|u| !u.trim().is_empty()) {
            match url.parse::<url::Url>() {
                Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => {}
                Ok(parsed) => errors.push(ValidationError {
                    path: format!("{}.url", path),
                    message: format!("Unsupported url scheme: {}", parsed.scheme()),
                }),
                Err(e) => errors.push(ValidationError {
                    path: format!("{}.url", path),
                    message: format!("Invalid url: {}", e),
                }),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect(prefix: &str, source: &ValidationErrors, errors: &mut Vec<ValidationError>) {
    for (field, field_errors) in source.field_errors() {
        for error in field_errors {
            errors.push(ValidationError {
                path: format!("{}.{}", prefix, field),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string()),
            });
        }
    }
}
