//! Short-lived bearer tokens for the vision callback
//!
//! A device receives the token in the `initialize` capabilities and presents
//! it when posting images back to the server. Tokens are HS256 JWTs keyed by
//! the server's auth key and bound to the device id.
use crate::config::VisionConfig;
use crate::core::protocol::VisionCapability;
use crate::utils::errors::{McpError, McpResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionClaims {
    /// Device id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

const MAX_TTL_SECS: u64 = 7 * 24 * 3600;

pub struct VisionTokenIssuer {
    secret: String,
    ttl: Duration,
}

impl VisionTokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    pub fn from_config(config: &VisionConfig) -> Self {
        Self::new(config.auth_key.clone(), config.token_ttl_secs)
    }

    pub fn issue(&self, device_id: &str) -> McpResult<String> {
        if self.secret.is_empty() {
            return Err(McpError::AuthError("vision auth key is empty".to_string()));
        }

        let now = Utc::now();
        let claims = VisionClaims {
            sub: device_id.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| McpError::AuthError(format!("Token generation failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> McpResult<VisionClaims> {
        decode::<VisionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| McpError::AuthError(format!("Invalid token: {}", e)))
    }

    /// Capability block for the `initialize` request of `device_id`.
    pub fn capability(&self, url: &str, device_id: &str) -> McpResult<VisionCapability> {
        Ok(VisionCapability {
            url: url.to_string(),
            token: self.issue(device_id)?,
        })
    }
}
