use crate::constants::{AUTH_VERIFY_TIMEOUT, DEV_USER_EMAIL, DEV_USER_ID, DEV_USER_ROLE};
use crate::types::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Caller identity as reported by the auth service. Every field is optional;
/// missing ones are simply not propagated upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Identity {
    pub fn development() -> Self {
        Self {
            user_id: Some(DEV_USER_ID.to_string()),
            email: Some(DEV_USER_EMAIL.to_string()),
            role: Some(DEV_USER_ROLE.to_string()),
        }
    }
}

/// Bearer token check against the external auth collaborator
/// (`GET {base_url}/verify`). The token format itself is opaque to us.
#[derive(Clone)]
pub enum AuthVerifier {
    /// Accept any bearer token and act as the development identity.
    Disabled,
    Remote {
        client: reqwest::Client,
        base_url: String,
    },
}

impl AuthVerifier {
    pub fn remote(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        AuthVerifier::Remote {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthVerifier::Remote { .. })
    }

    pub fn service_url(&self) -> Option<&str> {
        match self {
            AuthVerifier::Disabled => None,
            AuthVerifier::Remote { base_url, .. } => Some(base_url),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Identity> {
        let (client, base_url) = match self {
            AuthVerifier::Disabled => return Ok(Identity::development()),
            AuthVerifier::Remote { client, base_url } => (client, base_url),
        };

        let response = client
            .get(format!("{}/verify", base_url))
            .bearer_auth(token)
            .timeout(AUTH_VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                GatewayError::Unauthenticated(format!("Auth verification failed: {}", e))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthenticated("Invalid or expired token".into()).into());
        }
        if !status.is_success() {
            return Err(GatewayError::Unauthenticated(format!(
                "Auth service error: {}",
                status.as_u16()
            ))
            .into());
        }

        let identity = response.json::<Identity>().await.map_err(|e| {
            GatewayError::Unauthenticated(format!("Auth verification failed: {}", e))
        })?;
        tracing::debug!(user_id = ?identity.user_id, role = ?identity.role, "Token verified");
        Ok(identity)
    }
}
