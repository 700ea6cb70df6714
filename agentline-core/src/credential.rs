// ABOUTME: Identity platform service account loaded at startup
// ABOUTME: A missing or malformed credential is fatal; the server refuses to start

use crate::config::IdentityConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Service account issued by the identity platform.
#[derive(Clone, Deserialize)]
pub struct ServiceCredential {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl ServiceCredential {
    /// Parse and validate a service account JSON blob
    pub fn from_json(raw: &str) -> Result<Self> {
        let credential: ServiceCredential =
            serde_json::from_str(raw).context("Identity credential is not valid service account JSON")?;

        for (field, value) in [
            ("project_id", &credential.project_id),
            ("client_email", &credential.client_email),
            ("private_key", &credential.private_key),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Identity credential field '{}' is empty", field);
            }
        }

        Ok(credential)
    }

    /// Resolve the credential from config: inline JSON first, then the file path
    pub fn load(identity: &IdentityConfig) -> Result<Self> {
        if let Some(raw) = identity.credential.as_deref() {
            return Self::from_json(raw);
        }

        if let Some(path) = identity.credential_path.as_deref() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read identity credential file {}", path))?;
            return Self::from_json(&raw);
        }

        anyhow::bail!(
            "Identity credential is required (set IDENTITY_SERVICE_ACCOUNT, \
             IDENTITY_SERVICE_ACCOUNT_PATH, or [identity] in config.toml)"
        )
    }
}
