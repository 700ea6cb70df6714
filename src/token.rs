// ABOUTME: Stub issuer for WebRTC call tokens
// ABOUTME: Returns an opaque random token and its lifetime; never fails

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity used when the caller does not name one
pub const DEFAULT_IDENTITY: &str = "agent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToken {
    pub token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs }
    }

    pub fn issue(&self, identity: &str) -> CallToken {
        let identity = match identity.trim() {
            "" => DEFAULT_IDENTITY,
            trimmed => trimmed,
        };
        tracing::debug!(identity = %identity, ttl_secs = self.ttl_secs, "Issuing call token");

        CallToken {
            token: format!("stub.{}.{}", identity, Uuid::new_v4().simple()),
            expires_in: self.ttl_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_carries_ttl_and_identity() {
        let token = TokenIssuer::new(3600).issue("agent-7");
        assert_eq!(token.expires_in, 3600);
        assert!(token.token.starts_with("stub.agent-7."));
    }

    #[test]
    fn test_tokens_are_unique() {
        let issuer = TokenIssuer::new(60);
        assert_ne!(issuer.issue("a").token, issuer.issue("a").token);
    }

    #[test]
    fn test_blank_identity_uses_default() {
        let token = TokenIssuer::new(60).issue("  ");
        assert!(token.token.starts_with("stub.agent."));
    }

    #[test]
    fn test_serializes_expires_in_camel_case() {
        let json = serde_json::to_value(TokenIssuer::new(120).issue("x")).unwrap();
        assert_eq!(json["expiresIn"], 120);
        assert!(json["token"].is_string());
    }
}
