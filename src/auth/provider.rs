use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// A user identity confirmed by the hosted auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedUser {
    /// The provider's subject id.
    pub id: Uuid,
    /// The email on record, when the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
}

/// The narrow read contract with the hosted auth provider.
///
/// Local validation only decides whether calling this is worth the latency;
/// every authorization decision rests on this check. Callers treat any
/// `Err` as unauthenticated.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Verifies an access token with the provider and returns the identity
    /// it belongs to.
    async fn verify(&self, access_token: &str) -> Result<VerifiedUser>;
}

/// `SessionVerifier` backed by the provider's REST auth endpoint.
pub struct AuthApiVerifier {
    http: reqwest::Client,
    base_url: String,
    service_key: Zeroizing<String>,
}

impl AuthApiVerifier {
    /// Creates a verifier for the provider at `base_url`.
    pub fn new(base_url: String, service_key: Zeroizing<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }
}

#[async_trait]
impl SessionVerifier for AuthApiVerifier {
    async fn verify(&self, access_token: &str) -> Result<VerifiedUser> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(access_token)
            .header("apikey", self.service_key.as_str())
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("verify request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "provider rejected token: {}",
                response.status()
            )));
        }

        response
            .json::<VerifiedUser>()
            .await
            .map_err(|e| AppError::Provider(format!("malformed provider response: {}", e)))
    }
}
