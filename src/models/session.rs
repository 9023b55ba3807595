use serde::{Deserialize, Serialize};

/// Safety margin subtracted from a token's expiry before comparing against
/// "now", compensating for clock drift between the issuer and this process.
pub const CLOCK_SKEW_BUFFER_SECS: i64 = 30;

/// A session reconstructed from the provider auth cookie.
///
/// ⚠️ IMPORTANT: this is derived from *unverified* claims. A usable
/// `AuthenticatedSession` means "worth the authoritative round trip",
/// never "trusted". It is not persisted server-side beyond the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    /// The opaque bearer token exactly as carried in the cookie payload.
    pub access_token: String,
    /// The subject identifier from the token claims.
    pub subject_id: String,
    /// Claimed expiry as Unix seconds.
    pub expires_at: i64,
}

impl AuthenticatedSession {
    /// Whether the session is still worth presenting to the provider.
    pub fn is_usable(&self, now_secs: i64) -> bool {
        !self.subject_id.is_empty() && self.expires_at - CLOCK_SKEW_BUFFER_SECS > now_secs
    }
}
