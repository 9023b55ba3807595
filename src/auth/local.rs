use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;

use crate::auth::claims::{self, DecodedToken};
use crate::auth::cookies;
use crate::models::session::{AuthenticatedSession, CLOCK_SKEW_BUFFER_SECS};

/// Outcome of local (signature-free) validation of the provider cookie.
///
/// Reason codes are internal/debug-only and must never reach a client.
/// `Valid` means "worth the authoritative round trip" — the remote check is
/// still the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValidation {
    /// No matching cookie was found.
    Missing,
    /// Cookie present but the wrapped payload or token is malformed.
    Invalid,
    /// Claims parsed but carry no subject identifier.
    NoSub,
    /// Claims parsed but carry no expiry. A token without an expiry is
    /// unauthenticated, never "never expires".
    NoExp,
    /// The token is within the clock-skew buffer of its expiry, or past it.
    Expired,
    /// The token is plausible; the authoritative check may proceed.
    Valid(AuthenticatedSession),
}

impl LocalValidation {
    /// Internal reason code used by the audit log.
    pub fn reason(&self) -> &'static str {
        match self {
            LocalValidation::Missing => "missing",
            LocalValidation::Invalid => "invalid",
            LocalValidation::NoSub => "no-sub",
            LocalValidation::NoExp => "no-exp",
            LocalValidation::Expired => "expired",
            LocalValidation::Valid(_) => "valid",
        }
    }

    /// Whether the fast path passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, LocalValidation::Valid(_))
    }
}

/// The provider SDK wraps the access token in a JSON envelope, stored either
/// as plain JSON or base64url behind a `base64-` prefix.
#[derive(Deserialize)]
struct WrappedPayload {
    access_token: String,
}

fn unwrap_session_payload(raw: &str) -> Option<String> {
    let bytes = if let Some(encoded) = raw.strip_prefix("base64-") {
        general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .ok()?
    } else {
        raw.as_bytes().to_vec()
    };

    sonic_rs::from_slice::<WrappedPayload>(&bytes)
        .ok()
        .map(|payload| payload.access_token)
}

/// Validates the provider cookie with zero network round trips.
///
/// Steps run in order and short-circuit to a typed reason. The expiry
/// boundary is inclusive: a token expiring exactly `now` is already
/// expired, and the 30 s clock-skew buffer is subtracted before comparing.
///
/// # Arguments
///
/// * `lookup` - Resolves a physical cookie name to its value.
/// * `cookie_name` - The logical provider cookie name.
/// * `now_secs` - The validation instant as Unix seconds.
///
/// # Returns
///
/// The [`LocalValidation`] outcome for this request.
pub fn validate_local(
    lookup: impl Fn(&str) -> Option<String>,
    cookie_name: &str,
    now_secs: i64,
) -> LocalValidation {
    let Some(raw) = cookies::assemble(&lookup, cookie_name) else {
        return LocalValidation::Missing;
    };

    let Some(access_token) = unwrap_session_payload(&raw) else {
        return LocalValidation::Invalid;
    };

    let claims = match claims::decode_unverified(&access_token) {
        DecodedToken::Decoded(claims) => claims,
        DecodedToken::Malformed => return LocalValidation::Invalid,
    };

    let subject = match claims.sub {
        Some(sub) if !sub.is_empty() => sub,
        _ => return LocalValidation::NoSub,
    };

    let Some(exp) = claims.exp else {
        return LocalValidation::NoExp;
    };

    if now_secs >= exp - CLOCK_SKEW_BUFFER_SECS {
        return LocalValidation::Expired;
    }

    LocalValidation::Valid(AuthenticatedSession {
        access_token,
        subject_id: subject,
        expires_at: exp,
    })
}

/// Audit log for local validation, gated by `Config.auth_debug`.
///
/// Logs the reason and a truncated subject id only — never the token.
pub fn audit(outcome: &LocalValidation, enabled: bool) {
    if !enabled {
        return;
    }
    match outcome {
        LocalValidation::Valid(session) => {
            let sub: String = session.subject_id.chars().take(8).collect();
            tracing::debug!("🔎 Local auth: valid (sub {}…)", sub);
        }
        other => {
            tracing::debug!("🔎 Local auth: {}", other.reason());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const COOKIE: &str = "pv_session";

    fn make_token(payload_json: &str) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    fn wrap_plain(access_token: &str) -> String {
        format!(r#"{{"access_token":"{}","token_type":"bearer"}}"#, access_token)
    }

    fn wrap_base64(access_token: &str) -> String {
        let json = wrap_plain(access_token);
        format!(
            "base64-{}",
            general_purpose::URL_SAFE_NO_PAD.encode(json.as_bytes())
        )
    }

    fn jar(entries: &[(&str, String)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn validate(jar: &HashMap<String, String>, now: i64) -> LocalValidation {
        validate_local(|name| jar.get(name).cloned(), COOKIE, now)
    }

    #[test]
    fn missing_cookie() {
        let jar = jar(&[]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::Missing);
    }

    #[test]
    fn unparseable_payload_is_invalid() {
        let jar = jar(&[(COOKIE, "definitely not a session".to_string())]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::Invalid);
    }

    #[test]
    fn two_segment_token_is_invalid() {
        let jar = jar(&[(COOKIE, wrap_plain("only.twoparts"))]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::Invalid);
    }

    #[test]
    fn absent_subject_is_no_sub() {
        let token = make_token(r#"{"exp":9999999999}"#);
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::NoSub);
    }

    #[test]
    fn empty_subject_is_no_sub() {
        let token = make_token(r#"{"sub":"","exp":9999999999}"#);
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::NoSub);
    }

    #[test]
    fn absent_expiry_is_no_exp_regardless_of_other_claims() {
        let token = make_token(r#"{"sub":"user-1","role":"authenticated","iat":1}"#);
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        assert_eq!(validate(&jar, 1_000), LocalValidation::NoExp);
    }

    #[test]
    fn expiry_boundary_is_inclusive_at_now() {
        let now = 1_700_000_000;
        let token = make_token(&format!(r#"{{"sub":"user-1","exp":{}}}"#, now));
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        assert_eq!(validate(&jar, now), LocalValidation::Expired);
    }

    #[test]
    fn expiry_inside_the_skew_buffer_is_expired() {
        let now = 1_700_000_000;
        let token = make_token(&format!(r#"{{"sub":"user-1","exp":{}}}"#, now + 15));
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        assert_eq!(validate(&jar, now), LocalValidation::Expired);
    }

    #[test]
    fn expiry_just_past_the_skew_buffer_is_valid() {
        let now = 1_700_000_000;
        let token = make_token(&format!(r#"{{"sub":"user-1","exp":{}}}"#, now + 31));
        let jar = jar(&[(COOKIE, wrap_plain(&token))]);
        match validate(&jar, now) {
            LocalValidation::Valid(session) => {
                assert_eq!(session.subject_id, "user-1");
                assert_eq!(session.expires_at, now + 31);
                assert_eq!(session.access_token, token);
            }
            other => panic!("expected valid, got {}", other.reason()),
        }
    }

    #[test]
    fn base64_wrapped_payload_validates() {
        let now = 1_700_000_000;
        let token = make_token(&format!(r#"{{"sub":"user-1","exp":{}}}"#, now + 3600));
        let jar = jar(&[(COOKIE, wrap_base64(&token))]);
        assert!(validate(&jar, now).is_valid());
    }

    #[test]
    fn chunked_cookie_validates_identically_to_the_unsplit_one() {
        let now = 1_700_000_000;
        let token = make_token(&format!(r#"{{"sub":"user-chunked","exp":{}}}"#, now + 600));
        let whole = wrap_base64(&token);

        let unsplit = jar(&[(COOKIE, whole.clone())]);
        let split_at = whole.len() / 3;
        let chunked = jar(&[
            ("pv_session.0", whole[..split_at].to_string()),
            ("pv_session.1", whole[split_at..].to_string()),
        ]);

        assert_eq!(validate(&unsplit, now), validate(&chunked, now));
        assert!(validate(&chunked, now).is_valid());
    }
}
