use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;

/// Claims carried in the provider's access token.
///
/// Every field is optional: the decoder answers "is this worth a network
/// round trip?", it does not enforce claim presence. Enforcement belongs to
/// the validator on top.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    /// Standard subject claim; the provider's user id.
    pub sub: Option<String>,
    /// Standard expiry (Unix timestamp, seconds).
    pub exp: Option<i64>,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: Option<i64>,
    /// Email on record at token issuance.
    pub email: Option<String>,
    /// Provider role claim ("authenticated", "anon", ...).
    pub role: Option<String>,
    /// The provider-side session handle, when present.
    pub session_id: Option<String>,
}

/// Result of decoding a token without verifying its signature.
#[derive(Debug, Clone)]
pub enum DecodedToken {
    /// The middle segment parsed as claims. Plausible, not trusted.
    Decoded(TokenClaims),
    /// Not a three-segment token, or the payload did not parse.
    Malformed,
}

/// Decodes the claims of a three-part dot-delimited token.
///
/// No cryptographic verification happens here. A `Decoded` result is a
/// latency optimization gate in front of the authoritative provider check,
/// never a security boundary by itself.
pub fn decode_unverified(token: &str) -> DecodedToken {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return DecodedToken::Malformed;
    };

    let raw = match general_purpose::URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(_) => return DecodedToken::Malformed,
    };

    match sonic_rs::from_slice::<TokenClaims>(&raw) {
        Ok(claims) => DecodedToken::Decoded(claims),
        Err(_) => DecodedToken::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload_json: &str) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
        format!("{}.{}.sig-not-checked", header, payload)
    }

    #[test]
    fn decodes_subject_and_expiry() {
        let token = token_with_payload(r#"{"sub":"user-1","exp":1700000000,"role":"authenticated"}"#);
        match decode_unverified(&token) {
            DecodedToken::Decoded(claims) => {
                assert_eq!(claims.sub.as_deref(), Some("user-1"));
                assert_eq!(claims.exp, Some(1700000000));
                assert_eq!(claims.role.as_deref(), Some("authenticated"));
            }
            DecodedToken::Malformed => panic!("expected a decodable token"),
        }
    }

    #[test]
    fn missing_claims_default_to_none() {
        let token = token_with_payload(r#"{"aud":"parley"}"#);
        match decode_unverified(&token) {
            DecodedToken::Decoded(claims) => {
                assert!(claims.sub.is_none());
                assert!(claims.exp.is_none());
            }
            DecodedToken::Malformed => panic!("unknown claims must not break decoding"),
        }
    }

    #[test]
    fn tolerates_padded_base64() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"padded"}"#);
        let token = format!("h.{}.s", payload);
        match decode_unverified(&token) {
            DecodedToken::Decoded(claims) => assert_eq!(claims.sub.as_deref(), Some("padded")),
            DecodedToken::Malformed => panic!("padded payloads must decode"),
        }
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        assert!(matches!(decode_unverified(""), DecodedToken::Malformed));
        assert!(matches!(decode_unverified("a.b"), DecodedToken::Malformed));
        assert!(matches!(decode_unverified("a.b.c.d"), DecodedToken::Malformed));
    }

    #[test]
    fn rejects_garbage_payloads() {
        assert!(matches!(
            decode_unverified("header.!!!not-base64!!!.sig"),
            DecodedToken::Malformed
        ));
        let not_json = general_purpose::URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(matches!(
            decode_unverified(&format!("h.{}.s", not_json)),
            DecodedToken::Malformed
        ));
    }
}
