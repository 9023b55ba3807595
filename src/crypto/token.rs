use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// The size of share and guest tokens in bytes (256 bits of entropy).
const TOKEN_SIZE: usize = 32;

/// Generates an opaque token from 32 bytes of OS randomness,
/// base64url-encoded without padding (43 characters).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_SIZE];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex-encoded SHA-256 of a raw token.
///
/// The server stores and compares only this; the raw value exists solely in
/// the guest's cookie.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_43_urlsafe_characters() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn hashing_is_deterministic_and_one_way() {
        let raw = generate_token();
        let hash = hash_token(&raw);
        assert_eq!(hash, hash_token(&raw));
        assert_eq!(hash.len(), 64);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(!hash.contains(&raw));
    }

    #[test]
    fn distinct_tokens_hash_differently() {
        assert_ne!(hash_token("token-a"), hash_token("token-b"));
    }
}
