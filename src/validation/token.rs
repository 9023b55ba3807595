/// Length of a share-link token: 32 random bytes, base64url without padding.
pub const SHARE_TOKEN_LEN: usize = 43;

/// Checks the shape of a share-link token before touching storage.
///
/// Anything that is not exactly 43 base64url characters cannot have been
/// issued by us, so storage is never consulted for it.
///
/// # Arguments
///
/// * `token` - The token from the request URL.
///
/// # Returns
///
/// `true` if the token could have been issued by this service.
pub fn share_token_shape_ok(token: &str) -> bool {
    token.len() == SHARE_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_wellformed_token() {
        let token = "Ab9_-".repeat(8) + "xyZ";
        assert_eq!(token.len(), SHARE_TOKEN_LEN);
        assert!(share_token_shape_ok(&token));
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert!(!share_token_shape_ok(&"a".repeat(SHARE_TOKEN_LEN - 1)));
        assert!(!share_token_shape_ok(&"a".repeat(SHARE_TOKEN_LEN + 1)));
        assert!(!share_token_shape_ok(""));
    }

    #[test]
    fn rejects_charset_violations() {
        let mut token = "a".repeat(SHARE_TOKEN_LEN);
        token.replace_range(10..11, "+");
        assert!(!share_token_shape_ok(&token));
        token.replace_range(10..11, "=");
        assert!(!share_token_shape_ok(&token));
        token.replace_range(10..11, " ");
        assert!(!share_token_shape_ok(&token));
    }
}
