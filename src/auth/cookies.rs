use tower_cookies::Cookies;

/// Reconstructs a logical cookie value the browser or a proxy may have
/// split into indexed chunks.
///
/// A cookie named `<base>` may arrive physically as `<base>.0`, `<base>.1`,
/// … Chunks are concatenated in ascending numeric suffix order. When no
/// chunked variant exists the unsuffixed cookie is used directly.
///
/// # Arguments
///
/// * `lookup` - Resolves a physical cookie name to its value.
/// * `base` - The logical cookie name.
///
/// # Returns
///
/// An `Option` containing the reconstructed value, or `None` when neither
/// form is present.
pub fn assemble(lookup: impl Fn(&str) -> Option<String>, base: &str) -> Option<String> {
    let mut chunks: Vec<String> = Vec::new();
    loop {
        match lookup(&format!("{}.{}", base, chunks.len())) {
            Some(chunk) => chunks.push(chunk),
            None => break,
        }
    }

    if chunks.is_empty() {
        lookup(base)
    } else {
        Some(chunks.concat())
    }
}

/// Adapts the request's cookie jar into an [`assemble`]-compatible lookup.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// A lookup closure over the jar, for [`assemble`] and the local validator.
pub fn request_lookup(cookies: &Cookies) -> impl Fn(&str) -> Option<String> + '_ {
    move |name| cookies.get(name).map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn jar(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn lookup(jar: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
        move |name| jar.get(name).cloned()
    }

    #[test]
    fn uses_the_unsuffixed_cookie_when_no_chunks_exist() {
        let jar = jar(&[("pv_session", "whole-value")]);
        assert_eq!(
            assemble(lookup(&jar), "pv_session"),
            Some("whole-value".to_string())
        );
    }

    #[test]
    fn reassembles_two_chunks_in_suffix_order() {
        let jar = jar(&[("pv_session.0", "first-"), ("pv_session.1", "second")]);
        assert_eq!(
            assemble(lookup(&jar), "pv_session"),
            Some("first-second".to_string())
        );
    }

    #[test]
    fn chunk_boundaries_are_irrelevant() {
        let value = "abcdefghijklmnopqrstuvwxyz0123456789";
        for split in [1, 7, 18, 35] {
            let (head, tail) = value.split_at(split);
            let jar = jar(&[("pv_session.0", head), ("pv_session.1", tail)]);
            assert_eq!(assemble(lookup(&jar), "pv_session"), Some(value.to_string()));
        }
    }

    #[test]
    fn prefers_chunks_over_a_stale_unsuffixed_cookie() {
        let jar = jar(&[
            ("pv_session", "stale"),
            ("pv_session.0", "fresh-"),
            ("pv_session.1", "value"),
        ]);
        assert_eq!(
            assemble(lookup(&jar), "pv_session"),
            Some("fresh-value".to_string())
        );
    }

    #[test]
    fn handles_more_than_two_chunks() {
        let jar = jar(&[
            ("pv_session.0", "a"),
            ("pv_session.1", "b"),
            ("pv_session.2", "c"),
        ]);
        assert_eq!(assemble(lookup(&jar), "pv_session"), Some("abc".to_string()));
    }

    #[test]
    fn absent_cookie_yields_none() {
        let jar = jar(&[("other", "x")]);
        assert_eq!(assemble(lookup(&jar), "pv_session"), None);
    }
}
