//! Request key generation using SHA-256 hashes

use sha2::{Digest, Sha256};

/// Generate the dedup/cache key for a request.
///
/// The key is a SHA-256 hash of the upper-cased method, the URL with its query
/// parameters sorted, and the serialized body. Identical requests produce the
/// same key regardless of query parameter order.
pub fn request_key(method: &str, url: &str, body: Option<&str>) -> String {
    let mut hasher = Sha256::new();

    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"|");

    hasher.update(canonical_url(url).as_bytes());
    hasher.update(b"|");

    if let Some(body) = body {
        hasher.update(body.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Canonical form of a URL: query pairs sorted, fragment dropped.
///
/// Unparseable input is returned unchanged so it still hashes deterministically.
pub fn canonical_url(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };
    parsed.set_fragment(None);

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_deterministic() {
        let key1 = request_key(
            "GET",
            "http://h/api/v1/articles/?category=tutorials&page=2",
            None,
        );
        let key2 = request_key(
            "get",
            "http://h/api/v1/articles/?page=2&category=tutorials",
            None,
        );

        // Same inputs in different order should produce same key
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_request_key_different_methods() {
        let key1 = request_key("GET", "http://h/api/v1/articles/", None);
        let key2 = request_key("POST", "http://h/api/v1/articles/", None);

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_request_key_different_bodies() {
        let key1 = request_key("POST", "http://h/api/v1/comments/", Some(r#"{"a":1}"#));
        let key2 = request_key("POST", "http://h/api/v1/comments/", Some(r#"{"a":2}"#));

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_request_key_ignores_fragment() {
        let key1 = request_key("GET", "http://h/articles/x/#comments", None);
        let key2 = request_key("GET", "http://h/articles/x/", None);

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_canonical_url_unparseable_passthrough() {
        assert_eq!(canonical_url("not a url"), "not a url");
    }
}
