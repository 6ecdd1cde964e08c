use std::collections::BTreeMap;

use url::{Url, form_urlencoded};

/// The Engine.IO protocol revision this crate speaks
pub const PROTOCOL_VERSION: &str = "3";

/// Query key carrying [`PROTOCOL_VERSION`]
pub const PROTOCOL_VERSION_KEY: &str = "EIO";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid query {query:?}: {reason}")]
    InvalidQuery { query: String, reason: String },
}

/// Build the URL a dial attempt connects to.
///
/// The protocol version is always stamped onto the URL, overriding anything
/// the caller put there, in `base` or in `extra_query`. Every key in
/// `extra_query` replaces the key of the same name in `base`; repeated keys
/// in `extra_query` are joined with `,` so the result carries a single value
/// per key.
///
/// Keys are written in sorted order.
///
/// # Example
///
/// ```rust
/// use eio_core::compose_url;
///
/// let url = compose_url("http://localhost/engine.io/?token=old", "token=new&room=a&room=b").unwrap();
/// assert_eq!(url.query(), Some("EIO=3&room=a%2Cb&token=new"));
/// ```
pub fn compose_url(base: &str, extra_query: &str) -> Result<Url, QueryError> {
    let mut url = Url::parse(base)?;

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        query
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    for (key, values) in parse_query(extra_query)? {
        query.insert(key, vec![values.join(",")]);
    }
    query.insert(
        PROTOCOL_VERSION_KEY.to_string(),
        vec![PROTOCOL_VERSION.to_string()],
    );

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, values) in &query {
            for value in values {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url)
}

/// Parse a raw query string into keys and their values, in first-seen key
/// order.
///
/// `application/x-www-form-urlencoded` parsing in the `url` crate never
/// fails, so the separators and escapes are checked up front.
fn parse_query(raw: &str) -> Result<Vec<(String, Vec<String>)>, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidQuery {
        query: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.contains(';') {
        return Err(invalid("semicolon separators are not allowed"));
    }
    let bytes = raw.as_bytes();
    for (idx, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(idx + 1..idx + 3);
            let valid = escape.is_some_and(|e| e.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(invalid("malformed percent escape"));
            }
        }
    }

    let mut parsed: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in form_urlencoded::parse(bytes) {
        match parsed.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => parsed.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn stamps_protocol_version() {
        let url = compose_url("http://example.com/engine.io/?EIO=4", "").unwrap();
        assert_eq!(pairs(&url), vec![("EIO".to_string(), "3".to_string())]);
        assert_eq!(url.path(), "/engine.io/");
    }

    #[test]
    fn caller_cannot_override_protocol_version() {
        let url = compose_url("http://example.com/", "EIO=4&x=1").unwrap();
        let versions: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "EIO")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(versions, vec!["3".to_string()]);
    }

    #[test]
    fn extra_query_overrides_existing_key() {
        let url = compose_url("http://example.com/?key=old&keep=1", "key=new").unwrap();
        assert_eq!(
            pairs(&url),
            vec![
                ("EIO".to_string(), "3".to_string()),
                ("keep".to_string(), "1".to_string()),
                ("key".to_string(), "new".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_keys_are_joined_with_commas() {
        let url = compose_url("http://example.com/", "key=a&key=b").unwrap();
        let key: Vec<_> = url.query_pairs().filter(|(k, _)| k == "key").collect();
        assert_eq!(key.len(), 1);
        assert_eq!(key[0].1, "a,b");
    }

    #[test]
    fn untouched_base_keys_keep_all_values() {
        let url = compose_url("http://example.com/?tag=x&tag=y", "other=1").unwrap();
        let tags: Vec<_> = url
            .query_pairs()
            .filter(|(k, _)| k == "tag")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(tags, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(matches!(
            compose_url("not a url", ""),
            Err(QueryError::InvalidUrl(_))
        ));
    }

    #[test]
    fn malformed_query_is_rejected() {
        for bad in ["a=%zz", "a=1;b=2", "a=%4"] {
            assert!(
                matches!(
                    compose_url("http://example.com/", bad),
                    Err(QueryError::InvalidQuery { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn escapes_are_decoded() {
        let url = compose_url("http://example.com/", "name=a%20b&plus=c+d").unwrap();
        let values: BTreeMap<_, _> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(values["name"], "a b");
        assert_eq!(values["plus"], "c d");
    }
}
