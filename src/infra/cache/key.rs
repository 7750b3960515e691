use std::collections::BTreeMap;

/// Build a deterministic cache key from a name prefix and a parameter map.
///
/// Parameters are emitted in sorted order (a `BTreeMap` guarantees it), so
/// differently-ordered but equivalent requests agree on one key. Values are
/// percent-encoded so `&`, `=` and `:` inside a value cannot collide with
/// the key structure.
#[must_use]
pub fn cache_key(prefix: &str, params: &BTreeMap<String, String>) -> String {
    let mut key = String::with_capacity(prefix.len() + 1 + params.len() * 16);
    key.push_str(prefix);
    key.push(':');
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            key.push('&');
        }
        key.push_str(name);
        key.push('=');
        key.push_str(&urlencoding::encode(value));
    }
    key
}

/// Key prefix addressing every entry of one endpoint.
#[must_use]
pub fn endpoint_prefix(endpoint_id: &str) -> String {
    format!("{endpoint_id}:")
}

/// The `name=value` pair token for one parameter, encoded exactly as
/// [`cache_key`] would emit it.
#[must_use]
pub fn param_token(name: &str, value: &str) -> String {
    format!("{name}={}", urlencoding::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    #[test]
    fn key_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("a".to_owned(), "1".to_owned());
        a.insert("b".to_owned(), "2".to_owned());
        let mut b = BTreeMap::new();
        b.insert("b".to_owned(), "2".to_owned());
        b.insert("a".to_owned(), "1".to_owned());
        assert_eq!(cache_key("issues.list", &a), cache_key("issues.list", &b));
        assert_eq!(cache_key("issues.list", &a), "issues.list:a=1&b=2");
    }

    #[test]
    fn empty_params_still_carry_the_separator() {
        // `issues.list:` never collides with an `issues.list_archived:` prefix.
        assert_eq!(cache_key("issues.list", &map(&[])), "issues.list:");
    }

    #[test]
    fn values_are_encoded() {
        let key = cache_key("issues.list", &map(&[("q", "a&b=c")]));
        assert_eq!(key, "issues.list:q=a%26b%3Dc");
    }

    #[test]
    fn param_token_matches_key_encoding() {
        let key = cache_key("issues.get", &map(&[("id", "X 1")]));
        assert!(key.ends_with(&param_token("id", "X 1")));
    }
}
