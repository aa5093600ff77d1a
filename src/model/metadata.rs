//! Metadata: the string key-value map on queries, items and graph nodes.

use std::collections::BTreeMap;

/// Free-form string metadata. Ordered so serialized forms are stable.
pub type Metadata = BTreeMap<String, String>;

/// Exact-match filter check: every filter key must map to the same value.
///
/// A key absent from `metadata` reads as the empty string, so a filter
/// `{"k": ""}` matches items that don't carry `k` at all.
pub fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters.iter().all(|(k, v)| {
        metadata.get(k).map(String::as_str).unwrap_or("") == v
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_empty_filters_match_everything() {
        assert!(matches_filters(&meta(&[("lang", "rust")]), &Metadata::new()));
        assert!(matches_filters(&Metadata::new(), &Metadata::new()));
    }

    #[test]
    fn test_all_filters_must_match() {
        let m = meta(&[("lang", "rust"), ("kind", "doc")]);
        assert!(matches_filters(&m, &meta(&[("lang", "rust")])));
        assert!(matches_filters(&m, &meta(&[("lang", "rust"), ("kind", "doc")])));
        assert!(!matches_filters(&m, &meta(&[("lang", "go")])));
        assert!(!matches_filters(&m, &meta(&[("lang", "rust"), ("kind", "code")])));
    }

    #[test]
    fn test_missing_key_reads_as_empty() {
        let m = meta(&[("lang", "rust")]);
        assert!(!matches_filters(&m, &meta(&[("team", "core")])));
        assert!(matches_filters(&m, &meta(&[("team", "")])));
    }
}
