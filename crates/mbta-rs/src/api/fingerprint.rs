//! Deterministic request keys shared by the cache and the coalescer.
//!
//! A [`Fingerprint`] is derived from the resource path and the query
//! parameters after normalisation: keys are sorted, values are trimmed, and
//! comma-separated list values of `filter[..]`, `fields[..]` and `include`
//! are sorted and de-duplicated. Two logically identical requests therefore
//! always map to the same key regardless of parameter insertion order.

use std::fmt;

/// Canonical identity of a logical upstream request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from a resource path and its query parameters.
    pub fn new<I, K, V>(path: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| {
                let key = k.as_ref().trim().to_string();
                let value = normalize_value(&key, v.as_ref());
                (key, value)
            })
            .collect();
        pairs.sort();
        pairs.dedup();

        let mut key = String::from(path.trim().trim_end_matches('/'));
        for (i, (k, v)) in pairs.iter().enumerate() {
            key.push(if i == 0 { '?' } else { '&' });
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        Fingerprint(key)
    }

    /// Distinguish two result shapes fetched from the same request, e.g. a
    /// single page versus every page of the same collection.
    pub fn with_variant(mut self, variant: &str) -> Self {
        self.0.push('#');
        self.0.push_str(variant);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a parameter's value is an unordered comma-separated set.
fn is_set_valued(key: &str) -> bool {
    key == "include" || key.starts_with("filter[") || key.starts_with("fields[")
}

fn normalize_value(key: &str, value: &str) -> String {
    let value = value.trim();
    if !is_set_valued(key) {
        return value.to_string();
    }
    let mut items: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    items.sort_unstable();
    items.dedup();
    items.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_order_does_not_matter() {
        let a = Fingerprint::new(
            "/predictions",
            [("filter[stop]", "place-pktrm"), ("page[limit]", "10")],
        );
        let b = Fingerprint::new(
            "/predictions",
            [("page[limit]", "10"), ("filter[stop]", "place-pktrm")],
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/predictions?filter[stop]=place-pktrm&page[limit]=10");
    }

    #[test]
    fn every_permutation_is_equal() {
        let params = [
            ("filter[route]", "Red"),
            ("filter[direction_id]", "0"),
            ("page[limit]", "5"),
        ];
        let reference = Fingerprint::new("/vehicles", params);
        let orders = [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let permuted = order.iter().map(|&i| params[i]);
            assert_eq!(Fingerprint::new("/vehicles", permuted), reference);
        }
    }

    #[test]
    fn filter_lists_are_order_insensitive() {
        let a = Fingerprint::new("/alerts", [("filter[route]", "Red,Orange")]);
        let b = Fingerprint::new("/alerts", [("filter[route]", " Orange , Red,Red")]);
        assert_eq!(a, b);
    }

    #[test]
    fn sort_parameter_keeps_its_order() {
        let a = Fingerprint::new("/stops", [("sort", "name,-id")]);
        let b = Fingerprint::new("/stops", [("sort", "-id,name")]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_values_differ() {
        let a = Fingerprint::new("/stops", [("filter[route]", "Red")]);
        let b = Fingerprint::new("/stops", [("filter[route]", "Blue")]);
        assert_ne!(a, b);
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let a = Fingerprint::new("/routes/", std::iter::empty::<(&str, &str)>());
        let b = Fingerprint::new("/routes", std::iter::empty::<(&str, &str)>());
        assert_eq!(a, b);
    }

    #[test]
    fn variant_distinguishes_shapes() {
        let base = Fingerprint::new("/stops", [("page[limit]", "100")]);
        assert_ne!(base.clone().with_variant("all"), base);
    }
}
