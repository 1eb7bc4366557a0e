//! Lightweight fuzzy ranking for name search.
//!
//! Candidates are scored against one or more text fields. The best field
//! wins. Tiers, highest first: exact match, prefix, substring, every query
//! token present, some query tokens present. Candidates scoring zero are
//! dropped; ties keep their original order.

/// Match quality of a query against a single field. `0` means no match.
pub fn score(query: &str, field: &str) -> u32 {
    let query = normalize(query);
    let field = normalize(field);
    if query.is_empty() || field.is_empty() {
        return 0;
    }
    if field == query {
        return 100;
    }
    if field.starts_with(&query) {
        return 80;
    }
    if field.contains(&query) {
        return 60;
    }

    let tokens: Vec<&str> = query.split_whitespace().collect();
    let matched = tokens.iter().filter(|t| field.contains(*t)).count();
    if matched == tokens.len() {
        40
    } else if matched > 0 {
        (20 * matched / tokens.len()) as u32
    } else {
        0
    }
}

/// Rank `items` by their best-scoring field and keep at most `limit`.
pub fn rank<T, F>(items: Vec<T>, query: &str, limit: usize, fields: F) -> Vec<T>
where
    F: Fn(&T) -> Vec<&str>,
{
    let mut scored: Vec<(u32, usize, T)> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let best = fields(&item)
                .into_iter()
                .map(|f| score(query, f))
                .max()
                .unwrap_or(0);
            (best > 0).then_some((best, i, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().take(limit).map(|(_, _, item)| item).collect()
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
