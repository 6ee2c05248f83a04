//! Suggestion merging and ranking.
//!
//! Lookups live in the search routes; everything here is pure so the
//! ordering rules stay testable without a database.

use serde::Serialize;

/// Queries shorter than this (after trim) return nothing.
pub const MIN_QUERY_LEN: usize = 2;
/// Hard cap on suggestions per response.
pub const MAX_SUGGESTIONS: usize = 20;

/// Shown when every lookup fails; filtered by substring before returning.
const CANNED_SUGGESTIONS: [&str; 8] = [
    "headphones",
    "running shoes",
    "smart watch",
    "backpack",
    "coffee maker",
    "yoga mat",
    "bluetooth speaker",
    "sunglasses",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Product,
    Category,
    Brand,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub text: String,
    pub kind: SuggestionKind,
    /// Occurrence count where the lookup provides one, else 0.
    pub count: i64,
}

/// Per-lookup result budgets: products get half the limit, categories and
/// brands a quarter each.
pub fn lookup_budgets(limit: usize) -> (usize, usize, usize) {
    let limit = limit.clamp(1, MAX_SUGGESTIONS);
    ((limit / 2).max(1), (limit / 4).max(1), (limit / 4).max(1))
}

/// The description/tag fallback lookup only runs when the primary lookups
/// together fall short of half the limit.
pub fn needs_fallback(combined: usize, limit: usize) -> bool {
    combined < limit.clamp(1, MAX_SUGGESTIONS) / 2
}

/// Deduplicates by case-insensitive text (first occurrence wins), then
/// orders: exact match, prefix match, products before categories/brands,
/// descending occurrence count.
pub fn rank(query: &str, candidates: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    let query = query.trim().to_lowercase();
    let mut seen: Vec<String> = Vec::new();
    let mut items: Vec<Suggestion> = Vec::new();
    for s in candidates {
        let key = s.text.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        items.push(s);
    }

    items.sort_by(|a, b| {
        let al = a.text.to_lowercase();
        let bl = b.text.to_lowercase();
        let exact = (bl == query).cmp(&(al == query));
        let prefix = (bl.starts_with(&query)).cmp(&(al.starts_with(&query)));
        let product =
            (b.kind == SuggestionKind::Product).cmp(&(a.kind == SuggestionKind::Product));
        exact
            .then(prefix)
            .then(product)
            .then(b.count.cmp(&a.count))
    });

    items.truncate(limit.clamp(1, MAX_SUGGESTIONS));
    items
}

/// Graceful degradation when a lookup fails: canned entries filtered by
/// case-insensitive substring match. May be empty.
pub fn canned(query: &str) -> Vec<Suggestion> {
    let query = query.trim().to_lowercase();
    CANNED_SUGGESTIONS
        .iter()
        .filter(|s| s.contains(&query))
        .map(|s| Suggestion {
            text: (*s).to_string(),
            kind: SuggestionKind::Product,
            count: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str, kind: SuggestionKind, count: i64) -> Suggestion {
        Suggestion {
            text: text.into(),
            kind,
            count,
        }
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let ranked = rank(
            "phone",
            vec![
                s("phone case", SuggestionKind::Product, 9),
                s("Phone", SuggestionKind::Category, 3),
                s("smartphone", SuggestionKind::Product, 20),
            ],
            10,
        );
        assert_eq!(ranked[0].text, "Phone");
    }

    #[test]
    fn test_prefix_beats_substring() {
        let ranked = rank(
            "sho",
            vec![
                s("flip flops and shoes", SuggestionKind::Product, 50),
                s("shoes", SuggestionKind::Product, 1),
            ],
            10,
        );
        assert_eq!(ranked[0].text, "shoes");
    }

    #[test]
    fn test_products_rank_before_brands() {
        let ranked = rank(
            "run",
            vec![
                s("runfast", SuggestionKind::Brand, 100),
                s("running shoes", SuggestionKind::Product, 2),
            ],
            10,
        );
        assert_eq!(ranked[0].kind, SuggestionKind::Product);
    }

    #[test]
    fn test_count_breaks_ties() {
        let ranked = rank(
            "sh",
            vec![
                s("shirt", SuggestionKind::Product, 2),
                s("shorts", SuggestionKind::Product, 7),
            ],
            10,
        );
        assert_eq!(ranked[0].text, "shorts");
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let ranked = rank(
            "sh",
            vec![
                s("Shoes", SuggestionKind::Product, 5),
                s("shoes", SuggestionKind::Brand, 9),
            ],
            10,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "Shoes");
        assert_eq!(ranked[0].kind, SuggestionKind::Product);
    }

    #[test]
    fn test_limit_is_capped() {
        let many: Vec<Suggestion> = (0..40)
            .map(|i| s(&format!("item {i}"), SuggestionKind::Product, i))
            .collect();
        assert_eq!(rank("item", many, 100).len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn test_budgets() {
        assert_eq!(lookup_budgets(20), (10, 5, 5));
        assert_eq!(lookup_budgets(10), (5, 2, 2));
        assert_eq!(lookup_budgets(1), (1, 1, 1));
    }

    #[test]
    fn test_fallback_trigger() {
        assert!(needs_fallback(3, 10));
        assert!(!needs_fallback(5, 10));
    }

    #[test]
    fn test_canned_filters_by_substring() {
        let hits = canned("shoe");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "running shoes");
        assert!(canned("zzzz").is_empty());
    }
}
