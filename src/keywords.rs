//! Keyword frequency accumulator and backfill.
//!
//! A [`KeywordFrequency`] is created fresh for every paper extraction call
//! (conference papers and journal papers each get their own), filled with
//! the tags of every title in that batch, and then used to top up titles
//! that produced too few tags.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// Titles with fewer tags than this are backfilled
pub const MIN_KEYWORDS: usize = 5;

/// Backfill draws only from this many most frequent keywords
pub const BACKFILL_POOL: usize = 20;

/// Keyword -> number of titles that produced it
#[derive(Debug, Default, Clone)]
pub struct KeywordFrequency {
    counts: HashMap<String, usize>,
}

impl KeywordFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every keyword of one title.
    pub fn observe(&mut self, keywords: &[String]) {
        for keyword in keywords {
            *self.counts.entry(keyword.clone()).or_insert(0) += 1;
        }
    }

    #[cfg(test)]
    fn count(&self, keyword: &str) -> usize {
        self.counts.get(keyword).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `n` most frequent keywords, most frequent first, ties alphabetical.
    pub fn top(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &usize)> = self.counts.iter().collect();
        ranked.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
        ranked.into_iter().take(n).map(|(k, _)| k.clone()).collect()
    }

    /// Top `keywords` up to [`MIN_KEYWORDS`] from the [`BACKFILL_POOL`] most
    /// frequent keywords. Lists that are already long enough come back
    /// unchanged.
    pub fn backfill<R: Rng + ?Sized>(&self, mut keywords: Vec<String>, rng: &mut R) -> Vec<String> {
        if keywords.len() >= MIN_KEYWORDS {
            return keywords;
        }

        let candidates: Vec<String> = self
            .top(BACKFILL_POOL)
            .into_iter()
            .filter(|k| !keywords.contains(k))
            .collect();
        let needed = MIN_KEYWORDS - keywords.len();

        keywords.extend(candidates.choose_multiple(rng, needed).cloned());
        keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn batch() -> KeywordFrequency {
        let mut freq = KeywordFrequency::new();
        // "graph" x30 down to "kw29" x1, thirty distinct keywords in total
        for i in 0..30 {
            let keyword = if i == 0 { "graph".to_string() } else { format!("kw{:02}", i) };
            for _ in 0..(30 - i) {
                freq.observe(std::slice::from_ref(&keyword));
            }
        }
        freq
    }

    #[test]
    fn test_top_orders_by_count_then_name() {
        let mut freq = KeywordFrequency::new();
        freq.observe(&words(&["query", "graph"]));
        freq.observe(&words(&["graph", "index"]));
        assert_eq!(freq.top(3), words(&["graph", "index", "query"]));
        assert_eq!(freq.count("graph"), 2);
    }

    #[test]
    fn test_empty_title_draws_only_from_top_pool() {
        let freq = batch();
        let pool = freq.top(BACKFILL_POOL);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..50 {
            let filled = freq.backfill(Vec::new(), &mut rng);
            assert_eq!(filled.len(), MIN_KEYWORDS);
            assert!(filled.iter().all(|k| pool.contains(k)));
        }
    }

    #[test]
    fn test_long_lists_are_untouched() {
        let freq = batch();
        let mut rng = StdRng::seed_from_u64(1);
        let tags = words(&["a", "b", "c", "d", "e"]);
        assert_eq!(freq.backfill(tags.clone(), &mut rng), tags);
    }

    #[test]
    fn test_partial_list_keeps_own_tags_and_skips_duplicates() {
        let freq = batch();
        let mut rng = StdRng::seed_from_u64(3);
        let filled = freq.backfill(words(&["graph", "semantics"]), &mut rng);

        assert_eq!(filled.len(), MIN_KEYWORDS);
        assert_eq!(&filled[..2], &words(&["graph", "semantics"])[..]);
        assert_eq!(filled.iter().filter(|k| *k == "graph").count(), 1);
    }

    #[test]
    fn test_empty_accumulator_leaves_list_short() {
        let freq = KeywordFrequency::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(freq.backfill(Vec::new(), &mut rng).is_empty());
        assert!(freq.is_empty());
    }
}
