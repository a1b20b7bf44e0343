//! Synthetic school affiliations and peer reviews.
//!
//! DBLP carries neither. Both are drawn from seeded RNGs so a rerun with
//! the same seed writes identical tables.

use crate::annotate::{LoremKind, TextGenerator};
use crate::records::{AffiliationRow, AuthorshipRow, ReviewRow};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Schools assigned to authors
pub const SCHOOLS: &[&str] = &[
    "Universitat Politecnica de Catalunya",
    "Universitat de Barcelona",
    "Universite Libre de Bruxelles",
    "Technische Universitat Berlin",
    "Technische Universiteit Eindhoven",
    "Politecnico di Milano",
    "ETH Zurich",
    "EPFL",
    "University of Oxford",
    "University of Cambridge",
    "Massachusetts Institute of Technology",
    "Stanford University",
    "Carnegie Mellon University",
    "University of California, Berkeley",
    "University of Toronto",
    "Tsinghua University",
    "National University of Singapore",
    "University of Tokyo",
];

/// Give every author a uniformly random school.
///
/// `authors` should be distinct and sorted so the draw order is stable.
pub fn synthesize_affiliations<R: Rng + ?Sized>(
    authors: &[String],
    rng: &mut R,
) -> Vec<AffiliationRow> {
    authors
        .iter()
        .filter_map(|author| {
            SCHOOLS.choose(rng).map(|school| AffiliationRow {
                author: author.clone(),
                school: school.to_string(),
            })
        })
        .collect()
}

/// Sample up to `per_paper` reviewers for every paper in `keys`.
///
/// Reviewers come from `pool` (distinct, sorted) minus the paper's own
/// authors as listed in `attributions`. A paper whose eligible pool is
/// smaller than `per_paper` gets everyone eligible.
pub fn synthesize_reviews<R, G>(
    keys: &[String],
    attributions: &[&[AuthorshipRow]],
    pool: &[String],
    per_paper: usize,
    rng: &mut R,
    generator: &mut G,
) -> Vec<ReviewRow>
where
    R: Rng + ?Sized,
    G: TextGenerator + ?Sized,
{
    let mut authors_of: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for row in attributions.iter().flat_map(|t| t.iter()) {
        authors_of
            .entry(row.key.as_str())
            .or_default()
            .insert(row.author.as_str());
    }

    let mut reviews = Vec::with_capacity(keys.len() * per_paper);
    for key in keys {
        let own = authors_of.get(key.as_str());
        let eligible: Vec<&String> = pool
            .iter()
            .filter(|a| own.is_none_or(|own| !own.contains(a.as_str())))
            .collect();

        if eligible.len() < per_paper {
            debug!(key = %key, eligible = eligible.len(), "Reviewer pool smaller than requested");
        }

        for reviewer in eligible.choose_multiple(rng, per_paper) {
            reviews.push(ReviewRow {
                key: key.clone(),
                reviewer: (*reviewer).clone(),
                comment: generator.lorem(LoremKind::Sentence),
            });
        }
    }
    reviews
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::LoremGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn attribution(key: &str, author: &str) -> AuthorshipRow {
        AuthorshipRow {
            key: key.to_string(),
            author: author.to_string(),
            last_name: String::new(),
            is_corresponding: false,
        }
    }

    #[test]
    fn test_every_author_gets_one_school() {
        let authors = names(&["Al Chen", "Bo Lee", "Cy Kim"]);
        let mut rng = StdRng::seed_from_u64(5);
        let rows = synthesize_affiliations(&authors, &mut rng);

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| SCHOOLS.contains(&r.school.as_str())));

        let again = synthesize_affiliations(&authors, &mut StdRng::seed_from_u64(5));
        assert_eq!(rows, again);
    }

    #[test]
    fn test_reviewers_exclude_own_authors() {
        let pool = names(&["Al Chen", "Bo Lee", "Cy Kim", "Di Fox", "Ed Roe"]);
        let keys = names(&["k1", "k2"]);
        let conference = vec![attribution("k1", "Al Chen"), attribution("k1", "Bo Lee")];
        let journal = vec![attribution("k2", "Ed Roe")];
        let mut rng = StdRng::seed_from_u64(11);
        let mut generator = LoremGenerator::new(StdRng::seed_from_u64(12));

        let reviews = synthesize_reviews(
            &keys,
            &[conference.as_slice(), journal.as_slice()],
            &pool,
            3,
            &mut rng,
            &mut generator,
        );

        let k1: HashSet<&str> = reviews
            .iter()
            .filter(|r| r.key == "k1")
            .map(|r| r.reviewer.as_str())
            .collect();
        assert_eq!(k1, HashSet::from(["Cy Kim", "Di Fox", "Ed Roe"]));

        let k2: Vec<&ReviewRow> = reviews.iter().filter(|r| r.key == "k2").collect();
        assert_eq!(k2.len(), 3);
        assert!(k2.iter().all(|r| r.reviewer != "Ed Roe" && !r.comment.is_empty()));
    }

    #[test]
    fn test_small_pool_gives_everyone_eligible() {
        let pool = names(&["Al Chen", "Bo Lee"]);
        let keys = names(&["k1"]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut generator = LoremGenerator::new(StdRng::seed_from_u64(1));
        let reviews = synthesize_reviews(&keys, &[], &pool, 3, &mut rng, &mut generator);
        assert_eq!(reviews.len(), 2);
    }
}
