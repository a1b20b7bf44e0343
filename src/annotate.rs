//! Text annotation and placeholder text collaborators.
//!
//! The pipeline only needs three answers about free text: which nouns a
//! title contains, which place names it mentions, and some lorem ipsum to
//! stand in for abstracts and review comments. Each lives behind a trait so
//! the extraction stages do not care whether the answer comes from the
//! in-process [`LexiconAnnotator`] or a remote service via [`HttpAnnotator`].

use crate::error::{DblpGraphError, OptionExt, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request timeout for the remote annotation service
const ANNOTATION_TIMEOUT: Duration = Duration::from_secs(15);

static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{L}[\p{L}\p{N}'-]*").expect("valid word regex")
});

static PLACES: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = GAZETTEER
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).expect("valid gazetteer regex")
});

/// Function words and generic title filler that never make a keyword
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "against", "all", "also", "among", "an", "and",
    "any", "are", "around", "as", "at", "be", "been", "being", "between", "beyond", "both", "but",
    "by", "can", "could", "do", "does", "during", "each", "either", "for", "from", "further",
    "has", "have", "how", "if", "in", "into", "is", "it", "its", "more", "most", "much", "new",
    "no", "non", "not", "of", "on", "one", "only", "or", "other", "our", "over", "per", "same",
    "should", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "to", "toward", "towards", "two", "under", "up", "upon",
    "use", "used", "using", "versus", "very", "via", "vs", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "why", "will", "with", "within", "without", "you", "your",
    "based", "novel", "improved", "efficient", "effective", "revisited", "case", "study",
];

/// Place names recognised by the in-process annotator
const GAZETTEER: &[&str] = &[
    "Amsterdam", "Athens", "Atlanta", "Austin", "Barcelona", "Beijing", "Berlin", "Boston",
    "Brussels", "Budapest", "Cairo", "Chicago", "Copenhagen", "Delhi", "Dresden", "Dublin",
    "Edinburgh", "Florence", "Geneva", "Hamburg", "Helsinki", "Hong Kong", "Istanbul", "Kyoto",
    "Lisbon", "London", "Los Angeles", "Lyon", "Madrid", "Melbourne", "Milan", "Montreal",
    "Moscow", "Munich", "New York", "Oslo", "Paris", "Prague", "Rome", "San Diego",
    "San Francisco", "Santiago", "Seattle", "Seoul", "Shanghai", "Singapore", "Stockholm",
    "Sydney", "Tokyo", "Toronto", "Vancouver", "Venice", "Vienna", "Warsaw", "Zurich",
    "Argentina", "Australia", "Austria", "Belgium", "Brazil", "Canada", "Chile", "China",
    "Denmark", "Egypt", "Europe", "Finland", "France", "Germany", "Greece", "India", "Ireland",
    "Israel", "Italy", "Japan", "Korea", "Mexico", "Netherlands", "Norway", "Poland", "Portugal",
    "Russia", "Spain", "Sweden", "Switzerland", "Turkey",
];

const LOREM_WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in",
    "reprehenderit", "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur",
    "excepteur", "sint", "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui",
    "officia", "deserunt", "mollit", "anim", "id", "est", "laborum",
];

/// Noun tagging and place extraction over free text
#[async_trait]
pub trait TextAnnotator: Send + Sync {
    /// Keyword candidates (lower-case nouns) in `text`, in order of first
    /// appearance, without duplicates.
    async fn tag_nouns(&self, text: &str) -> Result<Vec<String>>;

    /// Place names mentioned in `text`, in order of first appearance.
    async fn extract_place_names(&self, text: &str) -> Result<Vec<String>>;
}

/// In-process annotator: regex tokenizer, stop-word list and a place gazetteer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconAnnotator;

impl LexiconAnnotator {
    pub fn new() -> Self {
        Self
    }

    fn nouns(text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        WORD.find_iter(text)
            .map(|m| m.as_str().trim_matches(|c| c == '-' || c == '\'').to_lowercase())
            .filter(|w| w.chars().count() >= 3 && !STOP_WORDS.contains(&w.as_str()))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    fn places(text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        PLACES
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }
}

#[async_trait]
impl TextAnnotator for LexiconAnnotator {
    async fn tag_nouns(&self, text: &str) -> Result<Vec<String>> {
        Ok(Self::nouns(text))
    }

    async fn extract_place_names(&self, text: &str) -> Result<Vec<String>> {
        Ok(Self::places(text))
    }
}

#[derive(Debug, Serialize)]
struct AnnotationRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NounsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    places: Option<Vec<String>>,
}

/// Client for a remote annotation service.
///
/// The service answers `POST {base}/nouns` with `{"tags": [...]}` and
/// `POST {base}/places` with `{"places": [...]}`, both for a `{"text": ...}`
/// body.
pub struct HttpAnnotator {
    client: reqwest::Client,
    nouns_url: Url,
    places_url: Url,
}

impl HttpAnnotator {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| DblpGraphError::Config(format!("Invalid annotator URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |endpoint: &str| {
            base.join(endpoint)
                .map_err(|e| DblpGraphError::Config(format!("Invalid annotator URL: {}", e)))
        };
        let nouns_url = join("nouns")?;
        let places_url = join("places")?;

        let client = reqwest::Client::builder()
            .timeout(ANNOTATION_TIMEOUT)
            .build()
            .map_err(|e| DblpGraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            nouns_url,
            places_url,
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, url: &Url, text: &str) -> Result<T> {
        debug!(url = %url, "Annotation request");
        let response = self
            .client
            .post(url.clone())
            .json(&AnnotationRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Annotation service error");
            return Err(DblpGraphError::Annotation(format!(
                "{} answered {}",
                url, status
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TextAnnotator for HttpAnnotator {
    async fn tag_nouns(&self, text: &str) -> Result<Vec<String>> {
        let response: NounsResponse = self.post(&self.nouns_url, text).await?;
        let tags = response.tags.ok_or_annotation("response missing 'tags'")?;
        let mut seen = HashSet::new();
        Ok(tags
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect())
    }

    async fn extract_place_names(&self, text: &str) -> Result<Vec<String>> {
        let response: PlacesResponse = self.post(&self.places_url, text).await?;
        response.places.ok_or_annotation("response missing 'places'")
    }
}

/// Size of a placeholder text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoremKind {
    Paragraph,
    Sentence,
}

/// Source of placeholder text
pub trait TextGenerator {
    fn lorem(&mut self, kind: LoremKind) -> String;
}

/// Lorem ipsum generator driven by a seeded RNG
pub struct LoremGenerator {
    rng: StdRng,
}

impl LoremGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    fn sentence(&mut self) -> String {
        let len = self.rng.gen_range(6..=14);
        let comma_after = self.rng.gen_bool(0.3).then(|| self.rng.gen_range(2..len - 2));

        let mut sentence = String::new();
        for i in 0..len {
            let word = LOREM_WORDS.choose(&mut self.rng).copied().unwrap_or("lorem");
            if i == 0 {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    sentence.extend(first.to_uppercase());
                    sentence.push_str(chars.as_str());
                }
            } else {
                sentence.push(' ');
                sentence.push_str(word);
            }
            if comma_after == Some(i) {
                sentence.push(',');
            }
        }
        sentence.push('.');
        sentence
    }
}

impl TextGenerator for LoremGenerator {
    fn lorem(&mut self, kind: LoremKind) -> String {
        match kind {
            LoremKind::Sentence => self.sentence(),
            LoremKind::Paragraph => {
                let count = self.rng.gen_range(4..=7);
                (0..count).map(|_| self.sentence()).collect::<Vec<_>>().join(" ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[tokio::test]
    async fn test_tag_nouns_drops_stop_words_and_duplicates() -> Result<()> {
        let tags = LexiconAnnotator::new()
            .tag_nouns("A Survey of Graph Databases and Graph Query Languages")
            .await?;
        assert_eq!(tags, vec!["survey", "graph", "databases", "query", "languages"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_nouns_on_filler_title_is_empty() -> Result<()> {
        let tags = LexiconAnnotator::new().tag_nouns("On the Use of It").await?;
        assert!(tags.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_place_names() -> Result<()> {
        let annotator = LexiconAnnotator::new();
        let places = annotator
            .extract_place_names("Traffic in New York and Paris: New York revisited")
            .await?;
        assert_eq!(places, vec!["New York", "Paris"]);

        let none = annotator.extract_place_names("Parisian Graph Theory").await?;
        assert!(none.is_empty());
        Ok(())
    }

    #[test]
    fn test_http_annotator_urls() -> Result<()> {
        let annotator = HttpAnnotator::new("http://localhost:8080/api")?;
        assert_eq!(annotator.nouns_url.as_str(), "http://localhost:8080/api/nouns");
        assert_eq!(annotator.places_url.as_str(), "http://localhost:8080/api/places");
        assert!(HttpAnnotator::new("not a url").is_err());
        Ok(())
    }

    #[test]
    fn test_lorem_is_seeded() {
        let mut a = LoremGenerator::new(StdRng::seed_from_u64(9));
        let mut b = LoremGenerator::new(StdRng::seed_from_u64(9));
        let text = a.lorem(LoremKind::Paragraph);
        assert_eq!(text, b.lorem(LoremKind::Paragraph));

        let sentence = a.lorem(LoremKind::Sentence);
        assert!(sentence.ends_with('.'));
        assert!(sentence.chars().next().is_some_and(|c| c.is_uppercase()));
    }
}
