//! Sparse TF-IDF vectorization.
//!
//! A [`TfidfVectorizer`] is fitted once over a chunk collection and then used,
//! unchanged, to vectorize both the chunks and every later query. Vectors are
//! L2 normalised so cosine similarity reduces to a dot product.

use crate::models::VectorizerConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
    "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
    "amongst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything",
    "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became", "because",
    "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being",
    "below", "beside", "besides", "between", "beyond", "both", "bottom", "but", "by", "call",
    "can", "cannot", "could", "did", "do", "does", "done", "down", "due", "during", "each",
    "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every", "everyone",
    "everything", "everywhere", "except", "few", "first", "for", "former", "formerly", "from",
    "front", "full", "further", "get", "give", "go", "had", "has", "have", "he", "hence", "her",
    "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself",
    "his", "how", "however", "ie", "if", "in", "inc", "indeed", "into", "is", "it", "its",
    "itself", "just", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made",
    "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly",
    "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
    "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part", "per",
    "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "several", "she", "should", "show", "side", "since", "so", "some", "somehow",
    "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "take",
    "than", "that", "the", "their", "them", "themselves", "then", "thence", "there",
    "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they", "this",
    "those", "though", "through", "throughout", "thru", "thus", "to", "together", "too", "top",
    "toward", "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we",
    "well", "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter",
    "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while",
    "whither", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.binary_search(&token).is_ok()
}

/// Sparse vector as `(term id, weight)` pairs sorted by term id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    pub fn from_weights(weights: BTreeMap<u32, f32>) -> Self {
        Self {
            entries: weights.into_iter().filter(|(_, weight)| *weight != 0.0).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn norm(&self) -> f32 {
        self.entries
            .iter()
            .map(|(_, weight)| weight * weight)
            .sum::<f32>()
            .sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut left, mut right) = (0usize, 0usize);
        let mut total = 0f32;
        while left < self.entries.len() && right < other.entries.len() {
            let (left_term, left_weight) = self.entries[left];
            let (right_term, right_weight) = other.entries[right];
            match left_term.cmp(&right_term) {
                std::cmp::Ordering::Less => left += 1,
                std::cmp::Ordering::Greater => right += 1,
                std::cmp::Ordering::Equal => {
                    total += left_weight * right_weight;
                    left += 1;
                    right += 1;
                }
            }
        }
        total
    }

    /// Cosine distance in `[0, 2]`; a zero vector is at distance 1 from everything.
    pub fn cosine_distance(&self, other: &SparseVector) -> f32 {
        let denominator = self.norm() * other.norm();
        if denominator == 0.0 {
            return 1.0;
        }
        1.0 - (self.dot(other) / denominator)
    }

    fn normalize(&mut self) {
        let magnitude = self.norm();
        if magnitude > 0.0 {
            for (_, weight) in &mut self.entries {
                *weight /= magnitude;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fits vocabulary and inverse document frequencies over `documents`.
    pub fn fit<S: AsRef<str>>(documents: &[S], config: &VectorizerConfig) -> Self {
        let mut term_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut document_frequency: BTreeMap<String, u64> = BTreeMap::new();

        for document in documents {
            let terms = analyze(document.as_ref(), config);
            let mut seen: HashSet<&str> = HashSet::new();
            for term in &terms {
                *term_counts.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.as_str()) {
                    *document_frequency.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut kept: Vec<&String> = term_counts.keys().collect();
        if let Some(limit) = config.max_features {
            if kept.len() > limit {
                // Stable sort keeps alphabetical order among equal counts.
                kept.sort_by(|left, right| term_counts[*right].cmp(&term_counts[*left]));
                kept.truncate(limit);
                kept.sort();
            }
        }

        let total_documents = documents.len() as f32;
        let mut vocabulary = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (term_id, term) in kept.into_iter().enumerate() {
            let df = document_frequency.get(term).copied().unwrap_or(0) as f32;
            idf.push(((1.0 + total_documents) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term.clone(), term_id as u32);
        }

        Self {
            config: config.clone(),
            vocabulary,
            idf,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Every vocabulary term has exactly one idf weight.
    pub(crate) fn is_consistent(&self) -> bool {
        self.vocabulary.len() == self.idf.len()
            && self
                .vocabulary
                .values()
                .all(|term_id| (*term_id as usize) < self.idf.len())
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    pub fn transform(&self, text: &str) -> SparseVector {
        let mut weights: BTreeMap<u32, f32> = BTreeMap::new();
        for term in analyze(text, &self.config) {
            if let Some(term_id) = self.vocabulary.get(&term) {
                *weights.entry(*term_id).or_insert(0.0) += 1.0;
            }
        }

        for (term_id, weight) in weights.iter_mut() {
            *weight *= self.idf.get(*term_id as usize).copied().unwrap_or(0.0);
        }

        let mut vector = SparseVector::from_weights(weights);
        vector.normalize();
        vector
    }
}

/// Lowercases, tokenizes, drops stop words and appends bigrams when enabled.
pub fn analyze(text: &str, config: &VectorizerConfig) -> Vec<String> {
    let lowered = text.to_lowercase();
    let unigrams: Vec<String> = token_pattern()
        .find_iter(&lowered)
        .map(|token| token.as_str().to_string())
        .filter(|token| !(config.remove_stop_words && is_stop_word(token)))
        .collect();

    if !config.include_bigrams || unigrams.len() < 2 {
        return unigrams;
    }

    let bigrams: Vec<String> = unigrams
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect();

    let mut terms = unigrams;
    terms.extend(bigrams);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unigram_config() -> VectorizerConfig {
        VectorizerConfig {
            max_features: None,
            include_bigrams: false,
            remove_stop_words: true,
        }
    }

    #[test]
    fn stop_word_list_is_sorted_for_binary_search() {
        assert!(ENGLISH_STOP_WORDS.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("pump"));
    }

    #[test]
    fn analyzer_drops_single_chars_and_stop_words() {
        let terms = analyze("The pump IS a valve x", &unigram_config());
        assert_eq!(terms, vec!["pump".to_string(), "valve".to_string()]);
    }

    #[test]
    fn analyzer_adds_bigrams_after_stop_word_removal() {
        let config = VectorizerConfig {
            include_bigrams: true,
            ..unigram_config()
        };
        let terms = analyze("pressure of the hydraulic pump", &config);
        assert!(terms.contains(&"pressure hydraulic".to_string()));
        assert!(terms.contains(&"hydraulic pump".to_string()));
    }

    #[test]
    fn smoothed_idf_discounts_common_terms() {
        let corpus = ["pump valve", "pump motor", "pump seal"];
        let vectorizer = TfidfVectorizer::fit(&corpus, &unigram_config());
        let pump = vectorizer.term_id("pump").expect("pump in vocabulary") as usize;
        let valve = vectorizer.term_id("valve").expect("valve in vocabulary") as usize;

        assert!((vectorizer.idf[pump] - 1.0).abs() < 1e-6);
        assert!(vectorizer.idf[valve] > vectorizer.idf[pump]);
    }

    #[test]
    fn max_features_keeps_most_frequent_terms() {
        let corpus = ["alpha alpha beta", "alpha gamma gamma", "delta"];
        let config = VectorizerConfig {
            max_features: Some(2),
            ..unigram_config()
        };
        let vectorizer = TfidfVectorizer::fit(&corpus, &config);

        assert_eq!(vectorizer.vocabulary_size(), 2);
        assert_eq!(vectorizer.term_id("alpha"), Some(0));
        assert_eq!(vectorizer.term_id("gamma"), Some(1));
        assert_eq!(vectorizer.term_id("beta"), None);
    }

    #[test]
    fn transformed_vectors_are_unit_length() {
        let corpus = ["hydraulic pump pressure", "electric motor wiring"];
        let vectorizer = TfidfVectorizer::fit(&corpus, &VectorizerConfig::default());
        let vector = vectorizer.transform("pump pressure pump");
        assert!((vector.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unknown_terms_produce_zero_vector() {
        let corpus = ["hydraulic pump pressure"];
        let vectorizer = TfidfVectorizer::fit(&corpus, &VectorizerConfig::default());
        let vector = vectorizer.transform("quantum entanglement");
        assert!(vector.is_empty());
        assert_eq!(vector.cosine_distance(&vectorizer.transform("pump")), 1.0);
    }

    #[test]
    fn identical_texts_have_zero_distance() {
        let corpus = ["hydraulic pump pressure", "electric motor wiring"];
        let vectorizer = TfidfVectorizer::fit(&corpus, &VectorizerConfig::default());
        let left = vectorizer.transform("electric motor");
        let right = vectorizer.transform("electric motor");
        assert!(left.cosine_distance(&right).abs() < 1e-6);
    }

    #[test]
    fn missing_idf_weights_zero_the_term_instead_of_panicking() {
        let corpus = ["hydraulic pump pressure"];
        let mut vectorizer = TfidfVectorizer::fit(&corpus, &VectorizerConfig::default());
        assert!(vectorizer.is_consistent());

        vectorizer.idf.clear();

        assert!(!vectorizer.is_consistent());
        assert!(vectorizer.transform("pump pressure").is_empty());
    }
}
