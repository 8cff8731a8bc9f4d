//! Local answers built from literal keyword matches, no remote calls.

use crate::chunking::normalize_whitespace;
use crate::models::{Answer, AnswerMode, Document};
use regex::Regex;

pub const QUESTION_STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to", "for",
    "of", "as", "by",
];

const MIN_SCORED_SENTENCE_CHARS: usize = 10;
const MIN_CONTEXT_SENTENCE_CHARS: usize = 20;
const SENTENCES_PER_DOCUMENT: usize = 2;
const DOCUMENTS_PER_ANSWER: usize = 2;
const CONTEXT_SENTENCES_PER_DOCUMENT: usize = 3;

struct Keyword {
    word: String,
    whole_word: Option<Regex>,
}

impl Keyword {
    fn new(word: String) -> Self {
        let whole_word = Regex::new(&format!(r"\b{}\b", regex::escape(&word))).ok();
        Self { word, whole_word }
    }

    fn score(&self, sentence_lower: &str) -> u32 {
        if !sentence_lower.contains(&self.word) {
            return 0;
        }
        match &self.whole_word {
            Some(pattern) if pattern.is_match(sentence_lower) => 2,
            _ => 1,
        }
    }
}

/// Lowercased question words longer than two chars, minus stop words.
pub fn question_keywords(question: &str) -> Vec<String> {
    question
        .to_lowercase()
        .split_whitespace()
        // `budget?` must match `budget` as a whole word.
        .map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .filter(|word| word.chars().count() > 2 && !QUESTION_STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

fn sentences(text: &str, min_chars: usize) -> Vec<String> {
    text.split(['.', '!', '?'])
        // Extracted PDF text wraps sentences across lines; answers quote them on one line.
        .map(normalize_whitespace)
        .filter(|sentence| sentence.chars().count() > min_chars)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSentence {
    pub sentence: String,
    pub score: u32,
}

/// Best matching sentences of one document, highest score first, ties in text order.
pub fn score_sentences(text: &str, keywords: &[String]) -> Vec<ScoredSentence> {
    let keywords: Vec<Keyword> = keywords.iter().cloned().map(Keyword::new).collect();

    let mut scored: Vec<ScoredSentence> = sentences(text, MIN_SCORED_SENTENCE_CHARS)
        .into_iter()
        .map(|sentence| {
            let lowered = sentence.to_lowercase();
            let score = keywords.iter().map(|keyword| keyword.score(&lowered)).sum();
            ScoredSentence { sentence, score }
        })
        .filter(|item| item.score > 0)
        .collect();

    scored.sort_by(|left, right| right.score.cmp(&left.score));
    scored
}

pub fn keyword_answer(documents: &[Document], question: &str) -> Answer {
    let question = question.trim();
    let keywords = question_keywords(question);

    if keywords.is_empty() {
        return Answer {
            mode: AnswerMode::Keyword,
            text: "Please ask a more specific question with meaningful keywords.".to_string(),
            sources: Vec::new(),
        };
    }

    let found: Vec<(&str, Vec<ScoredSentence>)> = documents
        .iter()
        .filter_map(|document| {
            let mut top = score_sentences(&document.text, &keywords);
            top.truncate(SENTENCES_PER_DOCUMENT);
            if top.is_empty() {
                None
            } else {
                Some((document.name.as_str(), top))
            }
        })
        .take(DOCUMENTS_PER_ANSWER)
        .collect();

    if found.is_empty() {
        return Answer {
            mode: AnswerMode::Keyword,
            text: format!(
                "I couldn't find information about \"{question}\" in your documents. \
                 Try using different keywords or check if this information exists in your documents."
            ),
            sources: Vec::new(),
        };
    }

    let mut text = format!("Here's what I found about \"{question}\":\n\n");
    for (name, top) in &found {
        text.push_str(&format!("📄 **{name}:**\n"));
        for item in top {
            text.push_str(&item.sentence);
            text.push_str("\n\n");
        }
    }

    Answer {
        mode: AnswerMode::Keyword,
        text,
        sources: found.iter().map(|(name, _)| name.to_string()).collect(),
    }
}

/// Up to three keyword-bearing sentences per document, grouped under the document name.
pub fn relevant_context(documents: &[Document], question: &str) -> Option<String> {
    let keywords = question_keywords(question);
    let mut context = String::new();

    for document in documents {
        let matching: Vec<String> = sentences(&document.text, MIN_CONTEXT_SENTENCE_CHARS)
            .into_iter()
            .filter(|sentence| {
                let lowered = sentence.to_lowercase();
                keywords.iter().any(|word| lowered.contains(word.as_str()))
            })
            .take(CONTEXT_SENTENCES_PER_DOCUMENT)
            .collect();

        if !matching.is_empty() {
            context.push_str(&format!("\n--- From {} ---\n", document.name));
            context.push_str(&matching.join(". "));
            context.push('\n');
        }
    }

    if context.is_empty() {
        None
    } else {
        Some(context)
    }
}

/// Templated answer around the keyword context, standing in for a remote model.
pub fn simulated_answer(documents: &[Document], question: &str) -> Answer {
    let question = question.trim();
    let context = relevant_context(documents, question);

    let sources = match &context {
        Some(context) => documents
            .iter()
            .filter(|document| context.contains(&format!("--- From {} ---", document.name)))
            .map(|document| document.name.clone())
            .collect(),
        None => Vec::new(),
    };

    let text = match context {
        Some(context) => format!(
            "Based on my analysis of your documents, here's what I found regarding \"{question}\":\n\n\
             {context}\n\n\
             💡 **AI Insight**: This information appears across multiple sections of your documents. \
             The content suggests a comprehensive coverage of the topic you're asking about. \
             Would you like me to elaborate on any specific aspect or find related information?"
        ),
        None => format!(
            "I've analyzed your documents but couldn't find specific information about \"{question}\". \
             The documents might not contain relevant details on this topic, or the information might be \
             expressed using different terminology. Try rephrasing your question or asking about topics \
             that are more directly covered in your uploaded documents."
        ),
    };

    Answer {
        mode: AnswerMode::Simulated,
        text,
        sources,
    }
}
