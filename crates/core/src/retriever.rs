use crate::error::SearchError;
use crate::index::ChunkIndex;
use crate::models::{QueryResult, RetrievedChunk};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalLimits {
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl From<&crate::models::RetrievalOptions> for RetrievalLimits {
    fn from(value: &crate::models::RetrievalOptions) -> Self {
        Self {
            top_k: value.top_k,
            max_context_chars: value.max_context_chars,
        }
    }
}

pub fn retrieve(
    index: &ChunkIndex,
    query: &str,
    limits: RetrievalLimits,
) -> Result<QueryResult, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let mut ranked: Vec<RetrievedChunk> = index
        .nearest(query, limits.top_k)
        .into_iter()
        .filter_map(|neighbor| {
            let score = 1.0 - f64::from(neighbor.distance);
            if score <= 0.0 {
                return None;
            }
            index.chunk(neighbor.position).map(|chunk| RetrievedChunk {
                chunk: chunk.clone(),
                score,
            })
        })
        .collect();

    ranked.sort_by(|left, right| right.score.total_cmp(&left.score));

    let (hits, context) = assemble_context(ranked, limits.max_context_chars);
    debug!(
        hits = hits.len(),
        context_chars = context.chars().count(),
        "retrieved context"
    );

    Ok(QueryResult {
        query: query.to_string(),
        hits,
        context,
    })
}

/// Appends one section per hit until `budget` chars are used. The section that
/// crosses the budget is cut to fit and ends accumulation; a hit is kept only
/// if at least one char of its chunk text made it in.
fn assemble_context(ranked: Vec<RetrievedChunk>, budget: usize) -> (Vec<RetrievedChunk>, String) {
    let mut context = String::new();
    let mut used = 0usize;
    let mut hits = Vec::new();

    for hit in ranked {
        let header = format!("\n--- From {} ---\n", hit.chunk.document_name);
        let header_chars = header.chars().count();
        let section_chars = header_chars + hit.chunk.text.chars().count();
        let remaining = budget.saturating_sub(used);

        if remaining <= header_chars {
            break;
        }

        if section_chars <= remaining {
            context.push_str(&header);
            context.push_str(&hit.chunk.text);
            used += section_chars;
            hits.push(hit);
            continue;
        }

        context.push_str(&header);
        context.extend(hit.chunk.text.chars().take(remaining - header_chars));
        hits.push(hit);
        break;
    }

    (hits, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, VectorizerConfig};

    fn chunk(name: &str, index: u64, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("{name}-{index}"),
            document_name: name.to_string(),
            chunk_index: index,
            start_char: 0,
            end_char: text.chars().count(),
            text: text.to_string(),
        }
    }

    fn index() -> ChunkIndex {
        ChunkIndex::build(
            vec![
                chunk("pumps.txt", 0, "The hydraulic pump raises pressure in the loop."),
                chunk("pumps.txt", 1, "Pump seals wear out when pressure spikes."),
                chunk("motors.txt", 0, "Electric motors need clean wiring and grounding."),
            ],
            &VectorizerConfig::default(),
        )
        .expect("index")
    }

    fn limits(top_k: usize, max_context_chars: usize) -> RetrievalLimits {
        RetrievalLimits {
            top_k,
            max_context_chars,
        }
    }

    #[test]
    fn empty_query_is_rejected() {
        let result = retrieve(&index(), "   ", limits(3, 1_000));
        assert!(matches!(result, Err(SearchError::EmptyQuery)));
    }

    #[test]
    fn hits_are_sorted_by_descending_similarity() {
        let result = retrieve(&index(), "pump pressure", limits(3, 10_000)).expect("retrieve");

        assert_eq!(result.hits.len(), 2);
        assert!(result.hits[0].score >= result.hits[1].score);
        assert!(result.hits.iter().all(|hit| hit.score > 0.0 && hit.score <= 1.0 + 1e-6));
        assert!(result.context.contains("--- From pumps.txt ---"));
        assert!(!result.context.contains("motors.txt"));
    }

    #[test]
    fn query_without_vocabulary_overlap_returns_empty_context() {
        let result = retrieve(&index(), "quantum chromodynamics", limits(3, 1_000)).expect("retrieve");
        assert!(result.is_empty());
        assert!(result.context.is_empty());
    }

    #[test]
    fn context_respects_character_budget() {
        let result = retrieve(&index(), "pump pressure", limits(3, 40)).expect("retrieve");

        assert_eq!(result.context.chars().count(), 40);
        assert_eq!(result.hits.len(), 1);
        assert!(result.context.starts_with("\n--- From pumps.txt ---\n"));
    }

    #[test]
    fn top_k_limits_the_number_of_hits() {
        let result = retrieve(&index(), "pump pressure wiring", limits(1, 10_000)).expect("retrieve");
        assert_eq!(result.hits.len(), 1);
    }

    #[test]
    fn budget_smaller_than_a_header_keeps_no_hit() {
        let header = "\n--- From pumps.txt ---\n";

        let tiny = retrieve(&index(), "pump", limits(3, 5)).expect("retrieve");
        assert!(tiny.hits.is_empty());
        assert!(tiny.context.is_empty());

        let header_only = retrieve(&index(), "pump", limits(3, header.chars().count())).expect("retrieve");
        assert!(header_only.hits.is_empty());
        assert!(header_only.context.is_empty());

        let one_char = retrieve(&index(), "pump", limits(3, header.chars().count() + 1)).expect("retrieve");
        assert_eq!(one_char.hits.len(), 1);
        assert_eq!(one_char.context.chars().count(), header.chars().count() + 1);
        assert!(one_char.context.starts_with(header));
    }
}
