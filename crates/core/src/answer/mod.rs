pub mod keyword;
pub mod llm;

pub use keyword::{keyword_answer, relevant_context, simulated_answer, QUESTION_STOP_WORDS};
pub use llm::{build_prompt, llm_answer, ChatModelConfig, OpenAiChatClient};

use crate::models::{Answer, AnswerMode, QueryResult};

/// Answer that is just the retrieved context.
pub fn retrieval_answer(result: &QueryResult) -> Answer {
    let text = if result.is_empty() {
        format!(
            "No passages in your documents matched \"{}\".",
            result.query.trim()
        )
    } else {
        result.context.trim_start().to_string()
    };

    Answer {
        mode: AnswerMode::Retrieval,
        text,
        sources: result.sources(),
    }
}
