//! Prompt templates for condensing follow-up questions and answering them.

use crate::document::SearchResult;
use crate::memory::Turn;

/// Answer used when retrieval found nothing and the model returned no text.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the book to answer this question.";

/// Prompt builder for conversational RAG queries.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt asking the model to rewrite a follow-up into a standalone question.
    pub fn condense(history: &[Turn], question: &str) -> String {
        let chat_history = history
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Given the following conversation and a follow up question, rephrase the follow up \
             question to be a standalone question, in its original language. Replace pronouns \
             and references with the things they refer to. Reply with the question only.\n\n\
             Chat History:\n{chat_history}\n\
             Follow Up Input: {question}\n\
             Standalone question:"
        )
    }

    /// Prompt asking the model to answer from the retrieved passages only.
    pub fn answer(question: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return format!(
                "No passages from the book matched this question. Do not answer from general \
                 knowledge. Tell the user that the book does not provide enough information \
                 to answer it.\n\n\
                 Question: {question}\n\
                 Helpful Answer:"
            );
        }

        format!(
            "Use the following passages from the book to answer the question at the end. \
             If the passages do not contain the answer, say that you don't know; don't try \
             to make up an answer.\n\n\
             {context}\n\
             Question: {question}\n\
             Helpful Answer:",
            context = Self::build_context(results)
        )
    }

    /// Render retrieved passages with their page references.
    pub fn build_context(results: &[SearchResult]) -> String {
        let mut context = String::new();
        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] (page {})\n{}\n\n",
                i + 1,
                result.chunk.metadata.page_number,
                result.chunk.text
            ));
        }
        context
    }
}
