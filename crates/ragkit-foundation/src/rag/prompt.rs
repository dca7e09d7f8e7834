//! Prompt assembly for grounded generation
//!
//! The rendered prompt always follows the same order: instruction header,
//! context block with the ranked hits, the question, then the answer cue.

use ragkit_kernel::rag::SearchHit;
use serde::{Deserialize, Serialize};

const DEFAULT_HEADER: &str = "You are a helpful assistant. Use the provided CONTEXT to answer the \
QUESTION. If the answer is not in the context, say you don't know.";

/// Template used to turn retrieved chunks and a question into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    /// Instructions placed before the context
    pub header: String,
    pub context_label: String,
    pub question_label: String,
    /// Marker after which the model writes its answer
    pub answer_cue: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            context_label: "CONTEXT:".to_string(),
            question_label: "QUESTION:".to_string(),
            answer_cue: "ANSWER:".to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Render the prompt for `query` grounded on `hits`, in ranked order.
    ///
    /// Each hit is written as `[rank] (score=0.1234) text` with 1-based ranks.
    pub fn render(&self, query: &str, hits: &[SearchHit]) -> String {
        let context: String = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[{}] (score={:.4}) {}\n\n", i + 1, hit.score, hit.text()))
            .collect();
        format!(
            "{}\n\n{}\n{}{} {}\n{}\n",
            self.header, self.context_label, context, self.question_label, query, self.answer_cue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_kernel::rag::{Chunk, Metadata};

    fn hit(text: &str, score: f64) -> SearchHit {
        let chunk = Chunk {
            id: text.to_string(),
            ordinal: 0,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            source: "s".to_string(),
            metadata: Metadata::new(),
        };
        SearchHit::new(chunk.embed(vec![1.0]), score)
    }

    #[test]
    fn test_render_layout() {
        let prompt = PromptTemplate::default().render(
            "What is Rust?",
            &[hit("Rust is a language.", 0.91234), hit("It is fast.", 0.5)],
        );

        let expected = format!(
            "{DEFAULT_HEADER}\n\nCONTEXT:\n\
             [1] (score=0.9123) Rust is a language.\n\n\
             [2] (score=0.5000) It is fast.\n\n\
             QUESTION: What is Rust?\nANSWER:\n"
        );
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_render_sections_in_order() {
        let prompt = PromptTemplate::default().render("q?", &[hit("ctx", 0.3)]);
        let header = prompt.find("You are a helpful assistant").unwrap();
        let context = prompt.find("CONTEXT:").unwrap();
        let question = prompt.find("QUESTION: q?").unwrap();
        let answer = prompt.find("ANSWER:").unwrap();
        assert!(header < context && context < question && question < answer);
    }

    #[test]
    fn test_render_without_hits() {
        let prompt = PromptTemplate::default().render("q?", &[]);
        assert!(prompt.contains("CONTEXT:\nQUESTION: q?"));
    }

    #[test]
    fn test_custom_header() {
        let prompt = PromptTemplate::default()
            .with_header("Answer tersely.")
            .render("q?", &[]);
        assert!(prompt.starts_with("Answer tersely.\n\nCONTEXT:"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let hits = vec![hit("a", 0.2), hit("b", 0.1)];
        let template = PromptTemplate::default();
        assert_eq!(template.render("q", &hits), template.render("q", &hits));
    }
}
