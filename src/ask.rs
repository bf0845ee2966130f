use crate::{
    error::Result,
    extract::Document,
    gateway::{Gateway, InferenceBackend},
    util::take_chars,
};
use serde::Serialize;

/// Characters of the document given to the question answerer as context.
pub const QA_CONTEXT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Model score in [0, 1].
    pub confidence: f64,
}

impl Answer {
    pub fn confidence_display(&self) -> String {
        format_confidence(self.confidence)
    }
}

pub fn qa_context(document: &Document) -> &str {
    take_chars(&document.content, QA_CONTEXT_CHARS)
}

/// `Ok(None)` for a blank question: nothing is sent to the model.
pub fn answer_question<B: InferenceBackend>(
    gateway: &Gateway<B>,
    document: &Document,
    question: &str,
) -> Result<Option<Answer>> {
    let question = question.trim();
    if question.is_empty() {
        return Ok(None);
    }
    gateway.answer(question, qa_context(document)).map(Some)
}

/// Percentage with two decimals, e.g. `0.8675` -> `"86.75%"`.
pub fn format_confidence(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_confidence(0.8675), "86.75%");
        assert_eq!(format_confidence(1.0), "100.00%");
        assert_eq!(format_confidence(0.0), "0.00%");
        assert_eq!(format_confidence(0.123456), "12.35%");
    }
}
