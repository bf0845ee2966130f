use crate::{
    error::{AssistantError, Result},
    extract::Document,
    gateway::{Gateway, InferenceBackend},
    util::take_chars,
};
use serde::Serialize;
use tracing::info;

/// Characters of the document fed to the summarizer. Independent of
/// [`crate::ask::QA_CONTEXT_CHARS`].
pub const SUMMARY_INPUT_CHARS: usize = 1024;
pub const SUMMARY_MIN_LENGTH: u32 = 30;
pub const SUMMARY_MAX_LENGTH: u32 = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub text: String,
}

/// Text the summarizer actually sees.
pub fn summary_input(document: &Document) -> &str {
    take_chars(&document.content, SUMMARY_INPUT_CHARS)
}

pub fn summarize_document<B: InferenceBackend>(
    gateway: &Gateway<B>,
    document: &Document,
) -> Result<Summary> {
    let input = summary_input(document);
    if input.trim().is_empty() {
        return Err(AssistantError::EmptyDocument);
    }
    let summary = gateway.summarize(input, SUMMARY_MIN_LENGTH, SUMMARY_MAX_LENGTH)?;
    info!(
        "summary words={} from input_chars={}",
        summary.text.split_whitespace().count(),
        input.chars().count()
    );
    Ok(summary)
}
