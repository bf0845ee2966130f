use crate::{
    config::Config,
    error::Result,
    gateway::{Gateway, InferenceBackend},
    summarize::Summary,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Requested in the prompt only; the model may return any number.
pub const QUESTION_COUNT: usize = 3;
pub const CHALLENGE_MAX_LENGTH: u32 = 256;

pub const NO_QUESTIONS_WARNING: &str =
    "Could not generate questions. Try uploading a different PDF or retry.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeQuestion {
    /// 1-based.
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Questions(Vec<ChallengeQuestion>),
    /// The call succeeded but nothing usable came back.
    NoQuestions,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub strip_enumeration: bool,
}

impl ParseOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            strip_enumeration: cfg.challenge.strip_enumeration,
        }
    }
}

pub fn build_prompt(summary: &Summary) -> String {
    format!(
        "Generate {QUESTION_COUNT} high-quality comprehension questions based on this summary:\n\n{}",
        summary.text
    )
}

pub fn generate_questions<B: InferenceBackend>(
    gateway: &Gateway<B>,
    summary: &Summary,
    opts: ParseOptions,
) -> Result<ChallengeOutcome> {
    let prompt = build_prompt(summary);
    let output = gateway.generate(&prompt, CHALLENGE_MAX_LENGTH)?;
    let questions = parse_questions(&output, opts);

    if questions.is_empty() {
        warn!("generator returned no usable questions (output_chars={})", output.len());
        return Ok(ChallengeOutcome::NoQuestions);
    }
    if questions.len() != QUESTION_COUNT {
        info!("generator returned {} questions", questions.len());
    }
    Ok(ChallengeOutcome::Questions(questions))
}

/// One question per line; blank lines are dropped and survivors numbered from 1.
pub fn parse_questions(output: &str, opts: ParseOptions) -> Vec<ChallengeQuestion> {
    output
        .split('\n')
        .map(|seg| {
            let seg = if opts.strip_enumeration {
                strip_list_marker(seg.trim())
            } else {
                seg
            };
            seg.trim().trim_matches(|c: char| c == ' ' || c == '.')
        })
        .filter(|seg| !seg.is_empty())
        .enumerate()
        .map(|(i, text)| ChallengeQuestion {
            index: i + 1,
            text: text.to_string(),
        })
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    let marker = MARKER.get_or_init(|| Regex::new(r"^(?:(?i:q)?\d+\s*[.):\-]|[-*•])\s*").ok());
    match marker.as_ref().and_then(|re| re.find(line)) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}
