use crate::{ask::Answer, challenge::ChallengeQuestion, extract::Document, summarize::Summary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    AskAnything,
    ChallengeMe,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" | "ask-anything" => Ok(Mode::AskAnything),
            "challenge" | "challenge-me" => Ok(Mode::ChallengeMe),
            other => Err(format!("unknown mode: {other} (expected ask-anything or challenge-me)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::AskAnything => "ask-anything",
            Mode::ChallengeMe => "challenge-me",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoDocument,
    DocumentLoaded,
    Summarized,
}

/// Everything one user has on screen. Each session owns its own; only the
/// gateway is shared.
#[derive(Debug, Default)]
pub struct Session {
    document: Option<Document>,
    summary: Option<Summary>,
    answer: Option<Answer>,
    questions: Vec<ChallengeQuestion>,
    mode: Mode,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match (&self.document, &self.summary) {
            (None, _) => SessionState::NoDocument,
            (Some(_), None) => SessionState::DocumentLoaded,
            (Some(_), Some(_)) => SessionState::Summarized,
        }
    }

    /// Replaces the document and drops everything derived from the old one.
    pub fn load_document(&mut self, document: Document) {
        self.clear();
        self.document = Some(document);
    }

    pub fn clear(&mut self) {
        self.document = None;
        self.summary = None;
        self.answer = None;
        self.questions.clear();
    }

    pub fn set_summary(&mut self, summary: Summary) {
        self.summary = Some(summary);
    }

    pub fn set_answer(&mut self, answer: Answer) {
        self.answer = Some(answer);
    }

    pub fn set_questions(&mut self, questions: Vec<ChallengeQuestion>) {
        self.questions = questions;
    }

    pub fn select_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.answer.as_ref()
    }

    pub fn questions(&self) -> &[ChallengeQuestion] {
        &self.questions
    }
}
