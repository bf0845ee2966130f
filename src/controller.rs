use crate::{
    ask::{self, Answer},
    challenge::{self, ChallengeOutcome, ChallengeQuestion, NO_QUESTIONS_WARNING, ParseOptions},
    config::Config,
    error::{AssistantError, ErrorKind},
    extract,
    gateway::{Gateway, InferenceBackend},
    session::{Mode, Session},
    summarize::{self, Summary},
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A user action after the document is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ask { question: String },
    Challenge,
}

impl Request {
    pub fn mode(&self) -> Mode {
        match self {
            Request::Ask { .. } => Mode::AskAnything,
            Request::Challenge => Mode::ChallengeMe,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub remedy: &'static str,
}

impl From<&AssistantError> for ErrorReport {
    fn from(err: &AssistantError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            remedy: err.remedy(),
        }
    }
}

/// What the presentation layer shows for one step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Summary {
        summary: Summary,
    },
    /// Document loaded but summarization failed; ask-anything still works.
    SummaryUnavailable {
        error: ErrorReport,
    },
    Answer {
        answer: Answer,
        confidence: String,
    },
    Questions {
        questions: Vec<ChallengeQuestion>,
    },
    NoQuestions {
        warning: String,
    },
    Error {
        error: ErrorReport,
    },
    ModeSelected {
        mode: Mode,
    },
    /// Session chatter: help text, hints, unknown commands.
    Notice {
        message: String,
    },
    /// Nothing to do (blank question).
    Idle,
}

impl Reply {
    pub fn error(err: &AssistantError) -> Self {
        Reply::Error { error: err.into() }
    }

    /// The step the reply answers did not produce its result.
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Error { .. } | Reply::SummaryUnavailable { .. })
    }
}

/// Routes uploads and requests for one session at a time.
///
/// Every step failure is turned into a [`Reply`] here, so callers never see
/// an `Err` from a model or the extractor.
pub struct ModeController<B: InferenceBackend> {
    cfg: Config,
    gateway: Arc<Gateway<B>>,
}

impl<B: InferenceBackend> ModeController<B> {
    pub fn new(cfg: &Config, gateway: Arc<Gateway<B>>) -> Self {
        Self {
            cfg: cfg.clone(),
            gateway,
        }
    }

    pub fn gateway(&self) -> &Gateway<B> {
        &self.gateway
    }

    pub fn upload_path(&self, session: &mut Session, path: &Path) -> Reply {
        info!("upload {}", path.display());
        let loaded = extract::load_document(&self.cfg, path);
        self.accept_upload(session, loaded)
    }

    pub fn upload_bytes(&self, session: &mut Session, bytes: &[u8]) -> Reply {
        let loaded = extract::document_from_bytes(&self.cfg, bytes);
        self.accept_upload(session, loaded)
    }

    fn accept_upload(
        &self,
        session: &mut Session,
        loaded: crate::error::Result<extract::Document>,
    ) -> Reply {
        let document = match loaded {
            Ok(d) => d,
            Err(err) => {
                warn!("upload rejected: {err}");
                session.clear();
                return Reply::error(&err);
            }
        };

        session.load_document(document);
        self.summarize(session)
    }

    /// Recomputes the summary of the current document.
    pub fn summarize(&self, session: &mut Session) -> Reply {
        let Some(document) = session.document() else {
            return Reply::error(&AssistantError::NoDocument);
        };
        match summarize::summarize_document(&self.gateway, document) {
            Ok(summary) => {
                session.set_summary(summary.clone());
                Reply::Summary { summary }
            }
            Err(err) => {
                warn!("summary unavailable: {err}");
                Reply::SummaryUnavailable { error: (&err).into() }
            }
        }
    }

    pub fn dispatch(&self, session: &mut Session, request: Request) -> Reply {
        session.select_mode(request.mode());
        match request {
            Request::Ask { question } => self.ask(session, &question),
            Request::Challenge => self.challenge(session),
        }
    }

    fn ask(&self, session: &mut Session, question: &str) -> Reply {
        let Some(document) = session.document() else {
            return Reply::error(&AssistantError::NoDocument);
        };
        match ask::answer_question(&self.gateway, document, question) {
            Ok(None) => Reply::Idle,
            Ok(Some(answer)) => {
                let confidence = answer.confidence_display();
                session.set_answer(answer.clone());
                Reply::Answer { answer, confidence }
            }
            Err(err) => {
                warn!("ask failed: {err}");
                Reply::error(&err)
            }
        }
    }

    fn challenge(&self, session: &mut Session) -> Reply {
        if session.document().is_none() {
            return Reply::error(&AssistantError::NoDocument);
        }
        let Some(summary) = session.summary().cloned() else {
            return Reply::error(&AssistantError::NoSummary);
        };

        let opts = ParseOptions::from_config(&self.cfg);
        match challenge::generate_questions(&self.gateway, &summary, opts) {
            Ok(ChallengeOutcome::Questions(questions)) => {
                session.set_questions(questions.clone());
                Reply::Questions { questions }
            }
            Ok(ChallengeOutcome::NoQuestions) => {
                session.set_questions(Vec::new());
                Reply::NoQuestions {
                    warning: NO_QUESTIONS_WARNING.to_string(),
                }
            }
            Err(err) => {
                warn!("challenge failed: {err}");
                Reply::error(&err)
            }
        }
    }
}
