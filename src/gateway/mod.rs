pub mod python;
pub mod types;

use crate::{
    ask::Answer,
    error::{AssistantError, Result},
    summarize::Summary,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub use types::{BackendDiag, InferenceRequest, InferenceResponse, WorkerReady, WorkerReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Summarizer,
    QuestionAnswerer,
    QuestionGenerator,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Summarizer,
        Capability::QuestionAnswerer,
        Capability::QuestionGenerator,
    ];

    /// transformers pipeline task backing this capability.
    pub fn pipeline_task(self) -> &'static str {
        match self {
            Capability::Summarizer => "summarization",
            Capability::QuestionAnswerer => "question-answering",
            Capability::QuestionGenerator => "text2text-generation",
        }
    }

    fn slot(self) -> usize {
        match self {
            Capability::Summarizer => 0,
            Capability::QuestionAnswerer => 1,
            Capability::QuestionGenerator => 2,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Summarizer => "summarizer",
            Capability::QuestionAnswerer => "question-answerer",
            Capability::QuestionGenerator => "question-generator",
        })
    }
}

/// A loaded pipeline. Shared between sessions, so calls must be thread-safe.
pub trait InferenceHandle: Send + Sync {
    fn capability(&self) -> Capability;
    fn invoke(&self, req: &InferenceRequest) -> anyhow::Result<InferenceResponse>;
}

/// Builds handles. `load` is expensive (weights) and is called at most once per
/// capability by [`Gateway`].
pub trait InferenceBackend: Send + Sync {
    fn load(&self, capability: Capability) -> anyhow::Result<Box<dyn InferenceHandle>>;
    fn doctor(&self) -> anyhow::Result<BackendDiag>;
}

enum Slot {
    Empty,
    Ready(Arc<dyn InferenceHandle>),
    Failed(String),
}

/// Process-wide registry of the three handles, filled lazily.
///
/// Each capability has its own guard: the first caller constructs while
/// holding it, later callers observe the stored handle or the stored failure.
/// A failed construction is never retried.
pub struct Gateway<B: InferenceBackend> {
    backend: B,
    slots: [Mutex<Slot>; 3],
}

impl<B: InferenceBackend> Gateway<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slots: [
                Mutex::new(Slot::Empty),
                Mutex::new(Slot::Empty),
                Mutex::new(Slot::Empty),
            ],
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn handle(&self, capability: Capability) -> Result<Arc<dyn InferenceHandle>> {
        let mut slot = self.slots[capability.slot()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match &*slot {
            Slot::Ready(h) => return Ok(Arc::clone(h)),
            Slot::Failed(reason) => {
                return Err(AssistantError::ModelUnavailable {
                    capability,
                    reason: reason.clone(),
                });
            }
            Slot::Empty => {}
        }

        info!("constructing {capability} handle");
        match self.backend.load(capability) {
            Ok(h) => {
                let h: Arc<dyn InferenceHandle> = Arc::from(h);
                *slot = Slot::Ready(Arc::clone(&h));
                info!("{capability} ready");
                Ok(h)
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!("{capability} unavailable: {reason}");
                *slot = Slot::Failed(reason.clone());
                Err(AssistantError::ModelUnavailable { capability, reason })
            }
        }
    }

    /// True once a handle for `capability` has been built successfully.
    pub fn constructed(&self, capability: Capability) -> bool {
        let slot = self.slots[capability.slot()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        matches!(&*slot, Slot::Ready(_))
    }

    pub fn summarize(&self, text: &str, min_length: u32, max_length: u32) -> Result<Summary> {
        let capability = Capability::Summarizer;
        debug!("summarize chars={} min={min_length} max={max_length}", text.chars().count());
        let req = InferenceRequest::Summarize {
            text: text.to_string(),
            min_length,
            max_length,
            do_sample: false,
        };
        match self.call(capability, &req)? {
            InferenceResponse::Summary { summary_text } => Ok(Summary { text: summary_text }),
            other => Err(unexpected(capability, &other)),
        }
    }

    pub fn answer(&self, question: &str, context: &str) -> Result<Answer> {
        let capability = Capability::QuestionAnswerer;
        debug!(
            "answer question_chars={} context_chars={}",
            question.chars().count(),
            context.chars().count()
        );
        let req = InferenceRequest::Answer {
            question: question.to_string(),
            context: context.to_string(),
        };
        match self.call(capability, &req)? {
            InferenceResponse::Answer { answer, score } => Ok(Answer {
                text: answer,
                confidence: clamp_score(score),
            }),
            other => Err(unexpected(capability, &other)),
        }
    }

    pub fn generate(&self, prompt: &str, max_length: u32) -> Result<String> {
        let capability = Capability::QuestionGenerator;
        debug!("generate prompt_chars={} max={max_length}", prompt.chars().count());
        let req = InferenceRequest::Generate {
            prompt: prompt.to_string(),
            max_length,
            do_sample: false,
        };
        match self.call(capability, &req)? {
            InferenceResponse::Generated { generated_text } => Ok(generated_text),
            other => Err(unexpected(capability, &other)),
        }
    }

    fn call(&self, capability: Capability, req: &InferenceRequest) -> Result<InferenceResponse> {
        let handle = self.handle(capability)?;
        handle.invoke(req).map_err(|err| AssistantError::Inference {
            capability,
            reason: format!("{err:#}"),
        })
    }
}

fn unexpected(capability: Capability, got: &InferenceResponse) -> AssistantError {
    AssistantError::Inference {
        capability,
        reason: format!("unexpected response: {got:?}"),
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
