use serde::{Deserialize, Serialize};

/// One call to a pipeline. Serialized as a single JSON line to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum InferenceRequest {
    Summarize {
        text: String,
        min_length: u32,
        max_length: u32,
        do_sample: bool,
    },
    Answer {
        question: String,
        context: String,
    },
    Generate {
        prompt: String,
        max_length: u32,
        do_sample: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceResponse {
    Summary { summary_text: String },
    Answer { answer: String, score: f64 },
    Generated { generated_text: String },
}

/// Reply line for every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReply {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<InferenceResponse>,
    #[serde(default)]
    pub error: Option<String>,
}

/// First line a worker prints once its pipeline is loaded (or failed to load).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReady {
    pub ok: bool,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDiag {
    pub python_exe: String,
    pub python_version: String,
    pub transformers_version: Option<String>,
    pub torch_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}
