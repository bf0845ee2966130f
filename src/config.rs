use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: Models,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub challenge: Challenge,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

/// Hugging Face model ids, one per capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Models {
    pub summarizer: String,
    pub question_answerer: String,
    pub question_generator: String,
}
impl Default for Models {
    fn default() -> Self {
        Self {
            summarizer: "facebook/bart-large-cnn".into(),
            question_answerer: "distilbert-base-uncased-distilled-squad".into(),
            question_generator: "google/flan-t5-base".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    pub python_exe: String,
    pub scripts_dir: String,
    pub worker_script: String,
    pub startup_timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub offline_only: bool,
    pub device: String,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Backend {
    fn default() -> Self {
        Self {
            python_exe: "auto".into(),
            scripts_dir: "scripts".into(),
            worker_script: "inference_worker.py".into(),
            startup_timeout_seconds: 600,
            doctor_timeout_seconds: 60,
            offline_only: false,
            device: "auto".into(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// 0 disables the limit.
    pub max_input_file_bytes: u64,
    pub normalize_unicode: bool,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 0,
            normalize_unicode: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Challenge {
    pub strip_enumeration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "research-assistant.log".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Debug {
    pub keep_worker_stderr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
