#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, Stream, dictionary};
use research_assistant::{
    extract::Document,
    gateway::{
        BackendDiag, Capability, Gateway, InferenceBackend, InferenceHandle, InferenceRequest,
        InferenceResponse,
    },
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned model outputs plus a log of every request seen.
pub struct Script {
    pub answer: Mutex<(String, f64)>,
    pub generated: Mutex<String>,
    pub requests: Mutex<Vec<InferenceRequest>>,
    /// Calls left to fail before the handles answer again.
    pub failing_calls: Mutex<usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            answer: Mutex::new(("42".into(), 0.8675)),
            generated: Mutex::new("What is X?\nWhy is Y?\n\n".into()),
            requests: Mutex::new(Vec::new()),
            failing_calls: Mutex::new(0),
        }
    }
}

/// Deterministic stand-in for the summarizer: depends only on its input.
pub fn summary_of(text: &str) -> String {
    let head: String = text.trim().chars().take(24).collect();
    format!("summary of [{head}]")
}

pub struct ScriptedBackend {
    pub script: Arc<Script>,
    pub loads: Arc<Mutex<Vec<Capability>>>,
    pub failing: Vec<Capability>,
    pub load_delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script::default()),
            loads: Arc::new(Mutex::new(Vec::new())),
            failing: Vec::new(),
            load_delay: Duration::ZERO,
        }
    }

    pub fn failing(mut self, capability: Capability) -> Self {
        self.failing.push(capability);
        self
    }

    pub fn failing_calls(self, n: usize) -> Self {
        *self.script.failing_calls.lock().unwrap() = n;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn load_count(&self, capability: Capability) -> usize {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == capability)
            .count()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.script.requests.lock().unwrap().clone()
    }
}

struct ScriptedHandle {
    capability: Capability,
    script: Arc<Script>,
}

impl InferenceHandle for ScriptedHandle {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn invoke(&self, req: &InferenceRequest) -> anyhow::Result<InferenceResponse> {
        self.script.requests.lock().unwrap().push(req.clone());
        {
            let mut left = self.script.failing_calls.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                anyhow::bail!("worker exited during {} call", self.capability);
            }
        }
        Ok(match req {
            InferenceRequest::Summarize { text, .. } => InferenceResponse::Summary {
                summary_text: summary_of(text),
            },
            InferenceRequest::Answer { .. } => {
                let (answer, score) = self.script.answer.lock().unwrap().clone();
                InferenceResponse::Answer { answer, score }
            }
            InferenceRequest::Generate { .. } => InferenceResponse::Generated {
                generated_text: self.script.generated.lock().unwrap().clone(),
            },
        })
    }
}

impl InferenceBackend for ScriptedBackend {
    fn load(&self, capability: Capability) -> anyhow::Result<Box<dyn InferenceHandle>> {
        std::thread::sleep(self.load_delay);
        self.loads.lock().unwrap().push(capability);
        if self.failing.contains(&capability) {
            anyhow::bail!("weights not found for {capability}");
        }
        Ok(Box::new(ScriptedHandle {
            capability,
            script: Arc::clone(&self.script),
        }))
    }

    fn doctor(&self) -> anyhow::Result<BackendDiag> {
        Ok(BackendDiag {
            python_exe: "scripted".into(),
            python_version: "0".into(),
            transformers_version: None,
            torch_version: None,
            ok: true,
            error: None,
        })
    }
}

pub fn gateway(backend: ScriptedBackend) -> Arc<Gateway<ScriptedBackend>> {
    Arc::new(Gateway::new(backend))
}

pub fn document(content: &str) -> Document {
    Document {
        content: content.to_string(),
        page_count: 1,
        fingerprint: "test".into(),
    }
}

/// A minimal PDF with one text line per page. Text is written as single-byte
/// WinAnsi, so keep it to Latin-1.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(latin1(text))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}

pub fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}
