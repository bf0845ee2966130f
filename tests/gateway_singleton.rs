mod common;

use research_assistant::{
    error::{AssistantError, ErrorKind},
    gateway::{Capability, Gateway, InferenceHandle},
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_first_use_constructs_once() {
    let backend = common::ScriptedBackend::new().with_load_delay(Duration::from_millis(50));
    let loads = backend.loads.clone();
    let gw = Arc::new(Gateway::new(backend));

    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));
    let workers: Vec<_> = (0..callers)
        .map(|_| {
            let gw = Arc::clone(&gw);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                gw.answer("Who?", "Ada wrote it.").unwrap()
            })
        })
        .collect();

    let answers: Vec<_> = workers.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        loads
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == Capability::QuestionAnswerer)
            .count(),
        1
    );
    assert!(answers.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn handles_are_reused_across_calls() {
    let gw = common::gateway(common::ScriptedBackend::new());
    let a = gw.handle(Capability::Summarizer).unwrap();
    let b = gw.handle(Capability::Summarizer).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.capability(), Capability::Summarizer);
    assert_eq!(gw.backend().load_count(Capability::Summarizer), 1);
}

#[test]
fn capabilities_are_built_lazily_and_independently() {
    let gw = common::gateway(common::ScriptedBackend::new());
    for c in Capability::ALL {
        assert!(!gw.constructed(c));
    }

    gw.generate("prompt", 256).unwrap();
    assert!(gw.constructed(Capability::QuestionGenerator));
    assert!(!gw.constructed(Capability::Summarizer));
    assert!(!gw.constructed(Capability::QuestionAnswerer));
}

#[test]
fn construction_failure_is_sticky_and_not_retried() {
    let gw = common::gateway(common::ScriptedBackend::new().failing(Capability::Summarizer));

    for _ in 0..3 {
        let err = gw.summarize("text", 30, 150).unwrap_err();
        match err {
            AssistantError::ModelUnavailable { capability, reason } => {
                assert_eq!(capability, Capability::Summarizer);
                assert!(reason.contains("weights not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(gw.backend().load_count(Capability::Summarizer), 1);
    assert!(!gw.constructed(Capability::Summarizer));

    // The other capabilities are unaffected.
    assert!(gw.answer("q", "c").is_ok());
}

#[test]
fn failed_call_keeps_the_handle() {
    let gw = common::gateway(common::ScriptedBackend::new().failing_calls(1));

    let err = gw.answer("q", "c").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inference);
    assert!(err.to_string().contains("worker exited"));
    assert!(gw.constructed(Capability::QuestionAnswerer));

    let answer = gw.answer("q", "c").unwrap();
    assert_eq!(answer.text, "42");
    assert_eq!(gw.backend().load_count(Capability::QuestionAnswerer), 1);
}

#[test]
fn scores_are_clamped_into_unit_range() {
    let backend = common::ScriptedBackend::new();
    *backend.script.answer.lock().unwrap() = ("x".into(), 1.7);
    let gw = common::gateway(backend);
    assert_eq!(gw.answer("q", "c").unwrap().confidence, 1.0);
}
