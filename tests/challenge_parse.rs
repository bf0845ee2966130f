mod common;

use research_assistant::{
    challenge::{
        CHALLENGE_MAX_LENGTH, ChallengeOutcome, ChallengeQuestion, ParseOptions, build_prompt,
        generate_questions, parse_questions,
    },
    gateway::InferenceRequest,
    summarize::Summary,
};

fn texts(qs: &[ChallengeQuestion]) -> Vec<&str> {
    qs.iter().map(|q| q.text.as_str()).collect()
}

#[test]
fn trailing_blank_segments_are_dropped() {
    let qs = parse_questions("What is X?\nWhy is Y?\n\n", ParseOptions::default());
    assert_eq!(texts(&qs), vec!["What is X?", "Why is Y?"]);
    assert_eq!(qs[0].index, 1);
    assert_eq!(qs[1].index, 2);
}

#[test]
fn spaces_and_periods_are_stripped() {
    let qs = parse_questions("  What is X? .\n. Why is Y?\n...\n", ParseOptions::default());
    assert_eq!(texts(&qs), vec!["What is X?", "Why is Y?"]);
}

#[test]
fn empty_and_whitespace_output_yield_nothing() {
    assert!(parse_questions("", ParseOptions::default()).is_empty());
    assert!(parse_questions(" \n\t\n  \r\n", ParseOptions::default()).is_empty());
}

#[test]
fn single_line_output_is_one_question() {
    let qs = parse_questions("What causes tides? Why do they vary?", ParseOptions::default());
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].index, 1);
}

#[test]
fn duplicates_are_kept() {
    let qs = parse_questions("Same?\nSame?\n", ParseOptions::default());
    assert_eq!(texts(&qs), vec!["Same?", "Same?"]);
}

#[test]
fn enumeration_is_kept_unless_configured() {
    let raw = "1. What is X?\n2) Why is Y?\nQ3: How is Z?";
    let kept = parse_questions(raw, ParseOptions::default());
    assert_eq!(kept[0].text, "1. What is X?");

    let stripped = parse_questions(raw, ParseOptions { strip_enumeration: true });
    assert_eq!(texts(&stripped), vec!["What is X?", "Why is Y?", "How is Z?"]);
}

#[test]
fn prompt_embeds_summary_verbatim() {
    let summary = Summary {
        text: "The tides are driven by the moon.".into(),
    };
    assert_eq!(
        build_prompt(&summary),
        "Generate 3 high-quality comprehension questions based on this summary:\n\nThe tides are driven by the moon."
    );
}

#[test]
fn generation_is_deterministic_and_bounded() {
    let backend = common::ScriptedBackend::new();
    let script = backend.script.clone();
    let gw = common::gateway(backend);
    let summary = Summary { text: "s".into() };

    let outcome = generate_questions(&gw, &summary, ParseOptions::default()).unwrap();
    assert!(matches!(outcome, ChallengeOutcome::Questions(ref qs) if qs.len() == 2));

    let reqs = script.requests.lock().unwrap().clone();
    assert_eq!(
        reqs,
        vec![InferenceRequest::Generate {
            prompt: build_prompt(&summary),
            max_length: CHALLENGE_MAX_LENGTH,
            do_sample: false,
        }]
    );
}

#[test]
fn blank_generation_is_no_questions() {
    let backend = common::ScriptedBackend::new();
    *backend.script.generated.lock().unwrap() = "  \n".into();
    let gw = common::gateway(backend);

    let outcome =
        generate_questions(&gw, &Summary { text: "s".into() }, ParseOptions::default()).unwrap();
    assert_eq!(outcome, ChallengeOutcome::NoQuestions);
}
