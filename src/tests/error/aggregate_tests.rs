use crate::backend::BackendError;
use crate::error::{AggregateError, RunFailure, Stage};
use crate::WriterError;

fn failure(stage: Stage, element: &str) -> RunFailure {
    RunFailure::new(stage, element, WriterError::Source("device offline".into()))
}

#[test]
fn display_lists_every_failure() {
    let err = AggregateError {
        pool: "STEP".into(),
        errors: vec![failure(Stage::Fetch, "/entry/energy"), failure(Stage::Write, "/entry/image")],
    };
    let text = err.to_string();
    assert!(text.starts_with("pool 'STEP' encountered 2 error(s):"), "{text}");
    assert!(text.contains("#1: [Fetch] /entry/energy"), "{text}");
    assert!(text.contains("#2: [Write] /entry/image"), "{text}");
    assert_eq!(err.elements(), vec!["/entry/energy", "/entry/image"]);
    assert_eq!(err.len(), 2);
}

#[test]
fn single_failure_aggregate() {
    let err = AggregateError::single("trigger:det", failure(Stage::Cast, "/entry/frame"));
    assert!(!err.is_empty());
    assert_eq!(err.len(), 1);
    let wrapped: WriterError = err.into();
    assert!(wrapped.to_string().contains("trigger:det"));
}

#[test]
fn failure_keeps_its_cause() {
    let f = failure(Stage::Fetch, "/entry/x");
    let source = std::error::Error::source(&f).expect("cause");
    assert!(source.to_string().contains("device offline"));
}

#[test]
fn backend_errors_convert() {
    let err: WriterError = BackendError::NotFound("/entry/missing".into()).into();
    assert!(matches!(err, WriterError::Backend(BackendError::NotFound(_))));
    let shape = WriterError::shape("/entry/x", "rank mismatch");
    assert!(shape.to_string().contains("/entry/x"), "{shape}");
}
