//! Tests for the CLIENT source.

use std::sync::Arc;

use serde_json::json;

use crate::config::{RecordContext, ValueScope};
use crate::source::{DataSource, default_pool};
use crate::types::{Rank, Scalar};
use crate::WriterError;

const MARKUP: &str = r#"<datasource type="CLIENT"><record name="energy"/></datasource>"#;

fn context(global: ValueScope, local: ValueScope) -> RecordContext {
    RecordContext::new(Arc::new(global), Arc::new(local))
}

#[test]
fn local_scope_overrides_global() {
    let mut source = default_pool().build("CLIENT", MARKUP).unwrap();
    source.set_scope(&context(
        ValueScope::new().with_value("energy", 7.0),
        ValueScope::new().with_value("energy", 8.5),
    ));
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.value.first(), Some(&Scalar::Float(8.5)));
}

#[test]
fn global_scope_is_the_fallback() {
    let mut source = default_pool().build("CLIENT", MARKUP).unwrap();
    source.set_scope(&context(ValueScope::new().with_value("energy", json!([1, 2, 3])), ValueScope::new()));
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.rank, Rank::Spectrum);
    assert_eq!(holder.shape, vec![3, 0]);
}

#[test]
fn missing_or_null_record_has_no_value() {
    let mut source = default_pool().build("CLIENT", MARKUP).unwrap();
    assert!(source.get_data().unwrap().is_none());
    source.set_scope(&context(ValueScope::new(), ValueScope::new().with_value("energy", json!(null))));
    assert!(source.get_data().unwrap().is_none());
}

#[test]
fn record_name_is_required() {
    let err = default_pool()
        .build("CLIENT", r#"<datasource type="CLIENT"><record/></datasource>"#)
        .err()
        .expect("source without record accepted");
    match err {
        WriterError::Setup(msg) => assert!(msg.contains("CLIENT"), "{msg}"),
        other => panic!("expected setup error, got: {other:?}"),
    }
}
