//! Tests for the PYEVAL expression source.

use std::sync::Arc;

use serde_json::json;

use crate::config::{RecordContext, ValueScope};
use crate::source::{DataSource, ExpressionSource, default_pool};
use crate::types::{Rank, Scalar};
use crate::WriterError;

fn scope(local: ValueScope) -> RecordContext {
    RecordContext::new(Arc::new(ValueScope::new().with_value("offset", 10)), Arc::new(local))
}

const SUM: &str = r#"<datasource type="PYEVAL">
    <datasource name="a" type="CLIENT"><record name="a"/></datasource>
    <datasource name="offset"><record name="offset"/></datasource>
    <result name="total">ds.total = a + offset;</result>
</datasource>"#;

#[test]
fn inputs_are_bound_by_name() {
    let mut source = ExpressionSource::new(default_pool());
    source.setup(SUM).unwrap();
    assert_eq!(source.input_names(), vec!["a", "offset"]);

    source.set_scope(&scope(ValueScope::new().with_value("a", 5)));
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.value.first(), Some(&Scalar::Int(15)));
}

#[test]
fn last_expression_is_the_default_result() {
    let markup = r#"<datasource type="PYEVAL">
        <datasource name="xs"><record name="xs"/></datasource>
        <result>xs.map(|x| x * 2.0)</result>
    </datasource>"#;
    let mut source = default_pool().build("PYEVAL", markup).unwrap();
    source.set_scope(&scope(ValueScope::new().with_value("xs", json!([1.0, 2.5]))));
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.rank, Rank::Spectrum);
    assert_eq!(holder.value.data(), &[Scalar::Float(2.0), Scalar::Float(5.0)]);
}

#[test]
fn unit_result_has_no_value() {
    let markup = r#"<datasource type="PYEVAL"><result>let x = 1;</result></datasource>"#;
    let source = default_pool().build("PYEVAL", markup).unwrap();
    assert!(source.get_data().unwrap().is_none());
}

#[test]
fn input_without_value_is_a_source_error() {
    let mut source = default_pool().build("PYEVAL", SUM).unwrap();
    source.set_scope(&scope(ValueScope::new()));
    match source.get_data() {
        Err(WriterError::Source(msg)) => assert!(msg.contains("'a'"), "{msg}"),
        other => panic!("expected source error, got: {other:?}"),
    }
}

#[test]
fn script_is_checked_at_setup() {
    let pool = default_pool();
    for markup in [
        r#"<datasource type="PYEVAL"><result>  </result></datasource>"#,
        r#"<datasource type="PYEVAL"><result>let = ;</result></datasource>"#,
        r#"<datasource type="PYEVAL"><datasource><record name="a"/></datasource><result>1</result></datasource>"#,
    ] {
        match pool.build("PYEVAL", markup) {
            Err(WriterError::Setup(_)) => {}
            Err(other) => panic!("expected setup error for {markup}, got: {other:?}"),
            Ok(_) => panic!("expected setup error for {markup}"),
        }
    }
}

#[test]
fn runaway_scripts_are_stopped() {
    let markup = r#"<datasource type="PYEVAL"><result>loop { }</result></datasource>"#;
    let source = default_pool().build("PYEVAL", markup).unwrap();
    let err = source.get_data().expect_err("endless loop finished");
    assert!(matches!(err, WriterError::Source(_)), "unexpected error: {err:?}");
}
