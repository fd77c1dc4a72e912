//! Tests for closure-based sources.

use std::sync::Arc;

use serde_json::json;

use crate::config::{RecordContext, ValueScope};
use crate::holder::DataHolder;
use crate::source::{CustomDataSource, DataSource, DataSourcePool};
use crate::types::Scalar;
use crate::WriterError;

fn doubling_source() -> CustomDataSource {
    CustomDataSource::new("DOUBLE")
        .with_setup(|xml| {
            if xml.contains("<record") {
                Ok(())
            } else {
                Err(WriterError::Setup("DOUBLE needs a record".into()))
            }
        })
        .with_get_data(|call| {
            let Some(value) = call.scope.lookup("x").and_then(|v| v.as_f64()) else {
                return Ok(None);
            };
            DataHolder::from_json(&json!(value * 2.0)).map(Some)
        })
        .with_is_valid(|| true)
}

#[test]
fn incomplete_source_is_rejected() {
    let mut pool = DataSourcePool::new();
    let partial = CustomDataSource::new("HALF").with_get_data(|_| Ok(None));
    assert!(!pool.register_custom(partial));
    assert!(!pool.has_source("HALF"));
}

#[test]
fn complete_source_is_built_by_tag() {
    let pool = DataSourcePool::new().with_custom_source(doubling_source());
    assert_eq!(pool.names(), vec!["DOUBLE"]);

    let mut source = pool
        .build("DOUBLE", r#"<datasource type="DOUBLE"><record name="x"/></datasource>"#)
        .unwrap();
    assert!(source.is_valid());
    source.set_scope(&RecordContext::new(
        Arc::new(ValueScope::new()),
        Arc::new(ValueScope::new().with_value("x", 1.5)),
    ));
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.value.first(), Some(&Scalar::Float(3.0)));
}

#[test]
fn setup_errors_surface_from_build() {
    let pool = DataSourcePool::new().with_custom_source(doubling_source());
    let err = pool
        .build("DOUBLE", r#"<datasource type="DOUBLE"/>"#)
        .err()
        .expect("setup failure ignored");
    assert!(matches!(err, WriterError::Setup(_)), "unexpected error: {err:?}");
}

#[test]
fn source_sees_its_own_markup() {
    let source = CustomDataSource::new("ECHO")
        .with_setup(|_| Ok(()))
        .with_get_data(|call| DataHolder::from_json(&json!(call.config)).map(Some))
        .with_is_valid(|| true);
    let pool = DataSourcePool::new().with_custom_source(source);
    let markup = r#"<datasource type="ECHO">hi</datasource>"#;
    let holder = pool.build("ECHO", markup).unwrap().get_data().unwrap().expect("value");
    assert_eq!(holder.value.first(), Some(&Scalar::Str(markup.into())));
}
