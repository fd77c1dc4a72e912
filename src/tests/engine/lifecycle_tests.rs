//! Tests for the open, record and close lifecycle.

use serde_json::json;

use crate::config::ValueScope;
use crate::element::{CANFAIL_ERROR, CANFAIL_STATUS};
use crate::tests::support::{FILE, client_field, entry_template, memory_builder, record_json};
use crate::types::Scalar;
use crate::WriterError;

#[test]
fn file_root_is_tagged_on_open() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    assert!(engine.is_file_open());
    let class = backend.read_attribute(FILE, "/", "NX_class").unwrap();
    assert_eq!(class.first(), Some(&Scalar::Str("NXroot".into())));
    let name = backend.read_attribute(FILE, "/", "file_name").unwrap();
    assert_eq!(name.first(), Some(&Scalar::Str(FILE.into())));
    assert!(backend.read_attribute(FILE, "/", "file_time").is_ok());
}

#[test]
fn lifecycle_calls_out_of_order_are_state_errors() {
    let (_, builder) = memory_builder();
    let mut engine = builder.build();
    assert!(matches!(engine.open_entry(&entry_template("")), Err(WriterError::State(_))));

    engine.open_file(FILE).unwrap();
    assert!(matches!(engine.open_file(FILE), Err(WriterError::State(_))));
    assert!(matches!(engine.record("{}"), Err(WriterError::State(_))));
    assert!(matches!(engine.close_entry(), Err(WriterError::State(_))));

    engine.open_entry(&entry_template("")).unwrap();
    assert!(matches!(engine.open_entry(&entry_template("")), Err(WriterError::State(_))));
}

#[test]
fn init_reads_the_global_scope() {
    let (backend, builder) = memory_builder();
    let mut engine = builder
        .with_global_scope(ValueScope::new().with_value("title", "calibration run"))
        .build();
    engine.open_file(FILE).unwrap();
    let body = client_field("title", "NX_CHAR", r#"<strategy mode="INIT"/>"#, "title");
    engine.open_entry(&entry_template(&body)).unwrap();

    let title = backend.read_field(FILE, "/entry/title").unwrap();
    assert_eq!(title.first(), Some(&Scalar::Str("calibration run".into())));
    assert_eq!(engine.step(), 0);
}

#[test]
fn step_fields_grow_one_slot_per_record() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("energy", "NX_FLOAT64", r#"<strategy mode="STEP"/>"#, "energy");
    engine.open_entry(&entry_template(&body)).unwrap();
    for e in [8.0, 8.1, 8.2] {
        engine.record(&record_json(json!({ "energy": e }), &[])).unwrap();
    }
    assert_eq!(engine.step(), 3);
    engine.close_entry().unwrap();

    let energy = backend.read_field(FILE, "/entry/energy").unwrap();
    assert_eq!(energy.shape(), &[3]);
    assert_eq!(energy.data()[1], Scalar::Float(8.1));
}

#[test]
fn record_falls_back_to_the_global_scope() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.set_global_json(r#"{"data": {"sample": "Si"}}"#).unwrap();
    engine.open_file(FILE).unwrap();
    let body = client_field("sample", "NX_CHAR", r#"<strategy mode="STEP"/>"#, "sample");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record("").unwrap();
    engine.record(&record_json(json!({ "sample": "Ge" }), &[])).unwrap();
    engine.close_entry().unwrap();

    let sample = backend.read_field(FILE, "/entry/sample").unwrap();
    assert_eq!(sample.data(), &[Scalar::Str("Si".into()), Scalar::Str("Ge".into())]);
}

#[test]
fn tolerated_failure_writes_the_sentinel_and_flags_the_field() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("energy", "NX_FLOAT64", r#"<strategy mode="STEP" canfail="true"/>"#, "energy");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({ "energy": 1.5 }), &[])).unwrap();
    engine.record(&record_json(json!({}), &[])).unwrap();
    engine.close_entry().unwrap();

    let energy = backend.read_field(FILE, "/entry/energy").unwrap();
    assert_eq!(energy.data(), &[Scalar::Float(1.5), Scalar::Float(f64::MAX)]);
    let status = backend.read_attribute(FILE, "/entry/energy", CANFAIL_STATUS).unwrap();
    assert_eq!(status.first(), Some(&Scalar::Str("FAILED".into())));
    let message = backend.read_attribute(FILE, "/entry/energy", CANFAIL_ERROR).unwrap();
    assert!(message.first().and_then(Scalar::as_str).is_some_and(|m| m.contains("/entry/energy")));
}

#[test]
fn fatal_failures_surface_as_one_aggregate() {
    let (_, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = [
        client_field("energy", "NX_FLOAT64", r#"<strategy mode="STEP"/>"#, "energy"),
        client_field("counts", "NX_INT32", r#"<strategy mode="STEP"/>"#, "counts"),
    ]
    .concat();
    engine.open_entry(&entry_template(&body)).unwrap();

    match engine.record(&record_json(json!({ "counts": 3 }), &[])) {
        Err(WriterError::Aggregate(agg)) => {
            assert_eq!(agg.pool, "STEP");
            assert_eq!(agg.elements(), vec!["/entry/energy"]);
        }
        other => panic!("expected an aggregate error, got: {other:?}"),
    }
    assert!(engine.is_entry_open());
    engine.record(&record_json(json!({ "counts": 4, "energy": 2.0 }), &[])).unwrap();
}

#[test]
fn default_can_fail_applies_to_strategies_without_it() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.with_default_can_fail(true).build();
    engine.open_file(FILE).unwrap();
    let body = client_field("counts", "NX_UINT16", r#"<strategy mode="STEP"/>"#, "counts");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({}), &[])).unwrap();
    engine.close_entry().unwrap();

    let counts = backend.read_field(FILE, "/entry/counts").unwrap();
    assert_eq!(counts.data(), &[Scalar::UInt(u16::MAX as u64)]);
}

#[test]
fn trigger_pools_only_run_when_named() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = [
        client_field("energy", "NX_FLOAT64", r#"<strategy mode="STEP"/>"#, "energy"),
        client_field("frame", "NX_INT64", r#"<strategy mode="STEP" trigger="detector"/>"#, "frame"),
    ]
    .concat();
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({ "energy": 1.0, "frame": 10 }), &[])).unwrap();
    engine.record(&record_json(json!({ "energy": 2.0, "frame": 11 }), &["detector"])).unwrap();
    engine.record(&record_json(json!({ "energy": 3.0, "frame": 12 }), &["detector", "unknown"])).unwrap();
    engine.close_entry().unwrap();

    assert_eq!(backend.read_field(FILE, "/entry/energy").unwrap().shape(), &[3]);
    let frames = backend.read_field(FILE, "/entry/frame").unwrap();
    assert_eq!(frames.data(), &[Scalar::Int(11), Scalar::Int(12)]);
}

#[test]
fn final_pool_runs_on_close_entry() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("end_time", "NX_DATE_TIME", r#"<strategy mode="FINAL"/>"#, "end_time");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.set_global_scope(ValueScope::new().with_value("end_time", "2026-10-18T12:00:00Z"));
    engine.close_entry().unwrap();
    assert!(!engine.is_entry_open());

    let end = backend.read_field(FILE, "/entry/end_time").unwrap();
    assert_eq!(end.first(), Some(&Scalar::Str("2026-10-18T12:00:00Z".into())));
}

#[test]
fn close_file_closes_an_open_entry_first() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("note", "NX_CHAR", r#"<strategy mode="FINAL"/>"#, "note");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.set_global_json(r#"{"data": {"note": "done"}}"#).unwrap();
    engine.close_file().unwrap();

    assert!(!engine.is_entry_open());
    assert!(!engine.is_file_open());
    let note = backend.read_field(FILE, "/entry/note").unwrap();
    assert_eq!(note.first(), Some(&Scalar::Str("done".into())));
    assert!(matches!(engine.close_file(), Err(WriterError::State(_))));
}

#[test]
fn entry_can_be_read_from_a_stream() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let xml = entry_template(r#"<field name="mode" type="NX_CHAR">fly</field>"#);
    engine.open_entry_from_reader(xml.as_bytes()).unwrap();
    assert!(engine.tree().is_some());
    engine.close_entry().unwrap();
    let mode = backend.read_field(FILE, "/entry/mode").unwrap();
    assert_eq!(mode.first(), Some(&Scalar::Str("fly".into())));
}

#[test]
fn many_fields_are_written_concurrently() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.with_workers(0).build();
    engine.open_file(FILE).unwrap();
    let body: String = (0..16)
        .map(|i| client_field(&format!("ch{i}"), "NX_INT64", r#"<strategy mode="STEP"/>"#, &format!("ch{i}")))
        .collect();
    engine.open_entry(&entry_template(&body)).unwrap();
    for step in 0..3i64 {
        let data: serde_json::Map<String, serde_json::Value> =
            (0..16).map(|i| (format!("ch{i}"), json!(i * 100 + step))).collect();
        engine.record(&record_json(serde_json::Value::Object(data), &[])).unwrap();
    }
    engine.close_entry().unwrap();

    for i in 0..16i64 {
        let values = backend.read_field(FILE, &format!("/entry/ch{i}")).unwrap();
        assert_eq!(values.data(), &[Scalar::Int(i * 100), Scalar::Int(i * 100 + 1), Scalar::Int(i * 100 + 2)]);
    }
}

#[test]
fn repeated_trigger_fires_its_pool_once() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("frame", "NX_INT64", r#"<strategy mode="STEP" trigger="detector"/>"#, "frame");
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({ "frame": 1 }), &["detector", "detector"])).unwrap();
    engine.record(&record_json(json!({ "frame": 2 }), &["detector"])).unwrap();
    engine.close_entry().unwrap();

    let frames = backend.read_field(FILE, "/entry/frame").unwrap();
    assert_eq!(frames.data(), &[Scalar::Int(1), Scalar::Int(2)]);
}
