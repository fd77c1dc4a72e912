//! Tests for link target resolution.

use super::parse;
use crate::backend::MemoryBackend;
use crate::config::WriterConfig;
use crate::tests::support::{FILE, entry_template};
use crate::types::Scalar;
use crate::WriterError;

const ENERGY: &str = r#"<field name="energy" type="NX_FLOAT64">12.4</field>"#;

#[test]
fn bare_types_resolve_to_group_names() {
    let backend = MemoryBackend::new();
    let xml = entry_template(&format!(
        r#"{ENERGY}<group type="NXdata" name="data"><link name="energy" target="/NXentry/energy"/></group>"#
    ));
    parse(&backend, &xml, &WriterConfig::default()).unwrap();
    assert_eq!(backend.link_target(FILE, "/entry/data/energy").unwrap(), "/entry/energy");
    let value = backend.read_field(FILE, "/entry/data/energy").unwrap();
    assert_eq!(value.first(), Some(&Scalar::Float(12.4)));
}

#[test]
fn named_segments_keep_their_name() {
    let backend = MemoryBackend::new();
    let xml = entry_template(&format!(
        r#"{ENERGY}<group type="NXdata"><link name="e">/entry:NXentry/energy</link></group>"#
    ));
    let (tree, _) = parse(&backend, &xml, &WriterConfig::default()).unwrap();
    assert_eq!(backend.link_target(FILE, "/entry/data/e").unwrap(), "/entry/energy");
    assert_eq!(tree.resolve_link_target("relative/path"), "relative/path");
}

#[test]
fn unknown_type_falls_back_to_its_stem() {
    let backend = MemoryBackend::new();
    let xml = entry_template(ENERGY);
    let (tree, _) = parse(&backend, &xml, &WriterConfig::default()).unwrap();
    assert_eq!(
        tree.resolve_link_target("/NXentry/NXinstrument/NXdetector/data"),
        "/entry/instrument/detector/data"
    );
}

#[test]
fn link_needs_a_target() {
    let backend = MemoryBackend::new();
    let xml = entry_template(r#"<link name="dangling"/>"#);
    match parse(&backend, &xml, &WriterConfig::default()) {
        Err(WriterError::Setup(msg)) => assert!(msg.contains("dangling"), "{msg}"),
        Err(other) => panic!("expected setup error, got: {other:?}"),
        Ok(_) => panic!("expected setup error, got a tree"),
    }
}
