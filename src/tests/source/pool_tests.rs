//! Tests for the source registry and its shared state.

use crate::source::{COUNTER_FINAL, COUNTER_INIT, DeviceGroups, default_pool};
use crate::WriterError;

#[test]
fn default_pool_registers_builtin_sources() {
    let pool = default_pool();
    for tag in ["CLIENT", "TANGO", "DB"] {
        assert!(pool.has_source(tag), "{tag} missing");
    }
    #[cfg(feature = "expression")]
    assert!(pool.has_source("PYEVAL"));
}

#[test]
fn unknown_tag_is_unsupported() {
    match default_pool().create("EPICS") {
        Err(WriterError::Unsupported(msg)) => assert!(msg.contains("EPICS"), "{msg}"),
        Err(other) => panic!("expected unsupported, got: {other:?}"),
        Ok(_) => panic!("expected unsupported, got a source"),
    }
}

#[test]
fn clones_share_counter_and_scratch() {
    let pool = default_pool();
    let clone = pool.clone();
    clone.set_counter(COUNTER_INIT);
    assert_eq!(pool.counter(), -1);
    pool.set_counter(COUNTER_FINAL);
    assert_eq!(clone.counter(), -2);

    let a = pool.scratch_entry::<DeviceGroups>("groups").unwrap();
    let b = clone.scratch_entry::<DeviceGroups>("groups").unwrap();
    a.cache("dev").register("x");
    assert_eq!(b.cache("dev").members(), vec!["x".to_string()]);

    pool.clear_scratch();
    let fresh = clone.scratch_entry::<DeviceGroups>("groups").unwrap();
    assert!(fresh.cache("dev").members().is_empty());
}

#[test]
fn scratch_entry_of_another_type_is_a_state_error() {
    let pool = default_pool();
    pool.scratch_entry::<DeviceGroups>("shared").unwrap();
    let err = pool.scratch_entry::<String>("shared").expect_err("type confusion accepted");
    assert!(matches!(err, WriterError::State(_)), "unexpected error: {err:?}");
}
