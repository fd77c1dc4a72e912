//! Tests for strategy parsing.

use std::collections::BTreeMap;

use crate::backend::Compression;
use crate::scheduler::Phase;
use crate::tree::{Mode, Strategy};
use crate::WriterError;

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn full_strategy_parses() {
    let strategy = Strategy::from_attrs(
        &attrs(&[
            ("mode", "step"),
            ("trigger", " detector "),
            ("grows", "2"),
            ("canfail", "yes"),
            ("compression", "1"),
            ("rate", "4"),
        ]),
        "",
    )
    .unwrap();
    assert_eq!(strategy.mode, Mode::Step);
    assert_eq!(strategy.phase(), Some(Phase::Step));
    assert_eq!(strategy.trigger.as_deref(), Some("detector"));
    assert_eq!(strategy.grows, Some(2));
    assert_eq!(strategy.can_fail, Some(true));
    assert_eq!(strategy.rate, Some(4));
}

#[test]
fn postrun_has_no_phase() {
    let strategy = Strategy::from_attrs(&attrs(&[("mode", "POSTRUN")]), " cmd ").unwrap();
    assert_eq!(strategy.phase(), None);
    assert_eq!(strategy.content, "cmd");
}

#[test]
fn mode_is_required_and_checked() {
    for bad in [attrs(&[]), attrs(&[("mode", "SOMETIMES")]), attrs(&[("mode", "STEP"), ("canfail", "maybe")])] {
        let err = Strategy::from_attrs(&bad, "").expect_err("invalid strategy accepted");
        assert!(matches!(err, WriterError::Setup(_)), "unexpected error: {err:?}");
    }
}

#[test]
fn compression_only_applies_when_enabled() {
    let default = Compression {
        enabled: false,
        level: 3,
        shuffle: true,
    };
    let off = Strategy::from_attrs(&attrs(&[("mode", "INIT"), ("rate", "7")]), "").unwrap();
    assert!(!off.field_compression(default).enabled);

    let on = Strategy::from_attrs(&attrs(&[("mode", "INIT"), ("compression", "true")]), "").unwrap();
    assert_eq!(
        on.field_compression(default),
        Compression {
            enabled: true,
            level: 3,
            shuffle: true
        }
    );
}
