//! Tests for element type names, casts and sentinel values.

use crate::types::{ElementType, NdArray, Scalar};
use crate::WriterError;

#[test]
fn template_and_producer_names_resolve() {
    assert_eq!(ElementType::parse("NX_FLOAT32"), Some(ElementType::Float32));
    assert_eq!(ElementType::parse("NX_CHAR"), Some(ElementType::String));
    assert_eq!(ElementType::parse("DevLong64"), Some(ElementType::Int64));
    assert_eq!(ElementType::parse("uint16"), Some(ElementType::UInt16));
    assert_eq!(ElementType::parse("NX_COMPLEX"), None);
}

#[test]
fn unsigned_targets_produce_unsigned_scalars() {
    assert_eq!(Scalar::Int(5).cast(ElementType::UInt32).unwrap(), Scalar::UInt(5));
    assert_eq!(Scalar::Str(" 12 ".into()).cast(ElementType::Int16).unwrap(), Scalar::Int(12));
}

#[test]
fn out_of_range_values_fail_to_cast() {
    match Scalar::Int(300).cast(ElementType::UInt8) {
        Err(WriterError::Cast(msg)) => assert!(msg.contains("out of range"), "{msg}"),
        other => panic!("expected cast error, got: {other:?}"),
    }
    Scalar::Int(-1).cast(ElementType::UInt64).expect_err("negative unsigned accepted");
}

#[test]
fn float32_casts_round_through_single_precision() {
    let cast = Scalar::Float(0.1).cast(ElementType::Float32).unwrap();
    assert_eq!(cast, Scalar::Float(0.1f32 as f64));
}

#[test]
fn strings_and_bools_convert_both_ways() {
    assert_eq!(Scalar::Str("yes".into()).cast(ElementType::Bool).unwrap(), Scalar::Bool(true));
    assert_eq!(Scalar::Str("false".into()).cast(ElementType::Bool).unwrap(), Scalar::Bool(false));
    assert_eq!(Scalar::Float(2.5).cast(ElementType::String).unwrap(), Scalar::Str("2.5".into()));
    Scalar::Str("abc".into()).cast(ElementType::Float64).expect_err("text cast to a number");
}

#[test]
fn array_cast_keeps_the_shape() {
    let array = NdArray::new(vec![2, 2], vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3), Scalar::Int(4)]).unwrap();
    let cast = array.cast(ElementType::Float64).unwrap();
    assert_eq!(cast.shape(), &[2, 2]);
    assert_eq!(cast.data()[2], Scalar::Float(3.0));
}

#[test]
fn sentinels_are_type_maxima() {
    assert_eq!(ElementType::Float64.sentinel(), Scalar::Float(f64::MAX));
    assert_eq!(ElementType::Int32.sentinel(), Scalar::Int(i32::MAX as i64));
    assert_eq!(ElementType::UInt8.sentinel(), Scalar::UInt(u8::MAX as u64));
    assert_eq!(ElementType::UInt64.sentinel(), Scalar::UInt(u64::MAX));
    assert_eq!(ElementType::Bool.sentinel(), Scalar::Bool(false));
    assert_eq!(ElementType::String.sentinel(), Scalar::Str(String::new()));
}
