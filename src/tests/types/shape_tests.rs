//! Tests for shape inference and inline text parsing.

use serde_json::json;

use crate::types::{ElementType, NdArray, Rank, Scalar, infer_element_type, infer_shape, parse_text};

#[test]
fn nested_values_report_their_extents() {
    assert_eq!(infer_shape(&json!(3.5)).unwrap(), Vec::<usize>::new());
    assert_eq!(infer_shape(&json!([1, 2, 3])).unwrap(), vec![3]);
    assert_eq!(infer_shape(&json!([[1, 2], [3, 4], [5, 6]])).unwrap(), vec![3, 2]);
}

#[test]
fn ragged_values_are_rejected() {
    let err = infer_shape(&json!([[1, 2], [3]])).expect_err("ragged value accepted");
    assert!(err.to_string().contains("ragged"), "unexpected error: {err}");
}

#[test]
fn element_type_widens_across_leaves() {
    assert_eq!(infer_element_type(&json!([1, 2])), ElementType::Int64);
    assert_eq!(infer_element_type(&json!([1, 2.5])), ElementType::Float64);
    assert_eq!(infer_element_type(&json!([true, 3])), ElementType::Int64);
    assert_eq!(infer_element_type(&json!(["a", 1])), ElementType::String);
}

#[test]
fn rank_envelope_pads_scalars_and_spectra() {
    assert_eq!(Rank::Scalar.envelope_shape(&[]), vec![1, 0]);
    assert_eq!(Rank::Spectrum.envelope_shape(&[5]), vec![5, 0]);
    assert_eq!(Rank::Image.envelope_shape(&[4, 3]), vec![4, 3]);
    assert_eq!(Rank::from_dims(2), Some(Rank::Image));
}

#[test]
fn json_integers_stay_signed() {
    let array = NdArray::from_json(&json!([7, -1])).unwrap();
    assert_eq!(array.data(), &[Scalar::Int(7), Scalar::Int(-1)]);
}

#[test]
fn inline_text_follows_the_requested_rank() {
    let scalar = parse_text("  hello world ", 0, ElementType::String).unwrap();
    assert_eq!(scalar.first(), Some(&Scalar::Str("hello world".to_string())));

    let vector = parse_text("1 2\n3", 1, ElementType::Int32).unwrap();
    assert_eq!(vector.shape(), &[3]);

    let image = parse_text("1 2\n\n3 4\n", 2, ElementType::Float64).unwrap();
    assert_eq!(image.shape(), &[2, 2]);
    assert_eq!(image.data()[3], Scalar::Float(4.0));
}

#[test]
fn ragged_inline_image_is_rejected() {
    parse_text("1 2\n3", 2, ElementType::Int64).expect_err("ragged image accepted");
}
