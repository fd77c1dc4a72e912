//! Tests for growing fields written through the engine.

use serde_json::json;

use crate::tests::support::{FILE, client_field, entry_template, memory_builder, record_json};
use crate::types::Scalar;

fn image_field(grows: usize) -> String {
    client_field(
        "image",
        "NX_INT32",
        &format!(
            r#"<strategy mode="STEP" grows="{grows}"/><dimensions rank="2"><dim index="1" value="2"/><dim index="2" value="2"/></dimensions>"#
        ),
        "image",
    )
}

fn ints(values: &[i64]) -> Vec<Scalar> {
    values.iter().map(|v| Scalar::Int(*v)).collect()
}

/// Pixel `(i, j)` of the image written at step `k`.
fn pixel(k: usize, i: usize, j: usize) -> i64 {
    (100 * k + 10 * i + j) as i64
}

#[test]
fn images_stack_along_the_chosen_axis() {
    for (grows, expected) in [(1, [3, 2, 2]), (2, [2, 3, 2]), (3, [2, 2, 3])] {
        let (backend, builder) = memory_builder();
        let mut engine = builder.build();
        engine.open_file(FILE).unwrap();
        engine.open_entry(&entry_template(&image_field(grows))).unwrap();
        for k in 0..3 {
            let image = json!([[pixel(k, 0, 0), pixel(k, 0, 1)], [pixel(k, 1, 0), pixel(k, 1, 1)]]);
            engine.record(&record_json(json!({ "image": image }), &[])).unwrap();
        }
        engine.close_entry().unwrap();

        let image = backend.read_field(FILE, "/entry/image").unwrap();
        assert_eq!(image.shape(), &expected, "grows={grows}");
        for k in 0..3 {
            for i in 0..2 {
                for j in 0..2 {
                    let index = match grows {
                        1 => [k, i, j],
                        2 => [i, k, j],
                        _ => [i, j, k],
                    };
                    let flat = (index[0] * expected[1] + index[1]) * expected[2] + index[2];
                    assert_eq!(
                        image.data()[flat],
                        Scalar::Int(pixel(k, i, j)),
                        "grows={grows} step={k} pixel=({i}, {j})"
                    );
                }
            }
        }
    }
}

#[test]
fn second_axis_growth_writes_columns() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field(
        "spectrum",
        "NX_INT64",
        r#"<strategy mode="STEP" grows="2"/><dimensions rank="1"><dim index="1" value="3"/></dimensions>"#,
        "spectrum",
    );
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({ "spectrum": [1, 2, 3] }), &[])).unwrap();
    engine.record(&record_json(json!({ "spectrum": [4, 5, 6] }), &[])).unwrap();
    engine.close_entry().unwrap();

    let spectrum = backend.read_field(FILE, "/entry/spectrum").unwrap();
    assert_eq!(spectrum.shape(), &[3, 2]);
    assert_eq!(spectrum.data(), ints(&[1, 4, 2, 5, 3, 6]).as_slice());
}

#[test]
fn spectrum_without_extents_grows_to_fit() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field("mca", "NX_INT64", r#"<strategy mode="STEP"/><dimensions rank="1"/>"#, "mca");
    engine.open_entry(&entry_template(&body)).unwrap();
    assert_eq!(backend.field_spec(FILE, "/entry/mca").unwrap().shape, vec![0, 0]);

    engine.record(&record_json(json!({ "mca": [1, 2, 3] }), &[])).unwrap();
    engine.record(&record_json(json!({ "mca": [4, 5, 6, 7] }), &[])).unwrap();
    engine.close_entry().unwrap();

    let mca = backend.read_field(FILE, "/entry/mca").unwrap();
    assert_eq!(mca.shape(), &[2, 4]);
    assert_eq!(mca.data(), ints(&[1, 2, 3, 0, 4, 5, 6, 7]).as_slice());
}

#[test]
fn failed_image_slot_is_filled_whole() {
    let (backend, builder) = memory_builder();
    let mut engine = builder.build();
    engine.open_file(FILE).unwrap();
    let body = client_field(
        "image",
        "NX_INT32",
        r#"<strategy mode="STEP" canfail="true"/><dimensions rank="2"><dim index="1" value="2"/><dim index="2" value="2"/></dimensions>"#,
        "image",
    );
    engine.open_entry(&entry_template(&body)).unwrap();
    engine.record(&record_json(json!({ "image": [[1, 2], [3, 4]] }), &[])).unwrap();
    engine.record(&record_json(json!({}), &[])).unwrap();
    engine.close_entry().unwrap();

    let image = backend.read_field(FILE, "/entry/image").unwrap();
    assert_eq!(image.shape(), &[2, 2, 2]);
    let max = i32::MAX as i64;
    assert_eq!(image.data(), ints(&[1, 2, 3, 4, max, max, max, max]).as_slice());
}
