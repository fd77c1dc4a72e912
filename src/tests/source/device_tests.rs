//! Tests for the TANGO source and grouped device reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::source::{
    DataSource, DataSourcePool, DeviceClient, DeviceEndpoint, DeviceMember, DeviceReading, default_pool,
};
use crate::types::{NdArray, Rank, Scalar};
use crate::WriterError;

/// Simulated device server counting single and batched reads.
#[derive(Default)]
struct FakeDevice {
    single: AtomicUsize,
    batched: AtomicUsize,
}

impl FakeDevice {
    fn reading(&self, name: &str) -> Result<DeviceReading, WriterError> {
        match name {
            "position" => Ok(DeviceReading::plain(NdArray::scalar(Scalar::Float(1.25)), "DevDouble")),
            "velocity" => Ok(DeviceReading::plain(NdArray::scalar(Scalar::Float(0.5)), "DevDouble")),
            "profile" => Ok(DeviceReading::plain(
                NdArray::vector(vec![Scalar::Int(3)]),
                "DevLong",
            )
            .with_rank(Rank::Spectrum)),
            "counts" => {
                let payload = [10u32, 20, 30].iter().flat_map(|v| v.to_le_bytes()).collect();
                Ok(DeviceReading::encoded("UINT32", payload))
            }
            other => Err(WriterError::Source(format!("no attribute '{other}'"))),
        }
    }
}

impl DeviceClient for FakeDevice {
    fn read_attribute(&self, _endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError> {
        self.single.fetch_add(1, Ordering::SeqCst);
        self.reading(name)
    }

    fn read_attributes(
        &self,
        _endpoint: &DeviceEndpoint,
        names: &[String],
    ) -> Result<Vec<DeviceReading>, WriterError> {
        self.batched.fetch_add(1, Ordering::SeqCst);
        names.iter().map(|n| self.reading(n)).collect()
    }

    fn read_property(&self, endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError> {
        Ok(DeviceReading::plain(NdArray::scalar(format!("{endpoint}.{name}")), "DevString"))
    }

    fn run_command(&self, _endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError> {
        Ok(DeviceReading::plain(NdArray::scalar(Scalar::Int(name.len() as i64)), "DevLong"))
    }
}

fn device_pool() -> (Arc<FakeDevice>, DataSourcePool) {
    let device = Arc::new(FakeDevice::default());
    let pool = default_pool().with_device_client(device.clone());
    (device, pool)
}

fn markup(record: &str, extra: &str) -> String {
    format!(
        r#"<datasource type="TANGO"><device name="p09/motor/exp.01" hostname="haso" port="10000" {extra}/><record name="{record}"/></datasource>"#
    )
}

#[test]
fn endpoint_display_includes_host_and_port() {
    let endpoint = DeviceEndpoint::new("p09/motor/exp.01").with_host("haso", Some(10000));
    assert_eq!(endpoint.to_string(), "haso:10000/p09/motor/exp.01");
    assert_eq!(DeviceEndpoint::new("sys/tg/1").to_string(), "sys/tg/1");
}

#[test]
fn attribute_reading_keeps_the_declared_type() {
    let (device, pool) = device_pool();
    let source = pool.build("TANGO", &markup("position", "")).unwrap();
    assert!(source.is_valid());
    let holder = source.get_data().unwrap().expect("value");
    assert_eq!(holder.declared_type, "DevDouble");
    assert_eq!(holder.value.first(), Some(&Scalar::Float(1.25)));
    assert_eq!(device.single.load(Ordering::SeqCst), 1);
}

#[test]
fn declared_rank_is_respected() {
    let (_, pool) = device_pool();
    let holder = pool
        .build("TANGO", &markup("profile", ""))
        .unwrap()
        .get_data()
        .unwrap()
        .expect("value");
    assert_eq!(holder.rank, Rank::Spectrum);
    assert_eq!(holder.shape, vec![1, 0]);
}

#[test]
fn encoded_readings_go_through_the_decoder() {
    let (_, pool) = device_pool();
    let holder = pool
        .build("TANGO", &markup("counts", r#"encoding="UINT32""#))
        .unwrap()
        .get_data()
        .unwrap()
        .expect("value");
    assert_eq!(holder.encoding.as_deref(), Some("UINT32"));
    assert_eq!(holder.shape, vec![3, 0]);
    assert_eq!(holder.value.data()[2], Scalar::UInt(30));
}

#[test]
fn properties_and_commands_use_their_own_calls() {
    let (device, pool) = device_pool();
    let property = pool
        .build("TANGO", &markup("unit", r#"member="property""#))
        .unwrap()
        .get_data()
        .unwrap()
        .expect("value");
    assert_eq!(
        property.value.first(),
        Some(&Scalar::Str("haso:10000/p09/motor/exp.01.unit".into()))
    );
    let command = pool
        .build("TANGO", &markup("State", r#"member="command""#))
        .unwrap()
        .get_data()
        .unwrap()
        .expect("value");
    assert_eq!(command.value.first(), Some(&Scalar::Int(5)));
    assert_eq!(device.single.load(Ordering::SeqCst), 0);
}

#[test]
fn grouped_attributes_are_fetched_once_per_step() {
    let (device, pool) = device_pool();
    let position = pool.build("TANGO", &markup("position", r#"group="motors""#)).unwrap();
    let velocity = pool.build("TANGO", &markup("velocity", r#"group="motors""#)).unwrap();

    for step in 1..=3 {
        pool.set_counter(step);
        let p = position.get_data().unwrap().expect("position");
        let v = velocity.get_data().unwrap().expect("velocity");
        assert_eq!(p.value.first(), Some(&Scalar::Float(1.25)));
        assert_eq!(v.value.first(), Some(&Scalar::Float(0.5)));
        assert_eq!(device.batched.load(Ordering::SeqCst), step as usize);
    }
    assert_eq!(device.single.load(Ordering::SeqCst), 0);
}

#[test]
fn setup_rejects_bad_markup() {
    let (_, pool) = device_pool();
    let cases = [
        r#"<datasource type="TANGO"><record name="x"/></datasource>"#.to_string(),
        r#"<datasource type="TANGO"><device name=""/><record name="x"/></datasource>"#.to_string(),
        r#"<datasource type="TANGO"><device name="a/b/c"/></datasource>"#.to_string(),
        markup("x", r#"member="pipe""#),
    ];
    for case in &cases {
        match pool.build("TANGO", case) {
            Err(WriterError::Setup(_)) => {}
            Err(other) => panic!("expected setup error for {case}, got: {other:?}"),
            Ok(_) => panic!("expected setup error for {case}"),
        }
    }
    let bad_port = r#"<datasource type="TANGO"><device name="a/b/c" hostname="h" port="x"/><record name="x"/></datasource>"#;
    assert!(pool.build("TANGO", bad_port).is_err());
}

#[test]
fn missing_client_is_unsupported() {
    let source = default_pool().build("TANGO", &markup("position", "")).unwrap();
    assert!(!source.is_valid());
    let err = source.get_data().expect_err("read without a client");
    assert!(matches!(err, WriterError::Unsupported(_)), "unexpected error: {err:?}");
}

#[test]
fn member_names_parse_case_insensitively() {
    assert_eq!(DeviceMember::from_str("Property"), Some(DeviceMember::Property));
    assert_eq!(DeviceMember::from_str("pipe"), None);
}
