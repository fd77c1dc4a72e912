//! Instrument device source.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use super::group::DeviceGroups;
use super::{DataSource, DataSourcePool, RecordTag};
use crate::error::WriterError;
use crate::holder::DataHolder;
use crate::types::{NdArray, Rank};

const GROUPS_KEY: &str = "device.groups";

/// Address of one instrument device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceEndpoint {
    pub device: String,
    pub hostname: Option<String>,
    pub port: Option<u16>,
}

impl DeviceEndpoint {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            hostname: None,
            port: None,
        }
    }

    pub fn with_host(mut self, hostname: impl Into<String>, port: Option<u16>) -> Self {
        self.hostname = Some(hostname.into());
        self.port = port;
        self
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.hostname, self.port) {
            (Some(h), Some(p)) => write!(f, "{}:{}/{}", h, p, self.device),
            (Some(h), None) => write!(f, "{}/{}", h, self.device),
            _ => write!(f, "{}", self.device),
        }
    }
}

/// Which kind of device member a source reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMember {
    #[default]
    Attribute,
    Property,
    Command,
}

impl DeviceMember {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attribute" => Some(DeviceMember::Attribute),
            "property" => Some(DeviceMember::Property),
            "command" => Some(DeviceMember::Command),
            _ => None,
        }
    }
}

/// Payload of a device reading.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Plain(NdArray),
    /// Opaque payload to be decoded; `format` is the device's format tag
    Encoded { format: String, payload: Vec<u8> },
}

/// One value read from a device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    pub value: ReadingValue,
    /// Device-native type name, e.g. `DevDouble`
    pub declared_type: String,
    /// Rank reported by the device, when it reports one
    pub rank: Option<Rank>,
}

impl DeviceReading {
    pub fn plain(value: NdArray, declared_type: impl Into<String>) -> Self {
        Self {
            value: ReadingValue::Plain(value),
            declared_type: declared_type.into(),
            rank: None,
        }
    }

    pub fn encoded(format: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            value: ReadingValue::Encoded {
                format: format.into(),
                payload,
            },
            declared_type: "DevEncoded".to_string(),
            rank: None,
        }
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }
}

/// Client of the instrument control system.
pub trait DeviceClient: Send + Sync {
    fn read_attribute(&self, endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError>;

    /// Read several attributes of one device in a single round trip.
    fn read_attributes(
        &self,
        endpoint: &DeviceEndpoint,
        names: &[String],
    ) -> Result<Vec<DeviceReading>, WriterError> {
        names.iter().map(|n| self.read_attribute(endpoint, n)).collect()
    }

    fn read_property(&self, endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError>;

    fn run_command(&self, endpoint: &DeviceEndpoint, name: &str) -> Result<DeviceReading, WriterError>;
}

#[derive(Debug, Default, Deserialize)]
struct DeviceTag {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@hostname")]
    hostname: Option<String>,
    #[serde(rename = "@port")]
    port: Option<String>,
    #[serde(rename = "@member")]
    member: Option<String>,
    #[serde(rename = "@encoding")]
    encoding: Option<String>,
    #[serde(rename = "@group")]
    group: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceMarkup {
    device: Option<DeviceTag>,
    record: Option<RecordTag>,
}

/// `TANGO` source: reads an attribute, property or command of a device.
#[derive(Clone)]
pub struct DeviceSource {
    pool: DataSourcePool,
    endpoint: Option<DeviceEndpoint>,
    member: DeviceMember,
    record: String,
    encoding: Option<String>,
    group: Option<String>,
}

impl fmt::Debug for DeviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSource")
            .field("endpoint", &self.endpoint)
            .field("member", &self.member)
            .field("record", &self.record)
            .field("encoding", &self.encoding)
            .field("group", &self.group)
            .finish()
    }
}

impl DeviceSource {
    pub fn new(pool: DataSourcePool) -> Self {
        Self {
            pool,
            endpoint: None,
            member: DeviceMember::default(),
            record: String::new(),
            encoding: None,
            group: None,
        }
    }

    pub fn endpoint(&self) -> Option<&DeviceEndpoint> {
        self.endpoint.as_ref()
    }

    pub fn member(&self) -> DeviceMember {
        self.member
    }

    fn client(&self) -> Result<Arc<dyn DeviceClient>, WriterError> {
        self.pool
            .device_client()
            .ok_or_else(|| WriterError::Unsupported("no device client configured".to_string()))
    }

    fn read(&self, endpoint: &DeviceEndpoint) -> Result<DeviceReading, WriterError> {
        let client = self.client()?;
        match self.member {
            DeviceMember::Attribute if self.group.is_some() => {
                let groups = self.pool.scratch_entry::<DeviceGroups>(GROUPS_KEY)?;
                let cache = groups.cache(&endpoint.to_string());
                cache.fetch(self.pool.counter(), client.as_ref(), endpoint, &self.record)
            }
            DeviceMember::Attribute => client.read_attribute(endpoint, &self.record),
            DeviceMember::Property => client.read_property(endpoint, &self.record),
            DeviceMember::Command => client.run_command(endpoint, &self.record),
        }
    }

    fn to_holder(&self, reading: DeviceReading) -> Result<DataHolder, WriterError> {
        match reading.value {
            ReadingValue::Plain(value) => match reading.rank {
                Some(rank) => DataHolder::with_rank(rank, value, reading.declared_type),
                None => DataHolder::new(value, reading.declared_type),
            },
            ReadingValue::Encoded { format, payload } => {
                let encoding = self.encoding.as_deref().unwrap_or(&format);
                self.pool.decoders().decode(encoding, &format, &payload)
            }
        }
    }
}

impl DataSource for DeviceSource {
    fn setup(&mut self, xml: &str) -> Result<(), WriterError> {
        let markup: DeviceMarkup = quick_xml::de::from_str(xml)?;
        let tag = markup
            .device
            .ok_or_else(|| WriterError::Setup("TANGO source without a device".to_string()))?;
        let name = tag
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| WriterError::Setup("TANGO source without a device name".to_string()))?;
        self.record = RecordTag::required(markup.record, "TANGO")?;
        let port = match tag.port.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(
                p.parse::<u16>()
                    .map_err(|_| WriterError::Setup(format!("invalid device port '{}'", p)))?,
            ),
            _ => None,
        };
        let mut endpoint = DeviceEndpoint::new(name);
        if let Some(host) = tag.hostname.filter(|h| !h.trim().is_empty()) {
            endpoint = endpoint.with_host(host.trim(), port);
        }
        self.member = match tag.member {
            Some(m) => DeviceMember::from_str(&m)
                .ok_or_else(|| WriterError::Setup(format!("unknown device member '{}'", m)))?,
            None => DeviceMember::Attribute,
        };
        self.encoding = tag.encoding.filter(|e| !e.trim().is_empty());
        self.group = tag.group.filter(|g| !g.trim().is_empty());
        if self.group.is_some() && self.member == DeviceMember::Attribute {
            let groups = self.pool.scratch_entry::<DeviceGroups>(GROUPS_KEY)?;
            groups.cache(&endpoint.to_string()).register(&self.record);
        }
        self.endpoint = Some(endpoint);
        Ok(())
    }

    fn get_data(&self) -> Result<Option<DataHolder>, WriterError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| WriterError::State("TANGO source used before setup".to_string()))?;
        let reading = self.read(endpoint)?;
        self.to_holder(reading).map(Some)
    }

    fn is_valid(&self) -> bool {
        self.pool.device_client().is_some()
    }
}
