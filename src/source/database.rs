//! Database query source.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{DataSource, DataSourcePool};
use crate::error::WriterError;
use crate::holder::DataHolder;

/// Shape the query result is reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryFormat {
    /// First cell of the first row
    #[default]
    Scalar,
    /// The only column, or the first row of a wider result
    Spectrum,
    /// Every row
    Image,
}

impl QueryFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCALAR" => Some(QueryFormat::Scalar),
            "SPECTRUM" => Some(QueryFormat::Spectrum),
            "IMAGE" => Some(QueryFormat::Image),
            _ => None,
        }
    }

    /// Reduce result rows to a single value.
    pub fn reduce(&self, rows: Vec<Vec<Value>>) -> Result<Value, WriterError> {
        let first = rows
            .first()
            .ok_or_else(|| WriterError::Source("query returned no rows".to_string()))?;
        match self {
            QueryFormat::Scalar => first
                .first()
                .cloned()
                .ok_or_else(|| WriterError::Source("query returned an empty row".to_string())),
            QueryFormat::Spectrum if first.len() == 1 => Ok(Value::Array(
                rows.into_iter()
                    .filter_map(|r| r.into_iter().next())
                    .collect(),
            )),
            QueryFormat::Spectrum => Ok(Value::Array(first.clone())),
            QueryFormat::Image => Ok(Value::Array(rows.into_iter().map(Value::Array).collect())),
        }
    }
}

/// Connection parameters of a database source.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DbParams {
    #[serde(rename = "@dbtype", default)]
    pub dbtype: String,
    #[serde(rename = "@dbname")]
    pub dbname: Option<String>,
    #[serde(rename = "@hostname")]
    pub hostname: Option<String>,
    #[serde(rename = "@port")]
    pub port: Option<String>,
    #[serde(rename = "@user")]
    pub user: Option<String>,
    #[serde(rename = "@passwd")]
    pub passwd: Option<String>,
    #[serde(rename = "@mode")]
    pub mode: Option<String>,
}

impl fmt::Debug for DbParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbParams")
            .field("dbtype", &self.dbtype)
            .field("dbname", &self.dbname)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "***"))
            .field("mode", &self.mode)
            .finish()
    }
}

/// Driver for one database type.
pub trait DbConnector: Send + Sync {
    /// Run `query` and return the result rows.
    fn query(&self, params: &DbParams, query: &str) -> Result<Vec<Vec<Value>>, WriterError>;
}

#[derive(Debug, Default, Deserialize)]
struct QueryTag {
    #[serde(rename = "@format")]
    format: Option<String>,
    #[serde(rename = "$text")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DbMarkup {
    database: Option<DbParams>,
    query: Option<QueryTag>,
}

/// `DB` source: runs a query through the connector registered for its type.
#[derive(Clone)]
pub struct DbSource {
    pool: DataSourcePool,
    params: DbParams,
    format: QueryFormat,
    query: String,
}

impl fmt::Debug for DbSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSource")
            .field("params", &self.params)
            .field("format", &self.format)
            .field("query", &self.query)
            .finish()
    }
}

impl DbSource {
    pub fn new(pool: DataSourcePool) -> Self {
        Self {
            pool,
            params: DbParams::default(),
            format: QueryFormat::default(),
            query: String::new(),
        }
    }

    pub fn params(&self) -> &DbParams {
        &self.params
    }

    pub fn format(&self) -> QueryFormat {
        self.format
    }

    fn connector(&self) -> Result<Arc<dyn DbConnector>, WriterError> {
        self.pool.database(&self.params.dbtype).ok_or_else(|| {
            WriterError::Unsupported(format!("no connector for database type '{}'", self.params.dbtype))
        })
    }
}

impl DataSource for DbSource {
    fn setup(&mut self, xml: &str) -> Result<(), WriterError> {
        let markup: DbMarkup = quick_xml::de::from_str(xml)?;
        let query = markup
            .query
            .ok_or_else(|| WriterError::Setup("DB source without a query".to_string()))?;
        self.query = query
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WriterError::Setup("DB source with an empty query".to_string()))?;
        self.format = match query.format {
            Some(f) => QueryFormat::from_str(&f)
                .ok_or_else(|| WriterError::Setup(format!("unknown query format '{}'", f)))?,
            None => QueryFormat::Scalar,
        };
        let params = markup
            .database
            .ok_or_else(|| WriterError::Setup("DB source without database parameters".to_string()))?;
        if params.dbtype.trim().is_empty() {
            return Err(WriterError::Setup("DB source without a dbtype".to_string()));
        }
        self.params = params;
        Ok(())
    }

    fn get_data(&self) -> Result<Option<DataHolder>, WriterError> {
        let rows = self.connector()?.query(&self.params, &self.query)?;
        let value = self.format.reduce(rows)?;
        DataHolder::from_json(&value).map(Some)
    }

    fn is_valid(&self) -> bool {
        self.pool.database(&self.params.dbtype).is_some()
    }
}
