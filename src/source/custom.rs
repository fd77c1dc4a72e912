//! Closure-based data sources registered at run time.

use std::sync::Arc;

use super::DataSource;
use crate::config::RecordContext;
use crate::error::WriterError;
use crate::holder::DataHolder;

/// Arguments of a custom `get_data` call.
#[derive(Debug, Clone, Copy)]
pub struct SourceCall<'a> {
    /// Raw `<datasource>` markup the source was set up with
    pub config: &'a str,
    /// Value-scopes of the record being written
    pub scope: &'a RecordContext,
}

pub type SetupFn = Arc<dyn Fn(&str) -> Result<(), WriterError> + Send + Sync>;
pub type GetDataFn = Arc<dyn Fn(&SourceCall<'_>) -> Result<Option<DataHolder>, WriterError> + Send + Sync>;
pub type IsValidFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// A user-defined data source assembled from closures.
///
/// # Example
///
/// ```rust,ignore
/// use nexwrite::source::{CustomDataSource, DataSourcePool};
///
/// let mut pool = DataSourcePool::new();
/// let accepted = pool.register_custom(
///     CustomDataSource::new("CONST")
///         .with_setup(|_xml| Ok(()))
///         .with_get_data(|_call| Ok(Some(DataHolder::from_json(&serde_json::json!(42))?)))
///         .with_is_valid(|| true),
/// );
/// assert!(accepted);
/// ```
#[derive(Clone)]
pub struct CustomDataSource {
    pub name: String,
    pub setup_fn: Option<SetupFn>,
    pub get_data_fn: Option<GetDataFn>,
    pub is_valid_fn: Option<IsValidFn>,
    config: String,
    scope: RecordContext,
}

impl std::fmt::Debug for CustomDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomDataSource")
            .field("name", &self.name)
            .field("has_setup", &self.setup_fn.is_some())
            .field("has_get_data", &self.get_data_fn.is_some())
            .field("has_is_valid", &self.is_valid_fn.is_some())
            .finish()
    }
}

impl CustomDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup_fn: None,
            get_data_fn: None,
            is_valid_fn: None,
            config: String::new(),
            scope: RecordContext::default(),
        }
    }

    pub fn with_setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), WriterError> + Send + Sync + 'static,
    {
        self.setup_fn = Some(Arc::new(f));
        self
    }

    pub fn with_get_data<F>(mut self, f: F) -> Self
    where
        F: Fn(&SourceCall<'_>) -> Result<Option<DataHolder>, WriterError> + Send + Sync + 'static,
    {
        self.get_data_fn = Some(Arc::new(f));
        self
    }

    pub fn with_is_valid<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.is_valid_fn = Some(Arc::new(f));
        self
    }

    /// Whether every capability a source must offer is present.
    pub fn is_complete(&self) -> bool {
        self.setup_fn.is_some() && self.get_data_fn.is_some() && self.is_valid_fn.is_some()
    }

    fn missing(&self, what: &str) -> WriterError {
        WriterError::Unsupported(format!("custom source '{}' has no {}", self.name, what))
    }
}

impl DataSource for CustomDataSource {
    fn setup(&mut self, xml: &str) -> Result<(), WriterError> {
        let setup = self.setup_fn.as_ref().ok_or_else(|| self.missing("setup"))?;
        setup(xml)?;
        self.config = xml.to_string();
        Ok(())
    }

    fn get_data(&self) -> Result<Option<DataHolder>, WriterError> {
        let get_data = self.get_data_fn.as_ref().ok_or_else(|| self.missing("get_data"))?;
        get_data(&SourceCall {
            config: &self.config,
            scope: &self.scope,
        })
    }

    fn is_valid(&self) -> bool {
        self.is_valid_fn.as_ref().map(|f| f()).unwrap_or(false)
    }

    fn set_scope(&mut self, context: &RecordContext) {
        self.scope = context.clone();
    }
}
