//! Attributes whose value comes from a data source.

use std::sync::Arc;

use super::field::fit_rank;
use super::{Element, write_failure_marker};
use crate::backend::AttributeSet;
use crate::config::RecordContext;
use crate::error::{RunFailure, Stage, WriterError};
use crate::source::DataSource;
use crate::types::{ElementType, NdArray};

/// Writes a data-source value into an attribute of a group or field.
///
/// Attributes never grow: every run replaces the stored value.
pub struct AttributeElement {
    path: String,
    name: String,
    attrs: Arc<dyn AttributeSet>,
    source: Box<dyn DataSource>,
    dtype: ElementType,
    rank: Option<usize>,
    /// Shape of the last value written
    last_shape: Option<Vec<usize>>,
    can_fail: bool,
    error: Option<RunFailure>,
}

impl AttributeElement {
    pub fn new(
        owner: &str,
        name: impl Into<String>,
        attrs: Arc<dyn AttributeSet>,
        source: Box<dyn DataSource>,
        dtype: ElementType,
    ) -> Self {
        let name = name.into();
        Self {
            path: format!("{}@{}", owner, name),
            name,
            attrs,
            source,
            dtype,
            rank: None,
            last_shape: None,
            can_fail: false,
            error: None,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_can_fail(mut self, can_fail: bool) -> Self {
        self.can_fail = can_fail;
        self
    }

    fn try_run(&mut self, context: &RecordContext) -> Result<(), RunFailure> {
        let fail = |stage: Stage, e: WriterError| RunFailure::new(stage, self.path.clone(), e);
        self.source.set_scope(context);
        let holder = self
            .source
            .get_data()
            .map_err(|e| fail(Stage::Fetch, e))?
            .ok_or_else(|| fail(Stage::Fetch, WriterError::Source("no value available".to_string())))?;
        let mut value = holder.cast(self.dtype).map_err(|e| fail(Stage::Cast, e))?;
        if let Some(rank) = self.rank {
            value = fit_rank(value, rank).map_err(|e| fail(Stage::Cast, e))?;
        }
        self.attrs
            .create(&self.name, self.dtype, value.shape(), true)
            .and_then(|h| h.write(&value))
            .map_err(|e| fail(Stage::Write, e.into()))?;
        self.last_shape = Some(value.shape().to_vec());
        Ok(())
    }

    /// Shape a sentinel fill takes: the last written one, else one element
    /// per declared axis.
    fn fill_shape(&self) -> Vec<usize> {
        self.last_shape
            .clone()
            .unwrap_or_else(|| vec![1; self.rank.unwrap_or(0)])
    }
}

impl Element for AttributeElement {
    fn name(&self) -> &str {
        &self.path
    }

    fn run(&mut self, context: &RecordContext) {
        self.error = self.try_run(context).err();
    }

    fn error(&self) -> Option<&RunFailure> {
        self.error.as_ref()
    }

    fn take_error(&mut self) -> Option<RunFailure> {
        self.error.take()
    }

    fn can_fail(&self) -> bool {
        self.can_fail
    }

    fn mark_failed(&mut self, failure: &RunFailure) -> Result<(), WriterError> {
        let shape = self.fill_shape();
        let handle = self.attrs.create(&self.name, self.dtype, &shape, true)?;
        handle.write(&NdArray::filled(shape, self.dtype.sentinel()))?;
        write_failure_marker(self.attrs.as_ref(), failure)?;
        Ok(())
    }

    fn close(&mut self) {}
}
