//! The growing-field writer.

use std::sync::Arc;

use tracing::debug;

use super::layout::{backend_axis, clamp_growth_axis, slab_for};
use super::{Element, write_failure_marker};
use crate::backend::{FieldHandle, Selection};
use crate::config::RecordContext;
use crate::error::{RunFailure, Stage, WriterError};
use crate::source::DataSource;
use crate::types::{ElementType, NdArray};

/// Bring a value to `rank` axes, dropping or adding axes of extent one.
pub(crate) fn fit_rank(value: NdArray, rank: usize) -> Result<NdArray, WriterError> {
    if value.ndim() == rank {
        return Ok(value);
    }
    let original = value.shape().to_vec();
    let squeezed = value.squeeze();
    if squeezed.ndim() == rank {
        return Ok(squeezed);
    }
    if squeezed.ndim() < rank {
        let mut shape = vec![1; rank - squeezed.ndim()];
        shape.extend_from_slice(squeezed.shape());
        return squeezed.reshape(shape);
    }
    Err(WriterError::Cast(format!(
        "value of shape {:?} does not fit {} axes",
        original, rank
    )))
}

/// Writes a data-source value into a backend field at every run.
///
/// A growing field appends one slab along its growth axis per run; any other
/// field is overwritten as a whole.
pub struct FieldElement {
    path: String,
    handle: Arc<dyn FieldHandle>,
    source: Box<dyn DataSource>,
    dtype: ElementType,
    rank: usize,
    /// 1-based growth axis of a growing field
    growth_axis: Option<usize>,
    can_fail: bool,
    grew: bool,
    error: Option<RunFailure>,
}

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldElement")
            .field("path", &self.path)
            .field("dtype", &self.dtype)
            .field("rank", &self.rank)
            .field("growth_axis", &self.growth_axis)
            .field("can_fail", &self.can_fail)
            .finish()
    }
}

impl FieldElement {
    pub fn new(
        path: impl Into<String>,
        handle: Arc<dyn FieldHandle>,
        source: Box<dyn DataSource>,
        dtype: ElementType,
        rank: usize,
    ) -> Self {
        Self {
            path: path.into(),
            handle,
            source,
            dtype,
            rank,
            growth_axis: None,
            can_fail: false,
            grew: false,
            error: None,
        }
    }

    /// Make the field grow along the 1-based `axis`.
    pub fn growing(mut self, axis: usize) -> Self {
        self.growth_axis = Some(clamp_growth_axis(axis, self.rank));
        self
    }

    pub fn with_can_fail(mut self, can_fail: bool) -> Self {
        self.can_fail = can_fail;
        self
    }

    pub fn growth_axis(&self) -> Option<usize> {
        self.growth_axis
    }

    fn fail(&self, stage: Stage, error: WriterError) -> RunFailure {
        RunFailure::new(stage, self.path.clone(), error)
    }

    fn fetch(&mut self, context: &RecordContext) -> Result<NdArray, RunFailure> {
        self.source.set_scope(context);
        let holder = self
            .source
            .get_data()
            .map_err(|e| self.fail(Stage::Fetch, e))?
            .ok_or_else(|| self.fail(Stage::Fetch, WriterError::Source("no value available".to_string())))?;
        holder.cast(self.dtype).map_err(|e| self.fail(Stage::Cast, e))
    }

    /// Extend the growth axis by one and return the new slot index.
    fn grow(&mut self, axis: usize) -> Result<usize, WriterError> {
        let index = self.handle.shape().get(axis - 1).copied().unwrap_or(0);
        self.handle.grow(axis - 1, 1)?;
        self.grew = true;
        Ok(index)
    }

    fn write_growing(&mut self, axis: usize, value: NdArray) -> Result<(), WriterError> {
        let value = fit_rank(value, self.rank)?;
        let index = if self.grew {
            self.handle.shape()[axis - 1].saturating_sub(1)
        } else {
            self.grow(axis)?
        };
        let shape = self.handle.shape();
        for (k, &extent) in value.shape().iter().enumerate() {
            let b = backend_axis(axis, k);
            if extent > shape[b] {
                debug!(field = %self.path, axis = b, from = shape[b], to = extent, "extending field");
                self.handle.grow(b, extent - shape[b])?;
            }
        }
        let selection = slab_for(axis, value.shape(), index);
        self.handle.write_slice(&selection, &value)?;
        Ok(())
    }

    fn write_whole(&self, value: NdArray) -> Result<(), WriterError> {
        let shape = self.handle.shape();
        let value = fit_rank(value, shape.len())?;
        if value.shape() == shape.as_slice() {
            self.handle.write(&value)?;
        } else if value.shape().iter().zip(&shape).all(|(v, s)| v <= s) {
            let selection: Vec<Selection> = value.shape().iter().map(|&d| Selection::Range(0, d)).collect();
            self.handle.write_slice(&selection, &value)?;
        } else {
            return Err(WriterError::shape(
                self.path.clone(),
                format!("value of shape {:?} exceeds field shape {:?}", value.shape(), shape),
            ));
        }
        Ok(())
    }

    fn try_run(&mut self, context: &RecordContext) -> Result<(), RunFailure> {
        let value = self.fetch(context)?;
        let result = match self.growth_axis {
            Some(axis) => self.write_growing(axis, value),
            None => self.write_whole(value),
        };
        result.map_err(|e| self.fail(Stage::Write, e))
    }
}

impl Element for FieldElement {
    fn name(&self) -> &str {
        &self.path
    }

    fn run(&mut self, context: &RecordContext) {
        self.grew = false;
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
        let sentinel = self.dtype.sentinel();
        match self.growth_axis {
            Some(axis) => {
                let index = if self.grew {
                    self.handle.shape()[axis - 1].saturating_sub(1)
                } else {
                    self.grow(axis)?
                };
                let mut data_shape = self.handle.shape();
                data_shape.remove(axis - 1);
                let slab = NdArray::filled(data_shape.clone(), sentinel);
                self.handle.write_slice(&slab_for(axis, &data_shape, index), &slab)?;
            }
            None => {
                let shape = self.handle.shape();
                self.handle.write(&NdArray::filled(shape, sentinel))?;
            }
        }
        write_failure_marker(self.handle.attributes().as_ref(), failure)?;
        Ok(())
    }

    fn close(&mut self) {
        self.handle.close();
    }
}
