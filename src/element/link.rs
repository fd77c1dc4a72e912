//! Links whose target path comes from a data source.

use std::sync::Arc;

use tracing::warn;

use super::Element;
use crate::backend::GroupHandle;
use crate::config::RecordContext;
use crate::error::{RunFailure, Stage, WriterError};
use crate::source::DataSource;

/// Creates a link once its source delivers the target path.
pub struct LinkElement {
    path: String,
    name: String,
    parent: Arc<dyn GroupHandle>,
    source: Box<dyn DataSource>,
    can_fail: bool,
    error: Option<RunFailure>,
}

impl LinkElement {
    pub fn new(
        parent: Arc<dyn GroupHandle>,
        name: impl Into<String>,
        source: Box<dyn DataSource>,
    ) -> Self {
        let name = name.into();
        Self {
            path: format!("{}/{}", parent.path().trim_end_matches('/'), name),
            name,
            parent,
            source,
            can_fail: false,
            error: None,
        }
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
            .ok_or_else(|| fail(Stage::Fetch, WriterError::Source("no link target available".to_string())))?;
        let target = holder
            .value
            .first()
            .and_then(|s| s.as_str().map(str::to_string))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| fail(Stage::Cast, WriterError::Cast("link target is not a string".to_string())))?;
        if self.parent.exists(&self.name) {
            return Ok(());
        }
        self.parent
            .create_link(&self.name, target.trim())
            .map_err(|e| fail(Stage::Write, e.into()))
    }
}

impl Element for LinkElement {
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

    /// Links have no slot to fill; the failure is only logged.
    fn mark_failed(&mut self, failure: &RunFailure) -> Result<(), WriterError> {
        warn!(link = %self.path, error = %failure, "link left unresolved");
        Ok(())
    }

    fn close(&mut self) {}
}
