//! Acquisition orchestrator: open file, open entry, record, close.

use std::collections::HashSet;
use std::io::BufRead;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{FileBackend, FileHandle, write_string_attribute};
use crate::config::{RecordContext, ValueScope, WriterConfig};
use crate::error::WriterError;
use crate::scheduler::{PoolKey, Scheduler};
use crate::source::{COUNTER_FINAL, COUNTER_INIT, DataSourcePool};
use crate::tree::{BuildContext, Tree, parse_reader, parse_str};

/// An open entry: its tree and the pools built from it.
struct Entry {
    tree: Tree,
    scheduler: Scheduler,
}

/// Drives one file through the acquisition lifecycle.
///
/// `open_file → open_entry(template) → record(scope)* → close_entry → close_file`.
/// A failed pool leaves the entry open; the caller decides whether to keep
/// recording or close it.
pub struct WriterEngine {
    config: WriterConfig,
    backend: Arc<dyn FileBackend>,
    pool: DataSourcePool,
    file: Option<Arc<dyn FileHandle>>,
    entry: Option<Entry>,
    global: Arc<ValueScope>,
    step: i64,
}

impl std::fmt::Debug for WriterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterEngine")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("file_open", &self.file.is_some())
            .field("entry_open", &self.entry.is_some())
            .field("step", &self.step)
            .finish()
    }
}

impl WriterEngine {
    pub fn new(config: WriterConfig, backend: Arc<dyn FileBackend>, pool: DataSourcePool) -> Self {
        Self {
            config,
            backend,
            pool,
            file: None,
            entry: None,
            global: Arc::new(ValueScope::default()),
            step: 0,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn pool(&self) -> &DataSourcePool {
        &self.pool
    }

    pub fn is_file_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_entry_open(&self) -> bool {
        self.entry.is_some()
    }

    /// Number of records written into the open entry.
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Tree of the open entry.
    pub fn tree(&self) -> Option<&Tree> {
        self.entry.as_ref().map(|e| &e.tree)
    }

    /// Pools of the open entry.
    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.entry.as_ref().map(|e| &e.scheduler)
    }

    pub fn global_scope(&self) -> &ValueScope {
        &self.global
    }

    /// Replace the static scope used by INIT, FINAL and as record fallback.
    pub fn set_global_scope(&mut self, scope: ValueScope) {
        self.global = Arc::new(scope);
    }

    pub fn set_global_json(&mut self, json: &str) -> Result<(), WriterError> {
        self.set_global_scope(ValueScope::from_json_str(json)?);
        Ok(())
    }

    /// Create the output file.
    pub fn open_file(&mut self, path: &str) -> Result<(), WriterError> {
        if self.file.is_some() {
            return Err(WriterError::State("a file is already open".to_string()));
        }
        let file = self.backend.create_file(path, self.config.overwrite)?;
        if self.config.file_attributes {
            let attrs = file.root()?.attributes();
            write_string_attribute(attrs.as_ref(), "file_name", path)?;
            write_string_attribute(attrs.as_ref(), "file_time", &chrono::Utc::now().to_rfc3339())?;
            write_string_attribute(attrs.as_ref(), "NX_class", "NXroot")?;
        }
        info!(file = %path, "opened file");
        self.file = Some(file);
        Ok(())
    }

    fn build_context(&self) -> Result<BuildContext<'_>, WriterError> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| WriterError::State("no file is open".to_string()))?;
        if self.entry.is_some() {
            return Err(WriterError::State("an entry is already open".to_string()));
        }
        Ok(BuildContext {
            config: &self.config,
            pool: &self.pool,
            context: RecordContext::global_only(self.global.clone()),
            root: file.root()?,
        })
    }

    /// Build the tree of `template` and run its INIT pool.
    pub fn open_entry(&mut self, template: &str) -> Result<(), WriterError> {
        let mut scheduler = Scheduler::new(self.config.workers);
        self.pool.set_counter(COUNTER_INIT);
        let tree = parse_str(template, self.build_context()?, &mut scheduler)?;
        self.start_entry(tree, scheduler)
    }

    /// Like [`WriterEngine::open_entry`], reading the template from a stream.
    pub fn open_entry_from_reader<R: BufRead>(&mut self, template: R) -> Result<(), WriterError> {
        let mut scheduler = Scheduler::new(self.config.workers);
        self.pool.set_counter(COUNTER_INIT);
        let tree = parse_reader(template, self.build_context()?, &mut scheduler)?;
        self.start_entry(tree, scheduler)
    }

    fn start_entry(&mut self, tree: Tree, scheduler: Scheduler) -> Result<(), WriterError> {
        info!(
            nodes = tree.len(),
            init = scheduler.len(&PoolKey::Init),
            step = scheduler.len(&PoolKey::Step),
            finals = scheduler.len(&PoolKey::Final),
            triggers = scheduler.triggers().len(),
            "opened entry"
        );
        self.step = 0;
        let context = RecordContext::global_only(self.global.clone());
        let entry = self.entry.insert(Entry { tree, scheduler });
        entry.scheduler.run_pool(&PoolKey::Init, &context)?;
        Ok(())
    }

    /// Write one record from its JSON value-scope.
    pub fn record(&mut self, json: &str) -> Result<(), WriterError> {
        self.record_scope(ValueScope::from_json_str(json)?)
    }

    /// Run STEP, then every trigger pool the scope names, in order. A name
    /// listed twice fires its pool once.
    pub fn record_scope(&mut self, local: ValueScope) -> Result<(), WriterError> {
        let entry = self
            .entry
            .as_mut()
            .ok_or_else(|| WriterError::State("no entry is open".to_string()))?;
        self.step += 1;
        self.pool.set_counter(self.step);
        let context = RecordContext::new(self.global.clone(), Arc::new(local));
        debug!(step = self.step, triggers = ?context.triggers(), "recording");
        entry.scheduler.run_pool(&PoolKey::Step, &context)?;
        let mut fired = HashSet::new();
        for trigger in context.triggers() {
            if !fired.insert(trigger.as_str()) {
                continue;
            }
            let key = PoolKey::trigger(trigger.as_str());
            if entry.scheduler.has_pool(&key) {
                entry.scheduler.run_pool(&key, &context)?;
            } else {
                debug!(trigger = %trigger, "no pool for trigger");
            }
        }
        Ok(())
    }

    /// Run the FINAL pool and release every handle of the entry.
    pub fn close_entry(&mut self) -> Result<(), WriterError> {
        let mut entry = self
            .entry
            .take()
            .ok_or_else(|| WriterError::State("no entry is open".to_string()))?;
        self.pool.set_counter(COUNTER_FINAL);
        let context = RecordContext::global_only(self.global.clone());
        let result = entry.scheduler.run_pool(&PoolKey::Final, &context);
        entry.scheduler.close_all();
        entry.tree.close();
        self.pool.clear_scratch();
        if let Some(file) = &self.file {
            file.flush()?;
        }
        info!(steps = self.step, "closed entry");
        result.map_err(WriterError::from)
    }

    /// Close the file, closing any entry still open first.
    pub fn close_file(&mut self) -> Result<(), WriterError> {
        let closing = if self.entry.is_some() {
            self.close_entry()
        } else {
            Ok(())
        };
        let file = self
            .file
            .take()
            .ok_or_else(|| WriterError::State("no file is open".to_string()))?;
        file.flush()?;
        file.close();
        info!(file = %file.name(), "closed file");
        closing
    }
}
