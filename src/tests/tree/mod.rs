//! Template tree tests.

mod link_tests;
mod strategy_tests;

use crate::backend::{FileBackend, FileHandle, MemoryBackend};
use crate::config::{RecordContext, WriterConfig};
use crate::scheduler::Scheduler;
use crate::source::default_pool;
use crate::tests::support::FILE;
use crate::tree::{BuildContext, Tree, parse_str};
use crate::WriterError;

/// Build `xml` into a fresh file of `backend`.
fn parse(backend: &MemoryBackend, xml: &str, config: &WriterConfig) -> Result<(Tree, Scheduler), WriterError> {
    let root = backend.create_file(FILE, true)?.root()?;
    let pool = default_pool();
    let mut scheduler = Scheduler::new(config.workers);
    let ctx = BuildContext {
        config,
        pool: &pool,
        context: RecordContext::default(),
        root,
    };
    let tree = parse_str(xml, ctx, &mut scheduler)?;
    Ok((tree, scheduler))
}
