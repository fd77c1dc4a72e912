//! Streaming template parser.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use super::{Node, NodeId, TagKind, Tree};
use crate::backend::{GroupHandle, write_string_attribute};
use crate::config::{RecordContext, WriterConfig};
use crate::error::WriterError;
use crate::markup::{RawCapture, attributes, reference_text, tag_name, unescape_text};
use crate::scheduler::Scheduler;
use crate::source::DataSourcePool;

/// Everything node construction needs from the engine.
pub struct BuildContext<'a> {
    pub config: &'a WriterConfig,
    pub pool: &'a DataSourcePool,
    /// Static scope, used for values read while the tree is built
    pub context: RecordContext,
    /// Group the template's top level is written into
    pub root: Arc<dyn GroupHandle>,
}

struct Capture {
    raw: RawCapture,
    kind: TagKind,
    attrs: BTreeMap<String, String>,
    parent: Option<NodeId>,
}

/// An unknown tag being skipped, with the nesting depth inside it.
struct Skipped {
    tag: String,
    depth: usize,
}

/// Builds a [`Tree`] from template events and schedules its elements.
pub struct TreeBuilder<'a, 's> {
    pub(super) ctx: BuildContext<'a>,
    pub(super) tree: Tree,
    pub(super) scheduler: &'s mut Scheduler,
    stack: Vec<NodeId>,
    capture: Option<Capture>,
    skipped: Option<Skipped>,
}

impl<'a, 's> TreeBuilder<'a, 's> {
    pub fn new(ctx: BuildContext<'a>, scheduler: &'s mut Scheduler) -> Self {
        Self {
            ctx,
            tree: Tree::new(),
            scheduler,
            stack: Vec::new(),
            capture: None,
            skipped: None,
        }
    }

    fn top(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    /// Feed one event. Returns `false` at the end of the stream.
    pub fn handle(&mut self, event: Event<'_>) -> Result<bool, WriterError> {
        if let Some(capture) = self.capture.as_mut() {
            if capture.raw.push(&event)? {
                if let Some(done) = self.capture.take() {
                    self.store_raw(done)?;
                }
            }
            return Ok(!matches!(event, Event::Eof));
        }
        if let Some(skipped) = self.skipped.as_mut() {
            match event {
                Event::Start(_) => skipped.depth += 1,
                Event::End(_) => {
                    skipped.depth -= 1;
                    if skipped.depth == 0 {
                        debug!(tag = %skipped.tag, "leaving unsupported tag");
                        self.skipped = None;
                    }
                }
                _ => {}
            }
            return Ok(!matches!(event, Event::Eof));
        }
        match event {
            Event::Start(e) => self.open(&e, false)?,
            Event::Empty(e) => self.open(&e, true)?,
            Event::End(_) => self.close()?,
            Event::Text(t) => {
                let text = unescape_text(&t)?;
                self.append_text(&text);
            }
            Event::GeneralRef(r) => {
                let text = reference_text(&r)?;
                self.append_text(&text);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                self.append_text(&text);
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        Ok(true)
    }

    fn append_text(&mut self, text: &str) {
        if let Some(top) = self.top() {
            self.tree.node_mut(top).content.push_str(text);
        }
    }

    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), WriterError> {
        let name = tag_name(e)?;
        let Some(kind) = TagKind::from_name(&name) else {
            if !self.ctx.config.skip_unsupported_tags {
                return Err(WriterError::Unsupported(format!("template tag <{}>", name)));
            }
            warn!(tag = %name, "skipping unsupported tag");
            if !empty {
                self.skipped = Some(Skipped { tag: name, depth: 1 });
            }
            return Ok(());
        };
        let attrs = attributes(e)?;
        if kind.is_raw() {
            let capture = Capture {
                raw: RawCapture::open(e, empty)?,
                kind,
                attrs,
                parent: self.top(),
            };
            if empty {
                self.store_raw(capture)?;
            } else {
                self.capture = Some(capture);
            }
            return Ok(());
        }
        let id = self.tree.push(Node::new(kind, self.top(), attrs));
        self.stack.push(id);
        self.open_node(id)?;
        if empty {
            self.close()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), WriterError> {
        let id = self
            .stack
            .pop()
            .ok_or_else(|| WriterError::Setup("closing tag without an open node".to_string()))?;
        self.store(id)
    }

    /// Create the backend object of nodes that need one before their children.
    fn open_node(&mut self, id: NodeId) -> Result<(), WriterError> {
        match self.tree.node(id).kind {
            TagKind::Definition => {
                let root = self.ctx.root.clone();
                let node = self.tree.node_mut(id);
                node.path = Some(root.path());
                node.group = Some(root);
            }
            TagKind::Group => self.open_group(id)?,
            _ => {}
        }
        Ok(())
    }

    fn open_group(&mut self, id: NodeId) -> Result<(), WriterError> {
        let parent = match self.tree.parent_group(id) {
            Some((_, g)) => g,
            None if self.tree.node(id).parent.is_none() => self.ctx.root.clone(),
            None => {
                return Err(WriterError::Setup(format!(
                    "group '{}' outside of any group",
                    self.tree.node(id).name
                )));
            }
        };
        let node = self.tree.node(id);
        if let Some(p) = node.parent {
            let parent_kind = self.tree.node(p).kind;
            if !matches!(parent_kind, TagKind::Group | TagKind::Definition) {
                return Err(WriterError::Setup(format!("group inside a <{}>", parent_kind)));
            }
        }
        let nx_class = node.type_name().unwrap_or_default().to_string();
        let name = if node.name.is_empty() {
            nx_class.trim_start_matches("NX").to_string()
        } else {
            node.name.clone()
        };
        if name.is_empty() {
            return Err(WriterError::Setup("group without a name or type".to_string()));
        }
        let handle = parent.create_group(&name, &nx_class)?;
        let attrs = handle.attributes();
        for (key, value) in &node.attrs {
            if key != "name" && key != "type" {
                write_string_attribute(attrs.as_ref(), key, value)?;
            }
        }
        debug!(group = %handle.path(), class = %nx_class, "created group");
        let node = self.tree.node_mut(id);
        node.name = name;
        node.path = Some(handle.path());
        node.group = Some(handle);
        Ok(())
    }

    /// Consume the builder, checking every node was closed.
    pub fn finish(self) -> Result<Tree, WriterError> {
        if self.capture.is_some() {
            return Err(WriterError::Setup("template ended inside a raw-captured tag".to_string()));
        }
        if let Some(skipped) = &self.skipped {
            return Err(WriterError::Setup(format!(
                "template ended inside <{}>",
                skipped.tag
            )));
        }
        if let Some(id) = self.top() {
            return Err(WriterError::Setup(format!(
                "template ended with <{}> still open",
                self.tree.node(id).kind
            )));
        }
        Ok(self.tree)
    }

    fn store_raw(&mut self, capture: Capture) -> Result<(), WriterError> {
        let Capture {
            raw,
            kind,
            attrs,
            parent,
        } = capture;
        self.store_captured(kind, attrs, parent, raw.finish())
    }
}

/// Build a tree from a template string.
pub fn parse_str(
    xml: &str,
    ctx: BuildContext<'_>,
    scheduler: &mut Scheduler,
) -> Result<Tree, WriterError> {
    let mut reader = Reader::from_str(xml);
    let mut builder = TreeBuilder::new(ctx, scheduler);
    while builder.handle(reader.read_event()?)? {}
    builder.finish()
}

/// Build a tree from a buffered template stream.
pub fn parse_reader<R: BufRead>(
    input: R,
    ctx: BuildContext<'_>,
    scheduler: &mut Scheduler,
) -> Result<Tree, WriterError> {
    let mut reader = Reader::from_reader(input);
    let mut builder = TreeBuilder::new(ctx, scheduler);
    let mut buf = Vec::new();
    loop {
        let more = builder.handle(reader.read_event_into(&mut buf)?)?;
        buf.clear();
        if !more {
            break;
        }
    }
    builder.finish()
}
