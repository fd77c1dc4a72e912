//! Store steps run when a node's closing tag is reached.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::builder::TreeBuilder;
use super::{Mode, NodeId, PendingAttribute, Strategy, TagKind};
use crate::backend::{AttributeSet, FieldSpec, GroupHandle, write_string_attribute};
use crate::element::layout::grown_shape;
use crate::element::{AttributeElement, FieldElement, LinkElement};
use crate::error::WriterError;
use crate::markup::root_text;
use crate::scheduler::Phase;
use crate::source::DataSource;
use crate::types::{ElementType, NdArray, Scalar, parse_text};

const DEFAULT_TYPE: &str = "NX_CHAR";

fn element_type(type_name: Option<&str>) -> Result<ElementType, WriterError> {
    let name = type_name.unwrap_or(DEFAULT_TYPE);
    ElementType::parse(name).ok_or_else(|| WriterError::Setup(format!("unknown element type '{}'", name)))
}

fn join_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

fn required_name(attrs: &BTreeMap<String, String>, kind: TagKind) -> Result<String, WriterError> {
    attrs
        .get("name")
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| WriterError::Setup(format!("<{}> without a name", kind)))
}

/// Inline text parsed into `shape`.
fn inline_value(content: &str, shape: &[usize], dtype: ElementType) -> Result<NdArray, WriterError> {
    let value = parse_text(content, shape.len(), dtype)?;
    if value.shape() == shape {
        return Ok(value);
    }
    value.reshape(shape.to_vec())
}

impl TreeBuilder<'_, '_> {
    pub(super) fn store(&mut self, id: NodeId) -> Result<(), WriterError> {
        match self.tree.node(id).kind {
            TagKind::Definition | TagKind::Group => self.store_group(id),
            TagKind::Field => self.store_field(id),
            TagKind::Attribute => self.store_attribute(id),
            TagKind::Link => self.store_link(id),
            TagKind::Strategy => self.store_strategy(id),
            TagKind::Dimensions => self.store_dimensions(id),
            TagKind::Dim => self.store_dim(id),
            TagKind::Symbol => self.store_symbol(id),
            TagKind::DataSource | TagKind::Doc => Ok(()),
        }
    }

    /// Store a `datasource` or `doc` sub-tree captured as raw markup.
    pub(super) fn store_captured(
        &mut self,
        kind: TagKind,
        attrs: BTreeMap<String, String>,
        parent: Option<NodeId>,
        raw: String,
    ) -> Result<(), WriterError> {
        let Some(parent) = parent else {
            debug!(tag = %kind, "ignoring top-level captured tag");
            return Ok(());
        };
        match kind {
            TagKind::Doc => {
                let text = root_text(&raw)?.trim().to_string();
                if text.is_empty() {
                    return Ok(());
                }
                let node = self.tree.node_mut(parent);
                match &mut node.doc {
                    Some(doc) => {
                        doc.push('\n');
                        doc.push_str(&text);
                    }
                    None => node.doc = Some(text),
                }
            }
            TagKind::DataSource => {
                let tag = attrs
                    .get("type")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| WriterError::Setup("<datasource> without a type".to_string()))?;
                let source = match self.ctx.pool.build(&tag, &raw) {
                    Ok(source) => source,
                    Err(WriterError::Unsupported(what)) if self.ctx.config.skip_unsupported_tags => {
                        warn!(source = %tag, %what, "skipping unsupported data source");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                debug!(source = %tag, "bound data source");
                self.tree.node_mut(parent).source = Some(source);
            }
            _ => {}
        }
        Ok(())
    }

    /// Close a group or the definition root: doc, then pending attributes.
    fn store_group(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node_mut(id);
        let Some(handle) = node.group.clone() else {
            return Ok(());
        };
        let doc = node.doc.take();
        let pending = std::mem::take(&mut node.pending);
        let path = node.path.clone().unwrap_or_else(|| handle.path());
        let attrs = handle.attributes();
        if let Some(doc) = doc {
            write_string_attribute(attrs.as_ref(), "doc", &doc)?;
        }
        self.apply_pending(&path, attrs, pending)
    }

    fn store_field(&mut self, id: NodeId) -> Result<(), WriterError> {
        let (_, parent) = self
            .tree
            .parent_group(id)
            .ok_or_else(|| WriterError::Setup("field outside of any group".to_string()))?;
        let node = self.tree.node_mut(id);
        let name = required_name(&node.attrs, TagKind::Field)?;
        let dtype = element_type(node.type_name())?;
        let attrs = node.attrs.clone();
        let content = std::mem::take(&mut node.content);
        let strategy = node.strategy.take();
        let mut source = node.source.take();
        let rank_hint = node.rank;
        let dims = std::mem::take(&mut node.dims);
        let doc = node.doc.take();
        let pending = std::mem::take(&mut node.pending);
        let path = join_path(&parent.path(), &name);

        let phase = strategy.as_ref().and_then(Strategy::phase);
        let scheduled = source.is_some() && phase.is_some();
        let growing = scheduled && phase == Some(Phase::Step);
        let shape = self.base_shape(&path, rank_hint, &dims, source.as_deref_mut(), &content, dtype, growing)?;
        let rank = shape.len();
        let growth_axis = strategy.as_ref().and_then(|s| s.grows).unwrap_or(1);
        let backend_shape = if growing {
            grown_shape(growth_axis, &shape)
        } else {
            shape.clone()
        };
        let default_compression = self.ctx.config.default_compression;
        let compression = strategy
            .as_ref()
            .map(|s| s.field_compression(default_compression))
            .unwrap_or(default_compression);
        let spec = FieldSpec::new(dtype, backend_shape).with_compression(compression);
        let handle = parent.create_field(&name, &spec)?;
        debug!(field = %path, dtype = %dtype, shape = ?spec.shape, "created field");

        let field_attrs = handle.attributes();
        for (key, value) in &attrs {
            if key != "name" && key != "type" {
                write_string_attribute(field_attrs.as_ref(), key, value)?;
            }
        }
        if let Some(doc) = doc {
            write_string_attribute(field_attrs.as_ref(), "doc", &doc)?;
        }
        if let Some(s) = strategy.as_ref().filter(|s| s.mode == Mode::Postrun) {
            write_string_attribute(field_attrs.as_ref(), "postrun", &s.content)?;
        }
        self.apply_pending(&path, field_attrs, pending)?;

        match (source, phase) {
            (Some(source), Some(phase)) => {
                if !source.is_valid() {
                    warn!(field = %path, "data source reports itself invalid");
                }
                let can_fail = self.can_fail(strategy.as_ref());
                let mut element = FieldElement::new(path.clone(), handle.clone(), source, dtype, rank)
                    .with_can_fail(can_fail);
                if growing {
                    element = element.growing(growth_axis);
                }
                let trigger = strategy.as_ref().and_then(|s| s.trigger.as_deref());
                self.scheduler.append(Box::new(element), phase, trigger);
            }
            (source, _) => {
                if source.is_some() && strategy.as_ref().map(|s| s.mode) != Some(Mode::Postrun) {
                    warn!(field = %path, "data source without a strategy is never read");
                }
                if !content.trim().is_empty() {
                    handle.write(&inline_value(&content, &shape, dtype)?)?;
                }
            }
        }

        let node = self.tree.node_mut(id);
        node.name = name;
        node.path = Some(path);
        node.field = Some(handle);
        node.strategy = strategy;
        Ok(())
    }

    /// Data shape of a field, without its growth axis.
    ///
    /// Explicit dimensions win, then the source's current value, then the
    /// inline text. The source is only asked when the dimensions are
    /// incomplete and it reports itself valid. Without a `dimensions` tag the
    /// source value decides, and a field with neither is a scalar. Growing fields start missing extents at
    /// zero and extend them on the first write.
    #[allow(clippy::too_many_arguments)]
    fn base_shape(
        &self,
        path: &str,
        rank_hint: Option<usize>,
        dims: &BTreeMap<usize, usize>,
        source: Option<&mut (dyn DataSource + 'static)>,
        content: &str,
        dtype: ElementType,
        growing: bool,
    ) -> Result<Vec<usize>, WriterError> {
        let probe = |source: Option<&mut (dyn DataSource + 'static)>| {
            let source = source.filter(|s| s.is_valid())?;
            source.set_scope(&self.ctx.context);
            source.get_data().ok().flatten().map(|h| h.extents().to_vec())
        };
        let rank = match rank_hint {
            None => return Ok(probe(source).unwrap_or_default()),
            Some(0) => return Ok(Vec::new()),
            Some(rank) => rank,
        };
        if (1..=rank).all(|i| dims.contains_key(&i)) {
            return Ok((1..=rank).map(|i| dims[&i]).collect());
        }
        if let Some(shape) = probe(source).filter(|s| s.len() == rank) {
            return Ok(shape);
        }
        if !content.trim().is_empty() {
            if let Ok(value) = parse_text(content, rank, dtype) {
                return Ok(value.shape().to_vec());
            }
        }
        if growing {
            return Ok((1..=rank).map(|i| dims.get(&i).copied().unwrap_or(0)).collect());
        }
        Err(WriterError::shape(
            path,
            format!("no dimensions, source value or inline text gives a rank-{} shape", rank),
        ))
    }

    fn can_fail(&self, strategy: Option<&Strategy>) -> bool {
        strategy
            .and_then(|s| s.can_fail)
            .unwrap_or(self.ctx.config.default_can_fail)
    }

    fn store_attribute(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node_mut(id);
        let pending = PendingAttribute {
            name: required_name(&node.attrs, TagKind::Attribute)?,
            dtype: element_type(node.type_name())?,
            content: std::mem::take(&mut node.content),
            rank: node.rank,
            source: node.source.take(),
            strategy: node.strategy.take(),
        };
        let parent = node
            .parent
            .ok_or_else(|| WriterError::Setup("attribute without an owner".to_string()))?;
        self.tree.node_mut(parent).pending.push(pending);
        Ok(())
    }

    /// Write inline attributes and schedule source-fed ones.
    fn apply_pending(
        &mut self,
        owner: &str,
        attrs: Arc<dyn AttributeSet>,
        pending: Vec<PendingAttribute>,
    ) -> Result<(), WriterError> {
        for attribute in pending {
            let phase = attribute.strategy.as_ref().and_then(Strategy::phase);
            match (attribute.source, phase) {
                (Some(source), Some(phase)) => {
                    let can_fail = self.can_fail(attribute.strategy.as_ref());
                    let mut element =
                        AttributeElement::new(owner, &attribute.name, attrs.clone(), source, attribute.dtype)
                            .with_can_fail(can_fail);
                    if let Some(rank) = attribute.rank {
                        element = element.with_rank(rank);
                    }
                    let trigger = attribute.strategy.as_ref().and_then(|s| s.trigger.as_deref());
                    self.scheduler.append(Box::new(element), phase, trigger);
                }
                _ if !attribute.content.trim().is_empty() || attribute.dtype == ElementType::String => {
                    let rank = attribute.rank.unwrap_or(0);
                    let value = if attribute.dtype == ElementType::String && rank == 0 {
                        NdArray::scalar(Scalar::Str(attribute.content.trim().to_string()))
                    } else {
                        parse_text(&attribute.content, rank, attribute.dtype)?
                    };
                    let handle = attrs.create(&attribute.name, attribute.dtype, value.shape(), true)?;
                    handle.write(&value)?;
                }
                _ => debug!(owner, attribute = %attribute.name, "attribute without a value"),
            }
        }
        Ok(())
    }

    fn store_link(&mut self, id: NodeId) -> Result<(), WriterError> {
        let (_, parent) = self
            .tree
            .parent_group(id)
            .ok_or_else(|| WriterError::Setup("link outside of any group".to_string()))?;
        let node = self.tree.node_mut(id);
        let name = required_name(&node.attrs, TagKind::Link)?;
        let target = node.attrs.get("target").cloned();
        let source = node.source.take();
        let strategy = node.strategy.take();
        node.path = Some(join_path(&parent.path(), &name));
        if let Some(source) = source {
            let phase = strategy.as_ref().and_then(Strategy::phase).unwrap_or(Phase::Final);
            let trigger = strategy.as_ref().and_then(|s| s.trigger.as_deref());
            let element = LinkElement::new(parent, name, source).with_can_fail(self.can_fail(strategy.as_ref()));
            self.scheduler.append(Box::new(element), phase, trigger);
            return Ok(());
        }
        let target = target
            .or_else(|| Some(node.content.trim().to_string()).filter(|t| !t.is_empty()))
            .ok_or_else(|| WriterError::Setup(format!("link '{}' without a target", name)))?;
        let resolved = self.tree.resolve_link_target(&target);
        debug!(link = %name, target = %resolved, "creating link");
        self.create_link(parent.as_ref(), &name, &resolved)
    }

    fn create_link(&self, parent: &dyn GroupHandle, name: &str, target: &str) -> Result<(), WriterError> {
        parent.create_link(name, target)?;
        Ok(())
    }

    fn store_strategy(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node(id);
        let strategy = Strategy::from_attrs(&node.attrs, &node.content)?;
        if let Some(parent) = node.parent {
            self.tree.node_mut(parent).strategy = Some(strategy);
        }
        Ok(())
    }

    fn store_dimensions(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node_mut(id);
        let rank = node
            .attrs
            .get("rank")
            .map(|r| {
                r.trim()
                    .parse::<usize>()
                    .map_err(|_| WriterError::Setup(format!("invalid dimensions rank '{}'", r)))
            })
            .transpose()?;
        let dims = std::mem::take(&mut node.dims);
        let rank = rank.unwrap_or_else(|| dims.keys().max().copied().unwrap_or(0));
        if let Some(parent) = node.parent {
            let parent = self.tree.node_mut(parent);
            parent.rank = Some(rank);
            parent.dims = dims;
        }
        Ok(())
    }

    fn store_dim(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node_mut(id);
        let index = node
            .attrs
            .get("index")
            .and_then(|i| i.trim().parse::<usize>().ok())
            .filter(|&i| i >= 1)
            .ok_or_else(|| WriterError::Setup("<dim> without a valid index".to_string()))?;
        let literal = node
            .attrs
            .get("value")
            .cloned()
            .or_else(|| Some(node.content.trim().to_string()).filter(|c| !c.is_empty()));
        let mut source = node.source.take();
        let parent = node.parent;

        let value = match literal {
            Some(text) => match text.parse::<usize>() {
                Ok(v) => v,
                Err(_) => self
                    .tree
                    .symbol(&text)
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .ok_or_else(|| WriterError::Setup(format!("invalid dim value '{}'", text)))?,
            },
            None => match source.as_deref_mut() {
                Some(source) => {
                    source.set_scope(&self.ctx.context);
                    let holder = source.get_data()?.ok_or_else(|| {
                        WriterError::Setup(format!("dim {} source has no value", index))
                    })?;
                    let first = holder
                        .cast(ElementType::UInt64)?
                        .first()
                        .cloned()
                        .ok_or_else(|| WriterError::Setup(format!("dim {} source is empty", index)))?;
                    match first {
                        Scalar::UInt(v) => v as usize,
                        other => {
                            return Err(WriterError::Setup(format!("invalid dim value '{}'", other)));
                        }
                    }
                }
                None => return Err(WriterError::Setup(format!("dim {} without a value", index))),
            },
        };
        if let Some(parent) = parent {
            self.tree.node_mut(parent).dims.insert(index, value);
        }
        Ok(())
    }

    fn store_symbol(&mut self, id: NodeId) -> Result<(), WriterError> {
        let node = self.tree.node(id);
        let name = required_name(&node.attrs, TagKind::Symbol)?;
        let value = node.content.trim().to_string();
        self.tree.add_symbol(name, value);
        Ok(())
    }
}
