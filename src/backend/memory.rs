//! In-memory file-tree backend for testing and demos.
//!
//! Every file keeps its whole tree behind one mutex, so concurrent writes from
//! scheduler workers are serialized per file.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;

use super::{
    AttributeHandle, AttributeSet, BackendError, FieldHandle, FieldSpec, FileBackend,
    FileHandle, GroupHandle, Handle, Selection, selection_shape,
};
use crate::types::{ElementType, NdArray, Scalar};

const MAX_LINK_DEPTH: usize = 16;

/// In-memory backend holding any number of named files.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    files: Arc<Mutex<HashMap<String, Arc<FileState>>>>,
}

#[derive(Debug)]
struct FileState {
    path: String,
    tree: Mutex<MemTree>,
    open: AtomicBool,
    readonly: AtomicBool,
}

impl FileState {
    fn tree(&self) -> MutexGuard<'_, MemTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct MemTree {
    nodes: Vec<MemNode>,
}

#[derive(Debug)]
struct MemNode {
    name: String,
    parent: Option<usize>,
    kind: MemKind,
    attrs: BTreeMap<String, NdAttr>,
}

#[derive(Debug)]
struct NdAttr {
    dtype: ElementType,
    value: NdArray,
}

#[derive(Debug)]
enum MemKind {
    Group {
        nx_class: String,
        children: Vec<(String, usize)>,
    },
    Field {
        spec: FieldSpec,
        data: Vec<Scalar>,
    },
    Link {
        target: String,
    },
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        out[k] = out[k + 1] * shape[k + 1];
    }
    out
}

/// Flat offsets of every cell a selection addresses, in row-major order.
fn block_offsets(shape: &[usize], selection: &[Selection]) -> Result<Vec<usize>, BackendError> {
    if selection.len() != shape.len() {
        return Err(BackendError::Shape(format!(
            "selection of {} axes on a field of shape {:?}",
            selection.len(),
            shape
        )));
    }
    for (axis, (sel, &dim)) in selection.iter().zip(shape).enumerate() {
        if sel.start() > sel.end() || sel.end() > dim {
            return Err(BackendError::Shape(format!(
                "selection {:?} out of bounds on axis {} of extent {}",
                sel, axis, dim
            )));
        }
    }
    let ranges: Vec<(usize, usize)> = selection.iter().map(|s| (s.start(), s.end())).collect();
    let total: usize = ranges.iter().map(|(a, b)| b - a).product();
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return Ok(out);
    }
    let strides = strides(shape);
    let mut idx: Vec<usize> = ranges.iter().map(|r| r.0).collect();
    loop {
        out.push(idx.iter().zip(&strides).map(|(i, s)| i * s).sum());
        let mut axis = idx.len();
        loop {
            if axis == 0 {
                return Ok(out);
            }
            axis -= 1;
            idx[axis] += 1;
            if idx[axis] < ranges[axis].1 {
                break;
            }
            idx[axis] = ranges[axis].0;
        }
    }
}

fn full_selection(shape: &[usize]) -> Vec<Selection> {
    shape.iter().map(|&d| Selection::Range(0, d)).collect()
}

fn cast_for(dtype: ElementType, value: &NdArray) -> Result<NdArray, BackendError> {
    value
        .cast(dtype)
        .map_err(|e| BackendError::Type(e.to_string()))
}

impl MemTree {
    fn new() -> Self {
        Self {
            nodes: vec![MemNode {
                name: String::new(),
                parent: None,
                kind: MemKind::Group {
                    nx_class: String::new(),
                    children: Vec::new(),
                },
                attrs: BTreeMap::new(),
            }],
        }
    }

    fn path(&self, id: usize) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            let node = &self.nodes[i];
            if node.parent.is_some() {
                parts.push(node.name.as_str());
            }
            cur = node.parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    fn child(&self, parent: usize, name: &str) -> Option<usize> {
        match &self.nodes[parent].kind {
            MemKind::Group { children, .. } => children
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id),
            _ => None,
        }
    }

    fn add_child(&mut self, parent: usize, name: &str, kind: MemKind) -> Result<usize, BackendError> {
        if name.is_empty() || name.contains('/') {
            return Err(BackendError::Other(format!("invalid object name '{}'", name)));
        }
        if self.child(parent, name).is_some() {
            return Err(BackendError::AlreadyExists(format!(
                "{}/{}",
                self.path(parent).trim_end_matches('/'),
                name
            )));
        }
        if !matches!(self.nodes[parent].kind, MemKind::Group { .. }) {
            return Err(BackendError::Type(format!("{} is not a group", self.path(parent))));
        }
        let id = self.nodes.len();
        if let MemKind::Group { children, .. } = &mut self.nodes[parent].kind {
            children.push((name.to_string(), id));
        }
        self.nodes.push(MemNode {
            name: name.to_string(),
            parent: Some(parent),
            kind,
            attrs: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Resolve an absolute path, following links.
    fn resolve(&self, path: &str) -> Result<usize, BackendError> {
        self.resolve_depth(path, 0)
    }

    fn resolve_depth(&self, path: &str, depth: usize) -> Result<usize, BackendError> {
        if depth > MAX_LINK_DEPTH {
            return Err(BackendError::Other(format!("link loop at {}", path)));
        }
        let mut cur = 0;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            cur = self
                .child(cur, part)
                .ok_or_else(|| BackendError::NotFound(path.to_string()))?;
            if let MemKind::Link { target } = &self.nodes[cur].kind {
                cur = self.resolve_depth(target, depth + 1)?;
            }
        }
        Ok(cur)
    }

    fn field(&self, id: usize) -> Result<(&FieldSpec, &Vec<Scalar>), BackendError> {
        match &self.nodes[id].kind {
            MemKind::Field { spec, data } => Ok((spec, data)),
            _ => Err(BackendError::Type(format!("{} is not a field", self.path(id)))),
        }
    }

    fn field_mut(&mut self, id: usize) -> Result<(&mut FieldSpec, &mut Vec<Scalar>), BackendError> {
        let path = self.path(id);
        match &mut self.nodes[id].kind {
            MemKind::Field { spec, data } => Ok((spec, data)),
            _ => Err(BackendError::Type(format!("{} is not a field", path))),
        }
    }

    fn snapshot(&self, id: usize) -> serde_json::Value {
        let node = &self.nodes[id];
        let attrs: serde_json::Map<String, serde_json::Value> = node
            .attrs
            .iter()
            .map(|(k, a)| (k.clone(), a.value.to_json()))
            .collect();
        match &node.kind {
            MemKind::Group { nx_class, children } => {
                let kids: serde_json::Map<String, serde_json::Value> = children
                    .iter()
                    .map(|(n, c)| (n.clone(), self.snapshot(*c)))
                    .collect();
                json!({"type": "group", "class": nx_class, "attrs": attrs, "children": kids})
            }
            MemKind::Field { spec, data } => {
                let value = NdArray::new(spec.shape.clone(), data.clone())
                    .map(|a| a.to_json())
                    .unwrap_or(serde_json::Value::Null);
                json!({
                    "type": "field",
                    "dtype": spec.dtype.name(),
                    "shape": spec.shape,
                    "data": value,
                    "attrs": attrs,
                })
            }
            MemKind::Link { target } => json!({"type": "link", "target": target}),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, file: &str) -> Result<Arc<FileState>, BackendError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(file.to_string()))
    }

    /// Names of every file held by the backend.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Whole file content as a JSON tree.
    pub fn snapshot(&self, file: &str) -> Result<serde_json::Value, BackendError> {
        let state = self.state(file)?;
        let tree = state.tree();
        Ok(tree.snapshot(0))
    }

    pub fn exists(&self, file: &str, path: &str) -> bool {
        self.state(file)
            .map(|s| s.tree().resolve(path).is_ok())
            .unwrap_or(false)
    }

    /// Read a whole field by absolute path, following links.
    pub fn read_field(&self, file: &str, path: &str) -> Result<NdArray, BackendError> {
        let state = self.state(file)?;
        let tree = state.tree();
        let id = tree.resolve(path)?;
        let (spec, data) = tree.field(id)?;
        NdArray::new(spec.shape.clone(), data.clone()).map_err(|e| BackendError::Shape(e.to_string()))
    }

    /// Creation parameters and current shape of a field.
    pub fn field_spec(&self, file: &str, path: &str) -> Result<FieldSpec, BackendError> {
        let state = self.state(file)?;
        let tree = state.tree();
        let id = tree.resolve(path)?;
        tree.field(id).map(|(spec, _)| spec.clone())
    }

    pub fn read_attribute(&self, file: &str, path: &str, name: &str) -> Result<NdArray, BackendError> {
        let state = self.state(file)?;
        let tree = state.tree();
        let id = tree.resolve(path)?;
        tree.nodes[id]
            .attrs
            .get(name)
            .map(|a| a.value.clone())
            .ok_or_else(|| BackendError::NotFound(format!("{}@{}", path, name)))
    }

    /// Target of the link stored at `path` (without following it).
    pub fn link_target(&self, file: &str, path: &str) -> Result<String, BackendError> {
        let state = self.state(file)?;
        let tree = state.tree();
        let mut cur = 0;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            cur = tree
                .child(cur, part)
                .ok_or_else(|| BackendError::NotFound(path.to_string()))?;
        }
        match &tree.nodes[cur].kind {
            MemKind::Link { target } => Ok(target.clone()),
            _ => Err(BackendError::Type(format!("{} is not a link", path))),
        }
    }

    fn handle_for(state: Arc<FileState>) -> Arc<dyn FileHandle> {
        Arc::new(MemFile { state })
    }
}

impl FileBackend for MemoryBackend {
    fn create_file(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<Arc<dyn FileHandle>, BackendError> {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if files.contains_key(path) && !overwrite {
            return Err(BackendError::AlreadyExists(path.to_string()));
        }
        let state = Arc::new(FileState {
            path: path.to_string(),
            tree: Mutex::new(MemTree::new()),
            open: AtomicBool::new(true),
            readonly: AtomicBool::new(false),
        });
        files.insert(path.to_string(), state.clone());
        Ok(Self::handle_for(state))
    }

    fn open_file(&self, path: &str, readonly: bool) -> Result<Arc<dyn FileHandle>, BackendError> {
        let state = self.state(path)?;
        state.open.store(true, Ordering::SeqCst);
        state.readonly.store(readonly, Ordering::SeqCst);
        Ok(Self::handle_for(state))
    }
}

/// Handle onto an in-memory file.
#[derive(Debug)]
struct MemFile {
    state: Arc<FileState>,
}

impl Handle for MemFile {
    fn name(&self) -> String {
        self.state.path.clone()
    }

    fn path(&self) -> String {
        "/".to_string()
    }

    fn close(&self) {
        self.state.open.store(false, Ordering::SeqCst);
    }

    fn reopen(&self) -> Result<(), BackendError> {
        self.state.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }
}

impl FileHandle for MemFile {
    fn root(&self) -> Result<Arc<dyn GroupHandle>, BackendError> {
        if !self.is_valid() {
            return Err(BackendError::Invalid(self.state.path.clone()));
        }
        Ok(Arc::new(MemGroup(NodeRef::new(self.state.clone(), 0))))
    }

    fn flush(&self) -> Result<(), BackendError> {
        if !self.is_valid() {
            return Err(BackendError::Invalid(self.state.path.clone()));
        }
        Ok(())
    }
}

/// Shared state of every node handle.
#[derive(Debug)]
struct NodeRef {
    file: Arc<FileState>,
    id: usize,
    valid: AtomicBool,
}

impl NodeRef {
    fn new(file: Arc<FileState>, id: usize) -> Self {
        Self {
            file,
            id,
            valid: AtomicBool::new(true),
        }
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && self.file.open.load(Ordering::SeqCst)
    }

    /// Lock the tree after checking the handle is usable.
    fn tree(&self) -> Result<MutexGuard<'_, MemTree>, BackendError> {
        if !self.is_valid() {
            return Err(BackendError::Invalid(format!(
                "{}:{}",
                self.file.path,
                self.file.tree().path(self.id)
            )));
        }
        Ok(self.file.tree())
    }

    fn tree_mut(&self) -> Result<MutexGuard<'_, MemTree>, BackendError> {
        if self.file.readonly.load(Ordering::SeqCst) {
            return Err(BackendError::Invalid(format!("{} is read-only", self.file.path)));
        }
        self.tree()
    }

    fn name(&self) -> String {
        self.file.tree().nodes[self.id].name.clone()
    }

    fn path(&self) -> String {
        self.file.tree().path(self.id)
    }

    fn close(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    fn reopen(&self) -> Result<(), BackendError> {
        if !self.file.open.load(Ordering::SeqCst) {
            return Err(BackendError::Invalid(format!("{} is closed", self.file.path)));
        }
        self.valid.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn attributes(&self) -> Arc<dyn AttributeSet> {
        Arc::new(MemAttrs {
            file: self.file.clone(),
            owner: self.id,
        })
    }
}

macro_rules! impl_handle {
    ($t:ty) => {
        impl Handle for $t {
            fn name(&self) -> String {
                self.0.name()
            }

            fn path(&self) -> String {
                self.0.path()
            }

            fn close(&self) {
                self.0.close()
            }

            fn reopen(&self) -> Result<(), BackendError> {
                self.0.reopen()
            }

            fn is_valid(&self) -> bool {
                self.0.is_valid()
            }
        }
    };
}

#[derive(Debug)]
struct MemGroup(NodeRef);

#[derive(Debug)]
struct MemField(NodeRef);

impl_handle!(MemGroup);
impl_handle!(MemField);

impl GroupHandle for MemGroup {
    fn create_group(
        &self,
        name: &str,
        nx_class: &str,
    ) -> Result<Arc<dyn GroupHandle>, BackendError> {
        let mut tree = self.0.tree_mut()?;
        let id = tree.add_child(
            self.0.id,
            name,
            MemKind::Group {
                nx_class: nx_class.to_string(),
                children: Vec::new(),
            },
        )?;
        if !nx_class.is_empty() {
            tree.nodes[id].attrs.insert(
                "NX_class".to_string(),
                NdAttr {
                    dtype: ElementType::String,
                    value: NdArray::scalar(nx_class),
                },
            );
        }
        Ok(Arc::new(MemGroup(NodeRef::new(self.0.file.clone(), id))))
    }

    fn open_group(&self, name: &str) -> Result<Arc<dyn GroupHandle>, BackendError> {
        let tree = self.0.tree()?;
        let id = tree
            .child(self.0.id, name)
            .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
        match tree.nodes[id].kind {
            MemKind::Group { .. } => Ok(Arc::new(MemGroup(NodeRef::new(self.0.file.clone(), id)))),
            _ => Err(BackendError::Type(format!("{} is not a group", name))),
        }
    }

    fn create_field(
        &self,
        name: &str,
        spec: &FieldSpec,
    ) -> Result<Arc<dyn FieldHandle>, BackendError> {
        let mut tree = self.0.tree_mut()?;
        let n: usize = spec.shape.iter().product();
        let data = vec![spec.dtype.fill_value(); n];
        let id = tree.add_child(
            self.0.id,
            name,
            MemKind::Field {
                spec: spec.clone(),
                data,
            },
        )?;
        Ok(Arc::new(MemField(NodeRef::new(self.0.file.clone(), id))))
    }

    fn open_field(&self, name: &str) -> Result<Arc<dyn FieldHandle>, BackendError> {
        let tree = self.0.tree()?;
        let id = tree
            .child(self.0.id, name)
            .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
        tree.field(id)?;
        Ok(Arc::new(MemField(NodeRef::new(self.0.file.clone(), id))))
    }

    fn create_link(&self, name: &str, target: &str) -> Result<(), BackendError> {
        let mut tree = self.0.tree_mut()?;
        tree.add_child(
            self.0.id,
            name,
            MemKind::Link {
                target: target.to_string(),
            },
        )?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.0
            .tree()
            .map(|t| t.child(self.0.id, name).is_some())
            .unwrap_or(false)
    }

    fn names(&self) -> Vec<String> {
        match self.0.tree() {
            Ok(tree) => match &tree.nodes[self.0.id].kind {
                MemKind::Group { children, .. } => children.iter().map(|(n, _)| n.clone()).collect(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    fn attributes(&self) -> Arc<dyn AttributeSet> {
        self.0.attributes()
    }
}

impl FieldHandle for MemField {
    fn shape(&self) -> Vec<usize> {
        self.0
            .file
            .tree()
            .field(self.0.id)
            .map(|(spec, _)| spec.shape.clone())
            .unwrap_or_default()
    }

    fn dtype(&self) -> ElementType {
        self.0
            .file
            .tree()
            .field(self.0.id)
            .map(|(spec, _)| spec.dtype)
            .unwrap_or(ElementType::String)
    }

    fn grow(&self, axis: usize, amount: usize) -> Result<(), BackendError> {
        let mut tree = self.0.tree_mut()?;
        let (spec, data) = tree.field_mut(self.0.id)?;
        if axis >= spec.shape.len() {
            return Err(BackendError::Shape(format!(
                "cannot grow axis {} of shape {:?}",
                axis, spec.shape
            )));
        }
        if amount == 0 {
            return Ok(());
        }
        let old_shape = spec.shape.clone();
        let mut new_shape = old_shape.clone();
        new_shape[axis] += amount;
        let mut grown = vec![spec.dtype.fill_value(); new_shape.iter().product()];
        let old_offsets = block_offsets(&old_shape, &full_selection(&old_shape))?;
        let new_offsets = block_offsets(&new_shape, &full_selection(&old_shape))?;
        for (src, dst) in old_offsets.into_iter().zip(new_offsets) {
            grown[dst] = std::mem::replace(&mut data[src], Scalar::Bool(false));
        }
        *data = grown;
        spec.shape = new_shape;
        Ok(())
    }

    fn read(&self) -> Result<NdArray, BackendError> {
        let tree = self.0.tree()?;
        let (spec, data) = tree.field(self.0.id)?;
        NdArray::new(spec.shape.clone(), data.clone()).map_err(|e| BackendError::Shape(e.to_string()))
    }

    fn write(&self, value: &NdArray) -> Result<(), BackendError> {
        let mut tree = self.0.tree_mut()?;
        let (spec, data) = tree.field_mut(self.0.id)?;
        if value.len() != data.len() {
            return Err(BackendError::Shape(format!(
                "{} element(s) written to field of shape {:?}",
                value.len(),
                spec.shape
            )));
        }
        *data = cast_for(spec.dtype, value)?.into_data();
        Ok(())
    }

    fn read_slice(&self, selection: &[Selection]) -> Result<NdArray, BackendError> {
        let tree = self.0.tree()?;
        let (spec, data) = tree.field(self.0.id)?;
        let offsets = block_offsets(&spec.shape, selection)?;
        let items = offsets.into_iter().map(|o| data[o].clone()).collect();
        NdArray::new(selection_shape(selection), items).map_err(|e| BackendError::Shape(e.to_string()))
    }

    fn write_slice(&self, selection: &[Selection], value: &NdArray) -> Result<(), BackendError> {
        let mut tree = self.0.tree_mut()?;
        let (spec, data) = tree.field_mut(self.0.id)?;
        let offsets = block_offsets(&spec.shape, selection)?;
        if offsets.len() != value.len() {
            return Err(BackendError::Shape(format!(
                "{} element(s) written to a selection of {}",
                value.len(),
                offsets.len()
            )));
        }
        let cast = cast_for(spec.dtype, value)?;
        for (o, v) in offsets.into_iter().zip(cast.into_data()) {
            data[o] = v;
        }
        Ok(())
    }

    fn attributes(&self) -> Arc<dyn AttributeSet> {
        self.0.attributes()
    }
}

#[derive(Debug)]
struct MemAttrs {
    file: Arc<FileState>,
    owner: usize,
}

impl AttributeSet for MemAttrs {
    fn create(
        &self,
        name: &str,
        dtype: ElementType,
        shape: &[usize],
        overwrite: bool,
    ) -> Result<Arc<dyn AttributeHandle>, BackendError> {
        if self.file.readonly.load(Ordering::SeqCst) || !self.file.open.load(Ordering::SeqCst) {
            return Err(BackendError::Invalid(self.file.path.clone()));
        }
        let mut tree = self.file.tree();
        let attrs = &mut tree.nodes[self.owner].attrs;
        if attrs.contains_key(name) && !overwrite {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        attrs.insert(
            name.to_string(),
            NdAttr {
                dtype,
                value: NdArray::filled(shape.to_vec(), dtype.fill_value()),
            },
        );
        Ok(Arc::new(MemAttribute {
            node: NodeRef::new(self.file.clone(), self.owner),
            name: name.to_string(),
        }))
    }

    fn get(&self, name: &str) -> Result<Arc<dyn AttributeHandle>, BackendError> {
        if !self.exists(name) {
            return Err(BackendError::NotFound(name.to_string()));
        }
        Ok(Arc::new(MemAttribute {
            node: NodeRef::new(self.file.clone(), self.owner),
            name: name.to_string(),
        }))
    }

    fn exists(&self, name: &str) -> bool {
        self.file.tree().nodes[self.owner].attrs.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.file.tree().nodes[self.owner].attrs.keys().cloned().collect()
    }
}

#[derive(Debug)]
struct MemAttribute {
    node: NodeRef,
    name: String,
}

impl MemAttribute {
    fn with_attr<T>(&self, f: impl FnOnce(&NdAttr) -> T) -> Result<T, BackendError> {
        let tree = self.node.tree()?;
        tree.nodes[self.node.id]
            .attrs
            .get(&self.name)
            .map(f)
            .ok_or_else(|| BackendError::NotFound(self.name.clone()))
    }
}

impl Handle for MemAttribute {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn path(&self) -> String {
        format!("{}@{}", self.node.path(), self.name)
    }

    fn close(&self) {
        self.node.close()
    }

    fn reopen(&self) -> Result<(), BackendError> {
        self.node.reopen()
    }

    fn is_valid(&self) -> bool {
        self.node.is_valid()
    }
}

impl AttributeHandle for MemAttribute {
    fn dtype(&self) -> ElementType {
        self.with_attr(|a| a.dtype).unwrap_or(ElementType::String)
    }

    fn shape(&self) -> Vec<usize> {
        self.with_attr(|a| a.value.shape().to_vec()).unwrap_or_default()
    }

    fn read(&self) -> Result<NdArray, BackendError> {
        self.with_attr(|a| a.value.clone())
    }

    /// Attributes are small and rewritten whole, so the stored shape follows
    /// the written value.
    fn write(&self, value: &NdArray) -> Result<(), BackendError> {
        let mut tree = self.node.tree_mut()?;
        let attr = tree.nodes[self.node.id]
            .attrs
            .get_mut(&self.name)
            .ok_or_else(|| BackendError::NotFound(self.name.clone()))?;
        attr.value = cast_for(attr.dtype, value)?;
        Ok(())
    }
}

