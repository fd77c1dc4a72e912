//! File-tree backend contract.
//!
//! This module provides:
//! - `FileBackend`: creates and opens hierarchical files
//! - `FileHandle`, `GroupHandle`, `FieldHandle`, `AttributeSet`, `AttributeHandle`:
//!   handles onto objects inside an open file
//! - `Selection`: per-axis slice selection for partial reads and writes
//! - `MemoryBackend`: an in-process implementation for tests and demos
//!
//! Handles are shared between scheduler workers, so every implementation must
//! be `Send + Sync` and must serialize its own mutations.

mod memory;

pub use memory::MemoryBackend;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ElementType, NdArray, Scalar};

/// Errors reported by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("type mismatch: {0}")]
    Type(String),

    /// The handle (or its file) was closed or opened read-only
    #[error("invalid handle: {0}")]
    Invalid(String),

    #[error("backend failure: {0}")]
    Other(String),
}

/// Compression filter settings for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compression {
    pub enabled: bool,
    /// Deflate level, 0..=9
    pub level: u32,
    pub shuffle: bool,
}

impl Default for Compression {
    fn default() -> Self {
        Self {
            enabled: false,
            level: 0,
            shuffle: true,
        }
    }
}

/// Everything a backend needs to create a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub dtype: ElementType,
    pub shape: Vec<usize>,
    pub chunk: Vec<usize>,
    pub compression: Option<Compression>,
}

impl FieldSpec {
    /// Spec with `chunk = max(dim, 1)` on every axis.
    pub fn new(dtype: ElementType, shape: Vec<usize>) -> Self {
        let chunk = shape.iter().map(|&d| d.max(1)).collect();
        Self {
            dtype,
            shape,
            chunk,
            compression: None,
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression.enabled.then_some(compression);
        self
    }
}

/// Selection along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A single index; the axis is dropped from the selected shape
    Index(usize),
    /// Half-open range `start..end`
    Range(usize, usize),
}

impl Selection {
    pub fn start(&self) -> usize {
        match self {
            Selection::Index(i) => *i,
            Selection::Range(a, _) => *a,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Selection::Index(i) => i + 1,
            Selection::Range(_, b) => *b,
        }
    }
}

/// Shape of the block a selection addresses.
pub fn selection_shape(selection: &[Selection]) -> Vec<usize> {
    selection
        .iter()
        .filter_map(|s| match s {
            Selection::Index(_) => None,
            Selection::Range(a, b) => Some(b.saturating_sub(*a)),
        })
        .collect()
}

/// Common behavior of every handle.
pub trait Handle: Send + Sync {
    /// Object name inside its parent
    fn name(&self) -> String;
    /// Absolute path inside the file
    fn path(&self) -> String;
    fn close(&self);
    fn reopen(&self) -> Result<(), BackendError>;
    fn is_valid(&self) -> bool;
}

/// Creates and opens files.
pub trait FileBackend: Send + Sync {
    fn create_file(&self, path: &str, overwrite: bool)
    -> Result<Arc<dyn FileHandle>, BackendError>;
    fn open_file(&self, path: &str, readonly: bool) -> Result<Arc<dyn FileHandle>, BackendError>;
}

pub trait FileHandle: Handle {
    fn root(&self) -> Result<Arc<dyn GroupHandle>, BackendError>;
    fn flush(&self) -> Result<(), BackendError>;
}

pub trait GroupHandle: Handle {
    fn create_group(&self, name: &str, nx_class: &str)
    -> Result<Arc<dyn GroupHandle>, BackendError>;
    fn open_group(&self, name: &str) -> Result<Arc<dyn GroupHandle>, BackendError>;
    fn create_field(&self, name: &str, spec: &FieldSpec)
    -> Result<Arc<dyn FieldHandle>, BackendError>;
    fn open_field(&self, name: &str) -> Result<Arc<dyn FieldHandle>, BackendError>;
    /// Create a soft link `name` pointing at the absolute path `target`
    fn create_link(&self, name: &str, target: &str) -> Result<(), BackendError>;
    fn exists(&self, name: &str) -> bool;
    fn names(&self) -> Vec<String>;
    fn attributes(&self) -> Arc<dyn AttributeSet>;
}

pub trait FieldHandle: Handle {
    fn shape(&self) -> Vec<usize>;
    fn dtype(&self) -> ElementType;
    /// Extend `axis` by `amount`; new cells hold the type's fill value
    fn grow(&self, axis: usize, amount: usize) -> Result<(), BackendError>;
    fn read(&self) -> Result<NdArray, BackendError>;
    /// Replace the whole content; element counts must match
    fn write(&self, value: &NdArray) -> Result<(), BackendError>;
    fn read_slice(&self, selection: &[Selection]) -> Result<NdArray, BackendError>;
    fn write_slice(&self, selection: &[Selection], value: &NdArray) -> Result<(), BackendError>;
    fn attributes(&self) -> Arc<dyn AttributeSet>;
}

pub trait AttributeSet: Send + Sync {
    fn create(
        &self,
        name: &str,
        dtype: ElementType,
        shape: &[usize],
        overwrite: bool,
    ) -> Result<Arc<dyn AttributeHandle>, BackendError>;
    fn get(&self, name: &str) -> Result<Arc<dyn AttributeHandle>, BackendError>;
    fn exists(&self, name: &str) -> bool;
    fn names(&self) -> Vec<String>;
}

pub trait AttributeHandle: Handle {
    fn dtype(&self) -> ElementType;
    fn shape(&self) -> Vec<usize>;
    fn read(&self) -> Result<NdArray, BackendError>;
    fn write(&self, value: &NdArray) -> Result<(), BackendError>;
}

/// Create (or overwrite) a string attribute and write `value` into it.
pub fn write_string_attribute(
    attrs: &dyn AttributeSet,
    name: &str,
    value: &str,
) -> Result<(), BackendError> {
    let handle = attrs.create(name, ElementType::String, &[], true)?;
    handle.write(&NdArray::scalar(Scalar::Str(value.to_string())))
}
