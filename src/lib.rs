//! # nexwrite
//!
//! Schema-driven writer filling hierarchical data files while an acquisition
//! runs.
//!
//! ## Overview
//!
//! nexwrite provides:
//! - **Template trees**: a streaming parser turns an XML template of groups,
//!   fields, attributes and links into a tree of backend objects
//! - **Phase scheduling**: nodes are written at INIT, at every STEP, on named
//!   triggers, or at FINAL, each phase by a pool of worker threads
//! - **Data sources**: client-pushed values, instrument devices, database
//!   queries and computed expressions behind one `DataSource` contract
//! - **Growing fields**: STEP fields grow one slab per record along a chosen axis
//! - **Failure tolerance**: `canfail` nodes are filled with a sentinel and
//!   flagged instead of aborting the acquisition
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nexwrite::{MemoryBackend, WriterBuilder};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let mut engine = WriterBuilder::new(backend.clone()).build();
//!
//! engine.open_file("scan.nxs")?;
//! engine.open_entry(r#"
//!     <definition>
//!       <group type="NXentry" name="entry">
//!         <field name="energy" type="NX_FLOAT64" units="keV">
//!           <strategy mode="STEP"/>
//!           <datasource type="CLIENT"><record name="energy"/></datasource>
//!         </field>
//!       </group>
//!     </definition>"#)?;
//! for e in [8.0, 8.1, 8.2] {
//!     engine.record(&format!(r#"{{"data": {{"energy": {}}}}}"#, e))?;
//! }
//! engine.close_entry()?;
//! engine.close_file()?;
//!
//! let energy = backend.read_field("scan.nxs", "/entry/energy")?;
//! assert_eq!(energy.shape(), &[3]);
//! ```
//!
//! ## Features
//!
//! - `expression` - `PYEVAL` computed-expression source (enabled by default)
//! - `yaml` - load `WriterConfig` from YAML
//! - `toml` - load `WriterConfig` from TOML
//! - `miette` - pretty error reporting with miette
//! - `cli` - the `nexwrite_demo` binary

pub mod backend;
pub mod builder;
pub mod config;
pub mod decoder;
pub mod element;
pub mod engine;
pub mod error;
pub mod holder;
pub mod markup;
pub mod scheduler;
pub mod source;
pub mod tree;
pub mod types;

pub use backend::{Compression, FieldSpec, FileBackend, MemoryBackend, Selection};
pub use builder::WriterBuilder;
pub use config::{RecordContext, ValueScope, WriterConfig};
pub use decoder::{CustomDecoder, Decoder, DecoderPool, default_decoders};
pub use engine::WriterEngine;
pub use error::{AggregateError, RunFailure, Stage, WriterError};
pub use holder::DataHolder;
pub use scheduler::{Phase, PoolKey, Scheduler};
pub use source::{CustomDataSource, DataSource, DataSourcePool, default_pool};
pub use tree::{TagKind, Tree};
pub use types::{ElementType, NdArray, Rank, Scalar};

#[cfg(feature = "miette")]
pub use error::WriterDiagnostic;
