//! ACSet instances: typed, schema-checked, index-backed in-memory data.
//!
//! An `Acset` conforms to exactly one `Schema` (shared via `Arc`). For every
//! object it stores a set of live part ids; for every hom a partial function
//! between parts; for every attribute a partial function from parts to
//! values. Each hom and attribute column keeps a reverse index
//! (value → parts) that is updated inside the mutating operation, so
//! `incident` lookups and cascade deletions never scan.
//!
//! Invariants after every operation:
//! 1. **Referential integrity**: a set hom value references a live part of the
//!    hom's codomain.
//! 2. **Type correctness**: attribute values match their attribute type kind.
//! 3. **Index consistency**: reverse indexes equal the preimages of the
//!    forward columns.
//!
//! Operations are atomic: on error nothing has been mutated.
//!
//! ## Module Organization
//!
//! - `acset`: the instance type and its operations
//! - `index`: bitmap postings used for reverse lookups
//! - `integrity`: full-scan consistency checks and index rebuilds
//! - `snapshot`: deterministic enumeration/replay of an instance
//! - `shared`: single read-write lock discipline for concurrent callers

pub mod acset;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod shared;
pub mod snapshot;
pub mod value;

pub use acset::{Acset, PartId, Parts};
pub use config::{AcsetConfig, DeletionPolicy};
pub use error::{AcsetError, Result};
pub use integrity::IntegrityReport;
pub use shared::SharedAcset;
pub use snapshot::{AcsetSnapshot, AttrValues, HomValues};
pub use value::{IndexKey, Value};

pub use acsets_schema::{AttrRef, AttrTypeRef, HomRef, ObRef, Schema, ValueKind};
pub use roaring::RoaringBitmap;
