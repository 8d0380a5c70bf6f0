//! ACSet schemas.
//!
//! A schema is a small finitely presented category together with value
//! domains:
//!
//! - **objects** (`Ob`) are the tables of an instance,
//! - **homs** (`Hom`) are typed foreign keys between objects,
//! - **attribute types** (`AttrType`) are value domains (text, float, or
//!   text tagged with an opaque encoding such as JSON),
//! - **attributes** (`Attr`) are typed columns from an object into an
//!   attribute type.
//!
//! Schemas are validated once at construction and are immutable afterwards.
//! Names are resolved once into schema-branded handles (`ObRef`, `HomRef`,
//! `AttrRef`, `AttrTypeRef`) which instances use for typed, O(1) access.
//!
//! The `schema_text` module provides a small line-oriented surface syntax for
//! writing schemas by hand.

pub mod handle;
pub mod schema;
pub mod schema_text;

pub use handle::{AttrRef, AttrTypeRef, HomRef, ObRef, SchemaToken};
pub use schema::{
    Attr, AttrType, DeclCategory, Hom, Name, NotFoundError, Ob, Schema, SchemaBuilder,
    SchemaDecl, SchemaError, ValueKind,
};
pub use schema_text::{format_schema_text, parse_schema_text, SchemaTextError};
