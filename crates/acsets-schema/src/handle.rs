//! Runtime “branding” for schema-scoped handles.
//!
//! A handle is a dense index into one of a schema's declaration tables. Rust
//! cannot express “this index belongs to *that* schema” in the type system,
//! so every `Schema` gets a fresh `SchemaToken` at construction and every
//! handle carries the token of the schema that resolved it. Instances compare
//! tokens at their boundary and reject foreign handles.
//!
//! Tokens are process-local and are never serialized. Cloning a schema keeps
//! its token (the clone has identical declarations, so handles remain valid).

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCHEMA_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A process-local token identifying a particular built `Schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaToken(NonZeroU64);

impl SchemaToken {
    pub(crate) fn fresh() -> Self {
        let raw = NEXT_SCHEMA_TOKEN.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 schemas to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SchemaToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema#{}", self.raw())
    }
}

macro_rules! schema_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            token: SchemaToken,
            index: u32,
        }

        impl $name {
            pub(crate) fn new(token: SchemaToken, index: usize) -> Self {
                Self {
                    token,
                    index: index as u32,
                }
            }

            /// Token of the schema this handle was resolved against.
            pub fn token(self) -> SchemaToken {
                self.token
            }

            /// Position of the declaration in its schema table.
            pub fn index(self) -> usize {
                self.index as usize
            }
        }
    };
}

schema_handle!(
    /// Resolved handle to an object declaration.
    ObRef
);
schema_handle!(
    /// Resolved handle to a hom declaration.
    HomRef
);
schema_handle!(
    /// Resolved handle to an attribute type declaration.
    AttrTypeRef
);
schema_handle!(
    /// Resolved handle to an attribute declaration.
    AttrRef
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = SchemaToken::fresh();
        let b = SchemaToken::fresh();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn handles_from_different_tokens_differ() {
        let a = ObRef::new(SchemaToken::fresh(), 0);
        let b = ObRef::new(SchemaToken::fresh(), 0);
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
    }
}
