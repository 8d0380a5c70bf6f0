use acsets_schema::{Name, NotFoundError, ValueKind};
use thiserror::Error;

use crate::acset::PartId;

pub type Result<T> = std::result::Result<T, AcsetError>;

/// Errors surfaced by instance operations.
///
/// Every variant is local to the operation that produced it; the instance is
/// left exactly as it was before the call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AcsetError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// A referenced part is not live in the object it should belong to.
    #[error("part {part} is not a live `{ob}` part")]
    DanglingReference { ob: Name, part: PartId },

    #[error("attribute `{attr}` expects a {expected} value, got {found}")]
    TypeMismatch {
        attr: Name,
        expected: ValueKind,
        found: &'static str,
    },

    /// A handle, part, or path used outside its declared domain.
    #[error("domain mismatch: {0}")]
    DomainMismatch(String),

    #[error("cannot remove `{ob}` part {part}: {count} `{hom}` value(s) still reference it")]
    StillReferenced {
        ob: Name,
        part: PartId,
        hom: Name,
        count: u64,
    },

    #[error("part ids exhausted for object `{ob}`")]
    PartIdsExhausted { ob: Name },
}
