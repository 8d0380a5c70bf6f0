//! The ACSet instance type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use acsets_schema::{AttrRef, HomRef, ObRef, Schema, SchemaToken, ValueKind};
use ahash::RandomState;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{AcsetConfig, DeletionPolicy};
use crate::error::{AcsetError, Result};
use crate::index::{AttrIndex, HomIndex};
use crate::value::{IndexKey, Value};

// ============================================================================
// Part identifiers
// ============================================================================

/// A part id within one object's id space.
///
/// Ids are allocated monotonically per object and never reused, so a stale id
/// kept by a caller is detected as not live instead of aliasing a new part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PartId(u32);

impl PartId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Ascending part ids of a bitmap.
    pub fn from_bitmap(bitmap: &RoaringBitmap) -> Vec<PartId> {
        bitmap.iter().map(PartId).collect()
    }
}

impl From<u32> for PartId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ascending iterator over the live parts of one object.
pub struct Parts<'a> {
    inner: roaring::bitmap::Iter<'a>,
}

impl Iterator for Parts<'_> {
    type Item = PartId;

    fn next(&mut self) -> Option<PartId> {
        self.inner.next().map(PartId)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

// ============================================================================
// Columnar storage
// ============================================================================

#[derive(Debug, Clone, Default)]
pub(crate) struct ObParts {
    pub(crate) live: RoaringBitmap,
    pub(crate) next_id: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct HomColumn {
    /// Forward map: `part -> target`.
    pub(crate) values: HashMap<u32, u32, RandomState>,
    pub(crate) index: HomIndex,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AttrColumn {
    /// Forward map: `part -> value`.
    pub(crate) values: HashMap<u32, Value, RandomState>,
    pub(crate) index: AttrIndex,
}

/// An instance of a schema.
#[derive(Debug, Clone)]
pub struct Acset {
    schema: Arc<Schema>,
    config: AcsetConfig,
    pub(crate) parts: Vec<ObParts>,
    pub(crate) homs: Vec<HomColumn>,
    pub(crate) attrs: Vec<AttrColumn>,
}

impl Acset {
    /// An empty instance (zero parts for every object) with default config.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, AcsetConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: AcsetConfig) -> Self {
        let parts = vec![ObParts::default(); schema.obs().len()];
        let homs = vec![HomColumn::default(); schema.homs().len()];
        let attrs = vec![AttrColumn::default(); schema.attrs().len()];
        Self {
            schema,
            config,
            parts,
            homs,
            attrs,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> AcsetConfig {
        self.config
    }

    // ------------------------------------------------------------------------
    // Handle checks
    // ------------------------------------------------------------------------

    fn foreign(&self, what: &str, token: SchemaToken) -> AcsetError {
        AcsetError::DomainMismatch(format!(
            "{what} handle from {token} used with an instance of `{}` ({})",
            self.schema.name(),
            self.schema.token()
        ))
    }

    fn check_ob(&self, ob: ObRef) -> Result<()> {
        if self.schema.owns(ob.token()) {
            Ok(())
        } else {
            Err(self.foreign("object", ob.token()))
        }
    }

    fn hom_ends(&self, hom: HomRef) -> Result<(ObRef, ObRef)> {
        match (self.schema.hom_dom(hom), self.schema.hom_codom(hom)) {
            (Some(dom), Some(codom)) => Ok((dom, codom)),
            _ => Err(self.foreign("hom", hom.token())),
        }
    }

    fn attr_sig(&self, attr: AttrRef) -> Result<(ObRef, ValueKind)> {
        match (self.schema.attr_dom(attr), self.schema.attr_kind(attr)) {
            (Some(dom), Some(kind)) => Ok((dom, kind)),
            _ => Err(self.foreign("attribute", attr.token())),
        }
    }

    pub(crate) fn ob_label(&self, ob: ObRef) -> &str {
        self.schema.ob(ob).map(|o| o.name.as_str()).unwrap_or("?")
    }

    pub(crate) fn hom_label(&self, hom: HomRef) -> &str {
        self.schema.hom(hom).map(|h| h.name.as_str()).unwrap_or("?")
    }

    pub(crate) fn attr_label(&self, attr: AttrRef) -> &str {
        self.schema.attr(attr).map(|a| a.name.as_str()).unwrap_or("?")
    }

    /// Caller must have checked that `ob` belongs to this schema.
    fn is_live(&self, ob: ObRef, part: PartId) -> bool {
        self.parts[ob.index()].live.contains(part.0)
    }

    fn require_live(&self, ob: ObRef, part: PartId) -> Result<()> {
        if self.is_live(ob, part) {
            Ok(())
        } else {
            Err(AcsetError::DanglingReference {
                ob: self.ob_label(ob).to_string(),
                part,
            })
        }
    }

    fn require_in_domain(&self, ob: ObRef, part: PartId, decl: &str) -> Result<()> {
        if self.is_live(ob, part) {
            Ok(())
        } else {
            Err(AcsetError::DomainMismatch(format!(
                "part {part} is not a live `{}` part (domain of `{decl}`)",
                self.ob_label(ob)
            )))
        }
    }

    fn verify(&self) {
        if cfg!(debug_assertions) && self.config.verify_after_mutation {
            let report = self.check_integrity();
            debug_assert!(report.ok(), "ACSet integrity violated: {:?}", report.errors);
        }
    }

    // ------------------------------------------------------------------------
    // Parts
    // ------------------------------------------------------------------------

    /// Whether `part` is a live part of `ob` (false for foreign handles).
    pub fn has_part(&self, ob: ObRef, part: PartId) -> bool {
        self.schema.owns(ob.token()) && self.is_live(ob, part)
    }

    pub fn nparts(&self, ob: ObRef) -> Result<usize> {
        self.check_ob(ob)?;
        Ok(self.parts[ob.index()].live.len() as usize)
    }

    /// Live parts of `ob` in ascending id order.
    ///
    /// The iterator is lazy; call `parts` again to restart.
    pub fn parts(&self, ob: ObRef) -> Result<Parts<'_>> {
        self.check_ob(ob)?;
        Ok(Parts {
            inner: self.parts[ob.index()].live.iter(),
        })
    }

    pub fn add_part(&mut self, ob: ObRef) -> Result<PartId> {
        self.check_ob(ob)?;
        let id = self.parts[ob.index()].next_id;
        let next = id
            .checked_add(1)
            .ok_or_else(|| AcsetError::PartIdsExhausted {
                ob: self.ob_label(ob).to_string(),
            })?;
        let slot = &mut self.parts[ob.index()];
        slot.next_id = next;
        slot.live.insert(id);
        trace!(ob = self.ob_label(ob), part = id, "add_part");
        self.verify();
        Ok(PartId(id))
    }

    /// Add `n` parts at once; ids are consecutive.
    pub fn add_parts(&mut self, ob: ObRef, n: usize) -> Result<Vec<PartId>> {
        self.check_ob(ob)?;
        let start = self.parts[ob.index()].next_id;
        let end = u64::from(start) + n as u64;
        if end > u64::from(u32::MAX) {
            return Err(AcsetError::PartIdsExhausted {
                ob: self.ob_label(ob).to_string(),
            });
        }
        let end = end as u32;
        let slot = &mut self.parts[ob.index()];
        slot.next_id = end;
        slot.live.insert_range(start..end);
        trace!(ob = self.ob_label(ob), start, end, "add_parts");
        self.verify();
        Ok((start..end).map(PartId).collect())
    }

    /// Install the live set and id counter of an object with no values yet.
    ///
    /// Used by snapshot replay; the caller has checked `live.max() < next_id`.
    pub(crate) fn restore_parts(
        &mut self,
        ob: ObRef,
        live: RoaringBitmap,
        next_id: u32,
    ) -> Result<()> {
        self.check_ob(ob)?;
        debug_assert!(!matches!(live.max(), Some(max) if max >= next_id));
        let slot = &mut self.parts[ob.index()];
        slot.live = live;
        slot.next_id = next_id;
        trace!(ob = self.ob_label(ob), next_id, "restore_parts");
        self.verify();
        Ok(())
    }

    /// Remove a live part according to the instance's deletion policy.
    ///
    /// Under `Cascade`, every hom value pointing at `part` is cleared (found
    /// through the reverse indexes of the homs into `ob`), then the part's own
    /// hom and attribute values are dropped. Under `Reject`, the call fails
    /// with `StillReferenced` if any other part's hom value points at it.
    pub fn rem_part(&mut self, ob: ObRef, part: PartId) -> Result<()> {
        self.check_ob(ob)?;
        self.require_live(ob, part)?;

        let schema = Arc::clone(&self.schema);
        let incoming: Vec<HomRef> = schema.homs_into(ob).collect();

        if self.config.deletion == DeletionPolicy::Reject {
            for &hom in &incoming {
                let col = &self.homs[hom.index()];
                let mut count = col.index.count(&part.0);
                // A part's own value (`hom(part) == part`) goes with it.
                if col.values.get(&part.0) == Some(&part.0) {
                    count -= 1;
                }
                if count > 0 {
                    return Err(AcsetError::StillReferenced {
                        ob: self.ob_label(ob).to_string(),
                        part,
                        hom: self.hom_label(hom).to_string(),
                        count,
                    });
                }
            }
        }

        let mut cleared = 0u64;
        for &hom in &incoming {
            let col = &mut self.homs[hom.index()];
            let sources = col.index.take(&part.0);
            for source in &sources {
                col.values.remove(&source);
            }
            cleared += sources.len();
        }
        for hom in schema.homs_out_of(ob) {
            let col = &mut self.homs[hom.index()];
            if let Some(target) = col.values.remove(&part.0) {
                col.index.remove(&target, part.0);
            }
        }
        for attr in schema.attrs_of(ob) {
            let col = &mut self.attrs[attr.index()];
            if let Some(value) = col.values.remove(&part.0) {
                col.index.remove(&IndexKey::from(&value), part.0);
            }
        }
        self.parts[ob.index()].live.remove(part.0);

        if cleared > 0 {
            warn!(
                ob = self.ob_label(ob),
                part = part.0,
                cleared_references = cleared,
                "rem_part cascaded into incoming hom values"
            );
        } else {
            debug!(ob = self.ob_label(ob), part = part.0, "rem_part");
        }
        self.verify();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Homs
    // ------------------------------------------------------------------------

    /// Set `hom(part) = target`, overwriting any previous value.
    pub fn set_hom(&mut self, hom: HomRef, part: PartId, target: PartId) -> Result<()> {
        let (dom, codom) = self.hom_ends(hom)?;
        self.require_live(dom, part)?;
        self.require_live(codom, target)?;

        let col = &mut self.homs[hom.index()];
        if let Some(old) = col.values.insert(part.0, target.0) {
            col.index.remove(&old, part.0);
        }
        col.index.insert(target.0, part.0);

        trace!(
            hom = self.hom_label(hom),
            part = part.0,
            target = target.0,
            "set_hom"
        );
        self.verify();
        Ok(())
    }

    /// Unset `hom(part)`. A no-op when no value is set.
    pub fn clear_hom(&mut self, hom: HomRef, part: PartId) -> Result<()> {
        self.hom_ends(hom)?;
        let col = &mut self.homs[hom.index()];
        if let Some(old) = col.values.remove(&part.0) {
            col.index.remove(&old, part.0);
            trace!(hom = self.hom_label(hom), part = part.0, "clear_hom");
        }
        self.verify();
        Ok(())
    }

    pub fn get_hom(&self, hom: HomRef, part: PartId) -> Result<Option<PartId>> {
        let (dom, _) = self.hom_ends(hom)?;
        self.require_in_domain(dom, part, self.hom_label(hom))?;
        Ok(self.homs[hom.index()]
            .values
            .get(&part.0)
            .copied()
            .map(PartId))
    }

    /// All parts `p` with `hom(p) == target`, served from the reverse index.
    pub fn incident(&self, hom: HomRef, target: PartId) -> Result<RoaringBitmap> {
        self.hom_ends(hom)?;
        Ok(self.homs[hom.index()]
            .index
            .get(&target.0)
            .cloned()
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    /// Set `attr(part) = value`, overwriting any previous value.
    ///
    /// No coercion: a float for a text-kind attribute (or vice versa) fails
    /// with `TypeMismatch`.
    pub fn set_attr(&mut self, attr: AttrRef, part: PartId, value: impl Into<Value>) -> Result<()> {
        let (dom, kind) = self.attr_sig(attr)?;
        self.require_live(dom, part)?;
        let value = value.into();
        if !value.conforms_to(kind) {
            return Err(AcsetError::TypeMismatch {
                attr: self.attr_label(attr).to_string(),
                expected: kind,
                found: value.kind_name(),
            });
        }

        let key = IndexKey::from(&value);
        let col = &mut self.attrs[attr.index()];
        if let Some(old) = col.values.insert(part.0, value) {
            col.index.remove(&IndexKey::from(&old), part.0);
        }
        col.index.insert(key, part.0);

        trace!(attr = self.attr_label(attr), part = part.0, "set_attr");
        self.verify();
        Ok(())
    }

    /// Unset `attr(part)`. A no-op when no value is set.
    pub fn clear_attr(&mut self, attr: AttrRef, part: PartId) -> Result<()> {
        self.attr_sig(attr)?;
        let col = &mut self.attrs[attr.index()];
        if let Some(old) = col.values.remove(&part.0) {
            col.index.remove(&IndexKey::from(&old), part.0);
        }
        self.verify();
        Ok(())
    }

    pub fn get_attr(&self, attr: AttrRef, part: PartId) -> Result<Option<&Value>> {
        let (dom, _) = self.attr_sig(attr)?;
        self.require_in_domain(dom, part, self.attr_label(attr))?;
        Ok(self.attrs[attr.index()].values.get(&part.0))
    }

    /// All parts whose `attr` value equals `value`.
    pub fn incident_attr(&self, attr: AttrRef, value: &Value) -> Result<RoaringBitmap> {
        let (_, kind) = self.attr_sig(attr)?;
        if !value.conforms_to(kind) {
            return Err(AcsetError::TypeMismatch {
                attr: self.attr_label(attr).to_string(),
                expected: kind,
                found: value.kind_name(),
            });
        }
        Ok(self.attrs[attr.index()]
            .index
            .get(&IndexKey::from(value))
            .cloned()
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------------

    /// Check that `path` composes left to right; returns `(start, end)` objects.
    fn path_ends(&self, path: &[HomRef]) -> Result<Option<(ObRef, ObRef)>> {
        let mut ends: Option<(ObRef, ObRef)> = None;
        let mut prev: Option<HomRef> = None;
        for &hom in path {
            let (dom, codom) = self.hom_ends(hom)?;
            ends = match (ends, prev) {
                (Some((start, end)), Some(prev)) => {
                    if end != dom {
                        return Err(AcsetError::DomainMismatch(format!(
                            "cannot compose `{}` (into `{}`) with `{}` (out of `{}`)",
                            self.hom_label(prev),
                            self.ob_label(end),
                            self.hom_label(hom),
                            self.ob_label(dom)
                        )));
                    }
                    Some((start, codom))
                }
                _ => Some((dom, codom)),
            };
            prev = Some(hom);
        }
        Ok(ends)
    }

    /// Follow a composable sequence of homs starting at `part`.
    ///
    /// Returns `None` as soon as a hom along the path is unset. The empty path
    /// is the identity.
    pub fn follow_path(&self, path: &[HomRef], part: PartId) -> Result<Option<PartId>> {
        let Some((start, _)) = self.path_ends(path)? else {
            return Ok(Some(part));
        };
        self.require_in_domain(start, part, "path")?;

        let mut current = part.0;
        for hom in path {
            match self.homs[hom.index()].values.get(&current) {
                Some(&next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(PartId(current)))
    }

    /// Preimage of `target` under a composable path of homs.
    pub fn incident_path(&self, path: &[HomRef], target: PartId) -> Result<RoaringBitmap> {
        let mut frontier = RoaringBitmap::new();
        frontier.insert(target.0);
        if self.path_ends(path)?.is_none() {
            return Ok(frontier);
        }

        for hom in path.iter().rev() {
            let index = &self.homs[hom.index()].index;
            let mut next = RoaringBitmap::new();
            for t in &frontier {
                if let Some(sources) = index.get(&t) {
                    next |= sources;
                }
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier)
    }
}
