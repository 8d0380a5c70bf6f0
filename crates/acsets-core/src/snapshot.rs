//! Deterministic enumeration of an instance, and replay back into one.
//!
//! Everything is keyed by declaration name and listed in ascending part
//! order, so two snapshots of equal instances serialize identically.

use std::collections::BTreeMap;
use std::sync::Arc;

use acsets_schema::{Name, Schema};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acset::{Acset, PartId};
use crate::config::AcsetConfig;
use crate::error::{AcsetError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcsetSnapshot {
    pub schema: Name,
    /// Live part ids per object.
    pub parts: BTreeMap<Name, Vec<PartId>>,
    /// Next id each object would allocate. Ids below this that are absent
    /// from `parts` are holes left by removals.
    pub next_ids: BTreeMap<Name, u32>,
    pub homs: Vec<HomValues>,
    pub attrs: Vec<AttrValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomValues {
    pub name: Name,
    pub dom: Name,
    pub pairs: Vec<(PartId, PartId)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrValues {
    pub name: Name,
    pub dom: Name,
    pub values: Vec<(PartId, Value)>,
}

impl AcsetSnapshot {
    /// Live part count for an object, by name.
    pub fn nparts(&self, ob: &str) -> usize {
        self.parts.get(ob).map(Vec::len).unwrap_or(0)
    }
}

impl Acset {
    pub fn snapshot(&self) -> AcsetSnapshot {
        let schema = self.schema();
        let mut parts = BTreeMap::new();
        let mut next_ids = BTreeMap::new();
        for ob in schema.ob_refs() {
            let name = self.ob_label(ob).to_string();
            let slot = &self.parts[ob.index()];
            parts.insert(name.clone(), PartId::from_bitmap(&slot.live));
            next_ids.insert(name, slot.next_id);
        }

        let homs = schema
            .hom_refs()
            .filter_map(|hom| {
                let dom = schema.hom_dom(hom)?;
                let mut pairs: Vec<(PartId, PartId)> = self.homs[hom.index()]
                    .values
                    .iter()
                    .map(|(&p, &t)| (PartId::new(p), PartId::new(t)))
                    .collect();
                pairs.sort_unstable();
                Some(HomValues {
                    name: self.hom_label(hom).to_string(),
                    dom: self.ob_label(dom).to_string(),
                    pairs,
                })
            })
            .collect();

        let attrs = schema
            .attr_refs()
            .filter_map(|attr| {
                let dom = schema.attr_dom(attr)?;
                let mut values: Vec<(PartId, Value)> = self.attrs[attr.index()]
                    .values
                    .iter()
                    .map(|(&p, v)| (PartId::new(p), v.clone()))
                    .collect();
                values.sort_unstable_by_key(|(p, _)| *p);
                Some(AttrValues {
                    name: self.attr_label(attr).to_string(),
                    dom: self.ob_label(dom).to_string(),
                    values,
                })
            })
            .collect();

        AcsetSnapshot {
            schema: schema.name().to_string(),
            parts,
            next_ids,
            homs,
            attrs,
        }
    }

    /// Replay a snapshot with the default config.
    pub fn from_snapshot(schema: Arc<Schema>, snapshot: &AcsetSnapshot) -> Result<Acset> {
        Self::from_snapshot_with_config(schema, AcsetConfig::default(), snapshot)
    }

    /// Replay a snapshot.
    ///
    /// Part ids are preserved: each object's live set and next id are
    /// installed as recorded, so holes stay holes and the cost does not
    /// depend on the next id. Every hom and attribute value then goes
    /// through the usual checked mutators.
    pub fn from_snapshot_with_config(
        schema: Arc<Schema>,
        config: AcsetConfig,
        snapshot: &AcsetSnapshot,
    ) -> Result<Acset> {
        if snapshot.schema != schema.name() {
            return Err(AcsetError::DomainMismatch(format!(
                "snapshot of `{}` replayed into schema `{}`",
                snapshot.schema,
                schema.name()
            )));
        }

        let mut acset = Acset::with_config(Arc::clone(&schema), config);

        for (name, live) in &snapshot.parts {
            let ob = schema.ob_ref(name)?;
            let next = match snapshot.next_ids.get(name) {
                Some(&next) => next,
                None => live.iter().map(|p| p.raw().saturating_add(1)).max().unwrap_or(0),
            };
            let live: RoaringBitmap = live.iter().map(|p| p.raw()).collect();
            if let Some(beyond) = live.max().filter(|&max| max >= next) {
                return Err(AcsetError::DomainMismatch(format!(
                    "snapshot lists `{name}` part {beyond} at or beyond next id {next}"
                )));
            }
            acset.restore_parts(ob, live, next)?;
        }

        for hom_values in &snapshot.homs {
            let hom = schema.hom_ref(&hom_values.name)?;
            for &(part, target) in &hom_values.pairs {
                acset.set_hom(hom, part, target)?;
            }
        }

        for attr_values in &snapshot.attrs {
            let dom = schema.ob_ref(&attr_values.dom)?;
            let attr = schema.attr_ref_on(dom, &attr_values.name)?;
            for (part, value) in &attr_values.values {
                acset.set_attr(attr, *part, value.clone())?;
            }
        }

        debug!(
            schema = schema.name(),
            objects = snapshot.parts.len(),
            "replayed snapshot"
        );
        Ok(acset)
    }
}
