//! Full-scan consistency checks.
//!
//! The mutators keep the reverse indexes in step with the forward columns.
//! These routines recompute everything from the forward data so tests (and
//! `verify_after_mutation`) can confirm that nothing drifted.

use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use tracing::debug;

use crate::acset::Acset;
use crate::index::{AttrIndex, HomIndex, Postings};
use crate::value::IndexKey;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub checked_parts: u64,
    pub checked_hom_values: usize,
    pub checked_attr_values: usize,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn diff_postings<K: Eq + Hash + Debug>(
    label: &str,
    expected: &Postings<K>,
    stored: &Postings<K>,
    errors: &mut Vec<String>,
) {
    if expected == stored {
        return;
    }
    for (key, parts) in expected.iter() {
        match stored.get(key) {
            Some(have) if have == parts => {}
            Some(have) => errors.push(format!(
                "{label}: stale posting for {key:?} (stored {:?}, expected {:?})",
                have.iter().collect::<Vec<_>>(),
                parts.iter().collect::<Vec<_>>()
            )),
            None => errors.push(format!("{label}: missing posting for {key:?}")),
        }
    }
    for (key, _) in stored.iter() {
        if expected.get(key).is_none() {
            errors.push(format!("{label}: posting for {key:?} has no forward values"));
        }
    }
}

impl Acset {
    fn expected_hom_index(&self, hom: usize) -> HomIndex {
        self.homs[hom].values.iter().map(|(&p, &t)| (t, p)).collect()
    }

    fn expected_attr_index(&self, attr: usize) -> AttrIndex {
        self.attrs[attr]
            .values
            .iter()
            .map(|(&p, v)| (IndexKey::from(v), p))
            .collect()
    }

    /// Recompute referential integrity, type correctness and index
    /// consistency by scanning every column.
    pub fn check_integrity(&self) -> IntegrityReport {
        let schema = self.schema();
        let mut report = IntegrityReport {
            checked_parts: self.parts.iter().map(|p| p.live.len()).sum(),
            ..IntegrityReport::default()
        };

        for hom in schema.hom_refs() {
            let (Some(dom), Some(codom)) = (schema.hom_dom(hom), schema.hom_codom(hom)) else {
                continue;
            };
            let label = format!("hom `{}`", self.hom_label(hom));
            let col = &self.homs[hom.index()];
            for (&part, &target) in &col.values {
                report.checked_hom_values += 1;
                if !self.parts[dom.index()].live.contains(part) {
                    report.errors.push(format!(
                        "{label}: value set on dead `{}` part {part}",
                        self.ob_label(dom)
                    ));
                }
                if !self.parts[codom.index()].live.contains(target) {
                    report.errors.push(format!(
                        "{label}: part {part} references dead `{}` part {target}",
                        self.ob_label(codom)
                    ));
                }
            }
            let expected = self.expected_hom_index(hom.index());
            diff_postings(&label, &expected, &col.index, &mut report.errors);
        }

        for attr in schema.attr_refs() {
            let (Some(dom), Some(kind)) = (schema.attr_dom(attr), schema.attr_kind(attr)) else {
                continue;
            };
            let label = format!("attr `{}`", self.attr_label(attr));
            let col = &self.attrs[attr.index()];
            for (&part, value) in &col.values {
                report.checked_attr_values += 1;
                if !self.parts[dom.index()].live.contains(part) {
                    report.errors.push(format!(
                        "{label}: value set on dead `{}` part {part}",
                        self.ob_label(dom)
                    ));
                }
                if !value.conforms_to(kind) {
                    report.errors.push(format!(
                        "{label}: part {part} holds a {} value, expected {kind}",
                        value.kind_name()
                    ));
                }
            }
            let expected = self.expected_attr_index(attr.index());
            diff_postings(&label, &expected, &col.index, &mut report.errors);
        }

        report.errors.sort();
        report
    }

    /// Rebuild every reverse index from the forward columns.
    pub fn rebuild_indexes(&mut self) {
        for hom in 0..self.homs.len() {
            self.homs[hom].index = self.expected_hom_index(hom);
        }
        for attr in 0..self.attrs.len() {
            self.attrs[attr].index = self.expected_attr_index(attr);
        }
        debug!(
            schema = self.schema().name(),
            homs = self.homs.len(),
            attrs = self.attrs.len(),
            "rebuilt indexes"
        );
    }
}
