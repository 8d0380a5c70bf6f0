//! Petri net structure over any schema that declares it.
//!
//! A schema is Petri-shaped when it has objects `S` (species), `T`
//! (transitions), `I` (input arcs), `O` (output arcs) and homs
//! `it: I -> T`, `is: I -> S`, `ot: O -> T`, `os: O -> S`. An input arc `i`
//! means transition `it(i)` consumes one token of species `is(i)`; output arcs
//! read the same way for production.
//!
//! Queries are free functions over `&Acset` so they work for `MiraNet` and for
//! any other schema that extends the Petri shape.

use acsets_core::{Acset, AcsetError, HomRef, ObRef, PartId, Result, RoaringBitmap, Schema};

/// Resolved handles for the Petri fragment of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetriHandles {
    pub s: ObRef,
    pub t: ObRef,
    pub i: ObRef,
    pub o: ObRef,
    pub it: HomRef,
    pub is: HomRef,
    pub ot: HomRef,
    pub os: HomRef,
}

impl PetriHandles {
    /// Resolve the Petri objects and homs, checking each hom's signature.
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let handles = Self {
            s: schema.ob_ref("S")?,
            t: schema.ob_ref("T")?,
            i: schema.ob_ref("I")?,
            o: schema.ob_ref("O")?,
            it: schema.hom_ref("it")?,
            is: schema.hom_ref("is")?,
            ot: schema.hom_ref("ot")?,
            os: schema.hom_ref("os")?,
        };
        let expected = [
            (handles.it, handles.i, handles.t),
            (handles.is, handles.i, handles.s),
            (handles.ot, handles.o, handles.t),
            (handles.os, handles.o, handles.s),
        ];
        for (hom, dom, codom) in expected {
            if schema.hom_dom(hom) != Some(dom) || schema.hom_codom(hom) != Some(codom) {
                let name = schema.hom(hom).map(|h| h.name.as_str()).unwrap_or("?");
                return Err(AcsetError::DomainMismatch(format!(
                    "hom `{name}` does not have the Petri signature `{}` -> `{}`",
                    ob_name(schema, dom),
                    ob_name(schema, codom)
                )));
            }
        }
        Ok(handles)
    }

    fn check(&self, acset: &Acset) -> Result<()> {
        if acset.schema().owns(self.s.token()) {
            Ok(())
        } else {
            Err(AcsetError::DomainMismatch(format!(
                "Petri handles from {} used with an instance of `{}`",
                self.s.token(),
                acset.schema().name()
            )))
        }
    }
}

fn ob_name(schema: &Schema, ob: ObRef) -> &str {
    schema.ob(ob).map(|o| o.name.as_str()).unwrap_or("?")
}

fn require_part(acset: &Acset, ob: ObRef, part: PartId) -> Result<()> {
    if acset.has_part(ob, part) {
        Ok(())
    } else {
        Err(AcsetError::DanglingReference {
            ob: ob_name(acset.schema(), ob).to_string(),
            part,
        })
    }
}

/// Input arcs of transition `t`, ascending.
pub fn inputs_of(acset: &Acset, h: &PetriHandles, t: PartId) -> Result<Vec<PartId>> {
    Ok(PartId::from_bitmap(&acset.incident(h.it, t)?))
}

/// Output arcs of transition `t`, ascending.
pub fn outputs_of(acset: &Acset, h: &PetriHandles, t: PartId) -> Result<Vec<PartId>> {
    Ok(PartId::from_bitmap(&acset.incident(h.ot, t)?))
}

pub fn species_of_input(acset: &Acset, h: &PetriHandles, i: PartId) -> Result<Option<PartId>> {
    acset.get_hom(h.is, i)
}

pub fn species_of_output(acset: &Acset, h: &PetriHandles, o: PartId) -> Result<Option<PartId>> {
    acset.get_hom(h.os, o)
}

pub fn transition_of_input(acset: &Acset, h: &PetriHandles, i: PartId) -> Result<Option<PartId>> {
    acset.get_hom(h.it, i)
}

pub fn transition_of_output(acset: &Acset, h: &PetriHandles, o: PartId) -> Result<Option<PartId>> {
    acset.get_hom(h.ot, o)
}

/// Species consumed by `t`, one entry per input arc (a species consumed twice
/// appears twice). Arcs without a species are skipped.
pub fn input_species(acset: &Acset, h: &PetriHandles, t: PartId) -> Result<Vec<PartId>> {
    arc_species(acset, h.it, h.is, t)
}

/// Species produced by `t`, one entry per output arc.
pub fn output_species(acset: &Acset, h: &PetriHandles, t: PartId) -> Result<Vec<PartId>> {
    arc_species(acset, h.ot, h.os, t)
}

fn arc_species(acset: &Acset, to_t: HomRef, to_s: HomRef, t: PartId) -> Result<Vec<PartId>> {
    let arcs = acset.incident(to_t, t)?;
    let mut out = Vec::with_capacity(arcs.len() as usize);
    for arc in &arcs {
        if let Some(s) = acset.get_hom(to_s, PartId::new(arc))? {
            out.push(s);
        }
    }
    Ok(out)
}

/// Distinct transitions with an input arc from species `s`, ascending.
pub fn transitions_consuming(acset: &Acset, h: &PetriHandles, s: PartId) -> Result<Vec<PartId>> {
    arc_transitions(acset, h.is, h.it, s)
}

/// Distinct transitions with an output arc into species `s`, ascending.
pub fn transitions_producing(acset: &Acset, h: &PetriHandles, s: PartId) -> Result<Vec<PartId>> {
    arc_transitions(acset, h.os, h.ot, s)
}

fn arc_transitions(acset: &Acset, to_s: HomRef, to_t: HomRef, s: PartId) -> Result<Vec<PartId>> {
    let arcs = acset.incident(to_s, s)?;
    let mut out = RoaringBitmap::new();
    for arc in &arcs {
        if let Some(t) = acset.get_hom(to_t, PartId::new(arc))? {
            out.insert(t.raw());
        }
    }
    Ok(PartId::from_bitmap(&out))
}

/// Add an input arc from species `s` to transition `t`.
///
/// Both parts are checked before the arc is created, so a failing call leaves
/// the instance unchanged.
pub fn connect_input(acset: &mut Acset, h: &PetriHandles, s: PartId, t: PartId) -> Result<PartId> {
    connect(acset, h, h.i, (h.is, s), (h.it, t))
}

/// Add an output arc from transition `t` to species `s`.
pub fn connect_output(acset: &mut Acset, h: &PetriHandles, t: PartId, s: PartId) -> Result<PartId> {
    connect(acset, h, h.o, (h.os, s), (h.ot, t))
}

fn connect(
    acset: &mut Acset,
    h: &PetriHandles,
    arc_ob: ObRef,
    (to_s, s): (HomRef, PartId),
    (to_t, t): (HomRef, PartId),
) -> Result<PartId> {
    h.check(acset)?;
    require_part(acset, h.s, s)?;
    require_part(acset, h.t, t)?;

    let arc = acset.add_part(arc_ob)?;
    let wired = acset
        .set_hom(to_t, arc, t)
        .and_then(|()| acset.set_hom(to_s, arc, s));
    if let Err(err) = wired {
        acset.rem_part(arc_ob, arc)?;
        return Err(err);
    }
    Ok(arc)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use acsets_schema::{Hom, Ob};

    use super::*;

    fn bare_petri() -> Arc<Schema> {
        Arc::new(
            Schema::builder("Petri")
                .ob(Ob::new("S"))
                .ob(Ob::new("T"))
                .ob(Ob::new("I"))
                .ob(Ob::new("O"))
                .hom(Hom::new("it", "I", "T"))
                .hom(Hom::new("is", "I", "S"))
                .hom(Hom::new("ot", "O", "T"))
                .hom(Hom::new("os", "O", "S"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn resolves_against_any_petri_shaped_schema() {
        let schema = bare_petri();
        let h = PetriHandles::resolve(&schema).unwrap();
        assert_eq!(schema.hom_dom(h.it), Some(h.i));
    }

    #[test]
    fn rejects_swapped_signatures() {
        let schema = Schema::builder("Swapped")
            .ob(Ob::new("S"))
            .ob(Ob::new("T"))
            .ob(Ob::new("I"))
            .ob(Ob::new("O"))
            .hom(Hom::new("it", "I", "S"))
            .hom(Hom::new("is", "I", "T"))
            .hom(Hom::new("ot", "O", "T"))
            .hom(Hom::new("os", "O", "S"))
            .build()
            .unwrap();
        assert!(matches!(
            PetriHandles::resolve(&schema),
            Err(AcsetError::DomainMismatch(_))
        ));
    }

    #[test]
    fn connect_checks_before_mutating() {
        let schema = bare_petri();
        let h = PetriHandles::resolve(&schema).unwrap();
        let mut net = Acset::new(schema);
        let s = net.add_part(h.s).unwrap();
        let t = net.add_part(h.t).unwrap();

        let err = connect_input(&mut net, &h, s, PartId::new(7)).unwrap_err();
        assert!(matches!(err, AcsetError::DanglingReference { .. }));
        assert_eq!(net.nparts(h.i).unwrap(), 0);

        let i = connect_input(&mut net, &h, s, t).unwrap();
        let o = connect_output(&mut net, &h, t, s).unwrap();
        assert_eq!(species_of_input(&net, &h, i).unwrap(), Some(s));
        assert_eq!(transition_of_output(&net, &h, o).unwrap(), Some(t));
        assert_eq!(transitions_consuming(&net, &h, s).unwrap(), vec![t]);
        assert_eq!(transitions_producing(&net, &h, s).unwrap(), vec![t]);
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let h = PetriHandles::resolve(&bare_petri()).unwrap();
        let mut net = Acset::new(bare_petri());
        assert!(matches!(
            connect_input(&mut net, &h, PartId::new(0), PartId::new(0)),
            Err(AcsetError::DomainMismatch(_))
        ));
    }

    #[test]
    fn repeated_inputs_are_a_multiset() {
        let schema = bare_petri();
        let h = PetriHandles::resolve(&schema).unwrap();
        let mut net = Acset::new(schema);
        let s = net.add_part(h.s).unwrap();
        let t = net.add_part(h.t).unwrap();
        connect_input(&mut net, &h, s, t).unwrap();
        connect_input(&mut net, &h, s, t).unwrap();
        assert_eq!(input_species(&net, &h, t).unwrap(), vec![s, s]);
        assert_eq!(transitions_consuming(&net, &h, s).unwrap(), vec![t]);
        assert_eq!(inputs_of(&net, &h, t).unwrap().len(), 2);
        assert!(outputs_of(&net, &h, t).unwrap().is_empty());
        assert!(output_species(&net, &h, t).unwrap().is_empty());
    }
}
