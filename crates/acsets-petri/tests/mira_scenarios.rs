use std::sync::Arc;

use acsets_core::{
    Acset, AcsetConfig, AcsetError, AcsetSnapshot, DeletionPolicy, PartId, SharedAcset, Value,
    ValueKind,
};
use acsets_petri::{mira_schema, MiraHandles, MiraNet, SpeciesAttrs, TransitionAttrs};
use acsets_schema::{format_schema_text, parse_schema_text};

fn mira_acset() -> anyhow::Result<(Acset, MiraHandles)> {
    let schema = Arc::new(mira_schema()?);
    let handles = MiraHandles::resolve(&schema)?;
    Ok((Acset::new(schema), handles))
}

#[test]
fn schema_declarations_resolve_by_name() -> anyhow::Result<()> {
    let schema = mira_schema()?;
    let species = schema.lookup_ob("S")?;
    assert_eq!(species.name, "S");
    assert_eq!(species.title.as_deref(), Some("Species"));
    assert_eq!(schema.lookup_hom("is")?.codom, "S");
    assert_eq!(schema.lookup_attrtype("JsonStr")?.kind, ValueKind::Json);
    assert_eq!(
        (
            schema.obs().len(),
            schema.homs().len(),
            schema.attrtypes().len(),
            schema.attrs().len()
        ),
        (5, 4, 5, 18)
    );
    Ok(())
}

#[test]
fn species_ids_start_at_zero() -> anyhow::Result<()> {
    let (mut acset, h) = mira_acset()?;
    let s = h.petri.s;
    assert_eq!(acset.add_part(s)?, PartId::new(0));
    assert_eq!(acset.add_part(s)?, PartId::new(1));
    assert_eq!(
        acset.parts(s)?.collect::<Vec<_>>(),
        vec![PartId::new(0), PartId::new(1)]
    );
    Ok(())
}

#[test]
fn each_object_has_its_own_id_space() -> anyhow::Result<()> {
    let (mut acset, h) = mira_acset()?;
    let p = h.petri;
    assert_eq!(acset.add_part(p.t)?, PartId::new(0));
    assert_eq!(acset.add_part(p.i)?, PartId::new(0));
    acset.set_hom(p.it, PartId::new(0), PartId::new(0))?;

    let err = acset
        .set_hom(p.it, PartId::new(0), PartId::new(5))
        .unwrap_err();
    assert_eq!(
        err,
        AcsetError::DanglingReference {
            ob: "T".to_string(),
            part: PartId::new(5),
        }
    );
    assert_eq!(acset.get_hom(p.it, PartId::new(0))?, Some(PartId::new(0)));
    Ok(())
}

#[test]
fn species_names_are_text_only() -> anyhow::Result<()> {
    let (mut acset, h) = mira_acset()?;
    let species = acset.add_part(h.petri.s)?;
    acset.set_attr(h.sname, species, "S1")?;
    assert_eq!(acset.get_attr(h.sname, species)?, Some(&Value::from("S1")));

    let err = acset.set_attr(h.sname, species, 2.5).unwrap_err();
    assert!(matches!(err, AcsetError::TypeMismatch { expected: ValueKind::Text, .. }));
    assert_eq!(acset.get_attr(h.sname, species)?, Some(&Value::from("S1")));
    Ok(())
}

#[test]
fn removing_a_transition_clears_its_arcs() -> anyhow::Result<()> {
    let (mut acset, h) = mira_acset()?;
    let p = h.petri;
    let t = acset.add_part(p.t)?;
    let i = acset.add_part(p.i)?;
    acset.set_hom(p.it, i, t)?;

    acset.rem_part(p.t, t)?;
    assert_eq!(acset.get_hom(p.it, i)?, None);
    assert!(!acset.parts(p.t)?.any(|x| x == t));
    assert!(acset.has_part(p.i, i));
    assert!(acset.check_integrity().ok());
    Ok(())
}

#[test]
fn reject_policy_keeps_referenced_species() -> anyhow::Result<()> {
    let config = AcsetConfig::default().with_deletion(DeletionPolicy::Reject);
    let mut net = MiraNet::sir_demo_with_config(config)?;
    let infected = net.species_by_name("I")?.expect("I species");

    let before = net.acset().snapshot();
    let err = net.remove_species(infected).unwrap_err();
    assert!(matches!(err, AcsetError::StillReferenced { .. }));
    assert_eq!(net.acset().snapshot(), before);
    Ok(())
}

#[test]
fn cascade_removal_of_a_species_unwires_arcs() -> anyhow::Result<()> {
    let mut net = MiraNet::sir_demo()?;
    let recovered = net.species_by_name("R")?.expect("R species");
    let recovery = net.transition_by_name("recovery")?.expect("recovery");

    net.remove_species(recovered)?;
    assert!(net.output_species(recovery)?.is_empty());
    assert_eq!(net.outputs_of(recovery)?.len(), 1);
    assert_eq!(net.species_by_name("R")?, None);
    assert_eq!(net.species()?.count(), 2);
    Ok(())
}

#[test]
fn transition_metadata_is_indexed() -> anyhow::Result<()> {
    let mut net = MiraNet::new()?;
    let t = net.add_transition(
        "decay",
        TransitionAttrs {
            parameter_value: Some(-0.0),
            mira_rate_law_mathml: Some("<apply><times/><ci>k</ci></apply>".to_string()),
            ..TransitionAttrs::default()
        },
    )?;
    let h = *net.handles();
    let hits = net.acset().incident_attr(h.parameter_value, &Value::Float(0.0))?;
    assert_eq!(PartId::from_bitmap(&hits), vec![t]);
    assert_eq!(net.transition_name(t)?, Some("decay"));
    Ok(())
}

#[test]
fn species_paths_follow_arcs() -> anyhow::Result<()> {
    let net = MiraNet::sir_demo()?;
    let p = net.handles().petri;
    let susceptible = net.species_by_name("S")?.expect("S species");
    let infection = net.transition_by_name("infection")?.expect("infection");

    let arc = net.inputs_of(infection)?[0];
    assert_eq!(net.acset().follow_path(&[p.is], arc)?, Some(susceptible));
    let arcs = net.acset().incident_path(&[p.it], infection)?;
    assert_eq!(PartId::from_bitmap(&arcs), net.inputs_of(infection)?);
    Ok(())
}

#[test]
fn mira_schema_survives_the_text_dialect() -> anyhow::Result<()> {
    let schema = mira_schema()?;
    let text = format_schema_text(&schema);
    assert!(text.contains("attr sname : S -> Name"));
    let parsed = parse_schema_text(&text)?;
    assert_eq!(parsed, schema);
    Ok(())
}

#[test]
fn snapshot_replays_into_a_fresh_net() -> anyhow::Result<()> {
    let net = MiraNet::sir_demo()?;
    let snap = net.acset().snapshot();
    let json = serde_json::to_string_pretty(&snap)?;
    let back: AcsetSnapshot = serde_json::from_str(&json)?;

    let schema = Arc::new(mira_schema()?);
    let replayed = MiraNet::from_acset(Acset::from_snapshot(schema, &back)?)?;
    assert_eq!(replayed.acset().snapshot(), snap);
    assert_eq!(replayed.species_by_name("I")?, net.species_by_name("I")?);
    Ok(())
}

#[test]
fn shared_net_serializes_writers() -> anyhow::Result<()> {
    let net = MiraNet::new()?;
    let h = *net.handles();
    let shared = SharedAcset::new(net.into_acset());

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                shared.write(|a| -> Result<(), AcsetError> {
                    let s = a.add_part(h.petri.s)?;
                    a.set_attr(h.sname, s, format!("S{n}"))
                })
            })
        })
        .collect();
    for w in workers {
        w.join().expect("worker panicked")?;
    }

    let names: Vec<String> = shared.read(|a| {
        a.parts(h.petri.s)
            .into_iter()
            .flatten()
            .filter_map(|s| a.get_attr(h.sname, s).ok().flatten().map(ToString::to_string))
            .collect()
    });
    assert_eq!(names.len(), 4);
    let mut net = MiraNet::from_acset(shared.to_acset())?;
    assert!(net.species_by_name("S2")?.is_some());
    net.add_species("S9", SpeciesAttrs::default())?;
    Ok(())
}
