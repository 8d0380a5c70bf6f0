use acsets_schema::{
    format_schema_text, parse_schema_text, Attr, AttrType, Hom, Ob, Schema, SchemaError,
    ValueKind,
};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,8}").unwrap()
}

fn label() -> impl Strategy<Value = Option<String>> {
    // Empty strings read back as absent, so only generate non-empty labels.
    proptest::option::of(proptest::string::string_regex("[ -~]{1,16}").unwrap())
}

fn kind() -> impl Strategy<Value = ValueKind> {
    proptest::sample::select(ValueKind::ALL.to_vec())
}

/// A random *valid* schema: unique names, all references resolvable.
fn schema_strategy() -> impl Strategy<Value = Schema> {
    (
        proptest::collection::btree_set(ident(), 1..5),
        proptest::collection::btree_set(ident(), 1..4),
    )
        .prop_flat_map(|(ob_names, ty_names)| {
            let ob_names: Vec<String> = ob_names.into_iter().collect();
            let ty_names: Vec<String> = ty_names.into_iter().collect();
            let n_obs = ob_names.len();
            let n_tys = ty_names.len();
            (
                Just(ob_names),
                Just(ty_names),
                proptest::collection::vec(label(), n_obs),
                proptest::collection::vec(kind(), n_tys),
                proptest::collection::vec((0..n_obs, 0..n_obs, label()), 0..5),
                proptest::collection::vec((0..n_obs, 0..n_tys, label(), label()), 0..6),
            )
        })
        .prop_map(|(ob_names, ty_names, ob_titles, kinds, homs, attrs)| {
            let obs = ob_names
                .iter()
                .zip(ob_titles)
                .map(|(name, title)| Ob {
                    name: name.clone(),
                    title,
                })
                .collect();
            let attrtypes = ty_names
                .iter()
                .zip(kinds)
                .map(|(name, kind)| AttrType::new(name.clone(), kind))
                .collect();
            let homs = homs
                .into_iter()
                .enumerate()
                .map(|(i, (d, c, title))| Hom {
                    name: format!("h{i}"),
                    dom: ob_names[d].clone(),
                    codom: ob_names[c].clone(),
                    title,
                })
                .collect();
            let attrs = attrs
                .into_iter()
                .enumerate()
                .map(|(i, (d, t, title, description))| Attr {
                    name: format!("a{i}"),
                    dom: ob_names[d].clone(),
                    codom: ty_names[t].clone(),
                    title,
                    description,
                })
                .collect();
            Schema::build("Generated", obs, homs, attrtypes, attrs).unwrap()
        })
}

proptest! {
    #[test]
    fn prop_format_then_parse_is_identity(schema in schema_strategy()) {
        let text = format_schema_text(&schema);
        let back = parse_schema_text(&text).unwrap();
        prop_assert_eq!(back, schema);
    }

    #[test]
    fn prop_declarations_resolve_to_themselves(schema in schema_strategy()) {
        for ob in schema.obs() {
            prop_assert_eq!(schema.lookup_ob(&ob.name).unwrap(), ob);
        }
        for hom in schema.homs() {
            let h = schema.hom_ref(&hom.name).unwrap();
            let dom = schema.hom_dom(h).and_then(|o| schema.ob(o)).unwrap();
            let codom = schema.hom_codom(h).and_then(|o| schema.ob(o)).unwrap();
            prop_assert_eq!(&dom.name, &hom.dom);
            prop_assert_eq!(&codom.name, &hom.codom);
        }
        for attr in schema.attrs() {
            let a = schema.attr_ref(&attr.name).unwrap();
            let ty = schema.attr_codom(a).and_then(|t| schema.attrtype(t)).unwrap();
            prop_assert_eq!(&ty.name, &attr.codom);
            prop_assert_eq!(schema.attr_kind(a), Some(ty.kind));
        }
    }
}

#[test]
fn duplicate_object_names_are_rejected() {
    let err = Schema::build(
        "Dup",
        vec![Ob::new("A"), Ob::new("A")],
        vec![],
        vec![],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateName { .. }));
}

#[test]
fn dangling_attr_type_is_rejected() {
    let err = Schema::build(
        "Bad",
        vec![Ob::new("A")],
        vec![],
        vec![],
        vec![Attr::new("x", "A", "Missing")],
    )
    .unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnknownAttrType {
            referenced_by: "attribute `x`".to_string(),
            name: "Missing".to_string(),
        }
    );
}

#[test]
fn serde_round_trip_revalidates() {
    let schema = Schema::builder("G")
        .ob(Ob::new("V").with_title("Vertex"))
        .ob(Ob::new("E"))
        .hom(Hom::new("src", "E", "V"))
        .attrtype(AttrType::new("W", ValueKind::Float).with_description("weight"))
        .attr(Attr::new("weight", "E", "W"))
        .build()
        .unwrap();

    let json = serde_json::to_string(&schema).unwrap();
    let back: Schema = serde_json::from_str(&json).unwrap();
    assert_eq!(back, schema);
    assert_ne!(back.token(), schema.token());

    let broken = json.replace("\"codom\":\"V\"", "\"codom\":\"Nope\"");
    assert!(serde_json::from_str::<Schema>(&broken).is_err());
}
