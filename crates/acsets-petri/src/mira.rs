//! MiraNet: Petri nets annotated with MIRA model metadata.
//!
//! Species, transitions and observables carry names, numeric values and
//! opaque encoded payloads (JSON, MathML, SymPy expressions). The payloads
//! are stored as text and never interpreted here.

use std::sync::{Arc, OnceLock};

use acsets_core::{
    Acset, AcsetConfig, AcsetError, AttrRef, ObRef, PartId, Parts, Result, Schema, Value,
    ValueKind,
};
use acsets_schema::{Attr, AttrType, Hom, Ob, SchemaError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::petri::{self, PetriHandles};

/// Build the MiraNet schema.
///
/// Both `T` and `B` declare `mira_parameters` and
/// `mira_parameter_distributions`; resolve those with `attr_ref_on`.
pub fn mira_schema() -> std::result::Result<Schema, SchemaError> {
    let name_attr = |name: &str, dom: &str, title: &str, what: &str| {
        Attr::new(name, dom, "Name")
            .with_title(title)
            .with_description(format!("An attribute representing the name of a {what}."))
    };

    Schema::builder("MiraNet")
        .ob(Ob::new("S").with_title("Species"))
        .ob(Ob::new("T").with_title("Transition"))
        .ob(Ob::new("I").with_title("Input"))
        .ob(Ob::new("O").with_title("Output"))
        .ob(Ob::new("B").with_title("Observable"))
        .hom(Hom::new("it", "I", "T").with_title("Input transition morphism"))
        .hom(Hom::new("is", "I", "S").with_title("Input species morphism"))
        .hom(Hom::new("ot", "O", "T").with_title("Output transition morphism"))
        .hom(Hom::new("os", "O", "S").with_title("Output species morphism"))
        .attrtype(AttrType::new("Name", ValueKind::Text).with_title("Name"))
        .attrtype(AttrType::new("Value", ValueKind::Float))
        .attrtype(
            AttrType::new("JsonStr", ValueKind::Json)
                .with_description("A string a serialized JSON object"),
        )
        .attrtype(
            AttrType::new("XmlStr", ValueKind::Xml)
                .with_description("A string representing an XML object as a string"),
        )
        .attrtype(AttrType::new("SymPyStr", ValueKind::SymPy).with_description(
            "A string representing an expression in the SymPy Python package's \
             internal domain specific language (DSL).",
        ))
        .attr(name_attr("sname", "S", "Species name", "species"))
        .attr(name_attr("tname", "T", "Transition name", "transition"))
        .attr(Attr::new("parameter_name", "T", "Name"))
        .attr(Attr::new("parameter_value", "T", "Value"))
        .attr(Attr::new("mira_ids", "S", "JsonStr"))
        .attr(Attr::new("mira_context", "S", "JsonStr"))
        .attr(Attr::new("mira_concept", "S", "JsonStr"))
        .attr(Attr::new("mira_initial_value", "S", "Value"))
        .attr(Attr::new("template_type", "T", "Name"))
        .attr(Attr::new("mira_rate_law", "T", "SymPyStr"))
        .attr(Attr::new("mira_rate_law_mathml", "T", "XmlStr"))
        .attr(Attr::new("mira_template", "T", "JsonStr"))
        .attr(Attr::new("mira_parameters", "T", "JsonStr"))
        .attr(Attr::new("mira_parameter_distributions", "T", "JsonStr"))
        .attr(Attr::new("concept", "B", "JsonStr"))
        .attr(Attr::new("expression", "B", "SymPyStr"))
        .attr(Attr::new("mira_parameters", "B", "JsonStr"))
        .attr(Attr::new("mira_parameter_distributions", "B", "JsonStr"))
        .build()
}

#[derive(Debug, Error)]
pub enum MiraError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Acset(#[from] AcsetError),
}

/// Optional species metadata. JSON fields hold serialized JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesAttrs {
    pub mira_ids: Option<String>,
    pub mira_context: Option<String>,
    pub mira_concept: Option<String>,
    pub mira_initial_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionAttrs {
    pub parameter_name: Option<String>,
    pub parameter_value: Option<f64>,
    pub template_type: Option<String>,
    /// SymPy expression text.
    pub mira_rate_law: Option<String>,
    /// MathML text.
    pub mira_rate_law_mathml: Option<String>,
    pub mira_template: Option<String>,
    pub mira_parameters: Option<String>,
    pub mira_parameter_distributions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservableAttrs {
    pub concept: Option<String>,
    pub expression: Option<String>,
    pub mira_parameters: Option<String>,
    pub mira_parameter_distributions: Option<String>,
}

/// Every MiraNet handle, resolved once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiraHandles {
    pub petri: PetriHandles,
    pub b: ObRef,

    pub sname: AttrRef,
    pub mira_ids: AttrRef,
    pub mira_context: AttrRef,
    pub mira_concept: AttrRef,
    pub mira_initial_value: AttrRef,

    pub tname: AttrRef,
    pub parameter_name: AttrRef,
    pub parameter_value: AttrRef,
    pub template_type: AttrRef,
    pub mira_rate_law: AttrRef,
    pub mira_rate_law_mathml: AttrRef,
    pub mira_template: AttrRef,
    pub t_mira_parameters: AttrRef,
    pub t_mira_parameter_distributions: AttrRef,

    pub concept: AttrRef,
    pub expression: AttrRef,
    pub b_mira_parameters: AttrRef,
    pub b_mira_parameter_distributions: AttrRef,
}

impl MiraHandles {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let petri = PetriHandles::resolve(schema)?;
        let b = schema.ob_ref("B")?;
        let (s, t) = (petri.s, petri.t);
        Ok(Self {
            petri,
            b,
            sname: schema.attr_ref_on(s, "sname")?,
            mira_ids: schema.attr_ref_on(s, "mira_ids")?,
            mira_context: schema.attr_ref_on(s, "mira_context")?,
            mira_concept: schema.attr_ref_on(s, "mira_concept")?,
            mira_initial_value: schema.attr_ref_on(s, "mira_initial_value")?,
            tname: schema.attr_ref_on(t, "tname")?,
            parameter_name: schema.attr_ref_on(t, "parameter_name")?,
            parameter_value: schema.attr_ref_on(t, "parameter_value")?,
            template_type: schema.attr_ref_on(t, "template_type")?,
            mira_rate_law: schema.attr_ref_on(t, "mira_rate_law")?,
            mira_rate_law_mathml: schema.attr_ref_on(t, "mira_rate_law_mathml")?,
            mira_template: schema.attr_ref_on(t, "mira_template")?,
            t_mira_parameters: schema.attr_ref_on(t, "mira_parameters")?,
            t_mira_parameter_distributions: schema
                .attr_ref_on(t, "mira_parameter_distributions")?,
            concept: schema.attr_ref_on(b, "concept")?,
            expression: schema.attr_ref_on(b, "expression")?,
            b_mira_parameters: schema.attr_ref_on(b, "mira_parameters")?,
            b_mira_parameter_distributions: schema
                .attr_ref_on(b, "mira_parameter_distributions")?,
        })
    }
}

fn push_text(values: &mut Vec<(AttrRef, Value)>, attr: AttrRef, text: &Option<String>) {
    if let Some(text) = text {
        values.push((attr, Value::Text(text.clone())));
    }
}

fn push_float(values: &mut Vec<(AttrRef, Value)>, attr: AttrRef, x: Option<f64>) {
    if let Some(x) = x {
        values.push((attr, Value::Float(x)));
    }
}

static SHARED_MIRA_SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();

/// The process-wide MiraNet schema, built on first use.
///
/// Every `MiraNet::new`/`with_config` instance shares it, so handles resolved
/// against one net are valid on all of them.
pub fn shared_mira_schema() -> std::result::Result<Arc<Schema>, SchemaError> {
    if let Some(schema) = SHARED_MIRA_SCHEMA.get() {
        return Ok(Arc::clone(schema));
    }
    let built = Arc::new(mira_schema()?);
    Ok(Arc::clone(SHARED_MIRA_SCHEMA.get_or_init(|| built)))
}

const DEFAULT_NET_NAME: &str = "MiraNet";

/// A MiraNet instance: an `Acset` over the MiraNet schema plus its handles.
#[derive(Debug, Clone)]
pub struct MiraNet {
    name: String,
    acset: Acset,
    handles: MiraHandles,
}

impl MiraNet {
    pub fn new() -> std::result::Result<Self, MiraError> {
        Self::with_config(AcsetConfig::default())
    }

    /// An empty net over the shared schema.
    pub fn with_config(config: AcsetConfig) -> std::result::Result<Self, MiraError> {
        Ok(Self::with_schema(shared_mira_schema()?, config)?)
    }

    /// An empty net over `schema`, which must have the MiraNet shape.
    pub fn with_schema(schema: Arc<Schema>, config: AcsetConfig) -> Result<Self> {
        Self::from_acset(Acset::with_config(schema, config))
    }

    /// Wrap an existing instance whose schema has the MiraNet shape.
    pub fn from_acset(acset: Acset) -> Result<Self> {
        let handles = MiraHandles::resolve(acset.schema())?;
        Ok(Self {
            name: DEFAULT_NET_NAME.to_string(),
            acset,
            handles,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handles(&self) -> &MiraHandles {
        &self.handles
    }

    pub fn acset(&self) -> &Acset {
        &self.acset
    }

    /// Direct access to the underlying instance.
    pub fn acset_mut(&mut self) -> &mut Acset {
        &mut self.acset
    }

    pub fn into_acset(self) -> Acset {
        self.acset
    }

    /// Add a part carrying `values`; the part is removed again if any value
    /// is refused.
    fn add_with_values(&mut self, ob: ObRef, values: Vec<(AttrRef, Value)>) -> Result<PartId> {
        for (attr, value) in &values {
            let kind = self.acset.schema().attr_kind(*attr);
            if let Some(kind) = kind.filter(|&k| !value.conforms_to(k)) {
                let name = self.acset.schema().attr(*attr).map(|a| a.name.clone());
                return Err(AcsetError::TypeMismatch {
                    attr: name.unwrap_or_default(),
                    expected: kind,
                    found: value.kind_name(),
                });
            }
        }

        let part = self.acset.add_part(ob)?;
        for (attr, value) in values {
            if let Err(err) = self.acset.set_attr(attr, part, value) {
                self.acset.rem_part(ob, part)?;
                return Err(err);
            }
        }
        Ok(part)
    }

    pub fn add_species(&mut self, name: &str, attrs: SpeciesAttrs) -> Result<PartId> {
        let h = self.handles;
        let mut values = vec![(h.sname, Value::from(name))];
        push_text(&mut values, h.mira_ids, &attrs.mira_ids);
        push_text(&mut values, h.mira_context, &attrs.mira_context);
        push_text(&mut values, h.mira_concept, &attrs.mira_concept);
        push_float(&mut values, h.mira_initial_value, attrs.mira_initial_value);
        let s = self.add_with_values(h.petri.s, values)?;
        debug!(species = name, part = s.raw(), "add_species");
        Ok(s)
    }

    pub fn add_transition(&mut self, name: &str, attrs: TransitionAttrs) -> Result<PartId> {
        let h = self.handles;
        let mut values = vec![(h.tname, Value::from(name))];
        push_text(&mut values, h.parameter_name, &attrs.parameter_name);
        push_float(&mut values, h.parameter_value, attrs.parameter_value);
        push_text(&mut values, h.template_type, &attrs.template_type);
        push_text(&mut values, h.mira_rate_law, &attrs.mira_rate_law);
        push_text(&mut values, h.mira_rate_law_mathml, &attrs.mira_rate_law_mathml);
        push_text(&mut values, h.mira_template, &attrs.mira_template);
        push_text(&mut values, h.t_mira_parameters, &attrs.mira_parameters);
        push_text(
            &mut values,
            h.t_mira_parameter_distributions,
            &attrs.mira_parameter_distributions,
        );
        let t = self.add_with_values(h.petri.t, values)?;
        debug!(transition = name, part = t.raw(), "add_transition");
        Ok(t)
    }

    pub fn add_observable(&mut self, attrs: ObservableAttrs) -> Result<PartId> {
        let h = self.handles;
        let mut values = Vec::new();
        push_text(&mut values, h.concept, &attrs.concept);
        push_text(&mut values, h.expression, &attrs.expression);
        push_text(&mut values, h.b_mira_parameters, &attrs.mira_parameters);
        push_text(
            &mut values,
            h.b_mira_parameter_distributions,
            &attrs.mira_parameter_distributions,
        );
        self.add_with_values(h.b, values)
    }

    pub fn connect_input(&mut self, s: PartId, t: PartId) -> Result<PartId> {
        petri::connect_input(&mut self.acset, &self.handles.petri, s, t)
    }

    pub fn connect_output(&mut self, t: PartId, s: PartId) -> Result<PartId> {
        petri::connect_output(&mut self.acset, &self.handles.petri, t, s)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn species(&self) -> Result<Parts<'_>> {
        self.acset.parts(self.handles.petri.s)
    }

    pub fn transitions(&self) -> Result<Parts<'_>> {
        self.acset.parts(self.handles.petri.t)
    }

    pub fn observables(&self) -> Result<Parts<'_>> {
        self.acset.parts(self.handles.b)
    }

    pub fn species_name(&self, s: PartId) -> Result<Option<&str>> {
        Ok(self
            .acset
            .get_attr(self.handles.sname, s)?
            .and_then(Value::as_text))
    }

    pub fn transition_name(&self, t: PartId) -> Result<Option<&str>> {
        Ok(self
            .acset
            .get_attr(self.handles.tname, t)?
            .and_then(Value::as_text))
    }

    /// Lowest-id species named `name`, found through the `sname` index.
    pub fn species_by_name(&self, name: &str) -> Result<Option<PartId>> {
        let hits = self.acset.incident_attr(self.handles.sname, &Value::from(name))?;
        Ok(hits.min().map(PartId::new))
    }

    /// Lowest-id transition named `name`.
    pub fn transition_by_name(&self, name: &str) -> Result<Option<PartId>> {
        let hits = self.acset.incident_attr(self.handles.tname, &Value::from(name))?;
        Ok(hits.min().map(PartId::new))
    }

    pub fn inputs_of(&self, t: PartId) -> Result<Vec<PartId>> {
        petri::inputs_of(&self.acset, &self.handles.petri, t)
    }

    pub fn outputs_of(&self, t: PartId) -> Result<Vec<PartId>> {
        petri::outputs_of(&self.acset, &self.handles.petri, t)
    }

    pub fn input_species(&self, t: PartId) -> Result<Vec<PartId>> {
        petri::input_species(&self.acset, &self.handles.petri, t)
    }

    pub fn output_species(&self, t: PartId) -> Result<Vec<PartId>> {
        petri::output_species(&self.acset, &self.handles.petri, t)
    }

    pub fn transitions_consuming(&self, s: PartId) -> Result<Vec<PartId>> {
        petri::transitions_consuming(&self.acset, &self.handles.petri, s)
    }

    pub fn transitions_producing(&self, s: PartId) -> Result<Vec<PartId>> {
        petri::transitions_producing(&self.acset, &self.handles.petri, s)
    }

    /// Remove a species under the instance's deletion policy.
    pub fn remove_species(&mut self, s: PartId) -> Result<()> {
        self.acset.rem_part(self.handles.petri.s, s)
    }

    // ------------------------------------------------------------------------
    // Demo
    // ------------------------------------------------------------------------

    /// The SIR epidemic model: `S + I -> 2I` at rate `beta*S*I`, `I -> R` at
    /// rate `gamma*I`.
    pub fn sir_demo() -> std::result::Result<Self, MiraError> {
        Self::sir_demo_with_config(AcsetConfig::default())
    }

    pub fn sir_demo_with_config(config: AcsetConfig) -> std::result::Result<Self, MiraError> {
        let mut net = Self::with_config(config)?;

        let concept = |name: &str| format!(r#"{{"name": "{name}"}}"#);
        let susceptible = net.add_species(
            "S",
            SpeciesAttrs {
                mira_concept: Some(concept("susceptible_population")),
                mira_initial_value: Some(990.0),
                ..SpeciesAttrs::default()
            },
        )?;
        let infected = net.add_species(
            "I",
            SpeciesAttrs {
                mira_concept: Some(concept("infected_population")),
                mira_initial_value: Some(10.0),
                ..SpeciesAttrs::default()
            },
        )?;
        let recovered = net.add_species(
            "R",
            SpeciesAttrs {
                mira_concept: Some(concept("immune_population")),
                mira_initial_value: Some(0.0),
                ..SpeciesAttrs::default()
            },
        )?;

        let infection = net.add_transition(
            "infection",
            TransitionAttrs {
                parameter_name: Some("beta".to_string()),
                parameter_value: Some(0.0003),
                template_type: Some("ControlledConversion".to_string()),
                mira_rate_law: Some("beta*S*I".to_string()),
                ..TransitionAttrs::default()
            },
        )?;
        let recovery = net.add_transition(
            "recovery",
            TransitionAttrs {
                parameter_name: Some("gamma".to_string()),
                parameter_value: Some(0.1),
                template_type: Some("NaturalConversion".to_string()),
                mira_rate_law: Some("gamma*I".to_string()),
                ..TransitionAttrs::default()
            },
        )?;

        net.connect_input(susceptible, infection)?;
        net.connect_input(infected, infection)?;
        net.connect_output(infection, infected)?;
        net.connect_output(infection, infected)?;
        net.connect_input(infected, recovery)?;
        net.connect_output(recovery, recovered)?;

        net.add_observable(ObservableAttrs {
            concept: Some(concept("infected_population")),
            expression: Some("I".to_string()),
            ..ObservableAttrs::default()
        })?;

        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use acsets_schema::NotFoundError;

    use super::*;

    #[test]
    fn schema_has_the_mira_shape() {
        let schema = mira_schema().unwrap();
        assert_eq!(schema.name(), "MiraNet");
        assert_eq!(schema.obs().len(), 5);
        assert_eq!(schema.homs().len(), 4);
        assert_eq!(schema.attrtypes().len(), 5);
        assert_eq!(schema.attrs().len(), 18);
        assert_eq!(schema.lookup_ob("S").unwrap().title.as_deref(), Some("Species"));
        assert_eq!(schema.lookup_attrtype("SymPyStr").unwrap().kind, ValueKind::SymPy);
    }

    #[test]
    fn shared_attr_names_need_a_domain() {
        let schema = mira_schema().unwrap();
        assert!(matches!(
            schema.lookup_attr("mira_parameters"),
            Err(NotFoundError::Ambiguous { .. })
        ));
        assert_eq!(schema.lookup_attr_on("B", "mira_parameters").unwrap().dom, "B");
        assert_eq!(schema.lookup_attr("sname").unwrap().dom, "S");
    }

    #[test]
    fn sir_demo_wiring() {
        let net = MiraNet::sir_demo().unwrap();
        let s = net.species_by_name("S").unwrap().unwrap();
        let i = net.species_by_name("I").unwrap().unwrap();
        let r = net.species_by_name("R").unwrap().unwrap();
        let infection = net.transition_by_name("infection").unwrap().unwrap();
        let recovery = net.transition_by_name("recovery").unwrap().unwrap();

        assert_eq!(net.input_species(infection).unwrap(), vec![s, i]);
        assert_eq!(net.output_species(infection).unwrap(), vec![i, i]);
        assert_eq!(net.input_species(recovery).unwrap(), vec![i]);
        assert_eq!(net.output_species(recovery).unwrap(), vec![r]);
        assert_eq!(net.transitions_consuming(i).unwrap(), vec![infection, recovery]);
        assert_eq!(net.transitions_producing(r).unwrap(), vec![recovery]);
        assert_eq!(net.observables().unwrap().count(), 1);
        assert!(net.acset().check_integrity().ok());
    }

    #[test]
    fn nets_share_one_schema_and_its_handles() {
        let first = MiraNet::new().unwrap();
        let mut second = MiraNet::sir_demo().unwrap().with_name("SIR");
        assert!(Arc::ptr_eq(first.acset().schema(), second.acset().schema()));
        assert_eq!(first.name(), "MiraNet");
        assert_eq!(second.name(), "SIR");

        let h = *first.handles();
        let s = second.acset_mut().add_part(h.petri.s).unwrap();
        second.acset_mut().set_attr(h.sname, s, "V").unwrap();
        assert_eq!(second.species_by_name("V").unwrap(), Some(s));
    }

    #[test]
    fn with_schema_checks_the_shape() {
        let own = Arc::new(mira_schema().unwrap());
        let net = MiraNet::with_schema(Arc::clone(&own), AcsetConfig::default()).unwrap();
        assert!(Arc::ptr_eq(net.acset().schema(), &own));
        assert!(!Arc::ptr_eq(&own, &shared_mira_schema().unwrap()));

        let other = Arc::new(
            Schema::builder("NotPetri")
                .ob(Ob::new("S"))
                .build()
                .unwrap(),
        );
        assert!(MiraNet::with_schema(other, AcsetConfig::default()).is_err());
    }

    #[test]
    fn failed_connect_leaves_net_unchanged() {
        let mut net = MiraNet::new().unwrap();
        let s = net.add_species("S", SpeciesAttrs::default()).unwrap();
        let before = net.acset().snapshot();
        assert!(net.connect_input(s, PartId::new(0)).is_err());
        assert_eq!(net.acset().snapshot(), before);
    }
}
