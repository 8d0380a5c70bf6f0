//! Schema declarations and the validated `Schema` value.
//!
//! Declarations reference each other *by name* (a hom names its domain and
//! codomain objects, an attribute names its domain object and its attribute
//! type). `Schema::build` resolves every reference once, rejects duplicates,
//! and stores the resolved endpoints so handle-based access never touches a
//! string again.
//!
//! Name uniqueness is per category: object, hom and attribute type names are
//! unique among their own kind. Attribute names are unique per *domain object*,
//! so two objects may both carry e.g. a `mira_parameters` column. Unqualified
//! attribute lookups succeed only when the name is unambiguous.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handle::{AttrRef, AttrTypeRef, HomRef, ObRef, SchemaToken};

pub type Name = String;

// ============================================================================
// Declarations
// ============================================================================

/// An object (entity kind / table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ob {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Ob {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A hom: parts of `dom` map to at most one part of `codom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hom {
    pub name: Name,
    pub dom: Name,
    pub codom: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Hom {
    pub fn new(name: impl Into<Name>, dom: impl Into<Name>, codom: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            dom: dom.into(),
            codom: codom.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Runtime kind of an attribute type's values.
///
/// `Json`, `Xml` and `SymPy` are text at runtime; the tag records how the text
/// is encoded. The engine never parses encoded payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Float,
    Json,
    Xml,
    #[serde(rename = "sympy")]
    SymPy,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Text,
        ValueKind::Float,
        ValueKind::Json,
        ValueKind::Xml,
        ValueKind::SymPy,
    ];

    /// Whether values of this kind are stored as text.
    pub fn is_text(self) -> bool {
        !matches!(self, ValueKind::Float)
    }

    /// Whether this kind carries an opaque encoding tag.
    pub fn is_encoded(self) -> bool {
        matches!(self, ValueKind::Json | ValueKind::Xml | ValueKind::SymPy)
    }

    /// Keyword used by the text dialect.
    pub fn keyword(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Float => "float",
            ValueKind::Json => "json",
            ValueKind::Xml => "xml",
            ValueKind::SymPy => "sympy",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A named value domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttrType {
    pub name: Name,
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttrType {
    pub fn new(name: impl Into<Name>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An attribute: parts of `dom` map to values of the attribute type `codom`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attr {
    pub name: Name,
    pub dom: Name,
    pub codom: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attr {
    pub fn new(name: impl Into<Name>, dom: impl Into<Name>, codom: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            dom: dom.into(),
            codom: codom.into(),
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclCategory {
    Ob,
    Hom,
    AttrType,
    Attr,
}

impl fmt::Display for DeclCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclCategory::Ob => "object",
            DeclCategory::Hom => "hom",
            DeclCategory::AttrType => "attribute type",
            DeclCategory::Attr => "attribute",
        })
    }
}

/// A malformed schema. Fatal at construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate {category} name `{name}`")]
    DuplicateName { category: DeclCategory, name: Name },
    #[error("duplicate attribute `{name}` on object `{dom}`")]
    DuplicateAttr { dom: Name, name: Name },
    #[error("{referenced_by} references unknown object `{name}`")]
    UnknownOb { referenced_by: String, name: Name },
    #[error("{referenced_by} references unknown attribute type `{name}`")]
    UnknownAttrType { referenced_by: String, name: Name },
}

/// A name lookup that did not resolve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("no object named `{0}`")]
    Ob(Name),
    #[error("no hom named `{0}`")]
    Hom(Name),
    #[error("no attribute type named `{0}`")]
    AttrType(Name),
    #[error(
        "no attribute named `{name}`{}",
        .dom.as_ref().map(|d| format!(" on `{d}`")).unwrap_or_default()
    )]
    Attr { dom: Option<Name>, name: Name },
    #[error("attribute name `{name}` is ambiguous (declared on {candidates:?})")]
    Ambiguous { name: Name, candidates: Vec<Name> },
}

// ============================================================================
// Schema
// ============================================================================

/// The plain declaration lists of a schema (its serialized form).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDecl {
    pub name: Name,
    pub obs: Vec<Ob>,
    pub homs: Vec<Hom>,
    pub attrtypes: Vec<AttrType>,
    pub attrs: Vec<Attr>,
}

/// A validated, immutable schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "SchemaDecl", try_from = "SchemaDecl")]
pub struct Schema {
    token: SchemaToken,
    decl: SchemaDecl,
    ob_index: HashMap<Name, usize>,
    hom_index: HashMap<Name, usize>,
    attrtype_index: HashMap<Name, usize>,
    /// `(dom ob index, attr name) -> attr index`
    attr_index: HashMap<(usize, Name), usize>,
    /// Resolved `(dom, codom)` object indices, one per hom.
    hom_ends: Vec<(usize, usize)>,
    /// Resolved `(dom ob, codom attrtype)` indices, one per attribute.
    attr_ends: Vec<(usize, usize)>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.decl == other.decl
    }
}

impl Eq for Schema {}

impl From<Schema> for SchemaDecl {
    fn from(schema: Schema) -> Self {
        schema.decl
    }
}

impl TryFrom<SchemaDecl> for Schema {
    type Error = SchemaError;

    fn try_from(decl: SchemaDecl) -> Result<Self, Self::Error> {
        Schema::build(decl.name, decl.obs, decl.homs, decl.attrtypes, decl.attrs)
    }
}

fn index_unique<T>(
    category: DeclCategory,
    items: &[T],
    name_of: impl Fn(&T) -> &str,
) -> Result<HashMap<Name, usize>, SchemaError> {
    let mut out = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let name = name_of(item);
        if out.insert(name.to_string(), i).is_some() {
            return Err(SchemaError::DuplicateName {
                category,
                name: name.to_string(),
            });
        }
    }
    Ok(out)
}

impl Schema {
    /// Validate declarations and build a schema.
    pub fn build(
        name: impl Into<Name>,
        obs: Vec<Ob>,
        homs: Vec<Hom>,
        attrtypes: Vec<AttrType>,
        attrs: Vec<Attr>,
    ) -> Result<Self, SchemaError> {
        let ob_index = index_unique(DeclCategory::Ob, &obs, |o| o.name.as_str())?;
        let hom_index = index_unique(DeclCategory::Hom, &homs, |h| h.name.as_str())?;
        let attrtype_index = index_unique(DeclCategory::AttrType, &attrtypes, |t| t.name.as_str())?;

        let resolve_ob = |referenced_by: String, name: &str| {
            ob_index
                .get(name)
                .copied()
                .ok_or_else(|| SchemaError::UnknownOb {
                    referenced_by,
                    name: name.to_string(),
                })
        };

        let mut hom_ends = Vec::with_capacity(homs.len());
        for hom in &homs {
            let dom = resolve_ob(format!("hom `{}`", hom.name), &hom.dom)?;
            let codom = resolve_ob(format!("hom `{}`", hom.name), &hom.codom)?;
            hom_ends.push((dom, codom));
        }

        let mut attr_index = HashMap::with_capacity(attrs.len());
        let mut attr_ends = Vec::with_capacity(attrs.len());
        for (i, attr) in attrs.iter().enumerate() {
            let dom = resolve_ob(format!("attribute `{}`", attr.name), &attr.dom)?;
            let Some(&codom) = attrtype_index.get(attr.codom.as_str()) else {
                return Err(SchemaError::UnknownAttrType {
                    referenced_by: format!("attribute `{}`", attr.name),
                    name: attr.codom.clone(),
                });
            };
            if attr_index.insert((dom, attr.name.clone()), i).is_some() {
                return Err(SchemaError::DuplicateAttr {
                    dom: attr.dom.clone(),
                    name: attr.name.clone(),
                });
            }
            attr_ends.push((dom, codom));
        }

        Ok(Self {
            token: SchemaToken::fresh(),
            decl: SchemaDecl {
                name: name.into(),
                obs,
                homs,
                attrtypes,
                attrs,
            },
            ob_index,
            hom_index,
            attrtype_index,
            attr_index,
            hom_ends,
            attr_ends,
        })
    }

    pub fn builder(name: impl Into<Name>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn token(&self) -> SchemaToken {
        self.token
    }

    pub fn decl(&self) -> &SchemaDecl {
        &self.decl
    }

    pub fn obs(&self) -> &[Ob] {
        &self.decl.obs
    }

    pub fn homs(&self) -> &[Hom] {
        &self.decl.homs
    }

    pub fn attrtypes(&self) -> &[AttrType] {
        &self.decl.attrtypes
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.decl.attrs
    }

    // ------------------------------------------------------------------------
    // Name lookups
    // ------------------------------------------------------------------------

    pub fn lookup_ob(&self, name: &str) -> Result<&Ob, NotFoundError> {
        self.ob_ref(name).map(|r| &self.decl.obs[r.index()])
    }

    pub fn lookup_hom(&self, name: &str) -> Result<&Hom, NotFoundError> {
        self.hom_ref(name).map(|r| &self.decl.homs[r.index()])
    }

    pub fn lookup_attrtype(&self, name: &str) -> Result<&AttrType, NotFoundError> {
        self.attrtype_ref(name).map(|r| &self.decl.attrtypes[r.index()])
    }

    /// Look up an attribute by unqualified name.
    ///
    /// Fails with `NotFoundError::Ambiguous` when several objects declare an
    /// attribute with this name; use `lookup_attr_on` in that case.
    pub fn lookup_attr(&self, name: &str) -> Result<&Attr, NotFoundError> {
        self.attr_ref(name).map(|r| &self.decl.attrs[r.index()])
    }

    pub fn lookup_attr_on(&self, ob: &str, name: &str) -> Result<&Attr, NotFoundError> {
        let ob = self.ob_ref(ob)?;
        self.attr_ref_on(ob, name)
            .map(|r| &self.decl.attrs[r.index()])
    }

    // ------------------------------------------------------------------------
    // Handle resolution
    // ------------------------------------------------------------------------

    pub fn ob_ref(&self, name: &str) -> Result<ObRef, NotFoundError> {
        self.ob_index
            .get(name)
            .map(|&i| ObRef::new(self.token, i))
            .ok_or_else(|| NotFoundError::Ob(name.to_string()))
    }

    pub fn hom_ref(&self, name: &str) -> Result<HomRef, NotFoundError> {
        self.hom_index
            .get(name)
            .map(|&i| HomRef::new(self.token, i))
            .ok_or_else(|| NotFoundError::Hom(name.to_string()))
    }

    pub fn attrtype_ref(&self, name: &str) -> Result<AttrTypeRef, NotFoundError> {
        self.attrtype_index
            .get(name)
            .map(|&i| AttrTypeRef::new(self.token, i))
            .ok_or_else(|| NotFoundError::AttrType(name.to_string()))
    }

    pub fn attr_ref(&self, name: &str) -> Result<AttrRef, NotFoundError> {
        let matches: Vec<usize> = self
            .decl
            .attrs
            .iter()
            .enumerate()
            .filter(|(_, a)| a.name == name)
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Err(NotFoundError::Attr {
                dom: None,
                name: name.to_string(),
            }),
            [i] => Ok(AttrRef::new(self.token, *i)),
            many => Err(NotFoundError::Ambiguous {
                name: name.to_string(),
                candidates: many
                    .iter()
                    .map(|&i| self.decl.attrs[i].dom.clone())
                    .collect(),
            }),
        }
    }

    pub fn attr_ref_on(&self, ob: ObRef, name: &str) -> Result<AttrRef, NotFoundError> {
        let not_found = || NotFoundError::Attr {
            dom: self.ob(ob).map(|o| o.name.clone()),
            name: name.to_string(),
        };
        if !self.owns(ob.token()) {
            return Err(not_found());
        }
        self.attr_index
            .get(&(ob.index(), name.to_string()))
            .map(|&i| AttrRef::new(self.token, i))
            .ok_or_else(not_found)
    }

    // ------------------------------------------------------------------------
    // Handle access
    //
    // Accessors return `None` for handles resolved against another schema.
    // ------------------------------------------------------------------------

    /// Whether handles carrying `token` were resolved against this schema.
    pub fn owns(&self, token: SchemaToken) -> bool {
        self.token == token
    }

    pub fn ob(&self, r: ObRef) -> Option<&Ob> {
        self.owns(r.token()).then(|| &self.decl.obs[r.index()])
    }

    pub fn hom(&self, r: HomRef) -> Option<&Hom> {
        self.owns(r.token()).then(|| &self.decl.homs[r.index()])
    }

    pub fn attrtype(&self, r: AttrTypeRef) -> Option<&AttrType> {
        self.owns(r.token()).then(|| &self.decl.attrtypes[r.index()])
    }

    pub fn attr(&self, r: AttrRef) -> Option<&Attr> {
        self.owns(r.token()).then(|| &self.decl.attrs[r.index()])
    }

    pub fn hom_dom(&self, r: HomRef) -> Option<ObRef> {
        self.owns(r.token())
            .then(|| ObRef::new(self.token, self.hom_ends[r.index()].0))
    }

    pub fn hom_codom(&self, r: HomRef) -> Option<ObRef> {
        self.owns(r.token())
            .then(|| ObRef::new(self.token, self.hom_ends[r.index()].1))
    }

    pub fn attr_dom(&self, r: AttrRef) -> Option<ObRef> {
        self.owns(r.token())
            .then(|| ObRef::new(self.token, self.attr_ends[r.index()].0))
    }

    pub fn attr_codom(&self, r: AttrRef) -> Option<AttrTypeRef> {
        self.owns(r.token())
            .then(|| AttrTypeRef::new(self.token, self.attr_ends[r.index()].1))
    }

    /// Value kind accepted by an attribute.
    pub fn attr_kind(&self, r: AttrRef) -> Option<ValueKind> {
        self.attr_codom(r)
            .map(|t| self.decl.attrtypes[t.index()].kind)
    }

    // ------------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------------

    pub fn ob_refs(&self) -> impl Iterator<Item = ObRef> + '_ {
        (0..self.decl.obs.len()).map(|i| ObRef::new(self.token, i))
    }

    pub fn hom_refs(&self) -> impl Iterator<Item = HomRef> + '_ {
        (0..self.decl.homs.len()).map(|i| HomRef::new(self.token, i))
    }

    pub fn attr_refs(&self) -> impl Iterator<Item = AttrRef> + '_ {
        (0..self.decl.attrs.len()).map(|i| AttrRef::new(self.token, i))
    }

    /// Homs whose codomain is `ob`.
    pub fn homs_into(&self, ob: ObRef) -> impl Iterator<Item = HomRef> + '_ {
        let owned = self.owns(ob.token());
        self.hom_refs()
            .filter(move |h| owned && self.hom_ends[h.index()].1 == ob.index())
    }

    /// Homs whose domain is `ob`.
    pub fn homs_out_of(&self, ob: ObRef) -> impl Iterator<Item = HomRef> + '_ {
        let owned = self.owns(ob.token());
        self.hom_refs()
            .filter(move |h| owned && self.hom_ends[h.index()].0 == ob.index())
    }

    /// Attributes whose domain is `ob`.
    pub fn attrs_of(&self, ob: ObRef) -> impl Iterator<Item = AttrRef> + '_ {
        let owned = self.owns(ob.token());
        self.attr_refs()
            .filter(move |a| owned && self.attr_ends[a.index()].0 == ob.index())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent construction of a `Schema`; validation happens in `build`.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    decl: SchemaDecl,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            decl: SchemaDecl {
                name: name.into(),
                obs: vec![],
                homs: vec![],
                attrtypes: vec![],
                attrs: vec![],
            },
        }
    }

    pub fn ob(mut self, ob: Ob) -> Self {
        self.decl.obs.push(ob);
        self
    }

    pub fn hom(mut self, hom: Hom) -> Self {
        self.decl.homs.push(hom);
        self
    }

    pub fn attrtype(mut self, attrtype: AttrType) -> Self {
        self.decl.attrtypes.push(attrtype);
        self
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.decl.attrs.push(attr);
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        Schema::try_from(self.decl)
    }
}
