//! Text dialect for ACSet schemas.
//!
//! A line-oriented surface syntax, one declaration per line:
//!
//! ```text
//! # Petri nets with named species
//! schema Petri:
//!   object S "Species"
//!   object T "Transition"
//!   object I
//!   hom it : I -> T "Input transition morphism"
//!   hom is : I -> S
//!   attrtype Name : text "Name"
//!   attrtype JsonStr : json "" "A string a serialized JSON object"
//!   attr sname : S -> Name "Species name"
//! ```
//!
//! Notes:
//! - Trailing quoted strings are the optional title and (for attribute types
//!   and attributes) description. An empty string means “absent”, which lets
//!   a description follow a missing title.
//! - `#` starts a comment outside of quoted strings.
//! - References are resolved after the whole block is read, so declarations
//!   may appear in any order. Resolution errors surface as
//!   `SchemaTextError::Schema`.

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, multispace0, multispace1},
    combinator::{all_consuming, recognize},
    error::{Error as NomError, ErrorKind},
    multi::many_m_n,
    sequence::{preceded, tuple},
    IResult,
};
use thiserror::Error;

use crate::schema::{Attr, AttrType, Hom, Ob, Schema, SchemaBuilder, SchemaError, ValueKind};

#[derive(Debug, Error)]
pub enum SchemaTextError {
    #[error("parse error on line {line}: {message}")]
    Line { line: usize, message: String },
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Parse a schema written in the text dialect.
pub fn parse_schema_text(text: &str) -> Result<Schema, SchemaTextError> {
    let mut builder: Option<SchemaBuilder> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let line_err = |message: String| SchemaTextError::Line {
            line: line_no,
            message,
        };

        if let Some(rest) = line.strip_prefix("schema ").map(str::trim) {
            if builder.is_some() {
                return Err(line_err(
                    "only one `schema` block is allowed per text".to_string(),
                ));
            }
            let name = rest.trim_end_matches(':').trim();
            if name.is_empty() || !name.chars().all(is_ident_continue) {
                return Err(line_err(format!("invalid schema name `{name}`")));
            }
            builder = Some(Schema::builder(name));
            continue;
        }

        let Some(current) = builder.take() else {
            return Err(line_err(
                "declaration outside of a `schema <Name>:` block".to_string(),
            ));
        };

        let keyword = line.split_whitespace().next().unwrap_or_default();
        let next = match keyword {
            "object" => current.ob(parse_object_decl(line).map_err(line_err)?),
            "hom" => current.hom(parse_hom_decl(line).map_err(line_err)?),
            "attrtype" => current.attrtype(parse_attrtype_decl(line).map_err(line_err)?),
            "attr" => current.attr(parse_attr_decl(line).map_err(line_err)?),
            other => {
                return Err(line_err(format!(
                    "unknown declaration `{other}` (expected object, hom, attrtype or attr)"
                )))
            }
        };
        builder = Some(next);
    }

    let Some(builder) = builder else {
        return Err(SchemaTextError::Line {
            line: text.lines().count().max(1),
            message: "missing `schema <Name>:` header".to_string(),
        });
    };
    Ok(builder.build()?)
}

/// Format a schema in the text dialect.
///
/// The output parses back (via `parse_schema_text`) to an equal schema,
/// except that empty titles/descriptions are read back as absent.
pub fn format_schema_text(schema: &Schema) -> String {
    let mut out = format!("schema {}:\n", schema.name());
    for ob in schema.obs() {
        out.push_str(&format!("  object {}", ob.name));
        push_strings(&mut out, &[ob.title.as_deref()]);
        out.push('\n');
    }
    for hom in schema.homs() {
        out.push_str(&format!("  hom {} : {} -> {}", hom.name, hom.dom, hom.codom));
        push_strings(&mut out, &[hom.title.as_deref()]);
        out.push('\n');
    }
    for ty in schema.attrtypes() {
        out.push_str(&format!("  attrtype {} : {}", ty.name, ty.kind));
        push_strings(&mut out, &[ty.title.as_deref(), ty.description.as_deref()]);
        out.push('\n');
    }
    for attr in schema.attrs() {
        out.push_str(&format!("  attr {} : {} -> {}", attr.name, attr.dom, attr.codom));
        push_strings(&mut out, &[attr.title.as_deref(), attr.description.as_deref()]);
        out.push('\n');
    }
    out
}

fn push_strings(out: &mut String, strings: &[Option<&str>]) {
    let Some(last) = strings.iter().rposition(Option::is_some) else {
        return;
    };
    for s in &strings[..=last] {
        out.push(' ');
        out.push_str(&quote(s.unwrap_or("")));
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ============================================================================
// Line parsers
// ============================================================================

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

fn parse_quoted(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = pchar('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(NomError::new(rest, ErrorKind::Char))),
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some(c @ ('"' | '\\')) => out.push(c),
                _ => return Err(nom::Err::Error(NomError::new(rest, ErrorKind::Escaped))),
            },
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

/// Up to `max` quoted strings; empty strings become `None`.
fn trailing_strings(input: &str, max: usize) -> IResult<&str, Vec<Option<String>>> {
    let (input, strings) = many_m_n(0, max, preceded(multispace0, parse_quoted))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((
        input,
        strings
            .into_iter()
            .map(|s| (!s.is_empty()).then_some(s))
            .collect(),
    ))
}

/// `name : dom -> codom`
fn parse_arrow(input: &str) -> IResult<&str, (&str, &str, &str)> {
    let (input, name) = parse_ident(input)?;
    let (input, _) = preceded(multispace0, pchar(':'))(input)?;
    let (input, dom) = preceded(multispace0, parse_ident)(input)?;
    let (input, _) = preceded(multispace0, tag("->"))(input)?;
    let (input, codom) = preceded(multispace0, parse_ident)(input)?;
    Ok((input, (name, dom, codom)))
}

fn parse_object_decl(line: &str) -> Result<Ob, String> {
    fn parser(input: &str) -> IResult<&str, Ob> {
        let (input, _) = tag("object")(input)?;
        let (input, _) = multispace1(input)?;
        let (input, name) = parse_ident(input)?;
        let (input, mut strings) = trailing_strings(input, 1)?;
        let mut ob = Ob::new(name);
        ob.title = strings.pop().flatten();
        Ok((input, ob))
    }

    all_consuming(parser)(line.trim())
        .map(|(_, v)| v)
        .map_err(|_| "object expects: `object <Name> [\"title\"]`".to_string())
}

fn parse_hom_decl(line: &str) -> Result<Hom, String> {
    fn parser(input: &str) -> IResult<&str, Hom> {
        let (input, _) = tag("hom")(input)?;
        let (input, _) = multispace1(input)?;
        let (input, (name, dom, codom)) = parse_arrow(input)?;
        let (input, mut strings) = trailing_strings(input, 1)?;
        let mut hom = Hom::new(name, dom, codom);
        hom.title = strings.pop().flatten();
        Ok((input, hom))
    }

    all_consuming(parser)(line.trim())
        .map(|(_, v)| v)
        .map_err(|_| "hom expects: `hom <name> : <Dom> -> <Codom> [\"title\"]`".to_string())
}

fn parse_attrtype_decl(line: &str) -> Result<AttrType, String> {
    fn parser(input: &str) -> IResult<&str, (&str, &str, Vec<Option<String>>)> {
        let (input, _) = tag("attrtype")(input)?;
        let (input, _) = multispace1(input)?;
        let (input, name) = parse_ident(input)?;
        let (input, _) = preceded(multispace0, pchar(':'))(input)?;
        let (input, kind) = preceded(multispace0, parse_ident)(input)?;
        let (input, strings) = trailing_strings(input, 2)?;
        Ok((input, (name, kind, strings)))
    }

    let (name, kind, strings) = all_consuming(parser)(line.trim())
        .map(|(_, v)| v)
        .map_err(|_| {
            "attrtype expects: `attrtype <Name> : <kind> [\"title\" [\"description\"]]`"
                .to_string()
        })?;
    let Some(kind) = ValueKind::from_keyword(kind) else {
        return Err(format!(
            "unknown value kind `{kind}` (expected text, float, json, xml or sympy)"
        ));
    };
    let mut strings = strings.into_iter();
    let mut ty = AttrType::new(name, kind);
    ty.title = strings.next().flatten();
    ty.description = strings.next().flatten();
    Ok(ty)
}

fn parse_attr_decl(line: &str) -> Result<Attr, String> {
    fn parser(input: &str) -> IResult<&str, Attr> {
        let (input, _) = tag("attr")(input)?;
        let (input, _) = multispace1(input)?;
        let (input, (name, dom, codom)) = parse_arrow(input)?;
        let (input, strings) = trailing_strings(input, 2)?;
        let mut strings = strings.into_iter();
        let mut attr = Attr::new(name, dom, codom);
        attr.title = strings.next().flatten();
        attr.description = strings.next().flatten();
        Ok((input, attr))
    }

    all_consuming(parser)(line.trim())
        .map(|(_, v)| v)
        .map_err(|_| {
            "attr expects: `attr <name> : <Dom> -> <AttrType> [\"title\" [\"description\"]]`"
                .to_string()
        })
}
