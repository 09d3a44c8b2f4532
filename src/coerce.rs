//! Conversion of string attributes into typed values.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Reporter};
use crate::element::{Element, TagPath, Value, TIMESTAMP_FORMAT};

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;

use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    Str,
    Timestamp,
}

impl AttrType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttrType::Int => "int",
            AttrType::Float => "float",
            AttrType::Str => "string",
            AttrType::Timestamp => "timestamp",
        }
    }

    /// Converts `raw` into a value of this type.
    pub fn convert(self, raw: &str) -> Option<Value> {
        match self {
            AttrType::Int => raw.parse().ok().map(Value::Int),
            AttrType::Float => raw.parse().ok().map(Value::Float),
            AttrType::Str => Some(Value::Str(raw.to_string())),
            AttrType::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Declared attribute types per tag-path.
///
/// The default is [`Schema::osm`].
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    entries: Vec<(TagPath, Vec<(String, AttrType)>)>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::osm()
    }
}

impl Schema {
    /// Empty schema.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, path: &str, attributes: &[(&str, AttrType)]) -> Self {
        let attributes = attributes
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect();
        self.entries.push((TagPath::new(path), attributes));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagPath, &[(String, AttrType)])> {
        self.entries
            .iter()
            .map(|(path, attributes)| (path, attributes.as_slice()))
    }

    pub fn get(&self, path: &TagPath, attribute: &str) -> Option<AttrType> {
        self.iter()
            .filter(|(p, _)| *p == path)
            .flat_map(|(_, attributes)| attributes.iter())
            .find(|(name, _)| name == attribute)
            .map(|(_, ty)| *ty)
    }

    /// Attribute types of OSM XML documents.
    pub fn osm() -> Self {
        use AttrType::*;
        let tag: &[(&str, AttrType)] = &[("k", Str), ("v", Str)];
        let element: &[(&str, AttrType)] = &[
            ("changeset", Int),
            ("id", Int),
            ("timestamp", Timestamp),
            ("uid", Int),
            ("user", Str),
            ("version", Int),
        ];
        let node: Vec<(&str, AttrType)> = element
            .iter()
            .copied()
            .chain([("lat", Float), ("lon", Float)])
            .collect();
        Schema::new()
            .with(
                "bounds",
                &[
                    ("maxlat", Float),
                    ("maxlon", Float),
                    ("minlat", Float),
                    ("minlon", Float),
                ],
            )
            .with("node", &node)
            .with("node/tag", tag)
            .with("relation", element)
            .with("relation/tag", tag)
            .with(
                "relation/member",
                &[("ref", Int), ("role", Str), ("type", Str)],
            )
            .with("way", element)
            .with("way/nd", &[("ref", Int)])
            .with("way/tag", tag)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoerceStats {
    pub num_converted: usize,
    pub num_failed: usize,
}

impl AddAssign for CoerceStats {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.num_converted += other.num_converted;
        self.num_failed += other.num_failed;
    }
}

/// Converts the attribute `name` of `element` to `ty`.
///
/// Values which are not strings anymore are left alone. On failure the
/// string is kept and a diagnostic is reported.
pub fn coerce_attribute(
    element: &mut Element,
    path: &TagPath,
    name: &str,
    ty: AttrType,
    reporter: &mut impl Reporter,
) -> CoerceStats {
    let mut stats = CoerceStats::default();
    if ty == AttrType::Str {
        return stats;
    }
    let raw = match element.get(name) {
        Some(raw) => raw,
        None => return stats,
    };
    match ty.convert(raw) {
        Some(value) => {
            element.attributes.set(name, value);
            stats.num_converted += 1;
        }
        None => {
            reporter.report(Diagnostic::new(
                DiagnosticKind::ConversionFailure,
                format!("cannot convert into {ty}"),
                path,
                name,
                raw,
            ));
            stats.num_failed += 1;
        }
    }
    stats
}

/// Converts all attributes declared by `schema`, tag-path by tag-path.
pub fn coerce(root: &mut Element, schema: &Schema, reporter: &mut impl Reporter) -> CoerceStats {
    let mut stats = CoerceStats::default();
    for (path, attributes) in schema.iter() {
        let mut elements = root.select_mut(path);
        for (name, ty) in attributes {
            for element in elements.iter_mut() {
                stats += coerce_attribute(element, path, name, *ty, reporter);
            }
        }
    }
    info!(
        "Converted {} attributes, {} conversions failed",
        stats.num_converted, stats.num_failed
    );
    stats
}
