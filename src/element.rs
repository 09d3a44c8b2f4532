//! In-memory tree of an OSM document.
//!
//! Ownership flows strictly from parent to child. Elements do not point back
//! to their parents; a child is removed by mutating the `children` of its
//! parent, which is reached by traversal (see [`Element::select_mut`]).

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use std::fmt;
use std::str::FromStr;

/// Format of all timestamps found in OSM XML extracts.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Value of an attribute.
///
/// Every value starts as `Str` when loaded; only the type coercion stage
/// produces the other variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Reads the value as a float, parsing it if it is still a string.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Str(s) => s.parse().ok(),
            Value::Int(x) => Some(*x as f64),
            Value::Float(x) => Some(*x),
            Value::Timestamp(_) => None,
        }
    }

    /// Reads the value as an integer, parsing it if it is still a string.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Str(s) => s.parse().ok(),
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(x) => write!(f, "{x}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(x) => serializer.serialize_i64(*x),
            Value::Float(x) => serializer.serialize_f64(*x),
            // extended JSON, understood by document store import tools
            Value::Timestamp(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$date", &t.format(TIMESTAMP_FORMAT).to_string())?;
                map.end()
            }
        }
    }
}

/// Attributes of an element in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Returns the value of `name` if it is present and still a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Sets `name` to `value`, keeping the position of an existing attribute.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Known element kinds of an OSM document below the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Bounds,
    Node,
    Way,
    Relation,
    Tag,
    Nd,
    Member,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "bounds" => ElementKind::Bounds,
            "node" => ElementKind::Node,
            "way" => ElementKind::Way,
            "relation" => ElementKind::Relation,
            "tag" => ElementKind::Tag,
            "nd" => ElementKind::Nd,
            "member" => ElementKind::Member,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Bounds => "bounds",
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
            ElementKind::Tag => "tag",
            ElementKind::Nd => "nd",
            ElementKind::Member => "member",
        }
    }

    /// Kinds which may carry `tag` children.
    pub fn has_tags(self) -> bool {
        matches!(
            self,
            ElementKind::Node | ElementKind::Way | ElementKind::Relation
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Attributes,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.set(name, value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Creates a `tag` entry with key `k` and value `v`.
    pub fn tag_entry(k: &str, v: &str) -> Self {
        Element::new("tag").with_attr("k", k).with_attr("v", v)
    }

    pub fn kind(&self) -> Option<ElementKind> {
        ElementKind::from_tag(&self.tag)
    }

    /// Returns a string attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get_str(name)
    }

    /// Returns `true` if this is a `tag` entry with key `key`.
    pub fn is_tag_with_key(&self, key: &str) -> bool {
        self.tag == "tag" && self.get("k") == Some(key)
    }

    pub fn children_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Iterates through this element and all its descendants in document
    /// order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Returns all elements matching `path` relative to this element.
    pub fn select<'a>(&'a self, path: &TagPath) -> Vec<&'a Element> {
        let mut result = Vec::new();
        collect(self, &path.segments, &mut result);
        result
    }

    /// Mutable version of [`Element::select`].
    pub fn select_mut<'a>(&'a mut self, path: &TagPath) -> Vec<&'a mut Element> {
        let mut result = Vec::new();
        collect_mut(self, &path.segments, &mut result);
        result
    }
}

fn collect<'a>(element: &'a Element, segments: &[String], out: &mut Vec<&'a Element>) {
    match segments.split_first() {
        None => out.push(element),
        Some((head, rest)) => {
            for child in element.children.iter().filter(|c| &c.tag == head) {
                collect(child, rest, out);
            }
        }
    }
}

fn collect_mut<'a>(element: &'a mut Element, segments: &[String], out: &mut Vec<&'a mut Element>) {
    match segments.split_first() {
        None => out.push(element),
        Some((head, rest)) => {
            for child in element.children.iter_mut().filter(|c| &c.tag == head) {
                collect_mut(child, rest, out);
            }
        }
    }
}

/// Pre-order iterator returned by [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// Slash-separated selector of elements relative to the root, e.g. `way/tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagPath {
    segments: Vec<String>,
}

impl TagPath {
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Tag of the elements selected by this path.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl From<&str> for TagPath {
    fn from(path: &str) -> Self {
        TagPath::new(path)
    }
}

impl FromStr for TagPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TagPath::new(s))
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
