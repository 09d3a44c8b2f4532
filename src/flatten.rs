//! Projection of the cleaned tree into flat records.

use crate::coerce::AttrType;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Reporter};
use crate::element::{Attributes, Element, ElementKind, Value};

use log::{debug, info};
use serde::ser::{Serialize, SerializeMap, Serializer};

use std::fmt;
use std::io::{self, Write};

/// Name of the record field holding the kind of the source element.
pub const KIND_FIELD: &str = "xml";

/// Nested child collection of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Tag,
    Member,
    Nd,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Tag => "tag",
            Field::Member => "member",
            Field::Nd => "nd",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item of a nested collection: an attribute map, or a bare reference for
/// `nd` entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<'a> {
    Map(&'a Attributes),
    Ref(&'a Value),
}

impl<'a> Entry<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        match *self {
            Entry::Map(attributes) => attributes.get(name),
            Entry::Ref(value) if name == "ref" => Some(value),
            Entry::Ref(_) => None,
        }
    }
}

/// Flat, document-store friendly rendition of a top-level element.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: String,
    pub attributes: Attributes,
    pub tags: Vec<Attributes>,
    pub members: Vec<Attributes>,
    pub nodes: Vec<Value>,
}

impl Record {
    pub fn new(kind: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            kind: kind.into(),
            attributes,
            tags: Vec::new(),
            members: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Value of the tag entry with key `key`, if any.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.get_str("k") == Some(key))
            .and_then(|tag| tag.get_str("v"))
    }

    pub fn len_of(&self, field: Field) -> usize {
        match field {
            Field::Tag => self.tags.len(),
            Field::Member => self.members.len(),
            Field::Nd => self.nodes.len(),
        }
    }

    pub fn has(&self, field: Field) -> bool {
        self.len_of(field) > 0
    }

    pub fn entries(&self, field: Field) -> Vec<Entry<'_>> {
        match field {
            Field::Tag => self.tags.iter().map(Entry::Map).collect(),
            Field::Member => self.members.iter().map(Entry::Map).collect(),
            Field::Nd => self.nodes.iter().map(Entry::Ref).collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let collections = [Field::Tag, Field::Member, Field::Nd];
        let len = self.attributes.len() + 1 + collections.iter().filter(|f| self.has(**f)).count();
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, value) in self.attributes.iter() {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry(KIND_FIELD, &self.kind)?;
        if !self.tags.is_empty() {
            map.serialize_entry(Field::Tag.as_str(), &self.tags)?;
        }
        if !self.members.is_empty() {
            map.serialize_entry(Field::Member.as_str(), &self.members)?;
        }
        if !self.nodes.is_empty() {
            map.serialize_entry(Field::Nd.as_str(), &self.nodes)?;
        }
        map.end()
    }
}

/// Receives records as they are produced.
pub trait RecordSink {
    fn write(&mut self, record: Record) -> io::Result<()>;
}

impl RecordSink for Vec<Record> {
    fn write(&mut self, record: Record) -> io::Result<()> {
        self.push(record);
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn write(&mut self, record: Record) -> io::Result<()> {
        (**self).write(record)
    }
}

/// Writes every record into both sinks.
impl<A: RecordSink, B: RecordSink> RecordSink for (A, B) {
    fn write(&mut self, record: Record) -> io::Result<()> {
        self.0.write(record.clone())?;
        self.1.write(record)
    }
}

/// Streams records into a pretty-printed JSON array.
///
/// Records are serialized one by one, so the full array is never held in
/// memory. The array is closed by [`JsonArrayWriter::finish`].
pub struct JsonArrayWriter<W: Write> {
    out: W,
    num_records: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            num_records: 0,
        }
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    pub fn finish(mut self) -> io::Result<W> {
        if self.num_records == 0 {
            self.out.write_all(b"[")?;
        }
        self.out.write_all(b"\n]\n")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> RecordSink for JsonArrayWriter<W> {
    fn write(&mut self, record: Record) -> io::Result<()> {
        let separator: &[u8] = if self.num_records == 0 { b"[\n" } else { b",\n" };
        self.out.write_all(separator)?;
        serde_json::to_writer_pretty(&mut self.out, &record)?;
        self.num_records += 1;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlattenStats {
    pub num_records: usize,
    pub num_nodes: usize,
    pub num_ways: usize,
    pub num_relations: usize,
    pub num_skipped: usize,
}

/// Record of the document root, with its timestamp typed.
///
/// A timestamp which cannot be parsed stays a string and is reported.
pub fn flatten_root(
    tag: String,
    mut attributes: Attributes,
    reporter: &mut impl Reporter,
) -> Record {
    if let Some(raw) = attributes.get_str("timestamp") {
        match AttrType::Timestamp.convert(raw) {
            Some(timestamp) => attributes.set("timestamp", timestamp),
            None => reporter.report(Diagnostic::new(
                DiagnosticKind::ConversionFailure,
                format!("cannot convert into {}", AttrType::Timestamp),
                &tag,
                "timestamp",
                raw,
            )),
        }
    }
    Record::new(tag, attributes)
}

/// Record of a top-level element, or `None` if its kind is not one of
/// bounds, node, way or relation.
pub fn flatten_element(element: Element) -> Option<Record> {
    let kind = element.kind()?;
    if !matches!(
        kind,
        ElementKind::Bounds | ElementKind::Node | ElementKind::Way | ElementKind::Relation
    ) {
        return None;
    }

    let mut record = Record::new(element.tag, element.attributes);
    for child in element.children {
        match (kind, child.kind()) {
            (k, Some(ElementKind::Tag)) if k.has_tags() => record.tags.push(child.attributes),
            (ElementKind::Relation, Some(ElementKind::Member)) => {
                record.members.push(child.attributes)
            }
            (ElementKind::Way, Some(ElementKind::Nd)) => match child.attributes.get("ref") {
                Some(reference) => record.nodes.push(reference.clone()),
                None => debug!("Skipping nd without ref in way {:?}", record.get("id")),
            },
            _ => debug!("Skipping <{}> child of <{}>", child.tag, record.kind),
        }
    }
    Some(record)
}

/// Emits the root record, then one record per top-level child in document
/// order. The tree is consumed.
pub fn flatten(
    root: Element,
    sink: &mut impl RecordSink,
    reporter: &mut impl Reporter,
) -> io::Result<FlattenStats> {
    let mut stats = FlattenStats::default();
    let Element {
        tag,
        attributes,
        children,
    } = root;

    sink.write(flatten_root(tag, attributes, reporter))?;
    stats.num_records += 1;

    for element in children {
        let tag = element.tag.clone();
        let id = element.attributes.get("id").map(|v| v.to_string()).unwrap_or_default();
        let record = match flatten_element(element) {
            Some(record) => record,
            None => {
                stats.num_skipped += 1;
                reporter.report(Diagnostic::new(
                    DiagnosticKind::UnexpectedElement,
                    "skipping element of unknown kind",
                    &tag,
                    "id",
                    id,
                ));
                continue;
            }
        };
        match record.kind.as_str() {
            "node" => stats.num_nodes += 1,
            "way" => stats.num_ways += 1,
            "relation" => stats.num_relations += 1,
            _ => (),
        }
        sink.write(record)?;
        stats.num_records += 1;
    }

    info!(
        "Flattened {} records, skipped {}",
        stats.num_records, stats.num_skipped
    );
    Ok(stats)
}
