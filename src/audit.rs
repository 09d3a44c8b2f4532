//! Read-only checks of the loaded tree: frequencies of tags, attributes,
//! keys and values, coordinate range and reference integrity.

use crate::diagnostics::{Diagnostic, DiagnosticKind, Reporter};
use crate::element::{Element, ElementKind, TagPath};
use crate::ids::{IdSet, IdSetBuilder};

use itertools::Itertools;
use log::{info, warn};

use std::collections::BTreeMap;
use std::fmt;

/// Tag-paths of an OSM document below the root.
pub const TAG_PATHS: [&str; 9] = [
    "bounds",
    "node",
    "node/tag",
    "relation",
    "relation/tag",
    "relation/member",
    "way",
    "way/nd",
    "way/tag",
];

/// Counts all elements in the tree by tag, including the root.
pub fn count_tags(root: &Element) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for element in root.descendants() {
        *counts.entry(element.tag.clone()).or_insert(0) += 1;
    }
    counts
}

/// Counts attribute names of the elements selected by `path`.
pub fn count_attributes(root: &Element, path: &TagPath) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for element in root.select(path) {
        for (name, _) in element.attributes.iter() {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Nested element counts, e.g. `osm → way → nd`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Structure {
    pub count: usize,
    pub children: BTreeMap<String, Structure>,
}

impl Structure {
    fn add(&mut self, element: &Element) {
        let entry = self.children.entry(element.tag.clone()).or_default();
        entry.count += 1;
        for child in &element.children {
            entry.add(child);
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        for (tag, child) in &self.children {
            writeln!(f, "{:indent$}{}: {}", "", tag, child.count, indent = 2 * depth)?;
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Returns the hierarchy of the document; the root is the only top-level
/// entry of the result.
pub fn structure(root: &Element) -> Structure {
    let mut result = Structure::default();
    result.add(root);
    result
}

fn sorted_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}

/// Frequency of keys of the tag entries selected by `path` (e.g.
/// `node/tag`), most frequent first.
pub fn count_keys(root: &Element, path: &TagPath) -> Vec<(String, usize)> {
    sorted_counts(root.select(path).into_iter().filter_map(|tag| tag.get("k")))
}

/// Frequency of values of the tag entries with key `key` selected by `path`,
/// most frequent first.
pub fn count_values(root: &Element, path: &TagPath, key: &str) -> Vec<(String, usize)> {
    sorted_counts(
        root.select(path)
            .into_iter()
            .filter(|tag| tag.get("k") == Some(key))
            .filter_map(|tag| tag.get("v")),
    )
}

/// Returns up to `n` elements selected by `path`.
pub fn samples<'a>(root: &'a Element, path: &TagPath, n: usize) -> Vec<&'a Element> {
    root.select(path).into_iter().take(n).collect()
}

/// Valid coordinate envelope declared by the `bounds` element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn from_element(bounds: &Element) -> Option<Self> {
        let get = |name| bounds.attributes.get(name).and_then(|v| v.as_f64());
        Some(Self {
            min_lat: get("minlat")?,
            max_lat: get("maxlat")?,
            min_lon: get("minlon")?,
            max_lon: get("maxlon")?,
        })
    }

    /// Reads the first `bounds` element below the root.
    pub fn find(root: &Element) -> Option<Self> {
        root.children_by_tag("bounds")
            .next()
            .and_then(Bounds::from_element)
    }

    pub fn contains_lat(&self, lat: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat
    }

    pub fn contains_lon(&self, lon: f64) -> bool {
        self.min_lon <= lon && lon <= self.max_lon
    }
}

/// Reports every node coordinate outside of the document's bounds and
/// returns their number.
pub fn check_coordinates(root: &Element, reporter: &mut impl Reporter) -> usize {
    let bounds = match Bounds::find(root) {
        Some(bounds) => bounds,
        None => {
            warn!("No readable bounds element, skipping coordinate check");
            return 0;
        }
    };

    let mut num_out_of_bounds = 0;
    for node in root.children_by_tag("node") {
        let coordinates: [(&str, &str, fn(&Bounds, f64) -> bool); 2] = [
            ("lat", "latitude", Bounds::contains_lat),
            ("lon", "longitude", Bounds::contains_lon),
        ];
        for (attr, name, contains) in coordinates {
            let value = match node.attributes.get(attr) {
                Some(value) => value,
                None => continue,
            };
            match value.as_f64() {
                Some(x) if contains(&bounds, x) => {}
                Some(_) => {
                    num_out_of_bounds += 1;
                    reporter.report(Diagnostic::new(
                        DiagnosticKind::OutOfBounds,
                        format!("{name} is out of range"),
                        "node",
                        attr,
                        value,
                    ));
                }
                None => reporter.report(Diagnostic::new(
                    DiagnosticKind::ConversionFailure,
                    format!("cannot read {name} as float"),
                    "node",
                    attr,
                    value,
                )),
            }
        }
    }
    info!("{} coordinates out of bounds", num_out_of_bounds);
    num_out_of_bounds
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceStats {
    pub num_refs: usize,
    pub num_unresolved_node_refs: usize,
    pub num_unresolved_way_refs: usize,
    pub num_unresolved_rel_refs: usize,
    /// References of any kind whose id is not a node id.
    pub num_missing_from_nodes: usize,
}

impl ReferenceStats {
    pub fn num_unresolved(&self) -> usize {
        self.num_unresolved_node_refs + self.num_unresolved_way_refs + self.num_unresolved_rel_refs
    }
}

fn build_id_set(root: &Element, kind: ElementKind) -> IdSet {
    let mut builder = IdSetBuilder::new();
    for element in root.children_by_tag(kind.as_str()) {
        match element.attributes.get("id").map(|id| (id, id.as_i64())) {
            Some((_, Some(id))) => builder.insert(id),
            Some((id, None)) => warn!("Ignoring {} with invalid id {:?}", kind, id.to_string()),
            None => warn!("Ignoring {} without id", kind),
        }
    }
    builder.build()
}

struct Resolver {
    nodes: IdSet,
    ways: IdSet,
    relations: IdSet,
}

impl Resolver {
    fn resolve(
        &self,
        target: ElementKind,
        path: &str,
        reference: &Element,
        stats: &mut ReferenceStats,
        reporter: &mut impl Reporter,
    ) {
        let (ids, unresolved) = match target {
            ElementKind::Way => (&self.ways, &mut stats.num_unresolved_way_refs),
            ElementKind::Relation => (&self.relations, &mut stats.num_unresolved_rel_refs),
            _ => (&self.nodes, &mut stats.num_unresolved_node_refs),
        };
        stats.num_refs += 1;

        let value = reference.attributes.get("ref");
        let id = value.and_then(|v| v.as_i64());
        if !id.map_or(false, |id| self.nodes.contains(id)) {
            stats.num_missing_from_nodes += 1;
        }
        if !id.map_or(false, |id| ids.contains(id)) {
            *unresolved += 1;
            reporter.report(Diagnostic::new(
                DiagnosticKind::DanglingReference,
                format!("{target} does not exist"),
                path,
                "ref",
                value.map(|v| v.to_string()).unwrap_or_default(),
            ));
        }
    }
}

/// Verifies that `way/nd@ref` and `relation/member@ref` point to existing
/// elements.
///
/// Members are resolved against the ids of the kind named by their `type`
/// attribute, falling back to nodes. Independently of the type, references
/// missing from the node ids are counted in
/// [`ReferenceStats::num_missing_from_nodes`]. This pass builds id sets of
/// all nodes, ways and relations and is expensive on large documents.
pub fn check_references(root: &Element, reporter: &mut impl Reporter) -> ReferenceStats {
    info!("Building id sets...");
    let resolver = Resolver {
        nodes: build_id_set(root, ElementKind::Node),
        ways: build_id_set(root, ElementKind::Way),
        relations: build_id_set(root, ElementKind::Relation),
    };
    info!(
        "Id sets built: {} nodes, {} ways, {} relations",
        resolver.nodes.len(),
        resolver.ways.len(),
        resolver.relations.len()
    );

    let mut stats = ReferenceStats::default();
    for way in root.children_by_tag("way") {
        for nd in way.children_by_tag("nd") {
            resolver.resolve(ElementKind::Node, "way/nd", nd, &mut stats, reporter);
        }
    }
    for relation in root.children_by_tag("relation") {
        for member in relation.children_by_tag("member") {
            let target = member
                .attributes
                .get("type")
                .and_then(|t| ElementKind::from_tag(&t.to_string()))
                .unwrap_or(ElementKind::Node);
            resolver.resolve(target, "relation/member", member, &mut stats, reporter);
        }
    }
    info!(
        "{} of {} references unresolved",
        stats.num_unresolved(),
        stats.num_refs
    );
    stats
}
