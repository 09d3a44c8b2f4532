//! The ordered stages of a run: audit, clean (normalize, then coerce) and
//! flatten.

use crate::audit::{self, ReferenceStats, Structure, TAG_PATHS};
use crate::coerce::{coerce, CoerceStats, Schema};
use crate::diagnostics::Reporter;
use crate::element::{Element, TagPath};
use crate::flatten::{flatten, RecordSink};
use crate::normalize::{normalize, NormalizeReport};
use crate::stats::Stats;

use log::info;

use std::collections::BTreeMap;
use std::fmt;
use std::io;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Run the expensive reference check.
    pub check_references: bool,
    pub schema: Schema,
}

/// Result of the read-only checks of the loaded tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub tags: BTreeMap<String, usize>,
    pub attributes: Vec<(TagPath, BTreeMap<String, usize>)>,
    pub structure: Structure,
    pub num_out_of_bounds: usize,
    pub references: Option<ReferenceStats>,
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Tags:")?;
        for (tag, count) in &self.tags {
            writeln!(f, "  {:<17}{}", format!("{tag}:"), count)?;
        }
        writeln!(f, "Attributes:")?;
        for (path, counts) in &self.attributes {
            writeln!(f, "  {path}:")?;
            for (name, count) in counts {
                writeln!(f, "    {:<15}{}", format!("{name}:"), count)?;
            }
        }
        write!(f, "Structure:\n{}", self.structure)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub normalize: NormalizeReport,
    pub coerce: CoerceStats,
}

pub fn audit(root: &Element, options: &Options, reporter: &mut impl Reporter) -> AuditReport {
    info!("Auditing...");
    let attributes = TAG_PATHS
        .iter()
        .map(|path| {
            let path = TagPath::new(path);
            let counts = audit::count_attributes(root, &path);
            (path, counts)
        })
        .collect();
    let references = if options.check_references {
        Some(audit::check_references(root, reporter))
    } else {
        info!("Skipping reference check");
        None
    };
    AuditReport {
        tags: audit::count_tags(root),
        attributes,
        structure: audit::structure(root),
        num_out_of_bounds: audit::check_coordinates(root, reporter),
        references,
    }
}

/// Normalizes values, then converts attribute types.
pub fn clean(root: &mut Element, schema: &Schema, reporter: &mut impl Reporter) -> CleanReport {
    info!("Cleaning...");
    let normalize = normalize(root);
    let coerce = coerce(root, schema, reporter);
    CleanReport { normalize, coerce }
}

/// Cleans and flattens an already audited tree into `sink`.
pub fn convert(
    mut root: Element,
    audit: &AuditReport,
    options: &Options,
    sink: &mut impl RecordSink,
    reporter: &mut impl Reporter,
) -> io::Result<Stats> {
    let clean = clean(&mut root, &options.schema, reporter);
    info!("Flattening...");
    let flatten = flatten(root, sink, reporter)?;
    Ok(Stats {
        num_out_of_bounds: audit.num_out_of_bounds,
        references: audit.references,
        num_rewritten: clean.normalize.num_rewritten(),
        num_removed_postcodes: clean.normalize.removed_postcodes().len(),
        coerce: clean.coerce,
        flatten,
    })
}

/// Runs all stages on `root`, writing the records into `sink`.
pub fn run(
    root: Element,
    options: &Options,
    sink: &mut impl RecordSink,
    reporter: &mut impl Reporter,
) -> io::Result<Stats> {
    let audit = audit(&root, options, reporter);
    convert(root, &audit, options, sink, reporter)
}
