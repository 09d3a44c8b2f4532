//! Auditing, cleaning and flattening of OpenStreetMap (OSM) XML extracts.
//!
//! The document is loaded into a mutable tree of [`Element`]s, checked for
//! structural integrity, cleaned in place by a fixed sequence of rewrite
//! rules, typed according to a [`Schema`] and finally flattened into a
//! stream of JSON records suitable for a document store.

pub mod aggregate;
pub mod audit;
pub mod coerce;
pub mod diagnostics;
pub mod element;
pub mod flatten;
pub mod ids;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod stats;
pub mod store;

pub use crate::coerce::{AttrType, Schema};
pub use crate::diagnostics::{Diagnostic, DiagnosticKind, LogReporter, Reporter};
pub use crate::element::{Attributes, Element, ElementKind, TagPath, Value};
pub use crate::flatten::{JsonArrayWriter, Record, RecordSink};
pub use crate::loader::{load, load_file, load_slice, LoadError};
pub use crate::pipeline::Options;
pub use crate::stats::Stats;
pub use crate::store::{Filter, RecordStore};
