//! Structured, non-fatal findings of the audit, coercion and flattening
//! stages.

use log::warn;

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// Node coordinate outside of the declared bounds.
    OutOfBounds,
    /// `nd` or `member` reference to an element which does not exist.
    DanglingReference,
    /// Attribute value which cannot be read as its declared type.
    ConversionFailure,
    /// Top-level element of unknown kind.
    UnexpectedElement,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::OutOfBounds => "out of bounds",
            DiagnosticKind::DanglingReference => "dangling reference",
            DiagnosticKind::ConversionFailure => "conversion failure",
            DiagnosticKind::UnexpectedElement => "unexpected element",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
    pub path: String,
    pub attribute: String,
    pub value: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        detail: impl Into<String>,
        path: impl fmt::Display,
        attribute: &str,
        value: impl fmt::Display,
    ) -> Self {
        Self {
            kind,
            detail: detail.into(),
            path: path.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] {} (tag: {}, attr: {}, value: {:?})",
            self.kind, self.detail, self.path, self.attribute, self.value
        )
    }
}

/// Receives diagnostics as they are found.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl Reporter for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Logs every diagnostic as a warning and counts them per kind.
#[derive(Debug, Default)]
pub struct LogReporter {
    counts: BTreeMap<DiagnosticKind, usize>,
}

impl LogReporter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl Reporter for LogReporter {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        *self.counts.entry(diagnostic.kind).or_insert(0) += 1;
    }
}

impl fmt::Display for LogReporter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Diagnostics:")?;
        if self.counts.is_empty() {
            write!(f, "\n  none")?;
        }
        for (kind, count) in &self.counts {
            write!(f, "\n  {:<20}{}", format!("{kind}:"), count)?;
        }
        Ok(())
    }
}
