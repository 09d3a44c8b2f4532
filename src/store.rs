//! In-memory record store answering filter, sample, unwind and group
//! queries.

use crate::flatten::{Entry, Field, Record, RecordSink};

use itertools::Itertools;
use rand::seq::IteratorRandom;
use rand::Rng;

use std::collections::BTreeMap;
use std::io;

/// Exact match on the record kind plus required nested fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    kinds: Vec<String>,
    exists: Vec<Field>,
}

impl Filter {
    /// Matches all records.
    pub fn any() -> Self {
        Default::default()
    }

    pub fn kind(kind: &str) -> Self {
        Self::any().or_kind(kind)
    }

    /// Also matches records of `kind`.
    pub fn or_kind(mut self, kind: &str) -> Self {
        self.kinds.push(kind.to_string());
        self
    }

    /// Requires a non-empty `field` collection.
    pub fn exists(mut self, field: Field) -> Self {
        self.exists.push(field);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        (self.kinds.is_empty() || self.kinds.iter().any(|k| *k == record.kind))
            && self.exists.iter().all(|field| record.has(*field))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn find<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| filter.matches(r))
    }

    pub fn find_one(&self, filter: &Filter) -> Option<&Record> {
        self.records.iter().find(|r| filter.matches(r))
    }

    pub fn count(&self, filter: &Filter) -> usize {
        self.find(filter).count()
    }

    /// Up to `n` matching records chosen uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, filter: &Filter, n: usize, rng: &mut R) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .choose_multiple(rng, n)
    }

    /// One item per entry of the `field` collection of every matching record.
    pub fn unwind<'a>(
        &'a self,
        filter: &'a Filter,
        field: Field,
    ) -> impl Iterator<Item = (&'a Record, Entry<'a>)> + 'a {
        self.find(filter)
            .flat_map(move |record| record.entries(field).into_iter().map(move |e| (record, e)))
    }
}

impl From<Vec<Record>> for RecordStore {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl RecordSink for RecordStore {
    fn write(&mut self, record: Record) -> io::Result<()> {
        self.records.push(record);
        Ok(())
    }
}

/// Counts equal keys, ordered by descending count, then key.
pub fn group_count<K: Ord>(keys: impl IntoIterator<Item = K>) -> Vec<(K, usize)> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .sorted_by(|(a, x), (b, y)| y.cmp(x).then_with(|| a.cmp(b)))
        .collect()
}
