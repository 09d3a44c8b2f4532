use ahash::AHashMap;
use rayon::prelude::*;

/// Set of OSM ids with compact storage for millions of entries.
#[derive(Debug, Default)]
pub struct IdSet {
    // ids are split into a bucket (x / 2^24) and the remaining 24 bits;
    // buckets are sorted by key, each bucket's ids are sorted and deduplicated
    data: Vec<(u64, Vec<u32>)>,
    len: usize,
}

#[derive(Debug, Default)]
pub struct IdSetBuilder {
    // stores the same data as IdSet, but not yet sorted
    data: AHashMap<u64, Vec<u32>>,
}

// negative ids (not yet uploaded objects) map to the upper half of u64
fn split_id(x: i64) -> (u64, u32) {
    let x = x as u64;
    (x >> 24, (x % (1_u64 << 24)) as u32)
}

impl IdSetBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, x: i64) {
        let (bucket, low) = split_id(x);
        self.data.entry(bucket).or_default().push(low);
    }

    pub fn build(self) -> IdSet {
        let mut data: Vec<_> = self.data.into_iter().collect();
        data.par_iter_mut().for_each(|(_, ids)| {
            ids.par_sort_unstable();
            ids.dedup();
        });
        data.sort_unstable_by_key(|(bucket, _)| *bucket);
        let len = data.iter().map(|(_, ids)| ids.len()).sum();
        IdSet { data, len }
    }
}

impl FromIterator<i64> for IdSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut builder = IdSetBuilder::new();
        for x in iter {
            builder.insert(x);
        }
        builder.build()
    }
}

impl IdSet {
    pub fn contains(&self, x: i64) -> bool {
        let (bucket, low) = split_id(x);
        match self.data.binary_search_by_key(&bucket, |(b, _)| *b) {
            Ok(pos) => self.data[pos].1.binary_search(&low).is_ok(),
            Err(_) => false,
        }
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
