//! Reporting queries over the flattened records.

use crate::coerce::parse_timestamp;
use crate::flatten::{Field, Record};
use crate::store::{group_count, Filter, RecordStore};

use chrono::Datelike;
use itertools::Itertools;

use std::fmt;

/// Kinds of the records carrying edit metadata.
pub const ELEMENT_KINDS: [&str; 3] = ["node", "way", "relation"];

fn elements() -> Filter {
    ELEMENT_KINDS
        .iter()
        .fold(Filter::any(), |filter, kind| filter.or_kind(kind))
}

pub fn count_by_kind(store: &RecordStore) -> Vec<(String, usize)> {
    group_count(store.records().iter().map(|r| r.kind.clone()))
}

/// Number of `field` entries over all records of `kind`.
pub fn count_children(store: &RecordStore, kind: &str, field: Field) -> usize {
    store
        .unwind(&Filter::kind(kind).exists(field), field)
        .count()
}

/// Frequencies of the values of tag `key` on records of `kind`.
pub fn count_tag_values(store: &RecordStore, kind: &str, key: &str) -> Vec<(String, usize)> {
    let filter = Filter::kind(kind).exists(Field::Tag);
    group_count(
        store
            .unwind(&filter, Field::Tag)
            .filter(|(_, tag)| tag.get("k").and_then(|k| k.as_str()) == Some(key))
            .filter_map(|(_, tag)| tag.get("v").map(|v| v.to_string())),
    )
}

fn user(record: &Record) -> Option<String> {
    record.get("user").map(|user| user.to_string())
}

pub fn distinct_users(store: &RecordStore) -> usize {
    store.records().iter().filter_map(user).unique().count()
}

/// Number of records per user, most active first.
pub fn user_contributions(store: &RecordStore) -> Vec<(String, usize)> {
    group_count(store.records().iter().filter_map(user))
}

fn year_month(record: &Record) -> Option<(i32, u32)> {
    let value = record.get("timestamp")?;
    let timestamp = match value.as_timestamp() {
        Some(timestamp) => *timestamp,
        None => parse_timestamp(value.as_str()?)?,
    };
    Some((timestamp.year(), timestamp.month()))
}

/// Number of nodes, ways and relations last edited per (year, month), in
/// chronological order.
pub fn edit_history(store: &RecordStore) -> Vec<((i32, u32), usize)> {
    let filter = elements();
    let mut history = group_count(store.find(&filter).filter_map(year_month));
    history.sort_by_key(|(month, _)| *month);
    history
}

/// `(lat, lon)` of every node with readable coordinates.
pub fn node_locations(store: &RecordStore) -> Vec<(f64, f64)> {
    let filter = Filter::kind("node");
    store
        .find(&filter)
        .filter_map(|node| {
            let lat = node.get("lat")?.as_f64()?;
            let lon = node.get("lon")?.as_f64()?;
            Some((lat, lon))
        })
        .collect()
}

/// Headline numbers of a record store.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub num_records: usize,
    pub kinds: Vec<(String, usize)>,
    pub children: Vec<(String, usize)>,
    pub num_users: usize,
    pub top_users: Vec<(String, usize)>,
    pub top_amenities: Vec<(String, usize)>,
    pub first_edit: Option<(i32, u32)>,
    pub last_edit: Option<(i32, u32)>,
    pub num_locations: usize,
}

impl Summary {
    pub fn new(store: &RecordStore, top: usize) -> Self {
        let children = [
            ("node", Field::Tag),
            ("relation", Field::Member),
            ("relation", Field::Tag),
            ("way", Field::Nd),
            ("way", Field::Tag),
        ]
        .iter()
        .map(|(kind, field)| {
            (
                format!("{kind}/{field}"),
                count_children(store, kind, *field),
            )
        })
        .collect();
        let history = edit_history(store);

        let mut top_users = user_contributions(store);
        top_users.truncate(top);
        let mut top_amenities = count_tag_values(store, "node", "amenity");
        top_amenities.truncate(top);

        Self {
            num_records: store.len(),
            kinds: count_by_kind(store),
            children,
            num_users: distinct_users(store),
            top_users,
            top_amenities,
            first_edit: history.first().map(|(month, _)| *month),
            last_edit: history.last().map(|(month, _)| *month),
            num_locations: node_locations(store).len(),
        }
    }
}

fn write_month(f: &mut fmt::Formatter, month: Option<(i32, u32)>) -> fmt::Result {
    match month {
        Some((year, month)) => write!(f, "{year}-{month:02}"),
        None => write!(f, "-"),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Records: {}", self.num_records)?;
        for (kind, count) in &self.kinds {
            writeln!(f, "  {:<17}{}", format!("{kind}:"), count)?;
        }
        writeln!(f, "Children:")?;
        for (path, count) in &self.children {
            writeln!(f, "  {:<17}{}", format!("{path}:"), count)?;
        }
        writeln!(f, "Users: {}", self.num_users)?;
        for (user, count) in &self.top_users {
            writeln!(f, "  {:<17}{}", format!("{user}:"), count)?;
        }
        writeln!(f, "Amenities:")?;
        for (amenity, count) in &self.top_amenities {
            writeln!(f, "  {:<17}{}", format!("{amenity}:"), count)?;
        }
        write!(f, "Edits: ")?;
        write_month(f, self.first_edit)?;
        write!(f, " .. ")?;
        write_month(f, self.last_edit)?;
        write!(f, "\nLocated nodes: {}", self.num_locations)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::element::{Element, Value};
    use crate::flatten::flatten_element;

    fn element(tag: &str, id: i64, user: &str, timestamp: &str) -> Element {
        Element::new(tag)
            .with_attr("id", Value::Int(id))
            .with_attr("user", user)
            .with_attr("timestamp", timestamp)
    }

    fn store() -> RecordStore {
        let elements = vec![
            Element::new("bounds").with_attr("minlat", "1.2"),
            element("node", 1, "alice", "2015-03-01T10:00:00Z")
                .with_attr("lat", Value::Float(1.3))
                .with_attr("lon", Value::Float(103.8))
                .with_child(Element::tag_entry("amenity", "cafe"))
                .with_child(Element::tag_entry("name", "Starbucks")),
            element("node", 2, "bob", "2013-11-20T08:00:00Z")
                .with_attr("lat", Value::Float(1.31))
                .with_attr("lon", "east")
                .with_child(Element::tag_entry("amenity", "cafe")),
            element("node", 3, "alice", "2015-03-02T10:00:00Z")
                .with_child(Element::tag_entry("amenity", "atm")),
            element("way", 4, "carol", "2016-01-09T00:27:02Z")
                .with_child(Element::new("nd").with_attr("ref", Value::Int(1)))
                .with_child(Element::new("nd").with_attr("ref", Value::Int(2)))
                .with_child(Element::tag_entry("highway", "residential")),
            element("relation", 5, "alice", "2013-11-01T00:00:00Z").with_child(
                Element::new("member")
                    .with_attr("type", "way")
                    .with_attr("ref", Value::Int(4)),
            ),
        ];
        elements
            .into_iter()
            .filter_map(flatten_element)
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_counts() {
        let store = store();
        assert_eq!(
            count_by_kind(&store),
            [
                ("node".to_string(), 3),
                ("bounds".to_string(), 1),
                ("relation".to_string(), 1),
                ("way".to_string(), 1),
            ]
        );
        assert_eq!(count_children(&store, "node", Field::Tag), 4);
        assert_eq!(count_children(&store, "way", Field::Nd), 2);
        assert_eq!(count_children(&store, "relation", Field::Member), 1);
        assert_eq!(count_children(&store, "relation", Field::Tag), 0);
    }

    #[test]
    fn test_tag_values() {
        let store = store();
        assert_eq!(
            count_tag_values(&store, "node", "amenity"),
            [("cafe".to_string(), 2), ("atm".to_string(), 1)]
        );
        assert!(count_tag_values(&store, "way", "amenity").is_empty());
    }

    #[test]
    fn test_users() {
        let store = store();
        assert_eq!(distinct_users(&store), 3);
        let contributions = user_contributions(&store);
        assert_eq!(contributions[0], ("alice".to_string(), 3));
        assert_eq!(contributions.len(), 3);
    }

    #[test]
    fn test_edit_history_is_chronological() {
        let store = store();
        assert_eq!(
            edit_history(&store),
            [((2013, 11), 2), ((2015, 3), 2), ((2016, 1), 1)]
        );
    }

    #[test]
    fn test_node_locations() {
        assert_eq!(node_locations(&store()), [(1.3, 103.8)]);
    }

    #[test]
    fn test_summary() {
        let summary = Summary::new(&store(), 1);
        assert_eq!(summary.num_records, 6);
        assert_eq!(summary.num_users, 3);
        assert_eq!(summary.top_users.len(), 1);
        assert_eq!(summary.first_edit, Some((2013, 11)));
        assert_eq!(summary.last_edit, Some((2016, 1)));
        assert!(summary.children.contains(&("way/nd".to_string(), 2)));
        let text = summary.to_string();
        assert!(text.starts_with("Records: 6\n"));
        assert!(text.contains("Edits: 2013-11 .. 2016-01"));
    }
}
