//! Rewrite rules for the values of `name` and `addr:postcode` tag entries.
//!
//! Every rule is idempotent and leaves values it does not rewrite untouched.
//! Rules are meant to run in the order of [`Rule::ALL`]: franchise patterns
//! expect capitalized names, and postcode validity expects digit-only values.

use crate::element::{Element, ElementKind, Value};

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use std::fmt;

pub const NAME_KEY: &str = "name";
pub const POSTCODE_KEY: &str = "addr:postcode";

/// Lowercase function words which are never capitalized.
const CONNECTIVES: [&str; 9] = ["of", "at", "on", "in", "by", "to", "for", "and", "the"];

const ABBREVIATIONS: [(&str, &str); 4] = [
    ("blk", "Block"),
    ("opp", "Opposite"),
    ("bef", "Before"),
    ("aft", "After"),
];

static FRANCHISES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"7.11|7.eleven|seven.11|seven.eleven", "7-Eleven"),
        (r"starbucks(?: coffee)*", "Starbucks"),
        (
            r"mcdonald.s .+|mcdonalds .+|mcdonald.s|mcdonalds",
            "McDonald's",
        ),
        (r"mos.burger", "MOS Burger"),
        (r"pizza.hut .+|pizza.hut", "Pizza Hut"),
    ]
    .iter()
    .map(|(pattern, canonical)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("invalid franchise pattern");
        (regex, *canonical)
    })
    .collect()
});

/// Postal districts are numbered 01 to 82; 74 is not assigned.
const MIN_DISTRICT: u32 = 1;
const MAX_DISTRICT: u32 = 82;
const UNASSIGNED_DISTRICT: u32 = 74;
const POSTCODE_LEN: usize = 6;

/// A rewritten value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub before: String,
    pub after: String,
}

fn is_connective(word: &str) -> bool {
    CONNECTIVES.contains(&word)
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Capitalizes the first letter of every word except connectives.
///
/// Words are split on single spaces, so runs of spaces are kept as they are.
///
/// A value is only rewritten if, after dropping connectives followed by a
/// space, some word still starts with a lowercase letter.
pub fn capitalize_words(value: &str) -> Option<String> {
    let words: Vec<&str> = value.split(' ').collect();
    let last = words.len() - 1;
    let needs_repair = words
        .iter()
        .enumerate()
        .filter(|&(i, word)| !(i < last && is_connective(word)))
        .any(|(_, word)| word.starts_with(|c: char| c.is_ascii_lowercase()));
    if !needs_repair {
        return None;
    }

    let repaired = words
        .iter()
        .map(|&word| {
            if is_connective(word) {
                word.to_string()
            } else {
                capitalize_first(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let repaired = repaired.trim_end();
    (repaired != value).then(|| repaired.to_string())
}

/// Expands `blk`, `opp`, `bef` and `aft` (any case) when they stand as a
/// word followed by a space.
pub fn expand_abbreviations(value: &str) -> Option<String> {
    let words: Vec<&str> = value.split(' ').collect();
    let last = words.len() - 1;
    let mut changed = false;
    let expanded: Vec<&str> = words
        .iter()
        .enumerate()
        .map(|(i, &word)| {
            let expansion = ABBREVIATIONS
                .iter()
                .find(|(abbreviation, _)| i < last && word.eq_ignore_ascii_case(abbreviation));
            match expansion {
                Some((_, full)) => {
                    changed = true;
                    *full
                }
                None => word,
            }
        })
        .collect();
    changed.then(|| expanded.join(" "))
}

/// Collapses spelling variants of franchise names into their canonical name.
///
/// For McDonald's and Pizza Hut everything following the name (usually the
/// branch) is dropped.
pub fn canonicalize_franchise(value: &str) -> Option<String> {
    let mut result = value.to_string();
    for (pattern, canonical) in FRANCHISES.iter() {
        if pattern.is_match(&result) {
            result = pattern.replace_all(&result, *canonical).into_owned();
        }
    }
    (result != value).then_some(result)
}

/// Removes all characters which are not ASCII digits.
pub fn strip_non_digits(value: &str) -> Option<String> {
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(value.chars().filter(char::is_ascii_digit).collect())
}

/// Six ASCII digits starting with an assigned postal district.
pub fn is_valid_postcode(value: &str) -> bool {
    if value.len() != POSTCODE_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match value[..2].parse::<u32>() {
        Ok(district) => {
            (MIN_DISTRICT..=MAX_DISTRICT).contains(&district) && district != UNASSIGNED_DISTRICT
        }
        Err(_) => false,
    }
}

fn tag_parents(root: &mut Element) -> impl Iterator<Item = &mut Element> {
    root.children
        .iter_mut()
        .filter(|child| child.kind().map_or(false, ElementKind::has_tags))
}

/// Applies `rewrite` to the value of every tag entry with key `key`.
///
/// Only values for which `rewrite` returns a new value are written back.
pub fn rewrite_values(
    root: &mut Element,
    key: &str,
    rewrite: impl Fn(&str) -> Option<String>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    for parent in tag_parents(root) {
        for tag in parent.children.iter_mut().filter(|c| c.is_tag_with_key(key)) {
            let before = match tag.get("v") {
                Some(v) => v,
                None => continue,
            };
            if let Some(after) = rewrite(before).filter(|after| after != before) {
                let before = before.to_string();
                tag.attributes.set("v", Value::Str(after.clone()));
                changes.push(Change { before, after });
            }
        }
    }
    changes
}

/// Deletes `addr:postcode` tag entries with an invalid postcode from their
/// parents and returns the removed values.
pub fn remove_invalid_postcodes(root: &mut Element) -> Vec<String> {
    let mut removed = Vec::new();
    for parent in tag_parents(root) {
        parent.children.retain(|child| {
            if !child.is_tag_with_key(POSTCODE_KEY) {
                return true;
            }
            match child.get("v") {
                Some(v) if is_valid_postcode(v) => true,
                v => {
                    let v = v.unwrap_or_default().to_string();
                    debug!("Removing invalid postcode {:?}", v);
                    removed.push(v);
                    false
                }
            }
        });
    }
    removed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Capitalize,
    ExpandAbbreviations,
    CanonicalizeFranchises,
    StripPostcodeNonDigits,
    RemoveInvalidPostcodes,
}

/// Result of applying a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Rewritten(Vec<Change>),
    Removed(Vec<String>),
}

impl RuleOutcome {
    pub fn len(&self) -> usize {
        match self {
            RuleOutcome::Rewritten(changes) => changes.len(),
            RuleOutcome::Removed(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Rule {
    /// All rules in the order they have to be applied.
    pub const ALL: [Rule; 5] = [
        Rule::Capitalize,
        Rule::ExpandAbbreviations,
        Rule::CanonicalizeFranchises,
        Rule::StripPostcodeNonDigits,
        Rule::RemoveInvalidPostcodes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::Capitalize => "capitalize",
            Rule::ExpandAbbreviations => "abbreviations",
            Rule::CanonicalizeFranchises => "franchises",
            Rule::StripPostcodeNonDigits => "postcode-digits",
            Rule::RemoveInvalidPostcodes => "postcode-validity",
        }
    }

    /// Key of the tag entries this rule applies to.
    pub fn key(self) -> &'static str {
        match self {
            Rule::Capitalize | Rule::ExpandAbbreviations | Rule::CanonicalizeFranchises => {
                NAME_KEY
            }
            Rule::StripPostcodeNonDigits | Rule::RemoveInvalidPostcodes => POSTCODE_KEY,
        }
    }

    pub fn apply(self, root: &mut Element) -> RuleOutcome {
        let outcome = match self {
            Rule::Capitalize => {
                RuleOutcome::Rewritten(rewrite_values(root, NAME_KEY, capitalize_words))
            }
            Rule::ExpandAbbreviations => {
                RuleOutcome::Rewritten(rewrite_values(root, NAME_KEY, expand_abbreviations))
            }
            Rule::CanonicalizeFranchises => {
                RuleOutcome::Rewritten(rewrite_values(root, NAME_KEY, canonicalize_franchise))
            }
            Rule::StripPostcodeNonDigits => {
                RuleOutcome::Rewritten(rewrite_values(root, POSTCODE_KEY, strip_non_digits))
            }
            Rule::RemoveInvalidPostcodes => RuleOutcome::Removed(remove_invalid_postcodes(root)),
        };
        info!("Rule {}: {} values affected", self, outcome.len());
        outcome
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub outcomes: Vec<(Rule, RuleOutcome)>,
}

impl NormalizeReport {
    pub fn outcome(&self, rule: Rule) -> Option<&RuleOutcome> {
        self.outcomes
            .iter()
            .find(|(r, _)| *r == rule)
            .map(|(_, outcome)| outcome)
    }

    pub fn num_rewritten(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                RuleOutcome::Rewritten(changes) => Some(changes.len()),
                RuleOutcome::Removed(_) => None,
            })
            .sum()
    }

    pub fn removed_postcodes(&self) -> &[String] {
        match self.outcome(Rule::RemoveInvalidPostcodes) {
            Some(RuleOutcome::Removed(values)) => values,
            _ => &[],
        }
    }
}

/// Applies all rules in order.
pub fn normalize(root: &mut Element) -> NormalizeReport {
    let outcomes = Rule::ALL
        .iter()
        .map(|&rule| (rule, rule.apply(root)))
        .collect();
    NormalizeReport { outcomes }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn names(root: &Element) -> Vec<&str> {
        root.select(&"node/tag".into())
            .into_iter()
            .filter(|t| t.is_tag_with_key(NAME_KEY))
            .filter_map(|t| t.get("v"))
            .collect()
    }

    fn tree_with_values(key: &str, values: &[&str]) -> Element {
        let mut root = Element::new("osm");
        for (i, value) in values.iter().enumerate() {
            root.children.push(
                Element::new("node")
                    .with_attr("id", i.to_string())
                    .with_child(Element::tag_entry(key, value)),
            );
        }
        root
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(
            capitalize_words("blk 123 bef ang mo kio").as_deref(),
            Some("Blk 123 Bef Ang Mo Kio")
        );
        assert_eq!(
            capitalize_words("bank of china").as_deref(),
            Some("Bank of China")
        );
        assert_eq!(
            capitalize_words("the hub at the park ").as_deref(),
            Some("the Hub at the Park")
        );
        assert_eq!(capitalize_words("Bank of China"), None);
        assert_eq!(capitalize_words("123 ABC"), None);
        assert_eq!(capitalize_words(""), None);
    }

    #[test]
    fn test_capitalize_ignores_connectives_followed_by_space_only() {
        // only lowercase words are connectives, which need no repair
        assert_eq!(capitalize_words("of the City"), None);
        // "of" at the end is not followed by a space, so it triggers, but is
        // rebuilt unchanged
        assert_eq!(capitalize_words("Bank of"), None);
        // connectives are not matched inside words
        assert_eq!(capitalize_words("Theatre ofx"), Some("Theatre Ofx".to_string()));
    }

    #[test]
    fn test_capitalize_keeps_rest_of_word() {
        assert_eq!(
            capitalize_words("mcDonald's iPhone").as_deref(),
            Some("McDonald's IPhone")
        );
        assert_eq!(capitalize_words("école").as_deref(), None);
    }

    #[test]
    fn test_capitalize_keeps_runs_of_spaces() {
        // words are split on single spaces, so empty words keep their place
        assert_eq!(
            capitalize_words("ang  mo kio").as_deref(),
            Some("Ang  Mo Kio")
        );
        assert_eq!(capitalize_words("Ang  Mo Kio"), None);
    }

    #[test]
    fn test_expand_abbreviations() {
        assert_eq!(
            expand_abbreviations("Blk 123 Opp Ang Mo Kio").as_deref(),
            Some("Block 123 Opposite Ang Mo Kio")
        );
        assert_eq!(
            expand_abbreviations("BEF Jurong aft Clementi").as_deref(),
            Some("Before Jurong After Clementi")
        );
        assert_eq!(
            expand_abbreviations("blk blk 5").as_deref(),
            Some("Block Block 5")
        );
        // not followed by a space
        assert_eq!(expand_abbreviations("Jurong Blk"), None);
        // not a whole word
        assert_eq!(expand_abbreviations("Blkx 5 Shopp 1"), None);
    }

    #[test]
    fn test_franchises() {
        for name in ["7-11", "Seven Eleven", "7 Eleven", "7-ELEVEN", "seven-11"] {
            assert_eq!(canonicalize_franchise(name).as_deref().unwrap_or(name), "7-Eleven");
        }
        assert_eq!(
            canonicalize_franchise("McDonald's Tampines").as_deref(),
            Some("McDonald's")
        );
        assert_eq!(canonicalize_franchise("Mcdonalds").as_deref(), Some("McDonald's"));
        assert_eq!(
            canonicalize_franchise("Starbucks Coffee").as_deref(),
            Some("Starbucks")
        );
        assert_eq!(
            canonicalize_franchise("starbucks coffee coffee").as_deref(),
            Some("Starbucks")
        );
        assert_eq!(canonicalize_franchise("Mos Burger").as_deref(), Some("MOS Burger"));
        assert_eq!(
            canonicalize_franchise("Pizza Hut Express Bedok").as_deref(),
            Some("Pizza Hut")
        );
        assert_eq!(canonicalize_franchise("7-Eleven"), None);
        assert_eq!(canonicalize_franchise("Ang Mo Kio Library"), None);
    }

    #[test]
    fn test_strip_non_digits() {
        assert_eq!(strip_non_digits("S118556").as_deref(), Some("118556"));
        assert_eq!(
            strip_non_digits("Singapore 408564").as_deref(),
            Some("408564")
        );
        assert_eq!(strip_non_digits("n/a").as_deref(), Some(""));
        assert_eq!(strip_non_digits("118556"), None);
    }

    #[test]
    fn test_postcode_validity() {
        assert!(is_valid_postcode("118556"));
        assert!(is_valid_postcode("560123"));
        assert!(is_valid_postcode("018956"));
        assert!(is_valid_postcode("828761"));
        assert!(!is_valid_postcode("740123"));
        assert!(!is_valid_postcode("830000"));
        assert!(!is_valid_postcode("000123"));
        assert!(!is_valid_postcode("11855"));
        assert!(!is_valid_postcode("1185566"));
        assert!(!is_valid_postcode("S11855"));
        assert!(!is_valid_postcode(""));
    }

    #[test]
    fn test_rules_record_only_changed_values() {
        let mut root = tree_with_values(NAME_KEY, &["ang mo kio", "Bedok"]);
        let outcome = Rule::Capitalize.apply(&mut root);
        assert_eq!(
            outcome,
            RuleOutcome::Rewritten(vec![Change {
                before: "ang mo kio".to_string(),
                after: "Ang Mo Kio".to_string(),
            }])
        );
        assert_eq!(names(&root), ["Ang Mo Kio", "Bedok"]);
    }

    #[test]
    fn test_rules_only_touch_their_key() {
        let mut root = tree_with_values("amenity", &["blk 7-11 S123"]);
        let before = root.clone();
        for rule in Rule::ALL {
            assert!(rule.apply(&mut root).is_empty());
        }
        assert_eq!(root, before);
    }

    #[test]
    fn test_remove_invalid_postcodes_keeps_parent() {
        let mut root = tree_with_values(POSTCODE_KEY, &["S118556", "740123", "12345"]);
        root.children[1]
            .children
            .push(Element::tag_entry(NAME_KEY, "Somewhere"));

        Rule::StripPostcodeNonDigits.apply(&mut root);
        let removed = Rule::RemoveInvalidPostcodes.apply(&mut root);
        assert_eq!(
            removed,
            RuleOutcome::Removed(vec!["740123".to_string(), "12345".to_string()])
        );

        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[0].children[0].get("v"), Some("118556"));
        assert_eq!(root.children[1].children.len(), 1);
        assert_eq!(root.children[1].children[0].get("k"), Some(NAME_KEY));
        assert!(root.children[2].children.is_empty());
    }

    #[test]
    fn test_postcodes_of_ways_and_relations() {
        let mut root = Element::new("osm")
            .with_child(Element::new("way").with_child(Element::tag_entry(POSTCODE_KEY, "#999999")))
            .with_child(
                Element::new("relation").with_child(Element::tag_entry(POSTCODE_KEY, "S 408564")),
            );
        let report = normalize(&mut root);
        assert_eq!(report.removed_postcodes(), ["999999"]);
        assert!(root.children[0].children.is_empty());
        assert_eq!(root.children[1].children[0].get("v"), Some("408564"));
    }

    #[test]
    fn test_normalize_in_order() {
        let mut root = tree_with_values(
            NAME_KEY,
            &["blk 123 opp ang mo kio", "seven eleven", "mcdonald's tampines"],
        );
        let report = normalize(&mut root);
        assert_eq!(
            names(&root),
            ["Block 123 Opposite Ang Mo Kio", "7-Eleven", "McDonald's"]
        );
        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.outcome(Rule::Capitalize).map(RuleOutcome::len), Some(3));
        assert_eq!(report.num_rewritten(), 3 + 1 + 2);
    }

    #[test]
    fn test_normalize_twice_is_noop() {
        let mut root = tree_with_values(
            NAME_KEY,
            &["blk 123 opp ang mo kio", "starbucks coffee", "pizza hut bedok"],
        );
        normalize(&mut root);
        let once = root.clone();
        let report = normalize(&mut root);
        assert_eq!(root, once);
        assert_eq!(report.num_rewritten(), 0);
        assert!(report.removed_postcodes().is_empty());
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        let words = prop::sample::select(vec![
            "blk", "Blk", "opp", "bef", "aft", "of", "the", "and", "ang", "mo", "kio",
            "123", "starbucks", "coffee", "mcdonald's", "7-11", "seven", "eleven", "pizza",
            "hut", "mos", "burger", "", "Jurong",
        ]);
        prop::collection::vec(words, 1..8).prop_map(|words| words.join(" "))
    }

    proptest! {
        #[test]
        fn name_rules_are_idempotent(ref name in name_strategy()) {
            for rewrite in [capitalize_words, expand_abbreviations, canonicalize_franchise] {
                let once = rewrite(name).unwrap_or_else(|| name.clone());
                prop_assert_eq!(rewrite(&once), None);
            }
        }

        #[test]
        fn normalize_is_idempotent(ref names in prop::collection::vec(name_strategy(), 1..5)) {
            let values: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut root = tree_with_values(NAME_KEY, &values);
            normalize(&mut root);
            let once = root.clone();
            normalize(&mut root);
            prop_assert_eq!(root, once);
        }

        #[test]
        fn digits_are_kept_in_order(ref value in "\\PC*") {
            let digits: String = value.chars().filter(char::is_ascii_digit).collect();
            let stripped = strip_non_digits(value).unwrap_or_else(|| value.clone());
            prop_assert_eq!(&stripped, &digits);
            prop_assert_eq!(strip_non_digits(&stripped), None);
        }
    }
}
