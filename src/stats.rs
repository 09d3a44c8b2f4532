use crate::audit::ReferenceStats;
use crate::coerce::CoerceStats;
use crate::flatten::FlattenStats;

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub num_out_of_bounds: usize,
    pub references: Option<ReferenceStats>,
    pub num_rewritten: usize,
    pub num_removed_postcodes: usize,
    pub coerce: CoerceStats,
    pub flatten: FlattenStats,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            r#"Audited:
  out of bounds:     {}"#,
            self.num_out_of_bounds
        )?;
        match self.references {
            Some(ref refs) => write!(
                f,
                r#"
Unresolved refs:
  nodes:             {}
  ways:              {}
  relations:         {}
  not node ids:      {}"#,
                refs.num_unresolved_node_refs,
                refs.num_unresolved_way_refs,
                refs.num_unresolved_rel_refs,
                refs.num_missing_from_nodes
            )?,
            None => write!(f, "\nUnresolved refs:     not checked")?,
        }
        write!(
            f,
            r#"
Cleaned:
  rewritten values:  {}
  removed postcodes: {}
  typed attributes:  {}
  failed attributes: {}
Converted:
  records:           {}
  nodes:             {}
  ways:              {}
  relations:         {}
  skipped:           {}"#,
            self.num_rewritten,
            self.num_removed_postcodes,
            self.coerce.num_converted,
            self.coerce.num_failed,
            self.flatten.num_records,
            self.flatten.num_nodes,
            self.flatten.num_ways,
            self.flatten.num_relations,
            self.flatten.num_skipped
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let stats = Stats {
            num_out_of_bounds: 2,
            references: None,
            num_rewritten: 5,
            num_removed_postcodes: 1,
            coerce: CoerceStats {
                num_converted: 30,
                num_failed: 0,
            },
            flatten: FlattenStats {
                num_records: 4,
                num_nodes: 2,
                num_ways: 1,
                num_relations: 0,
                num_skipped: 0,
            },
        };
        let text = stats.to_string();
        assert!(text.starts_with("Audited:\n  out of bounds:     2\n"));
        assert!(text.contains("Unresolved refs:     not checked"));
        assert!(text.contains("  removed postcodes: 1\n"));
        assert!(text.ends_with("  skipped:           0"));

        let stats = Stats {
            references: Some(ReferenceStats {
                num_refs: 10,
                num_unresolved_node_refs: 3,
                num_missing_from_nodes: 4,
                ..Default::default()
            }),
            ..stats
        };
        let text = stats.to_string();
        assert!(text.contains("Unresolved refs:\n  nodes:             3\n"));
        assert!(text.contains("  not node ids:      4\n"));
    }
}
