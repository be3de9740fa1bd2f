use std::collections::BTreeSet;

use resources::objects::DiscoverySet;

/// Membership change between the committed discovery set and a fresh fetch.
/// Clusters are compared by name only, so an endpoint or credential rotation
/// under the same name is not a change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub changed: bool,
}

impl DiscoveryDiff {
    /// `previous` is `None` until a tick has been committed; the first diff is
    /// always a change that adds every fetched cluster.
    pub fn between(previous: Option<&DiscoverySet>, fetched: &DiscoverySet) -> Self {
        let previous = match previous {
            Some(previous) => previous,
            None => {
                return Self {
                    added: fetched.names().cloned().collect(),
                    removed: BTreeSet::new(),
                    changed: true,
                }
            },
        };

        let added: BTreeSet<String> = fetched
            .names()
            .filter(|name| !previous.contains(name))
            .cloned()
            .collect();
        let removed: BTreeSet<String> = previous
            .names()
            .filter(|name| !fetched.contains(name))
            .cloned()
            .collect();
        let changed = !added.is_empty() || !removed.is_empty();

        Self {
            added,
            removed,
            changed,
        }
    }

    /// Next discovery set: records already known are kept as they were,
    /// additions come from `fetched`, removals are dropped.
    pub fn apply(&self, previous: Option<&DiscoverySet>, fetched: &DiscoverySet) -> DiscoverySet {
        let mut next = previous.cloned().unwrap_or_default();
        for name in self.removed.iter() {
            next.remove(name);
        }
        for name in self.added.iter() {
            if let Some(record) = fetched.get(name) {
                next.insert(record.to_owned());
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use resources::objects::{ClusterAuth, ClusterRecord};

    use super::*;

    fn set(names: &[&str]) -> DiscoverySet {
        names
            .iter()
            .map(|name| ClusterRecord {
                name: name.to_string(),
                endpoint: format!("{}.example", name),
                auth: ClusterAuth::default(),
            })
            .collect()
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn first_run_adds_everything() {
        let diff = DiscoveryDiff::between(None, &set(&["a", "b"]));
        assert_eq!(diff.added, names(&["a", "b"]));
        assert!(diff.removed.is_empty());
        assert!(diff.changed);
    }

    #[test]
    fn first_run_with_empty_fleet_is_a_change() {
        let diff = DiscoveryDiff::between(None, &DiscoverySet::new());
        assert!(diff.changed);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn empty_previous_set() {
        let previous = DiscoverySet::new();
        let diff = DiscoveryDiff::between(Some(&previous), &set(&["a", "b"]));
        assert_eq!(diff.added, names(&["a", "b"]));
        assert!(diff.removed.is_empty());
        assert!(diff.changed);
    }

    #[test]
    fn added_and_removed() {
        let previous = set(&["a", "b"]);
        let diff = DiscoveryDiff::between(Some(&previous), &set(&["b", "c"]));
        assert_eq!(diff.added, names(&["c"]));
        assert_eq!(diff.removed, names(&["a"]));
        assert!(diff.changed);
    }

    #[test]
    fn identical_sets_are_unchanged() {
        let previous = set(&["a", "b"]);
        let fetched = set(&["b", "a"]);
        for _ in 0..2 {
            let diff = DiscoveryDiff::between(Some(&previous), &fetched);
            assert!(!diff.changed);
            assert!(diff.added.is_empty() && diff.removed.is_empty());
        }
    }

    #[test]
    fn endpoint_change_is_not_detected() {
        let previous = set(&["a"]);
        let mut fetched = set(&["a"]);
        let mut moved = fetched.remove("a").unwrap();
        moved.endpoint = "elsewhere.example".to_string();
        fetched.insert(moved);

        let diff = DiscoveryDiff::between(Some(&previous), &fetched);
        assert!(!diff.changed);
    }

    #[test]
    fn apply_converges() {
        let diff = DiscoveryDiff::between(Some(&DiscoverySet::new()), &set(&["a"]));
        let committed = diff.apply(Some(&DiscoverySet::new()), &set(&["a"]));
        assert!(committed.contains("a"));

        let empty = DiscoverySet::new();
        let diff = DiscoveryDiff::between(Some(&committed), &empty);
        assert_eq!(diff.removed, names(&["a"]));
        let committed = diff.apply(Some(&committed), &empty);
        assert!(!committed.contains("a"));
        assert!(committed.is_empty());
    }

    #[test]
    fn apply_keeps_known_records() {
        let previous = set(&["a", "b"]);
        let mut fetched = set(&["b", "c"]);
        let mut rotated = fetched.remove("b").unwrap();
        rotated.endpoint = "rotated.example".to_string();
        fetched.insert(rotated);

        let diff = DiscoveryDiff::between(Some(&previous), &fetched);
        let next = diff.apply(Some(&previous), &fetched);
        assert_eq!(next.sorted_names(), vec!["b", "c"]);
        assert_eq!(next.get("b").unwrap().endpoint, "b.example");
    }

    #[test]
    fn inputs_are_untouched() {
        let previous = set(&["a", "b"]);
        let fetched = set(&["b", "c"]);
        let diff = DiscoveryDiff::between(Some(&previous), &fetched);
        let _ = diff.apply(Some(&previous), &fetched);
        assert_eq!(previous, set(&["a", "b"]));
        assert_eq!(fetched, set(&["b", "c"]));
    }
}
