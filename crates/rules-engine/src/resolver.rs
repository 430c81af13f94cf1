//! Item resolution: flattening requested items and groups into a watch-list

use rules_core::Item;
use rules_item_registry::ItemRegistry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The items a rule was asked to watch, with their friendly names
///
/// Plain names use the name itself as the friendly name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSelection(Vec<(String, String)>);

impl ItemSelection {
    /// Requested (name, friendly name) pairs in processing order
    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }

    fn identity<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self(
            names
                .into_iter()
                .map(|name| {
                    let name = name.into();
                    (name.clone(), name)
                })
                .collect(),
        )
    }
}

impl From<&str> for ItemSelection {
    fn from(name: &str) -> Self {
        Self::identity([name])
    }
}

impl From<String> for ItemSelection {
    fn from(name: String) -> Self {
        Self::identity([name])
    }
}

impl From<(&str, &str)> for ItemSelection {
    fn from((name, friendly): (&str, &str)) -> Self {
        Self(vec![(name.to_string(), friendly.to_string())])
    }
}

impl From<Vec<&str>> for ItemSelection {
    fn from(names: Vec<&str>) -> Self {
        Self::identity(names)
    }
}

impl From<Vec<String>> for ItemSelection {
    fn from(names: Vec<String>) -> Self {
        Self::identity(names)
    }
}

impl<const N: usize> From<[&str; N]> for ItemSelection {
    fn from(names: [&str; N]) -> Self {
        Self::identity(names)
    }
}

impl From<Vec<(&str, &str)>> for ItemSelection {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(name, friendly)| (name.to_string(), friendly.to_string()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for ItemSelection {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl From<HashMap<String, String>> for ItemSelection {
    fn from(map: HashMap<String, String>) -> Self {
        // Sorted so that friendly-name conflicts resolve the same way every run
        Self::from(map.into_iter().collect::<BTreeMap<_, _>>())
    }
}

/// Resolved item name -> friendly name mapping
///
/// Built once when a rule is constructed and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    entries: BTreeMap<String, String>,
}

impl WatchList {
    /// Resolved item names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Friendly name of a watched item
    pub fn friendly_name(&self, item_name: &str) -> Option<&str> {
        self.entries.get(item_name).map(String::as_str)
    }

    /// Check if an item is watched
    pub fn contains(&self, item_name: &str) -> bool {
        self.entries.contains_key(item_name)
    }

    /// (name, friendly name) pairs, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flattens item selections into watch-lists
///
/// A group without a base type is a transparent container and is replaced by
/// its members, recursively; every other item, including a group with a base
/// type, is watched as a single item.
pub struct ItemResolver {
    registry: Arc<ItemRegistry>,
    depth_limit: usize,
}

impl ItemResolver {
    /// Create a resolver expanding at most `depth_limit` levels of nested groups
    pub fn new(registry: Arc<ItemRegistry>, depth_limit: usize) -> Self {
        Self {
            registry,
            depth_limit,
        }
    }

    /// Resolve a selection into a watch-list
    ///
    /// Unknown names are logged and dropped. When two requests resolve to
    /// the same item the later request's friendly name wins.
    pub fn resolve(&self, selection: impl Into<ItemSelection>) -> WatchList {
        let selection = selection.into();
        let mut entries = BTreeMap::new();

        for (name, friendly) in selection.entries() {
            let item = match self.registry.get(name) {
                Ok(item) => item,
                Err(e) => {
                    warn!(item = %name, error = %e, "Item does not exist, ignored");
                    continue;
                }
            };

            if item.is_transparent_group() {
                trace!(group = %name, "Expanding group without base type");
                self.expand_group(&item, friendly, &mut entries);
            } else {
                trace!(item = %name, "Adding item");
                entries.insert(item.name, friendly.clone());
            }
        }

        debug!(requested = selection.entries().len(), resolved = entries.len(), "Resolved watch-list");
        WatchList { entries }
    }

    /// Breadth-first expansion of a transparent group into `entries`
    fn expand_group(&self, group: &Item, friendly: &str, entries: &mut BTreeMap<String, String>) {
        let mut visited = HashSet::from([group.name.clone()]);
        let mut queue: VecDeque<(String, usize)> =
            group.members().iter().map(|m| (m.clone(), 1)).collect();

        while let Some((name, depth)) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                trace!(group = %group.name, member = %name, "Member already visited");
                continue;
            }

            let member = match self.registry.get(&name) {
                Ok(member) => member,
                Err(e) => {
                    warn!(group = %group.name, member = %name, error = %e, "Group member does not exist, ignored");
                    continue;
                }
            };

            if !member.is_transparent_group() {
                entries.insert(member.name, friendly.to_string());
            } else if depth < self.depth_limit {
                queue.extend(member.members().iter().map(|m| (m.clone(), depth + 1)));
            } else {
                warn!(
                    group = %group.name,
                    nested = %name,
                    limit = self.depth_limit,
                    "Group nesting exceeds depth limit, not expanded"
                );
            }
        }
    }
}
