//! In-memory item registry
//!
//! This crate provides the ItemRegistry, which holds every known item and its
//! current state. It answers name and pattern lookups, enumerates group
//! membership and fires ITEM_STATE_CHANGED events on the event bus when a
//! state actually changes.

use dashmap::DashMap;
use regex::Regex;
use rules_core::events::{ItemStateChangedData, ItemStateData};
use rules_core::{Context, Event, Item, ItemState};
use rules_event_bus::EventBus;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Errors returned by registry lookups
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("item '{0}' does not exist")]
    ItemNotFound(String),

    #[error("pattern '{pattern}' matches {} items, expected one", .matches.len())]
    ItemNotUnique {
        pattern: String,
        matches: Vec<String>,
    },

    #[error("invalid item pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The registry of all items
///
/// Reads are lock-free snapshots; each item is cloned out of the map so
/// callers never hold a shard lock.
pub struct ItemRegistry {
    /// All items keyed by name
    items: DashMap<String, Item>,
    /// Event bus for firing state change events
    event_bus: Arc<EventBus>,
}

impl ItemRegistry {
    /// Create an empty registry publishing to the given event bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            items: DashMap::new(),
            event_bus,
        }
    }

    /// Add or replace an item, returning the previous definition
    #[instrument(skip(self, item), fields(item = %item.name))]
    pub fn add(&self, item: Item) -> Option<Item> {
        trace!("Adding item");
        self.items.insert(item.name.clone(), item)
    }

    /// Remove an item
    pub fn remove(&self, name: &str) -> Option<Item> {
        self.items.remove(name).map(|(_, item)| item)
    }

    /// Look up an item by name
    pub fn get(&self, name: &str) -> RegistryResult<Item> {
        self.items
            .get(name)
            .map(|item| item.clone())
            .ok_or_else(|| RegistryError::ItemNotFound(name.to_string()))
    }

    /// Check if an item exists
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Current state of an item, or None if it doesn't exist
    pub fn state(&self, name: &str) -> Option<ItemState> {
        self.items.get(name).map(|item| item.state)
    }

    /// All items, sorted by name
    pub fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.iter().map(|r| r.value().clone()).collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    /// Items whose name matches a glob pattern (`*` and `?` wildcards), sorted by name
    pub fn items_matching(&self, pattern: &str) -> RegistryResult<Vec<Item>> {
        let regex = glob_to_regex(pattern)?;
        Ok(self
            .items()
            .into_iter()
            .filter(|item| regex.is_match(&item.name))
            .collect())
    }

    /// The single item matching a glob pattern
    pub fn item_by_pattern(&self, pattern: &str) -> RegistryResult<Item> {
        let mut matches = self.items_matching(pattern)?;
        match matches.len() {
            0 => Err(RegistryError::ItemNotFound(pattern.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(RegistryError::ItemNotUnique {
                pattern: pattern.to_string(),
                matches: matches.into_iter().map(|item| item.name).collect(),
            }),
        }
    }

    /// Direct member names of a group item
    pub fn members(&self, group: &str) -> RegistryResult<Vec<String>> {
        self.get(group).map(|item| item.members().to_vec())
    }

    /// Set the state of an item
    ///
    /// The state is coerced to the item's kind. Fires ITEM_STATE_CHANGED only
    /// when the value differs from the previous one. Returns the stored state.
    #[instrument(skip(self, context), fields(item = %name))]
    pub fn set_state(
        &self,
        name: &str,
        state: ItemState,
        context: Context,
    ) -> RegistryResult<ItemState> {
        let (old_state, new_state) = {
            let mut entry = self
                .items
                .get_mut(name)
                .ok_or_else(|| RegistryError::ItemNotFound(name.to_string()))?;
            let new_state = entry.coerce(state);
            let old_state = std::mem::replace(&mut entry.state, new_state);
            (old_state, new_state)
        };

        let changed = old_state != new_state;
        debug!(state = %new_state, changed, "Setting item state");

        if changed {
            self.event_bus.fire_typed(
                ItemStateChangedData {
                    item_name: name.to_string(),
                    old_state: Some(old_state),
                    new_state,
                },
                context,
            );
        }

        Ok(new_state)
    }

    /// Apply an ITEM_STATE update event to the registry
    ///
    /// Returns true if a state was stored. Updates for unknown items or with
    /// text that isn't a state are skipped.
    pub fn apply_update(&self, event: &Event<serde_json::Value>) -> bool {
        let update = match event.parse::<ItemStateData>() {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Ignoring update event");
                return false;
            }
        };

        let state = match update.data.value() {
            Ok(state) => state,
            Err(e) => {
                trace!(item = %update.data.item_name, error = %e, "Update is not a state");
                return false;
            }
        };

        match self.set_state(&update.data.item_name, state, update.context) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Update for unknown item");
                false
            }
        }
    }

    /// Spawn a task applying every ITEM_STATE update published on the bus
    pub fn spawn_update_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut rx = self.event_bus.subscribe(rules_core::events::ITEM_STATE);

        tokio::spawn(async move {
            info!("Item registry applying bus updates");
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        registry.apply_update(&event);
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Item registry lagged by {} updates", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Get the total number of items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Compile a glob pattern (`*` and `?` wildcards) into an anchored regex
pub fn glob_to_regex(pattern: &str) -> RegistryResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| RegistryError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_core::ItemKind;

    fn make_test_setup() -> (Arc<EventBus>, ItemRegistry) {
        let event_bus = Arc::new(EventBus::new());
        let registry = ItemRegistry::new(event_bus.clone());
        (event_bus, registry)
    }

    #[test]
    fn test_add_and_get() {
        let (_, registry) = make_test_setup();
        registry.add(Item::new("FrontDoor", ItemKind::Contact).with_state(ItemState::Closed));

        let item = registry.get("FrontDoor").unwrap();
        assert_eq!(item.state, ItemState::Closed);
        assert_eq!(registry.state("FrontDoor"), Some(ItemState::Closed));
        assert!(matches!(
            registry.get("BackDoor"),
            Err(RegistryError::ItemNotFound(name)) if name == "BackDoor"
        ));
    }

    #[test]
    fn test_pattern_lookup() {
        let (_, registry) = make_test_setup();
        registry.add(Item::new("Temp_Kitchen", ItemKind::Number));
        registry.add(Item::new("Temp_Garage", ItemKind::Number));
        registry.add(Item::new("Light_Kitchen", ItemKind::Switch));

        let temps = registry.items_matching("Temp_*").unwrap();
        let names: Vec<_> = temps.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Temp_Garage", "Temp_Kitchen"]);

        assert_eq!(
            registry.item_by_pattern("Light_*").unwrap().name,
            "Light_Kitchen"
        );
        assert!(matches!(
            registry.item_by_pattern("*_Kitchen"),
            Err(RegistryError::ItemNotUnique { matches, .. }) if matches.len() == 2
        ));
        assert!(registry.items_matching("Temp.Kitchen").unwrap().is_empty());
    }

    #[test]
    fn test_members() {
        let (_, registry) = make_test_setup();
        registry.add(Item::group("gDoors", None, ["FrontDoor", "BackDoor"]));

        assert_eq!(
            registry.members("gDoors").unwrap(),
            vec!["FrontDoor".to_string(), "BackDoor".to_string()]
        );
        assert!(registry.members("gWindows").is_err());
    }

    #[tokio::test]
    async fn test_state_changed_event_fired_only_on_change() {
        let (bus, registry) = make_test_setup();
        registry.add(Item::new("Hall", ItemKind::Switch).with_state(ItemState::Off));
        let mut rx = bus.subscribe_typed::<ItemStateChangedData>();

        registry.set_state("Hall", ItemState::Off, Context::new()).unwrap();
        registry.set_state("Hall", ItemState::On, Context::new()).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.item_name, "Hall");
        assert_eq!(event.data.old_state, Some(ItemState::Off));
        assert_eq!(event.data.new_state, ItemState::On);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_set_state_coerces_dimmer() {
        let (_, registry) = make_test_setup();
        registry.add(Item::new("Kitchen", ItemKind::Dimmer));

        let stored = registry
            .set_state("Kitchen", ItemState::Decimal(30.0), Context::new())
            .unwrap();
        assert_eq!(stored, ItemState::Percent(30.0));
    }

    #[tokio::test]
    async fn test_update_listener_applies_bus_updates() {
        let (bus, registry) = make_test_setup();
        let registry = Arc::new(registry);
        registry.add(Item::new("Temp", ItemKind::Number));
        let mut changes = bus.subscribe_typed::<ItemStateChangedData>();

        let listener = registry.spawn_update_listener();
        bus.post_update("Temp", "21.5", Context::new());
        bus.post_update("AlertMsg", "not an item", Context::new());

        let change = changes.recv().await.unwrap();
        assert_eq!(change.data.new_state, ItemState::Decimal(21.5));
        assert_eq!(registry.state("Temp"), Some(ItemState::Decimal(21.5)));

        listener.abort();
    }
}
