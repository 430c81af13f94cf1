//! Base for rules watching a set of items

use rules_core::ItemState;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::base::RuleBase;
use crate::host::RuleHost;
use crate::resolver::{ItemSelection, WatchList};

/// A [`RuleBase`] plus the resolved watch-list
///
/// Dereferences to [`RuleBase`], so hooks receiving an `ItemRuleBase` can
/// use every base helper directly.
#[derive(Debug, Clone)]
pub struct ItemRuleBase {
    base: RuleBase,
    watch: Arc<WatchList>,
}

impl ItemRuleBase {
    /// Resolve `selection` against the host registry
    pub fn new(host: &RuleHost, kind: &str, selection: impl Into<ItemSelection>) -> Self {
        let base = RuleBase::new(host, kind);
        let watch = host.resolver().resolve(selection);
        if watch.is_empty() {
            warn!(rule = %base.name(), "No items to watch");
        }
        Self {
            base,
            watch: Arc::new(watch),
        }
    }

    /// The resolved watch-list
    pub fn watch_list(&self) -> &WatchList {
        &self.watch
    }

    /// Friendly name of an item, or the name itself when it isn't watched
    pub fn friendly_name<'a>(&'a self, item_name: &'a str) -> &'a str {
        self.watch.friendly_name(item_name).unwrap_or(item_name)
    }

    /// Check if every watched item currently has `state`
    ///
    /// Numeric states compare by value. Items that no longer exist are logged and skipped. True for an empty
    /// watch-list.
    pub fn all(&self, state: ItemState) -> bool {
        for name in self.watch.names() {
            match self.host().items.state(name) {
                Some(current) if !current.same_value(&state) => {
                    debug!(rule = %self.name(), item = %name, state = %current, "all: mismatch");
                    return false;
                }
                Some(_) => {}
                None => warn!(rule = %self.name(), item = %name, "Item does not exist, ignored"),
            }
        }
        true
    }

    /// Check if any watched item currently has `state`
    ///
    /// Numeric states compare by value. Items that no longer exist are logged and skipped. False for an empty
    /// watch-list.
    pub fn any(&self, state: ItemState) -> bool {
        for name in self.watch.names() {
            match self.host().items.state(name) {
                Some(current) if current.same_value(&state) => {
                    debug!(rule = %self.name(), item = %name, state = %current, "any: match");
                    return true;
                }
                Some(_) => {}
                None => warn!(rule = %self.name(), item = %name, "Item does not exist, ignored"),
            }
        }
        false
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.base.set_name(name);
    }
}

impl Deref for ItemRuleBase {
    type Target = RuleBase;

    fn deref(&self) -> &RuleBase {
        &self.base
    }
}
