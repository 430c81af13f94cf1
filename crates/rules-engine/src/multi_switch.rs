//! MultiSwitchRule: route button presses to numbered handlers
//!
//! Buttons get slots 1..N in the order they are listed. An optional number
//! item selects a slot by its integer value, which lets a single item act as
//! a bank of virtual buttons.

use rules_core::events::ItemStateChangedData;
use rules_core::{Event, ItemState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::base::RuleBase;
use crate::error::{RuleError, RuleResult};
use crate::host::RuleHost;
use crate::rule::{malformed, run_hook, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Handler for one slot
pub type SlotHandler =
    Arc<dyn Fn(&RuleBase, &Event<ItemStateChangedData>) -> HookResult + Send + Sync>;

/// Dispatches each press to the handler registered for its slot
pub struct MultiSwitchRule {
    base: RuleBase,
    buttons: Vec<String>,
    number_item: Option<String>,
    handlers: BTreeMap<usize, SlotHandler>,
}

impl MultiSwitchRule {
    /// Create a rule for the given buttons
    pub fn new<S: Into<String>>(host: &RuleHost, buttons: impl IntoIterator<Item = S>) -> Self {
        Self {
            base: RuleBase::new(host, "MultiSwitchRule"),
            buttons: buttons.into_iter().map(Into::into).collect(),
            number_item: None,
            handlers: BTreeMap::new(),
        }
    }

    /// Also dispatch on a number item's value
    pub fn with_number_item(mut self, item_name: impl Into<String>) -> Self {
        self.number_item = Some(item_name.into());
        self
    }

    /// Register the handler for a slot, replacing any previous one
    pub fn on_slot<F>(mut self, slot: usize, handler: F) -> Self
    where
        F: Fn(&RuleBase, &Event<ItemStateChangedData>) -> HookResult + Send + Sync + 'static,
    {
        self.handlers.insert(slot, Arc::new(handler));
        self
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.base.set_name(name);
        self
    }

    pub fn base(&self) -> &RuleBase {
        &self.base
    }

    /// Slot addressed by a change event, if its source is known
    pub fn slot_for(&self, data: &ItemStateChangedData) -> RuleResult<Option<usize>> {
        if self.number_item.as_deref() == Some(data.item_name.as_str()) {
            let value = data.new_state.as_f64().ok_or_else(|| RuleError::NotNumeric {
                item: data.item_name.clone(),
                state: data.new_state.to_full_string(),
            })?;
            // Saturating: negative values land on slot 0, which is never registered
            return Ok(Some(value.trunc() as usize));
        }

        Ok(self
            .buttons
            .iter()
            .position(|button| *button == data.item_name)
            .map(|idx| idx + 1))
    }
}

impl Rule for MultiSwitchRule {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let number = self
            .number_item
            .iter()
            .map(|name| SubscriptionFactory::state_changed(name));
        let buttons = self.buttons.iter().map(|name| {
            SubscriptionFactory::state_transition(name, Some(ItemState::Off), Some(ItemState::On))
        });
        number.chain(buttons).collect()
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, event: &Event) {
        let event = match event.parse::<ItemStateChangedData>() {
            Ok(event) => event,
            Err(e) => {
                malformed(self.name(), &e);
                return;
            }
        };
        debug!(item = %event.data.item_name, state = %event.data.new_state, "Event received");

        let slot = match self.slot_for(&event.data) {
            Ok(Some(slot)) => slot,
            Ok(None) => {
                error!(item = %event.data.item_name, "Could not determine button from event item name");
                return;
            }
            Err(e) => {
                malformed(self.name(), &e);
                return;
            }
        };

        match self.handlers.get(&slot) {
            Some(handler) => {
                run_hook(self.name(), &format!("b{}", slot), || handler(&self.base, &event))
            }
            None => warn!(item = %event.data.item_name, slot, "Button {} pressed, no handler registered", slot),
        }
    }
}
