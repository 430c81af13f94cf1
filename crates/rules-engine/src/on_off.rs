//! OnOffRule: react to watched switches turning on or off

use rules_core::events::ItemStateChangedData;
use rules_core::{Event, ItemState};
use tracing::{debug, instrument, warn};

use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::resolver::ItemSelection;
use crate::rule::{malformed, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hooks for [`OnOffRule`]
pub trait OnOffHandler: Send + Sync + 'static {
    fn on(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        debug!(rule = %rule.name(), item = %event.data.item_name, "on");
        Ok(())
    }

    fn off(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        debug!(rule = %rule.name(), item = %event.data.item_name, "off");
        Ok(())
    }
}

impl OnOffHandler for DefaultHooks {}

/// Calls `on` for OFF -> ON and `off` for ON -> OFF
pub struct OnOffRule<H = DefaultHooks> {
    items: ItemRuleBase,
    handler: H,
}

impl<H: OnOffHandler> OnOffRule<H> {
    pub fn new(host: &RuleHost, selection: impl Into<ItemSelection>, handler: H) -> Self {
        Self {
            items: ItemRuleBase::new(host, "OnOffRule", selection),
            handler,
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.items.set_name(name);
        self
    }

    pub fn base(&self) -> &ItemRuleBase {
        &self.items
    }
}

impl<H: OnOffHandler> Rule for OnOffRule<H> {
    fn name(&self) -> &str {
        self.items.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.items
            .watch_list()
            .names()
            .flat_map(|name| {
                [
                    SubscriptionFactory::state_transition(
                        name,
                        Some(ItemState::Off),
                        Some(ItemState::On),
                    ),
                    SubscriptionFactory::state_transition(
                        name,
                        Some(ItemState::On),
                        Some(ItemState::Off),
                    ),
                ]
            })
            .collect()
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

        match event.data.new_state {
            ItemState::On => run_hook(self.name(), "on", || self.handler.on(&self.items, &event)),
            ItemState::Off => {
                run_hook(self.name(), "off", || self.handler.off(&self.items, &event))
            }
            other => warn!(
                item = %event.data.item_name,
                state = %other,
                "Neither ON nor OFF, no hook called"
            ),
        }
    }
}
