//! UpdatedRule: react to every state update, changed or not

use rules_core::events::ItemStateData;
use rules_core::Event;
use tracing::{debug, instrument};

use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::resolver::ItemSelection;
use crate::rule::{malformed, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hook for [`UpdatedRule`]
pub trait UpdatedHandler: Send + Sync + 'static {
    fn updated(&self, rule: &ItemRuleBase, event: &Event<ItemStateData>) -> HookResult {
        debug!(rule = %rule.name(), item = %event.data.item_name, state = %event.data.state, "updated");
        Ok(())
    }
}

impl UpdatedHandler for DefaultHooks {}

impl<F> UpdatedHandler for F
where
    F: Fn(&ItemRuleBase, &Event<ItemStateData>) -> HookResult + Send + Sync + 'static,
{
    fn updated(&self, rule: &ItemRuleBase, event: &Event<ItemStateData>) -> HookResult {
        self(rule, event)
    }
}

/// Calls `updated` on every update of a watched item
pub struct UpdatedRule<H = DefaultHooks> {
    items: ItemRuleBase,
    handler: H,
}

impl<H: UpdatedHandler> UpdatedRule<H> {
    pub fn new(host: &RuleHost, selection: impl Into<ItemSelection>, handler: H) -> Self {
        Self {
            items: ItemRuleBase::new(host, "UpdatedRule", selection),
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

impl<H: UpdatedHandler> Rule for UpdatedRule<H> {
    fn name(&self) -> &str {
        self.items.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.items
            .watch_list()
            .names()
            .map(SubscriptionFactory::state_updated)
            .collect()
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, event: &Event) {
        let event = match event.parse::<ItemStateData>() {
            Ok(event) => event,
            Err(e) => {
                malformed(self.name(), &e);
                return;
            }
        };
        debug!(item = %event.data.item_name, state = %event.data.state, "Event received");

        run_hook(self.name(), "updated", || {
            self.handler.updated(&self.items, &event)
        });
    }
}
