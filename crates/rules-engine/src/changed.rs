//! ChangedRule: react to any state change of the watched items

use rules_core::events::ItemStateChangedData;
use rules_core::Event;
use tracing::{debug, instrument};

use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::resolver::ItemSelection;
use crate::rule::{malformed, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hook for [`ChangedRule`]
pub trait ChangedHandler: Send + Sync + 'static {
    fn changed(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        debug!(
            rule = %rule.name(),
            item = %event.data.item_name,
            state = %event.data.new_state,
            "changed"
        );
        Ok(())
    }
}

impl ChangedHandler for DefaultHooks {}

impl<F> ChangedHandler for F
where
    F: Fn(&ItemRuleBase, &Event<ItemStateChangedData>) -> HookResult + Send + Sync + 'static,
{
    fn changed(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        self(rule, event)
    }
}

/// Calls `changed` on every state change of a watched item
pub struct ChangedRule<H = DefaultHooks> {
    items: ItemRuleBase,
    handler: H,
}

impl<H: ChangedHandler> ChangedRule<H> {
    pub fn new(host: &RuleHost, selection: impl Into<ItemSelection>, handler: H) -> Self {
        Self::with_kind(host, "ChangedRule", selection, handler)
    }

    pub(crate) fn with_kind(
        host: &RuleHost,
        kind: &str,
        selection: impl Into<ItemSelection>,
        handler: H,
    ) -> Self {
        Self {
            items: ItemRuleBase::new(host, kind, selection),
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

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: ChangedHandler> Rule for ChangedRule<H> {
    fn name(&self) -> &str {
        self.items.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.items
            .watch_list()
            .names()
            .map(SubscriptionFactory::state_changed)
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

        run_hook(self.name(), "changed", || {
            self.handler.changed(&self.items, &event)
        });
    }
}
