//! OpenClosedRule: react to watched contacts opening or closing

use rules_core::events::ItemStateChangedData;
use rules_core::{Event, ItemState};
use tracing::{debug, instrument, warn};

use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::resolver::ItemSelection;
use crate::rule::{malformed, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hooks for [`OpenClosedRule`]
pub trait OpenClosedHandler: Send + Sync + 'static {
    fn open(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        debug!(rule = %rule.name(), item = %event.data.item_name, "open");
        Ok(())
    }

    fn closed(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        debug!(rule = %rule.name(), item = %event.data.item_name, "closed");
        Ok(())
    }
}

impl OpenClosedHandler for DefaultHooks {}

/// Calls `open` for CLOSED -> OPEN and `closed` for OPEN -> CLOSED
pub struct OpenClosedRule<H = DefaultHooks> {
    items: ItemRuleBase,
    handler: H,
}

impl<H: OpenClosedHandler> OpenClosedRule<H> {
    pub fn new(host: &RuleHost, selection: impl Into<ItemSelection>, handler: H) -> Self {
        Self::with_kind(host, "OpenClosedRule", selection, handler)
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

impl<H: OpenClosedHandler> Rule for OpenClosedRule<H> {
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
                        Some(ItemState::Closed),
                        Some(ItemState::Open),
                    ),
                    SubscriptionFactory::state_transition(
                        name,
                        Some(ItemState::Open),
                        Some(ItemState::Closed),
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
            ItemState::Open => {
                run_hook(self.name(), "open", || self.handler.open(&self.items, &event))
            }
            ItemState::Closed => {
                run_hook(self.name(), "closed", || self.handler.closed(&self.items, &event))
            }
            other => warn!(
                item = %event.data.item_name,
                state = %other,
                "Neither OPEN nor CLOSED, no hook called"
            ),
        }
    }
}
