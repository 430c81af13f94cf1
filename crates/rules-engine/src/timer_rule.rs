//! TimerRule: run a hook on a calendar schedule
//!
//! The host evaluates the cron expressions and delivers a `TimerEvent`
//! whenever one fires.

use rules_core::Event;
use tracing::{debug, instrument};

use crate::base::RuleBase;
use crate::host::RuleHost;
use crate::rule::{run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hook for [`TimerRule`]
pub trait TimerHandler: Send + Sync + 'static {
    fn time_for(&self, rule: &RuleBase) -> HookResult {
        debug!(rule = %rule.name(), "Time for event");
        Ok(())
    }
}

impl TimerHandler for DefaultHooks {}

impl<F> TimerHandler for F
where
    F: Fn(&RuleBase) -> HookResult + Send + Sync + 'static,
{
    fn time_for(&self, rule: &RuleBase) -> HookResult {
        self(rule)
    }
}

/// Calls `time_for` whenever any of its calendar expressions fires
pub struct TimerRule<H = DefaultHooks> {
    base: RuleBase,
    expressions: Vec<String>,
    handler: H,
}

impl<H: TimerHandler> TimerRule<H> {
    pub fn new<S: Into<String>>(
        host: &RuleHost,
        expressions: impl IntoIterator<Item = S>,
        handler: H,
    ) -> Self {
        let base = RuleBase::new(host, "TimerRule");
        let expressions: Vec<String> = expressions.into_iter().map(Into::into).collect();
        debug!(rule = %base.name(), expressions = ?expressions, "TimerRule created");
        Self {
            base,
            expressions,
            handler,
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.base.set_name(name);
        self
    }

    pub fn base(&self) -> &RuleBase {
        &self.base
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }
}

impl<H: TimerHandler> Rule for TimerRule<H> {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.expressions
            .iter()
            .enumerate()
            .map(|(idx, expression)| SubscriptionFactory::calendar(idx + 1, expression))
            .collect()
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, _event: &Event) {
        run_hook(self.name(), "time_for", || self.handler.time_for(&self.base));
    }
}
