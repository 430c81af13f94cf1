//! RangeRule: threshold crossing with hysteresis

use rules_core::events::ItemStateChangedData;
use rules_core::Event;
use std::sync::Mutex;
use tracing::{error, warn};

use crate::changed::{ChangedHandler, ChangedRule};
use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::resolver::ItemSelection;
use crate::rule::{lock, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::Subscription;

/// Hooks for [`RangeRule`]
pub trait RangeHandler: Send + Sync + 'static {
    fn low(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>, value: f64) -> HookResult {
        warn!(rule = %rule.name(), "{} low: {}", rule.friendly_name(&event.data.item_name), value);
        Ok(())
    }

    fn high(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>, value: f64) -> HookResult {
        warn!(rule = %rule.name(), "{} high: {}", rule.friendly_name(&event.data.item_name), value);
        Ok(())
    }

    fn back_in_range(
        &self,
        rule: &ItemRuleBase,
        event: &Event<ItemStateChangedData>,
        value: f64,
    ) -> HookResult {
        warn!(rule = %rule.name(), "{} normal: {}", rule.friendly_name(&event.data.item_name), value);
        Ok(())
    }
}

impl RangeHandler for DefaultHooks {}

/// Which bound, if any, the last out-of-range value crossed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Excursion {
    #[default]
    InRange,
    Low,
    High,
}

/// Change hook classifying values against the bounds
pub struct Hysteresis<H> {
    low: Option<f64>,
    high: Option<f64>,
    excursion: Mutex<Excursion>,
    handler: H,
}

impl<H: RangeHandler> ChangedHandler for Hysteresis<H> {
    fn changed(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        let Some(value) = event.data.new_state.as_f64() else {
            error!(
                rule = %rule.name(),
                item = %event.data.item_name,
                state = %event.data.new_state,
                "New state is not numeric"
            );
            return Ok(());
        };

        // Bounds are inclusive: exactly `low` or `high` is in range
        let mut excursion = lock(&self.excursion);
        if self.low.is_some_and(|low| value < low) {
            *excursion = Excursion::Low;
            run_hook(rule.name(), "low", || self.handler.low(rule, event, value));
        } else if self.high.is_some_and(|high| value > high) {
            *excursion = Excursion::High;
            run_hook(rule.name(), "high", || self.handler.high(rule, event, value));
        } else if *excursion != Excursion::InRange {
            *excursion = Excursion::InRange;
            run_hook(rule.name(), "back_in_range", || {
                self.handler.back_in_range(rule, event, value)
            });
        }
        Ok(())
    }
}

/// Calls `low`/`high` when a watched value leaves the range and
/// `back_in_range` when it returns
pub struct RangeRule<H = DefaultHooks> {
    rule: ChangedRule<Hysteresis<H>>,
}

impl<H: RangeHandler> RangeRule<H> {
    pub fn new(
        host: &RuleHost,
        selection: impl Into<ItemSelection>,
        low: Option<f64>,
        high: Option<f64>,
        handler: H,
    ) -> Self {
        let hysteresis = Hysteresis {
            low,
            high,
            excursion: Mutex::new(Excursion::InRange),
            handler,
        };
        Self {
            rule: ChangedRule::with_kind(host, "RangeRule", selection, hysteresis),
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.rule = self.rule.with_name(name);
        self
    }

    pub fn base(&self) -> &ItemRuleBase {
        self.rule.base()
    }

    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        let hysteresis = self.rule.handler();
        (hysteresis.low, hysteresis.high)
    }

    /// Current excursion state
    pub fn excursion(&self) -> Excursion {
        *lock(&self.rule.handler().excursion)
    }
}

impl<H: RangeHandler> Rule for RangeRule<H> {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.rule.subscriptions()
    }

    fn execute(&self, event: &Event) {
        self.rule.execute(event)
    }
}
