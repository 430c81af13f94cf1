//! Rules driven by channel trigger events
//!
//! - [`ChannelEventRule`]: one channel, optionally one event name
//! - [`GenericChannelEventRule`]: channels selected by topic/source pattern
//! - [`RangeEventRule`]: `START` opens a window, any other event closes it
//! - [`RangeEventSwitchRule`]: a range event bound to a switch

use rules_core::events::ChannelTriggeredData;
use rules_core::Event;
use tracing::{debug, error, instrument};

use crate::base::RuleBase;
use crate::host::RuleHost;
use crate::rule::{malformed, run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{GenericEventFilter, Subscription, SubscriptionFactory};

/// Event name that opens a range
pub const RANGE_START: &str = "START";

/// Hook for channel event rules
pub trait ChannelHandler: Send + Sync + 'static {
    fn triggered(&self, rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        debug!(rule = %rule.name(), channel = %event.data.channel, event = %event.data.event, "triggered");
        Ok(())
    }
}

impl ChannelHandler for DefaultHooks {}

impl<F> ChannelHandler for F
where
    F: Fn(&RuleBase, &Event<ChannelTriggeredData>) -> HookResult + Send + Sync + 'static,
{
    fn triggered(&self, rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        self(rule, event)
    }
}

/// Parse a delivered event and hand it to `triggered`
fn dispatch<H: ChannelHandler>(base: &RuleBase, handler: &H, event: &Event) {
    let event = match event.parse::<ChannelTriggeredData>() {
        Ok(event) => event,
        Err(e) => {
            malformed(base.name(), &e);
            return;
        }
    };
    debug!(channel = %event.data.channel, event = %event.data.event, "Event received");

    run_hook(base.name(), "triggered", || handler.triggered(base, &event));
}

/// Calls `triggered` for events of one channel
pub struct ChannelEventRule<H = DefaultHooks> {
    base: RuleBase,
    channel: String,
    event: Option<String>,
    handler: H,
}

impl<H: ChannelHandler> ChannelEventRule<H> {
    /// Watch every event of `channel`, or only `event` when given
    pub fn new(host: &RuleHost, channel: impl Into<String>, event: Option<&str>, handler: H) -> Self {
        Self::with_kind(host, "ChannelEventRule", channel, event, handler)
    }

    fn with_kind(
        host: &RuleHost,
        kind: &str,
        channel: impl Into<String>,
        event: Option<&str>,
        handler: H,
    ) -> Self {
        Self {
            base: RuleBase::new(host, kind),
            channel: channel.into(),
            event: event.map(str::to_string),
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

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: ChannelHandler> Rule for ChannelEventRule<H> {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![SubscriptionFactory::channel_event(
            &self.channel,
            self.event.as_deref(),
        )]
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, event: &Event) {
        dispatch(&self.base, &self.handler, event)
    }
}

/// Calls `triggered` for channel events matching a topic and source pattern
pub struct GenericChannelEventRule<H = DefaultHooks> {
    base: RuleBase,
    subscription: Subscription,
    filter: Option<GenericEventFilter>,
    handler: H,
}

impl<H: ChannelHandler> GenericChannelEventRule<H> {
    /// Watch channels whose UID matches `source` (`*` and `?` wildcards)
    pub fn new(host: &RuleHost, source: impl Into<String>, handler: H) -> Self {
        let base = RuleBase::new(host, "GenericChannelEventRule");
        let subscription = SubscriptionFactory::generic_channel_event(None, &source.into());
        let filter = compile_filter(&base, &subscription);
        Self {
            base,
            subscription,
            filter,
            handler,
        }
    }

    /// Restrict to a topic pattern other than every channel trigger topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.subscription
            .configuration
            .insert("eventTopic".to_string(), topic.into());
        self.filter = compile_filter(&self.base, &self.subscription);
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
}

fn compile_filter(base: &RuleBase, subscription: &Subscription) -> Option<GenericEventFilter> {
    match GenericEventFilter::compile(subscription) {
        Ok(filter) => Some(filter),
        Err(e) => {
            error!(rule = %base.name(), error = %e, "Invalid channel pattern, rule matches nothing");
            None
        }
    }
}

impl<H: ChannelHandler> Rule for GenericChannelEventRule<H> {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![self.subscription.clone()]
    }

    fn handles(&self, event: &Event) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.matches(event))
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, event: &Event) {
        dispatch(&self.base, &self.handler, event)
    }
}

/// Hooks for [`RangeEventRule`]
pub trait RangeEventHandler: Send + Sync + 'static {
    fn start(&self, rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        debug!(rule = %rule.name(), channel = %event.data.channel, "start");
        Ok(())
    }

    fn end(&self, rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        debug!(rule = %rule.name(), channel = %event.data.channel, event = %event.data.event, "end");
        Ok(())
    }
}

impl RangeEventHandler for DefaultHooks {}

/// Channel hook splitting events into `start` and `end`
pub struct RangeEvents<H>(H);

impl<H: RangeEventHandler> ChannelHandler for RangeEvents<H> {
    fn triggered(&self, rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        if event.data.event == RANGE_START {
            self.0.start(rule, event)
        } else {
            self.0.end(rule, event)
        }
    }
}

/// Calls `start` on a `START` event and `end` on any other event of a channel
pub struct RangeEventRule<H = DefaultHooks> {
    rule: ChannelEventRule<RangeEvents<H>>,
}

impl<H: RangeEventHandler> RangeEventRule<H> {
    pub fn new(host: &RuleHost, channel: impl Into<String>, handler: H) -> Self {
        Self::with_kind(host, "RangeEventRule", channel, handler)
    }

    fn with_kind(host: &RuleHost, kind: &str, channel: impl Into<String>, handler: H) -> Self {
        Self {
            rule: ChannelEventRule::with_kind(host, kind, channel, None, RangeEvents(handler)),
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.rule = self.rule.with_name(name);
        self
    }

    pub fn base(&self) -> &RuleBase {
        self.rule.base()
    }

    pub fn channel(&self) -> &str {
        self.rule.channel()
    }
}

impl<H: RangeEventHandler> Rule for RangeEventRule<H> {
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

/// Range hooks commanding a switch ON at start and OFF at end
#[derive(Debug, Clone)]
pub struct SwitchBinding {
    switch: String,
}

impl RangeEventHandler for SwitchBinding {
    fn start(&self, rule: &RuleBase, _event: &Event<ChannelTriggeredData>) -> HookResult {
        rule.send_command(&self.switch, "ON");
        Ok(())
    }

    fn end(&self, rule: &RuleBase, _event: &Event<ChannelTriggeredData>) -> HookResult {
        rule.send_command(&self.switch, "OFF");
        Ok(())
    }
}

/// Keeps a switch ON for the duration of a channel's range
pub struct RangeEventSwitchRule {
    rule: RangeEventRule<SwitchBinding>,
}

impl RangeEventSwitchRule {
    pub fn new(host: &RuleHost, channel: impl Into<String>, switch: impl Into<String>) -> Self {
        let binding = SwitchBinding {
            switch: switch.into(),
        };
        Self {
            rule: RangeEventRule::with_kind(host, "RangeEventSwitchRule", channel, binding),
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.rule = self.rule.with_name(name);
        self
    }

    pub fn channel(&self) -> &str {
        self.rule.channel()
    }

    /// The switch this rule drives
    pub fn switch(&self) -> &str {
        &self.rule.rule.handler().0.switch
    }
}

impl Rule for RangeEventSwitchRule {
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
