//! Shared fixtures for rule engine integration tests

#![allow(dead_code)]

use rules_core::events::{
    ChannelTriggeredData, ItemCommandData, ItemStateChangedData, ItemStateData,
    SystemStartedData, TimerFiredData,
};
use rules_core::{Context, Event, Item, ItemKind, ItemState};
use rules_engine::{
    ChannelHandler, EscalationHandler, HookResult, ItemRuleBase, OnOffHandler, OpenClosedHandler,
    RangeEventHandler, RangeHandler, RuleBase, RuleHost, StartedHandler, TimerHandler,
};
use rules_event_bus::TypedEventReceiver;
use std::sync::{Arc, Mutex};

/// An in-memory host capturing the commands rules send
pub struct TestHost {
    pub host: RuleHost,
    commands: TypedEventReceiver<ItemCommandData>,
    updates: TypedEventReceiver<ItemStateData>,
}

impl TestHost {
    pub fn new() -> Self {
        let host = RuleHost::in_memory();
        let commands = host.bus.subscribe_typed::<ItemCommandData>();
        let updates = host.bus.subscribe_typed::<ItemStateData>();
        Self {
            host,
            commands,
            updates,
        }
    }

    pub fn add(&self, name: &str, kind: ItemKind, state: ItemState) {
        self.host.items.add(Item::new(name, kind).with_state(state));
    }

    pub fn add_group(&self, name: &str, base: Option<ItemKind>, members: &[&str]) {
        self.host
            .items
            .add(Item::group(name, base, members.iter().copied()));
    }

    /// Set an item's state and build the change event a dispatcher would deliver
    pub fn change(&self, name: &str, state: ItemState) -> Event {
        let old_state = self.host.items.state(name);
        self.host
            .items
            .set_state(name, state, Context::new())
            .expect("item exists");
        change_event(name, old_state, state)
    }

    /// Drain the (item, command) pairs sent so far
    pub fn commands(&mut self) -> Vec<(String, String)> {
        std::iter::from_fn(|| self.commands.try_recv())
            .map(|e| (e.data.item_name, e.data.command))
            .collect()
    }

    /// Drain the (item, state) updates posted so far
    pub fn updates(&mut self) -> Vec<(String, String)> {
        std::iter::from_fn(|| self.updates.try_recv())
            .map(|e| (e.data.item_name, e.data.state))
            .collect()
    }
}

pub fn change_event(name: &str, old: Option<ItemState>, new: ItemState) -> Event {
    Event::typed(
        ItemStateChangedData {
            item_name: name.to_string(),
            old_state: old,
            new_state: new,
        },
        Context::new(),
    )
    .into_raw()
}

pub fn update_event(name: &str, state: &str) -> Event {
    Event::typed(
        ItemStateData {
            item_name: name.to_string(),
            state: state.to_string(),
        },
        Context::new(),
    )
    .into_raw()
}

pub fn channel_event(channel: &str, event: &str) -> Event {
    Event::typed(
        ChannelTriggeredData {
            channel: channel.to_string(),
            event: event.to_string(),
        },
        Context::new(),
    )
    .into_raw()
}

pub fn timer_event(expression: &str) -> Event {
    Event::typed(
        TimerFiredData {
            expression: expression.to_string(),
        },
        Context::new(),
    )
    .into_raw()
}

pub fn started_event() -> Event {
    Event::typed(SystemStartedData {}, Context::new()).into_raw()
}

/// Hook implementation recording every call as "hook:item"
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl OnOffHandler for Recorder {
    fn on(&self, _rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        self.record(format!("on:{}", event.data.item_name));
        Ok(())
    }

    fn off(&self, _rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        self.record(format!("off:{}", event.data.item_name));
        Ok(())
    }
}

impl OpenClosedHandler for Recorder {
    fn open(&self, _rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        self.record(format!("open:{}", event.data.item_name));
        Ok(())
    }

    fn closed(&self, _rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        self.record(format!("closed:{}", event.data.item_name));
        Ok(())
    }
}

impl EscalationHandler for Recorder {
    fn alert(&self, rule: &ItemRuleBase, item_name: &str, minutes: u64) -> HookResult {
        self.record(format!("alert:{}:{}", rule.friendly_name(item_name), minutes));
        Ok(())
    }

    fn closed_after_alert(&self, rule: &ItemRuleBase, item_name: &str) -> HookResult {
        self.record(format!("closed_after_alert:{}", rule.friendly_name(item_name)));
        Ok(())
    }
}

impl RangeHandler for Recorder {
    fn low(&self, _rule: &ItemRuleBase, _event: &Event<ItemStateChangedData>, value: f64) -> HookResult {
        self.record(format!("low:{}", value));
        Ok(())
    }

    fn high(&self, _rule: &ItemRuleBase, _event: &Event<ItemStateChangedData>, value: f64) -> HookResult {
        self.record(format!("high:{}", value));
        Ok(())
    }

    fn back_in_range(
        &self,
        _rule: &ItemRuleBase,
        _event: &Event<ItemStateChangedData>,
        value: f64,
    ) -> HookResult {
        self.record(format!("back_in_range:{}", value));
        Ok(())
    }
}

impl ChannelHandler for Recorder {
    fn triggered(&self, _rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        self.record(format!("triggered:{}:{}", event.data.channel, event.data.event));
        Ok(())
    }
}

impl RangeEventHandler for Recorder {
    fn start(&self, _rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        self.record(format!("start:{}", event.data.channel));
        Ok(())
    }

    fn end(&self, _rule: &RuleBase, event: &Event<ChannelTriggeredData>) -> HookResult {
        self.record(format!("end:{}", event.data.event));
        Ok(())
    }
}

impl TimerHandler for Recorder {
    fn time_for(&self, _rule: &RuleBase) -> HookResult {
        self.record("time_for");
        Ok(())
    }
}

impl StartedHandler for Recorder {
    fn started(&self, _rule: &RuleBase) -> HookResult {
        self.record("started");
        Ok(())
    }
}
