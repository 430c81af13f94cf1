//! Subscription descriptors
//!
//! A descriptor tells the host's subscription engine which events a rule
//! wants delivered. The engine itself lives outside this crate; the only
//! matching done here is [`Subscription::matches`], which lets a rule check
//! whether an event is one of its own.

use rules_core::events::{
    ChannelTriggeredData, ItemStateChangedData, ItemStateData, TimerFiredData,
    CHANNEL_TRIGGERED, CHANNEL_TRIGGERED_TOPIC, SYSTEM_STARTED,
};
use rules_core::{Event, ItemState};
use regex::Regex;
use rules_item_registry::{glob_to_regex, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Trigger type tags understood by the subscription engine
pub mod trigger_types {
    pub const ITEM_STATE_CHANGE: &str = "core.ItemStateChangeTrigger";
    pub const ITEM_STATE_UPDATE: &str = "core.ItemStateUpdateTrigger";
    pub const CRON: &str = "timer.GenericCronTrigger";
    pub const CHANNEL_EVENT: &str = "core.ChannelEventTrigger";
    pub const GENERIC_EVENT: &str = "core.GenericEventTrigger";
    pub const SYSTEM_STARTED: &str = "core.SystemStartedTrigger";
}

/// An immutable subscription descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Diagnostic identifier, not required to be unique
    pub id: String,

    /// Trigger type tag
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Trigger configuration
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

impl Subscription {
    /// Look up a configuration value
    pub fn config(&self, key: &str) -> Option<&str> {
        self.configuration.get(key).map(String::as_str)
    }

    /// Check if an event is one this descriptor describes
    ///
    /// Events whose payload does not fit the trigger type never match.
    pub fn matches(&self, event: &Event) -> bool {
        match self.type_tag.as_str() {
            trigger_types::ITEM_STATE_CHANGE => event
                .parse::<ItemStateChangedData>()
                .map(|e| self.matches_change(&e.data))
                .unwrap_or(false),
            trigger_types::ITEM_STATE_UPDATE => event
                .parse::<ItemStateData>()
                .map(|e| self.config("itemName") == Some(e.data.item_name.as_str()))
                .unwrap_or(false),
            trigger_types::CRON => event
                .parse::<TimerFiredData>()
                .map(|e| self.config("cronExpression") == Some(e.data.expression.as_str()))
                .unwrap_or(false),
            trigger_types::CHANNEL_EVENT => event
                .parse::<ChannelTriggeredData>()
                .map(|e| {
                    self.config("channelUID") == Some(e.data.channel.as_str())
                        && self.config("event").map_or(true, |name| name == e.data.event)
                })
                .unwrap_or(false),
            trigger_types::GENERIC_EVENT => self.matches_generic(event),
            trigger_types::SYSTEM_STARTED => event.event_type.as_str() == SYSTEM_STARTED,
            other => {
                warn!(subscription = %self.id, type_tag = %other, "Unknown trigger type");
                false
            }
        }
    }

    fn matches_change(&self, data: &ItemStateChangedData) -> bool {
        if self.config("itemName") != Some(data.item_name.as_str()) {
            return false;
        }
        if let Some(previous) = self.config("previousState") {
            match data.old_state {
                Some(old) if old.to_full_string() == previous => {}
                _ => return false,
            }
        }
        self.config("state")
            .map_or(true, |state| data.new_state.to_full_string() == state)
    }

    fn matches_generic(&self, event: &Event) -> bool {
        match GenericEventFilter::compile(self) {
            Ok(filter) => filter.matches(event),
            Err(e) => {
                warn!(subscription = %self.id, error = %e, "Invalid subscription pattern");
                false
            }
        }
    }
}

/// Compiled patterns of a generic channel event descriptor
///
/// [`Subscription::matches`] compiles these for every call; rules that check
/// many events keep one of these instead.
#[derive(Debug, Clone)]
pub struct GenericEventFilter {
    event_types: Option<Vec<String>>,
    topic: Option<Regex>,
    source: Option<Regex>,
}

impl GenericEventFilter {
    /// Compile the `eventTopic` and `eventSource` globs of a descriptor
    pub fn compile(subscription: &Subscription) -> RegistryResult<Self> {
        let pattern = |key: &str| subscription.config(key).map(glob_to_regex).transpose();
        Ok(Self {
            event_types: subscription.config("eventTypes").map(|types| {
                types.split(',').map(|t| t.trim().to_string()).collect()
            }),
            topic: pattern("eventTopic")?,
            source: pattern("eventSource")?,
        })
    }

    /// Check if an event passes the type, topic and source patterns
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(types) = &self.event_types {
            if !types.iter().any(|t| t == event.event_type.as_str()) {
                return false;
            }
        }

        let Some(source) = event.source() else {
            return false;
        };

        let topic_matches = self.topic.as_ref().map_or(true, |topic| {
            topic.is_match(&format!("smarthome/channels/{}/triggered", source))
        });
        topic_matches && self.source.as_ref().map_or(true, |pattern| pattern.is_match(source))
    }
}

/// Builders for the supported subscription kinds
pub struct SubscriptionFactory;

impl SubscriptionFactory {
    /// Build a descriptor from its parts
    pub fn build<K, V>(
        id: impl Into<String>,
        type_tag: impl Into<String>,
        configuration: impl IntoIterator<Item = (K, V)>,
    ) -> Subscription
    where
        K: Into<String>,
        V: Into<String>,
    {
        Subscription {
            id: id.into(),
            type_tag: type_tag.into(),
            configuration: configuration
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Any state change of an item
    pub fn state_changed(item_name: &str) -> Subscription {
        Self::state_transition(item_name, None, None)
    }

    /// A state change, optionally constrained to a previous and/or new state
    pub fn state_transition(
        item_name: &str,
        previous: Option<ItemState>,
        state: Option<ItemState>,
    ) -> Subscription {
        let mut configuration = vec![("itemName", item_name.to_string())];
        if let Some(previous) = previous {
            configuration.push(("previousState", previous.to_full_string()));
        }
        if let Some(state) = state {
            configuration.push(("state", state.to_full_string()));
        }

        let id = match state {
            Some(state) => format!("{}_{}", item_name, state.to_full_string()),
            None => format!("{}_CHG", item_name),
        };

        Self::build(id, trigger_types::ITEM_STATE_CHANGE, configuration)
    }

    /// Any state update of an item, changed or not
    pub fn state_updated(item_name: &str) -> Subscription {
        Self::build(
            format!("{}_UPD", item_name),
            trigger_types::ITEM_STATE_UPDATE,
            [("itemName", item_name)],
        )
    }

    /// A calendar expression; `index` only feeds the diagnostic id
    pub fn calendar(index: usize, expression: &str) -> Subscription {
        Self::build(
            format!("Timer_{}", index),
            trigger_types::CRON,
            [("cronExpression", expression)],
        )
    }

    /// Events of a trigger channel, optionally only one event name
    pub fn channel_event(channel_uid: &str, event: Option<&str>) -> Subscription {
        let mut configuration = vec![("channelUID", channel_uid)];
        if let Some(event) = event {
            configuration.push(("event", event));
        }
        Self::build(
            format!("channel_{}", event.unwrap_or("ALL")),
            trigger_types::CHANNEL_EVENT,
            configuration,
        )
    }

    /// Channel trigger events filtered by topic and source pattern
    ///
    /// The topic defaults to every channel trigger topic.
    pub fn generic_channel_event(topic: Option<&str>, source: &str) -> Subscription {
        Self::build(
            "gen_ALL",
            trigger_types::GENERIC_EVENT,
            [
                ("eventTopic", topic.unwrap_or(CHANNEL_TRIGGERED_TOPIC)),
                ("eventSource", source),
                ("eventTypes", CHANNEL_TRIGGERED),
            ],
        )
    }

    /// The host finished starting
    pub fn system_started() -> Subscription {
        Self::build(
            "system_started",
            trigger_types::SYSTEM_STARTED,
            std::iter::empty::<(String, String)>(),
        )
    }
}
