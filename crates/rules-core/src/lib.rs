//! Core types for the rule helpers
//!
//! This crate provides the fundamental types shared by the item registry,
//! the event bus and the rule engine: Item, ItemState, Event and Context.

mod context;
mod event;
mod item;
mod state;

pub use context::Context;
pub use event::{Event, EventData, EventError, EventOrigin, EventType};
pub use item::{Item, ItemKind};
pub use state::{ItemState, StateParseError};

/// Standard event types delivered to rules
pub mod events {
    use super::*;

    /// An item's state changed to a different value
    pub const ITEM_STATE_CHANGED: &str = "ItemStateChangedEvent";

    /// An item's state was updated (delivered even when the value is unchanged)
    pub const ITEM_STATE: &str = "ItemStateEvent";

    /// A command was sent to an item
    pub const ITEM_COMMAND: &str = "ItemCommandEvent";

    /// A channel emitted a trigger event (e.g. "START", "PRESSED")
    pub const CHANNEL_TRIGGERED: &str = "ChannelTriggeredEvent";

    /// A calendar expression fired
    pub const TIMER: &str = "TimerEvent";

    /// The host system finished starting up
    pub const SYSTEM_STARTED: &str = "SystemStartedEvent";

    /// Topic pattern channel trigger events are published under
    pub const CHANNEL_TRIGGERED_TOPIC: &str = "smarthome/channels/*/triggered";

    /// Data for ITEM_STATE_CHANGED events
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct ItemStateChangedData {
        pub item_name: String,
        #[serde(default)]
        pub old_state: Option<ItemState>,
        pub new_state: ItemState,
    }

    impl EventData for ItemStateChangedData {
        fn event_type() -> &'static str {
            ITEM_STATE_CHANGED
        }
    }

    /// Data for ITEM_STATE events
    ///
    /// Updates may carry free text (e.g. a message posted to a string item),
    /// so the state travels as a raw string.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct ItemStateData {
        pub item_name: String,
        pub state: String,
    }

    impl ItemStateData {
        /// Interpret the raw state as a typed state
        pub fn value(&self) -> Result<ItemState, StateParseError> {
            self.state.parse()
        }
    }

    impl EventData for ItemStateData {
        fn event_type() -> &'static str {
            ITEM_STATE
        }
    }

    /// Data for ITEM_COMMAND events
    ///
    /// The command is carried in its canonical string form; receivers parse
    /// it against the target item's kind.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct ItemCommandData {
        pub item_name: String,
        pub command: String,
    }

    impl EventData for ItemCommandData {
        fn event_type() -> &'static str {
            ITEM_COMMAND
        }
    }

    /// Data for CHANNEL_TRIGGERED events
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct ChannelTriggeredData {
        /// Channel UID, e.g. "astro:sun:local:night#event"
        pub channel: String,
        /// Event name, e.g. "START"
        pub event: String,
    }

    impl EventData for ChannelTriggeredData {
        fn event_type() -> &'static str {
            CHANNEL_TRIGGERED
        }
    }

    /// Data for TIMER events
    #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct TimerFiredData {
        pub expression: String,
    }

    impl EventData for TimerFiredData {
        fn event_type() -> &'static str {
            TIMER
        }
    }

    /// Data for SYSTEM_STARTED events
    #[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct SystemStartedData {}

    impl EventData for SystemStartedData {
        fn event_type() -> &'static str {
            SYSTEM_STARTED
        }
    }
}
