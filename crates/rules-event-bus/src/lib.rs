//! Event bus for item commands, state updates and trigger events
//!
//! Rules publish commands and updates here; the item registry publishes
//! state changes here. A dispatcher (not part of this workspace) subscribes
//! and hands matching events to rules.

use dashmap::DashMap;
use rules_core::events::{ItemCommandData, ItemStateData};
use rules_core::{Context, Event, EventData, EventType};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Pub/sub broker for raw events
///
/// Senders are created lazily per event type. Firing never blocks: an event
/// with no live receiver is dropped, and slow receivers observe `Lagged`.
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Sender for subscribers of every event
    match_all_sender: broadcast::Sender<Event<serde_json::Value>>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to a typed event, skipping payloads that fail to parse
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event<serde_json::Value>> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to its type's subscribers and to all match-all subscribers
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // Send errors only mean there is no active receiver
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        self.fire(Event::typed(data, context).into_raw());
    }

    /// Publish a command for an item
    pub fn send_command(
        &self,
        item_name: impl Into<String>,
        command: impl Into<String>,
        context: Context,
    ) {
        let data = ItemCommandData {
            item_name: item_name.into(),
            command: command.into(),
        };
        debug!(item = %data.item_name, command = %data.command, "Sending command");
        self.fire_typed(data, context);
    }

    /// Publish a state update for an item
    pub fn post_update(
        &self,
        item_name: impl Into<String>,
        state: impl Into<String>,
        context: Context,
    ) {
        let data = ItemStateData {
            item_name: item_name.into(),
            state: state.into(),
        };
        debug!(item = %data.item_name, state = %data.state, "Posting update");
        self.fire_typed(data, context);
    }

    /// Get the number of event types with a sender
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose payload parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(typed) = event.parse::<T>() {
                return Ok(typed);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing parseable is queued
    pub fn try_recv(&mut self) -> Option<Event<T>> {
        while let Ok(event) = self.rx.try_recv() {
            if let Ok(typed) = event.parse::<T>() {
                return Some(typed);
            }
        }
        None
    }
}
