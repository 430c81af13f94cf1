//! Event envelope delivered to rules and carried on the event bus

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Context;

/// Trait for typed event data
///
/// Implement this trait for any payload type that travels inside an
/// [`Event`].
pub trait EventData: Clone + Send + Sync + 'static {
    /// The event type string for this data type
    fn event_type() -> &'static str;
}

/// Errors raised when interpreting a raw event
#[derive(Debug, Error)]
pub enum EventError {
    #[error("expected {expected} event, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    #[error("malformed {event_type} payload: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Create a new event type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Get the event type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Special event type that matches all events
    pub fn match_all() -> Self {
        Self("*".to_string())
    }

    /// Check if this is the MATCH_ALL event type
    pub fn is_match_all(&self) -> bool {
        self.0 == "*"
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event as delivered by a dispatcher
///
/// The raw form (`Event<serde_json::Value>`) is what travels on the bus and
/// what rules receive; [`Event::parse`] turns it into a typed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    /// The type of event
    pub event_type: EventType,

    /// The event payload
    pub data: T,

    /// Origin of the event (local, remote, etc.)
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// Context tracking the origin and causality
    pub context: Context,
}

impl<T> Event<T> {
    /// Create a new event with current timestamp
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            origin: EventOrigin::Local,
            time_fired: Utc::now(),
            context,
        }
    }

    /// Create an event with a specific origin
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    fn map_data<U>(self, data: U) -> Event<U> {
        Event {
            event_type: self.event_type,
            data,
            origin: self.origin,
            time_fired: self.time_fired,
            context: self.context,
        }
    }
}

impl<T: EventData> Event<T> {
    /// Create a typed event from EventData
    pub fn typed(data: T, context: Context) -> Self {
        Self::new(T::event_type(), data, context)
    }
}

impl<T: EventData + Serialize> Event<T> {
    /// Convert into the raw form carried on the bus
    pub fn into_raw(self) -> Event<serde_json::Value> {
        let data = serde_json::to_value(&self.data).unwrap_or_default();
        self.map_data(data)
    }
}

impl Event<serde_json::Value> {
    /// Interpret the raw payload as `T`
    ///
    /// Fails when the event type does not match `T::event_type()` or when
    /// the payload does not deserialize.
    pub fn parse<T: EventData + DeserializeOwned>(&self) -> Result<Event<T>, EventError> {
        if self.event_type.as_str() != T::event_type() {
            return Err(EventError::UnexpectedType {
                expected: T::event_type().to_string(),
                actual: self.event_type.to_string(),
            });
        }

        let data =
            serde_json::from_value::<T>(self.data.clone()).map_err(|e| EventError::Malformed {
                event_type: self.event_type.to_string(),
                source: e,
            })?;

        Ok(self.clone().map_data(data))
    }

    /// The item or channel this event originates from, if the payload names one
    pub fn source(&self) -> Option<&str> {
        self.data
            .get("item_name")
            .or_else(|| self.data.get("channel"))
            .and_then(|v| v.as_str())
    }
}

/// Origin of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Event originated locally
    #[default]
    Local,
    /// Event came from a remote source
    Remote,
}
