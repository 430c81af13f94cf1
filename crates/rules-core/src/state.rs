//! Typed item state values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for strings that are not a valid state representation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid item state")]
pub struct StateParseError(pub String);

/// The state of an item
///
/// `PartialEq` is structural, so `Decimal(50.0) != Percent(50.0)`; use
/// [`ItemState::same_value`] to compare by canonical value. On the wire a state is its canonical string
/// (`ON`, `OPEN`, `21.5`, `UNDEF`); numeric strings always parse back as
/// [`ItemState::Decimal`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemState {
    On,
    Off,
    Open,
    Closed,
    Decimal(f64),
    /// 0..=100, as held by dimmers and rollershutters
    Percent(f64),
    /// No value known yet (NULL/UNDEF)
    Undefined,
}

impl ItemState {
    /// Build a percent state, clamped to 0..=100
    pub fn percent(value: f64) -> Self {
        ItemState::Percent(value.clamp(0.0, 100.0))
    }

    /// Numeric value of a decimal or percent state
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ItemState::Decimal(v) | ItemState::Percent(v) => Some(*v),
            _ => None,
        }
    }

    /// Check if two states have the same canonical value
    ///
    /// Numeric states compare by number, so a dimmer at `Percent(50.0)`
    /// matches the parsed state `"50"`.
    pub fn same_value(&self, other: &ItemState) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Check if this is the undefined state
    pub fn is_undefined(&self) -> bool {
        matches!(self, ItemState::Undefined)
    }

    /// The canonical string form used in subscription descriptors and on the bus
    pub fn to_full_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::On => f.write_str("ON"),
            ItemState::Off => f.write_str("OFF"),
            ItemState::Open => f.write_str("OPEN"),
            ItemState::Closed => f.write_str("CLOSED"),
            ItemState::Decimal(v) | ItemState::Percent(v) => write!(f, "{}", v),
            ItemState::Undefined => f.write_str("UNDEF"),
        }
    }
}

impl FromStr for ItemState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ON" => Ok(ItemState::On),
            "OFF" => Ok(ItemState::Off),
            "OPEN" => Ok(ItemState::Open),
            "CLOSED" => Ok(ItemState::Closed),
            "UNDEF" | "NULL" => Ok(ItemState::Undefined),
            other => match other.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(ItemState::Decimal(v)),
                _ => Err(StateParseError(s.to_string())),
            },
        }
    }
}

impl TryFrom<String> for ItemState {
    type Error = StateParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ItemState> for String {
    fn from(state: ItemState) -> Self {
        state.to_string()
    }
}

impl From<f64> for ItemState {
    fn from(v: f64) -> Self {
        ItemState::Decimal(v)
    }
}

impl From<bool> for ItemState {
    fn from(on: bool) -> Self {
        if on {
            ItemState::On
        } else {
            ItemState::Off
        }
    }
}
