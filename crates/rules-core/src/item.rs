//! Item type: a named, addressable point of automation state

use serde::{Deserialize, Serialize};

use crate::ItemState;

/// What kind of item this is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Switch,
    Contact,
    Number,
    Dimmer,
    /// A group of other items
    ///
    /// A group with a `base_type` has a state of its own and is treated as a
    /// single item; without one it is a transparent container.
    Group {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_type: Option<Box<ItemKind>>,
        #[serde(default)]
        members: Vec<String>,
    },
}

/// An item known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item name (e.g., "FrontDoor")
    pub name: String,

    /// Optional display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Item kind
    pub kind: ItemKind,

    /// Current state
    pub state: ItemState,
}

impl Item {
    /// Create a new item with an undefined state
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            kind,
            state: ItemState::Undefined,
        }
    }

    /// Create a group item
    pub fn group(
        name: impl Into<String>,
        base_type: Option<ItemKind>,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            name,
            ItemKind::Group {
                base_type: base_type.map(Box::new),
                members: members.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Set the state
    pub fn with_state(mut self, state: ItemState) -> Self {
        self.state = self.coerce(state);
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check if this item is a group of any sort
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group { .. })
    }

    /// Check if this item is a group without a base type
    pub fn is_transparent_group(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Group {
                base_type: None,
                ..
            }
        )
    }

    /// Direct members of a group (empty for plain items)
    pub fn members(&self) -> &[String] {
        match &self.kind {
            ItemKind::Group { members, .. } => members,
            _ => &[],
        }
    }

    /// Adapt a state to this item's kind
    ///
    /// Dimmers hold percent values, so a plain number (as it arrives from
    /// the wire) becomes a percent; ON/OFF sent to a dimmer map to 100/0.
    pub fn coerce(&self, state: ItemState) -> ItemState {
        let kind = match &self.kind {
            ItemKind::Group {
                base_type: Some(base),
                ..
            } => base.as_ref(),
            kind => kind,
        };

        match (kind, state) {
            (ItemKind::Dimmer, ItemState::Decimal(v)) => ItemState::percent(v),
            (ItemKind::Dimmer, ItemState::On) => ItemState::Percent(100.0),
            (ItemKind::Dimmer, ItemState::Off) => ItemState::Percent(0.0),
            (_, state) => state,
        }
    }
}

impl AsRef<str> for Item {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
