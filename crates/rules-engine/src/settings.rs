//! Engine-wide settings

use serde::{Deserialize, Serialize};

/// Settings shared by every rule built on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// How many levels of nested groups the item resolver expands
    #[serde(default = "default_group_depth_limit")]
    pub group_depth_limit: usize,

    /// Items that receive the `*_msg` helper messages
    #[serde(default)]
    pub message_items: MessageItems,
}

fn default_group_depth_limit() -> usize {
    16
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            group_depth_limit: default_group_depth_limit(),
            message_items: MessageItems::default(),
        }
    }
}

/// Names of the message items updated by `alert_msg` and friends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageItems {
    #[serde(default = "default_alert")]
    pub alert: String,
    #[serde(default = "default_warn")]
    pub warn: String,
    #[serde(default = "default_info")]
    pub info: String,
    #[serde(default = "default_debug")]
    pub debug: String,
}

fn default_alert() -> String {
    "AlertMsg".to_string()
}

fn default_warn() -> String {
    "WarnMsg".to_string()
}

fn default_info() -> String {
    "InfoMsg".to_string()
}

fn default_debug() -> String {
    "DebugMsg".to_string()
}

impl Default for MessageItems {
    fn default() -> Self {
        Self {
            alert: default_alert(),
            warn: default_warn(),
            info: default_info(),
            debug: default_debug(),
        }
    }
}
