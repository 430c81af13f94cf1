//! Declarative rule configuration
//!
//! Rules with logging hooks can be declared in YAML instead of code:
//!
//! ```yaml
//! engine:
//!   group_depth_limit: 16
//!   message_items: { alert: AlertMsg }
//! rules:
//!   - rule: open_too_long
//!     name: GarageDoor
//!     items: { GarageDoor: "Garage door" }
//!     minutes: 10
//!   - rule: range
//!     items: [Freezer]
//!     high: -10
//!   - rule: started
//!     delay: "00:00:30"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rules_config::RulesConfig;
//!
//! let config = RulesConfig::load_file("/etc/rules/rules.yaml")?;
//! let host = config.host();
//! let rules = config.instantiate(&host);
//! ```

mod declaration;
mod error;
mod loader;

pub use declaration::{parse_duration, ItemsDeclaration, OneOrMany, RuleDeclaration, RuleKind};
pub use error::{ConfigError, ConfigResult};
pub use loader::RuleFileLoader;

use rules_engine::{EngineSettings, Rule, RuleHost};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed and validated rule file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Settings for the host the rules are built on
    #[serde(default)]
    pub engine: EngineSettings,

    /// Rule declarations, in file order
    #[serde(default)]
    pub rules: Vec<RuleDeclaration>,
}

impl RulesConfig {
    /// Load, resolve includes, parse and validate a rule file
    pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        // Includes resolve against the including file, so the base only
        // anchors a relative `path`
        let path = path.as_ref();
        let mut loader = RuleFileLoader::new(".");
        let value = loader.load_file(path)?;
        Self::from_value(value, path)
    }

    /// Parse and validate rule declarations from YAML text
    ///
    /// Includes are resolved against the current directory.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let source = Path::new("<string>");
        let mut loader = RuleFileLoader::new(".");
        let value = loader.load_string(content, source)?;
        Self::from_value(value, source)
    }

    fn from_value(value: Value, source: &Path) -> ConfigResult<Self> {
        // An empty file declares nothing
        if value.is_null() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
            path: source.to_path_buf(),
            source: e,
        })?;
        config.validate()?;

        debug!(
            source = %source.display(),
            rules = config.rules.len(),
            "Loaded rule declarations"
        );
        Ok(config)
    }

    /// Check the engine settings and every declaration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.group_depth_limit == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "engine.group_depth_limit must be at least 1".to_string(),
            });
        }

        let items = &self.engine.message_items;
        for (key, name) in [
            ("alert", &items.alert),
            ("warn", &items.warn),
            ("info", &items.info),
            ("debug", &items.debug),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("engine.message_items.{}", key),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        self.rules
            .iter()
            .enumerate()
            .try_for_each(|(idx, rule)| rule.validate(&format!("rules[{}]", idx)))
    }

    /// A fresh in-memory host carrying this file's engine settings
    pub fn host(&self) -> RuleHost {
        RuleHost::with_settings(self.engine.clone())
    }

    /// Build every declared rule against `host`, in file order
    pub fn instantiate(&self, host: &RuleHost) -> Vec<Arc<dyn Rule>> {
        let rules: Vec<Arc<dyn Rule>> = self
            .rules
            .iter()
            .map(|declaration| declaration.instantiate(host))
            .collect();

        info!(count = rules.len(), "Instantiated declared rules");
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_core::{Item, ItemKind, ItemState};
    use std::fs;
    use tempfile::TempDir;

    const EXAMPLE: &str = r#"
engine:
  group_depth_limit: 4
  message_items: { alert: Pager }
rules:
  - rule: open_too_long
    name: GarageDoor
    items: { GarageDoor: "Garage door" }
    minutes: 10
  - rule: range
    items: [Freezer]
    high: -10
  - rule: range_event_switch
    channel: "astro:sun:local:night#event"
    switch: NightLights
  - rule: on_off
    items: Hall
  - rule: channel_event
    channel: "deconz:switch:remote#buttonevent"
    event: PRESSED
  - rule: generic_channel_event
    source: "astro:*"
  - rule: timer
    cron: ["0 0 7 * * ?", "0 30 22 * * ?"]
  - rule: started
    delay: "00:00:30"
"#;

    #[test]
    fn test_parse_example() {
        let config = RulesConfig::from_yaml_str(EXAMPLE).unwrap();

        assert_eq!(config.engine.group_depth_limit, 4);
        assert_eq!(config.engine.message_items.alert, "Pager");
        assert_eq!(config.engine.message_items.warn, "WarnMsg");

        let tags: Vec<_> = config.rules.iter().map(|r| r.kind.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "open_too_long",
                "range",
                "range_event_switch",
                "on_off",
                "channel_event",
                "generic_channel_event",
                "timer",
                "started",
            ]
        );
        assert_eq!(config.rules[0].name.as_deref(), Some("GarageDoor"));
    }

    #[test]
    fn test_instantiate() {
        let config = RulesConfig::from_yaml_str(EXAMPLE).unwrap();
        let host = config.host();
        host.items.add(Item::new("GarageDoor", ItemKind::Contact).with_state(ItemState::Closed));
        host.items.add(Item::new("Freezer", ItemKind::Number));
        host.items.add(Item::new("Hall", ItemKind::Switch));

        let rules = config.instantiate(&host);
        assert_eq!(rules.len(), 8);

        let names: Vec<_> = rules.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names[0], "GarageDoor");
        assert_eq!(names[1], "UserRules.RangeRule");
        assert_eq!(names[7], "UserRules.StartedRule");

        // OpenTooLong watches both transitions, OnOff likewise
        assert_eq!(rules[0].subscriptions().len(), 2);
        assert_eq!(rules[3].subscriptions().len(), 2);
        assert_eq!(rules[6].subscriptions().len(), 2);
        assert_eq!(host.settings.group_depth_limit, 4);
    }

    #[test]
    fn test_empty_document() {
        let config = RulesConfig::from_yaml_str("").unwrap();
        assert!(config.rules.is_empty());
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn test_invalid_declaration_is_located() {
        let yaml = "rules:\n  - rule: on_off\n    items: Hall\n  - rule: open_too_long\n    items: Door\n    minutes: 0\n";
        match RulesConfig::from_yaml_str(yaml) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "rules[1].minutes"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_rule_kind() {
        let result = RulesConfig::from_yaml_str("rules:\n  - rule: teleport\n    items: Hall\n");
        assert!(matches!(result, Err(ConfigError::ParseYaml { .. })));
    }

    #[test]
    fn test_engine_validation() {
        let result = RulesConfig::from_yaml_str("engine:\n  group_depth_limit: 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));

        let result = RulesConfig::from_yaml_str("engine:\n  message_items: { info: \"\" }\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_file_with_rules_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("rules.d")).unwrap();
        fs::write(
            dir.path().join("rules.d/doors.yaml"),
            "- rule: open_closed\n  items: [FrontDoor, BackDoor]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("rules.d/startup.yaml"),
            "- rule: started\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("rules.yaml"),
            "rules: !include_dir_merge_list rules.d\n",
        )
        .unwrap();

        let config = RulesConfig::load_file(dir.path().join("rules.yaml")).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].kind, RuleKind::Started { delay: std::time::Duration::ZERO });
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = RulesConfig::load_file(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
