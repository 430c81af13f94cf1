//! Rule declarations as they appear in YAML

use rules_engine::{
    ChangedRule, ChannelEventRule, DefaultHooks, GenericChannelEventRule, ItemSelection,
    OnOffRule, OpenClosedRule, OpenTooLongRule, RangeEventSwitchRule, RangeRule, Rule, RuleHost,
    StartedRule, TimerRule, UpdatedRule,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// One entry of the `rules:` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDeclaration {
    /// Label replacing the default `UserRules.<Kind>` logger name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub kind: RuleKind,
}

/// Rule kind and its parameters, selected by the `rule:` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RuleKind {
    Changed {
        items: ItemsDeclaration,
    },
    Updated {
        items: ItemsDeclaration,
    },
    OnOff {
        items: ItemsDeclaration,
    },
    OpenClosed {
        items: ItemsDeclaration,
    },
    OpenTooLong {
        items: ItemsDeclaration,
        minutes: u64,
    },
    Range {
        items: ItemsDeclaration,
        #[serde(default)]
        low: Option<f64>,
        #[serde(default)]
        high: Option<f64>,
    },
    RangeEventSwitch {
        channel: String,
        switch: String,
    },
    ChannelEvent {
        channel: String,
        #[serde(default)]
        event: Option<String>,
    },
    GenericChannelEvent {
        source: String,
        #[serde(default)]
        topic: Option<String>,
    },
    Timer {
        cron: OneOrMany,
    },
    Started {
        #[serde(default, deserialize_with = "deserialize_delay")]
        delay: Duration,
    },
}

impl RuleKind {
    /// The `rule:` tag of this kind
    pub fn tag(&self) -> &'static str {
        match self {
            RuleKind::Changed { .. } => "changed",
            RuleKind::Updated { .. } => "updated",
            RuleKind::OnOff { .. } => "on_off",
            RuleKind::OpenClosed { .. } => "open_closed",
            RuleKind::OpenTooLong { .. } => "open_too_long",
            RuleKind::Range { .. } => "range",
            RuleKind::RangeEventSwitch { .. } => "range_event_switch",
            RuleKind::ChannelEvent { .. } => "channel_event",
            RuleKind::GenericChannelEvent { .. } => "generic_channel_event",
            RuleKind::Timer { .. } => "timer",
            RuleKind::Started { .. } => "started",
        }
    }
}

/// Items to watch: one name, a list of names, or a name -> friendly name map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemsDeclaration {
    One(String),
    List(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl ItemsDeclaration {
    pub fn is_empty(&self) -> bool {
        match self {
            ItemsDeclaration::One(name) => name.trim().is_empty(),
            ItemsDeclaration::List(names) => names.is_empty(),
            ItemsDeclaration::Named(map) => map.is_empty(),
        }
    }

    fn has_blank_name(&self) -> bool {
        match self {
            ItemsDeclaration::One(name) => name.trim().is_empty(),
            ItemsDeclaration::List(names) => names.iter().any(|n| n.trim().is_empty()),
            ItemsDeclaration::Named(map) => map.keys().any(|n| n.trim().is_empty()),
        }
    }
}

impl From<ItemsDeclaration> for ItemSelection {
    fn from(items: ItemsDeclaration) -> Self {
        match items {
            ItemsDeclaration::One(name) => ItemSelection::from(name),
            ItemsDeclaration::List(names) => ItemSelection::from(names),
            ItemsDeclaration::Named(map) => ItemSelection::from(map),
        }
    }
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

impl RuleDeclaration {
    /// Check the parameters; `key` locates the declaration in errors
    pub fn validate(&self, key: &str) -> ConfigResult<()> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ConfigError::invalid(format!("{}.name", key), "must not be empty"));
        }

        match &self.kind {
            RuleKind::Changed { items }
            | RuleKind::Updated { items }
            | RuleKind::OnOff { items }
            | RuleKind::OpenClosed { items } => validate_items(key, items),
            RuleKind::OpenTooLong { items, minutes } => {
                validate_items(key, items)?;
                if *minutes == 0 {
                    return Err(ConfigError::invalid(
                        format!("{}.minutes", key),
                        "must be greater than 0",
                    ));
                }
                Ok(())
            }
            RuleKind::Range { items, low, high } => {
                validate_items(key, items)?;
                for (bound, value) in [("low", low), ("high", high)] {
                    if value.is_some_and(|v| !v.is_finite()) {
                        return Err(ConfigError::invalid(
                            format!("{}.{}", key, bound),
                            "must be a finite number",
                        ));
                    }
                }
                match (low, high) {
                    (None, None) => Err(ConfigError::invalid(
                        key,
                        "a range needs at least one of 'low' and 'high'",
                    )),
                    (Some(low), Some(high)) if low > high => Err(ConfigError::invalid(
                        key,
                        format!("low ({}) is above high ({})", low, high),
                    )),
                    _ => Ok(()),
                }
            }
            RuleKind::RangeEventSwitch { channel, switch } => {
                non_blank(key, "channel", channel)?;
                non_blank(key, "switch", switch)
            }
            RuleKind::ChannelEvent { channel, event } => {
                non_blank(key, "channel", channel)?;
                match event {
                    Some(event) => non_blank(key, "event", event),
                    None => Ok(()),
                }
            }
            RuleKind::GenericChannelEvent { source, topic } => {
                non_blank(key, "source", source)?;
                match topic {
                    Some(topic) => non_blank(key, "topic", topic),
                    None => Ok(()),
                }
            }
            RuleKind::Timer { cron } => {
                let expressions = cron.to_vec();
                if expressions.is_empty() {
                    return Err(ConfigError::invalid(
                        format!("{}.cron", key),
                        "at least one expression is required",
                    ));
                }
                expressions
                    .iter()
                    .try_for_each(|expression| non_blank(key, "cron", expression))
            }
            RuleKind::Started { .. } => Ok(()),
        }
    }

    /// Build the rule with logging hooks
    pub fn instantiate(&self, host: &RuleHost) -> Arc<dyn Rule> {
        let name = self.name.clone();
        match self.kind.clone() {
            RuleKind::Changed { items } => named(ChangedRule::new(host, items, DefaultHooks), name),
            RuleKind::Updated { items } => named(UpdatedRule::new(host, items, DefaultHooks), name),
            RuleKind::OnOff { items } => named(OnOffRule::new(host, items, DefaultHooks), name),
            RuleKind::OpenClosed { items } => {
                named(OpenClosedRule::new(host, items, DefaultHooks), name)
            }
            RuleKind::OpenTooLong { items, minutes } => named(
                OpenTooLongRule::new(host, items, minutes, DefaultHooks),
                name,
            ),
            RuleKind::Range { items, low, high } => {
                named(RangeRule::new(host, items, low, high, DefaultHooks), name)
            }
            RuleKind::RangeEventSwitch { channel, switch } => {
                named(RangeEventSwitchRule::new(host, channel, switch), name)
            }
            RuleKind::ChannelEvent { channel, event } => named(
                ChannelEventRule::new(host, channel, event.as_deref(), DefaultHooks),
                name,
            ),
            RuleKind::GenericChannelEvent { source, topic } => {
                let rule = GenericChannelEventRule::new(host, source, DefaultHooks);
                let rule = match topic {
                    Some(topic) => rule.with_topic(topic),
                    None => rule,
                };
                named(rule, name)
            }
            RuleKind::Timer { cron } => {
                named(TimerRule::new(host, cron.to_vec(), DefaultHooks), name)
            }
            RuleKind::Started { delay } => {
                named(StartedRule::new(host, delay, DefaultHooks), name)
            }
        }
    }
}

/// Rules that accept a caller supplied logger name
trait Relabel: Rule + Sized + 'static {
    fn relabel(self, name: String) -> Self;
}

macro_rules! relabel {
    ($($rule:ty),* $(,)?) => {
        $(impl Relabel for $rule {
            fn relabel(self, name: String) -> Self {
                self.with_name(name)
            }
        })*
    };
}

relabel!(
    ChangedRule,
    UpdatedRule,
    OnOffRule,
    OpenClosedRule,
    OpenTooLongRule,
    RangeRule,
    RangeEventSwitchRule,
    ChannelEventRule,
    GenericChannelEventRule,
    TimerRule,
    StartedRule,
);

fn named<R: Relabel>(rule: R, name: Option<String>) -> Arc<dyn Rule> {
    match name {
        Some(name) => Arc::new(rule.relabel(name)),
        None => Arc::new(rule),
    }
}

fn validate_items(key: &str, items: &ItemsDeclaration) -> ConfigResult<()> {
    if items.is_empty() {
        return Err(ConfigError::invalid(
            format!("{}.items", key),
            "at least one item is required",
        ));
    }
    if items.has_blank_name() {
        return Err(ConfigError::invalid(
            format!("{}.items", key),
            "item names must not be empty",
        ));
    }
    Ok(())
}

fn non_blank(key: &str, field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(
            format!("{}.{}", key, field),
            "must not be empty",
        ));
    }
    Ok(())
}

/// Parse a delay written as `HH:MM:SS`, `MM:SS` or whole seconds
pub fn parse_duration(text: &str) -> Option<Duration> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let mut seconds: u64 = 0;
    for part in parts {
        let value: u64 = part.parse().ok()?;
        seconds = seconds.checked_mul(60)?.checked_add(value)?;
    }
    Some(Duration::from_secs(seconds))
}

fn deserialize_delay<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DelayValue {
        Seconds(u64),
        Text(String),
    }

    match DelayValue::deserialize(deserializer)? {
        DelayValue::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        DelayValue::Text(text) => parse_duration(&text).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid delay '{}', expected HH:MM:SS, MM:SS or seconds",
                text
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> RuleDeclaration {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("00:00:30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("01:30"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("1::3"), None);
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_items_forms() {
        let one = parse("rule: changed\nitems: Temp\n");
        let list = parse("rule: changed\nitems: [Temp, Humidity]\n");
        let named = parse("rule: changed\nitems: { Temp: Temperature }\n");

        assert!(matches!(one.kind, RuleKind::Changed { items: ItemsDeclaration::One(_) }));
        assert!(matches!(list.kind, RuleKind::Changed { items: ItemsDeclaration::List(_) }));
        assert!(matches!(named.kind, RuleKind::Changed { items: ItemsDeclaration::Named(_) }));

        let selection = ItemSelection::from(ItemsDeclaration::Named(
            [("Temp".to_string(), "Temperature".to_string())].into_iter().collect(),
        ));
        assert_eq!(
            selection.entries(),
            &[("Temp".to_string(), "Temperature".to_string())]
        );
    }

    #[test]
    fn test_started_delay_forms() {
        let text = parse("rule: started\ndelay: \"00:01:00\"\n");
        let seconds = parse("rule: started\ndelay: 5\n");
        let absent = parse("rule: started\n");

        assert_eq!(text.kind, RuleKind::Started { delay: Duration::from_secs(60) });
        assert_eq!(seconds.kind, RuleKind::Started { delay: Duration::from_secs(5) });
        assert_eq!(absent.kind, RuleKind::Started { delay: Duration::ZERO });
    }

    #[test]
    fn test_bad_delay_is_rejected() {
        let result: Result<RuleDeclaration, _> = serde_yaml::from_str("rule: started\ndelay: later\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let cases = [
            ("rule: changed\nitems: []\n", "r.items"),
            ("rule: open_too_long\nitems: Door\nminutes: 0\n", "r.minutes"),
            ("rule: range\nitems: Temp\n", "r"),
            ("rule: range\nitems: Temp\nlow: 30\nhigh: 10\n", "r"),
            ("rule: range\nitems: Temp\nlow: .nan\nhigh: 10\n", "r.low"),
            ("rule: range\nitems: Temp\nhigh: .inf\n", "r.high"),
            ("rule: timer\ncron: []\n", "r.cron"),
            ("rule: channel_event\nchannel: \"\"\n", "r.channel"),
            ("rule: range_event_switch\nchannel: a#b\nswitch: \" \"\n", "r.switch"),
            ("rule: on_off\nname: \"\"\nitems: Hall\n", "r.name"),
        ];

        for (yaml, expected_key) in cases {
            match parse(yaml).validate("r") {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, expected_key, "{}", yaml),
                other => panic!("expected InvalidValue for {:?}, got {:?}", yaml, other),
            }
        }
    }

    #[test]
    fn test_valid_declarations() {
        let valid = [
            "rule: range\nitems: Freezer\nhigh: -10\n",
            "rule: range\nitems: Temp\nlow: 10\nhigh: 10\n",
            "rule: timer\ncron: \"0 0 7 * * ?\"\n",
            "rule: generic_channel_event\nsource: \"astro:*\"\n",
            "rule: started\n",
        ];

        for yaml in valid {
            assert!(parse(yaml).validate("r").is_ok(), "{}", yaml);
        }
    }
}
