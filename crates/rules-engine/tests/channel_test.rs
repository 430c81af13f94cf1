//! Channel trigger rules

mod common;

use common::{channel_event, Recorder, TestHost};
use rules_core::events::ChannelTriggeredData;
use rules_core::{ItemKind, ItemState};
use rules_engine::{
    ChannelEventRule, DefaultHooks, GenericChannelEventRule, HookResult, RangeEventRule,
    RangeEventSwitchRule, Rule, RuleBase,
};

const NIGHT: &str = "astro:sun:local:night#event";
const DAWN: &str = "astro:sun:local:dawn#event";

#[test]
fn test_channel_event_all_events() {
    let t = TestHost::new();
    let recorder = Recorder::new();
    let rule = ChannelEventRule::new(&t.host, NIGHT, None, recorder.clone());

    let subs = rule.subscriptions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].id, "channel_ALL");
    assert_eq!(subs[0].config("channelUID"), Some(NIGHT));
    assert_eq!(subs[0].config("event"), None);

    let start = channel_event(NIGHT, "START");
    assert!(rule.handles(&start));
    assert!(!rule.handles(&channel_event(DAWN, "START")));

    rule.execute(&start);
    rule.execute(&channel_event(NIGHT, "END"));

    assert_eq!(
        recorder.calls(),
        vec![format!("triggered:{}:START", NIGHT), format!("triggered:{}:END", NIGHT)]
    );
}

#[test]
fn test_channel_event_single_event() {
    let t = TestHost::new();
    let rule = ChannelEventRule::new(&t.host, NIGHT, Some("START"), DefaultHooks);

    let subs = rule.subscriptions();
    assert_eq!(subs[0].id, "channel_START");
    assert_eq!(subs[0].config("event"), Some("START"));

    assert!(rule.handles(&channel_event(NIGHT, "START")));
    assert!(!rule.handles(&channel_event(NIGHT, "END")));
}

#[test]
fn test_generic_channel_event_matches_patterns() {
    let t = TestHost::new();
    let recorder = Recorder::new();
    let hook = {
        let recorder = recorder.clone();
        move |_: &RuleBase, event: &rules_core::Event<ChannelTriggeredData>| -> HookResult {
            recorder.record(event.data.channel.clone());
            Ok(())
        }
    };
    let rule = GenericChannelEventRule::new(&t.host, "astro:sun:*", hook);

    let subs = rule.subscriptions();
    assert_eq!(subs[0].id, "gen_ALL");
    assert_eq!(subs[0].config("eventTopic"), Some("smarthome/channels/*/triggered"));
    assert_eq!(subs[0].config("eventSource"), Some("astro:sun:*"));

    let night = channel_event(NIGHT, "START");
    let moon = channel_event("astro:moon:local:rise#event", "START");
    assert!(rule.handles(&night));
    assert!(!rule.handles(&moon));

    rule.execute(&night);
    assert_eq!(recorder.calls(), vec![NIGHT.to_string()]);
}

#[test]
fn test_generic_channel_event_custom_topic() {
    let t = TestHost::new();
    let rule = GenericChannelEventRule::new(&t.host, "*", DefaultHooks)
        .with_topic("smarthome/channels/astro:sun:local:dawn*/triggered");

    assert!(rule.handles(&channel_event(DAWN, "START")));
    assert!(!rule.handles(&channel_event(NIGHT, "START")));

    let subs = rule.subscriptions();
    assert_eq!(subs.len(), 1);
    assert_eq!(
        subs[0].config("eventTopic"),
        Some("smarthome/channels/astro:sun:local:dawn*/triggered")
    );
    assert!(subs[0].matches(&channel_event(DAWN, "START")));
}

#[test]
fn test_range_event_start_and_end() {
    let t = TestHost::new();
    let recorder = Recorder::new();
    let rule = RangeEventRule::new(&t.host, NIGHT, recorder.clone());

    assert_eq!(rule.name(), "UserRules.RangeEventRule");
    assert_eq!(rule.subscriptions()[0].config("event"), None);

    rule.execute(&channel_event(NIGHT, "START"));
    rule.execute(&channel_event(NIGHT, "END"));
    rule.execute(&channel_event(NIGHT, "SOMETHING_ELSE"));

    assert_eq!(
        recorder.calls(),
        vec![
            format!("start:{}", NIGHT),
            "end:END".to_string(),
            "end:SOMETHING_ELSE".to_string(),
        ]
    );
}

#[test]
fn test_range_event_switch_drives_switch() {
    let mut t = TestHost::new();
    t.add("NightMode", ItemKind::Switch, ItemState::Off);
    let rule = RangeEventSwitchRule::new(&t.host, NIGHT, "NightMode");

    assert_eq!(rule.name(), "UserRules.RangeEventSwitchRule");
    assert_eq!(rule.switch(), "NightMode");
    assert_eq!(rule.channel(), NIGHT);

    rule.execute(&channel_event(NIGHT, "START"));
    rule.execute(&channel_event(NIGHT, "END"));

    assert_eq!(
        t.commands(),
        vec![
            ("NightMode".to_string(), "ON".to_string()),
            ("NightMode".to_string(), "OFF".to_string()),
        ]
    );
}

#[test]
fn test_malformed_channel_event_is_swallowed() {
    let t = TestHost::new();
    let recorder = Recorder::new();
    let rule = ChannelEventRule::new(&t.host, NIGHT, None, recorder.clone());

    rule.execute(&common::started_event());

    assert!(recorder.calls().is_empty());
}
