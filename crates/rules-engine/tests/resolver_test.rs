//! Watch-list resolution and the all/any predicates

mod common;

use common::TestHost;
use rules_core::{Context, ItemKind, ItemState};
use rules_engine::{ChangedRule, DefaultHooks, ItemRuleBase, Rule};
use std::collections::{BTreeMap, HashMap};

fn doors() -> TestHost {
    let t = TestHost::new();
    t.add("FrontDoor", ItemKind::Contact, ItemState::Closed);
    t.add("BackDoor", ItemKind::Contact, ItemState::Closed);
    t.add("GarageDoor", ItemKind::Contact, ItemState::Open);
    t.add("ShedDoor", ItemKind::Contact, ItemState::Closed);
    t.add_group("gDoors", None, &["FrontDoor", "BackDoor", "gOutbuildings"]);
    t.add_group("gOutbuildings", None, &["GarageDoor", "gShed"]);
    t.add_group("gShed", None, &["ShedDoor", "gDoors"]);
    t.add_group("gAllClosed", Some(ItemKind::Contact), &["FrontDoor", "BackDoor"]);
    t
}

#[test]
fn test_group_flattening_follows_membership() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", ("gDoors", "Door"));

    let names: Vec<_> = rule.watch_list().names().collect();
    assert_eq!(names, vec!["BackDoor", "FrontDoor", "GarageDoor", "ShedDoor"]);
    assert!(rule.watch_list().iter().all(|(_, friendly)| friendly == "Door"));
}

#[test]
fn test_group_cycle_terminates() {
    let t = doors();
    // gShed contains gDoors, which contains gOutbuildings, which contains gShed
    let rule = ItemRuleBase::new(&t.host, "Test", "gShed");

    let names: Vec<_> = rule.watch_list().names().collect();
    assert_eq!(names, vec!["BackDoor", "FrontDoor", "GarageDoor", "ShedDoor"]);
}

#[test]
fn test_group_with_base_type_is_single_item() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", "gAllClosed");

    let names: Vec<_> = rule.watch_list().names().collect();
    assert_eq!(names, vec!["gAllClosed"]);
}

#[test]
fn test_unknown_items_are_dropped() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", vec!["FrontDoor", "NoSuchDoor"]);

    assert_eq!(rule.watch_list().len(), 1);
    assert_eq!(rule.friendly_name("NoSuchDoor"), "NoSuchDoor");
}

#[test]
fn test_map_inputs() {
    let t = doors();
    let hash: HashMap<String, String> =
        [("FrontDoor".to_string(), "Front".to_string())].into_iter().collect();
    let tree: BTreeMap<String, String> =
        [("BackDoor".to_string(), "Back".to_string())].into_iter().collect();

    let front = ItemRuleBase::new(&t.host, "Test", hash);
    let back = ItemRuleBase::new(&t.host, "Test", tree);

    assert_eq!(front.friendly_name("FrontDoor"), "Front");
    assert_eq!(back.friendly_name("BackDoor"), "Back");
}

#[test]
fn test_resolution_and_descriptors_are_idempotent() {
    let t = doors();
    let first = ChangedRule::new(&t.host, "gDoors", DefaultHooks);
    let second = ChangedRule::new(&t.host, "gDoors", DefaultHooks);

    assert_eq!(first.base().watch_list(), second.base().watch_list());
    assert_eq!(first.subscriptions(), second.subscriptions());
    assert_eq!(first.subscriptions(), first.subscriptions());
    assert_eq!(first.subscriptions().len(), 4);
}

#[test]
fn test_all_and_any_read_live_state() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", "gDoors");

    assert!(!rule.all(ItemState::Closed));
    assert!(rule.any(ItemState::Open));

    t.host
        .items
        .set_state("GarageDoor", ItemState::Closed, Context::new())
        .unwrap();

    assert!(rule.all(ItemState::Closed));
    assert!(!rule.any(ItemState::Open));
}

#[test]
fn test_all_and_any_skip_removed_items() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", vec!["FrontDoor", "GarageDoor"]);

    t.host.items.remove("GarageDoor");

    assert!(rule.all(ItemState::Closed));
    assert!(!rule.any(ItemState::Open));
}

#[test]
fn test_all_and_any_on_empty_watch_list() {
    let t = doors();
    let rule = ItemRuleBase::new(&t.host, "Test", Vec::<String>::new());

    assert!(rule.watch_list().is_empty());
    assert!(rule.all(ItemState::On));
    assert!(!rule.any(ItemState::On));
}

#[test]
fn test_equality_is_structural() {
    let t = TestHost::new();
    t.add("Temp", ItemKind::Number, ItemState::Decimal(21.5));
    let rule = ItemRuleBase::new(&t.host, "Test", "Temp");

    assert!(rule.all("21.5".parse().unwrap()));
    assert!(rule.any(ItemState::Decimal(21.5)));
}

#[test]
fn test_dimmer_matches_its_numeric_state() {
    let t = TestHost::new();
    t.add("Kitchen", ItemKind::Dimmer, ItemState::percent(50.0));
    t.add("Hall", ItemKind::Dimmer, ItemState::percent(50.0));
    let rule = ItemRuleBase::new(&t.host, "Test", vec!["Kitchen", "Hall"]);

    assert!(rule.all("50".parse().unwrap()));
    assert!(rule.any(ItemState::Decimal(50.0)));
    assert!(!rule.any(ItemState::Decimal(49.0)));
}
