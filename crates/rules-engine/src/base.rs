//! Shared plumbing for every rule: identity, item access, bus helpers,
//! timers and action lookup

use rules_action_registry::ActionHandle;
use rules_core::{Context, Item, ItemState};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::RuleResult;
use crate::host::RuleHost;
use crate::scheduler::{Deadline, TimerHandle};

/// A command or update value in its wire form
///
/// Numbers are rendered the same way as numeric item states, so
/// `send_command("Level", 10.0)` sends `10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusValue(String);

impl BusValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BusValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<ItemState> for BusValue {
    fn from(state: ItemState) -> Self {
        Self(state.to_full_string())
    }
}

impl From<f64> for BusValue {
    fn from(v: f64) -> Self {
        Self::from(ItemState::Decimal(v))
    }
}

impl From<i32> for BusValue {
    fn from(v: i32) -> Self {
        Self(v.to_string())
    }
}

impl From<i64> for BusValue {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

/// State and helpers common to all rules
///
/// Cheap to clone, so timer callbacks can carry their own copy.
#[derive(Clone)]
pub struct RuleBase {
    name: Arc<str>,
    host: RuleHost,
}

impl RuleBase {
    /// Create the base for a rule of the given kind, named `UserRules.<kind>`
    pub fn new(host: &RuleHost, kind: &str) -> Self {
        Self {
            name: Arc::from(format!("UserRules.{}", kind)),
            host: host.clone(),
        }
    }

    /// Replace the logger identity with a caller supplied label
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Arc::from(name.into());
    }

    /// Logger identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The host this rule was built against
    pub fn host(&self) -> &RuleHost {
        &self.host
    }

    /// Fresh context for commands and updates emitted by this rule
    pub fn context(&self) -> Context {
        Context::for_rule(self.name())
    }

    // --- Item access ---

    /// Look up an item
    pub fn item(&self, name: &str) -> RuleResult<Item> {
        Ok(self.host.items.get(name)?)
    }

    /// The single item matching a glob pattern
    pub fn item_by_pattern(&self, pattern: &str) -> RuleResult<Item> {
        Ok(self.host.items.item_by_pattern(pattern)?)
    }

    /// All items, sorted by name
    pub fn items(&self) -> Vec<Item> {
        self.host.items.items()
    }

    /// Items matching a glob pattern, sorted by name
    pub fn items_matching(&self, pattern: &str) -> RuleResult<Vec<Item>> {
        Ok(self.host.items.items_matching(pattern)?)
    }

    // --- Bus ---

    /// Send a command to an item
    pub fn send_command(&self, item: impl AsRef<str>, value: impl Into<BusValue>) {
        let value = value.into();
        debug!(rule = %self.name, item = %item.as_ref(), command = %value, "sendCommand");
        self.host
            .bus
            .send_command(item.as_ref(), value.0, self.context());
    }

    /// Post a state update to an item
    pub fn post_update(&self, item: impl AsRef<str>, value: impl Into<BusValue>) {
        let value = value.into();
        debug!(rule = %self.name, item = %item.as_ref(), state = %value, "postUpdate");
        self.host
            .bus
            .post_update(item.as_ref(), value.0, self.context());
    }

    /// Flip a switch or dimmer
    ///
    /// A dimmer above 0 is commanded to `0`, otherwise to `100`; a switch is
    /// commanded to the opposite of its state. Any other state, including
    /// an undefined dimmer or switch, is logged and nothing is sent.
    pub fn toggle(&self, name: &str) -> RuleResult<()> {
        let item = self.item(name)?;
        let command = match (item.state, &item.kind) {
            (ItemState::Percent(v), _) if v > 0.0 => "0",
            (ItemState::Percent(_), _) => "100",
            (ItemState::On, _) => "OFF",
            (ItemState::Off, _) => "ON",
            (state, kind) => {
                error!(
                    rule = %self.name,
                    item = %name,
                    state = %state,
                    kind = ?kind,
                    "Toggle ignored, state is neither on/off nor a percentage"
                );
                return Ok(());
            }
        };
        self.send_command(name, command);
        Ok(())
    }

    /// Check if a switch is ON or a dimmer is above 0
    pub fn is_on(&self, name: &str) -> RuleResult<bool> {
        Ok(match self.item(name)?.state {
            ItemState::Percent(v) => v > 0.0,
            ItemState::On => true,
            _ => false,
        })
    }

    // --- Messages ---

    /// Log at warn level and post to the alert message item
    pub fn alert_msg(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(rule = %self.name, "{}", msg);
        self.post_update(&self.host.settings.message_items.alert, msg);
    }

    /// Log at warn level and post to the warning message item
    pub fn warn_msg(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(rule = %self.name, "{}", msg);
        self.post_update(&self.host.settings.message_items.warn, msg);
    }

    /// Log at info level and post to the info message item
    pub fn info_msg(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!(rule = %self.name, "{}", msg);
        self.post_update(&self.host.settings.message_items.info, msg);
    }

    /// Log at debug level and post to the debug message item
    pub fn debug_msg(&self, msg: impl Into<String>) {
        let msg = msg.into();
        debug!(rule = %self.name, "{}", msg);
        self.post_update(&self.host.settings.message_items.debug, msg);
    }

    // --- Timers and actions ---

    /// Run `callback` once at `when`
    pub fn create_timer<F>(&self, when: impl Into<Deadline>, callback: F) -> RuleResult<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let when = when.into();
        debug!(rule = %self.name, deadline = ?when, "Setting timer");
        self.host.scheduler.schedule_once(when, callback)
    }

    /// Find a host action by name, falling back to a name containing it
    pub fn action(&self, name: &str) -> Option<ActionHandle> {
        let found = self.host.actions.find(name);
        if found.is_none() {
            debug!(rule = %self.name, action = %name, "Action not found");
        }
        found
    }
}

impl fmt::Debug for RuleBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleBase").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules_core::events::{ItemCommandData, ItemStateData};
    use rules_core::ItemKind;

    fn setup() -> (RuleHost, RuleBase) {
        let host = RuleHost::in_memory();
        host.items
            .add(Item::new("Kitchen", ItemKind::Dimmer).with_state(ItemState::Decimal(40.0)));
        host.items
            .add(Item::new("Hall", ItemKind::Switch).with_state(ItemState::On));
        host.items.add(Item::new("Porch", ItemKind::Switch));
        host.items
            .add(Item::new("FrontDoor", ItemKind::Contact).with_state(ItemState::Open));
        let base = RuleBase::new(&host, "TestRule");
        (host, base)
    }

    #[test]
    fn test_logger_name() {
        let (_, mut base) = setup();
        assert_eq!(base.name(), "UserRules.TestRule");
        assert_eq!(base.context().rule.as_deref(), Some("UserRules.TestRule"));

        base.set_name("Garage");
        assert_eq!(base.name(), "Garage");
    }

    #[test]
    fn test_toggle() {
        let (host, base) = setup();
        let mut commands = host.bus.subscribe_typed::<ItemCommandData>();

        base.toggle("Kitchen").unwrap();
        base.toggle("Hall").unwrap();
        // Porch has no state yet; neither it nor the contact gets a command
        base.toggle("Porch").unwrap();
        base.toggle("FrontDoor").unwrap();
        assert!(base.toggle("Missing").is_err());

        let sent: Vec<_> = std::iter::from_fn(|| commands.try_recv())
            .map(|e| (e.data.item_name, e.data.command))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("Kitchen".to_string(), "0".to_string()),
                ("Hall".to_string(), "OFF".to_string()),
            ]
        );
    }

    #[test]
    fn test_is_on() {
        let (host, base) = setup();
        assert!(base.is_on("Kitchen").unwrap());
        assert!(base.is_on("Hall").unwrap());
        assert!(!base.is_on("Porch").unwrap());
        assert!(!base.is_on("FrontDoor").unwrap());

        host.items
            .set_state("Kitchen", ItemState::Decimal(0.0), Context::new())
            .unwrap();
        assert!(!base.is_on("Kitchen").unwrap());
    }

    #[test]
    fn test_message_helpers_post_to_message_items() {
        let (host, base) = setup();
        let mut updates = host.bus.subscribe_typed::<ItemStateData>();

        base.alert_msg("Garage door open");
        base.info_msg(String::from("Good morning"));

        let alert = updates.try_recv().unwrap();
        assert_eq!(alert.data.item_name, "AlertMsg");
        assert_eq!(alert.data.state, "Garage door open");
        assert_eq!(alert.context.rule.as_deref(), Some("UserRules.TestRule"));

        let info = updates.try_recv().unwrap();
        assert_eq!(info.data.item_name, "InfoMsg");
    }

    #[test]
    fn test_values_render_like_states() {
        let (host, base) = setup();
        let mut commands = host.bus.subscribe_typed::<ItemCommandData>();

        let item = base.item("Kitchen").unwrap();
        base.send_command(&item, 10.0);
        base.send_command("Kitchen", 55);
        base.post_update("Hall", ItemState::Off);

        assert_eq!(commands.try_recv().unwrap().data.command, "10");
        assert_eq!(commands.try_recv().unwrap().data.command, "55");
        assert!(commands.try_recv().is_none());
    }

    #[test]
    fn test_item_lookups() {
        let (_, base) = setup();
        assert_eq!(base.items().len(), 4);
        assert_eq!(base.item_by_pattern("Front*").unwrap().name, "FrontDoor");
        assert_eq!(base.items_matching("P*").unwrap().len(), 1);
        assert!(base.item_by_pattern("*o*").is_err());
    }

    #[test]
    fn test_action_lookup() {
        let (host, base) = setup();
        host.actions.register(
            "notify.pushover",
            |_: rules_action_registry::ActionCall| async { Ok(None) },
        );

        assert_eq!(base.action("pushover").unwrap().name(), "notify.pushover");
        assert!(base.action("telegram").is_none());
    }
}
