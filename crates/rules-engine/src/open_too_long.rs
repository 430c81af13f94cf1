//! OpenTooLongRule: alert when a contact stays open too long
//!
//! Escalation state machine, one per rule:
//!
//! ```text
//! Idle --open--> Pending --timer--> Alerted
//!  ^               |                   |
//!  +----closed-----+------closed-------+  (closed_after_alert)
//! ```
//!
//! Every transition, including the timer expiry, runs under one lock. A new
//! `open` replaces the pending timer; each timer carries the generation it
//! was started with and does nothing if it is no longer the active one.

use rules_core::events::ItemStateChangedData;
use rules_core::Event;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::host::RuleHost;
use crate::item_rule::ItemRuleBase;
use crate::open_closed::{OpenClosedHandler, OpenClosedRule};
use crate::resolver::ItemSelection;
use crate::rule::{lock, run_hook, DefaultHooks, HookResult, Rule};
use crate::scheduler::TimerHandle;
use crate::subscription::Subscription;

/// Hooks for [`OpenTooLongRule`]
pub trait EscalationHandler: Send + Sync + 'static {
    /// The item has been open for `minutes`
    fn alert(&self, rule: &ItemRuleBase, item_name: &str, minutes: u64) -> HookResult {
        info!(
            rule = %rule.name(),
            "{} open more than {} minutes",
            rule.friendly_name(item_name),
            minutes
        );
        Ok(())
    }

    /// The item closed after `alert` was called
    fn closed_after_alert(&self, rule: &ItemRuleBase, item_name: &str) -> HookResult {
        info!(rule = %rule.name(), "{} closed.", rule.friendly_name(item_name));
        Ok(())
    }
}

impl EscalationHandler for DefaultHooks {}

/// Where a rule is in its escalation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPhase {
    Idle,
    Pending,
    Alerted,
}

#[derive(Debug, Default)]
struct EscalationState {
    timer: Option<TimerHandle>,
    alert_sent: bool,
    generation: u64,
}

struct EscalationInner<H> {
    handler: H,
    minutes: u64,
    state: Mutex<EscalationState>,
}

impl<H: EscalationHandler> EscalationInner<H> {
    fn expire(&self, rule: &ItemRuleBase, item_name: &str, generation: u64) {
        let mut state = lock(&self.state);
        if state.generation != generation || state.timer.is_none() {
            debug!(rule = %rule.name(), "Timer was cancelled while waiting to execute alert");
            return;
        }

        debug!(rule = %rule.name(), "Timer expired, calling alert");
        state.timer = None;
        state.alert_sent = true;
        run_hook(rule.name(), "alert", || {
            self.handler.alert(rule, item_name, self.minutes)
        });
    }
}

/// Open/closed hooks driving the escalation state machine
pub struct Escalation<H> {
    inner: Arc<EscalationInner<H>>,
}

impl<H: EscalationHandler> Escalation<H> {
    fn new(handler: H, minutes: u64) -> Self {
        Self {
            inner: Arc::new(EscalationInner {
                handler,
                minutes,
                state: Mutex::new(EscalationState::default()),
            }),
        }
    }

    fn phase(&self) -> EscalationPhase {
        let state = lock(&self.inner.state);
        if state.timer.is_some() {
            EscalationPhase::Pending
        } else if state.alert_sent {
            EscalationPhase::Alerted
        } else {
            EscalationPhase::Idle
        }
    }
}

impl<H: EscalationHandler> OpenClosedHandler for Escalation<H> {
    fn open(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        let item_name = event.data.item_name.clone();
        let friendly = rule.friendly_name(&item_name).to_string();
        let minutes = self.inner.minutes;

        let mut state = lock(&self.inner.state);
        if let Some(timer) = state.timer.take() {
            // Two OPENs without a CLOSED in between
            debug!(rule = %rule.name(), "{} running timer cancelled.", friendly);
            timer.cancel();
        }

        state.generation += 1;
        let generation = state.generation;
        let callback = {
            let inner = Arc::clone(&self.inner);
            let rule = rule.clone();
            move || inner.expire(&rule, &item_name, generation)
        };

        let delay = Duration::from_secs(minutes.saturating_mul(60));
        match rule.create_timer(delay, callback) {
            Ok(timer) => {
                debug!(
                    rule = %rule.name(),
                    "{} open. Starting timer for {} minutes.",
                    friendly,
                    minutes
                );
                state.timer = Some(timer);
            }
            Err(e) => {
                error!(rule = %rule.name(), item = %friendly, error = %e, "Could not start escalation timer");
            }
        }
        Ok(())
    }

    fn closed(&self, rule: &ItemRuleBase, event: &Event<ItemStateChangedData>) -> HookResult {
        let item_name = &event.data.item_name;
        let friendly = rule.friendly_name(item_name);

        let mut state = lock(&self.inner.state);
        match state.timer.take() {
            Some(timer) => {
                debug!(rule = %rule.name(), "{} closed. Timer cancelled.", friendly);
                timer.cancel();
            }
            None => debug!(rule = %rule.name(), "{} closed. No timer running.", friendly),
        }

        if state.alert_sent {
            state.alert_sent = false;
            run_hook(rule.name(), "closed_after_alert", || {
                self.inner.handler.closed_after_alert(rule, item_name)
            });
        }
        Ok(())
    }
}

/// Calls `alert` once an item has been open for `minutes`, and
/// `closed_after_alert` when it closes afterwards
pub struct OpenTooLongRule<H = DefaultHooks> {
    rule: OpenClosedRule<Escalation<H>>,
}

impl<H: EscalationHandler> OpenTooLongRule<H> {
    pub fn new(
        host: &RuleHost,
        selection: impl Into<ItemSelection>,
        minutes: u64,
        handler: H,
    ) -> Self {
        Self {
            rule: OpenClosedRule::with_kind(
                host,
                "OpenTooLongRule",
                selection,
                Escalation::new(handler, minutes),
            ),
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.rule = self.rule.with_name(name);
        self
    }

    pub fn base(&self) -> &ItemRuleBase {
        self.rule.base()
    }

    pub fn minutes(&self) -> u64 {
        self.rule.handler().inner.minutes
    }

    /// Current escalation phase
    pub fn phase(&self) -> EscalationPhase {
        self.rule.handler().phase()
    }
}

impl<H: EscalationHandler> Rule for OpenTooLongRule<H> {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        self.rule.subscriptions()
    }

    fn execute(&self, event: &Event) {
        self.rule.execute(event)
    }
}
