//! StartedRule: run a hook once the host has started
//!
//! The optional delay is a scheduled callback, so `execute` returns at once.

use rules_core::Event;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::base::RuleBase;
use crate::host::RuleHost;
use crate::rule::{run_hook, DefaultHooks, HookResult, Rule};
use crate::subscription::{Subscription, SubscriptionFactory};

/// Hook for [`StartedRule`]
pub trait StartedHandler: Send + Sync + 'static {
    fn started(&self, rule: &RuleBase) -> HookResult {
        info!(rule = %rule.name(), "System started");
        Ok(())
    }
}

impl StartedHandler for DefaultHooks {}

impl<F> StartedHandler for F
where
    F: Fn(&RuleBase) -> HookResult + Send + Sync + 'static,
{
    fn started(&self, rule: &RuleBase) -> HookResult {
        self(rule)
    }
}

struct Startup<H> {
    handler: H,
    /// A startup event has been accepted
    triggered: AtomicBool,
    /// The hook has been called
    started: AtomicBool,
}

impl<H: StartedHandler> Startup<H> {
    fn fire(&self, base: &RuleBase) {
        self.started.store(true, Ordering::SeqCst);
        run_hook(base.name(), "started", || self.handler.started(base));
    }
}

/// Calls `started` once, after an optional delay
pub struct StartedRule<H = DefaultHooks> {
    base: RuleBase,
    delay: Duration,
    startup: Arc<Startup<H>>,
}

impl<H: StartedHandler> StartedRule<H> {
    pub fn new(host: &RuleHost, delay: Duration, handler: H) -> Self {
        Self {
            base: RuleBase::new(host, "StartedRule"),
            delay,
            startup: Arc::new(Startup {
                handler,
                triggered: AtomicBool::new(false),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Relabel the rule
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.base.set_name(name);
        self
    }

    pub fn base(&self) -> &RuleBase {
        &self.base
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Check if the `started` hook has been called
    pub fn is_started(&self) -> bool {
        self.startup.started.load(Ordering::SeqCst)
    }
}

impl<H: StartedHandler> Rule for StartedRule<H> {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![SubscriptionFactory::system_started()]
    }

    #[instrument(skip_all, fields(rule = %self.name()))]
    fn execute(&self, _event: &Event) {
        if self.startup.triggered.swap(true, Ordering::SeqCst) {
            debug!("Startup already handled, ignoring");
            return;
        }
        debug!("Startup event received");

        if self.delay.is_zero() {
            self.startup.fire(&self.base);
            return;
        }

        let callback = {
            let startup = Arc::clone(&self.startup);
            let base = self.base.clone();
            move || startup.fire(&base)
        };
        match self.base.create_timer(self.delay, callback) {
            Ok(_) => debug!(delay_ms = self.delay.as_millis() as u64, "Startup hook deferred"),
            Err(e) => {
                error!(error = %e, "Could not defer startup hook");
                self.startup.triggered.store(false, Ordering::SeqCst);
            }
        }
    }
}
