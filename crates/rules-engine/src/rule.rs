//! The rule interface and the hook-invocation boundary

use rules_core::Event;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::error;

use crate::subscription::Subscription;

/// Result of a user hook; the engine only logs failures
pub type HookResult = anyhow::Result<()>;

/// A rule that can be registered with a subscription engine
///
/// The engine delivers every event matching one of `subscriptions()` to
/// `execute`, possibly concurrently. `execute` never fails: malformed events,
/// hook errors and hook panics are logged and swallowed.
pub trait Rule: Send + Sync {
    /// Logger identity, `UserRules.<Kind>` unless relabelled
    fn name(&self) -> &str;

    /// Descriptors of the events this rule wants
    fn subscriptions(&self) -> Vec<Subscription>;

    /// Check if an event matches one of this rule's subscriptions
    fn handles(&self, event: &Event) -> bool {
        self.subscriptions().iter().any(|s| s.matches(event))
    }

    /// Handle a delivered event
    fn execute(&self, event: &Event);
}

/// Hook implementation that only logs
///
/// Every hook trait has default methods; this type uses all of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

/// Run a hook, logging its error or panic instead of propagating it
pub(crate) fn run_hook<F>(rule: &str, hook: &str, f: F)
where
    F: FnOnce() -> HookResult,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(rule = %rule, hook = %hook, error = %format!("{:#}", e), "Exception in event handler");
        }
        Err(payload) => {
            error!(rule = %rule, hook = %hook, panic = %panic_message(&*payload), "Event handler panicked");
        }
    }
}

/// Log an event a rule cannot interpret
pub(crate) fn malformed(rule: &str, error: &dyn std::fmt::Display) {
    error!(rule = %rule, error = %error, "Ignoring malformed event");
}

/// Lock rule state, recovering from a poisoned lock
///
/// Hooks run inside `run_hook`, so a poisoned lock can only come from a
/// panic in engine code between two consistent states.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_hook_swallows_errors_and_panics() {
        let calls = AtomicUsize::new(0);

        run_hook("UserRules.Test", "failing", || {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("boom")
        });
        run_hook("UserRules.Test", "panicking", || {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("kaboom")
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lock_recovers_from_poison() {
        let mutex = std::sync::Arc::new(Mutex::new(1));
        let poisoner = std::sync::Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(mutex.is_poisoned());
        *lock(&mutex) += 1;
        assert_eq!(*lock(&mutex), 2);
    }
}
