//! Registry of host-provided actions
//!
//! Actions are named async operations offered by the host (sending a
//! notification, calling out to a bridge, ...). Rules look them up by name
//! and invoke them with JSON arguments.

use dashmap::DashMap;
use rules_core::Context;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Result type for action calls
pub type ActionResult = Result<Option<serde_json::Value>, ActionError>;

/// Future type for async action handlers
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Action handler function type
pub type ActionHandler = Arc<dyn Fn(ActionCall) -> ActionFuture + Send + Sync>;

/// Errors that can occur when working with actions
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("action not found: {0}")]
    NotFound(String),

    #[error("action call failed: {0}")]
    CallFailed(String),

    #[error("invalid action arguments: {0}")]
    InvalidArguments(String),
}

/// A single invocation of an action
#[derive(Debug, Clone)]
pub struct ActionCall {
    /// Registered name of the action being invoked
    pub action: String,
    /// Arguments passed by the caller
    pub args: serde_json::Value,
    /// Context of the rule making the call
    pub context: Context,
}

/// A resolved action, ready to be called
///
/// Handles are cheap to clone and do not borrow the registry.
#[derive(Clone)]
pub struct ActionHandle {
    name: String,
    handler: ActionHandler,
}

impl ActionHandle {
    /// The registered name this handle resolved to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the action
    pub async fn call(&self, args: serde_json::Value, context: Context) -> ActionResult {
        debug!(action = %self.name, "Calling action");
        let call = ActionCall {
            action: self.name.clone(),
            args,
            context,
        };
        (self.handler)(call).await
    }
}

impl std::fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The action registry
pub struct ActionRegistry {
    /// Handlers indexed by action name
    actions: DashMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// Create a new empty action registry
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Register an action, replacing any existing one with the same name
    #[instrument(skip(self, name, handler))]
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let name = name.into();
        debug!(action = %name, "Registering action");

        let handler: ActionHandler = Arc::new(move |call| Box::pin(handler(call)) as ActionFuture);
        self.actions.insert(name, handler);
    }

    /// Find an action by name
    ///
    /// An exact match wins. Otherwise the first registered name (in sorted
    /// order) that contains `name` is returned, so `"pushover"` finds
    /// `"binding.pushover"`.
    pub fn find(&self, name: &str) -> Option<ActionHandle> {
        if let Some(handler) = self.actions.get(name) {
            return Some(ActionHandle {
                name: name.to_string(),
                handler: handler.clone(),
            });
        }

        let mut candidates: Vec<String> = self
            .actions
            .iter()
            .filter(|entry| entry.key().contains(name))
            .map(|entry| entry.key().clone())
            .collect();
        candidates.sort();

        let found = candidates.into_iter().next().and_then(|candidate| {
            self.actions.get(&candidate).map(|handler| ActionHandle {
                handler: handler.clone(),
                name: candidate,
            })
        });

        trace!(requested = %name, found = ?found.as_ref().map(|h| h.name()), "Action lookup");
        found
    }

    /// Find and call an action in one step
    pub async fn call(
        &self,
        name: &str,
        args: serde_json::Value,
        context: Context,
    ) -> ActionResult {
        let handle = self
            .find(name)
            .ok_or_else(|| ActionError::NotFound(name.to_string()))?;
        handle.call(args, context).await
    }

    /// Check if an action with exactly this name exists
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Unregister an action
    #[instrument(skip(self))]
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.actions.remove(name).is_some();
        if removed {
            debug!(action = %name, "Unregistered action");
        }
        removed
    }

    /// Get total number of registered actions
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
