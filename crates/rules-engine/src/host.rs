//! The collaborators every rule is built against

use rules_action_registry::ActionRegistry;
use rules_event_bus::EventBus;
use rules_item_registry::ItemRegistry;
use std::sync::Arc;

use crate::resolver::ItemResolver;
use crate::scheduler::Scheduler;
use crate::settings::EngineSettings;

/// Bundle of host services handed to rules at construction
///
/// Cloning is cheap; all members are shared.
#[derive(Clone)]
pub struct RuleHost {
    /// Item lookup and state
    pub items: Arc<ItemRegistry>,
    /// Command/update bus
    pub bus: Arc<EventBus>,
    /// One-shot timers
    pub scheduler: Arc<Scheduler>,
    /// Host-provided actions
    pub actions: Arc<ActionRegistry>,
    /// Engine settings
    pub settings: Arc<EngineSettings>,
}

impl RuleHost {
    /// Assemble a host from existing collaborators
    pub fn new(
        items: Arc<ItemRegistry>,
        bus: Arc<EventBus>,
        scheduler: Arc<Scheduler>,
        actions: Arc<ActionRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            items,
            bus,
            scheduler,
            actions,
            settings: Arc::new(settings),
        }
    }

    /// A self-contained host backed by fresh in-memory collaborators
    pub fn in_memory() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// A self-contained in-memory host with the given settings
    pub fn with_settings(settings: EngineSettings) -> Self {
        let bus = Arc::new(EventBus::new());
        let items = Arc::new(ItemRegistry::new(Arc::clone(&bus)));
        Self::new(
            items,
            bus,
            Arc::new(Scheduler::new()),
            Arc::new(ActionRegistry::new()),
            settings,
        )
    }

    /// An item resolver bound to this host's registry and depth limit
    pub fn resolver(&self) -> ItemResolver {
        ItemResolver::new(Arc::clone(&self.items), self.settings.group_depth_limit)
    }
}

impl std::fmt::Debug for RuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleHost")
            .field("items", &self.items.item_count())
            .field("actions", &self.actions.action_count())
            .field("settings", &self.settings)
            .finish()
    }
}
