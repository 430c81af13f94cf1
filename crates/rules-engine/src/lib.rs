//! Rule Engine
//!
//! Declarative rule helpers for event-driven automation. A rule declares the
//! events it wants ([`Subscription`]s), classifies each delivered event into
//! a semantic transition and calls the matching hook.
//!
//! # Architecture
//!
//! ```text
//! ItemResolver ─┐
//!               ├─ ItemRuleBase ─┬─ ChangedRule ── RangeRule
//! RuleBase ─────┘                ├─ OnOffRule
//!    │                           ├─ OpenClosedRule ── OpenTooLongRule
//!    │                           └─ UpdatedRule
//!    ├─ MultiSwitchRule
//!    ├─ ChannelEventRule ── RangeEventRule ── RangeEventSwitchRule
//!    ├─ GenericChannelEventRule
//!    ├─ TimerRule
//!    └─ StartedRule
//! ```
//!
//! Hooks are trait methods with logging defaults; [`DefaultHooks`] uses all
//! the defaults, and single-hook traits are also implemented for closures.
//!
//! # Key Types
//!
//! - [`Rule`] - what a subscription engine registers and calls
//! - [`RuleHost`] - item registry, bus, scheduler, actions and settings
//! - [`ItemResolver`] - flattens items and groups into a [`WatchList`]
//! - [`SubscriptionFactory`] - builds [`Subscription`] descriptors

pub mod base;
pub mod changed;
pub mod channel;
pub mod error;
pub mod host;
pub mod item_rule;
pub mod multi_switch;
pub mod on_off;
pub mod open_closed;
pub mod open_too_long;
pub mod range;
pub mod resolver;
pub mod rule;
pub mod scheduler;
pub mod settings;
pub mod started;
pub mod subscription;
pub mod timer_rule;
pub mod updated;

pub use base::{BusValue, RuleBase};
pub use changed::{ChangedHandler, ChangedRule};
pub use channel::{
    ChannelEventRule, ChannelHandler, GenericChannelEventRule, RangeEventHandler, RangeEventRule,
    RangeEventSwitchRule,
};
pub use error::{RuleError, RuleResult};
pub use host::RuleHost;
pub use item_rule::ItemRuleBase;
pub use multi_switch::{MultiSwitchRule, SlotHandler};
pub use on_off::{OnOffHandler, OnOffRule};
pub use open_closed::{OpenClosedHandler, OpenClosedRule};
pub use open_too_long::{EscalationHandler, EscalationPhase, OpenTooLongRule};
pub use range::{Excursion, RangeHandler, RangeRule};
pub use resolver::{ItemResolver, ItemSelection, WatchList};
pub use rule::{DefaultHooks, HookResult, Rule};
pub use scheduler::{Deadline, Scheduler, TimerHandle};
pub use settings::{EngineSettings, MessageItems};
pub use started::{StartedHandler, StartedRule};
pub use subscription::{GenericEventFilter, Subscription, SubscriptionFactory};
pub use timer_rule::{TimerHandler, TimerRule};
pub use updated::{UpdatedHandler, UpdatedRule};
