//! Subscriber domain module.
//!
//! Entitlement state for one product tier, driven by verified payment
//! lifecycle events.
//!
//! # Module Structure
//!
//! - `record` - SubscriberRecord entity
//! - `status` - SubscriptionStatus state machine
//! - `lifecycle_event` - LifecycleEvent tagged union
//! - `side_effect` - effects scheduled after a state change
//! - `transition` - pure transition planner

mod lifecycle_event;
mod record;
mod side_effect;
mod status;
mod transition;

pub use lifecycle_event::{
    LifecycleEvent, LifecycleEventKind, CHECKOUT_COMPLETED, INVOICE_PAYMENT_FAILED,
    SUBSCRIPTION_DELETED,
};
pub use record::SubscriberRecord;
pub use side_effect::SideEffect;
pub use status::SubscriptionStatus;
pub use transition::{plan_transition, Plan, SubscriptionSnapshot};
