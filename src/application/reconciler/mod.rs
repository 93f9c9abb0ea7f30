//! Subscription reconciliation.
//!
//! Turns verified payment lifecycle events into durable subscriber state,
//! then schedules best-effort notifications. See `SubscriptionReconciler`.

mod effects;
mod error;
mod keyed_locks;
mod service;

pub use effects::{messages, EffectRunner, PendingEffects};
pub use error::ReconcileError;
pub use keyed_locks::KeyedLocks;
pub use service::{ApplyOutcome, ApplyReport, ReconcilerTimeouts, SubscriptionReconciler};
