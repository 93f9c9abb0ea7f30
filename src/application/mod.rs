//! Application layer - Reconciler and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod reconciler;

pub use reconciler::{
    ApplyOutcome, ApplyReport, ReconcileError, ReconcilerTimeouts, SubscriptionReconciler,
};
