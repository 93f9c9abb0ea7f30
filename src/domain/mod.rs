//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `subscriber` - Subscriber record, status state machine, transition planner
//! - `webhook` - Webhook verification errors and their HTTP semantics

pub mod foundation;
pub mod subscriber;
pub mod webhook;
