//! Telegram adapters.
//!
//! - `TelegramAccessNotifier` - `AccessNotifier` over the Bot API
//! - `RecordingAccessNotifier` - In-process notifier for tests and local runs
//! - `schema` / `run_dispatcher` - Chat command routing

mod bot;
mod notifier;
mod recording_notifier;

pub use bot::{render, run_dispatcher, schema, Command, HandlerError};
pub use notifier::TelegramAccessNotifier;
pub use recording_notifier::{NotifierCall, RecordingAccessNotifier};
