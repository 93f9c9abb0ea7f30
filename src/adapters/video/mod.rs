//! Video access provider adapters.
//!
//! - `VdoCipherVideoProvider` - DRM OTPs from the VdoCipher API
//! - `StaticVideoProvider` - Canned OTPs for tests and local runs

mod static_provider;
mod vdocipher;

pub use static_provider::StaticVideoProvider;
pub use vdocipher::{VdoCipherConfig, VdoCipherVideoProvider};
