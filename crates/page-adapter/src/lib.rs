//! Registry page layer for Caseflow.
//!
//! The operation engine talks to the registry through the [`RegistryUi`]
//! trait; this crate provides that trait, its Chromium/CDP implementation
//! and a scripted in-memory mock for tests.

pub mod chromium;
pub mod errors;
pub mod mock;
pub mod ui;

pub use chromium::{ChromiumConfig, ChromiumUi};
pub use errors::PageError;
pub use mock::MockRegistry;
pub use ui::{RegistryUi, RenderedRecall, RenderedRelease, RenderedSentence};
