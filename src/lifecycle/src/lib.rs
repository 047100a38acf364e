//! Provisioning and teardown of exercise participations.
//!
//! [`Engine`] creates participant repositories and build plans step by step,
//! checkpointing every step in the store, so that failed requests can be
//! retried. [`Cleaner`] removes participations together with their remote
//! artifacts.
pub mod cache;
mod cleanup;
mod config;
mod engine;
mod error;
mod remote;
mod services;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use cleanup::{Cleaner, CleanupReport};
pub use config::{CleanupConfig, LifecycleConfig};
pub use engine::Engine;
pub use error::{LifecycleError, Result};
pub use services::Services;
