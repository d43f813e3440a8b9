//! # modhub-core
//!
//! Core crate for ModHub. Contains configuration schemas and the unified
//! error system shared by the composition engine.
//!
//! This crate has **no** internal dependencies on other ModHub crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::{EngineConfig, StartupOptions};
pub use error::AppError;
pub use result::AppResult;
