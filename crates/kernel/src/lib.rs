//! Core traits, settings, and module registry shared by every DevEvent crate.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
