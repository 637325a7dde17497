//! DevEvent application library
//!
//! Domain modules (`events`, `bookings`) and the bootstrap that wires them
//! onto the DevEvent framework crates.

pub mod bootstrap;
pub mod error;
pub mod modules;
pub mod utils;

pub use error::CoreError;
pub use modules::*;
