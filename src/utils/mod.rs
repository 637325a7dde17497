//! Project-specific utilities live here.

pub mod datetime;
pub mod slug;

pub use slug::derive_slug;
