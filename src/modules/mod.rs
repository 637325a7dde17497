pub mod bookings;
pub mod dashboard;
pub mod events;

use std::sync::Arc;

use devevent_authz::SessionStore;
use devevent_db::Database;
use devevent_kernel::{settings::Settings, ModuleRegistry};

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    db: &Database,
    sessions: Arc<SessionStore>,
    settings: &Settings,
) {
    registry.register_custom(events::create_module(
        db,
        sessions.clone(),
        settings.listing.clone(),
    ));
    registry.register_custom(dashboard::create_module(
        db,
        sessions,
        settings.listing.clone(),
    ));
    registry.register_custom(bookings::create_module(db));
}
