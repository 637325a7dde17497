//! Application lifecycle: open the store, wire modules, serve, shut down.
//!
//! 1. Connect SurrealDB at `database.endpoint`
//! 2. Register the `auth` core module and the domain modules
//! 3. Apply pending module migrations, then run `init`
//! 4. `start` modules, serve HTTP until Ctrl-C / SIGTERM
//! 5. `stop` modules in reverse and close the database handle

use std::sync::Arc;

use anyhow::Context;
use devevent_authz::SessionStore;
use devevent_db::Database;
use devevent_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A wired application whose modules have been initialized.
pub struct App {
    pub settings: Settings,
    pub db: Database,
    pub registry: ModuleRegistry,
}

impl App {
    pub fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.db,
        }
    }

    pub fn router(&self) -> axum::Router {
        devevent_http::build_router(&self.registry, &self.settings)
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let ctx = self.ctx();
        self.registry.start_core_modules(&ctx).await?;
        self.registry.start_custom_modules(&ctx).await?;
        Ok(())
    }

    /// Stop custom then core modules and close the database handle. Every step runs
    /// even when an earlier one fails; the first failure is returned.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let custom = self.registry.stop_custom_modules().await;
        let core = self.registry.stop_core_modules().await;
        let db = self
            .db
            .close()
            .await
            .context("failed to close database handle");

        if let Err(e) = &db {
            tracing::error!(error = %e, "database handle did not close cleanly");
        }
        tracing::info!("devevent shutdown complete");

        custom.and(core).and(db)
    }
}

/// Wire the registry over an already connected database.
pub async fn build_with(settings: Settings, db: Database) -> anyhow::Result<App> {
    let sessions = Arc::new(SessionStore::new(&settings.auth));

    let mut registry = ModuleRegistry::new();
    registry.register_core(devevent_authz::create_module(sessions.clone()));
    modules::register_all(&mut registry, &db, sessions, &settings);

    tracing::info!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "modules registered"
    );

    registry.apply_migrations(&db).await?;

    let app = App {
        settings,
        db,
        registry,
    };

    let ctx = app.ctx();
    app.registry.init_core_modules(&ctx).await?;
    app.registry.init_custom_modules(&ctx).await?;

    Ok(app)
}

/// Connect the configured database and wire the application.
pub async fn build(settings: Settings) -> anyhow::Result<App> {
    let database = &settings.database;
    let db = Database::connect(&database.endpoint, &database.namespace, &database.database)
        .await
        .with_context(|| format!("failed to open database at '{}'", database.endpoint))?;

    tracing::info!(
        endpoint = %database.endpoint,
        namespace = %database.namespace,
        database = %database.database,
        "database connected"
    );
    build_with(settings, db).await
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    devevent_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.endpoint,
        "devevent bootstrap starting"
    );

    let app = build(settings).await?;

    let served = match app.start().await {
        Ok(()) => devevent_http::start_server(&app.registry, &app.settings).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &served {
        tracing::error!(error = %e, "server exited with an error");
    }

    let closed = app.shutdown().await;
    served.and(closed)
}
