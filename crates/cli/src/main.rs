use anyhow::Context;
use clap::{Parser, Subcommand};
use devevent_db::Database;
use devevent_kernel::settings::Settings;

const REDACTED: &str = "********";

#[derive(Parser)]
#[command(name = "devevent-cli")]
#[command(about = "Run and inspect the DevEvent service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Print the resolved settings as JSON, passwords redacted
    Config,
    /// List the database migrations every module declares
    Migrations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load DevEvent settings")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => devevent_app::bootstrap::run(settings).await,
        Commands::Config => print_config(settings),
        Commands::Migrations => print_migrations(settings).await,
    }
}

fn print_config(mut settings: Settings) -> anyhow::Result<()> {
    for user in &mut settings.auth.users {
        user.password = REDACTED.to_string();
    }

    let rendered =
        serde_json::to_string_pretty(&settings).context("failed to render settings")?;
    println!("{rendered}");
    Ok(())
}

async fn print_migrations(settings: Settings) -> anyhow::Result<()> {
    // Wired over a scratch database so the configured one is never opened.
    let scratch = Database::in_memory()
        .await
        .context("failed to open scratch database")?;
    let app = devevent_app::bootstrap::build_with(settings, scratch).await?;

    for (module, migration) in app.registry.collect_migrations() {
        println!("{module}/{}", migration.id);
        for statement in migration.up.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            println!("    {statement};");
        }
    }

    app.shutdown().await
}
